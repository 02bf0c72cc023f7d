//! Script-driven SQL test runner for VEF extensions.
//!
//! A suite directory holds `t/<case>.test` scripts and `r/<case>.result`
//! expectations. The runner executes each script against the extension
//! harness, echoing every statement followed by its result rows, and
//! diffs the produced text against the recorded expectation (or rewrites
//! it with `--record`).

pub mod runner;
pub mod script;

pub use runner::{CaseFailure, Runner, Suite, SuiteOutcome};
pub use script::{parse_script, Literal, Statement, TestCase};
