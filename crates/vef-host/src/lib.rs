//! Host-side harness for VEF extensions: load a shared library (or a
//! statically linked extension), drive its registration entry point, and
//! dispatch calls the way the database engine would.
//!
//! This crate is tooling around the ABI, used by the packer and the SQL
//! test runner. It is not the engine: no planner, no query execution,
//! just enough of the host calling convention to exercise an extension.

pub mod loader;
pub mod manager;
pub mod registry;
pub mod value;

pub use loader::{ExtensionHost, LoadedExtension};
pub use manager::ExtensionManager;
pub use registry::{FunctionRegistry, RegisteredFunction};
pub use value::{HostValue, SqlReturn};
