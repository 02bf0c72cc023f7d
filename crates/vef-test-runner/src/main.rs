use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Parser;
use vef_test_runner::Suite;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run script-driven SQL tests against VEF extensions", long_about = None)]
struct Args {
    /// Suite directory containing t/ and r/
    suite: PathBuf,

    /// Rewrite expected files from actual output
    #[arg(long)]
    record: bool,

    /// Only run cases whose name contains this substring
    #[arg(long)]
    case: Option<String>,

    /// Define a $NAME placeholder, e.g. --var VEF_PACKAGE_DIR=/tmp/pkgs
    #[arg(long = "var", value_name = "NAME=VALUE")]
    vars: Vec<String>,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let mut suite = Suite::new(&args.suite);
    for var in &args.vars {
        let (name, value) = var
            .split_once('=')
            .ok_or_else(|| anyhow!("--var expects NAME=VALUE, got: {var}"))?;
        suite = suite.var(name, value);
    }

    let outcome = suite.run(args.case.as_deref(), args.record)?;

    for name in &outcome.recorded {
        println!("[ RECORDED ] {name}");
    }
    for name in &outcome.passed {
        println!("[ PASS ] {name}");
    }
    for failure in &outcome.failed {
        println!("[ FAIL ] {}", failure.name);
        println!("{}", failure.detail);
    }

    println!(
        "{} passed, {} failed, {} recorded",
        outcome.passed.len(),
        outcome.failed.len(),
        outcome.recorded.len()
    );

    if !outcome.ok() {
        std::process::exit(1);
    }
    Ok(())
}
