use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use vef_host::{ExtensionManager, HostValue, SqlReturn};

use crate::script::{parse_script, Literal, Statement, TestCase};

/// Executes parsed test cases against an extension harness and renders
/// the output text that gets diffed against `r/<case>.result`.
pub struct Runner {
    manager: ExtensionManager,
    vars: HashMap<String, String>,
    work_dir: PathBuf,
}

impl Runner {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self::with_manager(ExtensionManager::new(), work_dir)
    }

    /// Use a prepared manager, e.g. with statically linked extensions
    /// already installed.
    pub fn with_manager(manager: ExtensionManager, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            manager,
            vars: HashMap::new(),
            work_dir: work_dir.into(),
        }
    }

    /// Define a `$NAME` placeholder for INSTALL paths.
    pub fn set_var(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn manager(&self) -> &ExtensionManager {
        &self.manager
    }

    /// Parse and run a script in one go.
    pub fn run_source(&self, name: &str, source: &str) -> Result<String> {
        let case = parse_script(name, source)?;
        self.run_case(&case)
    }

    /// Execute a case, producing one echoed statement plus its result
    /// rows per statement. Statement-level failures become `ERROR:` lines
    /// (they are SQL-visible output, part of what a test asserts);
    /// script-authoring problems (unknown `$VAR`) abort the case.
    pub fn run_case(&self, case: &TestCase) -> Result<String> {
        let mut output = String::new();

        for stmt in &case.statements {
            output.push_str(&stmt.sql);
            output.push('\n');

            match &stmt.statement {
                Statement::Install { package } => {
                    let package = self.substitute(package)?;
                    match self
                        .manager
                        .install_package(Path::new(&package), &self.work_dir)
                    {
                        Ok(name) => {
                            tracing::debug!("installed {name} for case {}", case.name);
                        }
                        Err(err) => {
                            output.push_str(&format!("ERROR: {err}\n"));
                        }
                    }
                }
                Statement::Select { function, args } => {
                    let args: Vec<HostValue> = args.iter().map(to_host_value).collect();
                    let line = match self.manager.call_function(function, &args) {
                        Ok(SqlReturn::Text(text)) => text,
                        Ok(SqlReturn::Integer(value)) => value.to_string(),
                        Ok(SqlReturn::Null) => "NULL".to_string(),
                        Ok(SqlReturn::Error(msg)) => format!("ERROR: {msg}"),
                        Err(err) => format!("ERROR: {err}"),
                    };
                    output.push_str(&line);
                    output.push('\n');
                }
            }
        }

        Ok(output)
    }

    /// Expand `$NAME` placeholders from the runner's variable table.
    fn substitute(&self, input: &str) -> Result<String> {
        let mut output = String::new();
        let mut rest = input;
        while let Some(pos) = rest.find('$') {
            output.push_str(&rest[..pos]);
            rest = &rest[pos + 1..];
            let end = rest
                .char_indices()
                .find(|&(_, c)| !(c.is_ascii_alphanumeric() || c == '_'))
                .map(|(i, _)| i)
                .unwrap_or(rest.len());
            let name = &rest[..end];
            if name.is_empty() {
                bail!("dangling '$' in: {input}");
            }
            let value = self
                .vars
                .get(name)
                .ok_or_else(|| anyhow!("undefined variable ${name} in: {input}"))?;
            output.push_str(value);
            rest = &rest[end..];
        }
        output.push_str(rest);
        Ok(output)
    }
}

fn to_host_value(literal: &Literal) -> HostValue {
    match literal {
        Literal::Null => HostValue::Null,
        Literal::Text(s) => HostValue::Text(s.clone()),
        Literal::Integer(v) => HostValue::Integer(*v),
    }
}

/// A failed case with a human-readable mismatch description.
#[derive(Debug)]
pub struct CaseFailure {
    pub name: String,
    pub detail: String,
}

/// Outcome of a full suite run.
#[derive(Debug, Default)]
pub struct SuiteOutcome {
    pub passed: Vec<String>,
    pub failed: Vec<CaseFailure>,
    pub recorded: Vec<String>,
}

impl SuiteOutcome {
    pub fn ok(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A suite directory (`t/*.test` + `r/*.result`) plus the variables its
/// scripts may reference. Every case runs against a fresh harness with
/// its own scratch directory.
pub struct Suite {
    dir: PathBuf,
    vars: HashMap<String, String>,
}

impl Suite {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            vars: HashMap::new(),
        }
    }

    pub fn var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Run every case (optionally filtered by name substring). With
    /// `record`, expected files are rewritten from the actual output
    /// instead of compared.
    pub fn run(&self, filter: Option<&str>, record: bool) -> Result<SuiteOutcome> {
        let mut outcome = SuiteOutcome::default();

        for case_path in self.case_paths()? {
            let name = case_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            if let Some(filter) = filter {
                if !name.contains(filter) {
                    continue;
                }
            }

            let source = std::fs::read_to_string(&case_path)
                .with_context(|| format!("failed to read {}", case_path.display()))?;
            let case = parse_script(&name, &source)?;

            let scratch = tempfile::tempdir().context("failed to create scratch directory")?;
            let mut runner = Runner::new(scratch.path());
            for (name, value) in &self.vars {
                runner.set_var(name.clone(), value.clone());
            }

            let actual = runner.run_case(&case)?;
            let expected_path = self.dir.join("r").join(format!("{name}.result"));

            if record {
                std::fs::write(&expected_path, &actual)
                    .with_context(|| format!("failed to write {}", expected_path.display()))?;
                outcome.recorded.push(name);
                continue;
            }

            let expected = match std::fs::read_to_string(&expected_path) {
                Ok(expected) => expected,
                Err(_) => {
                    outcome.failed.push(CaseFailure {
                        name,
                        detail: format!("missing expected file {}", expected_path.display()),
                    });
                    continue;
                }
            };

            if actual == expected {
                outcome.passed.push(name);
            } else {
                outcome.failed.push(CaseFailure {
                    detail: describe_mismatch(&expected, &actual),
                    name,
                });
            }
        }

        Ok(outcome)
    }

    fn case_paths(&self) -> Result<Vec<PathBuf>> {
        let t_dir = self.dir.join("t");
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&t_dir)
            .with_context(|| format!("failed to read suite directory {}", t_dir.display()))?
        {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("test") {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

/// First differing line, with context counts, for failure reports.
fn describe_mismatch(expected: &str, actual: &str) -> String {
    let expected_lines: Vec<&str> = expected.lines().collect();
    let actual_lines: Vec<&str> = actual.lines().collect();

    for (idx, (exp, act)) in expected_lines.iter().zip(&actual_lines).enumerate() {
        if exp != act {
            return format!(
                "line {}:\n  expected: {exp}\n  actual:   {act}",
                idx + 1
            );
        }
    }
    format!(
        "line count differs: expected {} lines, got {}",
        expected_lines.len(),
        actual_lines.len()
    )
}
