use anyhow::{anyhow, bail, Result};

/// One literal argument in a `SELECT` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Null,
    Text(String),
    Integer(i64),
}

/// One executable statement of a test script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// `INSTALL EXTENSION '<path>';` - the path may contain `$VAR`
    /// placeholders resolved by the runner.
    Install { package: String },
    /// `SELECT <fn>(<args>);` with a single function call.
    Select {
        function: String,
        args: Vec<Literal>,
    },
}

/// A statement plus the raw SQL it was parsed from. The raw text is what
/// gets echoed into the result output, placeholders unexpanded, so that
/// recorded files stay stable across machines.
#[derive(Debug, Clone)]
pub struct ScriptStatement {
    pub sql: String,
    pub statement: Statement,
}

#[derive(Debug, Clone)]
pub struct TestCase {
    pub name: String,
    pub statements: Vec<ScriptStatement>,
}

/// Parse a `.test` script: `#` comments and blank lines are skipped,
/// statements run until a line ending in `;`.
pub fn parse_script(name: &str, source: &str) -> Result<TestCase> {
    let mut statements = Vec::new();
    let mut pending = String::new();

    for (line_no, raw_line) in source.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            if !pending.is_empty() {
                bail!("{name}:{}: statement interrupted before ';'", line_no + 1);
            }
            continue;
        }

        if !pending.is_empty() {
            pending.push(' ');
        }
        pending.push_str(line);

        if line.ends_with(';') {
            let sql = std::mem::take(&mut pending);
            let statement = parse_statement(sql.trim_end_matches(';'))
                .map_err(|err| anyhow!("{name}:{}: {err}", line_no + 1))?;
            statements.push(ScriptStatement { sql, statement });
        }
    }

    if !pending.is_empty() {
        bail!("{name}: unterminated statement: {pending}");
    }

    Ok(TestCase {
        name: name.to_string(),
        statements,
    })
}

fn parse_statement(sql: &str) -> Result<Statement> {
    if let Some(rest) = strip_keyword(sql, "INSTALL") {
        let rest = strip_keyword(rest, "EXTENSION")
            .ok_or_else(|| anyhow!("expected EXTENSION after INSTALL"))?;
        let (package, remainder) = parse_quoted(rest)?;
        if !remainder.trim().is_empty() {
            bail!("unexpected trailing input: {}", remainder.trim());
        }
        return Ok(Statement::Install { package });
    }

    if let Some(rest) = strip_keyword(sql, "SELECT") {
        return parse_call(rest);
    }

    bail!("unsupported statement: {sql}")
}

/// Case-insensitive keyword at the start of the input, with a word
/// boundary after it.
fn strip_keyword<'a>(input: &'a str, keyword: &str) -> Option<&'a str> {
    let trimmed = input.trim_start();
    if trimmed.len() < keyword.len() {
        return None;
    }
    let (head, rest) = trimmed.split_at(keyword.len());
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    if rest
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return None;
    }
    Some(rest)
}

fn parse_call(rest: &str) -> Result<Statement> {
    let rest = rest.trim();
    let open = rest
        .find('(')
        .ok_or_else(|| anyhow!("expected a function call"))?;
    let function = rest[..open].trim().to_string();
    validate_function_name(&function)?;

    let after = &rest[open + 1..];
    let close = after
        .rfind(')')
        .ok_or_else(|| anyhow!("missing ')' in function call"))?;
    if !after[close + 1..].trim().is_empty() {
        bail!("unexpected trailing input: {}", after[close + 1..].trim());
    }

    let args = parse_args(&after[..close])?;
    Ok(Statement::Select { function, args })
}

fn validate_function_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("empty function name");
    }
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 2 {
        bail!("too many qualifiers in function name: {name}");
    }
    for part in parts {
        if part.is_empty()
            || !part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            bail!("invalid function name: {name}");
        }
    }
    Ok(())
}

fn parse_args(input: &str) -> Result<Vec<Literal>> {
    let mut args = Vec::new();
    let mut rest = input.trim();
    if rest.is_empty() {
        return Ok(args);
    }

    loop {
        let (literal, remainder) = parse_literal(rest)?;
        args.push(literal);
        rest = remainder.trim_start();
        if rest.is_empty() {
            break;
        }
        rest = rest
            .strip_prefix(',')
            .ok_or_else(|| anyhow!("expected ',' in argument list, found: {rest}"))?
            .trim_start();
        if rest.is_empty() {
            bail!("trailing comma in argument list");
        }
    }
    Ok(args)
}

fn parse_literal(input: &str) -> Result<(Literal, &str)> {
    let rest = input.trim_start();

    if rest.starts_with('\'') {
        let (text, remainder) = parse_quoted(rest)?;
        return Ok((Literal::Text(text), remainder));
    }

    if let Some(remainder) = strip_keyword(rest, "NULL") {
        return Ok((Literal::Null, remainder));
    }

    let end = rest
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && c == '-')))
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    let digits = &rest[..end];
    if digits.is_empty() || digits == "-" {
        bail!("expected a literal, found: {rest}");
    }
    let value: i64 = digits
        .parse()
        .map_err(|_| anyhow!("invalid integer literal: {digits}"))?;
    Ok((Literal::Integer(value), &rest[end..]))
}

/// Single-quoted string with `''` escaping. Returns the value and the
/// input remaining after the closing quote.
fn parse_quoted(input: &str) -> Result<(String, &str)> {
    let rest = input.trim_start();
    let rest = rest
        .strip_prefix('\'')
        .ok_or_else(|| anyhow!("expected a quoted string"))?;

    let mut value = String::new();
    let mut chars = rest.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != '\'' {
            value.push(c);
            continue;
        }
        if let Some(&(_, '\'')) = chars.peek() {
            chars.next();
            value.push('\'');
        } else {
            return Ok((value, &rest[i + 1..]));
        }
    }
    bail!("unterminated string literal")
}
