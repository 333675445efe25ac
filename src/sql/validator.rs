//! Lexical screen for caller-supplied SQL text.
//!
//! The screen is deliberately not a parser. It works on lowercased text in a
//! fixed order: substring denylist, then leading-keyword allowlist, then
//! danger regexes. The first failing check wins and reports what it matched.
//! Substring matching is conservative and can reject benign text that merely
//! contains a blocked spelling; callers rely on that refusal bias.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{GatewayError, GatewayResult};

/// Substrings rejected anywhere in caller-supplied statement text.
pub const DENYLIST: &[&str] = &[
    "drop",
    "truncate",
    "alter",
    "create",
    "grant",
    "revoke",
    "deny",
    "backup",
    "restore",
    "shutdown",
    "kill",
    "sp_",
    "xp_",
    "openrowset",
    "opendatasource",
    "bulk",
    "bcp",
];

/// Keywords a statement may start with (and clause keywords carried along
/// with them; only the first token is checked).
const STATEMENT_KEYWORDS: &[&str] = &[
    "select", "insert", "update", "delete", "exec", "execute", "with", "from", "where", "order",
    "group", "having", "join", "inner", "left", "right", "outer", "cross", "union", "except",
    "intersect", "case", "when", "then", "else", "end", "as", "and", "or", "not", "in", "exists",
    "between", "like", "is", "null", "top", "distinct", "count", "sum", "avg", "min", "max",
    "cast", "convert",
];

/// Danger patterns checked after the keyword gates, in this order.
static DANGER_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"--", "--"),
        (r"/\*.*\*/", "/* */"),
        (r"union.*select", "union ... select"),
        (r"exec\s*\(", "exec("),
        (r"sp_executesql", "sp_executesql"),
        (r"xp_cmdshell", "xp_cmdshell"),
        (r"openrowset", "openrowset"),
        (r"opendatasource", "opendatasource"),
    ]
    .iter()
    .map(|(pattern, label)| (Regex::new(pattern).expect("valid pattern"), *label))
    .collect()
});

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid pattern"));

/// SQL Server scalar types accepted in DDL requests. Length or precision
/// arguments after `(` are not checked.
const SQL_TYPES: &[&str] = &[
    "int",
    "bigint",
    "smallint",
    "tinyint",
    "bit",
    "decimal",
    "numeric",
    "float",
    "real",
    "money",
    "smallmoney",
    "char",
    "varchar",
    "nchar",
    "nvarchar",
    "text",
    "ntext",
    "date",
    "time",
    "datetime",
    "datetime2",
    "smalldatetime",
    "datetimeoffset",
    "binary",
    "varbinary",
    "image",
    "uniqueidentifier",
    "xml",
    "sql_variant",
    "timestamp",
];

/// Additional substrings rejected in WHERE clause text: statement keywords
/// that have no place in a predicate, batch/comment tokens, and tautologies.
const WHERE_DENYLIST: &[&str] = &[
    ";", "--", "/*", "*/", "insert", "update", "delete", "exec", "execute", "union", "select",
    "or 1=1", "and 1=1", "or true", "and true",
];

/// Screen a full statement of caller-supplied text.
///
/// Checks run in a fixed order and the first failure wins:
/// 1. denylist substrings anywhere in the lowercased text;
/// 2. the first token must be an allowed statement keyword;
/// 3. danger regexes.
pub fn validate_statement(text: &str) -> GatewayResult<()> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(GatewayError::validation("Query cannot be empty", None));
    }
    let lower = trimmed.to_lowercase();

    for blocked in DENYLIST {
        if lower.contains(blocked) {
            return Err(GatewayError::validation(
                format!("Query contains blocked keyword: {blocked}"),
                Some((*blocked).to_string()),
            ));
        }
    }

    let first_token = lower.split_whitespace().next().unwrap_or("");
    if !STATEMENT_KEYWORDS.contains(&first_token) {
        return Err(GatewayError::validation(
            format!("Query must start with an allowed statement keyword, found '{first_token}'"),
            Some(first_token.to_string()),
        ));
    }

    for (pattern, label) in DANGER_PATTERNS.iter() {
        if pattern.is_match(&lower) {
            return Err(GatewayError::validation(
                format!("Query contains dangerous pattern: {label}"),
                Some((*label).to_string()),
            ));
        }
    }

    Ok(())
}

/// True when `name` is a safe bare identifier: matches the identifier shape
/// and contains none of the denylisted substrings.
pub fn is_valid_identifier(name: &str) -> bool {
    if !IDENTIFIER_RE.is_match(name) {
        return false;
    }
    let lower = name.to_lowercase();
    !DENYLIST.iter().any(|blocked| lower.contains(blocked))
}

/// Validate an identifier, reporting which check failed.
pub fn validate_identifier(name: &str, role: &str) -> GatewayResult<()> {
    if !IDENTIFIER_RE.is_match(name) {
        return Err(GatewayError::validation(
            format!("Invalid {role} name: '{name}'"),
            None,
        ));
    }
    let lower = name.to_lowercase();
    if let Some(blocked) = DENYLIST.iter().find(|b| lower.contains(*b)) {
        return Err(GatewayError::validation(
            format!("{role} name '{name}' contains blocked keyword: {blocked}"),
            Some((*blocked).to_string()),
        ));
    }
    Ok(())
}

/// Validate a SQL type token such as `nvarchar(500)` or `int`.
///
/// The base type before any `(` must be one of the known SQL Server scalar
/// types; the argument suffix is passed through unchecked.
pub fn validate_type_token(token: &str) -> GatewayResult<()> {
    let base = token.split('(').next().unwrap_or("").trim().to_lowercase();
    if SQL_TYPES.contains(&base.as_str()) {
        Ok(())
    } else {
        Err(GatewayError::validation(
            format!("Unsupported data type: '{token}'"),
            None,
        ))
    }
}

/// Screen a WHERE clause supplied as free text.
pub fn validate_where_clause(text: &str) -> GatewayResult<()> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(GatewayError::validation("WHERE clause cannot be empty", None));
    }
    let lower = trimmed.to_lowercase();

    for blocked in DENYLIST.iter().chain(WHERE_DENYLIST.iter()) {
        if lower.contains(blocked) {
            return Err(GatewayError::validation(
                format!("WHERE clause contains blocked pattern: {blocked}"),
                Some((*blocked).to_string()),
            ));
        }
    }
    Ok(())
}

/// True when the text reads as a SELECT statement.
pub fn is_select(text: &str) -> bool {
    text.trim_start().to_lowercase().starts_with("select")
}

static SELECT_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*select\s+").expect("valid pattern"));

/// Inject `TOP {limit}` into a SELECT that does not already carry one.
///
/// Non-SELECT text and text already containing `top ` pass through unchanged,
/// which also makes the injection idempotent.
pub fn apply_row_limit(text: &str, limit: usize) -> String {
    if !is_select(text) {
        return text.to_string();
    }
    if text.to_lowercase().contains("top ") {
        return text.to_string();
    }
    SELECT_PREFIX_RE
        .replace(text, format!("SELECT TOP {limit} "))
        .into_owned()
}
