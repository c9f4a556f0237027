//! Security utilities for SQL injection prevention
//!
//! This module provides:
//! - String and byte-blob literal escaping used by the inline render mode
//! - The inverse of the string escaping, for verification and diagnostics
//! - Quote-aware placeholder scanning shared by both render modes
//! - [`RawSql`], the only type the raw escape hatches accept
//!
//! Escaping is the sole injection defense for inline SQL. The seven
//! character mappings below are complete and must stay bit-exact:
//!
//! | input  | output |
//! |--------|--------|
//! | `'`    | `''`   |
//! | `\`    | `\\`   |
//! | NUL    | `\0`   |
//! | LF     | `\n`   |
//! | CR     | `\r`   |
//! | 0x1A   | `\Z`   |
//!
//! and the result is wrapped in single quotes.

use crate::error::{OrmError, OrmResult};
use crate::value::Value;

/// Escape a string into a single-quoted SQL literal
///
/// # Examples
/// ```
/// use strata_orm::security::escape_string;
///
/// assert_eq!(escape_string("it's"), "'it''s'");
/// assert_eq!(escape_string("a\\b"), "'a\\\\b'");
/// ```
pub fn escape_string(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len() + 2);
    escaped.push('\'');
    for c in input.chars() {
        match c {
            '\'' => escaped.push_str("''"),
            '\\' => escaped.push_str("\\\\"),
            '\0' => escaped.push_str("\\0"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\u{1a}' => escaped.push_str("\\Z"),
            other => escaped.push(other),
        }
    }
    escaped.push('\'');
    escaped
}

/// Render a byte blob as an uppercase hexadecimal literal, `X'..'`
pub fn escape_bytes(bytes: &[u8]) -> String {
    format!("X'{}'", hex::encode_upper(bytes))
}

/// Reverse [`escape_string`]
///
/// Returns `None` when `literal` is not a well-formed output of
/// `escape_string` (missing quotes, a lone quote, or an unknown escape).
pub fn unescape_string(literal: &str) -> Option<String> {
    let inner = literal.strip_prefix('\'')?.strip_suffix('\'')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                if chars.next()? != '\'' {
                    return None;
                }
                out.push('\'');
            }
            '\\' => match chars.next()? {
                '\\' => out.push('\\'),
                '0' => out.push('\0'),
                'n' => out.push('\n'),
                'r' => out.push('\r'),
                'Z' => out.push('\u{1a}'),
                _ => return None,
            },
            other => out.push(other),
        }
    }
    Some(out)
}

/// Walk `sql` once, reporting every `?` outside a single-quoted literal as
/// a placeholder and everything else as text.
fn scan_placeholders(sql: &str, mut visit: impl FnMut(Segment)) {
    let mut chars = sql.chars().peekable();
    let mut in_literal = false;
    let mut index = 0;

    while let Some(c) = chars.next() {
        if in_literal {
            visit(Segment::Char(c));
            match c {
                '\\' => {
                    if let Some(next) = chars.next() {
                        visit(Segment::Char(next));
                    }
                }
                '\'' => {
                    if chars.peek() == Some(&'\'') {
                        chars.next();
                        visit(Segment::Char('\''));
                    } else {
                        in_literal = false;
                    }
                }
                _ => {}
            }
            continue;
        }

        match c {
            '?' => {
                visit(Segment::Placeholder(index));
                index += 1;
            }
            '\'' => {
                in_literal = true;
                visit(Segment::Char(c));
            }
            _ => visit(Segment::Char(c)),
        }
    }
}

enum Segment {
    Char(char),
    Placeholder(usize),
}

/// Count the `?` placeholders in `sql`, ignoring any inside string literals
pub fn count_placeholders(sql: &str) -> usize {
    let mut count = 0;
    scan_placeholders(sql, |segment| {
        if let Segment::Placeholder(_) = segment {
            count += 1;
        }
    });
    count
}

/// Replace the i-th placeholder of `template` with `params[i].to_sql()`
///
/// This is a single left-to-right scan: text produced by a substitution is
/// never rescanned, so a value containing `?` cannot shift later bindings.
/// Placeholders beyond `params.len()` are left untouched.
pub fn substitute_placeholders(template: &str, params: &[Value]) -> String {
    let mut sql = String::with_capacity(template.len() + params.len() * 8);
    scan_placeholders(template, |segment| match segment {
        Segment::Char(c) => sql.push(c),
        Segment::Placeholder(i) => match params.get(i) {
            Some(value) => sql.push_str(&value.to_sql()),
            None => sql.push('?'),
        },
    });
    sql
}

/// Caller-vouched SQL text for the raw escape hatches
///
/// `select_raw`, `where_raw` and `having_raw` inject this text verbatim with
/// no escaping. Constructing a `RawSql` is the caller's statement that the
/// text does not contain untrusted input; values that do come from outside
/// belong in [`RawSql::bind`], which routes them through the normal
/// placeholder machinery.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSql {
    sql: String,
    bindings: Vec<Value>,
}

impl RawSql {
    /// Wrap trusted SQL text
    pub fn trusted(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            bindings: Vec::new(),
        }
    }

    /// Bind a value to the next `?` placeholder of the fragment
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.bindings.push(value.into());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn bindings(&self) -> &[Value] {
        &self.bindings
    }

    /// True when the fragment has exactly one binding per placeholder
    pub fn is_balanced(&self) -> bool {
        count_placeholders(&self.sql) == self.bindings.len()
    }

    /// Reject a fragment whose placeholder count differs from its bindings
    pub fn checked(self) -> OrmResult<Self> {
        let placeholders = count_placeholders(&self.sql);
        if placeholders != self.bindings.len() {
            return Err(OrmError::InvalidQuery(format!(
                "raw fragment `{}` has {} placeholder(s) but {} binding(s)",
                self.sql,
                placeholders,
                self.bindings.len()
            )));
        }
        Ok(self)
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.bindings)
    }
}
