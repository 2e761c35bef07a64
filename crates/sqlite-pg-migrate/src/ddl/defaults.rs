//! Column default parsing.
//!
//! SQLite reports defaults as the raw text that followed `DEFAULT` in the
//! original `CREATE TABLE`. This module sorts that text into the few shapes
//! that can be carried over to PostgreSQL verbatim or re-rendered.

use std::fmt;

use crate::typemap::PortableType;

/// A parsed column default.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultExpr {
    CurrentTimestamp,
    CurrentDate,
    CurrentTime,
    /// Integer literal.
    Integer(i64),
    /// Non-integer numeric literal.
    Float(f64),
    /// Quoted string literal, unquoted and unescaped.
    Text(String),
    /// Anything else, passed through as a SQL expression.
    Raw(String),
}

impl DefaultExpr {
    /// Parse a raw default literal.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let inner = strip_parens(trimmed);

        match inner.to_ascii_uppercase().as_str() {
            "CURRENT_TIMESTAMP" => return DefaultExpr::CurrentTimestamp,
            "CURRENT_DATE" => return DefaultExpr::CurrentDate,
            "CURRENT_TIME" => return DefaultExpr::CurrentTime,
            _ => {}
        }

        if let Some(text) = unquote(inner) {
            return DefaultExpr::Text(text);
        }

        if is_numeric_literal(inner) {
            if let Ok(n) = inner.parse::<i64>() {
                return DefaultExpr::Integer(n);
            }
            if let Ok(f) = inner.parse::<f64>() {
                if f.is_finite() {
                    return DefaultExpr::Float(f);
                }
            }
        }

        DefaultExpr::Raw(trimmed.to_string())
    }

    /// Render as a PostgreSQL default expression.
    pub fn to_postgres(&self) -> String {
        match self {
            DefaultExpr::CurrentTimestamp => "CURRENT_TIMESTAMP".to_string(),
            DefaultExpr::CurrentDate => "CURRENT_DATE".to_string(),
            DefaultExpr::CurrentTime => "CURRENT_TIME".to_string(),
            DefaultExpr::Integer(n) => n.to_string(),
            DefaultExpr::Float(f) => f.to_string(),
            DefaultExpr::Text(s) => format!("'{}'", s.replace('\'', "''")),
            DefaultExpr::Raw(expr) => expr.clone(),
        }
    }
}

impl DefaultExpr {
    /// Render for a column of the given target type.
    ///
    /// PostgreSQL has no implicit integer to boolean cast, so `0`/`1`
    /// defaults on boolean columns become `FALSE`/`TRUE`.
    pub fn to_postgres_for(&self, ty: PortableType) -> String {
        match (self, ty) {
            (DefaultExpr::Integer(0), PortableType::Boolean) => "FALSE".to_string(),
            (DefaultExpr::Integer(_), PortableType::Boolean) => "TRUE".to_string(),
            _ => self.to_postgres(),
        }
    }
}

impl fmt::Display for DefaultExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_postgres())
    }
}

/// Remove balanced outer parentheses: `((0))` → `0`.
fn strip_parens(s: &str) -> &str {
    let mut current = s;
    while current.len() >= 2 && current.starts_with('(') && current.ends_with(')') {
        let inner = &current[1..current.len() - 1];
        if !parens_balanced(inner) {
            break;
        }
        current = inner.trim();
    }
    current
}

fn parens_balanced(s: &str) -> bool {
    let mut depth = 0i32;
    for c in s.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// Unwrap a single- or double-quoted literal, collapsing doubled quotes.
///
/// Returns `None` unless the whole input is exactly one quoted literal.
fn unquote(s: &str) -> Option<String> {
    let quote = s.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    if s.len() < 2 || !s.ends_with(quote) {
        return None;
    }

    let body = &s[1..s.len() - 1];
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c == quote {
            // A lone quote inside means this is not a single literal.
            if chars.peek() == Some(&quote) {
                chars.next();
            } else {
                return None;
            }
        }
        out.push(c);
    }
    Some(out)
}

/// `[+-]digits[.digits][e[+-]digits]` or `[+-].digits[...]`.
fn is_numeric_literal(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;
    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }

    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut digits = i - int_start;

    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        let frac_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        digits += i - frac_start;
    }
    if digits == 0 {
        return false;
    }

    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        i += 1;
        if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
            i += 1;
        }
        let exp_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == exp_start {
            return false;
        }
    }

    i == bytes.len()
}
