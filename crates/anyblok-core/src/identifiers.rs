//! Declared-name validation and SQL identifier helpers.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

static DOTTED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
        .unwrap_or_else(|e| unreachable!("static pattern: {e}"))
});

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap_or_else(|e| unreachable!("static pattern: {e}"))
});

/// Check a dotted declaration name such as `System.Sequence`.
pub fn validate_dotted_name(name: &str) -> Result<()> {
    if DOTTED_NAME.is_match(name) {
        Ok(())
    } else {
        Err(Error::InvalidName {
            name: name.to_string(),
            reason: "expected dot separated identifiers",
        })
    }
}

/// Check a single identifier (column, attribute or method name).
pub fn validate_identifier(name: &str) -> Result<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(Error::InvalidName {
            name: name.to_string(),
            reason: "expected an identifier",
        })
    }
}

/// Default table name of a model: lower-cased, dots replaced by underscores.
///
/// `System.Sequence` becomes `system_sequence`.
pub fn table_name_for(model: &str) -> String {
    model.replace('.', "_").to_lowercase()
}

/// Quote an identifier with double quotes (ANSI / PostgreSQL / SQLite).
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Replace every character that is not alphanumeric or `_`.
pub fn sanitize_identifier(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
        } else {
            out.push('_');
        }
    }
    if out.is_empty() {
        out.push_str("tmp");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dotted_names() {
        assert!(validate_dotted_name("Test").is_ok());
        assert!(validate_dotted_name("System.Sequence").is_ok());
        assert!(validate_dotted_name("System..Sequence").is_err());
        assert!(validate_dotted_name("1Test").is_err());
        assert!(validate_dotted_name("").is_err());
    }

    #[test]
    fn test_identifier() {
        assert!(validate_identifier("seq_name").is_ok());
        assert!(validate_identifier("seq.name").is_err());
    }

    #[test]
    fn test_table_name() {
        assert_eq!(table_name_for("System.Sequence"), "system_sequence");
        assert_eq!(table_name_for("Test"), "test");
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("user"), "\"user\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_identifier("a-b c"), "a_b_c");
        assert_eq!(sanitize_identifier(""), "tmp");
    }
}
