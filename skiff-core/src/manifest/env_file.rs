//! Flat key-value environment source.
//!
//! The substitution variables for `${NAME}` placeholders come from a
//! dotenv-style file: one `KEY=value` per line, `#` comments, optional
//! single or double quotes around the value.

use crate::error::{Result, SkiffError};
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

/// Load an environment file from disk.
pub fn load(path: impl AsRef<Path>) -> Result<HashMap<String, String>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| SkiffError::FileRead {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;
    Ok(parse(&content))
}

/// Parse environment file content into a typed key-value map.
///
/// Lines without an '=' are skipped with a warning rather than failing the
/// whole file; an undefined variable is caught later by substitution.
pub fn parse(content: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();

    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match line.split_once('=') {
            Some((key, value)) => {
                let key = key.trim().to_string();
                let value = unquote(value.trim()).to_string();
                vars.insert(key, value);
            }
            None => {
                warn!("Skipping malformed env line {}: {}", lineno + 1, line);
            }
        }
    }

    vars
}

/// Strip one matching pair of surrounding quotes.
fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let vars = parse("POSTGRES_USER=admin\nPOSTGRES_PASSWORD=secret\n");
        assert_eq!(vars.get("POSTGRES_USER"), Some(&"admin".to_string()));
        assert_eq!(vars.get("POSTGRES_PASSWORD"), Some(&"secret".to_string()));
    }

    #[test]
    fn test_parse_comments_and_blanks() {
        let vars = parse("# database settings\n\nDB_NAME=app\n  # indented comment\n");
        assert_eq!(vars.len(), 1);
        assert_eq!(vars.get("DB_NAME"), Some(&"app".to_string()));
    }

    #[test]
    fn test_parse_quoted_values() {
        let vars = parse("A=\"hello world\"\nB='single'\nC=\"unbalanced\n");
        assert_eq!(vars.get("A"), Some(&"hello world".to_string()));
        assert_eq!(vars.get("B"), Some(&"single".to_string()));
        assert_eq!(vars.get("C"), Some(&"\"unbalanced".to_string()));
    }

    #[test]
    fn test_parse_skips_malformed_lines() {
        let vars = parse("VALID=1\nNOEQUALS\n");
        assert_eq!(vars.len(), 1);
    }

    #[test]
    fn test_value_may_contain_equals() {
        let vars = parse("JDBC_URL=jdbc:postgresql://db:5432/app?ssl=false\n");
        assert_eq!(
            vars.get("JDBC_URL"),
            Some(&"jdbc:postgresql://db:5432/app?ssl=false".to_string())
        );
    }
}
