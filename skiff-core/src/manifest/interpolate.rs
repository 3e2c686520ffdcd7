//! Two-pass `${VAR}` placeholder resolution.
//!
//! Pass one scans a value and collects placeholder names; pass two
//! substitutes from a typed key-value map. Any reference to a name absent
//! from the map is an error — substitution fails closed rather than
//! emitting an empty string.
//!
//! `$$` escapes a literal `$`. Only the braced form `${NAME}` is
//! recognized; a bare `$WORD` passes through untouched.

use std::collections::HashMap;

/// A failure during placeholder resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterpolateError {
    /// Placeholder names a variable missing from the source map.
    Undefined(String),
    /// `${` without a closing `}`.
    Unterminated,
}

/// Collect placeholder names referenced by `value`, in order of appearance.
pub fn scan(value: &str) -> Result<Vec<String>, InterpolateError> {
    let mut names = Vec::new();
    walk(value, |name| {
        names.push(name.to_string());
        Ok(String::new())
    })?;
    Ok(names)
}

/// Substitute every placeholder in `value` from `vars`.
pub fn substitute(
    value: &str,
    vars: &HashMap<String, String>,
) -> Result<String, InterpolateError> {
    walk(value, |name| {
        vars.get(name)
            .cloned()
            .ok_or_else(|| InterpolateError::Undefined(name.to_string()))
    })
}

/// Shared scanner: calls `resolve` for each placeholder and splices the
/// returned text into the output.
fn walk(
    value: &str,
    mut resolve: impl FnMut(&str) -> Result<String, InterpolateError>,
) -> Result<String, InterpolateError> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        match chars.peek() {
            Some((_, '$')) => {
                chars.next();
                out.push('$');
            }
            Some((start, '{')) => {
                let start = start + 1;
                chars.next();
                let mut end = None;
                for (i, c) in chars.by_ref() {
                    if c == '}' {
                        end = Some(i);
                        break;
                    }
                }
                let end = end.ok_or(InterpolateError::Unterminated)?;
                out.push_str(&resolve(&value[start..end])?);
            }
            _ => out.push('$'),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_substitute_basic() {
        let out = substitute("user=${USER}", &vars(&[("USER", "admin")])).unwrap();
        assert_eq!(out, "user=admin");
    }

    #[test]
    fn test_substitute_multiple() {
        let out = substitute(
            "${A}:${B}/${A}",
            &vars(&[("A", "x"), ("B", "y")]),
        )
        .unwrap();
        assert_eq!(out, "x:y/x");
    }

    #[test]
    fn test_undefined_fails_closed() {
        let err = substitute("pw=${POSTES_USER}", &vars(&[("POSTGRES_USER", "admin")]));
        assert_eq!(err, Err(InterpolateError::Undefined("POSTES_USER".to_string())));
    }

    #[test]
    fn test_empty_defined_value_substitutes() {
        let out = substitute("x=${EMPTY}", &vars(&[("EMPTY", "")])).unwrap();
        assert_eq!(out, "x=");
    }

    #[test]
    fn test_dollar_escape() {
        let out = substitute("cost=$$5 and ${V}", &vars(&[("V", "v")])).unwrap();
        assert_eq!(out, "cost=$5 and v");
    }

    #[test]
    fn test_bare_dollar_passes_through() {
        let out = substitute("a$b $ c", &vars(&[])).unwrap();
        assert_eq!(out, "a$b $ c");
    }

    #[test]
    fn test_unterminated_placeholder() {
        assert_eq!(substitute("${OOPS", &vars(&[])), Err(InterpolateError::Unterminated));
    }

    #[test]
    fn test_scan_collects_names() {
        let names = scan("${A} then ${B} then ${A}").unwrap();
        assert_eq!(names, vec!["A", "B", "A"]);
    }
}
