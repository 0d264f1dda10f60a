//! Literal rendering helpers.

use std::collections::BTreeMap;

use crate::value::Value;

/// Renders `value` as an inline dialect literal.
pub fn value_to_string(value: &Value) -> String {
    value.to_string()
}

/// Inlines `:name` tokens of `expression` whose params are known. String
/// params are single-quoted with `'` and `\` escaped; unknown names and null
/// params are left as is.
pub fn apply_params(expression: &str, params: &BTreeMap<String, Value>) -> String {
    let mut out = String::with_capacity(expression.len());
    let mut rest = expression;
    while let Some(pos) = rest.find(':') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let name_len = token_len(after);
        let name = &after[..name_len];
        match params.get(name) {
            Some(value) if name_len > 0 && !value.is_null() => match value {
                Value::String(s) => {
                    out.push('\'');
                    for c in s.chars() {
                        if matches!(c, '\'' | '\\') {
                            out.push('\\');
                        }
                        out.push(c);
                    }
                    out.push('\'');
                }
                other => out.push_str(&other.to_string()),
            },
            _ => {
                out.push(':');
                out.push_str(name);
            }
        }
        rest = &after[name_len..];
    }
    out.push_str(rest);
    out
}

/// Length of a `[A-Za-z][A-Za-z0-9_]*` token at the start of `text`.
fn token_len(text: &str) -> usize {
    let mut chars = text.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_alphabetic() => {}
        _ => return 0,
    }
    chars
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}
