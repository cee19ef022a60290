//! `${VAR}` / `${VAR:-default}` environment-variable interpolation for
//! config YAML (spec §6).

use crate::error::ConfigError;

/// Replaces every `${VAR}` or `${VAR:-default}` occurrence in `input` by
/// calling `lookup` for `VAR`. A bare `${VAR}` with no default and no value
/// from `lookup` is a [`ConfigError::MissingEnvVar`].
pub fn interpolate_env(
    input: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' && i + 1 < bytes.len() && bytes[i + 1] == b'{' {
            if let Some(close) = input[i + 2..].find('}') {
                let inner = &input[i + 2..i + 2 + close];
                let (var, default) = match inner.split_once(":-") {
                    Some((var, default)) => (var, Some(default)),
                    None => (inner, None),
                };
                match lookup(var).or_else(|| default.map(str::to_string)) {
                    Some(value) => out.push_str(&value),
                    None => return Err(ConfigError::MissingEnvVar(var.to_string())),
                }
                i = i + 2 + close + 1;
                continue;
            }
        }
        let ch = input[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    Ok(out)
}
