//! Secret references in configuration values.
//!
//! - `pass::path/in/store` runs `pass show path/in/store` and keeps the first line
//! - `env::VAR_NAME` reads `$VAR_NAME`
//! - anything else is used as-is

use std::process::Command;

use crate::error::{ClientError, ClientResult};

/// Resolves a value that may be a secret reference.
pub fn resolve(value: &str) -> ClientResult<String> {
    if let Some(path) = value.strip_prefix("pass::") {
        from_pass(path)
    } else if let Some(var) = value.strip_prefix("env::") {
        std::env::var(var)
            .map_err(|_| ClientError::Secret(format!("environment variable `{var}` is not set")))
    } else {
        Ok(value.to_string())
    }
}

/// Returns true if `value` is a reference rather than a literal.
pub fn is_reference(value: &str) -> bool {
    value.starts_with("pass::") || value.starts_with("env::")
}

fn from_pass(path: &str) -> ClientResult<String> {
    let output = Command::new("pass")
        .args(["show", path])
        .output()
        .map_err(|e| ClientError::Secret(format!("failed to run `pass show {path}`: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ClientError::Secret(format!(
            "`pass show {path}` failed ({}): {}",
            output.status,
            stderr.trim()
        )));
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(str::to_string)
        .ok_or_else(|| ClientError::Secret(format!("`pass show {path}` printed nothing")))
}
