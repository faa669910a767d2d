//! Minimal `*` glob matching for archive keys.

use regex::Regex;

use crate::error::{AppError, Result};

/// A key pattern where `*` matches any run of characters except `/`.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    pattern: String,
    regex: Regex,
}

impl GlobPattern {
    pub fn new(pattern: impl Into<String>) -> Result<Self> {
        let pattern = pattern.into();
        let body = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("[^/]*");
        let regex = Regex::new(&format!("^{body}$"))
            .map_err(|e| AppError::config(format!("Invalid glob '{pattern}': {e}")))?;
        Ok(Self { pattern, regex })
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }

    /// Longest literal prefix, usable as a server-side listing prefix.
    pub fn literal_prefix(&self) -> &str {
        match self.pattern.find('*') {
            Some(idx) => &self.pattern[..idx],
            None => &self.pattern,
        }
    }
}
