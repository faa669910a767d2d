//! Transplant center reference data.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// A transplant center with geocoded coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    /// Short facility code, e.g. "CACS"
    pub code: String,
    pub name: String,
    pub city: String,
    pub state: String,
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
}

impl Facility {
    /// Human-readable label: `CODE - Name (City, ST)`.
    pub fn display(&self) -> String {
        format!("{} - {} ({}, {})", self.code, self.name, self.city, self.state)
    }

    /// Parse one JSON object per non-blank line.
    pub fn parse_jsonl(content: &str) -> Result<Vec<Self>> {
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| {
                serde_json::from_str(line).map_err(|e| {
                    AppError::data_format(format!("facilities line {}", idx + 1), e)
                })
            })
            .collect()
    }

    /// Load facilities from a JSONL file.
    pub fn load_all(path: impl AsRef<Path>) -> Result<Vec<Self>> {
        let content = fs::read_to_string(path)?;
        Self::parse_jsonl(&content)
    }
}
