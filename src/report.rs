// src/report.rs

//! Report identity and the remote path codec.
//!
//! Every snapshot lives at
//!
//! ```text
//! {environment}/{YYYY-MM-DD}/{kind}-{status}-{YYYYMMDDHHMMSS}.{ext}
//! ```
//!
//! and the path alone is enough to rebuild its [`ReportIdentity`].

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Environment;

/// Timestamp layout inside filenames.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Date layout of the partition directory.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Drop sub-second precision.
pub fn truncate_to_second(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_nanosecond(0).unwrap_or(dt)
}

/// Which upstream report a snapshot captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Waitlist,
    Transplant,
}

impl ReportKind {
    pub const ALL: [ReportKind; 2] = [ReportKind::Waitlist, ReportKind::Transplant];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Waitlist => "waitlist",
            ReportKind::Transplant => "transplant",
        }
    }
}

/// Processing stage of a snapshot, bound to its file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Raw,
    Processed,
}

impl ReportStatus {
    pub const ALL: [ReportStatus; 2] = [ReportStatus::Raw, ReportStatus::Processed];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Raw => "raw",
            ReportStatus::Processed => "processed",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportStatus::Raw => "csv",
            ReportStatus::Processed => "parquet",
        }
    }
}

macro_rules! label_enum_impls {
    ($name:ident, $what:literal) => {
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, String> {
                $name::ALL
                    .into_iter()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| format!("unknown report {} '{}'", $what, s))
            }
        }
    };
}

label_enum_impls!(ReportKind, "kind");
label_enum_impls!(ReportStatus, "status");

/// Immutable identity of one archived snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportIdentity {
    pub kind: ReportKind,
    pub status: ReportStatus,
    /// Retrieval wall-clock time, second precision
    pub retrieved_at: NaiveDateTime,
    pub environment: Environment,
}

impl ReportIdentity {
    /// Build an identity; sub-second precision is discarded.
    pub fn new(
        kind: ReportKind,
        status: ReportStatus,
        retrieved_at: NaiveDateTime,
        environment: Environment,
    ) -> Self {
        Self {
            kind,
            status,
            retrieved_at: truncate_to_second(retrieved_at),
            environment,
        }
    }

    /// Same capture at another processing stage.
    pub fn with_status(&self, status: ReportStatus) -> Self {
        Self { status, ..*self }
    }

    /// `{kind}-{status}-{timestamp}.{ext}`
    pub fn filename(&self) -> String {
        format!(
            "{}-{}-{}.{}",
            self.kind,
            self.status,
            self.retrieved_at.format(TIMESTAMP_FORMAT),
            self.status.extension()
        )
    }

    /// `{environment}/{date}/{filename}`
    pub fn remote_path(&self) -> String {
        format!(
            "{}/{}/{}",
            self.environment,
            self.retrieved_at.format(DATE_FORMAT),
            self.filename()
        )
    }

    /// Alias of [`remote_path`](Self::remote_path).
    pub fn encode(&self) -> String {
        self.remote_path()
    }

    /// Rebuild an identity from a remote path.
    ///
    /// The date directory is informational and is not checked against the
    /// timestamp.
    pub fn decode(path: &str) -> Result<Self> {
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        let [environment, _date, filename] = segments.as_slice() else {
            return Err(AppError::malformed_path(
                path,
                "expected {environment}/{date}/{filename}",
            ));
        };

        let environment = Environment::from_str(environment)
            .map_err(|_| AppError::malformed_path(path, format!("unknown environment '{environment}'")))?;

        let Some((stem, extension)) = filename.split_once('.') else {
            return Err(AppError::malformed_path(path, "filename has no extension"));
        };

        let parts: Vec<&str> = stem.split('-').collect();
        let [kind, status, timestamp] = parts.as_slice() else {
            return Err(AppError::malformed_path(
                path,
                "filename must be {kind}-{status}-{timestamp}.{ext}",
            ));
        };

        let kind: ReportKind = kind.parse().map_err(|e| AppError::malformed_path(path, e))?;
        let status: ReportStatus = status
            .parse()
            .map_err(|e| AppError::malformed_path(path, e))?;

        if extension != status.extension() {
            return Err(AppError::malformed_path(
                path,
                format!(
                    "extension '{}' does not match status '{}' (expected '{}')",
                    extension,
                    status,
                    status.extension()
                ),
            ));
        }

        let retrieved_at = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
            .map_err(|e| AppError::malformed_path(path, format!("bad timestamp '{timestamp}': {e}")))?;
        if retrieved_at.format(TIMESTAMP_FORMAT).to_string() != *timestamp {
            return Err(AppError::malformed_path(
                path,
                format!("non-canonical timestamp '{timestamp}'"),
            ));
        }

        Ok(Self {
            kind,
            status,
            retrieved_at,
            environment,
        })
    }
}

impl fmt::Display for ReportIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.remote_path())
    }
}

/// Which snapshots a listing should consider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportSelector {
    pub kind: ReportKind,
    pub status: ReportStatus,
    /// Restrict to one partition date
    pub date: Option<NaiveDate>,
}

impl ReportSelector {
    pub fn new(kind: ReportKind, status: ReportStatus) -> Self {
        Self {
            kind,
            status,
            date: None,
        }
    }

    /// Latest processed waitlist, the reader's default.
    pub fn processed_waitlist() -> Self {
        Self::new(ReportKind::Waitlist, ReportStatus::Processed)
    }

    pub fn on(mut self, date: Option<NaiveDate>) -> Self {
        self.date = date;
        self
    }

    /// Glob over the archive for this selector in `environment`.
    pub fn glob(&self, environment: Environment) -> String {
        let date = self
            .date
            .map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_else(|| "*".to_string());
        format!(
            "{}/{}/{}-{}-*.{}",
            environment,
            date,
            self.kind,
            self.status,
            self.status.extension()
        )
    }
}

impl fmt::Display for ReportSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind, self.status)?;
        if let Some(date) = self.date {
            write!(f, " on {}", date.format(DATE_FORMAT))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn encodes_documented_layout() {
        let id = ReportIdentity::new(
            ReportKind::Waitlist,
            ReportStatus::Raw,
            at(2025, 3, 7, 6, 5, 4),
            Environment::Prod,
        );
        assert_eq!(id.filename(), "waitlist-raw-20250307060504.csv");
        assert_eq!(
            id.remote_path(),
            "prod/2025-03-07/waitlist-raw-20250307060504.csv"
        );
    }

    #[test]
    fn round_trips_every_combination() {
        let times = [
            at(2024, 1, 1, 0, 0, 0),
            at(2024, 2, 29, 23, 59, 59),
            at(1999, 12, 31, 12, 30, 1),
        ];
        for env in Environment::ALL {
            for kind in ReportKind::ALL {
                for status in ReportStatus::ALL {
                    for time in times {
                        let id = ReportIdentity::new(kind, status, time, env);
                        assert_eq!(ReportIdentity::decode(&id.encode()).unwrap(), id);
                    }
                }
            }
        }
    }

    #[test]
    fn new_truncates_subseconds() {
        let precise = at(2025, 1, 1, 1, 1, 1)
            .with_nanosecond(123_456_789)
            .unwrap();
        let id = ReportIdentity::new(
            ReportKind::Waitlist,
            ReportStatus::Processed,
            precise,
            Environment::Dev,
        );
        assert_eq!(id.retrieved_at, at(2025, 1, 1, 1, 1, 1));
        assert_eq!(ReportIdentity::decode(&id.encode()).unwrap(), id);
    }

    #[test]
    fn date_directory_is_informational() {
        let id =
            ReportIdentity::decode("dev/1970-01-01/waitlist-processed-20250102030405.parquet")
                .unwrap();
        assert_eq!(id.retrieved_at, at(2025, 1, 2, 3, 4, 5));
    }

    #[test]
    fn rejects_malformed_paths() {
        let bad = [
            "dev/2025-01-01/waitlist-raw.csv",
            "dev/2025-01-01/waitlist-raw-2025-0101.csv",
            "dev/2025-01-01/donors-raw-20250101000000.csv",
            "dev/2025-01-01/waitlist-cooked-20250101000000.csv",
            "dev/2025-01-01/waitlist-raw-20251301000000.csv",
            "dev/2025-01-01/waitlist-raw-20250101000000",
            "dev/2025-01-01/waitlist-raw-20250101000000.parquet",
            "staging/2025-01-01/waitlist-raw-20250101000000.csv",
            "waitlist-raw-20250101000000.csv",
        ];
        for path in bad {
            assert!(
                matches!(
                    ReportIdentity::decode(path),
                    Err(AppError::MalformedPath { .. })
                ),
                "accepted {path}"
            );
        }
    }

    #[test]
    fn selector_globs() {
        let selector = ReportSelector::processed_waitlist();
        assert_eq!(
            selector.glob(Environment::Dev),
            "dev/*/waitlist-processed-*.parquet"
        );
        let pinned = ReportSelector::new(ReportKind::Waitlist, ReportStatus::Raw)
            .on(NaiveDate::from_ymd_opt(2025, 6, 1));
        assert_eq!(pinned.glob(Environment::Ci), "ci/2025-06-01/waitlist-raw-*.csv");
        assert_eq!(pinned.to_string(), "waitlist-raw on 2025-06-01");
    }
}
