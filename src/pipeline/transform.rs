//! Wide-to-long transform of raw waitlist and transplant reports.
//!
//! Layout of a raw table:
//!
//! ```text
//! col 0        col 1       [col 2]          col 3..                 trailing
//! center (ff)  age (ff)    [waiting time]   one column per status   unlabeled
//! ```
//!
//! `ff` columns are merged cells in the source and arrive blank below their
//! first row. Unlabeled non-identity columns are discarded. A label that is
//! missing from its lookup table drops the row; a count that is not an
//! integer aborts the whole transform.

use chrono::NaiveDateTime;

use crate::error::{AppError, Result};
use crate::models::{AgeBand, PriorityStatus, TransplantRecord, WaitingTime, WaitlistRecord};
use crate::pipeline::RawTable;

/// Aggregate row emitted by the upstream report alongside real centers.
pub const ALL_CENTERS: &str = "All Centers";

/// Columns forward-filled to repair merged header cells.
const FILLED_COLUMNS: usize = 2;

/// Retain only the text before the first `-` site qualifier.
pub fn clean_center_code(raw: &str) -> &str {
    raw.split('-').next().unwrap_or(raw).trim()
}

/// Parse comma-grouped integer text such as `"1,234"`.
pub fn parse_count(raw: &str) -> Option<i64> {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    cleaned.trim().parse().ok()
}

/// Report variant, by number of leading identity columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// center, age, waiting time
    Waitlist,
    /// center, age
    Transplant,
}

impl Layout {
    fn identity_columns(&self) -> usize {
        match self {
            Layout::Waitlist => 3,
            Layout::Transplant => 2,
        }
    }
}

/// One melted `(row, status column)` cell with its dimensions recoded.
#[derive(Debug)]
struct MeltedCell {
    center_code: String,
    age: Option<AgeBand>,
    waiting_time: Option<WaitingTime>,
    status: Option<PriorityStatus>,
    count: i64,
}

impl MeltedCell {
    fn is_kept(&self, layout: Layout) -> bool {
        let waiting_resolved = layout == Layout::Transplant || self.waiting_time.is_some();
        !self.center_code.is_empty()
            && self.age.is_some()
            && self.status.is_some()
            && waiting_resolved
            && self.count > 0
    }
}

/// Transform a raw waitlist table into canonical records.
pub fn transform_waitlist(
    table: &RawTable,
    retrieved_at: NaiveDateTime,
) -> Result<Vec<WaitlistRecord>> {
    let cells = melt(table, Layout::Waitlist)?;
    Ok(cells
        .into_iter()
        .filter(|cell| cell.is_kept(Layout::Waitlist))
        .filter_map(|cell| {
            Some(WaitlistRecord {
                age: cell.age?,
                waiting_time: cell.waiting_time?,
                status: cell.status?,
                count: u64::try_from(cell.count).ok()?,
                center_code: cell.center_code,
                retrieved_dt: retrieved_at,
            })
        })
        .collect())
}

/// Transform a raw "transplants performed" table into canonical records.
pub fn transform_transplant(
    table: &RawTable,
    retrieved_at: NaiveDateTime,
) -> Result<Vec<TransplantRecord>> {
    let cells = melt(table, Layout::Transplant)?;
    Ok(cells
        .into_iter()
        .filter(|cell| cell.is_kept(Layout::Transplant))
        .filter_map(|cell| {
            Some(TransplantRecord {
                age: cell.age?,
                status: cell.status?,
                count: u64::try_from(cell.count).ok()?,
                center_code: cell.center_code,
                retrieved_dt: retrieved_at,
            })
        })
        .collect())
}

/// Forward-fill, recode and unpivot every status cell, parsing its count.
fn melt(table: &RawTable, layout: Layout) -> Result<Vec<MeltedCell>> {
    let id_columns = layout.identity_columns();
    if table.headers.len() <= id_columns {
        return Err(AppError::data_format(
            "header",
            format!(
                "expected {} identity columns followed by status columns, found {} columns",
                id_columns,
                table.headers.len()
            ),
        ));
    }

    let status_columns: Vec<(usize, &str, Option<PriorityStatus>)> = table
        .headers
        .iter()
        .enumerate()
        .skip(id_columns)
        .map(|(idx, header)| (idx, header.trim()))
        .filter(|(_, header)| !header.is_empty())
        .map(|(idx, header)| (idx, header, PriorityStatus::from_source_label(header)))
        .collect();

    if status_columns.is_empty() {
        return Err(AppError::data_format("header", "no status columns"));
    }
    for (_, header, status) in &status_columns {
        if status.is_none() {
            log::debug!("Status column '{}' has no category; its cells are dropped", header);
        }
    }

    let mut filled: [String; FILLED_COLUMNS] = Default::default();
    let mut cells = Vec::with_capacity(table.rows.len() * status_columns.len());

    for row in 0..table.rows.len() {
        for (col, value) in filled.iter_mut().enumerate() {
            let cell = table.cell(row, col).trim();
            if !cell.is_empty() {
                *value = cell.to_string();
            }
        }

        let [center, age] = &filled;
        if center == ALL_CENTERS {
            continue;
        }
        let center_code = clean_center_code(center).to_string();
        let age = AgeBand::from_source_label(age);
        let waiting_time = match layout {
            Layout::Waitlist => WaitingTime::from_source_label(table.cell(row, 2)),
            Layout::Transplant => None,
        };

        for (col, header, status) in &status_columns {
            let raw = table.cell(row, *col);
            let count = parse_count(raw).ok_or_else(|| {
                AppError::data_format(
                    format!("row {}, column '{}'", row + 2, header),
                    format!("'{raw}' is not an integer count"),
                )
            })?;
            cells.push(MeltedCell {
                center_code: center_code.clone(),
                age,
                waiting_time,
                status: *status,
                count,
            });
        }
    }

    log::debug!(
        "Melted {} rows x {} status columns into {} cells",
        table.rows.len(),
        status_columns.len(),
        cells.len()
    );
    Ok(cells)
}
