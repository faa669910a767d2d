//! Pipeline entry points and the transform they share.
//!
//! - `run_scrape`: fetch a raw report, archive it, transform it, archive the result
//! - `process_raw_file`: offline raw CSV to processed snapshot
//! - `ReportStore::read_processed_waitlist`: latest processed records
//! - `RecordFilter` / `summarize`: consumer-side selection and totals

pub mod codec;
pub mod query;
mod read;
pub mod scrape;
mod table;
pub mod transform;

pub use codec::{ParquetRecord, read_records, write_records};
pub use query::{Dimension, Observation, RecordFilter, summarize};
pub use scrape::{ScrapeSummary, process_raw_file, run_scrape};
pub use table::RawTable;
pub use transform::{transform_transplant, transform_waitlist};
