//! Columnar encoding of processed record sets.
//!
//! Categories are stored by canonical label and re-validated on read, so a
//! snapshot written with an unknown label fails to load rather than
//! silently widening a dimension.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime};
use parquet::basic::Compression;
use parquet::data_type::{ByteArray, ByteArrayType, Int64Type};
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::file::writer::SerializedFileWriter;
use parquet::record::{Row, RowAccessor};
use parquet::schema::parser::parse_message_type;

use crate::error::{AppError, Result};
use crate::models::{TransplantRecord, WaitlistRecord};

/// Values of a single column, in row order.
#[derive(Debug)]
pub enum ColumnData {
    Text(Vec<ByteArray>),
    Int(Vec<i64>),
}

/// A record type with a fixed flat parquet schema.
pub trait ParquetRecord: Sized {
    /// Message type in parquet schema syntax.
    const SCHEMA: &'static str;
    /// Leaf column names in schema order.
    const COLUMNS: &'static [&'static str];

    /// Split records into one `ColumnData` per schema column.
    fn to_columns(records: &[Self]) -> Vec<ColumnData>;

    /// Rebuild and validate a record from a decoded row.
    fn from_row(row: &Row) -> Result<Self>;
}

fn text<'a>(values: impl Iterator<Item = &'a str>) -> ColumnData {
    ColumnData::Text(values.map(ByteArray::from).collect())
}

fn to_millis(dt: &NaiveDateTime) -> i64 {
    dt.and_utc().timestamp_millis()
}

fn from_millis(ms: i64) -> Result<NaiveDateTime> {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| AppError::data_format("retrieved_dt", format!("{ms} is out of range")))
}

fn positive_count(raw: i64) -> Result<u64> {
    u64::try_from(raw)
        .ok()
        .filter(|count| *count > 0)
        .ok_or_else(|| AppError::data_format("count", format!("{raw} is not a positive count")))
}

impl ParquetRecord for WaitlistRecord {
    const SCHEMA: &'static str = "
        message waitlist_record {
            REQUIRED BYTE_ARRAY center_code (UTF8);
            REQUIRED BYTE_ARRAY age (UTF8);
            REQUIRED BYTE_ARRAY waiting_time (UTF8);
            REQUIRED BYTE_ARRAY status (UTF8);
            REQUIRED INT64 count;
            REQUIRED INT64 retrieved_dt (TIMESTAMP_MILLIS);
        }
    ";
    const COLUMNS: &'static [&'static str] = &[
        "center_code",
        "age",
        "waiting_time",
        "status",
        "count",
        "retrieved_dt",
    ];

    fn to_columns(records: &[Self]) -> Vec<ColumnData> {
        vec![
            text(records.iter().map(|r| r.center_code.as_str())),
            text(records.iter().map(|r| r.age.label())),
            text(records.iter().map(|r| r.waiting_time.label())),
            text(records.iter().map(|r| r.status.label())),
            ColumnData::Int(records.iter().map(|r| r.count as i64).collect()),
            ColumnData::Int(records.iter().map(|r| to_millis(&r.retrieved_dt)).collect()),
        ]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            center_code: row.get_string(0)?.clone(),
            age: row.get_string(1)?.parse()?,
            waiting_time: row.get_string(2)?.parse()?,
            status: row.get_string(3)?.parse()?,
            count: positive_count(row.get_long(4)?)?,
            retrieved_dt: from_millis(row.get_timestamp_millis(5)?)?,
        })
    }
}

impl ParquetRecord for TransplantRecord {
    const SCHEMA: &'static str = "
        message transplant_record {
            REQUIRED BYTE_ARRAY center_code (UTF8);
            REQUIRED BYTE_ARRAY age (UTF8);
            REQUIRED BYTE_ARRAY status (UTF8);
            REQUIRED INT64 count;
            REQUIRED INT64 retrieved_dt (TIMESTAMP_MILLIS);
        }
    ";
    const COLUMNS: &'static [&'static str] =
        &["center_code", "age", "status", "count", "retrieved_dt"];

    fn to_columns(records: &[Self]) -> Vec<ColumnData> {
        vec![
            text(records.iter().map(|r| r.center_code.as_str())),
            text(records.iter().map(|r| r.age.label())),
            text(records.iter().map(|r| r.status.label())),
            ColumnData::Int(records.iter().map(|r| r.count as i64).collect()),
            ColumnData::Int(records.iter().map(|r| to_millis(&r.retrieved_dt)).collect()),
        ]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            center_code: row.get_string(0)?.clone(),
            age: row.get_string(1)?.parse()?,
            status: row.get_string(2)?.parse()?,
            count: positive_count(row.get_long(3)?)?,
            retrieved_dt: from_millis(row.get_timestamp_millis(4)?)?,
        })
    }
}

/// Write `records` as a single SNAPPY-compressed row group.
///
/// An empty record set produces a valid file with no row groups.
pub fn write_records<R: ParquetRecord>(path: &Path, records: &[R]) -> Result<()> {
    let schema = Arc::new(parse_message_type(R::SCHEMA)?);
    let props = Arc::new(
        WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build(),
    );
    let file = File::create(path)?;
    let mut writer = SerializedFileWriter::new(file, schema, props)?;

    if !records.is_empty() {
        let mut columns = R::to_columns(records).into_iter();
        let mut row_group = writer.next_row_group()?;
        while let Some(mut column) = row_group.next_column()? {
            match columns.next() {
                Some(ColumnData::Text(values)) => {
                    column
                        .typed::<ByteArrayType>()
                        .write_batch(&values, None, None)?;
                }
                Some(ColumnData::Int(values)) => {
                    column.typed::<Int64Type>().write_batch(&values, None, None)?;
                }
                None => {
                    return Err(AppError::data_format(
                        path.display().to_string(),
                        "schema has more columns than the record type",
                    ));
                }
            }
            column.close()?;
        }
        row_group.close()?;
    }

    writer.close()?;
    log::debug!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

/// Read every row of a processed snapshot, validating the schema first.
pub fn read_records<R: ParquetRecord>(path: &Path) -> Result<Vec<R>> {
    let reader = SerializedFileReader::new(File::open(path)?)?;

    let found: Vec<String> = reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .columns()
        .iter()
        .map(|column| column.name().to_string())
        .collect();
    if found != R::COLUMNS {
        return Err(AppError::data_format(
            path.display().to_string(),
            format!("expected columns {:?}, found {:?}", R::COLUMNS, found),
        ));
    }

    let num_rows = reader.metadata().file_metadata().num_rows().max(0) as usize;
    let mut records = Vec::with_capacity(num_rows);
    for row in reader.get_row_iter(None)? {
        records.push(R::from_row(&row?)?);
    }

    log::debug!("Read {} records from {}", records.len(), path.display());
    Ok(records)
}
