//! CSV artifact writer
//!
//! Records from different slices need not share a schema, so the header is the
//! union of field names in first-seen order and missing fields are written as
//! empty cells. Output goes to a `.part` file that is renamed into place on
//! close, so an interrupted write never leaves a complete-looking artifact.

use crate::Record;
use csv::{Reader, Writer};
use serde_json::Value;
use std::collections::HashSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{OutputError, OutputResult, OutputWriter};

const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Union of field names across `records`, in first-seen order
pub fn collect_columns(records: &[Record]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for record in records {
        for key in record.keys() {
            if seen.insert(key.as_str()) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// CSV writer with a fixed column set
pub struct CsvRecordWriter {
    writer: Writer<BufWriter<File>>,
    columns: Vec<String>,
    staging: PathBuf,
    target: PathBuf,
    rows_written: usize,
}

impl CsvRecordWriter {
    /// Create a writer for `path` and write the header row
    pub fn new<P: AsRef<Path>>(path: P, columns: Vec<String>) -> OutputResult<Self> {
        let target = path.as_ref().to_path_buf();
        let staging = part_path(&target);

        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| OutputError::IoError(format!("Failed to create directory: {e}")))?;
        }

        let file = File::create(&staging)
            .map_err(|e| OutputError::IoError(format!("Failed to create file: {e}")))?;
        let mut writer = Writer::from_writer(BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, file));

        writer
            .write_record(&columns)
            .map_err(|e| OutputError::CsvError(format!("Failed to write header: {e}")))?;

        debug!(path = %target.display(), columns = columns.len(), "CSV writer created");

        Ok(Self {
            writer,
            columns,
            staging,
            target,
            rows_written: 0,
        })
    }

    /// Write one record; fields outside the column set are dropped
    pub fn write_record(&mut self, record: &Record) -> OutputResult<()> {
        let row = self.columns.iter().map(|column| cell(record.get(column)));
        self.writer
            .write_record(row)
            .map_err(|e| OutputError::CsvError(format!("Failed to write row: {e}")))?;
        self.rows_written += 1;
        Ok(())
    }

    /// Rows written so far, excluding the header
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }
}

impl OutputWriter for CsvRecordWriter {
    fn flush(&mut self) -> OutputResult<()> {
        self.writer
            .flush()
            .map_err(|e| OutputError::IoError(format!("Failed to flush: {e}")))
    }

    fn close(mut self) -> OutputResult<()> {
        self.flush()?;

        let buf_writer = self
            .writer
            .into_inner()
            .map_err(|e| OutputError::IoError(format!("Failed to get inner writer: {e}")))?;
        let file = buf_writer
            .into_inner()
            .map_err(|e| OutputError::IoError(format!("Failed to get file handle: {e}")))?;
        file.sync_all()
            .map_err(|e| OutputError::IoError(format!("Failed to sync file: {e}")))?;

        std::fs::rename(&self.staging, &self.target)
            .map_err(|e| OutputError::IoError(format!("Failed to move artifact into place: {e}")))?;

        info!(
            path = %self.target.display(),
            rows = self.rows_written,
            "CSV artifact written"
        );
        Ok(())
    }
}

/// Write `records` to `path` as one CSV; returns the number of data rows
pub fn write_records_csv(path: &Path, records: &[Record]) -> OutputResult<usize> {
    let mut writer = CsvRecordWriter::new(path, collect_columns(records))?;
    for record in records {
        writer.write_record(record)?;
    }
    let rows = writer.rows_written();
    writer.close()?;
    Ok(rows)
}

/// Read a CSV written by [`write_records_csv`] back into records.
///
/// Every cell comes back as a string, which writes out unchanged.
pub fn read_records_csv(path: &Path) -> OutputResult<Vec<Record>> {
    let mut reader = Reader::from_path(path)
        .map_err(|e| OutputError::IoError(format!("Failed to open {}: {e}", path.display())))?;
    let headers = reader
        .headers()
        .map_err(|e| OutputError::CsvError(format!("Failed to read header: {e}")))?
        .clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| OutputError::CsvError(format!("Failed to read row: {e}")))?;
        let record: Record = headers
            .iter()
            .zip(row.iter())
            .map(|(column, value)| (column.to_string(), Value::String(value.to_string())))
            .collect();
        records.push(record);
    }
    debug!(path = %path.display(), rows = records.len(), "CSV read back");
    Ok(records)
}
