//! Column redaction for delimited tabular data.
//!
//! Datasets are CSV with a header row. Every cell is opaque text: nothing is
//! parsed as a number or date, so masking never depends on a column's type.
//! A masked column has every cell replaced by [`MASK_TOKEN`]; the header, the
//! column order, and the row order are preserved.

use std::sync::Arc;

use bytes::Bytes;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};

use crate::error::{Error, Result};
use crate::location::BucketName;
use crate::storage::StorageGateway;

/// Replacement value for every cell of a redacted column.
pub const MASK_TOKEN: &str = "***";

/// An in-memory table: header plus data rows, all cells as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Parses CSV bytes. The first record is the header.
    ///
    /// Blank lines are skipped. Rows shorter than the header are padded with
    /// empty cells.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Dataset`] if the input is empty, not UTF-8, or has a
    /// row with more fields than the header.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(raw);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| Error::dataset(format!("failed to read header: {e}")))?
            .iter()
            .map(str::to_string)
            .collect();
        if headers.is_empty() {
            return Err(Error::dataset("no columns to parse from file"));
        }

        let mut rows = Vec::new();
        let mut record = StringRecord::new();
        loop {
            match reader.read_record(&mut record) {
                Ok(true) => {
                    if record.len() > headers.len() {
                        return Err(Error::dataset(format!(
                            "row {} has {} fields, but the header has {}",
                            rows.len() + 1,
                            record.len(),
                            headers.len()
                        )));
                    }
                    let mut row: Vec<String> = record.iter().map(str::to_string).collect();
                    row.resize(headers.len(), String::new());
                    rows.push(row);
                }
                Ok(false) => break,
                Err(e) => return Err(Error::dataset(format!("failed to read row: {e}"))),
            }
        }

        Ok(Self { headers, rows })
    }

    /// Column names, in file order.
    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Data rows, in file order.
    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Replaces every cell of each named column with [`MASK_TOKEN`].
    ///
    /// Names are matched exactly. When the header repeats a name, every
    /// column carrying it is masked. Names absent from the header are
    /// reported, not treated as errors.
    pub fn mask_columns<S: AsRef<str>>(&mut self, columns: &[S]) -> RedactionReport {
        let mut report = RedactionReport {
            rows: self.rows.len(),
            ..RedactionReport::default()
        };

        for column in columns {
            let column = column.as_ref();
            let indices: Vec<usize> = self
                .headers
                .iter()
                .enumerate()
                .filter(|(_, name)| *name == column)
                .map(|(index, _)| index)
                .collect();

            if indices.is_empty() {
                report.missing.push(column.to_string());
                continue;
            }

            for row in &mut self.rows {
                for &index in &indices {
                    if let Some(cell) = row.get_mut(index) {
                        MASK_TOKEN.clone_into(cell);
                    }
                }
            }
            report.masked.push(column.to_string());
        }

        report
    }

    /// Serializes the table as CSV with a `\n` after every record.
    ///
    /// Fields are quoted only when they contain a delimiter, quote, or line
    /// break. No index column is written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Dataset`] if the writer fails.
    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let mut writer = WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());

        writer
            .write_record(&self.headers)
            .map_err(|e| Error::dataset(format!("failed to write header: {e}")))?;
        for row in &self.rows {
            writer
                .write_record(row)
                .map_err(|e| Error::dataset(format!("failed to write row: {e}")))?;
        }

        writer
            .into_inner()
            .map_err(|e| Error::dataset(format!("failed to flush output: {e}")))
    }
}

/// Summary of one masking pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedactionReport {
    /// Requested columns found in the header and masked.
    pub masked: Vec<String>,
    /// Requested columns absent from the header.
    pub missing: Vec<String>,
    /// Number of data rows.
    pub rows: usize,
}

/// Masks the named columns of a CSV payload and re-serializes it.
///
/// # Errors
///
/// Returns [`Error::Dataset`] if the payload cannot be parsed or written.
pub fn redact_csv<S: AsRef<str>>(raw: &[u8], columns: &[S]) -> Result<(Vec<u8>, RedactionReport)> {
    let mut table = Table::parse(raw)?;
    let report = table.mask_columns(columns);
    Ok((table.to_csv()?, report))
}

/// A redacted dataset ready to upload.
#[derive(Debug, Clone)]
pub struct RedactedObject {
    /// UTF-8 CSV bytes.
    pub data: Bytes,
    /// What the masking pass did.
    pub report: RedactionReport,
}

/// Fetches datasets through a gateway and masks their columns.
pub struct Redactor {
    gateway: Arc<dyn StorageGateway>,
}

impl Redactor {
    /// Creates a redactor reading through `gateway`.
    #[must_use]
    pub fn new(gateway: Arc<dyn StorageGateway>) -> Self {
        Self { gateway }
    }

    /// Fetches `source_key` from `source_location`, masks `columns`, and
    /// returns the serialized result.
    ///
    /// Failures are logged with their cause before being returned.
    ///
    /// # Errors
    ///
    /// Returns the gateway error if the fetch fails, or [`Error::Dataset`]
    /// if the object is not a well-formed table.
    pub async fn redact<S: AsRef<str>>(
        &self,
        source_location: &BucketName,
        source_key: &str,
        columns: &[S],
    ) -> Result<RedactedObject> {
        let result = match self.gateway.get(source_location, source_key).await {
            Ok(raw) => redact_csv(&raw, columns),
            Err(e) => Err(e),
        };

        match result {
            Ok((data, report)) => {
                for column in &report.masked {
                    tracing::info!(column = %column, "obfuscating field");
                }
                for column in &report.missing {
                    tracing::warn!(column = %column, "field not found in dataset columns");
                }
                tracing::info!(rows = report.rows, "obfuscation complete");
                Ok(RedactedObject {
                    data: Bytes::from(data),
                    report,
                })
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    location = %source_location,
                    key = source_key,
                    "failed to process file"
                );
                Err(e)
            }
        }
    }
}
