//! Pull-based export streaming.
//!
//! An [`ExportStream`] turns a finished report payload into caller-sized byte
//! chunks. The stream owns a small internal buffer: each read encodes just
//! enough rows to satisfy the requested length, hands back exactly what was
//! asked for, and keeps the remainder for the next read. Memory usage is
//! bounded by the chunk size plus one encoded row, regardless of row count.
//!
//! `csv` and `ndjson` encode row by row. `json` serializes the data rows as
//! one document, materialized up front; it is best-effort for moderate result
//! sizes.

use serde_json::Value;
use std::fmt;

use crate::report::{ColumnSpec, ReportResult, Row};

/// Default chunk size for export reads, in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
    Ndjson,
}

impl ExportFormat {
    /// Case-insensitive parse; anything unrecognized is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            "ndjson" => Some(Self::Ndjson),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Ndjson => "ndjson",
        }
    }

    /// Content type for HTTP delivery.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Csv => "text/csv; charset=utf-8",
            Self::Json => "application/json",
            Self::Ndjson => "application/x-ndjson",
        }
    }
}

enum Producer {
    /// Entire payload encoded up front (json).
    Whole(Option<Vec<u8>>),
    /// Row-at-a-time encoder (csv, ndjson).
    Rows(RowProducer),
}

impl Producer {
    fn next_piece(&mut self) -> Option<Vec<u8>> {
        match self {
            Self::Whole(payload) => payload.take(),
            Self::Rows(rows) => rows.next_piece(),
        }
    }
}

struct RowProducer {
    format: ExportFormat,
    columns: Vec<ColumnSpec>,
    rows: std::vec::IntoIter<Row>,
    header_pending: bool,
}

impl RowProducer {
    fn next_piece(&mut self) -> Option<Vec<u8>> {
        if self.header_pending {
            self.header_pending = false;
            if !self.columns.is_empty() {
                return Some(encode_csv_line(
                    self.columns.iter().map(|c| c.key.clone()),
                ));
            }
        }
        let row = self.rows.next()?;
        match self.format {
            ExportFormat::Csv => Some(encode_csv_line(
                self.columns.iter().map(|c| csv_field(row.get(&c.key))),
            )),
            ExportFormat::Ndjson => {
                let mut line = serde_json::to_vec(&row).unwrap_or_default();
                line.push(b'\n');
                Some(line)
            }
            // Json never reaches the row producer.
            ExportFormat::Json => None,
        }
    }
}

/// Byte stream over an exported report.
pub struct ExportStream {
    producer: Producer,
    buffer: Vec<u8>,
    chunk_size: usize,
}

impl ExportStream {
    /// Build a stream over a finished result. Columns fall back to the first
    /// data row when the result declares none.
    pub fn new(result: ReportResult, format: ExportFormat) -> Self {
        let producer = match format {
            ExportFormat::Json => {
                Producer::Whole(Some(serde_json::to_vec(&result.data).unwrap_or_default()))
            }
            ExportFormat::Csv | ExportFormat::Ndjson => {
                let columns = if result.columns.is_empty() {
                    result.inferred_columns()
                } else {
                    result.columns.clone()
                };
                Producer::Rows(RowProducer {
                    format,
                    header_pending: format == ExportFormat::Csv,
                    columns,
                    rows: result.data.into_iter(),
                })
            }
        };
        Self {
            producer,
            buffer: Vec::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Bytes currently buffered but not yet handed out.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Read up to `max_len` bytes. Returns `None` once the stream is fully
    /// drained; every prior read returns at least one byte.
    pub fn read_chunk(&mut self, max_len: usize) -> Option<Vec<u8>> {
        let max_len = max_len.max(1);
        while self.buffer.len() < max_len {
            match self.producer.next_piece() {
                Some(piece) => self.buffer.extend_from_slice(&piece),
                None => break,
            }
        }
        if self.buffer.is_empty() {
            return None;
        }
        let take = self.buffer.len().min(max_len);
        let chunk = self.buffer.drain(..take).collect();
        Some(chunk)
    }
}

impl fmt::Debug for ExportStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportStream")
            .field("buffered", &self.buffer.len())
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

impl Iterator for ExportStream {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_chunk(self.chunk_size)
    }
}

/// CSV cell coercion: null and missing are empty, booleans are `1`/`0`,
/// numbers render unquoted, nested values render as inline JSON.
fn csv_field(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::Bool(b)) => if *b { "1" } else { "0" }.to_string(),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else if let Some(f) = n.as_f64() {
                let mut buf = ryu::Buffer::new();
                buf.format(f).to_string()
            } else {
                n.to_string()
            }
        }
        Some(Value::String(s)) => s.clone(),
        Some(nested) => serde_json::to_string(nested).unwrap_or_default(),
    }
}

fn encode_csv_line(fields: impl Iterator<Item = String>) -> Vec<u8> {
    let mut line = Vec::new();
    for (i, field) in fields.enumerate() {
        if i > 0 {
            line.push(b',');
        }
        if field.contains([',', '"', '\n', '\r']) {
            line.push(b'"');
            line.extend_from_slice(field.replace('"', "\"\"").as_bytes());
            line.push(b'"');
        } else {
            line.extend_from_slice(field.as_bytes());
        }
    }
    line.push(b'\n');
    line
}
