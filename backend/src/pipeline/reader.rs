//! Chunked source reader.
//!
//! A source is downloaded and parsed once, then kept in a small cache keyed
//! by the MD5 of its bytes and the format it was parsed as. Every chunk is a slice of that parsed form, so
//! reading a window costs O(limit) and the same window always yields the
//! same rows.

use crate::error::{ImportError, Result};
use crate::storage::SourceStorage;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use log::{debug, info};
use registry_common::model::import::SourceFormat;
use std::borrow::Cow;
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

/// One data row, positionally aligned with the source headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// 1-based data row number (header excluded).
    pub source_row: u64,
    pub values: Vec<String>,
}

/// A fully parsed source.
#[derive(Debug)]
pub struct ParsedSource {
    pub md5: String,
    pub format: SourceFormat,
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub md5: String,
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
    pub total_rows: u64,
    pub done: bool,
}

impl ParsedSource {
    pub fn total_rows(&self) -> u64 {
        self.rows.len() as u64
    }

    /// Rows `[offset, offset + limit)`.
    pub fn slice(&self, offset: u64, limit: usize) -> Chunk {
        let start = (offset as usize).min(self.rows.len());
        let end = start.saturating_add(limit).min(self.rows.len());
        let rows = self.rows[start..end].to_vec();
        Chunk {
            md5: self.md5.clone(),
            headers: self.headers.clone(),
            done: offset + rows.len() as u64 >= self.total_rows(),
            total_rows: self.total_rows(),
            rows,
        }
    }
}

/// Pick `;` or `,` by frequency in the header line. A header with tabs
/// only is tab separated.
pub fn detect_delimiter(header_line: &str) -> u8 {
    let semicolons = header_line.matches(';').count();
    let commas = header_line.matches(',').count();
    if semicolons == 0 && commas == 0 && header_line.contains('\t') {
        b'\t'
    } else if semicolons >= commas && semicolons > 0 {
        b';'
    } else {
        b','
    }
}

/// Decode source bytes: strip a UTF-8 BOM, fall back to Latin-1 when the
/// bytes are not valid UTF-8.
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => Cow::Owned(bytes.iter().map(|&b| b as char).collect()),
    }
}

pub(crate) fn decode_field(bytes: &[u8]) -> String {
    decode_text(bytes).into_owned()
}

pub(crate) fn is_blank(values: &[String]) -> bool {
    values.iter().all(|v| v.trim().is_empty())
}

/// Align a record to the header width.
pub(crate) fn align(mut values: Vec<String>, width: usize) -> Vec<String> {
    values.resize(width, String::new());
    values
}

fn parse_delimited(bytes: &[u8]) -> Result<(Vec<String>, Vec<RawRow>)> {
    let text = decode_text(bytes);
    let header_line = text.lines().next().unwrap_or("");
    if header_line.trim().is_empty() {
        return Err(ImportError::Parse("source has no header row".to_string()));
    }
    let delimiter = detect_delimiter(header_line);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let values: Vec<String> = record.iter().map(str::to_string).collect();
        if is_blank(&values) {
            continue;
        }
        rows.push(RawRow {
            source_row: rows.len() as u64 + 1,
            values: align(values, headers.len()),
        });
    }
    Ok((headers, rows))
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn parse_spreadsheet(bytes: &[u8]) -> Result<(Vec<String>, Vec<RawRow>)> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ImportError::Parse("workbook has no worksheets".to_string()))??;

    let mut sheet_rows = range.rows();
    let headers: Vec<String> = sheet_rows
        .next()
        .ok_or_else(|| ImportError::Parse("worksheet has no header row".to_string()))?
        .iter()
        .map(|c| cell_text(c).trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for cells in sheet_rows {
        let values: Vec<String> = cells.iter().map(cell_text).collect();
        if is_blank(&values) {
            continue;
        }
        rows.push(RawRow {
            source_row: rows.len() as u64 + 1,
            values: align(values, headers.len()),
        });
    }
    Ok((headers, rows))
}

pub fn md5_hex(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

/// Parse a whole source.
pub fn parse_source(bytes: &[u8], format: SourceFormat) -> Result<ParsedSource> {
    let (headers, rows) = match format {
        SourceFormat::Delimited => parse_delimited(bytes)?,
        SourceFormat::Spreadsheet => parse_spreadsheet(bytes)?,
    };
    if headers.iter().all(|h| h.is_empty()) {
        return Err(ImportError::Parse("source has no columns".to_string()));
    }
    Ok(ParsedSource {
        md5: md5_hex(bytes),
        format,
        headers,
        rows,
    })
}

/// Bounded cache of parsed sources keyed by content hash and format. The
/// oldest entry is evicted first.
pub struct SourceCache {
    capacity: usize,
    entries: Mutex<VecDeque<Arc<ParsedSource>>>,
}

impl SourceCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, VecDeque<Arc<ParsedSource>>>> {
        self.entries
            .lock()
            .map_err(|_| ImportError::Persistence("source cache poisoned".to_string()))
    }

    pub fn get(&self, md5: &str, format: SourceFormat) -> Result<Option<Arc<ParsedSource>>> {
        Ok(self
            .lock()?
            .iter()
            .find(|s| s.md5 == md5 && s.format == format)
            .cloned())
    }

    pub fn insert(&self, source: Arc<ParsedSource>) -> Result<()> {
        let mut entries = self.lock()?;
        entries.retain(|s| !(s.md5 == source.md5 && s.format == source.format));
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(source);
        Ok(())
    }

    /// Drop every parsed form of the source.
    pub fn evict(&self, md5: &str) -> Result<()> {
        self.lock()?.retain(|s| s.md5 != md5);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reads windows of a stored source through the cache.
pub struct ChunkReader<'a> {
    storage: &'a dyn SourceStorage,
    cache: &'a SourceCache,
}

impl<'a> ChunkReader<'a> {
    pub fn new(storage: &'a dyn SourceStorage, cache: &'a SourceCache) -> Self {
        Self { storage, cache }
    }

    /// Load the parsed source, from cache when `expected_md5` is known.
    ///
    /// A download whose hash differs from `expected_md5` fails with
    /// `SourceChanged`: a job must see one immutable source.
    pub fn load(
        &self,
        location: &str,
        format: SourceFormat,
        expected_md5: Option<&str>,
    ) -> Result<Arc<ParsedSource>> {
        if let Some(md5) = expected_md5 {
            if let Some(source) = self.cache.get(md5, format)? {
                return Ok(source);
            }
        }

        let bytes = self.storage.download(location)?;
        let found = md5_hex(&bytes);
        if let Some(expected) = expected_md5 {
            if expected != found {
                return Err(ImportError::SourceChanged {
                    expected: expected.to_string(),
                    found,
                });
            }
        }
        if let Some(source) = self.cache.get(&found, format)? {
            return Ok(source);
        }

        let source = Arc::new(parse_source(&bytes, format)?);
        info!(
            "Parsed {} ({} bytes): {} columns, {} rows",
            location,
            bytes.len(),
            source.headers.len(),
            source.total_rows()
        );
        self.cache.insert(source.clone())?;
        Ok(source)
    }

    pub fn read_chunk(
        &self,
        location: &str,
        format: SourceFormat,
        expected_md5: Option<&str>,
        offset: u64,
        limit: usize,
    ) -> Result<Chunk> {
        let source = self.load(location, format, expected_md5)?;
        let chunk = source.slice(offset, limit);
        debug!(
            "Read {} rows of {} at offset {} (done: {})",
            chunk.rows.len(),
            location,
            offset,
            chunk.done
        );
        Ok(chunk)
    }
}
