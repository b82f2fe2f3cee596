//! Line-delimited record streams from the scanning collaborator.
//!
//! The reader accepts plain JSONL (one record per line) as well as the older
//! streamed-metadata document, where records sit one per line between a
//! `{"root": ..., "files": [` header and a `]}` footer with trailing commas.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::Path;

use crate::error::{EngineError, Result};
use crate::models::FileRecord;

/// Lazy iterator over the records in a stream.
///
/// Lines that are not records (headers, footers, garbage) are skipped. An
/// I/O error ends the stream early with a warning.
pub struct RecordReader<R> {
    lines: Lines<R>,
    line_no: usize,
    skipped: usize,
}

impl RecordReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| EngineError::io(path, e))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            skipped: 0,
        }
    }

    /// Non-empty lines that did not hold a record
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

fn parse_record_line(line: &str) -> Option<FileRecord> {
    let line = line.trim().trim_end_matches(',');
    if !line.starts_with('{') || !line.contains("\"rel_path\"") {
        return None;
    }
    serde_json::from_str::<FileRecord>(line).ok()
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = FileRecord;

    fn next(&mut self) -> Option<FileRecord> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(line = self.line_no + 1, error = %e, "Record stream ended early");
                    return None;
                }
            };
            self.line_no += 1;

            if line.trim().is_empty() {
                continue;
            }
            match parse_record_line(&line) {
                Some(record) => return Some(record),
                None => {
                    self.skipped += 1;
                    tracing::trace!(line = self.line_no, "Skipping non-record line");
                }
            }
        }
    }
}

/// Write records as JSONL. Returns the number written.
pub fn write_records<I>(path: &Path, records: I) -> Result<usize>
where
    I: IntoIterator<Item = FileRecord>,
{
    let file = File::create(path).map_err(|e| EngineError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    let mut count = 0;

    for record in records {
        let line = serde_json::to_string(&record)
            .map_err(EngineError::encode("record"))?;
        writeln!(writer, "{}", line).map_err(|e| EngineError::io(path, e))?;
        count += 1;
    }

    writer.flush().map_err(|e| EngineError::io(path, e))?;
    Ok(count)
}
