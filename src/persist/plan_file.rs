//! Persisted plans and undo journals.
//!
//! Two shapes are accepted transparently:
//! - a single JSON document `{"root"?, "folders_to_create": [...], "moves": [...], "rules"?}`
//! - a line-delimited stream whose first line is a `plan_header` or
//!   `undo_header`, followed by one move per line
//!
//! Streams are read lazily so a plan with millions of moves never has to be
//! resident in memory.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};
use crate::models::{Move, Plan, StreamHeader};
use crate::oracle;
use crate::rules::OrganizationRule;
use crate::wal::{atomic_write, sync_directory};

/// Which on-disk shape a plan file had
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanFormat {
    Document,
    Stream,
    Undo,
}

/// Write a plan as one pretty-printed JSON document (atomically).
pub fn write_plan_document(path: &Path, plan: &Plan) -> Result<()> {
    let json = serde_json::to_vec_pretty(plan)
        .map_err(EngineError::encode("plan"))?;
    atomic_write(path, &json)?;
    tracing::info!(path = %path.display(), moves = plan.moves.len(), "Saved plan");
    Ok(())
}

/// Incremental writer for the line-delimited plan form.
pub struct PlanStreamWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    written: usize,
}

impl PlanStreamWriter {
    pub fn create(path: &Path, header: &StreamHeader) -> Result<Self> {
        let file = File::create(path).map_err(|e| EngineError::io(path, e))?;
        let mut stream = Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            written: 0,
        };
        stream.write_line(header)?;
        Ok(stream)
    }

    fn write_line<T: serde::Serialize>(&mut self, value: &T) -> Result<()> {
        let line = serde_json::to_string(value)
            .map_err(EngineError::encode("plan line"))?;
        writeln!(self.writer, "{}", line).map_err(|e| EngineError::io(&self.path, e))
    }

    pub fn write_move(&mut self, mv: &Move) -> Result<()> {
        self.write_line(mv)?;
        self.written += 1;
        Ok(())
    }

    /// Flush and fsync; returns the number of moves written.
    pub fn finish(self) -> Result<usize> {
        let Self {
            path,
            writer,
            written,
        } = self;
        let file = writer
            .into_inner()
            .map_err(|e| EngineError::io(&path, e.into_error()))?;
        file.sync_all().map_err(|e| EngineError::io(&path, e))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            sync_directory(parent)?;
        }
        Ok(written)
    }
}

/// Stream `moves` straight to disk behind a `plan_header`.
pub fn write_plan_stream<I>(
    path: &Path,
    root: &str,
    folders_to_create: Vec<String>,
    rules: Vec<OrganizationRule>,
    moves: I,
) -> Result<usize>
where
    I: IntoIterator<Item = Move>,
{
    let header = StreamHeader::PlanHeader {
        root: root.to_string(),
        folders_to_create,
        rules,
    };
    let mut writer = PlanStreamWriter::create(path, &header)?;
    for mv in moves {
        writer.write_move(&mv)?;
    }
    let written = writer.finish()?;
    tracing::info!(path = %path.display(), moves = written, "Saved plan stream");
    Ok(written)
}

enum MoveSource {
    Buffered(std::vec::IntoIter<Move>),
    Lines {
        lines: Lines<BufReader<File>>,
        line_no: usize,
    },
}

/// An opened plan: header data up front, moves pulled lazily.
pub struct PlanReader {
    pub format: PlanFormat,
    pub root: Option<String>,
    pub folders_to_create: Vec<String>,
    pub rules: Vec<OrganizationRule>,
    moves: MoveSource,
    skipped: usize,
}

impl PlanReader {
    /// Open a plan or undo file, detecting its shape from the first line.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| EngineError::io(path, e))?;
        let mut reader = BufReader::new(file);

        let mut first = String::new();
        while first.trim().is_empty() {
            first.clear();
            let read = reader
                .read_line(&mut first)
                .map_err(|e| EngineError::io(path, e))?;
            if read == 0 {
                return Err(EngineError::PlanParse(format!("{} is empty", path.display())));
            }
        }

        if let Ok(header) = serde_json::from_str::<StreamHeader>(first.trim()) {
            let format = if header.is_undo() {
                PlanFormat::Undo
            } else {
                PlanFormat::Stream
            };
            let (root, folders_to_create, rules) = match header {
                StreamHeader::PlanHeader {
                    root,
                    folders_to_create,
                    rules,
                } => (root, folders_to_create, rules),
                StreamHeader::UndoHeader { root, .. } => (root, Vec::new(), Vec::new()),
            };
            return Ok(Self {
                format,
                root: Some(root).filter(|r| !r.is_empty()),
                folders_to_create,
                rules,
                moves: MoveSource::Lines {
                    lines: reader.lines(),
                    line_no: 1,
                },
                skipped: 0,
            });
        }

        let mut text = first;
        reader
            .read_to_string(&mut text)
            .map_err(|e| EngineError::io(path, e))?;

        let plan = match serde_json::from_str::<Plan>(&text) {
            Ok(plan) => plan.without_noops(),
            Err(e) => {
                tracing::debug!(error = %e, "Plan document is not strict JSON, trying tolerant parse");
                oracle::parse_plan(&text)?
            }
        };

        Ok(Self::from_plan(plan))
    }

    /// Wrap an in-memory plan
    pub fn from_plan(plan: Plan) -> Self {
        Self {
            format: PlanFormat::Document,
            root: plan.root,
            folders_to_create: plan.folders_to_create,
            rules: plan.rules,
            moves: MoveSource::Buffered(plan.moves.into_iter()),
            skipped: 0,
        }
    }

    pub fn is_undo(&self) -> bool {
        self.format == PlanFormat::Undo
    }

    /// Stream lines that were not valid moves
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl Iterator for PlanReader {
    type Item = Move;

    fn next(&mut self) -> Option<Move> {
        match &mut self.moves {
            MoveSource::Buffered(moves) => moves.next(),
            MoveSource::Lines { lines, line_no } => loop {
                let line = match lines.next()? {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::warn!(line = *line_no + 1, error = %e, "Plan stream ended early");
                        return None;
                    }
                };
                *line_no += 1;

                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<Move>(line) {
                    Ok(mv) if !mv.is_noop() => return Some(mv),
                    Ok(_) => continue,
                    Err(e) => {
                        self.skipped += 1;
                        tracing::warn!(line = *line_no, error = %e, "Skipping malformed plan line");
                    }
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_moves() -> Vec<Move> {
        vec![
            Move::new("a/x.txt", "Docs/x.txt", "Docs"),
            Move::new("b/y.jpg", "Photos/y.jpg", "Photos"),
        ]
    }

    #[test]
    fn test_document_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plan.json");
        let plan = Plan::new(vec!["Docs".to_string()], sample_moves());
        write_plan_document(&path, &plan).unwrap();

        let reader = PlanReader::open(&path).unwrap();
        assert_eq!(reader.format, PlanFormat::Document);
        assert_eq!(reader.folders_to_create, vec!["Docs"]);
        assert_eq!(reader.collect::<Vec<_>>(), sample_moves());
    }

    #[test]
    fn test_stream_round_trip_with_bad_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plan.jsonl");
        let written =
            write_plan_stream(&path, "/mnt/hdd", vec!["Photos".to_string()], vec![], sample_moves()).unwrap();
        assert_eq!(written, 2);

        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("{\"old_rel\": \"broken\"\n\n");
        std::fs::write(&path, content).unwrap();

        let mut reader = PlanReader::open(&path).unwrap();
        assert_eq!(reader.format, PlanFormat::Stream);
        assert_eq!(reader.root.as_deref(), Some("/mnt/hdd"));
        assert_eq!(reader.folders_to_create, vec!["Photos"]);
        let moves: Vec<Move> = reader.by_ref().collect();
        assert_eq!(moves, sample_moves());
        assert_eq!(reader.skipped(), 1);
    }

    #[test]
    fn test_undo_header_detected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("undo.jsonl");
        std::fs::write(
            &path,
            "{\"type\":\"undo_header\",\"root\":\"/r\",\"created_at\":\"2024-01-01T00:00:00+00:00\",\"run_id\":\"x\"}\n\
             {\"old_rel\":\"Docs/x.txt\",\"new_rel\":\"a/x.txt\",\"reason\":\"Undo: Docs\"}\n",
        )
        .unwrap();

        let reader = PlanReader::open(&path).unwrap();
        assert!(reader.is_undo());
        assert!(reader.folders_to_create.is_empty());
        assert_eq!(reader.count(), 1);
    }

    #[test]
    fn test_tolerant_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("oracle.json");
        std::fs::write(&path, "```json\n{\"moves\": [{\"old_rel\": \"a.txt\", \"new_rel\": \"D/a.txt\"}]}\n```").unwrap();
        assert_eq!(PlanReader::open(&path).unwrap().count(), 1);
    }

    #[test]
    fn test_empty_file_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.json");
        std::fs::write(&path, "\n\n").unwrap();
        assert!(matches!(PlanReader::open(&path), Err(EngineError::PlanParse(_))));
    }
}
