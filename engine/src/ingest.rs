use crate::{ItemId, Rating, Score, UserId};
use anyhow::{bail, Context, Result};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const DEFAULT_DELIMITER: &str = "::";

/// Why a single line was dropped. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    TooFewFields(usize),
    NotNumeric(&'static str),
    ScoreOutOfRange(u32),
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::TooFewFields(n) => write!(f, "expected at least 3 fields, got {n}"),
            RecordError::NotNumeric(field) => write!(f, "{field} is not an unsigned integer"),
            RecordError::ScoreOutOfRange(s) => write!(f, "score {s} outside 1..=5"),
        }
    }
}

impl std::error::Error for RecordError {}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    pub accepted: usize,
    pub dropped: usize,
}

/// Parse `user<d>item<d>score[<d>ignored...]`. Blank lines are `Ok(None)`.
pub fn parse_line(line: &str, delimiter: &str) -> Result<Option<Rating>, RecordError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let fields: Vec<&str> = line.split(delimiter).collect();
    if fields.len() < 3 {
        return Err(RecordError::TooFewFields(fields.len()));
    }
    let user: UserId = fields[0].trim().parse().map_err(|_| RecordError::NotNumeric("user id"))?;
    let item: ItemId = fields[1].trim().parse().map_err(|_| RecordError::NotNumeric("item id"))?;
    let raw: u32 = fields[2].trim().parse().map_err(|_| RecordError::NotNumeric("score"))?;
    if !(1..=5).contains(&raw) {
        return Err(RecordError::ScoreOutOfRange(raw));
    }
    Ok(Some(Rating::new(user, item, raw as Score)))
}

pub fn read_ratings<R: BufRead>(reader: R, delimiter: &str) -> Result<(Vec<Rating>, IngestStats)> {
    let mut out = Vec::new();
    let mut stats = IngestStats::default();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading line {}", lineno + 1))?;
        match parse_line(&line, delimiter) {
            Ok(Some(r)) => {
                out.push(r);
                stats.accepted += 1;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::trace!(line = lineno + 1, error = %e, "dropping record");
                stats.dropped += 1;
            }
        }
    }
    Ok((out, stats))
}

/// Read a ratings file, or every `*.dat` file below a directory in path order.
pub fn read_ratings_path<P: AsRef<Path>>(path: P, delimiter: &str) -> Result<(Vec<Rating>, IngestStats)> {
    let path = path.as_ref();
    let mut files: Vec<PathBuf> = Vec::new();
    if path.is_dir() {
        for entry in WalkDir::new(path) {
            let entry = entry.with_context(|| format!("walking {}", path.display()))?;
            let p = entry.path();
            if p.is_file() && p.extension().and_then(|s| s.to_str()) == Some("dat") {
                files.push(p.to_path_buf());
            }
        }
        files.sort();
    } else if path.is_file() {
        files.push(path.to_path_buf());
    } else {
        bail!("ratings input {} does not exist", path.display());
    }

    let mut all = Vec::new();
    let mut stats = IngestStats::default();
    for file in files {
        let f = File::open(&file).with_context(|| format!("opening {}", file.display()))?;
        let (mut ratings, s) = read_ratings(BufReader::new(f), delimiter)
            .with_context(|| format!("reading {}", file.display()))?;
        tracing::debug!(file = %file.display(), accepted = s.accepted, dropped = s.dropped, "ingested file");
        all.append(&mut ratings);
        stats.accepted += s.accepted;
        stats.dropped += s.dropped;
    }
    tracing::info!(accepted = stats.accepted, dropped = stats.dropped, "ingested ratings");
    Ok((all, stats))
}
