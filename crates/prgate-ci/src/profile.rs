//! Coverage profile records and statement summaries.
//!
//! Record format: `<file>:<startLine>.<startCol>,<endLine>.<endCol> <numStmts> <count>`.

use std::path::Path;
use std::str::FromStr;

use prgate_core::{PrGateError, Result};
use serde::{Deserialize, Serialize};

/// Position inside a source file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    pub line: u32,
    pub col: u32,
}

impl FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        let (line, col) = s
            .split_once('.')
            .ok_or_else(|| format!("position '{s}' is not <line>.<col>"))?;
        Ok(Self {
            line: line.parse().map_err(|_| format!("bad line number '{line}'"))?,
            col: col.parse().map_err(|_| format!("bad column '{col}'"))?,
        })
    }
}

/// One statement-block record of a coverage profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileRecord {
    pub file: String,
    pub start: Position,
    pub end: Position,
    pub num_statements: u64,
    pub count: u64,
}

impl ProfileRecord {
    pub fn covered(&self) -> bool {
        self.count > 0
    }
}

impl FromStr for ProfileRecord {
    type Err = String;

    fn from_str(line: &str) -> std::result::Result<Self, String> {
        let mut fields = line.trim().rsplitn(3, ' ');
        let count = fields.next().unwrap_or_default();
        let num_statements = fields.next().ok_or("missing statement count")?;
        let location = fields.next().ok_or("missing location")?;

        // File names may contain ':' on some platforms; the range never does.
        let (file, range) = location
            .rsplit_once(':')
            .ok_or_else(|| format!("location '{location}' has no ':'"))?;
        let (start, end) = range
            .split_once(',')
            .ok_or_else(|| format!("range '{range}' has no ','"))?;

        Ok(Self {
            file: file.to_string(),
            start: start.parse()?,
            end: end.parse()?,
            num_statements: num_statements
                .parse()
                .map_err(|_| format!("bad statement count '{num_statements}'"))?,
            count: count
                .parse()
                .map_err(|_| format!("bad execution count '{count}'"))?,
        })
    }
}

/// Statement totals for a profile.
///
/// Records are counted independently, so a block listed twice (for example
/// after merging overlapping inputs) contributes its statements twice.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct CoverageSummary {
    pub records: usize,
    pub statements: u64,
    pub covered_statements: u64,
    pub percent: f64,
}

impl CoverageSummary {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a ProfileRecord>,
    {
        let mut summary = Self::default();
        for record in records {
            summary.records += 1;
            summary.statements += record.num_statements;
            if record.covered() {
                summary.covered_statements += record.num_statements;
            }
        }
        summary.percent = if summary.statements == 0 {
            0.0
        } else {
            summary.covered_statements as f64 * 100.0 / summary.statements as f64
        };
        summary
    }
}

/// Parse every record of the profile at `path`.
///
/// `mode:` headers and blank lines are skipped.
pub fn read_records(path: &Path) -> Result<Vec<ProfileRecord>> {
    let content = std::fs::read_to_string(path)?;
    let mut records = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() || line.starts_with("mode:") {
            continue;
        }
        let record = line.parse::<ProfileRecord>().map_err(|reason| PrGateError::Profile {
            path: path.to_path_buf(),
            line: idx + 1,
            reason,
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Summarise the profile at `path`.
pub fn summarize(path: &Path) -> Result<CoverageSummary> {
    Ok(CoverageSummary::from_records(&read_records(path)?))
}
