//! CSV persistence for result tables

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{BenchError, BenchResult};
use crate::output::ResultTable;

/// Reads and writes result tables as CSV
pub struct TableWriter;

impl TableWriter {
    /// Replace `path` with `table`, via a temporary file in the same directory
    pub fn write(table: &ResultTable, path: &Path) -> BenchResult<()> {
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(to_csv(table).as_bytes())?;
        temp.flush()?;
        temp.persist(path).map_err(|e| BenchError::IoError(e.error))?;

        debug!("Wrote {} rows to {}", table.len(), path.display());
        Ok(())
    }

    /// Add `table`'s rows to the table stored at `path`.
    ///
    /// A missing file is created. An existing file with other columns is
    /// merged by column union and rewritten.
    pub fn append(table: &ResultTable, path: &Path) -> BenchResult<()> {
        if !path.exists() {
            return Self::write(table, path);
        }
        let existing = Self::read(path)?;
        if existing.columns != table.columns {
            debug!(
                "Column sets differ for {}; merging by column union",
                path.display()
            );
        }
        Self::write(&ResultTable::concat(&[existing, table.clone()]), path)
    }

    /// Load a CSV file written by `write` (or any RFC 4180 CSV with a header)
    pub fn read(path: &Path) -> BenchResult<ResultTable> {
        let content = fs::read_to_string(path)?;
        let mut records = parse_csv(&content)
            .map_err(|e| BenchError::table(format!("{}: {}", path.display(), e)))?
            .into_iter();

        let columns = records
            .next()
            .ok_or_else(|| BenchError::table(format!("{}: missing header", path.display())))?;

        let mut table = ResultTable::new(columns);
        for (line, row) in records.enumerate() {
            if row.len() != table.columns.len() {
                return Err(BenchError::table(format!(
                    "{}: row {} has {} cells, header has {}",
                    path.display(),
                    line + 1,
                    row.len(),
                    table.columns.len()
                )));
            }
            table.rows.push(row);
        }
        Ok(table)
    }
}

/// Quote a cell when it holds a comma, quote or line break
pub fn escape_cell(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

pub fn to_csv(table: &ResultTable) -> String {
    let mut out = String::new();
    for line in std::iter::once(&table.columns).chain(table.rows.iter()) {
        match line.as_slice() {
            // A bare empty line would read back as no record at all
            [only] if only.is_empty() => out.push_str("\"\""),
            _ => {
                let cells: Vec<String> = line.iter().map(|c| escape_cell(c)).collect();
                out.push_str(&cells.join(","));
            }
        }
        out.push('\n');
    }
    out
}

/// Split CSV text into records of cells
pub fn parse_csv(content: &str) -> Result<Vec<Vec<String>>, String> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    let mut line_has_content = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    cell.push('"');
                }
                '"' => in_quotes = false,
                _ => cell.push(c),
            }
            continue;
        }

        match c {
            '"' => {
                in_quotes = true;
                line_has_content = true;
            }
            ',' => {
                record.push(std::mem::take(&mut cell));
                line_has_content = true;
            }
            '\r' => {}
            '\n' => {
                if line_has_content || !cell.is_empty() {
                    record.push(std::mem::take(&mut cell));
                    records.push(std::mem::take(&mut record));
                }
                line_has_content = false;
            }
            _ => {
                cell.push(c);
                line_has_content = true;
            }
        }
    }

    if in_quotes {
        return Err("unterminated quoted cell".to_string());
    }
    if line_has_content || !cell.is_empty() {
        record.push(cell);
        records.push(record);
    }
    Ok(records)
}
