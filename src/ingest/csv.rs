//! CSV sources: a vertices file with `vertex,weight,snapshot` columns and an
//! edges file with `vertex_from,vertex_to,snapshot` columns.
//!
//! Header lookup is case-insensitive and extra columns are ignored. Blank
//! cells become absent fields.

use std::path::Path;

use ::csv::{ReaderBuilder, StringRecord};
use tracing::debug;

use crate::error::{Result, ValidationError};
use crate::model::{RawEdge, RawVertex};

/// Reads every row of a vertices file.
///
/// # Errors
/// I/O and CSV errors, [`ValidationError::MissingColumn`] when a header is
/// absent, and [`ValidationError::NonNumericWeight`] for a weight cell that
/// does not parse.
pub fn read_vertices(path: &Path) -> Result<Vec<RawVertex>> {
    let mut reader = ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    let vertex = find_column(&headers, "vertex", path)?;
    let weight = find_column(&headers, "weight", path)?;
    let snapshot = find_column(&headers, "snapshot", path)?;

    let mut rows = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = result?;
        let weight = match cell(&record, weight) {
            Some(raw) => Some(
                raw.parse::<f64>()
                    .map_err(|_| ValidationError::NonNumericWeight {
                        index,
                        value: raw.clone(),
                    })?,
            ),
            None => None,
        };
        rows.push(RawVertex {
            vertex: cell(&record, vertex),
            weight,
            snapshot: cell(&record, snapshot),
        });
    }
    debug!(path = %path.display(), rows = rows.len(), "read vertices");
    Ok(rows)
}

/// Reads every row of an edges file.
///
/// # Errors
/// I/O and CSV errors, and [`ValidationError::MissingColumn`] when a header
/// is absent.
pub fn read_edges(path: &Path) -> Result<Vec<RawEdge>> {
    let mut reader = ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    let from = find_column(&headers, "vertex_from", path)?;
    let to = find_column(&headers, "vertex_to", path)?;
    let snapshot = find_column(&headers, "snapshot", path)?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(RawEdge {
            vertex_from: cell(&record, from),
            vertex_to: cell(&record, to),
            snapshot: cell(&record, snapshot),
        });
    }
    debug!(path = %path.display(), rows = rows.len(), "read edges");
    Ok(rows)
}

fn find_column(headers: &StringRecord, name: &'static str, path: &Path) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
        .ok_or_else(|| {
            ValidationError::MissingColumn {
                path: path.to_path_buf(),
                column: name,
            }
            .into()
        })
}

fn cell(record: &StringRecord, idx: usize) -> Option<String> {
    record
        .get(idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
