//! Record types crossing the ingestion boundary and the dense node index.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::{Date, PrimitiveDateTime, Time};

use crate::error::ValidationError;

/// Dense index of a node inside one [`SnapshotGraph`](crate::store::SnapshotGraph).
///
/// Indices are only meaningful for the graph that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIdx(pub(crate) u32);

impl NodeIdx {
    /// Position in the owning graph's arena.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A weighted vertex of one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexRecord {
    /// External vertex id.
    pub vertex_id: String,
    /// Own weight.
    pub weight: f64,
    /// Snapshot label.
    pub snapshot: String,
}

impl VertexRecord {
    /// Builds a record from borrowed parts.
    pub fn new(vertex_id: impl Into<String>, weight: f64, snapshot: impl Into<String>) -> Self {
        Self {
            vertex_id: vertex_id.into(),
            weight,
            snapshot: snapshot.into(),
        }
    }
}

/// A directed edge of one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// Source vertex id.
    pub from_id: String,
    /// Target vertex id.
    pub to_id: String,
    /// Snapshot label.
    pub snapshot: String,
}

impl EdgeRecord {
    /// Builds a record from borrowed parts.
    pub fn new(
        from_id: impl Into<String>,
        to_id: impl Into<String>,
        snapshot: impl Into<String>,
    ) -> Self {
        Self {
            from_id: from_id.into(),
            to_id: to_id.into(),
            snapshot: snapshot.into(),
        }
    }
}

/// Vertex row as produced by upstream adapters: `{vertex, weight, snapshot}`
/// with any field possibly absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawVertex {
    /// Vertex id.
    #[serde(default)]
    pub vertex: Option<String>,
    /// Vertex weight.
    #[serde(default)]
    pub weight: Option<f64>,
    /// Snapshot label.
    #[serde(default)]
    pub snapshot: Option<String>,
}

/// Edge row as produced by upstream adapters: `{vertex_from, vertex_to, snapshot}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEdge {
    /// Source vertex id.
    #[serde(default)]
    pub vertex_from: Option<String>,
    /// Target vertex id.
    #[serde(default)]
    pub vertex_to: Option<String>,
    /// Snapshot label.
    #[serde(default)]
    pub snapshot: Option<String>,
}

fn required(
    value: Option<String>,
    record: &'static str,
    index: usize,
    field: &'static str,
) -> Result<String, ValidationError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ValidationError::MissingField {
            record,
            index,
            field,
        }),
    }
}

impl RawVertex {
    /// Converts into a typed record; `index` locates the row in error messages.
    pub fn into_record(self, index: usize) -> Result<VertexRecord, ValidationError> {
        let vertex_id = required(self.vertex, "vertex", index, "vertex")?;
        let weight = self.weight.ok_or(ValidationError::MissingField {
            record: "vertex",
            index,
            field: "weight",
        })?;
        let snapshot = required(self.snapshot, "vertex", index, "snapshot")?;
        Ok(VertexRecord {
            vertex_id,
            weight,
            snapshot,
        })
    }
}

impl RawEdge {
    /// Converts into a typed record; `index` locates the row in error messages.
    pub fn into_record(self, index: usize) -> Result<EdgeRecord, ValidationError> {
        Ok(EdgeRecord {
            from_id: required(self.vertex_from, "edge", index, "vertex_from")?,
            to_id: required(self.vertex_to, "edge", index, "vertex_to")?,
            snapshot: required(self.snapshot, "edge", index, "snapshot")?,
        })
    }
}

/// Canonical form of a snapshot label.
///
/// Date-like labels (`2024-01-01`, `2024-01-01 00:00:00`, `2024-01-01T00:00:00`)
/// collapse to `YYYY-MM-DD`; anything else is only trimmed. Canonical labels
/// order chronologically under plain string comparison.
pub fn normalize_snapshot(label: &str) -> String {
    let trimmed = label.trim();
    let date_only = format_description!("[year]-[month]-[day]");
    let spaced = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let iso = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

    if let Ok(date) = Date::parse(trimmed, date_only) {
        return iso_date(date);
    }
    for format in [spaced, iso] {
        if let Ok(stamp) = PrimitiveDateTime::parse(trimmed, format) {
            if stamp.time() == Time::MIDNIGHT {
                return iso_date(stamp.date());
            }
            return trimmed.to_string();
        }
    }
    trimmed.to_string()
}

fn iso_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}
