//! Error and warning types shared by every component.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Failure surfaced to callers of the engine.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Input records were rejected; nothing was applied.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    /// Unknown snapshot or node.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What was looked up (`"snapshot"`, `"node"`).
        kind: &'static str,
        /// The identifier as requested.
        id: String,
    },
    /// I/O error from file based adapters.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// CSV parsing error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    /// Configuration could not be loaded or is inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl GraphError {
    pub(crate) fn snapshot_not_found(id: impl Into<String>) -> Self {
        GraphError::NotFound {
            kind: "snapshot",
            id: id.into(),
        }
    }

    pub(crate) fn node_not_found(id: impl Into<String>) -> Self {
        GraphError::NotFound {
            kind: "node",
            id: id.into(),
        }
    }

    /// True for [`GraphError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, GraphError::NotFound { .. })
    }
}

/// Reasons an ingestion batch is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A record lacks a required field (or the field is blank).
    #[error("{record} #{index} is missing required field `{field}`")]
    MissingField {
        /// `"vertex"` or `"edge"`.
        record: &'static str,
        /// Position of the record in its input batch.
        index: usize,
        /// Name of the missing field.
        field: &'static str,
    },
    /// A tabular source lacks a required column header.
    #[error("{} is missing required column `{column}`", path.display())]
    MissingColumn {
        /// Where the header was read from.
        path: PathBuf,
        /// Name of the missing column.
        column: &'static str,
    },
    /// `(vertex_id, snapshot)` appears more than once.
    #[error("duplicate vertex `{vertex_id}` in snapshot `{snapshot}`")]
    DuplicateVertex {
        /// Repeated vertex id.
        vertex_id: String,
        /// Snapshot holding both copies.
        snapshot: String,
    },
    /// An edge endpoint is not a vertex of the edge's snapshot.
    #[error("edge {from_id} -> {to_id} in snapshot `{snapshot}` references unknown vertex `{missing}`")]
    DanglingEndpoint {
        /// Edge source.
        from_id: String,
        /// Edge target.
        to_id: String,
        /// Snapshot the edge belongs to.
        snapshot: String,
        /// The endpoint that does not resolve.
        missing: String,
    },
    /// Weight cell is present but not a number.
    #[error("vertex #{index} has non-numeric weight `{value}`")]
    NonNumericWeight {
        /// Position of the row in its input file.
        index: usize,
        /// The raw cell.
        value: String,
    },
    /// Weight is NaN or infinite.
    #[error("vertex `{vertex_id}` in snapshot `{snapshot}` has non-finite weight")]
    NonFiniteWeight {
        /// Offending vertex.
        vertex_id: String,
        /// Its snapshot.
        snapshot: String,
    },
    /// Weight is negative while negative weights are disallowed.
    #[error("vertex `{vertex_id}` in snapshot `{snapshot}` has negative weight {weight}")]
    NegativeWeight {
        /// Offending vertex.
        vertex_id: String,
        /// Its snapshot.
        snapshot: String,
        /// The rejected weight.
        weight: f64,
    },
}

/// Non-fatal condition met while computing a result.
///
/// Warnings are logged when they occur and attached to the result that
/// produced them; the accompanying values are still deterministic.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComputationWarning {
    /// Weight aggregation revisited a node already on the current path; the
    /// revisit contributed zero.
    #[error("cycle through `{node}`; revisit contributed zero")]
    CycleDetected {
        /// Node that closed the cycle.
        node: String,
    },
    /// Power iteration stopped at the iteration cap.
    #[error("eigenvector centrality did not converge after {iterations} iterations (delta {delta:.3e})")]
    EigenvectorNotConverged {
        /// Iterations performed.
        iterations: usize,
        /// L2 change of the final step.
        delta: f64,
    },
}
