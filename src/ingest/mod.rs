//! Adapters that turn external tabular sources into raw vertex and edge rows.
//!
//! Adapters only read and reshape. Field presence, weight validation and
//! snapshot normalization happen in [`SnapshotGraphStore::ingest_raw`](crate::store::SnapshotGraphStore::ingest_raw).

pub mod csv;
