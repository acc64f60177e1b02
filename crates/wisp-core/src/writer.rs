//! The persistence boundary.
//!
//! The dispatcher persists every notification through [`EventWriter`] before
//! invoking the sink, so a record is durable by the time user code sees it.
//! Upserts are idempotent by the record's natural key; writing the same
//! record twice leaves one row.

use crate::records::EventRecord;

/// Error from the persistence boundary.
///
/// Opaque wrapper so this crate stays independent of the storage backend.
#[derive(Debug, thiserror::Error)]
#[error("event write failed: {0}")]
pub struct WriteError(#[from] pub Box<dyn std::error::Error + Send + Sync>);

/// Idempotent notification persistence.
pub trait EventWriter: Send + Sync {
    /// Insert the record if its natural key is new; otherwise leave the
    /// existing row untouched.
    fn upsert(&self, record: &EventRecord) -> Result<(), WriteError>;
}

/// A writer that discards everything. Useful in tests and for sinks that do
/// their own persistence.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullWriter;

impl EventWriter for NullWriter {
    fn upsert(&self, _record: &EventRecord) -> Result<(), WriteError> {
        Ok(())
    }
}
