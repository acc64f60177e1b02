//! # wisp-store
//!
//! SQLite persistence for wisp notifications.
//!
//! [`SqliteEventStore`] implements [`wisp_core::EventWriter`] with one table
//! per event family and `INSERT OR IGNORE` keyed upserts, so redelivered
//! notifications never create duplicate rows. Connections come from an
//! `r2d2` pool with WAL journaling.

#![deny(unsafe_code)]

pub mod errors;
pub mod schema;
pub mod store;

pub use errors::{Result, StoreError};
pub use store::SqliteEventStore;
