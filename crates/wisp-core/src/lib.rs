//! # wisp-core
//!
//! Foundation types for the wisp notification client.
//!
//! This crate provides the shared vocabulary the other wisp crates depend on:
//!
//! - **Kinds**: [`kinds::EventKind`] — the catalogue of subscribable event
//!   types, with their wire names, versions, condition templates, and
//!   required OAuth scopes
//! - **Records**: [`records::EventRecord`] — an immutable, typed notification
//!   with one payload variant per kind
//! - **Sink**: [`sink::EventSink`] — the handler interface, one default no-op
//!   callback per kind
//! - **Writer**: [`writer::EventWriter`] — the persistence boundary
//!   (idempotent upsert by natural key)
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other wisp crates. No I/O.

#![deny(unsafe_code)]

pub mod kinds;
pub mod records;
pub mod sink;
pub mod writer;

pub use kinds::EventKind;
pub use records::{Event, EventRecord};
pub use sink::EventSink;
pub use writer::{EventWriter, WriteError};
