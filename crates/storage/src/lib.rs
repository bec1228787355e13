//! In-memory MVCC storage for PulseDB
//!
//! The durable source of truth is the write-ahead log (`pulse-durability`);
//! this crate holds the tables it materializes into: ordered maps with
//! version chains, snapshot-isolated reads, and atomic multi-table batch
//! application.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod snapshot;
pub mod store;
pub mod table;

pub use batch::{WriteBatch, WriteOp};
pub use snapshot::Snapshot;
pub use store::MemTables;
pub use table::Table;
