//! Durability layer for PulseDB
//!
//! The write-ahead log is the single durable file (`pulse.db`); memtables
//! are a materialized view of it. This crate provides the frame codec,
//! the append handle with its sync modes, committed-prefix replay, and
//! checkpoint compaction.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod encoding;
pub mod recovery;
pub mod wal;

pub use recovery::{replay, RecoveryReport};
pub use wal::{rewrite_checkpoint, scan, SyncMode, Wal, WalEntry, WalScan};
