//! Write-ahead log
//!
//! `pulse.db` is an append-only log of framed entries; the in-memory
//! tables are materialized from it on open. Torn writes are impossible by
//! construction: a commit is durable exactly when its `Commit` frame is
//! fully on disk, and replay discards any suffix after the last intact
//! commit.
//!
//! ## Entries
//!
//! - `Begin { csn }` — start of a logical change
//! - `Write` / `Delete` — row operations of the change
//! - `Commit { csn }` — the change is durable from here on
//! - `Checkpoint { csn }` — start of a compacted baseline (followed by the
//!   live rows and a matching `Commit`)
//!
//! ## Sync modes
//!
//! - `Normal` — fsync once per commit (default; crash loses nothing
//!   committed)
//! - `Fast` — no fsync (crash may lose a suffix of committed changes,
//!   never produces a torn state)
//! - `Paranoid` — fsync after every appended frame

use crate::encoding::{decode_entry, encode_entry};
use pulse_core::{Csn, PulseError, Result};
use pulse_storage::{Table, WriteBatch, WriteOp};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Durability vs. throughput trade-off for commits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// fsync on every commit
    #[default]
    Normal,
    /// No fsync; a crash keeps a committed prefix
    Fast,
    /// fsync on every appended frame
    Paranoid,
}

/// One WAL entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WalEntry {
    /// Start of a logical change
    Begin {
        /// CSN the change will commit at
        csn: Csn,
    },
    /// Row insert or replace
    Write {
        /// Target table
        table: Table,
        /// Encoded key
        key: Vec<u8>,
        /// Encoded value
        value: Vec<u8>,
    },
    /// Row removal
    Delete {
        /// Target table
        table: Table,
        /// Encoded key
        key: Vec<u8>,
    },
    /// The change identified by `csn` is complete
    Commit {
        /// CSN of the completed change
        csn: Csn,
    },
    /// Start of a compacted baseline at `csn`
    Checkpoint {
        /// CSN the baseline represents
        csn: Csn,
    },
}

/// Result of scanning a log file
#[derive(Debug)]
pub struct WalScan {
    /// All intact entries, in file order
    pub entries: Vec<WalEntry>,
    /// Byte offset just past the last intact entry
    pub good_offset: u64,
    /// True if damaged/incomplete bytes followed `good_offset`
    pub torn_tail: bool,
}

/// Append handle for the write-ahead log
pub struct Wal {
    path: PathBuf,
    writer: BufWriter<File>,
    sync_mode: SyncMode,
}

impl Wal {
    /// Open the log for appending, creating it if missing
    ///
    /// `good_offset` (from a prior [`scan`]) truncates a torn tail before
    /// the first append so the log never interleaves damaged bytes with
    /// new commits.
    pub fn open(path: impl Into<PathBuf>, sync_mode: SyncMode, good_offset: Option<u64>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;
        if let Some(offset) = good_offset {
            if offset < file.metadata()?.len() {
                warn!(path = %path.display(), offset, "truncating torn tail from log");
                file.set_len(offset)?;
                file.sync_all()?;
            }
        }
        let mut writer = BufWriter::new(file);
        writer.seek(SeekFrom::End(0))?;
        Ok(Self {
            path,
            writer,
            sync_mode,
        })
    }

    /// The log file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current log size in bytes
    pub fn size(&mut self) -> Result<u64> {
        self.writer.flush()?;
        Ok(self.writer.get_ref().metadata()?.len())
    }

    fn append(&mut self, entry: &WalEntry) -> Result<()> {
        let frame = encode_entry(entry)?;
        self.writer.write_all(&frame)?;
        if self.sync_mode == SyncMode::Paranoid {
            self.writer.flush()?;
            self.writer.get_ref().sync_all()?;
        }
        Ok(())
    }

    /// Append one committed change: `Begin`, its rows, `Commit`
    ///
    /// Durable on return under `Normal` and `Paranoid`; under `Fast` the
    /// bytes are handed to the OS without fsync.
    pub fn append_commit(&mut self, batch: &WriteBatch, csn: Csn) -> Result<()> {
        self.append(&WalEntry::Begin { csn })?;
        for op in batch.ops() {
            let entry = match op {
                WriteOp::Put { table, key, value } => WalEntry::Write {
                    table: *table,
                    key: key.clone(),
                    value: value.clone(),
                },
                WriteOp::Delete { table, key } => WalEntry::Delete {
                    table: *table,
                    key: key.clone(),
                },
            };
            self.append(&entry)?;
        }
        self.append(&WalEntry::Commit { csn })?;
        self.writer.flush()?;
        if self.sync_mode == SyncMode::Normal {
            self.writer.get_ref().sync_all()?;
        }
        Ok(())
    }

    /// Force everything to disk regardless of sync mode
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Roll the log back to `offset`, discarding a partially appended
    /// change after an I/O failure mid-commit. Keeps the log free of
    /// interleaved half-frames so replay's structure checks stay strict.
    pub fn truncate_to(&mut self, offset: u64) -> Result<()> {
        let _ = self.writer.flush();
        self.writer.get_ref().set_len(offset)?;
        self.writer.seek(SeekFrom::End(0))?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }
}

impl Drop for Wal {
    fn drop(&mut self) {
        let _ = self.writer.flush();
        let _ = self.writer.get_ref().sync_all();
    }
}

/// Scan a log file, stopping at the first damaged or incomplete frame
///
/// A missing file scans as empty. Everything up to the failure point is
/// intact; whether a torn tail is acceptable is the replayer's call.
pub fn scan(path: &Path) -> Result<WalScan> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(WalScan {
                entries: Vec::new(),
                good_offset: 0,
                torn_tail: false,
            })
        }
        Err(e) => return Err(e.into()),
    };

    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;

    let mut entries = Vec::new();
    let mut offset = 0usize;
    while offset < buf.len() {
        match decode_entry(&buf[offset..]) {
            Ok((entry, consumed)) => {
                entries.push(entry);
                offset += consumed;
            }
            Err(_) => break,
        }
    }

    Ok(WalScan {
        entries,
        good_offset: offset as u64,
        torn_tail: offset < buf.len(),
    })
}

/// Rewrite the log as a compacted baseline
///
/// Writes `Checkpoint { csn }`, one `Write` per live row, and a matching
/// `Commit` into a temp file, then atomically renames it over `path`.
pub fn rewrite_checkpoint<I>(path: &Path, csn: Csn, rows: I) -> Result<()>
where
    I: IntoIterator<Item = (Table, Vec<u8>, Vec<u8>)>,
{
    let tmp_path = path.with_extension("db.tmp");
    {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&encode_entry(&WalEntry::Checkpoint { csn })?)?;
        for (table, key, value) in rows {
            writer.write_all(&encode_entry(&WalEntry::Write { table, key, value })?)?;
        }
        writer.write_all(&encode_entry(&WalEntry::Commit { csn })?)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    std::fs::rename(&tmp_path, path)?;
    if let Some(dir) = path.parent() {
        if let Ok(dir) = File::open(dir) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

/// Guard against a checkpoint CSN of zero, which replay could not
/// distinguish from an empty database.
pub fn validate_checkpoint_csn(csn: Csn) -> Result<()> {
    if csn == 0 {
        return Err(PulseError::Corrupt("checkpoint at CSN 0".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn batch_with(key: &[u8], value: &[u8]) -> WriteBatch {
        let mut batch = WriteBatch::new();
        batch.put(Table::Experiences, key.to_vec(), value.to_vec());
        batch
    }

    #[test]
    fn test_append_then_scan() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pulse.db");
        let mut wal = Wal::open(&path, SyncMode::Normal, None).unwrap();
        wal.append_commit(&batch_with(b"a", b"1"), 1).unwrap();
        wal.append_commit(&batch_with(b"b", b"2"), 2).unwrap();
        drop(wal);

        let scan = scan(&path).unwrap();
        assert!(!scan.torn_tail);
        assert_eq!(scan.entries.len(), 6);
        assert_eq!(scan.entries[0], WalEntry::Begin { csn: 1 });
        assert_eq!(scan.entries[5], WalEntry::Commit { csn: 2 });
    }

    #[test]
    fn test_missing_file_scans_empty() {
        let dir = TempDir::new().unwrap();
        let scan = scan(&dir.path().join("absent.db")).unwrap();
        assert!(scan.entries.is_empty());
        assert_eq!(scan.good_offset, 0);
    }

    #[test]
    fn test_torn_tail_is_detected_and_truncated_on_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pulse.db");
        let mut wal = Wal::open(&path, SyncMode::Normal, None).unwrap();
        wal.append_commit(&batch_with(b"a", b"1"), 1).unwrap();
        drop(wal);

        // Simulate a torn write: append half a frame
        let good_len = std::fs::metadata(&path).unwrap().len();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0x55, 0x00, 0x00]).unwrap();
        drop(file);

        let result = scan(&path).unwrap();
        assert!(result.torn_tail);
        assert_eq!(result.good_offset, good_len);
        assert_eq!(result.entries.len(), 3);

        // Reopening with the good offset truncates the tail
        let wal = Wal::open(&path, SyncMode::Normal, Some(result.good_offset)).unwrap();
        drop(wal);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), good_len);
    }

    #[test]
    fn test_rewrite_checkpoint_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pulse.db");
        rewrite_checkpoint(
            &path,
            9,
            vec![
                (Table::Experiences, b"a".to_vec(), b"1".to_vec()),
                (Table::Metadata, b"csn".to_vec(), 9u64.to_le_bytes().to_vec()),
            ],
        )
        .unwrap();

        let result = scan(&path).unwrap();
        assert_eq!(result.entries.first(), Some(&WalEntry::Checkpoint { csn: 9 }));
        assert_eq!(result.entries.last(), Some(&WalEntry::Commit { csn: 9 }));
        assert_eq!(result.entries.len(), 4);
    }
}
