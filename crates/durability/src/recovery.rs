//! Crash recovery
//!
//! Replays a scanned log into empty memtables. Only complete
//! `Begin`/`Checkpoint` → `Commit` spans are applied; an uncommitted
//! suffix (in-flight change at crash time) is discarded. The result is
//! exactly the set of committed changes — or, after a `Fast`-mode crash,
//! a committed prefix of them.

use crate::wal::{validate_checkpoint_csn, WalEntry, WalScan};
use pulse_core::{Csn, PulseError, Result};
use pulse_storage::{MemTables, WriteBatch};
use tracing::{info, warn};

/// Outcome of a successful replay
#[derive(Debug)]
pub struct RecoveryReport {
    /// CSN of the last committed change (0 for an empty database)
    pub last_csn: Csn,
    /// Number of committed changes applied
    pub committed: u64,
    /// True if a torn tail or an uncommitted suffix was discarded
    pub discarded_suffix: bool,
}

/// Replay a scanned log into `tables`
///
/// `tables` must be freshly created. Malformed entry sequences (a commit
/// without a begin, a CSN that goes backwards, rows outside any change)
/// cannot be produced by this engine and are reported as corruption.
pub fn replay(scan: WalScan, tables: &MemTables) -> Result<RecoveryReport> {
    let mut pending: Option<(Csn, WriteBatch)> = None;
    let mut last_csn: Csn = 0;
    let mut committed: u64 = 0;

    for entry in scan.entries {
        match entry {
            WalEntry::Begin { csn } => {
                if pending.is_some() {
                    return Err(PulseError::Corrupt(
                        "nested change in log: Begin inside an open change".into(),
                    ));
                }
                if csn <= last_csn {
                    return Err(PulseError::Corrupt(format!(
                        "non-monotone CSN in log: {csn} after {last_csn}"
                    )));
                }
                pending = Some((csn, WriteBatch::new()));
            }
            WalEntry::Checkpoint { csn } => {
                validate_checkpoint_csn(csn)?;
                if pending.is_some() || last_csn != 0 {
                    return Err(PulseError::Corrupt(
                        "checkpoint is only valid at the head of the log".into(),
                    ));
                }
                pending = Some((csn, WriteBatch::new()));
            }
            WalEntry::Write { table, key, value } => match pending.as_mut() {
                Some((_, batch)) => batch.put(table, key, value),
                None => {
                    return Err(PulseError::Corrupt(
                        "row entry outside any change".into(),
                    ))
                }
            },
            WalEntry::Delete { table, key } => match pending.as_mut() {
                Some((_, batch)) => batch.delete(table, key),
                None => {
                    return Err(PulseError::Corrupt(
                        "row entry outside any change".into(),
                    ))
                }
            },
            WalEntry::Commit { csn } => match pending.take() {
                Some((open_csn, batch)) if open_csn == csn => {
                    tables.apply(&batch, csn);
                    last_csn = csn;
                    committed += 1;
                }
                Some((open_csn, _)) => {
                    return Err(PulseError::Corrupt(format!(
                        "commit CSN {csn} does not match open change {open_csn}"
                    )));
                }
                None => {
                    return Err(PulseError::Corrupt("commit without an open change".into()));
                }
            },
        }
    }

    let discarded_suffix = scan.torn_tail || pending.is_some();
    if let Some((csn, _)) = pending {
        warn!(csn, "discarding uncommitted change at log tail");
    }
    info!(last_csn, committed, "log replay complete");

    Ok(RecoveryReport {
        last_csn,
        committed,
        discarded_suffix,
    })
}
