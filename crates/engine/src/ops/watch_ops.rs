//! Watch subscription and cross-process polling

use crate::database::{decode_row, Database, CHANGELOG_RING};
use crate::watch::{PollResult, WatchFilter, WatchSubscriber};
use pulse_core::{keys, CollectiveId, Csn, Result, WatchEvent};
use pulse_storage::Table;

impl Database {
    /// Subscribe to change events for one collective
    ///
    /// Delivery is bounded and non-blocking: a slow subscriber loses
    /// events (tracked by its lag counter) rather than stalling writers.
    /// Dropping the subscriber ends the subscription.
    pub fn watch_collective(
        &self,
        collective_id: CollectiveId,
        filter: Option<WatchFilter>,
    ) -> Result<WatchSubscriber> {
        self.catalog.require(collective_id)?;
        Ok(self.watch.subscribe(collective_id, filter))
    }

    /// Cross-process change polling over the persisted changelog ring
    ///
    /// Returns the events of `(since_csn, current]` for the collective,
    /// oldest first, plus the CSN to pass next time. `ring_truncated`
    /// reports that `since_csn` predates the ring, meaning events were
    /// lost to pruning and the caller should rescan the collective.
    pub fn poll_changes(&self, collective_id: CollectiveId, since_csn: Csn) -> Result<PollResult> {
        self.catalog.require(collective_id)?;
        let snapshot = self.snapshot()?;
        let csn = snapshot.csn();

        if since_csn >= csn {
            return Ok(PollResult {
                events: Vec::new(),
                csn,
                ring_truncated: false,
            });
        }

        let start = keys::changelog_key(since_csn + 1);
        let end = keys::changelog_key(csn.saturating_add(1));
        let mut events = Vec::new();
        for (_, bytes) in snapshot.scan_range(Table::Changelog, &start, &end, None, None)? {
            let event: WatchEvent = decode_row(&bytes)?;
            if event.collective_id == collective_id {
                events.push(event);
            }
        }

        Ok(PollResult {
            events,
            csn,
            ring_truncated: since_csn + CHANGELOG_RING < csn,
        })
    }
}
