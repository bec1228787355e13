//! Agent activity tracking
//!
//! A row per `(collective, agent)`, kept fresh by heartbeats. Agents
//! whose heartbeat is older than the stale threshold drop out of
//! active-agent queries; the rows age out of sight, not out of storage.

use crate::database::{decode_row, Change, Database};
use pulse_core::{keys, now_millis, Activity, AgentId, CollectiveId, PulseError, Result};
use pulse_storage::{Snapshot, Table};

impl Database {
    /// Register (or refresh) an agent's presence in a collective
    ///
    /// Upserts on `(collective, agent)`: a re-registration keeps the
    /// original `started_at` and updates the task and heartbeat.
    pub fn register_activity(
        &self,
        collective_id: CollectiveId,
        agent_id: AgentId,
        current_task: Option<String>,
    ) -> Result<Activity> {
        self.catalog.require(collective_id)?;

        self.commit_with(|snapshot, _, now| {
            let key = keys::activity_key(collective_id, &agent_id);
            let started_at = match snapshot.get(Table::Activities, &key) {
                Some(bytes) => decode_row::<Activity>(&bytes)?.started_at,
                None => now,
            };
            let activity = Activity {
                collective_id,
                agent_id: agent_id.clone(),
                current_task: current_task.clone(),
                started_at,
                last_heartbeat: now,
            };

            let mut change = Change::new();
            change
                .batch
                .put(Table::Activities, key, bincode::serialize(&activity)?);
            Ok((change, activity))
        })
    }

    /// Refresh only the heartbeat of a registered activity
    pub fn update_heartbeat(&self, collective_id: CollectiveId, agent_id: &AgentId) -> Result<()> {
        self.commit_with(|snapshot, _, now| {
            let key = keys::activity_key(collective_id, agent_id);
            let mut activity: Activity = decode_row(
                &snapshot
                    .get(Table::Activities, &key)
                    .ok_or_else(|| PulseError::not_found("activity", agent_id))?,
            )?;
            activity.last_heartbeat = now;

            let mut change = Change::new();
            change
                .batch
                .put(Table::Activities, key, bincode::serialize(&activity)?);
            Ok((change, ()))
        })
    }

    /// Remove an agent's activity row
    pub fn end_activity(&self, collective_id: CollectiveId, agent_id: &AgentId) -> Result<()> {
        self.commit_with(|snapshot, _, _| {
            let key = keys::activity_key(collective_id, agent_id);
            if snapshot.get(Table::Activities, &key).is_none() {
                return Err(PulseError::not_found("activity", agent_id));
            }
            let mut change = Change::new();
            change.batch.delete(Table::Activities, key);
            Ok((change, ()))
        })
    }

    /// Agents whose heartbeat is within the stale threshold
    pub fn get_active_agents(&self, collective_id: CollectiveId) -> Result<Vec<Activity>> {
        let snapshot = self.snapshot()?;
        self.active_agents_in(&snapshot, collective_id)
    }

    pub(crate) fn active_agents_in(
        &self,
        snapshot: &Snapshot,
        collective_id: CollectiveId,
    ) -> Result<Vec<Activity>> {
        self.catalog.require(collective_id)?;
        let threshold_ms = self.config().limits.stale_agent_threshold.as_millis() as u64;
        let now = now_millis();

        let prefix = keys::activity_prefix(collective_id);
        let mut active = Vec::new();
        for (_, bytes) in snapshot.scan_prefix(Table::Activities, &prefix, None, None)? {
            let activity: Activity = decode_row(&bytes)?;
            if now.saturating_sub(activity.last_heartbeat) <= threshold_ms {
                active.push(activity);
            }
        }
        Ok(active)
    }
}
