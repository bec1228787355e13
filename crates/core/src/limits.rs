//! Size and resource limits
//!
//! Hard content bounds are fixed by the data model; resource limits are
//! configurable per database and enforced by the engine.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Maximum experience/insight content length in bytes (100 KiB)
pub const MAX_CONTENT_BYTES: usize = 100 * 1024;

/// Maximum number of domain tags per experience
pub const MAX_DOMAIN_TAGS: usize = 10;

/// Maximum domain tag length in characters
pub const MAX_DOMAIN_TAG_CHARS: usize = 100;

/// Maximum number of source files per experience
pub const MAX_SOURCE_FILES: usize = 10;

/// Maximum source file path length in characters
pub const MAX_SOURCE_FILE_CHARS: usize = 500;

/// Maximum `k` accepted by similarity search
pub const MAX_SEARCH_K: usize = 1000;

/// Configurable resource limits
///
/// All quota violations surface as `ResourceLimit`; they are reported,
/// never retried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    /// Maximum experiences per collective (None = unbounded)
    pub max_experiences_per_collective: Option<u64>,
    /// Maximum total bytes across the database files (None = unbounded)
    pub max_total_bytes: Option<u64>,
    /// Maximum concurrently open read snapshots
    pub max_read_snapshots: usize,
    /// Deadline applied to long read scans (None = unbounded)
    pub query_timeout: Option<Duration>,
    /// Writer lock acquisition timeout
    pub writer_lock_timeout: Duration,
    /// Cross-process file lock acquisition timeout
    pub file_lock_timeout: Duration,
    /// Per-subscriber watch channel capacity
    pub watch_buffer_size: usize,
    /// Heartbeats older than this make an agent inactive
    pub stale_agent_threshold: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_experiences_per_collective: None,
            max_total_bytes: None,
            max_read_snapshots: 100,
            query_timeout: None,
            writer_lock_timeout: Duration::from_secs(30),
            file_lock_timeout: Duration::from_secs(30),
            watch_buffer_size: 1000,
            stale_agent_threshold: Duration::from_secs(300),
        }
    }
}
