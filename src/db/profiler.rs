//! Timing hook called by drivers around every statement.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::debug;

/// Group name drivers use for their statements.
pub const DATABASE_GROUP: &str = "Database";

/// Handle to a running timing scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProfileToken(u64);

impl ProfileToken {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Start/stop/discard timing contract.
///
/// A driver calls `start` before issuing a statement, then exactly one of
/// `stop` (success) or `discard` (failure) with the returned token.
pub trait Profiler: Send + Sync {
    fn start(&self, group: &str, statement: &str) -> ProfileToken;
    fn stop(&self, token: ProfileToken);
    fn discard(&self, token: ProfileToken);
}

/// Profiler that reports finished statements as `tracing` events.
#[derive(Debug, Default)]
pub struct TracingProfiler {
    next_id: AtomicU64,
    running: Mutex<HashMap<ProfileToken, (String, String, Instant)>>,
}

impl TracingProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    fn take(&self, token: ProfileToken) -> Option<(String, String, Instant)> {
        self.running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&token)
    }

    /// Number of scopes started and not yet finished.
    pub fn running(&self) -> usize {
        self.running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl Profiler for TracingProfiler {
    fn start(&self, group: &str, statement: &str) -> ProfileToken {
        let token = ProfileToken(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(token, (group.to_string(), statement.to_string(), Instant::now()));
        token
    }

    fn stop(&self, token: ProfileToken) {
        if let Some((group, statement, started)) = self.take(token) {
            debug!(
                group = %group,
                elapsed_ms = started.elapsed().as_millis() as u64,
                sql = %statement,
                "Statement finished"
            );
        }
    }

    fn discard(&self, token: ProfileToken) {
        self.take(token);
    }
}
