//! Snapshot validation and the bounded resync budget.
//!
//! Every `state` the server pushes is checked against what this client
//! knows about itself. A corrupted turn order is unrecoverable; anything
//! else is treated as a transient disagreement and answered with a
//! delayed `requestState`, at most [`SyncConfig::retry_budget`] times in
//! a row.

use std::collections::HashSet;
use std::time::Duration;

use crownquest_protocol::{PlayerId, RoomSnapshot};

use crate::{SyncConfig, SyncError};

/// Outcome of checking a pushed snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotCheck {
    Consistent,
    /// Recoverable disagreement; ask the server again.
    Diverged(&'static str),
}

/// Whether `ids` lists somebody twice.
pub fn has_duplicates(ids: &[PlayerId]) -> bool {
    let mut seen = HashSet::with_capacity(ids.len());
    !ids.iter().all(|id| seen.insert(id))
}

/// Checks `state` from the point of view of player `me`.
///
/// # Errors
/// Returns [`SyncError::TurnOrderCorrupted`] if the turn order repeats a
/// player.
pub fn check_snapshot(state: &RoomSnapshot, me: &PlayerId) -> Result<SnapshotCheck, SyncError> {
    if has_duplicates(&state.turn_order) {
        return Err(SyncError::TurnOrderCorrupted);
    }
    if state.player(me).is_none() {
        return Ok(SnapshotCheck::Diverged("local player missing from roster"));
    }
    if !state.init_complete {
        return Ok(SnapshotCheck::Consistent);
    }
    if !state.turn_order.contains(me) {
        return Ok(SnapshotCheck::Diverged("local player missing from turn order"));
    }
    if let Some(current) = &state.current_player {
        if !state.turn_order.contains(current) {
            return Ok(SnapshotCheck::Diverged("current player outside turn order"));
        }
    }
    Ok(SnapshotCheck::Consistent)
}

/// Counts consecutive divergences against the retry budget.
#[derive(Debug, Clone)]
pub struct SyncTracker {
    config: SyncConfig,
    attempts: u32,
}

impl SyncTracker {
    pub fn new(config: SyncConfig) -> Self {
        Self { config, attempts: 0 }
    }

    /// Resync requests sent since the last consistent snapshot.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Records a divergence and returns how long to wait before asking
    /// for state again.
    ///
    /// # Errors
    /// Returns [`SyncError::Divergence`] once the budget is spent.
    pub fn diverged(&mut self) -> Result<Duration, SyncError> {
        if self.attempts >= self.config.retry_budget {
            tracing::error!(attempts = self.attempts, "resync budget exhausted");
            return Err(SyncError::Divergence { attempts: self.attempts });
        }
        self.attempts += 1;
        Ok(self.config.retry_delay)
    }

    /// A consistent snapshot arrived; the budget starts over.
    pub fn converged(&mut self) {
        if self.attempts > 0 {
            tracing::debug!(attempts = self.attempts, "state reconverged");
        }
        self.attempts = 0;
    }
}
