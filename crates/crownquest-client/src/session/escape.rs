use crownquest_game::escape::{EscapePass, all_trapped, escape_pass};

use super::ClientSession;
use crate::{EscapeConfig, SyncError};

impl ClientSession {
    /// Everyone on the board stands in the Shadow Realm.
    pub fn everyone_trapped(&self) -> bool {
        match (&self.state, &self.grid) {
            (Some(state), Some(grid)) => all_trapped(state, grid),
            _ => false,
        }
    }

    /// Rolls emergency escape passes until somebody gets out.
    ///
    /// Each pass is published. Between passes the session keeps handling
    /// server events for `retry_delay`. Returns `None` if nobody is (or
    /// any longer) trapped.
    pub async fn run_escape(&mut self, config: &EscapeConfig) -> Result<Option<EscapePass>, SyncError> {
        let config = config.clone().validated();
        let mut passes = 0u32;
        while self.everyone_trapped() {
            let pass = self.act(|ctx| escape_pass(ctx, config.chance))?;
            passes += 1;
            if !pass.should_retry() {
                tracing::info!(passes, escaped = pass.escaped.len(), "emergency escape succeeded");
                return Ok(Some(pass));
            }
            self.idle(config.retry_delay).await?;
        }
        Ok(None)
    }
}
