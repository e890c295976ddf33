//! Client timing and retry knobs.

use std::time::Duration;

use crownquest_game::escape::ESCAPE_CHANCE;

/// How hard the client tries to reconverge with the server.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// `requestState` attempts allowed before divergence becomes fatal.
    pub retry_budget: u32,
    /// Pause before each `requestState`.
    pub retry_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            retry_budget: 5,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Fixed delays that pace a minigame on every client.
#[derive(Debug, Clone)]
pub struct MinigameTiming {
    /// Countdown shown before the first move.
    pub countdown: Duration,
    /// How long all Triple Clash bets stay on screen before the round settles.
    pub result_display: Duration,
    /// Pause between a settled round and the next one.
    pub next_round: Duration,
    /// How long the end screen is shown before rewards are paid.
    pub end_screen: Duration,
}

impl Default for MinigameTiming {
    fn default() -> Self {
        Self {
            countdown: Duration::from_secs(3),
            result_display: Duration::from_millis(500),
            next_round: Duration::from_secs(3),
            end_screen: Duration::from_secs(2),
        }
    }
}

/// Emergency escape pacing.
#[derive(Debug, Clone)]
pub struct EscapeConfig {
    /// Per-player chance of getting out on one pass.
    pub chance: f64,
    /// Wait between passes when nobody escaped.
    pub retry_delay: Duration,
}

impl Default for EscapeConfig {
    fn default() -> Self {
        Self {
            chance: ESCAPE_CHANCE,
            retry_delay: Duration::from_secs(2),
        }
    }
}

impl EscapeConfig {
    /// Clamps `chance` into `0.0..=1.0`.
    pub fn validated(mut self) -> Self {
        if !(0.0..=1.0).contains(&self.chance) {
            tracing::warn!(chance = self.chance, "escape chance out of range, clamping");
            self.chance = if self.chance.is_nan() { ESCAPE_CHANCE } else { self.chance.clamp(0.0, 1.0) };
        }
        self
    }
}
