//! Emergency escape when every player is stuck in the Shadow Realm.
//!
//! One [`escape_pass`] rolls for each trapped player. The caller repeats
//! passes (with a delay between them) until [`EscapePass::escaped`] is
//! non-empty; see `crownquest-client` for the async loop.

use crownquest_protocol::{Grid, PlayerId, RoomSnapshot, SpaceType};
use rand::Rng;

use crate::{GameContext, GameError};

/// Chance that a single trapped player escapes on one pass.
pub const ESCAPE_CHANCE: f64 = 0.5;

/// Whether the roster is non-empty and everyone stands in the Shadow Realm.
pub fn all_trapped(state: &RoomSnapshot, grid: &Grid) -> bool {
    let Some(realm) = grid.first_of(SpaceType::ShadowRealm) else {
        return false;
    };
    !state.players.is_empty() && state.players.iter().all(|p| p.position == realm)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EscapePass {
    pub escaped: Vec<PlayerId>,
}

impl EscapePass {
    /// Nobody got out; another pass is due.
    pub fn should_retry(&self) -> bool {
        self.escaped.is_empty()
    }
}

/// Rolls once for every player in the Shadow Realm. Escapees land on a
/// random neighbor of the realm with their shadow counter cleared.
pub fn escape_pass(ctx: &mut GameContext<'_>, chance: f64) -> Result<EscapePass, GameError> {
    let realm = ctx.shadow_realm()?;
    let exits = ctx.grid.neighbors(realm).to_vec();
    let trapped: Vec<PlayerId> = ctx
        .state
        .players
        .iter()
        .filter(|p| p.position == realm)
        .map(|p| p.id.clone())
        .collect();
    if exits.is_empty() && !trapped.is_empty() {
        tracing::error!(realm, "shadow realm has no exits");
        return Err(GameError::NoExit(realm));
    }

    let mut pass = EscapePass::default();
    for id in trapped {
        let name = ctx.name_of(&id)?;
        let rolled = ctx.rng.random_bool(chance.clamp(0.0, 1.0));
        let exit = if rolled { ctx.pick(&exits) } else { None };
        match exit {
            Some(dest) => {
                let kind = ctx.space_kind(dest)?;
                let player = ctx.player_mut(&id)?;
                player.position = dest;
                player.shadow_turns = 0;
                ctx.log(format!(
                    "{name} escaped Shadow Realm via emergency escape to {kind}!"
                ));
                pass.escaped.push(id);
            }
            None => ctx.log(format!("{name} failed to escape Shadow Realm")),
        }
    }

    if pass.should_retry() && all_trapped(ctx.state, ctx.grid) {
        ctx.log("No one escaped! Trying again...");
    }
    tracing::debug!(escaped = pass.escaped.len(), "emergency escape pass");
    Ok(pass)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Decline;
    use crate::testing::{board, room};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn trapped_room() -> RoomSnapshot {
        let mut state = room();
        for p in &mut state.players {
            p.position = 24;
            p.shadow_turns = 3;
        }
        state
    }

    #[test]
    fn test_all_trapped_detects_full_realm() {
        let grid = board();
        assert!(all_trapped(&trapped_room(), &grid));
        assert!(!all_trapped(&room(), &grid));
    }

    #[test]
    fn test_escape_pass_with_certain_chance_frees_everyone() {
        let grid = board();
        let mut state = trapped_room();
        let mut rng = StdRng::seed_from_u64(3);
        let mut chooser = Decline;
        let mut ctx = GameContext::new(&mut state, &grid, &mut rng, &mut chooser);

        let pass = escape_pass(&mut ctx, 1.0).unwrap();

        assert_eq!(pass.escaped.len(), 3);
        for p in &state.players {
            assert!([19, 23].contains(&p.position));
            assert_eq!(p.shadow_turns, 0);
        }
    }

    #[test]
    fn test_escape_pass_with_zero_chance_asks_for_retry() {
        let grid = board();
        let mut state = trapped_room();
        let mut rng = StdRng::seed_from_u64(3);
        let mut chooser = Decline;
        let mut ctx = GameContext::new(&mut state, &grid, &mut rng, &mut chooser);

        let pass = escape_pass(&mut ctx, 0.0).unwrap();

        assert!(pass.should_retry());
        assert_eq!(state.log.last().unwrap(), "No one escaped! Trying again...");
        assert!(all_trapped(&state, &grid));
    }

    #[test]
    fn test_escape_pass_from_dead_end_realm_fails() {
        let mut grid = board();
        grid.spaces[24].connections.clear();
        let mut state = trapped_room();
        let before = state.clone();
        let mut rng = StdRng::seed_from_u64(3);
        let mut chooser = Decline;
        let mut ctx = GameContext::new(&mut state, &grid, &mut rng, &mut chooser);

        let err = escape_pass(&mut ctx, 1.0).unwrap_err();

        assert_eq!(err, GameError::NoExit(24));
        assert_eq!(state, before);
    }

    #[test]
    fn test_repeated_passes_never_end_with_everyone_trapped() {
        let grid = board();
        for seed in 0..50 {
            let mut state = trapped_room();
            let mut rng = StdRng::seed_from_u64(seed);
            let mut chooser = Decline;
            let mut ctx = GameContext::new(&mut state, &grid, &mut rng, &mut chooser);
            while escape_pass(&mut ctx, ESCAPE_CHANCE).unwrap().should_retry() {}
            assert!(!all_trapped(&state, &grid), "seed {seed}");
        }
    }
}
