//! Field-level merge of a client `update` into the stored snapshot.
//!
//! Players are merged by id: fields present in a [`PlayerPatch`] overwrite
//! the stored player, absent ones are kept. Patches naming an id that is
//! not seated are dropped, since only the room admits new players. Every
//! other key present in the patch replaces the stored value wholesale.

use crownquest_protocol::{Player, PlayerPatch, RoomSnapshot, StatePatch};

use crate::RoomError;

/// Rejects `patch` if it was computed from an older snapshot than `stored`.
pub fn check_base(stored: &RoomSnapshot, patch: &StatePatch) -> Result<(), RoomError> {
    match patch.base_version {
        Some(base) if base < stored.version => Err(RoomError::StaleUpdate {
            base,
            current: stored.version,
        }),
        _ => Ok(()),
    }
}

/// Applies `patch` to `snapshot` and bumps its version.
pub fn apply_patch(snapshot: &mut RoomSnapshot, patch: StatePatch) {
    let StatePatch {
        base_version: _,
        players,
        current_player,
        round,
        turn_order,
        log,
        memory_mode,
        random_start_space,
        start_space_id,
        traps,
        goblins,
        gold_piles,
        game_over,
        shop_access,
    } = patch;

    for p in players.into_iter().flatten() {
        match snapshot.player_mut(&p.id) {
            Some(stored) => merge_player(stored, p),
            None => tracing::debug!(player_id = %p.id, "update for unseated player dropped"),
        }
    }

    replace(&mut snapshot.current_player, current_player);
    replace(&mut snapshot.round, round);
    replace(&mut snapshot.turn_order, turn_order);
    replace(&mut snapshot.log, log);
    replace(&mut snapshot.memory_mode, memory_mode);
    replace(&mut snapshot.random_start_space, random_start_space);
    replace(&mut snapshot.start_space_id, start_space_id);
    replace(&mut snapshot.traps, traps);
    replace(&mut snapshot.goblins, goblins);
    replace(&mut snapshot.gold_piles, gold_piles);
    replace(&mut snapshot.game_over, game_over);
    replace(&mut snapshot.shop_access, shop_access);

    snapshot.version += 1;
}

fn merge_player(stored: &mut Player, patch: PlayerPatch) {
    replace(&mut stored.name, patch.name);
    replace(&mut stored.gold, patch.gold);
    replace(&mut stored.items, patch.items);
    replace(&mut stored.position, patch.position);
    replace(&mut stored.has_moved, patch.has_moved);
    replace(&mut stored.shadow_turns, patch.shadow_turns);
    replace(&mut stored.spins_remaining, patch.spins_remaining);
    replace(&mut stored.pending_wheel, patch.pending_wheel);
}

fn replace<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}
