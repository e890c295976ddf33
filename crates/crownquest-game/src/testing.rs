//! Shared fixtures for unit tests.

use crownquest_protocol::{Grid, Player, PlayerId, RoomSnapshot, Space, SpaceId, SpaceType};

pub fn pid(id: &str) -> PlayerId {
    PlayerId::new(id)
}

fn kind(id: SpaceId) -> SpaceType {
    match id {
        0 => SpaceType::Crown,
        12 => SpaceType::Start,
        24 => SpaceType::ShadowRealm,
        20 => SpaceType::Teleport,
        6 | 18 => SpaceType::Combat,
        2 | 7 | 16 => SpaceType::Good,
        8 | 11 | 22 => SpaceType::Bad,
        3 | 13 | 21 => SpaceType::Shop,
        _ => SpaceType::Neutral,
    }
}

/// 5×5 lattice with orthogonal links. The Crown (0) only connects to 1.
pub fn board() -> Grid {
    let spaces = (0..25)
        .map(|id: SpaceId| {
            let (r, c) = (id / 5, id % 5);
            let mut connections = Vec::new();
            if r > 0 {
                connections.push(id - 5);
            }
            if r < 4 {
                connections.push(id + 5);
            }
            if c > 0 {
                connections.push(id - 1);
            }
            if c < 4 {
                connections.push(id + 1);
            }
            connections.retain(|n| !matches!((id, *n), (0, 5) | (5, 0)));
            Space { id, kind: kind(id), connections }
        })
        .collect();
    Grid { spaces }
}

/// Three players on Start, Alice to move, game initialized.
pub fn room() -> RoomSnapshot {
    let mut state = RoomSnapshot::new(false, false, 12);
    state.players = vec![
        Player::new(pid("a"), "Alice", 1, 12),
        Player::new(pid("b"), "Bob", 1, 12),
        Player::new(pid("c"), "Cara", 1, 12),
    ];
    state.turn_order = vec![pid("a"), pid("b"), pid("c")];
    state.current_player = Some(pid("a"));
    state.init_complete = true;
    state
}
