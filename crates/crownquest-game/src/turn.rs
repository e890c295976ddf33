//! The turn engine: moving, landing, and handing the turn on.
//!
//! Each client runs these rules against its own mirror of the snapshot and
//! then publishes the result; the relay trusts what it receives. Illegal
//! calls are turn violations: they are logged locally and change nothing.
//!
//! ```text
//! AwaitingMove ──make_move──▶ AwaitingSpin ──spin──▶ AwaitingEndTurn
//!      ▲           (wheel space)                       │
//!      └────────────── next_turn (next player) ◀───────┘
//! ```

use crownquest_protocol::{Gold, Grid, Item, PlayerId, RoomSnapshot, SpaceId, SpaceType};

use crate::escape;
use crate::pathing::{self, Direction};
use crate::wheel::WheelKind;
use crate::{GameContext, GameError, TurnViolation};

/// Gold needed (and paid) to claim the Crown.
pub const CROWN_PRICE: Gold = 5;
/// Reason broadcast when the Crown is claimed.
pub const CROWN_REASON: &str = "Crown reached";
/// Gold awarded for landing on Start.
pub const START_BONUS: Gold = 1;
/// Most a trap can take.
pub const TRAP_TOLL: Gold = 2;
/// Most a goblin can take.
pub const GOBLIN_TOLL: Gold = 1;
/// A goblin retires after this many moves.
pub const GOBLIN_MAX_MOVES: u32 = 5;
/// Roster size at which the game runs.
pub const PLAYERS_PER_GAME: usize = 3;

/// Where a given player stands in the turn cycle, derived from the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    /// Fewer than three players so far.
    Waiting,
    NotYourTurn,
    AwaitingMove,
    /// Current player is in the Shadow Realm and must spin to act.
    AwaitingShadowSpin,
    /// Landed on a wheel space (or owes a Spin Again) and has not spun.
    AwaitingSpin(WheelKind),
    AwaitingEndTurn,
    GameOver,
}

pub fn phase(state: &RoomSnapshot, grid: &Grid, me: &PlayerId) -> TurnPhase {
    if state.game_over {
        return TurnPhase::GameOver;
    }
    if !state.init_complete {
        return TurnPhase::Waiting;
    }
    if !state.is_current(me) {
        return TurnPhase::NotYourTurn;
    }
    let Some(player) = state.player(me) else {
        return TurnPhase::NotYourTurn;
    };
    if let Some(wheel) = player.pending_wheel {
        TurnPhase::AwaitingSpin(wheel)
    } else if player.has_moved {
        TurnPhase::AwaitingEndTurn
    } else if grid.kind_of(player.position) == Some(SpaceType::ShadowRealm) {
        TurnPhase::AwaitingShadowSpin
    } else {
        TurnPhase::AwaitingMove
    }
}

/// What the landing left pending for the mover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Landing {
    /// Nothing further; the player may end the turn.
    Settled,
    /// The wheel for this space must be spun before the turn can end.
    Wheel(WheelKind),
    /// Landed in the Shadow Realm; a Shadow spin is owed.
    ShadowRealm,
    /// The Crown was claimed: the game is over and the client must announce
    /// it with [`CROWN_REASON`].
    CrownClaimed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveReport {
    pub direction: Option<Direction>,
    pub landing: Landing,
}

/// Result of a successful [`next_turn`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnAdvance {
    pub next: PlayerId,
    pub new_round: bool,
    /// Every player ended up in the Shadow Realm; the caller must run the
    /// emergency escape.
    pub all_trapped: bool,
}

fn reject(actor: &PlayerId, action: &str, violation: TurnViolation) -> GameError {
    tracing::warn!(%actor, action, %violation, "turn violation");
    GameError::Turn(violation)
}

// ---------------------------------------------------------------------------
// make_move
// ---------------------------------------------------------------------------

/// Moves `actor` to the connected space `target` and resolves the landing.
pub fn make_move(
    ctx: &mut GameContext<'_>,
    actor: &PlayerId,
    target: SpaceId,
) -> Result<MoveReport, GameError> {
    if ctx.state.game_over {
        return Err(reject(actor, "move", TurnViolation::GameOver));
    }
    if !ctx.state.init_complete {
        return Err(reject(actor, "move", TurnViolation::NotInitialized));
    }
    if !ctx.state.is_current(actor) {
        return Err(reject(actor, "move", TurnViolation::NotYourTurn));
    }
    let player = ctx.player(actor)?;
    if player.has_moved {
        return Err(reject(actor, "move", TurnViolation::AlreadyMoved));
    }
    let from = player.position;
    if ctx.space_kind(from)? == SpaceType::ShadowRealm {
        return Err(reject(actor, "move", TurnViolation::MustSpinShadowWheel));
    }
    if !ctx.grid.is_adjacent(from, target) {
        tracing::warn!(%actor, from, target, "move to unconnected space");
        return Err(GameError::NotConnected { from, to: target });
    }
    let landed_on = ctx.space_kind(target)?;

    let direction = pathing::direction(from, target);
    let player = ctx.player_mut(actor)?;
    player.position = target;
    player.has_moved = true;
    let name = player.name.clone();
    let dir = direction.map_or_else(|| "nowhere".to_string(), |d| d.to_string());
    ctx.log(format!("{name} moved {dir} and landed on a {landed_on} space"));

    let landing = resolve_landing(ctx, actor)?;
    tracing::debug!(%actor, from, target, ?landing, "move resolved");
    Ok(MoveReport { direction, landing })
}

// ---------------------------------------------------------------------------
// Landing effects
// ---------------------------------------------------------------------------

/// Applies everything that happens when `actor` arrives on their current
/// space: gold pile, then a foreign trap, then the space type's effect.
pub fn resolve_landing(ctx: &mut GameContext<'_>, actor: &PlayerId) -> Result<Landing, GameError> {
    resolve_landing_at_depth(ctx, actor, 0)
}

fn resolve_landing_at_depth(
    ctx: &mut GameContext<'_>,
    actor: &PlayerId,
    depth: u8,
) -> Result<Landing, GameError> {
    let pos = ctx.player(actor)?.position;
    let name = ctx.name_of(actor)?;

    claim_gold_pile(ctx, actor, pos, &name)?;
    spring_trap(ctx, actor, pos, &name)?;

    let landing = match ctx.space_kind(pos)? {
        SpaceType::Start => {
            ctx.player_mut(actor)?.gold += START_BONUS;
            ctx.log(format!("{name} gained 1 gold from Start space"));
            Landing::Settled
        }
        SpaceType::Good => owe_spin(ctx, actor, WheelKind::Good)?,
        SpaceType::Bad => owe_spin(ctx, actor, WheelKind::Bad)?,
        SpaceType::Combat => owe_spin(ctx, actor, WheelKind::Combat)?,
        SpaceType::Teleport if depth == 0 => {
            let choices = ctx.non_adjacent(pos);
            match ctx.pick(&choices) {
                Some(dest) => {
                    let kind = ctx.space_kind(dest)?;
                    let player = ctx.player_mut(actor)?;
                    player.position = dest;
                    player.has_moved = true;
                    ctx.log(format!("{name} teleported to {kind}"));
                    resolve_landing_at_depth(ctx, actor, depth + 1)?
                }
                None => Landing::Settled,
            }
        }
        SpaceType::Teleport => Landing::Settled,
        SpaceType::ShadowRealm => {
            ctx.player_mut(actor)?.shadow_turns += 1;
            ctx.log(format!("{name} entered Shadow Realm, must spin to exit"));
            Landing::ShadowRealm
        }
        SpaceType::Crown => {
            let player = ctx.player_mut(actor)?;
            if player.gold >= CROWN_PRICE {
                player.gold -= CROWN_PRICE;
                ctx.state.game_over = true;
                ctx.log(format!(
                    "{name} reached the Crown (5 gold paid) - Quest Concluded!"
                ));
                tracing::info!(%actor, "crown claimed");
                Landing::CrownClaimed
            } else {
                player.has_moved = true;
                ctx.log(format!(
                    "{name} reached the Crown but lacks 5 gold to claim it. Must earn more gold."
                ));
                Landing::Settled
            }
        }
        SpaceType::Shop | SpaceType::Neutral => Landing::Settled,
    };
    Ok(landing)
}

/// Marks `wheel` as owed; the turn cannot end until it is spun.
fn owe_spin(
    ctx: &mut GameContext<'_>,
    actor: &PlayerId,
    wheel: WheelKind,
) -> Result<Landing, GameError> {
    ctx.player_mut(actor)?.pending_wheel = Some(wheel);
    Ok(Landing::Wheel(wheel))
}

fn claim_gold_pile(
    ctx: &mut GameContext<'_>,
    actor: &PlayerId,
    pos: SpaceId,
    name: &str,
) -> Result<(), GameError> {
    let Some(idx) = ctx.state.gold_piles.iter().position(|g| g.space == pos) else {
        return Ok(());
    };
    let pile = ctx.state.gold_piles.remove(idx);
    ctx.player_mut(actor)?.gold += pile.amount;
    ctx.log(format!("{name} claimed {} gold", pile.amount));
    Ok(())
}

fn spring_trap(
    ctx: &mut GameContext<'_>,
    actor: &PlayerId,
    pos: SpaceId,
    name: &str,
) -> Result<(), GameError> {
    let Some(idx) = ctx
        .state
        .traps
        .iter()
        .position(|t| t.space == pos && &t.owner != actor)
    else {
        return Ok(());
    };
    // The trap is spent whatever happens next.
    let trap = ctx.state.traps.remove(idx);
    let owner_name = ctx.name_of(&trap.owner)?;

    if ctx.player_mut(actor)?.take_item(Item::WardingTalisman) {
        ctx.log(format!("{name} repelled {owner_name}'s trap with Warding Talisman"));
        return Ok(());
    }

    let amount = ctx.take_gold(actor, TRAP_TOLL)?;
    ctx.player_mut(&trap.owner)?.gold += amount;
    ctx.log(format!(
        "{name} triggered {owner_name}'s trap, loses {amount} gold"
    ));
    Ok(())
}

// ---------------------------------------------------------------------------
// next_turn
// ---------------------------------------------------------------------------

/// Hands the turn from `actor` to the next player in turn order.
pub fn next_turn(ctx: &mut GameContext<'_>, actor: &PlayerId) -> Result<TurnAdvance, GameError> {
    if ctx.state.game_over {
        return Err(reject(actor, "end turn", TurnViolation::GameOver));
    }
    if !ctx.state.init_complete || ctx.state.players.len() != PLAYERS_PER_GAME {
        return Err(reject(actor, "end turn", TurnViolation::NotInitialized));
    }
    if !ctx.state.is_current(actor) {
        return Err(reject(actor, "end turn", TurnViolation::NotYourTurn));
    }
    let player = ctx.player(actor)?;
    if let Some(wheel) = player.pending_wheel {
        return Err(reject(actor, "end turn", TurnViolation::SpinPending(wheel)));
    }
    let pos = player.position;
    let stuck = ctx.grid.neighbors(pos).is_empty();
    let in_realm = ctx.space_kind(pos)? == SpaceType::ShadowRealm;
    if !player.has_moved && !stuck && !in_realm {
        return Err(reject(actor, "end turn", TurnViolation::NotYetMoved));
    }

    let order = &ctx.state.turn_order;
    let idx = order.iter().position(|id| id == actor).unwrap_or(0);
    let new_round = idx + 1 >= order.len();
    let next = if new_round {
        order.first().cloned()
    } else {
        order.get(idx + 1).cloned()
    }
    .ok_or(TurnViolation::NotInitialized)?;

    if new_round {
        ctx.state.round += 1;
        if ctx.state.memory_mode {
            ctx.state.log.clear();
            let round = ctx.state.round;
            ctx.log(format!(
                "Round {round} begins - Log cleared (Memory Mode)."
            ));
        }
    }
    ctx.state.current_player = Some(next.clone());
    for p in &mut ctx.state.players {
        p.has_moved = false;
    }

    announce_turn(ctx, &next)?;
    advance_goblins(ctx)?;
    ctx.state.shop_access = false;

    let all_trapped = escape::all_trapped(ctx.state, ctx.grid);
    if all_trapped {
        ctx.log("All players are in the Shadow Realm! Emergency escape sequence initiated...");
    }
    tracing::debug!(%actor, %next, new_round, all_trapped, "turn advanced");
    Ok(TurnAdvance { next, new_round, all_trapped })
}

fn announce_turn(ctx: &mut GameContext<'_>, next: &PlayerId) -> Result<(), GameError> {
    let pos = ctx.player(next)?.position;
    let name = ctx.name_of(next)?;
    if ctx.space_kind(pos)? == SpaceType::ShadowRealm {
        let player = ctx.player_mut(next)?;
        player.shadow_turns += 1;
        let turns = player.shadow_turns;
        ctx.log(format!(
            "{name}'s turn: In Shadow Realm (Turn {turns}), must spin to exit"
        ));
        return Ok(());
    }
    let dirs = pathing::available_directions(ctx.grid, pos);
    if dirs.is_empty() {
        ctx.log(format!("{name}'s turn: No valid moves available"));
    } else {
        let list: Vec<String> = dirs.iter().map(ToString::to_string).collect();
        ctx.log(format!("{name}'s turn: Can move {}", list.join(", ")));
    }
    Ok(())
}

/// One random step for every active goblin; a goblin that reaches a
/// non-owner steals and retires.
fn advance_goblins(ctx: &mut GameContext<'_>) -> Result<(), GameError> {
    ctx.state.goblins.retain(|g| g.moves < GOBLIN_MAX_MOVES);

    for i in 0..ctx.state.goblins.len() {
        let from = ctx.state.goblins[i].space;
        let grid = ctx.grid;
        let Some(to) = ctx.pick(grid.neighbors(from)) else {
            continue;
        };
        let owner = ctx.state.goblins[i].owner.clone();
        ctx.state.goblins[i].space = to;
        ctx.state.goblins[i].moves += 1;

        let victim = ctx
            .state
            .players
            .iter()
            .find(|p| p.position == to && p.id != owner)
            .map(|p| p.id.clone());
        let Some(victim) = victim else { continue };

        let amount = ctx.take_gold(&victim, GOBLIN_TOLL)?;
        ctx.player_mut(&owner)?.gold += amount;
        ctx.state.goblins[i].moves = GOBLIN_MAX_MOVES;
        let (owner_name, victim_name) = (ctx.name_of(&owner)?, ctx.name_of(&victim)?);
        ctx.log(format!(
            "Goblin ({owner_name}) stole {amount} gold from {victim_name}"
        ));
    }

    ctx.state.goblins.retain(|g| g.moves < GOBLIN_MAX_MOVES);
    Ok(())
}
