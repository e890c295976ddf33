//! Buying and using items.

use crownquest_protocol::{Goblin, Gold, GoldPile, Item, PlayerId, SpaceType, Trap};
use rand::seq::SliceRandom;

use crate::pathing;
use crate::turn::{self, Landing};
use crate::{GameContext, GameError, TurnViolation};

/// Gold left by a Bounty Drop.
pub const BOUNTY_AMOUNT: Gold = 3;
/// Most a Misfortune Curse can take.
pub const CURSE_TOLL: Gold = 2;
/// Most a Close-Quarters Heist can take.
pub const HEIST_TOLL: Gold = 4;

/// Whether `actor` may buy right now: standing on a Shop, or granted access
/// by the Good wheel this turn.
pub fn can_shop(ctx: &GameContext<'_>, actor: &PlayerId) -> Result<bool, GameError> {
    let pos = ctx.player(actor)?.position;
    Ok(ctx.state.shop_access || ctx.space_kind(pos)? == SpaceType::Shop)
}

/// Buys one `item`, selling owned items first if gold is short.
pub fn buy(ctx: &mut GameContext<'_>, actor: &PlayerId, item: Item) -> Result<(), GameError> {
    if ctx.state.game_over {
        return Err(TurnViolation::GameOver.into());
    }
    if !can_shop(ctx, actor)? {
        return Err(GameError::ShopClosed);
    }
    let player = ctx.player(actor)?;
    if item.max_held().is_some_and(|max| player.count_of(item) >= max) {
        return Err(GameError::ItemLimit(item));
    }

    let cost = item.cost();
    if player.gold < cost {
        ctx.liquidate(actor, cost)?;
    }
    let player = ctx.player_mut(actor)?;
    if player.gold < cost {
        return Err(GameError::ResourceShortfall {
            item,
            needed: cost,
            available: player.gold,
        });
    }
    player.gold -= cost;
    player.items.push(item);
    let name = player.name.clone();
    ctx.log(format!("{name} bought {item} for {cost} gold."));
    tracing::debug!(%actor, %item, "item bought");
    Ok(())
}

/// Consumes one `item` held by the current player and applies its effect.
///
/// Returns the landing to resolve when the effect moved the user (only
/// Chaos Swap can).
pub fn use_item(
    ctx: &mut GameContext<'_>,
    actor: &PlayerId,
    item: Item,
) -> Result<Option<Landing>, GameError> {
    if ctx.state.game_over {
        return Err(TurnViolation::GameOver.into());
    }
    if !ctx.state.is_current(actor) {
        tracing::warn!(%actor, %item, "item used out of turn");
        return Err(TurnViolation::NotYourTurn.into());
    }
    if !ctx.player_mut(actor)?.take_item(item) {
        return Err(GameError::ItemNotOwned(item));
    }

    let name = ctx.name_of(actor)?;
    let pos = ctx.player(actor)?.position;
    let mut landing = None;
    let line = match item {
        Item::ScoutLens => {
            let seen: Vec<String> = ctx
                .grid
                .neighbors(pos)
                .iter()
                .map(|&id| {
                    let dir = pathing::direction(pos, id)
                        .map_or_else(|| format!("Space {id}"), |d| d.to_string());
                    let kind = ctx.grid.kind_of(id).map_or("Unknown", |k| k.label());
                    format!("{dir}: {kind}")
                })
                .collect();
            let seen = if seen.is_empty() { "none".to_string() } else { seen.join(", ") };
            format!("Adjacent spaces are {seen}")
        }
        Item::ChaosSwap => {
            let (line, user_moved) = chaos_swap(ctx, actor)?;
            if user_moved {
                landing = Some(turn::resolve_landing(ctx, actor)?);
            }
            line
        }
        Item::CrownCompass => {
            let dirs: Vec<String> = pathing::closer_to_crown(ctx.grid, pos)
                .iter()
                .map(ToString::to_string)
                .collect();
            if dirs.is_empty() {
                "No closer paths found.".to_string()
            } else {
                format!("Move {} to get closer.", dirs.join(" or "))
            }
        }
        Item::ThiefsSnare => {
            ctx.state.traps.push(Trap { space: pos, owner: actor.clone() });
            "Trap set at current space".to_string()
        }
        Item::BountyDrop => {
            let grid = ctx.grid;
            match ctx.pick(grid.neighbors(pos)) {
                Some(target) => {
                    ctx.state.gold_piles.push(GoldPile { space: target, amount: BOUNTY_AMOUNT });
                    let dir = pathing::direction(pos, target)
                        .map_or_else(|| format!("space {target}"), |d| d.to_string());
                    format!("{BOUNTY_AMOUNT} gold placed at adjacent {dir}")
                }
                None => "No adjacent spaces available".to_string(),
            }
        }
        Item::MisfortuneCurse => {
            let others = ctx.others(actor);
            match ctx.pick(&others) {
                Some(target) => {
                    let victim = ctx.name_of(&target)?;
                    match ctx.take_gold(&target, CURSE_TOLL)? {
                        0 => format!("{victim} has no gold to lose"),
                        amount => format!("{victim} loses {amount} gold"),
                    }
                }
                None => "No other players available".to_string(),
            }
        }
        Item::CloseQuartersHeist => {
            let here = ctx.co_located(actor)?;
            match ctx.pick(&here) {
                Some(target) => {
                    let victim = ctx.name_of(&target)?;
                    match ctx.take_gold(&target, HEIST_TOLL)? {
                        0 => format!("{victim} has no gold"),
                        amount => {
                            ctx.player_mut(actor)?.gold += amount;
                            format!("Stole {amount} gold from {victim}")
                        }
                    }
                }
                None => "No other players on space".to_string(),
            }
        }
        Item::WanderingGoblin => {
            ctx.state.goblins.push(Goblin { space: pos, owner: actor.clone(), moves: 0 });
            "Goblin summoned at current space".to_string()
        }
        Item::WardingTalisman => "Protected from next trap".to_string(),
    };

    ctx.log(format!("{name} used {item}: {line}"));
    tracing::debug!(%actor, %item, "item used");
    Ok(landing)
}

/// Swaps two random players outside the Shadow Realm. Returns the log line
/// and whether `actor` was one of them.
fn chaos_swap(ctx: &mut GameContext<'_>, actor: &PlayerId) -> Result<(String, bool), GameError> {
    let realm = ctx.grid.first_of(SpaceType::ShadowRealm);
    let mut valid: Vec<PlayerId> = ctx
        .state
        .players
        .iter()
        .filter(|p| Some(p.position) != realm)
        .map(|p| p.id.clone())
        .collect();
    if valid.len() < 2 {
        return Ok(("Not enough valid players to swap".to_string(), false));
    }
    valid.shuffle(&mut *ctx.rng);
    let (first, second) = (valid[0].clone(), valid[1].clone());

    let a = ctx.player(&first)?.position;
    let b = ctx.player(&second)?.position;
    ctx.player_mut(&first)?.position = b;
    ctx.player_mut(&second)?.position = a;

    let line = format!(
        "Swapped positions of {} and {}",
        ctx.name_of(&first)?,
        ctx.name_of(&second)?
    );
    Ok((line, &first == actor || &second == actor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{board, pid, room};
    use crate::{Decline, FirstChoice};
    use crownquest_protocol::RoomSnapshot;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn with_ctx<T>(state: &mut RoomSnapshot, f: impl FnOnce(&mut GameContext<'_>) -> T) -> T {
        let grid = board();
        let mut rng = StdRng::seed_from_u64(11);
        let mut chooser = FirstChoice;
        let mut ctx = GameContext::new(state, &grid, &mut rng, &mut chooser);
        f(&mut ctx)
    }

    fn on_shop(gold: i64) -> RoomSnapshot {
        let mut state = room();
        let a = state.player_mut(&pid("a")).unwrap();
        a.position = 13;
        a.gold = gold;
        state
    }

    // ========================================================================
    // buy
    // ========================================================================

    #[test]
    fn test_buy_off_shop_without_access_fails() {
        let mut state = room();
        state.player_mut(&pid("a")).unwrap().gold = 10;
        let err = with_ctx(&mut state, |ctx| buy(ctx, &pid("a"), Item::ScoutLens)).unwrap_err();
        assert_eq!(err, GameError::ShopClosed);
    }

    #[test]
    fn test_buy_with_shop_access_anywhere() {
        let mut state = room();
        state.shop_access = true;
        state.player_mut(&pid("a")).unwrap().gold = 10;
        with_ctx(&mut state, |ctx| buy(ctx, &pid("a"), Item::ScoutLens)).unwrap();
        let a = state.player(&pid("a")).unwrap();
        assert_eq!(a.gold, 8);
        assert_eq!(a.items, vec![Item::ScoutLens]);
        assert_eq!(state.log.last().unwrap(), "Alice bought Scout Lens for 2 gold.");
    }

    #[test]
    fn test_buy_at_max_held_fails() {
        let mut state = on_shop(20);
        state.player_mut(&pid("a")).unwrap().items = vec![Item::MisfortuneCurse];
        let err =
            with_ctx(&mut state, |ctx| buy(ctx, &pid("a"), Item::MisfortuneCurse)).unwrap_err();
        assert_eq!(err, GameError::ItemLimit(Item::MisfortuneCurse));
    }

    #[test]
    fn test_buy_liquidates_to_afford() {
        let mut state = on_shop(1);
        state.player_mut(&pid("a")).unwrap().items = vec![Item::WardingTalisman];
        with_ctx(&mut state, |ctx| buy(ctx, &pid("a"), Item::CrownCompass)).unwrap();
        let a = state.player(&pid("a")).unwrap();
        // 1 + 3 from the talisman, minus 3.
        assert_eq!(a.gold, 1);
        assert_eq!(a.items, vec![Item::CrownCompass]);
    }

    #[test]
    fn test_buy_shortfall_after_liquidation() {
        let grid = board();
        let mut state = on_shop(1);
        let mut rng = StdRng::seed_from_u64(0);
        let mut chooser = Decline;
        let mut ctx = GameContext::new(&mut state, &grid, &mut rng, &mut chooser);
        let err = buy(&mut ctx, &pid("a"), Item::WardingTalisman).unwrap_err();
        assert_eq!(
            err,
            GameError::ResourceShortfall { item: Item::WardingTalisman, needed: 6, available: 1 }
        );
    }

    // ========================================================================
    // use_item
    // ========================================================================

    #[test]
    fn test_use_item_not_owned() {
        let mut state = room();
        let err =
            with_ctx(&mut state, |ctx| use_item(ctx, &pid("a"), Item::ScoutLens)).unwrap_err();
        assert_eq!(err, GameError::ItemNotOwned(Item::ScoutLens));
    }

    #[test]
    fn test_use_item_out_of_turn_keeps_item() {
        let mut state = room();
        state.player_mut(&pid("b")).unwrap().items.push(Item::ThiefsSnare);
        let err =
            with_ctx(&mut state, |ctx| use_item(ctx, &pid("b"), Item::ThiefsSnare)).unwrap_err();
        assert_eq!(err, GameError::Turn(TurnViolation::NotYourTurn));
        assert_eq!(state.player(&pid("b")).unwrap().items, vec![Item::ThiefsSnare]);
    }

    #[test]
    fn test_thiefs_snare_places_trap() {
        let mut state = room();
        state.player_mut(&pid("a")).unwrap().items.push(Item::ThiefsSnare);
        with_ctx(&mut state, |ctx| use_item(ctx, &pid("a"), Item::ThiefsSnare)).unwrap();
        assert_eq!(state.traps, vec![Trap { space: 12, owner: pid("a") }]);
        assert!(state.player(&pid("a")).unwrap().items.is_empty());
    }

    #[test]
    fn test_bounty_drop_places_pile_next_door() {
        let mut state = room();
        state.player_mut(&pid("a")).unwrap().items.push(Item::BountyDrop);
        with_ctx(&mut state, |ctx| use_item(ctx, &pid("a"), Item::BountyDrop)).unwrap();
        assert_eq!(state.gold_piles.len(), 1);
        assert!(board().is_adjacent(12, state.gold_piles[0].space));
        assert_eq!(state.gold_piles[0].amount, 3);
    }

    #[test]
    fn test_heist_steals_from_co_located_player() {
        let mut state = room();
        state.player_mut(&pid("a")).unwrap().items.push(Item::CloseQuartersHeist);
        state.player_mut(&pid("b")).unwrap().gold = 10;
        state.player_mut(&pid("c")).unwrap().gold = 10;
        with_ctx(&mut state, |ctx| use_item(ctx, &pid("a"), Item::CloseQuartersHeist)).unwrap();
        assert_eq!(state.player(&pid("a")).unwrap().gold, 5);
        let total: i64 = state.players.iter().map(|p| p.gold).sum();
        assert_eq!(total, 21);
    }

    #[test]
    fn test_heist_alone_does_nothing() {
        let mut state = room();
        state.player_mut(&pid("a")).unwrap().items.push(Item::CloseQuartersHeist);
        state.player_mut(&pid("b")).unwrap().position = 0;
        state.player_mut(&pid("c")).unwrap().position = 0;
        with_ctx(&mut state, |ctx| use_item(ctx, &pid("a"), Item::CloseQuartersHeist)).unwrap();
        assert_eq!(
            state.log.last().unwrap(),
            "Alice used Close-Quarters Heist: No other players on space"
        );
    }

    #[test]
    fn test_crown_compass_points_toward_crown() {
        let mut state = room();
        state.player_mut(&pid("a")).unwrap().items.push(Item::CrownCompass);
        with_ctx(&mut state, |ctx| use_item(ctx, &pid("a"), Item::CrownCompass)).unwrap();
        assert_eq!(
            state.log.last().unwrap(),
            "Alice used Crown Compass: Move North or West to get closer."
        );
    }

    #[test]
    fn test_chaos_swap_needs_two_players_outside_realm() {
        let mut state = room();
        state.player_mut(&pid("a")).unwrap().items.push(Item::ChaosSwap);
        state.player_mut(&pid("b")).unwrap().position = 24;
        state.player_mut(&pid("c")).unwrap().position = 24;
        let landing =
            with_ctx(&mut state, |ctx| use_item(ctx, &pid("a"), Item::ChaosSwap)).unwrap();
        assert_eq!(landing, None);
        assert!(state.log.last().unwrap().contains("Not enough valid players to swap"));
    }

    #[test]
    fn test_chaos_swap_preserves_occupied_spaces() {
        let mut state = room();
        state.player_mut(&pid("a")).unwrap().items.push(Item::ChaosSwap);
        state.player_mut(&pid("b")).unwrap().position = 1;
        state.player_mut(&pid("c")).unwrap().position = 4;
        with_ctx(&mut state, |ctx| use_item(ctx, &pid("a"), Item::ChaosSwap)).unwrap();
        let mut positions: Vec<u32> = state.players.iter().map(|p| p.position).collect();
        positions.sort_unstable();
        assert_eq!(positions, vec![1, 4, 12]);
    }

    #[test]
    fn test_goblin_spawns_on_user_space() {
        let mut state = room();
        state.player_mut(&pid("a")).unwrap().items.push(Item::WanderingGoblin);
        with_ctx(&mut state, |ctx| use_item(ctx, &pid("a"), Item::WanderingGoblin)).unwrap();
        assert_eq!(state.goblins, vec![Goblin { space: 12, owner: pid("a"), moves: 0 }]);
    }
}
