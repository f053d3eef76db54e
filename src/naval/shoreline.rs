//! Boarding and landing spot search

use glam::Vec2;
use ordered_float::OrderedFloat;

use crate::context::TurnContext;
use crate::core::types::RegionId;
use crate::world::entity::EntityClass;
use crate::world::GameState;

#[derive(Debug, Clone, Copy)]
pub struct SpotQuery {
    pub land: RegionId,
    pub sea: RegionId,
    /// Where the units are, or where they want to go
    pub reference: Vec2,
    /// Landing on enemy ground is acceptable, at a lower score
    pub tolerate_enemy: bool,
}

/// Pick a shoreline tile of `query.land` on `query.sea`.
///
/// The wide pass scores every usable tile within the search radius of the
/// reference point. When nothing qualifies, the nearest usable tile is taken
/// instead. `None` means the two regions share no usable shore.
pub fn find_spot<G: GameState>(ctx: &TurnContext<G>, query: SpotQuery) -> Option<Vec2> {
    let game = ctx.game;
    let tiles: Vec<Vec2> = game
        .shore_tiles(query.land, query.sea)
        .into_iter()
        .filter(|t| !game.is_obstructed(*t))
        .filter(|t| query.tolerate_enemy || !is_enemy_ground(ctx, *t))
        .collect();
    if tiles.is_empty() {
        return None;
    }

    let docks: Vec<Vec2> = game
        .by_class(EntityClass::Dock)
        .filter(|d| game.is_ally(ctx.player, d.owner))
        .filter_map(|d| d.position)
        .collect();

    let radius_sq = ctx.config.naval.shore_search_radius * ctx.config.naval.shore_search_radius;
    let wide = tiles
        .iter()
        .filter(|t| t.distance_squared(query.reference) <= radius_sq)
        .min_by_key(|t| OrderedFloat(cost(ctx, **t, query.reference, &docks)));
    if let Some(spot) = wide {
        return Some(*spot);
    }

    tracing::trace!(land = %query.land, sea = %query.sea, "wide shore search empty, using nearest tile");
    tiles
        .into_iter()
        .min_by_key(|t| OrderedFloat(t.distance_squared(query.reference)))
}

fn is_enemy_ground<G: GameState>(ctx: &TurnContext<G>, pos: Vec2) -> bool {
    ctx.game
        .territory_owner(pos)
        .is_some_and(|owner| ctx.is_enemy(owner))
}

/// Lower is better
fn cost<G: GameState>(ctx: &TurnContext<G>, tile: Vec2, reference: Vec2, docks: &[Vec2]) -> f32 {
    let naval = &ctx.config.naval;
    let mut cost = tile.distance(reference);
    match ctx.game.territory_owner(tile) {
        Some(owner) if ctx.game.is_ally(ctx.player, owner) => {}
        Some(owner) if ctx.is_enemy(owner) => cost += naval.enemy_penalty,
        _ => cost += naval.neutral_penalty,
    }
    if docks.iter().any(|d| d.distance_squared(tile) < naval.dock_crowding_sq) {
        cost += naval.dock_penalty;
    }
    cost
}
