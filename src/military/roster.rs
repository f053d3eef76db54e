//! Territory defense
//!
//! Watches our territory for intruders, keeps them grouped into armies and
//! sends defenders until each army is outmatched.

use glam::Vec2;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::context::TurnContext;
use crate::core::types::{ArmyId, EntityId, IdAllocator, PlayerId};
use crate::military::army::Army;
use crate::world::entity::{EntityClass, EntityView};
use crate::world::{EventBatch, GameState};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArmyRoster {
    armies: BTreeMap<ArmyId, Army>,
    ids: IdAllocator,
}

impl ArmyRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn armies(&self) -> impl Iterator<Item = &Army> {
        self.armies.values()
    }

    pub fn army(&self, id: ArmyId) -> Option<&Army> {
        self.armies.get(&id)
    }

    pub fn len(&self) -> usize {
        self.armies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.armies.is_empty()
    }

    /// Apply losses and renames before anything else looks at the armies
    pub fn handle_events<G: GameState>(&mut self, ctx: &mut TurnContext<G>, events: &EventBatch) {
        for (from, to) in events.renames() {
            for army in self.armies.values_mut() {
                army.rename(from, to);
            }
        }
        for lost in events.lost_entities() {
            for army in self.armies.values_mut() {
                army.remove_foe(ctx, lost);
                army.remove_own(ctx, lost);
            }
        }
    }

    pub fn update<G: GameState>(&mut self, ctx: &mut TurnContext<G>) {
        self.drop_departed(ctx);
        self.detect_intruders(ctx);

        let ids: Vec<ArmyId> = self.armies.keys().copied().collect();
        let mut breakaways = Vec::new();
        for id in ids {
            if let Some(army) = self.armies.get_mut(&id) {
                breakaways.extend(army.on_update(ctx));
            }
        }
        for foe in breakaways {
            self.enlist(ctx, foe);
        }

        self.merge_close_armies(ctx);
        self.dispatch_defenders(ctx);
        self.dissolve_finished(ctx);
    }

    /// Enemy structures some army is currently fighting; raid material
    pub fn threat_targets<G: GameState>(&self, game: &G, player: PlayerId) -> Vec<EntityId> {
        self.armies
            .values()
            .flat_map(|a| a.foe_ids())
            .filter(|id| {
                game.live(*id)
                    .is_some_and(|e| e.is_structure() && game.is_enemy(player, e.owner))
            })
            .collect()
    }

    fn is_threat<G: GameState>(ctx: &TurnContext<G>, entity: &EntityView) -> bool {
        let Some(pos) = entity.position else {
            return false;
        };
        if !entity.is_alive() || ctx.game.territory_owner(pos) != Some(ctx.player) {
            return false;
        }
        if ctx.is_enemy(entity.owner) {
            // finished enemy buildings are left to attack plans
            return !entity.is_structure() || entity.is_foundation();
        }
        // our own building being taken over
        entity.owner == ctx.player
            && entity.is_structure()
            && entity.hostile_capture_points(ctx.player) > 0.0
    }

    /// Foes that left our territory are no longer our problem
    fn drop_departed<G: GameState>(&mut self, ctx: &mut TurnContext<G>) {
        for army in self.armies.values_mut() {
            let departed: Vec<EntityId> = army
                .foe_ids()
                .filter(|id| !ctx.game.live(*id).is_some_and(|e| Self::is_threat(ctx, e)))
                .collect();
            for id in departed {
                army.remove_foe(ctx, id);
            }
        }
    }

    fn detect_intruders<G: GameState>(&mut self, ctx: &mut TurnContext<G>) {
        let intruders: Vec<EntityId> = ctx
            .game
            .iter()
            .filter(|e| ctx.claims.foes.is_free(e.id) && Self::is_threat(ctx, e))
            .map(|e| e.id)
            .collect();
        for id in intruders {
            self.enlist(ctx, id);
        }
    }

    /// Put a foe into the first army that will take it, or a new one
    fn enlist<G: GameState>(&mut self, ctx: &mut TurnContext<G>, foe: EntityId) {
        for army in self.armies.values_mut() {
            if army.add_foe(ctx, foe, false) {
                return;
            }
        }
        if ctx.game.live(foe).is_none() {
            return;
        }
        let id = self.ids.next_army();
        let army = Army::new(ctx, id, &[foe]);
        if army.foe_count() > 0 {
            tracing::debug!(army = %id, foe = %foe, "new army");
            self.armies.insert(id, army);
        }
    }

    /// Lower id absorbs higher id
    fn merge_close_armies<G: GameState>(&mut self, ctx: &mut TurnContext<G>) {
        let limit = ctx.config.army.merge_radius_sq;
        for army in self.armies.values_mut() {
            army.recalculate_position(ctx, false);
        }
        loop {
            let positions: Vec<(ArmyId, Vec2)> = self
                .armies
                .iter()
                .filter_map(|(id, a)| a.foe_position().map(|p| (*id, p)))
                .collect();
            let pair = positions.iter().enumerate().find_map(|(i, (a, pa))| {
                positions[i + 1..]
                    .iter()
                    .find(|(_, pb)| pa.distance_squared(*pb) < limit)
                    .map(|(b, _)| (*a, *b))
            });
            let Some((keep, absorbed)) = pair else {
                break;
            };
            let Some(other) = self.armies.remove(&absorbed) else {
                break;
            };
            if let Some(army) = self.armies.get_mut(&keep) {
                tracing::debug!(army = %keep, absorbed = %absorbed, "armies merged");
                army.merge(ctx, other);
            }
        }
    }

    fn dispatch_defenders<G: GameState>(&mut self, ctx: &mut TurnContext<G>) {
        let ratio = ctx.config.army.defender_ratio;
        let range_sq = ctx.config.army.defense_range * ctx.config.army.defense_range;

        for army in self.armies.values_mut() {
            let Some(centre) = army.foe_position() else {
                continue;
            };
            if army.own_strength() >= ratio * army.foe_strength() {
                continue;
            }

            let mut candidates: Vec<(EntityId, Vec2)> = ctx
                .game
                .by_owner(ctx.player)
                .filter(|e| {
                    e.is_alive()
                        && e.has_class(EntityClass::Unit)
                        && !e.has_class(EntityClass::Ship)
                        && e.can_attack()
                        && ctx.claims.is_unassigned(e.id)
                })
                .filter_map(|e| e.position.map(|p| (e.id, p)))
                .filter(|(_, p)| p.distance_squared(centre) <= range_sq)
                .collect();
            candidates.sort_by_key(|(id, p)| (OrderedFloat(p.distance_squared(centre)), *id));

            for (own, pos) in candidates {
                if army.own_strength() >= ratio * army.foe_strength() {
                    break;
                }
                if !army.add_own(ctx, own, true) {
                    continue;
                }
                let target = army
                    .foe_ids()
                    .filter_map(|f| ctx.game.live(f).and_then(|e| e.position).map(|p| (f, p)))
                    .min_by_key(|(f, p)| (OrderedFloat(p.distance_squared(pos)), *f))
                    .map(|(f, _)| f);
                if let Some(foe) = target {
                    army.assign(own, foe);
                    ctx.commands.attack(vec![own], foe);
                }
            }
            tracing::trace!(
                army = %army.id,
                own = army.own_strength(),
                foe = army.foe_strength(),
                "defenders dispatched"
            );
        }
    }

    fn dissolve_finished<G: GameState>(&mut self, ctx: &mut TurnContext<G>) {
        let finished: Vec<ArmyId> = self
            .armies
            .iter()
            .filter(|(_, a)| a.foe_count() == 0)
            .map(|(id, _)| *id)
            .collect();
        for id in finished {
            if let Some(mut army) = self.armies.remove(&id) {
                army.clear(ctx);
                tracing::debug!(army = %id, "army dissolved");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::MilitaryConfig;
    use crate::military::claims::{ClaimRegistry, RoleClaim};
    use crate::world::sandbox::SandboxWorld;
    use crate::world::{Command, CommandBuffer};

    const ME: PlayerId = PlayerId(1);
    const FOE: PlayerId = PlayerId(2);

    fn home() -> SandboxWorld {
        let mut world = SandboxWorld::two_player();
        world.add_land(0, Vec2::new(0.0, 0.0), Vec2::new(1000.0, 1000.0));
        world.spawn_structure(ME, "civil_centre", Vec2::new(200.0, 200.0), 3);
        world
    }

    #[test]
    fn test_intruders_form_one_army() {
        let mut world = home();
        world.spawn_soldier(FOE, Vec2::new(250.0, 250.0));
        world.spawn_soldier(FOE, Vec2::new(255.0, 250.0));
        // outside our territory
        world.spawn_soldier(FOE, Vec2::new(800.0, 800.0));
        let config = MilitaryConfig::default();
        let mut claims = ClaimRegistry::new();
        let mut commands = CommandBuffer::new();
        let mut ctx = TurnContext::new(&world, ME, &config, &mut claims, &mut commands);

        let mut roster = ArmyRoster::new();
        roster.update(&mut ctx);
        assert_eq!(roster.len(), 1);
        assert_eq!(roster.armies().next().map(|a| a.foe_count()), Some(2));
    }

    #[test]
    fn test_defenders_sent_until_ratio_met() {
        let mut world = home();
        let foe = world.spawn_soldier(FOE, Vec2::new(250.0, 250.0));
        let near = world.spawn_soldier(ME, Vec2::new(240.0, 250.0));
        let second = world.spawn_soldier(ME, Vec2::new(230.0, 250.0));
        let third = world.spawn_soldier(ME, Vec2::new(220.0, 250.0));
        let config = MilitaryConfig::default();
        let mut claims = ClaimRegistry::new();
        let mut commands = CommandBuffer::new();
        let mut ctx = TurnContext::new(&world, ME, &config, &mut claims, &mut commands);

        let mut roster = ArmyRoster::new();
        roster.update(&mut ctx);
        let army = roster.armies().next().cloned().unwrap();
        // equal soldiers: two are needed to exceed 1.2x
        assert!(army.has_own(near) && army.has_own(second));
        assert!(!army.has_own(third));
        assert!(ctx.claims.is_unassigned(third));
        assert_eq!(
            ctx.claims.roles.holder(near),
            Some(RoleClaim::Army(army.id))
        );
        assert!(commands.iter().any(|c| matches!(
            c,
            Command::Attack { entities, target } if entities == &vec![near] && *target == foe
        )));
    }

    #[test]
    fn test_close_armies_merge_into_lower_id() {
        let mut world = home();
        let a = world.spawn_soldier(FOE, Vec2::new(250.0, 250.0));
        let b = world.spawn_soldier(FOE, Vec2::new(320.0, 250.0));
        let config = MilitaryConfig::default();
        let mut claims = ClaimRegistry::new();
        let mut commands = CommandBuffer::new();

        let mut roster = ArmyRoster::new();
        {
            let mut ctx = TurnContext::new(&world, ME, &config, &mut claims, &mut commands);
            roster.update(&mut ctx);
        }
        assert_eq!(roster.len(), 2);

        world.teleport(b, Vec2::new(270.0, 250.0));
        world.set_turn(1);
        let mut ctx = TurnContext::new(&world, ME, &config, &mut claims, &mut commands);
        roster.update(&mut ctx);
        assert_eq!(roster.len(), 1);
        let army = roster.armies().next().unwrap();
        assert_eq!(army.id, ArmyId(0));
        assert!(army.has_foe(a) && army.has_foe(b));
    }

    #[test]
    fn test_army_dissolves_when_foes_die() {
        let mut world = home();
        let foe = world.spawn_soldier(FOE, Vec2::new(250.0, 250.0));
        let defender = world.spawn_soldier(ME, Vec2::new(240.0, 250.0));
        let config = MilitaryConfig::default();
        let mut claims = ClaimRegistry::new();
        let mut commands = CommandBuffer::new();
        let mut roster = ArmyRoster::new();
        {
            let mut ctx = TurnContext::new(&world, ME, &config, &mut claims, &mut commands);
            roster.update(&mut ctx);
        }
        assert!(!claims.is_unassigned(defender));

        world.kill(foe);
        let events = world.step();
        let mut ctx = TurnContext::new(&world, ME, &config, &mut claims, &mut commands);
        roster.handle_events(&mut ctx, &events);
        roster.update(&mut ctx);
        assert!(roster.is_empty());
        assert!(claims.is_unassigned(defender));
        assert!(claims.foes.is_empty());
    }

    #[test]
    fn test_enemy_foundation_is_a_threat_but_finished_tower_is_not() {
        let mut world = home();
        let tower = world.spawn_structure(FOE, "defense_tower", Vec2::new(220.0, 220.0), 1);
        let camp = world.spawn_foundation(FOE, "barracks", Vec2::new(260.0, 240.0), 30.0);
        let config = MilitaryConfig::default();
        let mut claims = ClaimRegistry::new();
        let mut commands = CommandBuffer::new();
        let mut ctx = TurnContext::new(&world, ME, &config, &mut claims, &mut commands);
        let mut roster = ArmyRoster::new();
        roster.update(&mut ctx);
        assert!(roster.armies().any(|a| a.has_foe(camp)));
        assert!(!roster.armies().any(|a| a.has_foe(tower)));
        assert!(ctx.claims.foes.is_free(tower));
        assert_eq!(roster.threat_targets(&world, ME), vec![camp]);
    }

    #[test]
    fn test_captured_building_becomes_army() {
        let mut world = home();
        let house = world.spawn_structure(ME, "house", Vec2::new(210.0, 210.0), 0);
        if let Some(view) = world.entity_mut(house) {
            view.capture_points = vec![(ME, 300.0), (FOE, 200.0)];
        }
        let config = MilitaryConfig::default();
        let mut claims = ClaimRegistry::new();
        let mut commands = CommandBuffer::new();
        let mut ctx = TurnContext::new(&world, ME, &config, &mut claims, &mut commands);
        let mut roster = ArmyRoster::new();
        roster.update(&mut ctx);
        assert!(roster.armies().any(|a| a.has_foe(house)));
        assert!(roster.threat_targets(&world, ME).is_empty());
    }
}
