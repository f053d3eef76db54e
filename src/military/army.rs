//! Defensive armies
//!
//! An army pairs a cluster of enemy entities with the defenders we sent
//! against it. Membership is claimed in the `ClaimRegistry`, so an entity is
//! part of at most one army as a foe and at most one army as a defender.

use glam::Vec2;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::context::TurnContext;
use crate::core::types::{ArmyId, EntityId, Turn};
use crate::military::claims::RoleClaim;
use crate::military::strength::evaluate_strength;
use crate::world::entity::EntityView;
use crate::world::GameState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Army {
    pub id: ArmyId,
    /// Foe member -> strength it contributed when admitted
    foes: BTreeMap<EntityId, f32>,
    /// Own member -> strength it contributed when admitted
    own: BTreeMap<EntityId, f32>,
    foe_strength: f32,
    own_strength: f32,
    foe_position: Option<Vec2>,
    position_turn: Option<Turn>,
    /// Own defender -> foes it is tasked against
    assigned_against: BTreeMap<EntityId, BTreeSet<EntityId>>,
    /// Foe -> own defenders tasked against it
    assigned_to: BTreeMap<EntityId, BTreeSet<EntityId>>,
}

impl Army {
    /// Empty army; the first foe added defines the centroid
    pub fn empty(id: ArmyId) -> Self {
        Self {
            id,
            foes: BTreeMap::new(),
            own: BTreeMap::new(),
            foe_strength: 0.0,
            own_strength: 0.0,
            foe_position: None,
            position_turn: None,
            assigned_against: BTreeMap::new(),
            assigned_to: BTreeMap::new(),
        }
    }

    /// Army around a freshly detected group of foes
    pub fn new<G: GameState>(ctx: &mut TurnContext<G>, id: ArmyId, foes: &[EntityId]) -> Self {
        let mut army = Self::empty(id);
        for &foe in foes {
            army.add_foe(ctx, foe, true);
        }
        army.recalculate_position(ctx, true);
        army
    }

    pub fn foe_strength(&self) -> f32 {
        self.foe_strength
    }

    pub fn own_strength(&self) -> f32 {
        self.own_strength
    }

    pub fn foe_position(&self) -> Option<Vec2> {
        self.foe_position
    }

    pub fn foe_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.foes.keys().copied()
    }

    pub fn own_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.own.keys().copied()
    }

    pub fn foe_count(&self) -> usize {
        self.foes.len()
    }

    pub fn own_count(&self) -> usize {
        self.own.len()
    }

    pub fn has_foe(&self, id: EntityId) -> bool {
        self.foes.contains_key(&id)
    }

    pub fn has_own(&self, id: EntityId) -> bool {
        self.own.contains_key(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.foes.is_empty() && self.own.is_empty()
    }

    pub fn assigned_against(&self, own: EntityId) -> Option<&BTreeSet<EntityId>> {
        self.assigned_against.get(&own)
    }

    pub fn assigned_to(&self, foe: EntityId) -> Option<&BTreeSet<EntityId>> {
        self.assigned_to.get(&foe)
    }

    fn within_compaction<G: GameState>(&self, ctx: &TurnContext<G>, pos: Vec2) -> bool {
        match self.foe_position {
            Some(centre) => centre.distance_squared(pos) <= ctx.config.army.compact_radius_sq,
            None => true,
        }
    }

    /// Admit an enemy entity. Returns whether it joined.
    pub fn add_foe<G: GameState>(
        &mut self,
        ctx: &mut TurnContext<G>,
        id: EntityId,
        force: bool,
    ) -> bool {
        if self.foes.contains_key(&id) {
            return false;
        }
        let Some(entity) = ctx.game.live(id) else {
            return false;
        };
        let Some(pos) = entity.position else {
            return false;
        };
        if !force && !self.within_compaction(ctx, pos) {
            return false;
        }
        if ctx.claims.foes.claim(id, self.id).is_err() {
            return false;
        }

        let strength = self.evaluate_strength(ctx, entity, false, false);
        self.foes.insert(id, strength);
        if self.foe_position.is_none() {
            self.foe_position = Some(pos);
        }
        self.position_turn = None;
        true
    }

    /// Admit one of our units as a defender. Returns whether it joined.
    pub fn add_own<G: GameState>(
        &mut self,
        ctx: &mut TurnContext<G>,
        id: EntityId,
        force: bool,
    ) -> bool {
        if self.own.contains_key(&id) {
            return false;
        }
        let Some(entity) = ctx.game.live(id) else {
            return false;
        };
        let Some(pos) = entity.position else {
            return false;
        };
        if !force && !self.within_compaction(ctx, pos) {
            return false;
        }
        if ctx.claims.roles.claim(id, RoleClaim::Army(self.id)).is_err() {
            return false;
        }

        let strength = self.evaluate_strength(ctx, entity, true, false);
        self.own.insert(id, strength);
        true
    }

    /// Detach a foe. Safe to call for entities that no longer exist.
    pub fn remove_foe<G: GameState>(&mut self, ctx: &mut TurnContext<G>, id: EntityId) -> bool {
        let Some(strength) = self.foes.remove(&id) else {
            return false;
        };
        self.foe_strength -= strength;
        ctx.claims.foes.release(id, self.id);
        if let Some(defenders) = self.assigned_to.remove(&id) {
            for own in defenders {
                if let Some(targets) = self.assigned_against.get_mut(&own) {
                    targets.remove(&id);
                }
            }
        }
        self.position_turn = None;
        true
    }

    /// Detach a defender. Safe to call for entities that no longer exist.
    pub fn remove_own<G: GameState>(&mut self, ctx: &mut TurnContext<G>, id: EntityId) -> bool {
        let Some(strength) = self.own.remove(&id) else {
            return false;
        };
        self.own_strength -= strength;
        ctx.claims.roles.release(id, RoleClaim::Army(self.id));
        if let Some(targets) = self.assigned_against.remove(&id) {
            for foe in targets {
                if let Some(defenders) = self.assigned_to.get_mut(&foe) {
                    defenders.remove(&id);
                }
            }
        }
        true
    }

    /// Add (or with `remove`, subtract) an entity's strength to the running
    /// total of its side. Returns the unsigned contribution.
    pub fn evaluate_strength<G: GameState>(
        &mut self,
        ctx: &TurnContext<G>,
        entity: &EntityView,
        is_own: bool,
        remove: bool,
    ) -> f32 {
        let strength = evaluate_strength(entity, ctx.player, &ctx.config.strength);
        let signed = if remove { -strength } else { strength };
        if is_own {
            self.own_strength += signed;
        } else {
            self.foe_strength += signed;
        }
        strength
    }

    /// Task a defender against a foe
    pub fn assign(&mut self, own: EntityId, foe: EntityId) -> bool {
        if !self.own.contains_key(&own) || !self.foes.contains_key(&foe) {
            return false;
        }
        self.assigned_against.entry(own).or_default().insert(foe);
        self.assigned_to.entry(foe).or_default().insert(own);
        true
    }

    /// Recompute the foe centroid; cached for the rest of the turn unless forced
    pub fn recalculate_position<G: GameState>(&mut self, ctx: &TurnContext<G>, force: bool) {
        let turn = ctx.turn();
        if !force && self.position_turn == Some(turn) {
            return;
        }

        let mut sum = Vec2::ZERO;
        let mut count = 0;
        for id in self.foes.keys() {
            if let Some(pos) = ctx.game.live(*id).and_then(|e| e.position) {
                sum += pos;
                count += 1;
            }
        }
        if count > 0 {
            self.foe_position = Some(sum / count as f32);
        }
        self.position_turn = Some(turn);
    }

    /// Single foe that is a capturable structure: we are fighting over a building
    fn is_capturing<G: GameState>(&self, ctx: &TurnContext<G>) -> Option<f32> {
        if self.foes.len() != 1 {
            return None;
        }
        let id = *self.foes.keys().next()?;
        let entity = ctx.game.live(id)?;
        if !entity.is_structure() || entity.capture_points.is_empty() {
            return None;
        }
        Some(entity.hostile_capture_points(ctx.player))
    }

    /// Per-turn upkeep. Returns foes that broke away from the cluster; the
    /// caller decides what army they go to.
    pub fn on_update<G: GameState>(&mut self, ctx: &mut TurnContext<G>) -> Vec<EntityId> {
        if let Some(hostile) = self.is_capturing(ctx) {
            if hostile <= 0.0 {
                tracing::trace!(army = %self.id, "capture repelled, dissolving");
                self.clear(ctx);
                return Vec::new();
            }
        }

        if !ctx.config.army.breakaway_cadence.is_due(ctx.turn()) {
            return Vec::new();
        }

        self.recalculate_position(ctx, true);
        let Some(centre) = self.foe_position else {
            return Vec::new();
        };

        let limit = ctx.config.army.breakaway_radius_sq;
        let breakaways: Vec<EntityId> = self
            .foes
            .keys()
            .copied()
            .filter(|id| {
                ctx.game
                    .live(*id)
                    .and_then(|e| e.position)
                    .is_some_and(|pos| pos.distance_squared(centre) > limit)
            })
            .collect();

        for id in &breakaways {
            self.remove_foe(ctx, *id);
        }
        if !breakaways.is_empty() {
            tracing::trace!(army = %self.id, count = breakaways.len(), "foes broke away");
            self.recalculate_position(ctx, true);
        }
        breakaways
    }

    /// Fold `other` into this army. All of its claims move here.
    pub fn merge<G: GameState>(&mut self, ctx: &mut TurnContext<G>, other: Army) {
        ctx.claims.foes.transfer(other.id, self.id);
        ctx.claims
            .roles
            .transfer(RoleClaim::Army(other.id), RoleClaim::Army(self.id));

        for (id, strength) in other.foes {
            if self.foes.insert(id, strength).is_none() {
                self.foe_strength += strength;
            }
        }
        for (id, strength) in other.own {
            if self.own.insert(id, strength).is_none() {
                self.own_strength += strength;
            }
        }
        for (own, foes) in other.assigned_against {
            self.assigned_against.entry(own).or_default().extend(foes);
        }
        for (foe, owns) in other.assigned_to {
            self.assigned_to.entry(foe).or_default().extend(owns);
        }
        self.position_turn = None;
        self.recalculate_position(ctx, true);
    }

    /// Release every member. Defenders fall back to the nearest friendly
    /// strongpoint, preferring ones that shoot.
    pub fn clear<G: GameState>(&mut self, ctx: &mut TurnContext<G>) {
        let foes: Vec<EntityId> = self.foes.keys().copied().collect();
        for id in foes {
            self.remove_foe(ctx, id);
        }

        let strongpoints: Vec<(Vec2, bool)> = ctx
            .game
            .by_owner(ctx.player)
            .filter(|e| e.is_structure() && !e.is_foundation() && e.is_alive())
            .filter_map(|e| e.position.map(|p| (p, e.default_arrows > 0)))
            .collect();
        let armed = strongpoints.iter().any(|(_, arrows)| *arrows);

        let own: Vec<EntityId> = self.own.keys().copied().collect();
        for id in own {
            let unit_pos = ctx.game.live(id).and_then(|e| e.position);
            if let Some(pos) = unit_pos {
                let retreat = strongpoints
                    .iter()
                    .filter(|(_, arrows)| *arrows || !armed)
                    .min_by_key(|(p, _)| OrderedFloat(p.distance_squared(pos)))
                    .map(|(p, _)| *p);
                if let Some(target) = retreat {
                    ctx.commands.move_to(vec![id], target);
                }
            }
            self.remove_own(ctx, id);
        }

        self.assigned_against.clear();
        self.assigned_to.clear();
        self.foe_strength = 0.0;
        self.own_strength = 0.0;
        self.position_turn = None;
    }

    /// Member entity replaced by a new id
    pub fn rename(&mut self, from: EntityId, to: EntityId) {
        if let Some(strength) = self.foes.remove(&from) {
            self.foes.insert(to, strength);
        }
        if let Some(strength) = self.own.remove(&from) {
            self.own.insert(to, strength);
        }
        if let Some(set) = self.assigned_against.remove(&from) {
            self.assigned_against.insert(to, set);
        }
        if let Some(set) = self.assigned_to.remove(&from) {
            self.assigned_to.insert(to, set);
        }
        for set in self
            .assigned_against
            .values_mut()
            .chain(self.assigned_to.values_mut())
        {
            if set.remove(&from) {
                set.insert(to);
            }
        }
    }
}
