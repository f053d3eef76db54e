//! In-memory game stand-in
//!
//! A small deterministic world: rectangular land and sea regions, circular
//! territories, instant movement inside a region, capacity-checked garrisons
//! and turn-based production. Used by the skirmish driver and the tests.

use glam::Vec2;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::core::types::{EntityId, PlayerId, RegionId, Turn};
use crate::world::command::{Command, ProductionQueues, TrainingOrder, TrainingPurpose};
use crate::world::entity::{AttackStats, AttackType, CombatProfile, DamageTable, EntityClass, EntityView};
use crate::world::event::{EventBatch, GameEvent};
use crate::world::store::EntityStore;
use crate::world::{Accessibility, GameState, RegionKind, VictoryCondition};

/// Shore tiles sit this far inside the land edge
const SHORE_INSET: f32 = 2.0;
const SHORE_SPACING: f32 = 8.0;
const EDGE_EPSILON: f32 = 0.01;
const GARRISON_RANGE: f32 = 20.0;
const CIV_CENTRE_TERRITORY: f32 = 150.0;
const DEFAULT_TRAIN_TURNS: u64 = 3;

#[derive(Debug, Clone, Copy)]
struct Bounds {
    min: Vec2,
    max: Vec2,
}

impl Bounds {
    fn contains(&self, pos: Vec2) -> bool {
        pos.x >= self.min.x && pos.x < self.max.x && pos.y >= self.min.y && pos.y < self.max.y
    }

    /// Land tiles along the edge this land rectangle shares with `sea`
    fn shore_with(&self, sea: &Bounds) -> Vec<Vec2> {
        let near = |a: f32, b: f32| (a - b).abs() < EDGE_EPSILON;
        let span = |lo: f32, hi: f32| {
            let mut out = Vec::new();
            let mut t = lo + SHORE_SPACING / 2.0;
            while t < hi {
                out.push(t);
                t += SHORE_SPACING;
            }
            out
        };
        let (ylo, yhi) = (self.min.y.max(sea.min.y), self.max.y.min(sea.max.y));
        let (xlo, xhi) = (self.min.x.max(sea.min.x), self.max.x.min(sea.max.x));

        let mut tiles = Vec::new();
        if near(self.max.x, sea.min.x) && yhi > ylo {
            let x = self.max.x - SHORE_INSET;
            tiles.extend(span(ylo, yhi).into_iter().map(|y| Vec2::new(x, y)));
        }
        if near(self.min.x, sea.max.x) && yhi > ylo {
            let x = self.min.x + SHORE_INSET;
            tiles.extend(span(ylo, yhi).into_iter().map(|y| Vec2::new(x, y)));
        }
        if near(self.max.y, sea.min.y) && xhi > xlo {
            let y = self.max.y - SHORE_INSET;
            tiles.extend(span(xlo, xhi).into_iter().map(|x| Vec2::new(x, y)));
        }
        if near(self.min.y, sea.max.y) && xhi > xlo {
            let y = self.min.y + SHORE_INSET;
            tiles.extend(span(xlo, xhi).into_iter().map(|x| Vec2::new(x, y)));
        }
        tiles
    }
}

#[derive(Debug, Clone)]
struct Region {
    kind: RegionKind,
    bounds: Bounds,
}

#[derive(Debug, Clone)]
struct Territory {
    owner: PlayerId,
    centre: Vec2,
    radius: f32,
}

#[derive(Debug, Clone)]
struct InProduction {
    owner: PlayerId,
    order: TrainingOrder,
    remaining: u64,
}

#[derive(Debug, Clone)]
pub struct SandboxWorld {
    turn: Turn,
    next_id: u32,
    entities: BTreeMap<EntityId, EntityView>,
    regions: BTreeMap<RegionId, Region>,
    links: BTreeMap<RegionId, BTreeSet<RegionId>>,
    territories: Vec<Territory>,
    obstructions: Vec<(Vec2, f32)>,
    teams: BTreeMap<PlayerId, u8>,
    population_caps: BTreeMap<PlayerId, u32>,
    victory: Vec<VictoryCondition>,
    locked_templates: BTreeSet<String>,
    production: Vec<InProduction>,
    pending: Vec<GameEvent>,
    train_turns: u64,
}

impl Default for SandboxWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SandboxWorld {
    pub fn new() -> Self {
        Self {
            turn: 0,
            next_id: 1,
            entities: BTreeMap::new(),
            regions: BTreeMap::new(),
            links: BTreeMap::new(),
            territories: Vec::new(),
            obstructions: Vec::new(),
            teams: BTreeMap::new(),
            population_caps: BTreeMap::new(),
            victory: vec![VictoryCondition::Conquest],
            locked_templates: BTreeSet::new(),
            production: Vec::new(),
            pending: Vec::new(),
            train_turns: DEFAULT_TRAIN_TURNS,
        }
    }

    /// Players 1 and 2 on opposing teams
    pub fn two_player() -> Self {
        let mut world = Self::new();
        world.add_player(PlayerId(1), 1);
        world.add_player(PlayerId(2), 2);
        world
    }

    pub fn add_player(&mut self, player: PlayerId, team: u8) {
        self.teams.insert(player, team);
        self.population_caps.entry(player).or_insert(300);
    }

    pub fn set_population_cap(&mut self, player: PlayerId, cap: u32) {
        self.population_caps.insert(player, cap);
    }

    pub fn set_victory_conditions(&mut self, conditions: Vec<VictoryCondition>) {
        self.victory = conditions;
    }

    pub fn lock_template(&mut self, template: &str) {
        self.locked_templates.insert(template.to_string());
    }

    pub fn set_train_turns(&mut self, turns: u64) {
        self.train_turns = turns.max(1);
    }

    pub fn set_turn(&mut self, turn: Turn) {
        self.turn = turn;
    }

    pub fn add_land(&mut self, id: u16, min: Vec2, max: Vec2) -> RegionId {
        self.add_region(RegionId(id), RegionKind::Land, Bounds { min, max })
    }

    pub fn add_sea(&mut self, id: u16, min: Vec2, max: Vec2) -> RegionId {
        self.add_region(RegionId(id), RegionKind::Sea, Bounds { min, max })
    }

    /// Regions of opposite kinds sharing an edge are linked automatically
    fn add_region(&mut self, id: RegionId, kind: RegionKind, bounds: Bounds) -> RegionId {
        let touching: Vec<RegionId> = self
            .regions
            .iter()
            .filter(|(_, other)| other.kind != kind)
            .filter(|(_, other)| {
                let (land, sea) = match kind {
                    RegionKind::Land => (&bounds, &other.bounds),
                    RegionKind::Sea => (&other.bounds, &bounds),
                };
                !land.shore_with(sea).is_empty()
            })
            .map(|(rid, _)| *rid)
            .collect();
        for other in touching {
            self.links.entry(id).or_default().insert(other);
            self.links.entry(other).or_default().insert(id);
        }
        self.regions.insert(id, Region { kind, bounds });
        id
    }

    pub fn claim_territory(&mut self, owner: PlayerId, centre: Vec2, radius: f32) {
        self.territories.push(Territory {
            owner,
            centre,
            radius,
        });
    }

    pub fn add_obstruction(&mut self, centre: Vec2, radius: f32) {
        self.obstructions.push((centre, radius));
    }

    fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Insert a prepared view, assigning id and region
    pub fn spawn(&mut self, mut view: EntityView) -> EntityId {
        let id = self.allocate();
        view.id = id;
        if view.region.is_none() {
            view.region = view.position.and_then(|p| self.region_of(p));
        }
        self.entities.insert(id, view);
        id
    }

    pub fn spawn_unit(&mut self, owner: PlayerId, template: &str, pos: Vec2) -> EntityId {
        let view = unit_view(owner, template).with_position(pos);
        self.spawn(view)
    }

    pub fn spawn_soldier(&mut self, owner: PlayerId, pos: Vec2) -> EntityId {
        self.spawn_unit(owner, "infantry_spearman", pos)
    }

    pub fn spawn_cavalry(&mut self, owner: PlayerId, pos: Vec2) -> EntityId {
        self.spawn_unit(owner, "cavalry_javelineer", pos)
    }

    /// Transport ship floating in `sea`
    pub fn spawn_ship(&mut self, owner: PlayerId, sea: RegionId, pos: Vec2, capacity: u32) -> EntityId {
        let view = EntityView::new(EntityId(0), owner, "ship_bireme")
            .with_position(pos)
            .with_region(sea)
            .with_classes(&[EntityClass::Unit, EntityClass::Ship])
            .with_garrison(capacity);
        self.spawn(view)
    }

    pub fn spawn_warship(&mut self, owner: PlayerId, sea: RegionId, pos: Vec2) -> EntityId {
        let mut view = unit_view(owner, "ship_trireme").with_position(pos);
        view.region = Some(sea);
        self.spawn(view)
    }

    /// Finished structure. Civil centres project territory.
    pub fn spawn_structure(&mut self, owner: PlayerId, template: &str, pos: Vec2, arrows: u32) -> EntityId {
        let mut view = EntityView::new(EntityId(0), owner, template)
            .with_position(pos)
            .with_classes(&structure_classes(template));
        view.default_arrows = arrows;
        view.max_hitpoints = 1000.0;
        view.hitpoints = 1000.0;
        view.garrison_max = 10;
        view.capture_points = vec![(owner, 500.0)];
        self.spawn(view)
    }

    /// Dock on `pos` opening onto `sea`; reports its completion
    pub fn spawn_dock(&mut self, owner: PlayerId, pos: Vec2, sea: RegionId) -> EntityId {
        let id = self.spawn_structure(owner, "dock", pos, 0);
        if let Some(dock) = self.entities.get_mut(&id) {
            dock.sea_region = Some(sea);
        }
        self.pending.push(GameEvent::ConstructionFinished { entity: id });
        id
    }

    /// Unfinished structure at `progress` percent
    pub fn spawn_foundation(&mut self, owner: PlayerId, template: &str, pos: Vec2, progress: f32) -> EntityId {
        let id = self.spawn_structure(owner, template, pos, 0);
        if let Some(view) = self.entities.get_mut(&id) {
            view.foundation_progress = Some(progress);
            view.classes.push(EntityClass::Foundation);
        }
        id
    }

    pub fn entity(&self, id: EntityId) -> Option<&EntityView> {
        self.entities.get(&id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut EntityView> {
        self.entities.get_mut(&id)
    }

    pub fn teleport(&mut self, id: EntityId, pos: Vec2) {
        let region = self.region_of(pos);
        if let Some(view) = self.entities.get_mut(&id) {
            view.position = Some(pos);
            if !view.has_class(EntityClass::Ship) {
                view.region = region;
            }
        }
    }

    /// Remove an entity together with anything garrisoned inside it
    pub fn kill(&mut self, id: EntityId) {
        let Some(view) = self.entities.remove(&id) else {
            return;
        };
        if let Some(holder) = view.garrisoned_in.and_then(|h| self.entities.get_mut(&h)) {
            holder.garrisoned.retain(|g| *g != id);
        }
        self.pending.push(GameEvent::Destroyed { entity: id });
        for passenger in view.garrisoned {
            self.kill(passenger);
        }
    }

    pub fn convert(&mut self, id: EntityId, to: PlayerId) {
        if let Some(view) = self.entities.get_mut(&id) {
            let from = view.owner;
            view.owner = to;
            self.pending.push(GameEvent::OwnershipChanged { entity: id, from, to });
        }
    }

    /// Replace an entity by an upgraded copy under a new id
    pub fn replace(&mut self, id: EntityId) -> Option<EntityId> {
        let mut view = self.entities.remove(&id)?;
        let to = self.allocate();
        view.id = to;
        for passenger in &view.garrisoned {
            if let Some(p) = self.entities.get_mut(passenger) {
                p.garrisoned_in = Some(to);
            }
        }
        if let Some(holder) = view.garrisoned_in.and_then(|h| self.entities.get_mut(&h)) {
            for g in holder.garrisoned.iter_mut().filter(|g| **g == id) {
                *g = to;
            }
        }
        self.entities.insert(to, view);
        self.pending.push(GameEvent::Renamed { from: id, to });
        Some(to)
    }

    /// Queue an arbitrary event for the next `step`
    pub fn push_event(&mut self, event: GameEvent) {
        self.pending.push(event);
    }

    /// Execute the orders of `player`. Orders for foreign or missing
    /// entities are ignored, as are walks across water.
    pub fn apply(&mut self, player: PlayerId, commands: Vec<Command>) {
        for command in commands {
            match command {
                Command::Move { entities, to } | Command::AttackMove { entities, to } => {
                    for id in entities {
                        self.walk(player, id, to);
                    }
                }
                Command::Attack { entities, target } => {
                    let Some(to) = self.entities.get(&target).and_then(|t| t.position) else {
                        continue;
                    };
                    for id in entities {
                        self.walk(player, id, to);
                    }
                }
                Command::Garrison { entity, into } => self.garrison(player, entity, into),
                Command::UnloadAll { holder } => self.unload_all(player, holder),
            }
        }
    }

    fn walk(&mut self, player: PlayerId, id: EntityId, to: Vec2) {
        let target_region = self.region_of(to);
        let links = &self.links;
        let Some(view) = self.entities.get_mut(&id) else {
            return;
        };
        if view.owner != player || view.garrisoned_in.is_some() {
            return;
        }
        let allowed = if view.has_class(EntityClass::Ship) {
            // ships may pull up onto the shore of any linked land
            match (view.region, target_region) {
                (Some(sea), Some(r)) => r == sea || links.get(&sea).is_some_and(|l| l.contains(&r)),
                _ => false,
            }
        } else {
            target_region.is_some() && view.region == target_region
        };
        if allowed {
            view.position = Some(to);
            view.idle = false;
        }
    }

    fn garrison(&mut self, player: PlayerId, entity: EntityId, into: EntityId) {
        let (Some(unit), Some(holder)) = (self.entities.get(&entity), self.entities.get(&into)) else {
            return;
        };
        if unit.owner != player || holder.owner != player || unit.garrisoned_in.is_some() {
            return;
        }
        let (Some(a), Some(b)) = (unit.position, holder.position) else {
            return;
        };
        if a.distance(b) > GARRISON_RANGE || holder.free_slots() == 0 {
            return;
        }
        if let Some(holder) = self.entities.get_mut(&into) {
            holder.garrisoned.push(entity);
        }
        if let Some(unit) = self.entities.get_mut(&entity) {
            unit.garrisoned_in = Some(into);
            unit.position = None;
            unit.region = None;
        }
        self.pending.push(GameEvent::Garrisoned { entity, holder: into });
    }

    fn unload_all(&mut self, player: PlayerId, holder: EntityId) {
        let Some(view) = self.entities.get_mut(&holder) else {
            return;
        };
        let Some(pos) = view.position.filter(|_| view.owner == player) else {
            return;
        };
        let passengers = std::mem::take(&mut view.garrisoned);
        let region = self.region_of(pos);
        for id in passengers {
            if let Some(unit) = self.entities.get_mut(&id) {
                unit.garrisoned_in = None;
                unit.position = Some(pos);
                unit.region = region;
            }
        }
    }

    /// Hand the AI's production queues to the host
    pub fn start_production(&mut self, player: PlayerId, queues: &mut ProductionQueues) {
        for order in queues.drain() {
            if !self.can_train(player, &order.template) {
                continue;
            }
            self.pending.push(GameEvent::TrainingQueued {
                purpose: order.purpose,
            });
            self.production.push(InProduction {
                owner: player,
                order,
                remaining: self.train_turns,
            });
        }
    }

    /// Advance one turn; returns everything that happened since the last step
    pub fn step(&mut self) -> EventBatch {
        self.turn += 1;
        let mut finished = Vec::new();
        self.production.retain_mut(|job| {
            job.remaining = job.remaining.saturating_sub(1);
            if job.remaining == 0 {
                finished.push(job.clone());
                false
            } else {
                true
            }
        });
        for job in finished {
            self.finish_training(job);
        }
        for view in self.entities.values_mut() {
            view.idle = true;
        }
        EventBatch::from(std::mem::take(&mut self.pending))
    }

    fn finish_training(&mut self, job: InProduction) {
        let spawn_at = match job.order.purpose {
            TrainingPurpose::Ship { sea } => self
                .entities
                .values()
                .find(|e| e.owner == job.owner && e.has_class(EntityClass::Dock) && e.sea_region == Some(sea))
                .and_then(|e| e.position),
            _ => self
                .entities
                .values()
                .find(|e| {
                    e.owner == job.owner
                        && !e.is_foundation()
                        && (e.has_class(EntityClass::CivCentre) || e.has_class(EntityClass::Barracks))
                })
                .and_then(|e| e.position),
        };
        let Some(pos) = spawn_at else {
            tracing::debug!(template = %job.order.template, "no building to train at, order dropped");
            return;
        };

        let mut entities = Vec::new();
        for _ in 0..job.order.count {
            let mut view = unit_view(job.owner, &job.order.template).with_position(pos);
            if let TrainingPurpose::Ship { sea } = job.order.purpose {
                view.region = Some(sea);
            }
            entities.push(self.spawn(view));
        }
        self.pending.push(GameEvent::TrainingFinished {
            entities,
            purpose: job.order.purpose,
        });
    }
}

/// Unit snapshot for a trainable template
fn unit_view(owner: PlayerId, template: &str) -> EntityView {
    let melee = |hack, pierce| AttackStats {
        kind: AttackType::Melee,
        damage: DamageTable::new(hack, pierce, 0.0),
        max_range: 4.0,
        repeat_ms: 1000.0,
        prepare_ms: 500.0,
    };
    let ranged = |pierce, range| AttackStats {
        kind: AttackType::Ranged,
        damage: DamageTable::new(0.0, pierce, 0.0),
        max_range: range,
        repeat_ms: 1250.0,
        prepare_ms: 750.0,
    };
    let profile = |attack: AttackStats, resistance: f32| CombatProfile {
        attacks: vec![attack],
        resistance: DamageTable::new(resistance, resistance, resistance),
    };

    let base = EntityView::new(EntityId(0), owner, template);
    if template.starts_with("ship_trireme") {
        base.with_classes(&[EntityClass::Unit, EntityClass::Ship, EntityClass::Warship])
            .with_combat(profile(ranged(35.0, 50.0), 3.0))
            .with_garrison(10)
    } else if template.starts_with("ship") {
        base.with_classes(&[EntityClass::Unit, EntityClass::Ship])
            .with_garrison(20)
    } else if template.starts_with("cavalry") {
        base.with_classes(&[EntityClass::Unit, EntityClass::Cavalry, EntityClass::FastUnit])
            .with_combat(profile(ranged(16.0, 30.0), 3.0))
    } else if template.starts_with("elephant") {
        base.with_classes(&[EntityClass::Unit, EntityClass::Elephant])
            .with_combat(profile(melee(20.0, 0.0), 8.0))
    } else if template.starts_with("support") {
        base.with_classes(&[EntityClass::Unit, EntityClass::Support])
    } else {
        base.with_classes(&[EntityClass::Unit, EntityClass::Infantry])
            .with_combat(profile(melee(3.0, 2.5), 5.0))
    }
}

fn structure_classes(template: &str) -> Vec<EntityClass> {
    let mut classes = vec![EntityClass::Structure];
    let extra = match template {
        "civil_centre" => Some(EntityClass::CivCentre),
        "barracks" => Some(EntityClass::Barracks),
        "dock" => Some(EntityClass::Dock),
        "defense_tower" | "sentry_tower" => Some(EntityClass::Tower),
        "wall_tower" => Some(EntityClass::WallTower),
        "fortress" => Some(EntityClass::Fortress),
        "wonder" => Some(EntityClass::Wonder),
        _ => None,
    };
    classes.extend(extra);
    classes
}

impl EntityStore for SandboxWorld {
    fn get(&self, id: EntityId) -> Option<&EntityView> {
        self.entities.get(&id)
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &EntityView> + '_> {
        Box::new(self.entities.values())
    }
}

impl Accessibility for SandboxWorld {
    fn region_of(&self, pos: Vec2) -> Option<RegionId> {
        self.regions
            .iter()
            .find(|(_, r)| r.bounds.contains(pos))
            .map(|(id, _)| *id)
    }

    fn region_kind(&self, region: RegionId) -> Option<RegionKind> {
        self.regions.get(&region).map(|r| r.kind)
    }

    fn region_path(&self, from: RegionId, to: RegionId) -> Option<Vec<RegionId>> {
        if !self.regions.contains_key(&from) || !self.regions.contains_key(&to) {
            return None;
        }
        let mut came_from: BTreeMap<RegionId, RegionId> = BTreeMap::new();
        let mut queue = VecDeque::from([from]);
        let mut seen = BTreeSet::from([from]);
        while let Some(current) = queue.pop_front() {
            if current == to {
                let mut path = vec![to];
                let mut cursor = to;
                while let Some(prev) = came_from.get(&cursor) {
                    path.push(*prev);
                    cursor = *prev;
                }
                path.reverse();
                return Some(path);
            }
            for next in self.links.get(&current).into_iter().flatten() {
                if seen.insert(*next) {
                    came_from.insert(*next, current);
                    queue.push_back(*next);
                }
            }
        }
        None
    }

    fn shore_tiles(&self, land: RegionId, sea: RegionId) -> Vec<Vec2> {
        match (self.regions.get(&land), self.regions.get(&sea)) {
            (Some(l), Some(s)) if l.kind == RegionKind::Land && s.kind == RegionKind::Sea => {
                l.bounds.shore_with(&s.bounds)
            }
            _ => Vec::new(),
        }
    }

    fn is_obstructed(&self, pos: Vec2) -> bool {
        self.obstructions
            .iter()
            .any(|(centre, radius)| centre.distance(pos) <= *radius)
    }
}

impl GameState for SandboxWorld {
    fn turn(&self) -> Turn {
        self.turn
    }

    fn territory_owner(&self, pos: Vec2) -> Option<PlayerId> {
        let civ_centres = self
            .entities
            .values()
            .filter(|e| e.has_class(EntityClass::CivCentre) && !e.is_foundation())
            .filter_map(|e| {
                e.position.map(|centre| Territory {
                    owner: e.owner,
                    centre,
                    radius: CIV_CENTRE_TERRITORY,
                })
            });
        self.territories
            .iter()
            .cloned()
            .chain(civ_centres)
            .filter(|t| t.centre.distance(pos) <= t.radius)
            .min_by(|a, b| a.centre.distance(pos).total_cmp(&b.centre.distance(pos)))
            .map(|t| t.owner)
    }

    fn players(&self) -> Vec<PlayerId> {
        self.teams.keys().copied().collect()
    }

    fn is_enemy(&self, player: PlayerId, other: PlayerId) -> bool {
        if player == other || player.is_gaia() || other.is_gaia() {
            return false;
        }
        match (self.teams.get(&player), self.teams.get(&other)) {
            (Some(a), Some(b)) => a != b,
            _ => false,
        }
    }

    fn is_ally(&self, player: PlayerId, other: PlayerId) -> bool {
        if player == other {
            return true;
        }
        match (self.teams.get(&player), self.teams.get(&other)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    fn population(&self, player: PlayerId) -> u32 {
        self.entities
            .values()
            .filter(|e| e.owner == player && e.has_class(EntityClass::Unit))
            .count() as u32
    }

    fn population_cap(&self, player: PlayerId) -> u32 {
        self.population_caps.get(&player).copied().unwrap_or(0)
    }

    fn victory_conditions(&self) -> Vec<VictoryCondition> {
        self.victory.clone()
    }

    fn can_train(&self, player: PlayerId, template: &str) -> bool {
        self.teams.contains_key(&player) && !self.locked_templates.contains(template)
    }

    fn queued_in_production(&self, player: PlayerId, purpose: &TrainingPurpose) -> u32 {
        self.production
            .iter()
            .filter(|job| job.owner == player && job.order.purpose == *purpose)
            .map(|job| job.order.count)
            .sum()
    }
}
