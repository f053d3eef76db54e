//! Fleets, docks and transport plans of one player

use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::context::TurnContext;
use crate::core::types::{EntityId, IdAllocator, RegionId, TransportId};
use crate::naval::transport::{TransportPlan, TransportState};
use crate::world::entity::EntityClass;
use crate::world::{EventBatch, GameEvent, GameState, ProductionQueues, RegionKind, TrainingPurpose};

/// Which seas each land region can launch ships into
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DockRegistry {
    land_zone_docked: BTreeMap<RegionId, BTreeSet<RegionId>>,
    accessible_seas: BTreeSet<RegionId>,
}

impl DockRegistry {
    /// A dock on `land` opening onto `sea`. Returns whether the sea is new.
    pub fn register(&mut self, land: RegionId, sea: RegionId) -> bool {
        self.land_zone_docked.entry(land).or_default().insert(sea);
        self.accessible_seas.insert(sea)
    }

    pub fn is_accessible(&self, sea: RegionId) -> bool {
        self.accessible_seas.contains(&sea)
    }

    pub fn is_docked(&self, land: RegionId, sea: RegionId) -> bool {
        self.land_zone_docked
            .get(&land)
            .is_some_and(|seas| seas.contains(&sea))
    }

    pub fn accessible_seas(&self) -> impl Iterator<Item = RegionId> + '_ {
        self.accessible_seas.iter().copied()
    }

    /// Every embarkation along `path` happens from a docked shore
    pub fn path_is_usable<G: GameState>(&self, game: &G, path: &[RegionId]) -> bool {
        path.windows(2).all(|hop| {
            match (game.region_kind(hop[0]), game.region_kind(hop[1])) {
                (Some(RegionKind::Land), Some(RegionKind::Sea)) => self.is_docked(hop[0], hop[1]),
                (Some(_), Some(_)) => true,
                _ => false,
            }
        })
    }
}

/// Ships of one sea region
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeaFleet {
    pub transports: BTreeSet<EntityId>,
    pub warships: BTreeSet<EntityId>,
    pub wanted_transports: u32,
    pub wanted_warships: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavalManager {
    docks: DockRegistry,
    fleets: BTreeMap<RegionId, SeaFleet>,
    plans: BTreeMap<TransportId, TransportPlan>,
    ids: IdAllocator,
}

impl Default for NavalManager {
    fn default() -> Self {
        Self::new()
    }
}

impl NavalManager {
    pub fn new() -> Self {
        Self {
            docks: DockRegistry::default(),
            fleets: BTreeMap::new(),
            plans: BTreeMap::new(),
            ids: IdAllocator::new(),
        }
    }

    pub fn docks(&self) -> &DockRegistry {
        &self.docks
    }

    pub fn fleet(&self, sea: RegionId) -> Option<&SeaFleet> {
        self.fleets.get(&sea)
    }

    pub fn plan(&self, id: TransportId) -> Option<&TransportPlan> {
        self.plans.get(&id)
    }

    pub fn plans(&self) -> impl Iterator<Item = &TransportPlan> {
        self.plans.values()
    }

    pub fn transport_state(&self, id: TransportId) -> Option<TransportState> {
        self.plans.get(&id).map(|p| p.state())
    }

    /// Whether units in `from` could be shipped to `to` with our docks
    pub fn can_reach<G: GameState>(&self, game: &G, from: RegionId, to: RegionId) -> bool {
        if from == to {
            return true;
        }
        game.region_path(from, to)
            .is_some_and(|path| self.docks.path_is_usable(game, &path))
    }

    /// Open a transport for `units` toward `destination`.
    ///
    /// Refused when the destination is off the map or a unit is already
    /// being carried by another plan.
    pub fn require_transport<G: GameState>(
        &mut self,
        ctx: &mut TurnContext<G>,
        units: &[EntityId],
        destination: Vec2,
    ) -> Option<TransportId> {
        let destination_region = ctx.game.region_of(destination)?;
        if units.is_empty() || units.iter().any(|u| !ctx.claims.carriage.is_free(*u)) {
            return None;
        }
        let id = self.ids.next_transport();
        for unit in units {
            ctx.claims.carriage.claim(*unit, id).ok()?;
        }
        let plan = TransportPlan::new(
            id,
            units.to_vec(),
            destination,
            destination_region,
            ctx.config.naval.default_escort_size,
            true,
        );
        tracing::debug!(plan = %id, units = units.len(), to = %destination_region, "transport requested");
        self.plans.insert(id, plan);
        Some(id)
    }

    /// Abandon a transport, freeing its units and ships. The ships it made
    /// the fleets want are no longer wanted.
    pub fn cancel_transport<G: GameState>(&mut self, ctx: &mut TurnContext<G>, id: TransportId) {
        let Some(mut plan) = self.plans.remove(&id) else {
            return;
        };
        plan.release(ctx);
        for (sea, reserved) in plan.take_reservations() {
            if let Some(fleet) = self.fleets.get_mut(&sea) {
                fleet.wanted_transports = fleet.wanted_transports.saturating_sub(reserved.transports);
                fleet.wanted_warships = fleet.wanted_warships.saturating_sub(reserved.warships);
            }
        }
        tracing::debug!(plan = %id, "transport cancelled");
    }

    /// A crossing that sailed keeps the fleet it grew
    fn finish_transport<G: GameState>(&mut self, ctx: &mut TurnContext<G>, id: TransportId) {
        if let Some(mut plan) = self.plans.remove(&id) {
            plan.release(ctx);
            tracing::debug!(plan = %id, "transport finished");
        }
    }

    pub fn handle_events<G: GameState>(&mut self, ctx: &mut TurnContext<G>, events: &EventBatch) {
        for event in events.iter() {
            match event {
                GameEvent::ConstructionFinished { entity } => {
                    let Some(dock) = ctx.game.live(*entity) else {
                        continue;
                    };
                    if dock.owner != ctx.player || !dock.has_class(EntityClass::Dock) {
                        continue;
                    }
                    if let (Some(land), Some(sea)) = (dock.region, dock.sea_region) {
                        if self.docks.register(land, sea) {
                            tracing::info!(sea = %sea, "sea became accessible");
                        }
                    }
                }
                GameEvent::TrainingFinished {
                    entities,
                    purpose: TrainingPurpose::Ship { sea },
                } => {
                    let fleet = self.fleets.entry(*sea).or_default();
                    for ship in entities.iter().filter_map(|e| ctx.game.live(*e)) {
                        if ship.has_class(EntityClass::Warship) {
                            fleet.warships.insert(ship.id);
                        } else {
                            fleet.transports.insert(ship.id);
                        }
                    }
                    tracing::debug!(sea = %sea, ships = entities.len(), "ships launched");
                }
                GameEvent::Renamed { from, to } => {
                    for fleet in self.fleets.values_mut() {
                        for set in [&mut fleet.transports, &mut fleet.warships] {
                            if set.remove(from) {
                                set.insert(*to);
                            }
                        }
                    }
                    for plan in self.plans.values_mut() {
                        plan.rename(*from, *to);
                    }
                }
                _ => {}
            }
        }
        for lost in events.lost_entities() {
            for fleet in self.fleets.values_mut() {
                fleet.transports.remove(&lost);
                fleet.warships.remove(&lost);
            }
        }
    }

    pub fn update<G: GameState>(
        &mut self,
        ctx: &mut TurnContext<G>,
        queues: &mut ProductionQueues,
        events: &EventBatch,
    ) {
        self.handle_events(ctx, events);
        self.run_turn(ctx, queues);
    }

    /// One turn of decisions; events must already be applied
    pub fn run_turn<G: GameState>(&mut self, ctx: &mut TurnContext<G>, queues: &mut ProductionQueues) {
        self.refresh(ctx);
        self.assign_ships(ctx);
        self.advance_plans(ctx);

        if ctx.config.naval.fleet_cadence.is_due(ctx.turn()) {
            self.maintain_fleet(ctx, queues);
        }
        if !queues.has_queued_ships() {
            self.raise_wanted(ctx);
        }
    }

    /// Pick up docks and ships we own but have not seen yet
    fn refresh<G: GameState>(&mut self, ctx: &TurnContext<G>) {
        let game = ctx.game;
        for entity in game.by_owner(ctx.player).filter(|e| e.is_alive()) {
            if entity.has_class(EntityClass::Dock) && !entity.is_foundation() {
                if let (Some(land), Some(sea)) = (entity.region, entity.sea_region) {
                    self.docks.register(land, sea);
                }
            } else if entity.has_class(EntityClass::Ship) {
                let Some(sea) = entity.region else {
                    continue;
                };
                let fleet = self.fleets.entry(sea).or_default();
                if entity.has_class(EntityClass::Warship) {
                    fleet.warships.insert(entity.id);
                } else {
                    fleet.transports.insert(entity.id);
                }
            }
        }
        for fleet in self.fleets.values_mut() {
            fleet.transports.retain(|id| game.live(*id).is_some());
            fleet.warships.retain(|id| game.live(*id).is_some());
        }
    }

    /// At most one transport and one escort per plan per turn
    fn assign_ships<G: GameState>(&mut self, ctx: &mut TurnContext<G>) {
        for plan in self.plans.values_mut() {
            if plan.state() != TransportState::WaitingForBoarding {
                continue;
            }
            let Some(sea) = plan.sea_region() else {
                continue;
            };
            let Some(fleet) = self.fleets.get(&sea) else {
                continue;
            };
            if plan.needs_transport_ships(ctx.game) {
                let free = fleet
                    .transports
                    .iter()
                    .copied()
                    .find(|s| ctx.claims.carriage.is_free(*s));
                if let Some(ship) = free {
                    plan.assign_transport_ship(ctx, ship);
                }
            }
            if plan.needs_escort_ships() {
                let free = fleet
                    .warships
                    .iter()
                    .copied()
                    .find(|s| ctx.claims.carriage.is_free(*s));
                if let Some(ship) = free {
                    plan.assign_escort_ship(ctx, ship);
                }
            }
        }
    }

    fn advance_plans<G: GameState>(&mut self, ctx: &mut TurnContext<G>) {
        let ids: Vec<TransportId> = self.plans.keys().copied().collect();
        for id in ids {
            let Some(plan) = self.plans.get_mut(&id) else {
                continue;
            };
            let outcome = plan.carry_on(ctx, &self.docks);
            let sailed = plan.state() >= TransportState::Moving;
            match outcome {
                Ok(true) => {}
                Ok(false) if sailed => self.finish_transport(ctx, id),
                Ok(false) => self.cancel_transport(ctx, id),
                Err(err) => {
                    tracing::debug!(plan = %id, state = ?plan.state(), error = %err, "transport failed");
                    self.cancel_transport(ctx, id);
                }
            }
        }
    }

    /// Queue one ship for every docked sea whose fleet is short, unless one
    /// is already on its way there.
    pub fn maintain_fleet<G: GameState>(&mut self, ctx: &mut TurnContext<G>, queues: &mut ProductionQueues) {
        let naval = &ctx.config.naval;
        let seas: Vec<RegionId> = self.docks.accessible_seas().collect();
        for sea in seas {
            let purpose = TrainingPurpose::Ship { sea };
            if queues.queued_for(&purpose) > 0 || ctx.game.queued_in_production(ctx.player, &purpose) > 0 {
                continue;
            }
            let fleet = self.fleets.entry(sea).or_default();
            let template = if (fleet.transports.len() as u32) < fleet.wanted_transports {
                &naval.transport_template
            } else if (fleet.warships.len() as u32) < fleet.wanted_warships {
                &naval.warship_template
            } else {
                continue;
            };
            if ctx.game.can_train(ctx.player, template) {
                tracing::debug!(sea = %sea, template = %template, "ship queued");
                queues.queue_ship(template, sea);
            }
        }
    }

    /// Plans still short of ships raise their sea's target, once per sea
    fn raise_wanted<G: GameState>(&mut self, ctx: &TurnContext<G>) {
        let mut raised_transport = BTreeSet::new();
        let mut raised_escort = BTreeSet::new();
        for plan in self.plans.values_mut() {
            if plan.state() != TransportState::WaitingForBoarding {
                continue;
            }
            let Some(sea) = plan.sea_region() else {
                continue;
            };
            if !self.docks.is_accessible(sea)
                || ctx
                    .game
                    .queued_in_production(ctx.player, &TrainingPurpose::Ship { sea })
                    > 0
            {
                continue;
            }
            let fleet = self.fleets.entry(sea).or_default();
            let free_transports = fleet
                .transports
                .iter()
                .filter(|s| ctx.claims.carriage.is_free(**s))
                .count();
            if plan.needs_transport_ships(ctx.game)
                && free_transports == 0
                && fleet.transports.len() as u32 >= fleet.wanted_transports
                && raised_transport.insert(sea)
            {
                fleet.wanted_transports += 1;
                plan.reserve(sea, 1, 0);
                tracing::debug!(sea = %sea, wanted = fleet.wanted_transports, "more transports wanted");
            }
            let free_warships = fleet
                .warships
                .iter()
                .filter(|s| ctx.claims.carriage.is_free(**s))
                .count();
            if plan.needs_escort_ships()
                && free_warships == 0
                && fleet.warships.len() as u32 >= fleet.wanted_warships
                && raised_escort.insert(sea)
            {
                fleet.wanted_warships += 1;
                plan.reserve(sea, 0, 1);
            }
        }
    }
}
