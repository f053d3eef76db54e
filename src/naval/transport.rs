//! Ferrying a group of land units across water
//!
//! A plan walks `Unstarted -> WaitingForBoarding -> Boarding -> Moving ->
//! Unboarding`, one step per turn at most. It only falls back to
//! `WaitingForBoarding` when ships are lost before departure, and back to
//! `Unstarted` when a route has further sea crossings after a landing.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::context::TurnContext;
use crate::core::error::{Result, WarError};
use crate::core::types::{EntityId, RegionId, TransportId, Turn};
use crate::naval::manager::DockRegistry;
use crate::naval::shoreline::{find_spot, SpotQuery};
use crate::world::entity::EntityView;
use crate::world::GameState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TransportState {
    Unstarted,
    WaitingForBoarding,
    Boarding,
    Moving,
    Unboarding,
}

/// Fleet-size increments a plan asked of one sea
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetReservation {
    pub transports: u32,
    pub warships: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportPlan {
    pub id: TransportId,
    /// Fixed at creation; members that die simply stop counting
    unit_ids: Vec<EntityId>,
    pub destination: Vec2,
    pub destination_region: RegionId,
    escort_size: u32,
    all_at_once: bool,
    state: TransportState,
    state_turn: Option<Turn>,
    start_region: Option<RegionId>,
    /// Remaining regions from the current start to the destination
    route: Vec<RegionId>,
    boarding_spot: Option<Vec2>,
    unboarding_spot: Option<Vec2>,
    transport_ships: Vec<EntityId>,
    escort_ships: Vec<EntityId>,
    /// Ship -> units ordered aboard it, confirmed or not
    loads: BTreeMap<EntityId, BTreeSet<EntityId>>,
    /// Handed back to the fleets if the plan is abandoned
    #[serde(default)]
    reserved: BTreeMap<RegionId, FleetReservation>,
}

impl TransportPlan {
    /// Plan for `units`; the caller has already claimed them
    pub fn new(
        id: TransportId,
        units: Vec<EntityId>,
        destination: Vec2,
        destination_region: RegionId,
        escort_size: u32,
        all_at_once: bool,
    ) -> Self {
        Self {
            id,
            unit_ids: units,
            destination,
            destination_region,
            escort_size,
            all_at_once,
            state: TransportState::Unstarted,
            state_turn: None,
            start_region: None,
            route: Vec::new(),
            boarding_spot: None,
            unboarding_spot: None,
            transport_ships: Vec::new(),
            escort_ships: Vec::new(),
            loads: BTreeMap::new(),
            reserved: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn unit_ids(&self) -> &[EntityId] {
        &self.unit_ids
    }

    pub fn transport_ships(&self) -> &[EntityId] {
        &self.transport_ships
    }

    pub fn escort_ships(&self) -> &[EntityId] {
        &self.escort_ships
    }

    pub fn start_region(&self) -> Option<RegionId> {
        self.start_region
    }

    pub fn boarding_spot(&self) -> Option<Vec2> {
        self.boarding_spot
    }

    pub fn unboarding_spot(&self) -> Option<Vec2> {
        self.unboarding_spot
    }

    /// Units ordered aboard `ship`
    pub fn load_of(&self, ship: EntityId) -> usize {
        self.loads.get(&ship).map_or(0, |l| l.len())
    }

    pub fn reservations(&self) -> &BTreeMap<RegionId, FleetReservation> {
        &self.reserved
    }

    /// Record that this plan raised the wanted ship counts of `sea`
    pub fn reserve(&mut self, sea: RegionId, transports: u32, warships: u32) {
        let entry = self.reserved.entry(sea).or_default();
        entry.transports += transports;
        entry.warships += warships;
    }

    pub fn take_reservations(&mut self) -> BTreeMap<RegionId, FleetReservation> {
        std::mem::take(&mut self.reserved)
    }

    /// Sea the next crossing uses, once a route is known
    pub fn sea_region(&self) -> Option<RegionId> {
        self.route.get(1).copied()
    }

    fn set_state(&mut self, state: TransportState, turn: Turn) {
        tracing::debug!(plan = %self.id, from = ?self.state, to = ?state, "transport state");
        self.state = state;
        self.state_turn = Some(turn);
    }

    /// Entered the current state this turn or the one before
    fn is_fresh(&self, turn: Turn) -> bool {
        self.state_turn.map_or(true, |t| turn <= t + 1)
    }

    fn live_units<'g, G: GameState>(&self, game: &'g G) -> Vec<&'g EntityView> {
        self.unit_ids.iter().filter_map(|id| game.live(*id)).collect()
    }

    fn live_transports<'g, G: GameState>(&self, game: &'g G) -> Vec<&'g EntityView> {
        self.transport_ships
            .iter()
            .filter_map(|id| game.live(*id))
            .collect()
    }

    fn capacity<G: GameState>(&self, game: &G) -> u32 {
        self.live_transports(game).iter().map(|s| s.garrison_max).sum()
    }

    /// More transport capacity is needed before boarding can begin
    pub fn needs_transport_ships<G: GameState>(&self, game: &G) -> bool {
        (self.capacity(game) as usize) < self.live_units(game).len()
    }

    /// An escort was asked for and is not complete yet
    pub fn needs_escort_ships(&self) -> bool {
        self.escort_size > 0 && (self.escort_ships.len() as u32) < self.escort_size
    }

    /// Free transport slots. With `only_truly_free`, ships that are still
    /// taking units aboard are left out entirely.
    pub fn count_free_slots<G: GameState>(&self, game: &G, only_truly_free: bool) -> u32 {
        self.live_transports(game)
            .iter()
            .filter_map(|ship| {
                let ordered = self.load_of(ship.id);
                let aboard = ship.garrisoned.len();
                if only_truly_free {
                    (ordered <= aboard).then(|| ship.free_slots())
                } else {
                    Some(ship.garrison_max.saturating_sub(ordered.max(aboard) as u32))
                }
            })
            .sum()
    }

    pub fn assign_transport_ship<G: GameState>(&mut self, ctx: &mut TurnContext<G>, ship: EntityId) -> bool {
        if self.transport_ships.contains(&ship) || ctx.claims.carriage.claim(ship, self.id).is_err() {
            return false;
        }
        self.transport_ships.push(ship);
        true
    }

    pub fn assign_escort_ship<G: GameState>(&mut self, ctx: &mut TurnContext<G>, ship: EntityId) -> bool {
        if self.escort_ships.contains(&ship) || ctx.claims.carriage.claim(ship, self.id).is_err() {
            return false;
        }
        self.escort_ships.push(ship);
        true
    }

    /// Hand back ships and units
    pub fn release<G: GameState>(&mut self, ctx: &mut TurnContext<G>) {
        ctx.claims.carriage.release_all(self.id);
        self.transport_ships.clear();
        self.escort_ships.clear();
        self.loads.clear();
    }

    /// Entity replaced by a new id
    pub fn rename(&mut self, from: EntityId, to: EntityId) {
        for id in self
            .unit_ids
            .iter_mut()
            .chain(self.transport_ships.iter_mut())
            .chain(self.escort_ships.iter_mut())
            .filter(|id| **id == from)
        {
            *id = to;
        }
        if let Some(load) = self.loads.remove(&from) {
            self.loads.insert(to, load);
        }
        for load in self.loads.values_mut() {
            if load.remove(&from) {
                load.insert(to);
            }
        }
    }

    /// Drop dead ships. Passengers of a sunk ship died with it; units that
    /// were only ordered aboard become free to board another one.
    fn prune_ships<G: GameState>(&mut self, ctx: &mut TurnContext<G>) {
        let game = ctx.game;
        let dead: Vec<EntityId> = self
            .transport_ships
            .iter()
            .chain(self.escort_ships.iter())
            .copied()
            .filter(|id| game.live(*id).is_none())
            .collect();
        for ship in dead {
            self.transport_ships.retain(|s| *s != ship);
            self.escort_ships.retain(|s| *s != ship);
            self.loads.remove(&ship);
            ctx.claims.carriage.release(ship, self.id);
        }
    }

    /// Advance the plan by at most one state.
    ///
    /// `Ok(true)` keeps the plan running, `Ok(false)` means it finished.
    /// An error ends the plan; the manager tears it down.
    pub fn carry_on<G: GameState>(&mut self, ctx: &mut TurnContext<G>, docks: &DockRegistry) -> Result<bool> {
        self.prune_ships(ctx);
        if self.live_units(ctx.game).is_empty() {
            return Ok(false);
        }
        match self.state {
            TransportState::Unstarted => self.on_unstarted(ctx),
            TransportState::WaitingForBoarding => self.on_waiting(ctx, docks),
            TransportState::Boarding => self.on_boarding(ctx),
            TransportState::Moving => self.on_moving(ctx),
            TransportState::Unboarding => self.on_unboarding(ctx),
        }
    }

    fn on_unstarted<G: GameState>(&mut self, ctx: &mut TurnContext<G>) -> Result<bool> {
        let game = ctx.game;
        let regions: BTreeSet<RegionId> = self
            .live_units(game)
            .iter()
            .filter_map(|u| {
                u.region
                    .or_else(|| u.garrisoned_in.and_then(|h| game.get(h)).and_then(|h| h.region))
            })
            .collect();
        let start = match regions.len() {
            1 => regions.into_iter().next().ok_or(WarError::SpanningRegions(0))?,
            n => return Err(WarError::SpanningRegions(n)),
        };
        if start == self.destination_region {
            ctx.commands.move_to(self.live_unit_ids(game), self.destination);
            return Ok(false);
        }
        self.start_region = Some(start);
        self.route.clear();
        self.boarding_spot = None;
        self.unboarding_spot = None;
        self.set_state(TransportState::WaitingForBoarding, ctx.turn());
        Ok(true)
    }

    fn on_waiting<G: GameState>(&mut self, ctx: &mut TurnContext<G>, docks: &DockRegistry) -> Result<bool> {
        let Some(start) = self.start_region else {
            self.set_state(TransportState::Unstarted, ctx.turn());
            return Ok(true);
        };
        let unreachable = WarError::UnreachableRoute {
            from: start,
            to: self.destination_region,
        };
        if self.route.is_empty() {
            let route = ctx
                .game
                .region_path(start, self.destination_region)
                .filter(|r| r.len() >= 3)
                .ok_or(unreachable)?;
            self.route = route;
        }
        if !docks.path_is_usable(ctx.game, &self.route) {
            return Err(WarError::UnreachableRoute {
                from: start,
                to: self.destination_region,
            });
        }
        let sea = self.route[1];

        if self.boarding_spot.is_none() {
            let reference = centroid(&self.live_units(ctx.game)).unwrap_or(self.destination);
            let query = SpotQuery {
                land: start,
                sea,
                reference,
                tolerate_enemy: false,
            };
            let spot = find_spot(ctx, query).ok_or(WarError::NoShoreline { land: start, sea })?;
            self.boarding_spot = Some(spot);
        }

        let escorts_block = self.all_at_once && self.needs_escort_ships();
        if self.needs_transport_ships(ctx.game) || escorts_block {
            return Ok(true);
        }
        self.set_state(TransportState::Boarding, ctx.turn());
        Ok(true)
    }

    fn on_boarding<G: GameState>(&mut self, ctx: &mut TurnContext<G>) -> Result<bool> {
        let escorts_block = self.all_at_once && self.needs_escort_ships();
        if self.needs_transport_ships(ctx.game) || escorts_block {
            self.set_state(TransportState::WaitingForBoarding, ctx.turn());
            return Ok(true);
        }
        let Some(spot) = self.boarding_spot else {
            self.set_state(TransportState::WaitingForBoarding, ctx.turn());
            return Ok(true);
        };
        let game = ctx.game;
        let proximity = ctx.config.naval.proximity;
        let reissue = self.is_fresh(ctx.turn()) || ctx.config.naval.boarding_cadence.is_due(ctx.turn());

        // a load counts until the unit is seen aboard somewhere else
        for (ship, load) in self.loads.iter_mut() {
            load.retain(|u| {
                game.live(*u)
                    .is_some_and(|v| v.garrisoned_in.is_none() || v.garrisoned_in == Some(*ship))
            });
        }

        let ships_at_spot: Vec<&EntityView> = self
            .live_transports(game)
            .into_iter()
            .filter(|s| s.position.is_some_and(|p| p.distance(spot) <= proximity))
            .collect();

        if reissue {
            let away: Vec<EntityId> = self
                .live_transports(game)
                .iter()
                .filter(|s| !s.position.is_some_and(|p| p.distance(spot) <= proximity))
                .map(|s| s.id)
                .chain(self.escort_ships.iter().copied())
                .collect();
            ctx.commands.move_to(away, spot);
        }

        let mut waiting = Vec::new();
        let mut stragglers = Vec::new();
        for unit in self.live_units(game) {
            if unit.garrisoned_in.is_some_and(|h| self.transport_ships.contains(&h)) {
                continue;
            }
            let ordered = self.loads.iter().find(|(_, l)| l.contains(&unit.id)).map(|(s, _)| *s);
            let near = unit.position.is_some_and(|p| p.distance(spot) <= proximity);
            match (ordered, near) {
                (Some(ship), true) if reissue => ctx.commands.garrison(unit.id, ship),
                (Some(_), true) => {}
                (None, true) => waiting.push(unit.id),
                (_, false) => stragglers.push(unit.id),
            }
        }
        if reissue {
            ctx.commands.move_to(stragglers, spot);
        }

        let mut cursor = 0;
        for unit in waiting {
            while cursor < ships_at_spot.len() {
                let ship = ships_at_spot[cursor];
                let load = self.loads.entry(ship.id).or_default();
                if (load.len() as u32) < ship.garrison_max {
                    load.insert(unit);
                    ctx.commands.garrison(unit, ship.id);
                    break;
                }
                cursor += 1;
            }
        }

        let all_aboard = self.live_units(game).iter().all(|u| {
            u.garrisoned_in
                .is_some_and(|h| self.transport_ships.contains(&h))
        });
        let no_room = self.count_free_slots(game, false) == 0
            && self.live_transports(game).iter().all(|s| s.free_slots() == 0);
        if all_aboard || no_room {
            self.set_state(TransportState::Moving, ctx.turn());
        }
        Ok(true)
    }

    fn on_moving<G: GameState>(&mut self, ctx: &mut TurnContext<G>) -> Result<bool> {
        let (Some(&sea), Some(&landing)) = (self.route.get(1), self.route.get(2)) else {
            return Err(WarError::UnreachableRoute {
                from: self.start_region.unwrap_or(self.destination_region),
                to: self.destination_region,
            });
        };
        if self.transport_ships.is_empty() {
            self.set_state(TransportState::WaitingForBoarding, ctx.turn());
            return Ok(true);
        }

        let spot = match self.unboarding_spot {
            Some(spot) => spot,
            None => {
                let query = SpotQuery {
                    land: landing,
                    sea,
                    reference: self.destination,
                    tolerate_enemy: true,
                };
                let spot = find_spot(ctx, query).ok_or(WarError::NoShoreline { land: landing, sea })?;
                self.unboarding_spot = Some(spot);
                spot
            }
        };

        let proximity = ctx.config.naval.proximity;
        let transports = self.live_transports(ctx.game);
        let arrived = transports
            .iter()
            .all(|s| s.position.is_some_and(|p| p.distance(spot) <= proximity));
        if arrived {
            self.set_state(TransportState::Unboarding, ctx.turn());
            return Ok(true);
        }

        if self.is_fresh(ctx.turn()) || ctx.config.naval.boarding_cadence.is_due(ctx.turn()) {
            let fleet: Vec<EntityId> = transports
                .iter()
                .map(|s| s.id)
                .chain(self.escort_ships.iter().copied())
                .collect();
            ctx.commands.move_to(fleet, spot);
        }
        Ok(true)
    }

    fn on_unboarding<G: GameState>(&mut self, ctx: &mut TurnContext<G>) -> Result<bool> {
        let Some(spot) = self.unboarding_spot else {
            self.set_state(TransportState::Moving, ctx.turn());
            return Ok(true);
        };
        let game = ctx.game;
        let proximity = ctx.config.naval.proximity;

        let mut still_aboard = false;
        for ship in self.live_transports(game) {
            if ship.garrisoned.is_empty() {
                continue;
            }
            still_aboard = true;
            if ship.position.is_some_and(|p| p.distance(spot) <= proximity) {
                ctx.commands.unload_all(ship.id);
            } else {
                ctx.commands.move_to(vec![ship.id], spot);
            }
        }
        if still_aboard {
            return Ok(true);
        }

        if self.route.len() >= 2 {
            self.route.drain(..2);
        }
        self.loads.clear();
        if self.route.len() > 1 {
            // another crossing ahead: start over from the new shore
            ctx.claims.carriage.release_all(self.id);
            for unit in &self.unit_ids {
                ctx.claims.carriage.claim(*unit, self.id).ok();
            }
            self.transport_ships.clear();
            self.escort_ships.clear();
            self.start_region = None;
            self.set_state(TransportState::Unstarted, ctx.turn());
            return Ok(true);
        }

        ctx.commands.move_to(self.live_unit_ids(game), self.destination);
        Ok(false)
    }

    fn live_unit_ids<G: GameState>(&self, game: &G) -> Vec<EntityId> {
        self.live_units(game).iter().map(|u| u.id).collect()
    }
}

fn centroid(units: &[&EntityView]) -> Option<Vec2> {
    let positions: Vec<Vec2> = units.iter().filter_map(|u| u.position).collect();
    if positions.is_empty() {
        return None;
    }
    Some(positions.iter().copied().sum::<Vec2>() / positions.len() as f32)
}
