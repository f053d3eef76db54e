//! One offensive operation, from gathering units to fighting at the target
//!
//! Lifecycle: `Unexecuted` (collect and train units) -> `Completing` (rally,
//! ship across water if needed) -> `Started` (march and fight). A paused
//! plan keeps its phase and does nothing until resumed.

use glam::Vec2;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::attack::targeting::Targeting;
use crate::context::TurnContext;
use crate::core::config::{AttackConfig, AttackProfile};
use crate::core::error::{Result, WarError};
use crate::core::types::{AttackPlanId, EntityId, PlayerId, RegionId, TransportId, Turn};
use crate::military::claims::RoleClaim;
use crate::naval::NavalManager;
use crate::world::entity::{EntityClass, EntityView};
use crate::world::{GameState, ProductionQueues, TrainingPurpose};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AttackKind {
    Rush,
    Raid,
    Attack,
    HugeAttack,
}

impl AttackKind {
    pub const ALL: [AttackKind; 4] = [
        AttackKind::Rush,
        AttackKind::Raid,
        AttackKind::Attack,
        AttackKind::HugeAttack,
    ];

    pub fn profile(self, config: &AttackConfig) -> &AttackProfile {
        match self {
            AttackKind::Rush => &config.rush,
            AttackKind::Raid => &config.raid,
            AttackKind::Attack => &config.attack,
            AttackKind::HugeAttack => &config.huge_attack,
        }
    }

    /// Standard attacks may call allies in
    pub fn is_standard(self) -> bool {
        matches!(self, AttackKind::Attack | AttackKind::HugeAttack)
    }

    /// Which of our units this kind of attack recruits
    pub fn recruits(self, unit: &EntityView) -> bool {
        match self {
            AttackKind::Rush => unit.has_class(EntityClass::Infantry),
            AttackKind::Raid => {
                unit.has_class(EntityClass::Cavalry) || unit.has_class(EntityClass::FastUnit)
            }
            AttackKind::Attack | AttackKind::HugeAttack => {
                !unit.has_class(EntityClass::Support) && !unit.has_class(EntityClass::Ship)
            }
        }
    }
}

impl fmt::Display for AttackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttackKind::Rush => "rush",
            AttackKind::Raid => "raid",
            AttackKind::Attack => "attack",
            AttackKind::HugeAttack => "huge attack",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanPhase {
    Unexecuted,
    Completing,
    Started,
}

/// Outcome of one preparation step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreparationStep {
    Abort,
    Continue,
    Launch,
}

/// Creation parameters beyond the kind
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    pub target_player: Option<PlayerId>,
    pub target: Option<EntityId>,
    pub target_size: Option<usize>,
    pub forced: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackPlan {
    pub id: AttackPlanId,
    pub kind: AttackKind,
    phase: PlanPhase,
    paused: bool,
    forced: bool,
    requested: bool,
    /// An ally call is due for the manager to send
    announce: bool,
    min_size: usize,
    target_size: usize,
    target_player: Option<PlayerId>,
    target: Option<EntityId>,
    target_position: Option<Vec2>,
    rally_point: Vec2,
    rally_region: Option<RegionId>,
    units: BTreeSet<EntityId>,
    transports: BTreeSet<TransportId>,
    created_turn: Turn,
    completing_until: Option<Turn>,
    launch_size: usize,
}

impl AttackPlan {
    /// Fails when the plan has no rally point, or when a rush has no land
    /// path to any enemy building.
    pub fn new<G: GameState>(
        ctx: &mut TurnContext<G>,
        id: AttackPlanId,
        kind: AttackKind,
        options: PlanOptions,
    ) -> Result<Self> {
        let game = ctx.game;
        let (rally_point, rally_region) = rally_point(ctx)
            .ok_or_else(|| WarError::NotViable(format!("{kind}: nowhere to rally")))?;
        let profile = kind.profile(&ctx.config.attack);

        let mut plan = Self {
            id,
            kind,
            phase: PlanPhase::Unexecuted,
            paused: false,
            forced: options.forced,
            requested: false,
            announce: false,
            min_size: profile.min_size,
            target_size: options.target_size.unwrap_or(profile.target_size),
            target_player: options.target_player,
            target: None,
            target_position: None,
            rally_point,
            rally_region,
            units: BTreeSet::new(),
            transports: BTreeSet::new(),
            created_turn: ctx.turn(),
            completing_until: None,
            launch_size: 0,
        };
        plan.min_size = plan.min_size.min(plan.target_size);

        if let Some(target) = options.target {
            let view = game
                .live(target)
                .filter(|t| ctx.is_enemy(t.owner))
                .ok_or_else(|| WarError::NotViable(format!("{kind}: target {target} gone")))?;
            plan.target = Some(target);
            plan.target_position = view.position;
            plan.target_player = Some(view.owner);
        }

        if kind == AttackKind::Rush {
            let reachable = game
                .iter()
                .any(|e| e.is_structure() && e.is_alive() && ctx.is_enemy(e.owner) && e.region == rally_region);
            if !reachable {
                return Err(WarError::NotViable("rush: no land path to an enemy".to_string()));
            }
        }
        Ok(plan)
    }

    pub fn phase(&self) -> PlanPhase {
        self.phase
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_forced(&self) -> bool {
        self.forced
    }

    pub fn is_requested(&self) -> bool {
        self.requested
    }

    pub fn target_player(&self) -> Option<PlayerId> {
        self.target_player
    }

    pub fn target(&self) -> Option<EntityId> {
        self.target
    }

    pub fn rally_point(&self) -> Vec2 {
        self.rally_point
    }

    pub fn units(&self) -> &BTreeSet<EntityId> {
        &self.units
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn launch_size(&self) -> usize {
        self.launch_size
    }

    pub fn can_start(&self) -> bool {
        self.units.len() >= self.min_size
    }

    pub fn must_start(&self) -> bool {
        if self.paused || !self.can_start() {
            return false;
        }
        self.forced || self.units.len() >= self.target_size
    }

    /// Start as soon as possible with whatever has been gathered
    pub fn force_start(&mut self) {
        self.min_size = 0;
        self.target_size = 0;
        self.forced = true;
    }

    /// Joined on an ally's behalf against `target`
    pub fn mark_requested(&mut self, target: PlayerId) {
        self.requested = true;
        if self.target_player.is_none() {
            self.target_player = Some(target);
        }
    }

    /// Consume a pending ally call
    pub fn take_announcement(&mut self) -> Option<PlayerId> {
        if !self.announce {
            return None;
        }
        self.announce = false;
        self.target_player
    }

    /// Adopt freshly trained or reassigned units
    pub fn add_units<G: GameState>(&mut self, ctx: &mut TurnContext<G>, ids: &[EntityId]) -> usize {
        let mut added = 0;
        for id in ids {
            let ours = ctx.game.live(*id).is_some_and(|e| e.owner == ctx.player);
            if !ours || !ctx.claims.carriage.is_free(*id) {
                continue;
            }
            if ctx.claims.roles.claim(*id, RoleClaim::Attack(self.id)).is_ok() && self.units.insert(*id) {
                added += 1;
            }
        }
        added
    }

    pub fn remove_unit<G: GameState>(&mut self, ctx: &mut TurnContext<G>, id: EntityId) -> bool {
        ctx.claims.roles.release(id, RoleClaim::Attack(self.id));
        self.units.remove(&id)
    }

    /// Entity replaced by a new id
    pub fn rename(&mut self, from: EntityId, to: EntityId) {
        if self.units.remove(&from) {
            self.units.insert(to);
        }
        if self.target == Some(from) {
            self.target = Some(to);
        }
    }

    /// Give everything back: units, queued training and pending transports
    pub fn abort<G: GameState>(
        &mut self,
        ctx: &mut TurnContext<G>,
        queues: &mut ProductionQueues,
        naval: &mut NavalManager,
    ) {
        queues.cancel(&TrainingPurpose::AttackPlan(self.id));
        for transport in std::mem::take(&mut self.transports) {
            naval.cancel_transport(ctx, transport);
        }
        ctx.claims.roles.release_all(RoleClaim::Attack(self.id));
        self.units.clear();
    }

    /// Free units of the right kind, nearest to the rally point first
    fn assign_units<G: GameState>(&mut self, ctx: &mut TurnContext<G>) -> usize {
        let wanted = self.target_size.saturating_sub(self.units.len());
        if wanted == 0 {
            return 0;
        }
        let rally = self.rally_point;
        let mut candidates: Vec<(EntityId, f32)> = ctx
            .game
            .by_owner(ctx.player)
            .filter(|e| {
                e.is_alive()
                    && e.has_class(EntityClass::Unit)
                    && e.can_attack()
                    && e.garrisoned_in.is_none()
                    && e.region == self.rally_region
                    && self.kind.recruits(e)
                    && ctx.claims.is_unassigned(e.id)
            })
            .filter_map(|e| e.position.map(|p| (e.id, p.distance_squared(rally))))
            .collect();
        candidates.sort_by_key(|(id, d)| (OrderedFloat(*d), *id));
        let picked: Vec<EntityId> = candidates.into_iter().take(wanted).map(|(id, _)| id).collect();
        self.add_units(ctx, &picked)
    }

    fn queue_training<G: GameState>(&self, ctx: &TurnContext<G>, queues: &mut ProductionQueues) {
        let attack = &ctx.config.attack;
        if !attack.training_cadence.is_due(ctx.turn()) {
            return;
        }
        let purpose = TrainingPurpose::AttackPlan(self.id);
        let pending = queues.queued_for(&purpose) + ctx.game.queued_in_production(ctx.player, &purpose);
        if pending > 0 {
            return;
        }
        let profile = self.kind.profile(attack);
        let deficit = self.target_size.saturating_sub(self.units.len()) as u32;
        let count = deficit.min(profile.batch_size);
        if count > 0 && ctx.game.can_train(ctx.player, &profile.template) {
            queues.queue_military(&profile.template, count, purpose);
        }
    }

    /// One turn of preparation
    pub fn update_preparation<G: GameState>(
        &mut self,
        ctx: &mut TurnContext<G>,
        queues: &mut ProductionQueues,
        targeting: &mut Targeting,
        naval: &mut NavalManager,
    ) -> PreparationStep {
        if self.paused {
            return PreparationStep::Continue;
        }
        match self.phase {
            PlanPhase::Unexecuted => self.prepare(ctx, queues, targeting, naval),
            PlanPhase::Completing => self.complete(ctx, naval),
            PlanPhase::Started => PreparationStep::Continue,
        }
    }

    fn prepare<G: GameState>(
        &mut self,
        ctx: &mut TurnContext<G>,
        queues: &mut ProductionQueues,
        targeting: &mut Targeting,
        naval: &mut NavalManager,
    ) -> PreparationStep {
        let profile = self.kind.profile(&ctx.config.attack);
        if !self.forced && ctx.turn().saturating_sub(self.created_turn) > profile.max_preparation_turns {
            tracing::debug!(plan = %self.id, kind = %self.kind, "preparation timed out");
            return PreparationStep::Abort;
        }

        self.assign_units(ctx);
        self.queue_training(ctx, queues);

        let pop = ctx.game.population(ctx.player);
        let cap = ctx.game.population_cap(ctx.player);
        if cap.saturating_sub(pop) < ctx.config.attack.population_margin {
            // no room to grow: go with what we have or give the units back
            if !self.can_start() {
                return PreparationStep::Abort;
            }
        } else if !self.must_start() {
            return PreparationStep::Continue;
        }

        if self.begin_completing(ctx, targeting, naval) {
            PreparationStep::Continue
        } else {
            PreparationStep::Abort
        }
    }

    fn target_alive<G: GameState>(&self, ctx: &TurnContext<G>) -> bool {
        self.target
            .and_then(|t| ctx.game.live(t))
            .is_some_and(|t| ctx.is_enemy(t.owner))
    }

    /// Pick a target if needed and send everyone to the rally point
    fn begin_completing<G: GameState>(
        &mut self,
        ctx: &mut TurnContext<G>,
        targeting: &mut Targeting,
        naval: &mut NavalManager,
    ) -> bool {
        if !self.target_alive(ctx) {
            let player = match self.target_player.filter(|p| !targeting.is_defeated(*p)) {
                Some(player) => player,
                None => match targeting.enemy_player(ctx, self.kind) {
                    Some(player) => player,
                    None => return false,
                },
            };
            let Some((target, position)) = self.nearest_target(ctx, naval, player) else {
                tracing::debug!(plan = %self.id, player = %player, "no target found");
                return false;
            };
            self.target_player = Some(player);
            self.target = Some(target);
            self.target_position = Some(position);
        }

        let profile = self.kind.profile(&ctx.config.attack);
        let completing = match (self.forced, self.kind) {
            (true, AttackKind::Raid) => 0,
            (true, _) => profile.completing_turns.min(ctx.config.attack.forced_completing_turns),
            (false, _) => profile.completing_turns,
        };
        self.completing_until = Some(ctx.turn() + completing);
        self.phase = PlanPhase::Completing;
        if self.kind.is_standard() && !self.requested {
            self.announce = true;
        }

        let mut by_region: BTreeMap<Option<RegionId>, Vec<EntityId>> = BTreeMap::new();
        for id in &self.units {
            if let Some(unit) = ctx.game.live(*id) {
                by_region.entry(unit.region).or_default().push(*id);
            }
        }
        for (region, ids) in by_region {
            if region == self.rally_region {
                ctx.commands.move_to(ids, self.rally_point);
            } else if region.is_some() {
                if let Some(transport) = naval.require_transport(ctx, &ids, self.rally_point) {
                    self.transports.insert(transport);
                }
            }
        }
        tracing::info!(
            plan = %self.id,
            kind = %self.kind,
            units = self.units.len(),
            target = ?self.target,
            "attack gathering"
        );
        true
    }

    fn complete<G: GameState>(&mut self, ctx: &mut TurnContext<G>, naval: &NavalManager) -> PreparationStep {
        if !self.target_alive(ctx) {
            self.phase = PlanPhase::Unexecuted;
            self.target = None;
            self.target_position = None;
            self.completing_until = None;
            return PreparationStep::Continue;
        }
        self.transports.retain(|t| naval.transport_state(*t).is_some());
        if !self.transports.is_empty() {
            return PreparationStep::Continue;
        }
        let rally = self.rally_point;
        let radius = ctx.config.attack.rally_radius;
        let scattered = self.units.iter().any(|id| {
            ctx.game
                .live(*id)
                .and_then(|u| u.position)
                .is_some_and(|p| p.distance(rally) > radius)
        });
        let waiting = self.completing_until.is_some_and(|until| ctx.turn() < until);
        if scattered && waiting {
            PreparationStep::Continue
        } else {
            PreparationStep::Launch
        }
    }

    /// Send the army on its way. Returns false when there is nothing to
    /// send or no way to get there.
    pub fn start_attack<G: GameState>(&mut self, ctx: &mut TurnContext<G>, naval: &mut NavalManager) -> bool {
        let ids: Vec<EntityId> = self
            .units
            .iter()
            .copied()
            .filter(|id| ctx.game.live(*id).is_some())
            .collect();
        let Some(to) = self.target_position else {
            return false;
        };
        if ids.is_empty() {
            return false;
        }
        self.phase = PlanPhase::Started;
        self.launch_size = ids.len();

        let target_region = ctx.game.region_of(to);
        if target_region.is_some() && target_region != self.rally_region {
            match naval.require_transport(ctx, &ids, to) {
                Some(transport) => {
                    self.transports.insert(transport);
                }
                None => return false,
            }
        } else {
            ctx.commands.attack_move(ids, to);
        }
        tracing::info!(plan = %self.id, kind = %self.kind, units = self.launch_size, "attack launched");
        true
    }

    /// Per-turn upkeep of a running attack. Returns false once it is over.
    pub fn update<G: GameState>(&mut self, ctx: &mut TurnContext<G>, naval: &NavalManager) -> bool {
        if self.paused {
            return true;
        }
        let dead: Vec<EntityId> = self
            .units
            .iter()
            .copied()
            .filter(|id| ctx.game.live(*id).is_none())
            .collect();
        for id in dead {
            self.remove_unit(ctx, id);
        }
        if self.units.is_empty() {
            return false;
        }

        let arriving = self.transports.len();
        self.transports.retain(|t| naval.transport_state(*t).is_some());
        let landed = arriving > self.transports.len();

        let mut retargeted = false;
        if !self.target_alive(ctx) {
            if self.kind == AttackKind::Raid {
                return false;
            }
            let Some(player) = self.target_player else {
                return false;
            };
            let Some((target, position)) = self.nearest_target(ctx, naval, player) else {
                return false;
            };
            tracing::debug!(plan = %self.id, target = %target, "attack retargeted");
            self.target = Some(target);
            self.target_position = Some(position);
            retargeted = true;
        }
        if !self.transports.is_empty() {
            return true;
        }
        let (Some(target), Some(to)) = (self.target, self.target_position) else {
            return false;
        };

        let target_region = ctx.game.region_of(to);
        let mut walking = Vec::new();
        let mut idle = Vec::new();
        for id in &self.units {
            let Some(unit) = ctx.game.live(*id) else {
                continue;
            };
            if unit.region.is_none() || unit.region != target_region {
                continue;
            }
            walking.push(*id);
            if unit.idle {
                idle.push(*id);
            }
        }
        if walking.is_empty() {
            // stranded on the wrong shore
            return false;
        }
        if retargeted || landed {
            ctx.commands.attack_move(walking, to);
        } else if ctx.config.attack.order_cadence.is_due(ctx.turn()) {
            ctx.commands.attack(idle, target);
        }
        true
    }

    /// Nearest enemy building of `player` we can get to, civil centres first
    fn nearest_target<G: GameState>(
        &self,
        ctx: &TurnContext<G>,
        naval: &NavalManager,
        player: PlayerId,
    ) -> Option<(EntityId, Vec2)> {
        let game = ctx.game;
        let rally_region = self.rally_region?;
        let reachable = |e: &&EntityView| match e.region {
            Some(region) if self.kind == AttackKind::Rush => region == rally_region,
            Some(region) => naval.can_reach(game, rally_region, region),
            None => false,
        };
        let structures: Vec<&EntityView> = game
            .by_owner(player)
            .filter(|e| e.is_structure() && e.is_alive() && e.position.is_some())
            .filter(reachable)
            .collect();
        let centres: Vec<&EntityView> = structures
            .iter()
            .copied()
            .filter(|e| e.has_class(EntityClass::CivCentre))
            .collect();
        let pool = if centres.is_empty() { structures } else { centres };
        pool.into_iter()
            .filter_map(|e| e.position.map(|p| (e.id, p)))
            .min_by_key(|(id, p)| (OrderedFloat(p.distance_squared(self.rally_point)), *id))
    }
}

/// Civil centre, else barracks, else any building, else any unit
fn rally_point<G: GameState>(ctx: &TurnContext<G>) -> Option<(Vec2, Option<RegionId>)> {
    let own: Vec<&EntityView> = ctx
        .game
        .by_owner(ctx.player)
        .filter(|e| e.is_alive() && e.position.is_some() && !e.has_class(EntityClass::Ship))
        .collect();
    let pick = |pred: &dyn Fn(&EntityView) -> bool| {
        own.iter()
            .find(|e| pred(e))
            .and_then(|e| e.position.map(|p| (p, e.region)))
    };
    pick(&|e| e.has_class(EntityClass::CivCentre) && !e.is_foundation())
        .or_else(|| pick(&|e| e.has_class(EntityClass::Barracks) && !e.is_foundation()))
        .or_else(|| pick(&|e| e.is_structure()))
        .or_else(|| pick(&|e| e.has_class(EntityClass::Unit)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::MilitaryConfig;
    use crate::military::claims::ClaimRegistry;
    use crate::world::sandbox::SandboxWorld;
    use crate::world::{Command, CommandBuffer};

    const ME: PlayerId = PlayerId(1);
    const FOE: PlayerId = PlayerId(2);

    fn field() -> SandboxWorld {
        let mut world = SandboxWorld::two_player();
        world.add_land(0, Vec2::new(0.0, 0.0), Vec2::new(1000.0, 1000.0));
        world.spawn_structure(ME, "civil_centre", Vec2::new(100.0, 100.0), 3);
        world.spawn_structure(ME, "barracks", Vec2::new(130.0, 100.0), 0);
        world.spawn_structure(FOE, "civil_centre", Vec2::new(800.0, 800.0), 3);
        world
    }

    #[test]
    fn test_rush_recruits_infantry_only() {
        let mut world = field();
        let spear = world.spawn_soldier(ME, Vec2::new(120.0, 120.0));
        let rider = world.spawn_cavalry(ME, Vec2::new(120.0, 125.0));
        let config = MilitaryConfig::default();
        let mut claims = ClaimRegistry::new();
        let mut commands = CommandBuffer::new();
        let mut ctx = TurnContext::new(&world, ME, &config, &mut claims, &mut commands);

        let mut plan = AttackPlan::new(&mut ctx, AttackPlanId(0), AttackKind::Rush, PlanOptions::default()).unwrap();
        assert_eq!(plan.assign_units(&mut ctx), 1);
        assert!(plan.units().contains(&spear));
        assert!(ctx.claims.is_unassigned(rider));
    }

    #[test]
    fn test_rush_needs_land_path() {
        let mut world = SandboxWorld::two_player();
        world.add_land(0, Vec2::new(0.0, 0.0), Vec2::new(100.0, 100.0));
        world.add_sea(1, Vec2::new(100.0, 0.0), Vec2::new(200.0, 100.0));
        world.add_land(2, Vec2::new(200.0, 0.0), Vec2::new(300.0, 100.0));
        world.spawn_structure(ME, "civil_centre", Vec2::new(50.0, 50.0), 3);
        world.spawn_structure(FOE, "civil_centre", Vec2::new(250.0, 50.0), 3);
        let config = MilitaryConfig::default();
        let mut claims = ClaimRegistry::new();
        let mut commands = CommandBuffer::new();
        let mut ctx = TurnContext::new(&world, ME, &config, &mut claims, &mut commands);

        let rush = AttackPlan::new(&mut ctx, AttackPlanId(0), AttackKind::Rush, PlanOptions::default());
        assert!(matches!(rush, Err(WarError::NotViable(_))));
        let attack = AttackPlan::new(&mut ctx, AttackPlanId(1), AttackKind::Attack, PlanOptions::default());
        assert!(attack.is_ok());
    }

    #[test]
    fn test_force_start_drops_size_requirements() {
        let world = field();
        let config = MilitaryConfig::default();
        let mut claims = ClaimRegistry::new();
        let mut commands = CommandBuffer::new();
        let mut ctx = TurnContext::new(&world, ME, &config, &mut claims, &mut commands);

        let mut plan = AttackPlan::new(&mut ctx, AttackPlanId(0), AttackKind::Attack, PlanOptions::default()).unwrap();
        assert!(!plan.must_start());
        plan.force_start();
        assert!(plan.is_forced());
        assert!(plan.must_start());
        plan.set_paused(true);
        assert!(!plan.must_start());
    }

    #[test]
    fn test_training_queued_on_cadence() {
        let world = field();
        let config = MilitaryConfig::default();
        let mut claims = ClaimRegistry::new();
        let mut commands = CommandBuffer::new();
        let mut queues = ProductionQueues::new();
        let mut ctx = TurnContext::new(&world, ME, &config, &mut claims, &mut commands);

        let plan = AttackPlan::new(&mut ctx, AttackPlanId(4), AttackKind::Attack, PlanOptions::default()).unwrap();
        plan.queue_training(&ctx, &mut queues);
        plan.queue_training(&ctx, &mut queues);
        assert_eq!(
            queues.queued_for(&TrainingPurpose::AttackPlan(AttackPlanId(4))),
            config.attack.attack.batch_size
        );
    }

    #[test]
    fn test_lifecycle_gather_then_launch() {
        let mut world = field();
        let soldiers: Vec<EntityId> = (0..3)
            .map(|i| world.spawn_soldier(ME, Vec2::new(300.0 + i as f32 * 5.0, 300.0)))
            .collect();
        let config = MilitaryConfig::default();
        let mut claims = ClaimRegistry::new();
        let mut targeting = Targeting::default();
        let mut naval = NavalManager::new();
        let mut queues = ProductionQueues::new();

        let mut plan = {
            let mut commands = CommandBuffer::new();
            let mut ctx = TurnContext::new(&world, ME, &config, &mut claims, &mut commands);
            let options = PlanOptions {
                target_size: Some(3),
                ..PlanOptions::default()
            };
            let mut plan = AttackPlan::new(&mut ctx, AttackPlanId(0), AttackKind::Attack, options).unwrap();
            let step = plan.update_preparation(&mut ctx, &mut queues, &mut targeting, &mut naval);
            assert_eq!(step, PreparationStep::Continue);
            assert_eq!(plan.phase(), PlanPhase::Completing);
            assert_eq!(plan.take_announcement(), Some(FOE));
            world.apply(ME, commands.drain());
            plan
        };

        // everyone walked to the rally point
        let mut commands = CommandBuffer::new();
        let mut ctx = TurnContext::new(&world, ME, &config, &mut claims, &mut commands);
        let step = plan.update_preparation(&mut ctx, &mut queues, &mut targeting, &mut naval);
        assert_eq!(step, PreparationStep::Launch);
        assert!(plan.start_attack(&mut ctx, &mut naval));
        assert_eq!(plan.launch_size(), 3);
        assert!(commands.iter().any(|c| matches!(
            c,
            Command::AttackMove { entities, .. } if entities.len() == soldiers.len()
        )));
    }

    #[test]
    fn test_abort_releases_everything() {
        let mut world = field();
        let soldier = world.spawn_soldier(ME, Vec2::new(120.0, 120.0));
        let config = MilitaryConfig::default();
        let mut claims = ClaimRegistry::new();
        let mut commands = CommandBuffer::new();
        let mut queues = ProductionQueues::new();
        let mut naval = NavalManager::new();
        let mut ctx = TurnContext::new(&world, ME, &config, &mut claims, &mut commands);

        let mut plan = AttackPlan::new(&mut ctx, AttackPlanId(2), AttackKind::Attack, PlanOptions::default()).unwrap();
        plan.assign_units(&mut ctx);
        plan.queue_training(&ctx, &mut queues);
        assert!(!ctx.claims.is_unassigned(soldier));
        plan.abort(&mut ctx, &mut queues, &mut naval);
        assert!(ctx.claims.is_unassigned(soldier));
        assert_eq!(queues.queued_for(&TrainingPurpose::AttackPlan(AttackPlanId(2))), 0);
    }

    #[test]
    fn test_target_loss_reverts_to_unexecuted() {
        let mut world = field();
        world.spawn_soldier(ME, Vec2::new(120.0, 120.0));
        let config = MilitaryConfig::default();
        let mut claims = ClaimRegistry::new();
        let mut targeting = Targeting::default();
        let mut naval = NavalManager::new();
        let mut queues = ProductionQueues::new();
        let mut commands = CommandBuffer::new();

        let mut plan = {
            let mut ctx = TurnContext::new(&world, ME, &config, &mut claims, &mut commands);
            let options = PlanOptions {
                target_size: Some(1),
                ..PlanOptions::default()
            };
            let mut plan = AttackPlan::new(&mut ctx, AttackPlanId(0), AttackKind::Attack, options).unwrap();
            plan.update_preparation(&mut ctx, &mut queues, &mut targeting, &mut naval);
            plan
        };
        assert_eq!(plan.phase(), PlanPhase::Completing);
        if let Some(target) = plan.target() {
            world.kill(target);
        }
        let mut ctx = TurnContext::new(&world, ME, &config, &mut claims, &mut commands);
        let step = plan.update_preparation(&mut ctx, &mut queues, &mut targeting, &mut naval);
        assert_eq!(step, PreparationStep::Continue);
        assert_eq!(plan.phase(), PlanPhase::Unexecuted);
        assert!(plan.target().is_none());
    }
}
