//! Schedules, runs and retires attack plans

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::attack::plan::{AttackKind, AttackPlan, PlanOptions, PreparationStep};
use crate::attack::targeting::Targeting;
use crate::context::TurnContext;
use crate::core::config::AttackConfig;
use crate::core::error::Result;
use crate::core::types::{AttackPlanId, EntityId, IdAllocator, PlayerId};
use crate::naval::NavalManager;
use crate::world::entity::EntityClass;
use crate::world::{EventBatch, GameEvent, GameState, ProductionQueues, TrainingPurpose};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestAnswer {
    Join,
    Decline,
    /// Busy with another enemy
    Other(PlayerId),
}

/// Our answer to an ally asking for help
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackRequestReply {
    pub source: PlayerId,
    pub target: PlayerId,
    pub answer: RequestAnswer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackManager {
    upcoming: BTreeMap<AttackKind, Vec<AttackPlan>>,
    started: BTreeMap<AttackKind, Vec<AttackPlan>>,
    targeting: Targeting,
    ids: IdAllocator,
    rush_quota: Vec<usize>,
    rushes_planned: usize,
    attacks_planned: u32,
    #[serde(skip)]
    replies: Vec<AttackRequestReply>,
    #[serde(skip)]
    outgoing_requests: Vec<PlayerId>,
}

impl AttackManager {
    pub fn new(config: &AttackConfig) -> Self {
        Self {
            upcoming: BTreeMap::new(),
            started: BTreeMap::new(),
            targeting: Targeting::default(),
            ids: IdAllocator::new(),
            rush_quota: config.rush_quota(),
            rushes_planned: 0,
            attacks_planned: 0,
            replies: Vec::new(),
            outgoing_requests: Vec::new(),
        }
    }

    pub fn targeting(&self) -> &Targeting {
        &self.targeting
    }

    pub fn rush_quota(&self) -> &[usize] {
        &self.rush_quota
    }

    pub fn upcoming(&self, kind: AttackKind) -> &[AttackPlan] {
        self.upcoming.get(&kind).map_or(&[], |v| v.as_slice())
    }

    pub fn started(&self, kind: AttackKind) -> &[AttackPlan] {
        self.started.get(&kind).map_or(&[], |v| v.as_slice())
    }

    pub fn plans(&self) -> impl Iterator<Item = &AttackPlan> {
        self.upcoming.values().chain(self.started.values()).flatten()
    }

    fn plans_mut(&mut self) -> impl Iterator<Item = &mut AttackPlan> {
        self.upcoming
            .values_mut()
            .chain(self.started.values_mut())
            .flatten()
    }

    pub fn plan(&self, id: AttackPlanId) -> Option<&AttackPlan> {
        self.plans().find(|p| p.id == id)
    }

    /// Replies produced by the last event pass
    pub fn replies(&self) -> &[AttackRequestReply] {
        &self.replies
    }

    /// Enemies we asked our allies to help against during the last turn
    pub fn outgoing_requests(&self) -> &[PlayerId] {
        &self.outgoing_requests
    }

    pub fn set_paused(&mut self, id: AttackPlanId, paused: bool) -> bool {
        match self.plans_mut().find(|p| p.id == id) {
            Some(plan) => {
                plan.set_paused(paused);
                true
            }
            None => false,
        }
    }

    pub fn pause_all(&mut self, paused: bool) {
        for plan in self.plans_mut() {
            plan.set_paused(paused);
        }
    }

    /// Create a plan and put it in preparation
    pub fn create_plan<G: GameState>(
        &mut self,
        ctx: &mut TurnContext<G>,
        kind: AttackKind,
        options: PlanOptions,
    ) -> Result<AttackPlanId> {
        let id = self.ids.next_attack();
        let plan = AttackPlan::new(ctx, id, kind, options)?;
        tracing::info!(plan = %id, kind = %kind, "attack planned");
        self.upcoming.entry(kind).or_default().push(plan);
        Ok(id)
    }

    pub fn handle_events<G: GameState>(
        &mut self,
        ctx: &mut TurnContext<G>,
        events: &EventBatch,
        queues: &mut ProductionQueues,
    ) {
        self.replies.clear();
        self.outgoing_requests.clear();
        let mut answered = false;

        for event in events.iter() {
            match event {
                GameEvent::PlayerDefeated { player } => {
                    self.targeting.mark_defeated(*player);
                }
                GameEvent::AttackRequest { source, target } if !answered => {
                    if let Some(reply) = self.answer_request(ctx, *source, *target) {
                        tracing::info!(ally = %source, enemy = %target, answer = ?reply.answer, "ally request answered");
                        self.replies.push(reply);
                        answered = true;
                    }
                }
                GameEvent::TrainingFinished {
                    entities,
                    purpose: TrainingPurpose::AttackPlan(id),
                } => match self.plans_mut().find(|p| p.id == *id) {
                    Some(plan) => {
                        plan.add_units(ctx, entities);
                    }
                    None => queues.cancel(&TrainingPurpose::AttackPlan(*id)),
                },
                GameEvent::Renamed { from, to } => {
                    for plan in self.plans_mut() {
                        plan.rename(*from, *to);
                    }
                }
                _ => {}
            }
        }
        for lost in events.lost_entities() {
            for plan in self.plans_mut() {
                plan.remove_unit(ctx, lost);
            }
        }
    }

    /// Join an ally's attack when enough of our prepared forces are free
    /// or already going after the same enemy.
    fn answer_request<G: GameState>(
        &mut self,
        ctx: &TurnContext<G>,
        source: PlayerId,
        target: PlayerId,
    ) -> Option<AttackRequestReply> {
        if source == ctx.player
            || !ctx.game.is_ally(ctx.player, source)
            || !ctx.is_enemy(target)
            || self.targeting.is_defeated(target)
        {
            return None;
        }
        let available = |p: &AttackPlan| !p.is_paused() && p.target_player().map_or(true, |t| t == target);
        let forces: usize = self
            .upcoming
            .values()
            .flatten()
            .filter(|p| available(p))
            .map(|p| p.unit_count())
            .sum();

        let answer = if forces > ctx.config.attack.ally_request_threshold {
            for plan in self.upcoming.values_mut().flatten().filter(|p| available(p)) {
                plan.force_start();
                plan.mark_requested(target);
            }
            RequestAnswer::Join
        } else {
            match self
                .upcoming
                .values()
                .flatten()
                .filter_map(|p| p.target_player())
                .find(|p| *p != target)
            {
                Some(other) => RequestAnswer::Other(other),
                None => RequestAnswer::Decline,
            }
        };
        Some(AttackRequestReply {
            source,
            target,
            answer,
        })
    }

    pub fn update<G: GameState>(
        &mut self,
        ctx: &mut TurnContext<G>,
        queues: &mut ProductionQueues,
        events: &EventBatch,
        naval: &mut NavalManager,
        raid_targets: &[EntityId],
    ) {
        self.handle_events(ctx, events, queues);
        self.run_turn(ctx, queues, naval, raid_targets);
    }

    /// One turn of decisions; events must already be applied
    pub fn run_turn<G: GameState>(
        &mut self,
        ctx: &mut TurnContext<G>,
        queues: &mut ProductionQueues,
        naval: &mut NavalManager,
        raid_targets: &[EntityId],
    ) {
        for kind in AttackKind::ALL {
            let plans = std::mem::take(self.upcoming.entry(kind).or_default());
            let mut kept = Vec::with_capacity(plans.len());
            for mut plan in plans {
                let step = plan.update_preparation(ctx, queues, &mut self.targeting, naval);
                if let Some(enemy) = plan.take_announcement() {
                    self.outgoing_requests.push(enemy);
                }
                match step {
                    PreparationStep::Continue => kept.push(plan),
                    PreparationStep::Launch if plan.start_attack(ctx, naval) => {
                        self.started.entry(kind).or_default().push(plan);
                    }
                    PreparationStep::Launch | PreparationStep::Abort => {
                        tracing::info!(plan = %plan.id, kind = %kind, "attack aborted");
                        plan.abort(ctx, queues, naval);
                    }
                }
            }
            self.upcoming.insert(kind, kept);
        }

        for kind in AttackKind::ALL {
            let plans = std::mem::take(self.started.entry(kind).or_default());
            let mut kept = Vec::with_capacity(plans.len());
            for mut plan in plans {
                if plan.update(ctx, naval) {
                    kept.push(plan);
                } else {
                    tracing::info!(plan = %plan.id, kind = %kind, "attack finished");
                    plan.abort(ctx, queues, naval);
                }
            }
            self.started.insert(kind, kept);
        }

        self.schedule(ctx, naval, raid_targets);
    }

    fn schedule<G: GameState>(&mut self, ctx: &mut TurnContext<G>, naval: &NavalManager, raid_targets: &[EntityId]) {
        let game = ctx.game;
        let player = ctx.player;
        let config = &ctx.config.attack;
        let completed = |class: EntityClass| {
            game.by_owner(player)
                .filter(|e| e.has_class(class) && e.is_alive() && !e.is_foundation())
                .count()
        };
        let barracks = completed(EntityClass::Barracks);
        let home = game
            .by_owner(player)
            .find(|e| e.has_class(EntityClass::CivCentre) && e.is_alive() && !e.is_foundation())
            .and_then(|cc| cc.region);
        let has_base = completed(EntityClass::CivCentre) > 0;

        if self.rushes_planned < self.rush_quota.len() && barracks > 0 {
            if self.upcoming(AttackKind::Rush).is_empty() {
                let options = PlanOptions {
                    target_size: Some(self.rush_quota[self.rushes_planned]),
                    ..PlanOptions::default()
                };
                self.rushes_planned += 1;
                if let Err(err) = self.create_plan(ctx, AttackKind::Rush, options) {
                    tracing::debug!(error = %err, "rush skipped");
                }
            }
        } else if self.upcoming(AttackKind::Attack).is_empty() && self.upcoming(AttackKind::HugeAttack).is_empty() {
            let running = self.started(AttackKind::Attack).len() + self.started(AttackKind::HugeAttack).len();
            let cap = game.population_cap(player);
            let pop = game.population(player);
            let by_population = 1 + (cap as f32 / config.population_per_attack.max(1) as f32).round() as usize;
            let allowed = config.max_concurrent_attacks.min(by_population);
            let room = running == 0 || cap.saturating_sub(pop) > config.population_headroom;

            if running < allowed && room && (barracks > 0 || !has_base) {
                let kind = if self.attacks_planned < config.attacks_before_huge
                    || !self.started(AttackKind::HugeAttack).is_empty()
                {
                    AttackKind::Attack
                } else {
                    AttackKind::HugeAttack
                };
                // without a base there is nothing to wait for
                let options = PlanOptions {
                    forced: !has_base,
                    ..PlanOptions::default()
                };
                match self.create_plan(ctx, kind, options) {
                    Ok(_) => self.attacks_planned += 1,
                    Err(err) => tracing::debug!(error = %err, kind = %kind, "attack skipped"),
                }
            }
        }

        if self.upcoming(AttackKind::Raid).is_empty() {
            let raided: Vec<EntityId> = self.plans().filter_map(|p| p.target()).collect();
            let target = raid_targets
                .iter()
                .copied()
                .filter(|t| !raided.contains(t))
                .find(|t| {
                    game.live(*t).is_some_and(|e| {
                        game.is_enemy(player, e.owner)
                            && match (home, e.region) {
                                (Some(from), Some(to)) => naval.can_reach(game, from, to),
                                _ => true,
                            }
                    })
                });
            if let Some(target) = target {
                let options = PlanOptions {
                    target: Some(target),
                    forced: true,
                    ..PlanOptions::default()
                };
                if let Err(err) = self.create_plan(ctx, AttackKind::Raid, options) {
                    tracing::debug!(error = %err, "raid skipped");
                }
            }
        }
    }
}
