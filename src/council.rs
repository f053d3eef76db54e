//! One AI player's military: defense, navy and attacks under a single turn loop

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::attack::{AttackKind, AttackManager, AttackRequestReply, PlanOptions};
use crate::context::TurnContext;
use crate::core::config::MilitaryConfig;
use crate::core::error::Result;
use crate::core::types::{AttackPlanId, EntityId, PlayerId, TransportId};
use crate::military::{ArmyRoster, ClaimRegistry};
use crate::naval::NavalManager;
use crate::world::{CommandBuffer, EventBatch, GameState, ProductionQueues};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarCouncil {
    player: PlayerId,
    #[serde(skip)]
    config: MilitaryConfig,
    claims: ClaimRegistry,
    roster: ArmyRoster,
    naval: NavalManager,
    attack: AttackManager,
}

impl WarCouncil {
    pub fn new(player: PlayerId, config: MilitaryConfig) -> Self {
        let attack = AttackManager::new(&config.attack);
        Self {
            player,
            config,
            claims: ClaimRegistry::new(),
            roster: ArmyRoster::new(),
            naval: NavalManager::new(),
            attack,
        }
    }

    pub fn player(&self) -> PlayerId {
        self.player
    }

    pub fn config(&self) -> &MilitaryConfig {
        &self.config
    }

    pub fn claims(&self) -> &ClaimRegistry {
        &self.claims
    }

    pub fn roster(&self) -> &ArmyRoster {
        &self.roster
    }

    pub fn naval(&self) -> &NavalManager {
        &self.naval
    }

    pub fn attack(&self) -> &AttackManager {
        &self.attack
    }

    pub fn attack_mut(&mut self) -> &mut AttackManager {
        &mut self.attack
    }

    pub fn replies(&self) -> &[AttackRequestReply] {
        self.attack.replies()
    }

    pub fn outgoing_requests(&self) -> &[PlayerId] {
        self.attack.outgoing_requests()
    }

    /// Run one turn. All events are applied to every manager before any
    /// manager makes a decision.
    pub fn update<G: GameState>(
        &mut self,
        game: &G,
        queues: &mut ProductionQueues,
        events: &EventBatch,
    ) -> CommandBuffer {
        let _span = tracing::debug_span!("war_council", player = %self.player, turn = game.turn()).entered();
        let mut commands = CommandBuffer::new();
        let mut ctx = TurnContext::new(game, self.player, &self.config, &mut self.claims, &mut commands);

        for (from, to) in events.renames() {
            ctx.claims.rename(from, to);
        }
        self.roster.handle_events(&mut ctx, events);
        self.naval.handle_events(&mut ctx, events);
        self.attack.handle_events(&mut ctx, events, queues);
        for lost in events.lost_entities() {
            ctx.claims.forget(lost);
        }

        self.roster.update(&mut ctx);
        self.naval.run_turn(&mut ctx, queues);
        let raid_targets = self.roster.threat_targets(game, self.player);
        self.attack.run_turn(&mut ctx, queues, &mut self.naval, &raid_targets);

        tracing::trace!(commands = commands.len(), "turn done");
        commands
    }

    /// Ask the navy to carry `units` to `destination`. Orders are issued on
    /// the following turns.
    pub fn request_transport<G: GameState>(
        &mut self,
        game: &G,
        units: &[EntityId],
        destination: Vec2,
    ) -> Option<TransportId> {
        let mut commands = CommandBuffer::new();
        let mut ctx = TurnContext::new(game, self.player, &self.config, &mut self.claims, &mut commands);
        self.naval.require_transport(&mut ctx, units, destination)
    }

    /// Prepare an attack outside the regular schedule
    pub fn plan_attack<G: GameState>(
        &mut self,
        game: &G,
        kind: AttackKind,
        options: PlanOptions,
    ) -> Result<AttackPlanId> {
        let mut commands = CommandBuffer::new();
        let mut ctx = TurnContext::new(game, self.player, &self.config, &mut self.claims, &mut commands);
        self.attack.create_plan(&mut ctx, kind, options)
    }

    /// Serialize all persistent state. Configuration is not saved.
    pub fn save(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn load(json: &str, config: MilitaryConfig) -> Result<Self> {
        let mut council: WarCouncil = serde_json::from_str(json)?;
        council.config = config;
        Ok(council)
    }
}
