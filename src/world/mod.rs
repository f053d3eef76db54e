//! Narrow read interface to the external simulation
//!
//! The military AI never touches simulation internals. It reads entity
//! snapshots, accessibility regions and territory through these traits, and
//! answers with `Command`s and `TrainingOrder`s.

pub mod command;
pub mod entity;
pub mod event;
pub mod sandbox;
pub mod store;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::core::types::{PlayerId, RegionId, Turn};

pub use command::{Command, CommandBuffer, ProductionQueues, TrainingOrder, TrainingPurpose};
pub use entity::{AttackStats, AttackType, CombatProfile, DamageTable, EntityClass, EntityView};
pub use event::{EventBatch, GameEvent};
pub use sandbox::SandboxWorld;
pub use store::{EntityFilter, EntityStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegionKind {
    Land,
    Sea,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VictoryCondition {
    Conquest,
    Wonder,
}

/// Accessibility and region services
pub trait Accessibility {
    fn region_of(&self, pos: Vec2) -> Option<RegionId>;

    fn region_kind(&self, region: RegionId) -> Option<RegionKind>;

    /// Alternating land/sea region sequence from `from` to `to`, both included
    fn region_path(&self, from: RegionId, to: RegionId) -> Option<Vec<RegionId>>;

    /// Land tiles of `land` bordering `sea`, in world coordinates
    fn shore_tiles(&self, land: RegionId, sea: RegionId) -> Vec<Vec2>;

    fn is_obstructed(&self, pos: Vec2) -> bool;
}

/// Everything the military AI reads from the game each turn
pub trait GameState: EntityStore + Accessibility {
    fn turn(&self) -> Turn;

    fn territory_owner(&self, pos: Vec2) -> Option<PlayerId>;

    fn players(&self) -> Vec<PlayerId>;

    fn is_enemy(&self, player: PlayerId, other: PlayerId) -> bool;

    fn is_ally(&self, player: PlayerId, other: PlayerId) -> bool;

    fn population(&self, player: PlayerId) -> u32;

    fn population_cap(&self, player: PlayerId) -> u32;

    fn victory_conditions(&self) -> Vec<VictoryCondition>;

    fn can_train(&self, player: PlayerId, template: &str) -> bool;

    /// Units of `purpose` currently in host production
    fn queued_in_production(&self, player: PlayerId, purpose: &TrainingPurpose) -> u32;
}
