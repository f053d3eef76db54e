//! Simulation events, drained once per turn

use serde::{Deserialize, Serialize};

use crate::core::types::{EntityId, PlayerId};
use crate::world::command::TrainingPurpose;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    ConstructionFinished { entity: EntityId },
    /// The entity was replaced by a new one (promotion, upgrade)
    Renamed { from: EntityId, to: EntityId },
    Destroyed { entity: EntityId },
    OwnershipChanged { entity: EntityId, from: PlayerId, to: PlayerId },
    Garrisoned { entity: EntityId, holder: EntityId },
    TrainingQueued { purpose: TrainingPurpose },
    TrainingFinished { entities: Vec<EntityId>, purpose: TrainingPurpose },
    ResearchQueued { tech: String },
    ResearchFinished { tech: String },
    PlayerDefeated { player: PlayerId },
    AttackRequest { source: PlayerId, target: PlayerId },
}

/// Events of one turn
#[derive(Debug, Clone, Default)]
pub struct EventBatch {
    events: Vec<GameEvent>,
}

impl EventBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    pub fn iter(&self) -> impl Iterator<Item = &GameEvent> {
        self.events.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Entities that stopped being ours or stopped existing this turn
    pub fn lost_entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.events.iter().filter_map(|e| match e {
            GameEvent::Destroyed { entity } => Some(*entity),
            GameEvent::OwnershipChanged { entity, .. } => Some(*entity),
            _ => None,
        })
    }

    pub fn renames(&self) -> impl Iterator<Item = (EntityId, EntityId)> + '_ {
        self.events.iter().filter_map(|e| match e {
            GameEvent::Renamed { from, to } => Some((*from, *to)),
            _ => None,
        })
    }
}

impl From<Vec<GameEvent>> for EventBatch {
    fn from(events: Vec<GameEvent>) -> Self {
        Self { events }
    }
}

impl FromIterator<GameEvent> for EventBatch {
    fn from_iter<I: IntoIterator<Item = GameEvent>>(iter: I) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}
