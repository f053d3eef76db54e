//! Fire-and-forget orders issued to the simulation

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::core::types::{AttackPlanId, EntityId, RegionId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    Move { entities: Vec<EntityId>, to: Vec2 },
    Garrison { entity: EntityId, into: EntityId },
    UnloadAll { holder: EntityId },
    Attack { entities: Vec<EntityId>, target: EntityId },
    /// Walk toward a position, fighting anything met on the way
    AttackMove { entities: Vec<EntityId>, to: Vec2 },
}

/// Commands collected during one AI turn
#[derive(Debug, Clone, Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn move_to(&mut self, entities: Vec<EntityId>, to: Vec2) {
        if !entities.is_empty() {
            self.push(Command::Move { entities, to });
        }
    }

    pub fn garrison(&mut self, entity: EntityId, into: EntityId) {
        self.push(Command::Garrison { entity, into });
    }

    pub fn unload_all(&mut self, holder: EntityId) {
        self.push(Command::UnloadAll { holder });
    }

    pub fn attack(&mut self, entities: Vec<EntityId>, target: EntityId) {
        if !entities.is_empty() {
            self.push(Command::Attack { entities, target });
        }
    }

    pub fn attack_move(&mut self, entities: Vec<EntityId>, to: Vec2) {
        if !entities.is_empty() {
            self.push(Command::AttackMove { entities, to });
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn drain(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }
}

/// Why a unit is being trained; echoed back by the training-finished event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrainingPurpose {
    Ship { sea: RegionId },
    AttackPlan(AttackPlanId),
    General,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingOrder {
    pub template: String,
    pub count: u32,
    pub purpose: TrainingPurpose,
}

/// AI-side production queues, drained by the host when it starts training
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductionQueues {
    pub ships: Vec<TrainingOrder>,
    pub military: Vec<TrainingOrder>,
}

impl ProductionQueues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_ship(&mut self, template: &str, sea: RegionId) {
        self.ships.push(TrainingOrder {
            template: template.to_string(),
            count: 1,
            purpose: TrainingPurpose::Ship { sea },
        });
    }

    pub fn queue_military(&mut self, template: &str, count: u32, purpose: TrainingPurpose) {
        self.military.push(TrainingOrder {
            template: template.to_string(),
            count,
            purpose,
        });
    }

    pub fn has_queued_ships(&self) -> bool {
        !self.ships.is_empty()
    }

    pub fn queued_for(&self, purpose: &TrainingPurpose) -> u32 {
        self.ships
            .iter()
            .chain(self.military.iter())
            .filter(|o| o.purpose == *purpose)
            .map(|o| o.count)
            .sum()
    }

    /// Drop pending orders of a plan that no longer exists
    pub fn cancel(&mut self, purpose: &TrainingPurpose) {
        self.ships.retain(|o| o.purpose != *purpose);
        self.military.retain(|o| o.purpose != *purpose);
    }

    pub fn drain(&mut self) -> Vec<TrainingOrder> {
        let mut orders = std::mem::take(&mut self.ships);
        orders.append(&mut self.military);
        orders
    }
}
