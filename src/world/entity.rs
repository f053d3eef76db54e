//! Read-only entity snapshots supplied by the simulation

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::core::types::{EntityId, PlayerId, RegionId};

/// Classification tags the AI cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityClass {
    Unit,
    Structure,
    Ship,
    Warship,
    Siege,
    Infantry,
    Cavalry,
    FastUnit,
    Elephant,
    Animal,
    Support,
    Barracks,
    CivCentre,
    Dock,
    Tower,
    WallTower,
    Fortress,
    Wonder,
    Foundation,
}

/// Damage split by type. Used for both attack strengths and resistances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DamageTable {
    pub hack: f32,
    pub pierce: f32,
    pub crush: f32,
    pub fire: f32,
}

impl DamageTable {
    pub fn new(hack: f32, pierce: f32, crush: f32) -> Self {
        Self {
            hack,
            pierce,
            crush,
            fire: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackType {
    Melee,
    Ranged,
    Capture,
    Slaughter,
}

/// One attack an entity can perform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackStats {
    pub kind: AttackType,
    pub damage: DamageTable,
    pub max_range: f32,
    /// Milliseconds between attacks
    pub repeat_ms: f32,
    /// Milliseconds before the first hit
    pub prepare_ms: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CombatProfile {
    pub attacks: Vec<AttackStats>,
    pub resistance: DamageTable,
}

/// Snapshot of one simulated entity for the current turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityView {
    pub id: EntityId,
    pub owner: PlayerId,
    pub template: String,
    /// `None` while garrisoned
    pub position: Option<Vec2>,
    pub hitpoints: f32,
    pub max_hitpoints: f32,
    pub classes: Vec<EntityClass>,
    pub combat: Option<CombatProfile>,
    /// Arrows shot by a structure without any garrison
    pub default_arrows: u32,
    pub garrison_max: u32,
    pub garrisoned: Vec<EntityId>,
    pub garrisoned_in: Option<EntityId>,
    /// Accessibility region the entity stands in (sea region for ships)
    pub region: Option<RegionId>,
    /// Sea region a dock opens onto
    pub sea_region: Option<RegionId>,
    /// Construction progress in percent while a foundation
    pub foundation_progress: Option<f32>,
    /// Capture points per player, for capturable structures
    pub capture_points: Vec<(PlayerId, f32)>,
    pub idle: bool,
}

impl EntityView {
    /// Minimal live view; callers fill in what they need
    pub fn new(id: EntityId, owner: PlayerId, template: impl Into<String>) -> Self {
        Self {
            id,
            owner,
            template: template.into(),
            position: None,
            hitpoints: 100.0,
            max_hitpoints: 100.0,
            classes: Vec::new(),
            combat: None,
            default_arrows: 0,
            garrison_max: 0,
            garrisoned: Vec::new(),
            garrisoned_in: None,
            region: None,
            sea_region: None,
            foundation_progress: None,
            capture_points: Vec::new(),
            idle: true,
        }
    }

    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_region(mut self, region: RegionId) -> Self {
        self.region = Some(region);
        self
    }

    pub fn with_classes(mut self, classes: &[EntityClass]) -> Self {
        self.classes.extend_from_slice(classes);
        self
    }

    pub fn with_combat(mut self, combat: CombatProfile) -> Self {
        self.combat = Some(combat);
        self
    }

    pub fn with_garrison(mut self, capacity: u32) -> Self {
        self.garrison_max = capacity;
        self
    }

    pub fn has_class(&self, class: EntityClass) -> bool {
        self.classes.contains(&class)
    }

    pub fn is_alive(&self) -> bool {
        self.hitpoints > 0.0
    }

    pub fn is_structure(&self) -> bool {
        self.has_class(EntityClass::Structure)
    }

    pub fn is_foundation(&self) -> bool {
        self.foundation_progress.is_some() || self.has_class(EntityClass::Foundation)
    }

    pub fn can_attack(&self) -> bool {
        self.combat
            .as_ref()
            .is_some_and(|c| c.attacks.iter().any(|a| a.kind != AttackType::Slaughter))
    }

    /// Free garrison slots, from the simulation's point of view
    pub fn free_slots(&self) -> u32 {
        self.garrison_max
            .saturating_sub(self.garrisoned.len() as u32)
    }

    /// Capture points held by players other than `friend` and gaia
    pub fn hostile_capture_points(&self, friend: PlayerId) -> f32 {
        self.capture_points
            .iter()
            .filter(|(p, _)| *p != friend && !p.is_gaia())
            .map(|(_, pts)| *pts)
            .sum()
    }

    pub fn is_defensive_structure(&self) -> bool {
        self.has_class(EntityClass::Tower)
            || self.has_class(EntityClass::WallTower)
            || self.has_class(EntityClass::Fortress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_slots() {
        let mut ship = EntityView::new(EntityId(1), PlayerId(1), "ship_bireme").with_garrison(3);
        ship.garrisoned = vec![EntityId(2), EntityId(3)];
        assert_eq!(ship.free_slots(), 1);
        ship.garrisoned.push(EntityId(4));
        ship.garrisoned.push(EntityId(5));
        assert_eq!(ship.free_slots(), 0);
    }

    #[test]
    fn test_hostile_capture_points_ignore_gaia() {
        let mut cc = EntityView::new(EntityId(1), PlayerId(1), "civil_centre");
        cc.capture_points = vec![(PlayerId(0), 50.0), (PlayerId(1), 400.0), (PlayerId(2), 120.0)];
        assert_eq!(cc.hostile_capture_points(PlayerId(1)), 120.0);
    }

    #[test]
    fn test_slaughter_only_cannot_attack() {
        let hunter = EntityView::new(EntityId(1), PlayerId(1), "support_female").with_combat(
            CombatProfile {
                attacks: vec![AttackStats {
                    kind: AttackType::Slaughter,
                    damage: DamageTable::new(10.0, 0.0, 0.0),
                    max_range: 2.0,
                    repeat_ms: 1000.0,
                    prepare_ms: 0.0,
                }],
                resistance: DamageTable::default(),
            },
        );
        assert!(!hunter.can_attack());
    }
}
