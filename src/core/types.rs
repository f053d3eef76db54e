//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle into the external simulation. Opaque to the AI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Player slot. Slot 0 is gaia (nobody).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u8);

impl PlayerId {
    pub const GAIA: PlayerId = PlayerId(0);

    pub fn is_gaia(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Accessibility region (land or sea)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionId(pub u16);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Unique identifier for a defensive army
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArmyId(pub u32);

impl fmt::Display for ArmyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "army-{}", self.0)
    }
}

/// Unique identifier for a transport plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransportId(pub u32);

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport-{}", self.0)
    }
}

/// Unique identifier for an attack plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttackPlanId(pub u32);

impl fmt::Display for AttackPlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attack-{}", self.0)
    }
}

/// Simulation turn counter
pub type Turn = u64;

/// Monotonic id source, persisted with the owning manager so that ids stay
/// unique across save/load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_raw(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }

    pub fn next_army(&mut self) -> ArmyId {
        ArmyId(self.next_raw())
    }

    pub fn next_transport(&mut self) -> TransportId {
        TransportId(self.next_raw())
    }

    pub fn next_attack(&mut self) -> AttackPlanId {
        AttackPlanId(self.next_raw())
    }

    /// Number of ids handed out so far
    pub fn issued(&self) -> u32 {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_is_monotonic() {
        let mut ids = IdAllocator::new();
        let a = ids.next_army();
        let b = ids.next_army();
        assert!(b > a);
        assert_eq!(ids.issued(), 2);
    }

    #[test]
    fn test_entity_id_hash() {
        use std::collections::HashMap;
        let mut map: HashMap<EntityId, &str> = HashMap::new();
        map.insert(EntityId(7), "bireme");
        assert_eq!(map.get(&EntityId(7)), Some(&"bireme"));
    }

    #[test]
    fn test_gaia_player() {
        assert!(PlayerId::GAIA.is_gaia());
        assert!(!PlayerId(2).is_gaia());
    }
}
