//! Single-owner entity claims
//!
//! Every entity the AI uses is claimed by exactly one owner per ledger. Foe
//! membership, the job of one of our units, and carriage on a transport are
//! tracked separately: an attack-plan soldier can ride a transport, but can
//! never belong to two plans or two armies.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::error::{Result, WarError};
use crate::core::types::{ArmyId, AttackPlanId, EntityId, TransportId};

/// Anything that can hold a claim, for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Holder {
    Army(ArmyId),
    Attack(AttackPlanId),
    Transport(TransportId),
}

impl fmt::Display for Holder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Holder::Army(id) => id.fmt(f),
            Holder::Attack(id) => id.fmt(f),
            Holder::Transport(id) => id.fmt(f),
        }
    }
}

/// The job one of our own units is doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoleClaim {
    Army(ArmyId),
    Attack(AttackPlanId),
}

impl From<RoleClaim> for Holder {
    fn from(role: RoleClaim) -> Self {
        match role {
            RoleClaim::Army(id) => Holder::Army(id),
            RoleClaim::Attack(id) => Holder::Attack(id),
        }
    }
}

impl From<ArmyId> for Holder {
    fn from(id: ArmyId) -> Self {
        Holder::Army(id)
    }
}

impl From<TransportId> for Holder {
    fn from(id: TransportId) -> Self {
        Holder::Transport(id)
    }
}

/// One claim table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(
    serialize = "O: Serialize",
    deserialize = "O: Deserialize<'de>"
))]
pub struct Ledger<O> {
    owners: AHashMap<EntityId, O>,
}

impl<O> Default for Ledger<O> {
    fn default() -> Self {
        Self {
            owners: AHashMap::new(),
        }
    }
}

impl<O: Copy + Eq + Into<Holder>> Ledger<O> {
    /// Claim `entity` for `owner`. Re-claiming by the same owner is a no-op.
    pub fn claim(&mut self, entity: EntityId, owner: O) -> Result<()> {
        match self.owners.get(&entity) {
            Some(current) if *current != owner => Err(WarError::AlreadyClaimed {
                entity,
                holder: (*current).into(),
            }),
            Some(_) => Ok(()),
            None => {
                self.owners.insert(entity, owner);
                Ok(())
            }
        }
    }

    /// Release only if `owner` is the current holder
    pub fn release(&mut self, entity: EntityId, owner: O) -> bool {
        if self.owners.get(&entity) == Some(&owner) {
            self.owners.remove(&entity);
            true
        } else {
            false
        }
    }

    /// Release everything `owner` holds. Returned ids are sorted.
    pub fn release_all(&mut self, owner: O) -> Vec<EntityId> {
        let mut released = self.held_by(owner);
        for id in &released {
            self.owners.remove(id);
        }
        released.sort();
        released
    }

    pub fn holder(&self, entity: EntityId) -> Option<O> {
        self.owners.get(&entity).copied()
    }

    pub fn is_free(&self, entity: EntityId) -> bool {
        !self.owners.contains_key(&entity)
    }

    /// Entities held by `owner`, sorted
    pub fn held_by(&self, owner: O) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .owners
            .iter()
            .filter(|(_, o)| **o == owner)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    /// Move the claim of a replaced entity to its successor
    pub fn rename(&mut self, from: EntityId, to: EntityId) {
        if let Some(owner) = self.owners.remove(&from) {
            self.owners.insert(to, owner);
        }
    }

    /// Move every claim of `from` to `to`
    pub fn transfer(&mut self, from: O, to: O) {
        for owner in self.owners.values_mut() {
            if *owner == from {
                *owner = to;
            }
        }
    }

    pub fn forget(&mut self, entity: EntityId) -> Option<O> {
        self.owners.remove(&entity)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

/// All claim ledgers of one AI player
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaimRegistry {
    /// Enemy entity -> army tracking it
    pub foes: Ledger<ArmyId>,
    /// Own unit -> army or attack plan using it
    pub roles: Ledger<RoleClaim>,
    /// Own unit or ship -> transport plan carrying it
    pub carriage: Ledger<TransportId>,
}

impl ClaimRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entity replaced by another: carry every claim over
    pub fn rename(&mut self, from: EntityId, to: EntityId) {
        self.foes.rename(from, to);
        self.roles.rename(from, to);
        self.carriage.rename(from, to);
    }

    /// Entity gone: drop every claim
    pub fn forget(&mut self, entity: EntityId) {
        self.foes.forget(entity);
        self.roles.forget(entity);
        self.carriage.forget(entity);
    }

    /// Own unit free for a new job
    pub fn is_unassigned(&self, entity: EntityId) -> bool {
        self.roles.is_free(entity) && self.carriage.is_free(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_owner_rejected() {
        let mut ledger: Ledger<ArmyId> = Ledger::default();
        ledger.claim(EntityId(1), ArmyId(1)).unwrap();
        let err = ledger.claim(EntityId(1), ArmyId(2)).unwrap_err();
        assert!(matches!(
            err,
            WarError::AlreadyClaimed { holder: Holder::Army(ArmyId(1)), .. }
        ));
        // same owner is fine
        assert!(ledger.claim(EntityId(1), ArmyId(1)).is_ok());
    }

    #[test]
    fn test_release_requires_holder() {
        let mut ledger: Ledger<TransportId> = Ledger::default();
        ledger.claim(EntityId(5), TransportId(1)).unwrap();
        assert!(!ledger.release(EntityId(5), TransportId(2)));
        assert!(ledger.release(EntityId(5), TransportId(1)));
        assert!(ledger.is_free(EntityId(5)));
    }

    #[test]
    fn test_release_all_is_sorted() {
        let mut ledger: Ledger<RoleClaim> = Ledger::default();
        let plan = RoleClaim::Attack(AttackPlanId(3));
        for id in [9, 2, 5] {
            ledger.claim(EntityId(id), plan).unwrap();
        }
        ledger.claim(EntityId(4), RoleClaim::Army(ArmyId(1))).unwrap();
        assert_eq!(
            ledger.release_all(plan),
            vec![EntityId(2), EntityId(5), EntityId(9)]
        );
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_role_and_carriage_are_independent() {
        let mut claims = ClaimRegistry::new();
        claims
            .roles
            .claim(EntityId(1), RoleClaim::Attack(AttackPlanId(1)))
            .unwrap();
        claims.carriage.claim(EntityId(1), TransportId(7)).unwrap();
        assert!(!claims.is_unassigned(EntityId(1)));
        claims.forget(EntityId(1));
        assert!(claims.is_unassigned(EntityId(1)));
    }

    #[test]
    fn test_rename_carries_claims() {
        let mut claims = ClaimRegistry::new();
        claims.foes.claim(EntityId(1), ArmyId(4)).unwrap();
        claims.rename(EntityId(1), EntityId(2));
        assert_eq!(claims.foes.holder(EntityId(2)), Some(ArmyId(4)));
        assert!(claims.foes.is_free(EntityId(1)));
    }
}
