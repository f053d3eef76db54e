//! Typed entity queries

use crate::core::types::{EntityId, PlayerId, RegionId};
use crate::world::entity::{EntityClass, EntityView};

/// Read access to the entity snapshots of the current turn
pub trait EntityStore {
    fn get(&self, id: EntityId) -> Option<&EntityView>;

    fn iter(&self) -> Box<dyn Iterator<Item = &EntityView> + '_>;

    fn by_class(&self, class: EntityClass) -> Box<dyn Iterator<Item = &EntityView> + '_> {
        Box::new(self.iter().filter(move |e| e.has_class(class)))
    }

    fn by_owner(&self, owner: PlayerId) -> Box<dyn Iterator<Item = &EntityView> + '_> {
        Box::new(self.iter().filter(move |e| e.owner == owner))
    }

    fn by_region(&self, region: RegionId) -> Box<dyn Iterator<Item = &EntityView> + '_> {
        Box::new(self.iter().filter(move |e| e.region == Some(region)))
    }

    fn matching<'a>(
        &'a self,
        filter: &'a EntityFilter,
    ) -> Box<dyn Iterator<Item = &'a EntityView> + 'a> {
        Box::new(self.iter().filter(move |e| filter.matches(e)))
    }

    /// Live entity with a position, or `None` when it vanished
    fn live(&self, id: EntityId) -> Option<&EntityView> {
        self.get(id).filter(|e| e.is_alive())
    }
}

/// Composable entity predicate
#[derive(Debug, Clone, PartialEq)]
pub enum EntityFilter {
    Class(EntityClass),
    Owner(PlayerId),
    Region(RegionId),
    Idle,
    Garrisoned,
    All(Vec<EntityFilter>),
    Any(Vec<EntityFilter>),
    Not(Box<EntityFilter>),
}

impl EntityFilter {
    pub fn and(self, other: EntityFilter) -> Self {
        match self {
            EntityFilter::All(mut parts) => {
                parts.push(other);
                EntityFilter::All(parts)
            }
            first => EntityFilter::All(vec![first, other]),
        }
    }

    pub fn or(self, other: EntityFilter) -> Self {
        match self {
            EntityFilter::Any(mut parts) => {
                parts.push(other);
                EntityFilter::Any(parts)
            }
            first => EntityFilter::Any(vec![first, other]),
        }
    }

    pub fn negate(self) -> Self {
        EntityFilter::Not(Box::new(self))
    }

    pub fn matches(&self, entity: &EntityView) -> bool {
        match self {
            EntityFilter::Class(class) => entity.has_class(*class),
            EntityFilter::Owner(owner) => entity.owner == *owner,
            EntityFilter::Region(region) => entity.region == Some(*region),
            EntityFilter::Idle => entity.idle,
            EntityFilter::Garrisoned => entity.garrisoned_in.is_some(),
            EntityFilter::All(parts) => parts.iter().all(|f| f.matches(entity)),
            EntityFilter::Any(parts) => parts.iter().any(|f| f.matches(entity)),
            EntityFilter::Not(inner) => !inner.matches(entity),
        }
    }
}
