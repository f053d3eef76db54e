use thiserror::Error;

use crate::core::types::{EntityId, RegionId};
use crate::military::claims::Holder;

#[derive(Error, Debug)]
pub enum WarError {
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    #[error("Entity {entity} already claimed by {holder}")]
    AlreadyClaimed { entity: EntityId, holder: Holder },

    #[error("No usable route from {from} to {to}")]
    UnreachableRoute { from: RegionId, to: RegionId },

    #[error("No shoreline tile between land {land} and sea {sea}")]
    NoShoreline { land: RegionId, sea: RegionId },

    #[error("Units span {0} accessibility regions")]
    SpanningRegions(usize),

    #[error("Plan not viable: {0}")]
    NotViable(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, WarError>;
