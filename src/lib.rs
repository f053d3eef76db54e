//! War Council - military AI for a real-time strategy skirmish player
//!
//! Defends territory with dynamically formed armies, keeps a fleet for
//! carrying troops across water, and schedules rushes, raids and attacks.

pub mod attack;
pub mod context;
pub mod core;
pub mod council;
pub mod military;
pub mod naval;
pub mod world;

pub use council::WarCouncil;
