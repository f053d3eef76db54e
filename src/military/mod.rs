//! Territory defense: claims, strength estimates and armies

pub mod army;
pub mod claims;
pub mod roster;
pub mod strength;

pub use army::Army;
pub use claims::{ClaimRegistry, Holder, Ledger, RoleClaim};
pub use roster::ArmyRoster;
pub use strength::{evaluate_strength, unit_strength};
