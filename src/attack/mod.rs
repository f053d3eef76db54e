//! Offensive planning: rushes, raids and full attacks

pub mod manager;
pub mod plan;
pub mod targeting;

pub use manager::{AttackManager, AttackRequestReply, RequestAnswer};
pub use plan::{AttackKind, AttackPlan, PlanOptions, PlanPhase, PreparationStep};
pub use targeting::Targeting;
