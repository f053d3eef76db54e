pub mod cadence;
pub mod config;
pub mod error;
pub mod types;

pub use cadence::Cadence;
pub use config::MilitaryConfig;
pub use error::{Result, WarError};
