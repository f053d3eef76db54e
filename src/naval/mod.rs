//! Naval logistics: docks, fleets and transports

pub mod manager;
pub mod shoreline;
pub mod transport;

pub use manager::{DockRegistry, NavalManager, SeaFleet};
pub use shoreline::{find_spot, SpotQuery};
pub use transport::{FleetReservation, TransportPlan, TransportState};
