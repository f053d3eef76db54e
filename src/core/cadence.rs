//! Turn-cadence policy
//!
//! Work that only runs every N turns is gated through a `Cadence` instead of
//! scattering `turn % n == 0` checks through the managers.

use serde::{Deserialize, Serialize};

use crate::core::types::Turn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cadence {
    /// Period in turns. A period of 0 or 1 fires every turn.
    pub every: Turn,
    /// Phase shift so that different subsystems can interleave
    #[serde(default)]
    pub offset: Turn,
}

impl Cadence {
    pub const fn every(every: Turn) -> Self {
        Self { every, offset: 0 }
    }

    pub const fn with_offset(mut self, offset: Turn) -> Self {
        self.offset = offset;
        self
    }

    pub fn is_due(&self, turn: Turn) -> bool {
        if self.every <= 1 {
            return true;
        }
        turn % self.every == self.offset % self.every
    }
}

impl Default for Cadence {
    fn default() -> Self {
        Self::every(1)
    }
}
