//! Per-turn context handed to every manager, plan and army

use crate::core::config::MilitaryConfig;
use crate::core::types::{PlayerId, Turn};
use crate::military::claims::ClaimRegistry;
use crate::world::{CommandBuffer, GameState};

/// Explicit replacement for ambient per-player globals: who we are, what the
/// game looks like this turn, and where decisions are written.
pub struct TurnContext<'a, G: GameState> {
    pub game: &'a G,
    pub player: PlayerId,
    pub config: &'a MilitaryConfig,
    pub claims: &'a mut ClaimRegistry,
    pub commands: &'a mut CommandBuffer,
}

impl<'a, G: GameState> TurnContext<'a, G> {
    pub fn new(
        game: &'a G,
        player: PlayerId,
        config: &'a MilitaryConfig,
        claims: &'a mut ClaimRegistry,
        commands: &'a mut CommandBuffer,
    ) -> Self {
        Self {
            game,
            player,
            config,
            claims,
            commands,
        }
    }

    pub fn turn(&self) -> Turn {
        self.game.turn()
    }

    pub fn is_enemy(&self, other: crate::core::types::PlayerId) -> bool {
        self.game.is_enemy(self.player, other)
    }
}
