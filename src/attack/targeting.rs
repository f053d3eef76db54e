//! Choosing which enemy player to attack

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeSet;

use crate::attack::plan::AttackKind;
use crate::context::TurnContext;
use crate::core::types::PlayerId;
use crate::world::entity::EntityClass;
use crate::world::{GameState, VictoryCondition};

/// Shared enemy preference of all plans of one player
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Targeting {
    current_enemy: Option<PlayerId>,
    defeated: BTreeSet<PlayerId>,
}

impl Targeting {
    pub fn current_enemy(&self) -> Option<PlayerId> {
        self.current_enemy
    }

    pub fn mark_defeated(&mut self, player: PlayerId) {
        self.defeated.insert(player);
        if self.current_enemy == Some(player) {
            self.current_enemy = None;
        }
    }

    pub fn is_defeated(&self, player: PlayerId) -> bool {
        self.defeated.contains(&player)
    }

    /// Pick the enemy a new attack of `kind` should go after, and remember
    /// it as the current enemy.
    ///
    /// In order: an enemy building a wonder (under wonder victory), the
    /// current enemy, the owner of the nearest civil centre reachable by
    /// land, and finally the enemy with the most entities. Rushes skip
    /// enemies that are too well fortified.
    pub fn enemy_player<G: GameState>(&mut self, ctx: &TurnContext<G>, kind: AttackKind) -> Option<PlayerId> {
        let chosen = self.choose(ctx, kind)?;
        if self.current_enemy != Some(chosen) {
            tracing::info!(enemy = %chosen, kind = %kind, "new enemy chosen");
        }
        self.current_enemy = Some(chosen);
        Some(chosen)
    }

    fn choose<G: GameState>(&self, ctx: &TurnContext<G>, kind: AttackKind) -> Option<PlayerId> {
        let game = ctx.game;
        let enemies: Vec<PlayerId> = game
            .players()
            .into_iter()
            .filter(|p| ctx.is_enemy(*p) && !self.is_defeated(*p))
            .collect();
        if enemies.is_empty() {
            return None;
        }

        if game.victory_conditions().contains(&VictoryCondition::Wonder) {
            let wonder = game
                .by_class(EntityClass::Wonder)
                .filter(|w| w.is_alive() && enemies.contains(&w.owner))
                .min_by_key(|w| (OrderedFloat(w.foundation_progress.unwrap_or(100.0)), w.id));
            if let Some(wonder) = wonder {
                return Some(wonder.owner);
            }
        }

        let veto = ctx.config.attack.rush_defense_veto;
        let eligible: Vec<PlayerId> = enemies
            .into_iter()
            .filter(|p| {
                kind != AttackKind::Rush
                    || game
                        .by_owner(*p)
                        .filter(|e| e.is_alive() && e.is_defensive_structure() && !e.is_foundation())
                        .count()
                        <= veto
            })
            .collect();

        if kind != AttackKind::HugeAttack {
            if let Some(current) = self.current_enemy {
                let present = game.by_owner(current).any(|e| e.is_alive());
                if eligible.contains(&current) && present {
                    return Some(current);
                }
            }

            let ours: Vec<_> = game
                .by_owner(ctx.player)
                .filter(|e| e.has_class(EntityClass::CivCentre) && e.is_alive() && !e.is_foundation())
                .filter_map(|e| e.position.map(|p| (p, e.region)))
                .collect();
            let nearest = game
                .by_class(EntityClass::CivCentre)
                .filter(|cc| cc.is_alive() && eligible.contains(&cc.owner))
                .filter_map(|cc| {
                    let pos = cc.position?;
                    ours.iter()
                        .filter(|(_, region)| region.is_some() && *region == cc.region)
                        .map(|(p, _)| OrderedFloat(p.distance_squared(pos)))
                        .min()
                        .map(|d| (d, cc.owner))
                })
                .min();
            if let Some((_, owner)) = nearest {
                return Some(owner);
            }
        }

        let bonus = ctx.config.attack.civ_centre_bonus;
        eligible
            .into_iter()
            .map(|p| {
                let mut count = 0;
                let mut has_centre = false;
                for e in game.by_owner(p).filter(|e| e.is_alive()) {
                    count += 1;
                    has_centre |= e.has_class(EntityClass::CivCentre);
                }
                let score = if has_centre { count + bonus } else { count };
                (score, p)
            })
            .filter(|(score, _)| *score > 0)
            .max_by_key(|(score, p)| (*score, Reverse(*p)))
            .map(|(_, p)| p)
    }
}
