//! Scalar combat-strength estimate
//!
//! Collapses an entity's attack and resistance tables into one number so that
//! armies can be compared by summing members.

use crate::core::config::StrengthConfig;
use crate::core::types::PlayerId;
use crate::world::entity::{AttackType, DamageTable, EntityClass, EntityView};

fn weighted(table: &DamageTable, config: &StrengthConfig) -> f32 {
    // Normalised by the number of damage types, as the weights were tuned that way
    let sum = config.hack_importance * table.hack
        + config.pierce_importance * table.pierce
        + config.crush_importance * table.crush
        + config.fire_importance * table.fire;
    sum / 4.0
}

/// Strength of a mobile unit from its stat block
pub fn unit_strength(entity: &EntityView, config: &StrengthConfig) -> f32 {
    let Some(combat) = entity.combat.as_ref() else {
        return 0.0;
    };

    let mut strength = 0.0;
    for attack in &combat.attacks {
        if attack.kind == AttackType::Slaughter {
            continue;
        }
        strength += weighted(&attack.damage, config);
        strength += attack.max_range * config.range_weight;
        strength += attack.repeat_ms * config.repeat_weight;
        strength -= attack.prepare_ms * config.prepare_weight;
    }
    strength += weighted(&combat.resistance, config);

    strength * entity.max_hitpoints / 100.0
}

/// Strength contribution of `entity` as seen by `evaluator`
///
/// Structures get a fixed value; our own structures (only ever tracked while
/// an enemy captures them) get a token value.
pub fn evaluate_strength(entity: &EntityView, evaluator: PlayerId, config: &StrengthConfig) -> f32 {
    let mut strength = if entity.is_structure() {
        if entity.owner == evaluator {
            config.own_structure
        } else if entity.default_arrows > 0 {
            config.structure_arrow_weight * entity.default_arrows as f32
        } else {
            config.structure_base
        }
    } else {
        unit_strength(entity, config)
    };

    if entity.has_class(EntityClass::Elephant) && entity.has_class(EntityClass::Animal) {
        strength *= config.elephant_multiplier;
    }
    strength
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::EntityId;
    use crate::world::entity::{AttackStats, CombatProfile};

    fn spearman() -> EntityView {
        EntityView::new(EntityId(1), PlayerId(2), "infantry_spearman")
            .with_classes(&[EntityClass::Unit, EntityClass::Infantry])
            .with_combat(CombatProfile {
                attacks: vec![AttackStats {
                    kind: AttackType::Melee,
                    damage: DamageTable::new(3.0, 2.5, 0.0),
                    max_range: 4.0,
                    repeat_ms: 1000.0,
                    prepare_ms: 500.0,
                }],
                resistance: DamageTable::new(5.0, 5.0, 15.0),
            })
    }

    #[test]
    fn test_unit_strength_formula() {
        let config = StrengthConfig::default();
        let unit = spearman();
        let attack = (0.085 * 3.0 + 0.075 * 2.5) / 4.0;
        let range = 4.0 * 0.0125;
        let cadence = 1000.0 * 1.0e-5 - 500.0 * 1.0e-5;
        let armour = (0.085 * 5.0 + 0.075 * 5.0 + 0.065 * 15.0) / 4.0;
        let expected = attack + range + cadence + armour;
        assert!((unit_strength(&unit, &config) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_hitpoints_scale_strength() {
        let config = StrengthConfig::default();
        let mut unit = spearman();
        let base = unit_strength(&unit, &config);
        unit.max_hitpoints = 200.0;
        assert!((unit_strength(&unit, &config) - 2.0 * base).abs() < 1e-6);
    }

    #[test]
    fn test_structure_strengths() {
        let config = StrengthConfig::default();
        let mut tower = EntityView::new(EntityId(3), PlayerId(2), "defense_tower")
            .with_classes(&[EntityClass::Structure, EntityClass::Tower]);
        tower.default_arrows = 2;
        assert_eq!(evaluate_strength(&tower, PlayerId(1), &config), 12.0);

        tower.default_arrows = 0;
        assert_eq!(evaluate_strength(&tower, PlayerId(1), &config), 4.0);

        // our own building being captured
        assert_eq!(evaluate_strength(&tower, PlayerId(2), &config), 2.0);
    }

    #[test]
    fn test_no_combat_profile_is_zero() {
        let config = StrengthConfig::default();
        let sheep = EntityView::new(EntityId(9), PlayerId(0), "sheep");
        assert_eq!(evaluate_strength(&sheep, PlayerId(1), &config), 0.0);
    }
}
