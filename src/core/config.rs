//! Military AI configuration with documented constants
//!
//! All gameplay-tuned numbers live here. The defaults reproduce the pacing
//! the AI was balanced against; changing them affects how early and how
//! hard the AI attacks, and how eagerly it builds a fleet.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::cadence::Cadence;
use crate::core::error::{Result, WarError};

/// Army clustering and defensive response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmyConfig {
    /// Squared distance from the foe centroid within which a new entity may
    /// join an army without being forced.
    pub compact_radius_sq: f32,

    /// Squared distance from the foe centroid beyond which a foe breaks away
    ///
    /// Must be >= `compact_radius_sq`, otherwise freshly admitted members
    /// could break away on the very next check.
    pub breakaway_radius_sq: f32,

    /// How often armies recompute their centroid and look for breakaways
    pub breakaway_cadence: Cadence,

    /// Two armies whose foe centroids are closer than this are merged
    pub merge_radius_sq: f32,

    /// Radius around an army centroid searched for idle defenders
    pub defense_range: f32,

    /// Defenders are added until own strength reaches this multiple of the
    /// foe strength.
    pub defender_ratio: f32,
}

impl Default for ArmyConfig {
    fn default() -> Self {
        Self {
            compact_radius_sq: 2000.0,
            breakaway_radius_sq: 3500.0,
            breakaway_cadence: Cadence::every(5),
            merge_radius_sq: 2000.0,
            defense_range: 80.0,
            defender_ratio: 1.2,
        }
    }
}

/// Coefficients of the scalar combat-strength estimate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrengthConfig {
    /// Per-damage-type importance. Applied to both attack and resistance.
    pub hack_importance: f32,
    pub pierce_importance: f32,
    pub crush_importance: f32,
    pub fire_importance: f32,

    /// Weight of the maximum attack range
    pub range_weight: f32,

    /// Weight of the repeat time (ms). Slower cadence reads as heavier hits.
    pub repeat_weight: f32,

    /// Penalty weight of the prepare time (ms)
    pub prepare_weight: f32,

    /// Strength per default arrow of a hostile structure
    pub structure_arrow_weight: f32,

    /// Strength of a hostile structure without arrows
    pub structure_base: f32,

    /// Token strength for our own structures being captured
    ///
    /// Kept small so that recovering our buildings never outweighs real
    /// threats when defenders are dispatched.
    pub own_structure: f32,

    /// The stat-derived estimate underrates elephants
    pub elephant_multiplier: f32,
}

impl Default for StrengthConfig {
    fn default() -> Self {
        Self {
            hack_importance: 0.085,
            pierce_importance: 0.075,
            crush_importance: 0.065,
            fire_importance: 0.5,
            range_weight: 0.0125,
            repeat_weight: 1.0e-5,
            prepare_weight: 1.0e-5,
            structure_arrow_weight: 6.0,
            structure_base: 4.0,
            own_structure: 2.0,
            elephant_multiplier: 3.0,
        }
    }
}

/// Fleet management and transport
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavalConfig {
    /// How often the fleet-growth step runs
    pub fleet_cadence: Cadence,

    /// How often boarding transports re-issue move/garrison orders
    pub boarding_cadence: Cadence,

    /// Template queued when a sea needs more transport capacity
    pub transport_template: String,

    /// Template queued when a sea needs more escorts
    pub warship_template: String,

    /// Distance under which ships and units count as "at the spot"
    pub proximity: f32,

    /// Radius of the wide shoreline search around the reference point
    pub shore_search_radius: f32,

    /// Escorts requested for new transport plans unless overridden
    pub default_escort_size: u32,

    /// Shore scoring, in distance units added to a tile's cost.
    /// Neutral ground is mildly discouraged; enemy ground only when tolerated.
    pub neutral_penalty: f32,
    pub enemy_penalty: f32,

    /// Tiles closer than this (squared) to a friendly dock are crowded
    pub dock_crowding_sq: f32,
    pub dock_penalty: f32,
}

impl Default for NavalConfig {
    fn default() -> Self {
        Self {
            fleet_cadence: Cadence::every(10),
            boarding_cadence: Cadence::every(5),
            transport_template: "ship_bireme".to_string(),
            warship_template: "ship_trireme".to_string(),
            proximity: 15.0,
            shore_search_radius: 60.0,
            default_escort_size: 0,
            neutral_penalty: 40.0,
            enemy_penalty: 200.0,
            dock_crowding_sq: 3600.0,
            dock_penalty: 20.0,
        }
    }
}

/// Size and pacing of one attack class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackProfile {
    /// Units needed before the plan may start
    pub min_size: usize,
    /// Units wanted; reaching it starts the plan
    pub target_size: usize,
    /// Preparation turns before the plan gives up
    pub max_preparation_turns: u64,
    /// Turns allowed for regrouping at the rally point
    pub completing_turns: u64,
    /// Template trained for this plan
    pub template: String,
    /// Units per training batch
    pub batch_size: u32,
}

/// Attack scheduling and targeting
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackConfig {
    /// Personality aggressiveness, 0.0 (passive) to 1.0 (reckless)
    pub aggressiveness: f32,

    /// Aggressiveness cuts unlocking one, two and three rushes
    pub personality_cuts: [f32; 3],

    /// Rush target sizes for one, two and three allowed rushes
    pub rush_sizes: Vec<Vec<usize>>,

    /// Upper bound on rushes the host allows (game setting)
    pub rushes_allowed: usize,

    /// Enemies with more defensive structures than this are never rushed
    pub rush_defense_veto: usize,

    /// Units an ally request must be able to mobilise before we join
    pub ally_request_threshold: usize,

    /// Bonus entity count for an enemy that still owns a civil centre
    pub civ_centre_bonus: usize,

    /// Max population per concurrently running standard attack
    pub population_per_attack: u32,

    /// Hard cap on concurrently running standard and huge attacks
    pub max_concurrent_attacks: usize,

    /// Free population needed before a second standard attack is prepared
    pub population_headroom: u32,

    /// Standard attacks launched before huge attacks are considered
    pub attacks_before_huge: u32,

    /// How often preparing plans queue another training batch
    pub training_cadence: Cadence,

    /// How often running attacks re-issue orders to idle units
    pub order_cadence: Cadence,

    /// Free population under which a plan must start or give up its units
    pub population_margin: u32,

    /// Units closer than this to the rally point count as gathered
    pub rally_radius: f32,

    /// Regroup time granted to a forced plan; forced raids never wait
    pub forced_completing_turns: u64,

    pub rush: AttackProfile,
    pub raid: AttackProfile,
    pub attack: AttackProfile,
    pub huge_attack: AttackProfile,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            aggressiveness: 0.5,
            personality_cuts: [0.3, 0.5, 0.7],
            rush_sizes: vec![vec![20], vec![18, 22], vec![16, 20, 24]],
            rushes_allowed: 3,
            rush_defense_veto: 6,
            ally_request_threshold: 12,
            civ_centre_bonus: 500,
            population_per_attack: 100,
            max_concurrent_attacks: 2,
            population_headroom: 12,
            attacks_before_huge: 2,
            training_cadence: Cadence::every(10),
            order_cadence: Cadence::every(5),
            population_margin: 5,
            rally_radius: 30.0,
            forced_completing_turns: 40,
            rush: AttackProfile {
                min_size: 10,
                target_size: 20,
                max_preparation_turns: 600,
                completing_turns: 40,
                template: "infantry_spearman".to_string(),
                batch_size: 2,
            },
            raid: AttackProfile {
                min_size: 3,
                target_size: 4,
                max_preparation_turns: 150,
                completing_turns: 20,
                template: "cavalry_javelineer".to_string(),
                batch_size: 2,
            },
            attack: AttackProfile {
                min_size: 12,
                target_size: 36,
                max_preparation_turns: 1200,
                completing_turns: 60,
                template: "infantry_spearman".to_string(),
                batch_size: 5,
            },
            huge_attack: AttackProfile {
                min_size: 30,
                target_size: 80,
                max_preparation_turns: 2400,
                completing_turns: 60,
                template: "infantry_spearman".to_string(),
                batch_size: 5,
            },
        }
    }
}

impl AttackConfig {
    /// Number of rushes and their target sizes for the configured personality
    pub fn rush_quota(&self) -> Vec<usize> {
        let [weak, medium, strong] = self.personality_cuts;
        let count = if self.aggressiveness > strong && self.rushes_allowed > 2 {
            3
        } else if self.aggressiveness > medium && self.rushes_allowed > 1 {
            2
        } else if self.aggressiveness > weak && self.rushes_allowed > 0 {
            1
        } else {
            0
        };
        if count == 0 {
            return Vec::new();
        }
        self.rush_sizes
            .get(count - 1)
            .cloned()
            .unwrap_or_default()
    }
}

/// Complete military configuration for one AI player
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MilitaryConfig {
    pub army: ArmyConfig,
    pub strength: StrengthConfig,
    pub naval: NavalConfig,
    pub attack: AttackConfig,
}

impl MilitaryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML. Missing tables and keys fall back to defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: MilitaryConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.army.compact_radius_sq > self.army.breakaway_radius_sq {
            return Err(WarError::InvalidConfig(format!(
                "compact_radius_sq ({}) should be <= breakaway_radius_sq ({})",
                self.army.compact_radius_sq, self.army.breakaway_radius_sq
            )));
        }

        let [weak, medium, strong] = self.attack.personality_cuts;
        if !(weak <= medium && medium <= strong) {
            return Err(WarError::InvalidConfig(format!(
                "personality_cuts must be ordered, got {:?}",
                self.attack.personality_cuts
            )));
        }

        for (name, profile) in [
            ("rush", &self.attack.rush),
            ("raid", &self.attack.raid),
            ("attack", &self.attack.attack),
            ("huge_attack", &self.attack.huge_attack),
        ] {
            if profile.min_size > profile.target_size {
                return Err(WarError::InvalidConfig(format!(
                    "{} min_size ({}) exceeds target_size ({})",
                    name, profile.min_size, profile.target_size
                )));
            }
        }

        if self.naval.proximity <= 0.0
            || self.naval.shore_search_radius <= 0.0
            || self.attack.rally_radius <= 0.0
        {
            return Err(WarError::InvalidConfig(
                "proximity, shore_search_radius and rally_radius must be positive".into(),
            ));
        }

        for (name, cadence) in [
            ("army.breakaway_cadence", &self.army.breakaway_cadence),
            ("naval.fleet_cadence", &self.naval.fleet_cadence),
            ("naval.boarding_cadence", &self.naval.boarding_cadence),
            ("attack.training_cadence", &self.attack.training_cadence),
            ("attack.order_cadence", &self.attack.order_cadence),
        ] {
            if cadence.every == 0 {
                return Err(WarError::InvalidConfig(format!("{} must run every 1 or more turns", name)));
            }
        }

        Ok(())
    }
}

/// Load a configuration file
pub fn load_config(path: &Path) -> Result<MilitaryConfig> {
    let contents = fs::read_to_string(path)?;
    MilitaryConfig::from_toml_str(&contents)
}
