//! Attack planning integration tests

use glam::Vec2;
use war_council::attack::{AttackKind, PlanOptions, RequestAnswer, Targeting};
use war_council::context::TurnContext;
use war_council::core::config::MilitaryConfig;
use war_council::core::types::PlayerId;
use war_council::military::ClaimRegistry;
use war_council::world::{CommandBuffer, EventBatch, GameEvent, ProductionQueues, SandboxWorld};
use war_council::WarCouncil;

const ME: PlayerId = PlayerId(1);
const ENEMY: PlayerId = PlayerId(2);
const ALLY: PlayerId = PlayerId(3);

fn passive_config() -> MilitaryConfig {
    let mut config = MilitaryConfig::default();
    config.attack.aggressiveness = 0.0;
    config
}

#[test]
fn test_rush_skips_fortified_enemy() {
    let mut world = SandboxWorld::new();
    world.add_player(ME, 1);
    world.add_player(PlayerId(2), 2);
    world.add_player(PlayerId(3), 3);
    world.add_land(0, Vec2::new(0.0, 0.0), Vec2::new(2000.0, 2000.0));
    world.spawn_structure(ME, "civil_centre", Vec2::new(100.0, 100.0), 3);
    world.spawn_structure(PlayerId(2), "civil_centre", Vec2::new(400.0, 100.0), 3);
    for i in 0..7 {
        world.spawn_structure(PlayerId(2), "defense_tower", Vec2::new(450.0, 50.0 + 30.0 * i as f32), 1);
    }
    world.spawn_structure(PlayerId(3), "civil_centre", Vec2::new(1500.0, 1500.0), 3);

    let config = MilitaryConfig::default();
    let mut claims = ClaimRegistry::new();
    let mut commands = CommandBuffer::new();
    let ctx = TurnContext::new(&world, ME, &config, &mut claims, &mut commands);

    let mut targeting = Targeting::default();
    assert_eq!(targeting.enemy_player(&ctx, AttackKind::Rush), Some(PlayerId(3)));
    // regular attacks are not deterred by towers
    let mut targeting = Targeting::default();
    assert_eq!(targeting.enemy_player(&ctx, AttackKind::Attack), Some(PlayerId(2)));
}

fn allied_world(soldiers: usize) -> SandboxWorld {
    let mut world = SandboxWorld::new();
    world.add_player(ME, 1);
    world.add_player(ALLY, 1);
    world.add_player(ENEMY, 2);
    world.add_land(0, Vec2::new(0.0, 0.0), Vec2::new(1000.0, 1000.0));
    world.spawn_structure(ME, "civil_centre", Vec2::new(100.0, 100.0), 3);
    world.spawn_structure(ENEMY, "civil_centre", Vec2::new(800.0, 800.0), 3);
    for i in 0..soldiers {
        world.spawn_soldier(ME, Vec2::new(95.0 + (i % 5) as f32 * 2.0, 95.0 + (i / 5) as f32 * 2.0));
    }
    world
}

fn council_with_plans(world: &SandboxWorld, sizes: &[usize]) -> WarCouncil {
    let mut council = WarCouncil::new(ME, passive_config());
    for size in sizes {
        let options = PlanOptions {
            target_size: Some(*size),
            ..PlanOptions::default()
        };
        council.plan_attack(world, AttackKind::Attack, options).unwrap();
    }
    council
}

#[test]
fn test_ally_request_forces_every_matching_plan() {
    let world = allied_world(13);
    let mut council = council_with_plans(&world, &[5, 5, 3]);
    let mut queues = ProductionQueues::new();

    council.update(&world, &mut queues, &EventBatch::new());
    let gathered: usize = council.attack().plans().map(|p| p.unit_count()).sum();
    assert_eq!(gathered, 13);

    let request = EventBatch::from(vec![GameEvent::AttackRequest {
        source: ALLY,
        target: ENEMY,
    }]);
    council.update(&world, &mut queues, &request);

    assert_eq!(council.replies().len(), 1);
    assert_eq!(council.replies()[0].answer, RequestAnswer::Join);
    assert_eq!(council.attack().plans().count(), 3);
    for plan in council.attack().plans() {
        assert!(plan.is_forced());
        assert!(plan.is_requested());
        assert_eq!(plan.target_player(), Some(ENEMY));
    }
}

#[test]
fn test_ally_request_declined_when_too_weak() {
    let world = allied_world(12);
    let mut council = council_with_plans(&world, &[5, 4, 3]);
    let mut queues = ProductionQueues::new();
    council.update(&world, &mut queues, &EventBatch::new());

    let request = EventBatch::from(vec![
        GameEvent::AttackRequest {
            source: ALLY,
            target: ENEMY,
        },
        // only the first request of a turn is answered
        GameEvent::AttackRequest {
            source: ALLY,
            target: ENEMY,
        },
    ]);
    council.update(&world, &mut queues, &request);

    assert_eq!(council.replies().len(), 1);
    assert_eq!(council.replies()[0].answer, RequestAnswer::Decline);
    assert!(council.attack().plans().all(|p| !p.is_requested()));
}

#[test]
fn test_standard_attacks_announce_their_enemy() {
    let world = allied_world(6);
    let mut council = council_with_plans(&world, &[6]);
    let mut queues = ProductionQueues::new();

    council.update(&world, &mut queues, &EventBatch::new());
    assert_eq!(council.outgoing_requests(), &[ENEMY]);

    // announced once
    council.update(&world, &mut queues, &EventBatch::new());
    assert!(council.outgoing_requests().is_empty());
}

#[test]
fn test_save_load_round_trip_mid_game() {
    let world = allied_world(13);
    let mut council = council_with_plans(&world, &[5, 5, 3]);
    let mut queues = ProductionQueues::new();
    council.update(&world, &mut queues, &EventBatch::new());

    let json = council.save().unwrap();
    let restored = WarCouncil::load(&json, passive_config()).unwrap();
    for (a, b) in council.attack().plans().zip(restored.attack().plans()) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.units(), b.units());
        assert_eq!(a.phase(), b.phase());
    }
    assert_eq!(restored.claims().roles.len(), council.claims().roles.len());
}
