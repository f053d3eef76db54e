//! Property tests for armies and claims

use glam::Vec2;
use proptest::prelude::*;
use std::collections::BTreeSet;
use war_council::context::TurnContext;
use war_council::core::config::MilitaryConfig;
use war_council::core::types::{ArmyId, EntityId, PlayerId, RegionId, TransportId};
use war_council::military::{Army, ClaimRegistry};
use war_council::naval::{DockRegistry, TransportPlan, TransportState};
use war_council::world::{CommandBuffer, SandboxWorld};

const ME: PlayerId = PlayerId(1);
const FOE: PlayerId = PlayerId(2);

fn world_with_foes(positions: &[(f32, f32)]) -> (SandboxWorld, Vec<EntityId>) {
    let mut world = SandboxWorld::two_player();
    world.add_land(0, Vec2::new(-1000.0, -1000.0), Vec2::new(1000.0, 1000.0));
    let ids = positions
        .iter()
        .map(|(x, y)| world.spawn_soldier(FOE, Vec2::new(*x, *y)))
        .collect();
    (world, ids)
}

fn positions(max: usize) -> impl Strategy<Value = Vec<(f32, f32)>> {
    prop::collection::vec((-200.0f32..200.0, -200.0f32..200.0), 1..max)
}

proptest! {
    #[test]
    fn strength_returns_to_zero_after_removing_everyone(spots in positions(12)) {
        let (world, ids) = world_with_foes(&spots);
        let config = MilitaryConfig::default();
        let mut claims = ClaimRegistry::new();
        let mut commands = CommandBuffer::new();
        let mut ctx = TurnContext::new(&world, ME, &config, &mut claims, &mut commands);

        let mut army = Army::new(&mut ctx, ArmyId(1), &ids);
        prop_assert_eq!(army.foe_count(), ids.len());
        prop_assert!(army.foe_strength() > 0.0);
        for id in &ids {
            army.remove_foe(&mut ctx, *id);
        }
        prop_assert!(army.foe_strength().abs() < 1e-3);
        prop_assert!(ctx.claims.foes.is_empty());
    }

    #[test]
    fn merge_keeps_every_member_and_claim(first in positions(8), second in positions(8)) {
        let all: Vec<(f32, f32)> = first.iter().chain(second.iter()).copied().collect();
        let (world, ids) = world_with_foes(&all);
        let (a_ids, b_ids) = ids.split_at(first.len());
        let config = MilitaryConfig::default();
        let mut claims = ClaimRegistry::new();
        let mut commands = CommandBuffer::new();
        let mut ctx = TurnContext::new(&world, ME, &config, &mut claims, &mut commands);

        let mut a = Army::new(&mut ctx, ArmyId(1), a_ids);
        let b = Army::new(&mut ctx, ArmyId(2), b_ids);
        let expected_strength = a.foe_strength() + b.foe_strength();
        a.merge(&mut ctx, b);

        let members: BTreeSet<EntityId> = a.foe_ids().collect();
        let wanted: BTreeSet<EntityId> = ids.iter().copied().collect();
        prop_assert_eq!(members, wanted);
        prop_assert!((a.foe_strength() - expected_strength).abs() < 1e-3);
        for id in &ids {
            prop_assert_eq!(ctx.claims.foes.holder(*id), Some(ArmyId(1)));
        }
    }

    #[test]
    fn breakaways_leave_cleanly(spots in positions(12)) {
        let (world, ids) = world_with_foes(&spots);
        let config = MilitaryConfig::default();
        let mut claims = ClaimRegistry::new();
        let mut commands = CommandBuffer::new();
        let mut ctx = TurnContext::new(&world, ME, &config, &mut claims, &mut commands);

        let mut army = Army::new(&mut ctx, ArmyId(1), &ids);
        let before: BTreeSet<EntityId> = army.foe_ids().collect();
        let gone = army.on_update(&mut ctx);
        let after: BTreeSet<EntityId> = army.foe_ids().collect();

        for id in &gone {
            prop_assert!(before.contains(id));
            prop_assert!(!after.contains(id));
            prop_assert!(ctx.claims.foes.is_free(*id));
        }
        prop_assert_eq!(after.len() + gone.len(), before.len());
        for id in &after {
            prop_assert_eq!(ctx.claims.foes.holder(*id), Some(ArmyId(1)));
        }
    }

    #[test]
    fn breakaways_are_decided_by_the_radius(spots in positions(12)) {
        let (world, ids) = world_with_foes(&spots);
        let config = MilitaryConfig::default();
        let limit = config.army.breakaway_radius_sq;
        let mut claims = ClaimRegistry::new();
        let mut commands = CommandBuffer::new();
        let mut ctx = TurnContext::new(&world, ME, &config, &mut claims, &mut commands);

        let mut army = Army::new(&mut ctx, ArmyId(1), &ids);
        let centre = spots.iter().map(|(x, y)| Vec2::new(*x, *y)).sum::<Vec2>() / spots.len() as f32;
        let gone: BTreeSet<EntityId> = army.on_update(&mut ctx).into_iter().collect();
        let distance_sq = |id: &EntityId| {
            world.entity(*id).and_then(|e| e.position).map_or(0.0, |p| p.distance_squared(centre))
        };

        // small slack for summation order
        for id in army.foe_ids() {
            prop_assert!(distance_sq(&id) <= limit * 1.001);
        }
        for id in &gone {
            prop_assert!(distance_sq(id) > limit * 0.999);
        }
    }

    #[test]
    fn each_entity_has_at_most_one_holder(ops in prop::collection::vec((0u32..10, 1u32..4, any::<bool>()), 1..60)) {
        let mut claims = ClaimRegistry::new();
        for (entity, army, claim) in ops {
            let (entity, army) = (EntityId(entity), ArmyId(army));
            if claim {
                let holder = claims.foes.holder(entity);
                let result = claims.foes.claim(entity, army);
                prop_assert_eq!(result.is_ok(), holder.is_none() || holder == Some(army));
            } else {
                claims.foes.release(entity, army);
            }
        }
        let mut seen = BTreeSet::new();
        for army in 1..4 {
            for id in claims.foes.held_by(ArmyId(army)) {
                prop_assert!(seen.insert(id));
            }
        }
        prop_assert_eq!(seen.len(), claims.foes.len());
    }
}

/// Land 0 | sea 1 | land 2, docked on land 0
fn strait() -> (SandboxWorld, DockRegistry) {
    let mut world = SandboxWorld::two_player();
    world.add_land(0, Vec2::new(0.0, 0.0), Vec2::new(100.0, 200.0));
    world.add_sea(1, Vec2::new(100.0, 0.0), Vec2::new(200.0, 200.0));
    world.add_land(2, Vec2::new(200.0, 0.0), Vec2::new(300.0, 200.0));
    world.spawn_dock(ME, Vec2::new(90.0, 20.0), RegionId(1));
    let mut docks = DockRegistry::default();
    docks.register(RegionId(0), RegionId(1));
    (world, docks)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn boarding_conserves_transport_capacity(
        capacities in prop::collection::vec(1u32..6, 1..4),
        soldiers in 1usize..12,
    ) {
        let (mut world, docks) = strait();
        let config = MilitaryConfig::default();
        let mut claims = ClaimRegistry::new();
        let units: Vec<EntityId> = (0..soldiers)
            .map(|i| world.spawn_soldier(ME, Vec2::new(40.0, 60.0 + 3.0 * i as f32)))
            .collect();
        let ships: Vec<EntityId> = capacities
            .iter()
            .enumerate()
            .map(|(i, cap)| world.spawn_ship(ME, RegionId(1), Vec2::new(150.0, 40.0 + 30.0 * i as f32), *cap))
            .collect();
        let total: u32 = capacities.iter().sum();
        let mut plan = TransportPlan::new(TransportId(0), units, Vec2::new(250.0, 100.0), RegionId(2), 0, true);
        {
            let mut commands = CommandBuffer::new();
            let mut ctx = TurnContext::new(&world, ME, &config, &mut claims, &mut commands);
            for ship in &ships {
                prop_assert!(plan.assign_transport_ship(&mut ctx, *ship));
            }
        }

        for _ in 0..30 {
            let mut commands = CommandBuffer::new();
            {
                let mut ctx = TurnContext::new(&world, ME, &config, &mut claims, &mut commands);
                let _ = plan.carry_on(&mut ctx, &docks);
            }
            world.apply(ME, commands.drain());
            world.step();

            let mut committed = 0;
            let mut boarded = 0;
            for ship in &ships {
                let aboard = world.entity(*ship).map_or(0, |s| s.garrisoned.len());
                prop_assert!(aboard as u32 <= world.entity(*ship).map_or(0, |s| s.garrison_max));
                committed += plan.load_of(*ship).max(aboard) as u32;
                boarded += aboard as u32;
            }
            prop_assert_eq!(plan.count_free_slots(&world, false) + committed, total);
            if plan.state() == TransportState::Moving {
                prop_assert_eq!(plan.count_free_slots(&world, true) + boarded, total);
            }
            if plan.state() >= TransportState::Unboarding {
                break;
            }
        }
    }
}
