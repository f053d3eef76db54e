//! Naval transport integration tests

use glam::Vec2;
use war_council::context::TurnContext;
use war_council::core::config::MilitaryConfig;
use war_council::core::types::{EntityId, PlayerId, RegionId, TransportId};
use war_council::military::ClaimRegistry;
use war_council::naval::{NavalManager, TransportState};
use war_council::world::{CommandBuffer, EventBatch, ProductionQueues, SandboxWorld, TrainingPurpose};
use war_council::WarCouncil;

const ME: PlayerId = PlayerId(1);

/// Land 0 | sea 1 | land 2
fn strait() -> SandboxWorld {
    let mut world = SandboxWorld::two_player();
    world.add_land(0, Vec2::new(0.0, 0.0), Vec2::new(100.0, 200.0));
    world.add_sea(1, Vec2::new(100.0, 0.0), Vec2::new(200.0, 200.0));
    world.add_land(2, Vec2::new(200.0, 0.0), Vec2::new(300.0, 200.0));
    world
}

struct Harness {
    world: SandboxWorld,
    config: MilitaryConfig,
    claims: ClaimRegistry,
    naval: NavalManager,
    queues: ProductionQueues,
    events: EventBatch,
}

impl Harness {
    fn new(world: SandboxWorld) -> Self {
        Self {
            world,
            config: MilitaryConfig::default(),
            claims: ClaimRegistry::new(),
            naval: NavalManager::new(),
            queues: ProductionQueues::new(),
            events: EventBatch::new(),
        }
    }

    fn ship_units(&mut self, units: &[EntityId], to: Vec2) -> Option<TransportId> {
        let mut commands = CommandBuffer::new();
        let mut ctx = TurnContext::new(&self.world, ME, &self.config, &mut self.claims, &mut commands);
        self.naval.require_transport(&mut ctx, units, to)
    }

    fn turn(&mut self) {
        let mut commands = CommandBuffer::new();
        {
            let mut ctx = TurnContext::new(&self.world, ME, &self.config, &mut self.claims, &mut commands);
            self.naval.update(&mut ctx, &mut self.queues, &self.events);
        }
        self.world.apply(ME, commands.drain());
        self.world.start_production(ME, &mut self.queues);
        self.events = self.world.step();
    }
}

#[test]
fn test_transport_without_dock_fails_and_frees_units() {
    let mut h = Harness::new(strait());
    let units: Vec<EntityId> = (0..3)
        .map(|i| h.world.spawn_soldier(ME, Vec2::new(40.0, 90.0 + i as f32)))
        .collect();
    let id = h.ship_units(&units, Vec2::new(250.0, 100.0)).unwrap();
    assert!(units.iter().all(|u| !h.claims.carriage.is_free(*u)));

    for _ in 0..5 {
        h.turn();
    }
    assert_eq!(h.naval.transport_state(id), None);
    assert!(units.iter().all(|u| h.claims.carriage.is_free(*u)));
    assert!(!h.naval.can_reach(&h.world, RegionId(0), RegionId(2)));

    h.world.spawn_dock(ME, Vec2::new(90.0, 20.0), RegionId(1));
    h.turn();
    h.turn();
    assert!(h.naval.can_reach(&h.world, RegionId(0), RegionId(2)));
}

#[test]
fn test_crossing_with_existing_ship_lands_everyone() {
    let mut world = strait();
    world.spawn_dock(ME, Vec2::new(90.0, 20.0), RegionId(1));
    let mut h = Harness::new(world);
    let units: Vec<EntityId> = (0..4)
        .map(|i| h.world.spawn_soldier(ME, Vec2::new(40.0, 90.0 + i as f32)))
        .collect();
    h.world.spawn_ship(ME, RegionId(1), Vec2::new(150.0, 100.0), 6);
    let id = h.ship_units(&units, Vec2::new(250.0, 100.0)).unwrap();

    let mut states = Vec::new();
    for _ in 0..60 {
        match h.naval.transport_state(id) {
            Some(state) => states.push(state),
            None => break,
        }
        h.turn();
    }
    assert_eq!(h.naval.transport_state(id), None);
    assert!(states.windows(2).all(|w| w[0] <= w[1]), "states regressed: {states:?}");
    assert!(states.contains(&TransportState::Moving));
    for unit in &units {
        assert_eq!(h.world.entity(*unit).and_then(|u| u.region), Some(RegionId(2)));
        assert!(h.claims.carriage.is_free(*unit));
    }
}

#[test]
fn test_fleet_maintenance_is_idempotent_within_a_turn() {
    let mut world = strait();
    world.spawn_dock(ME, Vec2::new(90.0, 20.0), RegionId(1));
    let mut h = Harness::new(world);
    let units: Vec<EntityId> = (0..2)
        .map(|i| h.world.spawn_soldier(ME, Vec2::new(40.0, 90.0 + i as f32)))
        .collect();
    h.ship_units(&units, Vec2::new(250.0, 100.0)).unwrap();

    // first turn registers the dock, sees the plan waiting and raises demand
    h.turn();
    h.turn();
    assert!(h.naval.fleet(RegionId(1)).is_some_and(|f| f.wanted_transports >= 1));

    let mut queues = ProductionQueues::new();
    let mut commands = CommandBuffer::new();
    let mut ctx = TurnContext::new(&h.world, ME, &h.config, &mut h.claims, &mut commands);
    h.naval.maintain_fleet(&mut ctx, &mut queues);
    h.naval.maintain_fleet(&mut ctx, &mut queues);
    assert_eq!(queues.queued_for(&TrainingPurpose::Ship { sea: RegionId(1) }), 1);
}

/// Land 0 | sea 1 | land 2 | sea 3 | land 4, docked on both near shores
fn archipelago() -> SandboxWorld {
    let mut world = strait();
    world.add_sea(3, Vec2::new(300.0, 0.0), Vec2::new(400.0, 200.0));
    world.add_land(4, Vec2::new(400.0, 0.0), Vec2::new(500.0, 200.0));
    world.spawn_dock(ME, Vec2::new(90.0, 20.0), RegionId(1));
    world.spawn_dock(ME, Vec2::new(290.0, 20.0), RegionId(3));
    world
}

#[test]
fn test_two_crossings_restart_from_the_middle_island() {
    let mut world = archipelago();
    world.spawn_ship(ME, RegionId(1), Vec2::new(150.0, 100.0), 6);
    world.spawn_ship(ME, RegionId(3), Vec2::new(350.0, 100.0), 6);
    let mut h = Harness::new(world);
    let units: Vec<EntityId> = (0..3)
        .map(|i| h.world.spawn_soldier(ME, Vec2::new(40.0, 90.0 + i as f32)))
        .collect();
    let id = h.ship_units(&units, Vec2::new(450.0, 100.0)).unwrap();

    let mut states: Vec<TransportState> = Vec::new();
    for _ in 0..120 {
        let Some(state) = h.naval.transport_state(id) else {
            break;
        };
        if states.last() != Some(&state) {
            states.push(state);
        }
        h.turn();
    }
    assert_eq!(h.naval.transport_state(id), None, "still travelling: {states:?}");

    // one reset to Unstarted between the legs, monotonic within each leg
    let restart = states
        .iter()
        .skip(1)
        .position(|s| *s == TransportState::Unstarted)
        .map(|i| i + 1)
        .expect("no second leg");
    let (first, second) = states.split_at(restart);
    assert_eq!(
        first,
        &[
            TransportState::Unstarted,
            TransportState::WaitingForBoarding,
            TransportState::Boarding,
            TransportState::Moving,
            TransportState::Unboarding,
        ]
    );
    assert!(second.windows(2).all(|w| w[0] <= w[1]), "second leg regressed: {second:?}");
    assert_eq!(second.last(), Some(&TransportState::Unboarding));

    for unit in &units {
        assert_eq!(h.world.entity(*unit).and_then(|u| u.region), Some(RegionId(4)));
        assert!(h.claims.carriage.is_free(*unit));
    }
}

#[test]
fn test_crossing_resumes_after_save_and_load() {
    let mut world = strait();
    // a base without barracks keeps the attack scheduler idle
    world.spawn_structure(ME, "civil_centre", Vec2::new(30.0, 30.0), 3);
    world.spawn_dock(ME, Vec2::new(90.0, 20.0), RegionId(1));
    let ship = world.spawn_ship(ME, RegionId(1), Vec2::new(150.0, 100.0), 6);
    let units: Vec<EntityId> = (0..4)
        .map(|i| world.spawn_soldier(ME, Vec2::new(40.0, 90.0 + i as f32)))
        .collect();
    let mut config = MilitaryConfig::default();
    config.attack.aggressiveness = 0.0;

    let mut council = WarCouncil::new(ME, config.clone());
    let mut queues = ProductionQueues::new();
    let id = council
        .request_transport(&world, &units, Vec2::new(250.0, 100.0))
        .unwrap();
    let mut events = EventBatch::new();
    for _ in 0..60 {
        if council.naval().transport_state(id) == Some(TransportState::Moving) {
            break;
        }
        let mut commands = council.update(&world, &mut queues, &events);
        world.apply(ME, commands.drain());
        events = world.step();
    }
    assert_eq!(council.naval().transport_state(id), Some(TransportState::Moving));

    let json = council.save().unwrap();
    let mut restored = WarCouncil::load(&json, config).unwrap();
    let naval = restored.naval();
    assert_eq!(naval.transport_state(id), Some(TransportState::Moving));
    assert_eq!(naval.plan(id).map(|p| p.transport_ships().to_vec()), Some(vec![ship]));
    assert!(naval.docks().is_docked(RegionId(0), RegionId(1)));
    assert!(naval.fleet(RegionId(1)).is_some_and(|f| f.transports.contains(&ship)));
    assert_eq!(
        naval.fleet(RegionId(1)).map(|f| f.wanted_transports),
        council.naval().fleet(RegionId(1)).map(|f| f.wanted_transports)
    );
    assert!(units.iter().all(|u| !restored.claims().carriage.is_free(*u)));

    for _ in 0..60 {
        if restored.naval().transport_state(id).is_none() {
            break;
        }
        let mut commands = restored.update(&world, &mut queues, &events);
        world.apply(ME, commands.drain());
        events = world.step();
    }
    assert_eq!(restored.naval().transport_state(id), None);
    for unit in &units {
        assert_eq!(world.entity(*unit).and_then(|u| u.region), Some(RegionId(2)));
        assert!(restored.claims().carriage.is_free(*unit));
    }
}
