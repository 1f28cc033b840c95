use std::time::Duration;

use mob_limiter_core::{
    ActivityCategory, ActivityRecord, Command, EntityId, EntityKind, Event, Location, Policy,
    PolicyConfig, PolicyContext, SpawnAttempt, SpawnCause, WorldId,
};
use mob_limiter_system_category_limit::CategoryLimit;
use mob_limiter_world::{self as world, query, World};
use rand_chacha::{rand_core::SeedableRng, ChaCha8Rng};

fn location() -> Location {
    Location::new(WorldId::new(0), 4.0, 64.0, 4.0)
}

fn spawn(world: &mut World, kind: EntityKind) -> EntityId {
    let mut events = Vec::new();
    world::apply(
        world,
        Command::SpawnEntity {
            kind,
            cause: SpawnCause::Natural,
            location: location(),
            health: 20.0,
        },
        &mut events,
    );
    match events.as_slice() {
        [Event::EntitySpawned { entity, .. }] => *entity,
        other => panic!("unexpected events: {other:?}"),
    }
}

fn limited(ceilings: &[(EntityKind, u32)]) -> PolicyConfig {
    PolicyConfig {
        category_ceilings: ceilings.iter().copied().collect(),
        ..PolicyConfig::default()
    }
}

fn evaluate(
    gate: &mut CategoryLimit,
    config: &PolicyConfig,
    world: &World,
    attempt: &mut SpawnAttempt,
) -> Vec<ActivityRecord> {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let mut activity: Vec<ActivityRecord> = Vec::new();
    let mut ctx = PolicyContext {
        config,
        world,
        rng: &mut rng,
        activity: &mut activity,
        now: Duration::ZERO,
    };
    gate.evaluate_spawn(attempt, &mut ctx);
    activity
}

fn natural(kind: EntityKind) -> SpawnAttempt {
    SpawnAttempt::new(kind, SpawnCause::Natural, location())
}

#[test]
fn recount_matches_live_population() {
    let mut world = World::new();
    for _ in 0..4 {
        let _ = spawn(&mut world, EntityKind::Zombie);
    }
    for _ in 0..2 {
        let _ = spawn(&mut world, EntityKind::Husk);
    }
    let _ = spawn(&mut world, EntityKind::Creeper);
    let config = limited(&[(EntityKind::Zombie, 10), (EntityKind::Husk, 10), (EntityKind::Witch, 1)]);

    let gate = CategoryLimit::new(&config, &world);

    assert_eq!(gate.cached_count(EntityKind::Zombie), Some(4));
    assert_eq!(gate.cached_count(EntityKind::Husk), Some(2));
    assert_eq!(gate.cached_count(EntityKind::Witch), Some(0));
    assert_eq!(gate.cached_count(EntityKind::Creeper), None, "no ceiling, no cache");
}

#[test]
fn each_admission_increments_cache_by_one() {
    let world = World::new();
    let config = limited(&[(EntityKind::Spider, 100)]);
    let mut gate = CategoryLimit::new(&config, &world);

    for admitted in 1..=7 {
        let mut attempt = natural(EntityKind::Spider);
        let activity = evaluate(&mut gate, &config, &world, &mut attempt);
        assert!(!attempt.is_cancelled());
        assert!(activity.is_empty());
        assert_eq!(gate.cached_count(EntityKind::Spider), Some(admitted));
    }
}

#[test]
fn ceiling_cancels_from_cache_without_rescanning() {
    let world = World::new();
    let config = limited(&[(EntityKind::Blaze, 2)]);
    let mut gate = CategoryLimit::new(&config, &world);

    let mut outcomes = Vec::new();
    for _ in 0..4 {
        let mut attempt = natural(EntityKind::Blaze);
        let activity = evaluate(&mut gate, &config, &world, &mut attempt);
        outcomes.push((attempt.is_cancelled(), activity.len()));
    }

    assert_eq!(outcomes, vec![(false, 0), (false, 0), (true, 1), (true, 1)]);
    assert_eq!(gate.cached_count(EntityKind::Blaze), Some(2));
}

#[test]
fn cancellation_emits_category_record() {
    let world = World::new();
    let config = limited(&[(EntityKind::Ghast, 0)]);
    let mut gate = CategoryLimit::new(&config, &world);
    let mut attempt = natural(EntityKind::Ghast);

    let activity = evaluate(&mut gate, &config, &world, &mut attempt);

    assert!(attempt.is_cancelled());
    assert_eq!(activity[0].category, ActivityCategory::CategoryLimit);
    assert!(activity[0].message.contains("GHAST"));
}

#[test]
fn removals_drift_until_reload() {
    let mut world = World::new();
    let zombies: Vec<EntityId> = (0..3).map(|_| spawn(&mut world, EntityKind::Zombie)).collect();
    let config = limited(&[(EntityKind::Zombie, 3)]);
    let mut gate = CategoryLimit::new(&config, &world);

    let mut events = Vec::new();
    for zombie in zombies {
        world::apply(&mut world, Command::RemoveEntity { entity: zombie }, &mut events);
    }
    assert_eq!(query::tracked_population(&world), 0);

    let mut stale = natural(EntityKind::Zombie);
    let _ = evaluate(&mut gate, &config, &world, &mut stale);
    assert!(stale.is_cancelled(), "cache does not observe removals");
    assert_eq!(gate.cached_count(EntityKind::Zombie), Some(3));

    gate.reload(&config, &world);
    assert_eq!(gate.cached_count(EntityKind::Zombie), Some(0));

    let mut fresh = natural(EntityKind::Zombie);
    let _ = evaluate(&mut gate, &config, &world, &mut fresh);
    assert!(!fresh.is_cancelled());
}

#[test]
fn already_cancelled_attempt_still_counts_toward_ceiling() {
    let world = World::new();
    let config = limited(&[(EntityKind::Pillager, 5)]);
    let mut gate = CategoryLimit::new(&config, &world);
    let mut attempt = natural(EntityKind::Pillager);
    attempt.cancel();

    let _ = evaluate(&mut gate, &config, &world, &mut attempt);

    assert!(attempt.is_cancelled());
    assert_eq!(gate.cached_count(EntityKind::Pillager), Some(1));
}

#[test]
fn vetoes_from_earlier_gates_exhaust_the_ceiling() {
    let world = World::new();
    let config = limited(&[(EntityKind::Zombie, 3)]);
    let mut gate = CategoryLimit::new(&config, &world);

    for _ in 0..3 {
        let mut vetoed = natural(EntityKind::Zombie);
        vetoed.cancel();
        let _ = evaluate(&mut gate, &config, &world, &mut vetoed);
    }
    let mut next = natural(EntityKind::Zombie);
    let activity = evaluate(&mut gate, &config, &world, &mut next);

    assert!(next.is_cancelled());
    assert_eq!(activity.len(), 1);
    assert_eq!(activity[0].category, ActivityCategory::CategoryLimit);
}

#[test]
fn disabled_or_unnatural_attempts_are_ignored() {
    let world = World::new();
    let config = limited(&[(EntityKind::Vex, 0)]);
    let disabled = PolicyConfig {
        category_limits_enabled: false,
        ..config.clone()
    };
    let mut gate = CategoryLimit::new(&config, &world);

    let mut summoned = SpawnAttempt::new(EntityKind::Vex, SpawnCause::Reinforcement, location());
    let _ = evaluate(&mut gate, &config, &world, &mut summoned);
    assert!(!summoned.is_cancelled());

    let mut natural_vex = natural(EntityKind::Vex);
    let _ = evaluate(&mut gate, &disabled, &world, &mut natural_vex);
    assert!(!natural_vex.is_cancelled());
    assert_eq!(gate.cached_count(EntityKind::Vex), Some(0));
}
