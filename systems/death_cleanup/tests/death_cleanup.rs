use std::{collections::BTreeMap, time::Duration};

use mob_limiter_core::{
    ActivityCategory, ActivityRecord, Command, DeathNotice, EntityId, EntityKind, Event, Location,
    Policy, PolicyConfig, PolicyContext, SpawnCause, WorldId,
};
use mob_limiter_system_death_cleanup::DeathCleanup;
use mob_limiter_world::{self as world, query, World};
use proptest::prelude::*;
use rand_chacha::{rand_core::SeedableRng, ChaCha8Rng};

fn at(x: f64, y: f64, z: f64) -> Location {
    Location::new(WorldId::new(0), x, y, z)
}

fn death_site() -> Location {
    at(0.0, 64.0, 0.0)
}

fn spawn(world: &mut World, kind: EntityKind, location: Location) -> EntityId {
    let mut events = Vec::new();
    world::apply(
        world,
        Command::SpawnEntity {
            kind,
            cause: SpawnCause::Natural,
            location,
            health: 20.0,
        },
        &mut events,
    );
    match events.as_slice() {
        [Event::EntitySpawned { entity, .. }] => *entity,
        other => panic!("unexpected events: {other:?}"),
    }
}

fn crowd(world: &mut World, count: usize) -> Vec<EntityId> {
    (0..count)
        .map(|index| {
            let x = (index % 9) as f64 - 4.0;
            let z = (index / 9) as f64;
            spawn(world, EntityKind::Zombie, at(x, 64.0, z))
        })
        .collect()
}

fn cleanup_config(threshold: u32, fraction: f64) -> PolicyConfig {
    PolicyConfig {
        cleanup_radius: 10.0,
        cleanup_threshold: threshold,
        cleanup_fraction: fraction,
        ..PolicyConfig::default()
    }
}

fn player_death() -> DeathNotice {
    DeathNotice {
        entity: EntityId::new(9_999),
        kind: EntityKind::Player,
        location: death_site(),
    }
}

fn run(
    config: &PolicyConfig,
    world: &World,
    death: &DeathNotice,
    seed: u64,
) -> (Vec<Command>, Vec<ActivityRecord>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut activity: Vec<ActivityRecord> = Vec::new();
    let mut out = Vec::new();
    let mut ctx = PolicyContext {
        config,
        world,
        rng: &mut rng,
        activity: &mut activity,
        now: Duration::ZERO,
    };
    DeathCleanup::new().on_death(death, &mut ctx, &mut out);
    (out, activity)
}

fn removed_ids(commands: &[Command]) -> Vec<EntityId> {
    commands
        .iter()
        .map(|command| match command {
            Command::RemoveEntity { entity } => *entity,
            other => panic!("unexpected command: {other:?}"),
        })
        .collect()
}

#[test]
fn ten_hostiles_above_threshold_lose_half() {
    let mut world = World::new();
    let zombies = crowd(&mut world, 10);

    let (commands, activity) = run(&cleanup_config(5, 0.5), &world, &player_death(), 1);

    let removed = removed_ids(&commands);
    assert_eq!(removed.len(), 5);
    assert!(removed.iter().all(|id| zombies.contains(id)));

    let mut events = Vec::new();
    for command in commands {
        world::apply(&mut world, command, &mut events);
    }
    assert_eq!(query::tracked_population(&world), 5);

    assert_eq!(activity.len(), 6, "one record per removal plus a summary");
    assert!(activity
        .iter()
        .all(|record| record.category == ActivityCategory::DeathCleanup));
    assert!(activity[5].message.starts_with("Removed 5 hostile mobs"));
}

#[test]
fn threshold_above_population_removes_nothing() {
    let mut world = World::new();
    let _ = crowd(&mut world, 10);

    let (commands, activity) = run(&cleanup_config(12, 0.5), &world, &player_death(), 2);

    assert!(commands.is_empty());
    assert!(activity.is_empty());
}

#[test]
fn zero_fraction_above_threshold_still_records_summary() {
    let mut world = World::new();
    let _ = crowd(&mut world, 10);

    let (commands, activity) = run(&cleanup_config(0, 0.0), &world, &player_death(), 3);

    assert!(commands.is_empty());
    assert_eq!(activity.len(), 1);
    assert_eq!(activity[0].category, ActivityCategory::DeathCleanup);
    assert!(activity[0].message.starts_with("Removed 0 hostile mobs near player death at"));
}

#[test]
fn zero_threshold_makes_every_hostile_a_candidate() {
    let mut world = World::new();
    let zombies = crowd(&mut world, 3);

    let (commands, _) = run(&cleanup_config(0, 1.0), &world, &player_death(), 4);

    let mut removed = removed_ids(&commands);
    removed.sort();
    assert_eq!(removed, zombies);
}

#[test]
fn search_area_is_a_cube_of_hostiles_only() {
    let mut world = World::new();
    let corner = spawn(&mut world, EntityKind::Skeleton, at(9.5, 73.5, -9.5));
    let outside = spawn(&mut world, EntityKind::Skeleton, at(10.5, 64.0, 0.0));
    let _cow = spawn(&mut world, EntityKind::Cow, at(1.0, 64.0, 1.0));
    let _villager = spawn(&mut world, EntityKind::Villager, at(1.0, 64.0, 1.0));
    let _bystander = spawn(&mut world, EntityKind::Player, at(2.0, 64.0, 2.0));

    let (commands, _) = run(&cleanup_config(0, 1.0), &world, &player_death(), 5);

    let removed = removed_ids(&commands);
    assert_eq!(removed, vec![corner]);
    assert!(!removed.contains(&outside));
}

#[test]
fn non_player_deaths_and_disabled_policy_are_ignored() {
    let mut world = World::new();
    let _ = crowd(&mut world, 10);
    let zombie_death = DeathNotice {
        kind: EntityKind::Zombie,
        ..player_death()
    };
    let disabled = PolicyConfig {
        death_cleanup_enabled: false,
        ..cleanup_config(0, 1.0)
    };

    assert!(run(&cleanup_config(0, 1.0), &world, &zombie_death, 6).0.is_empty());
    assert!(run(&disabled, &world, &player_death(), 7).0.is_empty());
}

#[test]
fn selection_spreads_across_every_candidate() {
    let mut world = World::new();
    let zombies = crowd(&mut world, 4);
    let config = cleanup_config(0, 0.5);
    let mut hits: BTreeMap<EntityId, u32> = BTreeMap::new();

    for seed in 0..400 {
        let (commands, _) = run(&config, &world, &player_death(), seed);
        for id in removed_ids(&commands) {
            *hits.entry(id).or_insert(0) += 1;
        }
    }

    assert_eq!(hits.len(), zombies.len());
    for (id, count) in hits {
        assert!(
            (140..=260).contains(&count),
            "{id:?} chosen {count} times out of 400, expected about 200"
        );
    }
}

proptest! {
    #[test]
    fn removal_count_matches_quota(
        found in 0_usize..30,
        threshold in 0_u32..30,
        fraction in 0.0_f64..=1.0,
        seed in any::<u64>(),
    ) {
        let mut world = World::new();
        let _ = crowd(&mut world, found);

        let (commands, _) = run(&cleanup_config(threshold, fraction), &world, &player_death(), seed);

        let expected = if found as u64 > u64::from(threshold) {
            ((found as f64 * fraction).ceil() as usize).min(found)
        } else {
            0
        };
        let mut removed = removed_ids(&commands);
        prop_assert_eq!(removed.len(), expected);
        removed.sort();
        removed.dedup();
        prop_assert_eq!(removed.len(), expected, "no entity is removed twice");
    }
}
