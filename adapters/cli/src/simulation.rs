//! Randomised host that feeds spawn attempts and player deaths through the
//! policy pipeline and applies the outcome to an in-memory world.

use std::{fmt, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use mob_limiter_activity_log::ActivityLog;
use mob_limiter_config::ConfigStore;
use mob_limiter_core::{
    ActivityCategory, ActivityRecord, ActivitySink, Command, DiscardActivity, EntityId, EntityKind,
    Event, Location, PolicyConfig, SpawnAttempt, SpawnCause, WorldId,
};
use mob_limiter_system_dispatch::{Pipeline, Verdict};
use mob_limiter_world::{self as world, query, World};
use rand::{seq::SliceRandom, Rng};
use rand_chacha::{rand_core::SeedableRng, ChaCha8Rng};
use tracing::{debug, info, warn};

const TICK: Duration = Duration::from_millis(50);
const PLAYER_COUNT: usize = 4;
const PLAYER_HEALTH: f64 = 20.0;
const MOB_HEALTH: f64 = 20.0;
const ATTEMPTS_PER_TICK: usize = 6;
const PLAYER_SPREAD: f64 = 96.0;
const SPAWN_SPREAD: f64 = 40.0;
const HOSTILE_SHARE: f64 = 0.75;
const DESPAWN_CHANCE: f64 = 0.02;
const DAMAGE_CHANCE: f64 = 0.08;
const MAX_HIT: f64 = 7.0;
const PASSIVE_KINDS: [EntityKind; 6] = [
    EntityKind::Cow,
    EntityKind::Pig,
    EntityKind::Sheep,
    EntityKind::Chicken,
    EntityKind::Villager,
    EntityKind::Wolf,
];
const OTHER_CAUSES: [SpawnCause; 4] = [
    SpawnCause::Breeding,
    SpawnCause::SpawnEgg,
    SpawnCause::Command,
    SpawnCause::Reinforcement,
];

/// Parameters of a simulation run.
#[derive(Clone, Debug)]
pub(crate) struct Settings {
    pub(crate) config: PathBuf,
    pub(crate) seed: u64,
    pub(crate) ticks: u64,
    pub(crate) reload_every: Option<u64>,
    pub(crate) log_dir: Option<PathBuf>,
}

/// Tallies collected over a run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Report {
    pub(crate) ticks: u64,
    pub(crate) attempts: usize,
    pub(crate) admitted: usize,
    pub(crate) cancelled: usize,
    pub(crate) player_deaths: usize,
    pub(crate) cleanup_removals: usize,
    pub(crate) despawns: usize,
    pub(crate) reloads: usize,
    pub(crate) final_population: usize,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ticks: {}", self.ticks)?;
        writeln!(f, "spawn attempts: {}", self.attempts)?;
        writeln!(f, "admitted: {}", self.admitted)?;
        writeln!(f, "cancelled: {}", self.cancelled)?;
        writeln!(f, "player deaths: {}", self.player_deaths)?;
        writeln!(f, "cleanup removals: {}", self.cleanup_removals)?;
        writeln!(f, "despawns: {}", self.despawns)?;
        writeln!(f, "reloads: {}", self.reloads)?;
        write!(f, "hostile population: {}", self.final_population)
    }
}

/// Runs a whole simulation, reloading the configuration from disk on the
/// requested cadence.
pub(crate) fn run(settings: &Settings) -> Result<Report> {
    let (mut store, _) = ConfigStore::open(&settings.config).with_context(|| {
        format!(
            "failed to open configuration at {}",
            settings.config.display()
        )
    })?;
    let mut log = match &settings.log_dir {
        Some(dir) => Some(
            ActivityLog::create(dir, store.snapshot().logging_enabled)
                .context("failed to create activity log")?,
        ),
        None => None,
    };
    let mut discard = DiscardActivity;
    let mut host = Host::new(settings.seed, store.snapshot().clone());
    let reload_every = settings.reload_every.filter(|every| *every > 0);

    for tick in 1..=settings.ticks {
        if reload_every.is_some_and(|every| tick % every == 0) {
            match store.reload() {
                Ok(_) => {
                    let config = store.snapshot().clone();
                    if let Some(log) = log.as_mut() {
                        log.set_enabled(config.logging_enabled);
                    }
                    host.reload(config);
                    sink(&mut log, &mut discard).record(ActivityRecord::new(
                        ActivityCategory::Reload,
                        format!("Configuration reloaded at tick {tick}"),
                    ));
                }
                Err(err) => {
                    warn!(tick, error = %err, "reload failed, keeping previous configuration");
                }
            }
        }
        host.step(sink(&mut log, &mut discard));
    }

    let report = host.finish();
    info!(
        ticks = report.ticks,
        population = report.final_population,
        "simulation finished"
    );
    Ok(report)
}

fn sink<'a>(
    log: &'a mut Option<ActivityLog>,
    discard: &'a mut DiscardActivity,
) -> &'a mut dyn ActivitySink {
    match log {
        Some(log) => log,
        None => discard,
    }
}

struct Host {
    world: World,
    pipeline: Pipeline<ChaCha8Rng>,
    rng: ChaCha8Rng,
    players: Vec<EntityId>,
    report: Report,
}

impl Host {
    fn new(seed: u64, config: PolicyConfig) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut policy_rng = rng.clone();
        policy_rng.set_stream(1);

        let mut world = World::new();
        let players = (0..PLAYER_COUNT)
            .map(|_| spawn_player(&mut world, &mut rng))
            .collect();
        let pipeline = Pipeline::standard(config, &world, policy_rng);

        Self {
            world,
            pipeline,
            rng,
            players,
            report: Report::default(),
        }
    }

    fn reload(&mut self, config: PolicyConfig) {
        self.pipeline.reload(config, &self.world);
        self.report.reloads += 1;
    }

    fn step(&mut self, activity: &mut dyn ActivitySink) {
        let mut events = Vec::new();
        world::apply(&mut self.world, Command::Tick { dt: TICK }, &mut events);
        let now = query::clock(&self.world);
        self.report.ticks += 1;

        for _ in 0..ATTEMPTS_PER_TICK {
            self.attempt_spawn(now, activity, &mut events);
        }
        self.despawn_some(&mut events);
        self.hurt_players(&mut events);

        self.report.player_deaths += events
            .iter()
            .filter(|event| {
                matches!(
                    event,
                    Event::EntityDied {
                        kind: EntityKind::Player,
                        ..
                    }
                )
            })
            .count();

        let mut applied = Vec::new();
        self.pipeline
            .handle(&events, &mut self.world, now, activity, |target, command| {
                world::apply(target, command, &mut applied);
            });
        self.report.cleanup_removals += applied
            .iter()
            .filter(|event| matches!(event, Event::EntityRemoved { .. }))
            .count();

        self.respawn_players();
    }

    fn attempt_spawn(
        &mut self,
        now: Duration,
        activity: &mut dyn ActivitySink,
        events: &mut Vec<Event>,
    ) {
        let anchor = self
            .players
            .choose(&mut self.rng)
            .and_then(|id| query::entity(&self.world, *id))
            .map_or_else(origin, |player| player.location);
        let location = Location::new(
            anchor.world(),
            anchor.x() + self.rng.gen_range(-SPAWN_SPREAD..=SPAWN_SPREAD),
            anchor.y(),
            anchor.z() + self.rng.gen_range(-SPAWN_SPREAD..=SPAWN_SPREAD),
        );
        let kind = self.pick_kind();
        let cause = self.pick_cause();

        let mut attempt = SpawnAttempt::new(kind, cause, location);
        self.report.attempts += 1;
        match self
            .pipeline
            .evaluate_spawn(&mut attempt, &self.world, now, activity)
        {
            Verdict::Admitted => {
                self.report.admitted += 1;
                world::apply(
                    &mut self.world,
                    Command::SpawnEntity {
                        kind,
                        cause,
                        location,
                        health: MOB_HEALTH,
                    },
                    events,
                );
            }
            Verdict::Cancelled => self.report.cancelled += 1,
        }
    }

    fn pick_kind(&mut self) -> EntityKind {
        if self.rng.gen_bool(HOSTILE_SHARE) {
            let hostile: Vec<EntityKind> = EntityKind::tracked().collect();
            if let Some(kind) = hostile.choose(&mut self.rng) {
                return *kind;
            }
        }
        PASSIVE_KINDS
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(EntityKind::Cow)
    }

    fn pick_cause(&mut self) -> SpawnCause {
        match self.rng.gen_range(0..10) {
            0..=6 => SpawnCause::Natural,
            7 => SpawnCause::Spawner,
            _ => OTHER_CAUSES
                .choose(&mut self.rng)
                .copied()
                .unwrap_or(SpawnCause::Custom),
        }
    }

    fn despawn_some(&mut self, events: &mut Vec<Event>) {
        let leaving: Vec<EntityId> = query::entity_view(&self.world)
            .iter()
            .filter(|snapshot| snapshot.kind.is_tracked())
            .map(|snapshot| snapshot.id)
            .filter(|_| self.rng.gen_bool(DESPAWN_CHANCE))
            .collect();
        self.report.despawns += leaving.len();
        for entity in leaving {
            world::apply(&mut self.world, Command::RemoveEntity { entity }, events);
        }
    }

    fn hurt_players(&mut self, events: &mut Vec<Event>) {
        for index in 0..self.players.len() {
            if !self.rng.gen_bool(DAMAGE_CHANCE) {
                continue;
            }
            let amount = self.rng.gen_range(1.0..=MAX_HIT);
            world::apply(
                &mut self.world,
                Command::DamageEntity {
                    entity: self.players[index],
                    amount,
                },
                events,
            );
        }
    }

    fn respawn_players(&mut self) {
        for index in 0..self.players.len() {
            if query::entity(&self.world, self.players[index]).is_some() {
                continue;
            }
            let replacement = spawn_player(&mut self.world, &mut self.rng);
            debug!(old = ?self.players[index], new = ?replacement, "respawned player");
            self.players[index] = replacement;
        }
    }

    fn finish(mut self) -> Report {
        self.report.final_population = query::tracked_population(&self.world);
        self.report
    }
}

fn origin() -> Location {
    Location::new(WorldId::new(0), 0.0, 64.0, 0.0)
}

fn spawn_player(world: &mut World, rng: &mut ChaCha8Rng) -> EntityId {
    let location = Location::new(
        WorldId::new(0),
        rng.gen_range(-PLAYER_SPREAD..=PLAYER_SPREAD),
        64.0,
        rng.gen_range(-PLAYER_SPREAD..=PLAYER_SPREAD),
    );
    let mut events = Vec::new();
    world::apply(
        world,
        Command::SpawnEntity {
            kind: EntityKind::Player,
            cause: SpawnCause::Custom,
            location,
            health: PLAYER_HEALTH,
        },
        &mut events,
    );
    events
        .iter()
        .find_map(|event| match event {
            Event::EntitySpawned { entity, .. } => Some(*entity),
            _ => None,
        })
        .unwrap_or_else(|| EntityId::new(0))
}
