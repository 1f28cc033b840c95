#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the mob limiter.
//!
//! This crate defines the message surface that connects the host world, the
//! admission policies, and the adapters. The host submits [`Command`] values
//! describing desired mutations, the world executes those commands via its
//! `apply` entry point, and then broadcasts [`Event`] values for policies to
//! react to. Creation requests are first wrapped in a [`SpawnAttempt`] and run
//! through every registered [`Policy`]; a policy may veto the attempt but can
//! never revert another policy's veto.

use std::{collections::BTreeMap, fmt, str::FromStr, time::Duration};

use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod kind;

pub use kind::{EntityKind, UnknownEntityKind};

/// Edge length of a chunk column measured in world units.
pub const CHUNK_LENGTH: f64 = 16.0;

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Advances the world clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Commits a new entity into the world.
    ///
    /// Hosts are expected to run the matching [`SpawnAttempt`] through the
    /// policy pipeline before applying this command.
    SpawnEntity {
        /// Archetype of the entity to create.
        kind: EntityKind,
        /// Reason the host is creating the entity.
        cause: SpawnCause,
        /// Where the entity appears.
        location: Location,
        /// Starting health of the entity.
        health: f64,
    },
    /// Removes a live entity without it dying.
    ///
    /// Removing an entity that no longer exists is a no-op.
    RemoveEntity {
        /// Identifier of the entity to remove.
        entity: EntityId,
    },
    /// Subtracts health from an entity, killing it when health reaches zero.
    DamageEntity {
        /// Identifier of the entity receiving damage.
        entity: EntityId,
        /// Amount of health to subtract.
        amount: f64,
    },
    /// Teleports an entity to a new location.
    MoveEntity {
        /// Identifier of the entity to move.
        entity: EntityId,
        /// Destination of the move.
        location: Location,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the world clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that an entity was committed into the world.
    EntitySpawned {
        /// Identifier assigned to the new entity.
        entity: EntityId,
        /// Archetype of the new entity.
        kind: EntityKind,
        /// Reason the entity was created.
        cause: SpawnCause,
        /// Where the entity appeared.
        location: Location,
    },
    /// Confirms that an entity was removed without dying.
    EntityRemoved {
        /// Identifier of the removed entity.
        entity: EntityId,
        /// Archetype of the removed entity.
        kind: EntityKind,
        /// Last known location of the removed entity.
        location: Location,
    },
    /// Reports that an entity lost health but survived.
    EntityDamaged {
        /// Identifier of the damaged entity.
        entity: EntityId,
        /// Health remaining after the damage was applied.
        health: f64,
    },
    /// Announces that an entity died and left the world.
    EntityDied {
        /// Identifier of the entity that died.
        entity: EntityId,
        /// Archetype of the entity that died.
        kind: EntityKind,
        /// Location of the death.
        location: Location,
    },
    /// Confirms that an entity was moved.
    EntityMoved {
        /// Identifier of the moved entity.
        entity: EntityId,
        /// Location before the move.
        from: Location,
        /// Location after the move.
        to: Location,
    },
}

/// Reason the host is creating an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpawnCause {
    /// Organic generation by the world's own spawning rules.
    Natural,
    /// Mechanical generator block producing entities on a timer.
    Spawner,
    /// Offspring of two adult entities.
    Breeding,
    /// Spawn egg used by a player.
    SpawnEgg,
    /// Administrative command.
    Command,
    /// Reinforcements summoned by another entity.
    Reinforcement,
    /// Any host-specific reason not covered above.
    Custom,
}

impl SpawnCause {
    /// Reports whether admission policies have an opinion on this cause.
    ///
    /// Only organic generation and mechanical generators are gated; every
    /// other cause is left untouched.
    #[must_use]
    pub const fn is_natural(self) -> bool {
        matches!(self, Self::Natural | Self::Spawner)
    }
}

/// Identifier of one dimension of the host world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorldId(u32);

impl WorldId {
    /// Creates a new world identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Opaque handle of a live entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates a new entity identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Point in one dimension of the host world.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    world: WorldId,
    x: f64,
    y: f64,
    z: f64,
}

impl Location {
    /// Creates a location from a world and three coordinates.
    #[must_use]
    pub const fn new(world: WorldId, x: f64, y: f64, z: f64) -> Self {
        Self { world, x, y, z }
    }

    /// Dimension containing the location.
    #[must_use]
    pub const fn world(&self) -> WorldId {
        self.world
    }

    /// East-west coordinate.
    #[must_use]
    pub const fn x(&self) -> f64 {
        self.x
    }

    /// Vertical coordinate.
    #[must_use]
    pub const fn y(&self) -> f64 {
        self.y
    }

    /// North-south coordinate.
    #[must_use]
    pub const fn z(&self) -> f64 {
        self.z
    }

    /// Squared Euclidean distance, or `None` across different worlds.
    #[must_use]
    pub fn distance_squared(&self, other: &Location) -> Option<f64> {
        if self.world != other.world {
            return None;
        }

        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        Some(dx * dx + dy * dy + dz * dz)
    }

    /// Reports whether `other` lies inside the axis-aligned cube of half
    /// edge `radius` centred on this location.
    #[must_use]
    pub fn cube_contains(&self, other: &Location, radius: f64) -> bool {
        self.world == other.world
            && (self.x - other.x).abs() <= radius
            && (self.y - other.y).abs() <= radius
            && (self.z - other.z).abs() <= radius
    }

    /// Chunk column containing the location.
    #[must_use]
    pub fn chunk(&self) -> ChunkKey {
        ChunkKey {
            world: self.world,
            x: (self.x / CHUNK_LENGTH).floor() as i32,
            z: (self.z / CHUNK_LENGTH).floor() as i32,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "world {} ({:.1}, {:.1}, {:.1})",
            self.world.get(),
            self.x,
            self.y,
            self.z
        )
    }
}

/// Identifier of a vertical chunk column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey {
    world: WorldId,
    x: i32,
    z: i32,
}

impl ChunkKey {
    /// Creates a chunk key from its world and chunk coordinates.
    #[must_use]
    pub const fn new(world: WorldId, x: i32, z: i32) -> Self {
        Self { world, x, z }
    }

    /// Dimension containing the chunk.
    #[must_use]
    pub const fn world(&self) -> WorldId {
        self.world
    }

    /// Chunk column index along the x axis.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Chunk column index along the z axis.
    #[must_use]
    pub const fn z(&self) -> i32 {
        self.z
    }
}

/// Immutable representation of a single entity's state used for queries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EntitySnapshot {
    /// Opaque handle of the entity.
    pub id: EntityId,
    /// Archetype of the entity.
    pub kind: EntityKind,
    /// Current position of the entity.
    pub location: Location,
    /// Current health of the entity.
    pub health: f64,
}

/// Read-only snapshot describing a set of live entities.
#[derive(Clone, Debug, Default)]
pub struct EntityView {
    snapshots: Vec<EntitySnapshot>,
}

impl EntityView {
    /// Creates a new entity view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<EntitySnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured snapshots in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &EntitySnapshot> {
        self.snapshots.iter()
    }

    /// Number of entities captured by the view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Reports whether the view captured no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Keeps only the snapshots that satisfy the predicate.
    #[must_use]
    pub fn filtered(mut self, mut keep: impl FnMut(&EntitySnapshot) -> bool) -> Self {
        self.snapshots.retain(|snapshot| keep(snapshot));
        self
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<EntitySnapshot> {
        self.snapshots
    }
}

/// Read access to the host world required by the policies.
pub trait WorldQuery {
    /// Every live entity across every loaded world.
    fn entities(&self) -> EntityView;

    /// Live entities inside the axis-aligned cube of half edge `radius`
    /// centred on `center`.
    fn entities_within(&self, center: &Location, radius: f64) -> EntityView;

    /// Live players inside the provided world.
    fn players(&self, world: WorldId) -> EntityView {
        self.entities().filtered(|snapshot| {
            snapshot.kind == EntityKind::Player && snapshot.location.world() == world
        })
    }
}

/// Pending creation of an entity that policies may veto.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnAttempt {
    kind: EntityKind,
    cause: SpawnCause,
    location: Location,
    cancelled: bool,
}

impl SpawnAttempt {
    /// Creates a pending attempt that has not been vetoed.
    #[must_use]
    pub const fn new(kind: EntityKind, cause: SpawnCause, location: Location) -> Self {
        Self {
            kind,
            cause,
            location,
            cancelled: false,
        }
    }

    /// Archetype the host wants to create.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Reason the host wants to create the entity.
    #[must_use]
    pub const fn cause(&self) -> SpawnCause {
        self.cause
    }

    /// Location the entity would appear at.
    #[must_use]
    pub const fn location(&self) -> Location {
        self.location
    }

    /// Marks the attempt as vetoed. Calling this more than once is harmless.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Reports whether any policy vetoed the attempt.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Reports whether admission gates should look at this attempt at all.
    #[must_use]
    pub const fn is_gated(&self) -> bool {
        self.cause.is_natural() && self.kind.is_tracked()
    }
}

/// Independently switchable policy features.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Feature {
    /// Global hostile ceiling.
    GlobalLimit,
    /// Per-category ceilings.
    CategoryLimits,
    /// Probabilistic throttling near weakened players.
    ProximityThrottle,
    /// Population reduction after a player death.
    DeathCleanup,
    /// Structured activity records.
    Logging,
}

impl Feature {
    /// Every feature in presentation order.
    pub const ALL: [Feature; 5] = [
        Feature::GlobalLimit,
        Feature::CategoryLimits,
        Feature::ProximityThrottle,
        Feature::DeathCleanup,
        Feature::Logging,
    ];

    /// Name used by configuration files and the command line.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::GlobalLimit => "global-limit",
            Self::CategoryLimits => "mob-limits",
            Self::ProximityThrottle => "low-health-delay",
            Self::DeathCleanup => "death-cleanup",
            Self::Logging => "logging",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a feature name is not recognised.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown feature `{0}`")]
pub struct UnknownFeature(pub String);

impl FromStr for Feature {
    type Err = UnknownFeature;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        Feature::ALL
            .into_iter()
            .find(|feature| feature.name() == normalized)
            .ok_or_else(|| UnknownFeature(value.to_owned()))
    }
}

/// Immutable policy configuration snapshot.
///
/// Every numeric field is trusted to lie within its documented bound; the
/// configuration loader clamps values before a snapshot is published. A
/// reload replaces the whole snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct PolicyConfig {
    /// Enables the global hostile ceiling.
    pub global_limit_enabled: bool,
    /// Maximum number of tracked entities across every loaded world.
    pub global_ceiling: u32,
    /// Enables the per-category ceilings.
    pub category_limits_enabled: bool,
    /// Maximum number of entities per tracked kind. Only tracked kinds appear.
    pub category_ceilings: BTreeMap<EntityKind, u32>,
    /// Enables throttling near weakened players.
    pub proximity_throttle_enabled: bool,
    /// Players with health strictly below this value count as weakened. `[0, 20]`.
    pub vitality_threshold: f64,
    /// Radius around a spawn searched for weakened players. `>= 0`.
    pub throttle_radius: f64,
    /// Probability of vetoing a qualifying spawn. `[0, 1]`.
    pub throttle_chance: f64,
    /// Enables population reduction after a player death.
    pub death_cleanup_enabled: bool,
    /// Half edge of the cube searched around a death. `>= 0`.
    pub cleanup_radius: f64,
    /// Cleanup only happens when strictly more tracked entities are found.
    pub cleanup_threshold: u32,
    /// Fraction of the found entities to remove. `[0, 1]`.
    pub cleanup_fraction: f64,
    /// Enables structured activity records.
    pub logging_enabled: bool,
}

impl PolicyConfig {
    /// Default global ceiling.
    pub const DEFAULT_GLOBAL_CEILING: u32 = 70;
    /// Default weakened-player health threshold.
    pub const DEFAULT_VITALITY_THRESHOLD: f64 = 5.0;
    /// Default throttle search radius.
    pub const DEFAULT_THROTTLE_RADIUS: f64 = 30.0;
    /// Default throttle veto probability.
    pub const DEFAULT_THROTTLE_CHANCE: f64 = 0.5;
    /// Default cleanup cube half edge.
    pub const DEFAULT_CLEANUP_RADIUS: f64 = 10.0;
    /// Default cleanup threshold.
    pub const DEFAULT_CLEANUP_THRESHOLD: u32 = 5;
    /// Default cleanup fraction.
    pub const DEFAULT_CLEANUP_FRACTION: f64 = 0.5;
    /// Highest meaningful health value.
    pub const MAX_VITALITY: f64 = 20.0;

    /// Reports whether the provided feature is enabled.
    #[must_use]
    pub fn is_enabled(&self, feature: Feature) -> bool {
        match feature {
            Feature::GlobalLimit => self.global_limit_enabled,
            Feature::CategoryLimits => self.category_limits_enabled,
            Feature::ProximityThrottle => self.proximity_throttle_enabled,
            Feature::DeathCleanup => self.death_cleanup_enabled,
            Feature::Logging => self.logging_enabled,
        }
    }

    /// Returns a new snapshot with one feature switched.
    #[must_use]
    pub fn with_feature(&self, feature: Feature, enabled: bool) -> Self {
        let mut next = self.clone();
        let flag = match feature {
            Feature::GlobalLimit => &mut next.global_limit_enabled,
            Feature::CategoryLimits => &mut next.category_limits_enabled,
            Feature::ProximityThrottle => &mut next.proximity_throttle_enabled,
            Feature::DeathCleanup => &mut next.death_cleanup_enabled,
            Feature::Logging => &mut next.logging_enabled,
        };
        *flag = enabled;
        next
    }

    /// Ceiling configured for the provided kind, if any.
    #[must_use]
    pub fn category_ceiling(&self, kind: EntityKind) -> Option<u32> {
        self.category_ceilings.get(&kind).copied()
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            global_limit_enabled: true,
            global_ceiling: Self::DEFAULT_GLOBAL_CEILING,
            category_limits_enabled: true,
            category_ceilings: BTreeMap::new(),
            proximity_throttle_enabled: true,
            vitality_threshold: Self::DEFAULT_VITALITY_THRESHOLD,
            throttle_radius: Self::DEFAULT_THROTTLE_RADIUS,
            throttle_chance: Self::DEFAULT_THROTTLE_CHANCE,
            death_cleanup_enabled: true,
            cleanup_radius: Self::DEFAULT_CLEANUP_RADIUS,
            cleanup_threshold: Self::DEFAULT_CLEANUP_THRESHOLD,
            cleanup_fraction: Self::DEFAULT_CLEANUP_FRACTION,
            logging_enabled: true,
        }
    }
}

/// Source of an activity record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityCategory {
    /// Global ceiling vetoes.
    GlobalLimit,
    /// Per-category ceiling vetoes.
    CategoryLimit,
    /// Throttle vetoes near weakened players.
    LowHealthDelay,
    /// Removals after a player death.
    DeathCleanup,
    /// Configuration reloads.
    Reload,
    /// Feature toggles.
    Toggle,
}

impl ActivityCategory {
    /// Stable name written to activity logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GlobalLimit => "GlobalLimit",
            Self::CategoryLimit => "CategoryLimit",
            Self::LowHealthDelay => "LowHealthDelay",
            Self::DeathCleanup => "DeathCleanup",
            Self::Reload => "Reload",
            Self::Toggle => "Toggle",
        }
    }
}

impl fmt::Display for ActivityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured record describing a policy decision with a side effect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivityRecord {
    /// Source of the record.
    pub category: ActivityCategory,
    /// Human readable description.
    pub message: String,
}

impl ActivityRecord {
    /// Creates a new activity record.
    #[must_use]
    pub fn new(category: ActivityCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

/// Fire-and-forget receiver of activity records.
///
/// Implementations may drop or delay records; policies never depend on a
/// record being persisted.
pub trait ActivitySink {
    /// Accepts a record.
    fn record(&mut self, record: ActivityRecord);
}

impl ActivitySink for Vec<ActivityRecord> {
    fn record(&mut self, record: ActivityRecord) {
        self.push(record);
    }
}

/// Sink that discards every record.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiscardActivity;

impl ActivitySink for DiscardActivity {
    fn record(&mut self, _record: ActivityRecord) {}
}

/// Everything a policy may read or touch while handling one event.
pub struct PolicyContext<'a> {
    /// Active configuration snapshot.
    pub config: &'a PolicyConfig,
    /// Read access to the host world.
    pub world: &'a dyn WorldQuery,
    /// Source of randomness for probabilistic decisions.
    pub rng: &'a mut dyn RngCore,
    /// Receiver of activity records.
    pub activity: &'a mut dyn ActivitySink,
    /// World clock at the time of the event.
    pub now: Duration,
}

impl fmt::Debug for PolicyContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyContext")
            .field("config", self.config)
            .field("now", &self.now)
            .finish_non_exhaustive()
    }
}

/// Death of an agent delivered to the policies.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeathNotice {
    /// Identifier of the entity that died.
    pub entity: EntityId,
    /// Archetype of the entity that died.
    pub kind: EntityKind,
    /// Where the entity died.
    pub location: Location,
}

/// Common capability of every admission or cleanup policy.
///
/// Every method has a no-opinion default so a policy only implements the
/// events it cares about.
pub trait Policy {
    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Inspects a pending creation and optionally vetoes it.
    ///
    /// The attempt may already be cancelled by an earlier policy.
    fn evaluate_spawn(&mut self, _attempt: &mut SpawnAttempt, _ctx: &mut PolicyContext<'_>) {}

    /// Reacts to the death of an entity, queueing compensating commands.
    fn on_death(
        &mut self,
        _death: &DeathNotice,
        _ctx: &mut PolicyContext<'_>,
        _out: &mut Vec<Command>,
    ) {
    }

    /// Resynchronises transient caches after a configuration swap.
    fn reload(&mut self, _config: &PolicyConfig, _world: &dyn WorldQuery) {}
}
