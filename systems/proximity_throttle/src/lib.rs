#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Probabilistic admission gate that eases pressure on weakened players.

use std::{collections::HashMap, time::Duration};

use mob_limiter_core::{
    ActivityCategory, ActivityRecord, ChunkKey, Location, Policy, PolicyConfig, PolicyContext,
    SpawnAttempt, WorldQuery,
};
use rand::Rng;
use tracing::debug;

/// Gate that randomly vetoes hostile spawns close to a weakened player.
///
/// The chunk of every veto is stamped with the world clock. The stamps are
/// exposed for observability only and never influence a decision.
#[derive(Debug, Default)]
pub struct ProximityThrottle {
    last_vetoes: HashMap<ChunkKey, Duration>,
}

impl ProximityThrottle {
    /// Creates the gate with an empty cooldown map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports whether a player below the vitality threshold stands within
    /// the throttle radius of `location`.
    #[must_use]
    pub fn weakened_player_nearby(
        config: &PolicyConfig,
        world: &dyn WorldQuery,
        location: &Location,
    ) -> bool {
        let radius_squared = config.throttle_radius * config.throttle_radius;
        world.players(location.world()).iter().any(|player| {
            player.health < config.vitality_threshold
                && player
                    .location
                    .distance_squared(location)
                    .is_some_and(|distance| distance <= radius_squared)
        })
    }

    /// World clock of the last veto issued inside the chunk.
    #[must_use]
    pub fn last_veto(&self, chunk: ChunkKey) -> Option<Duration> {
        self.last_vetoes.get(&chunk).copied()
    }

    /// Number of chunks holding a veto stamp.
    #[must_use]
    pub fn cooldown_len(&self) -> usize {
        self.last_vetoes.len()
    }
}

impl Policy for ProximityThrottle {
    fn name(&self) -> &'static str {
        "low-health-delay"
    }

    fn evaluate_spawn(&mut self, attempt: &mut SpawnAttempt, ctx: &mut PolicyContext<'_>) {
        if !ctx.config.proximity_throttle_enabled || !attempt.is_gated() {
            return;
        }

        let location = attempt.location();
        if !Self::weakened_player_nearby(ctx.config, ctx.world, &location) {
            return;
        }

        let roll: f64 = ctx.rng.gen();
        if roll >= ctx.config.throttle_chance {
            return;
        }

        attempt.cancel();
        let _ = self.last_vetoes.insert(location.chunk(), ctx.now);
        debug!(
            kind = %attempt.kind(),
            %location,
            roll,
            chance = ctx.config.throttle_chance,
            "cancelled spawn near low-health player"
        );
        ctx.activity.record(ActivityRecord::new(
            ActivityCategory::LowHealthDelay,
            format!(
                "Cancelled spawn of {} near low-health player at {location}",
                attempt.kind()
            ),
        ));
    }

    fn reload(&mut self, _config: &PolicyConfig, _world: &dyn WorldQuery) {
        self.last_vetoes.clear();
    }
}
