#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Admission gate enforcing a ceiling on hostile entities across every
//! loaded world.

use mob_limiter_core::{
    ActivityCategory, ActivityRecord, Policy, PolicyConfig, PolicyContext, SpawnAttempt,
    WorldQuery,
};
use tracing::debug;

/// Stateless gate that vetoes hostile spawns once the world is full.
///
/// The population is recounted with a full scan on every qualifying attempt;
/// a cached count would let the hard ceiling drift.
#[derive(Debug, Default)]
pub struct GlobalLimit;

impl GlobalLimit {
    /// Creates the gate.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Counts hostile entities across every loaded world.
    #[must_use]
    pub fn population(world: &dyn WorldQuery) -> usize {
        world
            .entities()
            .iter()
            .filter(|snapshot| snapshot.kind.is_tracked())
            .count()
    }

    /// Reports whether the provided population saturates the ceiling.
    #[must_use]
    pub fn is_saturated(config: &PolicyConfig, population: usize) -> bool {
        u64::try_from(population).unwrap_or(u64::MAX) >= u64::from(config.global_ceiling)
    }
}

impl Policy for GlobalLimit {
    fn name(&self) -> &'static str {
        "global-limit"
    }

    fn evaluate_spawn(&mut self, attempt: &mut SpawnAttempt, ctx: &mut PolicyContext<'_>) {
        if !ctx.config.global_limit_enabled || !attempt.is_gated() {
            return;
        }

        let population = Self::population(ctx.world);
        if !Self::is_saturated(ctx.config, population) {
            return;
        }

        attempt.cancel();
        debug!(
            kind = %attempt.kind(),
            population,
            ceiling = ctx.config.global_ceiling,
            "cancelled spawn: global limit reached"
        );
        ctx.activity.record(ActivityRecord::new(
            ActivityCategory::GlobalLimit,
            format!(
                "Cancelled spawn of {} at {}: Global limit ({}) reached.",
                attempt.kind(),
                attempt.location(),
                ctx.config.global_ceiling
            ),
        ));
    }
}
