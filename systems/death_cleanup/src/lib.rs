#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Reduces the hostile population around the site of a player death.

use mob_limiter_core::{
    ActivityCategory, ActivityRecord, Command, DeathNotice, EntityKind, EntitySnapshot, Policy,
    PolicyConfig, PolicyContext,
};
use rand::seq::SliceRandom;
use tracing::{debug, info};

/// Stateless policy that removes a random share of crowding hostiles after a
/// player dies.
#[derive(Debug, Default)]
pub struct DeathCleanup;

impl DeathCleanup {
    /// Creates the policy.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Whether `found` candidates are enough to trigger a cleanup.
    #[must_use]
    pub fn exceeds_threshold(config: &PolicyConfig, found: usize) -> bool {
        u64::try_from(found).unwrap_or(u64::MAX) > u64::from(config.cleanup_threshold)
    }

    /// Number of entities to remove out of `found` candidates.
    ///
    /// Returns zero unless `found` exceeds the threshold. Otherwise rounds
    /// `found * cleanup_fraction` up and never exceeds `found`.
    ///
    /// The product is taken in `f64` before rounding, so a product that lands
    /// just above an integer rounds up past it: `100 * 0.07` evaluates to
    /// `7.000000000000001` and yields 8.
    #[must_use]
    pub fn removal_quota(config: &PolicyConfig, found: usize) -> usize {
        if !Self::exceeds_threshold(config, found) {
            return 0;
        }

        let quota = (found as f64 * config.cleanup_fraction).ceil();
        if quota <= 0.0 {
            return 0;
        }
        (quota as usize).min(found)
    }
}

impl Policy for DeathCleanup {
    fn name(&self) -> &'static str {
        "death-cleanup"
    }

    fn on_death(
        &mut self,
        death: &DeathNotice,
        ctx: &mut PolicyContext<'_>,
        out: &mut Vec<Command>,
    ) {
        if !ctx.config.death_cleanup_enabled || death.kind != EntityKind::Player {
            return;
        }

        let mut candidates: Vec<EntitySnapshot> = ctx
            .world
            .entities_within(&death.location, ctx.config.cleanup_radius)
            .filtered(|snapshot| snapshot.kind.is_tracked())
            .into_vec();
        if !Self::exceeds_threshold(ctx.config, candidates.len()) {
            return;
        }
        let quota = Self::removal_quota(ctx.config, candidates.len());

        candidates.shuffle(&mut *ctx.rng);
        candidates.truncate(quota);
        out.reserve(candidates.len());
        for victim in &candidates {
            out.push(Command::RemoveEntity { entity: victim.id });
            debug!(
                kind = %victim.kind,
                location = %victim.location,
                death = %death.location,
                "removing hostile near player death"
            );
            ctx.activity.record(ActivityRecord::new(
                ActivityCategory::DeathCleanup,
                format!(
                    "Removed {} at {} due to player death at {}",
                    victim.kind, victim.location, death.location
                ),
            ));
        }

        info!(removed = quota, location = %death.location, "cleaned up hostiles near player death");
        ctx.activity.record(ActivityRecord::new(
            ActivityCategory::DeathCleanup,
            format!(
                "Removed {quota} hostile mobs near player death at {}",
                death.location
            ),
        ));
    }
}
