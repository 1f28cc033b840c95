#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Admission gate enforcing per-kind ceilings from a cached census.
//!
//! The census is rebuilt from a full world scan on construction and on every
//! reload. Between rebuilds it only grows: every evaluation under the ceiling
//! adds one, even when an earlier gate already vetoed the attempt, and nothing
//! is subtracted when entities die, despawn or get removed. Ceilings therefore
//! tighten over time until the next reload.

use std::collections::BTreeMap;

use mob_limiter_core::{
    ActivityCategory, ActivityRecord, EntityKind, Policy, PolicyConfig, PolicyContext,
    SpawnAttempt, WorldQuery,
};
use tracing::{debug, info};

/// Gate that vetoes hostile spawns once their kind reaches its ceiling.
#[derive(Debug, Default)]
pub struct CategoryLimit {
    counts: BTreeMap<EntityKind, u32>,
}

impl CategoryLimit {
    /// Creates the gate and performs the initial census.
    #[must_use]
    pub fn new(config: &PolicyConfig, world: &dyn WorldQuery) -> Self {
        let mut gate = Self::default();
        gate.recount(config, world);
        gate
    }

    /// Discards the cache and recounts every tracked kind with a ceiling.
    pub fn recount(&mut self, config: &PolicyConfig, world: &dyn WorldQuery) {
        self.counts.clear();
        let limited: Vec<EntityKind> = config
            .category_ceilings
            .keys()
            .copied()
            .filter(|kind| kind.is_tracked())
            .collect();
        if limited.is_empty() {
            return;
        }

        for kind in &limited {
            let _ = self.counts.insert(*kind, 0);
        }
        for snapshot in world.entities().iter() {
            if let Some(count) = self.counts.get_mut(&snapshot.kind) {
                *count = count.saturating_add(1);
            }
        }
        debug!(counts = ?self.counts, "recounted limited kinds");
    }

    /// Cached count for the provided kind, if the kind is being tracked.
    #[must_use]
    pub fn cached_count(&self, kind: EntityKind) -> Option<u32> {
        self.counts.get(&kind).copied()
    }
}

impl Policy for CategoryLimit {
    fn name(&self) -> &'static str {
        "mob-limits"
    }

    fn evaluate_spawn(&mut self, attempt: &mut SpawnAttempt, ctx: &mut PolicyContext<'_>) {
        if !ctx.config.category_limits_enabled || !attempt.is_gated() {
            return;
        }

        let kind = attempt.kind();
        let Some(ceiling) = ctx.config.category_ceiling(kind) else {
            return;
        };

        let count = self.counts.entry(kind).or_insert(0);
        if *count >= ceiling {
            attempt.cancel();
            debug!(%kind, count = *count, ceiling, "cancelled spawn: kind limit reached");
            ctx.activity.record(ActivityRecord::new(
                ActivityCategory::CategoryLimit,
                format!(
                    "Cancelled spawn of {kind} at {}: Mob-specific limit ({ceiling}) reached.",
                    attempt.location()
                ),
            ));
            return;
        }

        *count += 1;
    }

    fn reload(&mut self, config: &PolicyConfig, world: &dyn WorldQuery) {
        self.recount(config, world);
        info!(limited = self.counts.len(), "mob limit census rebuilt");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mob_limiter_core::EntityView;

    struct Empty;

    impl WorldQuery for Empty {
        fn entities(&self) -> EntityView {
            EntityView::default()
        }

        fn entities_within(
            &self,
            _center: &mob_limiter_core::Location,
            _radius: f64,
        ) -> EntityView {
            EntityView::default()
        }
    }

    #[test]
    fn recount_ignores_passive_ceilings() {
        let mut config = PolicyConfig::default();
        let _ = config.category_ceilings.insert(EntityKind::Cow, 3);
        let _ = config.category_ceilings.insert(EntityKind::Zombie, 3);

        let gate = CategoryLimit::new(&config, &Empty);

        assert_eq!(gate.cached_count(EntityKind::Zombie), Some(0));
        assert_eq!(gate.cached_count(EntityKind::Cow), None);
    }

    #[test]
    fn kinds_without_ceiling_are_not_cached() {
        let gate = CategoryLimit::new(&PolicyConfig::default(), &Empty);
        assert_eq!(gate.cached_count(EntityKind::Zombie), None);
    }
}
