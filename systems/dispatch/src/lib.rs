#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Ordered pipeline that routes host events to every registered policy.
//!
//! Policies run in registration order. A veto from one gate does not stop
//! later policies from observing the attempt; cancellation is idempotent so
//! the first veto wins. Deaths are routed to every policy one at a time and
//! the commands queued for each death are applied before the next one.

use std::{fmt, time::Duration};

use mob_limiter_core::{
    ActivitySink, Command, DeathNotice, Event, Policy, PolicyConfig, PolicyContext, SpawnAttempt,
    WorldQuery,
};
use mob_limiter_system_category_limit::CategoryLimit;
use mob_limiter_system_death_cleanup::DeathCleanup;
use mob_limiter_system_global_limit::GlobalLimit;
use mob_limiter_system_proximity_throttle::ProximityThrottle;
use rand::RngCore;
use tracing::{debug, info};

/// Outcome of running a creation attempt through the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// No policy vetoed the attempt.
    Admitted,
    /// At least one policy, or the host beforehand, cancelled the attempt.
    Cancelled,
}

/// Dispatcher owning the active configuration, the policies and the shared
/// random source.
pub struct Pipeline<R> {
    config: PolicyConfig,
    policies: Vec<Box<dyn Policy>>,
    rng: R,
}

impl<R> fmt::Debug for Pipeline<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field(
                "policies",
                &self.policies.iter().map(|policy| policy.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl<R: RngCore> Pipeline<R> {
    /// Creates an empty pipeline.
    #[must_use]
    pub fn new(config: PolicyConfig, rng: R) -> Self {
        Self {
            config,
            policies: Vec::new(),
            rng,
        }
    }

    /// Creates a pipeline with the global gate, the per-category gate, the
    /// proximity throttle and the death cleanup registered in that order.
    #[must_use]
    pub fn standard(config: PolicyConfig, world: &dyn WorldQuery, rng: R) -> Self {
        let category = CategoryLimit::new(&config, world);
        let mut pipeline = Self::new(config, rng);
        pipeline.register(GlobalLimit::new());
        pipeline.register(category);
        pipeline.register(ProximityThrottle::new());
        pipeline.register(DeathCleanup::new());
        pipeline
    }

    /// Appends a policy to the end of the pipeline.
    pub fn register(&mut self, policy: impl Policy + 'static) {
        debug!(policy = policy.name(), position = self.policies.len(), "registered policy");
        self.policies.push(Box::new(policy));
    }

    /// Active configuration snapshot.
    #[must_use]
    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Names of the registered policies in evaluation order.
    #[must_use]
    pub fn policy_names(&self) -> Vec<&'static str> {
        self.policies.iter().map(|policy| policy.name()).collect()
    }

    /// Runs a creation attempt through every policy in order.
    pub fn evaluate_spawn(
        &mut self,
        attempt: &mut SpawnAttempt,
        world: &dyn WorldQuery,
        now: Duration,
        activity: &mut dyn ActivitySink,
    ) -> Verdict {
        let mut ctx = PolicyContext {
            config: &self.config,
            world,
            rng: &mut self.rng,
            activity,
            now,
        };
        for policy in &mut self.policies {
            policy.evaluate_spawn(attempt, &mut ctx);
        }

        if attempt.is_cancelled() {
            Verdict::Cancelled
        } else {
            Verdict::Admitted
        }
    }

    /// Routes one death to every policy, collecting the commands they queue.
    pub fn handle_death(
        &mut self,
        death: &DeathNotice,
        world: &dyn WorldQuery,
        now: Duration,
        activity: &mut dyn ActivitySink,
        out: &mut Vec<Command>,
    ) {
        let mut ctx = PolicyContext {
            config: &self.config,
            world,
            rng: &mut self.rng,
            activity,
            now,
        };
        for policy in &mut self.policies {
            policy.on_death(death, &mut ctx, out);
        }
    }

    /// Routes death events one at a time. The commands queued for a death are
    /// passed to `apply` before the next death is handled, so every death
    /// observes the removals of the ones before it. Other events are ignored.
    pub fn handle<W: WorldQuery>(
        &mut self,
        events: &[Event],
        world: &mut W,
        now: Duration,
        activity: &mut dyn ActivitySink,
        mut apply: impl FnMut(&mut W, Command),
    ) {
        let mut commands = Vec::new();
        for event in events {
            let Event::EntityDied {
                entity,
                kind,
                location,
            } = event
            else {
                continue;
            };
            let death = DeathNotice {
                entity: *entity,
                kind: *kind,
                location: *location,
            };
            self.handle_death(&death, &*world, now, activity, &mut commands);
            for command in commands.drain(..) {
                apply(world, command);
            }
        }
    }

    /// Swaps in a new configuration snapshot and lets every policy
    /// resynchronise its caches against the world.
    pub fn reload(&mut self, config: PolicyConfig, world: &dyn WorldQuery) {
        self.config = config;
        for policy in &mut self.policies {
            policy.reload(&self.config, world);
        }
        info!(policies = self.policies.len(), "reloaded configuration");
    }
}
