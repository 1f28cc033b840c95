#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative in-memory world used to host the mob limiter.
//!
//! The world owns every live entity and the simulation clock. It mutates
//! only through [`apply`], and exposes read access through the [`query`]
//! module and its [`WorldQuery`] implementation.

use std::time::Duration;

use mob_limiter_core::{
    Command, EntityId, EntityKind, EntitySnapshot, EntityView, Event, Location, SpawnCause,
    WorldQuery,
};

/// Represents the authoritative world state.
#[derive(Debug, Default)]
pub struct World {
    entities: Vec<Entity>,
    next_entity: u64,
    clock: Duration,
}

impl World {
    /// Creates an empty world with the clock at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entity_index(&self, entity: EntityId) -> Option<usize> {
        self.entities.iter().position(|candidate| candidate.id == entity)
    }

    fn allocate_id(&mut self) -> EntityId {
        let id = EntityId::new(self.next_entity);
        self.next_entity = self.next_entity.saturating_add(1);
        id
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::Tick { dt } => {
            world.clock = world.clock.saturating_add(dt);
            out_events.push(Event::TimeAdvanced { dt });
        }
        Command::SpawnEntity {
            kind,
            cause,
            location,
            health,
        } => {
            let id = world.allocate_id();
            world
                .entities
                .push(Entity::new(id, kind, cause, location, health.max(0.0)));
            out_events.push(Event::EntitySpawned {
                entity: id,
                kind,
                cause,
                location,
            });
        }
        Command::RemoveEntity { entity } => {
            let Some(index) = world.entity_index(entity) else {
                return;
            };
            let removed = world.entities.remove(index);
            out_events.push(Event::EntityRemoved {
                entity,
                kind: removed.kind,
                location: removed.location,
            });
        }
        Command::DamageEntity { entity, amount } => {
            let Some(index) = world.entity_index(entity) else {
                return;
            };
            let target = &mut world.entities[index];
            target.health = (target.health - amount.max(0.0)).max(0.0);
            if target.health > 0.0 {
                out_events.push(Event::EntityDamaged {
                    entity,
                    health: target.health,
                });
                return;
            }

            let dead = world.entities.remove(index);
            out_events.push(Event::EntityDied {
                entity,
                kind: dead.kind,
                location: dead.location,
            });
        }
        Command::MoveEntity { entity, location } => {
            let Some(index) = world.entity_index(entity) else {
                return;
            };
            let target = &mut world.entities[index];
            let from = target.location;
            target.location = location;
            out_events.push(Event::EntityMoved {
                entity,
                from,
                to: location,
            });
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::time::Duration;

    use super::World;
    use mob_limiter_core::{EntityId, EntitySnapshot, EntityView, Location, SpawnCause};

    /// Current value of the simulation clock.
    #[must_use]
    pub fn clock(world: &World) -> Duration {
        world.clock
    }

    /// Captures a read-only view of every live entity.
    #[must_use]
    pub fn entity_view(world: &World) -> EntityView {
        EntityView::from_snapshots(world.entities.iter().map(|entity| entity.snapshot()).collect())
    }

    /// Captures the entities inside the axis-aligned cube around `center`.
    #[must_use]
    pub fn entities_within(world: &World, center: &Location, radius: f64) -> EntityView {
        EntityView::from_snapshots(
            world
                .entities
                .iter()
                .filter(|entity| center.cube_contains(&entity.location, radius))
                .map(|entity| entity.snapshot())
                .collect(),
        )
    }

    /// Looks up a single live entity.
    #[must_use]
    pub fn entity(world: &World, id: EntityId) -> Option<EntitySnapshot> {
        world
            .entities
            .iter()
            .find(|entity| entity.id == id)
            .map(|entity| entity.snapshot())
    }

    /// Reason the provided live entity was created.
    #[must_use]
    pub fn spawn_cause(world: &World, id: EntityId) -> Option<SpawnCause> {
        world
            .entities
            .iter()
            .find(|entity| entity.id == id)
            .map(|entity| entity.cause)
    }

    /// Number of live hostile entities across every world.
    #[must_use]
    pub fn tracked_population(world: &World) -> usize {
        world
            .entities
            .iter()
            .filter(|entity| entity.kind.is_tracked())
            .count()
    }
}

impl WorldQuery for World {
    fn entities(&self) -> EntityView {
        query::entity_view(self)
    }

    fn entities_within(&self, center: &Location, radius: f64) -> EntityView {
        query::entities_within(self, center, radius)
    }
}

#[derive(Clone, Debug)]
struct Entity {
    id: EntityId,
    kind: EntityKind,
    cause: SpawnCause,
    location: Location,
    health: f64,
}

impl Entity {
    fn new(
        id: EntityId,
        kind: EntityKind,
        cause: SpawnCause,
        location: Location,
        health: f64,
    ) -> Self {
        Self {
            id,
            kind,
            cause,
            location,
            health,
        }
    }

    fn snapshot(&self) -> EntitySnapshot {
        EntitySnapshot {
            id: self.id,
            kind: self.kind,
            location: self.location,
            health: self.health,
        }
    }
}
