//! Listener / entity / room sets the engine reads read-mostly each tick (§3,
//! component K). Mutated only by commands drained at the top of a tick;
//! never touched mid-tick once the pipeline pass starts.

use std::collections::HashMap;

use am_core::{EntityId, EnvironmentId, ListenerId};
use am_spatial::room::Room;
use am_spatial::{Orientation, Position3D};

/// The point of audition. `inverse_matrix` is recomputed whenever position
/// or orientation changes, not on every tick.
#[derive(Debug, Clone)]
pub struct Listener {
    pub id: ListenerId,
    pub location: Position3D,
    pub orientation: Orientation,
    pub velocity: Position3D,
    inverse_matrix: [[f32; 3]; 3],
}

impl Listener {
    pub fn new(id: ListenerId) -> Self {
        let orientation = Orientation::forward();
        Self {
            id,
            location: Position3D::origin(),
            orientation,
            velocity: Position3D::origin(),
            inverse_matrix: orientation.rotation_matrix(),
        }
    }

    pub fn set_location(&mut self, location: Position3D) {
        self.location = location;
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation;
        self.inverse_matrix = orientation.rotation_matrix();
    }

    /// Transform a world-space position into this listener's local frame
    /// (used by the ambisonic panner/rotator).
    pub fn world_to_local(&self, world_pos: Position3D) -> Position3D {
        self.orientation.world_to_listener(&world_pos)
    }

    pub fn inverse_matrix(&self) -> &[[f32; 3]; 3] {
        &self.inverse_matrix
    }
}

/// A game-world sound emitter.
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub location: Position3D,
    pub orientation: Orientation,
    pub velocity: Position3D,
    /// `[0, 1]`, driving `OnePoleFilter` coefficient curves for the
    /// obstruction/occlusion pipeline nodes.
    pub obstruction: f32,
    pub occlusion: f32,
    pub env_factors: HashMap<EnvironmentId, f32>,
}

impl Entity {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            location: Position3D::origin(),
            orientation: Orientation::forward(),
            velocity: Position3D::origin(),
            obstruction: 0.0,
            occlusion: 0.0,
            env_factors: HashMap::new(),
        }
    }

    pub fn distance_to(&self, listener: &Listener) -> f32 {
        let dx = self.location.x - listener.location.x;
        let dy = self.location.y - listener.location.y;
        let dz = self.location.z - listener.location.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// An environment asset: a `Room` plus an optional effect override that
/// takes precedence over the `Reverb` node when present (§9 decision).
#[derive(Debug, Clone)]
pub struct Environment {
    pub id: EnvironmentId,
    pub room: Room,
    pub effect_override: Option<am_core::EffectId>,
    dirty: bool,
}

impl Environment {
    pub fn new(id: EnvironmentId, room: Room) -> Self {
        Self { id, room, effect_override: None, dirty: true }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Consume the dirty flag; the caller (the pipeline's room simulator)
    /// recomputes reflection/reverb parameters exactly once per change,
    /// at a block boundary.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }
}

/// The read-mostly world state: listeners, entities, environments.
#[derive(Debug, Default)]
pub struct World {
    pub listeners: HashMap<ListenerId, Listener>,
    pub entities: HashMap<EntityId, Entity>,
    pub environments: HashMap<EnvironmentId, Environment>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listener_mut(&mut self, id: ListenerId) -> &mut Listener {
        self.listeners.entry(id).or_insert_with(|| Listener::new(id))
    }

    pub fn entity_mut(&mut self, id: EntityId) -> &mut Entity {
        self.entities.entry(id).or_insert_with(|| Entity::new(id))
    }

    /// The default/primary listener, if any exists. Multi-listener mixdown
    /// is a caller-level concern (render once per listener); the core
    /// itself is agnostic to how many there are.
    pub fn primary_listener(&self) -> Option<&Listener> {
        self.listeners.values().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_distance_is_euclidean() {
        let mut world = World::new();
        let listener = world.listener_mut(ListenerId::new(1)).clone();
        let entity = world.entity_mut(EntityId::new(1));
        entity.location = Position3D::new(3.0, 4.0, 0.0);
        assert!((entity.distance_to(&listener) - 5.0).abs() < 1e-5);
    }

    #[test]
    fn environment_dirty_flag_consumes_once() {
        let mut env = Environment::new(EnvironmentId::new(1), Room::default());
        assert!(env.take_dirty());
        assert!(!env.take_dirty());
        env.mark_dirty();
        assert!(env.take_dirty());
    }
}
