//! The physics-engine boundary.
//!
//! The runtime never touches a solver directly; it only speaks this trait.
//! Models register bodies and constraints through it at setup, controllers'
//! rest-length targets are flushed through it, and cached entity state is
//! read back from it after each integration. The bundled
//! [`MassSpringEngine`](crate::spring::MassSpringEngine) implements it; any
//! external engine can be substituted via
//! [`World::with_engine`](crate::world::World::with_engine).

use crate::entity::ShapePrimitive;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Opaque handle to an engine-owned rigid body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BodyHandle(pub(crate) u32);

/// Opaque handle to an engine-owned constraint (link or spring).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConstraintHandle(pub(crate) u32);

/// Contact parameters of a body or ground surface.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Surface {
    /// Friction coefficient.
    pub friction: f32,
    /// Restitution coefficient.
    pub restitution: f32,
}

impl Default for Surface {
    fn default() -> Self {
        Self {
            friction: 0.5,
            restitution: 0.0,
        }
    }
}

/// Description of a rigid body to register with the engine.
#[derive(Clone, Copy, Debug)]
pub struct BodyDesc {
    /// Collision shape.
    pub shape: ShapePrimitive,
    /// Mass in kg. Zero makes the body static.
    pub mass: f32,
    /// Initial world position.
    pub position: Vec3,
    /// Initial world orientation.
    pub orientation: Quat,
    /// Contact parameters.
    pub surface: Surface,
}

/// Description of a tension-only spring constraint.
#[derive(Clone, Copy, Debug)]
pub struct SpringDesc {
    /// Rest length below which the spring exerts no force.
    pub rest_length: f32,
    /// Spring stiffness (force / length).
    pub stiffness: f32,
    /// Velocity damping along the spring axis.
    pub damping: f32,
    /// Upper bound on the exerted tension.
    pub max_tension: f32,
}

/// An infinite horizontal ground plane with +Y normal.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct GroundPlane {
    /// Height of the plane along Y.
    pub height: f32,
    /// Contact parameters of the ground.
    pub surface: Surface,
}

impl Default for GroundPlane {
    fn default() -> Self {
        Self {
            height: 0.0,
            surface: Surface {
                friction: 0.9,
                restitution: 0.0,
            },
        }
    }
}

/// Observable state of a spring constraint.
#[derive(Clone, Copy, Debug, Default)]
pub struct SpringState {
    /// Current distance between the attached bodies.
    pub length: f32,
    /// Rest length currently enforced.
    pub rest_length: f32,
    /// Tension force exerted during the most recent step.
    pub tension: f32,
}

/// The contract an underlying physics engine must satisfy.
///
/// Handles are only meaningful for the engine that issued them; passing a
/// handle from another engine instance, or one already removed, is a caller
/// bug and may panic.
pub trait PhysicsEngine {
    /// Sets the global gravity vector.
    fn set_gravity(&mut self, gravity: Vec3);

    /// Installs or removes the ground plane.
    fn set_ground(&mut self, ground: Option<GroundPlane>);

    /// Registers a rigid body and returns its handle.
    fn create_body(&mut self, desc: BodyDesc) -> BodyHandle;

    /// Registers a rigid distance constraint between two bodies.
    fn create_link(&mut self, a: BodyHandle, b: BodyHandle, length: f32) -> ConstraintHandle;

    /// Registers a tension-only spring between two bodies.
    fn create_spring(&mut self, a: BodyHandle, b: BodyHandle, desc: SpringDesc) -> ConstraintHandle;

    /// Updates the rest length of a spring constraint.
    fn set_rest_length(&mut self, constraint: ConstraintHandle, rest_length: f32);

    /// Removes a body. Constraints attached to it must be removed first.
    fn remove_body(&mut self, body: BodyHandle);

    /// Removes a constraint.
    fn remove_constraint(&mut self, constraint: ConstraintHandle);

    /// Current position and orientation of a body.
    fn body_transform(&self, body: BodyHandle) -> (Vec3, Quat);

    /// Current state of a spring constraint.
    fn spring_state(&self, constraint: ConstraintHandle) -> SpringState;

    /// Advances the simulation by `dt` seconds.
    fn step(&mut self, dt: f32);
}
