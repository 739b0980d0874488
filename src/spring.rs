//! Bundled reference implementation of the physics-engine boundary.
//!
//! [`MassSpringEngine`] integrates point bodies with semi-implicit Euler,
//! enforces rigid links by positional projection (velocities are rebuilt
//! from the projected positions), and models cables as tension-only
//! spring-dampers. It is deliberately small: deterministic, single-threaded,
//! sphere-only collision against the ground plane. It exists so a resolved
//! structure can be dropped, actuated, and observed without an external
//! solver; substitute a full engine through the same trait when fidelity
//! matters.

use crate::engine::{
    BodyDesc, BodyHandle, ConstraintHandle, GroundPlane, PhysicsEngine, SpringDesc, SpringState,
    Surface,
};
use glam::{Quat, Vec3};

#[derive(Clone, Debug)]
struct Body {
    position: Vec3,
    prev_position: Vec3,
    velocity: Vec3,
    force: Vec3,
    orientation: Quat,
    inv_mass: f32,
    radius: f32,
    surface: Surface,
}

#[derive(Clone, Copy, Debug)]
enum Constraint {
    Link {
        a: BodyHandle,
        b: BodyHandle,
        length: f32,
    },
    Spring {
        a: BodyHandle,
        b: BodyHandle,
        rest_length: f32,
        stiffness: f32,
        damping: f32,
        max_tension: f32,
        tension: f32,
    },
}

/// A minimal point-mass engine: spheres, rigid distance links, tension-only
/// springs, and an optional ground plane.
#[derive(Clone, Debug)]
pub struct MassSpringEngine {
    gravity: Vec3,
    ground: Option<GroundPlane>,
    bodies: Vec<Option<Body>>,
    constraints: Vec<Option<Constraint>>,
    iterations: usize,
}

impl Default for MassSpringEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MassSpringEngine {
    /// Creates an empty engine with no gravity and no ground.
    pub fn new() -> Self {
        Self {
            gravity: Vec3::ZERO,
            ground: None,
            bodies: Vec::new(),
            constraints: Vec::new(),
            iterations: 8,
        }
    }

    /// Number of link-projection iterations per step (default 8).
    pub fn set_iterations(&mut self, iterations: usize) {
        self.iterations = iterations.max(1);
    }

    fn body(&self, handle: BodyHandle) -> &Body {
        self.bodies[handle.0 as usize]
            .as_ref()
            .expect("stale or foreign body handle")
    }

    fn body_mut(&mut self, handle: BodyHandle) -> &mut Body {
        self.bodies[handle.0 as usize]
            .as_mut()
            .expect("stale or foreign body handle")
    }

    fn accumulate_spring_forces(&mut self) {
        for slot in 0..self.constraints.len() {
            let Some(Constraint::Spring {
                a,
                b,
                rest_length,
                stiffness,
                damping,
                max_tension,
                ..
            }) = self.constraints[slot]
            else {
                continue;
            };
            let (pa, va) = {
                let body = self.body(a);
                (body.position, body.velocity)
            };
            let (pb, vb) = {
                let body = self.body(b);
                (body.position, body.velocity)
            };
            let delta = pb - pa;
            let length = delta.length();
            let tension = if length > rest_length && length > f32::EPSILON {
                let direction = delta / length;
                let relative_speed = (vb - va).dot(direction);
                // A rope pulls or goes slack; it never pushes.
                (stiffness * (length - rest_length) + damping * relative_speed)
                    .clamp(0.0, max_tension)
            } else {
                0.0
            };
            if tension > 0.0 {
                let direction = delta / length;
                self.body_mut(a).force += direction * tension;
                self.body_mut(b).force -= direction * tension;
            }
            if let Some(Constraint::Spring { tension: cached, .. }) = &mut self.constraints[slot] {
                *cached = tension;
            }
        }
    }

    fn integrate(&mut self, dt: f32) {
        for slot in self.bodies.iter_mut().flatten() {
            slot.prev_position = slot.position;
            if slot.inv_mass > 0.0 {
                slot.velocity += (self.gravity + slot.force * slot.inv_mass) * dt;
                slot.position += slot.velocity * dt;
            }
            slot.force = Vec3::ZERO;
        }
    }

    fn project_links(&mut self) {
        for _ in 0..self.iterations {
            for slot in 0..self.constraints.len() {
                let Some(Constraint::Link { a, b, length }) = self.constraints[slot] else {
                    continue;
                };
                let (pa, wa) = {
                    let body = self.body(a);
                    (body.position, body.inv_mass)
                };
                let (pb, wb) = {
                    let body = self.body(b);
                    (body.position, body.inv_mass)
                };
                let total = wa + wb;
                if total <= 0.0 {
                    continue;
                }
                let delta = pb - pa;
                let current = delta.length();
                if current <= f32::EPSILON {
                    continue;
                }
                let correction = delta / current * (current - length);
                self.body_mut(a).position = pa + correction * (wa / total);
                self.body_mut(b).position = pb - correction * (wb / total);
            }
        }
    }

    fn rebuild_velocities(&mut self, dt: f32) {
        for slot in self.bodies.iter_mut().flatten() {
            if slot.inv_mass > 0.0 {
                slot.velocity = (slot.position - slot.prev_position) / dt;
            }
        }
    }

    fn collide_ground(&mut self) {
        let Some(ground) = self.ground else {
            return;
        };
        for slot in self.bodies.iter_mut().flatten() {
            if slot.inv_mass <= 0.0 {
                continue;
            }
            let floor = ground.height + slot.radius;
            if slot.position.y < floor {
                slot.position.y = floor;
                if slot.velocity.y < 0.0 {
                    let restitution = slot.surface.restitution * ground.surface.restitution;
                    slot.velocity.y = -slot.velocity.y * restitution;
                }
                let friction = (slot.surface.friction * ground.surface.friction).clamp(0.0, 1.0);
                slot.velocity.x *= 1.0 - friction;
                slot.velocity.z *= 1.0 - friction;
            }
        }
    }
}

impl PhysicsEngine for MassSpringEngine {
    fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    fn set_ground(&mut self, ground: Option<GroundPlane>) {
        self.ground = ground;
    }

    fn create_body(&mut self, desc: BodyDesc) -> BodyHandle {
        let handle = BodyHandle(self.bodies.len() as u32);
        self.bodies.push(Some(Body {
            position: desc.position,
            prev_position: desc.position,
            velocity: Vec3::ZERO,
            force: Vec3::ZERO,
            orientation: desc.orientation,
            inv_mass: if desc.mass > 0.0 { 1.0 / desc.mass } else { 0.0 },
            radius: desc.shape.bounding_radius(),
            surface: desc.surface,
        }));
        handle
    }

    fn create_link(&mut self, a: BodyHandle, b: BodyHandle, length: f32) -> ConstraintHandle {
        let handle = ConstraintHandle(self.constraints.len() as u32);
        self.constraints.push(Some(Constraint::Link { a, b, length }));
        handle
    }

    fn create_spring(&mut self, a: BodyHandle, b: BodyHandle, desc: SpringDesc) -> ConstraintHandle {
        let handle = ConstraintHandle(self.constraints.len() as u32);
        self.constraints.push(Some(Constraint::Spring {
            a,
            b,
            rest_length: desc.rest_length,
            stiffness: desc.stiffness,
            damping: desc.damping,
            max_tension: desc.max_tension,
            tension: 0.0,
        }));
        handle
    }

    fn set_rest_length(&mut self, constraint: ConstraintHandle, new_rest_length: f32) {
        match self.constraints[constraint.0 as usize].as_mut() {
            Some(Constraint::Spring { rest_length, .. }) => *rest_length = new_rest_length,
            _ => panic!("constraint handle does not refer to a live spring"),
        }
    }

    fn remove_body(&mut self, body: BodyHandle) {
        self.bodies[body.0 as usize] = None;
    }

    fn remove_constraint(&mut self, constraint: ConstraintHandle) {
        self.constraints[constraint.0 as usize] = None;
    }

    fn body_transform(&self, body: BodyHandle) -> (Vec3, Quat) {
        let body = self.body(body);
        (body.position, body.orientation)
    }

    fn spring_state(&self, constraint: ConstraintHandle) -> SpringState {
        match self.constraints[constraint.0 as usize].as_ref() {
            Some(Constraint::Spring {
                a,
                b,
                rest_length,
                tension,
                ..
            }) => SpringState {
                length: self.body(*a).position.distance(self.body(*b).position),
                rest_length: *rest_length,
                tension: *tension,
            },
            _ => panic!("constraint handle does not refer to a live spring"),
        }
    }

    fn step(&mut self, dt: f32) {
        self.accumulate_spring_forces();
        self.integrate(dt);
        self.project_links();
        self.rebuild_velocities(dt);
        self.collide_ground();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ShapePrimitive;
    use approx::assert_relative_eq;

    fn sphere(engine: &mut MassSpringEngine, position: Vec3, mass: f32) -> BodyHandle {
        engine.create_body(BodyDesc {
            shape: ShapePrimitive::Sphere(0.1),
            mass,
            position,
            orientation: Quat::IDENTITY,
            surface: Surface::default(),
        })
    }

    #[test]
    fn slack_spring_exerts_no_force() {
        let mut engine = MassSpringEngine::new();
        let a = sphere(&mut engine, Vec3::ZERO, 0.0);
        let b = sphere(&mut engine, Vec3::X, 1.0);
        let spring = engine.create_spring(
            a,
            b,
            SpringDesc {
                rest_length: 2.0,
                stiffness: 100.0,
                damping: 1.0,
                max_tension: 1000.0,
            },
        );
        engine.step(0.01);
        let state = engine.spring_state(spring);
        assert_eq!(state.tension, 0.0);
        assert_relative_eq!(engine.body_transform(b).0.x, 1.0);
    }

    #[test]
    fn taut_spring_pulls_toward_anchor() {
        let mut engine = MassSpringEngine::new();
        let a = sphere(&mut engine, Vec3::ZERO, 0.0);
        let b = sphere(&mut engine, Vec3::new(2.0, 0.0, 0.0), 1.0);
        let spring = engine.create_spring(
            a,
            b,
            SpringDesc {
                rest_length: 1.0,
                stiffness: 100.0,
                damping: 1.0,
                max_tension: 1000.0,
            },
        );
        for _ in 0..50 {
            engine.step(0.01);
        }
        let state = engine.spring_state(spring);
        assert!(state.length < 2.0);
        assert!(engine.spring_state(spring).length >= 0.0);
        assert!(state.tension >= 0.0);
    }

    #[test]
    fn tension_saturates_at_the_configured_cap() {
        let mut engine = MassSpringEngine::new();
        let a = sphere(&mut engine, Vec3::ZERO, 0.0);
        let b = sphere(&mut engine, Vec3::new(10.0, 0.0, 0.0), 1.0);
        // Raw spring force would be 1000 * 9 = 9000.
        let spring = engine.create_spring(
            a,
            b,
            SpringDesc {
                rest_length: 1.0,
                stiffness: 1000.0,
                damping: 0.0,
                max_tension: 50.0,
            },
        );
        engine.step(0.001);
        assert_eq!(engine.spring_state(spring).tension, 50.0);
    }

    #[test]
    fn link_holds_length_under_gravity() {
        let mut engine = MassSpringEngine::new();
        engine.set_gravity(Vec3::new(0.0, -9.81, 0.0));
        let a = sphere(&mut engine, Vec3::new(0.0, 10.0, 0.0), 1.0);
        let b = sphere(&mut engine, Vec3::new(3.0, 10.0, 0.0), 1.0);
        engine.create_link(a, b, 3.0);
        for _ in 0..100 {
            engine.step(0.005);
        }
        let pa = engine.body_transform(a).0;
        let pb = engine.body_transform(b).0;
        assert_relative_eq!(pa.distance(pb), 3.0, epsilon = 0.05);
    }

    #[test]
    fn static_body_never_moves() {
        let mut engine = MassSpringEngine::new();
        engine.set_gravity(Vec3::new(0.0, -9.81, 0.0));
        let pinned = sphere(&mut engine, Vec3::new(0.0, 5.0, 0.0), 0.0);
        for _ in 0..100 {
            engine.step(0.01);
        }
        assert_eq!(engine.body_transform(pinned).0, Vec3::new(0.0, 5.0, 0.0));
    }

    #[test]
    fn ground_stops_a_falling_body() {
        let mut engine = MassSpringEngine::new();
        engine.set_gravity(Vec3::new(0.0, -9.81, 0.0));
        engine.set_ground(Some(GroundPlane::default()));
        let body = engine.create_body(BodyDesc {
            shape: ShapePrimitive::Sphere(0.5),
            mass: 1.0,
            position: Vec3::new(0.0, 5.0, 0.0),
            orientation: Quat::IDENTITY,
            surface: Surface {
                friction: 0.5,
                restitution: 0.0,
            },
        });
        for _ in 0..500 {
            engine.step(0.01);
        }
        assert_relative_eq!(engine.body_transform(body).0.y, 0.5, epsilon = 1e-3);
    }
}
