//! World ownership and the fixed-increment stepper.
//!
//! A [`World`] owns exactly one physics-engine instance plus the global
//! parameters (gravity, ground). It is constructed explicitly and passed
//! explicitly; there is no ambient global state. A [`Simulation`] owns a
//! world and the models inserted into it and drives time forward in fixed
//! increments.

use crate::engine::{GroundPlane, PhysicsEngine};
use crate::error::{Error, Result};
use crate::model::{Model, ModelVisitor};
use crate::spring::MassSpringEngine;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Global simulation parameters.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Gravity vector applied to all dynamic bodies.
    pub gravity: Vec3,
    /// Optional ground plane.
    pub ground: Option<GroundPlane>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            ground: Some(GroundPlane::default()),
        }
    }
}

/// Exclusive owner of the physics-engine context for one simulation run.
pub struct World {
    config: WorldConfig,
    engine: Box<dyn PhysicsEngine>,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World").field("config", &self.config).finish_non_exhaustive()
    }
}

impl World {
    /// Creates a world backed by the bundled [`MassSpringEngine`].
    pub fn new(config: WorldConfig) -> Self {
        Self::with_engine(config, Box::new(MassSpringEngine::new()))
    }

    /// Creates a world backed by a supplied engine.
    pub fn with_engine(config: WorldConfig, mut engine: Box<dyn PhysicsEngine>) -> Self {
        engine.set_gravity(config.gravity);
        engine.set_ground(config.ground);
        Self { config, engine }
    }

    /// The world's global parameters.
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Read access to the engine.
    pub fn engine(&self) -> &dyn PhysicsEngine {
        self.engine.as_ref()
    }

    /// Mutable access to the engine.
    pub fn engine_mut(&mut self) -> &mut dyn PhysicsEngine {
        self.engine.as_mut()
    }
}

/// Drives a world and its models forward in fixed time increments.
///
/// Within one increment the order is strict: every model's observers run
/// (mutating actuator targets), targets are flushed to the engine, the
/// engine integrates, and cached entity state is refreshed. Controllers
/// never observe mid-integration state.
#[derive(Debug)]
pub struct Simulation {
    world: World,
    models: Vec<Model>,
    dt: f32,
}

impl Simulation {
    /// Creates a stepper over `world` with a fixed time increment.
    pub fn new(world: World, dt: f32) -> Result<Self> {
        if dt <= 0.0 {
            return Err(Error::InvalidTimeStep { dt });
        }
        Ok(Self {
            world,
            models: Vec::new(),
            dt,
        })
    }

    /// The fixed time increment in seconds.
    pub fn dt(&self) -> f32 {
        self.dt
    }

    /// The owned world.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable access to the owned world.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Models inserted so far, in insertion order.
    pub fn models(&self) -> &[Model] {
        &self.models
    }

    /// Mutable access to the inserted models.
    pub fn models_mut(&mut self) -> &mut [Model] {
        &mut self.models
    }

    /// Inserts a model into the simulation and sets it up.
    pub fn add_model(&mut self, mut model: Model) -> Result<()> {
        model.setup(&mut self.world)?;
        debug!(entities = model.entity_count(), "model added to simulation");
        self.models.push(model);
        Ok(())
    }

    /// Advances the simulation by `steps` fixed increments.
    pub fn run(&mut self, steps: u32) -> Result<()> {
        info!(steps, dt = self.dt, "running simulation");
        for _ in 0..steps {
            for model in &mut self.models {
                model.step(self.dt)?;
                model.apply_targets(self.world.engine_mut());
            }
            self.world.engine_mut().step(self.dt);
            for model in &mut self.models {
                model.refresh(self.world.engine());
            }
        }
        Ok(())
    }

    /// Passes a visitor over every inserted model tree.
    pub fn accept(&self, visitor: &mut dyn ModelVisitor) {
        for model in &self.models {
            model.accept(visitor);
        }
    }

    /// Tears down every model. Safe to call more than once.
    pub fn teardown(&mut self) -> Result<()> {
        for model in &mut self.models {
            model.teardown(&mut self.world)?;
        }
        Ok(())
    }

    /// Tears every model down fully, then sets each one up again from its
    /// resolved rest pose.
    ///
    /// Resolution is pure and deterministic, so re-setup is equivalent to
    /// re-resolving the original structures: positions, rest lengths, and
    /// tensions all return to their initial values, and observers receive a
    /// fresh setup notification. Partial or incremental reset is not
    /// supported.
    pub fn reset(&mut self) -> Result<()> {
        info!("resetting simulation");
        for model in &mut self.models {
            model.teardown(&mut self.world)?;
        }
        for model in &mut self.models {
            model.setup(&mut self.world)?;
        }
        Ok(())
    }
}
