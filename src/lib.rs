//! # tensegrity-robot
//!
//! A declarative toolkit for describing tensegrity robots (rigid rods
//! connected by tensioned cables) and compiling those descriptions into
//! live, steppable physics models.
//!
//! A [`Structure`] is the genotype: named 3D points, tagged connections, and
//! nested sub-assemblies, with eager affine transforms. A [`BuildSpec`] maps
//! tags to builders; [`resolve`] flattens the structure against it into a
//! [`Model`] tree of rods, cables, and point masses. The model is inserted
//! into a [`World`] and driven by a [`Simulation`] in fixed time increments,
//! while attached [`Observer`]s actuate cable rest lengths between
//! integration steps.
//!
//! ```no_run
//! use tensegrity_robot::*;
//!
//! let mut s = Structure::new();
//! s.add_node(0.0, 0.0, 0.0);
//! s.add_node(0.0, 10.0, 0.0);
//! s.add_pair(0, 1, "rod").unwrap();
//! s.translate(glam::Vec3::new(0.0, 5.0, 0.0));
//!
//! let mut build = BuildSpec::new();
//! build.add_pair_builder("rod", RodBuilder::default()).unwrap();
//!
//! let mut model = resolve(&s, &build).unwrap();
//! model.attach(RestLengthController::new(0.0).unwrap()).unwrap();
//!
//! let mut sim = Simulation::new(World::new(WorldConfig::default()), 0.001).unwrap();
//! sim.add_model(model).unwrap();
//! sim.run(1000).unwrap();
//! ```

pub mod builder;
pub mod control;
pub mod engine;
pub mod entity;
pub mod error;
pub mod model;
pub mod resolve;
pub mod spring;
pub mod structure;
pub mod world;

pub use builder::*;
pub use control::*;
pub use engine::*;
pub use entity::*;
pub use error::{Error, Result};
pub use model::*;
pub use resolve::resolve;
pub use spring::*;
pub use structure::*;
pub use world::*;
