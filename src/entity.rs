//! Resolved physics entities: rods, cables, and point masses.
//!
//! Entities are the engine-agnostic runtime counterparts of tagged graph
//! elements. They are created by builders during resolution, acquire engine
//! handles when their owning model is set up, and cache engine state
//! (positions, lengths, tension) so controllers and visitors can read it
//! without touching the engine.

use crate::engine::ConstraintHandle;
use crate::error::{Error, Result};
use crate::structure::TagSet;
use bevy_heavy::ComputeMassProperties3d as _;
use bevy_math::primitives::{Capsule3d, Cuboid, Cylinder, Sphere};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Global identity of a resolved node, assigned in flattened traversal order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnchorId(pub(crate) usize);

impl AnchorId {
    /// The flattened, resolver-assigned index.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Supported geometric primitives for physics bodies.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub enum ShapePrimitive {
    /// A box defined by half-extents (x, y, z).
    Box(Vec3),
    /// A cylinder defined by radius and height (aligned along Y axis).
    Cylinder {
        /// Cylinder radius.
        radius: f32,
        /// Cylinder height.
        height: f32,
    },
    /// A sphere defined by radius.
    Sphere(f32),
    /// A capsule defined by radius and cylinder-section height.
    Capsule {
        /// Capsule radius.
        radius: f32,
        /// Height of the cylindrical section.
        height: f32,
    },
}

impl ShapePrimitive {
    /// Mass in kg for the given density, computed via `bevy_heavy`.
    pub fn mass(self, density: f32) -> f32 {
        match self {
            Self::Box(half_extents) => Cuboid {
                half_size: half_extents,
            }
            .mass(density),
            Self::Cylinder { radius, height } => Cylinder::new(radius, height).mass(density),
            Self::Sphere(radius) => Sphere::new(radius).mass(density),
            Self::Capsule { radius, height } => Capsule3d::new(radius, height).mass(density),
        }
    }

    /// Radius of the bounding sphere centered on the shape's origin.
    pub fn bounding_radius(self) -> f32 {
        match self {
            Self::Box(half_extents) => half_extents.length(),
            Self::Cylinder { radius, height } => (radius * radius + height * height / 4.0).sqrt(),
            Self::Sphere(radius) => radius,
            Self::Capsule { radius, height } => radius + height / 2.0,
        }
    }
}

/// Physical parameters of a rigid rod.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RodConfig {
    /// Rod radius (length units).
    pub radius: f32,
    /// Density (mass / length^3). Zero yields a massless rod.
    pub density: f32,
    /// Surface friction coefficient.
    pub friction: f32,
    /// Surface restitution coefficient.
    pub restitution: f32,
}

impl Default for RodConfig {
    fn default() -> Self {
        Self {
            radius: 0.1,
            density: 100.0,
            friction: 1.0,
            restitution: 0.2,
        }
    }
}

/// Physical parameters of a tensioned cable actuator.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CableConfig {
    /// Spring stiffness (force / length).
    pub stiffness: f32,
    /// Velocity damping along the cable axis.
    pub damping: f32,
    /// Initial tension force. The starting rest length is derived as
    /// `start_length - pretension / stiffness`, clamped at zero.
    pub pretension: f32,
    /// Upper bound on the tension the cable may exert.
    pub max_tension: f32,
}

impl Default for CableConfig {
    fn default() -> Self {
        Self {
            stiffness: 1000.0,
            damping: 10.0,
            pretension: 0.0,
            max_tension: 100_000.0,
        }
    }
}

/// Physical parameters of a point mass placed at a node.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct MassConfig {
    /// Mass in kg. Zero pins the node in place (static anchor).
    pub mass: f32,
    /// Collision radius.
    pub radius: f32,
    /// Surface friction coefficient.
    pub friction: f32,
    /// Surface restitution coefficient.
    pub restitution: f32,
}

impl Default for MassConfig {
    fn default() -> Self {
        Self {
            mass: 1.0,
            radius: 0.1,
            friction: 1.0,
            restitution: 0.2,
        }
    }
}

/// A rigid link spanning two anchors, keeping them at a fixed distance.
///
/// The rod's mass is derived from a capsule of its radius and rest length and
/// split evenly between its endpoint anchors.
#[derive(Clone, Debug)]
pub struct Rod {
    ends: [AnchorId; 2],
    endpoints: [Vec3; 2],
    rest_length: f32,
    config: RodConfig,
    tags: TagSet,
    pub(crate) link: Option<ConstraintHandle>,
}

impl Rod {
    /// Creates a rod between two resolved endpoints, validating its
    /// configuration.
    pub fn new(ends: [AnchorId; 2], endpoints: [Vec3; 2], config: RodConfig, tags: TagSet) -> Result<Self> {
        if config.radius <= 0.0 {
            return Err(Error::NonPositive {
                field: "rod radius",
                value: config.radius,
            });
        }
        if config.density < 0.0 {
            return Err(Error::NonPositive {
                field: "rod density",
                value: config.density,
            });
        }
        let rest_length = endpoints[0].distance(endpoints[1]);
        if rest_length <= f32::EPSILON {
            return Err(Error::NonPositive {
                field: "rod length",
                value: rest_length,
            });
        }
        Ok(Self {
            ends,
            endpoints,
            rest_length,
            config,
            tags,
            link: None,
        })
    }

    /// Endpoint anchor identities.
    pub fn ends(&self) -> [AnchorId; 2] {
        self.ends
    }

    /// Current endpoint positions, refreshed after each engine step.
    pub fn endpoints(&self) -> [Vec3; 2] {
        self.endpoints
    }

    /// The fixed length the link enforces.
    pub fn rest_length(&self) -> f32 {
        self.rest_length
    }

    /// Current distance between the endpoints.
    pub fn length(&self) -> f32 {
        self.endpoints[0].distance(self.endpoints[1])
    }

    /// Midpoint between the endpoints.
    pub fn center(&self) -> Vec3 {
        (self.endpoints[0] + self.endpoints[1]) / 2.0
    }

    /// Total rod mass, computed from a capsule of the rod's dimensions.
    pub fn mass(&self) -> f32 {
        ShapePrimitive::Capsule {
            radius: self.config.radius,
            height: self.rest_length,
        }
        .mass(self.config.density)
    }

    /// The rod's physical parameters.
    pub fn config(&self) -> &RodConfig {
        &self.config
    }

    /// Tags carried over from the source pair.
    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub(crate) fn refresh_endpoints(&mut self, endpoints: [Vec3; 2]) {
        self.endpoints = endpoints;
    }
}

/// A tension-only spring actuator spanning two anchors.
///
/// Controllers actuate a cable by setting a target rest length; the target is
/// flushed to the engine after observer notification and before the engine
/// integrates, so controllers never race the solver.
#[derive(Clone, Debug)]
pub struct Cable {
    ends: [AnchorId; 2],
    endpoints: [Vec3; 2],
    start_length: f32,
    initial_rest_length: f32,
    rest_length: f32,
    target_rest_length: Option<f32>,
    tension: f32,
    config: CableConfig,
    tags: TagSet,
    pub(crate) spring: Option<ConstraintHandle>,
}

impl Cable {
    /// Creates a cable between two resolved endpoints, validating its
    /// configuration and applying pretension to the starting rest length.
    pub fn new(ends: [AnchorId; 2], endpoints: [Vec3; 2], config: CableConfig, tags: TagSet) -> Result<Self> {
        if config.stiffness <= 0.0 {
            return Err(Error::NonPositive {
                field: "cable stiffness",
                value: config.stiffness,
            });
        }
        if config.damping < 0.0 {
            return Err(Error::NonPositive {
                field: "cable damping",
                value: config.damping,
            });
        }
        if config.pretension < 0.0 {
            return Err(Error::NonPositive {
                field: "cable pretension",
                value: config.pretension,
            });
        }
        if config.max_tension <= 0.0 {
            return Err(Error::NonPositive {
                field: "cable max tension",
                value: config.max_tension,
            });
        }
        let start_length = endpoints[0].distance(endpoints[1]);
        let initial_rest_length = (start_length - config.pretension / config.stiffness).max(0.0);
        Ok(Self {
            ends,
            endpoints,
            start_length,
            initial_rest_length,
            rest_length: initial_rest_length,
            target_rest_length: None,
            tension: 0.0,
            config,
            tags,
            spring: None,
        })
    }

    /// Endpoint anchor identities.
    pub fn ends(&self) -> [AnchorId; 2] {
        self.ends
    }

    /// Current endpoint positions, refreshed after each engine step.
    pub fn endpoints(&self) -> [Vec3; 2] {
        self.endpoints
    }

    /// The cable's length at resolution time, before any actuation.
    pub fn start_length(&self) -> f32 {
        self.start_length
    }

    /// The rest length currently enforced by the engine.
    pub fn rest_length(&self) -> f32 {
        self.rest_length
    }

    /// Requests a new rest length, clamped at zero.
    ///
    /// The request takes effect at the end of the current step, after all
    /// observers have run and before the engine integrates.
    pub fn set_rest_length(&mut self, rest_length: f32) {
        self.target_rest_length = Some(rest_length.max(0.0));
    }

    /// Current distance between the endpoints.
    pub fn current_length(&self) -> f32 {
        self.endpoints[0].distance(self.endpoints[1])
    }

    /// Tension force exerted during the most recent engine step.
    pub fn tension(&self) -> f32 {
        self.tension
    }

    /// The cable's physical parameters.
    pub fn config(&self) -> &CableConfig {
        &self.config
    }

    /// Tags carried over from the source pair.
    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub(crate) fn take_target(&mut self) -> Option<f32> {
        self.target_rest_length.take()
    }

    pub(crate) fn commit_rest_length(&mut self, rest_length: f32) {
        self.rest_length = rest_length;
    }

    pub(crate) fn reset_runtime_state(&mut self) {
        self.rest_length = self.initial_rest_length;
        self.target_rest_length = None;
        self.tension = 0.0;
    }

    pub(crate) fn refresh(&mut self, endpoints: [Vec3; 2], rest_length: f32, tension: f32) {
        self.endpoints = endpoints;
        self.rest_length = rest_length;
        self.tension = tension;
    }
}

/// A point mass (or static marker, when its mass is zero) at a single anchor.
#[derive(Clone, Debug)]
pub struct PointMass {
    anchor: AnchorId,
    position: Vec3,
    config: MassConfig,
    tags: TagSet,
}

impl PointMass {
    /// Creates a point mass at a resolved node, validating its configuration.
    pub fn new(anchor: AnchorId, position: Vec3, config: MassConfig, tags: TagSet) -> Result<Self> {
        if config.mass < 0.0 {
            return Err(Error::NonPositive {
                field: "point mass",
                value: config.mass,
            });
        }
        if config.radius <= 0.0 {
            return Err(Error::NonPositive {
                field: "point mass radius",
                value: config.radius,
            });
        }
        Ok(Self {
            anchor,
            position,
            config,
            tags,
        })
    }

    /// The anchor this mass is bound to.
    pub fn anchor(&self) -> AnchorId {
        self.anchor
    }

    /// Current position, refreshed after each engine step.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Configured mass in kg.
    pub fn mass(&self) -> f32 {
        self.config.mass
    }

    /// The point mass's physical parameters.
    pub fn config(&self) -> &MassConfig {
        &self.config
    }

    /// Tags carried over from the source node.
    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub(crate) fn refresh_position(&mut self, position: Vec3) {
        self.position = position;
    }
}

/// A resolved physics entity, one per matched graph element.
#[derive(Clone, Debug)]
pub enum Entity {
    /// A rigid link between two anchors.
    Rod(Rod),
    /// A tensioned spring actuator between two anchors.
    Cable(Cable),
    /// A point mass at a single anchor.
    Mass(PointMass),
}

impl Entity {
    /// Tags carried over from the source graph element.
    pub fn tags(&self) -> &TagSet {
        match self {
            Self::Rod(rod) => rod.tags(),
            Self::Cable(cable) => cable.tags(),
            Self::Mass(mass) => mass.tags(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ends() -> [AnchorId; 2] {
        [AnchorId(0), AnchorId(1)]
    }

    #[test]
    fn rod_mass_matches_capsule_volume() {
        let config = RodConfig {
            radius: 0.5,
            density: 2.0,
            ..RodConfig::default()
        };
        let rod = Rod::new(ends(), [Vec3::ZERO, Vec3::new(0.0, 10.0, 0.0)], config, TagSet::from("rod")).unwrap();
        let expected = ShapePrimitive::Capsule {
            radius: 0.5,
            height: 10.0,
        }
        .mass(2.0);
        assert_relative_eq!(rod.mass(), expected);
        assert!(rod.mass() > 0.0);
    }

    #[test]
    fn massless_rod_is_allowed() {
        let config = RodConfig {
            density: 0.0,
            ..RodConfig::default()
        };
        let rod = Rod::new(ends(), [Vec3::ZERO, Vec3::X], config, TagSet::from("bone")).unwrap();
        assert_eq!(rod.mass(), 0.0);
    }

    #[test]
    fn zero_length_rod_is_rejected() {
        let err = Rod::new(ends(), [Vec3::ONE, Vec3::ONE], RodConfig::default(), TagSet::from("rod")).unwrap_err();
        assert!(matches!(err, crate::Error::NonPositive { field: "rod length", .. }));
    }

    #[test]
    fn pretension_shortens_initial_rest_length() {
        let config = CableConfig {
            stiffness: 100.0,
            pretension: 50.0,
            ..CableConfig::default()
        };
        let cable = Cable::new(ends(), [Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)], config, TagSet::from("muscle")).unwrap();
        assert_relative_eq!(cable.start_length(), 2.0);
        assert_relative_eq!(cable.rest_length(), 1.5);
    }

    #[test]
    fn set_rest_length_clamps_at_zero() {
        let mut cable = Cable::new(
            ends(),
            [Vec3::ZERO, Vec3::X],
            CableConfig::default(),
            TagSet::from("muscle"),
        )
        .unwrap();
        cable.set_rest_length(-3.0);
        assert_eq!(cable.take_target(), Some(0.0));
    }
}
