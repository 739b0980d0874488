//! The runtime model tree: resolved entities, lifecycle, and observers.
//!
//! A [`Model`] is the live counterpart of a [`Structure`](crate::Structure):
//! a hierarchy of anchors, entities, and owned child models. It moves through
//! a fixed lifecycle (unbuilt, set up, stepping, torn down), notifies
//! attached [`Observer`]s at each transition, and exposes a visitor hook for
//! external sensing and rendering.

use crate::engine::{BodyDesc, BodyHandle, PhysicsEngine, SpringDesc, Surface};
use crate::entity::{AnchorId, Cable, Entity, PointMass, Rod, ShapePrimitive};
use crate::error::{Error, Result};
use crate::world::World;
use glam::{Quat, Vec3};
use tracing::debug;

/// Lifecycle state of a model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ModelState {
    /// Resolved but not yet inserted into a world.
    #[default]
    Unbuilt,
    /// Engine entities exist; observers have been set up.
    SetUp,
    /// At least one step has been taken since setup.
    Stepping,
    /// Engine entities released. Setup may run again (the reset pathway).
    TornDown,
}

/// Runtime state of one resolved node: rest pose, current position, the mass
/// accumulated from incident entities, and the engine body backing it.
#[derive(Clone, Debug)]
pub struct Anchor {
    pub(crate) rest_position: Vec3,
    pub(crate) position: Vec3,
    pub(crate) mass: f32,
    pub(crate) radius: f32,
    pub(crate) surface: Surface,
    pub(crate) body: Option<BodyHandle>,
}

impl Anchor {
    pub(crate) fn new(rest_position: Vec3) -> Self {
        Self {
            rest_position,
            position: rest_position,
            mass: 0.0,
            radius: 0.05,
            surface: Surface::default(),
            body: None,
        }
    }

    /// Position at resolution time.
    pub fn rest_position(&self) -> Vec3 {
        self.rest_position
    }

    /// Current position, refreshed after each engine step.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Accumulated mass. Zero means the anchor is static.
    pub fn mass(&self) -> f32 {
        self.mass
    }

    /// Contact surface, taken from the last resolved incident entity.
    pub fn surface(&self) -> Surface {
        self.surface
    }
}

/// Control logic subscribed to a model's lifecycle events.
///
/// Observers are notified in attachment order and must be attached before
/// the model is set up. They may mutate actuator targets during
/// [`on_step`](Observer::on_step); the engine integrates only after every
/// observer has run.
pub trait Observer {
    /// Called exactly once per setup, after the model's entities exist.
    fn on_setup(&mut self, _subject: &mut Model) {}

    /// Called once per time increment, before the engine integrates.
    fn on_step(&mut self, subject: &mut Model, dt: f32);

    /// Called once when the model is torn down.
    fn on_teardown(&mut self, _subject: &mut Model) {}
}

/// Read-only traversal hook over a model tree, for sensing and rendering
/// collaborators.
pub trait ModelVisitor {
    /// Visits a model before its entities and children.
    fn visit_model(&mut self, _model: &Model) {}

    /// Visits a rod entity.
    fn visit_rod(&mut self, _rod: &Rod) {}

    /// Visits a cable entity.
    fn visit_cable(&mut self, _cable: &Cable) {}

    /// Visits a point-mass entity.
    fn visit_mass(&mut self, _mass: &PointMass) {}
}

/// The resolved, live counterpart of a structure scope.
#[derive(Default)]
pub struct Model {
    anchor_offset: usize,
    anchors: Vec<Anchor>,
    entities: Vec<Entity>,
    children: Vec<Model>,
    observers: Vec<Box<dyn Observer>>,
    state: ModelState,
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("state", &self.state)
            .field("anchors", &self.anchors.len())
            .field("entities", &self.entities.len())
            .field("children", &self.children.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Model {
    /// Creates an empty model, useful as an aggregation root for composing
    /// independently resolved models.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(
        anchor_offset: usize,
        anchors: Vec<Anchor>,
        entities: Vec<Entity>,
        children: Vec<Model>,
    ) -> Self {
        Self {
            anchor_offset,
            anchors,
            entities,
            children,
            observers: Vec::new(),
            state: ModelState::Unbuilt,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ModelState {
        self.state
    }

    /// Entities resolved in this scope, in resolution order.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Owned child models, in resolution order.
    pub fn children(&self) -> &[Model] {
        &self.children
    }

    /// Anchors of this scope, in node order.
    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    /// Total number of entities across this model and all descendants.
    pub fn entity_count(&self) -> usize {
        self.entities.len() + self.children.iter().map(Model::entity_count).sum::<usize>()
    }

    /// Adopts a child model. Only allowed before setup.
    pub fn add_child(&mut self, child: Model) -> Result<()> {
        if self.state != ModelState::Unbuilt {
            return Err(Error::AlreadySetUp);
        }
        self.children.push(child);
        Ok(())
    }

    /// Attaches an observer, notified on every lifecycle event in attachment
    /// order. Attaching after setup is a precondition violation.
    pub fn attach(&mut self, observer: impl Observer + 'static) -> Result<()> {
        if self.state != ModelState::Unbuilt {
            return Err(Error::AttachAfterSetup);
        }
        self.observers.push(Box::new(observer));
        Ok(())
    }

    /// Builds this model into the world: engine bodies for anchors, engine
    /// constraints for entities, children recursively, then observer setup
    /// notification.
    ///
    /// Construction is top-down; observer notification is bottom-up, so by the
    /// time a parent's observers run, every descendant is fully live. Cached
    /// runtime state is re-initialized to the resolved rest pose, so setting
    /// up a torn-down model restores its original configuration.
    pub fn setup(&mut self, world: &mut World) -> Result<()> {
        match self.state {
            ModelState::Unbuilt | ModelState::TornDown => {}
            ModelState::SetUp | ModelState::Stepping => return Err(Error::AlreadySetUp),
        }
        self.build_into(world.engine_mut());
        for child in &mut self.children {
            child.setup(world)?;
        }
        self.state = ModelState::SetUp;
        self.notify(|observer, model| observer.on_setup(model));
        debug!(
            anchors = self.anchors.len(),
            entities = self.entities.len(),
            children = self.children.len(),
            "model set up"
        );
        Ok(())
    }

    fn build_into(&mut self, engine: &mut dyn PhysicsEngine) {
        let mut bodies = Vec::with_capacity(self.anchors.len());
        for anchor in &mut self.anchors {
            anchor.position = anchor.rest_position;
            let body = engine.create_body(BodyDesc {
                shape: ShapePrimitive::Sphere(anchor.radius),
                mass: anchor.mass,
                position: anchor.rest_position,
                orientation: Quat::IDENTITY,
                surface: anchor.surface,
            });
            anchor.body = Some(body);
            bodies.push(body);
        }

        let offset = self.anchor_offset;
        let anchors = &self.anchors;
        let rest = |id: AnchorId| anchors[id.index() - offset].rest_position;
        let body = |id: AnchorId| bodies[id.index() - offset];
        for entity in &mut self.entities {
            match entity {
                Entity::Rod(rod) => {
                    let ends = rod.ends();
                    rod.refresh_endpoints([rest(ends[0]), rest(ends[1])]);
                    rod.link = Some(engine.create_link(body(ends[0]), body(ends[1]), rod.rest_length()));
                }
                Entity::Cable(cable) => {
                    let ends = cable.ends();
                    cable.reset_runtime_state();
                    cable.refresh(
                        [rest(ends[0]), rest(ends[1])],
                        cable.rest_length(),
                        0.0,
                    );
                    cable.spring = Some(engine.create_spring(
                        body(ends[0]),
                        body(ends[1]),
                        SpringDesc {
                            rest_length: cable.rest_length(),
                            stiffness: cable.config().stiffness,
                            damping: cable.config().damping,
                            max_tension: cable.config().max_tension,
                        },
                    ));
                }
                Entity::Mass(mass) => {
                    mass.refresh_position(rest(mass.anchor()));
                }
            }
        }
    }

    /// Advances the model tree by one time increment, notifying observers in
    /// attachment order before recursing into children.
    ///
    /// Fails with [`Error::InvalidTimeStep`] for `dt <= 0` without notifying
    /// anyone or changing any state; the model may be stepped again with a
    /// valid increment.
    pub fn step(&mut self, dt: f32) -> Result<()> {
        if dt <= 0.0 {
            return Err(Error::InvalidTimeStep { dt });
        }
        match self.state {
            ModelState::SetUp | ModelState::Stepping => {}
            ModelState::Unbuilt | ModelState::TornDown => return Err(Error::NotSetUp),
        }
        self.state = ModelState::Stepping;
        self.notify(|observer, model| observer.on_step(model, dt));
        for child in &mut self.children {
            child.step(dt)?;
        }
        Ok(())
    }

    /// Tears the model down: observer teardown notification, children, then
    /// release of all engine handles. A second call is a no-op, as is tearing
    /// down a model that was never set up.
    pub fn teardown(&mut self, world: &mut World) -> Result<()> {
        match self.state {
            ModelState::SetUp | ModelState::Stepping => {}
            ModelState::Unbuilt | ModelState::TornDown => return Ok(()),
        }
        self.notify(|observer, model| observer.on_teardown(model));
        for child in &mut self.children {
            child.teardown(world)?;
        }
        let engine = world.engine_mut();
        for entity in &mut self.entities {
            match entity {
                Entity::Rod(rod) => {
                    if let Some(link) = rod.link.take() {
                        engine.remove_constraint(link);
                    }
                }
                Entity::Cable(cable) => {
                    if let Some(spring) = cable.spring.take() {
                        engine.remove_constraint(spring);
                    }
                }
                Entity::Mass(_) => {}
            }
        }
        for anchor in &mut self.anchors {
            if let Some(body) = anchor.body.take() {
                engine.remove_body(body);
            }
        }
        self.state = ModelState::TornDown;
        debug!("model torn down");
        Ok(())
    }

    /// Passes `visitor` over this model, its entities, and all descendants.
    pub fn accept(&self, visitor: &mut dyn ModelVisitor) {
        visitor.visit_model(self);
        for entity in &self.entities {
            match entity {
                Entity::Rod(rod) => visitor.visit_rod(rod),
                Entity::Cable(cable) => visitor.visit_cable(cable),
                Entity::Mass(mass) => visitor.visit_mass(mass),
            }
        }
        for child in &self.children {
            child.accept(visitor);
        }
    }

    /// Flushes pending cable rest-length targets to the engine. Driven by the
    /// stepper after observer notification, before integration.
    pub fn apply_targets(&mut self, engine: &mut dyn PhysicsEngine) {
        for entity in &mut self.entities {
            if let Entity::Cable(cable) = entity
                && let Some(target) = cable.take_target()
            {
                if let Some(spring) = cable.spring {
                    engine.set_rest_length(spring, target);
                }
                cable.commit_rest_length(target);
            }
        }
        for child in &mut self.children {
            child.apply_targets(engine);
        }
    }

    /// Pulls current positions, lengths, and tensions back from the engine
    /// into the cached entity state. Driven by the stepper after integration.
    pub fn refresh(&mut self, engine: &dyn PhysicsEngine) {
        for anchor in &mut self.anchors {
            if let Some(body) = anchor.body {
                anchor.position = engine.body_transform(body).0;
            }
        }
        let offset = self.anchor_offset;
        let anchors = &self.anchors;
        let position = |id: AnchorId| anchors[id.index() - offset].position;
        for entity in &mut self.entities {
            match entity {
                Entity::Rod(rod) => {
                    let ends = rod.ends();
                    rod.refresh_endpoints([position(ends[0]), position(ends[1])]);
                }
                Entity::Cable(cable) => {
                    let ends = cable.ends();
                    let endpoints = [position(ends[0]), position(ends[1])];
                    if let Some(spring) = cable.spring {
                        let state = engine.spring_state(spring);
                        cable.refresh(endpoints, state.rest_length, state.tension);
                    } else {
                        let rest = cable.rest_length();
                        cable.refresh(endpoints, rest, 0.0);
                    }
                }
                Entity::Mass(mass) => {
                    mass.refresh_position(position(mass.anchor()));
                }
            }
        }
        for child in &mut self.children {
            child.refresh(engine);
        }
    }

    /// All cables in this model and its descendants, in resolution order.
    pub fn cables(&self) -> Vec<&Cable> {
        let mut out = Vec::new();
        self.collect_cables(&mut out);
        out
    }

    /// Mutable access to all cables in this model and its descendants.
    pub fn cables_mut(&mut self) -> Vec<&mut Cable> {
        let mut out = Vec::new();
        self.collect_cables_mut(&mut out);
        out
    }

    /// All cables carrying `tag`.
    pub fn cables_tagged(&self, tag: &str) -> Vec<&Cable> {
        self.cables().into_iter().filter(|c| c.tags().contains(tag)).collect()
    }

    /// Mutable access to all cables carrying `tag`.
    pub fn cables_tagged_mut(&mut self, tag: &str) -> Vec<&mut Cable> {
        self.cables_mut()
            .into_iter()
            .filter(|c| c.tags().contains(tag))
            .collect()
    }

    /// All rods in this model and its descendants, in resolution order.
    pub fn rods(&self) -> Vec<&Rod> {
        let mut out = Vec::new();
        self.collect_rods(&mut out);
        out
    }

    /// All point masses in this model and its descendants.
    pub fn masses(&self) -> Vec<&PointMass> {
        let mut out = Vec::new();
        self.collect_masses(&mut out);
        out
    }

    fn collect_cables<'a>(&'a self, out: &mut Vec<&'a Cable>) {
        for entity in &self.entities {
            if let Entity::Cable(cable) = entity {
                out.push(cable);
            }
        }
        for child in &self.children {
            child.collect_cables(out);
        }
    }

    fn collect_cables_mut<'a>(&'a mut self, out: &mut Vec<&'a mut Cable>) {
        for entity in &mut self.entities {
            if let Entity::Cable(cable) = entity {
                out.push(cable);
            }
        }
        for child in &mut self.children {
            child.collect_cables_mut(out);
        }
    }

    fn collect_rods<'a>(&'a self, out: &mut Vec<&'a Rod>) {
        for entity in &self.entities {
            if let Entity::Rod(rod) = entity {
                out.push(rod);
            }
        }
        for child in &self.children {
            child.collect_rods(out);
        }
    }

    fn collect_masses<'a>(&'a self, out: &mut Vec<&'a PointMass>) {
        for entity in &self.entities {
            if let Entity::Mass(mass) = entity {
                out.push(mass);
            }
        }
        for child in &self.children {
            child.collect_masses(out);
        }
    }

    /// Notifies observers with a take-notify-restore pattern so they can
    /// borrow the model mutably. Observers attached during notification are
    /// not retained.
    fn notify(&mut self, mut event: impl FnMut(&mut dyn Observer, &mut Model)) {
        let mut observers = std::mem::take(&mut self.observers);
        for observer in &mut observers {
            event(observer.as_mut(), self);
        }
        self.observers = observers;
    }
}
