// tests/simulation.rs
use approx::assert_relative_eq;
use glam::Vec3;
use std::cell::RefCell;
use std::rc::Rc;
use tensegrity_robot::{
    BuildSpec, Cable, CableBuilder, CableConfig, Error, MassBuilder, MassConfig, Model,
    ModelVisitor, Observer, RestLengthController, Rod, RodBuilder, RodConfig, Simulation,
    SineController, Structure, World, WorldConfig, resolve,
};

fn ball_model(height: f32) -> Model {
    let mut s = Structure::new();
    s.add_node_tagged(0.0, height, 0.0, "ball");
    let mut build = BuildSpec::new();
    build
        .add_node_builder(
            "ball",
            MassBuilder::new(MassConfig {
                mass: 1.0,
                radius: 0.5,
                friction: 0.5,
                restitution: 0.0,
            }),
        )
        .unwrap();
    resolve(&s, &build).unwrap()
}

#[test]
fn rejects_a_non_positive_increment() {
    let world = World::new(WorldConfig::default());
    assert!(matches!(
        Simulation::new(world, 0.0),
        Err(Error::InvalidTimeStep { .. })
    ));
}

#[test]
fn a_free_body_falls_then_settles_on_the_ground() {
    let world = World::new(WorldConfig::default());
    let mut sim = Simulation::new(world, 0.01).unwrap();
    sim.add_model(ball_model(2.0)).unwrap();

    let height = |sim: &Simulation| sim.models()[0].masses()[0].position().y;
    let floor = 0.5; // ground at 0, ball radius 0.5

    let mut previous = height(&sim);
    let mut landed = false;
    for _ in 0..100 {
        sim.run(1).unwrap();
        let current = height(&sim);
        if landed {
            assert_relative_eq!(current, floor, epsilon = 1e-3);
        } else if current <= floor + 1e-3 {
            landed = true;
        } else {
            assert!(
                current < previous,
                "height should strictly decrease while falling ({current} vs {previous})"
            );
        }
        previous = current;
    }
    assert!(landed, "ball never reached the ground");
    assert_relative_eq!(height(&sim), floor, epsilon = 1e-3);
}

#[test]
fn a_rest_length_controller_winches_a_hanging_mass_up() {
    // A payload hangs from a static anchor by a single cable; the controller
    // shortens the cable by one length unit.
    let mut s = Structure::new();
    s.add_node(0.0, 0.0, 0.0); // bare node: static anchor
    s.add_node_tagged(0.0, -2.0, 0.0, "payload");
    s.add_pair(0, 1, "muscle").unwrap();

    let mut build = BuildSpec::new();
    build
        .add_node_builder(
            "payload",
            MassBuilder::new(MassConfig {
                mass: 1.0,
                radius: 0.1,
                friction: 0.5,
                restitution: 0.0,
            }),
        )
        .unwrap();
    build
        .add_pair_builder(
            "muscle",
            CableBuilder::new(CableConfig {
                stiffness: 500.0,
                damping: 20.0,
                pretension: 0.0,
                max_tension: 10_000.0,
            }),
        )
        .unwrap();

    let mut model = resolve(&s, &build).unwrap();
    model.attach(RestLengthController::new(1.0).unwrap()).unwrap();

    let world = World::new(WorldConfig {
        gravity: Vec3::new(0.0, -9.81, 0.0),
        ground: None,
    });
    let mut sim = Simulation::new(world, 0.005).unwrap();
    sim.add_model(model).unwrap();
    sim.run(2000).unwrap();

    let cable = &sim.models()[0].cables()[0];
    assert_relative_eq!(cable.rest_length(), 1.0, epsilon = 1e-5);
    // Equilibrium: tension balances gravity, k (l - rest) = m g.
    let expected = 1.0 + 9.81 / 500.0;
    assert_relative_eq!(cable.current_length(), expected, epsilon = 0.2);
    assert!(cable.tension() > 0.0);
    // The payload was winched upward from its drop point.
    let payload = sim.models()[0].masses()[0].position();
    assert!(payload.y > -1.5);
}

#[test]
fn a_dropped_rod_lands_without_changing_length() {
    let mut s = Structure::new();
    s.add_node(0.0, 3.0, 0.0);
    s.add_node(2.0, 3.0, 0.0);
    s.add_pair(0, 1, "rod").unwrap();
    let mut build = BuildSpec::new();
    build
        .add_pair_builder("rod", RodBuilder::new(RodConfig::default()))
        .unwrap();

    let world = World::new(WorldConfig::default());
    let mut sim = Simulation::new(world, 0.005).unwrap();
    sim.add_model(resolve(&s, &build).unwrap()).unwrap();
    sim.run(1000).unwrap();

    let rod = &sim.models()[0].rods()[0];
    assert_relative_eq!(rod.length(), 2.0, epsilon = 0.05);
    for endpoint in rod.endpoints() {
        // Resting on the ground: anchor radius above the plane.
        assert_relative_eq!(endpoint.y, 0.1, epsilon = 0.02);
    }
}

#[test]
fn a_sine_controller_modulates_tagged_rest_lengths() {
    // Both endpoints are bare static anchors, so the cable geometry never
    // changes; only the actuated rest length does.
    let mut s = Structure::new();
    s.add_node(0.0, 1.0, 0.0);
    s.add_node(2.0, 1.0, 0.0);
    s.add_pair(0, 1, "muscle").unwrap();
    let mut build = BuildSpec::new();
    build
        .add_pair_builder("muscle", CableBuilder::new(CableConfig::default()))
        .unwrap();

    let mut model = resolve(&s, &build).unwrap();
    model.attach(SineController::new("muscle", 0.5, 1.0)).unwrap();

    let world = World::new(WorldConfig::default());
    let mut sim = Simulation::new(world, 0.01).unwrap();
    sim.add_model(model).unwrap();

    // A quarter period in: rest length peaks back at the start length.
    sim.run(25).unwrap();
    let cable = &sim.models()[0].cables()[0];
    assert_relative_eq!(cable.rest_length(), 2.0, epsilon = 1e-3);

    // Another quarter period: the full shortening is applied.
    sim.run(25).unwrap();
    let cable = &sim.models()[0].cables()[0];
    assert_relative_eq!(cable.rest_length(), 1.5, epsilon = 1e-3);
}

struct SetupCounter {
    count: Rc<RefCell<u32>>,
}

impl Observer for SetupCounter {
    fn on_setup(&mut self, _subject: &mut Model) {
        *self.count.borrow_mut() += 1;
    }

    fn on_step(&mut self, _subject: &mut Model, _dt: f32) {}
}

#[test]
fn reset_restores_the_initial_configuration() {
    let count = Rc::new(RefCell::new(0u32));
    let mut model = ball_model(2.0);
    model
        .attach(SetupCounter {
            count: Rc::clone(&count),
        })
        .unwrap();

    let world = World::new(WorldConfig::default());
    let mut sim = Simulation::new(world, 0.01).unwrap();
    sim.add_model(model).unwrap();
    assert_eq!(*count.borrow(), 1);

    sim.run(200).unwrap();
    let settled = sim.models()[0].masses()[0].position().y;
    assert_relative_eq!(settled, 0.5, epsilon = 1e-3);

    sim.reset().unwrap();
    assert_eq!(*count.borrow(), 2);
    let restored = sim.models()[0].masses()[0].position().y;
    assert_relative_eq!(restored, 2.0, epsilon = 1e-6);

    // The simulation runs again from the top.
    sim.run(1).unwrap();
    assert!(sim.models()[0].masses()[0].position().y < 2.0);
}

#[derive(Default)]
struct Census {
    rods: Vec<f32>,
    cables: Vec<f32>,
    models: usize,
}

impl ModelVisitor for Census {
    fn visit_model(&mut self, _model: &Model) {
        self.models += 1;
    }

    fn visit_rod(&mut self, rod: &Rod) {
        self.rods.push(rod.length());
    }

    fn visit_cable(&mut self, cable: &Cable) {
        self.cables.push(cable.current_length());
    }
}

#[test]
fn a_visitor_sees_every_entity_in_the_tree() {
    let mut s = Structure::new();
    s.add_node(0.0, 1.0, 0.0);
    s.add_node(0.0, 5.0, 0.0);
    s.add_pair(0, 1, "rod").unwrap();
    let mut limb = Structure::new();
    limb.add_node(1.0, 1.0, 0.0);
    limb.add_node(1.0, 3.0, 0.0);
    limb.add_pair(0, 1, "muscle").unwrap();
    s.add_child(limb);

    let mut build = BuildSpec::new();
    build
        .add_pair_builder("rod", RodBuilder::new(RodConfig::default()))
        .unwrap();
    build
        .add_pair_builder("muscle", CableBuilder::new(CableConfig::default()))
        .unwrap();

    let world = World::new(WorldConfig::default());
    let mut sim = Simulation::new(world, 0.01).unwrap();
    sim.add_model(resolve(&s, &build).unwrap()).unwrap();

    let mut census = Census::default();
    sim.accept(&mut census);
    assert_eq!(census.models, 2);
    assert_eq!(census.rods.len(), 1);
    assert_eq!(census.cables.len(), 1);
    assert_relative_eq!(census.rods[0], 4.0, epsilon = 1e-5);
    assert_relative_eq!(census.cables[0], 2.0, epsilon = 1e-5);
}
