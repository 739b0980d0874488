//! Ready-made controllers built on the observer protocol.

use crate::error::{Error, Result};
use crate::model::{Model, Observer};

/// Shortens every cable's rest length by a fixed offset from its start
/// length.
///
/// The offset is applied once at setup and re-asserted every step, so the
/// shortening persists regardless of what the structure does. A
/// negative offset would ask the cables to push, which a rope cannot do.
#[derive(Clone, Copy, Debug)]
pub struct RestLengthController {
    offset: f32,
}

impl RestLengthController {
    /// Creates a controller that shortens each cable by `offset` length
    /// units.
    pub fn new(offset: f32) -> Result<Self> {
        if offset < 0.0 {
            return Err(Error::NegativeOffset { offset });
        }
        Ok(Self { offset })
    }

    fn apply(&self, subject: &mut Model) {
        for cable in subject.cables_mut() {
            let desired = cable.start_length() - self.offset;
            cable.set_rest_length(desired);
        }
    }
}

impl Observer for RestLengthController {
    fn on_setup(&mut self, subject: &mut Model) {
        self.apply(subject);
    }

    fn on_step(&mut self, subject: &mut Model, _dt: f32) {
        self.apply(subject);
    }
}

/// Modulates the rest length of tagged cables sinusoidally within a band
/// below their start length, producing a simple periodic gait.
///
/// The rest length sweeps between `start - 2 * amplitude` and `start`, so
/// the controller only ever shortens the cable relative to its resolved
/// geometry and never asks it to push.
#[derive(Clone, Debug)]
pub struct SineController {
    tag: String,
    amplitude: f32,
    angular_frequency: f32,
    time: f32,
}

impl SineController {
    /// Creates a controller acting on cables carrying `tag`, oscillating
    /// with the given `amplitude` (length units) and `frequency` (Hz).
    pub fn new(tag: &str, amplitude: f32, frequency: f32) -> Self {
        Self {
            tag: tag.to_owned(),
            amplitude,
            angular_frequency: std::f32::consts::TAU * frequency,
            time: 0.0,
        }
    }
}

impl Observer for SineController {
    fn on_step(&mut self, subject: &mut Model, dt: f32) {
        self.time += dt;
        let excursion = self.amplitude * (self.angular_frequency * self.time).sin();
        for cable in subject.cables_tagged_mut(&self.tag) {
            cable.set_rest_length(cable.start_length() - self.amplitude + excursion);
        }
    }

    fn on_teardown(&mut self, _subject: &mut Model) {
        self.time = 0.0;
    }
}
