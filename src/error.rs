//! Error types for structure building, resolution, and simulation.

use crate::structure::TagSet;
use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while describing, resolving, or simulating a
/// structure.
#[derive(Debug, Error)]
pub enum Error {
    /// A pair references a node index outside its declaring scope.
    #[error("pair ({a}, {b}) references node {index}, but this scope only has {node_count} nodes")]
    InvalidIndex {
        /// First endpoint index as declared.
        a: usize,
        /// Second endpoint index as declared.
        b: usize,
        /// The out-of-range index.
        index: usize,
        /// Number of nodes declared in the scope.
        node_count: usize,
    },

    /// A pair was declared with an empty tag set.
    #[error("pair ({a}, {b}) needs at least one tag")]
    MissingTags {
        /// First endpoint index.
        a: usize,
        /// Second endpoint index.
        b: usize,
    },

    /// No registered builder matches any tag on a pair.
    #[error("no builder matches any tag on pair {index} (tags: \"{tags}\")")]
    UnresolvedTag {
        /// Index of the pair within its declaring scope.
        index: usize,
        /// The pair's full tag set.
        tags: TagSet,
    },

    /// A builder is already registered for this tag.
    #[error("a builder is already registered for tag \"{tag}\"")]
    DuplicateTag {
        /// The contested tag.
        tag: String,
    },

    /// A physical parameter violated its sign requirement.
    #[error("{field} must be positive, got {value}")]
    NonPositive {
        /// Name of the offending configuration field.
        field: &'static str,
        /// The rejected value.
        value: f32,
    },

    /// A non-positive time increment was passed to a step call.
    #[error("time step must be positive, got {dt}")]
    InvalidTimeStep {
        /// The rejected increment.
        dt: f32,
    },

    /// An observer was attached after the model was already set up.
    #[error("observers must be attached before setup")]
    AttachAfterSetup,

    /// Setup was invoked on a model that is already live.
    #[error("model is already set up")]
    AlreadySetUp,

    /// Step was invoked on a model that has not been set up.
    #[error("model must be set up before stepping")]
    NotSetUp,

    /// A controller was configured with a negative rest-length offset.
    #[error("rest-length offset must be non-negative, got {offset}: you tried to push a rope")]
    NegativeOffset {
        /// The rejected offset.
        offset: f32,
    },
}
