//! Tag-to-builder registry and the builders that resolve graph elements.
//!
//! A [`BuildSpec`] maps tag strings to builder capabilities. During
//! resolution each tagged element is handed to the builder registered for
//! the first of its tags that matches; the builder turns the element into
//! exactly one [`Entity`]. Builders are pure with respect to the graph: no
//! engine contact happens until the resolved model is set up.

use crate::entity::{AnchorId, Cable, CableConfig, Entity, MassConfig, PointMass, Rod, RodConfig};
use crate::error::{Error, Result};
use crate::structure::TagSet;
use glam::Vec3;
use std::collections::HashMap;
use std::fmt;

/// Resolution context for a tagged node.
#[derive(Clone, Copy, Debug)]
pub struct NodeContext<'a> {
    /// Global identity assigned to the node by the resolver.
    pub anchor: AnchorId,
    /// The node's position at resolution time.
    pub position: Vec3,
    /// The node's full tag set.
    pub tags: &'a TagSet,
}

/// Resolution context for a tagged pair. Endpoints are already resolved.
#[derive(Clone, Copy, Debug)]
pub struct PairContext<'a> {
    /// Global identities of the two endpoint anchors.
    pub ends: [AnchorId; 2],
    /// Endpoint positions at resolution time.
    pub positions: [Vec3; 2],
    /// The pair's full tag set.
    pub tags: &'a TagSet,
}

/// A capability that turns a tagged node into one entity.
pub trait NodeBuilder: fmt::Debug {
    /// Builds the entity for a matched node.
    fn build(&self, node: &NodeContext<'_>) -> Result<Entity>;
}

/// A capability that turns a tagged pair into one entity.
pub trait PairBuilder: fmt::Debug {
    /// Builds the entity for a matched pair.
    fn build(&self, pair: &PairContext<'_>) -> Result<Entity>;
}

/// The builder registry: one builder per tag, fixed before resolution.
///
/// A tag maps to exactly one builder of either kind; registering a second
/// builder for the same tag is rejected with [`Error::DuplicateTag`]. Lookup
/// is exact and case-sensitive. Registries are commonly incomplete relative
/// to any one structure; an unmatched tag is only an error when a pair has
/// no matching tag at all, and only at resolution time.
#[derive(Debug, Default)]
pub struct BuildSpec {
    node_builders: HashMap<String, Box<dyn NodeBuilder>>,
    pair_builders: HashMap<String, Box<dyn PairBuilder>>,
}

impl BuildSpec {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a node builder for `tag`.
    pub fn add_node_builder(&mut self, tag: &str, builder: impl NodeBuilder + 'static) -> Result<()> {
        self.claim(tag)?;
        self.node_builders.insert(tag.to_owned(), Box::new(builder));
        Ok(())
    }

    /// Registers a pair builder for `tag`.
    pub fn add_pair_builder(&mut self, tag: &str, builder: impl PairBuilder + 'static) -> Result<()> {
        self.claim(tag)?;
        self.pair_builders.insert(tag.to_owned(), Box::new(builder));
        Ok(())
    }

    fn claim(&self, tag: &str) -> Result<()> {
        if self.node_builders.contains_key(tag) || self.pair_builders.contains_key(tag) {
            return Err(Error::DuplicateTag {
                tag: tag.to_owned(),
            });
        }
        Ok(())
    }

    /// Finds the node builder for the first matching tag, if any.
    ///
    /// Tags registered to pair builders do not match a node.
    pub fn node_builder_for(&self, tags: &TagSet) -> Option<&dyn NodeBuilder> {
        tags.iter()
            .find_map(|tag| self.node_builders.get(tag))
            .map(Box::as_ref)
    }

    /// Finds the pair builder for the first matching tag, if any.
    ///
    /// Tags registered to node builders do not match a pair.
    pub fn pair_builder_for(&self, tags: &TagSet) -> Option<&dyn PairBuilder> {
        tags.iter()
            .find_map(|tag| self.pair_builders.get(tag))
            .map(Box::as_ref)
    }
}

/// Builds rigid rods from tagged pairs.
#[derive(Clone, Debug, Default)]
pub struct RodBuilder {
    config: RodConfig,
}

impl RodBuilder {
    /// Creates a rod builder with the given physical parameters.
    pub fn new(config: RodConfig) -> Self {
        Self { config }
    }
}

impl PairBuilder for RodBuilder {
    fn build(&self, pair: &PairContext<'_>) -> Result<Entity> {
        let rod = Rod::new(pair.ends, pair.positions, self.config, pair.tags.clone())?;
        Ok(Entity::Rod(rod))
    }
}

/// Builds tensioned cable actuators from tagged pairs.
#[derive(Clone, Debug, Default)]
pub struct CableBuilder {
    config: CableConfig,
}

impl CableBuilder {
    /// Creates a cable builder with the given physical parameters.
    pub fn new(config: CableConfig) -> Self {
        Self { config }
    }
}

impl PairBuilder for CableBuilder {
    fn build(&self, pair: &PairContext<'_>) -> Result<Entity> {
        let cable = Cable::new(pair.ends, pair.positions, self.config, pair.tags.clone())?;
        Ok(Entity::Cable(cable))
    }
}

/// Builds point masses (or static anchors, with zero mass) from tagged nodes.
#[derive(Clone, Debug, Default)]
pub struct MassBuilder {
    config: MassConfig,
}

impl MassBuilder {
    /// Creates a point-mass builder with the given physical parameters.
    pub fn new(config: MassConfig) -> Self {
        Self { config }
    }
}

impl NodeBuilder for MassBuilder {
    fn build(&self, node: &NodeContext<'_>) -> Result<Entity> {
        let mass = PointMass::new(node.anchor, node.position, self.config, node.tags.clone())?;
        Ok(Entity::Mass(mass))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut spec = BuildSpec::new();
        spec.add_pair_builder("rod", RodBuilder::default()).unwrap();
        let err = spec
            .add_pair_builder("rod", RodBuilder::default())
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateTag { tag } if tag == "rod"));
    }

    #[test]
    fn one_tag_cannot_span_builder_kinds() {
        let mut spec = BuildSpec::new();
        spec.add_node_builder("anchor", MassBuilder::default()).unwrap();
        let err = spec
            .add_pair_builder("anchor", CableBuilder::default())
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateTag { .. }));
    }

    #[test]
    fn lookup_is_kind_checked() {
        let mut spec = BuildSpec::new();
        spec.add_node_builder("marker", MassBuilder::default()).unwrap();
        let tags = TagSet::from("marker");
        assert!(spec.node_builder_for(&tags).is_some());
        assert!(spec.pair_builder_for(&tags).is_none());
    }
}
