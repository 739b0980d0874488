//! Declarative geometric graph: nodes, tagged pairs, and nested sub-structures.
//!
//! A [`Structure`] is the pre-resolution description of a tensegrity
//! assembly. It knows nothing about physics; it is a tree of named 3D points
//! and tagged connections that a build specification later turns into live
//! entities. Affine transforms apply eagerly, at call time, to everything the
//! structure currently owns.

use crate::error::{Error, Result};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An ordered, deduplicated set of free-form string tags.
///
/// Tags select which builder resolves an element and allow categorical
/// lookup of resolved entities. A tag spec string is split on whitespace, so
/// `"olecranon muscle"` carries two tags. Insertion order is significant:
/// when several tags on one element match registered builders, the first
/// matching tag wins.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSet(Vec<String>);

impl TagSet {
    /// Creates an empty tag set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tag unless it is already present.
    pub fn insert(&mut self, tag: &str) {
        if !tag.is_empty() && !self.contains(tag) {
            self.0.push(tag.to_owned());
        }
    }

    /// Whether `tag` is present (exact, case-sensitive match).
    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    /// Iterates over tags in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of distinct tags.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set holds no tags.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for TagSet {
    fn from(spec: &str) -> Self {
        let mut tags = TagSet::new();
        for tag in spec.split_whitespace() {
            tags.insert(tag);
        }
        tags
    }
}

impl From<String> for TagSet {
    fn from(spec: String) -> Self {
        TagSet::from(spec.as_str())
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, tag) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(tag)?;
        }
        Ok(())
    }
}

/// A declared 3D point, local to its owning structure scope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
    /// Current position, after any transforms applied so far.
    pub position: Vec3,

    /// Tags selecting an optional node builder. Untagged nodes resolve to
    /// bare anchors.
    pub tags: TagSet,
}

/// A tagged connection between two nodes of the same scope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pair {
    /// Endpoint node indices, local to the declaring scope.
    pub ends: (usize, usize),

    /// Tags selecting the pair builder (non-empty).
    pub tags: TagSet,
}

/// A composable tree of nodes, pairs, and child structures.
///
/// Node indices are local to each scope; pairs may only reference nodes of
/// the scope that declared them. Child structures are exclusively owned and
/// inherit every transform applied to their parent from that point on.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Structure {
    nodes: Vec<Node>,
    pairs: Vec<Pair>,
    children: Vec<Structure>,
}

impl Structure {
    /// Creates an empty structure.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an untagged node and returns its index within this scope.
    pub fn add_node(&mut self, x: f32, y: f32, z: f32) -> usize {
        self.add_node_tagged(x, y, z, TagSet::new())
    }

    /// Adds a tagged node and returns its index within this scope.
    pub fn add_node_tagged(&mut self, x: f32, y: f32, z: f32, tags: impl Into<TagSet>) -> usize {
        self.nodes.push(Node {
            position: Vec3::new(x, y, z),
            tags: tags.into(),
        });
        self.nodes.len() - 1
    }

    /// Connects two nodes of this scope with a tagged pair.
    ///
    /// The tag spec is whitespace-split; at least one tag is required. Both
    /// indices must already exist in this scope.
    pub fn add_pair(&mut self, a: usize, b: usize, tags: impl Into<TagSet>) -> Result<()> {
        for index in [a, b] {
            if index >= self.nodes.len() {
                return Err(Error::InvalidIndex {
                    a,
                    b,
                    index,
                    node_count: self.nodes.len(),
                });
            }
        }
        let tags = tags.into();
        if tags.is_empty() {
            return Err(Error::MissingTags { a, b });
        }
        self.pairs.push(Pair { ends: (a, b), tags });
        Ok(())
    }

    /// Adds a child structure (e.g. one limb of a larger assembly) and
    /// returns a mutable reference to it for further construction.
    pub fn add_child(&mut self, child: Structure) -> &mut Structure {
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// Translates all nodes of this scope and all descendants by `offset`.
    pub fn translate(&mut self, offset: Vec3) {
        self.apply(&mut |p| p + offset);
    }

    /// Rotates all geometry around the origin by `angle` radians about
    /// `axis`.
    pub fn rotate(&mut self, axis: Vec3, angle: f32) {
        self.rotate_around(Vec3::ZERO, axis, angle);
    }

    /// Rotates all geometry around a fixed `pivot` point.
    ///
    /// A degenerate axis (zero or non-finite) leaves the structure
    /// unchanged.
    pub fn rotate_around(&mut self, pivot: Vec3, axis: Vec3, angle: f32) {
        let Some(axis) = axis.try_normalize() else {
            return;
        };
        let rotation = Quat::from_axis_angle(axis, angle);
        self.apply(&mut |p| pivot + rotation * (p - pivot));
    }

    /// Scales all positions about the origin by `factor`.
    pub fn scale(&mut self, factor: f32) {
        self.apply(&mut |p| p * factor);
    }

    fn apply(&mut self, f: &mut impl FnMut(Vec3) -> Vec3) {
        for node in &mut self.nodes {
            node.position = f(node.position);
        }
        for child in &mut self.children {
            child.apply(f);
        }
    }

    /// Nodes declared in this scope, in insertion order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Pairs declared in this scope, in insertion order.
    pub fn pairs(&self) -> &[Pair] {
        &self.pairs
    }

    /// Child structures, in insertion order.
    pub fn children(&self) -> &[Structure] {
        &self.children
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_spec_splits_on_whitespace() {
        let tags = TagSet::from("olecranon muscle");
        assert_eq!(tags.len(), 2);
        assert!(tags.contains("olecranon"));
        assert!(tags.contains("muscle"));
        assert_eq!(tags.to_string(), "olecranon muscle");
    }

    #[test]
    fn tag_set_deduplicates() {
        let tags = TagSet::from("rod rod rod");
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn tag_order_is_insertion_order() {
        let tags = TagSet::from("muscle rod");
        let order: Vec<&str> = tags.iter().collect();
        assert_eq!(order, ["muscle", "rod"]);
    }

    #[test]
    fn pair_rejects_out_of_range_index() {
        let mut s = Structure::new();
        s.add_node(0.0, 0.0, 0.0);
        let err = s.add_pair(0, 3, "rod").unwrap_err();
        assert!(matches!(err, Error::InvalidIndex { index: 3, .. }));
    }

    #[test]
    fn pair_rejects_empty_tags() {
        let mut s = Structure::new();
        s.add_node(0.0, 0.0, 0.0);
        s.add_node(1.0, 0.0, 0.0);
        let err = s.add_pair(0, 1, "").unwrap_err();
        assert!(matches!(err, Error::MissingTags { a: 0, b: 1 }));
    }
}
