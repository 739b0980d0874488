//! Turns a geometric structure plus a build specification into a runtime
//! model tree.
//!
//! Resolution is depth-first: within each scope, nodes resolve before pairs
//! (so every pair sees fully resolved endpoints), then child scopes resolve
//! into owned child models. Each node is assigned a global [`AnchorId`] in
//! flattened traversal order. Resolution never contacts an engine, so a
//! failure anywhere aborts the whole operation and nothing can reach a world
//! half-built.

use crate::builder::{BuildSpec, NodeContext, PairContext};
use crate::entity::{AnchorId, Entity};
use crate::error::{Error, Result};
use crate::model::{Anchor, Model};
use crate::structure::Structure;
use tracing::{debug, info};

/// Resolves `structure` against the builders in `build`, producing an
/// unbuilt [`Model`] ready for insertion into a world.
///
/// Every pair must carry at least one tag with a registered pair builder;
/// the first matching tag in the pair's insertion order selects the builder.
/// Nodes without a matching node builder resolve to bare anchors, valid as
/// plain endpoints.
pub fn resolve(structure: &Structure, build: &BuildSpec) -> Result<Model> {
    let mut next_anchor = 0;
    let model = resolve_scope(structure, build, &mut next_anchor)?;
    info!(
        anchors = next_anchor,
        entities = model.entity_count(),
        "structure resolved"
    );
    Ok(model)
}

fn resolve_scope(scope: &Structure, build: &BuildSpec, next_anchor: &mut usize) -> Result<Model> {
    let offset = *next_anchor;
    *next_anchor += scope.nodes().len();
    debug!(
        nodes = scope.nodes().len(),
        pairs = scope.pairs().len(),
        children = scope.children().len(),
        "resolving structure scope"
    );

    let mut anchors: Vec<Anchor> = scope
        .nodes()
        .iter()
        .map(|node| Anchor::new(node.position))
        .collect();
    let mut entities = Vec::new();

    for (index, node) in scope.nodes().iter().enumerate() {
        let Some(builder) = build.node_builder_for(&node.tags) else {
            continue;
        };
        let entity = builder.build(&NodeContext {
            anchor: AnchorId(offset + index),
            position: node.position,
            tags: &node.tags,
        })?;
        entities.push(entity);
    }

    for (index, pair) in scope.pairs().iter().enumerate() {
        let (a, b) = pair.ends;
        // Construction validates indices, but a deserialized structure
        // arrives unchecked.
        for end in [a, b] {
            if end >= scope.nodes().len() {
                return Err(Error::InvalidIndex {
                    a,
                    b,
                    index: end,
                    node_count: scope.nodes().len(),
                });
            }
        }
        let Some(builder) = build.pair_builder_for(&pair.tags) else {
            return Err(Error::UnresolvedTag {
                index,
                tags: pair.tags.clone(),
            });
        };
        let entity = builder.build(&PairContext {
            ends: [AnchorId(offset + a), AnchorId(offset + b)],
            positions: [scope.nodes()[a].position, scope.nodes()[b].position],
            tags: &pair.tags,
        })?;
        entities.push(entity);
    }

    assemble_anchor_masses(offset, &mut anchors, &entities);

    let mut children = Vec::new();
    for child in scope.children() {
        children.push(resolve_scope(child, build, next_anchor)?);
    }

    Ok(Model::from_parts(offset, anchors, entities, children))
}

/// Distributes entity mass onto the anchors of a scope.
///
/// Each rod contributes half its mass, its radius, and its surface to each
/// endpoint; each point mass contributes its configured values. Masses add
/// and radii take the maximum, but an anchor has exactly one contact
/// surface: the last resolved entity's surface wins, and since nodes
/// resolve before pairs, a rod's surface takes precedence over a point
/// mass's on a shared anchor. Anchors that accumulate no mass stay static;
/// shared rod endpoints weld naturally, and a cable tied to a bare node
/// hangs from a fixed point.
fn assemble_anchor_masses(offset: usize, anchors: &mut [Anchor], entities: &[Entity]) {
    for entity in entities {
        match entity {
            Entity::Rod(rod) => {
                let half_mass = rod.mass() / 2.0;
                for end in rod.ends() {
                    let anchor = &mut anchors[end.index() - offset];
                    anchor.mass += half_mass;
                    anchor.radius = anchor.radius.max(rod.config().radius);
                    anchor.surface.friction = rod.config().friction;
                    anchor.surface.restitution = rod.config().restitution;
                }
            }
            Entity::Mass(mass) => {
                let anchor = &mut anchors[mass.anchor().index() - offset];
                anchor.mass += mass.mass();
                anchor.radius = anchor.radius.max(mass.config().radius);
                anchor.surface.friction = mass.config().friction;
                anchor.surface.restitution = mass.config().restitution;
            }
            Entity::Cable(_) => {}
        }
    }
}
