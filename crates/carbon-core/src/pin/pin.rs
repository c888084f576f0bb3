use crate::error::CarbonError;
use crate::id::NodeId;
use crate::pin::point::Point;
use crate::pin::steps::{self, leaves_of, normalize_step};
use crate::schema::Schema;
use crate::store::NodeMap;
use serde::{Deserialize, Serialize};

/// A resolved cursor location: the leaf it rests in, the character offset
/// inside that leaf, and the block-wide step coordinate.
///
/// `steps` is valid across the whole enclosing text block, so moving a pin
/// is integer arithmetic plus one re-walk to find the leaf containing the
/// target step — no re-resolution through every ancestor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    /// The enclosing text block the step coordinate is relative to.
    pub block: NodeId,
    /// Leaf node the pin rests in (the block itself when it is empty).
    pub node: NodeId,
    /// Character offset within `node` (0 for atoms and empty blocks).
    pub offset: usize,
    pub steps: i64,
}

impl Pin {
    /// Resolves a [`Point`] against the tree.
    ///
    /// Points on text leaves and inline nodes resolve within their
    /// enclosing text block; points on a text block resolve to its start
    /// (`Before`), end (`After`) or a step offset (`Within`). Points on
    /// other containers resolve through their first/last text-block
    /// descendant.
    pub fn resolve(
        point: &Point,
        map: &NodeMap,
        schema: &Schema,
    ) -> Result<Pin, CarbonError> {
        match *point {
            Point::Before { node } => {
                let target = map.node(node)?;
                let spec = schema.spec(target.type_id);
                if spec.text_block {
                    Pin::at_step(node, 0, map, schema)
                } else if spec.inline || spec.text {
                    let block = enclosing_text_block(node, map, schema)?;
                    let leaf = find_leaf(map, schema, block, node)?;
                    Pin::at_step(block, leaf.prefix as i64, map, schema)
                } else {
                    let block = first_text_block(node, map, schema, Edge::Start)?;
                    Pin::at_step(block, 0, map, schema)
                }
            }
            Point::After { node } => {
                let target = map.node(node)?;
                let spec = schema.spec(target.type_id);
                if spec.text_block {
                    Pin::at_step(node, -1, map, schema)
                } else if spec.inline || spec.text {
                    let block = enclosing_text_block(node, map, schema)?;
                    let leaf = find_leaf(map, schema, block, node)?;
                    Pin::at_step(block, (leaf.prefix + leaf.size) as i64, map, schema)
                } else {
                    let block = first_text_block(node, map, schema, Edge::End)?;
                    Pin::at_step(block, -1, map, schema)
                }
            }
            Point::Within { node, offset } => {
                let target = map.node(node)?;
                let spec = schema.spec(target.type_id);
                if spec.text {
                    let block = enclosing_text_block(node, map, schema)?;
                    let leaf = find_leaf(map, schema, block, node)?;
                    if offset < 0 || offset as u64 > leaf.size {
                        return Err(CarbonError::OutOfRange {
                            step: offset,
                            total: leaf.size,
                        });
                    }
                    Pin::at_step(block, leaf.prefix as i64 + offset, map, schema)
                } else if spec.text_block {
                    Pin::at_step(node, offset, map, schema)
                } else {
                    Err(CarbonError::invariant(format!(
                        "point Within({node}) targets a non-text container"
                    )))
                }
            }
        }
    }

    /// Pins a (possibly negative) step coordinate inside a text block.
    pub fn at_step(
        block: NodeId,
        step: i64,
        map: &NodeMap,
        schema: &Schema,
    ) -> Result<Pin, CarbonError> {
        let leaves = leaves_of(map, schema, block)?;
        let total = leaves.last().map(|l| l.prefix + l.size).unwrap_or(0);
        let pos = normalize_step(step, total)?;

        // A boundary position belongs to the earlier leaf, so a pin at the
        // end of a run stays attached to the text the user just typed.
        for leaf in &leaves {
            if pos <= leaf.prefix + leaf.size {
                return Ok(Pin {
                    block,
                    node: leaf.id,
                    offset: pos.saturating_sub(leaf.prefix) as usize,
                    steps: pos as i64,
                });
            }
        }
        Ok(Pin {
            block,
            node: block,
            offset: 0,
            steps: 0,
        })
    }

    /// Moves the pin by `n` steps (negative moves toward the block start).
    /// Moving past either boundary is an out-of-range error; callers that
    /// want clamping must do it themselves.
    pub fn move_by(
        &self,
        n: i64,
        map: &NodeMap,
        schema: &Schema,
    ) -> Result<Pin, CarbonError> {
        Pin::at_step(self.block, self.steps + n, map, schema)
    }

    /// Re-resolves this pin after an edit, translating its step through the
    /// edit's map.
    pub fn through(
        &self,
        step_map: &steps::StepMap,
        map: &NodeMap,
        schema: &Schema,
    ) -> Result<Pin, CarbonError> {
        Pin::at_step(self.block, step_map.map_step(self.steps), map, schema)
    }
}

enum Edge {
    Start,
    End,
}

/// Nearest enclosing `text_block` ancestor (or the node itself).
pub fn enclosing_text_block(
    node: NodeId,
    map: &NodeMap,
    schema: &Schema,
) -> Result<NodeId, CarbonError> {
    let mut current = Some(node);
    while let Some(id) = current {
        let n = map.node(id)?;
        if schema.spec(n.type_id).text_block {
            return Ok(id);
        }
        current = n.parent;
    }
    Err(CarbonError::invariant(format!(
        "{node} is not inside a text block"
    )))
}

fn first_text_block(
    node: NodeId,
    map: &NodeMap,
    schema: &Schema,
    edge: Edge,
) -> Result<NodeId, CarbonError> {
    let walk = map.descendants(node)?;
    let pick = |id: &&NodeId| -> bool {
        map.get(**id)
            .map(|n| schema.spec(n.type_id).text_block)
            .unwrap_or(false)
    };
    let found = match edge {
        Edge::Start => walk.iter().find(pick),
        Edge::End => walk.iter().rev().find(pick),
    };
    found
        .copied()
        .ok_or_else(|| CarbonError::invariant(format!("{node} contains no text block")))
}

fn find_leaf(
    map: &NodeMap,
    schema: &Schema,
    block: NodeId,
    node: NodeId,
) -> Result<steps::InlineLeaf, CarbonError> {
    leaves_of(map, schema, block)?
        .into_iter()
        .find(|leaf| leaf.id == node)
        .ok_or(CarbonError::NotFound(node))
}
