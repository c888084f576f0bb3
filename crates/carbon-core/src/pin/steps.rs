//! Step coordinates over a text block, and the inline edit primitives.
//!
//! A text block (a `text_block` container and all its nested inline
//! descendants) is addressed by a single integer coordinate: each text run
//! contributes steps equal to its character count, each atomic inline node
//! contributes exactly 1, and a position's step is the prefix sum of the
//! leaves before it. Negative steps address from the trailing end of the
//! block (`-1` is the end); this sign convention is preserved exactly by
//! every mapping — negative-in maps to negative-out.
//!
//! The edit primitives (`split_inp`, `insert_inp`, `remove_inp`) operate on
//! the whole block subtree at once, because splitting or inserting in the
//! middle of a leaf changes how many leaves exist and shifts every later
//! leaf's coordinate. Each returns a [`StepMap`] so previously-resolved
//! pins can be relocated without re-resolving from scratch.

use crate::error::CarbonError;
use crate::id::{IdGenerator, NodeId};
use crate::node::{NodeData, NodeJson};
use crate::schema::Schema;
use crate::store::NodeMap;
use serde::{Deserialize, Serialize};

/// One leaf of a flattened text block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InlineLeaf {
    pub id: NodeId,
    /// Sum of step sizes of all leaves before this one.
    pub prefix: u64,
    pub size: u64,
    pub is_text: bool,
}

/// Flattens the block subtree into leaves by pre-order walk. Non-atomic
/// inline containers (mark spans) are transparent; atomic nodes and text
/// runs are the leaves.
pub fn leaves_of(
    map: &NodeMap,
    schema: &Schema,
    block: NodeId,
) -> Result<Vec<InlineLeaf>, CarbonError> {
    let mut out = Vec::new();
    let mut prefix = 0;
    collect_leaves(map, schema, block, &mut prefix, &mut out)?;
    Ok(out)
}

fn collect_leaves(
    map: &NodeMap,
    schema: &Schema,
    at: NodeId,
    prefix: &mut u64,
    out: &mut Vec<InlineLeaf>,
) -> Result<(), CarbonError> {
    for &child in map.node(at)?.children().to_vec().iter() {
        let node = map.node(child)?;
        let spec = schema.spec(node.type_id);
        match &node.data {
            NodeData::Text(text) => {
                let size = text.chars().count() as u64;
                out.push(InlineLeaf {
                    id: child,
                    prefix: *prefix,
                    size,
                    is_text: true,
                });
                *prefix += size;
            }
            NodeData::Container { .. } if spec.atom => {
                out.push(InlineLeaf {
                    id: child,
                    prefix: *prefix,
                    size: 1,
                    is_text: false,
                });
                *prefix += 1;
            }
            NodeData::Container { .. } => {
                collect_leaves(map, schema, child, prefix, out)?;
            }
        }
    }
    Ok(())
}

/// Total step count of a block.
pub fn total_steps(map: &NodeMap, schema: &Schema, block: NodeId) -> Result<u64, CarbonError> {
    Ok(leaves_of(map, schema, block)?
        .last()
        .map(|leaf| leaf.prefix + leaf.size)
        .unwrap_or(0))
}

/// Resolves a possibly-negative step to an absolute position in `0..=total`.
/// Negative `s` denotes position `total + 1 + s`, so `-1` is the block end.
/// Out-of-range input is an error, never a silent clamp.
pub fn normalize_step(step: i64, total: u64) -> Result<u64, CarbonError> {
    let pos = if step >= 0 {
        step
    } else {
        total as i64 + 1 + step
    };
    if pos < 0 || pos as u64 > total {
        return Err(CarbonError::OutOfRange { step, total });
    }
    Ok(pos as u64)
}

/// A pure, edit-specific coordinate translator from pre-edit steps to
/// post-edit steps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "edit", rename_all = "lowercase")]
pub enum StepMap {
    /// A split changes leaf structure but no lengths.
    Identity { total: u64 },
    Insert { at: u64, len: u64, old_total: u64 },
    Remove { start: u64, end: u64, old_total: u64 },
}

impl StepMap {
    pub fn old_total(&self) -> u64 {
        match *self {
            StepMap::Identity { total } => total,
            StepMap::Insert { old_total, .. } | StepMap::Remove { old_total, .. } => old_total,
        }
    }

    pub fn new_total(&self) -> u64 {
        match *self {
            StepMap::Identity { total } => total,
            StepMap::Insert { len, old_total, .. } => old_total + len,
            StepMap::Remove {
                start,
                end,
                old_total,
            } => old_total - (end - start),
        }
    }

    /// Maps a pre-edit step to the post-edit coordinate space. Steps
    /// strictly before the edited span are unchanged, steps after shift by
    /// the net length delta, steps inside a removed span collapse to its
    /// start, and a step exactly at an insertion point ends up after the
    /// inserted content. The sign of the input is preserved: negative input
    /// (addressing from the end) yields negative output addressing from the
    /// new end.
    pub fn map_step(&self, step: i64) -> i64 {
        let old_total = self.old_total();
        if step >= 0 {
            self.map_pos(step as u64) as i64
        } else {
            let pos = (old_total as i64 + 1 + step).clamp(0, old_total as i64) as u64;
            self.map_pos(pos) as i64 - (self.new_total() as i64 + 1)
        }
    }

    fn map_pos(&self, pos: u64) -> u64 {
        match *self {
            StepMap::Identity { .. } => pos,
            StepMap::Insert { at, len, .. } => {
                if pos < at {
                    pos
                } else {
                    pos + len
                }
            }
            StepMap::Remove { start, end, .. } => {
                if pos <= start {
                    pos
                } else if pos < end {
                    start
                } else {
                    pos - (end - start)
                }
            }
        }
    }
}

/// Splits the text leaf containing `step` into two runs. Splitting at a
/// leaf boundary (or inside an atom, which has no interior) is a no-op.
/// When a leaf was split, returns the `(head, tail)` pair so the edit can
/// later be undone by rejoining the halves.
pub fn split_inp(
    map: &mut NodeMap,
    schema: &Schema,
    ids: &mut IdGenerator,
    block: NodeId,
    step: i64,
) -> Result<(StepMap, Option<(NodeId, NodeId)>), CarbonError> {
    let leaves = leaves_of(map, schema, block)?;
    let total = leaves.last().map(|l| l.prefix + l.size).unwrap_or(0);
    let pos = normalize_step(step, total)?;

    let inside = leaves
        .iter()
        .find(|leaf| leaf.is_text && leaf.prefix < pos && pos < leaf.prefix + leaf.size);
    let mut split = None;
    if let Some(leaf) = inside {
        let split_at = (pos - leaf.prefix) as usize;
        let tail = split_text_leaf(map, schema, ids, leaf.id, split_at)?;
        split = Some((leaf.id, tail));
    }
    Ok((StepMap::Identity { total }, split))
}

fn split_text_leaf(
    map: &mut NodeMap,
    schema: &Schema,
    ids: &mut IdGenerator,
    leaf: NodeId,
    at_chars: usize,
) -> Result<NodeId, CarbonError> {
    let node = map.node(leaf)?;
    let text = node
        .text_run()
        .ok_or_else(|| CarbonError::invariant(format!("split target {leaf} is not a text run")))?;
    let byte_at = text
        .char_indices()
        .nth(at_chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let (head, tail) = text.split_at(byte_at);
    let (head, tail) = (head.to_string(), tail.to_string());
    let type_id = node.type_id;
    let marks = node.marks.clone();

    let index = map.index_in_parent(leaf)?;
    let parent = map
        .node(leaf)?
        .parent
        .ok_or_else(|| CarbonError::invariant(format!("{leaf} has no parent")))?;

    map.update(leaf, |n| {
        n.data = NodeData::Text(head);
    })?;
    map.bump_spine(leaf);

    let tail_id = ids.text();
    let mut tail_node = crate::node::Node::text(tail_id, type_id, tail);
    tail_node.marks = marks;
    map.put(tail_node);
    map.attach(parent, index + 1, tail_id)?;
    let _ = schema; // leaf split never changes the child type sequence
    Ok(tail_id)
}

/// Inserts an inline node at `step`, splitting the containing leaf first
/// when the position falls mid-leaf. Returns the new node's id, the step
/// map for the insertion and the `(head, tail)` split pair when a leaf was
/// split to make room.
pub fn insert_inp(
    map: &mut NodeMap,
    schema: &Schema,
    ids: &mut IdGenerator,
    block: NodeId,
    step: i64,
    node: &NodeJson,
) -> Result<(NodeId, StepMap, Option<(NodeId, NodeId)>), CarbonError> {
    let type_id = schema.type_id(&node.name)?;
    let spec = schema.spec(type_id);
    if !spec.inline && !spec.text {
        return Err(CarbonError::SchemaViolation {
            node_type: node.name.clone(),
            reason: "only inline content can be inserted by step".to_string(),
        });
    }

    let old_total = total_steps(map, schema, block)?;
    let pos = normalize_step(step, old_total)?;
    let (_, split) = split_inp(map, schema, ids, block, pos as i64)?;

    // After the split every leaf boundary is a node boundary; find the
    // attachment point for `pos`.
    let leaves = leaves_of(map, schema, block)?;
    let (parent, index) = if let Some(leaf) = leaves.iter().find(|l| l.prefix == pos) {
        let parent = map
            .node(leaf.id)?
            .parent
            .ok_or_else(|| CarbonError::invariant(format!("leaf {} has no parent", leaf.id)))?;
        (parent, map.index_in_parent(leaf.id)?)
    } else if let Some(leaf) = leaves.last().filter(|l| l.prefix + l.size == pos) {
        let parent = map
            .node(leaf.id)?
            .parent
            .ok_or_else(|| CarbonError::invariant(format!("leaf {} has no parent", leaf.id)))?;
        (parent, map.index_in_parent(leaf.id)? + 1)
    } else {
        // Empty block.
        (block, 0)
    };

    let inserted = schema.node_from_json(node, ids, map)?;
    map.attach(parent, index, inserted)?;

    // Measured over the whole block so nested inline content (a span with
    // several leaves) contributes its full width.
    let len = total_steps(map, schema, block)? - old_total;
    Ok((
        inserted,
        StepMap::Insert {
            at: pos,
            len,
            old_total,
        },
        split,
    ))
}

/// Removes the inline span `start..end`, trimming partial leaves at the
/// boundaries and deleting fully-covered leaves. Inline containers emptied
/// by the removal are deleted too. Returns the removed leaves' transport
/// snapshots (document order) and the step map.
pub fn remove_inp(
    map: &mut NodeMap,
    schema: &Schema,
    ids: &mut IdGenerator,
    block: NodeId,
    start: i64,
    end: i64,
) -> Result<(Vec<NodeJson>, StepMap), CarbonError> {
    let old_total = total_steps(map, schema, block)?;
    let start = normalize_step(start, old_total)?;
    let end = normalize_step(end, old_total)?;
    if start > end {
        return Err(CarbonError::OutOfRange {
            step: end as i64,
            total: old_total,
        });
    }

    // Split the far boundary first so the near one stays valid.
    split_inp(map, schema, ids, block, end as i64)?;
    split_inp(map, schema, ids, block, start as i64)?;

    let covered: Vec<NodeId> = leaves_of(map, schema, block)?
        .iter()
        .filter(|leaf| leaf.prefix >= start && leaf.prefix + leaf.size <= end)
        .map(|leaf| leaf.id)
        .collect();

    let mut removed = Vec::with_capacity(covered.len());
    for leaf in covered {
        removed.push(map.to_json(leaf, schema)?);
        let mut parent = map.detach(leaf)?.0;
        map.remove_subtree(leaf)?;
        // Unwrap emptied mark spans up to (never including) the block.
        while parent != block && map.node(parent)?.children().is_empty() {
            let above = map.detach(parent)?.0;
            map.remove_subtree(parent)?;
            parent = above;
        }
    }

    Ok((
        removed,
        StepMap::Remove {
            start,
            end,
            old_total,
        },
    ))
}
