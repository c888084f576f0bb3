//! The reversible edit primitives: every mutation of a draft from outside
//! goes through one [`CarbonAction`].
//!
//! An action executes at most once against a draft; execution snapshots
//! whatever pre-edit information the exact counter-action needs, so
//! `inverse()` after execution is total. Requesting the inverse of an
//! action that never ran is a programming-contract error
//! ([`CarbonError::InvariantBroken`]). Actions serialize to a tagged JSON
//! object sufficient to re-execute or invert them outside the current
//! process (audit logging, remote replay).

use crate::draft::Draft;
use crate::error::CarbonError;
use crate::id::NodeId;
use crate::node::{ContentJson, Mark, NodeJson};
use crate::pin::{Point, SelectionState};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Where an edit came from. Undo/redo replays carry `NoSync` so listeners
/// and collaboration filters can distinguish "my edit" from "replayed
/// edit".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    UserInput,
    Api,
    Remote,
    NoSync,
}

/// Add or remove for a mark update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkOp {
    Add,
    Remove,
}

impl MarkOp {
    fn flipped(self) -> MarkOp {
        match self {
            MarkOp::Add => MarkOp::Remove,
            MarkOp::Remove => MarkOp::Add,
        }
    }
}

/// Pre-edit snapshot of a removed node: its full transport form (ids
/// included) and the position it was detached from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovedSnapshot {
    pub node: NodeJson,
    pub at: Point,
}

/// One atomic, invertible edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CarbonAction {
    InsertNode {
        at: Point,
        node: NodeJson,
        origin: Origin,
        /// Filled at execution; the handle the inverse removes.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        inserted: Option<NodeId>,
        /// Filled at execution when the insertion split a text run; the
        /// inverse rejoins the pair after removing the node.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        split: Option<(NodeId, NodeId)>,
    },
    InsertFragment {
        at: Point,
        nodes: Vec<NodeJson>,
        origin: Origin,
        /// When present (inverse of a fragment removal) each node carries
        /// its own restore position instead of flowing from `at`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        restore: Option<Vec<RemovedSnapshot>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        inserted: Option<Vec<NodeId>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        split: Option<(NodeId, NodeId)>,
    },
    RemoveNode {
        node_id: NodeId,
        origin: Origin,
        /// Text runs merged back together once the node is out of the way
        /// (set on inverses of insertions that split a run).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rejoin: Option<(NodeId, NodeId)>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        removed: Option<Box<RemovedSnapshot>>,
    },
    /// Counter-action of `InsertFragment`; removes several siblings at once.
    RemoveFragment {
        node_ids: Vec<NodeId>,
        origin: Origin,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rejoin: Option<(NodeId, NodeId)>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        removed: Option<Vec<RemovedSnapshot>>,
    },
    Move {
        node_id: NodeId,
        to: Point,
        origin: Origin,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<Point>,
    },
    SetContent {
        node_id: NodeId,
        content: ContentJson,
        origin: Origin,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        before: Option<ContentJson>,
    },
    UpdateProperties {
        node_id: NodeId,
        props: Map<String, Value>,
        origin: Origin,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        before: Option<Map<String, Value>>,
    },
    UpdateMark {
        /// Target node; `None` toggles the state-level active marks used
        /// for the next typed input.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        node_id: Option<NodeId>,
        op: MarkOp,
        mark: Mark,
        origin: Origin,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        applied: Option<bool>,
    },
    Select {
        selection: SelectionState,
        origin: Origin,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        before: Option<SelectionState>,
    },
}

impl CarbonAction {
    pub fn origin(&self) -> Origin {
        match self {
            CarbonAction::InsertNode { origin, .. }
            | CarbonAction::InsertFragment { origin, .. }
            | CarbonAction::RemoveNode { origin, .. }
            | CarbonAction::RemoveFragment { origin, .. }
            | CarbonAction::Move { origin, .. }
            | CarbonAction::SetContent { origin, .. }
            | CarbonAction::UpdateProperties { origin, .. }
            | CarbonAction::UpdateMark { origin, .. }
            | CarbonAction::Select { origin, .. } => *origin,
        }
    }

    /// Runs the edit against the draft, verifying targets and caching the
    /// information `inverse` needs.
    pub fn execute(&mut self, draft: &mut Draft<'_>) -> Result<(), CarbonError> {
        match self {
            CarbonAction::InsertNode {
                at,
                node,
                inserted,
                split,
                ..
            } => {
                let (id, leaf_split) = draft.insert_node(at, node)?;
                *inserted = Some(id);
                *split = leaf_split;
                Ok(())
            }
            CarbonAction::InsertFragment {
                at,
                nodes,
                restore,
                inserted,
                split,
                ..
            } => {
                let ids = match restore {
                    Some(snapshots) => {
                        let mut out = Vec::with_capacity(snapshots.len());
                        for snap in snapshots.iter() {
                            let (id, _) = draft.insert_node(&snap.at, &snap.node)?;
                            out.push(id);
                        }
                        out
                    }
                    None => {
                        let (ids, leaf_split) = draft.insert_fragment(at, nodes)?;
                        *split = leaf_split;
                        ids
                    }
                };
                *inserted = Some(ids);
                Ok(())
            }
            CarbonAction::RemoveNode {
                node_id,
                rejoin,
                removed,
                ..
            } => {
                *removed = Some(Box::new(draft.remove_node(*node_id)?));
                if let Some((head, tail)) = *rejoin {
                    draft.rejoin_text(head, tail)?;
                }
                Ok(())
            }
            CarbonAction::RemoveFragment {
                node_ids,
                rejoin,
                removed,
                ..
            } => {
                // Remove back-to-front so earlier positions stay valid.
                let mut snaps = Vec::with_capacity(node_ids.len());
                for &id in node_ids.iter().rev() {
                    snaps.push(draft.remove_node(id)?);
                }
                snaps.reverse();
                *removed = Some(snaps);
                if let Some((head, tail)) = *rejoin {
                    draft.rejoin_text(head, tail)?;
                }
                Ok(())
            }
            CarbonAction::Move {
                node_id, to, from, ..
            } => {
                *from = Some(draft.move_node(to, *node_id)?);
                Ok(())
            }
            CarbonAction::SetContent {
                node_id,
                content,
                before,
                ..
            } => {
                *before = Some(draft.set_content(*node_id, content)?);
                Ok(())
            }
            CarbonAction::UpdateProperties {
                node_id,
                props,
                before,
                ..
            } => {
                *before = Some(draft.update_props(*node_id, props)?);
                Ok(())
            }
            CarbonAction::UpdateMark {
                node_id,
                op,
                mark,
                applied,
                ..
            } => {
                *applied = Some(draft.update_mark(*node_id, *op, mark)?);
                Ok(())
            }
            CarbonAction::Select {
                selection, before, ..
            } => {
                *before = Some(draft.update_selection(selection.clone())?);
                Ok(())
            }
        }
    }

    /// The exact counter-action, tagged with `origin`. Only valid after
    /// execution.
    pub fn inverse(&self, origin: Origin) -> Result<CarbonAction, CarbonError> {
        match self {
            CarbonAction::InsertNode {
                inserted, split, ..
            } => {
                let node_id = inserted.ok_or_else(not_executed)?;
                Ok(CarbonAction::RemoveNode {
                    node_id,
                    origin,
                    rejoin: *split,
                    removed: None,
                })
            }
            CarbonAction::InsertFragment {
                inserted, split, ..
            } => {
                let node_ids = inserted.clone().ok_or_else(not_executed)?;
                Ok(CarbonAction::RemoveFragment {
                    node_ids,
                    origin,
                    rejoin: *split,
                    removed: None,
                })
            }
            CarbonAction::RemoveNode { removed, .. } => {
                let snap = removed.clone().ok_or_else(not_executed)?;
                Ok(CarbonAction::InsertNode {
                    at: snap.at,
                    node: snap.node,
                    origin,
                    inserted: None,
                    split: None,
                })
            }
            CarbonAction::RemoveFragment { removed, .. } => {
                let snaps = removed.clone().ok_or_else(not_executed)?;
                let at = snaps
                    .first()
                    .map(|s| s.at)
                    .ok_or_else(|| CarbonError::invariant("empty fragment removal"))?;
                let nodes = snaps.iter().map(|s| s.node.clone()).collect();
                Ok(CarbonAction::InsertFragment {
                    at,
                    nodes,
                    origin,
                    restore: Some(snaps),
                    inserted: None,
                    split: None,
                })
            }
            CarbonAction::Move { node_id, from, .. } => {
                let to = from.ok_or_else(not_executed)?;
                Ok(CarbonAction::Move {
                    node_id: *node_id,
                    to,
                    origin,
                    from: None,
                })
            }
            CarbonAction::SetContent {
                node_id, before, ..
            } => {
                let content = before.clone().ok_or_else(not_executed)?;
                Ok(CarbonAction::SetContent {
                    node_id: *node_id,
                    content,
                    origin,
                    before: None,
                })
            }
            CarbonAction::UpdateProperties {
                node_id, before, ..
            } => {
                let props = before.clone().ok_or_else(not_executed)?;
                Ok(CarbonAction::UpdateProperties {
                    node_id: *node_id,
                    props,
                    origin,
                    before: None,
                })
            }
            CarbonAction::UpdateMark {
                node_id,
                op,
                mark,
                applied,
                ..
            } => {
                let applied = applied.ok_or_else(not_executed)?;
                // An update that changed nothing inverts to the same no-op;
                // flipping it would strip a mark this action never added.
                let op = if applied { op.flipped() } else { *op };
                Ok(CarbonAction::UpdateMark {
                    node_id: *node_id,
                    op,
                    mark: mark.clone(),
                    origin,
                    applied: None,
                })
            }
            CarbonAction::Select { before, .. } => {
                let selection = before.clone().ok_or_else(not_executed)?;
                Ok(CarbonAction::Select {
                    selection,
                    origin,
                    before: None,
                })
            }
        }
    }
}

fn not_executed() -> CarbonError {
    CarbonError::invariant("inverse() requested on an action that was never executed")
}
