//! Chainable batches of actions committed atomically.

use crate::action::{CarbonAction, MarkOp, Origin};
use crate::editor::Editor;
use crate::error::CarbonError;
use crate::id::NodeId;
use crate::node::{ContentJson, Mark, NodeJson};
use crate::pin::{Point, SelectionState};
use serde_json::{Map, Value};

/// Lifecycle of a transaction. A transaction leaves `Executing` for exactly
/// one of the terminal stages; a rolled-back transaction left no trace in
/// the state chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStage {
    Idle,
    Executing,
    Committed,
    RolledBack,
}

/// An ordered list of actions that commit or fail together.
///
/// Built fluently:
///
/// ```ignore
/// Transaction::new(Origin::UserInput)
///     .insert_text(title, -1, "!")
///     .dispatch(&mut editor)?;
/// ```
#[derive(Debug)]
pub struct Transaction {
    actions: Vec<CarbonAction>,
    origin: Origin,
    stage: TxStage,
}

impl Transaction {
    pub fn new(origin: Origin) -> Self {
        Transaction {
            actions: Vec::new(),
            origin,
            stage: TxStage::Idle,
        }
    }

    pub(crate) fn from_actions(actions: Vec<CarbonAction>, origin: Origin) -> Self {
        Transaction {
            actions,
            origin,
            stage: TxStage::Idle,
        }
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn stage(&self) -> TxStage {
        self.stage
    }

    pub(crate) fn set_stage(&mut self, stage: TxStage) {
        self.stage = stage;
    }

    pub fn actions(&self) -> &[CarbonAction] {
        &self.actions
    }

    pub(crate) fn actions_mut(&mut self) -> &mut [CarbonAction] {
        &mut self.actions
    }

    pub(crate) fn into_actions(self) -> Vec<CarbonAction> {
        self.actions
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn insert(mut self, at: Point, node: NodeJson) -> Self {
        self.actions.push(CarbonAction::InsertNode {
            at,
            node,
            origin: self.origin,
            inserted: None,
            split: None,
        });
        self
    }

    pub fn insert_fragment(mut self, at: Point, nodes: Vec<NodeJson>) -> Self {
        self.actions.push(CarbonAction::InsertFragment {
            at,
            nodes,
            origin: self.origin,
            restore: None,
            inserted: None,
            split: None,
        });
        self
    }

    /// Inserts a plain text run at a step coordinate of a text block.
    pub fn insert_text(self, block: NodeId, step: i64, text: impl Into<String>) -> Self {
        self.insert(Point::within(block, step), NodeJson::text_run("text", text))
    }

    pub fn remove(mut self, node_id: NodeId) -> Self {
        self.actions.push(CarbonAction::RemoveNode {
            node_id,
            origin: self.origin,
            rejoin: None,
            removed: None,
        });
        self
    }

    pub fn move_node(mut self, to: Point, node_id: NodeId) -> Self {
        self.actions.push(CarbonAction::Move {
            node_id,
            to,
            origin: self.origin,
            from: None,
        });
        self
    }

    pub fn set_content(mut self, node_id: NodeId, content: ContentJson) -> Self {
        self.actions.push(CarbonAction::SetContent {
            node_id,
            content,
            origin: self.origin,
            before: None,
        });
        self
    }

    pub fn update_props(mut self, node_id: NodeId, props: Map<String, Value>) -> Self {
        self.actions.push(CarbonAction::UpdateProperties {
            node_id,
            props,
            origin: self.origin,
            before: None,
        });
        self
    }

    pub fn mark(mut self, node_id: Option<NodeId>, op: MarkOp, mark: Mark) -> Self {
        self.actions.push(CarbonAction::UpdateMark {
            node_id,
            op,
            mark,
            origin: self.origin,
            applied: None,
        });
        self
    }

    pub fn select(mut self, selection: SelectionState) -> Self {
        self.actions.push(CarbonAction::Select {
            selection,
            origin: self.origin,
            before: None,
        });
        self
    }

    /// Coalesces runs of adjacent text insertions into single actions, so a
    /// burst of per-keystroke inserts commits (and later inverts) as one
    /// edit. Only touches unexecuted insertions into the same block whose
    /// positions chain exactly.
    pub fn optimize(&mut self) {
        let mut out: Vec<CarbonAction> = Vec::with_capacity(self.actions.len());
        for action in self.actions.drain(..) {
            if let (Some(prev), CarbonAction::InsertNode { at, node, inserted, .. }) =
                (out.last_mut(), &action)
            {
                if inserted.is_none() && try_coalesce(prev, at, node) {
                    continue;
                }
            }
            out.push(action);
        }
        self.actions = out;
    }

    /// Runs this transaction against the editor. Shorthand for
    /// [`Editor::commit`].
    pub fn dispatch(self, editor: &mut Editor) -> Result<(), CarbonError> {
        editor.commit(self)
    }
}

fn try_coalesce(prev: &mut CarbonAction, at: &Point, node: &NodeJson) -> bool {
    let CarbonAction::InsertNode {
        at: prev_at,
        node: prev_node,
        inserted: None,
        ..
    } = prev
    else {
        return false;
    };
    let (Some(prev_text), Some(text)) = (&prev_node.text, &node.text) else {
        return false;
    };
    if prev_node.name != "text" || node.name != "text" {
        return false;
    }
    // Marked or propertied runs keep their own identity.
    if !prev_node.marks.is_empty() || !node.marks.is_empty() {
        return false;
    }
    if !prev_node.props.is_empty() || !node.props.is_empty() {
        return false;
    }
    let (Point::Within { node: prev_block, offset: prev_offset }, Point::Within { node: block, offset }) =
        (*prev_at, *at)
    else {
        return false;
    };
    if prev_block != block || offset != prev_offset + prev_text.chars().count() as i64 {
        return false;
    }
    let merged = format!("{prev_text}{text}");
    prev_node.text = Some(merged);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn optimize_coalesces_keystroke_runs() {
        let block = NodeId::block(3);
        let mut tx = Transaction::new(Origin::UserInput)
            .insert_text(block, 0, "h")
            .insert_text(block, 1, "i")
            .insert_text(block, 2, "!");
        tx.optimize();
        assert_eq!(tx.actions().len(), 1);
        match &tx.actions()[0] {
            CarbonAction::InsertNode { node, .. } => {
                assert_eq!(node.text.as_deref(), Some("hi!"));
            }
            other => panic!("expected a single insert, got {other:?}"),
        }
    }

    #[test]
    fn optimize_keeps_non_adjacent_inserts_apart() {
        let block = NodeId::block(3);
        let mut tx = Transaction::new(Origin::UserInput)
            .insert_text(block, 0, "a")
            .insert_text(block, 5, "b");
        tx.optimize();
        assert_eq!(tx.actions().len(), 2);
    }

    #[test]
    fn new_transactions_start_idle() {
        let tx = Transaction::new(Origin::Api);
        assert_eq!(tx.stage(), TxStage::Idle);
        assert!(tx.is_empty());
    }
}
