//! Immutable editor state snapshots and their change-sets.

use crate::id::NodeId;
use crate::node::Mark;
use crate::pin::SelectionState;
use crate::store::NodeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Node ids touched by the last committed transaction (edited nodes and
/// their rewritten ancestors). Renderers diff against this instead of
/// re-walking the whole tree; per-node content/render version counters live
/// on the nodes themselves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changes {
    pub touched: BTreeSet<NodeId>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.touched.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.touched.contains(&id)
    }
}

/// One committed snapshot of the document.
///
/// Logically immutable: any number of observers may hold and read a state
/// without synchronization. Every successful transaction produces exactly
/// one new state whose `previous` link points at this one, forming the
/// linear undo/time-travel chain.
#[derive(Debug, Clone)]
pub struct State {
    root: NodeId,
    nodes: NodeMap,
    selection: SelectionState,
    /// Marks toggled for the next typed input.
    marks: Vec<Mark>,
    changes: Changes,
    previous: Option<Arc<State>>,
}

impl State {
    /// The state created once at editor initialization.
    pub fn initial(root: NodeId, nodes: NodeMap) -> Self {
        State {
            root,
            nodes,
            selection: SelectionState::none(),
            marks: Vec::new(),
            changes: Changes::default(),
            previous: None,
        }
    }

    pub(crate) fn committed(
        root: NodeId,
        nodes: NodeMap,
        selection: SelectionState,
        marks: Vec<Mark>,
        changes: Changes,
        previous: Arc<State>,
    ) -> Self {
        State {
            root,
            nodes,
            selection,
            marks,
            changes,
            previous: Some(previous),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn nodes(&self) -> &NodeMap {
        &self.nodes
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn marks(&self) -> &[Mark] {
        &self.marks
    }

    pub fn changes(&self) -> &Changes {
        &self.changes
    }

    pub fn previous(&self) -> Option<&Arc<State>> {
        self.previous.as_ref()
    }

    /// Depth of the undo chain reachable from this state.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.previous.as_deref();
        while let Some(state) = current {
            depth += 1;
            current = state.previous.as_deref();
        }
        depth
    }

    pub fn text_content(&self) -> String {
        self.nodes.text_content(self.root)
    }
}
