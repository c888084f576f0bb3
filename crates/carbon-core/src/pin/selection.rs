use crate::id::NodeId;
use crate::pin::pin::Pin;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Backward,
}

/// A head/tail pin pair. Collapsed when both pins coincide (a caret).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PinnedSelection {
    pub head: Pin,
    pub tail: Pin,
    pub direction: Direction,
}

impl PinnedSelection {
    pub fn collapsed(pin: Pin) -> Self {
        PinnedSelection {
            head: pin,
            tail: pin,
            direction: Direction::Forward,
        }
    }

    pub fn between(tail: Pin, head: Pin) -> Self {
        let direction = if head.block == tail.block && head.steps < tail.steps {
            Direction::Backward
        } else {
            Direction::Forward
        };
        PinnedSelection {
            head,
            tail,
            direction,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.head == self.tail
    }
}

/// Whole-block selection mode: an ordered set of selected node ids.
/// Mutually exclusive in practice with a non-collapsed [`PinnedSelection`];
/// that exclusivity is enforced by the plugin layer, not here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockSelection {
    pub nodes: BTreeSet<NodeId>,
}

impl BlockSelection {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn of(nodes: impl IntoIterator<Item = NodeId>) -> Self {
        BlockSelection {
            nodes: nodes.into_iter().collect(),
        }
    }
}

/// The full selection state a committed state carries: an optional pinned
/// (cursor/range) selection plus the block-selection set. Snapshotted
/// wholesale by `Select` actions so undo restores both sides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<PinnedSelection>,
    #[serde(default, skip_serializing_if = "BlockSelection::is_empty")]
    pub blocks: BlockSelection,
}

impl SelectionState {
    pub fn caret(pin: Pin) -> Self {
        SelectionState {
            pinned: Some(PinnedSelection::collapsed(pin)),
            blocks: BlockSelection::default(),
        }
    }

    pub fn none() -> Self {
        SelectionState::default()
    }
}
