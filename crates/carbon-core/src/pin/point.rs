use crate::id::NodeId;
use serde::{Deserialize, Serialize};

/// A location named relative to a node, before any resolution.
///
/// `Within` carries an offset whose meaning depends on the target: a
/// character offset for text leaves, a step for text-block containers
/// (negative steps address from the end), and a child index for ordinary
/// containers (insertion positions).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "at", rename_all = "lowercase")]
pub enum Point {
    Before { node: NodeId },
    Within { node: NodeId, offset: i64 },
    After { node: NodeId },
}

impl Point {
    pub fn before(node: NodeId) -> Self {
        Point::Before { node }
    }

    pub fn within(node: NodeId, offset: i64) -> Self {
        Point::Within { node, offset }
    }

    pub fn after(node: NodeId) -> Self {
        Point::After { node }
    }

    /// Start of a container's child sequence.
    pub fn start_of(node: NodeId) -> Self {
        Point::Within { node, offset: 0 }
    }

    pub fn node(&self) -> NodeId {
        match *self {
            Point::Before { node } | Point::Within { node, .. } | Point::After { node } => node,
        }
    }
}
