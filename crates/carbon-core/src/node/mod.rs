//! The persistent document tree: nodes, marks and property bags.
//!
//! Nodes never own their children directly — children are [`NodeId`]s
//! resolved through the arena in [`crate::store`]. That keeps parent
//! back-references non-owning (plain ids, never reference-counted cycles)
//! and makes copy-on-write edits cheap: replacing one node's arena entry
//! leaves every untouched subtree shared with previous states.

pub mod json;
pub mod props;

pub use json::{ContentJson, NodeJson};
pub use props::NodeProps;

use crate::id::NodeId;
use crate::schema::NodeTypeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A formatting mark (bold, link, …) carried by an inline node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    pub name: String,
    /// Mark-specific data, e.g. `{"href": ...}` for a link.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub props: serde_json::Value,
}

impl Mark {
    pub fn named(name: impl Into<String>) -> Self {
        Mark {
            name: name.into(),
            props: serde_json::Value::Null,
        }
    }
}

/// Content payload of a node: an ordered child sequence (containers) or a
/// text run (leaves). Text leaves never have children; containers never
/// carry inline text directly.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Container {
        children: Vec<NodeId>,
        /// Named single-child attachments outside the main sequence,
        /// e.g. a table's header row.
        links: BTreeMap<String, NodeId>,
    },
    Text(String),
}

/// One element of the document tree.
///
/// A node is immutable from the outside; edits go through a draft, which
/// replaces the node's arena entry copy-on-write. The `parent` field is a
/// lookup-only back-reference set at attach time and cleared at detach
/// time — it is never traversed for ownership.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub type_id: NodeTypeId,
    pub data: NodeData,
    pub props: NodeProps,
    pub marks: Vec<Mark>,
    pub parent: Option<NodeId>,
    /// Bumped when this node's content (or a descendant's) changes.
    pub content_version: u64,
    /// Bumped when this node itself must re-render (props, marks, text).
    pub render_version: u64,
}

impl Node {
    pub fn container(id: NodeId, type_id: NodeTypeId) -> Self {
        Node {
            id,
            type_id,
            data: NodeData::Container {
                children: Vec::new(),
                links: BTreeMap::new(),
            },
            props: NodeProps::new(),
            marks: Vec::new(),
            parent: None,
            content_version: 0,
            render_version: 0,
        }
    }

    pub fn text(id: NodeId, type_id: NodeTypeId, text: impl Into<String>) -> Self {
        Node {
            id,
            type_id,
            data: NodeData::Text(text.into()),
            props: NodeProps::new(),
            marks: Vec::new(),
            parent: None,
            content_version: 0,
            render_version: 0,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self.data, NodeData::Text(_))
    }

    /// Child ids, empty for text leaves.
    pub fn children(&self) -> &[NodeId] {
        match &self.data {
            NodeData::Container { children, .. } => children,
            NodeData::Text(_) => &[],
        }
    }

    pub fn links(&self) -> Option<&BTreeMap<String, NodeId>> {
        match &self.data {
            NodeData::Container { links, .. } => Some(links),
            NodeData::Text(_) => None,
        }
    }

    /// The text run of a leaf, `None` for containers.
    pub fn text_run(&self) -> Option<&str> {
        match &self.data {
            NodeData::Text(text) => Some(text),
            NodeData::Container { .. } => None,
        }
    }

    /// Step size of this node when it appears as an inline leaf: text
    /// length in characters for runs, exactly 1 for atomic inline nodes.
    pub fn step_size(&self, atom: bool) -> u64 {
        match &self.data {
            NodeData::Text(text) => text.chars().count() as u64,
            NodeData::Container { .. } => {
                if atom {
                    1
                } else {
                    0
                }
            }
        }
    }

    pub(crate) fn bump_content(&mut self) {
        self.content_version += 1;
    }

    pub(crate) fn bump_render(&mut self) {
        self.render_version += 1;
    }
}
