use crate::id::NodeId;
use crate::node::Mark;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Persisted/transport form of a node.
///
/// `{ id?, name, children?, text?, props?, links?, marks? }` — the `id` is
/// optional on the way in (the draft mints fresh ids for new content) and
/// always present on the way out, so a snapshotted subtree re-inserts with
/// its original identity during undo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NodeId>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub props: Map<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub links: BTreeMap<String, NodeJson>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marks: Vec<Mark>,
}

impl NodeJson {
    pub fn named(name: impl Into<String>) -> Self {
        NodeJson {
            id: None,
            name: name.into(),
            children: Vec::new(),
            text: None,
            props: Map::new(),
            links: BTreeMap::new(),
            marks: Vec::new(),
        }
    }

    pub fn text_run(name: impl Into<String>, text: impl Into<String>) -> Self {
        let mut node = NodeJson::named(name);
        node.text = Some(text.into());
        node
    }

    pub fn with_children(mut self, children: Vec<NodeJson>) -> Self {
        self.children = children;
        self
    }

    pub fn with_props(mut self, props: Map<String, Value>) -> Self {
        self.props = props;
        self
    }

    pub fn with_mark(mut self, mark: Mark) -> Self {
        self.marks.push(mark);
        self
    }
}

/// Replacement content for a `SetContent` action: either a full child
/// sequence or a new text run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentJson {
    Children(Vec<NodeJson>),
    Text(String),
}
