//! The baseline document plugins: `doc`, `section`, `title`, `paragraph`,
//! `text` and `emoji`. Together they form the default schema; applications
//! extend the list with their own [`CarbonPlugin`]s before building.

use crate::action::{CarbonAction, Origin};
use crate::node::{Node, NodeJson};
use crate::pin::Point;
use crate::plugin::CarbonPlugin;
use crate::schema::{NodeSpec, Schema};
use crate::state::State;
use crate::store::NodeMap;
use crate::transaction::Transaction;
use serde_json::json;

/// The full baseline plugin list, in declaration order (which fixes grammar
/// filler preference: `paragraph` before `section` in the `content` group).
pub fn baseline_plugins() -> Vec<Box<dyn CarbonPlugin>> {
    vec![
        Box::new(DocPlugin),
        Box::new(ParagraphPlugin),
        Box::new(SectionPlugin),
        Box::new(TitlePlugin),
        Box::new(TextPlugin),
        Box::new(EmojiPlugin),
    ]
}

/// Convenience: a schema containing exactly the baseline plugins.
pub fn baseline_schema() -> Result<Schema, crate::schema::SchemaError> {
    Schema::build(baseline_plugins())
}

/// Document root: one or more content blocks.
pub struct DocPlugin;

impl CarbonPlugin for DocPlugin {
    fn name(&self) -> &'static str {
        "doc"
    }

    fn spec(&self) -> NodeSpec {
        NodeSpec {
            content: "content+".to_string(),
            ..NodeSpec::default()
        }
    }

    fn serialize(&self, node: &Node, nodes: &NodeMap, schema: &Schema) -> String {
        serialize_children(node, nodes, schema).join("\n\n")
    }
}

/// Flat text paragraph; the workhorse content block.
pub struct ParagraphPlugin;

impl CarbonPlugin for ParagraphPlugin {
    fn name(&self) -> &'static str {
        "paragraph"
    }

    fn spec(&self) -> NodeSpec {
        NodeSpec {
            content: "inline*".to_string(),
            groups: vec!["content".to_string()],
            text_block: true,
            focusable: true,
            selectable: true,
            ..NodeSpec::default()
        }
    }

    fn handle_event(&self, event: &str, node: &Node, _state: &State) -> Option<Transaction> {
        if event == "enter" {
            // A fresh empty paragraph after this one; the caret follows via
            // selection reconciliation.
            return Some(
                Transaction::new(Origin::UserInput)
                    .insert(Point::after(node.id), NodeJson::named("paragraph")),
            );
        }
        None
    }
}

/// A titled grouping block: `title content*`.
pub struct SectionPlugin;

impl CarbonPlugin for SectionPlugin {
    fn name(&self) -> &'static str {
        "section"
    }

    fn spec(&self) -> NodeSpec {
        NodeSpec {
            content: "title content*".to_string(),
            groups: vec!["content".to_string()],
            focusable: true,
            selectable: true,
            ..NodeSpec::default()
        }
    }

    fn normalize(&self, node: &Node, _nodes: &NodeMap, _schema: &Schema) -> Vec<CarbonAction> {
        // A section whose children were all removed dissolves rather than
        // being refilled with an empty title.
        if node.children().is_empty() && node.parent.is_some() {
            return vec![CarbonAction::RemoveNode {
                node_id: node.id,
                origin: Origin::NoSync,
                rejoin: None,
                removed: None,
            }];
        }
        Vec::new()
    }

    fn serialize(&self, node: &Node, nodes: &NodeMap, schema: &Schema) -> String {
        let mut parts = serialize_children(node, nodes, schema);
        if parts.is_empty() {
            return String::new();
        }
        let title = parts.remove(0);
        let mut out = format!("# {title}");
        for part in parts {
            out.push_str("\n\n");
            out.push_str(&part);
        }
        out
    }
}

/// A section's heading line. Steps address into it like any text block.
pub struct TitlePlugin;

impl CarbonPlugin for TitlePlugin {
    fn name(&self) -> &'static str {
        "title"
    }

    fn spec(&self) -> NodeSpec {
        NodeSpec {
            content: "inline*".to_string(),
            text_block: true,
            focusable: true,
            ..NodeSpec::default()
        }
    }
}

/// Text run leaf.
pub struct TextPlugin;

impl CarbonPlugin for TextPlugin {
    fn name(&self) -> &'static str {
        "text"
    }

    fn spec(&self) -> NodeSpec {
        NodeSpec {
            text: true,
            inline: true,
            groups: vec!["inline".to_string()],
            ..NodeSpec::default()
        }
    }
}

/// Atomic inline node: one step wide, no interior.
pub struct EmojiPlugin;

impl CarbonPlugin for EmojiPlugin {
    fn name(&self) -> &'static str {
        "emoji"
    }

    fn spec(&self) -> NodeSpec {
        NodeSpec {
            inline: true,
            atom: true,
            focusable: true,
            selectable: true,
            groups: vec!["inline".to_string()],
            default_props: json!({ "char": "🙂" }),
            ..NodeSpec::default()
        }
    }

    fn serialize(&self, node: &Node, _nodes: &NodeMap, _schema: &Schema) -> String {
        node.props
            .get("remote/char")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    }
}

fn serialize_children(node: &Node, nodes: &NodeMap, schema: &Schema) -> Vec<String> {
    node.children()
        .iter()
        .filter_map(|&child| nodes.get(child))
        .map(|child| schema.plugin(child.type_id).serialize(child, nodes, schema))
        .collect()
}
