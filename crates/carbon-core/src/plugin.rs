//! The extension seam: every node type is declared and driven by a plugin.
//!
//! A plugin contributes one node type's [`NodeSpec`] at schema build and is
//! then dispatched by dense type id for events, normalization and
//! serialization. Plugins never mutate state directly; they return
//! transactions (events) or actions (normalization) for the draft pipeline
//! to run.

use crate::action::CarbonAction;
use crate::node::Node;
use crate::schema::{NodeSpec, Schema};
use crate::state::State;
use crate::store::NodeMap;
use crate::transaction::Transaction;

pub trait CarbonPlugin {
    /// Node type name this plugin registers; must be unique in a schema.
    fn name(&self) -> &'static str;

    fn spec(&self) -> NodeSpec;

    /// Reacts to a named UI event (already normalized, e.g. `"ctrl+b"`)
    /// targeting a node of this type. `None` lets the event fall through.
    fn handle_event(&self, _event: &str, _node: &Node, _state: &State) -> Option<Transaction> {
        None
    }

    /// Structural cleanup run inside the commit pipeline on every touched
    /// node of this type, before grammar validation. Returned actions run
    /// against the same draft.
    fn normalize(&self, _node: &Node, _nodes: &NodeMap, _schema: &Schema) -> Vec<CarbonAction> {
        Vec::new()
    }

    /// Plain-text rendition of a node of this type.
    fn serialize(&self, node: &Node, nodes: &NodeMap, _schema: &Schema) -> String {
        nodes.text_content(node.id)
    }
}

/// Canonical form of a key event name: lowercased, modifiers sorted, parts
/// joined with `+`. `"Shift+Ctrl+B"` and `"ctrl+shift+b"` normalize to the
/// same string.
pub fn normalize_event_name(raw: &str) -> String {
    const MODIFIER_ORDER: [&str; 4] = ["ctrl", "alt", "shift", "meta"];
    let mut modifiers: Vec<&str> = Vec::new();
    let mut keys: Vec<String> = Vec::new();
    for part in raw.split('+') {
        let part = part.trim().to_lowercase();
        if part.is_empty() {
            continue;
        }
        match MODIFIER_ORDER.iter().position(|&m| m == part) {
            Some(rank) => {
                if !modifiers.contains(&MODIFIER_ORDER[rank]) {
                    modifiers.push(MODIFIER_ORDER[rank]);
                }
            }
            None => keys.push(part),
        }
    }
    modifiers.sort_by_key(|m| MODIFIER_ORDER.iter().position(|o| o == m));
    let mut parts: Vec<String> = modifiers.into_iter().map(String::from).collect();
    parts.extend(keys);
    parts.join("+")
}
