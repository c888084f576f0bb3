//! Schema registry: node types, their content grammars and structural flags.
//!
//! The schema is immutable after [`Schema::build`]. Build resolves every
//! plugin-declared type name to a dense [`NodeTypeId`] once, compiles each
//! content grammar to a [`ContentMatch`] automaton, and pins the plugin
//! dispatch table — after that nothing is looked up by string on the hot
//! path.

mod content;

pub use content::ContentMatch;

use crate::error::CarbonError;
use crate::id::{IdGenerator, NodeId};
use crate::node::{Node, NodeJson, NodeProps};
use crate::plugin::CarbonPlugin;
use crate::store::NodeMap;
use std::collections::BTreeMap;

/// Dense index of a registered node type, assigned at schema build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeTypeId(pub(crate) u16);

impl NodeTypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Declarative description of a node type, supplied by its plugin.
#[derive(Debug, Clone, Default)]
pub struct NodeSpec {
    /// Child content grammar, e.g. `"title content*"`. Empty means the node
    /// allows no children.
    pub content: String,
    /// Content groups this type belongs to; grammars may reference a group
    /// name to match any member.
    pub groups: Vec<String>,
    /// Text leaf: carries a string run, never children.
    pub text: bool,
    /// Atomic node: opaque unit with no addressable interior (counts as one
    /// step when inline).
    pub atom: bool,
    /// Edit operations do not cross this node's boundary.
    pub isolating: bool,
    pub focusable: bool,
    pub selectable: bool,
    /// Participates in inline content.
    pub inline: bool,
    /// Container whose subtree is addressed by steps (a title/text block).
    pub text_block: bool,
    /// Default property bag merged under every new instance.
    pub default_props: serde_json::Value,
}

/// A registered node type: spec plus compiled grammar.
#[derive(Debug)]
pub struct NodeType {
    pub id: NodeTypeId,
    pub name: String,
    pub spec: NodeSpec,
    pub content_match: ContentMatch,
}

/// Immutable registry built from the union of plugin-declared node types.
pub struct Schema {
    types: Vec<NodeType>,
    by_name: BTreeMap<String, NodeTypeId>,
    /// Index-aligned with `types`; the event/normalize dispatch table.
    plugins: Vec<Box<dyn CarbonPlugin>>,
}

/// Errors raised while building a schema. Distinct from [`CarbonError`]:
/// these are configuration mistakes, not runtime edit failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("duplicate node type {0:?}")]
    DuplicateType(String),
    #[error("unknown name {name:?} in content grammar of {owner:?}")]
    UnknownName { owner: String, name: String },
    #[error("content grammar of {owner:?} failed to parse: {message}")]
    Grammar { owner: String, message: String },
}

impl Schema {
    /// Builds the registry from plugin declarations. Grammar names resolve
    /// to concrete types first, then to groups (members in declaration
    /// order, which drives filler synthesis).
    pub fn build(plugins: Vec<Box<dyn CarbonPlugin>>) -> Result<Schema, SchemaError> {
        let mut by_name = BTreeMap::new();
        let mut specs = Vec::with_capacity(plugins.len());
        for (index, plugin) in plugins.iter().enumerate() {
            let name = plugin.name().to_string();
            let id = NodeTypeId(index as u16);
            if by_name.insert(name.clone(), id).is_some() {
                return Err(SchemaError::DuplicateType(name));
            }
            specs.push((name, plugin.spec()));
        }

        let mut groups: BTreeMap<String, Vec<NodeTypeId>> = BTreeMap::new();
        for (index, (_, spec)) in specs.iter().enumerate() {
            for group in &spec.groups {
                groups
                    .entry(group.clone())
                    .or_default()
                    .push(NodeTypeId(index as u16));
            }
        }

        let resolve = |name: &str| -> Option<Vec<NodeTypeId>> {
            if let Some(&id) = by_name.get(name) {
                return Some(vec![id]);
            }
            groups.get(name).cloned()
        };

        let mut types = Vec::with_capacity(specs.len());
        for (index, (name, spec)) in specs.into_iter().enumerate() {
            let content_match = ContentMatch::compile(&name, &spec.content, &resolve)?;
            types.push(NodeType {
                id: NodeTypeId(index as u16),
                name,
                spec,
                content_match,
            });
        }

        log::debug!("schema built with {} node types", types.len());
        Ok(Schema {
            types,
            by_name,
            plugins,
        })
    }

    pub fn node_type(&self, id: NodeTypeId) -> &NodeType {
        &self.types[id.index()]
    }

    pub fn type_by_name(&self, name: &str) -> Option<&NodeType> {
        self.by_name.get(name).map(|&id| self.node_type(id))
    }

    pub fn type_id(&self, name: &str) -> Result<NodeTypeId, CarbonError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| CarbonError::SchemaViolation {
                node_type: name.to_string(),
                reason: "unknown node type".to_string(),
            })
    }

    pub fn name_of(&self, id: NodeTypeId) -> &str {
        &self.node_type(id).name
    }

    pub fn spec(&self, id: NodeTypeId) -> &NodeSpec {
        &self.node_type(id).spec
    }

    /// Plugin registered for a type; resolved by dense id, never by string.
    pub fn plugin(&self, id: NodeTypeId) -> &dyn CarbonPlugin {
        self.plugins[id.index()].as_ref()
    }

    pub fn types(&self) -> impl Iterator<Item = &NodeType> {
        self.types.iter()
    }

    /// Builds a node tree in `map` from its transport description,
    /// validating type existence and filling required content when the
    /// description leaves a container empty.
    pub fn node_from_json(
        &self,
        json: &NodeJson,
        ids: &mut IdGenerator,
        map: &mut NodeMap,
    ) -> Result<NodeId, CarbonError> {
        self.materialize(json, None, ids, map, 0)
    }

    /// Creates a default (empty-but-valid) instance of a type, recursively
    /// filling required children.
    pub fn default_instance(
        &self,
        type_id: NodeTypeId,
        ids: &mut IdGenerator,
        map: &mut NodeMap,
    ) -> Result<NodeId, CarbonError> {
        self.default_instance_at(type_id, None, ids, map, 0)
    }

    fn materialize(
        &self,
        json: &NodeJson,
        parent: Option<NodeId>,
        ids: &mut IdGenerator,
        map: &mut NodeMap,
        depth: usize,
    ) -> Result<NodeId, CarbonError> {
        self.check_depth(depth)?;
        let ty = self
            .type_by_name(&json.name)
            .ok_or_else(|| CarbonError::SchemaViolation {
                node_type: json.name.clone(),
                reason: "unknown node type".to_string(),
            })?;
        let type_id = ty.id;
        let is_text = ty.spec.text;

        let id = match json.id {
            Some(id) => {
                ids.reserve(id);
                id
            }
            None if is_text => ids.text(),
            None => ids.block(),
        };

        let mut node = if is_text {
            Node::text(id, type_id, json.text.clone().unwrap_or_default())
        } else {
            Node::container(id, type_id)
        };
        node.parent = parent;
        node.props = NodeProps::from_json(&self.spec(type_id).default_props);
        node.props.merge(&json.props);
        node.marks = json.marks.clone();
        map.put(node);

        if !is_text {
            let mut children = Vec::with_capacity(json.children.len());
            for child in &json.children {
                children.push(self.materialize(child, Some(id), ids, map, depth + 1)?);
            }
            if children.is_empty() {
                if let Some(fills) = self.node_type(type_id).content_match.fill_after(&[]) {
                    for fill in fills {
                        children.push(self.default_instance_at(
                            fill,
                            Some(id),
                            ids,
                            map,
                            depth + 1,
                        )?);
                    }
                }
            }
            let mut links = BTreeMap::new();
            for (name, link) in &json.links {
                links.insert(
                    name.clone(),
                    self.materialize(link, Some(id), ids, map, depth + 1)?,
                );
            }
            map.set_structure(id, children, links)?;
        }

        Ok(id)
    }

    fn default_instance_at(
        &self,
        type_id: NodeTypeId,
        parent: Option<NodeId>,
        ids: &mut IdGenerator,
        map: &mut NodeMap,
        depth: usize,
    ) -> Result<NodeId, CarbonError> {
        self.check_depth(depth)?;
        let spec = self.spec(type_id);
        let id = if spec.text { ids.text() } else { ids.block() };
        let mut node = if spec.text {
            Node::text(id, type_id, "")
        } else {
            Node::container(id, type_id)
        };
        node.parent = parent;
        node.props = NodeProps::from_json(&spec.default_props);
        map.put(node);

        if !spec.text {
            let fills = self
                .node_type(type_id)
                .content_match
                .fill_after(&[])
                .unwrap_or_default();
            let mut children = Vec::with_capacity(fills.len());
            for fill in fills {
                children.push(self.default_instance_at(fill, Some(id), ids, map, depth + 1)?);
            }
            map.set_structure(id, children, BTreeMap::new())?;
        }
        Ok(id)
    }

    fn check_depth(&self, depth: usize) -> Result<(), CarbonError> {
        // Guards against mutually-recursive required content.
        if depth > 64 {
            return Err(CarbonError::invariant(
                "node construction recursion exceeded 64 levels",
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("types", &self.by_name.keys().collect::<Vec<_>>())
            .finish()
    }
}
