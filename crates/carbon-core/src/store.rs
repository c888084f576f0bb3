//! Node arena with copy-on-write semantics.
//!
//! All nodes of one state generation live in a [`NodeMap`]: an ordered map
//! from [`NodeId`] to a shared node. A draft clones the map (cheap — values
//! are `Arc`s), then edits individual entries via `Arc::make_mut`, so every
//! node the draft does not touch stays physically shared with the base
//! state. Parent back-references are plain ids resolved through the map,
//! never ownership edges, which keeps subtree reuse across states cycle-free.

use crate::error::CarbonError;
use crate::id::NodeId;
use crate::node::{Node, NodeData, NodeJson};
use crate::schema::Schema;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeMap {
    nodes: BTreeMap<NodeId, Arc<Node>>,
}

impl NodeMap {
    pub fn new() -> Self {
        NodeMap::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id).map(|arc| arc.as_ref())
    }

    /// Looks up a node, raising `NotFound` for absent ids.
    pub fn node(&self, id: NodeId) -> Result<&Node, CarbonError> {
        self.get(id).ok_or(CarbonError::NotFound(id))
    }

    pub fn put(&mut self, node: Node) {
        self.nodes.insert(node.id, Arc::new(node));
    }

    /// Copy-on-write edit of one entry. The closure must not change the id.
    pub fn update(
        &mut self,
        id: NodeId,
        edit: impl FnOnce(&mut Node),
    ) -> Result<(), CarbonError> {
        let arc = self.nodes.get_mut(&id).ok_or(CarbonError::NotFound(id))?;
        edit(Arc::make_mut(arc));
        Ok(())
    }

    /// Replaces a container's children and links wholesale. Used by node
    /// construction; the caller is responsible for parent pointers.
    pub fn set_structure(
        &mut self,
        id: NodeId,
        children: Vec<NodeId>,
        links: BTreeMap<String, NodeId>,
    ) -> Result<(), CarbonError> {
        self.update(id, |node| {
            node.data = NodeData::Container { children, links };
        })
    }

    /// Inserts `child` at `index` of `parent`'s child sequence and sets the
    /// child's back-reference.
    pub fn attach(
        &mut self,
        parent: NodeId,
        index: usize,
        child: NodeId,
    ) -> Result<(), CarbonError> {
        if !self.contains(child) {
            return Err(CarbonError::NotFound(child));
        }
        let mut attached = false;
        self.update(parent, |node| {
            if let NodeData::Container { children, .. } = &mut node.data {
                let at = index.min(children.len());
                children.insert(at, child);
                attached = true;
            }
        })?;
        if !attached {
            return Err(CarbonError::invariant(format!(
                "cannot attach into text leaf {parent}"
            )));
        }
        self.update(child, |node| node.parent = Some(parent))?;
        self.bump_spine(parent);
        Ok(())
    }

    /// Removes `child` from its parent's sequence, clears the
    /// back-reference, and reports where it was.
    pub fn detach(&mut self, child: NodeId) -> Result<(NodeId, usize), CarbonError> {
        let parent = self
            .node(child)?
            .parent
            .ok_or_else(|| CarbonError::invariant(format!("{child} has no parent to detach from")))?;
        let index = self.index_in_parent(child)?;
        self.update(parent, |node| {
            if let NodeData::Container { children, .. } = &mut node.data {
                children.retain(|&c| c != child);
            }
        })?;
        self.update(child, |node| node.parent = None)?;
        self.bump_spine(parent);
        Ok((parent, index))
    }

    /// Position of a node within its parent's main child sequence.
    pub fn index_in_parent(&self, id: NodeId) -> Result<usize, CarbonError> {
        let parent = self
            .node(id)?
            .parent
            .ok_or_else(|| CarbonError::invariant(format!("{id} has no parent")))?;
        self.node(parent)?
            .children()
            .iter()
            .position(|&c| c == id)
            .ok_or_else(|| {
                CarbonError::invariant(format!("{id} not found among children of {parent}"))
            })
    }

    /// Deletes a node and its whole subtree (links included) from the arena.
    pub fn remove_subtree(&mut self, id: NodeId) -> Result<(), CarbonError> {
        for node_id in self.descendants(id)? {
            self.nodes.remove(&node_id);
        }
        Ok(())
    }

    /// Pre-order walk of the subtree rooted at `id`, root first. Link trees
    /// follow the main sequence at each node.
    pub fn descendants(&self, id: NodeId) -> Result<Vec<NodeId>, CarbonError> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = self.node(current)?;
            out.push(current);
            let mut below: Vec<NodeId> = node.children().to_vec();
            if let Some(links) = node.links() {
                below.extend(links.values().copied());
            }
            // Reverse so the stack pops in document order.
            for &child in below.iter().rev() {
                stack.push(child);
            }
        }
        Ok(out)
    }

    /// Ancestor chain of `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.get(id).and_then(|n| n.parent);
        while let Some(ancestor) = current {
            out.push(ancestor);
            current = self.get(ancestor).and_then(|n| n.parent);
        }
        out
    }

    /// Depth-first concatenation of text runs under `id`. Link trees are
    /// auxiliary attachments and do not contribute. Computed on demand, not
    /// cached, to keep the sharing model simple.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.get(current) else {
                continue;
            };
            match &node.data {
                NodeData::Text(text) => out.push_str(text),
                NodeData::Container { children, .. } => {
                    for &child in children.iter().rev() {
                        stack.push(child);
                    }
                }
            }
        }
        out
    }

    /// Bumps the render version of `id` and content versions up the
    /// ancestor spine — the change-detection signal for renderers.
    pub fn bump_spine(&mut self, id: NodeId) {
        if self.update(id, |node| {
            node.bump_render();
            node.bump_content();
        })
        .is_err()
        {
            return;
        }
        for ancestor in self.ancestors(id) {
            let _ = self.update(ancestor, Node::bump_content);
        }
    }

    /// Serializes the subtree at `id` into the transport form, ids included.
    pub fn to_json(&self, id: NodeId, schema: &Schema) -> Result<NodeJson, CarbonError> {
        let node = self.node(id)?;
        let mut json = NodeJson::named(schema.name_of(node.type_id));
        json.id = Some(node.id);
        json.props = node.props.remote_json();
        json.marks = node.marks.clone();
        match &node.data {
            NodeData::Text(text) => json.text = Some(text.clone()),
            NodeData::Container { children, links } => {
                for &child in children {
                    json.children.push(self.to_json(child, schema)?);
                }
                for (name, &link) in links {
                    json.links.insert(name.clone(), self.to_json(link, schema)?);
                }
            }
        }
        Ok(json)
    }

    /// Ids currently present; ordered (NodeId sorts by creation).
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }
}
