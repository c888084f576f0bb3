//! Mutable staging area between two immutable states.
//!
//! [`Draft::produce`] clones the base state's node map (cheap, the entries
//! are shared `Arc`s), hands the draft to a closure that runs actions
//! against it, then normalizes, reconciles the selection and commits a new
//! [`State`]. Any error anywhere in that pipeline abandons the draft
//! wholesale, so observers only ever see the base state or the fully
//! normalized result.

use crate::action::{CarbonAction, MarkOp, RemovedSnapshot};
use crate::error::CarbonError;
use crate::id::{IdGenerator, NodeId};
use crate::node::{ContentJson, Mark, NodeData, NodeJson};
use crate::pin::steps::{self, StepMap};
use crate::pin::{enclosing_text_block, Pin, Point, SelectionState};
use crate::schema::{NodeTypeId, Schema};
use crate::state::{Changes, State};
use crate::store::NodeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Passes over the plugin normalize hooks before giving up; hooks that keep
/// producing work past this are cyclic.
const MAX_NORMALIZE_PASSES: usize = 8;

pub struct Draft<'a> {
    schema: &'a Schema,
    ids: &'a mut IdGenerator,
    root: NodeId,
    nodes: NodeMap,
    selection: SelectionState,
    marks: Vec<Mark>,
    touched: BTreeSet<NodeId>,
    /// Inline-coordinate translations recorded in edit order, keyed by the
    /// text block they apply to.
    step_maps: Vec<(NodeId, StepMap)>,
    explicit_selection: bool,
}

impl<'a> Draft<'a> {
    /// Runs `edits` against a draft of `base` and commits the result as the
    /// next state. All-or-nothing: an error from the edits, a normalize
    /// failure or an unrepairable grammar violation leaves `base` as the
    /// current state.
    pub fn produce<F>(
        base: Arc<State>,
        schema: &Schema,
        ids: &mut IdGenerator,
        edits: F,
    ) -> Result<State, CarbonError>
    where
        F: FnOnce(&mut Draft<'_>) -> Result<(), CarbonError>,
    {
        let mut draft = Draft {
            schema,
            ids,
            root: base.root(),
            nodes: base.nodes().clone(),
            selection: base.selection().clone(),
            marks: base.marks().to_vec(),
            touched: BTreeSet::new(),
            step_maps: Vec::new(),
            explicit_selection: false,
        };
        edits(&mut draft)?;
        draft.normalize()?;
        if !draft.explicit_selection {
            draft.reconcile_selection();
        }
        let changes = draft.commit_changes();
        log::debug!(
            "commit: {} nodes touched, {} inline maps",
            changes.touched.len(),
            draft.step_maps.len()
        );
        Ok(State::committed(
            draft.root,
            draft.nodes,
            draft.selection,
            draft.marks,
            changes,
            base,
        ))
    }

    pub fn schema(&self) -> &Schema {
        self.schema
    }

    pub fn nodes(&self) -> &NodeMap {
        &self.nodes
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Materializes `json` and places it at `at`. Inline content addressed
    /// at a text block or an inline leaf goes through the step-coordinate
    /// primitives (the containing leaf is split as needed); everything else
    /// — block content, and inline content addressed at a non-atomic
    /// inline container (a mark span) — attaches to the target's child
    /// sequence directly. Returns the new id plus the `(head, tail)` pair
    /// of a leaf split to make room, so the insertion's counter-action can
    /// rejoin the halves.
    pub fn insert_node(
        &mut self,
        at: &Point,
        json: &NodeJson,
    ) -> Result<(NodeId, Option<(NodeId, NodeId)>), CarbonError> {
        let type_id = self.schema.type_id(&json.name)?;
        let spec = self.schema.spec(type_id);
        let is_inline = spec.inline || spec.text;
        if is_inline && self.targets_inline(at)? {
            let (block, step) = self.step_of_point(at)?;
            let (id, map, split) = steps::insert_inp(
                &mut self.nodes,
                self.schema,
                self.ids,
                block,
                step,
                json,
            )?;
            self.step_maps.push((block, map));
            self.touch(block);
            self.touch(id);
            Ok((id, split))
        } else {
            let (parent, index) = self.attach_point(at)?;
            let id = self.schema.node_from_json(json, self.ids, &mut self.nodes)?;
            self.nodes.attach(parent, index, id)?;
            if is_inline {
                // Structurally attached inline content (restored into a
                // span) still shifts step coordinates; record the span it
                // now occupies.
                if let Ok((block, start, end, new_total)) = self.inline_span(id) {
                    let len = end - start;
                    self.step_maps.push((
                        block,
                        StepMap::Insert {
                            at: start,
                            len,
                            old_total: new_total - len,
                        },
                    ));
                }
            }
            self.touch(parent);
            self.touch(id);
            Ok((id, None))
        }
    }

    /// Inserts a sequence of siblings starting at `at`, each following the
    /// previous one. At most the first insertion can split a leaf; the
    /// split pair is returned alongside the new ids.
    pub fn insert_fragment(
        &mut self,
        at: &Point,
        nodes: &[NodeJson],
    ) -> Result<(Vec<NodeId>, Option<(NodeId, NodeId)>), CarbonError> {
        let mut out = Vec::with_capacity(nodes.len());
        let mut split = None;
        let mut cursor = *at;
        for json in nodes {
            let (id, leaf_split) = self.insert_node(&cursor, json)?;
            if split.is_none() {
                split = leaf_split;
            }
            cursor = Point::after(id);
            out.push(id);
        }
        Ok((out, split))
    }

    /// Detaches and deletes the subtree at `id`, returning the snapshot its
    /// inverse re-inserts. The document root cannot be removed.
    pub fn remove_node(&mut self, id: NodeId) -> Result<RemovedSnapshot, CarbonError> {
        if id == self.root {
            return Err(CarbonError::invariant("cannot remove the document root"));
        }
        let node = self.nodes.node(id)?;
        let spec = self.schema.spec(node.type_id);
        let inline = spec.inline || spec.text;
        let at = self.position_of(id)?;
        let json = self.nodes.to_json(id, self.schema)?;

        // For inline content, record the vacated step span so pins after it
        // can be carried to the new coordinates.
        let span = if inline {
            self.inline_span(id).ok()
        } else {
            None
        };

        let (parent, _) = self.nodes.detach(id)?;
        self.nodes.remove_subtree(id)?;
        if let Some((block, start, end, old_total)) = span {
            self.step_maps.push((
                block,
                StepMap::Remove {
                    start,
                    end,
                    old_total,
                },
            ));
        }
        self.touch(parent);
        self.touch(id);
        Ok(RemovedSnapshot { node: json, at })
    }

    /// Re-parents `id` at `to`, returning the position it came from. Moves
    /// are structural: `to` is resolved against child sequences, and moving
    /// a node into its own subtree is rejected.
    pub fn move_node(&mut self, to: &Point, id: NodeId) -> Result<Point, CarbonError> {
        if id == self.root {
            return Err(CarbonError::invariant("cannot move the document root"));
        }
        if self.nodes.descendants(id)?.contains(&to.node()) {
            return Err(CarbonError::invariant(format!(
                "cannot move {id} into its own subtree"
            )));
        }
        let from = self.position_of(id)?;
        let (old_parent, _) = self.nodes.detach(id)?;
        let (parent, index) = self.attach_point(to)?;
        self.nodes.attach(parent, index, id)?;
        self.touch(old_parent);
        self.touch(parent);
        self.touch(id);
        Ok(from)
    }

    /// Replaces a node's content wholesale: the text of a text run, or the
    /// full child sequence of a container. Returns the prior content.
    pub fn set_content(
        &mut self,
        id: NodeId,
        content: &ContentJson,
    ) -> Result<ContentJson, CarbonError> {
        match content {
            ContentJson::Text(text) => {
                let node = self.nodes.node(id)?;
                let old = node
                    .text_run()
                    .ok_or_else(|| CarbonError::SchemaViolation {
                        node_type: self.schema.name_of(node.type_id).to_string(),
                        reason: "text content set on a container".to_string(),
                    })?
                    .to_string();
                let span = self.inline_span(id).ok();
                let new_text = text.clone();
                self.nodes.update(id, |n| {
                    n.data = NodeData::Text(new_text);
                })?;
                self.nodes.bump_spine(id);
                if let Some((block, start, end, old_total)) = span {
                    let new_len = text.chars().count() as u64;
                    self.step_maps.push((
                        block,
                        StepMap::Remove {
                            start,
                            end,
                            old_total,
                        },
                    ));
                    self.step_maps.push((
                        block,
                        StepMap::Insert {
                            at: start,
                            len: new_len,
                            old_total: old_total - (end - start),
                        },
                    ));
                }
                self.touch(id);
                Ok(ContentJson::Text(old))
            }
            ContentJson::Children(kids) => {
                let node = self.nodes.node(id)?;
                if node.is_text() {
                    return Err(CarbonError::SchemaViolation {
                        node_type: self.schema.name_of(node.type_id).to_string(),
                        reason: "child content set on a text run".to_string(),
                    });
                }
                let old_children = node.children().to_vec();
                let links = node.links().cloned().unwrap_or_default();
                let mut before = Vec::with_capacity(old_children.len());
                for &child in &old_children {
                    before.push(self.nodes.to_json(child, self.schema)?);
                }
                for &child in &old_children {
                    self.nodes.update(child, |n| n.parent = None)?;
                    self.nodes.remove_subtree(child)?;
                    self.touch(child);
                }
                let mut new_children = Vec::with_capacity(kids.len());
                for kid in kids {
                    let child = self.schema.node_from_json(kid, self.ids, &mut self.nodes)?;
                    self.nodes.update(child, |n| n.parent = Some(id))?;
                    self.touch(child);
                    new_children.push(child);
                }
                self.nodes.set_structure(id, new_children, links)?;
                self.nodes.bump_spine(id);
                self.touch(id);
                Ok(ContentJson::Children(before))
            }
        }
    }

    /// Applies a partial property update and returns the inverse partial.
    pub fn update_props(
        &mut self,
        id: NodeId,
        props: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<serde_json::Map<String, serde_json::Value>, CarbonError> {
        let mut before = serde_json::Map::new();
        self.nodes.update(id, |node| {
            before = node.props.merge(props);
        })?;
        self.nodes.bump_spine(id);
        self.touch(id);
        Ok(before)
    }

    /// Adds or removes a mark on a node, or on the state-level active mark
    /// set when `node_id` is `None`. Returns whether anything changed;
    /// adding a present mark or removing an absent one is a no-op.
    pub fn update_mark(
        &mut self,
        node_id: Option<NodeId>,
        op: MarkOp,
        mark: &Mark,
    ) -> Result<bool, CarbonError> {
        match node_id {
            None => {
                let present = self.marks.iter().any(|m| m.name == mark.name);
                match op {
                    MarkOp::Add if !present => {
                        self.marks.push(mark.clone());
                        Ok(true)
                    }
                    MarkOp::Remove if present => {
                        self.marks.retain(|m| m.name != mark.name);
                        Ok(true)
                    }
                    _ => Ok(false),
                }
            }
            Some(id) => {
                let mut changed = false;
                let mark = mark.clone();
                self.nodes.update(id, |node| {
                    let present = node.marks.iter().any(|m| m.name == mark.name);
                    match op {
                        MarkOp::Add if !present => {
                            node.marks.push(mark);
                            changed = true;
                        }
                        MarkOp::Remove if present => {
                            node.marks.retain(|m| m.name != mark.name);
                            changed = true;
                        }
                        _ => {}
                    }
                })?;
                if changed {
                    self.nodes.bump_spine(id);
                    self.touch(id);
                }
                Ok(changed)
            }
        }
    }

    /// Replaces the selection, validating that every referenced node exists.
    /// An explicit selection suppresses the automatic pin reconciliation at
    /// commit.
    pub fn update_selection(
        &mut self,
        selection: SelectionState,
    ) -> Result<SelectionState, CarbonError> {
        if let Some(pinned) = &selection.pinned {
            self.nodes.node(pinned.head.block)?;
            self.nodes.node(pinned.head.node)?;
            self.nodes.node(pinned.tail.block)?;
            self.nodes.node(pinned.tail.node)?;
        }
        for &id in &selection.blocks.nodes {
            self.nodes.node(id)?;
        }
        self.explicit_selection = true;
        Ok(std::mem::replace(&mut self.selection, selection))
    }

    /// Splits the text leaf containing `step` in `block`. Coordinates are
    /// unchanged; only the leaf structure is.
    pub fn split_text(&mut self, block: NodeId, step: i64) -> Result<(), CarbonError> {
        let (map, _) = steps::split_inp(&mut self.nodes, self.schema, self.ids, block, step)?;
        self.step_maps.push((block, map));
        self.touch(block);
        Ok(())
    }

    /// Appends `tail`'s text onto `head` and deletes `tail`. Counter-edit
    /// of a leaf split: once the content inserted between the halves is
    /// removed, rejoining restores the original run under `head`'s id.
    /// Total steps are unchanged, so no step map is recorded.
    pub fn rejoin_text(&mut self, head: NodeId, tail: NodeId) -> Result<(), CarbonError> {
        let head_node = self.nodes.node(head)?;
        let tail_node = self.nodes.node(tail)?;
        let (Some(_), Some(tail_text)) = (head_node.text_run(), tail_node.text_run()) else {
            return Err(CarbonError::invariant(format!(
                "rejoin targets {head} and {tail} are not text runs"
            )));
        };
        let tail_text = tail_text.to_string();
        if head_node.parent != tail_node.parent
            || self.nodes.index_in_parent(tail)? != self.nodes.index_in_parent(head)? + 1
        {
            return Err(CarbonError::invariant(format!(
                "{tail} does not follow {head}"
            )));
        }
        self.nodes.detach(tail)?;
        self.nodes.remove_subtree(tail)?;
        self.nodes.update(head, |n| {
            if let NodeData::Text(text) = &mut n.data {
                text.push_str(&tail_text);
            }
        })?;
        self.nodes.bump_spine(head);
        self.touch(head);
        self.touch(tail);
        Ok(())
    }

    /// Removes the inline span `start..end` of `block`, returning the
    /// removed leaves' snapshots.
    pub fn remove_span(
        &mut self,
        block: NodeId,
        start: i64,
        end: i64,
    ) -> Result<Vec<NodeJson>, CarbonError> {
        let (removed, map) =
            steps::remove_inp(&mut self.nodes, self.schema, self.ids, block, start, end)?;
        self.step_maps.push((block, map));
        self.touch(block);
        Ok(removed)
    }

    fn touch(&mut self, id: NodeId) {
        self.touched.insert(id);
    }

    /// Whether `at` addresses into inline/step coordinate space: the target
    /// is a text block or an inline leaf (text run or atom). Non-atomic
    /// inline containers are excluded; points on them address a child
    /// index, so content restored into a span lands inside the span.
    fn targets_inline(&self, at: &Point) -> Result<bool, CarbonError> {
        let node = self.nodes.node(at.node())?;
        let spec = self.schema.spec(node.type_id);
        Ok(spec.text_block || spec.text || (spec.inline && spec.atom))
    }

    /// Block and step coordinate addressed by an inline-space point.
    fn step_of_point(&self, at: &Point) -> Result<(NodeId, i64), CarbonError> {
        let target = self.nodes.node(at.node())?;
        let spec = self.schema.spec(target.type_id);
        if spec.text_block {
            let block = at.node();
            let step = match *at {
                Point::Before { .. } => 0,
                Point::After { .. } => -1,
                Point::Within { offset, .. } => offset as i64,
            };
            return Ok((block, step));
        }
        let block = enclosing_text_block(at.node(), &self.nodes, self.schema)?;
        let leaf = steps::leaves_of(&self.nodes, self.schema, block)?
            .into_iter()
            .find(|leaf| leaf.id == at.node())
            .ok_or(CarbonError::NotFound(at.node()))?;
        let step = match *at {
            Point::Before { .. } => leaf.prefix as i64,
            Point::After { .. } => (leaf.prefix + leaf.size) as i64,
            Point::Within { offset, .. } => leaf.prefix as i64 + offset,
        };
        Ok((block, step))
    }

    /// Structural attachment target of a point: `(parent, child index)`.
    fn attach_point(&self, at: &Point) -> Result<(NodeId, usize), CarbonError> {
        match *at {
            Point::Within { node, offset } => {
                self.nodes.node(node)?;
                let index = usize::try_from(offset).map_err(|_| {
                    CarbonError::invariant(format!("negative child index {offset} at {node}"))
                })?;
                Ok((node, index))
            }
            Point::Before { node } => {
                let index = self.nodes.index_in_parent(node)?;
                let parent = self
                    .nodes
                    .node(node)?
                    .parent
                    .ok_or_else(|| CarbonError::invariant(format!("{node} has no parent")))?;
                Ok((parent, index))
            }
            Point::After { node } => {
                let index = self.nodes.index_in_parent(node)?;
                let parent = self
                    .nodes
                    .node(node)?
                    .parent
                    .ok_or_else(|| CarbonError::invariant(format!("{node} has no parent")))?;
                Ok((parent, index + 1))
            }
        }
    }

    /// Snapshot point for a node's current position, chosen so re-inserting
    /// at it restores the exact spot whether the node is inline or block.
    fn position_of(&self, id: NodeId) -> Result<Point, CarbonError> {
        let index = self.nodes.index_in_parent(id)?;
        if index > 0 {
            let parent = self
                .nodes
                .node(id)?
                .parent
                .ok_or_else(|| CarbonError::invariant(format!("{id} has no parent")))?;
            let prev = self.nodes.node(parent)?.children()[index - 1];
            Ok(Point::after(prev))
        } else {
            let parent = self
                .nodes
                .node(id)?
                .parent
                .ok_or_else(|| CarbonError::invariant(format!("{id} has no parent")))?;
            Ok(Point::start_of(parent))
        }
    }

    /// Step span `(block, start, end, block total)` occupied by an inline
    /// node's leaves.
    fn inline_span(&self, id: NodeId) -> Result<(NodeId, u64, u64, u64), CarbonError> {
        let block = enclosing_text_block(id, &self.nodes, self.schema)?;
        let subtree: BTreeSet<NodeId> = self.nodes.descendants(id)?.into_iter().collect();
        let leaves = steps::leaves_of(&self.nodes, self.schema, block)?;
        let total = leaves.last().map(|l| l.prefix + l.size).unwrap_or(0);
        let mut start = None;
        let mut end = 0;
        for leaf in &leaves {
            if subtree.contains(&leaf.id) {
                start.get_or_insert(leaf.prefix);
                end = leaf.prefix + leaf.size;
            }
        }
        let start = start.ok_or(CarbonError::NotFound(id))?;
        Ok((block, start, end, total))
    }

    /// Plugin normalize hooks to a fixed point, then grammar validation
    /// with filler repair. Hooks that still produce work after
    /// `MAX_NORMALIZE_PASSES` are cyclic; the transaction fails rather than
    /// committing a half-normalized tree.
    fn normalize(&mut self) -> Result<(), CarbonError> {
        let mut pass = 0;
        loop {
            let mut actions: Vec<CarbonAction> = Vec::new();
            for id in self.touched.iter().copied().collect::<Vec<_>>() {
                let Some(node) = self.nodes.get(id) else {
                    continue;
                };
                actions.extend(self.schema.plugin(node.type_id).normalize(
                    node,
                    &self.nodes,
                    self.schema,
                ));
            }
            if actions.is_empty() {
                break;
            }
            if pass == MAX_NORMALIZE_PASSES {
                return Err(CarbonError::invariant(
                    "plugin normalize hooks did not reach a fixed point",
                ));
            }
            log::trace!("normalize pass {pass}: {} actions", actions.len());
            for mut action in actions {
                action.execute(self)?;
            }
            pass += 1;
        }
        self.repair_grammar()
    }

    fn repair_grammar(&mut self) -> Result<(), CarbonError> {
        let candidates: Vec<NodeId> = self
            .touched
            .iter()
            .copied()
            .filter(|&id| self.nodes.contains(id))
            .collect();
        for id in candidates {
            if self.nodes.node(id)?.is_text() {
                continue;
            }
            let type_id = self.nodes.node(id)?.type_id;
            let seq = self.child_types(id)?;
            let matcher = &self.schema.node_type(type_id).content_match;
            if matcher.validate(&seq) {
                continue;
            }
            if let Some(fills) = matcher.fill_after(&seq) {
                log::trace!(
                    "filling {} trailing children under {id}",
                    fills.len()
                );
                for fill in fills {
                    let child =
                        self.schema
                            .default_instance(fill, self.ids, &mut self.nodes)?;
                    let index = self.nodes.node(id)?.children().len();
                    self.nodes.attach(id, index, child)?;
                    self.touch(child);
                }
            } else if let Some(fills) = matcher.fill_before(&seq) {
                for (index, fill) in fills.into_iter().enumerate() {
                    let child =
                        self.schema
                            .default_instance(fill, self.ids, &mut self.nodes)?;
                    self.nodes.attach(id, index, child)?;
                    self.touch(child);
                }
            } else {
                return Err(self.grammar_violation(id, type_id));
            }
            let repaired = self.child_types(id)?;
            if !self.schema.node_type(type_id).content_match.validate(&repaired) {
                return Err(self.grammar_violation(id, type_id));
            }
        }
        Ok(())
    }

    fn child_types(&self, id: NodeId) -> Result<Vec<NodeTypeId>, CarbonError> {
        self.nodes
            .node(id)?
            .children()
            .iter()
            .map(|&child| Ok(self.nodes.node(child)?.type_id))
            .collect()
    }

    fn grammar_violation(&self, id: NodeId, type_id: NodeTypeId) -> CarbonError {
        CarbonError::SchemaViolation {
            node_type: self.schema.name_of(type_id).to_string(),
            reason: format!(
                "children of {id} do not match content grammar {:?}",
                self.schema.spec(type_id).content
            ),
        }
    }

    /// Carries the base state's pins through this draft's step maps and
    /// re-resolves them against the edited tree. Pins whose block vanished
    /// (and block selections on vanished nodes) are dropped.
    fn reconcile_selection(&mut self) {
        self.selection
            .blocks
            .nodes
            .retain(|&id| self.nodes.contains(id));
        let Some(pinned) = self.selection.pinned else {
            return;
        };
        let head = self.carry_pin(pinned.head);
        let tail = self.carry_pin(pinned.tail);
        self.selection.pinned = match (head, tail) {
            (Some(head), Some(tail)) => Some(crate::pin::PinnedSelection {
                head,
                tail,
                direction: pinned.direction,
            }),
            _ => None,
        };
    }

    fn carry_pin(&self, pin: Pin) -> Option<Pin> {
        if !self.nodes.contains(pin.block) {
            return None;
        }
        let mut step = pin.steps;
        for (block, map) in &self.step_maps {
            if *block == pin.block {
                step = map.map_step(step);
            }
        }
        Pin::at_step(pin.block, step, &self.nodes, self.schema)
            .or_else(|_| Pin::at_step(pin.block, -1, &self.nodes, self.schema))
            .ok()
    }

    /// Final change-set: every touched id plus the ancestor spine of those
    /// still present.
    fn commit_changes(&mut self) -> Changes {
        let mut touched = std::mem::take(&mut self.touched);
        for id in touched.clone() {
            if self.nodes.contains(id) {
                touched.extend(self.nodes.ancestors(id));
            }
        }
        Changes { touched }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::baseline_schema;
    use pretty_assertions::assert_eq;

    fn base() -> (Schema, IdGenerator, Arc<State>) {
        let schema = baseline_schema().unwrap();
        let mut ids = IdGenerator::new();
        let mut nodes = NodeMap::new();
        let doc = NodeJson::named("doc").with_children(vec![NodeJson::named("paragraph")
            .with_children(vec![NodeJson::text_run("text", "hi")])]);
        let root = schema.node_from_json(&doc, &mut ids, &mut nodes).unwrap();
        (schema, ids, Arc::new(State::initial(root, nodes)))
    }

    #[test]
    fn erring_edits_produce_no_state() {
        let (schema, mut ids, state) = base();
        let result = Draft::produce(Arc::clone(&state), &schema, &mut ids, |draft| {
            draft.remove_node(NodeId::block(404)).map(|_| ())
        });
        assert!(matches!(result, Err(CarbonError::NotFound(_))));
    }

    #[test]
    fn committed_state_links_to_its_base() {
        let (schema, mut ids, state) = base();
        let next = Draft::produce(Arc::clone(&state), &schema, &mut ids, |_| Ok(())).unwrap();
        assert!(Arc::ptr_eq(next.previous().unwrap(), &state));
        assert_eq!(next.text_content(), "hi");
    }

    #[test]
    fn redundant_mark_updates_report_no_change() {
        let (schema, mut ids, state) = base();
        let next = Draft::produce(state, &schema, &mut ids, |draft| {
            let bold = Mark::named("bold");
            assert!(draft.update_mark(None, MarkOp::Add, &bold)?);
            assert!(!draft.update_mark(None, MarkOp::Add, &bold)?);
            assert!(!draft.update_mark(None, MarkOp::Remove, &Mark::named("italic"))?);
            Ok(())
        })
        .unwrap();
        assert_eq!(next.marks().len(), 1);
    }

    #[test]
    fn remove_span_and_split_text_edit_inline_runs() {
        let (schema, mut ids, state) = base();
        let paragraph = state.nodes().node(state.root()).unwrap().children()[0];
        let next = Draft::produce(state, &schema, &mut ids, |draft| {
            let removed = draft.remove_span(paragraph, 0, 1)?;
            assert_eq!(removed.len(), 1);
            assert_eq!(removed[0].text.as_deref(), Some("h"));
            // Boundary split after the removal is a no-op.
            draft.split_text(paragraph, 1)
        })
        .unwrap();
        assert_eq!(next.text_content(), "i");
    }

    #[test]
    fn root_removal_is_refused() {
        let (schema, mut ids, state) = base();
        let root = state.root();
        let result = Draft::produce(state, &schema, &mut ids, |draft| {
            draft.remove_node(root).map(|_| ())
        });
        assert!(matches!(result, Err(CarbonError::InvariantBroken(_))));
    }
}
