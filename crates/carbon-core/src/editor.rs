//! The top-level engine handle: owns the schema, the id generator, the
//! current state and the undo history.

use crate::action::{CarbonAction, Origin};
use crate::draft::Draft;
use crate::error::CarbonError;
use crate::id::{IdGenerator, NodeId};
use crate::node::NodeJson;
use crate::schema::Schema;
use crate::state::State;
use crate::transaction::{Transaction, TxStage};
use std::sync::Arc;

pub struct Editor {
    schema: Schema,
    ids: IdGenerator,
    state: Arc<State>,
    /// Executed action lists of committed transactions, oldest first.
    /// `NoSync` commits (undo itself) are never recorded here.
    history: Vec<Vec<CarbonAction>>,
    subscribers: Vec<Box<dyn FnMut(&State)>>,
}

impl Editor {
    /// Builds the initial state from a document description. Containers the
    /// description leaves empty are filled to their grammar's minimum.
    pub fn new(schema: Schema, doc: &NodeJson) -> Result<Editor, CarbonError> {
        let mut ids = IdGenerator::new();
        let mut nodes = crate::store::NodeMap::new();
        let root = schema.node_from_json(doc, &mut ids, &mut nodes)?;
        log::info!("editor initialized with {} nodes", nodes.len());
        Ok(Editor {
            schema,
            ids,
            state: Arc::new(State::initial(root, nodes)),
            history: Vec::new(),
            subscribers: Vec::new(),
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn state(&self) -> &Arc<State> {
        &self.state
    }

    pub fn root(&self) -> NodeId {
        self.state.root()
    }

    /// Number of undoable transactions.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Registers a listener invoked with every newly committed state.
    pub fn subscribe(&mut self, listener: impl FnMut(&State) + 'static) {
        self.subscribers.push(Box::new(listener));
    }

    /// Runs a transaction through the draft pipeline. On success the new
    /// state becomes current, the executed actions are recorded for undo
    /// (unless the origin is `NoSync`) and subscribers are notified; on
    /// failure the transaction rolls back and the state is untouched.
    pub fn commit(&mut self, mut tx: Transaction) -> Result<(), CarbonError> {
        tx.optimize();
        tx.set_stage(TxStage::Executing);
        let base = Arc::clone(&self.state);
        let produced = Draft::produce(base, &self.schema, &mut self.ids, |draft| {
            for action in tx.actions_mut() {
                action.execute(draft)?;
            }
            Ok(())
        });
        match produced {
            Ok(next) => {
                tx.set_stage(TxStage::Committed);
                self.state = Arc::new(next);
                if tx.origin() != Origin::NoSync {
                    self.history.push(tx.into_actions());
                }
                let state = Arc::clone(&self.state);
                for listener in &mut self.subscribers {
                    listener(&state);
                }
                Ok(())
            }
            Err(err) => {
                tx.set_stage(TxStage::RolledBack);
                log::warn!("transaction rolled back: {err}");
                Err(err)
            }
        }
    }

    /// Reverts the most recent recorded transaction by committing the
    /// inverses of its actions in reverse order. Returns `false` when there
    /// is nothing to undo.
    pub fn undo(&mut self) -> Result<bool, CarbonError> {
        let Some(actions) = self.history.pop() else {
            return Ok(false);
        };
        let mut inverses = Vec::with_capacity(actions.len());
        for action in actions.iter().rev() {
            inverses.push(action.inverse(Origin::NoSync)?);
        }
        let tx = Transaction::from_actions(inverses, Origin::NoSync);
        match self.commit(tx) {
            Ok(()) => Ok(true),
            Err(err) => {
                // The forward record is still valid; keep it.
                self.history.push(actions);
                Err(err)
            }
        }
    }

    /// Routes a UI event to the plugin of the targeted node. Returns whether
    /// the event was handled (and its transaction committed).
    pub fn handle_event(&mut self, event: &str, target: NodeId) -> Result<bool, CarbonError> {
        let event = crate::plugin::normalize_event_name(event);
        let state = Arc::clone(&self.state);
        let node = state.nodes().node(target)?;
        let handled = self
            .schema
            .plugin(node.type_id)
            .handle_event(&event, node, &state);
        match handled {
            Some(tx) => {
                self.commit(tx)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Plain-text rendition of the whole document via the plugin
    /// serializers.
    pub fn serialize_document(&self) -> String {
        let nodes = self.state.nodes();
        match nodes.get(self.state.root()) {
            Some(root) => self
                .schema
                .plugin(root.type_id)
                .serialize(root, nodes, &self.schema),
            None => String::new(),
        }
    }

    /// Transport form of the whole document, ids included.
    pub fn doc_json(&self) -> Result<NodeJson, CarbonError> {
        self.state.nodes().to_json(self.state.root(), &self.schema)
    }
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("root", &self.state.root())
            .field("nodes", &self.state.nodes().len())
            .field("history", &self.history.len())
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
