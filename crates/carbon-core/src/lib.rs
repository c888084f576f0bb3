//! Structured-document editing engine.
//!
//! The document is a tree of typed nodes held in a copy-on-write arena
//! ([`store::NodeMap`]); node types, their content grammars and behavior
//! come from [`plugin::CarbonPlugin`]s compiled into an immutable
//! [`schema::Schema`]. All edits are [`action::CarbonAction`]s batched into
//! [`transaction::Transaction`]s and run through a [`draft::Draft`], which
//! normalizes, repairs grammar and commits a new immutable [`state::State`]
//! — or rolls the whole batch back. Inline positions are addressed by step
//! coordinates ([`pin`]), which survive edits via step maps instead of
//! re-resolution.
//!
//! ```ignore
//! let mut editor = Editor::new(baseline_schema()?, &doc)?;
//! Transaction::new(Origin::UserInput)
//!     .insert_text(title, 0, "Hello")
//!     .dispatch(&mut editor)?;
//! editor.undo()?;
//! ```

pub mod action;
pub mod draft;
pub mod editor;
pub mod error;
pub mod id;
pub mod node;
pub mod pin;
pub mod plugin;
pub mod plugins;
pub mod schema;
pub mod state;
pub mod store;
pub mod transaction;

pub use action::{CarbonAction, MarkOp, Origin, RemovedSnapshot};
pub use draft::Draft;
pub use editor::Editor;
pub use error::CarbonError;
pub use id::{IdGenerator, IdScope, NodeId};
pub use node::{ContentJson, Mark, Node, NodeData, NodeJson, NodeProps};
pub use pin::{
    BlockSelection, Direction, Pin, PinnedSelection, Point, SelectionState, StepMap,
};
pub use plugin::CarbonPlugin;
pub use plugins::{baseline_plugins, baseline_schema};
pub use schema::{ContentMatch, NodeSpec, NodeType, NodeTypeId, Schema, SchemaError};
pub use state::{Changes, State};
pub use store::NodeMap;
pub use transaction::{Transaction, TxStage};
