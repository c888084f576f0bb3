use crate::id::NodeId;

/// Failure taxonomy for the engine.
///
/// All variants are raised synchronously while a draft is being produced; the
/// draft catches them at the batch boundary, discards every partial mutation
/// and surfaces the error to the caller. A failed transaction is a no-op from
/// the document's perspective.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CarbonError {
    /// An action referenced a node that is absent from the draft: already
    /// removed, or never existed.
    #[error("node not found: {0}")]
    NotFound(NodeId),

    /// A proposed child sequence does not match the target's content grammar
    /// (and auto-repair could not complete it), or a node description named a
    /// type the schema does not know.
    #[error("schema violation ({node_type}): {reason}")]
    SchemaViolation { node_type: String, reason: String },

    /// A pin or step-mapping operation was asked to move before the start or
    /// past the end of its text block. Never silently clamped — callers
    /// differ on whether they want clamping or to stop at the boundary.
    #[error("step {step} out of range for block of {total} steps")]
    OutOfRange { step: i64, total: u64 },

    /// A programming-contract error, e.g. requesting the inverse of an action
    /// that was never executed. Not a recoverable runtime condition.
    #[error("invariant broken: {0}")]
    InvariantBroken(String),
}

impl CarbonError {
    pub(crate) fn invariant(msg: impl Into<String>) -> Self {
        CarbonError::InvariantBroken(msg.into())
    }
}
