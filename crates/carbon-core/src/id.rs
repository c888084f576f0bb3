use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Which kind of node an id was minted for.
///
/// Block ids identify container/inline structure nodes, text ids identify
/// text runs. The two scopes share one serial counter so that ids sort by
/// creation order regardless of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IdScope {
    Block,
    Text,
}

/// Stable identity of one node in the document tree.
///
/// Ids are opaque value types: equality and ordering are structural, and the
/// ordering is the creation order of the nodes (the serial is issued by a
/// single [`IdGenerator`]). Ids survive copy-on-write edits — an unedited
/// subtree keeps its ids across states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    scope: IdScope,
    serial: u64,
}

impl NodeId {
    pub fn block(serial: u64) -> Self {
        NodeId {
            scope: IdScope::Block,
            serial,
        }
    }

    pub fn text(serial: u64) -> Self {
        NodeId {
            scope: IdScope::Text,
            serial,
        }
    }

    pub fn scope(&self) -> IdScope {
        self.scope
    }

    pub fn is_text_scoped(&self) -> bool {
        self.scope == IdScope::Text
    }
}

// Creation order first, scope only as a tie-break for ids minted outside the
// shared generator (e.g. parsed from transport).
impl Ord for NodeId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.serial
            .cmp(&other.serial)
            .then(self.scope.cmp(&other.scope))
    }
}

impl PartialOrd for NodeId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.scope {
            IdScope::Block => 'b',
            IdScope::Text => 't',
        };
        write!(f, "{}{}", tag, self.serial)
    }
}

/// Error parsing a [`NodeId`] from its transport form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid node id: {0:?}")]
pub struct ParseIdError(pub String);

impl FromStr for NodeId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let scope = match chars.next() {
            Some('b') => IdScope::Block,
            Some('t') => IdScope::Text,
            _ => return Err(ParseIdError(s.to_string())),
        };
        let serial: u64 = chars
            .as_str()
            .parse()
            .map_err(|_| ParseIdError(s.to_string()))?;
        Ok(NodeId { scope, serial })
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|e: ParseIdError| D::Error::custom(e))
    }
}

/// Issues fresh [`NodeId`]s in creation order.
///
/// One generator lives on the editor session and is threaded through every
/// draft, so ids stay unique across transactions (including rolled-back ones,
/// which may burn serials — monotonicity is all that matters).
#[derive(Debug, Default, Clone)]
pub struct IdGenerator {
    next: u64,
}

impl IdGenerator {
    pub fn new() -> Self {
        IdGenerator::default()
    }

    /// Start issuing after the given serial, used when adopting a document
    /// whose transport form already carries ids.
    pub fn starting_after(serial: u64) -> Self {
        IdGenerator { next: serial + 1 }
    }

    pub fn block(&mut self) -> NodeId {
        NodeId::block(self.bump())
    }

    pub fn text(&mut self) -> NodeId {
        NodeId::text(self.bump())
    }

    /// Make sure future ids sort after `id`, e.g. after re-inserting a
    /// snapshotted subtree during undo.
    pub fn reserve(&mut self, id: NodeId) {
        if id.serial >= self.next {
            self.next = id.serial + 1;
        }
    }

    fn bump(&mut self) -> u64 {
        let serial = self.next;
        self.next += 1;
        serial
    }
}
