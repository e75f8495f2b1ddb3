use crate::id::{ItemId, NodeId};
use serde::{Deserialize, Serialize};

/// Which side of a node a port sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortDirection {
    Input,
    Output,
}

/// A typed connection endpoint on a node.
///
/// Ports are owned by their node's `inputs`/`outputs` lists and stored in
/// the graph's port arena; `owner` is an identity back-reference, not an
/// ownership edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    /// Human-readable label ("Iron Ore", "Output 2", ...).
    pub label: String,
    /// The item this port accepts or emits. `None` means any item
    /// (logistic ports on splitters and mergers).
    pub item: Option<ItemId>,
    /// Flow through this port in items/min. Computed state, zeroed at the
    /// start of every calculation pass.
    pub flow: f64,
    pub direction: PortDirection,
    /// The node this port belongs to.
    pub owner: NodeId,
}
