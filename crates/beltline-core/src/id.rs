use serde::{Serialize, Deserialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a node (machine, splitter, merger, or group) on the canvas.
    pub struct NodeId;

    /// Identifies a port owned by a node.
    pub struct PortId;

    /// Identifies a connection (belt or pipe) between two ports.
    pub struct ConnectionId;
}

/// Identifies an item type in the external catalog. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(pub u32);
