//! The factory graph: arena-owned nodes, ports, and connections plus the
//! editing API used by external collaborators (canvas, persistence).
//!
//! All cross-references between nodes, ports, and connections are arena
//! keys. Keys that no longer resolve (for example a connection left behind
//! by a recipe change) are skipped wherever they are looked up; the
//! calculator never surfaces them as errors.

use crate::catalog::{IngredientRole, MachineType, Recipe};
use crate::connection::{BeltClass, Connection};
use crate::id::{ConnectionId, ItemId, NodeId, PortId};
use crate::node::{
    LOGISTIC_PORT_MAX, LOGISTIC_PORT_MIN, MachineState, Node, NodeKind, SplitPolicy,
};
use crate::port::{Port, PortDirection};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::HashSet;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur while editing the graph. Calculation passes are
/// infallible; only the editing API reports these.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("node not found: {0:?}")]
    NodeNotFound(NodeId),
    #[error("port not found: {0:?}")]
    PortNotFound(PortId),
    #[error("port has the wrong direction for this connection: {0:?}")]
    WrongPortDirection(PortId),
    #[error("operation does not apply to this node kind: {0:?}")]
    WrongNodeKind(NodeId),
}

// ---------------------------------------------------------------------------
// FactoryGraph
// ---------------------------------------------------------------------------

/// The full production network: flat node/port/connection arenas plus the
/// group containment tree (parent links and child lists of key indices).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactoryGraph {
    pub(crate) nodes: SlotMap<NodeId, Node>,
    pub(crate) ports: SlotMap<PortId, Port>,
    pub(crate) connections: SlotMap<ConnectionId, Connection>,
}

impl FactoryGraph {
    /// Create a new, empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Node creation
    // -----------------------------------------------------------------------

    /// Add a machine node. When a recipe is given, one input port is built
    /// per consumed ingredient and one output port per produced ingredient.
    pub fn add_machine(
        &mut self,
        name: impl Into<String>,
        machine: Option<MachineType>,
        recipe: Option<Recipe>,
    ) -> NodeId {
        let node = self.insert_node(name.into(), NodeKind::Machine(MachineState::new(machine, None)));
        if recipe.is_some() {
            // Cannot fail: the node was just created as a machine.
            let _ = self.set_recipe(node, recipe);
        }
        node
    }

    /// Add a splitter: one input, `outputs` outputs (clamped to 1-3).
    pub fn add_splitter(
        &mut self,
        name: impl Into<String>,
        outputs: usize,
        policy: SplitPolicy,
    ) -> NodeId {
        let node = self.insert_node(name.into(), NodeKind::Splitter { policy });
        self.rebuild_splitter_ports(node, outputs);
        node
    }

    /// Add a merger: `inputs` inputs (clamped to 1-3), one output.
    pub fn add_merger(&mut self, name: impl Into<String>, inputs: usize) -> NodeId {
        let node = self.insert_node(name.into(), NodeKind::Merger);
        self.rebuild_merger_ports(node, inputs);
        node
    }

    /// Add an empty group. Its boundary ports are derived during each
    /// calculation pass, never authored here.
    pub fn add_group(&mut self, name: impl Into<String>) -> NodeId {
        self.insert_node(
            name.into(),
            NodeKind::Group {
                children: Vec::new(),
                description: String::new(),
            },
        )
    }

    fn insert_node(&mut self, name: String, kind: NodeKind) -> NodeId {
        self.nodes.insert(Node {
            name,
            parent: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            position: (0.0, 0.0),
            kind,
        })
    }

    // -----------------------------------------------------------------------
    // Node configuration
    // -----------------------------------------------------------------------

    /// Change a machine's active recipe, rebuilding its port list from
    /// scratch. Connections attached to the old ports are left dangling
    /// and skipped by the calculator.
    pub fn set_recipe(&mut self, node: NodeId, recipe: Option<Recipe>) -> Result<(), GraphError> {
        let data = self.nodes.get(node).ok_or(GraphError::NodeNotFound(node))?;
        if data.as_machine().is_none() {
            return Err(GraphError::WrongNodeKind(node));
        }

        self.clear_ports(node);

        let specs: Vec<(String, ItemId, PortDirection)> = recipe
            .iter()
            .flat_map(|r| r.ingredients.iter())
            .map(|ing| {
                let direction = match ing.role {
                    IngredientRole::Input => PortDirection::Input,
                    IngredientRole::Output => PortDirection::Output,
                };
                (ing.item.name.clone(), ing.item.id, direction)
            })
            .collect();

        if let Some(m) = self.nodes.get_mut(node).and_then(Node::as_machine_mut) {
            m.recipe = recipe;
        }
        for (label, item, direction) in specs {
            self.add_port(node, label, Some(item), direction);
        }
        Ok(())
    }

    /// Set a machine's overclock percentage (clamped to [1, 250]).
    pub fn set_overclock(&mut self, node: NodeId, percent: f64) -> Result<(), GraphError> {
        let data = self.nodes.get_mut(node).ok_or(GraphError::NodeNotFound(node))?;
        let m = data.as_machine_mut().ok_or(GraphError::WrongNodeKind(node))?;
        m.set_overclock_percent(percent);
        Ok(())
    }

    /// Change a splitter's output count (clamped to 1-3), rebuilding ports.
    pub fn set_splitter_outputs(&mut self, node: NodeId, outputs: usize) -> Result<(), GraphError> {
        let data = self.nodes.get(node).ok_or(GraphError::NodeNotFound(node))?;
        if !matches!(data.kind, NodeKind::Splitter { .. }) {
            return Err(GraphError::WrongNodeKind(node));
        }
        self.rebuild_splitter_ports(node, outputs);
        Ok(())
    }

    /// Change a splitter's distribution policy.
    pub fn set_splitter_policy(&mut self, node: NodeId, policy: SplitPolicy) -> Result<(), GraphError> {
        let data = self.nodes.get_mut(node).ok_or(GraphError::NodeNotFound(node))?;
        match &mut data.kind {
            NodeKind::Splitter { policy: p } => {
                *p = policy;
                Ok(())
            }
            _ => Err(GraphError::WrongNodeKind(node)),
        }
    }

    /// Change a merger's input count (clamped to 1-3), rebuilding ports.
    pub fn set_merger_inputs(&mut self, node: NodeId, inputs: usize) -> Result<(), GraphError> {
        let data = self.nodes.get(node).ok_or(GraphError::NodeNotFound(node))?;
        if !matches!(data.kind, NodeKind::Merger) {
            return Err(GraphError::WrongNodeKind(node));
        }
        self.rebuild_merger_ports(node, inputs);
        Ok(())
    }

    /// Set a group's description text.
    pub fn set_group_description(
        &mut self,
        node: NodeId,
        text: impl Into<String>,
    ) -> Result<(), GraphError> {
        let data = self.nodes.get_mut(node).ok_or(GraphError::NodeNotFound(node))?;
        match &mut data.kind {
            NodeKind::Group { description, .. } => {
                *description = text.into();
                Ok(())
            }
            _ => Err(GraphError::WrongNodeKind(node)),
        }
    }

    /// Move a node on the canvas. Missing nodes are ignored.
    pub fn set_position(&mut self, node: NodeId, x: f64, y: f64) {
        if let Some(data) = self.nodes.get_mut(node) {
            data.position = (x, y);
        }
    }

    // -----------------------------------------------------------------------
    // Group containment
    // -----------------------------------------------------------------------

    /// Put `child` inside `group`, re-parenting it away from any previous
    /// group.
    pub fn group_add_child(&mut self, group: NodeId, child: NodeId) -> Result<(), GraphError> {
        if !self.nodes.contains_key(child) {
            return Err(GraphError::NodeNotFound(child));
        }
        let data = self.nodes.get(group).ok_or(GraphError::NodeNotFound(group))?;
        if !data.is_group() {
            return Err(GraphError::WrongNodeKind(group));
        }

        let previous = self.nodes[child].parent;
        if previous == Some(group) {
            return Ok(());
        }
        if let Some(old) = previous {
            self.detach_from_children(old, child);
        }
        if let Some(NodeKind::Group { children, .. }) =
            self.nodes.get_mut(group).map(|n| &mut n.kind)
        {
            children.push(child);
        }
        self.nodes[child].parent = Some(group);
        Ok(())
    }

    /// Take `child` out of `group`, back to the canvas root.
    pub fn group_remove_child(&mut self, group: NodeId, child: NodeId) -> Result<(), GraphError> {
        let data = self.nodes.get(group).ok_or(GraphError::NodeNotFound(group))?;
        if !data.is_group() {
            return Err(GraphError::WrongNodeKind(group));
        }
        self.detach_from_children(group, child);
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = None;
        }
        Ok(())
    }

    fn detach_from_children(&mut self, group: NodeId, child: NodeId) {
        if let Some(NodeKind::Group { children, .. }) =
            self.nodes.get_mut(group).map(|n| &mut n.kind)
        {
            children.retain(|&c| c != child);
        }
    }

    /// All nodes contained in `group` at any depth. Empty when `group` is
    /// not a group. The visited set doubles as a brake against malformed
    /// containment loops.
    pub fn descendants(&self, group: NodeId) -> HashSet<NodeId> {
        let mut out = HashSet::new();
        self.collect_descendants(group, &mut out);
        out
    }

    fn collect_descendants(&self, group: NodeId, out: &mut HashSet<NodeId>) {
        let Some(NodeKind::Group { children, .. }) = self.nodes.get(group).map(|n| &n.kind) else {
            return;
        };
        for &child in children {
            if out.insert(child) {
                self.collect_descendants(child, out);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Connections
    // -----------------------------------------------------------------------

    /// Connect an output port to an input port with the given belt tier.
    /// Validates that both nodes and ports exist and that the ports face
    /// the right way.
    pub fn connect(
        &mut self,
        source_node: NodeId,
        source_port: PortId,
        target_node: NodeId,
        target_port: PortId,
        item: Option<ItemId>,
        belt: BeltClass,
    ) -> Result<ConnectionId, GraphError> {
        if !self.nodes.contains_key(source_node) {
            return Err(GraphError::NodeNotFound(source_node));
        }
        if !self.nodes.contains_key(target_node) {
            return Err(GraphError::NodeNotFound(target_node));
        }
        let src = self
            .ports
            .get(source_port)
            .ok_or(GraphError::PortNotFound(source_port))?;
        if src.direction != PortDirection::Output {
            return Err(GraphError::WrongPortDirection(source_port));
        }
        let tgt = self
            .ports
            .get(target_port)
            .ok_or(GraphError::PortNotFound(target_port))?;
        if tgt.direction != PortDirection::Input {
            return Err(GraphError::WrongPortDirection(target_port));
        }

        Ok(self.connections.insert(Connection {
            source_node,
            source_port,
            target_node,
            target_port,
            item,
            belt,
            actual_flow: 0.0,
            bottleneck: false,
            cross_boundary: false,
        }))
    }

    /// Remove a connection. Missing connections are ignored.
    pub fn disconnect(&mut self, conn: ConnectionId) {
        self.connections.remove(conn);
    }

    // -----------------------------------------------------------------------
    // Node removal
    // -----------------------------------------------------------------------

    /// Remove a node, its ports, and every connection naming it on either
    /// end. Children of a removed group are re-parented to the group's own
    /// parent (the canvas root when there is none).
    pub fn remove_node(&mut self, node: NodeId) {
        let Some(data) = self.nodes.remove(node) else {
            return;
        };
        for &pid in data.inputs.iter().chain(data.outputs.iter()) {
            self.ports.remove(pid);
        }

        let stale: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|(_, c)| c.source_node == node || c.target_node == node)
            .map(|(cid, _)| cid)
            .collect();
        for cid in stale {
            self.connections.remove(cid);
        }

        if let Some(parent) = data.parent {
            self.detach_from_children(parent, node);
        }
        if let NodeKind::Group { children, .. } = data.kind {
            for child in children {
                if let Some(n) = self.nodes.get_mut(child) {
                    n.parent = data.parent;
                }
                if let Some(parent) = data.parent
                    && let Some(NodeKind::Group { children: siblings, .. }) =
                        self.nodes.get_mut(parent).map(|n| &mut n.kind)
                {
                    siblings.push(child);
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn node(&self, node: NodeId) -> Option<&Node> {
        self.nodes.get(node)
    }

    pub fn port(&self, port: PortId) -> Option<&Port> {
        self.ports.get(port)
    }

    pub fn connection(&self, conn: ConnectionId) -> Option<&Connection> {
        self.connections.get(conn)
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.contains_key(node)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter()
    }

    pub fn connections(&self) -> impl Iterator<Item = (ConnectionId, &Connection)> {
        self.connections.iter()
    }

    /// A machine's actual power draw, 0 for anything else.
    pub fn machine_power_mw(&self, node: NodeId) -> f64 {
        self.nodes
            .get(node)
            .and_then(Node::as_machine)
            .map_or(0.0, MachineState::power_mw)
    }

    /// Total power draw of every machine inside a group, at any depth.
    pub fn group_power_mw(&self, group: NodeId) -> f64 {
        self.descendants(group)
            .iter()
            .map(|&n| self.machine_power_mw(n))
            .sum()
    }

    // -----------------------------------------------------------------------
    // Port plumbing (shared with the calculator's boundary sync)
    // -----------------------------------------------------------------------

    pub(crate) fn add_port(
        &mut self,
        node: NodeId,
        label: String,
        item: Option<ItemId>,
        direction: PortDirection,
    ) -> PortId {
        let pid = self.ports.insert(Port {
            label,
            item,
            flow: 0.0,
            direction,
            owner: node,
        });
        if let Some(data) = self.nodes.get_mut(node) {
            match direction {
                PortDirection::Input => data.inputs.push(pid),
                PortDirection::Output => data.outputs.push(pid),
            }
        }
        pid
    }

    pub(crate) fn clear_ports(&mut self, node: NodeId) {
        let Some(data) = self.nodes.get_mut(node) else {
            return;
        };
        let old: Vec<PortId> = data.inputs.drain(..).chain(data.outputs.drain(..)).collect();
        for pid in old {
            self.ports.remove(pid);
        }
    }

    fn rebuild_splitter_ports(&mut self, node: NodeId, outputs: usize) {
        let count = outputs.clamp(LOGISTIC_PORT_MIN, LOGISTIC_PORT_MAX);
        self.clear_ports(node);
        self.add_port(node, "Input".to_string(), None, PortDirection::Input);
        for i in 1..=count {
            self.add_port(node, format!("Output {i}"), None, PortDirection::Output);
        }
    }

    fn rebuild_merger_ports(&mut self, node: NodeId, inputs: usize) {
        let count = inputs.clamp(LOGISTIC_PORT_MIN, LOGISTIC_PORT_MAX);
        self.clear_ports(node);
        for i in 1..=count {
            self.add_port(node, format!("Input {i}"), None, PortDirection::Input);
        }
        self.add_port(node, "Output".to_string(), None, PortDirection::Output);
    }
}
