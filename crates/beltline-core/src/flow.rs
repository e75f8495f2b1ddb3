//! Steady-state flow calculation.
//!
//! A pass works in phases over the whole graph:
//!
//! 1. reset all computed state,
//! 2. find the nodes trapped in feedback loops (three-color DFS),
//! 3. order the remaining nodes with Kahn's algorithm,
//! 4. walk that order, computing each node's output and pushing it down
//!    its outgoing belts (clamped to belt capacity),
//! 5. rebuild every group's boundary ports from the connections crossing
//!    its perimeter.
//!
//! The pass is infallible: stale keys are skipped, loops are excluded and
//! reported, and running it twice on an unchanged graph yields identical
//! numbers.

use crate::graph::FactoryGraph;
use crate::id::{ConnectionId, ItemId, NodeId, PortId};
use crate::node::{Node, NodeKind, SplitPolicy};
use crate::port::PortDirection;
use slotmap::SecondaryMap;
use std::collections::{HashSet, VecDeque};

/// What a calculation pass found, beyond the numbers written back into the
/// graph itself.
#[derive(Debug, Clone, Default)]
pub struct FlowReport {
    /// Nodes excluded from propagation because they sit on a feedback
    /// loop. Their ports and outgoing connections carry zero.
    pub cyclic_nodes: HashSet<NodeId>,
    /// Connections that were offered more than their belt could carry.
    pub bottlenecks: HashSet<ConnectionId>,
}

/// Recompute every flow, efficiency, and boundary port in the graph.
pub fn recalculate(graph: &mut FactoryGraph) -> FlowReport {
    reset(graph);
    let index = ConnIndex::build(graph);
    let cyclic = detect_cycles(graph, &index);
    let order = topological_order(graph, &index, &cyclic);
    let ordered: HashSet<NodeId> = order.iter().copied().collect();

    let mut bottlenecks = HashSet::new();
    for &node in &order {
        step_node(graph, &index, node);
        deliver_outgoing(graph, &index, node, &ordered, &mut bottlenecks);
    }

    sync_group_boundaries(graph);

    FlowReport {
        cyclic_nodes: cyclic,
        bottlenecks,
    }
}

// ---------------------------------------------------------------------------
// Phase 1: reset
// ---------------------------------------------------------------------------

fn reset(graph: &mut FactoryGraph) {
    for (_, port) in graph.ports.iter_mut() {
        port.flow = 0.0;
    }
    for (_, conn) in graph.connections.iter_mut() {
        conn.actual_flow = 0.0;
        conn.bottleneck = false;
        conn.cross_boundary = false;
    }
    for (_, node) in graph.nodes.iter_mut() {
        if let Some(m) = node.as_machine_mut() {
            m.efficiency = 1.0;
        }
    }
}

// ---------------------------------------------------------------------------
// Connection index
// ---------------------------------------------------------------------------

/// Per-node adjacency built once per pass. Connections whose endpoint node
/// no longer exists are left out.
struct ConnIndex {
    by_source: SecondaryMap<NodeId, Vec<ConnectionId>>,
    by_target: SecondaryMap<NodeId, Vec<ConnectionId>>,
}

impl ConnIndex {
    fn build(graph: &FactoryGraph) -> Self {
        let mut by_source: SecondaryMap<NodeId, Vec<ConnectionId>> = SecondaryMap::new();
        let mut by_target: SecondaryMap<NodeId, Vec<ConnectionId>> = SecondaryMap::new();
        for (cid, conn) in graph.connections.iter() {
            if graph.nodes.contains_key(conn.source_node)
                && let Some(entry) = by_source.entry(conn.source_node)
            {
                entry.or_default().push(cid);
            }
            if graph.nodes.contains_key(conn.target_node)
                && let Some(entry) = by_target.entry(conn.target_node)
            {
                entry.or_default().push(cid);
            }
        }
        Self {
            by_source,
            by_target,
        }
    }

    fn outgoing(&self, node: NodeId) -> &[ConnectionId] {
        self.by_source.get(node).map_or(&[], Vec::as_slice)
    }

    fn incoming(&self, node: NodeId) -> &[ConnectionId] {
        self.by_target.get(node).map_or(&[], Vec::as_slice)
    }
}

// ---------------------------------------------------------------------------
// Phase 2: cycle detection
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq, Default)]
enum VisitState {
    #[default]
    White,
    Gray,
    Black,
}

fn detect_cycles(graph: &FactoryGraph, index: &ConnIndex) -> HashSet<NodeId> {
    let mut state: SecondaryMap<NodeId, VisitState> = SecondaryMap::new();
    let mut cyclic = HashSet::new();
    let roots: Vec<NodeId> = graph.nodes.keys().collect();
    for root in roots {
        if state.get(root).copied().unwrap_or_default() == VisitState::White {
            dfs_visit(graph, index, root, &mut state, &mut cyclic);
        }
    }
    cyclic
}

/// Returns true when a back edge was found below `node`. Both endpoints of
/// a back edge are marked, and membership carries up the recursion stack
/// so that the whole loop ends up in the set.
fn dfs_visit(
    graph: &FactoryGraph,
    index: &ConnIndex,
    node: NodeId,
    state: &mut SecondaryMap<NodeId, VisitState>,
    cyclic: &mut HashSet<NodeId>,
) -> bool {
    state.insert(node, VisitState::Gray);
    let mut found = false;
    for &cid in index.outgoing(node) {
        let Some(conn) = graph.connections.get(cid) else {
            continue;
        };
        let target = conn.target_node;
        if !graph.nodes.contains_key(target) {
            continue;
        }
        match state.get(target).copied().unwrap_or_default() {
            VisitState::Gray => {
                cyclic.insert(node);
                cyclic.insert(target);
                found = true;
            }
            VisitState::White => {
                if dfs_visit(graph, index, target, state, cyclic) {
                    cyclic.insert(node);
                    found = true;
                }
            }
            VisitState::Black => {}
        }
    }
    state.insert(node, VisitState::Black);
    found
}

// ---------------------------------------------------------------------------
// Phase 3: topological order
// ---------------------------------------------------------------------------

/// Kahn's algorithm over the non-cyclic nodes. Edges touching a cyclic or
/// missing endpoint do not count toward in-degrees, so nodes fed only by a
/// loop still get ordered (and starve, since the loop delivers nothing).
fn topological_order(
    graph: &FactoryGraph,
    index: &ConnIndex,
    cyclic: &HashSet<NodeId>,
) -> Vec<NodeId> {
    let mut in_degree: SecondaryMap<NodeId, usize> = SecondaryMap::new();
    for node in graph.nodes.keys() {
        if cyclic.contains(&node) {
            continue;
        }
        let deg = index
            .incoming(node)
            .iter()
            .filter(|&&cid| {
                graph.connections.get(cid).is_some_and(|conn| {
                    graph.nodes.contains_key(conn.source_node)
                        && !cyclic.contains(&conn.source_node)
                })
            })
            .count();
        in_degree.insert(node, deg);
    }

    let mut queue: VecDeque<NodeId> = in_degree
        .iter()
        .filter(|&(_, &deg)| deg == 0)
        .map(|(node, _)| node)
        .collect();
    let mut order = Vec::with_capacity(in_degree.len());
    while let Some(node) = queue.pop_front() {
        order.push(node);
        for &cid in index.outgoing(node) {
            let Some(conn) = graph.connections.get(cid) else {
                continue;
            };
            if let Some(deg) = in_degree.get_mut(conn.target_node) {
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(conn.target_node);
                }
            }
        }
    }
    order
}

// ---------------------------------------------------------------------------
// Phase 4: propagation
// ---------------------------------------------------------------------------

fn step_node(graph: &mut FactoryGraph, index: &ConnIndex, node: NodeId) {
    let Some(data) = graph.nodes.get(node) else {
        return;
    };
    match &data.kind {
        NodeKind::Machine(_) => apply_machine(graph, node),
        NodeKind::Splitter { policy } => {
            let policy = *policy;
            forward_splitter(graph, index, node, policy);
        }
        NodeKind::Merger => forward_merger(graph, node),
        NodeKind::Group { .. } => {}
    }
}

fn port_for_item(graph: &FactoryGraph, ports: &[PortId], item: ItemId) -> Option<PortId> {
    ports
        .iter()
        .copied()
        .find(|&pid| graph.ports.get(pid).is_some_and(|p| p.item == Some(item)))
}

/// Compute a machine's efficiency from its most starved input ingredient
/// and write its output port rates. A recipe with no input ingredients is
/// a pure source: nothing throttles it, so it runs at full throughput.
fn apply_machine(graph: &mut FactoryGraph, node: NodeId) {
    let mut efficiency: f64 = 1.0;
    let mut writes: Vec<(PortId, f64)> = Vec::new();
    {
        let Some(data) = graph.nodes.get(node) else {
            return;
        };
        let Some(machine) = data.as_machine() else {
            return;
        };
        let Some(recipe) = &machine.recipe else {
            return;
        };
        let factor = machine.overclock_factor();

        for ing in recipe.inputs() {
            let required = recipe.per_minute(ing) * factor;
            if required <= 0.0 {
                continue;
            }
            let received = port_for_item(graph, &data.inputs, ing.item.id)
                .and_then(|pid| graph.ports.get(pid))
                .map_or(0.0, |p| p.flow);
            efficiency = efficiency.min((received / required).min(1.0));
        }

        for ing in recipe.outputs() {
            let rate = recipe.per_minute(ing) * factor * efficiency;
            if let Some(pid) = port_for_item(graph, &data.outputs, ing.item.id) {
                writes.push((pid, rate));
            }
        }
    }

    for (pid, rate) in writes {
        if let Some(port) = graph.ports.get_mut(pid) {
            port.flow = rate;
        }
    }
    if let Some(m) = graph.nodes.get_mut(node).and_then(Node::as_machine_mut) {
        m.efficiency = efficiency;
    }
}

/// Distribute a splitter's accumulated input across its connected output
/// ports. Outputs with no connection get nothing and take no share.
fn forward_splitter(graph: &mut FactoryGraph, index: &ConnIndex, node: NodeId, policy: SplitPolicy) {
    let mut writes: Vec<(PortId, f64)> = Vec::new();
    {
        let Some(data) = graph.nodes.get(node) else {
            return;
        };
        let total = data
            .inputs
            .first()
            .and_then(|&pid| graph.ports.get(pid))
            .map_or(0.0, |p| p.flow);

        // Connected output ports, in port order, with the combined capacity
        // of their outgoing belts.
        let connected: Vec<(PortId, f64)> = data
            .outputs
            .iter()
            .filter_map(|&pid| {
                let cap: f64 = index
                    .outgoing(node)
                    .iter()
                    .filter_map(|&cid| graph.connections.get(cid))
                    .filter(|conn| conn.source_port == pid)
                    .map(|conn| conn.max_capacity())
                    .sum();
                let is_connected = index
                    .outgoing(node)
                    .iter()
                    .filter_map(|&cid| graph.connections.get(cid))
                    .any(|conn| conn.source_port == pid);
                is_connected.then_some((pid, cap))
            })
            .collect();
        if connected.is_empty() {
            return;
        }

        match policy {
            SplitPolicy::EvenSplit => {
                let share = total / connected.len() as f64;
                for (pid, _) in connected {
                    writes.push((pid, share));
                }
            }
            SplitPolicy::Priority => {
                let mut remaining = total;
                for (pid, cap) in connected {
                    let given = remaining.min(cap);
                    writes.push((pid, given));
                    remaining -= given;
                }
            }
        }
    }
    for (pid, flow) in writes {
        if let Some(port) = graph.ports.get_mut(pid) {
            port.flow = flow;
        }
    }
}

/// A merger's output is the sum of whatever arrived on its inputs.
fn forward_merger(graph: &mut FactoryGraph, node: NodeId) {
    let Some(data) = graph.nodes.get(node) else {
        return;
    };
    let total: f64 = data
        .inputs
        .iter()
        .filter_map(|&pid| graph.ports.get(pid))
        .map(|p| p.flow)
        .sum();
    let out = data.outputs.first().copied();
    if let Some(pid) = out
        && let Some(port) = graph.ports.get_mut(pid)
    {
        port.flow = total;
    }
}

/// Push a node's output port flows down its belts. Each connection carries
/// its source port's flow clamped to belt capacity; the excess is dropped
/// and the connection flagged. Delivery into a cyclic node is skipped, but
/// the clamped flow is still recorded on the connection.
fn deliver_outgoing(
    graph: &mut FactoryGraph,
    index: &ConnIndex,
    node: NodeId,
    ordered: &HashSet<NodeId>,
    bottlenecks: &mut HashSet<ConnectionId>,
) {
    let mut deliveries: Vec<(PortId, f64)> = Vec::new();
    for &cid in index.outgoing(node) {
        let Some(conn) = graph.connections.get(cid) else {
            continue;
        };
        let Some(src_port) = graph.ports.get(conn.source_port) else {
            continue;
        };
        let offered = src_port.flow;
        let cap = conn.max_capacity();
        let actual = offered.min(cap);
        let clipped = offered > cap;
        let target_node = conn.target_node;
        let target_port = conn.target_port;

        if let Some(conn) = graph.connections.get_mut(cid) {
            conn.actual_flow = actual;
            conn.bottleneck = clipped;
        }
        if clipped {
            bottlenecks.insert(cid);
        }
        if ordered.contains(&target_node) && graph.ports.contains_key(target_port) {
            deliveries.push((target_port, actual));
        }
    }
    for (pid, amount) in deliveries {
        if let Some(port) = graph.ports.get_mut(pid) {
            port.flow += amount;
        }
    }
}

// ---------------------------------------------------------------------------
// Phase 5: group boundary ports
// ---------------------------------------------------------------------------

struct DerivedPort {
    label: String,
    item: Option<ItemId>,
    direction: PortDirection,
    flow: f64,
}

/// Rebuild every group's boundary ports from the connections that cross
/// its perimeter. Deepest groups first, so a connection crossing several
/// nested perimeters shows up on each of them.
fn sync_group_boundaries(graph: &mut FactoryGraph) {
    let mut groups: Vec<(usize, NodeId)> = graph
        .nodes
        .iter()
        .filter(|(_, n)| n.is_group())
        .map(|(id, _)| (depth_of(graph, id), id))
        .collect();
    groups.sort_by(|a, b| b.0.cmp(&a.0));
    for (_, group) in groups {
        sync_one_group(graph, group);
    }
}

fn depth_of(graph: &FactoryGraph, node: NodeId) -> usize {
    let mut depth = 0;
    let mut seen = HashSet::new();
    let mut cursor = node;
    while let Some(data) = graph.nodes.get(cursor) {
        let Some(parent) = data.parent else {
            break;
        };
        if !seen.insert(parent) {
            break;
        }
        depth += 1;
        cursor = parent;
    }
    depth
}

fn sync_one_group(graph: &mut FactoryGraph, group: NodeId) {
    let inside = graph.descendants(group);
    let mut derived: Vec<DerivedPort> = Vec::new();
    let mut crossing: Vec<ConnectionId> = Vec::new();

    for (cid, conn) in graph.connections.iter() {
        let src_in = inside.contains(&conn.source_node);
        let tgt_in = inside.contains(&conn.target_node);
        if src_in == tgt_in {
            continue;
        }
        crossing.push(cid);
        if tgt_in {
            // Flow entering the group; named after where it comes from.
            let label = graph
                .nodes
                .get(conn.source_node)
                .map_or_else(|| "Input".to_string(), |n| n.name.clone());
            let item = conn
                .item
                .or_else(|| graph.ports.get(conn.target_port).and_then(|p| p.item));
            derived.push(DerivedPort {
                label,
                item,
                direction: PortDirection::Input,
                flow: conn.actual_flow,
            });
        } else {
            // Flow leaving the group; named after where it goes.
            let label = graph
                .nodes
                .get(conn.target_node)
                .map_or_else(|| "Output".to_string(), |n| n.name.clone());
            let item = conn
                .item
                .or_else(|| graph.ports.get(conn.source_port).and_then(|p| p.item));
            derived.push(DerivedPort {
                label,
                item,
                direction: PortDirection::Output,
                flow: conn.actual_flow,
            });
        }
    }

    graph.clear_ports(group);
    for d in derived {
        let pid = graph.add_port(group, d.label, d.item, d.direction);
        if let Some(port) = graph.ports.get_mut(pid) {
            port.flow = d.flow;
        }
    }
    for cid in crossing {
        if let Some(conn) = graph.connections.get_mut(cid) {
            conn.cross_boundary = true;
        }
    }
}
