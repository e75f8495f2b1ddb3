use crate::catalog::{MachineType, Recipe};
use crate::id::{NodeId, PortId};
use serde::{Deserialize, Serialize};

/// Exponent of the overclock power curve: power = base x factor^1.321928.
pub const POWER_EXPONENT: f64 = 1.321928;

/// Splitters and mergers carry between 1 and 3 logistic ports.
pub const LOGISTIC_PORT_MIN: usize = 1;
pub const LOGISTIC_PORT_MAX: usize = 3;

/// How a splitter distributes its input flow across connected outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SplitPolicy {
    /// Divide the input equally across all connected outputs.
    #[default]
    EvenSplit,
    /// Fill connected outputs in port order, each up to the capacity of
    /// its outgoing belt; the remainder spills to later ports.
    Priority,
}

/// Machine payload: catalog references plus overclock and the computed
/// efficiency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineState {
    /// The machine template, carrying the base power draw.
    pub machine: Option<MachineType>,
    /// The recipe this machine is running. Port lists are rebuilt from it.
    pub recipe: Option<Recipe>,
    overclock_percent: f64,
    /// Computed each pass: 1.0 = full throughput, lower when the most
    /// starved input ingredient throttles the machine.
    pub efficiency: f64,
}

impl MachineState {
    pub fn new(machine: Option<MachineType>, recipe: Option<Recipe>) -> Self {
        Self {
            machine,
            recipe,
            overclock_percent: 100.0,
            efficiency: 1.0,
        }
    }

    pub fn overclock_percent(&self) -> f64 {
        self.overclock_percent
    }

    /// Set the overclock percentage, clamped to [1, 250].
    pub fn set_overclock_percent(&mut self, percent: f64) {
        self.overclock_percent = percent.clamp(1.0, 250.0);
    }

    /// Decimal throughput multiplier: 100% -> 1.0, 250% -> 2.5.
    pub fn overclock_factor(&self) -> f64 {
        self.overclock_percent / 100.0
    }

    /// Actual power draw in MW: base power x factor^1.321928.
    /// Zero without a machine template.
    pub fn power_mw(&self) -> f64 {
        match &self.machine {
            Some(m) => m.power_mw * self.overclock_factor().powf(POWER_EXPONENT),
            None => 0.0,
        }
    }
}

/// Per-variant payload for the node sum type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    /// A production machine running an optional recipe.
    Machine(MachineState),
    /// One input, 1-3 outputs.
    Splitter { policy: SplitPolicy },
    /// 1-3 inputs, one output; the output is the sum of the inputs.
    Merger,
    /// A nested sub-factory. Boundary ports are derived every pass from
    /// the connections crossing its perimeter, never authored.
    Group {
        children: Vec<NodeId>,
        description: String,
    },
}

/// A vertex on the canvas: the shared identity/port record plus the
/// variant payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    /// Containing group, `None` at the canvas root.
    pub parent: Option<NodeId>,
    /// Input ports, in display order.
    pub inputs: Vec<PortId>,
    /// Output ports, in display order.
    pub outputs: Vec<PortId>,
    /// Canvas position. Irrelevant to the calculator, kept for display.
    pub position: (f64, f64),
    pub kind: NodeKind,
}

impl Node {
    pub fn as_machine(&self) -> Option<&MachineState> {
        match &self.kind {
            NodeKind::Machine(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_machine_mut(&mut self) -> Option<&mut MachineState> {
        match &mut self.kind {
            NodeKind::Machine(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, NodeKind::Group { .. })
    }
}
