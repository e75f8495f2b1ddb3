use crate::id::{ItemId, NodeId, PortId};
use serde::{Deserialize, Serialize};

/// Conveyor belt and pipe tiers with their throughput caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BeltClass {
    #[default]
    Mk1,
    Mk2,
    Mk3,
    Mk4,
    Mk5,
    PipeMk1,
    PipeMk2,
    /// No throughput cap. Stands in for tiers the engine does not know:
    /// such a connection never clamps and never bottlenecks.
    Unlimited,
}

impl BeltClass {
    /// Maximum throughput in items (or m3 of fluid) per minute.
    pub fn max_capacity(self) -> f64 {
        match self {
            BeltClass::Mk1 => 60.0,
            BeltClass::Mk2 => 120.0,
            BeltClass::Mk3 => 270.0,
            BeltClass::Mk4 => 480.0,
            BeltClass::Mk5 => 780.0,
            BeltClass::PipeMk1 => 300.0,
            BeltClass::PipeMk2 => 600.0,
            BeltClass::Unlimited => f64::INFINITY,
        }
    }
}

/// A belt or pipe carrying one item type from an output port to an input
/// port. The endpoints are arena keys; stale keys are skipped by the
/// calculator rather than surfaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub source_node: NodeId,
    pub source_port: PortId,
    pub target_node: NodeId,
    pub target_port: PortId,
    /// The item carried. `None` carries anything.
    pub item: Option<ItemId>,
    pub belt: BeltClass,
    /// Computed: flow actually delivered, never above `max_capacity`.
    pub actual_flow: f64,
    /// Computed: true when the upstream port offered more than capacity.
    /// The excess is dropped, not buffered.
    pub bottleneck: bool,
    /// Computed: true when this connection crosses a group perimeter.
    pub cross_boundary: bool,
}

impl Connection {
    /// Capacity of the configured belt tier, items/min.
    pub fn max_capacity(&self) -> f64 {
        self.belt.max_capacity()
    }

    /// Fraction of capacity in use, in [0, 1] after a pass.
    /// Unbounded belts report 0.
    pub fn usage_ratio(&self) -> f64 {
        let cap = self.max_capacity();
        if cap.is_finite() && cap > 0.0 {
            self.actual_flow / cap
        } else {
            0.0
        }
    }
}
