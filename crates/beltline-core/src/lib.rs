//! Beltline Core -- steady-state flow calculation for factory layouts.
//!
//! This crate models a production network -- machines running recipes,
//! splitters, mergers, and nested groups, wired together with
//! capacity-limited belts and pipes -- and computes the equilibrium flow
//! through it in a single pass.
//!
//! # Calculation Pipeline
//!
//! Each call to [`flow::recalculate`] runs the following phases:
//!
//! 1. **Reset** -- Zero all port flows, connection flows, and flags.
//! 2. **Cycle detection** -- Three-color DFS finds nodes on feedback loops;
//!    they are excluded from propagation and reported.
//! 3. **Ordering** -- Kahn's algorithm orders the remaining nodes so every
//!    producer is visited before its consumers.
//! 4. **Propagation** -- Each node computes its outputs (machines throttle
//!    to their most starved ingredient) and pushes them down its belts,
//!    clamped to belt capacity.
//! 5. **Boundary sync** -- Every group's ports are rebuilt from the
//!    connections crossing its perimeter, deepest groups first.
//!
//! # Key Types
//!
//! - [`graph::FactoryGraph`] -- Arena-owned nodes, ports, and connections
//!   plus the editing API.
//! - [`node::NodeKind`] -- Machine, Splitter, Merger, or Group.
//! - [`catalog::Recipe`] -- Cycle time and ingredients; all rates are
//!   derived, never stored.
//! - [`connection::BeltClass`] -- Belt and pipe tiers with throughput caps.
//! - [`flow::FlowReport`] -- Cyclic nodes and bottlenecked belts found by
//!   the last pass.
//! - [`snapshot`] -- Versioned binary saves via bitcode.

pub mod catalog;
pub mod connection;
pub mod flow;
pub mod graph;
pub mod id;
pub mod node;
pub mod port;
pub mod snapshot;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
