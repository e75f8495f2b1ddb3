//! Property-based tests for the flow calculator.
//!
//! Uses proptest to generate random factories (straight chains and
//! arbitrarily wired graphs, loops included), then verify the invariants
//! a pass must never break.

use beltline_core::connection::BeltClass;
use beltline_core::flow::recalculate;
use beltline_core::graph::FactoryGraph;
use beltline_core::node::SplitPolicy;
use beltline_core::test_utils::*;
use proptest::prelude::*;

// ===========================================================================
// Generators
// ===========================================================================

fn arb_belt() -> impl Strategy<Value = BeltClass> {
    prop_oneof![
        Just(BeltClass::Mk1),
        Just(BeltClass::Mk2),
        Just(BeltClass::Mk3),
        Just(BeltClass::Mk4),
        Just(BeltClass::Mk5),
        Just(BeltClass::PipeMk1),
        Just(BeltClass::PipeMk2),
        Just(BeltClass::Unlimited),
    ]
}

/// A straight production chain: one source feeding a line of relays over
/// random belt tiers.
fn arb_chain() -> impl Strategy<Value = FactoryGraph> {
    (1usize..12, 1.0..800.0f64).prop_flat_map(|(len, rate)| {
        proptest::collection::vec(arb_belt(), len).prop_map(move |belts| {
            let mut graph = FactoryGraph::new();
            let mut prev = graph.add_machine("Source", None, Some(source_recipe(iron_ore(), rate)));
            for (i, belt) in belts.into_iter().enumerate() {
                let next =
                    graph.add_machine(format!("Relay {i}"), None, Some(pass_through(iron_ore())));
                connect_ports(&mut graph, prev, 0, next, 0, belt);
                prev = next;
            }
            graph
        })
    })
}

/// A haphazardly wired graph: relays connected by random edges, loops and
/// self-loops included, with one source feeding the first relay.
fn arb_tangle() -> impl Strategy<Value = FactoryGraph> {
    (2usize..10).prop_flat_map(|n| {
        (
            proptest::collection::vec((0..n, 0..n, arb_belt()), 0..2 * n),
            1.0..500.0f64,
        )
            .prop_map(move |(edges, rate)| {
                let mut graph = FactoryGraph::new();
                let relays: Vec<_> = (0..n)
                    .map(|i| {
                        graph.add_machine(
                            format!("Relay {i}"),
                            None,
                            Some(pass_through(iron_ore())),
                        )
                    })
                    .collect();
                let source =
                    graph.add_machine("Source", None, Some(source_recipe(iron_ore(), rate)));
                connect_ports(&mut graph, source, 0, relays[0], 0, BeltClass::Mk5);
                for (a, b, belt) in edges {
                    connect_ports(&mut graph, relays[a], 0, relays[b], 0, belt);
                }
                graph
            })
    })
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// No belt ever carries more than its capacity, and never a negative
    /// amount.
    #[test]
    fn flows_never_exceed_capacity(mut graph in arb_tangle()) {
        recalculate(&mut graph);
        for (_, conn) in graph.connections() {
            prop_assert!(conn.actual_flow >= 0.0);
            prop_assert!(conn.actual_flow <= conn.max_capacity());
        }
    }

    /// Machine efficiency always lands in [0, 1].
    #[test]
    fn efficiency_in_unit_interval(mut graph in arb_tangle()) {
        recalculate(&mut graph);
        for (_, node) in graph.nodes() {
            if let Some(m) = node.as_machine() {
                prop_assert!(m.efficiency >= 0.0);
                prop_assert!(m.efficiency <= 1.0);
            }
        }
    }

    /// Running the pass twice on an unchanged graph gives identical numbers.
    #[test]
    fn recalculate_is_idempotent(mut graph in arb_chain()) {
        recalculate(&mut graph);
        let first: Vec<f64> = graph.connections().map(|(_, c)| c.actual_flow).collect();
        recalculate(&mut graph);
        let second: Vec<f64> = graph.connections().map(|(_, c)| c.actual_flow).collect();
        prop_assert_eq!(first, second);
    }

    /// A belt leaving a loop member carries nothing: loops are excluded
    /// from propagation entirely.
    #[test]
    fn cyclic_sources_carry_nothing(mut graph in arb_tangle()) {
        let report = recalculate(&mut graph);
        for (_, conn) in graph.connections() {
            if report.cyclic_nodes.contains(&conn.source_node) {
                prop_assert_eq!(conn.actual_flow, 0.0);
            }
        }
    }

    /// An even split over fully connected outputs conserves the input.
    #[test]
    fn even_split_conserves_flow(rate in 0.0..1000.0f64) {
        let mut graph = FactoryGraph::new();
        let source = graph.add_machine("Source", None, Some(source_recipe(iron_ore(), rate)));
        let splitter = graph.add_splitter("Splitter", 3, SplitPolicy::EvenSplit);
        connect_ports(&mut graph, source, 0, splitter, 0, BeltClass::Unlimited);
        let sinks: Vec<_> = (0..3)
            .map(|i| {
                let sink = graph.add_machine(
                    format!("Sink {i}"),
                    None,
                    Some(pass_through(iron_ore())),
                );
                connect_ports(&mut graph, splitter, i, sink, 0, BeltClass::Unlimited);
                sink
            })
            .collect();

        recalculate(&mut graph);
        let total: f64 = graph
            .node(splitter)
            .unwrap()
            .outputs
            .iter()
            .map(|&pid| graph.port(pid).unwrap().flow)
            .sum();
        prop_assert!((total - rate).abs() < 1e-6);
        for sink in sinks {
            let pid = graph.node(sink).unwrap().inputs[0];
            prop_assert!((graph.port(pid).unwrap().flow - rate / 3.0).abs() < 1e-6);
        }
    }

    /// Snapshots survive a save/load round trip with computed state intact.
    #[test]
    fn snapshot_round_trip(mut graph in arb_chain()) {
        recalculate(&mut graph);
        let bytes = beltline_core::snapshot::save(&graph).unwrap();
        let restored = beltline_core::snapshot::load(&bytes).unwrap();
        prop_assert_eq!(graph.node_count(), restored.node_count());
        prop_assert_eq!(graph.connection_count(), restored.connection_count());
        let before: Vec<f64> = graph.connections().map(|(_, c)| c.actual_flow).collect();
        let after: Vec<f64> = restored.connections().map(|(_, c)| c.actual_flow).collect();
        prop_assert_eq!(before, after);
    }
}
