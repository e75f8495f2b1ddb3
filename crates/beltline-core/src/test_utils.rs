//! Shared builders for unit, integration, and property tests.

use crate::catalog::{Ingredient, IngredientRole, Item, MachineType, Recipe};
use crate::connection::BeltClass;
use crate::graph::FactoryGraph;
use crate::id::{ConnectionId, ItemId, NodeId};

pub fn item(id: u32, name: &str) -> Item {
    Item {
        id: ItemId(id),
        name: name.to_string(),
        is_fluid: false,
    }
}

pub fn fluid(id: u32, name: &str) -> Item {
    Item {
        id: ItemId(id),
        name: name.to_string(),
        is_fluid: true,
    }
}

// A small fixed catalog with stable ids.
pub fn iron_ore() -> Item {
    item(1, "Iron Ore")
}
pub fn iron_ingot() -> Item {
    item(2, "Iron Ingot")
}
pub fn iron_plate() -> Item {
    item(3, "Iron Plate")
}
pub fn iron_rod() -> Item {
    item(4, "Iron Rod")
}
pub fn screw() -> Item {
    item(5, "Screw")
}
pub fn copper_ore() -> Item {
    item(6, "Copper Ore")
}
pub fn copper_ingot() -> Item {
    item(7, "Copper Ingot")
}
pub fn water() -> Item {
    fluid(20, "Water")
}

pub fn input(item: Item, amount: f64) -> Ingredient {
    Ingredient {
        item,
        amount,
        role: IngredientRole::Input,
    }
}

pub fn output(item: Item, amount: f64) -> Ingredient {
    Ingredient {
        item,
        amount,
        role: IngredientRole::Output,
    }
}

pub fn recipe(name: &str, cycle_time_secs: f64, ingredients: Vec<Ingredient>) -> Recipe {
    Recipe {
        name: name.to_string(),
        cycle_time_secs,
        ingredients,
    }
}

pub fn machine_type(name: &str, power_mw: f64) -> MachineType {
    MachineType {
        name: name.to_string(),
        power_mw,
    }
}

/// An extraction recipe: no inputs, `per_minute` of `item` out.
pub fn source_recipe(item: Item, per_minute: f64) -> Recipe {
    recipe(
        &format!("Extract {}", item.name),
        60.0,
        vec![output(item, per_minute)],
    )
}

/// 1 Iron Ore -> 1 Iron Ingot every 2 seconds (30/min each way).
pub fn smelt_iron() -> Recipe {
    recipe(
        "Iron Ingot",
        2.0,
        vec![input(iron_ore(), 1.0), output(iron_ingot(), 1.0)],
    )
}

/// Consumes and re-emits the same item at 60/min. Handy for wiring loops.
pub fn pass_through(it: Item) -> Recipe {
    recipe(
        &format!("Relay {}", it.name),
        1.0,
        vec![input(it.clone(), 1.0), output(it, 1.0)],
    )
}

/// Connect by port index: `source.outputs[out_idx] -> target.inputs[in_idx]`.
/// The carried item is taken from the source port, falling back to the
/// target port.
pub fn connect_ports(
    graph: &mut FactoryGraph,
    source: NodeId,
    out_idx: usize,
    target: NodeId,
    in_idx: usize,
    belt: BeltClass,
) -> ConnectionId {
    let source_port = graph.node(source).expect("source node").outputs[out_idx];
    let target_port = graph.node(target).expect("target node").inputs[in_idx];
    let item = graph
        .port(source_port)
        .expect("source port")
        .item
        .or_else(|| graph.port(target_port).expect("target port").item);
    graph
        .connect(source, source_port, target, target_port, item, belt)
        .expect("connect")
}
