//! Resolved catalog data attached to machine nodes.
//!
//! The engine never loads or validates catalog entries itself; the editing
//! collaborator attaches machines and recipes as already-resolved objects.
//! An ingredient with no matching port simply contributes zero flow.

use crate::id::ItemId;
use serde::{Deserialize, Serialize};

/// An item that can flow through belts and pipes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    /// Fluids travel in pipes rather than on belts.
    pub is_fluid: bool,
}

/// A machine template: display name plus base power draw at 100% clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineType {
    pub name: String,
    /// Power draw in megawatts at 100% overclock.
    pub power_mw: f64,
}

/// Whether an ingredient is consumed or produced by its recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngredientRole {
    Input,
    Output,
}

/// One line of a recipe: an item and the quantity moved per cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub item: Item,
    /// Quantity consumed or produced per recipe cycle.
    pub amount: f64,
    pub role: IngredientRole,
}

/// A production recipe. Rates are derived from the cycle time, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    /// Seconds per production cycle.
    pub cycle_time_secs: f64,
    pub ingredients: Vec<Ingredient>,
}

impl Recipe {
    /// Items per minute for one ingredient at 100% clock:
    /// amount / cycle time x 60. A non-positive cycle time yields zero
    /// rather than dividing by zero.
    pub fn per_minute(&self, ingredient: &Ingredient) -> f64 {
        if self.cycle_time_secs <= 0.0 {
            return 0.0;
        }
        ingredient.amount / self.cycle_time_secs * 60.0
    }

    /// Ingredients the recipe consumes.
    pub fn inputs(&self) -> impl Iterator<Item = &Ingredient> {
        self.ingredients
            .iter()
            .filter(|i| i.role == IngredientRole::Input)
    }

    /// Ingredients the recipe produces.
    pub fn outputs(&self) -> impl Iterator<Item = &Ingredient> {
        self.ingredients
            .iter()
            .filter(|i| i.role == IngredientRole::Output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iron_ore() -> Item {
        Item {
            id: ItemId(0),
            name: "Iron Ore".into(),
            is_fluid: false,
        }
    }

    fn iron_ingot() -> Item {
        Item {
            id: ItemId(1),
            name: "Iron Ingot".into(),
            is_fluid: false,
        }
    }

    fn smelt() -> Recipe {
        Recipe {
            name: "Iron Ingot".into(),
            cycle_time_secs: 2.0,
            ingredients: vec![
                Ingredient {
                    item: iron_ore(),
                    amount: 1.0,
                    role: IngredientRole::Input,
                },
                Ingredient {
                    item: iron_ingot(),
                    amount: 1.0,
                    role: IngredientRole::Output,
                },
            ],
        }
    }

    #[test]
    fn per_minute_from_cycle_time() {
        let recipe = smelt();
        // 1 item every 2 seconds = 30/min, on both sides.
        assert_eq!(recipe.per_minute(&recipe.ingredients[0]), 30.0);
        assert_eq!(recipe.per_minute(&recipe.ingredients[1]), 30.0);
    }

    #[test]
    fn zero_cycle_time_yields_zero_rate() {
        let mut recipe = smelt();
        recipe.cycle_time_secs = 0.0;
        assert_eq!(recipe.per_minute(&recipe.ingredients[0]), 0.0);

        recipe.cycle_time_secs = -1.0;
        assert_eq!(recipe.per_minute(&recipe.ingredients[0]), 0.0);
    }

    #[test]
    fn role_filters() {
        let recipe = smelt();
        let inputs: Vec<_> = recipe.inputs().collect();
        let outputs: Vec<_> = recipe.outputs().collect();
        assert_eq!(inputs.len(), 1);
        assert_eq!(outputs.len(), 1);
        assert_eq!(inputs[0].item.id, ItemId(0));
        assert_eq!(outputs[0].item.id, ItemId(1));
    }
}
