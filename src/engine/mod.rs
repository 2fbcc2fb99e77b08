//! Template expansion and nutrition engine
//!
//! The pure core of the application: graph validation, unit normalization,
//! recursive aggregation, flattening, and meal materialization. Everything
//! here operates on a plain rusqlite connection so it composes freely with
//! the transaction boundaries the tool layer chooses.

pub mod aggregate;
pub mod error;
pub mod flatten;
pub mod graph;
pub mod materialize;
pub mod normalize;
pub mod units;

pub use aggregate::{aggregate, on_items_changed, refresh_template, MAX_EXPANSION_DEPTH};
pub use error::{EngineError, EngineResult};
pub use flatten::{flatten, FlatEntry};
pub use graph::{ensure_no_cycle, would_create_cycle};
pub use materialize::{log_food, log_meal_from_template, update_item_quantity};
pub use normalize::{normalize, record_serving_use, NormalizedQuantity};

#[cfg(test)]
pub(crate) mod testutil {
    //! Shared fixtures for engine tests

    use rusqlite::Connection;

    use crate::db::migrations::run_migrations;
    use crate::models::{
        Food, FoodCreate, FoodServing, FoodServingCreate, ItemRef, MealTemplate,
        MealTemplateCreate, TemplateItem, TemplateItemCreate,
    };

    /// Fresh in-memory database with the full schema applied
    pub fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("in-memory database");
        conn.pragma_update(None, "foreign_keys", "ON")
            .expect("enable foreign keys");
        run_migrations(&conn).expect("migrations");
        conn
    }

    /// Seed a food with the given canonical serving size and calories;
    /// macros are filled with simple placeholder values.
    pub fn seed_food(conn: &Connection, name: &str, serving_size_g: f64, calories: f64) -> Food {
        Food::create(
            conn,
            &FoodCreate {
                name: name.to_string(),
                brand: None,
                serving_size_g,
                calories,
                protein: 1.0,
                carbs: 2.0,
                fat: 0.5,
                fiber: 0.0,
                sugar: 0.0,
                sodium: 0.0,
                saturated_fat: 0.0,
                cholesterol: 0.0,
                notes: None,
            },
        )
        .expect("seed food")
    }

    pub fn seed_serving(
        conn: &Connection,
        food_id: i64,
        unit: &str,
        gram_weight: f64,
        is_default: bool,
    ) -> FoodServing {
        FoodServing::create(
            conn,
            &FoodServingCreate {
                food_id,
                unit: unit.to_string(),
                gram_weight,
                is_default,
            },
        )
        .expect("seed serving")
    }

    /// Seed a public template and return its id
    pub fn seed_template(conn: &Connection, name: &str) -> i64 {
        MealTemplate::create(
            conn,
            &MealTemplateCreate {
                name: name.to_string(),
                owner: None,
                is_favorite: false,
                notes: None,
            },
        )
        .expect("seed template")
        .id
    }

    /// Add a food-type item to a template
    pub fn add_food_item(conn: &Connection, template_id: i64, food_id: i64, quantity: f64, unit: &str) {
        TemplateItem::create(
            conn,
            &TemplateItemCreate {
                template_id,
                item: ItemRef::Food(food_id),
                quantity,
                unit: unit.to_string(),
                position: 0,
            },
        )
        .expect("add food item");
    }

    /// Add a template-type item (a "contains" edge) without validation;
    /// tests that exercise the validator insert edges directly.
    pub fn link_template(conn: &Connection, parent_id: i64, child_id: i64, quantity: f64) {
        TemplateItem::create(
            conn,
            &TemplateItemCreate {
                template_id: parent_id,
                item: ItemRef::Template(child_id),
                quantity,
                unit: "serving".to_string(),
                position: 0,
            },
        )
        .expect("link template");
    }

    /// The worked example used across the engine tests
    pub struct BreakfastFixture {
        pub breakfast: i64,
        pub eggs: i64,
        pub toast: i64,
    }

    /// Breakfast = 2 "large" Eggs (50 g, 72 kcal each) + 1 "slice" Toast
    /// (28 g, 69 kcal), totalling 213 kcal.
    pub fn seed_breakfast(conn: &Connection) -> BreakfastFixture {
        let eggs = seed_food(conn, "Eggs", 50.0, 72.0);
        seed_serving(conn, eggs.id, "large", 50.0, true);

        let toast = seed_food(conn, "Toast", 28.0, 69.0);
        seed_serving(conn, toast.id, "slice", 28.0, true);

        let breakfast = seed_template(conn, "Breakfast");
        add_food_item(conn, breakfast, eggs.id, 2.0, "large");
        add_food_item(conn, breakfast, toast.id, 1.0, "slice");

        BreakfastFixture {
            breakfast,
            eggs: eggs.id,
            toast: toast.id,
        }
    }
}
