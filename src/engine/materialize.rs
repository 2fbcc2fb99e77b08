//! Meal Materializer
//!
//! Turns a template into a concrete logged meal: load, aggregate, flatten,
//! persist. The persisted meal carries only atomic line items, each with its
//! own nutrient contribution and dual quantity representation. Everything
//! runs in one transaction; a meal is never partially materialized.

use chrono::Utc;
use rusqlite::Connection;

use std::collections::HashSet;

use crate::models::{
    Food, ItemRef, LoggedMeal, LoggedMealCreate, LoggedMealItem, LoggedMealItemCreate,
    MealTemplate, MealType, Nutrition, QuantityEdited, TemplateItem,
};

use super::error::{EngineError, EngineResult};
use super::flatten::flatten;
use super::normalize::{normalize, record_serving_use, serving_for_grams};
use super::aggregate::aggregate;

fn now_iso() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Every (food_id, unit) pair a template's subtree logs with.
///
/// Walks "contains" edges with a visited set; the graph is acyclic by
/// construction but a corrupt link must not hang the walk.
fn collect_unit_uses(
    conn: &Connection,
    template_id: i64,
) -> EngineResult<Vec<(i64, String)>> {
    let mut uses = Vec::new();
    let mut queue = vec![template_id];
    let mut seen = HashSet::new();

    while let Some(id) = queue.pop() {
        if !seen.insert(id) {
            continue;
        }
        for item in TemplateItem::get_for_template(conn, id)? {
            match item.item {
                ItemRef::Food(food_id) => uses.push((food_id, item.unit)),
                ItemRef::Template(child_id) => queue.push(child_id),
            }
        }
    }

    Ok(uses)
}

/// Materialize a logged meal from a template.
///
/// Load -> Aggregate -> Flatten -> Persist -> return the new meal id.
/// A template that does not exist, or is private to someone else, reports
/// NotFound; the visibility check is the whole authorization story at this
/// boundary.
pub fn log_meal_from_template(
    conn: &mut Connection,
    owner: &str,
    template_id: i64,
    logged_at: Option<&str>,
    meal_type: MealType,
    notes: Option<&str>,
) -> EngineResult<i64> {
    let tx = conn.transaction().map_err(crate::db::DbError::from)?;

    let (meal_id, unit_uses) = {
        // Load
        let template = MealTemplate::get_by_id(&tx, template_id)?.ok_or(EngineError::NotFound {
            what: "template",
            id: template_id,
        })?;
        if !template.visible_to(owner) {
            return Err(EngineError::NotFound {
                what: "template",
                id: template_id,
            });
        }

        // Aggregate, then flatten, over the same snapshot
        let totals = aggregate(&tx, template_id)?.rounded();
        let entries = flatten(&tx, template_id)?;

        // Persist
        let logged_at = logged_at.map(str::to_string).unwrap_or_else(now_iso);
        let meal_id = LoggedMeal::insert(
            &tx,
            &LoggedMealCreate {
                owner,
                logged_at: &logged_at,
                meal_type,
                source_template_id: Some(template_id),
                totals: &totals,
                notes,
            },
        )?;

        for entry in &entries {
            let food = Food::get_by_id(&tx, entry.food_id)?.ok_or(EngineError::NotFound {
                what: "food",
                id: entry.food_id,
            })?;
            let nutrition = food.nutrition.scale(entry.grams / food.serving_size_g).rounded();
            let (serving_quantity, serving_unit) = serving_for_grams(&tx, &food, entry.grams)?;

            LoggedMealItem::insert(
                &tx,
                &LoggedMealItemCreate {
                    meal_id,
                    food_id: entry.food_id,
                    gram_quantity: entry.grams,
                    serving_quantity,
                    serving_unit: serving_unit.as_deref(),
                    last_edited: QuantityEdited::Grams,
                    estimated: entry.estimated,
                    nutrition: &nutrition,
                },
            )?;
        }

        MealTemplate::record_use(&tx, template_id, &logged_at)?;

        (meal_id, collect_unit_uses(&tx, template_id)?)
    };

    tx.commit().map_err(crate::db::DbError::from)?;

    // Best-effort popularity updates for the household units the template's
    // food items logged with, outside the main transaction
    for (food_id, unit) in unit_uses {
        if let Ok(Some(food)) = Food::get_by_id(conn, food_id) {
            record_serving_use(conn, &food, &unit);
        }
    }

    Ok(meal_id)
}

/// Log a single food ad hoc, without a template.
///
/// Same persistence shape as materialization: a one-item meal whose item
/// went through the Unit Normalizer.
pub fn log_food(
    conn: &mut Connection,
    owner: &str,
    food_id: i64,
    quantity: f64,
    unit: &str,
    logged_at: Option<&str>,
    meal_type: MealType,
    notes: Option<&str>,
) -> EngineResult<i64> {
    let tx = conn.transaction().map_err(crate::db::DbError::from)?;

    let (meal_id, food) = {
        let food = Food::get_by_id(&tx, food_id)?.ok_or(EngineError::NotFound {
            what: "food",
            id: food_id,
        })?;
        if food.serving_size_g <= 0.0 {
            return Err(EngineError::InvalidItem(format!(
                "food {} has a non-positive canonical serving size",
                food_id
            )));
        }

        let normalized = normalize(&tx, &food, quantity, unit)?;
        let nutrition = food
            .nutrition
            .scale(normalized.grams / food.serving_size_g)
            .rounded();

        let logged_at = logged_at.map(str::to_string).unwrap_or_else(now_iso);
        let meal_id = LoggedMeal::insert(
            &tx,
            &LoggedMealCreate {
                owner,
                logged_at: &logged_at,
                meal_type,
                source_template_id: None,
                totals: &nutrition,
                notes,
            },
        )?;

        LoggedMealItem::insert(
            &tx,
            &LoggedMealItemCreate {
                meal_id,
                food_id,
                gram_quantity: normalized.grams,
                serving_quantity: normalized.serving_quantity,
                serving_unit: normalized.serving_unit.as_deref(),
                last_edited: QuantityEdited::Grams,
                estimated: normalized.estimated,
                nutrition: &nutrition,
            },
        )?;

        (meal_id, food)
    };

    tx.commit().map_err(crate::db::DbError::from)?;

    // Best-effort popularity update, outside the main transaction
    record_serving_use(conn, &food, unit);

    Ok(meal_id)
}

/// Edit one side of a logged item's dual quantity; the other side
/// re-derives.
///
/// Editing grams re-derives the serving quantity from the item's serving
/// definition (or the food's canonical serving size); editing the serving
/// quantity re-derives grams through the same normalization path the item
/// was logged with. `last_edited` records which side the user touched.
/// The item's nutrition and the meal totals refresh in the same
/// transaction.
pub fn update_item_quantity(
    conn: &mut Connection,
    owner: &str,
    item_id: i64,
    value: f64,
    edited: QuantityEdited,
) -> EngineResult<LoggedMealItem> {
    let tx = conn.transaction().map_err(crate::db::DbError::from)?;

    let updated = {
        let item = LoggedMealItem::get_by_id(&tx, item_id)?.ok_or(EngineError::NotFound {
            what: "meal item",
            id: item_id,
        })?;
        let meal = LoggedMeal::get_by_id(&tx, item.meal_id)?.ok_or(EngineError::NotFound {
            what: "meal",
            id: item.meal_id,
        })?;
        if meal.owner != owner {
            return Err(EngineError::NotFound {
                what: "meal item",
                id: item_id,
            });
        }

        let food = Food::get_by_id(&tx, item.food_id)?.ok_or(EngineError::NotFound {
            what: "food",
            id: item.food_id,
        })?;

        let (grams, serving_quantity, serving_unit, estimated) = match edited {
            QuantityEdited::Grams => {
                let (sq, su) = serving_for_grams(&tx, &food, value)?;
                (value, sq, su, false)
            }
            QuantityEdited::Serving => {
                // Re-derive grams through the unit the item displays in;
                // without one, fall back to the generic serving token.
                let unit = item.serving_unit.clone().unwrap_or_else(|| "serving".to_string());
                let normalized = normalize(&tx, &food, value, &unit)?;
                (
                    normalized.grams,
                    normalized.serving_quantity,
                    normalized.serving_unit,
                    normalized.estimated,
                )
            }
        };

        let nutrition = food.nutrition.scale(grams / food.serving_size_g).rounded();
        LoggedMealItem::update_quantities(
            &tx,
            item_id,
            grams,
            serving_quantity,
            serving_unit.as_deref(),
            edited,
            estimated,
            &nutrition,
        )?;

        // Refresh meal totals from all items
        let totals: Nutrition = LoggedMealItem::get_for_meal(&tx, item.meal_id)?
            .into_iter()
            .map(|i| i.nutrition)
            .sum();
        LoggedMeal::update_cached_totals(&tx, item.meal_id, &totals.rounded())?;

        LoggedMealItem::get_by_id(&tx, item_id)?.ok_or(EngineError::NotFound {
            what: "meal item",
            id: item_id,
        })?
    };

    tx.commit().map_err(crate::db::DbError::from)?;
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testutil::{link_template, seed_breakfast, seed_template, test_conn};
    use crate::models::FoodServing;

    #[test]
    fn test_scenario_d_materialized_meal_is_atomic() {
        let mut conn = test_conn();
        let fixture = seed_breakfast(&conn);

        let double = seed_template(&conn, "Double Breakfast");
        link_template(&conn, double, fixture.breakfast, 2.0);

        let meal_id = log_meal_from_template(
            &mut conn,
            "alice",
            double,
            Some("2026-08-23T08:00:00Z"),
            MealType::Breakfast,
            None,
        )
        .unwrap();

        let meal = LoggedMeal::get_by_id(&conn, meal_id).unwrap().unwrap();
        assert!((meal.cached_nutrition.calories - 426.0).abs() < 0.01);
        assert_eq!(meal.source_template_id, Some(double));

        // Exactly two atomic items, never a template reference
        let items = LoggedMealItem::get_for_meal(&conn, meal_id).unwrap();
        assert_eq!(items.len(), 2);
        let eggs = items.iter().find(|i| i.food_id == fixture.eggs).unwrap();
        let toast = items.iter().find(|i| i.food_id == fixture.toast).unwrap();
        assert!((eggs.gram_quantity - 200.0).abs() < 1e-9);
        assert!((toast.gram_quantity - 56.0).abs() < 1e-9);
        assert_eq!(eggs.serving_quantity, Some(4.0));
        assert_eq!(toast.serving_quantity, Some(2.0));
    }

    #[test]
    fn test_template_logging_records_serving_popularity() {
        let mut conn = test_conn();
        let fixture = seed_breakfast(&conn);

        // Nest it so popularity is recorded for the whole subtree, not just
        // the top-level items
        let double = seed_template(&conn, "Double Breakfast");
        link_template(&conn, double, fixture.breakfast, 2.0);

        log_meal_from_template(&mut conn, "alice", double, None, MealType::Breakfast, None)
            .unwrap();

        let large = FoodServing::find_by_unit(&conn, fixture.eggs, "large")
            .unwrap()
            .unwrap();
        let slice = FoodServing::find_by_unit(&conn, fixture.toast, "slice")
            .unwrap()
            .unwrap();
        assert_eq!(large.use_count, 1);
        assert_eq!(slice.use_count, 1);
    }

    #[test]
    fn test_template_use_count_and_last_used() {
        let mut conn = test_conn();
        let fixture = seed_breakfast(&conn);

        log_meal_from_template(
            &mut conn,
            "alice",
            fixture.breakfast,
            Some("2026-08-23T08:00:00Z"),
            MealType::Breakfast,
            None,
        )
        .unwrap();

        let template = MealTemplate::get_by_id(&conn, fixture.breakfast).unwrap().unwrap();
        assert_eq!(template.use_count, 1);
        assert_eq!(template.last_used_at.as_deref(), Some("2026-08-23T08:00:00Z"));
    }

    #[test]
    fn test_private_template_invisible_to_others() {
        let mut conn = test_conn();
        let fixture = seed_breakfast(&conn);
        conn.execute(
            "UPDATE meal_templates SET owner = 'bob' WHERE id = ?1",
            [fixture.breakfast],
        )
        .unwrap();

        let err = log_meal_from_template(
            &mut conn,
            "alice",
            fixture.breakfast,
            None,
            MealType::Breakfast,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { what: "template", .. }));

        // Nothing was persisted
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM logged_meals", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_missing_template_is_not_found() {
        let mut conn = test_conn();
        let err =
            log_meal_from_template(&mut conn, "alice", 4242, None, MealType::Lunch, None)
                .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { what: "template", id: 4242 }));
    }

    #[test]
    fn test_log_food_ad_hoc() {
        let mut conn = test_conn();
        let fixture = seed_breakfast(&conn);

        let meal_id = log_food(
            &mut conn,
            "alice",
            fixture.toast,
            2.0,
            "slice",
            Some("2026-08-23T12:30:00Z"),
            MealType::Lunch,
            None,
        )
        .unwrap();

        let meal = LoggedMeal::get_by_id(&conn, meal_id).unwrap().unwrap();
        assert!((meal.cached_nutrition.calories - 138.0).abs() < 0.01);
        assert_eq!(meal.source_template_id, None);

        let items = LoggedMealItem::get_for_meal(&conn, meal_id).unwrap();
        assert_eq!(items.len(), 1);
        assert!((items[0].gram_quantity - 56.0).abs() < 1e-9);
        assert!(!items[0].estimated);
    }

    #[test]
    fn test_log_food_unresolved_unit_is_estimated_not_fatal() {
        let mut conn = test_conn();
        let fixture = seed_breakfast(&conn);

        let meal_id = log_food(
            &mut conn,
            "alice",
            fixture.eggs,
            1.0,
            "dollop",
            None,
            MealType::Snack,
            None,
        )
        .unwrap();

        let items = LoggedMealItem::get_for_meal(&conn, meal_id).unwrap();
        assert!(items[0].estimated);
        // Canonical-serving fallback: 1 x 50 g
        assert!((items[0].gram_quantity - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_update_item_grams_rederives_serving() {
        let mut conn = test_conn();
        let fixture = seed_breakfast(&conn);
        let meal_id = log_food(
            &mut conn,
            "alice",
            fixture.toast,
            1.0,
            "slice",
            None,
            MealType::Snack,
            None,
        )
        .unwrap();
        let item = &LoggedMealItem::get_for_meal(&conn, meal_id).unwrap()[0];

        let updated =
            update_item_quantity(&mut conn, "alice", item.id, 84.0, QuantityEdited::Grams)
                .unwrap();
        assert_eq!(updated.gram_quantity, 84.0);
        assert_eq!(updated.serving_quantity, Some(3.0));
        assert_eq!(updated.last_edited, QuantityEdited::Grams);

        let meal = LoggedMeal::get_by_id(&conn, meal_id).unwrap().unwrap();
        assert!((meal.cached_nutrition.calories - 207.0).abs() < 0.01);
    }

    #[test]
    fn test_update_item_serving_rederives_grams_exactly() {
        let mut conn = test_conn();
        let fixture = seed_breakfast(&conn);
        let meal_id = log_food(
            &mut conn,
            "alice",
            fixture.toast,
            3.0,
            "slice",
            None,
            MealType::Snack,
            None,
        )
        .unwrap();
        let item = &LoggedMealItem::get_for_meal(&conn, meal_id).unwrap()[0];

        let updated =
            update_item_quantity(&mut conn, "alice", item.id, 2.0, QuantityEdited::Serving)
                .unwrap();
        assert_eq!(updated.serving_quantity, Some(2.0));
        assert_eq!(updated.gram_quantity, 56.0);
        assert_eq!(updated.last_edited, QuantityEdited::Serving);
    }

    #[test]
    fn test_update_item_foreign_meal_is_not_found() {
        let mut conn = test_conn();
        let fixture = seed_breakfast(&conn);
        let meal_id = log_food(
            &mut conn,
            "alice",
            fixture.toast,
            1.0,
            "slice",
            None,
            MealType::Snack,
            None,
        )
        .unwrap();
        let item = &LoggedMealItem::get_for_meal(&conn, meal_id).unwrap()[0];

        let err = update_item_quantity(&mut conn, "mallory", item.id, 10.0, QuantityEdited::Grams)
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { what: "meal item", .. }));
    }

    #[test]
    fn test_materializer_never_persists_template_refs() {
        // Structural guarantee: items carry food ids only. The ItemRef type
        // exists on templates, not on logged items, so this just pins the
        // schema contract.
        let mut conn = test_conn();
        let fixture = seed_breakfast(&conn);
        let meal_id = log_meal_from_template(
            &mut conn,
            "alice",
            fixture.breakfast,
            None,
            MealType::Breakfast,
            None,
        )
        .unwrap();

        for item in LoggedMealItem::get_for_meal(&conn, meal_id).unwrap() {
            // Every referenced id resolves to a food row
            assert!(Food::get_by_id(&conn, item.food_id).unwrap().is_some());
            let _ = ItemRef::Food(item.food_id);
        }
    }
}
