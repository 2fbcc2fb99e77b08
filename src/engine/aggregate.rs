//! Recursive Nutrition Aggregator
//!
//! Computes the total nutrient vector for a template by walking its item
//! tree: foods resolve through the Unit Normalizer and scale by
//! grams / canonical serving size; nested templates recurse and scale by
//! the enclosing item's quantity. Aggregation is fully recursive over live
//! items, never over cached child totals, so a refresh can run in any order
//! without reading stale values.

use rusqlite::Connection;

use crate::models::{Food, ItemRef, MealTemplate, Nutrition, TemplateItem};

use super::error::{EngineError, EngineResult};
use super::graph::ancestor_ids;
use super::normalize::normalize;

/// Default recursion depth cap.
///
/// Defense-in-depth independent of cycle prevention: hitting it means
/// either a validator bug or an abnormally deep hierarchy, and both must
/// surface as an error rather than a truncated total.
pub const MAX_EXPANSION_DEPTH: usize = 10;

/// Aggregate a template's nutrient totals with the default depth cap
pub fn aggregate(conn: &Connection, template_id: i64) -> EngineResult<Nutrition> {
    aggregate_with_limit(conn, template_id, MAX_EXPANSION_DEPTH)
}

/// Aggregate with a caller-chosen depth cap
pub fn aggregate_with_limit(
    conn: &Connection,
    template_id: i64,
    max_depth: usize,
) -> EngineResult<Nutrition> {
    aggregate_at(conn, template_id, 1, max_depth)
}

fn aggregate_at(
    conn: &Connection,
    template_id: i64,
    depth: usize,
    max_depth: usize,
) -> EngineResult<Nutrition> {
    if depth > max_depth {
        return Err(EngineError::DepthExceeded { limit: max_depth });
    }

    if MealTemplate::get_by_id(conn, template_id)?.is_none() {
        return Err(EngineError::NotFound {
            what: "template",
            id: template_id,
        });
    }

    let mut total = Nutrition::zero();

    for item in TemplateItem::get_for_template(conn, template_id)? {
        match item.item {
            ItemRef::Food(food_id) => {
                let food = Food::get_by_id(conn, food_id)?.ok_or(EngineError::NotFound {
                    what: "food",
                    id: food_id,
                })?;
                if food.serving_size_g <= 0.0 {
                    return Err(EngineError::InvalidItem(format!(
                        "food {} has a non-positive canonical serving size",
                        food_id
                    )));
                }

                let normalized = normalize(conn, &food, item.quantity, &item.unit)?;
                let multiplier = normalized.grams / food.serving_size_g;
                total = total + food.nutrition.scale(multiplier);
            }
            ItemRef::Template(child_id) => {
                // The item quantity is the only multiplier at this level:
                // 2x a template of 3x a food aggregates as 6x the food.
                let child_total = aggregate_at(conn, child_id, depth + 1, max_depth)?;
                total = total + child_total.scale(item.quantity);
            }
        }
    }

    Ok(total)
}

/// Recompute and persist a template's cached nutrition.
///
/// Rounding is applied once here, at the cache boundary, not per term.
pub fn refresh_template(conn: &Connection, template_id: i64) -> EngineResult<Nutrition> {
    let totals = aggregate(conn, template_id)?.rounded();
    MealTemplate::update_cached_nutrition(conn, template_id, &totals)?;
    tracing::debug!(template_id, calories = totals.calories, "refreshed cached nutrition");
    Ok(totals)
}

/// Explicit handler for "a template's items changed".
///
/// Refreshes the edited template and every transitive ancestor, replacing
/// the trigger cascade of the original design with a plain function call
/// graph. Must run inside the same transaction as the structural edit so
/// readers never observe stale caches.
pub fn on_items_changed(conn: &Connection, template_id: i64) -> EngineResult<Nutrition> {
    let totals = refresh_template(conn, template_id)?;
    for ancestor in ancestor_ids(conn, template_id)? {
        refresh_template(conn, ancestor)?;
    }
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testutil::{
        add_food_item, link_template, seed_breakfast, seed_food, seed_template, test_conn,
    };

    #[test]
    fn test_scenario_a_breakfast_aggregate() {
        // Eggs: 2 "large" (50 g each, 72 kcal / 50 g)
        // Toast: 1 "slice" (28 g, 69 kcal / 28 g)
        let conn = test_conn();
        let fixture = seed_breakfast(&conn);

        let totals = aggregate(&conn, fixture.breakfast).unwrap();
        assert!((totals.calories - 213.0).abs() < 1e-9);
    }

    #[test]
    fn test_scenario_b_nested_template_scales_linearly() {
        let conn = test_conn();
        let fixture = seed_breakfast(&conn);

        let double = seed_template(&conn, "Double Breakfast");
        link_template(&conn, double, fixture.breakfast, 2.0);

        let totals = aggregate(&conn, double).unwrap();
        assert!((totals.calories - 426.0).abs() < 1e-9);
    }

    #[test]
    fn test_nesting_composition_rule() {
        // 2x a template containing 3x a food equals 6x the food directly
        let conn = test_conn();
        let rice = seed_food(&conn, "Rice", 100.0, 130.0);

        let inner = seed_template(&conn, "Inner");
        add_food_item(&conn, inner, rice.id, 3.0, "serving");

        let outer = seed_template(&conn, "Outer");
        link_template(&conn, outer, inner, 2.0);

        let direct = seed_template(&conn, "Direct");
        add_food_item(&conn, direct, rice.id, 6.0, "serving");

        let nested_totals = aggregate(&conn, outer).unwrap();
        let direct_totals = aggregate(&conn, direct).unwrap();
        assert!(nested_totals.approx_eq(&direct_totals, 1e-9));
        assert!((nested_totals.calories - 780.0).abs() < 1e-9);
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let conn = test_conn();
        let fixture = seed_breakfast(&conn);

        let first = aggregate(&conn, fixture.breakfast).unwrap();
        let second = aggregate(&conn, fixture.breakfast).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_aggregate_unknown_template_is_not_found() {
        let conn = test_conn();
        let err = aggregate(&conn, 9999).unwrap_err();
        assert!(matches!(err, EngineError::NotFound { what: "template", id: 9999 }));
    }

    #[test]
    fn test_depth_cap_within_limit() {
        let conn = test_conn();
        let rice = seed_food(&conn, "Rice", 100.0, 130.0);

        // Chain of 10 templates, leaf holds the food: exactly at the cap
        let mut ids = Vec::new();
        for i in 0..10 {
            ids.push(seed_template(&conn, &format!("Level {}", i)));
        }
        for w in ids.windows(2) {
            link_template(&conn, w[0], w[1], 1.0);
        }
        add_food_item(&conn, *ids.last().unwrap(), rice.id, 1.0, "serving");

        let totals = aggregate(&conn, ids[0]).unwrap();
        assert!((totals.calories - 130.0).abs() < 1e-9);
    }

    #[test]
    fn test_depth_cap_exceeded_is_fatal() {
        let conn = test_conn();

        let mut ids = Vec::new();
        for i in 0..12 {
            ids.push(seed_template(&conn, &format!("Level {}", i)));
        }
        for w in ids.windows(2) {
            link_template(&conn, w[0], w[1], 1.0);
        }

        let err = aggregate(&conn, ids[0]).unwrap_err();
        assert!(matches!(err, EngineError::DepthExceeded { limit: MAX_EXPANSION_DEPTH }));
    }

    #[test]
    fn test_configurable_depth_limit() {
        let conn = test_conn();
        let a = seed_template(&conn, "A");
        let b = seed_template(&conn, "B");
        link_template(&conn, a, b, 1.0);

        assert!(aggregate_with_limit(&conn, a, 2).is_ok());
        let err = aggregate_with_limit(&conn, a, 1).unwrap_err();
        assert!(matches!(err, EngineError::DepthExceeded { limit: 1 }));
    }

    #[test]
    fn test_on_items_changed_refreshes_ancestors() {
        let conn = test_conn();
        let fixture = seed_breakfast(&conn);

        let double = seed_template(&conn, "Double Breakfast");
        link_template(&conn, double, fixture.breakfast, 2.0);
        on_items_changed(&conn, double).unwrap();

        // Change deep inside the tree: swap eggs quantity from 2 to 3
        conn.execute(
            "UPDATE template_items SET quantity = 3.0 WHERE template_id = ?1 AND food_id = ?2",
            rusqlite::params![fixture.breakfast, fixture.eggs],
        )
        .unwrap();
        on_items_changed(&conn, fixture.breakfast).unwrap();

        let breakfast = MealTemplate::get_by_id(&conn, fixture.breakfast).unwrap().unwrap();
        assert!((breakfast.cached_nutrition.calories - 285.0).abs() < 1e-9);

        // The enclosing template refreshed too
        let double_t = MealTemplate::get_by_id(&conn, double).unwrap().unwrap();
        assert!((double_t.cached_nutrition.calories - 570.0).abs() < 1e-9);
    }

    #[test]
    fn test_cached_nutrition_matches_fresh_aggregate() {
        let conn = test_conn();
        let fixture = seed_breakfast(&conn);
        on_items_changed(&conn, fixture.breakfast).unwrap();

        let cached = MealTemplate::get_by_id(&conn, fixture.breakfast)
            .unwrap()
            .unwrap()
            .cached_nutrition;
        let fresh = aggregate(&conn, fixture.breakfast).unwrap();
        assert!(cached.approx_eq(&fresh.rounded(), 0.01));
    }
}
