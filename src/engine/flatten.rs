//! Template Flattener
//!
//! Resolves a template's full nested structure into atomic (food, grams)
//! pairs. Same traversal and depth cap as the aggregator, but accumulating
//! gram quantities instead of nutrients. Duplicate foods anywhere in the
//! tree merge into a single entry with summed grams.

use std::collections::BTreeMap;

use rusqlite::Connection;

use crate::models::{Food, ItemRef, MealTemplate, TemplateItem};

use super::aggregate::MAX_EXPANSION_DEPTH;
use super::error::{EngineError, EngineResult};
use super::normalize::normalize;

/// One atomic entry of a flattened template
#[derive(Debug, Clone, PartialEq)]
pub struct FlatEntry {
    pub food_id: i64,
    pub grams: f64,
    /// True when any contributing quantity came from a unit fallback
    pub estimated: bool,
}

/// Flatten a template with the default depth cap
pub fn flatten(conn: &Connection, template_id: i64) -> EngineResult<Vec<FlatEntry>> {
    flatten_with_limit(conn, template_id, MAX_EXPANSION_DEPTH)
}

/// Flatten with a caller-chosen depth cap
pub fn flatten_with_limit(
    conn: &Connection,
    template_id: i64,
    max_depth: usize,
) -> EngineResult<Vec<FlatEntry>> {
    // BTreeMap keys the merge by food id and makes the output order
    // deterministic.
    let mut merged: BTreeMap<i64, (f64, bool)> = BTreeMap::new();
    flatten_at(conn, template_id, 1.0, 1, max_depth, &mut merged)?;

    Ok(merged
        .into_iter()
        .map(|(food_id, (grams, estimated))| FlatEntry {
            food_id,
            grams,
            estimated,
        })
        .collect())
}

fn flatten_at(
    conn: &Connection,
    template_id: i64,
    multiplier: f64,
    depth: usize,
    max_depth: usize,
    merged: &mut BTreeMap<i64, (f64, bool)>,
) -> EngineResult<()> {
    if depth > max_depth {
        return Err(EngineError::DepthExceeded { limit: max_depth });
    }

    if MealTemplate::get_by_id(conn, template_id)?.is_none() {
        return Err(EngineError::NotFound {
            what: "template",
            id: template_id,
        });
    }

    for item in TemplateItem::get_for_template(conn, template_id)? {
        match item.item {
            ItemRef::Food(food_id) => {
                let food = Food::get_by_id(conn, food_id)?.ok_or(EngineError::NotFound {
                    what: "food",
                    id: food_id,
                })?;

                let normalized = normalize(conn, &food, item.quantity, &item.unit)?;
                let entry = merged.entry(food_id).or_insert((0.0, false));
                entry.0 += normalized.grams * multiplier;
                entry.1 |= normalized.estimated;
            }
            ItemRef::Template(child_id) => {
                flatten_at(
                    conn,
                    child_id,
                    multiplier * item.quantity,
                    depth + 1,
                    max_depth,
                    merged,
                )?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::aggregate::aggregate;
    use crate::engine::testutil::{
        add_food_item, link_template, seed_breakfast, seed_food, seed_template, test_conn,
    };
    use crate::models::Nutrition;

    #[test]
    fn test_scenario_b_flatten_double_breakfast() {
        let conn = test_conn();
        let fixture = seed_breakfast(&conn);

        let double = seed_template(&conn, "Double Breakfast");
        link_template(&conn, double, fixture.breakfast, 2.0);

        let entries = flatten(&conn, double).unwrap();
        assert_eq!(entries.len(), 2);

        let eggs = entries.iter().find(|e| e.food_id == fixture.eggs).unwrap();
        let toast = entries.iter().find(|e| e.food_id == fixture.toast).unwrap();
        assert!((eggs.grams - 200.0).abs() < 1e-9);
        assert!((toast.grams - 56.0).abs() < 1e-9);
    }

    #[test]
    fn test_merge_on_duplicate_food() {
        // Toast appears directly and via a nested template: one entry,
        // summed grams.
        let conn = test_conn();
        let fixture = seed_breakfast(&conn);

        let brunch = seed_template(&conn, "Brunch");
        add_food_item(&conn, brunch, fixture.toast, 1.0, "slice");
        link_template(&conn, brunch, fixture.breakfast, 1.0);

        let entries = flatten(&conn, brunch).unwrap();
        assert_eq!(entries.len(), 2);

        let toast = entries.iter().find(|e| e.food_id == fixture.toast).unwrap();
        assert!((toast.grams - 56.0).abs() < 1e-9);
    }

    #[test]
    fn test_flatten_is_idempotent() {
        let conn = test_conn();
        let fixture = seed_breakfast(&conn);

        let first = flatten(&conn, fixture.breakfast).unwrap();
        let second = flatten(&conn, fixture.breakfast).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_flatten_aggregate_consistency() {
        // Summing each flat entry's implied nutrient contribution equals
        // the aggregate, within rounding tolerance.
        let conn = test_conn();
        let fixture = seed_breakfast(&conn);

        let double = seed_template(&conn, "Double Breakfast");
        link_template(&conn, double, fixture.breakfast, 2.0);

        let entries = flatten(&conn, double).unwrap();
        let mut from_flat = Nutrition::zero();
        for entry in &entries {
            let food = Food::get_by_id(&conn, entry.food_id).unwrap().unwrap();
            from_flat = from_flat + food.nutrition.scale(entry.grams / food.serving_size_g);
        }

        let aggregated = aggregate(&conn, double).unwrap();
        assert!(from_flat.approx_eq(&aggregated, 0.01));
    }

    #[test]
    fn test_flatten_estimated_flag_propagates() {
        let conn = test_conn();
        let rice = seed_food(&conn, "Rice", 100.0, 130.0);
        let t = seed_template(&conn, "Estimated");
        add_food_item(&conn, t, rice.id, 2.0, "handful");

        let entries = flatten(&conn, t).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].estimated);
        assert!((entries[0].grams - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_flatten_depth_cap() {
        let conn = test_conn();
        let mut ids = Vec::new();
        for i in 0..12 {
            ids.push(seed_template(&conn, &format!("Level {}", i)));
        }
        for w in ids.windows(2) {
            link_template(&conn, w[0], w[1], 1.0);
        }

        let err = flatten(&conn, ids[0]).unwrap_err();
        assert!(matches!(err, EngineError::DepthExceeded { .. }));
    }
}
