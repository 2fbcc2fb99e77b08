//! Unit Normalizer
//!
//! Converts a logged quantity (value + unit) into a canonical gram quantity
//! and, where a household serving definition exists, a synchronized serving
//! quantity. Units that resolve to neither grams nor a known household
//! serving fall back to canonical-serving multiples and are flagged
//! estimated instead of failing the operation.

use rusqlite::Connection;

use crate::models::{Food, FoodServing, FoodServingCreate};

use super::error::EngineResult;
use super::units::{canonical_unit_token, classify_unit, grams_per_unit, UnitKind};

/// A quantity resolved to both representations
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedQuantity {
    /// Canonical gram quantity, the source of truth for nutrient math
    pub grams: f64,
    /// Display quantity in household serving units, when derivable
    pub serving_quantity: Option<f64>,
    pub serving_unit: Option<String>,
    /// True when the unit fell back to canonical-serving multiples
    pub estimated: bool,
}

/// Resolve a raw (quantity, unit) pair against a food.
///
/// Pure read: the serving-popularity side effect lives in
/// [`record_serving_use`] so aggregation stays side-effect free.
pub fn normalize(
    conn: &Connection,
    food: &Food,
    quantity: f64,
    raw_unit: &str,
) -> EngineResult<NormalizedQuantity> {
    match classify_unit(raw_unit) {
        UnitKind::Weight => {
            // grams_per_unit is total for every weight token classify_unit accepts
            let factor = grams_per_unit(raw_unit).unwrap_or(1.0);
            let grams = quantity * factor;
            let (serving_quantity, serving_unit) = serving_for_grams(conn, food, grams)?;
            Ok(NormalizedQuantity {
                grams,
                serving_quantity,
                serving_unit,
                estimated: false,
            })
        }
        UnitKind::GenericServing => {
            // Explicit policy: "serving" means multiples of the canonical
            // serving size.
            Ok(NormalizedQuantity {
                grams: quantity * food.serving_size_g,
                serving_quantity: Some(quantity),
                serving_unit: Some("serving".to_string()),
                estimated: false,
            })
        }
        UnitKind::Household => {
            let token = canonical_unit_token(raw_unit);
            if let Some(serving) = FoodServing::find_by_unit(conn, food.id, &token)? {
                return Ok(NormalizedQuantity {
                    grams: quantity * serving.gram_weight,
                    serving_quantity: Some(quantity),
                    serving_unit: Some(serving.unit),
                    estimated: false,
                });
            }

            // Unrecognized unit: recover as canonical-serving multiples and
            // flag the result so consumers can surface the estimate.
            tracing::warn!(
                food_id = food.id,
                unit = %token,
                "unresolved unit, treating quantity as canonical-serving multiples"
            );
            Ok(NormalizedQuantity {
                grams: quantity * food.serving_size_g,
                serving_quantity: Some(quantity),
                serving_unit: Some(token),
                estimated: true,
            })
        }
    }
}

/// Derive the display serving quantity for a gram amount.
///
/// Prefers the food's default household serving; falls back to canonical
/// serving multiples, or leaves the serving side unset when the canonical
/// serving size is unusable.
pub fn serving_for_grams(
    conn: &Connection,
    food: &Food,
    grams: f64,
) -> EngineResult<(Option<f64>, Option<String>)> {
    if let Some(serving) = FoodServing::get_default_for_food(conn, food.id)? {
        if serving.gram_weight > 0.0 {
            return Ok((Some(grams / serving.gram_weight), Some(serving.unit)));
        }
    }
    if food.serving_size_g > 0.0 {
        return Ok((Some(grams / food.serving_size_g), Some("serving".to_string())));
    }
    Ok((None, None))
}

/// Record that a household serving was used, informing future default
/// suggestions.
///
/// Increments the matched serving's popularity counter, or creates a new
/// FoodServing the first time a novel household unit is used (seeded with
/// the canonical serving size as its gram weight, which is what the
/// normalizer's fallback assumed). Best-effort by contract: failures are
/// logged and swallowed, never blocking nutrient calculation.
pub fn record_serving_use(conn: &Connection, food: &Food, raw_unit: &str) {
    if classify_unit(raw_unit) != UnitKind::Household {
        return;
    }
    let token = canonical_unit_token(raw_unit);

    let result = (|| -> EngineResult<()> {
        match FoodServing::find_by_unit(conn, food.id, &token)? {
            Some(serving) => FoodServing::increment_use_count(conn, serving.id)?,
            None => {
                if food.serving_size_g > 0.0 {
                    let created = FoodServing::create(
                        conn,
                        &FoodServingCreate {
                            food_id: food.id,
                            unit: token.clone(),
                            gram_weight: food.serving_size_g,
                            is_default: false,
                        },
                    )?;
                    FoodServing::increment_use_count(conn, created.id)?;
                }
            }
        }
        Ok(())
    })();

    if let Err(e) = result {
        tracing::warn!(
            food_id = food.id,
            unit = %token,
            error = %e,
            "failed to update serving popularity"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testutil::{seed_food, seed_serving, test_conn};

    #[test]
    fn test_normalize_grams_with_default_serving() {
        let conn = test_conn();
        let eggs = seed_food(&conn, "Eggs", 50.0, 72.0);
        seed_serving(&conn, eggs.id, "large", 50.0, true);

        let n = normalize(&conn, &eggs, 100.0, "g").unwrap();
        assert_eq!(n.grams, 100.0);
        assert_eq!(n.serving_quantity, Some(2.0));
        assert_eq!(n.serving_unit.as_deref(), Some("large"));
        assert!(!n.estimated);
    }

    #[test]
    fn test_normalize_grams_without_serving_definition() {
        let conn = test_conn();
        let rice = seed_food(&conn, "Rice", 100.0, 130.0);

        let n = normalize(&conn, &rice, 150.0, "g").unwrap();
        assert_eq!(n.grams, 150.0);
        assert_eq!(n.serving_quantity, Some(1.5));
        assert_eq!(n.serving_unit.as_deref(), Some("serving"));
        assert!(!n.estimated);
    }

    #[test]
    fn test_normalize_weight_unit_conversion() {
        let conn = test_conn();
        let rice = seed_food(&conn, "Rice", 100.0, 130.0);

        let n = normalize(&conn, &rice, 1.0, "kg").unwrap();
        assert_eq!(n.grams, 1000.0);
    }

    #[test]
    fn test_normalize_household_unit() {
        let conn = test_conn();
        let toast = seed_food(&conn, "Toast", 28.0, 69.0);
        seed_serving(&conn, toast.id, "slice", 28.0, true);

        let n = normalize(&conn, &toast, 2.0, "slice").unwrap();
        assert_eq!(n.grams, 56.0);
        assert_eq!(n.serving_quantity, Some(2.0));
        assert_eq!(n.serving_unit.as_deref(), Some("slice"));
        assert!(!n.estimated);
    }

    #[test]
    fn test_normalize_generic_serving_token() {
        let conn = test_conn();
        let rice = seed_food(&conn, "Rice", 100.0, 130.0);

        let n = normalize(&conn, &rice, 3.0, "servings").unwrap();
        assert_eq!(n.grams, 300.0);
        assert_eq!(n.serving_quantity, Some(3.0));
        assert!(!n.estimated);
    }

    #[test]
    fn test_normalize_unrecognized_unit_is_estimated_fallback() {
        let conn = test_conn();
        let rice = seed_food(&conn, "Rice", 100.0, 130.0);

        let n = normalize(&conn, &rice, 2.0, "handful").unwrap();
        assert_eq!(n.grams, 200.0);
        assert_eq!(n.serving_quantity, Some(2.0));
        assert_eq!(n.serving_unit.as_deref(), Some("handful"));
        assert!(n.estimated);
    }

    #[test]
    fn test_dual_quantity_round_trip() {
        let conn = test_conn();
        let toast = seed_food(&conn, "Toast", 28.0, 69.0);
        seed_serving(&conn, toast.id, "slice", 28.0, true);

        // grams -> servings -> grams is exact when a serving is defined
        let n = normalize(&conn, &toast, 84.0, "g").unwrap();
        let servings = n.serving_quantity.unwrap();
        let back = normalize(&conn, &toast, servings, "slice").unwrap();
        assert_eq!(back.grams, 84.0);
    }

    #[test]
    fn test_record_serving_use_increments_popularity() {
        let conn = test_conn();
        let toast = seed_food(&conn, "Toast", 28.0, 69.0);
        let serving = seed_serving(&conn, toast.id, "slice", 28.0, true);

        record_serving_use(&conn, &toast, "slice");
        record_serving_use(&conn, &toast, "slice");

        let refreshed = FoodServing::get_by_id(&conn, serving.id).unwrap().unwrap();
        assert_eq!(refreshed.use_count, 2);
    }

    #[test]
    fn test_record_serving_use_creates_novel_serving() {
        let conn = test_conn();
        let rice = seed_food(&conn, "Rice", 100.0, 130.0);

        record_serving_use(&conn, &rice, "bowl");

        let created = FoodServing::find_by_unit(&conn, rice.id, "bowl").unwrap().unwrap();
        assert_eq!(created.gram_weight, 100.0);
        assert_eq!(created.use_count, 1);
        assert!(!created.is_default);
    }

    #[test]
    fn test_record_serving_use_ignores_weight_units() {
        let conn = test_conn();
        let rice = seed_food(&conn, "Rice", 100.0, 130.0);

        record_serving_use(&conn, &rice, "g");

        assert!(FoodServing::get_for_food(&conn, rice.id).unwrap().is_empty());
    }
}
