//! Meal logging tools
//!
//! Materializing templates into logged meals, ad-hoc single-food logging,
//! and dual-quantity edits on logged items.

use serde::Serialize;

use crate::db::Database;
use crate::engine;
use crate::models::{LoggedMeal, LoggedMealItem, MealType, Nutrition, QuantityEdited};

/// One line of a logged meal, with the food name joined in
#[derive(Debug, Serialize)]
pub struct MealItemDetail {
    pub id: i64,
    pub food_id: i64,
    pub food_name: String,
    pub gram_quantity: f64,
    pub serving_quantity: Option<f64>,
    pub serving_unit: Option<String>,
    pub last_edited: QuantityEdited,
    pub estimated: bool,
    pub nutrition: Nutrition,
}

/// Full logged meal detail
#[derive(Debug, Serialize)]
pub struct MealDetail {
    pub id: i64,
    pub logged_at: String,
    pub meal_type: MealType,
    pub source_template_id: Option<i64>,
    pub items: Vec<MealItemDetail>,
    pub nutrition: Nutrition,
    pub notes: Option<String>,
    pub created_at: String,
}

/// Meal summary for listing
#[derive(Debug, Serialize)]
pub struct MealSummary {
    pub id: i64,
    pub logged_at: String,
    pub meal_type: MealType,
    pub calories: f64,
    pub item_count: usize,
}

/// Response for list_meals
#[derive(Debug, Serialize)]
pub struct ListMealsResponse {
    pub meals: Vec<MealSummary>,
    pub limit: i64,
    pub offset: i64,
}

fn item_detail(conn: &rusqlite::Connection, item: LoggedMealItem) -> Result<MealItemDetail, String> {
    let food_name: String = conn
        .query_row("SELECT name FROM foods WHERE id = ?1", [item.food_id], |row| row.get(0))
        .map_err(|e| format!("Failed to get food name: {}", e))?;

    Ok(MealItemDetail {
        id: item.id,
        food_id: item.food_id,
        food_name,
        gram_quantity: item.gram_quantity,
        serving_quantity: item.serving_quantity,
        serving_unit: item.serving_unit,
        last_edited: item.last_edited,
        estimated: item.estimated,
        nutrition: item.nutrition,
    })
}

fn meal_detail(conn: &rusqlite::Connection, meal: LoggedMeal) -> Result<MealDetail, String> {
    let items = LoggedMealItem::get_for_meal(conn, meal.id)
        .map_err(|e| format!("Failed to get meal items: {}", e))?
        .into_iter()
        .map(|item| item_detail(conn, item))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(MealDetail {
        id: meal.id,
        logged_at: meal.logged_at,
        meal_type: meal.meal_type,
        source_template_id: meal.source_template_id,
        items,
        nutrition: meal.cached_nutrition,
        notes: meal.notes,
        created_at: meal.created_at,
    })
}

/// Load a meal and enforce ownership
fn load_owned(conn: &rusqlite::Connection, caller: &str, id: i64) -> Result<LoggedMeal, String> {
    let meal = LoggedMeal::get_by_id(conn, id)
        .map_err(|e| format!("Failed to get meal: {}", e))?;
    match meal {
        Some(m) if m.owner == caller => Ok(m),
        _ => Err(format!("Meal not found with id: {}", id)),
    }
}

/// Materialize a logged meal from a template
pub fn log_meal(
    db: &Database,
    caller: &str,
    template_id: i64,
    logged_at: Option<&str>,
    meal_type: MealType,
    notes: Option<&str>,
) -> Result<MealDetail, String> {
    let mut conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let meal_id = engine::log_meal_from_template(
        &mut conn, caller, template_id, logged_at, meal_type, notes,
    )
    .map_err(|e| format!("Failed to log meal: {}", e))?;

    let meal = load_owned(&conn, caller, meal_id)?;
    meal_detail(&conn, meal)
}

/// Log a single food ad hoc, without a template
pub fn log_food(
    db: &Database,
    caller: &str,
    food_id: i64,
    quantity: f64,
    unit: &str,
    logged_at: Option<&str>,
    meal_type: MealType,
    notes: Option<&str>,
) -> Result<MealDetail, String> {
    if quantity <= 0.0 {
        return Err("quantity must be greater than 0".to_string());
    }

    let mut conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let meal_id = engine::log_food(
        &mut conn, caller, food_id, quantity, unit, logged_at, meal_type, notes,
    )
    .map_err(|e| format!("Failed to log food: {}", e))?;

    let meal = load_owned(&conn, caller, meal_id)?;
    meal_detail(&conn, meal)
}

/// Get a logged meal with its items
pub fn get_meal(db: &Database, caller: &str, id: i64) -> Result<MealDetail, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let meal = load_owned(&conn, caller, id)?;
    meal_detail(&conn, meal)
}

/// List the caller's meals, newest first, optionally within a time range
pub fn list_meals(
    db: &Database,
    caller: &str,
    from: Option<&str>,
    to: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<ListMealsResponse, String> {
    let limit = limit.min(200).max(1);
    let offset = offset.max(0);

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let meals = LoggedMeal::list_for_owner(&conn, caller, from, to, limit, offset)
        .map_err(|e| format!("Failed to list meals: {}", e))?;

    let mut summaries = Vec::new();
    for meal in meals {
        let items = LoggedMealItem::get_for_meal(&conn, meal.id)
            .map_err(|e| format!("Failed to get meal items: {}", e))?;

        summaries.push(MealSummary {
            id: meal.id,
            logged_at: meal.logged_at,
            meal_type: meal.meal_type,
            calories: meal.cached_nutrition.calories,
            item_count: items.len(),
        });
    }

    Ok(ListMealsResponse {
        meals: summaries,
        limit,
        offset,
    })
}

/// Edit one side of an item's dual quantity; the other side and all
/// nutrition re-derive
pub fn update_meal_item_quantity(
    db: &Database,
    caller: &str,
    item_id: i64,
    value: f64,
    edited: QuantityEdited,
) -> Result<MealItemDetail, String> {
    if value <= 0.0 {
        return Err("quantity must be greater than 0".to_string());
    }

    let mut conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let item = engine::update_item_quantity(&mut conn, caller, item_id, value, edited)
        .map_err(|e| format!("Failed to update item: {}", e))?;

    item_detail(&conn, item)
}

/// Remove one item from a logged meal, refreshing the meal totals
pub fn remove_meal_item(db: &Database, caller: &str, item_id: i64) -> Result<MealDetail, String> {
    let mut conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let tx = conn
        .transaction()
        .map_err(|e| format!("Database error: {}", e))?;

    let meal_id = LoggedMealItem::get_meal_id(&tx, item_id)
        .map_err(|e| format!("Failed to get item: {}", e))?
        .ok_or_else(|| format!("Meal item not found with id: {}", item_id))?;
    load_owned(&tx, caller, meal_id)?;

    LoggedMealItem::delete(&tx, item_id).map_err(|e| format!("Failed to remove item: {}", e))?;

    let totals: Nutrition = LoggedMealItem::get_for_meal(&tx, meal_id)
        .map_err(|e| format!("Failed to get meal items: {}", e))?
        .into_iter()
        .map(|i| i.nutrition)
        .sum();
    LoggedMeal::update_cached_totals(&tx, meal_id, &totals.rounded())
        .map_err(|e| format!("Failed to refresh meal totals: {}", e))?;

    tx.commit().map_err(|e| format!("Database error: {}", e))?;

    let meal = load_owned(&conn, caller, meal_id)?;
    meal_detail(&conn, meal)
}

/// Delete a logged meal and its items
pub fn delete_meal(db: &Database, caller: &str, id: i64) -> Result<bool, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    load_owned(&conn, caller, id)?;

    LoggedMeal::delete(&conn, id).map_err(|e| format!("Failed to delete meal: {}", e))
}

/// Per-nutrient totals for the caller's meals in a time range
#[derive(Debug, Serialize)]
pub struct MealTotalsResponse {
    pub from: Option<String>,
    pub to: Option<String>,
    pub meal_count: usize,
    pub totals: Nutrition,
}

/// Sum nutrition over the caller's meals in a time range
pub fn meal_totals(
    db: &Database,
    caller: &str,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<MealTotalsResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let meals = LoggedMeal::list_for_owner(&conn, caller, from, to, i64::MAX, 0)
        .map_err(|e| format!("Failed to list meals: {}", e))?;

    let meal_count = meals.len();
    let totals: Nutrition = meals.into_iter().map(|m| m.cached_nutrition).sum();

    Ok(MealTotalsResponse {
        from: from.map(str::to_string),
        to: to.map(str::to_string),
        meal_count,
        totals: totals.rounded(),
    })
}
