//! Food catalog tools
//!
//! Tools for managing foods and their household serving definitions.

use serde::Serialize;

use crate::db::Database;
use crate::engine::on_items_changed;
use crate::models::{
    Food, FoodCreate, FoodServing, FoodServingCreate, FoodUpdate, Nutrition,
};

/// Response for create_food
#[derive(Debug, Serialize)]
pub struct CreateFoodResponse {
    pub id: i64,
    pub name: String,
    pub created_at: String,
}

/// Full food detail with its serving definitions
#[derive(Debug, Serialize)]
pub struct FoodDetail {
    pub id: i64,
    pub name: String,
    pub brand: Option<String>,
    pub serving_size_g: f64,
    pub nutrition: Nutrition,
    pub servings: Vec<FoodServing>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub template_usage_count: i64,
    pub logged_usage_count: i64,
}

/// Food summary for listing
#[derive(Debug, Serialize)]
pub struct FoodSummary {
    pub id: i64,
    pub name: String,
    pub brand: Option<String>,
    pub serving_size_g: f64,
    pub calories: f64,
}

/// Response for list_foods
#[derive(Debug, Serialize)]
pub struct ListFoodsResponse {
    pub foods: Vec<FoodSummary>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Response for update_food
#[derive(Debug, Serialize)]
pub struct UpdateFoodResponse {
    pub success: bool,
    pub updated_at: String,
    /// Templates whose cached nutrition was refreshed as a consequence
    pub templates_refreshed: usize,
}

/// Response for delete blocked by references
#[derive(Debug, Serialize)]
pub struct FoodDeleteBlockedResponse {
    pub error: String,
    pub template_usage_count: i64,
    pub logged_usage_count: i64,
}

/// Response for successful delete
#[derive(Debug, Serialize)]
pub struct FoodDeleteSuccessResponse {
    pub success: bool,
    pub deleted_id: i64,
}

fn summary(food: Food) -> FoodSummary {
    FoodSummary {
        id: food.id,
        name: food.name,
        brand: food.brand,
        serving_size_g: food.serving_size_g,
        calories: food.nutrition.calories,
    }
}

/// Create a new food
pub fn create_food(db: &Database, data: FoodCreate) -> Result<CreateFoodResponse, String> {
    let name = data.name.trim();
    if name.is_empty() {
        return Err("Food name cannot be empty".to_string());
    }
    if data.serving_size_g <= 0.0 {
        return Err("serving_size_g must be greater than 0".to_string());
    }

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let food = Food::create(&conn, &data)
        .map_err(|e| format!("Failed to create food: {}", e))?;

    Ok(CreateFoodResponse {
        id: food.id,
        name: food.name,
        created_at: food.created_at,
    })
}

/// Get a food with full details
pub fn get_food(db: &Database, id: i64) -> Result<Option<FoodDetail>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let food = Food::get_by_id(&conn, id)
        .map_err(|e| format!("Failed to get food: {}", e))?;

    match food {
        Some(food) => {
            let servings = FoodServing::get_for_food(&conn, id)
                .map_err(|e| format!("Failed to get servings: {}", e))?;
            let template_usage_count = Food::get_template_usage_count(&conn, id)
                .map_err(|e| format!("Failed to check template usage: {}", e))?;
            let logged_usage_count = Food::get_logged_usage_count(&conn, id)
                .map_err(|e| format!("Failed to check logged usage: {}", e))?;

            Ok(Some(FoodDetail {
                id: food.id,
                name: food.name,
                brand: food.brand,
                serving_size_g: food.serving_size_g,
                nutrition: food.nutrition,
                servings,
                notes: food.notes,
                created_at: food.created_at,
                updated_at: food.updated_at,
                template_usage_count,
                logged_usage_count,
            }))
        }
        None => Ok(None),
    }
}

/// Search foods by name or brand
pub fn search_foods(db: &Database, query: &str, limit: i64) -> Result<Vec<FoodSummary>, String> {
    let limit = limit.min(200).max(1);

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let foods = Food::search(&conn, query, limit)
        .map_err(|e| format!("Failed to search foods: {}", e))?;

    Ok(foods.into_iter().map(summary).collect())
}

/// List foods with sorting and paging
pub fn list_foods(
    db: &Database,
    sort_by: &str,
    sort_order: &str,
    limit: i64,
    offset: i64,
) -> Result<ListFoodsResponse, String> {
    let limit = limit.min(200).max(1);
    let offset = offset.max(0);

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let foods = Food::list(&conn, sort_by, sort_order, limit, offset)
        .map_err(|e| format!("Failed to list foods: {}", e))?;
    let total = Food::count(&conn).map_err(|e| format!("Failed to count foods: {}", e))?;

    Ok(ListFoodsResponse {
        foods: foods.into_iter().map(summary).collect(),
        total,
        limit,
        offset,
    })
}

/// Update a food, refreshing every template that contains it.
///
/// Nutrient edits invalidate cached template totals, so the edit and the
/// cascade run in one transaction.
pub fn update_food(db: &Database, id: i64, data: FoodUpdate) -> Result<UpdateFoodResponse, String> {
    if let Some(serving_size_g) = data.serving_size_g {
        if serving_size_g <= 0.0 {
            return Err("serving_size_g must be greater than 0".to_string());
        }
    }

    let mut conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let tx = conn
        .transaction()
        .map_err(|e| format!("Database error: {}", e))?;

    let updated = Food::update(&tx, id, &data)
        .map_err(|e| format!("Failed to update food: {}", e))?;
    let food = match updated {
        Some(food) => food,
        None => return Err(format!("Food not found with id: {}", id)),
    };

    let mut template_ids: Vec<i64> = {
        let mut stmt = tx
            .prepare("SELECT DISTINCT template_id FROM template_items WHERE food_id = ?1")
            .map_err(|e| format!("Failed to find affected templates: {}", e))?;
        let ids = stmt
            .query_map([id], |row| row.get(0))
            .map_err(|e| format!("Failed to find affected templates: {}", e))?
            .collect::<Result<Vec<i64>, _>>()
            .map_err(|e| format!("Failed to find affected templates: {}", e))?;
        ids
    };
    template_ids.sort_unstable();
    template_ids.dedup();

    for template_id in &template_ids {
        on_items_changed(&tx, *template_id)
            .map_err(|e| format!("Failed to refresh template nutrition: {}", e))?;
    }

    tx.commit().map_err(|e| format!("Database error: {}", e))?;

    Ok(UpdateFoodResponse {
        success: true,
        updated_at: food.updated_at,
        templates_refreshed: template_ids.len(),
    })
}

/// Delete a food (blocked while referenced by templates or logged meals)
pub fn delete_food(
    db: &Database,
    id: i64,
) -> Result<Result<FoodDeleteSuccessResponse, FoodDeleteBlockedResponse>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    if Food::get_by_id(&conn, id)
        .map_err(|e| format!("Database error: {}", e))?
        .is_none()
    {
        return Err(format!("Food not found with id: {}", id));
    }

    let template_usage_count = Food::get_template_usage_count(&conn, id)
        .map_err(|e| format!("Failed to check template usage: {}", e))?;
    let logged_usage_count = Food::get_logged_usage_count(&conn, id)
        .map_err(|e| format!("Failed to check logged usage: {}", e))?;

    if template_usage_count > 0 || logged_usage_count > 0 {
        let mut reasons = Vec::new();
        if template_usage_count > 0 {
            reasons.push(format!("referenced by {} template item(s)", template_usage_count));
        }
        if logged_usage_count > 0 {
            reasons.push(format!("referenced by {} logged meal item(s)", logged_usage_count));
        }
        return Ok(Err(FoodDeleteBlockedResponse {
            error: format!("Cannot delete food: {}", reasons.join(", ")),
            template_usage_count,
            logged_usage_count,
        }));
    }

    Food::delete(&conn, id).map_err(|e| format!("Failed to delete food: {}", e))?;

    Ok(Ok(FoodDeleteSuccessResponse {
        success: true,
        deleted_id: id,
    }))
}

// ============================================================================
// Food Serving Tools
// ============================================================================

/// Add a household serving definition to a food
pub fn add_food_serving(db: &Database, data: FoodServingCreate) -> Result<FoodServing, String> {
    if data.unit.trim().is_empty() {
        return Err("Serving unit cannot be empty".to_string());
    }
    if data.gram_weight <= 0.0 {
        return Err("gram_weight must be greater than 0".to_string());
    }

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    if Food::get_by_id(&conn, data.food_id)
        .map_err(|e| format!("Database error checking food: {}", e))?
        .is_none()
    {
        return Err(format!("Food not found with id: {}", data.food_id));
    }

    if FoodServing::find_by_unit(&conn, data.food_id, &data.unit)
        .map_err(|e| format!("Database error checking existing servings: {}", e))?
        .is_some()
    {
        return Err(format!(
            "Food {} already has a serving named '{}'",
            data.food_id,
            data.unit.trim().to_lowercase()
        ));
    }

    FoodServing::create(&conn, &data).map_err(|e| format!("Failed to add serving: {}", e))
}

/// List a food's serving definitions, most popular first
pub fn list_food_servings(db: &Database, food_id: i64) -> Result<Vec<FoodServing>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    FoodServing::get_for_food(&conn, food_id)
        .map_err(|e| format!("Failed to list servings: {}", e))
}

/// Mark a serving as its food's default
pub fn set_default_serving(db: &Database, serving_id: i64) -> Result<bool, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    FoodServing::set_default(&conn, serving_id)
        .map_err(|e| format!("Failed to set default serving: {}", e))
}

/// Delete a serving definition
pub fn delete_food_serving(db: &Database, serving_id: i64) -> Result<bool, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    FoodServing::delete(&conn, serving_id)
        .map_err(|e| format!("Failed to delete serving: {}", e))
}
