//! Meal template tools
//!
//! Tools for managing templates and their composition. Structural edits
//! (adding, updating, removing items) validate against cycles first, then
//! apply the change and refresh cached nutrition for the template and all
//! of its ancestors inside a single transaction.

use serde::Serialize;

use crate::db::Database;
use crate::engine::{
    ensure_no_cycle, flatten, on_items_changed, refresh_template, EngineError,
};
use crate::models::{
    Food, MealTemplate, MealTemplateCreate, MealTemplateUpdate, Nutrition, ItemRef,
    TemplateItem, TemplateItemCreate, TemplateItemDetail, TemplateItemUpdate,
};

/// Response for create_template
#[derive(Debug, Serialize)]
pub struct CreateTemplateResponse {
    pub id: i64,
    pub name: String,
    pub created_at: String,
}

/// Full template detail with its composition
#[derive(Debug, Serialize)]
pub struct TemplateDetail {
    pub id: i64,
    pub name: String,
    pub owner: Option<String>,
    pub is_favorite: bool,
    pub items: Vec<TemplateItemDetail>,
    pub nutrition: Nutrition,
    pub use_count: i64,
    pub last_used_at: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Template summary for listing
#[derive(Debug, Serialize)]
pub struct TemplateSummary {
    pub id: i64,
    pub name: String,
    pub is_favorite: bool,
    pub calories: f64,
    pub item_count: usize,
    pub use_count: i64,
}

/// Response for list_templates
#[derive(Debug, Serialize)]
pub struct ListTemplatesResponse {
    pub templates: Vec<TemplateSummary>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Response for a structural item change
#[derive(Debug, Serialize)]
pub struct ItemChangeResponse {
    pub item_id: i64,
    pub template_id: i64,
    /// Refreshed totals for the edited template
    pub nutrition: Nutrition,
}

/// One atomic line of a flattened template
#[derive(Debug, Serialize)]
pub struct FlattenedItem {
    pub food_id: i64,
    pub food_name: String,
    pub grams: f64,
    pub estimated: bool,
}

/// Response for flatten_template
#[derive(Debug, Serialize)]
pub struct FlattenTemplateResponse {
    pub template_id: i64,
    pub items: Vec<FlattenedItem>,
    pub nutrition: Nutrition,
}

/// Response for delete blocked
#[derive(Debug, Serialize)]
pub struct TemplateDeleteBlockedResponse {
    pub error: String,
    pub parent_usage_count: i64,
}

/// Response for successful delete
#[derive(Debug, Serialize)]
pub struct TemplateDeleteSuccessResponse {
    pub success: bool,
    pub deleted_id: i64,
}

/// Load a template and enforce visibility; private templates of other
/// owners are indistinguishable from missing ones.
fn load_visible(
    conn: &rusqlite::Connection,
    caller: &str,
    id: i64,
) -> Result<MealTemplate, String> {
    let template = MealTemplate::get_by_id(conn, id)
        .map_err(|e| format!("Failed to get template: {}", e))?;
    match template {
        Some(t) if t.visible_to(caller) => Ok(t),
        _ => Err(format!("Template not found with id: {}", id)),
    }
}

/// Create a new template
pub fn create_template(
    db: &Database,
    data: MealTemplateCreate,
) -> Result<CreateTemplateResponse, String> {
    let name = data.name.trim();
    if name.is_empty() {
        return Err("Template name cannot be empty".to_string());
    }

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let template = MealTemplate::create(&conn, &data)
        .map_err(|e| format!("Failed to create template: {}", e))?;

    Ok(CreateTemplateResponse {
        id: template.id,
        name: template.name,
        created_at: template.created_at,
    })
}

/// Get a template with its composition and cached nutrition
pub fn get_template(db: &Database, caller: &str, id: i64) -> Result<TemplateDetail, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let template = load_visible(&conn, caller, id)?;
    let items = TemplateItem::get_details_for_template(&conn, id)
        .map_err(|e| format!("Failed to get items: {}", e))?;

    Ok(TemplateDetail {
        id: template.id,
        name: template.name,
        owner: template.owner,
        is_favorite: template.is_favorite,
        items,
        nutrition: template.cached_nutrition,
        use_count: template.use_count,
        last_used_at: template.last_used_at,
        notes: template.notes,
        created_at: template.created_at,
        updated_at: template.updated_at,
    })
}

/// List templates visible to the caller
pub fn list_templates(
    db: &Database,
    caller: &str,
    query: Option<&str>,
    favorites_only: bool,
    sort_by: &str,
    sort_order: &str,
    limit: i64,
    offset: i64,
) -> Result<ListTemplatesResponse, String> {
    let limit = limit.min(200).max(1);
    let offset = offset.max(0);

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let templates = MealTemplate::list(
        &conn, caller, query, favorites_only, sort_by, sort_order, limit, offset,
    )
    .map_err(|e| format!("Failed to list templates: {}", e))?;
    let total = MealTemplate::count(&conn, caller, favorites_only)
        .map_err(|e| format!("Failed to count templates: {}", e))?;

    let mut summaries = Vec::new();
    for template in templates {
        let items = TemplateItem::get_for_template(&conn, template.id)
            .map_err(|e| format!("Failed to get items: {}", e))?;

        summaries.push(TemplateSummary {
            id: template.id,
            name: template.name,
            is_favorite: template.is_favorite,
            calories: template.cached_nutrition.calories,
            item_count: items.len(),
            use_count: template.use_count,
        });
    }

    Ok(ListTemplatesResponse {
        templates: summaries,
        total,
        limit,
        offset,
    })
}

/// Update a template's metadata
pub fn update_template(
    db: &Database,
    caller: &str,
    id: i64,
    data: MealTemplateUpdate,
) -> Result<TemplateDetail, String> {
    {
        let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
        load_visible(&conn, caller, id)?;

        MealTemplate::update(&conn, id, &data)
            .map_err(|e| format!("Failed to update template: {}", e))?;
    }

    get_template(db, caller, id)
}

/// Delete a template (blocked while other templates contain it)
pub fn delete_template(
    db: &Database,
    caller: &str,
    id: i64,
) -> Result<Result<TemplateDeleteSuccessResponse, TemplateDeleteBlockedResponse>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    load_visible(&conn, caller, id)?;

    let parent_usage_count = MealTemplate::get_parent_usage_count(&conn, id)
        .map_err(|e| format!("Failed to check parent usage: {}", e))?;

    if parent_usage_count > 0 {
        return Ok(Err(TemplateDeleteBlockedResponse {
            error: format!(
                "Cannot delete template: contained in {} other template(s)",
                parent_usage_count
            ),
            parent_usage_count,
        }));
    }

    // Logged meals keep their line items; only their provenance pointer
    // nulls out.
    MealTemplate::delete(&conn, id).map_err(|e| format!("Failed to delete template: {}", e))?;

    Ok(Ok(TemplateDeleteSuccessResponse {
        success: true,
        deleted_id: id,
    }))
}

// ============================================================================
// Template Item Tools
// ============================================================================

/// Add an item to a template.
///
/// Template references are validated against cycles before anything is
/// written; validation, insert, and the cache refresh cascade share one
/// transaction.
pub fn add_template_item(
    db: &Database,
    caller: &str,
    data: TemplateItemCreate,
) -> Result<ItemChangeResponse, String> {
    if data.quantity <= 0.0 {
        return Err("quantity must be greater than 0".to_string());
    }

    let mut conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let tx = conn
        .transaction()
        .map_err(|e| format!("Database error: {}", e))?;

    load_visible(&tx, caller, data.template_id)?;

    match data.item {
        ItemRef::Food(food_id) => {
            if Food::get_by_id(&tx, food_id)
                .map_err(|e| format!("Database error checking food: {}", e))?
                .is_none()
            {
                return Err(format!("Food not found with id: {}", food_id));
            }
        }
        ItemRef::Template(child_id) => {
            load_visible(&tx, caller, child_id)?;
            ensure_no_cycle(&tx, data.template_id, child_id).map_err(|e| match e {
                EngineError::CircularReference { parent, child } => format!(
                    "Cannot add item: template {} already contains template {} directly or indirectly",
                    child, parent
                ),
                other => format!("Failed to validate item: {}", other),
            })?;
        }
    }

    let item = TemplateItem::create(&tx, &data)
        .map_err(|e| format!("Failed to add item: {}", e))?;

    let nutrition = on_items_changed(&tx, data.template_id)
        .map_err(|e| format!("Failed to refresh nutrition: {}", e))?;

    tx.commit().map_err(|e| format!("Database error: {}", e))?;

    Ok(ItemChangeResponse {
        item_id: item.id,
        template_id: data.template_id,
        nutrition,
    })
}

/// Update an item's quantity, unit, or position
pub fn update_template_item(
    db: &Database,
    caller: &str,
    id: i64,
    data: TemplateItemUpdate,
) -> Result<ItemChangeResponse, String> {
    if let Some(quantity) = data.quantity {
        if quantity <= 0.0 {
            return Err("quantity must be greater than 0".to_string());
        }
    }

    let mut conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let tx = conn
        .transaction()
        .map_err(|e| format!("Database error: {}", e))?;

    let template_id = TemplateItem::get_template_id(&tx, id)
        .map_err(|e| format!("Failed to get item: {}", e))?
        .ok_or_else(|| format!("Template item not found with id: {}", id))?;
    load_visible(&tx, caller, template_id)?;

    TemplateItem::update(&tx, id, &data)
        .map_err(|e| format!("Failed to update item: {}", e))?;

    let nutrition = on_items_changed(&tx, template_id)
        .map_err(|e| format!("Failed to refresh nutrition: {}", e))?;

    tx.commit().map_err(|e| format!("Database error: {}", e))?;

    Ok(ItemChangeResponse {
        item_id: id,
        template_id,
        nutrition,
    })
}

/// Remove an item from a template
pub fn remove_template_item(
    db: &Database,
    caller: &str,
    id: i64,
) -> Result<ItemChangeResponse, String> {
    let mut conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let tx = conn
        .transaction()
        .map_err(|e| format!("Database error: {}", e))?;

    let template_id = TemplateItem::get_template_id(&tx, id)
        .map_err(|e| format!("Failed to get item: {}", e))?
        .ok_or_else(|| format!("Template item not found with id: {}", id))?;
    load_visible(&tx, caller, template_id)?;

    TemplateItem::delete(&tx, id).map_err(|e| format!("Failed to remove item: {}", e))?;

    let nutrition = on_items_changed(&tx, template_id)
        .map_err(|e| format!("Failed to refresh nutrition: {}", e))?;

    tx.commit().map_err(|e| format!("Database error: {}", e))?;

    Ok(ItemChangeResponse {
        item_id: id,
        template_id,
        nutrition,
    })
}

/// Force a recalculation of a template's cached nutrition
pub fn recalculate_template(db: &Database, caller: &str, id: i64) -> Result<Nutrition, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    load_visible(&conn, caller, id)?;

    refresh_template(&conn, id).map_err(|e| format!("Failed to recalculate nutrition: {}", e))
}

/// Resolve a template to its atomic (food, grams) composition
pub fn flatten_template(
    db: &Database,
    caller: &str,
    id: i64,
) -> Result<FlattenTemplateResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let template = load_visible(&conn, caller, id)?;

    let entries = flatten(&conn, id).map_err(|e| format!("Failed to flatten template: {}", e))?;

    let mut items = Vec::with_capacity(entries.len());
    for entry in entries {
        let food = Food::get_by_id(&conn, entry.food_id)
            .map_err(|e| format!("Failed to get food: {}", e))?
            .ok_or_else(|| format!("Food not found with id: {}", entry.food_id))?;

        items.push(FlattenedItem {
            food_id: entry.food_id,
            food_name: food.name,
            grams: entry.grams,
            estimated: entry.estimated,
        });
    }

    Ok(FlattenTemplateResponse {
        template_id: id,
        items,
        nutrition: template.cached_nutrition,
    })
}
