//! Mealtrack MCP server implementation
//!
//! Exposes the catalog, template, and meal-logging tools over MCP stdio.

use std::path::PathBuf;
use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::db::Database;
use crate::models::{
    FoodCreate, FoodServingCreate, FoodUpdate, ItemRef, MealTemplateCreate, MealTemplateUpdate,
    MealType, QuantityEdited, TemplateItemCreate, TemplateItemUpdate,
};
use crate::tools::status::StatusTracker;
use crate::tools::{foods, meals, templates};

/// Mealtrack MCP service
#[derive(Clone)]
pub struct MealtrackService {
    status_tracker: Arc<Mutex<StatusTracker>>,
    database: Database,
    /// Identity of the connected user; templates they own and meals they
    /// log are scoped to this name
    user: String,
    tool_router: ToolRouter<MealtrackService>,
}

impl MealtrackService {
    pub fn new(database_path: PathBuf, database: Database, user: String) -> Self {
        Self {
            status_tracker: Arc::new(Mutex::new(StatusTracker::new(database_path))),
            database,
            user,
            tool_router: Self::tool_router(),
        }
    }
}

// ============================================================================
// Food Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateFoodParams {
    pub name: String,
    pub brand: Option<String>,
    /// Canonical serving size in grams; nutrition values are per this amount
    pub serving_size_g: f64,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    #[serde(default)]
    pub fiber: f64,
    #[serde(default)]
    pub sugar: f64,
    #[serde(default)]
    pub sodium: f64,
    #[serde(default)]
    pub saturated_fat: f64,
    #[serde(default)]
    pub cholesterol: f64,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetFoodParams {
    pub id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchFoodsParams {
    pub query: String,
    #[serde(default = "default_search_limit")]
    pub limit: i64,
}

fn default_search_limit() -> i64 { 20 }

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListFoodsParams {
    /// Sort by: name, created_at, or calories (default name)
    #[serde(default = "default_sort_by")]
    pub sort_by: String,
    /// Sort order: asc or desc (default asc)
    #[serde(default = "default_sort_order")]
    pub sort_order: String,
    /// Maximum results (default 50, max 200)
    #[serde(default = "default_list_limit")]
    pub limit: i64,
    /// Offset for pagination (default 0)
    #[serde(default)]
    pub offset: i64,
}

fn default_sort_by() -> String { "name".to_string() }
fn default_sort_order() -> String { "asc".to_string() }
fn default_list_limit() -> i64 { 50 }

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateFoodParams {
    pub id: i64,
    pub name: Option<String>,
    pub brand: Option<String>,
    pub serving_size_g: Option<f64>,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
    pub fiber: Option<f64>,
    pub sugar: Option<f64>,
    pub sodium: Option<f64>,
    pub saturated_fat: Option<f64>,
    pub cholesterol: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DeleteFoodParams {
    /// Food ID to delete
    pub id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddFoodServingParams {
    pub food_id: i64,
    /// Household unit name, e.g. "cup", "slice", "large"
    pub unit: String,
    /// Grams per one unit
    pub gram_weight: f64,
    /// Make this the default serving for display (default false)
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListFoodServingsParams {
    pub food_id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ServingIdParams {
    /// Serving ID
    pub id: i64,
}

// ============================================================================
// Template Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateTemplateParams {
    /// Name of the template
    pub name: String,
    /// Make the template public (visible to all users, default false)
    #[serde(default)]
    pub public: bool,
    /// Mark as favorite (default false)
    #[serde(default)]
    pub is_favorite: bool,
    /// Optional notes
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetTemplateParams {
    /// Template ID
    pub id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListTemplatesParams {
    /// Search query for template name (optional)
    pub query: Option<String>,
    /// Only show favorites (default false)
    #[serde(default)]
    pub favorites_only: bool,
    /// Sort by: name, created_at, use_count, or last_used_at (default name)
    #[serde(default = "default_sort_by")]
    pub sort_by: String,
    /// Sort order: asc or desc (default asc)
    #[serde(default = "default_sort_order")]
    pub sort_order: String,
    /// Maximum results (default 50, max 200)
    #[serde(default = "default_list_limit")]
    pub limit: i64,
    /// Offset for pagination (default 0)
    #[serde(default)]
    pub offset: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateTemplateParams {
    /// Template ID to update
    pub id: i64,
    /// New name (optional)
    pub name: Option<String>,
    /// New favorite status (optional)
    pub is_favorite: Option<bool>,
    /// New notes (optional)
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DeleteTemplateParams {
    /// Template ID to delete
    pub id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddTemplateItemParams {
    /// Template to add the item to
    pub template_id: i64,
    /// "food" or "template"
    pub item_type: String,
    /// ID of the referenced food or template
    pub ref_id: i64,
    /// Quantity in the given unit (for templates: number of multiples)
    pub quantity: f64,
    /// Unit: "g"/"kg"/"oz"..., a household serving name, or "serving"
    #[serde(default = "default_unit")]
    pub unit: String,
    /// Display position (default 0)
    #[serde(default)]
    pub position: i64,
}

fn default_unit() -> String { "serving".to_string() }

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateTemplateItemParams {
    /// Template item ID to update
    pub id: i64,
    /// New quantity (optional)
    pub quantity: Option<f64>,
    /// New unit (optional)
    pub unit: Option<String>,
    /// New display position (optional)
    pub position: Option<i64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RemoveTemplateItemParams {
    /// Template item ID to remove
    pub id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RecalculateTemplateParams {
    /// Template ID to recalculate
    pub id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct FlattenTemplateParams {
    /// Template ID to flatten
    pub id: i64,
}

// ============================================================================
// Meal Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct LogMealParams {
    /// Template ID to materialize
    pub template_id: i64,
    /// When the meal was eaten (ISO 8601; defaults to now)
    pub logged_at: Option<String>,
    /// Meal type: breakfast, lunch, dinner, snack, or unspecified
    #[serde(default = "default_meal_type")]
    pub meal_type: String,
    /// Optional notes
    pub notes: Option<String>,
}

fn default_meal_type() -> String { "unspecified".to_string() }

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct LogFoodParams {
    /// Food ID to log
    pub food_id: i64,
    /// Quantity in the given unit
    pub quantity: f64,
    /// Unit: "g"/"kg"/"oz"..., a household serving name, or "serving"
    pub unit: String,
    /// When the meal was eaten (ISO 8601; defaults to now)
    pub logged_at: Option<String>,
    /// Meal type: breakfast, lunch, dinner, snack, or unspecified
    #[serde(default = "default_meal_type")]
    pub meal_type: String,
    /// Optional notes
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetMealParams {
    /// Meal ID
    pub id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListMealsParams {
    /// Earliest logged_at, inclusive (optional)
    pub from: Option<String>,
    /// Latest logged_at, inclusive (optional)
    pub to: Option<String>,
    /// Maximum results (default 50, max 200)
    #[serde(default = "default_list_limit")]
    pub limit: i64,
    /// Offset for pagination (default 0)
    #[serde(default)]
    pub offset: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateMealItemQuantityParams {
    /// Logged meal item ID
    pub item_id: i64,
    /// New quantity value
    pub value: f64,
    /// Which representation the value is in: "grams" or "serving"
    pub edited: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RemoveMealItemParams {
    /// Logged meal item ID to remove
    pub id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DeleteMealParams {
    /// Meal ID to delete
    pub id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct MealTotalsParams {
    /// Earliest logged_at, inclusive (optional)
    pub from: Option<String>,
    /// Latest logged_at, inclusive (optional)
    pub to: Option<String>,
}

fn to_json(value: &impl serde::Serialize) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

// ============================================================================
// Tool Implementations
// ============================================================================

#[tool_router]
impl MealtrackService {
    // --- Status ---

    #[tool(description = "Get the current status of the mealtrack service including build info, database stats, and catalog counts")]
    async fn mealtrack_status(&self) -> Result<CallToolResult, McpError> {
        let tracker = self.status_tracker.lock().await;
        let status = tracker
            .get_status(&self.database)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json(&status)
    }

    #[tool(description = "Get step-by-step instructions for using the mealtrack tools. Call this when starting a new session or when unsure how foods, servings, templates, and logged meals fit together.")]
    fn usage_instructions(&self) -> Result<CallToolResult, McpError> {
        use crate::tools::status::USAGE_INSTRUCTIONS;
        Ok(CallToolResult::success(vec![Content::text(USAGE_INSTRUCTIONS)]))
    }

    // --- Foods ---

    #[tool(description = "Create a new food with nutrition per canonical serving (serving_size_g grams)")]
    fn create_food(&self, Parameters(p): Parameters<CreateFoodParams>) -> Result<CallToolResult, McpError> {
        let data = FoodCreate {
            name: p.name, brand: p.brand, serving_size_g: p.serving_size_g,
            calories: p.calories, protein: p.protein, carbs: p.carbs, fat: p.fat,
            fiber: p.fiber, sugar: p.sugar, sodium: p.sodium,
            saturated_fat: p.saturated_fat, cholesterol: p.cholesterol,
            notes: p.notes,
        };
        let result = foods::create_food(&self.database, data).map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "Get full details for a food including its serving definitions and usage counts")]
    fn get_food(&self, Parameters(p): Parameters<GetFoodParams>) -> Result<CallToolResult, McpError> {
        let result = foods::get_food(&self.database, p.id).map_err(|e| McpError::internal_error(e, None))?;
        let json = match result {
            Some(food) => serde_json::to_string_pretty(&food),
            None => Ok(format!(r#"{{"error": "Food not found", "id": {}}}"#, p.id)),
        }.map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Search foods by name or brand")]
    fn search_foods(&self, Parameters(p): Parameters<SearchFoodsParams>) -> Result<CallToolResult, McpError> {
        let result = foods::search_foods(&self.database, &p.query, p.limit).map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "List foods with sorting and pagination")]
    fn list_foods(&self, Parameters(p): Parameters<ListFoodsParams>) -> Result<CallToolResult, McpError> {
        let result = foods::list_foods(&self.database, &p.sort_by, &p.sort_order, p.limit, p.offset)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "Update a food. Automatically refreshes cached nutrition for every template containing it.")]
    fn update_food(&self, Parameters(p): Parameters<UpdateFoodParams>) -> Result<CallToolResult, McpError> {
        let data = FoodUpdate {
            name: p.name, brand: p.brand, serving_size_g: p.serving_size_g,
            calories: p.calories, protein: p.protein, carbs: p.carbs, fat: p.fat,
            fiber: p.fiber, sugar: p.sugar, sodium: p.sodium,
            saturated_fat: p.saturated_fat, cholesterol: p.cholesterol,
            notes: p.notes,
        };
        let result = foods::update_food(&self.database, p.id, data).map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "Delete a food (only allowed while no template or logged meal references it)")]
    fn delete_food(&self, Parameters(p): Parameters<DeleteFoodParams>) -> Result<CallToolResult, McpError> {
        let result = foods::delete_food(&self.database, p.id).map_err(|e| McpError::internal_error(e, None))?;
        let json = match result {
            Ok(success) => serde_json::to_string_pretty(&success),
            Err(blocked) => serde_json::to_string_pretty(&blocked),
        }.map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    // --- Food Servings ---

    #[tool(description = "Add a household serving definition to a food (e.g. \"1 cup\" = 240 g)")]
    fn add_food_serving(&self, Parameters(p): Parameters<AddFoodServingParams>) -> Result<CallToolResult, McpError> {
        let data = FoodServingCreate { food_id: p.food_id, unit: p.unit, gram_weight: p.gram_weight, is_default: p.is_default };
        let result = foods::add_food_serving(&self.database, data).map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "List a food's serving definitions, most popular first")]
    fn list_food_servings(&self, Parameters(p): Parameters<ListFoodServingsParams>) -> Result<CallToolResult, McpError> {
        let result = foods::list_food_servings(&self.database, p.food_id).map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "Mark a serving as its food's default for display")]
    fn set_default_serving(&self, Parameters(p): Parameters<ServingIdParams>) -> Result<CallToolResult, McpError> {
        let result = foods::set_default_serving(&self.database, p.id).map_err(|e| McpError::internal_error(e, None))?;
        let json = serde_json::json!({"success": result, "id": p.id}).to_string();
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Delete a serving definition from a food")]
    fn delete_food_serving(&self, Parameters(p): Parameters<ServingIdParams>) -> Result<CallToolResult, McpError> {
        let result = foods::delete_food_serving(&self.database, p.id).map_err(|e| McpError::internal_error(e, None))?;
        let json = serde_json::json!({"success": result, "id": p.id}).to_string();
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    // --- Templates ---

    #[tool(description = "Create a new meal template (items added separately)")]
    fn create_template(&self, Parameters(p): Parameters<CreateTemplateParams>) -> Result<CallToolResult, McpError> {
        let owner = if p.public { None } else { Some(self.user.clone()) };
        let data = MealTemplateCreate { name: p.name, owner, is_favorite: p.is_favorite, notes: p.notes };
        let result = templates::create_template(&self.database, data).map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "Get a template with its items and cached nutrition totals")]
    fn get_template(&self, Parameters(p): Parameters<GetTemplateParams>) -> Result<CallToolResult, McpError> {
        let result = templates::get_template(&self.database, &self.user, p.id).map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "List templates visible to you with optional search, favorites filter, sorting, and pagination")]
    fn list_templates(&self, Parameters(p): Parameters<ListTemplatesParams>) -> Result<CallToolResult, McpError> {
        let result = templates::list_templates(
            &self.database, &self.user, p.query.as_deref(), p.favorites_only,
            &p.sort_by, &p.sort_order, p.limit, p.offset,
        ).map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "Update a template's name, favorite status, or notes")]
    fn update_template(&self, Parameters(p): Parameters<UpdateTemplateParams>) -> Result<CallToolResult, McpError> {
        let data = MealTemplateUpdate { name: p.name, is_favorite: p.is_favorite, notes: p.notes };
        let result = templates::update_template(&self.database, &self.user, p.id, data)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "Delete a template (only allowed while no other template contains it; logged meals are unaffected)")]
    fn delete_template(&self, Parameters(p): Parameters<DeleteTemplateParams>) -> Result<CallToolResult, McpError> {
        let result = templates::delete_template(&self.database, &self.user, p.id)
            .map_err(|e| McpError::internal_error(e, None))?;
        let json = match result {
            Ok(success) => serde_json::to_string_pretty(&success),
            Err(blocked) => serde_json::to_string_pretty(&blocked),
        }.map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    // --- Template Items ---

    #[tool(description = "Add a food or another template to a template. Template references that would create a cycle are rejected. Cached nutrition for the template and all templates containing it refreshes automatically.")]
    fn add_template_item(&self, Parameters(p): Parameters<AddTemplateItemParams>) -> Result<CallToolResult, McpError> {
        let item = match p.item_type.to_lowercase().as_str() {
            "food" => ItemRef::Food(p.ref_id),
            "template" => ItemRef::Template(p.ref_id),
            other => {
                return Err(McpError::invalid_params(
                    format!("item_type must be \"food\" or \"template\", got \"{}\"", other),
                    None,
                ))
            }
        };
        let data = TemplateItemCreate {
            template_id: p.template_id, item, quantity: p.quantity, unit: p.unit, position: p.position,
        };
        let result = templates::add_template_item(&self.database, &self.user, data)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "Update a template item's quantity, unit, or display position")]
    fn update_template_item(&self, Parameters(p): Parameters<UpdateTemplateItemParams>) -> Result<CallToolResult, McpError> {
        let data = TemplateItemUpdate { quantity: p.quantity, unit: p.unit, position: p.position };
        let result = templates::update_template_item(&self.database, &self.user, p.id, data)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "Remove an item from a template")]
    fn remove_template_item(&self, Parameters(p): Parameters<RemoveTemplateItemParams>) -> Result<CallToolResult, McpError> {
        let result = templates::remove_template_item(&self.database, &self.user, p.id)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "Force recalculate a template's cached nutrition totals")]
    fn recalculate_template_nutrition(&self, Parameters(p): Parameters<RecalculateTemplateParams>) -> Result<CallToolResult, McpError> {
        let result = templates::recalculate_template(&self.database, &self.user, p.id)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "Resolve a template's full nested structure into atomic (food, grams) lines")]
    fn flatten_template(&self, Parameters(p): Parameters<FlattenTemplateParams>) -> Result<CallToolResult, McpError> {
        let result = templates::flatten_template(&self.database, &self.user, p.id)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    // --- Meals ---

    #[tool(description = "Log a meal from a template. The template is flattened to atomic food lines with per-line nutrition; returns the full logged meal.")]
    fn log_meal(&self, Parameters(p): Parameters<LogMealParams>) -> Result<CallToolResult, McpError> {
        let result = meals::log_meal(
            &self.database, &self.user, p.template_id, p.logged_at.as_deref(),
            MealType::from_str(&p.meal_type), p.notes.as_deref(),
        ).map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "Log a single food without a template. The quantity is normalized to grams through the food's serving definitions.")]
    fn log_food(&self, Parameters(p): Parameters<LogFoodParams>) -> Result<CallToolResult, McpError> {
        let result = meals::log_food(
            &self.database, &self.user, p.food_id, p.quantity, &p.unit,
            p.logged_at.as_deref(), MealType::from_str(&p.meal_type), p.notes.as_deref(),
        ).map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "Get a logged meal with its items and nutrition totals")]
    fn get_meal(&self, Parameters(p): Parameters<GetMealParams>) -> Result<CallToolResult, McpError> {
        let result = meals::get_meal(&self.database, &self.user, p.id).map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "List your logged meals, newest first, optionally within a time range")]
    fn list_meals(&self, Parameters(p): Parameters<ListMealsParams>) -> Result<CallToolResult, McpError> {
        let result = meals::list_meals(
            &self.database, &self.user, p.from.as_deref(), p.to.as_deref(), p.limit, p.offset,
        ).map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "Edit a logged item's quantity in either grams or servings; the other representation and all nutrition re-derive automatically")]
    fn update_meal_item_quantity(&self, Parameters(p): Parameters<UpdateMealItemQuantityParams>) -> Result<CallToolResult, McpError> {
        let edited = match p.edited.to_lowercase().as_str() {
            "grams" => QuantityEdited::Grams,
            "serving" | "servings" => QuantityEdited::Serving,
            other => {
                return Err(McpError::invalid_params(
                    format!("edited must be \"grams\" or \"serving\", got \"{}\"", other),
                    None,
                ))
            }
        };
        let result = meals::update_meal_item_quantity(&self.database, &self.user, p.item_id, p.value, edited)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "Remove one item from a logged meal; the meal totals refresh")]
    fn remove_meal_item(&self, Parameters(p): Parameters<RemoveMealItemParams>) -> Result<CallToolResult, McpError> {
        let result = meals::remove_meal_item(&self.database, &self.user, p.id)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "Delete a logged meal and all of its items")]
    fn delete_meal(&self, Parameters(p): Parameters<DeleteMealParams>) -> Result<CallToolResult, McpError> {
        let result = meals::delete_meal(&self.database, &self.user, p.id).map_err(|e| McpError::internal_error(e, None))?;
        let json = serde_json::json!({"success": result, "id": p.id}).to_string();
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Sum nutrition over your logged meals in a time range")]
    fn meal_totals(&self, Parameters(p): Parameters<MealTotalsParams>) -> Result<CallToolResult, McpError> {
        let result = meals::meal_totals(&self.database, &self.user, p.from.as_deref(), p.to.as_deref())
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }
}

// ============================================================================
// Server Handler
// ============================================================================

#[tool_handler]
impl ServerHandler for MealtrackService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "mealtrack".into(),
                version: crate::build_info::VERSION.into(),
                title: Some("Mealtrack".into()),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Mealtrack - meal logging with reusable nested templates. \
                 IMPORTANT: Call usage_instructions when starting a food logging session. \
                 Foods: create/get/search/list/update/delete_food, nutrition per canonical serving. \
                 Servings: add/list/delete_food_serving, set_default_serving (household units like \"cup\" = 240 g). \
                 Templates: create/get/list/update/delete_template, add/update/remove_template_item, \
                 recalculate_template_nutrition, flatten_template. Templates nest inside each other; \
                 circular references are rejected. \
                 Meals: log_meal (from template), log_food (ad hoc), get/list/delete_meal, \
                 update_meal_item_quantity (grams or servings), remove_meal_item, meal_totals."
                    .into(),
            ),
        }
    }
}
