//! Service status tool
//!
//! Runtime status information plus usage instructions for assistants
//! driving the tools.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;

use crate::build_info::BuildInfo;
use crate::db::{migrations, Database};

/// Usage instructions for AI assistants
pub const USAGE_INSTRUCTIONS: &str = r#"
# Mealtrack Usage Instructions

Mealtrack logs meals against a catalog of foods and reusable meal templates.

## Core Concepts

1. **Foods** - Atomic nutrient sources. Nutrition is stored per canonical
   serving (`serving_size_g` grams). Example: Eggs with serving_size_g 50
   and 72 calories means 72 kcal per 50 g egg.
2. **Food Servings** - Named household units for a food ("large" = 50 g,
   "slice" = 28 g, "cup" = 240 g). One may be the default; it is used for
   display when logging by grams.
3. **Meal Templates** - Reusable compositions. Items are either foods or
   other templates, so a "Meal Prep Sunday" template can contain a
   "Breakfast" template twice. Circular references are rejected at insert
   time. Template nutrition is cached and refreshes automatically when
   items or underlying foods change.
4. **Logged Meals** - Concrete timestamped eating events. Logging from a
   template flattens it to atomic food lines; the logged meal never
   references templates except for the informational source_template_id.

## Units

- Weight units: "g", "mg", "kg", "oz", "lb" - converted exactly to grams.
- "serving"/"servings" - multiples of the food's canonical serving size.
- Anything else ("slice", "cup", "large", ...) is looked up in the food's
  serving definitions. An unknown unit falls back to canonical-serving
  multiples and the resulting line is flagged `estimated`.

## Typical Workflow

1. `search_foods("eggs")` - check the catalog
2. `create_food(...)` - add missing foods (nutrition per canonical serving)
3. `add_food_serving(food_id, "large", 50)` - define household units
4. `create_template("Breakfast")` then `add_template_item(...)` per item
5. `get_template(id)` - verify the cached nutrition looks right
6. `log_meal(template_id, meal_type: "breakfast")` - materialize it
7. `update_meal_item_quantity(item_id, 3, edited: "serving")` - adjust
   what was actually eaten; grams and nutrition re-derive

## Notes

- Timestamps are ISO 8601; logged_at defaults to now.
- Quantities on logged items are dual: grams are authoritative, the
  serving quantity is display. Editing either side re-derives the other.
- Templates with no owner are public; owned templates are visible only to
  their owner.
- A template cannot be deleted while another template contains it.
"#;

/// Runtime status of the service
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub build_number: u64,
    pub build_timestamp: &'static str,
    pub version: &'static str,

    pub database_path: String,
    pub database_size_bytes: Option<u64>,
    pub schema_version: i32,

    pub food_count: i64,
    pub template_count: i64,
    pub logged_meal_count: i64,

    pub uptime_seconds: u64,
    pub process_id: u32,
}

/// Status tracker for collecting runtime information
pub struct StatusTracker {
    start_time: Instant,
    database_path: PathBuf,
}

impl StatusTracker {
    pub fn new(database_path: PathBuf) -> Self {
        Self {
            start_time: Instant::now(),
            database_path,
        }
    }

    /// Get the current status
    pub fn get_status(&self, db: &Database) -> Result<ServiceStatus, String> {
        let build_info = BuildInfo::current();

        let database_size_bytes = std::fs::metadata(&self.database_path)
            .ok()
            .map(|m| m.len());

        let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

        let schema_version = migrations::get_schema_version(&conn)
            .map_err(|e| format!("Failed to read schema version: {}", e))?;

        let count = |sql: &str| -> Result<i64, String> {
            conn.query_row(sql, [], |row| row.get(0))
                .map_err(|e| format!("Failed to count rows: {}", e))
        };

        Ok(ServiceStatus {
            build_number: build_info.build_number,
            build_timestamp: build_info.build_timestamp,
            version: build_info.version,
            database_path: self.database_path.display().to_string(),
            database_size_bytes,
            schema_version,
            food_count: count("SELECT COUNT(*) FROM foods")?,
            template_count: count("SELECT COUNT(*) FROM meal_templates")?,
            logged_meal_count: count("SELECT COUNT(*) FROM logged_meals")?,
            uptime_seconds: self.start_time.elapsed().as_secs(),
            process_id: std::process::id(),
        })
    }
}
