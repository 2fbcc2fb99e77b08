//! Database migrations
//!
//! Schema creation and migration logic.

use rusqlite::Connection;

use super::connection::DbResult;

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// Run all migrations to bring the database up to the current schema version
pub fn run_migrations(conn: &Connection) -> DbResult<()> {
    // Create migrations table if it doesn't exist
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    // Get current version
    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    // Run migrations
    if current_version < 1 {
        migrate_v1(conn)?;
        conn.execute("INSERT INTO schema_migrations (version) VALUES (1)", [])?;
    }

    Ok(())
}

/// Migration v1: Initial schema
fn migrate_v1(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        r#"
        -- ============================================
        -- FOODS
        -- Atomic nutrient sources (the catalog)
        -- ============================================
        CREATE TABLE foods (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            brand TEXT,                          -- nullable, for branded products
            serving_size_g REAL NOT NULL,        -- canonical serving size in grams, e.g. 100.0

            -- Nutritional values (per canonical serving)
            calories REAL NOT NULL DEFAULT 0,
            protein REAL NOT NULL DEFAULT 0,     -- grams
            carbs REAL NOT NULL DEFAULT 0,       -- grams
            fat REAL NOT NULL DEFAULT 0,         -- grams
            fiber REAL NOT NULL DEFAULT 0,       -- grams
            sugar REAL NOT NULL DEFAULT 0,       -- grams
            sodium REAL NOT NULL DEFAULT 0,      -- milligrams
            saturated_fat REAL NOT NULL DEFAULT 0, -- grams
            cholesterol REAL NOT NULL DEFAULT 0, -- milligrams

            notes TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_foods_name ON foods(name);
        CREATE INDEX idx_foods_brand ON foods(brand);

        -- ============================================
        -- FOOD SERVINGS
        -- Named household servings for a food ("1 cup" = 240g)
        -- ============================================
        CREATE TABLE food_servings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            food_id INTEGER NOT NULL REFERENCES foods(id) ON DELETE CASCADE,
            unit TEXT NOT NULL,                  -- household unit, e.g. "cup", "slice", "large"
            gram_weight REAL NOT NULL,           -- grams per one unit
            is_default INTEGER NOT NULL DEFAULT 0, -- boolean
            use_count INTEGER NOT NULL DEFAULT 0,  -- popularity counter, best-effort

            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),

            UNIQUE(food_id, unit)
        );

        CREATE INDEX idx_food_servings_food ON food_servings(food_id);

        -- ============================================
        -- MEAL TEMPLATES
        -- Reusable compositions of foods and other templates
        -- ============================================
        CREATE TABLE meal_templates (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            owner TEXT,                          -- NULL means public
            is_favorite INTEGER NOT NULL DEFAULT 0, -- boolean
            use_count INTEGER NOT NULL DEFAULT 0,
            last_used_at TEXT,                   -- ISO timestamp, NULL until first logged

            -- Cached aggregate nutrition - recalculated whenever items change
            cached_calories REAL NOT NULL DEFAULT 0,
            cached_protein REAL NOT NULL DEFAULT 0,
            cached_carbs REAL NOT NULL DEFAULT 0,
            cached_fat REAL NOT NULL DEFAULT 0,
            cached_fiber REAL NOT NULL DEFAULT 0,
            cached_sugar REAL NOT NULL DEFAULT 0,
            cached_sodium REAL NOT NULL DEFAULT 0,
            cached_saturated_fat REAL NOT NULL DEFAULT 0,
            cached_cholesterol REAL NOT NULL DEFAULT 0,

            notes TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_meal_templates_name ON meal_templates(name);
        CREATE INDEX idx_meal_templates_owner ON meal_templates(owner);
        CREATE INDEX idx_meal_templates_favorite ON meal_templates(is_favorite);

        -- ============================================
        -- TEMPLATE ITEMS
        -- One row per entry in a template's composition.
        -- Exactly one of food_id / child_template_id is set.
        -- ============================================
        CREATE TABLE template_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            template_id INTEGER NOT NULL REFERENCES meal_templates(id) ON DELETE CASCADE,
            item_type TEXT NOT NULL CHECK(item_type IN ('food', 'template')),
            food_id INTEGER REFERENCES foods(id) ON DELETE RESTRICT,
            child_template_id INTEGER REFERENCES meal_templates(id) ON DELETE RESTRICT,
            quantity REAL NOT NULL,
            unit TEXT NOT NULL,                  -- "g", household unit, or "serving"
            position INTEGER NOT NULL DEFAULT 0, -- display order

            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),

            CHECK ((item_type = 'food' AND food_id IS NOT NULL AND child_template_id IS NULL) OR
                   (item_type = 'template' AND child_template_id IS NOT NULL AND food_id IS NULL))
        );

        CREATE INDEX idx_template_items_template ON template_items(template_id);
        CREATE INDEX idx_template_items_food ON template_items(food_id);
        CREATE INDEX idx_template_items_child ON template_items(child_template_id);

        -- ============================================
        -- LOGGED MEALS
        -- Concrete timestamped instances of eating.
        -- Contains only atomic line items once materialized.
        -- ============================================
        CREATE TABLE logged_meals (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner TEXT NOT NULL,
            logged_at TEXT NOT NULL,
            meal_type TEXT NOT NULL CHECK(meal_type IN ('breakfast', 'lunch', 'dinner', 'snack', 'unspecified')),
            source_template_id INTEGER REFERENCES meal_templates(id) ON DELETE SET NULL,

            -- Cached meal totals (sum of item nutrition)
            cached_calories REAL NOT NULL DEFAULT 0,
            cached_protein REAL NOT NULL DEFAULT 0,
            cached_carbs REAL NOT NULL DEFAULT 0,
            cached_fat REAL NOT NULL DEFAULT 0,
            cached_fiber REAL NOT NULL DEFAULT 0,
            cached_sugar REAL NOT NULL DEFAULT 0,
            cached_sodium REAL NOT NULL DEFAULT 0,
            cached_saturated_fat REAL NOT NULL DEFAULT 0,
            cached_cholesterol REAL NOT NULL DEFAULT 0,

            notes TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_logged_meals_owner ON logged_meals(owner);
        CREATE INDEX idx_logged_meals_logged_at ON logged_meals(logged_at);
        CREATE INDEX idx_logged_meals_template ON logged_meals(source_template_id);

        -- ============================================
        -- LOGGED MEAL ITEMS
        -- Atomic food entries with dual quantity representation.
        -- gram_quantity is the source of truth for nutrient math;
        -- serving_quantity/serving_unit are for display.
        -- ============================================
        CREATE TABLE logged_meal_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            meal_id INTEGER NOT NULL REFERENCES logged_meals(id) ON DELETE CASCADE,
            food_id INTEGER NOT NULL REFERENCES foods(id) ON DELETE RESTRICT,
            gram_quantity REAL NOT NULL,
            serving_quantity REAL,               -- NULL when the food has no serving definition
            serving_unit TEXT,
            last_edited TEXT NOT NULL DEFAULT 'grams' CHECK(last_edited IN ('grams', 'serving')),
            estimated INTEGER NOT NULL DEFAULT 0, -- boolean: quantity came from a unit fallback

            -- Cached per-item nutrition contribution
            cached_calories REAL NOT NULL DEFAULT 0,
            cached_protein REAL NOT NULL DEFAULT 0,
            cached_carbs REAL NOT NULL DEFAULT 0,
            cached_fat REAL NOT NULL DEFAULT 0,
            cached_fiber REAL NOT NULL DEFAULT 0,
            cached_sugar REAL NOT NULL DEFAULT 0,
            cached_sodium REAL NOT NULL DEFAULT 0,
            cached_saturated_fat REAL NOT NULL DEFAULT 0,
            cached_cholesterol REAL NOT NULL DEFAULT 0,

            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_logged_meal_items_meal ON logged_meal_items(meal_id);
        CREATE INDEX idx_logged_meal_items_food ON logged_meal_items(food_id);
        "#,
    )?;

    Ok(())
}

/// Get the current schema version
pub fn get_schema_version(conn: &Connection) -> DbResult<i32> {
    let version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);
    Ok(version)
}

/// Check if the database needs migration
pub fn needs_migration(conn: &Connection) -> DbResult<bool> {
    let current = get_schema_version(conn)?;
    Ok(current < SCHEMA_VERSION)
}
