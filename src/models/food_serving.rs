//! Food Serving model
//!
//! Named household servings for a food (e.g. "1 cup" = 240 g), with a
//! default-serving flag and a popularity counter.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbResult;

/// A household serving definition for a food
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodServing {
    pub id: i64,
    pub food_id: i64,
    pub unit: String,
    pub gram_weight: f64,
    pub is_default: bool,
    pub use_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Data for adding a household serving to a food
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodServingCreate {
    pub food_id: i64,
    pub unit: String,
    pub gram_weight: f64,
    #[serde(default)]
    pub is_default: bool,
}

impl FoodServing {
    /// Create from a database row
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            food_id: row.get("food_id")?,
            unit: row.get("unit")?,
            gram_weight: row.get("gram_weight")?,
            is_default: row.get::<_, i32>("is_default")? != 0,
            use_count: row.get("use_count")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Add a household serving to a food
    pub fn create(conn: &Connection, data: &FoodServingCreate) -> DbResult<Self> {
        if data.is_default {
            // Only one default per food
            conn.execute(
                "UPDATE food_servings SET is_default = 0 WHERE food_id = ?1",
                [data.food_id],
            )?;
        }

        conn.execute(
            r#"
            INSERT INTO food_servings (food_id, unit, gram_weight, is_default)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                data.food_id,
                data.unit.trim().to_lowercase(),
                data.gram_weight,
                data.is_default as i32,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or_else(|| {
            crate::db::DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows)
        })
    }

    /// Get a serving by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM food_servings WHERE id = ?1")?;

        let result = stmt.query_row([id], Self::from_row);
        match result {
            Ok(serving) => Ok(Some(serving)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Get all servings for a food, most popular first
    pub fn get_for_food(conn: &Connection, food_id: i64) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM food_servings WHERE food_id = ?1 ORDER BY use_count DESC, id",
        )?;

        let servings = stmt
            .query_map([food_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(servings)
    }

    /// Get the default serving for a food, if one is defined.
    ///
    /// Falls back to the most-used serving when no explicit default exists.
    pub fn get_default_for_food(conn: &Connection, food_id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM food_servings
            WHERE food_id = ?1
            ORDER BY is_default DESC, use_count DESC, id
            LIMIT 1
            "#,
        )?;

        let result = stmt.query_row([food_id], Self::from_row);
        match result {
            Ok(serving) => Ok(Some(serving)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Find a serving for a food by household unit (case-insensitive)
    pub fn find_by_unit(conn: &Connection, food_id: i64, unit: &str) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM food_servings WHERE food_id = ?1 AND unit = ?2",
        )?;

        let result = stmt.query_row(
            params![food_id, unit.trim().to_lowercase()],
            Self::from_row,
        );
        match result {
            Ok(serving) => Ok(Some(serving)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Increment the popularity counter for a serving
    pub fn increment_use_count(conn: &Connection, id: i64) -> DbResult<()> {
        conn.execute(
            "UPDATE food_servings SET use_count = use_count + 1, updated_at = datetime('now') WHERE id = ?1",
            [id],
        )?;
        Ok(())
    }

    /// Mark a serving as the default for its food
    pub fn set_default(conn: &Connection, id: i64) -> DbResult<bool> {
        let serving = match Self::get_by_id(conn, id)? {
            Some(s) => s,
            None => return Ok(false),
        };

        conn.execute(
            "UPDATE food_servings SET is_default = 0 WHERE food_id = ?1",
            [serving.food_id],
        )?;
        conn.execute(
            "UPDATE food_servings SET is_default = 1, updated_at = datetime('now') WHERE id = ?1",
            [id],
        )?;
        Ok(true)
    }

    /// Delete a serving
    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM food_servings WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }
}
