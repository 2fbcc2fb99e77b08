//! Food model
//!
//! Atomic nutrient sources from the catalog. The engine only reads these;
//! creation and editing happen through the catalog tools.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbResult;
use super::Nutrition;

/// A food with nutritional information per canonical serving
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Food {
    pub id: i64,
    pub name: String,
    pub brand: Option<String>,
    /// Canonical serving size in grams
    pub serving_size_g: f64,
    pub nutrition: Nutrition,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Data for creating a new food
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodCreate {
    pub name: String,
    pub brand: Option<String>,
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

/// Data for updating a food
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FoodUpdate {
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

impl Food {
    /// Create a Food from a database row
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            brand: row.get("brand")?,
            serving_size_g: row.get("serving_size_g")?,
            nutrition: Nutrition {
                calories: row.get("calories")?,
                protein: row.get("protein")?,
                carbs: row.get("carbs")?,
                fat: row.get("fat")?,
                fiber: row.get("fiber")?,
                sugar: row.get("sugar")?,
                sodium: row.get("sodium")?,
                saturated_fat: row.get("saturated_fat")?,
                cholesterol: row.get("cholesterol")?,
            },
            notes: row.get("notes")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Insert a new food into the database
    pub fn create(conn: &Connection, data: &FoodCreate) -> DbResult<Self> {
        conn.execute(
            r#"
            INSERT INTO foods (
                name, brand, serving_size_g,
                calories, protein, carbs, fat, fiber, sugar, sodium, saturated_fat, cholesterol,
                notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                data.name,
                data.brand,
                data.serving_size_g,
                data.calories,
                data.protein,
                data.carbs,
                data.fat,
                data.fiber,
                data.sugar,
                data.sodium,
                data.saturated_fat,
                data.cholesterol,
                data.notes,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or_else(|| {
            crate::db::DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows)
        })
    }

    /// Get a food by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM foods WHERE id = ?1")?;

        let result = stmt.query_row([id], Self::from_row);
        match result {
            Ok(food) => Ok(Some(food)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Search foods by name or brand
    pub fn search(conn: &Connection, query: &str, limit: i64) -> DbResult<Vec<Self>> {
        let search_pattern = format!("%{}%", query);
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM foods
            WHERE name LIKE ?1 OR brand LIKE ?1
            ORDER BY name ASC
            LIMIT ?2
            "#,
        )?;

        let foods = stmt
            .query_map(params![search_pattern, limit], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(foods)
    }

    /// List foods with sorting and paging
    pub fn list(
        conn: &Connection,
        sort_by: &str,
        sort_order: &str,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<Self>> {
        let order = if sort_order.to_lowercase() == "desc" { "DESC" } else { "ASC" };
        let sort_col = match sort_by.to_lowercase().as_str() {
            "created_at" => "created_at",
            "calories" => "calories",
            _ => "name",
        };

        let sql = format!(
            "SELECT * FROM foods ORDER BY {} {} LIMIT ?1 OFFSET ?2",
            sort_col, order
        );

        let mut stmt = conn.prepare(&sql)?;
        let foods = stmt
            .query_map(params![limit, offset], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(foods)
    }

    /// Update a food
    pub fn update(conn: &Connection, id: i64, data: &FoodUpdate) -> DbResult<Option<Self>> {
        // Build dynamic UPDATE query
        let mut updates = Vec::new();
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        macro_rules! add_update {
            ($field:ident, $col:expr) => {
                if let Some(ref val) = data.$field {
                    updates.push(format!("{} = ?{}", $col, params_vec.len() + 1));
                    params_vec.push(Box::new(val.clone()));
                }
            };
        }

        add_update!(name, "name");
        add_update!(brand, "brand");
        add_update!(serving_size_g, "serving_size_g");
        add_update!(calories, "calories");
        add_update!(protein, "protein");
        add_update!(carbs, "carbs");
        add_update!(fat, "fat");
        add_update!(fiber, "fiber");
        add_update!(sugar, "sugar");
        add_update!(sodium, "sodium");
        add_update!(saturated_fat, "saturated_fat");
        add_update!(cholesterol, "cholesterol");
        add_update!(notes, "notes");

        if updates.is_empty() {
            return Self::get_by_id(conn, id);
        }

        updates.push("updated_at = datetime('now')".to_string());

        let sql = format!(
            "UPDATE foods SET {} WHERE id = ?{}",
            updates.join(", "),
            params_vec.len() + 1
        );

        params_vec.push(Box::new(id));

        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        conn.execute(&sql, params_refs.as_slice())?;

        Self::get_by_id(conn, id)
    }

    /// Get the count of template items referencing this food
    pub fn get_template_usage_count(conn: &Connection, id: i64) -> DbResult<i64> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM template_items WHERE food_id = ?1",
            [id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Get the count of logged meal items referencing this food
    pub fn get_logged_usage_count(conn: &Connection, id: i64) -> DbResult<i64> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM logged_meal_items WHERE food_id = ?1",
            [id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Count all foods
    pub fn count(conn: &Connection) -> DbResult<i64> {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM foods", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Delete a food
    ///
    /// Fails on the foreign key constraint while any template item or logged
    /// meal item still references it. Returns Ok(false) if not found.
    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        if Self::get_by_id(conn, id)?.is_none() {
            return Ok(false);
        }

        let rows = conn.execute("DELETE FROM foods WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }
}
