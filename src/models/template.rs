//! Meal Template model
//!
//! A named, reusable composition of foods and other templates, with cached
//! aggregate nutrition.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbResult;
use super::Nutrition;

/// A meal template with cached nutrition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealTemplate {
    pub id: i64,
    pub name: String,
    /// None means the template is public
    pub owner: Option<String>,
    pub is_favorite: bool,
    pub use_count: i64,
    pub last_used_at: Option<String>,
    pub cached_nutrition: Nutrition,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl MealTemplate {
    /// True when `caller` may read and log from this template
    pub fn visible_to(&self, caller: &str) -> bool {
        match &self.owner {
            None => true,
            Some(owner) => owner == caller,
        }
    }
}

/// Data for creating a new template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealTemplateCreate {
    pub name: String,
    pub owner: Option<String>,
    #[serde(default)]
    pub is_favorite: bool,
    pub notes: Option<String>,
}

/// Data for updating a template
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MealTemplateUpdate {
    pub name: Option<String>,
    pub is_favorite: Option<bool>,
    pub notes: Option<String>,
}

impl MealTemplate {
    /// Create a MealTemplate from a database row
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            owner: row.get("owner")?,
            is_favorite: row.get::<_, i32>("is_favorite")? != 0,
            use_count: row.get("use_count")?,
            last_used_at: row.get("last_used_at")?,
            cached_nutrition: Nutrition {
                calories: row.get("cached_calories")?,
                protein: row.get("cached_protein")?,
                carbs: row.get("cached_carbs")?,
                fat: row.get("cached_fat")?,
                fiber: row.get("cached_fiber")?,
                sugar: row.get("cached_sugar")?,
                sodium: row.get("cached_sodium")?,
                saturated_fat: row.get("cached_saturated_fat")?,
                cholesterol: row.get("cached_cholesterol")?,
            },
            notes: row.get("notes")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Insert a new template into the database
    pub fn create(conn: &Connection, data: &MealTemplateCreate) -> DbResult<Self> {
        conn.execute(
            r#"
            INSERT INTO meal_templates (name, owner, is_favorite, notes)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                data.name,
                data.owner,
                data.is_favorite as i32,
                data.notes,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or_else(|| {
            crate::db::DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows)
        })
    }

    /// Get a template by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM meal_templates WHERE id = ?1")?;

        let result = stmt.query_row([id], Self::from_row);
        match result {
            Ok(template) => Ok(Some(template)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List templates visible to a caller, with optional search and filtering
    pub fn list(
        conn: &Connection,
        caller: &str,
        query: Option<&str>,
        favorites_only: bool,
        sort_by: &str,
        sort_order: &str,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<Self>> {
        let order = if sort_order.to_lowercase() == "desc" { "DESC" } else { "ASC" };
        let sort_col = match sort_by.to_lowercase().as_str() {
            "created_at" => "created_at",
            "use_count" => "use_count",
            "last_used_at" => "last_used_at",
            _ => "name",
        };

        let mut clauses = vec!["(owner IS NULL OR owner = ?1)".to_string()];
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(caller.to_string())];

        if let Some(q) = query {
            clauses.push(format!("name LIKE ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(format!("%{}%", q)));
        }
        if favorites_only {
            clauses.push("is_favorite = 1".to_string());
        }

        let sql = format!(
            "SELECT * FROM meal_templates WHERE {} ORDER BY {} {} LIMIT ?{} OFFSET ?{}",
            clauses.join(" AND "),
            sort_col,
            order,
            params_vec.len() + 1,
            params_vec.len() + 2,
        );
        params_vec.push(Box::new(limit));
        params_vec.push(Box::new(offset));

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        let templates = stmt
            .query_map(params_refs.as_slice(), Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(templates)
    }

    /// Update a template's metadata
    pub fn update(conn: &Connection, id: i64, data: &MealTemplateUpdate) -> DbResult<Option<Self>> {
        let mut updates = Vec::new();
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref name) = data.name {
            updates.push(format!("name = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(name.clone()));
        }
        if let Some(is_fav) = data.is_favorite {
            updates.push(format!("is_favorite = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(is_fav as i32));
        }
        if let Some(ref notes) = data.notes {
            updates.push(format!("notes = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(notes.clone()));
        }

        if updates.is_empty() {
            return Self::get_by_id(conn, id);
        }

        updates.push("updated_at = datetime('now')".to_string());

        let sql = format!(
            "UPDATE meal_templates SET {} WHERE id = ?{}",
            updates.join(", "),
            params_vec.len() + 1
        );

        params_vec.push(Box::new(id));

        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        conn.execute(&sql, params_refs.as_slice())?;

        Self::get_by_id(conn, id)
    }

    /// Update cached nutrition for a template
    pub fn update_cached_nutrition(conn: &Connection, id: i64, nutrition: &Nutrition) -> DbResult<()> {
        conn.execute(
            r#"
            UPDATE meal_templates SET
                cached_calories = ?1,
                cached_protein = ?2,
                cached_carbs = ?3,
                cached_fat = ?4,
                cached_fiber = ?5,
                cached_sugar = ?6,
                cached_sodium = ?7,
                cached_saturated_fat = ?8,
                cached_cholesterol = ?9,
                updated_at = datetime('now')
            WHERE id = ?10
            "#,
            params![
                nutrition.calories,
                nutrition.protein,
                nutrition.carbs,
                nutrition.fat,
                nutrition.fiber,
                nutrition.sugar,
                nutrition.sodium,
                nutrition.saturated_fat,
                nutrition.cholesterol,
                id,
            ],
        )?;
        Ok(())
    }

    /// Record that a meal was logged from this template
    pub fn record_use(conn: &Connection, id: i64, logged_at: &str) -> DbResult<()> {
        conn.execute(
            r#"
            UPDATE meal_templates SET
                use_count = use_count + 1,
                last_used_at = ?1,
                updated_at = datetime('now')
            WHERE id = ?2
            "#,
            params![logged_at, id],
        )?;
        Ok(())
    }

    /// Count templates visible to a caller
    pub fn count(conn: &Connection, caller: &str, favorites_only: bool) -> DbResult<i64> {
        let count: i64 = if favorites_only {
            conn.query_row(
                "SELECT COUNT(*) FROM meal_templates WHERE (owner IS NULL OR owner = ?1) AND is_favorite = 1",
                [caller],
                |row| row.get(0),
            )?
        } else {
            conn.query_row(
                "SELECT COUNT(*) FROM meal_templates WHERE owner IS NULL OR owner = ?1",
                [caller],
                |row| row.get(0),
            )?
        };
        Ok(count)
    }

    /// Count how many other templates contain this one as a child
    pub fn get_parent_usage_count(conn: &Connection, id: i64) -> DbResult<i64> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM template_items WHERE child_template_id = ?1",
            [id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Delete a template
    ///
    /// Cascades to its own items; fails on the foreign key constraint while
    /// another template still contains it. Returns Ok(false) if not found.
    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        if Self::get_by_id(conn, id)?.is_none() {
            return Ok(false);
        }

        let rows = conn.execute("DELETE FROM meal_templates WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }
}
