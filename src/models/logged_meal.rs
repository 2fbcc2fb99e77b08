//! Logged Meal model
//!
//! A concrete, timestamped instance of eating. Once materialized a logged
//! meal contains only atomic food line items, each carrying a dual quantity
//! representation: grams (authoritative) plus an optional household serving
//! quantity for display.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbResult;
use super::Nutrition;

/// Meal type enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
    Unspecified,
}

impl MealType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
            MealType::Snack => "snack",
            MealType::Unspecified => "unspecified",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "breakfast" => MealType::Breakfast,
            "lunch" => MealType::Lunch,
            "dinner" => MealType::Dinner,
            "snack" => MealType::Snack,
            _ => MealType::Unspecified,
        }
    }
}

/// Which side of the dual quantity the user last edited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantityEdited {
    Grams,
    Serving,
}

impl QuantityEdited {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuantityEdited::Grams => "grams",
            QuantityEdited::Serving => "serving",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "serving" => QuantityEdited::Serving,
            _ => QuantityEdited::Grams,
        }
    }
}

/// A logged meal header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggedMeal {
    pub id: i64,
    pub owner: String,
    pub logged_at: String,
    pub meal_type: MealType,
    /// Informational provenance only; line items never reference templates
    pub source_template_id: Option<i64>,
    pub cached_nutrition: Nutrition,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// One atomic food entry in a logged meal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggedMealItem {
    pub id: i64,
    pub meal_id: i64,
    pub food_id: i64,
    /// Source of truth for nutrient math; never null
    pub gram_quantity: f64,
    /// Display quantity in household serving units; null when the food has
    /// no serving definition
    pub serving_quantity: Option<f64>,
    pub serving_unit: Option<String>,
    pub last_edited: QuantityEdited,
    /// True when the original unit fell back to canonical-serving multiples
    pub estimated: bool,
    pub nutrition: Nutrition,
    pub created_at: String,
    pub updated_at: String,
}

/// Data for inserting a logged meal header
#[derive(Debug, Clone)]
pub struct LoggedMealCreate<'a> {
    pub owner: &'a str,
    pub logged_at: &'a str,
    pub meal_type: MealType,
    pub source_template_id: Option<i64>,
    pub totals: &'a Nutrition,
    pub notes: Option<&'a str>,
}

/// Data for inserting one atomic line item
#[derive(Debug, Clone)]
pub struct LoggedMealItemCreate<'a> {
    pub meal_id: i64,
    pub food_id: i64,
    pub gram_quantity: f64,
    pub serving_quantity: Option<f64>,
    pub serving_unit: Option<&'a str>,
    pub last_edited: QuantityEdited,
    pub estimated: bool,
    pub nutrition: &'a Nutrition,
}

fn nutrition_from_row(row: &Row) -> rusqlite::Result<Nutrition> {
    Ok(Nutrition {
        calories: row.get("cached_calories")?,
        protein: row.get("cached_protein")?,
        carbs: row.get("cached_carbs")?,
        fat: row.get("cached_fat")?,
        fiber: row.get("cached_fiber")?,
        sugar: row.get("cached_sugar")?,
        sodium: row.get("cached_sodium")?,
        saturated_fat: row.get("cached_saturated_fat")?,
        cholesterol: row.get("cached_cholesterol")?,
    })
}

impl LoggedMeal {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let meal_type_str: String = row.get("meal_type")?;
        Ok(Self {
            id: row.get("id")?,
            owner: row.get("owner")?,
            logged_at: row.get("logged_at")?,
            meal_type: MealType::from_str(&meal_type_str),
            source_template_id: row.get("source_template_id")?,
            cached_nutrition: nutrition_from_row(row)?,
            notes: row.get("notes")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Insert a logged meal header
    pub fn insert(conn: &Connection, data: &LoggedMealCreate) -> DbResult<i64> {
        conn.execute(
            r#"
            INSERT INTO logged_meals (
                owner, logged_at, meal_type, source_template_id,
                cached_calories, cached_protein, cached_carbs, cached_fat,
                cached_fiber, cached_sugar, cached_sodium, cached_saturated_fat,
                cached_cholesterol, notes
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                data.owner,
                data.logged_at,
                data.meal_type.as_str(),
                data.source_template_id,
                data.totals.calories,
                data.totals.protein,
                data.totals.carbs,
                data.totals.fat,
                data.totals.fiber,
                data.totals.sugar,
                data.totals.sodium,
                data.totals.saturated_fat,
                data.totals.cholesterol,
                data.notes,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Get a logged meal by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM logged_meals WHERE id = ?1")?;

        let result = stmt.query_row([id], Self::from_row);
        match result {
            Ok(meal) => Ok(Some(meal)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List an owner's meals, optionally restricted to a logged_at range
    pub fn list_for_owner(
        conn: &Connection,
        owner: &str,
        from: Option<&str>,
        to: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<Self>> {
        let mut clauses = vec!["owner = ?1".to_string()];
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(owner.to_string())];

        if let Some(from) = from {
            clauses.push(format!("logged_at >= ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(from.to_string()));
        }
        if let Some(to) = to {
            clauses.push(format!("logged_at <= ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(to.to_string()));
        }

        let sql = format!(
            "SELECT * FROM logged_meals WHERE {} ORDER BY logged_at DESC, id DESC LIMIT ?{} OFFSET ?{}",
            clauses.join(" AND "),
            params_vec.len() + 1,
            params_vec.len() + 2,
        );
        params_vec.push(Box::new(limit));
        params_vec.push(Box::new(offset));

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        let meals = stmt
            .query_map(params_refs.as_slice(), Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(meals)
    }

    /// Update meal totals from its current items
    pub fn update_cached_totals(conn: &Connection, id: i64, totals: &Nutrition) -> DbResult<()> {
        conn.execute(
            r#"
            UPDATE logged_meals SET
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
                totals.calories,
                totals.protein,
                totals.carbs,
                totals.fat,
                totals.fiber,
                totals.sugar,
                totals.sodium,
                totals.saturated_fat,
                totals.cholesterol,
                id,
            ],
        )?;
        Ok(())
    }

    /// Delete a logged meal (cascades to its items)
    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM logged_meals WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }
}

impl LoggedMealItem {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let last_edited: String = row.get("last_edited")?;
        Ok(Self {
            id: row.get("id")?,
            meal_id: row.get("meal_id")?,
            food_id: row.get("food_id")?,
            gram_quantity: row.get("gram_quantity")?,
            serving_quantity: row.get("serving_quantity")?,
            serving_unit: row.get("serving_unit")?,
            last_edited: QuantityEdited::from_str(&last_edited),
            estimated: row.get::<_, i32>("estimated")? != 0,
            nutrition: nutrition_from_row(row)?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Insert one atomic line item
    pub fn insert(conn: &Connection, data: &LoggedMealItemCreate) -> DbResult<i64> {
        conn.execute(
            r#"
            INSERT INTO logged_meal_items (
                meal_id, food_id, gram_quantity, serving_quantity, serving_unit,
                last_edited, estimated,
                cached_calories, cached_protein, cached_carbs, cached_fat,
                cached_fiber, cached_sugar, cached_sodium, cached_saturated_fat,
                cached_cholesterol
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
            params![
                data.meal_id,
                data.food_id,
                data.gram_quantity,
                data.serving_quantity,
                data.serving_unit,
                data.last_edited.as_str(),
                data.estimated as i32,
                data.nutrition.calories,
                data.nutrition.protein,
                data.nutrition.carbs,
                data.nutrition.fat,
                data.nutrition.fiber,
                data.nutrition.sugar,
                data.nutrition.sodium,
                data.nutrition.saturated_fat,
                data.nutrition.cholesterol,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Get an item by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM logged_meal_items WHERE id = ?1")?;

        let result = stmt.query_row([id], Self::from_row);
        match result {
            Ok(item) => Ok(Some(item)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Get all items for a meal
    pub fn get_for_meal(conn: &Connection, meal_id: i64) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM logged_meal_items WHERE meal_id = ?1 ORDER BY id",
        )?;

        let items = stmt
            .query_map([meal_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(items)
    }

    /// Write both sides of the dual quantity plus refreshed nutrition
    pub fn update_quantities(
        conn: &Connection,
        id: i64,
        gram_quantity: f64,
        serving_quantity: Option<f64>,
        serving_unit: Option<&str>,
        last_edited: QuantityEdited,
        estimated: bool,
        nutrition: &Nutrition,
    ) -> DbResult<()> {
        conn.execute(
            r#"
            UPDATE logged_meal_items SET
                gram_quantity = ?1,
                serving_quantity = ?2,
                serving_unit = ?3,
                last_edited = ?4,
                estimated = ?5,
                cached_calories = ?6,
                cached_protein = ?7,
                cached_carbs = ?8,
                cached_fat = ?9,
                cached_fiber = ?10,
                cached_sugar = ?11,
                cached_sodium = ?12,
                cached_saturated_fat = ?13,
                cached_cholesterol = ?14,
                updated_at = datetime('now')
            WHERE id = ?15
            "#,
            params![
                gram_quantity,
                serving_quantity,
                serving_unit,
                last_edited.as_str(),
                estimated as i32,
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

    /// Get the owning meal_id for an item
    pub fn get_meal_id(conn: &Connection, id: i64) -> DbResult<Option<i64>> {
        let result: Result<i64, _> = conn.query_row(
            "SELECT meal_id FROM logged_meal_items WHERE id = ?1",
            [id],
            |row| row.get(0),
        );
        match result {
            Ok(meal_id) => Ok(Some(meal_id)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete an item
    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM logged_meal_items WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }
}
