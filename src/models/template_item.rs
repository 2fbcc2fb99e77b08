//! Template Item model
//!
//! One row in a template's composition. The reference is a tagged union:
//! either an atomic food or a nested child template, never both. The write
//! path takes an `ItemRef`, so the exactly-one invariant holds by
//! construction; the read path rejects rows that violate it.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbResult;

/// What a template item points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum ItemRef {
    /// An atomic food from the catalog
    Food(i64),
    /// A nested child template
    Template(i64),
}

impl ItemRef {
    /// The item_type column value
    pub fn type_str(&self) -> &'static str {
        match self {
            ItemRef::Food(_) => "food",
            ItemRef::Template(_) => "template",
        }
    }

    /// The food_id column value
    pub fn food_id(&self) -> Option<i64> {
        match self {
            ItemRef::Food(id) => Some(*id),
            ItemRef::Template(_) => None,
        }
    }

    /// The child_template_id column value
    pub fn child_template_id(&self) -> Option<i64> {
        match self {
            ItemRef::Food(_) => None,
            ItemRef::Template(id) => Some(*id),
        }
    }
}

/// One entry in a template's composition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateItem {
    pub id: i64,
    pub template_id: i64,
    pub item: ItemRef,
    pub quantity: f64,
    pub unit: String,
    pub position: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Template item with the referenced food or template name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateItemDetail {
    pub id: i64,
    pub item: ItemRef,
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub position: i64,
}

/// Data for adding an item to a template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateItemCreate {
    pub template_id: i64,
    pub item: ItemRef,
    pub quantity: f64,
    pub unit: String,
    #[serde(default)]
    pub position: i64,
}

/// Data for updating a template item's quantity/unit/order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateItemUpdate {
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub position: Option<i64>,
}

impl TemplateItem {
    /// Create from a database row
    ///
    /// Rows violating the exactly-one-reference CHECK surface as a
    /// conversion failure rather than silently picking a side.
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let item_type: String = row.get("item_type")?;
        let food_id: Option<i64> = row.get("food_id")?;
        let child_template_id: Option<i64> = row.get("child_template_id")?;

        let item = match (item_type.as_str(), food_id, child_template_id) {
            ("food", Some(id), None) => ItemRef::Food(id),
            ("template", None, Some(id)) => ItemRef::Template(id),
            _ => {
                return Err(rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    format!(
                        "template item {} has inconsistent references (type={})",
                        row.get::<_, i64>("id")?,
                        item_type
                    )
                    .into(),
                ))
            }
        };

        Ok(Self {
            id: row.get("id")?,
            template_id: row.get("template_id")?,
            item,
            quantity: row.get("quantity")?,
            unit: row.get("unit")?,
            position: row.get("position")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Insert a new item into a template
    ///
    /// Cycle validation for template references happens in the engine before
    /// this is called; the database never holds a cyclic link, even
    /// transiently.
    pub fn create(conn: &Connection, data: &TemplateItemCreate) -> DbResult<Self> {
        conn.execute(
            r#"
            INSERT INTO template_items (template_id, item_type, food_id, child_template_id, quantity, unit, position)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                data.template_id,
                data.item.type_str(),
                data.item.food_id(),
                data.item.child_template_id(),
                data.quantity,
                data.unit,
                data.position,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or_else(|| {
            crate::db::DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows)
        })
    }

    /// Get an item by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM template_items WHERE id = ?1")?;

        let result = stmt.query_row([id], Self::from_row);
        match result {
            Ok(item) => Ok(Some(item)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Get all items of a template in display order
    pub fn get_for_template(conn: &Connection, template_id: i64) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM template_items WHERE template_id = ?1 ORDER BY position, id",
        )?;

        let items = stmt
            .query_map([template_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(items)
    }

    /// Get items with the referenced food/template names
    pub fn get_details_for_template(
        conn: &Connection,
        template_id: i64,
    ) -> DbResult<Vec<TemplateItemDetail>> {
        let items = Self::get_for_template(conn, template_id)?;

        let mut details = Vec::with_capacity(items.len());
        for item in items {
            let name: String = match item.item {
                ItemRef::Food(food_id) => conn.query_row(
                    "SELECT name FROM foods WHERE id = ?1",
                    [food_id],
                    |row| row.get(0),
                )?,
                ItemRef::Template(child_id) => conn.query_row(
                    "SELECT name FROM meal_templates WHERE id = ?1",
                    [child_id],
                    |row| row.get(0),
                )?,
            };

            details.push(TemplateItemDetail {
                id: item.id,
                item: item.item,
                name,
                quantity: item.quantity,
                unit: item.unit,
                position: item.position,
            });
        }

        Ok(details)
    }

    /// Get the child template edges of a template (contains relation)
    pub fn child_template_ids(conn: &Connection, template_id: i64) -> DbResult<Vec<i64>> {
        let mut stmt = conn.prepare(
            "SELECT child_template_id FROM template_items
             WHERE template_id = ?1 AND child_template_id IS NOT NULL",
        )?;

        let ids = stmt
            .query_map([template_id], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;

        Ok(ids)
    }

    /// Get the templates that directly contain this template
    pub fn parent_template_ids(conn: &Connection, template_id: i64) -> DbResult<Vec<i64>> {
        let mut stmt = conn.prepare(
            "SELECT DISTINCT template_id FROM template_items WHERE child_template_id = ?1",
        )?;

        let ids = stmt
            .query_map([template_id], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;

        Ok(ids)
    }

    /// Update an item's quantity/unit/position
    pub fn update(conn: &Connection, id: i64, data: &TemplateItemUpdate) -> DbResult<Option<Self>> {
        let mut updates = Vec::new();
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(quantity) = data.quantity {
            updates.push(format!("quantity = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(quantity));
        }
        if let Some(ref unit) = data.unit {
            updates.push(format!("unit = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(unit.clone()));
        }
        if let Some(position) = data.position {
            updates.push(format!("position = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(position));
        }

        if updates.is_empty() {
            return Self::get_by_id(conn, id);
        }

        updates.push("updated_at = datetime('now')".to_string());

        let sql = format!(
            "UPDATE template_items SET {} WHERE id = ?{}",
            updates.join(", "),
            params_vec.len() + 1
        );

        params_vec.push(Box::new(id));

        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        conn.execute(&sql, params_refs.as_slice())?;

        Self::get_by_id(conn, id)
    }

    /// Delete an item
    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM template_items WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }

    /// Get the owning template_id for an item
    pub fn get_template_id(conn: &Connection, id: i64) -> DbResult<Option<i64>> {
        let result: Result<i64, _> = conn.query_row(
            "SELECT template_id FROM template_items WHERE id = ?1",
            [id],
            |row| row.get(0),
        );
        match result {
            Ok(template_id) => Ok(Some(template_id)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
