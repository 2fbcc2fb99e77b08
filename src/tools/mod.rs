//! Mealtrack tools module
//!
//! MCP tool implementations over the catalog, templates, and meal log.

pub mod foods;
pub mod meals;
pub mod status;
pub mod templates;
