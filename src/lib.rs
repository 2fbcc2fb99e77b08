//! Mealtrack Library
//!
//! Core functionality for meal logging with reusable nested templates.

pub mod build_info;
pub mod db;
pub mod engine;
pub mod mcp;
pub mod models;
pub mod tools;
