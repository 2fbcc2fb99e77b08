//! Data models
//!
//! Rust structs representing database entities.

mod food;
mod food_serving;
mod logged_meal;
mod nutrition;
mod template;
mod template_item;

pub use food::{Food, FoodCreate, FoodUpdate};
pub use food_serving::{FoodServing, FoodServingCreate};
pub use logged_meal::{
    LoggedMeal, LoggedMealCreate, LoggedMealItem, LoggedMealItemCreate, MealType, QuantityEdited,
};
pub use nutrition::Nutrition;
pub use template::{MealTemplate, MealTemplateCreate, MealTemplateUpdate};
pub use template_item::{
    ItemRef, TemplateItem, TemplateItemCreate, TemplateItemDetail, TemplateItemUpdate,
};
