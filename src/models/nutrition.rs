//! Shared nutrition data structure
//!
//! The nutrient vector the engine scales and sums. Used across foods,
//! templates, and logged meals.

use serde::{Deserialize, Serialize};

/// Nutritional information
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Nutrition {
    pub calories: f64,
    pub protein: f64,      // grams
    pub carbs: f64,        // grams
    pub fat: f64,          // grams
    pub fiber: f64,        // grams
    pub sugar: f64,        // grams
    pub sodium: f64,       // milligrams
    pub saturated_fat: f64, // grams
    pub cholesterol: f64,  // milligrams
}

impl Nutrition {
    /// Create a new Nutrition with all zeros
    pub fn zero() -> Self {
        Self::default()
    }

    /// Scale nutrition values by a multiplier
    pub fn scale(&self, multiplier: f64) -> Self {
        Self {
            calories: self.calories * multiplier,
            protein: self.protein * multiplier,
            carbs: self.carbs * multiplier,
            fat: self.fat * multiplier,
            fiber: self.fiber * multiplier,
            sugar: self.sugar * multiplier,
            sodium: self.sodium * multiplier,
            saturated_fat: self.saturated_fat * multiplier,
            cholesterol: self.cholesterol * multiplier,
        }
    }

    /// Add another nutrition to this one
    pub fn add(&self, other: &Nutrition) -> Self {
        Self {
            calories: self.calories + other.calories,
            protein: self.protein + other.protein,
            carbs: self.carbs + other.carbs,
            fat: self.fat + other.fat,
            fiber: self.fiber + other.fiber,
            sugar: self.sugar + other.sugar,
            sodium: self.sodium + other.sodium,
            saturated_fat: self.saturated_fat + other.saturated_fat,
            cholesterol: self.cholesterol + other.cholesterol,
        }
    }

    /// Round every field to two decimal places.
    ///
    /// Applied once at persistence time, never per summation term.
    pub fn rounded(&self) -> Self {
        fn r2(v: f64) -> f64 {
            (v * 100.0).round() / 100.0
        }
        Self {
            calories: r2(self.calories),
            protein: r2(self.protein),
            carbs: r2(self.carbs),
            fat: r2(self.fat),
            fiber: r2(self.fiber),
            sugar: r2(self.sugar),
            sodium: r2(self.sodium),
            saturated_fat: r2(self.saturated_fat),
            cholesterol: r2(self.cholesterol),
        }
    }

    /// True when every field is within `tolerance` of the other's
    pub fn approx_eq(&self, other: &Nutrition, tolerance: f64) -> bool {
        (self.calories - other.calories).abs() <= tolerance
            && (self.protein - other.protein).abs() <= tolerance
            && (self.carbs - other.carbs).abs() <= tolerance
            && (self.fat - other.fat).abs() <= tolerance
            && (self.fiber - other.fiber).abs() <= tolerance
            && (self.sugar - other.sugar).abs() <= tolerance
            && (self.sodium - other.sodium).abs() <= tolerance
            && (self.saturated_fat - other.saturated_fat).abs() <= tolerance
            && (self.cholesterol - other.cholesterol).abs() <= tolerance
    }
}

impl std::ops::Add for Nutrition {
    type Output = Nutrition;

    fn add(self, other: Nutrition) -> Nutrition {
        Nutrition::add(&self, &other)
    }
}

impl std::ops::Mul<f64> for Nutrition {
    type Output = Nutrition;

    fn mul(self, multiplier: f64) -> Nutrition {
        self.scale(multiplier)
    }
}

impl std::iter::Sum for Nutrition {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Nutrition::zero(), |acc, n| acc + n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_and_add() {
        let n = Nutrition {
            calories: 100.0,
            protein: 10.0,
            ..Nutrition::zero()
        };
        let doubled = n.scale(2.0);
        assert_eq!(doubled.calories, 200.0);
        assert_eq!(doubled.protein, 20.0);

        let total = n.clone() + doubled;
        assert_eq!(total.calories, 300.0);
    }

    #[test]
    fn test_rounded_two_decimals() {
        let n = Nutrition {
            calories: 213.00499,
            protein: 0.005,
            ..Nutrition::zero()
        };
        let r = n.rounded();
        assert_eq!(r.calories, 213.0);
        assert_eq!(r.protein, 0.01);
    }

    #[test]
    fn test_sum_iterator() {
        let parts = vec![
            Nutrition { calories: 72.0, ..Nutrition::zero() },
            Nutrition { calories: 72.0, ..Nutrition::zero() },
            Nutrition { calories: 69.0, ..Nutrition::zero() },
        ];
        let total: Nutrition = parts.into_iter().sum();
        assert_eq!(total.calories, 213.0);
    }
}
