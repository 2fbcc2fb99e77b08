//! Unit tokens and weight conversion constants
//!
//! The engine's canonical quantity is grams. Weight units convert directly;
//! everything else is either the generic "serving" token or a household unit
//! resolved against the food's serving definitions.

// ============================================================================
// Weight Conversion Constants (to grams)
// ============================================================================

/// Grams per milligram
pub const G_PER_MG: f64 = 0.001;
/// Grams per kilogram
pub const G_PER_KG: f64 = 1000.0;
/// Grams per ounce
pub const G_PER_OZ: f64 = 28.3495;
/// Grams per pound
pub const G_PER_LB: f64 = 453.592;

/// How a raw unit string is interpreted by the normalizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// Directly convertible to grams (g, mg, kg, oz, lb)
    Weight,
    /// The generic "serving" token: multiples of the canonical serving size
    GenericServing,
    /// Anything else: resolved against the food's household servings
    Household,
}

/// Get the conversion factor to grams for a weight unit
pub fn grams_per_unit(unit: &str) -> Option<f64> {
    let lower = unit.to_lowercase();
    let trimmed = lower.trim();

    match trimmed {
        "g" | "gram" | "grams" => Some(1.0),
        "mg" | "milligram" | "milligrams" => Some(G_PER_MG),
        "kg" | "kilogram" | "kilograms" => Some(G_PER_KG),
        "oz" | "ounce" | "ounces" => Some(G_PER_OZ),
        "lb" | "lbs" | "pound" | "pounds" => Some(G_PER_LB),
        _ => None,
    }
}

/// Classify a raw unit string
pub fn classify_unit(unit: &str) -> UnitKind {
    let lower = unit.to_lowercase();
    let trimmed = lower.trim();

    if grams_per_unit(trimmed).is_some() {
        return UnitKind::Weight;
    }

    match trimmed {
        "serving" | "servings" => UnitKind::GenericServing,
        _ => UnitKind::Household,
    }
}

/// Normalize a household unit string for storage and lookup
pub fn canonical_unit_token(unit: &str) -> String {
    unit.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grams_per_unit() {
        assert_eq!(grams_per_unit("g"), Some(1.0));
        assert_eq!(grams_per_unit("Grams"), Some(1.0));
        assert_eq!(grams_per_unit("oz"), Some(G_PER_OZ));
        assert_eq!(grams_per_unit("lb"), Some(G_PER_LB));
        assert_eq!(grams_per_unit("kg"), Some(G_PER_KG));
        assert_eq!(grams_per_unit("cup"), None);
        assert_eq!(grams_per_unit("slice"), None);
    }

    #[test]
    fn test_classify_weight_units() {
        assert_eq!(classify_unit("g"), UnitKind::Weight);
        assert_eq!(classify_unit(" KG "), UnitKind::Weight);
        assert_eq!(classify_unit("ounces"), UnitKind::Weight);
    }

    #[test]
    fn test_classify_generic_serving() {
        assert_eq!(classify_unit("serving"), UnitKind::GenericServing);
        assert_eq!(classify_unit("Servings"), UnitKind::GenericServing);
    }

    #[test]
    fn test_classify_household() {
        assert_eq!(classify_unit("cup"), UnitKind::Household);
        assert_eq!(classify_unit("slice"), UnitKind::Household);
        assert_eq!(classify_unit("large"), UnitKind::Household);
        assert_eq!(classify_unit("scoop"), UnitKind::Household);
    }

    #[test]
    fn test_canonical_unit_token() {
        assert_eq!(canonical_unit_token("  Cup "), "cup");
        assert_eq!(canonical_unit_token("SLICE"), "slice");
    }
}
