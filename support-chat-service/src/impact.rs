//! Environmental-impact accounting for surplus declarations.
//!
//! One kilogram of reused material avoids a material-specific amount of CO2
//! compared to producing it new. The table below is the fixed coefficient set
//! used across the marketplace (kg CO2 avoided per kg reused).

use serde::{Deserialize, Serialize};

/// Coefficient applied when the declared material matches no table entry.
pub const DEFAULT_COEFFICIENT: f64 = 0.5;

/// Average passenger-car emissions, kg CO2 per km. Used for the
/// "equivalent km not driven" figure in summaries.
pub const CAR_KG_CO2_PER_KM: f64 = 0.12;

/// Approximate CO2 absorbed by one tree per year, in kg.
pub const TREE_KG_CO2_PER_YEAR: f64 = 200.0;

// Keys are stored lowercase and accent-free; lookup folds the input the
// same way before substring matching.
const CO2_COEFFICIENTS: &[(&str, f64)] = &[
    ("acier", 1.8),
    ("beton", 0.2),
    ("bois", 0.5),
    ("aluminium", 8.0),
    ("cuivre", 3.0),
    ("isolant", 2.5),
    ("parpaing", 0.2),
    ("tuile", 0.4),
    ("carrelage", 0.5),
    ("platre", 0.15),
    ("verre", 0.9),
];

/// Lowercase the input and strip the accents found in French material names,
/// so that "Béton armé" matches the "beton" table entry.
pub fn fold_accents(input: &str) -> String {
    input
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'à' | 'â' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'î' | 'ï' => 'i',
            'ô' | 'ö' => 'o',
            'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

/// CO2 coefficient for a declared material name, by case- and
/// accent-insensitive substring match, falling back to the default.
pub fn coefficient_for(material: &str) -> f64 {
    let folded = fold_accents(material);
    CO2_COEFFICIENTS
        .iter()
        .find(|(name, _)| folded.contains(name))
        .map(|(_, coefficient)| *coefficient)
        .unwrap_or(DEFAULT_COEFFICIENT)
}

/// CO2 avoided by reusing `quantity_kg` of `material`, rounded to whole kg.
pub fn co2_avoided_kg(material: &str, quantity_kg: f64) -> f64 {
    (quantity_kg * coefficient_for(material)).round()
}

pub fn car_km_equivalent(co2_kg: f64) -> i64 {
    (co2_kg / CAR_KG_CO2_PER_KM).round() as i64
}

pub fn trees_per_year_equivalent(co2_kg: f64) -> i64 {
    (co2_kg / TREE_KG_CO2_PER_YEAR).round() as i64
}

/// Running per-session accumulator over completed declarations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ImpactEstimate {
    pub kg_saved: f64,
    pub co2_avoided_kg: f64,
}

impl ImpactEstimate {
    pub fn new(kg_saved: f64, co2_avoided_kg: f64) -> Self {
        Self {
            kg_saved,
            co2_avoided_kg,
        }
    }

    /// Fold one completed declaration into the running total.
    pub fn record(&mut self, quantity_kg: f64, co2_kg: f64) {
        self.kg_saved += quantity_kg;
        self.co2_avoided_kg += co2_kg;
    }
}
