use serde::{Deserialize, Serialize};

/// Working record of an in-progress surplus declaration. One field is filled
/// per guided step; the record is folded into the session impact total and
/// discarded when the flow completes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurplusDeclaration {
    pub material_type: Option<String>,
    pub quantity_kg: Option<f64>,
    pub condition: Option<String>,
    pub location: Option<String>,
}

pub mod session_keys {
    pub const USER_INPUT: &str = "user_input";
    pub const DECLARATION: &str = "surplus_declaration";
    pub const IMPACT: &str = "impact_estimate";
    pub const LEAD: &str = "lead";
}
