use crate::models::category_types::Category;
use serde::Serialize;

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Prediction {
    pub class_name: String,
    pub confidence: f32,
}

/// Backend output before it is mapped onto the catalog.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(tag = "mode", content = "values", rename_all = "snake_case")]
pub enum RawPrediction {
    /// Custom classifier: one probability per catalog entry, in catalog order.
    Scores(Vec<f32>),
    /// Generic classifier: ranked open-vocabulary labels, best first.
    Labels(Vec<Prediction>),
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ClassificationResult {
    pub category: Category,
    pub confidence: f32,
    pub raw: RawPrediction,
}
