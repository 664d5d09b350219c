use crate::error::AppError;
use crate::models::classify_types::{ClassificationResult, Prediction, RawPrediction};
use crate::services::catalog::{CategoryCatalog, LabelMapping};

/// Maps raw backend output onto the catalog.
///
/// Custom scores must have exactly one entry per category; anything else is a
/// model/config mismatch and fails with `IndexOutOfRange`. Generic labels never
/// fail: unmapped output resolves to the catalog's fallback category.
pub fn resolve(
    raw: RawPrediction,
    catalog: &CategoryCatalog,
    mapping: &LabelMapping,
) -> Result<ClassificationResult, AppError> {
    match raw {
        RawPrediction::Scores(scores) => resolve_scores(scores, catalog),
        RawPrediction::Labels(labels) => Ok(resolve_labels(labels, catalog, mapping)),
    }
}

fn resolve_scores(
    scores: Vec<f32>,
    catalog: &CategoryCatalog,
) -> Result<ClassificationResult, AppError> {
    if scores.len() != catalog.len() {
        return Err(AppError::IndexOutOfRange {
            expected: catalog.len(),
            actual: scores.len(),
        });
    }

    // Strict `>` keeps the lowest index on ties. The tie rule is arbitrary but
    // kept stable.
    let mut best_index = 0;
    let mut best_score = scores[0];
    for (i, &score) in scores.iter().enumerate().skip(1) {
        if score > best_score {
            best_score = score;
            best_index = i;
        }
    }

    let category = catalog
        .get(best_index)
        .cloned()
        .ok_or(AppError::IndexOutOfRange {
            expected: catalog.len(),
            actual: scores.len(),
        })?;

    Ok(ClassificationResult {
        category,
        confidence: best_score,
        raw: RawPrediction::Scores(scores),
    })
}

fn resolve_labels(
    labels: Vec<Prediction>,
    catalog: &CategoryCatalog,
    mapping: &LabelMapping,
) -> ClassificationResult {
    let mut best = None;
    let mut best_confidence = 0.0;

    for prediction in &labels {
        let Some(category) = mapping
            .lookup(&prediction.class_name)
            .and_then(|id| catalog.find(id))
        else {
            continue;
        };

        if prediction.confidence > best_confidence {
            best = Some(category);
            best_confidence = prediction.confidence;
        }
    }

    let (category, confidence) = match best {
        Some(category) => (category.clone(), best_confidence),
        None => (
            catalog.fallback().clone(),
            labels.first().map(|p| p.confidence).unwrap_or(0.0),
        ),
    };

    ClassificationResult {
        category,
        confidence,
        raw: RawPrediction::Labels(labels),
    }
}
