use crate::models::classify_types::ClassificationResult;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Accepted,
    Rejected,
}

/// `confidence >= threshold`; a result exactly at the threshold is accepted.
pub fn is_accepted(result: &ClassificationResult, threshold: f32) -> bool {
    result.confidence >= threshold
}

pub fn verdict(result: &ClassificationResult, threshold: f32) -> Verdict {
    if is_accepted(result, threshold) {
        Verdict::Accepted
    } else {
        Verdict::Rejected
    }
}
