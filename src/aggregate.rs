use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};

/// Aggregates at or below `max_aggregate` fall into this band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationBand {
    pub max_aggregate: u64,
    pub label: String,
}

impl ClassificationBand {
    pub fn new(max_aggregate: u64, label: &str) -> Self {
        Self {
            max_aggregate,
            label: label.to_string(),
        }
    }
}

/// Aggregate-to-division lookup. Lower aggregates are better, so bands are
/// checked in ascending order of their upper bound.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationScale {
    bands: Vec<ClassificationBand>,
    fallback_label: String,
}

impl ClassificationScale {
    pub fn new(bands: Vec<ClassificationBand>, fallback_label: impl Into<String>) -> Result<Self> {
        let fallback_label = fallback_label.into();
        if bands.is_empty() {
            return Err(EngineError::InvalidBandTable(
                "classification bands must not be empty".to_string(),
            ));
        }
        if fallback_label.trim().is_empty() {
            return Err(EngineError::InvalidBandTable(
                "fallback classification label must not be empty".to_string(),
            ));
        }
        for (i, band) in bands.iter().enumerate() {
            if band.label.trim().is_empty() {
                return Err(EngineError::InvalidBandTable(format!(
                    "classification band {} has an empty label",
                    i
                )));
            }
            if i > 0 && band.max_aggregate <= bands[i - 1].max_aggregate {
                return Err(EngineError::InvalidBandTable(
                    "classification bands must be strictly ascending by maxAggregate".to_string(),
                ));
            }
        }
        Ok(Self {
            bands,
            fallback_label,
        })
    }

    pub fn uneb() -> Self {
        Self {
            bands: vec![
                ClassificationBand::new(32, "Division 1"),
                ClassificationBand::new(45, "Division 2"),
                ClassificationBand::new(58, "Division 3"),
                ClassificationBand::new(68, "Division 4"),
            ],
            fallback_label: "U".to_string(),
        }
    }

    pub fn bands(&self) -> &[ClassificationBand] {
        &self.bands
    }

    pub fn fallback_label(&self) -> &str {
        &self.fallback_label
    }

    pub fn classify(&self, aggregate_score: u64) -> &str {
        self.bands
            .iter()
            .find(|b| aggregate_score <= b.max_aggregate)
            .map(|b| b.label.as_str())
            .unwrap_or(&self.fallback_label)
    }
}

impl Default for ClassificationScale {
    fn default() -> Self {
        Self::uneb()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectWeight {
    pub subject_id: String,
    pub weight: u32,
}

impl SubjectWeight {
    pub fn new(subject_id: impl Into<String>, weight: u32) -> Self {
        Self {
            subject_id: subject_id.into(),
            weight,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregate {
    pub aggregate_score: u64,
    pub classification: String,
    /// Subjects that contributed, best first.
    pub counted: Vec<SubjectWeight>,
    pub dropped: Vec<SubjectWeight>,
}

/// Sums the `best_of` lowest weights. Equal weights keep input order, so the
/// first-seen subject wins at the cut. With fewer than `best_of` subjects all
/// of them count.
pub fn aggregate(
    grades: &[SubjectWeight],
    best_of: usize,
    scale: &ClassificationScale,
) -> Aggregate {
    let mut order: Vec<usize> = (0..grades.len()).collect();
    order.sort_by_key(|&i| grades[i].weight);

    let take = best_of.min(grades.len());
    let counted: Vec<SubjectWeight> = order[..take].iter().map(|&i| grades[i].clone()).collect();
    let mut dropped_idx: Vec<usize> = order[take..].to_vec();
    dropped_idx.sort_unstable();
    let dropped = dropped_idx.into_iter().map(|i| grades[i].clone()).collect();

    let aggregate_score: u64 = counted.iter().map(|g| u64::from(g.weight)).sum();
    Aggregate {
        aggregate_score,
        classification: scale.classify(aggregate_score).to_string(),
        counted,
        dropped,
    }
}
