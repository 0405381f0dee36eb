//! Prediction output records.
//!
//! The JSON shape mirrors the transformers text-classification pipeline:
//! one `{label, score}` per input, or a ranked list per input when `top_k`
//! is requested.

use serde::{Deserialize, Serialize};

/// A single label with its confidence score (0.0–1.0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f32,
}

/// Prediction for one input text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Prediction {
    /// Highest-scoring label only.
    Top(LabelScore),
    /// Labels sorted by score descending, truncated to `top_k`.
    Ranked(Vec<LabelScore>),
}

impl Prediction {
    /// Build a prediction from per-label probabilities.
    ///
    /// `top_k` of `None` keeps only the best label; otherwise the ranked list
    /// is truncated to `top_k` entries.
    pub fn from_scores(labels: &[String], scores: &[f32], top_k: Option<usize>) -> Self {
        let mut ranked: Vec<LabelScore> = labels
            .iter()
            .zip(scores.iter())
            .map(|(label, score)| LabelScore {
                label: label.clone(),
                score: *score,
            })
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));

        match top_k {
            None => match ranked.into_iter().next() {
                Some(best) => Self::Top(best),
                None => Self::Ranked(Vec::new()),
            },
            Some(k) => {
                ranked.truncate(k);
                Self::Ranked(ranked)
            }
        }
    }

    /// Best label for this prediction, if any.
    pub fn best(&self) -> Option<&LabelScore> {
        match self {
            Self::Top(best) => Some(best),
            Self::Ranked(ranked) => ranked.first(),
        }
    }
}

/// Numerically stable softmax over raw logits.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum == 0.0 || !sum.is_finite() {
        return vec![0.0; logits.len()];
    }
    exps.into_iter().map(|e| e / sum).collect()
}
