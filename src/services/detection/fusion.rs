// Score Fusion
// Pools per-window score sets into one document-level distribution and
// turns it into a verdict.
//
// Every window counts the same: a short trailing window weighs as much as a
// full one.

use std::collections::HashMap;

use crate::models::{AggregatedDistribution, ScoreEntry, ScoreSet, Verdict};

use super::label_mapping::{map_label, MappingRule};
use super::quantize::to_int_percent;

/// Document-level decision derived from an [`AggregatedDistribution`].
#[derive(Debug, Clone, PartialEq)]
pub struct FusedVerdict {
    pub verdict: Verdict,
    pub confidence: u8,
    pub winning_label: String,
    pub weight: f64,
    pub rule: MappingRule,
}

impl FusedVerdict {
    fn empty() -> Self {
        Self {
            verdict: Verdict::Real,
            confidence: 0,
            winning_label: String::new(),
            weight: 0.0,
            rule: MappingRule::Fallback,
        }
    }
}

/// Sum every label's score across windows and normalize by the grand total.
///
/// Labels are trimmed and kept in first-seen order. Non-finite scores count
/// as 0, and a zero total is replaced by 1 so the result is always defined.
pub fn fuse_score_sets<'a, I>(sets: I) -> AggregatedDistribution
where
    I: IntoIterator<Item = &'a ScoreSet>,
{
    let mut pooled: Vec<ScoreEntry> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for set in sets {
        for entry in set.iter() {
            let label = entry.label.trim();
            let score = if entry.score.is_finite() { entry.score } else { 0.0 };
            match index.get(label) {
                Some(&i) => pooled[i].score += score,
                None => {
                    index.insert(label.to_string(), pooled.len());
                    pooled.push(ScoreEntry::new(label, score));
                }
            }
        }
    }

    let total: f64 = pooled.iter().map(|e| e.score).sum();
    let total = if total == 0.0 { 1.0 } else { total };
    for entry in &mut pooled {
        entry.score /= total;
    }

    AggregatedDistribution::from_ordered(pooled)
}

/// Pick the winning label, map it to a verdict and quantize its weight.
///
/// An empty distribution gives (REAL, 0).
pub fn decide(distribution: &AggregatedDistribution) -> FusedVerdict {
    let Some(winner) = distribution.winner() else {
        return FusedVerdict::empty();
    };

    let (verdict, rule) = map_label(&winner.label, distribution.labels());
    FusedVerdict {
        verdict,
        confidence: to_int_percent(winner.score),
        winning_label: winner.label.clone(),
        weight: winner.score,
        rule,
    }
}
