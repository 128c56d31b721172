// newscheck Data Models
// Shared types passed between the windower, the oracle adapters and the fuser

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

// ============ Verdict ============

/// Canonical two-class output of the detector.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Real,
    Fake,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Real => "REAL",
            Self::Fake => "FAKE",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============ Oracle Scores ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub score: f64,
}

impl ScoreEntry {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// One window's full label → score output, in the order the oracle returned it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreSet {
    pub entries: Vec<ScoreEntry>,
}

impl ScoreSet {
    pub fn new(entries: Vec<ScoreEntry>) -> Self {
        Self { entries }
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        Self {
            entries: pairs
                .into_iter()
                .map(|(label, score)| ScoreEntry::new(label, score))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoreEntry> {
        self.entries.iter()
    }
}

/// Document-level label distribution after pooling every window.
///
/// Labels keep the order in which they were first seen across all score
/// sets, so ties on weight resolve the same way on every run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregatedDistribution {
    entries: Vec<ScoreEntry>,
}

impl AggregatedDistribution {
    pub(crate) fn from_ordered(entries: Vec<ScoreEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoreEntry> {
        self.entries.iter()
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.label == label)
            .map(|e| e.score)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.label.as_str())
    }

    /// Highest-weight entry; the earliest label wins a tie.
    pub fn winner(&self) -> Option<&ScoreEntry> {
        let mut best: Option<&ScoreEntry> = None;
        for entry in &self.entries {
            match best {
                Some(b) if entry.score > b.score => best = Some(entry),
                None => best = Some(entry),
                _ => {}
            }
        }
        best
    }

    pub fn as_map(&self) -> HashMap<String, f64> {
        self.entries
            .iter()
            .map(|e| (e.label.clone(), e.score))
            .collect()
    }
}

// ============ Classification Outcome ============

/// Caller-facing result of classifying one document.
///
/// A failed classification is its own variant so callers never confuse
/// "confidently REAL" with "the oracle could not be reached".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ClassificationOutcome {
    Classified { verdict: Verdict, confidence: u8 },
    Failed { reason: String },
}

impl ClassificationOutcome {
    pub fn classified(verdict: Verdict, confidence: u8) -> Self {
        Self::Classified {
            verdict,
            confidence: confidence.min(100),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    pub fn verdict(&self) -> Option<Verdict> {
        match self {
            Self::Classified { verdict, .. } => Some(*verdict),
            Self::Failed { .. } => None,
        }
    }

    /// Confidence in [0, 100]; always 0 for a failure.
    pub fn confidence(&self) -> u8 {
        match self {
            Self::Classified { confidence, .. } => *confidence,
            Self::Failed { .. } => 0,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Label shown to users: the verdict, or `Error: <reason>`.
    pub fn display_label(&self) -> String {
        match self {
            Self::Classified { verdict, .. } => verdict.to_string(),
            Self::Failed { reason } => format!("Error: {}", reason),
        }
    }
}

// ============ Document Report ============

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTimings {
    pub extract_ms: u64,
    pub infer_ms: u64,
    pub total_ms: u64,
}

/// Everything recorded about one classification run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentReport {
    pub run_id: Uuid,
    pub classified_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(flatten)]
    pub outcome: ClassificationOutcome,
    pub window_count: usize,
    pub distribution: AggregatedDistribution,
    pub timings: StageTimings,
}
