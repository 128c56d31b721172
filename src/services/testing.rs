// Test doubles for the tokenizer and oracle collaborators

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::providers::{ClassificationOracle, OracleError};
use super::tokenizer::{TokenCodec, TokenizerError};
use crate::models::ScoreSet;

/// Maps each whitespace-separated word `tN` to id `N`; any other word is
/// assigned its position in the text.
pub struct WordCodec;

impl TokenCodec for WordCodec {
    fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizerError> {
        Ok(text
            .split_whitespace()
            .enumerate()
            .map(|(i, w)| {
                w.strip_prefix('t')
                    .and_then(|n| n.parse().ok())
                    .unwrap_or(i as u32)
            })
            .collect())
    }

    fn decode(&self, ids: &[u32]) -> Result<String, TokenizerError> {
        Ok(ids
            .iter()
            .map(|id| format!("t{}", id))
            .collect::<Vec<_>>()
            .join(" "))
    }
}

/// A document of `n` tokens `t0 t1 ... t{n-1}`.
pub fn document_of(n: usize) -> String {
    (0..n)
        .map(|i| format!("t{}", i))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Returns pre-programmed score sets and records every batch it receives.
pub struct ScriptedOracle {
    responses: Mutex<Vec<Result<Vec<ScoreSet>, String>>>,
    fallback: ScoreSet,
    pub calls: AtomicUsize,
    pub batches: Mutex<Vec<Vec<String>>>,
}

impl ScriptedOracle {
    /// Answers every window with the same score set.
    pub fn uniform(set: ScoreSet) -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            fallback: set,
            calls: AtomicUsize::new(0),
            batches: Mutex::new(Vec::new()),
        }
    }

    /// Answers the next call with exactly these score sets.
    pub fn once(sets: Vec<ScoreSet>) -> Self {
        let oracle = Self::uniform(ScoreSet::default());
        oracle.responses.lock().unwrap().push(Ok(sets));
        oracle
    }

    pub fn failing(message: &str) -> Self {
        let oracle = Self::uniform(ScoreSet::default());
        oracle
            .responses
            .lock()
            .unwrap()
            .push(Err(message.to_string()));
        oracle
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClassificationOracle for ScriptedOracle {
    async fn classify(&self, texts: &[String]) -> Result<Vec<ScoreSet>, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.batches.lock().unwrap().push(texts.to_vec());

        let scripted = {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                None
            } else {
                Some(responses.remove(0))
            }
        };

        match scripted {
            Some(Ok(sets)) => Ok(sets),
            Some(Err(message)) => Err(OracleError::ApiError {
                status: 503,
                message,
            }),
            None => Ok(texts.iter().map(|_| self.fallback.clone()).collect()),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
