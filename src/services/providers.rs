// Classification Oracle Service
// Batched calls to a bounded-length text classifier

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::env;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

use super::config_store::{ConfigStore, OracleConfig};
use crate::models::{ScoreEntry, ScoreSet};

pub const HF_INFERENCE_DEFAULT_URL: &str =
    "https://api-inference.huggingface.co/models/Pulk17/Fake-News-Detection";
const API_KEY_PROVIDER: &str = "huggingface";

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("JSON parse error: {0}")]
    JsonError(String),
    #[error("Oracle returned {actual} score sets for {expected} windows")]
    BatchMismatch { expected: usize, actual: usize },
    #[error("Model error: {0}")]
    ModelError(String),
}

/// Bounded-length text classifier returning every label's score per text.
///
/// One call classifies the whole batch; the result has one [`ScoreSet`] per
/// input, in input order.
#[async_trait]
pub trait ClassificationOracle: Send + Sync {
    async fn classify(&self, texts: &[String]) -> Result<Vec<ScoreSet>, OracleError>;

    fn name(&self) -> &str;
}

#[async_trait]
impl<T: ClassificationOracle + ?Sized> ClassificationOracle for Box<T> {
    async fn classify(&self, texts: &[String]) -> Result<Vec<ScoreSet>, OracleError> {
        (**self).classify(texts).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[derive(Debug, Clone, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a [String],
    parameters: InferenceParameters,
    options: InferenceOptions,
}

#[derive(Debug, Clone, Serialize)]
struct InferenceParameters {
    // null asks the pipeline for every label, not just the arg-max.
    top_k: Option<usize>,
    truncation: bool,
    max_length: usize,
}

#[derive(Debug, Clone, Serialize)]
struct InferenceOptions {
    wait_for_model: bool,
}

/// Oracle backed by a HuggingFace Inference-compatible HTTP endpoint.
pub struct HttpOracle {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    max_length: usize,
}

impl HttpOracle {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
        max_length: usize,
    ) -> Result<Self, OracleError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            max_length,
        })
    }

    pub fn from_config(
        config: &OracleConfig,
        api_key: Option<String>,
        max_length: usize,
    ) -> Result<Self, OracleError> {
        let endpoint = env::var("NEWSCHECK_ORACLE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| config.endpoint.clone())
            .unwrap_or_else(|| HF_INFERENCE_DEFAULT_URL.to_string());
        Self::new(
            endpoint,
            api_key,
            Duration::from_secs(config.timeout_secs),
            max_length,
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// One request carrying every window of the batch.
    fn request_body<'a>(&self, texts: &'a [String]) -> InferenceRequest<'a> {
        InferenceRequest {
            inputs: texts,
            parameters: InferenceParameters {
                top_k: None,
                truncation: true,
                max_length: self.max_length,
            },
            options: InferenceOptions {
                wait_for_model: true,
            },
        }
    }
}

#[async_trait]
impl ClassificationOracle for HttpOracle {
    async fn classify(&self, texts: &[String]) -> Result<Vec<ScoreSet>, OracleError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = self.request_body(texts);
        let start = Instant::now();

        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }
        let response = builder.send().await?;

        let latency_ms = start.elapsed().as_millis() as u64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| OracleError::JsonError(e.to_string()))?;

        let sets = parse_score_sets(&data, texts.len())?;
        info!(
            windows = texts.len(),
            latency_ms,
            endpoint = %self.endpoint,
            "[ORACLE] batch classified"
        );
        Ok(sets)
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Parse a text-classification response into one score set per input.
///
/// Accepts the batched shape `[[{label, score}, ..], ..]` and, for a single
/// input, the flat shape `[{label, score}, ..]`. Entries missing a label or a
/// score default to `""` / `0.0`; non-object entries are skipped.
pub fn parse_score_sets(data: &Value, expected: usize) -> Result<Vec<ScoreSet>, OracleError> {
    if let Some(message) = data.get("error").and_then(Value::as_str) {
        return Err(OracleError::ApiError {
            status: 200,
            message: message.to_string(),
        });
    }

    let items = data
        .as_array()
        .ok_or_else(|| OracleError::JsonError(format!("expected a JSON array, got {}", data)))?;

    let flat = expected == 1 && !items.is_empty() && items.iter().all(Value::is_object);
    let sets: Vec<ScoreSet> = if flat {
        vec![parse_score_set(data)]
    } else {
        items.iter().map(parse_score_set).collect()
    };

    if sets.len() != expected {
        return Err(OracleError::BatchMismatch {
            expected,
            actual: sets.len(),
        });
    }

    debug!(sets = sets.len(), "[ORACLE] response parsed");
    Ok(sets)
}

fn parse_score_set(window: &Value) -> ScoreSet {
    match window {
        Value::Array(entries) => ScoreSet::new(entries.iter().filter_map(parse_entry).collect()),
        Value::Object(_) => ScoreSet::new(parse_entry(window).into_iter().collect()),
        _ => ScoreSet::default(),
    }
}

fn parse_entry(entry: &Value) -> Option<ScoreEntry> {
    let obj = entry.as_object()?;
    let label = match obj.get("label") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    let score = match obj.get("score") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    };
    Some(ScoreEntry::new(label, score))
}

/// Get the oracle API key from the environment or the config file.
pub fn get_api_key(store: Option<&ConfigStore>) -> Option<String> {
    for key in ["HF_API_TOKEN", "NEWSCHECK_HF_API_TOKEN"] {
        if let Ok(val) = env::var(key) {
            let v = val.trim();
            if !v.is_empty() {
                return Some(v.to_string());
            }
        }
    }

    let default_store = match store {
        Some(_) => None,
        None => ConfigStore::default_config_dir().map(ConfigStore::new),
    };
    let store = store.or(default_store.as_ref())?;
    store.get_api_key(API_KEY_PROVIDER).ok().flatten()
}
