// ONNX Classification Oracle
// Local sequence-classification model; the model directory holds model.onnx,
// tokenizer.json and the HuggingFace config.json whose id2label names the classes

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use ort::session::Session;
use ort::value::Tensor;
use serde_json::Value;
use tokenizers::{PaddingParams, Tokenizer, TruncationParams};
use tracing::{debug, info};

use super::providers::{ClassificationOracle, OracleError};
use crate::models::{ScoreEntry, ScoreSet};

fn model_error(e: impl std::fmt::Display) -> OracleError {
    OracleError::ModelError(e.to_string())
}

pub struct OnnxOracle {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    labels: Vec<String>,
    uses_token_types: bool,
}

impl OnnxOracle {
    /// Load a classifier that never sees more than `max_len` tokens per text.
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self, OracleError> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let config_path = model_dir.join("config.json");

        for path in [&model_path, &tokenizer_path, &config_path] {
            if !path.exists() {
                return Err(OracleError::ModelError(format!(
                    "{} not found in {}",
                    path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
                    model_dir.display()
                )));
            }
        }

        let session = Session::builder()
            .map_err(model_error)?
            .commit_from_file(&model_path)
            .map_err(model_error)?;
        let uses_token_types = session
            .inputs()
            .iter()
            .any(|input| input.name() == "token_type_ids");

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(model_error)?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_len,
                ..Default::default()
            }))
            .map_err(model_error)?;
        tokenizer.with_padding(Some(PaddingParams::default()));

        let config: Value = serde_json::from_str(
            &std::fs::read_to_string(&config_path).map_err(model_error)?,
        )
        .map_err(|e| OracleError::JsonError(e.to_string()))?;
        let labels = parse_id2label(&config);

        info!(
            model = %model_path.display(),
            labels = ?labels,
            max_len,
            "loaded classification model"
        );
        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            labels,
            uses_token_types,
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    fn label_for(&self, class: usize) -> String {
        self.labels
            .get(class)
            .cloned()
            .unwrap_or_else(|| format!("LABEL_{}", class))
    }
}

#[async_trait]
impl ClassificationOracle for OnnxOracle {
    async fn classify(&self, texts: &[String]) -> Result<Vec<ScoreSet>, OracleError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let batch_size = texts.len();
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(model_error)?;

        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);

        // Flat [batch_size, seq_len] inputs.
        let mut input_ids = vec![0i64; batch_size * seq_len];
        let mut attention_mask = vec![0i64; batch_size * seq_len];
        let mut token_type_ids = vec![0i64; batch_size * seq_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let offset = i * seq_len;
            for (j, &id) in encoding.get_ids().iter().enumerate() {
                input_ids[offset + j] = id as i64;
            }
            for (j, &mask) in encoding.get_attention_mask().iter().enumerate() {
                attention_mask[offset + j] = mask as i64;
            }
            for (j, &tid) in encoding.get_type_ids().iter().enumerate() {
                token_type_ids[offset + j] = tid as i64;
            }
        }

        let shape = [batch_size as i64, seq_len as i64];
        let ids_tensor =
            Tensor::from_array((shape, input_ids.into_boxed_slice())).map_err(model_error)?;
        let mask_tensor =
            Tensor::from_array((shape, attention_mask.into_boxed_slice())).map_err(model_error)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| OracleError::ModelError("session lock poisoned".to_string()))?;

        let outputs = if self.uses_token_types {
            let type_tensor = Tensor::from_array((shape, token_type_ids.into_boxed_slice()))
                .map_err(model_error)?;
            session.run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
                "token_type_ids" => type_tensor,
            ])
        } else {
            session.run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
            ])
        }
        .map_err(model_error)?;

        // Logits: [batch_size, num_labels].
        let (output_shape, logits) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(model_error)?;
        let dims: &[i64] = output_shape;
        if dims.len() != 2 || dims[0] as usize != batch_size || dims[1] <= 0 {
            return Err(OracleError::ModelError(format!(
                "unexpected output shape: {dims:?}, expected [{batch_size}, num_labels]"
            )));
        }
        let num_labels = dims[1] as usize;

        let sets: Vec<ScoreSet> = logits
            .chunks(num_labels)
            .map(|row| {
                ScoreSet::new(
                    softmax(row)
                        .into_iter()
                        .enumerate()
                        .map(|(class, p)| ScoreEntry::new(self.label_for(class), p))
                        .collect(),
                )
            })
            .collect();

        debug!(windows = batch_size, seq_len, "[ORACLE] onnx batch classified");
        Ok(sets)
    }

    fn name(&self) -> &str {
        "onnx"
    }
}

/// Label names ordered by class index from a HuggingFace `config.json`.
fn parse_id2label(config: &Value) -> Vec<String> {
    let Some(map) = config.get("id2label").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut pairs: Vec<(usize, String)> = map
        .iter()
        .filter_map(|(k, v)| Some((k.parse().ok()?, v.as_str()?.to_string())))
        .collect();
    pairs.sort_by_key(|(idx, _)| *idx);

    let len = pairs.last().map(|(idx, _)| idx + 1).unwrap_or(0);
    let mut labels: Vec<String> = (0..len).map(|i| format!("LABEL_{}", i)).collect();
    for (idx, label) in pairs {
        labels[idx] = label;
    }
    labels
}

fn softmax(logits: &[f32]) -> Vec<f64> {
    let max = logits
        .iter()
        .copied()
        .fold(f32::NEG_INFINITY, f32::max) as f64;
    let exps: Vec<f64> = logits.iter().map(|&l| (l as f64 - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    if sum > 0.0 {
        exps.into_iter().map(|e| e / sum).collect()
    } else {
        exps
    }
}
