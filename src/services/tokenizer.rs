// Tokenizer Service
// Encodes documents to token ids and decodes window slices back to text

use std::path::Path;
use thiserror::Error;
use tokenizers::Tokenizer;
use tracing::info;

#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("Failed to load tokenizer from {path}: {message}")]
    Load { path: String, message: String },
    #[error("Failed to configure tokenizer: {0}")]
    Configure(String),
    #[error("Encoding failed: {0}")]
    Encode(String),
    #[error("Decoding failed: {0}")]
    Decode(String),
}

/// Token encode/decode collaborator used by the windower.
///
/// `decode(encode(text)[a..b])` must yield text the oracle can re-tokenize,
/// with special tokens stripped.
pub trait TokenCodec: Send + Sync {
    fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizerError>;
    fn decode(&self, ids: &[u32]) -> Result<String, TokenizerError>;
}

impl<T: TokenCodec + ?Sized> TokenCodec for Box<T> {
    fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizerError> {
        (**self).encode(text)
    }

    fn decode(&self, ids: &[u32]) -> Result<String, TokenizerError> {
        (**self).decode(ids)
    }
}

/// HuggingFace `tokenizer.json` backed codec.
///
/// Truncation and padding are switched off when the tokenizer is built, so
/// `encode` always returns the full sequence regardless of what the model
/// was trained with.
pub struct HfTokenizer {
    inner: Tokenizer,
}

impl HfTokenizer {
    pub fn from_file(path: &Path) -> Result<Self, TokenizerError> {
        let inner = Tokenizer::from_file(path).map_err(|e| TokenizerError::Load {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let tokenizer = Self::from_tokenizer(inner)?;
        info!(path = %path.display(), "tokenizer.loaded");
        Ok(tokenizer)
    }

    pub fn from_tokenizer(mut inner: Tokenizer) -> Result<Self, TokenizerError> {
        inner
            .with_truncation(None)
            .map_err(|e| TokenizerError::Configure(e.to_string()))?;
        inner.with_padding(None);
        Ok(Self { inner })
    }

    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }
}

impl TokenCodec for HfTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizerError> {
        let encoding = self
            .inner
            .encode(text, true)
            .map_err(|e| TokenizerError::Encode(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32]) -> Result<String, TokenizerError> {
        self.inner
            .decode(ids, true)
            .map_err(|e| TokenizerError::Decode(e.to_string()))
    }
}
