// Document Detector
// Windowing → one batched oracle call → fusion, for a single document

use thiserror::Error;
use tracing::{info, warn};

use crate::models::{AggregatedDistribution, ClassificationOutcome, Verdict};
use crate::services::config_store::{AppConfig, ConfigStore, OracleKind};
use crate::services::providers::{get_api_key, ClassificationOracle, HttpOracle, OracleError};
use crate::services::tokenizer::{HfTokenizer, TokenCodec, TokenizerError};

use super::fusion::{decide, fuse_score_sets, FusedVerdict};
use super::label_mapping::MappingRule;
use super::windowing::{build_windows, Window, WindowParams};

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Tokenization failed: {0}")]
    Tokenizer(#[from] TokenizerError),
    #[error("Classification oracle failed: {0}")]
    Oracle(#[from] OracleError),
}

/// Result of analysing one document, including what the verdict was built from.
#[derive(Debug, Clone)]
pub struct DocumentAnalysis {
    pub outcome: ClassificationOutcome,
    pub window_count: usize,
    pub distribution: AggregatedDistribution,
    pub winning_label: Option<String>,
    pub rule: Option<MappingRule>,
}

impl DocumentAnalysis {
    fn empty_document() -> Self {
        Self {
            outcome: ClassificationOutcome::classified(Verdict::Real, 0),
            window_count: 0,
            distribution: AggregatedDistribution::default(),
            winning_label: None,
            rule: None,
        }
    }

    fn failed(error: &DetectionError) -> Self {
        Self {
            outcome: ClassificationOutcome::failed(error.to_string()),
            window_count: 0,
            distribution: AggregatedDistribution::default(),
            winning_label: None,
            rule: None,
        }
    }
}

struct FusedDocument {
    window_count: usize,
    distribution: AggregatedDistribution,
    fused: FusedVerdict,
}

/// Classifies arbitrarily long documents with a bounded-length oracle.
///
/// Holds no per-call state, so one detector can serve concurrent callers.
pub struct FakeNewsDetector<C, O> {
    codec: C,
    oracle: O,
    params: WindowParams,
}

impl<C, O> FakeNewsDetector<C, O>
where
    C: TokenCodec,
    O: ClassificationOracle,
{
    pub fn new(codec: C, oracle: O, params: WindowParams) -> Self {
        Self {
            codec,
            oracle,
            params,
        }
    }

    pub fn params(&self) -> WindowParams {
        self.params
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Decoded windows for `text`, in document order.
    pub fn windows(&self, text: &str) -> Result<Vec<Window>, TokenizerError> {
        build_windows(&self.codec, text, self.params)
    }

    /// Windows, one batched oracle call and fusion. `None` for a document
    /// with nothing to classify.
    async fn fuse_document(&self, text: &str) -> Result<Option<FusedDocument>, DetectionError> {
        let windows = self.windows(text)?;
        if windows.is_empty() {
            info!("[DETECT] empty document, nothing to classify");
            return Ok(None);
        }

        let window_count = windows.len();
        let texts: Vec<String> = windows.into_iter().map(|w| w.text).collect();
        let sets = self.oracle.classify(&texts).await?;
        if sets.len() != window_count {
            return Err(OracleError::BatchMismatch {
                expected: window_count,
                actual: sets.len(),
            }
            .into());
        }

        let distribution = fuse_score_sets(&sets);
        let fused = decide(&distribution);

        info!(
            windows = window_count,
            labels = distribution.len(),
            winner = %fused.winning_label,
            verdict = %fused.verdict,
            confidence = fused.confidence,
            rule = ?fused.rule,
            oracle = self.oracle.name(),
            "[DETECT] document classified"
        );

        Ok(Some(FusedDocument {
            window_count,
            distribution,
            fused,
        }))
    }

    /// Analyse a document, propagating tokenizer and oracle failures.
    pub async fn try_analyze_document(&self, text: &str) -> Result<DocumentAnalysis, DetectionError> {
        let Some(doc) = self.fuse_document(text).await? else {
            return Ok(DocumentAnalysis::empty_document());
        };

        Ok(DocumentAnalysis {
            outcome: ClassificationOutcome::classified(doc.fused.verdict, doc.fused.confidence),
            window_count: doc.window_count,
            distribution: doc.distribution,
            winning_label: Some(doc.fused.winning_label),
            rule: Some(doc.fused.rule),
        })
    }

    /// Analyse a document; failures become a `Failed` outcome with confidence 0.
    pub async fn analyze_document(&self, text: &str) -> DocumentAnalysis {
        match self.try_analyze_document(text).await {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!(error = %e, "[DETECT] classification failed");
                DocumentAnalysis::failed(&e)
            }
        }
    }

    pub async fn classify_document(&self, text: &str) -> ClassificationOutcome {
        self.analyze_document(text).await.outcome
    }

    /// `(verdict, confidence)` or the underlying error. An empty document
    /// is `(REAL, 0)`.
    pub async fn try_classify_document(&self, text: &str) -> Result<(Verdict, u8), DetectionError> {
        Ok(match self.fuse_document(text).await? {
            Some(doc) => (doc.fused.verdict, doc.fused.confidence),
            None => (Verdict::Real, 0),
        })
    }
}

/// Detector whose collaborators are chosen at runtime from configuration.
pub type DynDetector = FakeNewsDetector<Box<dyn TokenCodec>, Box<dyn ClassificationOracle>>;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("No tokenizer configured: set oracle.tokenizerPath or oracle.modelDir")]
    MissingTokenizer,
    #[error("The onnx oracle needs oracle.modelDir")]
    MissingModelDir,
    #[error("The onnx oracle is not available: rebuild with `--features onnx`")]
    OnnxDisabled,
    #[error(transparent)]
    Tokenizer(#[from] TokenizerError),
    #[error(transparent)]
    Oracle(#[from] OracleError),
}

/// Build a detector from configuration: the windowing tokenizer, the oracle
/// and the window parameters.
pub fn build_detector(
    config: &AppConfig,
    store: Option<&ConfigStore>,
) -> Result<DynDetector, SetupError> {
    let tokenizer_path = config
        .oracle
        .resolved_tokenizer_path()
        .ok_or(SetupError::MissingTokenizer)?;
    let codec: Box<dyn TokenCodec> = Box::new(HfTokenizer::from_file(&tokenizer_path)?);

    let params = config.windowing;
    let oracle: Box<dyn ClassificationOracle> = match config.oracle.kind {
        OracleKind::Http => Box::new(HttpOracle::from_config(
            &config.oracle,
            get_api_key(store),
            params.max_len(),
        )?),
        OracleKind::Onnx => build_onnx_oracle(config, params)?,
    };

    info!(
        oracle = oracle.name(),
        max_len = params.max_len(),
        stride = params.stride(),
        tokenizer = %tokenizer_path.display(),
        "[DETECT] detector ready"
    );
    Ok(FakeNewsDetector::new(codec, oracle, params))
}

#[cfg(feature = "onnx")]
fn build_onnx_oracle(
    config: &AppConfig,
    params: WindowParams,
) -> Result<Box<dyn ClassificationOracle>, SetupError> {
    let model_dir = config
        .oracle
        .model_dir
        .as_ref()
        .ok_or(SetupError::MissingModelDir)?;
    Ok(Box::new(crate::services::onnx_oracle::OnnxOracle::load(
        model_dir,
        params.max_len(),
    )?))
}

#[cfg(not(feature = "onnx"))]
fn build_onnx_oracle(
    config: &AppConfig,
    _params: WindowParams,
) -> Result<Box<dyn ClassificationOracle>, SetupError> {
    if config.oracle.model_dir.is_none() {
        return Err(SetupError::MissingModelDir);
    }
    Err(SetupError::OnnxDisabled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScoreSet;
    use crate::services::testing::{document_of, ScriptedOracle, WordCodec};
    use std::sync::Arc;

    fn detector(oracle: ScriptedOracle) -> FakeNewsDetector<WordCodec, ScriptedOracle> {
        FakeNewsDetector::new(WordCodec, oracle, WindowParams::default())
    }

    fn set(pairs: &[(&str, f64)]) -> ScoreSet {
        ScoreSet::from_pairs(pairs.iter().copied())
    }

    struct BrokenCodec;

    impl TokenCodec for BrokenCodec {
        fn encode(&self, _text: &str) -> Result<Vec<u32>, TokenizerError> {
            Err(TokenizerError::Encode("vocabulary missing".to_string()))
        }

        fn decode(&self, _ids: &[u32]) -> Result<String, TokenizerError> {
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn test_short_document_single_window() {
        let det = detector(ScriptedOracle::uniform(set(&[("REAL", 0.9), ("FAKE", 0.1)])));
        let analysis = det.analyze_document(&document_of(300)).await;

        assert_eq!(analysis.window_count, 1);
        assert_eq!(analysis.outcome, ClassificationOutcome::classified(Verdict::Real, 90));
        assert_eq!(det.oracle().call_count(), 1);
    }

    #[tokio::test]
    async fn test_long_document_windows_in_one_batch() {
        let det = detector(ScriptedOracle::uniform(set(&[("FAKE", 0.7), ("REAL", 0.3)])));
        let outcome = det.classify_document(&document_of(1000)).await;
        assert_eq!(outcome, ClassificationOutcome::classified(Verdict::Fake, 70));

        let oracle = det.oracle();
        assert_eq!(oracle.call_count(), 1);
        let batches = oracle.batches.lock().unwrap();
        let batch = &batches[0];
        assert_eq!(batch.len(), 3);
        assert!(batch[0].starts_with("t0 "));
        assert!(batch[1].starts_with("t256 "));
        assert!(batch[2].starts_with("t512 "));
        assert!(batch[2].ends_with(" t999"));
        assert_eq!(batch[2].split_whitespace().count(), 488);
    }

    #[tokio::test]
    async fn test_tied_windows_resolve_to_first_seen_label() {
        let det = detector(ScriptedOracle::once(vec![
            set(&[("FAKE", 0.8), ("REAL", 0.2)]),
            set(&[("FAKE", 0.2), ("REAL", 0.8)]),
        ]));
        // 600 tokens → windows at 0 and 256.
        let analysis = det.analyze_document(&document_of(600)).await;

        assert_eq!(analysis.window_count, 2);
        assert_eq!(analysis.distribution.get("FAKE"), Some(0.5));
        assert_eq!(analysis.distribution.get("REAL"), Some(0.5));
        assert_eq!(analysis.winning_label.as_deref(), Some("FAKE"));
        assert_eq!(analysis.outcome, ClassificationOutcome::classified(Verdict::Fake, 50));
    }

    #[tokio::test]
    async fn test_anonymous_labels_map_label_1_to_fake() {
        let det = detector(ScriptedOracle::uniform(set(&[("LABEL_0", 0.25), ("LABEL_1", 0.75)])));
        let analysis = det.analyze_document(&document_of(900)).await;

        assert_eq!(analysis.rule, Some(MappingRule::AnonymousHead));
        assert_eq!(analysis.outcome, ClassificationOutcome::classified(Verdict::Fake, 75));
    }

    #[tokio::test]
    async fn test_empty_and_blank_documents_skip_oracle() {
        let det = detector(ScriptedOracle::uniform(set(&[("FAKE", 1.0)])));
        for text in ["", "   ", "\n\t \n"] {
            let analysis = det.analyze_document(text).await;
            assert_eq!(analysis.window_count, 0);
            assert_eq!(analysis.outcome, ClassificationOutcome::classified(Verdict::Real, 0));
        }
        assert_eq!(det.oracle().call_count(), 0);
    }

    #[tokio::test]
    async fn test_oracle_failure_is_reported_not_raised() {
        let det = detector(ScriptedOracle::failing("model overloaded"));
        let outcome = det.classify_document(&document_of(1200)).await;

        assert!(outcome.is_failure());
        assert_eq!(outcome.confidence(), 0);
        assert!(outcome.verdict().is_none());
        match outcome {
            ClassificationOutcome::Failed { reason } => assert!(reason.contains("model overloaded")),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_try_classify_returns_fused_verdict() {
        let det = detector(ScriptedOracle::uniform(set(&[("LABEL_0", 0.35), ("LABEL_1", 0.65)])));
        assert_eq!(
            det.try_classify_document(&document_of(700)).await.unwrap(),
            (Verdict::Fake, 65)
        );
        assert_eq!(det.try_classify_document("  ").await.unwrap(), (Verdict::Real, 0));
        assert_eq!(det.oracle().call_count(), 1);
    }

    #[tokio::test]
    async fn test_try_classify_propagates_oracle_error() {
        let det = detector(ScriptedOracle::failing("boom"));
        let err = det.try_classify_document(&document_of(10)).await.unwrap_err();
        assert!(matches!(err, DetectionError::Oracle(OracleError::ApiError { status: 503, .. })));
    }

    #[tokio::test]
    async fn test_short_oracle_response_fails_document() {
        let det = detector(ScriptedOracle::once(vec![set(&[("REAL", 1.0)])]));
        let analysis = det.analyze_document(&document_of(1000)).await;
        assert!(analysis.outcome.is_failure());
        assert!(analysis.distribution.is_empty());
    }

    #[tokio::test]
    async fn test_empty_score_sets_default_to_real_zero() {
        let det = detector(ScriptedOracle::uniform(ScoreSet::default()));
        let result = det.try_classify_document(&document_of(50)).await.unwrap();
        assert_eq!(result, (Verdict::Real, 0));
    }

    #[tokio::test]
    async fn test_tokenizer_failure_is_reported() {
        let det = FakeNewsDetector::new(
            BrokenCodec,
            ScriptedOracle::uniform(set(&[("REAL", 1.0)])),
            WindowParams::default(),
        );
        let outcome = det.classify_document("some text").await;
        assert!(outcome.is_failure());
        assert_eq!(det.oracle().call_count(), 0);
    }

    #[test]
    fn test_build_detector_requires_tokenizer() {
        let err = build_detector(&AppConfig::default(), None).err().unwrap();
        assert!(matches!(err, SetupError::MissingTokenizer));
    }

    #[test]
    fn test_build_detector_reports_missing_tokenizer_file() {
        let mut config = AppConfig::default();
        config.oracle.tokenizer_path = Some("/nonexistent/tokenizer.json".into());
        let err = build_detector(&config, None).err().unwrap();
        assert!(matches!(err, SetupError::Tokenizer(TokenizerError::Load { .. })));
    }

    #[tokio::test]
    async fn test_concurrent_documents_are_independent() {
        let det = Arc::new(detector(ScriptedOracle::uniform(set(&[("REAL", 0.6), ("FAKE", 0.4)]))));

        let mut handles = Vec::new();
        for n in [10usize, 700, 2000, 0] {
            let det = Arc::clone(&det);
            handles.push(tokio::spawn(async move {
                (n, det.classify_document(&document_of(n)).await)
            }));
        }

        for handle in handles {
            let (n, outcome) = handle.await.unwrap();
            let expected = if n == 0 {
                ClassificationOutcome::classified(Verdict::Real, 0)
            } else {
                ClassificationOutcome::classified(Verdict::Real, 60)
            };
            assert_eq!(outcome, expected, "document of {} tokens", n);
        }
        assert_eq!(det.oracle().call_count(), 3);
    }
}
