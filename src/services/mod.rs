// NewsCheck Core Services

pub mod text_processor;
pub mod config_store;
pub mod tokenizer;
pub mod providers;
pub mod detection;
#[cfg(feature = "onnx")]
pub mod onnx_oracle;

#[cfg(test)]
pub(crate) mod testing;

pub use text_processor::*;
pub use config_store::*;
pub use tokenizer::*;
pub use providers::*;
#[cfg(feature = "onnx")]
pub use onnx_oracle::OnnxOracle;

pub use detection::{
    build_detector,
    build_windows,
    decide,
    fuse_score_sets,
    map_label,
    normalize_label,
    to_int_percent,
    DetectionError,
    DocumentAnalysis,
    DynDetector,
    FakeNewsDetector,
    SetupError,
    WindowParams,
};
