// Detection Module
// Fake-news classification of arbitrarily long documents, organized into:
// - windowing: overlapping token windows sized for the classifier
// - quantize: probability to integer percentage
// - label_mapping: arbitrary classifier labels to REAL / FAKE
// - fusion: per-window score sets to one distribution and verdict
// - detector: the end-to-end pipeline and its runtime wiring

pub mod windowing;
pub mod quantize;
pub mod label_mapping;
pub mod fusion;
pub mod detector;

pub use windowing::{
    build_windows,
    token_windows,
    TokenWindows,
    Window,
    WindowError,
    WindowParams,
    WindowSpan,
    DEFAULT_MAX_LEN,
    DEFAULT_STRIDE,
};
pub use quantize::to_int_percent;
pub use label_mapping::{map_label, normalize_label, MappingRule};
pub use fusion::{decide, fuse_score_sets, FusedVerdict};
pub use detector::{
    build_detector,
    DetectionError,
    DocumentAnalysis,
    DynDetector,
    FakeNewsDetector,
    SetupError,
};
