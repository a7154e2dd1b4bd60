//! Statistical classification from pre-built model artifacts.
//!
//! The service never trains anything. It consumes two artifacts produced by
//! an offline pipeline and treats them as read-only after startup:
//!
//! | File | Contents |
//! |------|----------|
//! | `vectorizer.json` | n-gram analyzer settings, vocabulary, optional idf |
//! | `classifier.safetensors` | dense layer weights + class-label metadata |
//!
//! [`ModelAdapter::load`] is the fail-fast entry point: it reads both files,
//! validates them against each other, and returns an adapter ready to serve
//! requests. See [`adapter`] for the failure semantics at request time.

pub mod adapter;
pub mod classifier;
pub mod vectorizer;

pub use adapter::{
    interpret_label, ClassifierResult, FallbackPolicy, Label, ModelAdapter, QueryClassifier,
    Source,
};
pub use classifier::{LinearClassifier, Probability};
pub use vectorizer::{Analyzer, Features, Norm, Vectorizer};

/// File name of the vectorizer artifact inside the artifacts directory.
pub const VECTORIZER_FILE: &str = "vectorizer.json";

/// File name of the classifier artifact inside the artifacts directory.
pub const CLASSIFIER_FILE: &str = "classifier.safetensors";

/// Default artifacts directory, relative to the working directory.
pub const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";
