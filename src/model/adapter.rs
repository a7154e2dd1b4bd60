//! The statistical classification stage.
//!
//! [`ModelAdapter`] owns the two pre-trained artifacts and turns raw query
//! text into a [`ClassifierResult`]. The adapter absorbs its own failures:
//! any transform or predict error is converted into a fallback result, so
//! callers never see an error from the model stage. Which label a fallback
//! carries is the [`FallbackPolicy`] decision.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::classifier::LinearClassifier;
use super::vectorizer::Vectorizer;
use super::{CLASSIFIER_FILE, VECTORIZER_FILE};
use crate::error::{Result, ShieldError};

/// Classification outcome for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    /// Benign query.
    Safe,
    /// SQL injection attempt.
    Sqli,
}

impl Label {
    /// Stable string form, also used as the persisted `status`.
    pub fn as_str(self) -> &'static str {
        match self {
            Label::Safe => "safe",
            Label::Sqli => "sqli",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which stage produced a [`ClassifierResult`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A signature rule fired; carries the rule id.
    Rule(String),
    /// The statistical model answered normally.
    Model,
    /// The model stage failed and the fallback policy answered.
    Fallback,
}

/// Per-stage classification output, folded into a decision by the detector.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierResult {
    /// Predicted label.
    pub label: Label,
    /// Winning class probability, when the model has a probability head.
    pub confidence: Option<f32>,
    /// Producing stage.
    pub source: Source,
}

impl ClassifierResult {
    /// Result for a signature rule hit. Rule matches are treated as
    /// certainties, hence the fixed 1.0 confidence.
    pub fn rule(id: &str) -> Self {
        Self {
            label: Label::Sqli,
            confidence: Some(1.0),
            source: Source::Rule(id.to_string()),
        }
    }

    /// Result from a successful model prediction.
    pub fn model(label: Label, confidence: Option<f32>) -> Self {
        Self {
            label,
            confidence,
            source: Source::Model,
        }
    }

    /// Result applied when the model stage failed.
    pub fn fallback(label: Label) -> Self {
        Self {
            label,
            confidence: None,
            source: Source::Fallback,
        }
    }
}

/// Label applied when the model stage fails.
///
/// Fail-open answers `safe` (availability over caution), fail-closed
/// answers `sqli` (caution over availability). Defaults to fail-open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackPolicy {
    /// Treat unclassifiable queries as benign.
    #[default]
    FailOpen,
    /// Treat unclassifiable queries as attacks.
    FailClosed,
}

impl FallbackPolicy {
    /// The label this policy assigns on model failure.
    pub fn fallback_label(self) -> Label {
        match self {
            FallbackPolicy::FailOpen => Label::Safe,
            FallbackPolicy::FailClosed => Label::Sqli,
        }
    }
}

impl fmt::Display for FallbackPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackPolicy::FailOpen => f.write_str("fail-open"),
            FallbackPolicy::FailClosed => f.write_str("fail-closed"),
        }
    }
}

impl FromStr for FallbackPolicy {
    type Err = ShieldError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fail-open" => Ok(FallbackPolicy::FailOpen),
            "fail-closed" => Ok(FallbackPolicy::FailClosed),
            other => Err(ShieldError::Config(format!(
                "unknown fallback policy '{other}' (expected fail-open or fail-closed)"
            ))),
        }
    }
}

/// The model-stage seam the detector calls through.
///
/// Implementations must be infallible: errors are converted into fallback
/// results before they cross this boundary.
pub trait QueryClassifier: Send + Sync {
    /// Classify one query.
    fn classify(&self, query: &str) -> ClassifierResult;
}

/// Interpret a raw model label tolerantly.
///
/// Class labels come from artifact metadata and vary across training
/// pipelines: numeric labels mean malicious when they equal 1, textual
/// labels when they are one of `sqli`, `malicious`, `true`, `yes`
/// (case-insensitive). Everything else is benign.
pub fn interpret_label(raw: &str) -> Label {
    let norm = raw.trim().to_lowercase();
    if let Ok(numeric) = norm.parse::<f64>() {
        return if (numeric - 1.0).abs() < f64::EPSILON {
            Label::Sqli
        } else {
            Label::Safe
        };
    }
    match norm.as_str() {
        "sqli" | "malicious" | "true" | "yes" => Label::Sqli,
        _ => Label::Safe,
    }
}

/// The statistical classifier behind the rule stage.
///
/// Artifacts are loaded once and shared read-only afterwards; the adapter
/// is `Send + Sync` and safe to call from any number of tasks.
#[derive(Debug, Clone)]
pub struct ModelAdapter {
    vectorizer: Vectorizer,
    classifier: LinearClassifier,
    policy: FallbackPolicy,
}

impl ModelAdapter {
    /// Compose an adapter from already-loaded artifacts.
    ///
    /// Fails when the vectorizer and classifier disagree on the feature
    /// space, which would otherwise surface as per-request errors.
    pub fn new(
        vectorizer: Vectorizer,
        classifier: LinearClassifier,
        policy: FallbackPolicy,
    ) -> Result<Self> {
        if vectorizer.n_features() != classifier.n_features() {
            return Err(ShieldError::ModelUnavailable(format!(
                "vectorizer has {} feature columns but classifier expects {}",
                vectorizer.n_features(),
                classifier.n_features()
            )));
        }
        Ok(Self {
            vectorizer,
            classifier,
            policy,
        })
    }

    /// Load both artifacts from a directory.
    ///
    /// This is the fail-fast startup step: any missing or malformed
    /// artifact is [`ShieldError::ModelUnavailable`] and the process should
    /// not begin serving.
    pub fn load(dir: impl AsRef<Path>, policy: FallbackPolicy) -> Result<Self> {
        let dir = dir.as_ref();
        let vectorizer = Vectorizer::load(dir.join(VECTORIZER_FILE))?;
        let classifier = LinearClassifier::load(dir.join(CLASSIFIER_FILE))?;
        let adapter = Self::new(vectorizer, classifier, policy)?;

        tracing::info!(
            "loaded model artifacts from {} ({} features, classes: {})",
            dir.display(),
            adapter.classifier.n_features(),
            adapter.classifier.classes().join(",")
        );
        Ok(adapter)
    }

    /// The configured fallback policy.
    pub fn policy(&self) -> FallbackPolicy {
        self.policy
    }

    fn try_classify(&self, query: &str) -> Result<(Label, Option<f32>)> {
        let features = self.vectorizer.transform(query)?;
        let (raw_label, confidence) = self.classifier.predict(&features)?;
        Ok((interpret_label(raw_label), confidence))
    }
}

impl QueryClassifier for ModelAdapter {
    fn classify(&self, query: &str) -> ClassifierResult {
        match self.try_classify(query) {
            Ok((label, confidence)) => ClassifierResult::model(label, confidence),
            Err(e) => {
                tracing::warn!("model stage failed ({e}), applying {} fallback", self.policy);
                ClassifierResult::fallback(self.policy.fallback_label())
            },
        }
    }
}
