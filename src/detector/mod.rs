//! Verdict resolution: rules first, model second, one decision out.
//!
//! [`Detector::resolve`] never fails. The rule stage is pure and the model
//! stage absorbs its own errors, so every query turns into a well-formed
//! [`Decision`] whose `reason` is one of exactly three forms: `rule:<id>`,
//! `ml`, or `model_error`.
//!
//! Rule verdicts carry a fixed confidence of 1.0. That value is a sentinel
//! meaning "signature hit, not negotiable", kept for compatibility with the
//! decisions consumers already parse; it is not a calibrated probability.

use std::fmt;

use serde::Serialize;

use crate::model::{ClassifierResult, Label, QueryClassifier, Source};
use crate::rules::RuleSet;

/// Why a decision carries the label it does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    /// A signature rule fired; carries the rule id.
    Rule(String),
    /// The statistical model classified the query.
    Ml,
    /// The model stage failed; the fallback policy chose the label.
    ModelError,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::Rule(id) => write!(f, "rule:{id}"),
            Reason::Ml => f.write_str("ml"),
            Reason::ModelError => f.write_str("model_error"),
        }
    }
}

impl Serialize for Reason {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The resolved verdict for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    /// Final label.
    pub label: Label,
    /// Confidence, when the producing stage has one.
    pub confidence: Option<f32>,
    /// Which rule or stage produced the label.
    pub reason: Reason,
}

impl From<ClassifierResult> for Decision {
    fn from(result: ClassifierResult) -> Self {
        let reason = match result.source {
            Source::Rule(id) => Reason::Rule(id),
            Source::Model => Reason::Ml,
            Source::Fallback => Reason::ModelError,
        };
        Self {
            label: result.label,
            confidence: result.confidence,
            reason,
        }
    }
}

/// Two-stage verdict resolver.
///
/// Holds the rule set and the injected model stage. Both are read-only
/// after construction, so one detector is shared across all requests.
pub struct Detector {
    rules: RuleSet,
    classifier: Box<dyn QueryClassifier>,
}

impl Detector {
    /// Build a detector from a rule set and a model stage.
    pub fn new(rules: RuleSet, classifier: Box<dyn QueryClassifier>) -> Self {
        Self { rules, classifier }
    }

    /// Resolve a query to a decision. Infallible.
    ///
    /// The query is trimmed, checked against the rules in order, and only
    /// handed to the model stage when no rule matches.
    pub fn resolve(&self, query: &str) -> Decision {
        let query = query.trim();

        if let Some(hit) = self.rules.first_match(query) {
            tracing::debug!("rule {} matched", hit.id);
            return Decision::from(ClassifierResult::rule(hit.id));
        }

        Decision::from(self.classifier.classify(query))
    }

    /// The active rule set.
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    /// Test double that returns a canned result and counts invocations.
    struct StubClassifier {
        result: ClassifierResult,
        calls: Arc<AtomicUsize>,
    }

    impl StubClassifier {
        fn new(result: ClassifierResult) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    result,
                    calls: Arc::clone(&calls),
                },
                calls,
            )
        }
    }

    impl QueryClassifier for StubClassifier {
        fn classify(&self, _query: &str) -> ClassifierResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn detector_with(result: ClassifierResult) -> (Detector, Arc<AtomicUsize>) {
        let (stub, calls) = StubClassifier::new(result);
        (Detector::new(RuleSet::canonical(), Box::new(stub)), calls)
    }

    #[test]
    fn test_rule_match_short_circuits_model_stage() {
        let (detector, calls) =
            detector_with(ClassifierResult::model(Label::Safe, Some(0.9)));

        let decision = detector.resolve("SELECT * FROM users WHERE id=1 OR 1=1");
        assert_eq!(decision.label, Label::Sqli);
        assert_eq!(decision.confidence, Some(1.0));
        assert_eq!(decision.reason, Reason::Rule("or_tautology".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_every_canonical_rule_produces_rule_reason() {
        let (detector, calls) =
            detector_with(ClassifierResult::model(Label::Safe, Some(0.9)));

        for query in [
            "1 OR 1=1",
            "admin'--",
            "1 UNION SELECT null",
            "x; DROP TABLE users",
            "DELETE FROM audit",
            "INSERT INTO users VALUES (1)",
            "UPDATE accounts SET balance=0",
            "1 AND sleep(10)",
            "exec xp_cmdshell('net user')",
            "select * from information_schema.columns",
        ] {
            let decision = detector.resolve(query);
            assert_eq!(decision.label, Label::Sqli, "query {query:?}");
            assert_eq!(decision.confidence, Some(1.0), "query {query:?}");
            assert!(
                decision.reason.to_string().starts_with("rule:"),
                "query {query:?} got {}",
                decision.reason
            );
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unmatched_query_goes_to_model_stage() {
        let (detector, calls) =
            detector_with(ClassifierResult::model(Label::Safe, Some(0.83)));

        let decision = detector.resolve("SELECT name FROM users WHERE id = 42");
        assert_eq!(decision.label, Label::Safe);
        assert_eq!(decision.confidence, Some(0.83));
        assert_eq!(decision.reason, Reason::Ml);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_model_sqli_verdict_is_copied() {
        let (detector, _) = detector_with(ClassifierResult::model(Label::Sqli, Some(0.97)));

        let decision = detector.resolve("casually suspicious but unmatched text");
        assert_eq!(decision.label, Label::Sqli);
        assert_eq!(decision.confidence, Some(0.97));
        assert_eq!(decision.reason, Reason::Ml);
    }

    #[test]
    fn test_fallback_result_becomes_model_error() {
        let (detector, _) = detector_with(ClassifierResult::fallback(Label::Safe));

        let decision = detector.resolve("anything at all");
        assert_eq!(decision.label, Label::Safe);
        assert_eq!(decision.confidence, None);
        assert_eq!(decision.reason, Reason::ModelError);
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let (detector, _) = detector_with(ClassifierResult::model(Label::Safe, Some(0.7)));

        let query = "borderline but benign";
        let first = detector.resolve(query);
        let second = detector.resolve(query);
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_and_whitespace_queries_resolve() {
        let (detector, calls) =
            detector_with(ClassifierResult::model(Label::Safe, Some(0.6)));

        for query in ["", "   ", "\t\n"] {
            let decision = detector.resolve(query);
            assert_eq!(decision.label, Label::Safe);
            assert_eq!(decision.reason, Reason::Ml);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_queries_are_trimmed_before_rule_matching() {
        let (detector, _) = detector_with(ClassifierResult::model(Label::Safe, None));

        // trailing_comment anchors at end of string; trailing spaces must
        // not defeat it
        let decision = detector.resolve("  admin'--   ");
        assert_eq!(decision.reason, Reason::Rule("trailing_comment".to_string()));
    }

    #[test]
    fn test_decision_serialization_shape() {
        let decision = Decision::from(ClassifierResult::rule("union_select"));
        let value = serde_json::to_value(&decision).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "label": "sqli",
                "confidence": 1.0,
                "reason": "rule:union_select"
            })
        );

        let decision = Decision::from(ClassifierResult::fallback(Label::Sqli));
        let value = serde_json::to_value(&decision).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "label": "sqli",
                "confidence": null,
                "reason": "model_error"
            })
        );
    }
}
