//! # SQLShield - SQL Injection Detection
//!
//! Two-stage SQL injection detection combining deterministic signature rules
//! with a statistical text classifier, plus persistent decision logging and
//! an HTTP API.
//!
//! ## Features
//!
//! - **Signature rules**: ordered, first-match-wins regex patterns for known
//!   attack shapes (tautologies, stacked DDL/DML, comment truncation, timing
//!   probes, schema discovery)
//! - **Statistical classifier**: tf-idf n-gram vectorizer + linear model,
//!   loaded from portable artifacts (`vectorizer.json` + safetensors)
//! - **Fail-open / fail-closed**: explicit policy for labelling queries when
//!   the model stage cannot run
//! - **Decision log**: every verdict appended to SQLite, with aggregate
//!   counters derived from it
//! - **HTTP API**: `/check`, `/stats`, `/health` over Axum
//!
//! ## Pipeline
//!
//! ```text
//!  query ──> trim ──> [rule 1] ─ match ──> Decision { sqli, 1.0, rule:<id> }
//!                     [rule 2]
//!                        ...
//!                     [rule N]
//!                        │ no match
//!                        v
//!                     vectorize ──> classify ──> Decision { label, p, ml }
//!                        │ error
//!                        v
//!                     fallback policy ──> Decision { label, ∅, model_error }
//! ```
//!
//! Every query resolves to exactly one [`detector::Decision`]; the resolver
//! itself never fails.
//!
//! ### Decision reasons
//!
//! | Reason        | Produced by                  | Confidence            |
//! |---------------|------------------------------|-----------------------|
//! | `rule:<id>`   | First matching rule          | Always 1.0 (sentinel) |
//! | `ml`          | Statistical classifier       | Max class probability |
//! | `model_error` | Fallback policy after a fault| Absent                |
//!
//! ## Quick Start
//!
//! ### Rules plus model
//!
//! ```rust,ignore
//! use sqlshield::detector::Detector;
//! use sqlshield::model::{FallbackPolicy, ModelAdapter};
//! use sqlshield::rules::RuleSet;
//!
//! let adapter = ModelAdapter::load("artifacts", FallbackPolicy::FailOpen)?;
//! let detector = Detector::new(RuleSet::canonical(), Box::new(adapter));
//!
//! let decision = detector.resolve("SELECT * FROM users WHERE id=1 OR 1=1");
//! assert_eq!(decision.reason.to_string(), "rule:or_tautology");
//! ```
//!
//! ### Custom model stage
//!
//! The model stage is a trait, so tests and embedders can swap in their own:
//!
//! ```rust,ignore
//! use sqlshield::model::{ClassifierResult, Label, QueryClassifier};
//!
//! struct AllowEverything;
//!
//! impl QueryClassifier for AllowEverything {
//!     fn classify(&self, _query: &str) -> ClassifierResult {
//!         ClassifierResult::model(Label::Safe, Some(1.0))
//!     }
//! }
//! ```
//!
//! ## Modules
//!
//! - [`rules`]: signature rule set (built-in or file-loaded)
//! - [`model`]: vectorizer, linear classifier, and the fallback-wrapping adapter
//! - [`detector`]: verdict resolution
//! - [`storage`]: SQLite decision log
//! - [`server`]: HTTP API (Axum-based)
//! - [`config`]: layered configuration (TOML, environment, CLI)
//! - [`error`]: error types and result alias

pub mod config;
pub mod detector;
pub mod error;
pub mod model;
pub mod rules;
pub mod server;
pub mod storage;

// Re-exports for convenience
pub use config::Config;
pub use detector::{Decision, Detector, Reason};
pub use error::{Result, ShieldError};
pub use model::{
    interpret_label, ClassifierResult, FallbackPolicy, Label, ModelAdapter, QueryClassifier,
    Source,
};
pub use rules::{CompiledRule, RuleMatch, RuleSet};
pub use server::{AppState, ServerConfig};
pub use storage::{LogEntry, QueryLog, StatsSnapshot};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
