//! Rule-based first-stage detection.
//!
//! A [`RuleSet`] is an ordered list of compiled attack signatures. Matching
//! walks the list and stops at the first hit, so a query is attributed to
//! exactly one rule and evaluation is deterministic for a given set.
//!
//! The built-in set lives in [`patterns::CANONICAL_RULES`]. Deployments can
//! swap in their own list with [`RuleSet::from_file`]; the file replaces the
//! canonical set wholesale, and the file's order is the evaluation order.

pub mod patterns;

use std::path::Path;

use regex::Regex;
use serde::Deserialize;

use crate::error::{Result, ShieldError};

/// One rule with its compiled pattern.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    /// Stable identity, reported as `rule:<id>`.
    pub id: String,
    /// Pattern source text.
    pub pattern: String,
    /// What the rule detects.
    pub description: String,
    regex: Regex,
}

/// A rule hit, borrowing from the set that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleMatch<'a> {
    /// Identity of the rule that fired.
    pub id: &'a str,
    /// Its pattern source text.
    pub pattern: &'a str,
}

/// A rule entry as written in a rules file.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleEntry {
    /// Stable identity, reported as `rule:<id>`.
    pub id: String,
    /// Regex over the trimmed query text.
    pub pattern: String,
    /// What the rule detects.
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct RulesFile {
    #[serde(default)]
    rules: Vec<RuleEntry>,
}

/// An ordered, first-match-wins set of attack signatures.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// The built-in canonical rule set.
    pub fn canonical() -> Self {
        let rules = patterns::COMPILED_CANONICAL
            .iter()
            .map(|(regex, def)| CompiledRule {
                id: def.id.to_string(),
                pattern: def.pattern.to_string(),
                description: def.description.to_string(),
                regex: regex.clone(),
            })
            .collect();
        Self { rules }
    }

    /// Load a replacement rule set from a TOML file.
    ///
    /// The file holds `[[rules]]` entries with `id`, `pattern`, and an
    /// optional `description`. Entry order becomes evaluation order. An
    /// empty file yields an empty set, which disables the rule stage.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ShieldError::Config(format!(
                "failed to read rules file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        let file: RulesFile = toml::from_str(&content)?;
        Self::from_entries(file.rules)
    }

    /// Compile a rule set from entries, preserving their order.
    pub fn from_entries(entries: Vec<RuleEntry>) -> Result<Self> {
        let mut rules = Vec::with_capacity(entries.len());
        for entry in entries {
            let regex = Regex::new(&entry.pattern).map_err(|e| {
                ShieldError::Config(format!("invalid pattern for rule '{}': {e}", entry.id))
            })?;
            rules.push(CompiledRule {
                id: entry.id,
                pattern: entry.pattern,
                description: entry.description,
                regex,
            });
        }
        Ok(Self { rules })
    }

    /// Test the query against the set in order; first hit wins.
    ///
    /// Pure and infallible: empty input simply matches nothing.
    pub fn first_match(&self, query: &str) -> Option<RuleMatch<'_>> {
        self.rules
            .iter()
            .find(|rule| rule.regex.is_match(query))
            .map(|rule| RuleMatch {
                id: &rule.id,
                pattern: &rule.pattern,
            })
    }

    /// Iterate the rules in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = &CompiledRule> {
        self.rules.iter()
    }

    /// Number of rules in the set.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the set is empty (rule stage disabled).
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::canonical()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_canonical_set_matches_table() {
        let set = RuleSet::canonical();
        assert_eq!(set.len(), patterns::CANONICAL_RULES.len());
        assert!(!set.is_empty());
    }

    #[test]
    fn test_first_match_prefers_earlier_rule() {
        let set = RuleSet::canonical();
        // Matches both or_tautology and trailing_comment; order decides.
        let hit = set.first_match("1 OR 1=1 --").unwrap();
        assert_eq!(hit.id, "or_tautology");
    }

    #[test]
    fn test_no_match_on_benign_query() {
        let set = RuleSet::canonical();
        assert!(set.first_match("SELECT name FROM users WHERE id = 42").is_none());
    }

    #[test]
    fn test_empty_and_whitespace_input_match_nothing() {
        let set = RuleSet::canonical();
        assert!(set.first_match("").is_none());
        assert!(set.first_match("   \t  ").is_none());
    }

    #[test]
    fn test_rules_file_replaces_canonical_set() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[[rules]]
id = "exec_probe"
pattern = '(?i)\bexec\s*\('
description = "Stored procedure execution"

[[rules]]
id = "drop_table"
pattern = '(?i)\bdrop\s+table\b'
"#
        )
        .unwrap();

        let set = RuleSet::from_file(file.path()).unwrap();
        assert_eq!(set.len(), 2);

        let hit = set.first_match("EXEC('whoami')").unwrap();
        assert_eq!(hit.id, "exec_probe");

        // Canonical-only signatures no longer fire.
        assert!(set.first_match("1 UNION SELECT password FROM users").is_none());
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let entries = vec![RuleEntry {
            id: "broken".to_string(),
            pattern: "([".to_string(),
            description: String::new(),
        }];
        let err = RuleSet::from_entries(entries).unwrap_err();
        assert!(matches!(err, ShieldError::Config(_)));
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_missing_rules_file_is_config_error() {
        let err = RuleSet::from_file("/nonexistent/rules.toml").unwrap_err();
        assert!(matches!(err, ShieldError::Config(_)));
    }

    #[test]
    fn test_empty_rules_file_disables_stage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# no rules here").unwrap();

        let set = RuleSet::from_file(file.path()).unwrap();
        assert!(set.is_empty());
        assert!(set.first_match("1 OR 1=1").is_none());
    }
}
