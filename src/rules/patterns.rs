//! Canonical SQL injection signatures for rule-based detection.
//!
//! The table below unifies the signature lists that accumulated across
//! earlier deployments into one ordered, documented set. Order matters:
//! rules are evaluated top to bottom and the first match wins.
//!
//! Two signatures seen in older lists are excluded on purpose: a bare `;`
//! and a bare `concat(`. Both fire constantly on legitimate queries and
//! ordinary prose, so keeping them would trade precision for nothing the
//! remaining rules do not already catch.

use lazy_static::lazy_static;
use regex::Regex;

/// A single attack-signature definition.
#[derive(Debug, Clone)]
pub struct RuleDef {
    /// Stable identity, reported as `rule:<id>` in decisions.
    pub id: &'static str,
    /// Regex over the trimmed query text. All patterns match
    /// case-insensitively via an inline `(?i)`.
    pub pattern: &'static str,
    /// What the signature detects.
    pub description: &'static str,
}

/// The canonical ordered rule table.
pub static CANONICAL_RULES: &[RuleDef] = &[
    RuleDef {
        id: "or_tautology",
        pattern: r"(?i)\bor\s+(?:1\s*=\s*1\b|'1'\s*=\s*'1'?)",
        description: "Boolean tautology (OR 1=1, bare or quoted)",
    },
    RuleDef {
        id: "trailing_comment",
        pattern: r"(--|#)\s*$",
        description: "Line comment truncating the rest of the statement",
    },
    RuleDef {
        id: "union_select",
        pattern: r"(?i)\bunion\s+(?:all\s+)?select\b",
        description: "UNION-based result injection",
    },
    RuleDef {
        id: "select_password",
        pattern: r"(?i)\bselect\s+password\b",
        description: "Credential column harvesting",
    },
    RuleDef {
        id: "drop_table",
        pattern: r"(?i)\bdrop\s+table\b",
        description: "Destructive DDL",
    },
    RuleDef {
        id: "delete_from",
        pattern: r"(?i)\bdelete\s+from\b",
        description: "Destructive DML (row deletion)",
    },
    RuleDef {
        id: "insert_into",
        pattern: r"(?i)\binsert\s+into\b",
        description: "Injected row insertion",
    },
    RuleDef {
        id: "update_set",
        pattern: r"(?i)\bupdate\s+\S+\s+set\b",
        description: "Injected row mutation (UPDATE <table> SET)",
    },
    RuleDef {
        id: "sleep_probe",
        pattern: r"(?i)\bsleep\s*\(",
        description: "Time-based blind probe (SLEEP)",
    },
    RuleDef {
        id: "benchmark_probe",
        pattern: r"(?i)\bbenchmark\s*\(",
        description: "Time-based blind probe (BENCHMARK)",
    },
    RuleDef {
        id: "waitfor_delay",
        pattern: r"(?i)\bwaitfor\s+delay\b",
        description: "Time-based blind probe (T-SQL WAITFOR)",
    },
    RuleDef {
        id: "xp_cmdshell",
        pattern: r"(?i)\bxp_cmdshell\b",
        description: "Command execution via SQL Server xp_cmdshell",
    },
    RuleDef {
        id: "information_schema",
        pattern: r"(?i)\binformation_schema\b",
        description: "Schema enumeration probe",
    },
];

lazy_static! {
    /// Compiled canonical rules, in table order.
    pub static ref COMPILED_CANONICAL: Vec<(Regex, &'static RuleDef)> = {
        CANONICAL_RULES
            .iter()
            .filter_map(|r| Regex::new(r.pattern).ok().map(|re| (re, r)))
            .collect()
    };
}
