//! Query intent safety gate.
//!
//! Screens user queries before retrieval. Queries asking for dosage advice or
//! a diagnosis are refused; everything else passes through unchanged.

use regex::Regex;
use serde::Serialize;
use tracing::warn;

use pharmakon_common::{PharmakonError, Result};

/// Restricted concepts, matched case-insensitively as substrings.
pub const DEFAULT_UNSAFE_PATTERNS: &[&str] = &[
    "how much should i take",
    "dose",
    "dosage",
    "diagnose",
    "what do i have",
    "symptom checker",
];

/// Outcome of screening a single query.
#[derive(Debug, Clone, Serialize)]
pub struct IntentVerdict {
    pub valid: bool,
    pub reason: String,
}

/// Ordered pattern list compiled once; patterns are evaluated in declaration
/// order and the first hit decides the verdict.
#[derive(Debug)]
pub struct IntentFilter {
    patterns: Vec<(String, Regex)>,
}

impl IntentFilter {
    /// Compile a custom pattern list. An invalid pattern is
    /// `InvalidArgument`; partial filters are never constructed.
    pub fn new(patterns: &[&str]) -> Result<Self> {
        let mut compiled = Vec::with_capacity(patterns.len());
        for pat in patterns {
            let re = Regex::new(pat).map_err(|e| {
                PharmakonError::InvalidArgument(format!("unsafe-intent pattern {pat:?}: {e}"))
            })?;
            compiled.push((pat.to_string(), re));
        }
        Ok(Self { patterns: compiled })
    }

    /// Filter with the built-in restricted-concept list.
    pub fn with_defaults() -> Result<Self> {
        Self::new(DEFAULT_UNSAFE_PATTERNS)
    }

    /// Screen a query. The first matching pattern produces a refusal whose
    /// reason names the offending pattern.
    pub fn validate(&self, query: &str) -> IntentVerdict {
        let lowered = query.to_lowercase();
        for (pat, re) in &self.patterns {
            if re.is_match(&lowered) {
                warn!(pattern = %pat, "Query refused by intent filter");
                return IntentVerdict {
                    valid: false,
                    reason: format!(
                        "Safety Violation: Query contains restricted concepts ({pat}). \
                         This system is for interaction checking only, not dosage or diagnosis."
                    ),
                };
            }
        }
        IntentVerdict {
            valid: true,
            reason: "Safe".to_string(),
        }
    }
}
