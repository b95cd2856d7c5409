//! Drug vocabulary index: synonym -> canonical name resolution.
//!
//! Builds an in-memory lookup from the DrugBank-derived vocabulary TSV and
//! resolves free-text drug mentions by exact whole-token match. Build once;
//! read-only afterwards, so an `Arc<DrugVocabulary>` is safe to share across
//! concurrent resolve calls without locking.

use std::collections::HashMap;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::info;

use pharmakon_common::{PharmakonError, Result};

lazy_static! {
    static ref WORD_TOKEN: Regex = Regex::new(r"\b\w+\b").expect("static word-token regex");
}

/// Synonym map built from the reference vocabulary.
///
/// Precedence is load-order dependent and deliberate: the canonical pass runs
/// over the whole table before any synonym insertion, and within each pass
/// the first writer wins. A synonym can therefore never shadow a canonical
/// name, and earlier synonyms win over later duplicates.
#[derive(Debug)]
pub struct DrugVocabulary {
    /// lowercased term -> canonical display name.
    synonym_map: HashMap<String, String>,
    n_canonical: usize,
}

impl DrugVocabulary {
    /// Load the vocabulary TSV. Columns: `drug_name`, `synonyms`
    /// (pipe-joined), `drugbank_id`. Missing file is `ResourceNotFound`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PharmakonError::ResourceNotFound(format!(
                "drug vocabulary table: {}",
                path.display()
            )));
        }
        let tsv = std::fs::read_to_string(path)?;
        Self::from_tsv(&tsv)
    }

    /// Build from TSV content (testing / offline use).
    pub fn from_tsv(tsv: &str) -> Result<Self> {
        // Column order in the cleaned vocabulary export:
        // 0 drug_name, 1 synonyms (pipe-separated), 2 drugbank_id
        let rows: Vec<Vec<&str>> = tsv
            .lines()
            .skip(1)
            .filter(|l| !l.trim().is_empty())
            .map(|l| l.split('\t').collect())
            .collect();

        let mut synonym_map: HashMap<String, String> = HashMap::new();
        let mut n_canonical = 0usize;

        // Canonical pass first: every canonical maps to itself and can never
        // be shadowed by anything inserted later.
        for row in &rows {
            let name = row.first().copied().unwrap_or("").trim();
            if name.is_empty() {
                continue;
            }
            let key = name.to_lowercase();
            if !synonym_map.contains_key(&key) {
                synonym_map.insert(key, name.to_string());
                n_canonical += 1;
            }
        }

        // Synonym pass: insert only unclaimed keys.
        for row in &rows {
            let name = row.first().copied().unwrap_or("").trim();
            if name.is_empty() {
                continue;
            }
            let synonyms = row.get(1).copied().unwrap_or("");
            for syn in synonyms.replace(" | ", "|").split('|') {
                let key = syn.trim().to_lowercase();
                if key.is_empty() || synonym_map.contains_key(&key) {
                    continue;
                }
                synonym_map.insert(key, name.to_string());
            }
        }

        info!(
            canonical = n_canonical,
            entries = synonym_map.len(),
            "Drug vocabulary built"
        );
        Ok(Self {
            synonym_map,
            n_canonical,
        })
    }

    /// Extract drug mentions from a query and normalize them to canonical
    /// names. Exact whole-token matching only; result is sorted and
    /// deduplicated.
    pub fn resolve(&self, query: &str) -> Vec<String> {
        let lowered = query.to_lowercase();
        let mut found: Vec<String> = WORD_TOKEN
            .find_iter(&lowered)
            .filter_map(|token| self.synonym_map.get(token.as_str()).cloned())
            .collect();
        found.sort();
        found.dedup();
        found
    }

    /// Canonical name for a single term, if known.
    pub fn lookup(&self, term: &str) -> Option<&str> {
        self.synonym_map
            .get(&term.trim().to_lowercase())
            .map(String::as_str)
    }

    /// Number of distinct canonical drugs loaded.
    pub fn n_canonical(&self) -> usize {
        self.n_canonical
    }

    /// Number of lookup entries (canonicals plus synonyms).
    pub fn n_entries(&self) -> usize {
        self.synonym_map.len()
    }
}
