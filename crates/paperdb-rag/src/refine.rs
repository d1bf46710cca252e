//! Question decomposition into short searchable statements.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use paperdb_core::config::RefineFallback;
use paperdb_core::traits::{CompletionParams, Completer};
use paperdb_core::{Error, Result};

use crate::prompts;

pub struct QueryRefiner {
    completer: Arc<dyn Completer>,
    fallback: RefineFallback,
    max_tokens: usize,
}

impl QueryRefiner {
    pub fn new(completer: Arc<dyn Completer>, fallback: RefineFallback) -> Self {
        Self { completer, fallback, max_tokens: 512 }
    }

    /// Returns an ordered, non-empty list of distinct queries.
    pub async fn refine(&self, question: &str) -> Result<Vec<String>> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::Input("question is empty".into()));
        }
        let params = CompletionParams { temperature: 0.0, max_tokens: self.max_tokens };
        let raw = self.completer.complete(&prompts::refine(question), params).await?;
        match parse_queries(&raw) {
            Ok(queries) => {
                info!(count = queries.len(), ?queries, "refined question");
                Ok(queries)
            }
            Err(e) if self.fallback == RefineFallback::Question => {
                warn!(error = %e, "refiner output unusable, searching with the question itself");
                Ok(vec![question.to_string()])
            }
            Err(e) => Err(e),
        }
    }
}

/// Parse model output into queries.
///
/// Accepts a JSON array of strings, optionally wrapped in a Markdown code
/// fence. Entries are trimmed, blanks dropped and duplicates removed
/// ignoring case and whitespace runs, keeping the first occurrence.
pub fn parse_queries(raw: &str) -> Result<Vec<String>> {
    let body = strip_fences(raw);
    let entries: Vec<String> = serde_json::from_str(body).map_err(|e| {
        Error::MalformedOutput(format!("expected a JSON array of strings ({e}): {}", preview(raw)))
    })?;
    let mut seen = HashSet::new();
    let queries: Vec<String> = entries
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .filter(|q| seen.insert(dedup_key(q)))
        .collect();
    if queries.is_empty() {
        return Err(Error::MalformedOutput("refiner returned no queries".into()));
    }
    Ok(queries)
}

fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string (```json) up to the first newline
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn dedup_key(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn preview(raw: &str) -> String {
    const MAX: usize = 120;
    let mut out: String = raw.chars().take(MAX).collect();
    if raw.chars().count() > MAX {
        out.push_str("...");
    }
    out
}
