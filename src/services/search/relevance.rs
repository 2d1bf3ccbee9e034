//! Relevance Filter
//!
//! Prunes results relative to the best score: anything below
//! `factor * max(score)` is dropped, but a non-empty input never produces
//! an empty output.

use serde::{Deserialize, Serialize};
use tracing::debug;

use mailpilot_core::{CoreError, CoreResult};

use super::adapter::SearchResult;

/// Observability report for one filter pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterReport {
    pub kept_count: usize,
    pub dropped_count: usize,
    pub threshold: f32,
    /// (min, max) over the input; None for empty input
    pub score_range: Option<(f32, f32)>,
}

/// Kept results plus the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterOutcome {
    pub kept: Vec<SearchResult>,
    pub report: FilterReport,
}

/// Check a relevance factor.
pub fn validate_factor(factor: f32) -> CoreResult<()> {
    if factor > 0.0 && factor <= 1.0 {
        Ok(())
    } else {
        Err(CoreError::validation(format!(
            "relevance factor must be in (0, 1], got {}",
            factor
        )))
    }
}

/// Apply the score-relative threshold. Input order is preserved.
pub fn filter(results: Vec<SearchResult>, factor: f32) -> CoreResult<FilterOutcome> {
    validate_factor(factor)?;

    if results.is_empty() {
        return Ok(FilterOutcome {
            kept: Vec::new(),
            report: FilterReport {
                kept_count: 0,
                dropped_count: 0,
                threshold: 0.0,
                score_range: None,
            },
        });
    }

    let total = results.len();
    let (min, max) = results.iter().fold((f32::MAX, f32::MIN), |(lo, hi), r| {
        (lo.min(r.relevance_score), hi.max(r.relevance_score))
    });
    let threshold = factor * max;

    let best_index = results
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.relevance_score.total_cmp(&b.relevance_score))
        .map(|(i, _)| i)
        .unwrap_or(0);

    let mut kept: Vec<SearchResult> = Vec::with_capacity(total);
    let mut best: Option<SearchResult> = None;
    for (i, result) in results.into_iter().enumerate() {
        if i == best_index {
            best = Some(result.clone());
        }
        if result.relevance_score >= threshold {
            kept.push(result);
        }
    }
    if kept.is_empty() {
        kept.extend(best);
    }

    let report = FilterReport {
        kept_count: kept.len(),
        dropped_count: total - kept.len(),
        threshold,
        score_range: Some((min, max)),
    };
    debug!(
        kept = report.kept_count,
        dropped = report.dropped_count,
        threshold = report.threshold,
        min_score = min,
        max_score = max,
        "relevance filter: applied"
    );

    Ok(FilterOutcome { kept, report })
}
