//! Result types returned by the worker and carried over the RPC boundary.
//!
//! A batch result is positional: `outcomes[i]` always describes input `i`.
//! A failed entry is a [`PageOutcome::Failed`] in its own slot, never a
//! shorter list.

use crate::error::PageError;
use serde::{Deserialize, Serialize};

/// Result for one entry of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PageOutcome {
    /// The entry converted; `markdown` is the engine output.
    Converted { markdown: String },
    /// The entry failed; its siblings are unaffected.
    Failed { error: PageError },
}

impl PageOutcome {
    pub fn is_converted(&self) -> bool {
        matches!(self, PageOutcome::Converted { .. })
    }

    /// Markdown for a converted entry, `None` for a failed one.
    pub fn markdown(&self) -> Option<&str> {
        match self {
            PageOutcome::Converted { markdown } => Some(markdown),
            PageOutcome::Failed { .. } => None,
        }
    }

    /// Render this outcome as a plain string for the gateway's JSON array.
    ///
    /// Failed entries become a Markdown comment naming the 1-based page, so
    /// the array keeps one string per page and renders as nothing.
    pub fn into_markdown_or_marker(self) -> String {
        match self {
            PageOutcome::Converted { markdown } => markdown,
            PageOutcome::Failed { error } => failure_marker(&error),
        }
    }
}

/// Prefix of the comment emitted in place of a failed page.
pub const FAILURE_MARKER_PREFIX: &str = "<!-- pdf2md:page-failed";

fn failure_marker(error: &PageError) -> String {
    // `--` is not allowed inside an HTML comment.
    let mut reason = error.reason().replace('\n', " ");
    while reason.contains("--") {
        reason = reason.replace("--", "- -");
    }
    format!(
        "{} page={}: {} -->",
        FAILURE_MARKER_PREFIX,
        error.index() + 1,
        reason
    )
}

/// Aggregate numbers for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    /// Entries submitted.
    pub total: usize,
    /// Entries that produced Markdown.
    pub converted: usize,
    /// Entries that failed.
    pub failed: usize,
    /// Wall-clock time spent in the worker.
    pub duration_ms: u64,
}

/// Full result of `convert_batch`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutput {
    /// One outcome per input, in input order.
    pub outcomes: Vec<PageOutcome>,
    pub stats: BatchStats,
}

impl BatchOutput {
    /// Build the output and its counters from ordered outcomes.
    pub fn from_outcomes(outcomes: Vec<PageOutcome>, duration_ms: u64) -> Self {
        let converted = outcomes.iter().filter(|o| o.is_converted()).count();
        let stats = BatchStats {
            total: outcomes.len(),
            converted,
            failed: outcomes.len() - converted,
            duration_ms,
        };
        Self { outcomes, stats }
    }

    /// 1-based numbers of the entries that failed.
    pub fn failed_pages(&self) -> Vec<usize> {
        self.outcomes
            .iter()
            .enumerate()
            .filter(|(_, o)| !o.is_converted())
            .map(|(i, _)| i + 1)
            .collect()
    }

    /// One string per entry, failed entries rendered as comment markers.
    pub fn into_markdown_list(self) -> Vec<String> {
        self.outcomes
            .into_iter()
            .map(PageOutcome::into_markdown_or_marker)
            .collect()
    }
}
