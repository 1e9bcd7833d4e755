//! Query intent classification.
//!
//! A caller's stated or inferred intent governs how much surrounding source
//! is worth returning alongside a match: someone asking for an `overview`
//! wants file/symbol names, someone trying to `fix` something wants as much
//! of the offending function as reasonably fits in a snippet.

use serde::{Deserialize, Serialize};

/// Query intent, as accepted on the `search_code` tool surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    /// Wants a high-level map, not implementation detail.
    Overview,
    /// Debugging a failure; wants enough code to see the whole function.
    Fix,
    /// Understanding existing behavior without intending to change it.
    Analyze,
    /// Wants a conceptual explanation grounded in real code.
    Explain,
    /// About to change existing code.
    Modify,
    /// About to write new code following existing conventions.
    Create,
    /// No clear intent signal; balanced defaults.
    General,
}

impl QueryIntent {
    /// Classify a free-text query into an intent category using keyword
    /// heuristics. Checked in an order where more specific intents
    /// (debugging) are tried before generic ones that share vocabulary
    /// (`fix` also contains words that would otherwise read as `modify`).
    #[must_use]
    pub fn classify(query: &str) -> Self {
        let q = query.to_lowercase();

        if contains_any(&q, &["bug", "error", "fail", "crash", "broken", "exception", "debug", "trace", "issue"]) {
            return Self::Fix;
        }
        if contains_any(&q, &["create", "generate", "scaffold", "new file", "write a", "implement a"]) {
            return Self::Create;
        }
        if contains_any(&q, &["rename", "refactor", "move", "extract", "inline", "modify", "update", "change", "edit"]) {
            return Self::Modify;
        }
        if contains_any(&q, &["overview", "architecture", "module map", "structure of", "layout of"]) {
            return Self::Overview;
        }
        if contains_any(&q, &["how", "why", "explain", "understand", "describe", "works"]) {
            return Self::Explain;
        }
        if contains_any(&q, &["usages", "references", "callers", "who calls", "analyze", "review"]) {
            return Self::Analyze;
        }

        Self::General
    }

    /// Line budget for a returned snippet under this intent. Zero means
    /// metadata only (file path, symbol, line range) with no source text.
    #[must_use]
    pub fn snippet_line_budget(&self) -> usize {
        match self {
            Self::Fix => 80,
            Self::Analyze | Self::Explain => 40,
            Self::Modify | Self::Create => 20,
            Self::Overview | Self::General => 0,
        }
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_fix_before_modify_on_overlapping_vocabulary() {
        assert_eq!(QueryIntent::classify("fix the login bug"), QueryIntent::Fix);
    }

    #[test]
    fn classifies_explain_for_how_and_why_questions() {
        assert_eq!(QueryIntent::classify("how does authentication work?"), QueryIntent::Explain);
        assert_eq!(QueryIntent::classify("why is this crashing?"), QueryIntent::Fix);
    }

    #[test]
    fn classifies_create_for_new_code_requests() {
        assert_eq!(QueryIntent::classify("create a new API endpoint"), QueryIntent::Create);
    }

    #[test]
    fn classifies_modify_for_restructuring_requests() {
        assert_eq!(QueryIntent::classify("rename this function"), QueryIntent::Modify);
    }

    #[test]
    fn classifies_overview_for_architecture_requests() {
        assert_eq!(QueryIntent::classify("give me an overview of this module"), QueryIntent::Overview);
    }

    #[test]
    fn unmatched_query_is_general() {
        assert_eq!(QueryIntent::classify("authentication"), QueryIntent::General);
    }

    #[test]
    fn snippet_budgets_follow_intent() {
        assert_eq!(QueryIntent::Fix.snippet_line_budget(), 80);
        assert_eq!(QueryIntent::Analyze.snippet_line_budget(), 40);
        assert_eq!(QueryIntent::Explain.snippet_line_budget(), 40);
        assert_eq!(QueryIntent::Modify.snippet_line_budget(), 20);
        assert_eq!(QueryIntent::Create.snippet_line_budget(), 20);
        assert_eq!(QueryIntent::Overview.snippet_line_budget(), 0);
        assert_eq!(QueryIntent::General.snippet_line_budget(), 0);
    }
}
