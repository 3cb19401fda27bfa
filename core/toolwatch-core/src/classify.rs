//! Command-line → tool id classification.
//!
//! Rules are evaluated top-down and the first match wins:
//!
//! 1. Every taxonomy key, in taxonomy order (exact tool id substring).
//! 2. Broader keywords mapped onto a specific tool id.
//! 3. Fallback: [`UNKNOWN_TOOL_ID`].
//!
//! All matching is case-insensitive substring matching on the full command
//! line. Classification is a pure function of its input and this table.

use once_cell::sync::Lazy;

use crate::taxonomy;

pub const UNKNOWN_TOOL_ID: &str = "unknown";

const KEYWORD_RULES: &[(&str, &str)] = &[
    ("github", "mcp-server-github"),
    ("playwright", "playwright-mcp-server"),
    ("filesystem", "mcp-server-filesystem"),
    ("hotnews", "mcp-server-hotnews"),
];

/// One row of the rule table. `pattern` is stored lower-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRule {
    pub pattern: String,
    pub tool_id: String,
}

impl ClassificationRule {
    pub fn new(pattern: &str, tool_id: &str) -> Self {
        Self {
            pattern: pattern.to_lowercase(),
            tool_id: tool_id.to_string(),
        }
    }

    /// `lowered` must already be lower-cased.
    pub fn matches(&self, lowered: &str) -> bool {
        lowered.contains(&self.pattern)
    }
}

static RULES: Lazy<Vec<ClassificationRule>> = Lazy::new(|| {
    let exact = taxonomy::all()
        .iter()
        .map(|descriptor| ClassificationRule::new(&descriptor.id, &descriptor.id));
    let keywords = KEYWORD_RULES
        .iter()
        .map(|(pattern, tool_id)| ClassificationRule::new(pattern, tool_id));
    exact.chain(keywords).collect()
});

/// The rule table, in evaluation order.
pub fn rules() -> &'static [ClassificationRule] {
    &RULES
}

/// Maps a command line to a tool id, or [`UNKNOWN_TOOL_ID`].
pub fn classify(command_line: &str) -> &'static str {
    let lowered = command_line.to_lowercase();
    rules()
        .iter()
        .find(|rule| rule.matches(&lowered))
        .map(|rule| rule.tool_id.as_str())
        .unwrap_or(UNKNOWN_TOOL_ID)
}
