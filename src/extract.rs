//! Recovers the JSON array of records from free-text model output.
//!
//! Extraction is an ordered chain of strategies. Each strategy is total: it
//! returns `Some(array)` or `None` and never fails. The first hit wins.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::error::ScanError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// ```` ```json ... ``` ````
    JsonFence,
    /// Any fenced block.
    AnyFence,
    /// First `[ { ... } ]` span in the text.
    BareArray,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Strategy::JsonFence => "json_fence",
            Strategy::AnyFence => "any_fence",
            Strategy::BareArray => "bare_array",
        };
        write!(f, "{s}")
    }
}

pub const CHAIN: [Strategy; 3] = [Strategy::JsonFence, Strategy::AnyFence, Strategy::BareArray];

fn json_fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```[ \t]*(?i:json)[ \t]*\r?\n(.*?)```").expect("valid regex"))
}

fn any_fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```[^\n`]*\r?\n?(.*?)```").expect("valid regex"))
}

fn bare_array_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\[\s*\{.*\}\s*\]").expect("valid regex"))
}

fn parse_array(candidate: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(candidate.trim()) {
        Ok(v @ Value::Array(_)) => Some(v),
        _ => None,
    }
}

impl Strategy {
    /// Run this strategy against `text`. Total: never fails, only misses.
    pub fn apply(&self, text: &str) -> Option<Value> {
        match self {
            Strategy::JsonFence => json_fence_re()
                .captures_iter(text)
                .filter_map(|c| c.get(1))
                .find_map(|m| parse_array(m.as_str())),
            Strategy::AnyFence => any_fence_re()
                .captures_iter(text)
                .filter_map(|c| c.get(1))
                .find_map(|m| parse_array(m.as_str())),
            Strategy::BareArray => bare_array_re()
                .find(text)
                .and_then(|m| parse_array(m.as_str()).or_else(|| shrink_to_array(m.as_str()))),
        }
    }
}

/// The greedy span can swallow trailing prose that happens to end in `}]`.
/// Walk the closing brackets backwards until a prefix parses.
fn shrink_to_array(span: &str) -> Option<Value> {
    span.char_indices()
        .rev()
        .filter(|(_, c)| *c == ']')
        .skip(1)
        .find_map(|(i, _)| parse_array(&span[..=i]))
}

/// Extract the record array from completion text, or fail with a format error.
pub fn extract_array(text: &str) -> Result<Vec<Value>, ScanError> {
    for strategy in CHAIN {
        if let Some(Value::Array(items)) = strategy.apply(text) {
            debug!(strategy = %strategy, items = items.len(), "extracted record array");
            return Ok(items);
        }
    }
    Err(ScanError::Format(format!(
        "no JSON array found in completion ({} chars)",
        text.chars().count()
    )))
}
