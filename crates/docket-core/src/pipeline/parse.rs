//! Shared helpers for pulling a JSON object out of an LLM response.
//!
//! Models are instructed to answer with a single JSON object, but in
//! practice wrap it in markdown fences or prose. The extraction policy
//! is: fenced ```json block first, then the outermost brace span.

use once_cell::sync::Lazy;
use regex::Regex;

static JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)```json\s*(.*?)```").expect("fence regex is valid"));

/// Extract the most plausible JSON object substring from a response.
///
/// Returns `None` when the response contains neither a fenced block nor
/// a brace-delimited span. The returned string is not validated; callers
/// parse it and apply their own stage policy on failure.
pub fn extract_json_object(response: &str) -> Option<String> {
    if let Some(caps) = JSON_FENCE.captures(response) {
        let inner = caps[1].trim();
        if !inner.is_empty() {
            return Some(inner.to_string());
        }
    }

    let first = response.find('{')?;
    let last = response.rfind('}')?;
    if first < last {
        Some(response[first..=last].to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_fenced_block() {
        let response = "Here you go:\n```json\n{\"doc_type\": \"invoice\"}\n```\nDone.";
        assert_eq!(
            extract_json_object(response).as_deref(),
            Some("{\"doc_type\": \"invoice\"}")
        );
    }

    #[test]
    fn fence_is_case_insensitive() {
        let response = "```JSON\n{\"a\": 1}\n```";
        assert_eq!(extract_json_object(response).as_deref(), Some("{\"a\": 1}"));
    }

    #[test]
    fn falls_back_to_brace_span() {
        let response = "The answer is {\"fields\": [\"date\"]} as requested.";
        assert_eq!(
            extract_json_object(response).as_deref(),
            Some("{\"fields\": [\"date\"]}")
        );
    }

    #[test]
    fn brace_span_covers_nested_objects() {
        let response = "{\"a\": {\"b\": 1}} trailing";
        assert_eq!(
            extract_json_object(response).as_deref(),
            Some("{\"a\": {\"b\": 1}}")
        );
    }

    #[test]
    fn no_json_returns_none() {
        assert_eq!(extract_json_object("I could not read the document."), None);
        assert_eq!(extract_json_object(""), None);
    }
}
