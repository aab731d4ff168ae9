//! Recovery of JSON arrays from loosely formatted model output.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?:json)?").expect("code fence pattern"));
static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[\]}])").expect("trailing comma pattern"));

/// Extract the outermost JSON array from `raw`.
///
/// Code fences and typographic quotes are removed and everything outside the first `[` and the
/// last `]` is discarded. A second parse is attempted without trailing commas. Returns `None`
/// when no array can be recovered.
pub fn clean_json_response(raw: &str) -> Option<Vec<Value>> {
    if raw.trim().is_empty() {
        return None;
    }

    let unfenced = CODE_FENCE.replace_all(raw, "");
    let normalized = unfenced
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    let start = normalized.find('[')?;
    let end = normalized.rfind(']')?;
    if end < start {
        return None;
    }
    let candidate = normalized[start..=end].trim();

    match serde_json::from_str::<Value>(candidate) {
        Ok(value) => into_array(value),
        Err(_) => {
            let relaxed = TRAILING_COMMA.replace_all(candidate, "$1");
            match serde_json::from_str::<Value>(&relaxed) {
                Ok(value) => into_array(value),
                Err(error) => {
                    tracing::debug!(%error, "Model output is not a JSON array");
                    None
                }
            }
        }
    }
}

fn into_array(value: Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_fenced_arrays() {
        let raw = "```json\n[{\"question\": \"क्या?\"}]\n```";
        assert_eq!(
            clean_json_response(raw),
            Some(vec![json!({ "question": "क्या?" })])
        );
    }

    #[test]
    fn strips_surrounding_prose_and_trailing_commas() {
        let raw = "Here you go: [{\"question\": \"Q1\", \"options\": [\"a\", \"b\",],},] hope it helps";
        let items = clean_json_response(raw).expect("array");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["options"], json!(["a", "b"]));
    }

    #[test]
    fn curly_quotes_are_normalized() {
        let raw = "[{\u{201C}question\u{201D}: \u{201C}Q\u{201D}}]";
        assert_eq!(clean_json_response(raw), Some(vec![json!({ "question": "Q" })]));
    }

    #[test]
    fn rejects_missing_or_invalid_arrays() {
        assert_eq!(clean_json_response(""), None);
        assert_eq!(clean_json_response("{\"question\": \"Q\"}"), None);
        assert_eq!(clean_json_response("] nothing ["), None);
        assert_eq!(clean_json_response("[{\"question\": }]"), None);
    }
}
