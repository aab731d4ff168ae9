//! Educational question/answer generation.
//!
//! [`QnaGenerator`] drives an [`LlmClient`] in batches over a sliding window of the source
//! text, repairs the loosely formatted JSON the model returns and de-duplicates questions.

pub mod generator;
pub mod llm;
pub mod repair;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub use generator::{GenerationSettings, QnaError, QnaGenerator};
pub use llm::{GeminiClient, LlmClient, LlmError};
pub use repair::clean_json_response;

/// One generated question with its answer material.
///
/// Models vary the shape of their answers, so text fields accept numbers and booleans, `null`
/// counts as absent and `options` keeps whatever list or map the model produced. Unknown
/// fields are preserved in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QnaItem {
    /// Question category, e.g. `MCQ` or `Summarization`.
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<String>,
    /// Question text.
    #[serde(default, deserialize_with = "lenient_question")]
    pub question: String,
    /// Choices for multiple-choice questions, as a list or a label-to-choice map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
    /// The correct choice for multiple-choice questions.
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub correct_answer: Option<String>,
    /// Explanation of the correct choice.
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub explanation: Option<String>,
    /// Free-form answer for non multiple-choice questions.
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub answer: Option<String>,
    /// Any other fields returned by the model.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl QnaItem {
    /// Text shown under the question in plain-text listings: the explanation, else the answer.
    pub fn display_answer(&self) -> &str {
        self.explanation
            .as_deref()
            .or(self.answer.as_deref())
            .unwrap_or_default()
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    })
}

fn lenient_question<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_text(deserializer)?.unwrap_or_default())
}

/// Render items as a numbered plain-text listing.
pub fn format_txt(items: &[QnaItem]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            format!(
                "{}. {}\n{}\n",
                index + 1,
                item.question,
                item.display_answer()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
