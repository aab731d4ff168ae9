//! Batched question generation with retries and de-duplication.

use super::{QnaItem, llm::LlmClient, repair::clean_json_response};
use crate::config::Config;
use std::{collections::HashSet, sync::Arc, time::Duration};
use thiserror::Error;

/// Characters of source text included in a single prompt.
const PROMPT_TEXT_LIMIT: usize = 7000;

/// Errors raised while generating questions.
#[derive(Debug, Error)]
pub enum QnaError {
    /// The source text is empty or whitespace.
    #[error("Input text is empty; cannot generate Q&A")]
    EmptyText,
    /// A generation parameter is out of range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    /// Every batch failed or returned nothing usable.
    #[error("No Q&A could be generated from the provided text{}", describe_last_error(.last_error))]
    NothingGenerated {
        /// Most recent provider error, if any batch failed outright.
        last_error: Option<String>,
    },
}

/// Tuning knobs of the generation loop.
#[derive(Debug, Clone, Copy)]
pub struct GenerationSettings {
    /// Characters of text fed to each batch.
    pub chunk_size: usize,
    /// Attempts per batch.
    pub max_retries: usize,
    /// Pause between attempts of the same batch.
    pub retry_delay: Duration,
    /// Pause between consecutive batches.
    pub batch_delay: Duration,
}

impl GenerationSettings {
    /// Settings taken from the service configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.qna_chunk_size,
            max_retries: config.qna_max_retries,
            retry_delay: Duration::from_millis(config.qna_retry_delay_ms),
            batch_delay: Duration::from_millis(config.qna_batch_delay_ms),
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            chunk_size: 6000,
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
            batch_delay: Duration::from_secs(1),
        }
    }
}

/// Generates educational question/answer pairs from text through an [`LlmClient`].
#[derive(Clone)]
pub struct QnaGenerator {
    llm: Arc<dyn LlmClient>,
    settings: GenerationSettings,
}

impl QnaGenerator {
    /// Create a generator backed by `llm`.
    pub fn new(llm: Arc<dyn LlmClient>, settings: GenerationSettings) -> Self {
        Self { llm, settings }
    }

    /// Generate up to `num_questions` unique items, requesting `batch_size` per model call.
    ///
    /// Each batch reads a sliding window of the text, so later batches see later sections.
    /// Failed batches are retried and then skipped; the call fails only when nothing was
    /// produced at all.
    pub async fn generate(
        &self,
        text: &str,
        num_questions: usize,
        batch_size: usize,
    ) -> Result<Vec<QnaItem>, QnaError> {
        if text.trim().is_empty() {
            return Err(QnaError::EmptyText);
        }
        if num_questions == 0 {
            return Err(QnaError::InvalidParameter(
                "num_questions must be at least 1".into(),
            ));
        }
        if batch_size == 0 {
            return Err(QnaError::InvalidParameter(
                "batch_size must be at least 1".into(),
            ));
        }

        let chars: Vec<char> = text.chars().collect();
        let chunk_size = self.settings.chunk_size.clamp(1, chars.len());
        let batches = num_questions.div_ceil(batch_size);

        let mut items: Vec<QnaItem> = Vec::new();
        let mut seen = HashSet::new();
        let mut last_error = None;

        for batch in 1..=batches {
            if batch > 1 {
                tokio::time::sleep(self.settings.batch_delay).await;
            }

            let start = ((batch - 1) * chunk_size) % chars.len();
            let end = (start + chunk_size).min(chars.len());
            let chunk: String = chars[start..end].iter().collect();

            let generated = self
                .generate_batch(&chunk, batch, batch_size, &mut last_error)
                .await;
            let Some(generated) = generated else {
                tracing::warn!(batch, batches, "Skipping batch after exhausting retries");
                continue;
            };

            for value in generated {
                let mut item = match serde_json::from_value::<QnaItem>(value) {
                    Ok(item) => item,
                    Err(error) => {
                        tracing::debug!(batch, error = %error, "Skipping non-object item");
                        continue;
                    }
                };
                item.question = item.question.trim().to_string();
                if item.question.is_empty() {
                    continue;
                }
                if seen.insert(normalize_question(&item.question)) {
                    items.push(item);
                }
                if items.len() >= num_questions {
                    break;
                }
            }

            tracing::debug!(batch, batches, total = items.len(), "Generation batch complete");
            if items.len() >= num_questions {
                break;
            }
        }

        if items.is_empty() {
            return Err(QnaError::NothingGenerated { last_error });
        }
        items.truncate(num_questions);
        Ok(items)
    }

    async fn generate_batch(
        &self,
        chunk: &str,
        batch: usize,
        batch_size: usize,
        last_error: &mut Option<String>,
    ) -> Option<Vec<serde_json::Value>> {
        let prompt = build_prompt(chunk, batch_size);
        let attempts = self.settings.max_retries.max(1);
        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(self.settings.retry_delay).await;
            }
            match self.llm.generate(&prompt).await {
                Ok(raw) => match clean_json_response(&raw) {
                    Some(values) if !values.is_empty() => return Some(values),
                    _ => tracing::warn!(batch, attempt, "Model returned no usable JSON array"),
                },
                Err(error) => {
                    tracing::warn!(batch, attempt, %error, "Generation attempt failed");
                    *last_error = Some(error.to_string());
                }
            }
        }
        None
    }
}

fn describe_last_error(last_error: &Option<String>) -> String {
    last_error
        .as_deref()
        .map(|error| format!(" (last error: {error})"))
        .unwrap_or_default()
}

fn normalize_question(question: &str) -> String {
    question
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn build_prompt(chunk: &str, count: usize) -> String {
    let text: String = chunk.chars().take(PROMPT_TEXT_LIMIT).collect();
    format!(
        r#"You are an expert educational AI that generates detailed, high-quality academic Q&A.

TASK:
Generate {count} unique and non-repetitive question-answer pairs from the given Hindi or bilingual NCERT text.

Distribute evenly among these 5 types:
1. Multiple Choice Questions (MCQs)
2. Objective Questions (True/False, Fill in the Blanks, Match the Following)
3. Summarization Questions
4. Chain of Thought Questions
5. Logical Reasoning Questions

OUTPUT RULES:
- Return a valid JSON array only, no markdown, no text.
- Each object must follow one of these schemas:

For MCQs:
{{
  "type": "MCQ",
  "question": "string (Hindi or bilingual)",
  "options": ["Option A", "Option B", "Option C", "Option D"],
  "correct_answer": "string (exactly one of the options)",
  "explanation": "3-6 sentence explanation"
}}

For other types:
{{
  "type": "Objective" | "Summarization" | "Chain of Thought" | "Logical Reasoning",
  "question": "string",
  "answer": "detailed 4-8 sentence answer"
}}

RULES:
- Avoid exact duplicates.
- Semantically similar questions allowed if explanations differ.
- Maintain conceptual variety.
- Output clean JSON only.

Text:

{text}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qna::llm::LlmError;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    /// Replays canned responses and records prompts.
    struct ScriptedLlm {
        responses: Mutex<Vec<Result<String, LlmError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<Result<String, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into_iter().rev().collect()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().await.push(prompt.to_string());
            self.responses
                .lock()
                .await
                .pop()
                .unwrap_or_else(|| Ok("[]".into()))
        }
    }

    fn settings(chunk_size: usize) -> GenerationSettings {
        GenerationSettings {
            chunk_size,
            max_retries: 2,
            retry_delay: Duration::ZERO,
            batch_delay: Duration::ZERO,
        }
    }

    fn questions(items: &[QnaItem]) -> Vec<&str> {
        items.iter().map(|item| item.question.as_str()).collect()
    }

    #[tokio::test]
    async fn deduplicates_and_caps_results() {
        let llm = ScriptedLlm::new(vec![
            Ok(r#"[{"question":"What is X?","answer":"A"},{"question":"  what   is x? ","answer":"B"},{"question":"Why Y?","answer":"C"}]"#.into()),
            Ok(r#"```json
[{"question":"Why Y?"},{"question":"How Z?","type":"MCQ","options":["1","2"],"correct_answer":"1","explanation":"E"},{"question":""},{"question":"Extra?"}]
```"#.into()),
        ]);
        let generator = QnaGenerator::new(llm.clone(), settings(6000));

        let items = generator
            .generate("कुछ पाठ यहाँ है", 3, 2)
            .await
            .expect("items");

        assert_eq!(questions(&items), ["What is X?", "Why Y?", "How Z?"]);
        assert_eq!(items[2].options, Some(serde_json::json!(["1", "2"])));
        assert_eq!(llm.prompts.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn keeps_items_whatever_their_field_shapes() {
        let llm = ScriptedLlm::new(vec![Ok(r#"[
            {"type":"MCQ","question":"Map?","options":{"A":"x","B":"y"},"correct_answer":"A"},
            {"question":"Null?","options":null,"explanation":null},
            {"question":"Number?","answer":42},
            "not an object"
        ]"#
        .into())]);
        let generator = QnaGenerator::new(llm, settings(6000));

        let items = generator
            .generate("कुछ पाठ यहाँ है", 3, 3)
            .await
            .expect("items");

        assert_eq!(questions(&items), ["Map?", "Null?", "Number?"]);
        assert_eq!(items[2].display_answer(), "42");
    }

    #[tokio::test]
    async fn retries_failed_batches_then_skips_them() {
        let llm = ScriptedLlm::new(vec![
            Err(LlmError::Transport("down".into())),
            Ok("no json here".into()),
            Ok(r#"[{"question":"Second batch?","answer":"yes"}]"#.into()),
        ]);
        let generator = QnaGenerator::new(llm.clone(), settings(6000));

        let items = generator.generate("पाठ", 2, 1).await.expect("items");

        assert_eq!(questions(&items), ["Second batch?"]);
        assert_eq!(llm.prompts.lock().await.len(), 3);
    }

    #[tokio::test]
    async fn batches_slide_over_the_text() {
        let llm = ScriptedLlm::new(vec![
            Ok(r#"[{"question":"one"}]"#.into()),
            Ok(r#"[{"question":"two"}]"#.into()),
            Ok(r#"[{"question":"three"}]"#.into()),
        ]);
        let generator = QnaGenerator::new(llm.clone(), settings(4));

        generator.generate("aaaabbbbcc", 3, 1).await.expect("items");

        let prompts = llm.prompts.lock().await;
        assert!(prompts[0].trim_end().ends_with("aaaa"));
        assert!(prompts[1].trim_end().ends_with("bbbb"));
        assert!(prompts[2].trim_end().ends_with("cc"));
    }

    #[tokio::test]
    async fn prompt_text_is_truncated() {
        let llm = ScriptedLlm::new(vec![Ok(r#"[{"question":"q"}]"#.into())]);
        let generator = QnaGenerator::new(llm.clone(), settings(10_000));

        generator
            .generate(&"क".repeat(9000), 1, 1)
            .await
            .expect("items");

        let prompts = llm.prompts.lock().await;
        assert_eq!(prompts[0].matches('क').count(), PROMPT_TEXT_LIMIT);
    }

    #[tokio::test]
    async fn rejects_blank_text_and_zero_parameters() {
        let generator = QnaGenerator::new(ScriptedLlm::new(Vec::new()), settings(10));
        assert!(matches!(
            generator.generate("   ", 5, 5).await,
            Err(QnaError::EmptyText)
        ));
        assert!(matches!(
            generator.generate("text", 0, 5).await,
            Err(QnaError::InvalidParameter(_))
        ));
        assert!(matches!(
            generator.generate("text", 5, 0).await,
            Err(QnaError::InvalidParameter(_))
        ));
    }

    #[tokio::test]
    async fn reports_failure_when_nothing_generated() {
        let llm = ScriptedLlm::new(vec![
            Err(LlmError::UnexpectedStatus {
                status: 500,
                body: "boom".into(),
            }),
            Err(LlmError::UnexpectedStatus {
                status: 500,
                body: "boom".into(),
            }),
        ]);
        let generator = QnaGenerator::new(llm, settings(10));

        let error = generator.generate("text", 1, 1).await.expect_err("error");
        assert!(matches!(
            error,
            QnaError::NothingGenerated { last_error: Some(ref message) } if message.contains("500")
        ));
    }
}
