//! Per-document transforms plugged into the dispatcher.

use crate::{
    cleaning::CleaningPipeline,
    dispatch::{Document, DocumentTransform, RenderedFile, TransformError},
    ocr::OcrClient,
    qna::{QnaError, QnaGenerator, QnaItem, format_txt},
};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// Runs documents through the OCR provider.
pub struct OcrTransform {
    client: Arc<dyn OcrClient>,
}

impl OcrTransform {
    /// Create a transform backed by `client`.
    pub fn new(client: Arc<dyn OcrClient>) -> Self {
        Self { client }
    }
}

/// Check that the bytes really are of the type the extension claims.
fn validate_signature(document: &Document) -> Result<(), TransformError> {
    let invalid = |reason: &str| TransformError::InvalidDocument {
        name: document.name.clone(),
        reason: reason.to_string(),
    };
    if document.content.is_empty() {
        return Err(invalid("file is empty"));
    }
    let expected = match document.extension().as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        _ => return Err(invalid("unsupported file extension")),
    };
    let detected = infer::get(&document.content).map(|kind| kind.mime_type());
    if detected == Some(expected) {
        Ok(())
    } else {
        Err(invalid("content does not match its file extension"))
    }
}

#[async_trait]
impl DocumentTransform for OcrTransform {
    type Output = String;

    fn label(&self) -> &'static str {
        "ocr"
    }

    fn accepted_extensions(&self) -> &'static [&'static str] {
        &["pdf", "png", "jpg", "jpeg"]
    }

    async fn apply(&self, document: &Document) -> Result<String, TransformError> {
        validate_signature(document)?;
        self.client
            .extract_text(document, &document.mime_type())
            .await
            .map_err(|error| TransformError::Upstream {
                name: document.name.clone(),
                reason: error.to_string(),
            })
    }

    fn render(&self, text: &String) -> Vec<RenderedFile> {
        vec![RenderedFile::new(".txt", text.as_bytes())]
    }
}

/// Result of cleaning one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanOutcome {
    /// Characters in the input.
    pub original_length: usize,
    /// Characters in the cleaned text.
    pub cleaned_length: usize,
    /// Cleaned text.
    pub text: String,
}

impl CleanOutcome {
    /// Clean `text` with `pipeline`, recording both lengths.
    pub fn from_text(pipeline: &CleaningPipeline, text: &str) -> Self {
        let cleaned = pipeline.clean_text(text);
        Self {
            original_length: text.chars().count(),
            cleaned_length: cleaned.chars().count(),
            text: cleaned,
        }
    }
}

/// Cleans text documents.
pub struct CleanTransform {
    pipeline: CleaningPipeline,
}

impl CleanTransform {
    /// Create a transform using `pipeline`.
    pub fn new(pipeline: CleaningPipeline) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl DocumentTransform for CleanTransform {
    type Output = CleanOutcome;

    fn label(&self) -> &'static str {
        "cleaned"
    }

    fn accepted_extensions(&self) -> &'static [&'static str] {
        &["txt", "md"]
    }

    async fn apply(&self, document: &Document) -> Result<CleanOutcome, TransformError> {
        Ok(CleanOutcome::from_text(&self.pipeline, document.text()?))
    }

    fn render(&self, outcome: &CleanOutcome) -> Vec<RenderedFile> {
        vec![RenderedFile::new("_cleaned.txt", outcome.text.as_bytes())]
    }
}

/// Generates questions from text documents.
pub struct QnaTransform {
    generator: QnaGenerator,
    num_questions: usize,
    batch_size: usize,
}

impl QnaTransform {
    /// Create a transform producing `num_questions` per document in batches of `batch_size`.
    pub fn new(generator: QnaGenerator, num_questions: usize, batch_size: usize) -> Self {
        Self {
            generator,
            num_questions,
            batch_size,
        }
    }
}

#[async_trait]
impl DocumentTransform for QnaTransform {
    type Output = Vec<QnaItem>;

    fn label(&self) -> &'static str {
        "qna"
    }

    fn accepted_extensions(&self) -> &'static [&'static str] {
        &["txt", "md"]
    }

    async fn apply(&self, document: &Document) -> Result<Vec<QnaItem>, TransformError> {
        let text = document.text()?;
        self.generator
            .generate(text, self.num_questions, self.batch_size)
            .await
            .map_err(|error| match error {
                QnaError::EmptyText | QnaError::InvalidParameter(_) => {
                    TransformError::InvalidDocument {
                        name: document.name.clone(),
                        reason: error.to_string(),
                    }
                }
                QnaError::NothingGenerated { .. } => TransformError::Upstream {
                    name: document.name.clone(),
                    reason: error.to_string(),
                },
            })
    }

    fn render(&self, items: &Vec<QnaItem>) -> Vec<RenderedFile> {
        // String-keyed maps and plain structs always serialize.
        let json = serde_json::to_vec_pretty(items).unwrap_or_default();
        vec![
            RenderedFile::new("_QA.json", json),
            RenderedFile::new("_QA.txt", format_txt(items)),
        ]
    }
}
