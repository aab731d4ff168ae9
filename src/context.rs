//! Shared, immutable service state handed to request handlers.

use crate::{
    cleaning::{BadWords, CleanOptions, CleaningPipeline},
    config::Config,
    ocr::{MistralOcrClient, OcrClient, OcrError},
    qna::{GeminiClient, GenerationSettings, LlmClient, LlmError, QnaGenerator},
};
use std::{path::PathBuf, sync::Arc};
use thiserror::Error;
use time::OffsetDateTime;

/// Errors raised while assembling the service context.
#[derive(Debug, Error)]
pub enum ContextError {
    /// The extra bad-word file could not be read.
    #[error("Failed to load bad words from {path}: {source}")]
    BadWords {
        /// Configured path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The OCR client could not be built.
    #[error(transparent)]
    Ocr(#[from] OcrError),
    /// The language model client could not be built.
    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// Configuration plus the clients derived from it.
///
/// Upstream clients are optional: a capability without an API key stays unconfigured and its
/// routes answer with `503`.
#[derive(Clone)]
pub struct ServiceContext {
    config: Arc<Config>,
    ocr: Option<Arc<dyn OcrClient>>,
    llm: Option<Arc<dyn LlmClient>>,
    bad_words: Arc<BadWords>,
    started_at: OffsetDateTime,
}

impl ServiceContext {
    /// Context with the bundled bad-word list and no upstream clients.
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            ocr: None,
            llm: None,
            bad_words: Arc::new(BadWords::bundled()),
            started_at: OffsetDateTime::now_utc(),
        }
    }

    /// Build the context from configuration, creating clients for every configured key.
    pub fn from_config(config: Config) -> Result<Self, ContextError> {
        let bad_words = BadWords::load(config.badwords_path.as_deref()).map_err(|source| {
            ContextError::BadWords {
                path: config.badwords_path.clone().unwrap_or_default(),
                source,
            }
        })?;

        let ocr = match config.mistral_api_key.as_deref() {
            Some(key) => Some(Arc::new(MistralOcrClient::new(
                config.mistral_base_url.as_str(),
                key,
                config.ocr_model.as_str(),
                config.http_timeout(),
            )?) as Arc<dyn OcrClient>),
            None => None,
        };
        let llm = match config.gemini_api_key.as_deref() {
            Some(key) => Some(Arc::new(GeminiClient::new(
                config.gemini_base_url.as_str(),
                key,
                config.qna_model.as_str(),
                config.http_timeout(),
            )?) as Arc<dyn LlmClient>),
            None => None,
        };

        tracing::info!(
            ocr_configured = ocr.is_some(),
            qna_configured = llm.is_some(),
            bad_words = bad_words.len(),
            "Service context ready"
        );

        Ok(Self {
            bad_words: Arc::new(bad_words),
            ocr,
            llm,
            ..Self::new(config)
        })
    }

    /// Replace the OCR client.
    pub fn with_ocr_client(mut self, client: Arc<dyn OcrClient>) -> Self {
        self.ocr = Some(client);
        self
    }

    /// Replace the language model client.
    pub fn with_llm_client(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(client);
        self
    }

    /// Replace the bad-word list.
    pub fn with_bad_words(mut self, bad_words: BadWords) -> Self {
        self.bad_words = Arc::new(bad_words);
        self
    }

    /// Loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// OCR client, when configured.
    pub fn ocr_client(&self) -> Option<Arc<dyn OcrClient>> {
        self.ocr.clone()
    }

    /// Language model client, when configured.
    pub fn llm_client(&self) -> Option<Arc<dyn LlmClient>> {
        self.llm.clone()
    }

    /// Question generator over the configured language model.
    pub fn qna_generator(&self) -> Option<QnaGenerator> {
        self.llm_client()
            .map(|llm| QnaGenerator::new(llm, GenerationSettings::from_config(&self.config)))
    }

    /// Cleaning pipeline for `options`, sharing the loaded bad-word list.
    pub fn cleaning_pipeline(&self, options: CleanOptions) -> CleaningPipeline {
        CleaningPipeline::new(options, Arc::clone(&self.bad_words))
    }

    /// Moment the context was created.
    pub fn started_at(&self) -> OffsetDateTime {
        self.started_at
    }
}
