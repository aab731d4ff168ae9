use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_MISTRAL_BASE_URL: &str = "https://api.mistral.ai";
const DEFAULT_OCR_MODEL: &str = "mistral-ocr-latest";
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_QNA_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the IndusNLP gateway.
#[derive(Debug, Clone)]
pub struct Config {
    /// API key for the Mistral OCR service. OCR routes are disabled when absent.
    pub mistral_api_key: Option<String>,
    /// Base URL of the Mistral API.
    pub mistral_base_url: String,
    /// OCR model identifier passed to Mistral.
    pub ocr_model: String,
    /// API key for Google Gemini. Q&A routes are disabled when absent.
    pub gemini_api_key: Option<String>,
    /// Base URL of the Gemini API.
    pub gemini_base_url: String,
    /// Gemini model used for question generation.
    pub qna_model: String,
    /// Sliding-window size (characters) fed to each generation batch.
    pub qna_chunk_size: usize,
    /// Attempts per generation batch before it is skipped.
    pub qna_max_retries: usize,
    /// Pause between failed attempts of the same batch.
    pub qna_retry_delay_ms: u64,
    /// Pause between consecutive batches.
    pub qna_batch_delay_ms: u64,
    /// Upper bound on `num_questions` accepted per request.
    pub qna_max_questions: usize,
    /// Optional file with extra bad words, one per line.
    pub badwords_path: Option<PathBuf>,
    /// Maximum accepted request body size in bytes.
    pub max_upload_bytes: usize,
    /// Timeout applied to upstream HTTP calls.
    pub http_timeout_secs: u64,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

impl Config {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup, performing validation along the way.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let or_default =
            |key: &str, default: &str| optional(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            mistral_api_key: optional("MISTRAL_API_KEY"),
            mistral_base_url: or_default("MISTRAL_BASE_URL", DEFAULT_MISTRAL_BASE_URL),
            ocr_model: or_default("OCR_MODEL", DEFAULT_OCR_MODEL),
            gemini_api_key: optional("GEMINI_API_KEY"),
            gemini_base_url: or_default("GEMINI_BASE_URL", DEFAULT_GEMINI_BASE_URL),
            qna_model: or_default("QNA_MODEL", DEFAULT_QNA_MODEL),
            qna_chunk_size: parse_or("QNA_CHUNK_SIZE", optional("QNA_CHUNK_SIZE"), 6000)?,
            qna_max_retries: parse_or("QNA_MAX_RETRIES", optional("QNA_MAX_RETRIES"), 3)?,
            qna_retry_delay_ms: parse_or(
                "QNA_RETRY_DELAY_MS",
                optional("QNA_RETRY_DELAY_MS"),
                2000,
            )?,
            qna_batch_delay_ms: parse_or(
                "QNA_BATCH_DELAY_MS",
                optional("QNA_BATCH_DELAY_MS"),
                1000,
            )?,
            qna_max_questions: parse_or("QNA_MAX_QUESTIONS", optional("QNA_MAX_QUESTIONS"), 500)?,
            badwords_path: optional("BADWORDS_PATH").map(PathBuf::from),
            max_upload_bytes: parse_or(
                "MAX_UPLOAD_BYTES",
                optional("MAX_UPLOAD_BYTES"),
                DEFAULT_MAX_UPLOAD_BYTES,
            )?,
            http_timeout_secs: parse_or("HTTP_TIMEOUT_SECS", optional("HTTP_TIMEOUT_SECS"), 120)?,
            server_port: optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }

    /// Timeout for upstream HTTP requests.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Require the Mistral API key, used by callers that cannot run without OCR.
    pub fn require_mistral_key(&self) -> Result<&str, ConfigError> {
        self.mistral_api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingVariable("MISTRAL_API_KEY".into()))
    }

    /// Require the Gemini API key, used by callers that cannot run without Q&A generation.
    pub fn require_gemini_key(&self) -> Result<&str, ConfigError> {
        self.gemini_api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingVariable("GEMINI_API_KEY".into()))
    }
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Load `.env` (when present) and read configuration from the environment.
pub fn load() -> Result<Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        mistral_base_url = %config.mistral_base_url,
        ocr_model = %config.ocr_model,
        ocr_configured = config.mistral_api_key.is_some(),
        gemini_base_url = %config.gemini_base_url,
        qna_model = %config.qna_model,
        qna_configured = config.gemini_api_key.is_some(),
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    Ok(config)
}
