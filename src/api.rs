//! HTTP surface for the IndusNLP gateway.
//!
//! - `GET /` and `GET /health` – Service status and which upstream capabilities are configured.
//! - `POST /api/ocr` – OCR a PDF/image upload, or every document of a zip upload.
//! - `POST /api/clean` – Clean JSON `text` or an uploaded `.txt`/`.md` file or zip.
//! - `POST /api/qna` – Generate question/answer pairs from JSON `text` or uploads.
//! - `GET /commands` – Machine-readable route catalog.
//!
//! Uploads go through the document dispatcher: a single document answers with JSON, a zip
//! answers with a zip of per-document results. Options are read from the query string first,
//! then from JSON fields or multipart text fields, then from defaults.

use crate::{
    context::ServiceContext,
    dispatch::{self, DispatchError, Dispatched, Document, DocumentTransform, TransformError},
    options::{self, OptionLayer, OptionsError, RequestOptions},
    qna::{QnaError, QnaItem},
    transforms::{CleanOutcome, CleanTransform, OcrTransform, QnaTransform},
};
use async_trait::async_trait;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, FromRequest, Multipart, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::{Value, json};
use std::{collections::HashMap, sync::Arc};
use time::format_description::well_known::Rfc3339;
use tracing::Instrument;
use uuid::Uuid;

const SERVICE_NAME: &str = "IndusNLP API";
const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build the HTTP router over a shared service context.
pub fn create_router(context: Arc<ServiceContext>) -> Router {
    let body_limit = context.config().max_upload_bytes;
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/ocr", post(ocr))
        .route("/api/clean", post(clean))
        .route("/api/qna", post(qna))
        .route("/commands", get(get_commands))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(trace_request))
        .with_state(context)
}

/// Run every request inside a span carrying a fresh request id.
async fn trace_request(request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!(
        "request",
        %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );
    async move {
        let mut response = next.run(request).await;
        tracing::info!(status = response.status().as_u16(), "Request completed");
        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }
    .instrument(span)
    .await
}

/// Response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    started_at: String,
    ocr_configured: bool,
    qna_configured: bool,
}

async fn health(State(context): State<Arc<ServiceContext>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        started_at: context.started_at().format(&Rfc3339).unwrap_or_default(),
        ocr_configured: context.ocr_client().is_some(),
        qna_configured: context.llm_client().is_some(),
    })
}

/// Body of a processing request: inline text or an uploaded file, plus body-level options.
struct Submission {
    payload: Payload,
    options: OptionLayer,
}

enum Payload {
    /// JSON or form `text`; `None` when the field was absent.
    Text(Option<String>),
    /// Uploaded file, single document or zip.
    Upload(Document),
}

#[async_trait]
impl<S> FromRequest<S> for Submission
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = request
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(request, state)
                .await
                .map_err(|rejection| AppError::Rejected {
                    status: rejection.status(),
                    message: rejection.body_text(),
                })?;
            return read_multipart(multipart).await;
        }

        let body = Bytes::from_request(request, state)
            .await
            .map_err(|rejection| AppError::Rejected {
                status: rejection.status(),
                message: rejection.body_text(),
            })?;
        read_json(&body)
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<Submission, AppError> {
    let mut document = None;
    let mut text = None;
    let mut options = OptionLayer::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let file_name = field.file_name().unwrap_or_default().trim().to_string();
            let content = field.bytes().await.map_err(multipart_error)?;
            if document.is_some() {
                tracing::debug!(file_name, "Ignoring additional file field");
                continue;
            }
            if file_name.is_empty() {
                return Err(AppError::BadRequest("No file selected".into()));
            }
            document = Some(Document::new(file_name, content.to_vec()));
        } else {
            let value = field.text().await.map_err(multipart_error)?;
            if name == "text" {
                text = Some(value);
            } else {
                options.insert(name, value);
            }
        }
    }

    let payload = match document {
        Some(document) => Payload::Upload(document),
        None => Payload::Text(text),
    };
    Ok(Submission { payload, options })
}

fn multipart_error(error: axum::extract::multipart::MultipartError) -> AppError {
    AppError::Rejected {
        status: error.status(),
        message: error.body_text(),
    }
}

fn read_json(body: &[u8]) -> Result<Submission, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Submission {
            payload: Payload::Text(None),
            options: OptionLayer::default(),
        });
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|error| AppError::BadRequest(format!("Invalid JSON body: {error}")))?;
    let Value::Object(object) = value else {
        return Err(AppError::BadRequest(
            "Request body must be a JSON object".into(),
        ));
    };

    let text = match object.get("text") {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text.clone()),
        Some(_) => return Err(AppError::BadRequest("Field text must be a string".into())),
    };
    Ok(Submission {
        payload: Payload::Text(text),
        options: OptionLayer::from_json(&object),
    })
}

impl Submission {
    /// Resolve options with the query string taking precedence over the body.
    fn resolve(
        &self,
        query: HashMap<String, String>,
        context: &ServiceContext,
    ) -> Result<RequestOptions, AppError> {
        let query = OptionLayer::from_pairs(query);
        Ok(options::resolve(
            &[&query, &self.options],
            context.config().qna_max_questions,
        )?)
    }
}

/// Dispatch an upload and shape the response: `single` renders a lone document's result, a
/// bundle becomes a zip attachment.
async fn respond_to_upload<F, R>(
    upload: Document,
    transform: &F,
    single: R,
) -> Result<Response, AppError>
where
    F: DocumentTransform,
    R: FnOnce(String, F::Output) -> Response,
{
    let archive_name = format!("{}_{}.zip", upload.file_stem(), transform.label());
    match dispatch::dispatch(upload, transform).await? {
        Dispatched::Single { name, result } => Ok(single(name, result?)),
        Dispatched::Bundle(report) => {
            tracing::info!(
                transform = transform.label(),
                documents = report.len(),
                succeeded = report.succeeded(),
                failed = report.failed(),
                "Bundle processed"
            );
            let archive = report.into_archive(transform)?;
            Ok(zip_response(&archive_name, archive))
        }
    }
}

fn zip_response(file_name: &str, archive: Vec<u8>) -> Response {
    let safe_name: String = file_name
        .chars()
        .map(|c| if c == '"' || c.is_control() { '_' } else { c })
        .collect();
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{safe_name}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/zip")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        archive,
    )
        .into_response()
}

#[derive(Serialize)]
struct OcrResponse {
    success: bool,
    filename: String,
    text: String,
}

/// OCR an uploaded document or bundle.
async fn ocr(
    State(context): State<Arc<ServiceContext>>,
    submission: Submission,
) -> Result<Response, AppError> {
    let Payload::Upload(upload) = submission.payload else {
        return Err(AppError::BadRequest("No file provided".into()));
    };
    let client = context
        .ocr_client()
        .ok_or(AppError::NotConfigured("OCR (MISTRAL_API_KEY)"))?;

    let transform = OcrTransform::new(client);
    respond_to_upload(upload, &transform, |filename, text| {
        Json(OcrResponse {
            success: true,
            filename,
            text,
        })
        .into_response()
    })
    .await
}

#[derive(Serialize)]
struct CleanResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filename: Option<String>,
    #[serde(flatten)]
    outcome: CleanOutcome,
}

/// Clean inline text or uploaded text documents.
async fn clean(
    State(context): State<Arc<ServiceContext>>,
    Query(query): Query<HashMap<String, String>>,
    submission: Submission,
) -> Result<Response, AppError> {
    let options = submission.resolve(query, &context)?;
    let pipeline = context.cleaning_pipeline(options.clean);

    match submission.payload {
        Payload::Text(None) => Err(AppError::BadRequest("No text provided".into())),
        Payload::Text(Some(text)) => {
            let outcome = CleanOutcome::from_text(&pipeline, &text);
            tracing::info!(
                original_length = outcome.original_length,
                cleaned_length = outcome.cleaned_length,
                "Cleaned inline text"
            );
            Ok(Json(CleanResponse {
                success: true,
                filename: None,
                outcome,
            })
            .into_response())
        }
        Payload::Upload(upload) => {
            let transform = CleanTransform::new(pipeline);
            respond_to_upload(upload, &transform, |filename, outcome| {
                Json(CleanResponse {
                    success: true,
                    filename: Some(filename),
                    outcome,
                })
                .into_response()
            })
            .await
        }
    }
}

#[derive(Serialize)]
struct QnaResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filename: Option<String>,
    num_questions: usize,
    qna: Vec<QnaItem>,
}

/// Generate question/answer pairs from inline text or uploaded text documents.
async fn qna(
    State(context): State<Arc<ServiceContext>>,
    Query(query): Query<HashMap<String, String>>,
    submission: Submission,
) -> Result<Response, AppError> {
    let options = submission.resolve(query, &context)?;
    if matches!(submission.payload, Payload::Text(None)) {
        return Err(AppError::BadRequest("No text provided".into()));
    }
    let generator = context
        .qna_generator()
        .ok_or(AppError::NotConfigured("Q&A generation (GEMINI_API_KEY)"))?;

    match submission.payload {
        Payload::Text(text) => {
            let items = generator
                .generate(
                    text.as_deref().unwrap_or_default(),
                    options.num_questions,
                    options.batch_size,
                )
                .await?;
            tracing::info!(questions = items.len(), "Generated Q&A for inline text");
            Ok(Json(QnaResponse {
                success: true,
                filename: None,
                num_questions: items.len(),
                qna: items,
            })
            .into_response())
        }
        Payload::Upload(upload) => {
            let transform = QnaTransform::new(generator, options.num_questions, options.batch_size);
            respond_to_upload(upload, &transform, |filename, items| {
                Json(QnaResponse {
                    success: true,
                    filename: Some(filename),
                    num_questions: items.len(),
                    qna: items,
                })
                .into_response()
            })
            .await
        }
    }
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery by clients and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "health",
                method: "GET",
                path: "/health",
                description: "Service status, version, start time and which upstream capabilities are configured.",
                request_example: None,
            },
            CommandDescriptor {
                name: "ocr",
                method: "POST",
                path: "/api/ocr",
                description: "Multipart field `file`: a PDF/PNG/JPG document returns { \"success\", \"filename\", \"text\" }; a zip returns a zip of `<name>.txt` results with `<name>.error.txt` for failures.",
                request_example: None,
            },
            CommandDescriptor {
                name: "clean",
                method: "POST",
                path: "/api/clean",
                description: "Clean Hindi text from JSON `text` or an uploaded .txt/.md file or zip. Returns { \"success\", \"original_length\", \"cleaned_length\", \"text\" }.",
                request_example: Some(json!({
                    "text": "संसद के विशेष सत्र के बीच कल बैठक हुई।",
                    "transliterate": true,
                    "filter_badwords": true,
                    "filter_punctuation": false
                })),
            },
            CommandDescriptor {
                name: "qna",
                method: "POST",
                path: "/api/qna",
                description: "Generate question/answer pairs from JSON `text` or an uploaded .txt/.md file or zip. Returns { \"success\", \"num_questions\", \"qna\" }.",
                request_example: Some(json!({
                    "text": "अध्याय का पाठ",
                    "num_questions": 25,
                    "batch_size": 25
                })),
            },
        ],
    })
}

/// Errors returned to HTTP clients as `{ "success": false, "error": ... }`.
#[derive(Debug)]
enum AppError {
    BadRequest(String),
    UnsupportedMediaType(String),
    Rejected { status: StatusCode, message: String },
    Upstream(String),
    NotConfigured(&'static str),
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Rejected { status, .. } => *status,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(self) -> String {
        match self {
            Self::BadRequest(message)
            | Self::UnsupportedMediaType(message)
            | Self::Rejected { message, .. }
            | Self::Upstream(message)
            | Self::Internal(message) => message,
            Self::NotConfigured(capability) => format!("{capability} is not configured"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %message, "Request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %message, "Request rejected");
        }
        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

impl From<OptionsError> for AppError {
    fn from(inner: OptionsError) -> Self {
        Self::BadRequest(inner.to_string())
    }
}

impl From<DispatchError> for AppError {
    fn from(inner: DispatchError) -> Self {
        match inner {
            DispatchError::InvalidBundle(_) | DispatchError::EmptyBundle => {
                Self::BadRequest(inner.to_string())
            }
            DispatchError::Pack(_) => Self::Internal(inner.to_string()),
        }
    }
}

impl From<TransformError> for AppError {
    fn from(inner: TransformError) -> Self {
        match inner {
            TransformError::Unsupported { .. } => Self::UnsupportedMediaType(inner.to_string()),
            TransformError::InvalidDocument { .. } | TransformError::Extraction { .. } => {
                Self::BadRequest(inner.to_string())
            }
            TransformError::Upstream { .. } => Self::Upstream(inner.to_string()),
        }
    }
}

impl From<QnaError> for AppError {
    fn from(inner: QnaError) -> Self {
        match inner {
            QnaError::EmptyText | QnaError::InvalidParameter(_) => {
                Self::BadRequest(inner.to_string())
            }
            QnaError::NothingGenerated { .. } => Self::Upstream(inner.to_string()),
        }
    }
}
