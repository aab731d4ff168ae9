//! OCR over the hosted Mistral API.
//!
//! A document is uploaded to the files endpoint, exchanged for a short-lived signed URL and then
//! submitted to the OCR endpoint. The Markdown of every returned page is concatenated in page
//! order.

use crate::dispatch::Document;
use async_trait::async_trait;
use reqwest::{Client, multipart};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Hours the signed document URL stays valid.
const SIGNED_URL_EXPIRY_HOURS: u32 = 24;

/// Errors surfaced by OCR clients.
#[derive(Debug, Error)]
pub enum OcrError {
    /// The HTTP client could not be constructed.
    #[error("Failed to build OCR client: {0}")]
    Client(String),
    /// The provider could not be reached.
    #[error("OCR provider unreachable during {stage}: {message}")]
    Transport {
        /// Step of the OCR flow that failed.
        stage: &'static str,
        /// Transport error reported by the HTTP client.
        message: String,
    },
    /// The provider answered with a non-success status.
    #[error("OCR provider returned {status} during {stage}: {body}")]
    UnexpectedStatus {
        /// Step of the OCR flow that failed.
        stage: &'static str,
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },
    /// The provider response could not be decoded.
    #[error("Malformed OCR response during {stage}: {message}")]
    InvalidResponse {
        /// Step of the OCR flow that failed.
        stage: &'static str,
        /// Decoding error.
        message: String,
    },
}

/// Interface implemented by OCR providers.
#[async_trait]
pub trait OcrClient: Send + Sync {
    /// Extract Markdown text from a PDF or image document.
    async fn extract_text(&self, document: &Document, mime: &str) -> Result<String, OcrError>;
}

/// Mistral OCR client authenticated with a bearer API key.
#[derive(Debug, Clone)]
pub struct MistralOcrClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct UploadedFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SignedUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    #[serde(default)]
    pages: Vec<OcrPage>,
}

#[derive(Debug, Deserialize)]
struct OcrPage {
    #[serde(default)]
    markdown: String,
}

impl MistralOcrClient {
    /// Build a client for `base_url` using `model` for every request.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, OcrError> {
        let http = Client::builder()
            .user_agent(concat!("indusnlp/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|error| OcrError::Client(error.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn upload(&self, document: &Document, mime: &str) -> Result<String, OcrError> {
        const STAGE: &str = "upload";
        let part = multipart::Part::bytes(document.content.clone())
            .file_name(document.file_name().to_string())
            .mime_str(mime)
            .map_err(|error| OcrError::Client(error.to_string()))?;
        let form = multipart::Form::new().text("purpose", "ocr").part("file", part);

        let response = self
            .http
            .post(self.endpoint("/v1/files"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|error| transport(STAGE, error))?;
        let uploaded: UploadedFile = decode(STAGE, response).await?;
        Ok(uploaded.id)
    }

    async fn signed_url(&self, file_id: &str) -> Result<String, OcrError> {
        const STAGE: &str = "signed-url";
        let response = self
            .http
            .get(self.endpoint(&format!("/v1/files/{file_id}/url")))
            .query(&[("expiry", SIGNED_URL_EXPIRY_HOURS)])
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|error| transport(STAGE, error))?;
        let signed: SignedUrl = decode(STAGE, response).await?;
        Ok(signed.url)
    }

    async fn process(&self, url: &str, mime: &str) -> Result<OcrResponse, OcrError> {
        const STAGE: &str = "ocr";
        let document = if mime.starts_with("image/") {
            json!({ "type": "image_url", "image_url": url })
        } else {
            json!({ "type": "document_url", "document_url": url })
        };
        let payload = json!({
            "model": self.model,
            "document": document,
            "include_image_base64": false,
        });

        let response = self
            .http
            .post(self.endpoint("/v1/ocr"))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| transport(STAGE, error))?;
        decode(STAGE, response).await
    }
}

#[async_trait]
impl OcrClient for MistralOcrClient {
    async fn extract_text(&self, document: &Document, mime: &str) -> Result<String, OcrError> {
        let file_id = self.upload(document, mime).await?;
        tracing::debug!(document = %document.name, %file_id, "Uploaded document for OCR");
        let url = self.signed_url(&file_id).await?;
        let response = self.process(&url, mime).await?;
        tracing::debug!(document = %document.name, pages = response.pages.len(), "OCR completed");
        Ok(join_pages(&response.pages))
    }
}

fn join_pages(pages: &[OcrPage]) -> String {
    pages
        .iter()
        .map(|page| format!("\n{}\n", page.markdown.trim()))
        .collect()
}

fn transport(stage: &'static str, error: reqwest::Error) -> OcrError {
    OcrError::Transport {
        stage,
        message: error.to_string(),
    }
}

async fn decode<T>(stage: &'static str, response: reqwest::Response) -> Result<T, OcrError>
where
    T: for<'de> Deserialize<'de>,
{
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(OcrError::UnexpectedStatus {
            stage,
            status: status.as_u16(),
            body,
        });
    }
    response
        .json()
        .await
        .map_err(|error| OcrError::InvalidResponse {
            stage,
            message: error.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{
        Method::{GET, POST},
        MockServer,
    };

    fn client(server: &MockServer) -> MistralOcrClient {
        MistralOcrClient::new(
            server.base_url(),
            "test-key",
            "mistral-ocr-latest",
            Duration::from_secs(5),
        )
        .expect("client")
    }

    #[tokio::test]
    async fn runs_upload_sign_and_ocr_flow() {
        let server = MockServer::start_async().await;
        let upload = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/files")
                    .header("authorization", "Bearer test-key")
                    .body_contains("name=\"purpose\"");
                then.status(200).json_body(json!({ "id": "file-1" }));
            })
            .await;
        let signed = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v1/files/file-1/url")
                    .query_param("expiry", "24");
                then.status(200)
                    .json_body(json!({ "url": "https://files.example/doc" }));
            })
            .await;
        let ocr = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/ocr")
                    .body_contains("document_url")
                    .body_contains("https://files.example/doc");
                then.status(200).json_body(json!({
                    "pages": [
                        { "index": 0, "markdown": "  # पहला पृष्ठ  " },
                        { "index": 1, "markdown": "दूसरा पृष्ठ\n" }
                    ]
                }));
            })
            .await;

        let document = Document::new("scan.pdf", b"%PDF-1.4".to_vec());
        let text = client(&server)
            .extract_text(&document, "application/pdf")
            .await
            .expect("text");

        upload.assert_async().await;
        signed.assert_async().await;
        ocr.assert_async().await;
        assert_eq!(text, "\n# पहला पृष्ठ\n\nदूसरा पृष्ठ\n");
    }

    #[tokio::test]
    async fn images_are_submitted_as_image_urls() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/files");
                then.status(200).json_body(json!({ "id": "img" }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/files/img/url");
                then.status(200).json_body(json!({ "url": "https://files.example/img" }));
            })
            .await;
        let ocr = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/ocr").body_contains("image_url");
                then.status(200)
                    .json_body(json!({ "pages": [{ "markdown": "text" }] }));
            })
            .await;

        let document = Document::new("photo.png", vec![0x89, b'P', b'N', b'G']);
        let text = client(&server)
            .extract_text(&document, "image/png")
            .await
            .expect("text");

        ocr.assert_async().await;
        assert_eq!(text, "\ntext\n");
    }

    #[tokio::test]
    async fn error_status_reports_stage() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/files");
                then.status(401).body("unauthorized");
            })
            .await;

        let document = Document::new("scan.pdf", b"%PDF-1.4".to_vec());
        let error = client(&server)
            .extract_text(&document, "application/pdf")
            .await
            .expect_err("error");

        assert!(matches!(
            error,
            OcrError::UnexpectedStatus { stage: "upload", status: 401, .. }
        ));
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_response() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/files");
                then.status(200).body("not json");
            })
            .await;

        let document = Document::new("scan.pdf", b"%PDF-1.4".to_vec());
        let error = client(&server)
            .extract_text(&document, "application/pdf")
            .await
            .expect_err("error");

        assert!(matches!(error, OcrError::InvalidResponse { stage: "upload", .. }));
    }
}
