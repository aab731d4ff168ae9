use std::{env, time::Duration};

use indusnlp::{
    config::{self, Config},
    dispatch::Document,
    ocr::{MistralOcrClient, OcrClient},
    qna::{GeminiClient, GenerationSettings, QnaGenerator},
};
use std::sync::Arc;

fn live_config() -> Config {
    config::load().expect("configuration from environment")
}

#[tokio::test]
#[ignore = "Requires MISTRAL_API_KEY and a sample PDF at INDUSNLP_LIVE_PDF"]
async fn live_mistral_ocr_extracts_text() {
    let config = live_config();
    let key = config.require_mistral_key().expect("MISTRAL_API_KEY");
    let path = env::var("INDUSNLP_LIVE_PDF").expect("INDUSNLP_LIVE_PDF");
    let content = std::fs::read(&path).expect("sample pdf");

    let client = MistralOcrClient::new(
        config.mistral_base_url.as_str(),
        key,
        config.ocr_model.as_str(),
        Duration::from_secs(config.http_timeout_secs),
    )
    .expect("client");
    let text = client
        .extract_text(&Document::new("sample.pdf", content), "application/pdf")
        .await
        .expect("ocr text");

    assert!(!text.trim().is_empty(), "OCR returned no text");
}

#[tokio::test]
#[ignore = "Requires GEMINI_API_KEY"]
async fn live_gemini_generates_questions() {
    let config = live_config();
    let key = config.require_gemini_key().expect("GEMINI_API_KEY");
    let client = GeminiClient::new(
        config.gemini_base_url.as_str(),
        key,
        config.qna_model.as_str(),
        config.http_timeout(),
    )
    .expect("client");
    let generator = QnaGenerator::new(Arc::new(client), GenerationSettings::from_config(&config));

    let items = generator
        .generate(
            "भारत एक विशाल देश है। इसकी राजधानी नई दिल्ली है। गंगा भारत की सबसे लंबी नदी है।",
            3,
            3,
        )
        .await
        .expect("generated items");

    assert!(!items.is_empty());
    assert!(items.len() <= 3);
    assert!(items.iter().all(|item| !item.question.trim().is_empty()));
}
