#![deny(missing_docs)]

//! Core library for the IndusNLP gateway.

/// HTTP routing and REST handlers.
pub mod api;
/// Hindi/Indic text cleaning, transliteration and bad-word masking.
pub mod cleaning;
/// Environment-driven configuration management.
pub mod config;
/// Shared service state built from configuration.
pub mod context;
/// Single-document and zip-bundle dispatch through per-document transforms.
pub mod dispatch;
/// Structured logging and tracing setup.
pub mod logging;
/// OCR provider clients.
pub mod ocr;
/// Per-request option resolution.
pub mod options;
/// Question/answer generation through a language model.
pub mod qna;
/// OCR, cleaning and Q&A transforms for the dispatcher.
pub mod transforms;
