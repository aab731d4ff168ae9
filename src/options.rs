//! Per-request option resolution.
//!
//! Options may arrive as query parameters, JSON body fields or multipart text fields. Each
//! source becomes an [`OptionLayer`]; [`resolve`] takes layers ordered from highest to lowest
//! precedence and falls back to built-in defaults.

use crate::cleaning::CleanOptions;
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;

/// Default number of questions generated per document.
pub const DEFAULT_NUM_QUESTIONS: usize = 25;
/// Default number of questions requested per model call.
pub const DEFAULT_BATCH_SIZE: usize = 25;

/// Names of every recognised option.
pub const OPTION_NAMES: [&str; 5] = [
    "transliterate",
    "filter_badwords",
    "filter_punctuation",
    "num_questions",
    "batch_size",
];

/// Invalid option values supplied by a client.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionsError {
    /// The value could not be parsed for the option's type.
    #[error("Invalid value {value:?} for option {name}")]
    InvalidValue {
        /// Option name.
        name: String,
        /// Raw value supplied.
        value: String,
    },
}

/// Raw option values from one request source.
#[derive(Debug, Clone, Default)]
pub struct OptionLayer {
    values: HashMap<String, String>,
}

impl OptionLayer {
    /// Collect recognised options from string pairs, e.g. query parameters or form fields.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut layer = Self::default();
        for (key, value) in pairs {
            layer.insert(key, value);
        }
        layer
    }

    /// Collect recognised options from a JSON object. `null` counts as absent.
    pub fn from_json(object: &Map<String, Value>) -> Self {
        let mut layer = Self::default();
        for (key, value) in object {
            let raw = match value {
                Value::Null => continue,
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            layer.insert(key.as_str(), raw);
        }
        layer
    }

    /// Record a value, ignoring names that are not options.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if OPTION_NAMES.contains(&key.as_str()) {
            self.values.insert(key, value.into());
        }
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// Fully resolved options of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOptions {
    /// Cleaning switches.
    pub clean: CleanOptions,
    /// Questions to generate per document.
    pub num_questions: usize,
    /// Questions requested per model call.
    pub batch_size: usize,
}

/// Resolve options from `layers` (highest precedence first), capping `num_questions` at
/// `max_questions`.
pub fn resolve(
    layers: &[&OptionLayer],
    max_questions: usize,
) -> Result<RequestOptions, OptionsError> {
    let lookup = |name: &str| layers.iter().find_map(|layer| layer.get(name));
    let defaults = CleanOptions::default();

    let clean = CleanOptions {
        transliterate: lookup("transliterate")
            .map(|raw| parse_bool("transliterate", raw))
            .transpose()?
            .unwrap_or(defaults.transliterate),
        filter_badwords: lookup("filter_badwords")
            .map(|raw| parse_bool("filter_badwords", raw))
            .transpose()?
            .unwrap_or(defaults.filter_badwords),
        filter_punctuation: lookup("filter_punctuation")
            .map(|raw| parse_bool("filter_punctuation", raw))
            .transpose()?
            .unwrap_or(defaults.filter_punctuation),
    };

    let num_questions = lookup("num_questions")
        .map(|raw| parse_count("num_questions", raw))
        .transpose()?
        .unwrap_or(DEFAULT_NUM_QUESTIONS);
    let batch_size = lookup("batch_size")
        .map(|raw| parse_count("batch_size", raw))
        .transpose()?
        .unwrap_or(DEFAULT_BATCH_SIZE);

    Ok(RequestOptions {
        clean,
        num_questions: num_questions.min(max_questions.max(1)),
        batch_size,
    })
}

/// Parse `true/false/1/0/yes/no/on/off`, case-insensitively.
pub fn parse_bool(name: &str, raw: &str) -> Result<bool, OptionsError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(invalid(name, raw)),
    }
}

fn parse_count(name: &str, raw: &str) -> Result<usize, OptionsError> {
    match raw.trim().parse::<usize>() {
        Ok(value) if value >= 1 => Ok(value),
        _ => Err(invalid(name, raw)),
    }
}

fn invalid(name: &str, raw: &str) -> OptionsError {
    OptionsError::InvalidValue {
        name: name.to_string(),
        value: raw.to_string(),
    }
}
