//! Loading surveys and responses.
//!
//! Payloads are accepted bare or wrapped in the survey service's
//! `{success, message, data}` envelope, whether they come from disk or
//! from the REST API.

pub mod api;
pub mod files;

use crate::models::{ResponseRecord, Survey};
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

pub use api::{ApiConfig, SurveyApiClient};
pub use files::{load_responses, load_survey};

/// Errors raised while loading survey data.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {origin}: {source}")]
    Json {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{origin} does not contain {expected}")]
    MissingPayload { origin: String, expected: &'static str },

    #[error("Survey service reported failure: {0}")]
    Rejected(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Invalid survey: {0}")]
    InvalidSurvey(String),
}

/// Pagination block attached to list responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub current_page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_items: u64,
    #[serde(default)]
    pub items_per_page: u32,
}

/// One page of responses.
#[derive(Debug, Clone, Default)]
pub struct ResponsePage {
    pub responses: Vec<ResponseRecord>,
    pub pagination: Option<Pagination>,
}

fn parse_json(text: &str, origin: &str) -> Result<Value, SourceError> {
    serde_json::from_str(text).map_err(|source| SourceError::Json {
        origin: origin.to_string(),
        source,
    })
}

/// Strip the service envelope, if present, and fail on `success: false`.
fn unwrap_envelope(value: Value) -> Result<Value, SourceError> {
    let Value::Object(mut obj) = value else {
        return Ok(value);
    };

    if obj.get("success") == Some(&Value::Bool(false)) {
        let message = obj
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("no message")
            .to_string();
        return Err(SourceError::Rejected(message));
    }

    match obj.remove("data") {
        Some(data) if obj.contains_key("success") => Ok(data),
        Some(data) => {
            // Not an envelope after all; put the field back.
            obj.insert("data".to_string(), data);
            Ok(Value::Object(obj))
        }
        None => Ok(Value::Object(obj)),
    }
}

/// Keep `id` when a document also carries the database `_id`.
fn drop_shadowed_id(value: &mut Value) {
    if let Value::Object(obj) = value {
        if obj.contains_key("id") {
            obj.remove("_id");
        }
        if let Some(respondent) = obj.get_mut("respondent") {
            drop_shadowed_id(respondent);
        }
    }
}

/// Parse a survey document and check its structure.
pub fn parse_survey(text: &str, origin: &str) -> Result<Survey, SourceError> {
    let mut payload = unwrap_envelope(parse_json(text, origin)?)?;

    if let Some(inner) = payload.get_mut("survey").map(Value::take) {
        payload = inner;
    }
    drop_shadowed_id(&mut payload);

    let survey: Survey = serde_json::from_value(payload).map_err(|source| SourceError::Json {
        origin: origin.to_string(),
        source,
    })?;

    survey.check().map_err(SourceError::InvalidSurvey)?;

    for question in survey.questions.iter().filter(|q| q.question_type.is_choice()) {
        if question.options.is_empty() {
            warn!(
                "Question {} of survey {} is a choice question without options",
                question.id, survey.id
            );
        }
    }

    Ok(survey)
}

/// Parse a list of responses, or a page of them with pagination.
///
/// Records that fail to deserialize are skipped with a warning.
pub fn parse_response_page(text: &str, origin: &str) -> Result<ResponsePage, SourceError> {
    let payload = unwrap_envelope(parse_json(text, origin)?)?;

    let (records, pagination) = match payload {
        Value::Array(records) => (records, None),
        Value::Object(mut obj) => {
            let records = match obj.remove("responses") {
                Some(Value::Array(records)) => records,
                _ => {
                    return Err(SourceError::MissingPayload {
                        origin: origin.to_string(),
                        expected: "a responses array",
                    })
                }
            };
            let pagination = obj
                .remove("pagination")
                .and_then(|p| serde_json::from_value::<Pagination>(p).ok());
            (records, pagination)
        }
        _ => {
            return Err(SourceError::MissingPayload {
                origin: origin.to_string(),
                expected: "a responses array",
            })
        }
    };

    let total = records.len();
    let responses: Vec<ResponseRecord> = records
        .into_iter()
        .enumerate()
        .filter_map(|(index, mut record)| {
            drop_shadowed_id(&mut record);
            match serde_json::from_value(record) {
                Ok(response) => Some(response),
                Err(e) => {
                    warn!("Skipping malformed response #{} in {}: {}", index, origin, e);
                    None
                }
            }
        })
        .collect();

    if responses.len() < total {
        warn!(
            "Skipped {} of {} responses in {}",
            total - responses.len(),
            total,
            origin
        );
    }

    Ok(ResponsePage {
        responses,
        pagination,
    })
}
