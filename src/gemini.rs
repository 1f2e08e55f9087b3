//! Generative model client used by the facade.
//!
//! Calls the Gemini `generateContent` REST endpoint with a JSON response
//! schema and returns the parsed JSON document the model produced.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use tracing::debug;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const TEMPERATURE: f32 = 0.2;

#[derive(Debug)]
pub enum ModelError {
    MissingApiKey,
    Request(String),
    Api { status: u16, message: String },
    EmptyResponse,
    InvalidJson(String),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::MissingApiKey => write!(f, "{API_KEY_ENV} is not set"),
            ModelError::Request(message) => write!(f, "model request failed: {message}"),
            ModelError::Api { status, message } => write!(f, "model API error {status}: {message}"),
            ModelError::EmptyResponse => write!(f, "model returned no text"),
            ModelError::InvalidJson(message) => write!(f, "model returned invalid JSON: {message}"),
        }
    }
}

impl std::error::Error for ModelError {}

/// A model that answers a prompt with a JSON document matching `schema`.
pub trait GenerativeModel: Send + Sync + 'static {
    fn generate_json(
        &self,
        prompt: String,
        schema: &Value,
    ) -> impl Future<Output = Result<Value, ModelError>> + Send;
}

#[derive(Clone)]
pub struct GeminiModel {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiModel {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Reads the API key from `GEMINI_API_KEY`.
    pub fn from_env(model: impl Into<String>) -> Result<Self, ModelError> {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ModelError::MissingApiKey)?;
        Ok(Self::new(api_key, model))
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl fmt::Debug for GeminiModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiModel")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GenerativeModel for GeminiModel {
    async fn generate_json(&self, prompt: String, schema: &Value) -> Result<Value, ModelError> {
        let url = format!(
            "{BASE_URL}/{model}:generateContent?key={api_key}",
            model = self.model,
            api_key = self.api_key
        );
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: schema,
                temperature: TEMPERATURE,
            },
        };

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|err| ModelError::Request(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(map_http_error(status, &text));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|err| ModelError::Request(format!("unreadable response: {err}")))?;
        let text = extract_text(parsed)?;
        debug!(model = %self.model, bytes = text.len(), "model answered");
        parse_json_text(&text)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'static str,
    response_schema: &'a Value,
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Deserialize)]
struct ContentResponse {
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    status: Option<String>,
}

fn extract_text(response: GenerateContentResponse) -> Result<String, ModelError> {
    response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().find_map(|part| part.text))
        .ok_or(ModelError::EmptyResponse)
}

fn parse_json_text(text: &str) -> Result<Value, ModelError> {
    serde_json::from_str(text.trim()).map_err(|err| ModelError::InvalidJson(err.to_string()))
}

fn map_http_error(status: StatusCode, body: &str) -> ModelError {
    let message = serde_json::from_str::<ErrorWrapper>(body)
        .map(|wrapper| {
            let message = wrapper.error.message.unwrap_or_else(|| body.to_string());
            match wrapper.error.status {
                Some(status_text) if !status_text.is_empty() => format!("{status_text}: {message}"),
                _ => message,
            }
        })
        .unwrap_or_else(|_| body.to_string());
    ModelError::Api {
        status: status.as_u16(),
        message,
    }
}
