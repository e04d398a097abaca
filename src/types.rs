//! Shared data structures modeling OpenRouter chat requests and responses.
//!
//! These types mirror the gateway's wire format so the client can serialize
//! requests once and reuse the exact bytes across retries.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::OpenRouterError;
use crate::schema::JsonSchema;

/// Chat role accepted by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Single conversation message in gateway wire format.
///
/// Ordering within a conversation is caller-significant; the client assembles
/// `[system?, ...history, user]` and never reorders history entries.
///
/// # Examples
///
/// ```
/// use openrouter_gateway::{Message, Role};
///
/// let msg = Message::new(Role::Assistant, "Hello");
/// assert_eq!(msg.role, Role::Assistant);
/// assert!(msg.name.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role associated with this message.
    pub role: Role,
    /// Message text. Non-empty for every message the client sends.
    pub content: String,
    /// Optional participant name forwarded verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
        }
    }
}

/// `stop` parameter accepted as either a single sequence or a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StopSequence {
    One(String),
    Many(Vec<String>),
}

/// Optional tuning knobs merged over the configured defaults per call.
///
/// `None` fields are stripped before transmission, so the serialized payload
/// only ever carries keys the caller or the configuration actually set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    /// Sampling temperature, valid range `[0, 2]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Completion token cap, must be a positive integer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Nucleus sampling mass, valid range `[0, 1]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Frequency penalty, valid range `[-2, 2]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    /// Presence penalty, valid range `[-2, 2]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    /// Deterministic sampling seed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    /// Stop sequence(s) terminating the completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<StopSequence>,
}

impl ModelParams {
    /// Merges `self` over `defaults`, field by field; `self` wins on conflict.
    pub fn merged_over(&self, defaults: &ModelParams) -> ModelParams {
        ModelParams {
            temperature: self.temperature.or(defaults.temperature),
            max_tokens: self.max_tokens.or(defaults.max_tokens),
            top_p: self.top_p.or(defaults.top_p),
            frequency_penalty: self.frequency_penalty.or(defaults.frequency_penalty),
            presence_penalty: self.presence_penalty.or(defaults.presence_penalty),
            seed: self.seed.or(defaults.seed),
            stop: self.stop.clone().or_else(|| defaults.stop.clone()),
        }
    }

    /// Checks every set knob against its documented range.
    ///
    /// # Errors
    ///
    /// Returns [`OpenRouterError::InvalidInput`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), OpenRouterError> {
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(OpenRouterError::invalid_input(format!(
                    "temperature must be within [0, 2], got {temperature}"
                )));
            }
        }
        if let Some(max_tokens) = self.max_tokens {
            if max_tokens == 0 {
                return Err(OpenRouterError::invalid_input(
                    "max_tokens must be a positive integer",
                ));
            }
        }
        if let Some(top_p) = self.top_p {
            if !(0.0..=1.0).contains(&top_p) {
                return Err(OpenRouterError::invalid_input(format!(
                    "top_p must be within [0, 1], got {top_p}"
                )));
            }
        }
        if let Some(penalty) = self.frequency_penalty {
            if !(-2.0..=2.0).contains(&penalty) {
                return Err(OpenRouterError::invalid_input(format!(
                    "frequency_penalty must be within [-2, 2], got {penalty}"
                )));
            }
        }
        if let Some(penalty) = self.presence_penalty {
            if !(-2.0..=2.0).contains(&penalty) {
                return Err(OpenRouterError::invalid_input(format!(
                    "presence_penalty must be within [-2, 2], got {penalty}"
                )));
            }
        }
        Ok(())
    }
}

/// `response_format` directive in gateway wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    Text,
    JsonObject,
    JsonSchema { json_schema: JsonSchemaFormat },
}

/// Strict JSON-schema directive wrapped by structured completions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSchemaFormat {
    pub name: String,
    pub strict: bool,
    pub schema: JsonSchema,
}

impl ResponseFormat {
    /// Wraps a caller schema into the strict directive structured completions
    /// send upstream.
    pub fn strict_schema(schema: JsonSchema) -> Self {
        Self::JsonSchema {
            json_schema: JsonSchemaFormat {
                name: "StructuredResponse".to_string(),
                strict: true,
                schema,
            },
        }
    }
}

/// Input for a chat completion call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatInput {
    /// Optional system prompt, omitted when blank.
    #[serde(default)]
    pub system: Option<String>,
    /// User message, required and non-blank.
    pub user: String,
    /// Prior conversation turns inserted verbatim between system and user.
    #[serde(default)]
    pub history: Vec<Message>,
    /// Explicit model override; the configured default applies when blank.
    #[serde(default)]
    pub model: Option<String>,
    /// Per-call tuning knobs merged over the configured defaults.
    #[serde(default)]
    pub params: Option<ModelParams>,
    /// Optional response-format directive forwarded to the gateway.
    #[serde(default)]
    pub response_format: Option<ResponseFormat>,
}

impl ChatInput {
    /// Shorthand for a bare user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            user: text.into(),
            ..Self::default()
        }
    }
}

/// Serialized request body for `POST /chat/completions`.
#[derive(Debug, Serialize)]
pub(crate) struct CompletionPayload {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(flatten)]
    pub params: ModelParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

/// Permissive view of the gateway's completion response.
///
/// Fields default so degenerate payloads surface as empty-choice errors
/// rather than deserialization failures.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct WireResponse {
    pub model: String,
    pub choices: Vec<WireChoice>,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct WireChoice {
    pub message: WireMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct WireMessage {
    pub content: Option<String>,
}

/// Result of a plain chat completion.
#[derive(Debug, Clone)]
pub struct ChatResult {
    /// Assistant reply text from the first choice.
    pub content: String,
    /// Model identifier reported by the gateway.
    pub model: String,
    /// Finish reason for the first choice, when reported.
    pub finish_reason: Option<String>,
    /// Request id from response headers or the body `request_id` field.
    pub request_id: Option<String>,
    /// Raw upstream payload for callers that need the full envelope.
    pub raw: Value,
}

/// Result of a structured (schema-constrained) completion.
#[derive(Debug, Clone)]
pub struct StructuredResult<T> {
    /// Parsed and schema-validated data.
    pub data: T,
    /// Model identifier reported by the gateway.
    pub model: String,
    /// Finish reason for the first choice, when reported.
    pub finish_reason: Option<String>,
    /// Request id from response headers or the body `request_id` field.
    pub request_id: Option<String>,
    /// Raw upstream payload for callers that need the full envelope.
    pub raw: Value,
}

/// Health-check outcome reported as a value, never as an error.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
