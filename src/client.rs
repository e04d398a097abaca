use std::collections::HashMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_MS, OpenRouterConfig, normalize_base_url};
use crate::error::OpenRouterError;
use crate::http::{DynHttpTransport, HttpRequest, HttpResponse};
use crate::schema::JsonSchema;
use crate::types::{
    ChatInput, ChatResult, CompletionPayload, HealthStatus, Message, ModelParams, ResponseFormat,
    Role, StructuredResult, WireResponse,
};

const RETRY_BASE_DELAY_MS: u64 = 300;
const RETRY_MAX_DELAY_MS: u64 = 2_000;
const REQUEST_ID_HEADERS: [&str; 2] = ["x-request-id", "x-openrouter-request-id"];

/// Client for the OpenRouter chat-completion gateway.
///
/// Holds read-only connection configuration fixed at construction and drives
/// one timeout-governed, retried HTTP exchange per call. The client keeps no
/// per-call state, so a single instance is safe to share across concurrent
/// tasks.
///
/// # Examples
///
/// ```no_run
/// use openrouter_gateway::{ChatInput, OpenRouterClient, OpenRouterConfig};
///
/// # async fn run() -> Result<(), openrouter_gateway::OpenRouterError> {
/// let client = OpenRouterClient::from_config(
///     OpenRouterConfig::new("sk-or-...", "openai/gpt-4.1-mini"),
/// )?;
/// let result = client.create_chat_completion(ChatInput::user("Hi")).await?;
/// println!("{}", result.content);
/// # Ok(())
/// # }
/// ```
pub struct OpenRouterClient {
    transport: DynHttpTransport,
    api_key: String,
    base_url: String,
    default_model: String,
    default_params: ModelParams,
    timeout: Duration,
    max_retries: u32,
    app_name: Option<String>,
    app_url: Option<String>,
}

impl std::fmt::Debug for OpenRouterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterClient")
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("default_params", &self.default_params)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("app_name", &self.app_name)
            .field("app_url", &self.app_url)
            .finish_non_exhaustive()
    }
}

impl OpenRouterClient {
    /// Creates a client over an explicit transport.
    ///
    /// Fails fast when the API key or default model is blank; per-call code
    /// can rely on both being present.
    ///
    /// # Errors
    ///
    /// Returns [`OpenRouterError::MissingApiKey`] or
    /// [`OpenRouterError::MissingDefaultModel`] on blank required fields.
    pub fn new(
        transport: DynHttpTransport,
        config: OpenRouterConfig,
    ) -> Result<Self, OpenRouterError> {
        let api_key = config.api_key.trim();
        if api_key.is_empty() {
            return Err(OpenRouterError::MissingApiKey);
        }
        let default_model = config.default_model.trim();
        if default_model.is_empty() {
            return Err(OpenRouterError::MissingDefaultModel);
        }

        Ok(Self {
            transport,
            api_key: api_key.to_string(),
            base_url: normalize_base_url(config.base_url.as_deref()),
            default_model: default_model.to_string(),
            default_params: config.default_params,
            timeout: Duration::from_millis(config.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)),
            max_retries: config.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            app_name: config.app_name,
            app_url: config.app_url,
        })
    }

    /// Creates a client over the default `reqwest` transport.
    ///
    /// # Errors
    ///
    /// Propagates construction failures from [`OpenRouterClient::new`] or
    /// transport initialization.
    pub fn from_config(config: OpenRouterConfig) -> Result<Self, OpenRouterError> {
        let transport = crate::http::reqwest::default_dyn_transport()?;
        Self::new(transport, config)
    }

    /// Model used when a call does not name one.
    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Normalized gateway endpoint.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issues a plain chat completion.
    ///
    /// Assembles `[system?, ...history, user]`, merges per-call params over
    /// the configured defaults, and sends `POST /chat/completions` under the
    /// timeout/retry protocol.
    ///
    /// # Errors
    ///
    /// `INVALID_INPUT` on a blank user message (before any network activity),
    /// transport/HTTP errors per the retry protocol, `EMPTY_RESPONSE` /
    /// `EMPTY_MESSAGE` on degenerate replies.
    pub async fn create_chat_completion(
        &self,
        input: ChatInput,
    ) -> Result<ChatResult, OpenRouterError> {
        let payload = self.build_payload(&input)?;
        let raw = self.request("/chat/completions", Some(&payload)).await?;
        parse_chat_result(raw)
    }

    /// Issues a schema-constrained completion and validates the reply.
    ///
    /// The schema is wrapped into a strict `response_format` directive,
    /// replacing any directive already present on the input. The reply text
    /// is parsed as JSON, validated against `schema` collecting every
    /// violation, and finally deserialized into `T`.
    ///
    /// # Errors
    ///
    /// Everything [`OpenRouterClient::create_chat_completion`] can fail with,
    /// plus `INVALID_JSON` when the reply is not parseable and
    /// `SCHEMA_VALIDATION_FAILED` carrying all violations found.
    pub async fn create_structured_completion<T: DeserializeOwned>(
        &self,
        mut input: ChatInput,
        schema: &JsonSchema,
    ) -> Result<StructuredResult<T>, OpenRouterError> {
        input.response_format = Some(ResponseFormat::strict_schema(schema.clone()));
        let payload = self.build_payload(&input)?;
        let raw = self.request("/chat/completions", Some(&payload)).await?;
        let chat = parse_chat_result(raw)?;

        let value: Value =
            serde_json::from_str(&chat.content).map_err(|err| OpenRouterError::InvalidJson {
                message: err.to_string(),
            })?;

        let violations = schema.validate(&value);
        if !violations.is_empty() {
            return Err(OpenRouterError::SchemaValidation { violations });
        }

        let data = serde_json::from_value(value).map_err(|err| OpenRouterError::InvalidJson {
            message: format!("failed to deserialize structured payload: {err}"),
        })?;

        Ok(StructuredResult {
            data,
            model: chat.model,
            finish_reason: chat.finish_reason,
            request_id: chat.request_id,
            raw: chat.raw,
        })
    }

    /// Probes the gateway with `GET /models`.
    ///
    /// Health checks are polled, so failures are reported as a value instead
    /// of aborting the caller's control flow; this method never returns an
    /// error.
    pub async fn health_check(&self) -> HealthStatus {
        match self.request("/models", None).await {
            Ok(raw) => HealthStatus {
                ok: true,
                status: None,
                request_id: body_request_id(&raw),
                message: None,
            },
            Err(error) => HealthStatus {
                ok: false,
                status: error.status(),
                request_id: request_id_from_details(&error),
                message: Some(error.to_string()),
            },
        }
    }

    /// Validates input and builds the wire payload for a completion call.
    fn build_payload(&self, input: &ChatInput) -> Result<CompletionPayload, OpenRouterError> {
        let user = input.user.trim();
        if user.is_empty() {
            return Err(OpenRouterError::invalid_input("user message is required"));
        }

        let model = input
            .model
            .as_deref()
            .map(str::trim)
            .filter(|model| !model.is_empty())
            .unwrap_or(&self.default_model)
            .to_string();
        if model.is_empty() {
            // Construction guarantees a default model; kept as a terminal guard.
            return Err(OpenRouterError::MissingModel);
        }

        let params = input
            .params
            .clone()
            .unwrap_or_default()
            .merged_over(&self.default_params);
        params.validate()?;

        let mut messages = Vec::with_capacity(input.history.len() + 2);
        if let Some(system) = input
            .system
            .as_deref()
            .map(str::trim)
            .filter(|system| !system.is_empty())
        {
            messages.push(Message::new(Role::System, system));
        }
        messages.extend(input.history.iter().cloned());
        messages.push(Message::new(Role::User, user));

        Ok(CompletionPayload {
            model,
            messages,
            params,
            response_format: input.response_format.clone(),
        })
    }

    fn build_headers(&self, json_body: bool) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert(
            "Authorization".to_string(),
            format!("Bearer {}", self.api_key),
        );
        if json_body {
            headers.insert("Content-Type".to_string(), "application/json".to_string());
        }
        if let Some(app_url) = &self.app_url {
            headers.insert("HTTP-Referer".to_string(), app_url.clone());
        }
        if let Some(app_name) = &self.app_name {
            headers.insert("X-Title".to_string(), app_name.clone());
        }
        headers
    }

    /// Drives one gateway exchange under the timeout/retry protocol.
    ///
    /// The body is serialized once so every retry reissues identical bytes.
    /// Retries are strictly sequential; the attempt counter is local to the
    /// call, keeping concurrent calls independent.
    async fn request(
        &self,
        path: &str,
        body: Option<&CompletionPayload>,
    ) -> Result<Value, OpenRouterError> {
        let url = format!("{}{}", self.base_url, path);
        let body = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|err| OpenRouterError::request(format!("failed to serialize request: {err}")))?;

        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            let request = match &body {
                Some(bytes) => HttpRequest::post_json(&url, bytes.clone()),
                None => HttpRequest::get(&url),
            }
            .with_headers(self.build_headers(body.is_some()));

            let outcome = tokio::time::timeout(self.timeout, self.transport.send(request)).await;
            let error = match outcome {
                // Timeout elapsed: the in-flight future is dropped, aborting
                // the transport call, and the attempt counts as retryable.
                Err(_) => OpenRouterError::Timeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                },
                Ok(Err(transport_error)) => transport_error,
                Ok(Ok(response)) => {
                    if (200..300).contains(&response.status) {
                        return Ok(decode_success(response));
                    }
                    build_http_error(response)
                }
            };

            if error.retryable() && attempt < self.max_retries {
                debug!(
                    code = error.code(),
                    attempt,
                    url = %url,
                    "retrying OpenRouter request"
                );
                tokio::time::sleep(retry_delay(attempt)).await;
                last_error = Some(error);
                continue;
            }

            log_final_error(&error);
            return Err(error);
        }

        let error = last_error.unwrap_or(OpenRouterError::RequestFailed);
        log_final_error(&error);
        Err(error)
    }
}

/// Exponential backoff: 300ms doubling per attempt, capped at 2000ms.
fn retry_delay(attempt: u32) -> Duration {
    let factor = 1u64 << attempt.min(16);
    Duration::from_millis(RETRY_MAX_DELAY_MS.min(RETRY_BASE_DELAY_MS.saturating_mul(factor)))
}

fn log_final_error(error: &OpenRouterError) {
    warn!(
        code = error.code(),
        status = error.status(),
        retryable = error.retryable(),
        message = %error,
        "OpenRouter request failed"
    );
}

fn header_request_id(response: &HttpResponse) -> Option<String> {
    REQUEST_ID_HEADERS
        .iter()
        .find_map(|name| response.header(name))
        .map(str::to_string)
}

/// Parses a 2xx body as JSON (falling back to raw text) and stamps the
/// header-sourced request id into the payload, header winning over any body
/// `request_id` field.
fn decode_success(response: HttpResponse) -> Value {
    let request_id = header_request_id(&response);
    let mut value = serde_json::from_slice::<Value>(&response.body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&response.body).into_owned()));

    if let (Some(id), Value::Object(map)) = (request_id, &mut value) {
        map.insert("request_id".to_string(), Value::String(id));
    }
    value
}

fn build_http_error(response: HttpResponse) -> OpenRouterError {
    let status = response.status;
    let request_id = header_request_id(&response);
    let payload = serde_json::from_slice::<Value>(&response.body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&response.body).into_owned()));

    let message = extract_error_message(&payload)
        .unwrap_or_else(|| format!("OpenRouter request failed with status {status}"));

    let id_detail = serde_json::json!({ "requestId": request_id });
    let details = match &payload {
        Value::String(text) if text.is_empty() => vec![id_detail],
        _ => vec![payload, id_detail],
    };

    OpenRouterError::http(status, message, details)
}

fn extract_error_message(payload: &Value) -> Option<String> {
    let object = payload.as_object()?;
    for key in ["error", "message"] {
        if let Some(Value::String(message)) = object.get(key) {
            return Some(message.clone());
        }
    }
    None
}

fn body_request_id(payload: &Value) -> Option<String> {
    payload
        .get("request_id")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn request_id_from_details(error: &OpenRouterError) -> Option<String> {
    let OpenRouterError::Http { details, .. } = error else {
        return None;
    };
    details
        .iter()
        .find_map(|detail| detail.get("requestId"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn parse_chat_result(raw: Value) -> Result<ChatResult, OpenRouterError> {
    let wire: WireResponse = serde_json::from_value(raw.clone()).unwrap_or_default();

    let Some(first) = wire.choices.first() else {
        return Err(OpenRouterError::EmptyResponse);
    };

    let content = first
        .message
        .content
        .as_deref()
        .filter(|content| !content.is_empty())
        .ok_or(OpenRouterError::EmptyMessage)?
        .to_string();

    Ok(ChatResult {
        content,
        model: wire.model,
        finish_reason: first.finish_reason.clone(),
        request_id: wire.request_id,
        raw,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::http::HttpTransport;

    /// Transport that panics if reached; construction and payload assembly
    /// must never touch the network.
    struct PanicTransport;

    #[async_trait]
    impl HttpTransport for PanicTransport {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, OpenRouterError> {
            panic!("transport should not be reached");
        }
    }

    fn client() -> OpenRouterClient {
        OpenRouterClient::new(
            Arc::new(PanicTransport),
            OpenRouterConfig::new("k", "openai/gpt-4.1-mini"),
        )
        .expect("client builds")
    }

    #[test]
    fn construction_requires_api_key_and_model() {
        let missing_key = OpenRouterClient::new(
            Arc::new(PanicTransport),
            OpenRouterConfig::new("   ", "openai/gpt-4.1-mini"),
        )
        .expect_err("blank key should fail");
        assert_eq!(missing_key.code(), "MISSING_API_KEY");

        let missing_model =
            OpenRouterClient::new(Arc::new(PanicTransport), OpenRouterConfig::new("k", ""))
                .expect_err("blank model should fail");
        assert_eq!(missing_model.code(), "MISSING_DEFAULT_MODEL");
    }

    #[test]
    fn construction_normalizes_base_url() {
        let client = OpenRouterClient::new(Arc::new(PanicTransport), {
            let mut config = OpenRouterConfig::new("k", "m");
            config.base_url = Some("https://proxy.internal/api/".to_string());
            config
        })
        .expect("client builds");

        assert_eq!(client.base_url(), "https://proxy.internal/api");
    }

    #[test]
    fn payload_ends_with_single_trimmed_user_message() {
        let payload = client()
            .build_payload(&ChatInput::user("  Hi there  "))
            .expect("payload builds");

        assert_eq!(payload.messages.len(), 1);
        let last = payload.messages.last().expect("user message present");
        assert_eq!(last.role, Role::User);
        assert_eq!(last.content, "Hi there");
    }

    #[test]
    fn payload_orders_system_history_user() {
        let input = ChatInput {
            system: Some("Be brief.".to_string()),
            user: "Next question".to_string(),
            history: vec![
                Message::new(Role::User, "First question"),
                Message::new(Role::Assistant, "First answer"),
            ],
            ..ChatInput::default()
        };

        let payload = client().build_payload(&input).expect("payload builds");
        let roles: Vec<Role> = payload.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(payload.messages.len(), input.history.len() + 2);
    }

    #[test]
    fn blank_system_prompt_is_omitted() {
        let input = ChatInput {
            system: Some("   ".to_string()),
            user: "Hi".to_string(),
            history: vec![Message::new(Role::Assistant, "earlier")],
            ..ChatInput::default()
        };

        let payload = client().build_payload(&input).expect("payload builds");
        assert_eq!(payload.messages.len(), input.history.len() + 1);
        assert_eq!(payload.messages[0].role, Role::Assistant);
    }

    #[test]
    fn blank_user_is_rejected_before_any_network_call() {
        let err = client()
            .build_payload(&ChatInput::user("   "))
            .expect_err("blank user should fail");
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    #[test]
    fn explicit_model_overrides_default() {
        let input = ChatInput {
            model: Some("anthropic/claude-sonnet-4".to_string()),
            ..ChatInput::user("Hi")
        };
        let payload = client().build_payload(&input).expect("payload builds");
        assert_eq!(payload.model, "anthropic/claude-sonnet-4");

        let blank_model = ChatInput {
            model: Some("  ".to_string()),
            ..ChatInput::user("Hi")
        };
        let payload = client().build_payload(&blank_model).expect("payload builds");
        assert_eq!(payload.model, "openai/gpt-4.1-mini");
    }

    #[test]
    fn call_params_merge_over_configured_defaults() {
        let client = OpenRouterClient::new(Arc::new(PanicTransport), {
            let mut config = OpenRouterConfig::new("k", "m");
            config.default_params = ModelParams {
                temperature: Some(0.1),
                max_tokens: Some(256),
                ..ModelParams::default()
            };
            config
        })
        .expect("client builds");

        let input = ChatInput {
            params: Some(ModelParams {
                temperature: Some(1.3),
                ..ModelParams::default()
            }),
            ..ChatInput::user("Hi")
        };

        let payload = client.build_payload(&input).expect("payload builds");
        assert_eq!(payload.params.temperature, Some(1.3));
        assert_eq!(payload.params.max_tokens, Some(256));
    }

    #[test]
    fn out_of_range_call_params_are_rejected() {
        let input = ChatInput {
            params: Some(ModelParams {
                top_p: Some(1.5),
                ..ModelParams::default()
            }),
            ..ChatInput::user("Hi")
        };

        let err = client()
            .build_payload(&input)
            .expect_err("top_p out of range");
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    #[test]
    fn retry_delay_doubles_and_caps() {
        assert_eq!(retry_delay(0), Duration::from_millis(300));
        assert_eq!(retry_delay(1), Duration::from_millis(600));
        assert_eq!(retry_delay(2), Duration::from_millis(1200));
        assert_eq!(retry_delay(3), Duration::from_millis(2000));
        assert_eq!(retry_delay(30), Duration::from_millis(2000));
    }

    #[test]
    fn empty_choices_and_empty_content_are_distinct_errors() {
        let no_choices = serde_json::json!({"model": "m", "choices": []});
        assert_eq!(
            parse_chat_result(no_choices).expect_err("no choices").code(),
            "EMPTY_RESPONSE"
        );

        let empty_content = serde_json::json!({
            "model": "m",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": ""}}]
        });
        assert_eq!(
            parse_chat_result(empty_content)
                .expect_err("empty content")
                .code(),
            "EMPTY_MESSAGE"
        );
    }

    #[test]
    fn non_json_success_body_surfaces_as_empty_response() {
        let raw = decode_success(HttpResponse {
            status: 200,
            headers: HashMap::new(),
            body: b"plain text".to_vec(),
        });
        assert_eq!(
            parse_chat_result(raw).expect_err("text body").code(),
            "EMPTY_RESPONSE"
        );
    }

    #[test]
    fn header_request_id_overrides_body_field() {
        let response = HttpResponse {
            status: 200,
            headers: HashMap::from([("x-request-id".to_string(), "req_header".to_string())]),
            body: serde_json::to_vec(&serde_json::json!({
                "model": "m",
                "request_id": "req_body",
                "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hello"}}]
            }))
            .expect("body serializes"),
        };

        let result = parse_chat_result(decode_success(response)).expect("parses");
        assert_eq!(result.request_id.as_deref(), Some("req_header"));
    }

    #[test]
    fn http_error_message_prefers_error_then_message_field() {
        let from_error = build_http_error(HttpResponse {
            status: 429,
            headers: HashMap::new(),
            body: br#"{"error": "slow down"}"#.to_vec(),
        });
        assert_eq!(from_error.to_string(), "slow down");
        assert!(from_error.retryable());

        let from_message = build_http_error(HttpResponse {
            status: 400,
            headers: HashMap::new(),
            body: br#"{"message": "bad payload"}"#.to_vec(),
        });
        assert_eq!(from_message.to_string(), "bad payload");
        assert!(!from_message.retryable());

        let fallback = build_http_error(HttpResponse {
            status: 404,
            headers: HashMap::new(),
            body: b"not found".to_vec(),
        });
        assert_eq!(
            fallback.to_string(),
            "OpenRouter request failed with status 404"
        );
    }
}
