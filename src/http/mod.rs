use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::OpenRouterError;

/// Enumerates HTTP methods understood by the lightweight transport abstraction.
///
/// The gateway wire surface only needs `POST /chat/completions` and
/// `GET /models`, so the abstraction stays deliberately small.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Minimal HTTP request representation handed to the transport.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Builds a POST request carrying a serialized JSON body.
    ///
    /// The helper sets the `Content-Type` header to `application/json` and
    /// stores the provided buffer as the body.
    ///
    /// # Examples
    ///
    /// ```
    /// use openrouter_gateway::http::{HttpMethod, HttpRequest};
    ///
    /// let request = HttpRequest::post_json("https://example.com", br"{}".to_vec());
    /// assert_eq!(request.method, HttpMethod::Post);
    /// assert_eq!(request.headers.get("Content-Type"), Some(&"application/json".to_string()));
    /// ```
    pub fn post_json(url: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: HashMap::from([("Content-Type".to_string(), "application/json".to_string())]),
            body: Some(body),
        }
    }

    /// Builds a bodyless GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
        }
    }

    /// Overrides the request headers after construction.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::collections::HashMap;
    /// use openrouter_gateway::http::HttpRequest;
    ///
    /// let request = HttpRequest::get("https://example.com")
    ///     .with_headers(HashMap::from([("Authorization".into(), "Bearer test".into())]));
    /// assert_eq!(request.headers.get("Authorization"), Some(&"Bearer test".to_string()));
    /// ```
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }
}

/// Minimal HTTP response representation.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Converts the body into a UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns [`OpenRouterError::Request`] when the body cannot be
    /// interpreted as UTF-8.
    pub fn into_string(self) -> Result<String, OpenRouterError> {
        String::from_utf8(self.body).map_err(|err| OpenRouterError::request(err.to_string()))
    }

    /// Looks up a response header, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Transport abstraction used to decouple the client from the concrete HTTP
/// stack, so tests can substitute in-memory implementations.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends a request and resolves when the full response is available.
    ///
    /// # Errors
    ///
    /// Implementations should map transport failures to
    /// [`OpenRouterError::Request`]; HTTP-level status handling belongs to the
    /// caller.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, OpenRouterError>;
}

/// Thread-safe handle to a transport implementation.
pub type DynHttpTransport = Arc<dyn HttpTransport>;

pub mod reqwest;
