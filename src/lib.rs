//! Typed client for the OpenRouter chat-completion gateway.
//!
//! One component: [`OpenRouterClient`] owns connection configuration, builds
//! chat-completion requests (plain or schema-constrained), executes them with
//! a per-attempt timeout and bounded retries, and validates structured output
//! against a caller-supplied JSON Schema subset.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod schema;
pub mod types;

pub use client::OpenRouterClient;
pub use config::OpenRouterConfig;
pub use error::OpenRouterError;
pub use schema::JsonSchema;
pub use types::*;
