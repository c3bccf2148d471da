//! External model provider seams
//!
//! The embedding and completion models live outside this system. Everything
//! that needs them receives an `Arc<dyn ...Provider>` at construction time.

use crate::embedding::Embedding;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Provider call failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Call exceeded its deadline
    #[error("provider timed out after {0:?}")]
    Timeout(Duration),

    /// Provider unreachable or returned a server error
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// Provider answered with something we could not use
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    #[inline]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }

    #[inline]
    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse(reason.into())
    }

    /// Whether another attempt may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Unavailable(_))
    }
}

/// Text to vector
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier, part of every cache key derived from its output
    fn model(&self) -> &str;

    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Embedding, ProviderError>;
}

/// Chat role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Completion call parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    #[must_use]
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            temperature: 0.2,
            max_tokens: 800,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Prompt to text
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn model(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(ProviderError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(ProviderError::unavailable("503").is_retryable());
        assert!(!ProviderError::invalid_response("not json").is_retryable());
    }

    #[test]
    fn request_builder() {
        let req = CompletionRequest::new(vec![ChatMessage::user("hi")])
            .with_temperature(0.0)
            .with_max_tokens(10);
        assert_eq!(req.max_tokens, 10);
        assert_eq!(req.messages[0].role, Role::User);
    }
}
