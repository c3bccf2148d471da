//! HTTP clients for OpenAI-compatible embedding and chat-completion APIs

use async_trait::async_trait;
use concierge_model::{
    ChatMessage, CompletionProvider, CompletionRequest, Embedding, EmbeddingProvider, ProviderError,
};
use reqwest::{Client as HttpClient, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Endpoint settings shared by both clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl EndpointConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key: None,
            timeout: Duration::from_secs(10),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.trim_end_matches('/'))
    }
}

fn build_client(config: &EndpointConfig) -> Result<HttpClient, ProviderError> {
    HttpClient::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(config.timeout)
        .build()
        .map_err(|err| ProviderError::unavailable(format!("failed to build HTTP client: {err}")))
}

fn transport_error(err: &reqwest::Error, timeout: Duration) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(timeout)
    } else {
        ProviderError::unavailable(err.to_string())
    }
}

/// 5xx and 429 are worth retrying; other failures are the request's fault
fn status_error(status: StatusCode, body: &str) -> ProviderError {
    let snippet: String = body.chars().take(200).collect();
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        ProviderError::unavailable(format!("HTTP {status}: {snippet}"))
    } else {
        ProviderError::invalid_response(format!("HTTP {status}: {snippet}"))
    }
}

async fn post_json<Req, Resp>(
    http: &HttpClient,
    config: &EndpointConfig,
    path: &str,
    body: &Req,
) -> Result<Resp, ProviderError>
where
    Req: Serialize + Sync,
    Resp: for<'de> Deserialize<'de>,
{
    let mut request = http.post(config.url(path)).json(body);
    if let Some(key) = &config.api_key {
        request = request.bearer_auth(key);
    }

    let response = request
        .send()
        .await
        .map_err(|err| transport_error(&err, config.timeout))?;
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(status_error(status, &text));
    }
    response
        .json::<Resp>()
        .await
        .map_err(|err| ProviderError::invalid_response(format!("{path}: {err}")))
}

#[derive(Serialize)]
struct EmbeddingBody<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingReply {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// `POST {base}/embeddings`
pub struct HttpEmbedder {
    http: HttpClient,
    config: EndpointConfig,
}

impl HttpEmbedder {
    /// # Errors
    /// `ProviderError::Unavailable` when the HTTP client cannot be built
    pub fn new(config: EndpointConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            http: build_client(&config)?,
            config,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedder {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn embed(&self, text: &str) -> Result<Embedding, ProviderError> {
        let body = EmbeddingBody {
            model: &self.config.model,
            input: text,
        };
        let reply: EmbeddingReply = post_json(&self.http, &self.config, "embeddings", &body).await?;
        let vector = reply
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ProviderError::invalid_response("embedding reply has no vector"))?;
        Ok(Embedding::new(vector))
    }
}

impl std::fmt::Debug for HttpEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEmbedder")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatReply {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Deserialize)]
struct ChatReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

/// `POST {base}/chat/completions`
pub struct HttpCompletion {
    http: HttpClient,
    config: EndpointConfig,
}

impl HttpCompletion {
    /// # Errors
    /// `ProviderError::Unavailable` when the HTTP client cannot be built
    pub fn new(config: EndpointConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            http: build_client(&config)?,
            config,
        })
    }
}

#[async_trait]
impl CompletionProvider for HttpCompletion {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let body = ChatBody {
            model: &self.config.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };
        let reply: ChatReply = post_json(&self.http, &self.config, "chat/completions", &body).await?;
        reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::invalid_response("completion reply has no content"))
    }
}

impl std::fmt::Debug for HttpCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCompletion")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_join_without_double_slash() {
        let config = EndpointConfig::new("http://localhost:8000/v1/", "m");
        assert_eq!(config.url("embeddings"), "http://localhost:8000/v1/embeddings");
    }

    #[test]
    fn server_errors_are_retryable_client_errors_are_not() {
        assert!(status_error(StatusCode::BAD_GATEWAY, "").is_retryable());
        assert!(status_error(StatusCode::TOO_MANY_REQUESTS, "").is_retryable());
        assert!(!status_error(StatusCode::UNAUTHORIZED, "bad key").is_retryable());
    }

    #[test]
    fn chat_reply_parses_openai_shape() {
        let raw = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"好的"}}]}"#;
        let reply: ChatReply = serde_json::from_str(raw).unwrap();
        assert_eq!(reply.choices[0].message.content.as_deref(), Some("好的"));
    }
}
