//! Multi-source answer synthesis

use crate::retry::RetryPolicy;
use concierge_model::{ChatMessage, CompletionProvider, CompletionRequest, ProviderError};
use concierge_retrieval::Candidate;
use std::fmt::Write as _;
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "你是物業管理客服。只根據提供的資料回答問題，整合多筆資料成一段完整、\
    條理清楚的繁體中文回覆；資料沒有提到的內容不要自行補充。";

/// Composes one answer from several retrieved sources
pub struct AnswerSynthesizer {
    provider: Arc<dyn CompletionProvider>,
    retry: RetryPolicy,
}

impl AnswerSynthesizer {
    #[must_use]
    pub fn new(provider: Arc<dyn CompletionProvider>, retry: RetryPolicy) -> Self {
        Self { provider, retry }
    }

    /// Prompt with the sources numbered in rank order
    #[must_use]
    pub fn request(question: &str, sources: &[Candidate]) -> CompletionRequest {
        let mut context = String::new();
        for (i, source) in sources.iter().enumerate() {
            let _ = writeln!(context, "[資料 {}] {}\n{}\n", i + 1, source.label(), source.body());
        }
        let user = format!("{context}問題: {question}");
        CompletionRequest::new(vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user)])
            .with_temperature(0.3)
    }

    /// # Errors
    /// Provider failure after retries, or `InvalidResponse` on an empty reply
    #[tracing::instrument(skip_all, fields(sources = sources.len(), model = self.provider.model()))]
    pub async fn synthesize(&self, question: &str, sources: &[Candidate]) -> Result<String, ProviderError> {
        let request = Self::request(question, sources);
        let reply = self
            .retry
            .run("synthesis", || self.provider.complete(&request))
            .await?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(ProviderError::invalid_response("empty synthesis"));
        }
        Ok(reply.to_string())
    }
}

impl std::fmt::Debug for AnswerSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerSynthesizer")
            .field("model", &self.provider.model())
            .field("retry", &self.retry)
            .finish()
    }
}
