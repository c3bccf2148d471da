//! Testing utilities for the concierge workspace
//!
//! Deterministic provider fakes, a recording form sink, and a small rent
//! catalog fixture.

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

pub mod fixtures;

use async_trait::async_trait;
use concierge_forms::{CompletionSink, FormSession};
use concierge_model::{
    normalize_question, CompletionProvider, CompletionRequest, Embedding, EmbeddingProvider,
    FormSchema, ProviderError, StoreError,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Dimension of vectors made up for unregistered texts
///
/// Differs from the fixture dimension, so made-up vectors score 0 against
/// registered ones.
pub const HASHED_DIMENSIONS: usize = 16;

/// Embedding provider with registered vectors per (normalised) text
#[derive(Debug, Default)]
pub struct FakeEmbedder {
    vectors: Mutex<HashMap<String, Vec<f32>>>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl FakeEmbedder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(self, text: &str, vector: Vec<f32>) -> Self {
        self.insert(text, vector);
        self
    }

    pub fn insert(&self, text: &str, vector: Vec<f32>) {
        self.vectors.lock().insert(normalize_question(text), vector);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hashed(text: &str) -> Vec<f32> {
        let digest = blake3::hash(text.as_bytes());
        digest.as_bytes()[..HASHED_DIMENSIONS]
            .iter()
            .map(|b| f32::from(*b) / 127.5 - 1.0)
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    fn model(&self) -> &str {
        "fake-embed"
    }

    async fn embed(&self, text: &str) -> Result<Embedding, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::unavailable("fake embedder offline"));
        }
        let key = normalize_question(text);
        let vector = self
            .vectors
            .lock()
            .get(&key)
            .cloned()
            .unwrap_or_else(|| Self::hashed(&key));
        Ok(Embedding::new(vector))
    }
}

/// Completion provider replaying queued replies
///
/// Queued replies are consumed first; then the default reply is used, and
/// without one the call fails as unavailable.
#[derive(Debug, Default)]
pub struct ScriptedCompletion {
    queue: Mutex<VecDeque<Result<String, ProviderError>>>,
    default_reply: Option<String>,
    delay: Option<Duration>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_default(mut self, reply: impl Into<String>) -> Self {
        self.default_reply = Some(reply.into());
        self
    }

    /// Sleep before every reply
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.queue.lock().push_back(Ok(reply.into()));
    }

    pub fn push_error(&self, err: ProviderError) {
        self.queue.lock().push_back(Err(err));
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    #[must_use]
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletion {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        self.requests.lock().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let queued = self.queue.lock().pop_front();
        match queued {
            Some(reply) => reply,
            None => self
                .default_reply
                .clone()
                .ok_or_else(|| ProviderError::unavailable("no scripted reply")),
        }
    }
}

/// Form completion sink that keeps every completed session
#[derive(Debug, Default)]
pub struct RecordingSink {
    completed: Mutex<Vec<FormSession>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn completed(&self) -> Vec<FormSession> {
        self.completed.lock().clone()
    }
}

#[async_trait]
impl CompletionSink for RecordingSink {
    async fn on_completed(&self, session: &FormSession, _schema: &FormSchema) -> Result<(), StoreError> {
        self.completed.lock().push(session.clone());
        Ok(())
    }
}
