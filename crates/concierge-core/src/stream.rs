//! Streamed chat responses
//!
//! The answer is computed in full, then replayed as a token sequence that
//! always ends with exactly one terminal event.

use crate::pipeline::{ChatRequest, QueryPipeline, ResponseMetadata};
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Characters per streamed token
pub const CHUNK_CHARS: usize = 16;

/// One event of a streamed answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StreamEvent {
    Token { text: String },
    /// Terminal; carries the same metadata as a non-streamed response
    Done { meta: ResponseMetadata },
    /// Terminal
    Error { message: String, retryable: bool },
}

impl StreamEvent {
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Token { .. })
    }
}

/// Split on char boundaries into pieces of at most `size` chars
#[must_use]
pub fn chunk_answer(answer: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = answer.chars().collect();
    chars
        .chunks(size.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

impl QueryPipeline {
    /// Answer as a token stream terminated by `Done` or `Error`
    pub fn answer_stream(self: &Arc<Self>, request: ChatRequest) -> BoxStream<'static, StreamEvent> {
        let pipeline = Arc::clone(self);
        stream::once(async move { pipeline.answer(&request).await })
            .flat_map(|result| {
                let events: Vec<StreamEvent> = match result {
                    Ok(response) => chunk_answer(&response.answer, CHUNK_CHARS)
                        .into_iter()
                        .map(|text| StreamEvent::Token { text })
                        .chain(std::iter::once(StreamEvent::Done { meta: response.meta }))
                        .collect(),
                    Err(err) => vec![StreamEvent::Error {
                        message: err.to_string(),
                        retryable: err.is_retryable(),
                    }],
                };
                stream::iter(events)
            })
            .boxed()
    }
}
