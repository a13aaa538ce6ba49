//! Test suites and utilites.
//!
//! Deterministic providers so the pipeline can be tested without network access.

use crate::{
    core::{
        completion::{Completer, Completion, CompletionRequest, Message, Usage},
        embedder::Embedder,
        Chunk,
    },
    error::{RagErr, RagError},
};
use ragkit_embedders::error::EmbeddingError;
use std::sync::Mutex;

mod service;

pub fn chunk(chunk_id: usize, source: &str, text: &str) -> Chunk {
    Chunk {
        text: text.to_string(),
        source: source.to_string(),
        chunk_id,
        token_count: text.split_whitespace().count(),
    }
}

/// Bag of words embedder. Each lowercase word increments one hashed dimension,
/// so identical texts map to identical vectors and shared words pull vectors together.
#[derive(Debug)]
pub struct TestEmbedder {
    model: &'static str,
    dimension: usize,
    produced_dimension: usize,
    fail_from_call: Option<usize>,
    drop_last: bool,
    batches: Mutex<Vec<usize>>,
}

impl TestEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            model: "test-embedder",
            dimension,
            produced_dimension: dimension,
            fail_from_call: None,
            drop_last: false,
            batches: Mutex::new(vec![]),
        }
    }

    pub fn with_model(mut self, model: &'static str) -> Self {
        self.model = model;
        self
    }

    /// Fail every call starting with the `call`th (0 based).
    pub fn failing_from(mut self, call: usize) -> Self {
        self.fail_from_call = Some(call);
        self
    }

    /// Produce vectors of a different size than the reported dimension.
    pub fn producing(mut self, dimension: usize) -> Self {
        self.produced_dimension = dimension;
        self
    }

    /// Return one vector less than requested.
    pub fn dropping_last(mut self) -> Self {
        self.drop_last = true;
        self
    }

    /// Sizes of the batches embedded so far.
    pub fn batches(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.; self.produced_dimension];
        for word in text.split_whitespace() {
            let word = word
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if word.is_empty() {
                continue;
            }
            let hash = word
                .bytes()
                .fold(0xcbf29ce484222325_u64, |h, b| (h ^ b as u64).wrapping_mul(0x100000001b3));
            vector[(hash % self.produced_dimension as u64) as usize] += 1.;
        }
        vector
    }
}

#[async_trait::async_trait]
impl Embedder for TestEmbedder {
    fn id(&self) -> &'static str {
        "test"
    }

    fn model(&self) -> &str {
        self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, content: &[&str]) -> Result<Vec<Vec<f32>>, RagError> {
        let call = {
            let mut batches = self.batches.lock().unwrap();
            batches.push(content.len());
            batches.len() - 1
        };

        if self.fail_from_call.is_some_and(|from| call >= from) {
            return Err(RagError::new(
                file!(),
                line!(),
                column!(),
                RagErr::Embedding(EmbeddingError::InvalidInput(format!(
                    "call {call} set to fail"
                ))),
            ));
        }

        let mut vectors: Vec<_> = content.iter().map(|text| self.vector(text)).collect();
        if self.drop_last {
            vectors.pop();
        }

        Ok(vectors)
    }
}

/// Records the requests it receives and answers with a fixed text.
#[derive(Debug, Default)]
pub struct TestCompleter {
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Owned copy of a [CompletionRequest].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub system_prompt: String,
    pub context: String,
    pub history: Vec<Message>,
    pub question: String,
    pub messages: Vec<Message>,
}

pub const TEST_ANSWER: &str = "The answer is in the documents.";

impl TestCompleter {
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Completer for TestCompleter {
    fn id(&self) -> &'static str {
        "test"
    }

    fn model(&self) -> &str {
        "test-completer"
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Completion, RagError> {
        let messages = request.messages();
        let usage = Usage::estimate(&messages, TEST_ANSWER);

        self.requests.lock().unwrap().push(RecordedRequest {
            system_prompt: request.system_prompt.to_string(),
            context: request.context.to_string(),
            history: request.history.to_vec(),
            question: request.question.to_string(),
            messages,
        });

        Ok(Completion {
            answer: TEST_ANSWER.to_string(),
            usage,
        })
    }
}
