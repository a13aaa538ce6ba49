use super::REQUEST_TIMEOUT;
use crate::{
    core::completion::{Completer, Completion, CompletionRequest, Message, Usage},
    err,
    error::RagError,
    map_err,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2:3b";

/// Answers through a local Ollama server.
#[derive(Debug)]
pub struct OllamaCompleter {
    url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaCompleter {
    pub fn new(url: &str, model: &str) -> Result<Self, RagError> {
        let client = map_err!(reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build());
        info!("Using Ollama model '{model}' at {url}");
        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl Completer for OllamaCompleter {
    fn id(&self) -> &'static str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Completion, RagError> {
        let messages = request.messages();

        let body = ChatRequest {
            model: &self.model,
            messages: &messages,
            stream: false,
            options: ChatOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        let response = match self
            .client
            .post(format!("{}/api/chat", self.url))
            .json(&body)
            .send()
            .await
        {
            Ok(res) => res,
            Err(e) => {
                error!("Error in Ollama request: {e}");
                return Err(RagError::new(file!(), line!(), column!(), e.into()));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            error!("Ollama chat request failed with status {status}: {text}");
            return err!(Completion, "Ollama returned {status}: {text}");
        }

        let response: ChatResponse = map_err!(response.json().await);
        let completion = into_completion(response, &messages);

        debug!(
            "Completed with '{}', used tokens {}-{} (prompt-total)",
            self.model, completion.usage.prompt_tokens, completion.usage.total_tokens
        );

        Ok(completion)
    }
}

/// Uses the evaluation counts when Ollama reports them, an estimate otherwise.
fn into_completion(response: ChatResponse, messages: &[Message]) -> Completion {
    let answer = response.message.content;

    let usage = match (response.prompt_eval_count, response.eval_count) {
        (Some(prompt), Some(completion)) => Usage::new(prompt, completion),
        _ => Usage::estimate(messages, &answer),
    };

    Completion { answer, usage }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
    prompt_eval_count: Option<usize>,
    eval_count: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}
