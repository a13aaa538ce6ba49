use super::REQUEST_TIMEOUT;
use crate::{
    core::completion::{Completer, Completion, CompletionRequest, Message, Usage},
    err,
    error::RagError,
    map_err,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

pub use ragkit_embedders::openai::DEFAULT_OPENAI_ENDPOINT;

pub const DEFAULT_OPENAI_CHAT_MODEL: &str = "gpt-4o-mini";

/// Answers through the OpenAI chat completions API.
pub struct OpenAiCompleter {
    endpoint: String,
    key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiCompleter {
    pub fn new(api_key: &str, endpoint: &str, model: &str) -> Result<Self, RagError> {
        let client = map_err!(reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build());
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            key: api_key.to_string(),
            model: model.to_string(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl Completer for OpenAiCompleter {
    fn id(&self) -> &'static str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Completion, RagError> {
        let messages = request.messages();

        let body = ChatRequest {
            model: &self.model,
            messages: &messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = match self
            .client
            .post(format!("{}/v1/chat/completions", self.endpoint))
            .bearer_auth(&self.key)
            .json(&body)
            .send()
            .await
        {
            Ok(res) => res,
            Err(e) => {
                error!("Error in OpenAI request: {e}");
                return Err(RagError::new(file!(), line!(), column!(), e.into()));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            error!("OpenAI chat request failed with status {status}: {text}");
            return err!(Completion, "OpenAI returned {status}: {text}");
        }

        let response: ChatResponse = map_err!(response.json().await);
        let completion = into_completion(response, &messages)?;

        debug!(
            "Completed with '{}', used tokens {}-{} (prompt-total)",
            self.model, completion.usage.prompt_tokens, completion.usage.total_tokens
        );

        Ok(completion)
    }
}

impl std::fmt::Debug for OpenAiCompleter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompleter")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish()
    }
}

fn into_completion(response: ChatResponse, messages: &[Message]) -> Result<Completion, RagError> {
    let Some(answer) = response
        .choices
        .into_iter()
        .find_map(|choice| choice.message.content)
    else {
        return err!(Completion, "OpenAI response contains no answer");
    };

    let usage = match response.usage {
        Some(usage) => Usage::new(usage.prompt_tokens, usage.completion_tokens),
        None => Usage::estimate(messages, &answer),
    };

    Ok(Completion { answer, usage })
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
}
