use crate::error::RagError;
use serde::{Deserialize, Serialize};

/// Sent to the completion provider when a query does not define its own.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a knowledgeable assistant. \
Answer questions using the provided documents and cite the document names you relied on. \
If the answer is not in the documents, say so clearly instead of guessing, \
then offer the best general guidance you can.";

/// Sent after the context so the conversation alternates roles.
const CONTEXT_ACKNOWLEDGEMENT: &str =
    "I have read the provided documents and am ready to answer your questions.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single conversation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Everything a completion provider needs to answer a question.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub system_prompt: &'a str,

    /// Retrieved documents, formatted and joined.
    pub context: &'a str,

    /// Prior conversation, oldest first. Does not contain `question`.
    pub history: &'a [Message],

    pub question: &'a str,

    pub temperature: f32,

    pub max_tokens: u32,
}

impl CompletionRequest<'_> {
    /// Chat transcript in the order providers receive it: the system prompt,
    /// the context as a user message followed by an acknowledgement,
    /// the history and finally the question.
    pub fn messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.history.len() + 4);

        messages.push(Message::system(self.system_prompt));
        messages.push(Message::user(format!(
            "Available documents:\n{}",
            self.context
        )));
        messages.push(Message::assistant(CONTEXT_ACKNOWLEDGEMENT));
        messages.extend(self.history.iter().cloned());
        messages.push(Message::user(self.question));

        messages
    }
}

/// Token usage reported for a completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

impl Usage {
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Rough estimate for providers that do not report usage, 1 token per 4 characters.
    pub fn estimate(prompt: &[Message], answer: &str) -> Self {
        let prompt_chars: usize = prompt.iter().map(|m| m.content.chars().count()).sum();
        Self::new(prompt_chars / 4, answer.chars().count() / 4)
    }
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub answer: String,
    pub usage: Usage,
}

/// Operations related to answer generation.
#[async_trait::async_trait]
pub trait Completer: Send + Sync {
    fn id(&self) -> &'static str;

    /// The model answering the requests.
    fn model(&self) -> &str;

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Completion, RagError>;
}
