//! Chat-completions wire types shared by both providers.

use serde::{Deserialize, Serialize};

use crate::types::ChatMessage;

#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionRequest {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub messages: Vec<WireMessage>,
}

#[derive(Debug, Serialize)]
pub(crate) struct WireMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatCompletionRequest {
    pub fn new(model: &str, temperature: f32, max_tokens: u32, messages: &[ChatMessage]) -> Self {
        Self {
            model: model.to_string(),
            temperature,
            max_tokens,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.wire_role(),
                    content: m.content.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    pub choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionChoice {
    pub message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionMessage {
    pub content: ChatCompletionContent,
}

/// Providers answer with either a plain string or a parts array; both decode
/// to text.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ChatCompletionContent {
    Text(String),
    Parts(Vec<ChatCompletionPart>),
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionPart {
    #[serde(default)]
    pub text: Option<String>,
}

impl ChatCompletionContent {
    pub fn as_text(&self) -> Option<String> {
        match self {
            ChatCompletionContent::Text(value) => Some(value.clone()),
            ChatCompletionContent::Parts(parts) => {
                let text = parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("\n");
                if text.is_empty() {
                    None
                } else {
                    Some(text)
                }
            }
        }
    }
}
