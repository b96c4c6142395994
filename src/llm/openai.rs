//! The two concrete providers: third-party chat service and self-hosted
//! OpenAI-compatible inference service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::wire::{ChatCompletionRequest, ChatCompletionResponse};
use super::LlmInvoker;
use crate::errors::{Error, Result};
use crate::types::ChatMessage;

/// Shared request path once base URL and auth header are fixed.
struct ChatEndpoint {
    client: Client,
    url: String,
    bearer: Option<String>,
    provider: &'static str,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl ChatEndpoint {
    fn new(
        base: String,
        bearer: Option<String>,
        provider: &'static str,
        model: String,
        temperature: f32,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            Error::llm(
                format!("failed to build HTTP client: {e}"),
                provider,
                &model,
            )
        })?;
        Ok(Self {
            client,
            url: format!("{}/chat/completions", base.trim_end_matches('/')),
            bearer,
            provider,
            model,
            temperature,
            max_tokens,
        })
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let body =
            ChatCompletionRequest::new(&self.model, self.temperature, self.max_tokens, messages);

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.bearer {
            request = request.bearer_auth(key);
        }

        debug!(
            provider = self.provider,
            model = %self.model,
            messages = messages.len(),
            "sending chat completion request"
        );

        let response = request.send().await.map_err(|e| {
            Error::llm(format!("request failed: {e}"), self.provider, &self.model)
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<response unavailable>".to_string());
            return Err(Error::llm(
                format!("provider returned {status}: {text}"),
                self.provider,
                &self.model,
            ));
        }

        let response: ChatCompletionResponse = response.json().await.map_err(|e| {
            Error::llm(format!("response invalid: {e}"), self.provider, &self.model)
        })?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_text())
            .ok_or_else(|| {
                Error::llm("response missing content", self.provider, &self.model)
            })
    }
}

/// Third-party chat-completions provider (api.openai.com or a compatible
/// gateway).
pub struct OpenAiInvoker {
    endpoint: ChatEndpoint,
}

impl OpenAiInvoker {
    pub fn new(
        api_base: String,
        api_key: String,
        model: String,
        temperature: f32,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            endpoint: ChatEndpoint::new(
                api_base,
                Some(api_key),
                "openai",
                model,
                temperature,
                max_tokens,
                timeout,
            )?,
        })
    }
}

#[async_trait]
impl LlmInvoker for OpenAiInvoker {
    fn provider(&self) -> &str {
        self.endpoint.provider
    }

    fn model(&self) -> &str {
        &self.endpoint.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.endpoint.complete(messages).await
    }
}

/// Self-hosted OpenAI-compatible inference service. Auth token optional.
pub struct LocalInvoker {
    endpoint: ChatEndpoint,
}

impl LocalInvoker {
    pub fn new(
        endpoint: String,
        token: Option<String>,
        model: String,
        temperature: f32,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            endpoint: ChatEndpoint::new(
                endpoint,
                token,
                "local",
                model,
                temperature,
                max_tokens,
                timeout,
            )?,
        })
    }
}

#[async_trait]
impl LlmInvoker for LocalInvoker {
    fn provider(&self) -> &str {
        self.endpoint.provider
    }

    fn model(&self) -> &str {
        &self.endpoint.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.endpoint.complete(messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_url_joins_without_double_slash() {
        let endpoint = ChatEndpoint::new(
            "http://127.0.0.1:8000/v1/".to_string(),
            None,
            "local",
            "qwen2.5".to_string(),
            0.3,
            512,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(endpoint.url, "http://127.0.0.1:8000/v1/chat/completions");
    }

    #[test]
    fn invoker_reports_identity() {
        let invoker = LocalInvoker::new(
            "http://127.0.0.1:8000/v1".to_string(),
            None,
            "qwen2.5".to_string(),
            0.3,
            512,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(invoker.provider(), "local");
        assert_eq!(invoker.model(), "qwen2.5");
    }
}
