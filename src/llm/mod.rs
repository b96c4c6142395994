//! Model provider adapters.
//!
//! One [`LlmInvoker`] interface over two providers that differ only in URL
//! and authentication: a third-party chat service and a self-hosted
//! OpenAI-compatible inference service. Invokers are stateless across calls;
//! conversation continuity is the agent loop's responsibility.

mod openai;
mod wire;

pub use openai::{LocalInvoker, OpenAiInvoker};

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{LlmProviderKind, LlmSettings};
use crate::errors::{Error, Result};
use crate::types::ChatMessage;

/// Sends one message list to a provider and returns one assistant reply.
#[async_trait]
pub trait LlmInvoker: Send + Sync {
    fn provider(&self) -> &str;
    fn model(&self) -> &str;
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Build the configured provider.
pub fn invoker_from_settings(settings: &LlmSettings) -> Result<Arc<dyn LlmInvoker>> {
    match settings.provider {
        LlmProviderKind::OpenAi => {
            let api_key = settings.api_key.clone().ok_or_else(|| {
                Error::config_key(
                    "openai provider selected but no API key configured",
                    crate::config::ENV_OPENAI_API_KEY,
                )
            })?;
            Ok(Arc::new(OpenAiInvoker::new(
                settings.api_base.clone(),
                api_key,
                settings.model.clone(),
                settings.temperature,
                settings.max_tokens,
                settings.timeout(),
            )?))
        }
        LlmProviderKind::Local => Ok(Arc::new(LocalInvoker::new(
            settings.endpoint.clone(),
            settings.token.clone(),
            settings.model.clone(),
            settings.temperature,
            settings.max_tokens,
            settings.timeout(),
        )?)),
    }
}
