//! Application configuration resolved from the environment.
//!
//! Every tunable has a `QAPILOT_*` variable and a default that matches the
//! documented behavior. Numeric fields are validated at construction.
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `QAPILOT_LLM_PROVIDER` | `openai` or `local` | `openai` |
//! | `QAPILOT_OPENAI_API_KEY` | API key for the openai provider | - |
//! | `QAPILOT_OPENAI_API_BASE` | Chat-completions base URL | `https://api.openai.com/v1` |
//! | `QAPILOT_LLM_MODEL` | Model name | `gpt-4o` |
//! | `QAPILOT_LLM_ENDPOINT` | Self-hosted endpoint (local provider) | `http://127.0.0.1:8000/v1` |
//! | `QAPILOT_LLM_TOKEN` | Optional token for the local provider | - |
//! | `QAPILOT_LLM_TEMPERATURE` | Sampling temperature, 0..=2 | `0.3` |
//! | `QAPILOT_LLM_MAX_TOKENS` | Response token cap | `1024` |
//! | `QAPILOT_LLM_TIMEOUT_SECS` | Request timeout | `60` |
//! | `QAPILOT_BROWSER_ENGINE` | Default engine variant | `chromium` |
//! | `QAPILOT_HEADLESS` | Default headless flag | `true` |
//! | `QAPILOT_SCREENSHOT_DIR` | Where screenshots land | `./screenshots` |
//! | `QAPILOT_BIND_ADDR` | HTTP shell bind address | `127.0.0.1:8090` |

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::types::BrowserEngine;

pub const ENV_LLM_PROVIDER: &str = "QAPILOT_LLM_PROVIDER";
pub const ENV_OPENAI_API_KEY: &str = "QAPILOT_OPENAI_API_KEY";
pub const ENV_OPENAI_API_BASE: &str = "QAPILOT_OPENAI_API_BASE";
pub const ENV_LLM_MODEL: &str = "QAPILOT_LLM_MODEL";
pub const ENV_LLM_ENDPOINT: &str = "QAPILOT_LLM_ENDPOINT";
pub const ENV_LLM_TOKEN: &str = "QAPILOT_LLM_TOKEN";
pub const ENV_LLM_TEMPERATURE: &str = "QAPILOT_LLM_TEMPERATURE";
pub const ENV_LLM_MAX_TOKENS: &str = "QAPILOT_LLM_MAX_TOKENS";
pub const ENV_LLM_TIMEOUT_SECS: &str = "QAPILOT_LLM_TIMEOUT_SECS";
pub const ENV_BROWSER_ENGINE: &str = "QAPILOT_BROWSER_ENGINE";
pub const ENV_HEADLESS: &str = "QAPILOT_HEADLESS";
pub const ENV_SCREENSHOT_DIR: &str = "QAPILOT_SCREENSHOT_DIR";
pub const ENV_BIND_ADDR: &str = "QAPILOT_BIND_ADDR";

pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o";
pub const DEFAULT_LLM_ENDPOINT: &str = "http://127.0.0.1:8000/v1";
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_SCREENSHOT_DIR: &str = "./screenshots";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8090";

/// Which chat provider backs the invoker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    /// Third-party chat service (api.openai.com or a compatible gateway).
    OpenAi,
    /// Self-hosted OpenAI-compatible inference service.
    Local,
}

impl LlmProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProviderKind::OpenAi => "openai",
            LlmProviderKind::Local => "local",
        }
    }
}

/// Model-provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    pub provider: LlmProviderKind,
    pub api_key: Option<String>,
    pub api_base: String,
    pub endpoint: String,
    pub token: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl LlmSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Browser defaults applied when the instruction does not override them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSettings {
    pub engine: BrowserEngine,
    pub headless: bool,
    pub screenshot_dir: PathBuf,
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub llm: LlmSettings,
    pub browser: BrowserSettings,
    pub bind_addr: String,
}

impl AppConfig {
    /// Build the configuration from the environment, validating numeric
    /// fields at construction.
    pub fn from_env() -> Result<Self> {
        let provider = match env::var(ENV_LLM_PROVIDER).ok().as_deref() {
            None | Some("openai") => LlmProviderKind::OpenAi,
            Some("local") => LlmProviderKind::Local,
            Some(other) => {
                return Err(Error::config_key(
                    format!("unknown llm provider '{other}' (expected openai|local)"),
                    ENV_LLM_PROVIDER,
                ))
            }
        };

        let temperature = parse_env(ENV_LLM_TEMPERATURE, DEFAULT_TEMPERATURE)?;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(Error::config_key(
                format!("temperature {temperature} out of range [0, 2]"),
                ENV_LLM_TEMPERATURE,
            ));
        }

        let max_tokens: u32 = parse_env(ENV_LLM_MAX_TOKENS, DEFAULT_MAX_TOKENS)?;
        if max_tokens == 0 {
            return Err(Error::config_key(
                "max_tokens must be greater than zero",
                ENV_LLM_MAX_TOKENS,
            ));
        }

        let engine = match env::var(ENV_BROWSER_ENGINE) {
            Ok(raw) => BrowserEngine::parse(&raw)?,
            Err(_) => BrowserEngine::default(),
        };

        Ok(Self {
            llm: LlmSettings {
                provider,
                api_key: env::var(ENV_OPENAI_API_KEY).ok(),
                api_base: env::var(ENV_OPENAI_API_BASE)
                    .unwrap_or_else(|_| DEFAULT_OPENAI_API_BASE.to_string()),
                endpoint: env::var(ENV_LLM_ENDPOINT)
                    .unwrap_or_else(|_| DEFAULT_LLM_ENDPOINT.to_string()),
                token: env::var(ENV_LLM_TOKEN).ok(),
                model: env::var(ENV_LLM_MODEL).unwrap_or_else(|_| DEFAULT_LLM_MODEL.to_string()),
                temperature,
                max_tokens,
                timeout_secs: parse_env(ENV_LLM_TIMEOUT_SECS, DEFAULT_LLM_TIMEOUT_SECS)?,
            },
            browser: BrowserSettings {
                engine,
                headless: parse_headless(),
                screenshot_dir: PathBuf::from(
                    env::var(ENV_SCREENSHOT_DIR)
                        .unwrap_or_else(|_| DEFAULT_SCREENSHOT_DIR.to_string()),
                ),
            },
            bind_addr: env::var(ENV_BIND_ADDR).unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
        })
    }

    /// Configuration with all defaults, ignoring the environment.
    pub fn defaults() -> Self {
        Self {
            llm: LlmSettings {
                provider: LlmProviderKind::OpenAi,
                api_key: None,
                api_base: DEFAULT_OPENAI_API_BASE.to_string(),
                endpoint: DEFAULT_LLM_ENDPOINT.to_string(),
                token: None,
                model: DEFAULT_LLM_MODEL.to_string(),
                temperature: DEFAULT_TEMPERATURE,
                max_tokens: DEFAULT_MAX_TOKENS,
                timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
            },
            browser: BrowserSettings {
                engine: BrowserEngine::Chromium,
                headless: true,
                screenshot_dir: PathBuf::from(DEFAULT_SCREENSHOT_DIR),
            },
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }

    /// Fail fast when the selected provider is missing its credentials.
    pub fn validate_credentials(&self) -> Result<()> {
        if self.llm.provider == LlmProviderKind::OpenAi && self.llm.api_key.is_none() {
            return Err(Error::config_key(
                "openai provider selected but no API key configured",
                ENV_OPENAI_API_KEY,
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::config_key(format!("could not parse '{raw}'"), key)),
        Err(_) => Ok(default),
    }
}

fn parse_headless() -> bool {
    match env::var(ENV_HEADLESS) {
        Ok(value) => !matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        ),
        Err(_) => true,
    }
}
