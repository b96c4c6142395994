//! Domain model shared across the automation core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Browser engine variants accepted by a test instruction.
///
/// All four map onto the CDP driver's launch options; `Edge` is the primary
/// engine pointed at the msedge executable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BrowserEngine {
    #[default]
    Chromium,
    Firefox,
    Webkit,
    Edge,
}

impl BrowserEngine {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(BrowserEngine::Chromium),
            "firefox" => Ok(BrowserEngine::Firefox),
            "webkit" => Ok(BrowserEngine::Webkit),
            "edge" | "msedge" => Ok(BrowserEngine::Edge),
            other => Err(Error::config_key(
                format!("unknown browser engine '{other}'"),
                "browser_engine",
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserEngine::Chromium => "chromium",
            BrowserEngine::Firefox => "firefox",
            BrowserEngine::Webkit => "webkit",
            BrowserEngine::Edge => "edge",
        }
    }
}

/// Per-run browser options carried by a test instruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserOptions {
    #[serde(default)]
    pub engine: BrowserEngine,
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_headless() -> bool {
    true
}

fn default_max_iterations() -> u32 {
    10
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            engine: BrowserEngine::default(),
            headless: true,
            max_iterations: 10,
        }
    }
}

/// Immutable input describing one automation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestInstruction {
    pub test_id: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub functionality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    /// Pre-generated executable prompt. When present the coordinator skips
    /// prompt assembly and runs this text directly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_prompt: Option<String>,
    #[serde(default)]
    pub browser: BrowserOptions,
}

impl TestInstruction {
    pub fn new(test_id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            test_id: test_id.into(),
            description: description.into(),
            module: None,
            functionality: None,
            priority: None,
            generated_prompt: None,
            browser: BrowserOptions::default(),
        }
    }
}

/// Final classification of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
            RunStatus::Error => "error",
        }
    }
}

/// Role of a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    /// Textual results of a tool turn. Projected to a user-role message on
    /// the provider wire so the model sees them next invocation.
    ToolOutput,
}

impl Role {
    /// Role string used on the chat-completions wire.
    pub fn wire_role(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User | Role::ToolOutput => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One transcript entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn tool_output(content: impl Into<String>) -> Self {
        Self {
            role: Role::ToolOutput,
            content: content.into(),
        }
    }
}

/// Append-only conversation record of one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// All tool-output message bodies, in order. The scanner's input.
    pub fn tool_outputs(&self) -> impl Iterator<Item = &str> {
        self.messages
            .iter()
            .filter(|m| m.role == Role::ToolOutput)
            .map(|m| m.content.as_str())
    }

    /// Flat text rendering stored in the outcome record.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for message in &self.messages {
            let tag = match message.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::ToolOutput => "tool",
            };
            out.push_str(&format!("[{tag}]\n{}\n\n", message.content));
        }
        out
    }
}

/// Element observed on a page, extracted from the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementRecord {
    pub id: String,
    /// Element kind derived from the tag (link, button, input, ...).
    #[serde(rename = "type")]
    pub kind: String,
    pub tag: String,
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    /// Reserved for downstream enrichment; always empty here.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// Page node of the navigation graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageNode {
    pub id: String,
    pub label: String,
    pub x: i64,
    pub y: i64,
    pub url: String,
    pub title: String,
    pub key_elements: Vec<ElementRecord>,
}

/// Directed, labelled transition between two page nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub label: String,
}

/// Structured result returned to the caller of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub test_id: String,
    pub status: RunStatus,
    /// Wall-clock duration in seconds.
    pub execution_time: f64,
    /// Number of successful tool executions.
    pub steps_executed: u32,
    /// Full raw transcript text.
    pub agent_output: String,
    pub pages: Vec<PageNode>,
    pub edges: Vec<Edge>,
    pub screenshots: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub executed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_parsing_accepts_aliases() {
        assert_eq!(
            BrowserEngine::parse("chrome").unwrap(),
            BrowserEngine::Chromium
        );
        assert_eq!(BrowserEngine::parse("Edge").unwrap(), BrowserEngine::Edge);
        assert!(BrowserEngine::parse("opera").is_err());
    }

    #[test]
    fn tool_output_projects_to_user_role() {
        assert_eq!(Role::ToolOutput.wire_role(), "user");
        assert_eq!(Role::Assistant.wire_role(), "assistant");
    }

    #[test]
    fn transcript_render_tags_messages() {
        let mut transcript = Transcript::new();
        transcript.push(ChatMessage::system("framing"));
        transcript.push(ChatMessage::user("do the thing"));
        transcript.push(ChatMessage::tool_output("✅ ok"));
        let text = transcript.render();
        assert!(text.contains("[system]"));
        assert!(text.contains("[tool]\n✅ ok"));
    }

    #[test]
    fn tool_outputs_filters_roles() {
        let mut transcript = Transcript::new();
        transcript.push(ChatMessage::assistant("USE_TOOL: navigate"));
        transcript.push(ChatMessage::tool_output("✅ navigated"));
        let outputs: Vec<&str> = transcript.tool_outputs().collect();
        assert_eq!(outputs, vec!["✅ navigated"]);
    }

    #[test]
    fn instruction_defaults() {
        let instruction = TestInstruction::new("TC-1", "open example.com");
        assert!(instruction.browser.headless);
        assert_eq!(instruction.browser.max_iterations, 10);
        assert_eq!(instruction.browser.engine, BrowserEngine::Chromium);
    }
}
