//! Browser tool catalogue.
//!
//! Ten operations over one shared [`BrowserSession`], each presented to the
//! model by name and description and wrapped in a uniform outcome contract:
//! a single string starting with `✅` or `❌`. Failures never propagate as
//! errors out of a tool; they become `❌` outcomes the model can react to.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::browser::{find_element, BrowserSession, ELEMENT_DEADLINE, NAVIGATION_DEADLINE};
use crate::errors::{Error, Result};

const PAGE_METADATA_SCRIPT: &str = include_str!("scripts/page_metadata.js");
const PAGE_OUTLINE_SCRIPT: &str = include_str!("scripts/page_outline.js");

pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 10_000;
const CLICK_SETTLE: Duration = Duration::from_millis(500);
const MAX_SCRIPT_RESULT_CHARS: usize = 500;
const MAX_ELEMENT_TEXT_CHARS: usize = 200;

/// Tools whose `❌` outcomes mark the whole run as failed.
pub const CRITICAL_TOOLS: &[&str] = &["navigate", "click", "type_text"];

/// Key-value arguments parsed from the model's `ARGS:` object.
///
/// The model's output is untrusted; values stay loose JSON and are coerced
/// per-tool. Numeric arguments also accept numeric strings.
#[derive(Debug, Clone, Default)]
pub struct ToolArgs(Map<String, Value>);

impl ToolArgs {
    pub fn parse(raw: &str) -> std::result::Result<Self, String> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: Value =
            serde_json::from_str(raw).map_err(|e| format!("arguments are not valid JSON: {e}"))?;
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(format!(
                "arguments must be a JSON object, got {}",
                kind_of(&other)
            )),
        }
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// String argument; JSON null counts as absent.
    pub fn str(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(Value::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn required_str(&self, key: &str) -> std::result::Result<&str, String> {
        self.str(key)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| format!("missing required argument '{key}'"))
    }

    pub fn u64_or(&self, key: &str, default: u64) -> u64 {
        match self.0.get(key) {
            Some(Value::Number(n)) => n.as_u64().unwrap_or(default),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
            _ => default,
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Result of one tool execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub success: bool,
    pub report: String,
}

impl ToolOutcome {
    pub fn ok(report: impl Into<String>) -> Self {
        Self {
            success: true,
            report: report.into(),
        }
    }

    pub fn fail(report: impl Into<String>) -> Self {
        Self {
            success: false,
            report: report.into(),
        }
    }

    /// Render with the status marker the transcript scanner keys on.
    pub fn render(&self) -> String {
        let marker = if self.success { "✅" } else { "❌" };
        format!("{marker} {}", self.report)
    }
}

/// One invocable browser operation.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    async fn execute(&self, args: &ToolArgs) -> ToolOutcome;
}

/// Catalogue of tools keyed by name, preserving presentation order.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// The standard ten-tool browser catalogue over one session.
    pub fn standard(session: Arc<BrowserSession>, screenshot_dir: PathBuf) -> Self {
        Self {
            tools: vec![
                Arc::new(NavigateTool {
                    session: session.clone(),
                }),
                Arc::new(ClickTool {
                    session: session.clone(),
                }),
                Arc::new(TypeTextTool {
                    session: session.clone(),
                }),
                Arc::new(ScreenshotTool {
                    session: session.clone(),
                    dir: screenshot_dir,
                }),
                Arc::new(WaitForSelectorTool {
                    session: session.clone(),
                }),
                Arc::new(WaitForTextTool {
                    session: session.clone(),
                }),
                Arc::new(GetPageContentTool {
                    session: session.clone(),
                }),
                Arc::new(ExecuteScriptTool {
                    session: session.clone(),
                }),
                Arc::new(GetPageMetadataTool {
                    session: session.clone(),
                }),
                Arc::new(CloseBrowserTool { session }),
            ],
        }
    }

    /// Registry over an arbitrary tool set (used by tests and embedders).
    pub fn from_tools(tools: Vec<Arc<dyn Tool>>) -> Self {
        Self { tools }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    /// (name, description) pairs in catalogue order, for prompt assembly.
    pub fn catalogue(&self) -> Vec<(&'static str, &'static str)> {
        self.tools
            .iter()
            .map(|t| (t.name(), t.description()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute one directive. Unknown names and malformed arguments come
    /// back as `❌` outcomes so the model can correct course.
    pub async fn dispatch(&self, tool: &str, raw_args: &str) -> ToolOutcome {
        let Some(handler) = self.get(tool) else {
            return ToolOutcome::fail(format!("{tool} failed: unknown tool name"));
        };
        let args = match ToolArgs::parse(raw_args) {
            Ok(args) => args,
            Err(e) => return ToolOutcome::fail(format!("{tool} failed: {e}")),
        };
        debug!(tool, "executing tool");
        handler.execute(&args).await
    }
}

/// Map a tag name onto the element kind vocabulary of the graph.
pub fn element_kind(tag: &str) -> &str {
    match tag {
        "a" => "link",
        "button" => "button",
        "input" => "input",
        "form" => "form",
        "select" => "select",
        "textarea" => "textarea",
        other => other,
    }
}

// ---------------------------------------------------------------------------
// The ten tools
// ---------------------------------------------------------------------------

struct NavigateTool {
    session: Arc<BrowserSession>,
}

#[async_trait]
impl Tool for NavigateTool {
    fn name(&self) -> &'static str {
        "navigate"
    }

    fn description(&self) -> &'static str {
        "Navigate the browser to a URL (launches the browser on first use)"
    }

    async fn execute(&self, args: &ToolArgs) -> ToolOutcome {
        let url = match args.required_str("url") {
            Ok(url) => url.to_string(),
            Err(e) => return ToolOutcome::fail(format!("navigate failed: {e}")),
        };
        match self.navigate(&url).await {
            Ok((final_url, title)) => {
                ToolOutcome::ok(format!("navigated to {final_url}: page title '{title}'"))
            }
            Err(e) => ToolOutcome::fail(format!("navigate failed: {e}")),
        }
    }
}

impl NavigateTool {
    async fn navigate(&self, url: &str) -> Result<(String, String)> {
        self.session.ensure_started().await?;
        let page = self.session.page().await?;
        let goto = async {
            page.goto(url)
                .await
                .map_err(|e| Error::browser_action(format!("navigation failed: {e}"), "navigate", None))?;
            page.wait_for_navigation().await.map_err(|e| {
                Error::browser_action(format!("page did not settle: {e}"), "navigate", None)
            })
        };
        tokio::time::timeout(NAVIGATION_DEADLINE, goto)
            .await
            .map_err(|_| {
                Error::browser_action(
                    format!(
                        "navigation to {url} timed out after {}s",
                        NAVIGATION_DEADLINE.as_secs()
                    ),
                    "navigate",
                    None,
                )
            })??;

        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| url.to_string());
        let title = page.get_title().await.ok().flatten().unwrap_or_default();
        Ok((final_url, title))
    }
}

struct ClickTool {
    session: Arc<BrowserSession>,
}

#[async_trait]
impl Tool for ClickTool {
    fn name(&self) -> &'static str {
        "click"
    }

    fn description(&self) -> &'static str {
        "Click an element by CSS selector, XPath (// prefix) or text= shorthand"
    }

    async fn execute(&self, args: &ToolArgs) -> ToolOutcome {
        let selector = match args.required_str("selector") {
            Ok(s) => s.to_string(),
            Err(e) => return ToolOutcome::fail(format!("click failed: {e}")),
        };
        let description = args
            .str("element_description")
            .map(|s| s.to_string())
            .filter(|s| !s.trim().is_empty());
        match self.click(&selector).await {
            Ok(()) => ToolOutcome::ok(format!(
                "clicked element {selector}: {}",
                description.unwrap_or_else(|| selector.clone())
            )),
            Err(e) => ToolOutcome::fail(format!("click failed: {e}")),
        }
    }
}

impl ClickTool {
    async fn click(&self, selector: &str) -> Result<()> {
        let page = self.session.page().await?;
        let element = find_element(&page, selector, ELEMENT_DEADLINE).await?;
        element
            .click()
            .await
            .map_err(|e| Error::browser_action(format!("click failed: {e}"), "click", Some(selector)))?;
        tokio::time::sleep(CLICK_SETTLE).await;
        Ok(())
    }
}

struct TypeTextTool {
    session: Arc<BrowserSession>,
}

#[async_trait]
impl Tool for TypeTextTool {
    fn name(&self) -> &'static str {
        "type_text"
    }

    fn description(&self) -> &'static str {
        "Clear an input field and type text into it"
    }

    async fn execute(&self, args: &ToolArgs) -> ToolOutcome {
        let selector = match args.required_str("selector") {
            Ok(s) => s.to_string(),
            Err(e) => return ToolOutcome::fail(format!("type_text failed: {e}")),
        };
        let text = match args.required_str("text") {
            Ok(t) => t.to_string(),
            Err(e) => return ToolOutcome::fail(format!("type_text failed: {e}")),
        };
        match self.type_into(&selector, &text).await {
            Ok(()) => ToolOutcome::ok(format!("typed text into {selector}: '{text}'")),
            Err(e) => ToolOutcome::fail(format!("type_text failed: {e}")),
        }
    }
}

impl TypeTextTool {
    async fn type_into(&self, selector: &str, text: &str) -> Result<()> {
        let page = self.session.page().await?;
        let element = find_element(&page, selector, ELEMENT_DEADLINE).await?;
        element
            .click()
            .await
            .map_err(|e| Error::browser_action(format!("focus failed: {e}"), "type", Some(selector)))?;
        element
            .call_js_fn("function() { this.value = ''; }", false)
            .await
            .map_err(|e| Error::browser_action(format!("clear failed: {e}"), "type", Some(selector)))?;
        element
            .type_str(text)
            .await
            .map_err(|e| Error::browser_action(format!("typing failed: {e}"), "type", Some(selector)))?;
        Ok(())
    }
}

struct ScreenshotTool {
    session: Arc<BrowserSession>,
    dir: PathBuf,
}

#[async_trait]
impl Tool for ScreenshotTool {
    fn name(&self) -> &'static str {
        "screenshot"
    }

    fn description(&self) -> &'static str {
        "Capture the current page to a PNG file"
    }

    async fn execute(&self, args: &ToolArgs) -> ToolOutcome {
        let filename = args.str("filename").unwrap_or("screenshot.png").to_string();
        match self.capture(&filename).await {
            Ok(()) => ToolOutcome::ok(format!("screenshot captured: {filename}")),
            Err(e) => ToolOutcome::fail(format!("screenshot failed: {e}")),
        }
    }
}

impl ScreenshotTool {
    async fn capture(&self, filename: &str) -> Result<()> {
        let page = self.session.page().await?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::browser(format!("could not create screenshot dir: {e}")))?;
        let path = self.dir.join(filename);
        page.save_screenshot(
            ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .build(),
            &path,
        )
        .await
        .map_err(|e| Error::browser_action(format!("capture failed: {e}"), "screenshot", None))?;
        Ok(())
    }
}

struct WaitForSelectorTool {
    session: Arc<BrowserSession>,
}

#[async_trait]
impl Tool for WaitForSelectorTool {
    fn name(&self) -> &'static str {
        "wait_for_selector"
    }

    fn description(&self) -> &'static str {
        "Wait until an element matching the selector appears"
    }

    async fn execute(&self, args: &ToolArgs) -> ToolOutcome {
        let selector = match args.required_str("selector") {
            Ok(s) => s.to_string(),
            Err(e) => return ToolOutcome::fail(format!("wait_for_selector failed: {e}")),
        };
        let timeout_ms = args.u64_or("timeout", DEFAULT_WAIT_TIMEOUT_MS);
        let page = match self.session.page().await {
            Ok(page) => page,
            Err(e) => return ToolOutcome::fail(format!("wait_for_selector failed: {e}")),
        };
        match find_element(&page, &selector, Duration::from_millis(timeout_ms)).await {
            Ok(_) => ToolOutcome::ok(format!("element appeared: {selector}")),
            Err(_) => ToolOutcome::fail(format!(
                "wait_for_selector failed: element {selector} did not appear within {timeout_ms}ms"
            )),
        }
    }
}

struct WaitForTextTool {
    session: Arc<BrowserSession>,
}

#[async_trait]
impl Tool for WaitForTextTool {
    fn name(&self) -> &'static str {
        "wait_for_text"
    }

    fn description(&self) -> &'static str {
        "Wait until the given text appears anywhere on the page"
    }

    async fn execute(&self, args: &ToolArgs) -> ToolOutcome {
        let text = match args.required_str("text") {
            Ok(t) => t.to_string(),
            Err(e) => return ToolOutcome::fail(format!("wait_for_text failed: {e}")),
        };
        let timeout_ms = args.u64_or("timeout", DEFAULT_WAIT_TIMEOUT_MS);
        match self.wait_for(&text, timeout_ms).await {
            Ok(()) => ToolOutcome::ok(format!("text appeared: '{text}'")),
            Err(_) => ToolOutcome::fail(format!(
                "wait_for_text failed: text '{text}' did not appear within {timeout_ms}ms"
            )),
        }
    }
}

impl WaitForTextTool {
    async fn wait_for(&self, text: &str, timeout_ms: u64) -> Result<()> {
        let page = self.session.page().await?;
        let needle = serde_json::to_string(text)
            .map_err(|e| Error::browser(format!("unencodable text: {e}")))?;
        let script = format!("(document.body && document.body.innerText.includes({needle}))");
        let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            let found = page
                .evaluate(script.clone())
                .await
                .ok()
                .and_then(|r| r.value().and_then(Value::as_bool))
                .unwrap_or(false);
            if found {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::browser_action("text not found", "wait_for_text", None));
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }
}

struct GetPageContentTool {
    session: Arc<BrowserSession>,
}

#[derive(Debug, Deserialize)]
struct PageOutline {
    #[serde(default)]
    headings: Vec<String>,
    #[serde(default)]
    links: Vec<Value>,
    #[serde(default)]
    inputs: Vec<Value>,
}

#[async_trait]
impl Tool for GetPageContentTool {
    fn name(&self) -> &'static str {
        "get_page_content"
    }

    fn description(&self) -> &'static str {
        "Summarize the current page structure (headings, links, inputs)"
    }

    async fn execute(&self, _args: &ToolArgs) -> ToolOutcome {
        match self.outline().await {
            Ok(report) => ToolOutcome::ok(report),
            Err(e) => ToolOutcome::fail(format!("get_page_content failed: {e}")),
        }
    }
}

impl GetPageContentTool {
    async fn outline(&self) -> Result<String> {
        let page = self.session.page().await?;
        let title = page.get_title().await.ok().flatten().unwrap_or_default();
        let url = page.url().await.ok().flatten().unwrap_or_default();
        let raw = page
            .evaluate(format!("({PAGE_OUTLINE_SCRIPT})()"))
            .await
            .map_err(|e| Error::browser_action(format!("outline failed: {e}"), "get_content", None))?;
        let outline: PageOutline = raw
            .value()
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| Error::browser(format!("outline payload invalid: {e}")))?
            .unwrap_or(PageOutline {
                headings: Vec::new(),
                links: Vec::new(),
                inputs: Vec::new(),
            });
        Ok(format_outline(&title, &url, &outline))
    }
}

fn format_outline(title: &str, url: &str, outline: &PageOutline) -> String {
    let mut report = format!("page content retrieved: {title}\n  URL: {url}");
    if !outline.headings.is_empty() {
        let shown: Vec<&str> = outline.headings.iter().take(3).map(String::as_str).collect();
        report.push_str(&format!("\n  Headings: {}", shown.join(", ")));
    }
    if !outline.links.is_empty() {
        report.push_str(&format!("\n  Links found: {}", outline.links.len()));
    }
    if !outline.inputs.is_empty() {
        report.push_str(&format!("\n  Input fields: {}", outline.inputs.len()));
    }
    report
}

struct ExecuteScriptTool {
    session: Arc<BrowserSession>,
}

#[async_trait]
impl Tool for ExecuteScriptTool {
    fn name(&self) -> &'static str {
        "execute_script"
    }

    fn description(&self) -> &'static str {
        "Execute JavaScript in the page and return the result"
    }

    async fn execute(&self, args: &ToolArgs) -> ToolOutcome {
        let script = match args.required_str("script") {
            Ok(s) => s.to_string(),
            Err(e) => return ToolOutcome::fail(format!("execute_script failed: {e}")),
        };
        match self.run(&script).await {
            Ok(result) => ToolOutcome::ok(format!("script executed: {result}")),
            Err(e) => ToolOutcome::fail(format!("execute_script failed: {e}")),
        }
    }
}

impl ExecuteScriptTool {
    async fn run(&self, script: &str) -> Result<String> {
        let page = self.session.page().await?;
        let evaluated = page
            .evaluate(script.to_string())
            .await
            .map_err(|e| Error::browser_action(format!("script raised: {e}"), "exec_js", None))?;
        let rendered = match evaluated.value() {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "undefined".to_string(),
        };
        Ok(truncate(&rendered, MAX_SCRIPT_RESULT_CHARS))
    }
}

struct GetPageMetadataTool {
    session: Arc<BrowserSession>,
}

/// Element data returned by the injected metadata script.
#[derive(Debug, Clone, Deserialize)]
pub struct ElementMetadata {
    pub tag: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub input_type: Option<String>,
}

#[async_trait]
impl Tool for GetPageMetadataTool {
    fn name(&self) -> &'static str {
        "get_page_metadata"
    }

    fn description(&self) -> &'static str {
        "Extract structured page metadata; pass a selector for element details"
    }

    async fn execute(&self, args: &ToolArgs) -> ToolOutcome {
        let selector = args.str("selector").map(|s| s.to_string());
        match self.extract(selector.as_deref()).await {
            Ok(report) => ToolOutcome::ok(report),
            Err(e) => ToolOutcome::fail(format!("get_page_metadata failed: {e}")),
        }
    }
}

impl GetPageMetadataTool {
    async fn extract(&self, selector: Option<&str>) -> Result<String> {
        let page = self.session.page().await?;
        let url = page.url().await.ok().flatten().unwrap_or_default();
        let title = page.get_title().await.ok().flatten().unwrap_or_default();

        let elements = match selector {
            Some(selector) if !selector.trim().is_empty() => {
                let quoted = serde_json::to_string(selector)
                    .map_err(|e| Error::browser(format!("unencodable selector: {e}")))?;
                let raw = page
                    .evaluate(format!("({PAGE_METADATA_SCRIPT})({quoted})"))
                    .await
                    .map_err(|e| {
                        Error::browser_action(
                            format!("metadata query failed: {e}"),
                            "get_metadata",
                            Some(selector),
                        )
                    })?;
                let parsed: Vec<ElementMetadata> = raw
                    .value()
                    .cloned()
                    .map(serde_json::from_value)
                    .transpose()
                    .map_err(|e| Error::browser(format!("metadata payload invalid: {e}")))?
                    .unwrap_or_default();
                if parsed.is_empty() {
                    return Err(Error::browser_action(
                        format!("no elements matched selector {selector}"),
                        "get_metadata",
                        Some(selector),
                    ));
                }
                Some((selector.to_string(), parsed))
            }
            _ => None,
        };

        Ok(format_metadata_report(&url, &title, elements.as_ref()))
    }
}

/// Render the structured metadata block. The transcript scanner depends on
/// these exact labels.
pub fn format_metadata_report(
    url: &str,
    title: &str,
    elements: Option<&(String, Vec<ElementMetadata>)>,
) -> String {
    let mut report = format!(
        "page metadata extracted: {url}\n📄 Page Metadata:\n  • URL: {url}\n  • Title: {title}"
    );

    if let Some((selector, elements)) = elements {
        report.push_str(&format!(
            "\n\n🎯 Element Metadata (Found {} element(s)):",
            elements.len()
        ));
        for (index, element) in elements.iter().enumerate() {
            let entry_selector = refine_selector(selector, element);
            report.push_str(&format!(
                "\n  Element {}:\n  • Selector: {}\n  • Tag: <{}>\n  • Type: {}\n  • Text: {}\n  • Href: {}\n  • ID: {}\n  • Name: {}\n  • Class: {}",
                index + 1,
                entry_selector,
                element.tag,
                element_kind(&element.tag),
                field_or_none(element.text.as_deref().map(|t| truncate(t, MAX_ELEMENT_TEXT_CHARS)).as_deref()),
                field_or_none(element.href.as_deref()),
                field_or_none(element.id.as_deref()),
                field_or_none(element.name.as_deref()),
                field_or_none(element.class.as_deref()),
            ));
        }
    }

    report
}

/// Prefer a selector that identifies the concrete element over the broad
/// query selector, so graph elements key uniquely.
fn refine_selector(query: &str, element: &ElementMetadata) -> String {
    if let Some(id) = element.id.as_deref().filter(|s| !s.is_empty()) {
        return format!("{}#{id}", element.tag);
    }
    if let Some(class) = element.class.as_deref() {
        if let Some(first) = class.split_whitespace().next() {
            return format!("{}.{first}", element.tag);
        }
    }
    query.to_string()
}

fn field_or_none(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => "None".to_string(),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

struct CloseBrowserTool {
    session: Arc<BrowserSession>,
}

#[async_trait]
impl Tool for CloseBrowserTool {
    fn name(&self) -> &'static str {
        "close_browser"
    }

    fn description(&self) -> &'static str {
        "Close the browser and release the session"
    }

    async fn execute(&self, _args: &ToolArgs) -> ToolOutcome {
        self.session.close().await;
        ToolOutcome::ok("browser closed: session released")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn description(&self) -> &'static str {
            "Echo the message argument"
        }

        async fn execute(&self, args: &ToolArgs) -> ToolOutcome {
            match args.required_str("message") {
                Ok(message) => ToolOutcome::ok(format!("echoed: {message}")),
                Err(e) => ToolOutcome::fail(format!("echo failed: {e}")),
            }
        }
    }

    #[test]
    fn args_parse_rejects_non_objects() {
        assert!(ToolArgs::parse("[1, 2]").is_err());
        assert!(ToolArgs::parse("{\"a\": 1}").is_ok());
        assert!(ToolArgs::parse("   ").is_ok());
    }

    #[test]
    fn args_null_counts_as_absent() {
        let args = ToolArgs::parse(r#"{"selector": null}"#).unwrap();
        assert!(args.str("selector").is_none());
    }

    #[test]
    fn args_coerce_numeric_strings() {
        let args = ToolArgs::parse(r#"{"timeout": "5000"}"#).unwrap();
        assert_eq!(args.u64_or("timeout", 10_000), 5000);
        let args = ToolArgs::parse(r#"{"timeout": 2500}"#).unwrap();
        assert_eq!(args.u64_or("timeout", 10_000), 2500);
        let args = ToolArgs::parse("{}").unwrap();
        assert_eq!(args.u64_or("timeout", 10_000), 10_000);
    }

    #[test]
    fn element_kind_mapping() {
        assert_eq!(element_kind("a"), "link");
        assert_eq!(element_kind("button"), "button");
        assert_eq!(element_kind("textarea"), "textarea");
        assert_eq!(element_kind("p"), "p");
    }

    #[test]
    fn outcome_render_carries_marker() {
        assert_eq!(ToolOutcome::ok("done: ok").render(), "✅ done: ok");
        assert_eq!(ToolOutcome::fail("x failed: y").render(), "❌ x failed: y");
    }

    #[tokio::test]
    async fn dispatch_unknown_tool_is_a_failed_outcome() {
        let registry = ToolRegistry::from_tools(vec![Arc::new(EchoTool)]);
        let outcome = registry.dispatch("missing", "{}").await;
        assert!(!outcome.success);
        assert!(outcome.report.contains("unknown tool name"));
    }

    #[tokio::test]
    async fn dispatch_malformed_args_is_a_failed_outcome() {
        let registry = ToolRegistry::from_tools(vec![Arc::new(EchoTool)]);
        let outcome = registry.dispatch("echo", "{not json").await;
        assert!(!outcome.success);
        assert!(outcome.report.contains("not valid JSON"));
    }

    #[tokio::test]
    async fn dispatch_executes_known_tool() {
        let registry = ToolRegistry::from_tools(vec![Arc::new(EchoTool)]);
        let outcome = registry.dispatch("echo", r#"{"message": "hi"}"#).await;
        assert!(outcome.success);
        assert_eq!(outcome.render(), "✅ echoed: hi");
    }

    #[test]
    fn metadata_report_page_only() {
        let report = format_metadata_report("https://example.com/", "Example Domain", None);
        assert!(report.starts_with("page metadata extracted: https://example.com/"));
        assert!(report.contains("📄 Page Metadata:"));
        assert!(report.contains("  • URL: https://example.com/"));
        assert!(report.contains("  • Title: Example Domain"));
        assert!(!report.contains("🎯"));
    }

    #[test]
    fn metadata_report_lists_elements_with_exact_labels() {
        let elements = vec![ElementMetadata {
            tag: "a".to_string(),
            text: Some("More information...".to_string()),
            id: None,
            name: None,
            class: None,
            href: Some("https://www.iana.org/domains/example".to_string()),
            input_type: None,
        }];
        let report = format_metadata_report(
            "https://example.com/",
            "Example Domain",
            Some(&("a".to_string(), elements)),
        );
        assert!(report.contains("🎯 Element Metadata (Found 1 element(s)):"));
        assert!(report.contains("  Element 1:"));
        assert!(report.contains("  • Selector: a"));
        assert!(report.contains("  • Tag: <a>"));
        assert!(report.contains("  • Type: link"));
        assert!(report.contains("  • Text: More information..."));
        assert!(report.contains("  • Href: https://www.iana.org/domains/example"));
        assert!(report.contains("  • ID: None"));
    }

    #[test]
    fn refine_selector_prefers_id_then_class() {
        let with_id = ElementMetadata {
            tag: "button".into(),
            text: None,
            id: Some("submit-btn".into()),
            name: None,
            class: Some("btn btn-primary".into()),
            href: None,
            input_type: None,
        };
        assert_eq!(refine_selector("button", &with_id), "button#submit-btn");

        let with_class = ElementMetadata {
            id: None,
            ..with_id.clone()
        };
        assert_eq!(refine_selector("button", &with_class), "button.btn");

        let bare = ElementMetadata {
            class: None,
            ..with_class
        };
        assert_eq!(refine_selector("button", &bare), "button");
    }

    #[test]
    fn element_text_is_truncated_to_200_chars() {
        let long_text = "x".repeat(300);
        let elements = vec![ElementMetadata {
            tag: "p".to_string(),
            text: Some(long_text),
            id: None,
            name: None,
            class: None,
            href: None,
            input_type: None,
        }];
        let report =
            format_metadata_report("https://a/", "A", Some(&("p".to_string(), elements)));
        let text_line = report
            .lines()
            .find(|l| l.trim_start().starts_with("• Text:"))
            .unwrap();
        assert!(text_line.len() < 220);
    }
}
