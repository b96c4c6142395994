//! Transcript post-processing.
//!
//! Reconstructs the navigation graph from the tool-outcome text accumulated
//! during a run. The scanner recognizes the outcome lines emitted by the
//! navigate tool and the structured blocks emitted by the metadata tool; it
//! never fabricates entities, so a sparse transcript yields a sparse graph.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::tools::element_kind;
use crate::types::{Edge, ElementRecord, PageNode, Transcript};

const PAGE_BLOCK_MARKER: &str = "📄 Page Metadata:";
const ELEMENT_BLOCK_MARKER: &str = "🎯 Element Metadata";
const MAX_ELEMENT_TEXT_CHARS: usize = 200;
const MAX_ACTION_LABEL_CHARS: usize = 20;

static NAVIGATE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^✅ navigated to (.+?): page title '(.*)'$").expect("nav pattern"));
static CLICK_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^✅ clicked element (.+)$").expect("click pattern"));
static SCREENSHOT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^✅ screenshot captured: (.+)$").expect("screenshot pattern"));

/// Pages and edges extracted from one transcript.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanResult {
    pub pages: Vec<PageNode>,
    pub edges: Vec<Edge>,
}

/// Scan the tool-outcome messages of a transcript.
pub fn scan_transcript(transcript: &Transcript) -> ScanResult {
    scan_outputs(transcript.tool_outputs())
}

/// Scan raw tool-outcome text blocks in order.
pub fn scan_outputs<'a>(outputs: impl Iterator<Item = &'a str>) -> ScanResult {
    let mut scanner = Scanner::default();
    for output in outputs {
        scanner.consume(output);
    }
    scanner.finish()
}

/// Screenshot filenames reported by successful screenshot outcomes.
pub fn collect_screenshots(transcript: &Transcript) -> Vec<String> {
    let mut filenames = Vec::new();
    for output in transcript.tool_outputs() {
        for line in output.lines() {
            if let Some(captures) = SCREENSHOT_LINE.captures(line.trim_end()) {
                filenames.push(captures[1].trim().to_string());
            }
        }
    }
    filenames
}

/// True when any critical tool (navigate / click / type_text) reported a
/// `❌` outcome.
pub fn has_critical_failure(transcript: &Transcript) -> bool {
    transcript.tool_outputs().any(|output| {
        output.lines().any(|line| {
            let line = line.trim_start();
            crate::tools::CRITICAL_TOOLS
                .iter()
                .any(|tool| line.starts_with(&format!("❌ {tool} failed")))
        })
    })
}

#[derive(Debug, Default)]
struct PageBuilder {
    id: String,
    url: String,
    title: String,
    elements: Vec<ElementRecord>,
    seen_selectors: Vec<String>,
}

#[derive(Debug, Default)]
struct PendingElement {
    selector: Option<String>,
    tag: Option<String>,
    text: Option<String>,
    href: Option<String>,
    element_id: Option<String>,
    name: Option<String>,
    class_name: Option<String>,
    input_type: Option<String>,
}

impl PendingElement {
    fn is_empty(&self) -> bool {
        self.selector.is_none() && self.tag.is_none()
    }
}

#[derive(Debug, Default)]
struct Scanner {
    pages: Vec<PageBuilder>,
    by_url: HashMap<String, usize>,
    edges: Vec<Edge>,
    current_page: Option<usize>,
    pending_action: Option<String>,
    mode: Mode,
    pending_element: PendingElement,
    awaiting_url: bool,
    block_url: Option<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
enum Mode {
    #[default]
    Text,
    PageBlock,
    ElementBlock,
}

impl Scanner {
    fn consume(&mut self, output: &str) {
        for raw_line in output.lines() {
            self.consume_line(raw_line);
        }
        // Blocks never span tool outcomes.
        self.end_block();
    }

    fn consume_line(&mut self, raw_line: &str) {
        let line = raw_line.trim();

        if line.contains(PAGE_BLOCK_MARKER) {
            self.end_block();
            self.mode = Mode::PageBlock;
            self.awaiting_url = true;
            self.block_url = None;
            return;
        }
        if line.contains(ELEMENT_BLOCK_MARKER) {
            self.flush_pending_element();
            self.mode = Mode::ElementBlock;
            return;
        }

        match self.mode {
            Mode::PageBlock => self.consume_page_line(line),
            Mode::ElementBlock => self.consume_element_line(line),
            Mode::Text => self.consume_text_line(line),
        }
    }

    fn consume_text_line(&mut self, line: &str) {
        if let Some(captures) = NAVIGATE_LINE.captures(line) {
            let url = captures[1].trim().to_string();
            let title = captures[2].to_string();
            self.open_page(&url, &title);
            return;
        }
        if let Some(captures) = CLICK_LINE.captures(line) {
            let detail = &captures[1];
            let description = detail
                .split_once(": ")
                .map(|(_, rest)| rest)
                .unwrap_or(detail);
            self.pending_action = Some(format!(
                "Click {}",
                truncate_label(description.trim(), MAX_ACTION_LABEL_CHARS)
            ));
        }
    }

    fn consume_page_line(&mut self, line: &str) {
        let Some(field) = bullet_field(line) else {
            // Anything that is not a bullet ends the page header.
            if !line.is_empty() {
                self.end_block();
                self.consume_text_line(line);
            }
            return;
        };
        match field {
            ("URL", value) if self.awaiting_url => {
                self.block_url = Some(value.to_string());
            }
            ("Title", value) => {
                if let Some(url) = self.block_url.take() {
                    self.open_page(&url, value);
                }
                self.awaiting_url = false;
                self.mode = Mode::Text;
            }
            _ => {}
        }
    }

    fn consume_element_line(&mut self, line: &str) {
        if line.is_empty() || line.starts_with("Element ") {
            return;
        }
        let Some((key, value)) = bullet_field(line) else {
            // Block over; re-dispatch the line as plain text.
            self.end_block();
            self.consume_text_line(line);
            return;
        };
        match key {
            "Selector" => {
                // A selector line starts a new entry.
                self.flush_pending_element();
                self.pending_element.selector = Some(value.to_string());
            }
            "Tag" => {
                self.pending_element.tag =
                    Some(value.trim_matches(['<', '>']).to_string());
            }
            "Text" => self.pending_element.text = optional(value),
            "Href" => self.pending_element.href = optional(value),
            "ID" => self.pending_element.element_id = optional(value),
            "Name" => self.pending_element.name = optional(value),
            "Class" => self.pending_element.class_name = optional(value),
            "Input Type" => self.pending_element.input_type = optional(value),
            _ => {}
        }
    }

    fn open_page(&mut self, url: &str, title: &str) {
        self.flush_pending_element();

        if let Some(&index) = self.by_url.get(url) {
            // Re-visit: no new node, no edge. A pending click stays armed
            // for the next genuine transition.
            self.current_page = Some(index);
            return;
        }

        let index = self.pages.len();
        let id = format!("page_{}", index + 1);
        self.pages.push(PageBuilder {
            id: id.clone(),
            url: url.to_string(),
            title: title.to_string(),
            elements: Vec::new(),
            seen_selectors: Vec::new(),
        });
        self.by_url.insert(url.to_string(), index);

        if let Some(previous) = self.current_page {
            if previous != index {
                self.edges.push(Edge {
                    source: self.pages[previous].id.clone(),
                    target: id,
                    label: self
                        .pending_action
                        .take()
                        .unwrap_or_else(|| "navigate".to_string()),
                });
            }
        }
        self.pending_action = None;
        self.current_page = Some(index);
    }

    fn flush_pending_element(&mut self) {
        if self.pending_element.is_empty() {
            self.pending_element = PendingElement::default();
            return;
        }
        let pending = std::mem::take(&mut self.pending_element);
        let Some(page_index) = self.current_page else {
            return;
        };
        let page = &mut self.pages[page_index];

        let tag = pending.tag.unwrap_or_else(|| "unknown".to_string());
        let selector = pending.selector.unwrap_or_else(|| tag.clone());
        if page.seen_selectors.iter().any(|s| s == &selector) {
            return;
        }
        page.seen_selectors.push(selector.clone());

        let id = format!("element_{}", page.elements.len() + 1);
        page.elements.push(ElementRecord {
            id,
            kind: element_kind(&tag).to_string(),
            tag,
            selector,
            text: pending
                .text
                .map(|t| truncate_text(&t, MAX_ELEMENT_TEXT_CHARS)),
            element_id: pending.element_id,
            name: pending.name,
            class_name: pending.class_name,
            href: pending.href,
            input_type: pending.input_type,
            depends_on: Vec::new(),
        });
    }

    fn end_block(&mut self) {
        self.flush_pending_element();
        self.mode = Mode::Text;
        self.awaiting_url = false;
        self.block_url = None;
    }

    fn finish(mut self) -> ScanResult {
        self.flush_pending_element();
        let pages = self
            .pages
            .into_iter()
            .enumerate()
            .map(|(index, builder)| PageNode {
                label: page_label(&builder.title, &builder.url),
                x: 200 + 300 * index as i64,
                y: 100,
                id: builder.id,
                url: builder.url,
                title: builder.title,
                key_elements: builder.elements,
            })
            .collect();
        ScanResult {
            pages,
            edges: self.edges,
        }
    }
}

/// `  • Key: value` → (Key, value)
fn bullet_field(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix("•")?.trim_start();
    let (key, value) = rest.split_once(':')?;
    Some((key.trim(), value.trim()))
}

fn optional(value: &str) -> Option<String> {
    match value {
        "" | "None" | "null" => None,
        other => Some(other.to_string()),
    }
}

fn page_label(title: &str, url: &str) -> String {
    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| url.to_string());
    if title.is_empty() {
        host
    } else {
        format!("{title} ({host})")
    }
}

fn truncate_label(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept.trim_end())
    }
}

fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(outputs: &[&str]) -> ScanResult {
        scan_outputs(outputs.iter().copied())
    }

    #[test]
    fn empty_transcript_yields_empty_graph() {
        let result = scan(&[]);
        assert!(result.pages.is_empty());
        assert!(result.edges.is_empty());
    }

    #[test]
    fn navigate_outcome_opens_a_page() {
        let result = scan(&["✅ navigated to https://example.com/: page title 'Example Domain'"]);
        assert_eq!(result.pages.len(), 1);
        let page = &result.pages[0];
        assert_eq!(page.id, "page_1");
        assert_eq!(page.url, "https://example.com/");
        assert_eq!(page.title, "Example Domain");
        assert_eq!(page.label, "Example Domain (example.com)");
        assert_eq!((page.x, page.y), (200, 100));
        assert!(result.edges.is_empty());
    }

    #[test]
    fn repeated_navigation_to_same_url_keeps_one_node() {
        let nav = "✅ navigated to https://example.com/: page title 'Example Domain'";
        let result = scan(&[nav, nav, nav]);
        assert_eq!(result.pages.len(), 1);
        assert!(result.edges.is_empty());
    }

    #[test]
    fn two_pages_produce_one_labelled_edge() {
        let result = scan(&[
            "✅ navigated to https://example.com/: page title 'Example Domain'",
            "✅ clicked element a: More information",
            "✅ navigated to https://www.iana.org/domains/example: page title 'IANA'",
        ]);
        assert_eq!(result.pages.len(), 2);
        assert_eq!(result.edges.len(), 1);
        let edge = &result.edges[0];
        assert_eq!(edge.source, "page_1");
        assert_eq!(edge.target, "page_2");
        assert_eq!(edge.label, "Click More information");
        assert_eq!(result.pages[1].x, 500);
    }

    #[test]
    fn edge_without_click_is_labelled_navigate() {
        let result = scan(&[
            "✅ navigated to https://a.test/: page title 'A'",
            "✅ navigated to https://b.test/: page title 'B'",
        ]);
        assert_eq!(result.edges.len(), 1);
        assert_eq!(result.edges[0].label, "navigate");
    }

    #[test]
    fn long_click_descriptions_are_truncated_in_labels() {
        let result = scan(&[
            "✅ navigated to https://a.test/: page title 'A'",
            "✅ clicked element a: An exceedingly verbose link description",
            "✅ navigated to https://b.test/: page title 'B'",
        ]);
        let label = &result.edges[0].label;
        assert!(label.starts_with("Click "));
        assert!(label.ends_with("..."));
        assert!(label.chars().count() <= 6 + MAX_ACTION_LABEL_CHARS);
    }

    #[test]
    fn metadata_block_opens_a_page_and_collects_elements() {
        let output = "✅ page metadata extracted: https://example.com/\n\
                      📄 Page Metadata:\n  \
                      • URL: https://example.com/\n  \
                      • Title: Example Domain\n\
                      \n\
                      🎯 Element Metadata (Found 1 element(s)):\n  \
                      Element 1:\n  \
                      • Selector: a\n  \
                      • Tag: <a>\n  \
                      • Type: link\n  \
                      • Text: More information...\n  \
                      • Href: https://www.iana.org/domains/example\n  \
                      • ID: None\n  \
                      • Name: None\n  \
                      • Class: None";
        let result = scan(&[output]);
        assert_eq!(result.pages.len(), 1);
        let page = &result.pages[0];
        assert_eq!(page.key_elements.len(), 1);
        let element = &page.key_elements[0];
        assert_eq!(element.id, "element_1");
        assert_eq!(element.kind, "link");
        assert_eq!(element.tag, "a");
        assert_eq!(element.text.as_deref(), Some("More information..."));
        assert_eq!(
            element.href.as_deref(),
            Some("https://www.iana.org/domains/example")
        );
        assert!(element.element_id.is_none());
        assert!(element.depends_on.is_empty());
    }

    #[test]
    fn revisit_appends_new_elements_only() {
        let first = "📄 Page Metadata:\n  \
                     • URL: https://example.com/\n  \
                     • Title: Example Domain\n\
                     \n\
                     🎯 Element Metadata (Found 1 element(s)):\n  \
                     • Selector: a\n  \
                     • Tag: <a>\n  \
                     • Text: More information...";
        let second = "📄 Page Metadata:\n  \
                      • URL: https://example.com/\n  \
                      • Title: Example Domain\n\
                      \n\
                      🎯 Element Metadata (Found 2 element(s)):\n  \
                      • Selector: a\n  \
                      • Tag: <a>\n  \
                      • Text: More information...\n\
                      \n  \
                      • Selector: p\n  \
                      • Tag: <p>\n  \
                      • Text: This domain is for use in examples";
        let result = scan(&[first, second]);
        assert_eq!(result.pages.len(), 1);
        assert!(result.edges.is_empty());
        let page = &result.pages[0];
        assert_eq!(page.key_elements.len(), 2);
        assert_eq!(page.key_elements[0].id, "element_1");
        assert_eq!(page.key_elements[1].id, "element_2");
        assert_eq!(page.key_elements[1].kind, "p");
    }

    #[test]
    fn element_ids_are_per_page() {
        let output_a = "📄 Page Metadata:\n  \
                        • URL: https://a.test/\n  \
                        • Title: A\n\
                        \n\
                        🎯 Element Metadata (Found 1 element(s)):\n  \
                        • Selector: button#go\n  \
                        • Tag: <button>\n  \
                        • Text: Go";
        let output_b = "📄 Page Metadata:\n  \
                        • URL: https://b.test/\n  \
                        • Title: B\n\
                        \n\
                        🎯 Element Metadata (Found 1 element(s)):\n  \
                        • Selector: input#q\n  \
                        • Tag: <input>\n  \
                        • Input Type: text";
        let result = scan(&[output_a, output_b]);
        assert_eq!(result.pages[0].key_elements[0].id, "element_1");
        assert_eq!(result.pages[1].key_elements[0].id, "element_1");
        assert_eq!(
            result.pages[1].key_elements[0].input_type.as_deref(),
            Some("text")
        );
    }

    #[test]
    fn scanner_is_deterministic() {
        let outputs = [
            "✅ navigated to https://a.test/: page title 'A'",
            "✅ clicked element a: next",
            "✅ navigated to https://b.test/: page title 'B'",
        ];
        let first = scan(&outputs);
        let second = scan(&outputs);
        assert_eq!(first, second);
    }

    #[test]
    fn collects_screenshot_filenames() {
        let mut transcript = Transcript::new();
        transcript.push(crate::types::ChatMessage::tool_output(
            "✅ screenshot captured: step1.png\n\n✅ screenshot captured: step2.png",
        ));
        transcript.push(crate::types::ChatMessage::assistant(
            "✅ screenshot captured: not-a-tool-output.png",
        ));
        assert_eq!(
            collect_screenshots(&transcript),
            vec!["step1.png".to_string(), "step2.png".to_string()]
        );
    }

    #[test]
    fn critical_failure_detection_ignores_non_critical_tools() {
        let mut transcript = Transcript::new();
        transcript.push(crate::types::ChatMessage::tool_output(
            "❌ wait_for_selector failed: element .x did not appear within 10000ms",
        ));
        assert!(!has_critical_failure(&transcript));
        transcript.push(crate::types::ChatMessage::tool_output(
            "❌ click failed: element not found within 10000ms",
        ));
        assert!(has_critical_failure(&transcript));
    }
}
