//! Tool-call extraction from assistant messages.
//!
//! The model is instructed to emit
//!
//! ```text
//! USE_TOOL: <tool-name>
//! ARGS: <json-object>
//! ```
//!
//! per invocation. The parser scans for the case-sensitive `USE_TOOL:`
//! marker, reads the name to end of line, locates the matching `ARGS:`
//! marker and takes the following brace-balanced JSON object. It is lenient
//! on whitespace and tolerant of surrounding prose. A message with no
//! marker yields an empty list, which is the loop's completion signal.

use crate::prompts::{ARGS_MARKER, TOOL_CALL_MARKER};

/// One parsed invocation. Arguments stay raw; coercion happens in the tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDirective {
    pub tool: String,
    pub raw_args: String,
}

/// Extract tool directives in textual order.
pub fn parse_tool_calls(message: &str) -> Vec<ToolDirective> {
    let mut directives = Vec::new();
    let mut rest = message;

    while let Some(marker_idx) = rest.find(TOOL_CALL_MARKER) {
        let after_marker = &rest[marker_idx + TOOL_CALL_MARKER.len()..];
        let (name_line, after_name) = match after_marker.find('\n') {
            Some(eol) => (&after_marker[..eol], &after_marker[eol + 1..]),
            None => (after_marker, ""),
        };
        let tool = name_line.trim().to_string();

        // The ARGS block must belong to this directive, not the next one.
        let next_tool_idx = after_name.find(TOOL_CALL_MARKER);
        let args_idx = after_name
            .find(ARGS_MARKER)
            .filter(|idx| next_tool_idx.map_or(true, |next| *idx < next));

        let (raw_args, consumed) = match args_idx {
            Some(idx) => {
                let after_args = &after_name[idx + ARGS_MARKER.len()..];
                let search_limit = next_tool_idx
                    .map(|next| next.saturating_sub(idx + ARGS_MARKER.len()))
                    .unwrap_or(after_args.len());
                match extract_balanced_object(&after_args[..search_limit]) {
                    Some((object, end)) => (object, idx + ARGS_MARKER.len() + end),
                    None => (String::new(), idx + ARGS_MARKER.len()),
                }
            }
            None => (String::new(), 0),
        };

        if !tool.is_empty() {
            directives.push(ToolDirective { tool, raw_args });
        }

        let offset = message.len() - after_name.len() + consumed;
        rest = &message[offset.min(message.len())..];
    }

    directives
}

/// True when the message contains at least one invocation marker.
pub fn contains_tool_call(message: &str) -> bool {
    message.contains(TOOL_CALL_MARKER)
}

/// Take the first brace-balanced JSON object from `text`.
///
/// Braces inside string literals do not count toward the balance; escapes
/// are honored. Returns the object text and the offset just past it.
fn extract_balanced_object(text: &str) -> Option<(String, usize)> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match byte {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + 1;
                    return Some((text[start..end].to_string(), end));
                }
            }
            _ => {}
        }
    }
    None
}
