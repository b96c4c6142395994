//! The tool-calling agent loop and its parser.

pub mod controller;
pub mod parser;

pub use controller::{AgentLoop, LoopPhase, LoopReport, LoopTermination};
pub use parser::{contains_tool_call, parse_tool_calls, ToolDirective};
