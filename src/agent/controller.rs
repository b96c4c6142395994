//! Bounded agent loop.
//!
//! Alternates model invocation and tool execution until the model replies
//! without a tool-call marker or the iteration ceiling is reached. Tool
//! failures flow back into the transcript as `❌` outcomes; only model
//! transport failures abort the loop.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::parser::parse_tool_calls;
use crate::llm::LlmInvoker;
use crate::tools::ToolRegistry;
use crate::types::{ChatMessage, Transcript};

/// Default model-invocation ceiling per run.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Phase of the loop state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Ready,
    InvokingModel,
    Parsing,
    ExecutingTools,
    Completed,
    Aborted,
}

/// Why the loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopTermination {
    /// The model replied without a tool-call marker.
    Completed,
    /// The iteration ceiling was reached before completion.
    CeilingReached,
    /// The model transport failed; no further turns ran.
    LlmFailure(String),
}

/// Result of one loop execution.
#[derive(Debug)]
pub struct LoopReport {
    pub termination: LoopTermination,
    /// Model invocations performed.
    pub iterations: u32,
    /// Successful tool executions.
    pub steps_executed: u32,
    pub transcript: Transcript,
}

impl LoopReport {
    pub fn completed(&self) -> bool {
        self.termination == LoopTermination::Completed
    }
}

/// Drives the parse → execute → re-invoke cycle with iteration and
/// completion guards.
pub struct AgentLoop {
    invoker: Arc<dyn LlmInvoker>,
    registry: Arc<ToolRegistry>,
    max_iterations: u32,
}

impl AgentLoop {
    pub fn new(invoker: Arc<dyn LlmInvoker>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            invoker,
            registry,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, ceiling: u32) -> Self {
        self.max_iterations = ceiling;
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Run the loop to termination, starting from the framing prompt and the
    /// executable test description.
    pub async fn run(&self, system_prompt: &str, user_prompt: &str) -> LoopReport {
        let mut transcript = Transcript::new();
        transcript.push(ChatMessage::system(system_prompt));
        transcript.push(ChatMessage::user(user_prompt));

        let mut phase = LoopPhase::Ready;
        let mut iterations: u32 = 0;
        let mut steps_executed: u32 = 0;
        debug!(?phase, ceiling = self.max_iterations, "agent loop entry");

        loop {
            if iterations >= self.max_iterations {
                phase = LoopPhase::Aborted;
                info!(
                    ?phase,
                    iterations,
                    ceiling = self.max_iterations,
                    "iteration ceiling reached; aborting run"
                );
                return LoopReport {
                    termination: LoopTermination::CeilingReached,
                    iterations,
                    steps_executed,
                    transcript,
                };
            }

            phase = LoopPhase::InvokingModel;
            iterations += 1;
            debug!(?phase, iteration = iterations, "invoking model");
            let reply = match self.invoker.complete(transcript.messages()).await {
                Ok(reply) => reply,
                Err(e) => {
                    phase = LoopPhase::Aborted;
                    warn!(?phase, error = %e, iteration = iterations, "model invocation failed");
                    return LoopReport {
                        termination: LoopTermination::LlmFailure(e.to_string()),
                        iterations,
                        steps_executed,
                        transcript,
                    };
                }
            };
            transcript.push(ChatMessage::assistant(reply.clone()));

            phase = LoopPhase::Parsing;
            debug!(?phase, "scanning reply for tool directives");
            let directives = parse_tool_calls(&reply);
            if directives.is_empty() {
                phase = LoopPhase::Completed;
                info!(?phase, iterations, steps_executed, "completion signal observed");
                return LoopReport {
                    termination: LoopTermination::Completed,
                    iterations,
                    steps_executed,
                    transcript,
                };
            }

            phase = LoopPhase::ExecutingTools;
            debug!(count = directives.len(), ?phase, "executing tool turn");
            let mut outcomes = Vec::with_capacity(directives.len());
            for directive in &directives {
                let outcome = self
                    .registry
                    .dispatch(&directive.tool, &directive.raw_args)
                    .await;
                if outcome.success {
                    steps_executed += 1;
                } else {
                    debug!(tool = %directive.tool, "tool reported failure");
                }
                outcomes.push(outcome.render());
            }
            transcript.push(ChatMessage::tool_output(outcomes.join("\n\n")));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{Error, Result};
    use crate::tools::{Tool, ToolArgs, ToolOutcome};
    use crate::types::Role;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays a fixed list of assistant replies.
    struct ScriptedInvoker {
        replies: Mutex<Vec<std::result::Result<String, String>>>,
    }

    impl ScriptedInvoker {
        fn new(replies: Vec<std::result::Result<&str, &str>>) -> Self {
            Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .rev()
                        .map(|r| r.map(String::from).map_err(String::from))
                        .collect(),
                ),
            }
        }
    }

    #[async_trait]
    impl LlmInvoker for ScriptedInvoker {
        fn provider(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "test"
        }

        async fn complete(&self, _messages: &[crate::types::ChatMessage]) -> Result<String> {
            let next = self.replies.lock().unwrap().pop();
            match next {
                Some(Ok(reply)) => Ok(reply),
                Some(Err(e)) => Err(Error::llm(e, "scripted", "test")),
                None => Ok("all done".to_string()),
            }
        }
    }

    struct AlwaysOkTool;

    #[async_trait]
    impl Tool for AlwaysOkTool {
        fn name(&self) -> &'static str {
            "ping"
        }

        fn description(&self) -> &'static str {
            "Reply with pong"
        }

        async fn execute(&self, _args: &ToolArgs) -> ToolOutcome {
            ToolOutcome::ok("ping acknowledged: pong")
        }
    }

    struct AlwaysFailTool;

    #[async_trait]
    impl Tool for AlwaysFailTool {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn description(&self) -> &'static str {
            "Always fails"
        }

        async fn execute(&self, _args: &ToolArgs) -> ToolOutcome {
            ToolOutcome::fail("broken failed: no such element")
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        Arc::new(ToolRegistry::from_tools(vec![
            Arc::new(AlwaysOkTool),
            Arc::new(AlwaysFailTool),
        ]))
    }

    #[tokio::test]
    async fn completes_on_first_reply_without_marker() {
        let invoker = Arc::new(ScriptedInvoker::new(vec![Ok("everything checks out")]));
        let agent = AgentLoop::new(invoker, registry());
        let report = agent.run("system", "user").await;

        assert_eq!(report.termination, LoopTermination::Completed);
        assert_eq!(report.iterations, 1);
        assert_eq!(report.steps_executed, 0);
        // system + user + one assistant message, nothing else.
        assert_eq!(report.transcript.len(), 3);
    }

    #[tokio::test]
    async fn executes_tools_then_completes() {
        let invoker = Arc::new(ScriptedInvoker::new(vec![
            Ok("USE_TOOL: ping\nARGS: {}"),
            Ok("done"),
        ]));
        let agent = AgentLoop::new(invoker, registry());
        let report = agent.run("system", "user").await;

        assert_eq!(report.termination, LoopTermination::Completed);
        assert_eq!(report.iterations, 2);
        assert_eq!(report.steps_executed, 1);
        let tool_turns: Vec<&str> = report.transcript.tool_outputs().collect();
        assert_eq!(tool_turns, vec!["✅ ping acknowledged: pong"]);
    }

    #[tokio::test]
    async fn ceiling_bounds_the_loop() {
        let invoker = Arc::new(ScriptedInvoker::new(vec![
            Ok("USE_TOOL: ping\nARGS: {}"),
            Ok("USE_TOOL: ping\nARGS: {}"),
            Ok("USE_TOOL: ping\nARGS: {}"),
            Ok("USE_TOOL: ping\nARGS: {}"),
        ]));
        let agent = AgentLoop::new(invoker, registry()).with_max_iterations(3);
        let report = agent.run("system", "user").await;

        assert_eq!(report.termination, LoopTermination::CeilingReached);
        assert_eq!(report.iterations, 3);
        assert_eq!(report.steps_executed, 3);
        assert_eq!(report.transcript.tool_outputs().count(), 3);
    }

    #[tokio::test]
    async fn tool_failure_does_not_abort() {
        let invoker = Arc::new(ScriptedInvoker::new(vec![
            Ok("USE_TOOL: broken\nARGS: {}\n\nUSE_TOOL: ping\nARGS: {}"),
            Ok("finished"),
        ]));
        let agent = AgentLoop::new(invoker, registry());
        let report = agent.run("system", "user").await;

        assert_eq!(report.termination, LoopTermination::Completed);
        assert_eq!(report.steps_executed, 1);
        let turn: &str = report.transcript.tool_outputs().next().unwrap();
        // One turn, both outcomes, blank-line separated, in textual order.
        let parts: Vec<&str> = turn.split("\n\n").collect();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].starts_with("❌ broken failed"));
        assert!(parts[1].starts_with("✅ ping acknowledged"));
    }

    #[tokio::test]
    async fn llm_failure_aborts_with_partial_transcript() {
        let invoker = Arc::new(ScriptedInvoker::new(vec![
            Ok("USE_TOOL: ping\nARGS: {}"),
            Err("connection reset"),
        ]));
        let agent = AgentLoop::new(invoker, registry());
        let report = agent.run("system", "user").await;

        match &report.termination {
            LoopTermination::LlmFailure(message) => assert!(message.contains("connection reset")),
            other => panic!("expected llm failure, got {other:?}"),
        }
        assert_eq!(report.iterations, 2);
        // The partial transcript keeps the first turn's work.
        assert_eq!(report.transcript.tool_outputs().count(), 1);
    }

    #[tokio::test]
    async fn unknown_tool_becomes_failed_outcome_and_loop_continues() {
        let invoker = Arc::new(ScriptedInvoker::new(vec![
            Ok("USE_TOOL: teleport\nARGS: {}"),
            Ok("ok, stopping"),
        ]));
        let agent = AgentLoop::new(invoker, registry());
        let report = agent.run("system", "user").await;

        assert_eq!(report.termination, LoopTermination::Completed);
        assert_eq!(report.steps_executed, 0);
        let turn = report.transcript.tool_outputs().next().unwrap();
        assert!(turn.contains("❌ teleport failed: unknown tool name"));
    }

    #[tokio::test]
    async fn transcript_grows_monotonically() {
        let invoker = Arc::new(ScriptedInvoker::new(vec![
            Ok("USE_TOOL: ping\nARGS: {}"),
            Ok("USE_TOOL: ping\nARGS: {}"),
            Ok("done"),
        ]));
        let agent = AgentLoop::new(invoker, registry());
        let report = agent.run("system", "user").await;

        // system, user, then strictly alternating assistant / tool turns,
        // closed by the final assistant message.
        let roles: Vec<Role> = report
            .transcript
            .messages()
            .iter()
            .map(|m| m.role)
            .collect();
        assert_eq!(
            roles,
            vec![
                Role::System,
                Role::User,
                Role::Assistant,
                Role::ToolOutput,
                Role::Assistant,
                Role::ToolOutput,
                Role::Assistant,
            ]
        );
    }
}
