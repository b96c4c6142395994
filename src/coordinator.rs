//! Single-run orchestration.
//!
//! One test instruction enters, one outcome record exits. The coordinator
//! owns the browser session for the run and closes it on every exit path.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};

use crate::agent::{AgentLoop, LoopReport, LoopTermination};
use crate::browser::BrowserSession;
use crate::config::AppConfig;
use crate::errors::{Error, Result};
use crate::llm::LlmInvoker;
use crate::prompts::{agent_system_prompt, PromptLibrary};
use crate::scanner::{collect_screenshots, has_critical_failure, scan_transcript};
use crate::tools::ToolRegistry;
use crate::types::{ChatMessage, OutcomeRecord, RunStatus, TestInstruction};

/// Builds the tool set for a run. Swappable so tests can drive the loop
/// without a real browser.
pub type RegistryFactory =
    Box<dyn Fn(Arc<BrowserSession>) -> ToolRegistry + Send + Sync>;

/// Top-level entry point for executing test instructions.
pub struct RunCoordinator {
    config: AppConfig,
    invoker: Arc<dyn LlmInvoker>,
    library: PromptLibrary,
    registry_factory: RegistryFactory,
}

impl RunCoordinator {
    pub fn new(config: AppConfig, invoker: Arc<dyn LlmInvoker>) -> Self {
        let screenshot_dir = config.browser.screenshot_dir.clone();
        Self {
            config,
            invoker,
            library: PromptLibrary::default(),
            registry_factory: Box::new(move |session| {
                ToolRegistry::standard(session, screenshot_dir.clone())
            }),
        }
    }

    /// Replace the tool set used for runs (tests, embedders).
    pub fn with_registry_factory(mut self, factory: RegistryFactory) -> Self {
        self.registry_factory = factory;
        self
    }

    pub fn library(&self) -> &PromptLibrary {
        &self.library
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Convert a test description into numbered automation steps.
    pub async fn generate_prompt(&self, instruction: &TestInstruction) -> Result<String> {
        if instruction.test_id.trim().is_empty() {
            return Err(Error::invalid_field("test_id must not be empty", "test_id"));
        }
        if instruction.description.trim().is_empty() {
            return Err(Error::invalid_field(
                "description must not be empty",
                "description",
            ));
        }

        let (system, user) = if instruction.module.is_some()
            || instruction.functionality.is_some()
            || instruction.priority.is_some()
        {
            let mut context = String::new();
            if let Some(module) = &instruction.module {
                context.push_str(&format!("- module: {module}\n"));
            }
            if let Some(functionality) = &instruction.functionality {
                context.push_str(&format!("- functionality: {functionality}\n"));
            }
            if let Some(priority) = &instruction.priority {
                context.push_str(&format!("- priority: {priority}\n"));
            }
            let mut vars: HashMap<&str, String> = HashMap::new();
            vars.insert("test_id", instruction.test_id.clone());
            vars.insert("description", instruction.description.clone());
            vars.insert("context", context);
            self.library.format("test_case_with_context", &vars)?
        } else {
            let mut vars: HashMap<&str, String> = HashMap::new();
            vars.insert("description", instruction.description.clone());
            self.library.format("test_case_conversion", &vars)?
        };

        let messages = vec![ChatMessage::system(system), ChatMessage::user(user)];
        let steps = self.invoker.complete(&messages).await?;
        Ok(steps.trim().to_string())
    }

    /// Execute one run end to end: validate, drive the loop, extract the
    /// graph, and assemble the outcome record.
    pub async fn execute(&self, instruction: &TestInstruction) -> Result<OutcomeRecord> {
        if instruction.test_id.trim().is_empty() {
            return Err(Error::invalid_field("test_id must not be empty", "test_id"));
        }

        // Reject bad prompts before any browser is launched.
        let user_prompt = match &instruction.generated_prompt {
            Some(prompt) => {
                if prompt.trim().is_empty() {
                    return Err(Error::invalid_field(
                        "generated_prompt must not be empty",
                        "generated_prompt",
                    ));
                }
                self.library.ensure_acceptable(prompt)?;
                prompt.clone()
            }
            None => {
                if instruction.description.trim().is_empty() {
                    return Err(Error::invalid_field(
                        "description must not be empty",
                        "description",
                    ));
                }
                self.library.ensure_acceptable(&instruction.description)?;
                instruction.description.clone()
            }
        };

        let started = Instant::now();
        let session = Arc::new(BrowserSession::new(
            instruction.browser.engine,
            instruction.browser.headless,
        ));
        let registry = Arc::new((self.registry_factory)(session.clone()));
        let system_prompt = agent_system_prompt(&registry.catalogue());

        info!(
            test_id = %instruction.test_id,
            engine = instruction.browser.engine.as_str(),
            max_iterations = instruction.browser.max_iterations,
            "starting automation run"
        );

        let agent = AgentLoop::new(self.invoker.clone(), registry)
            .with_max_iterations(instruction.browser.max_iterations);
        let report = agent.run(&system_prompt, &user_prompt).await;

        // The session is closed on every exit path, idempotently.
        session.close().await;

        Ok(self.assemble_outcome(instruction, report, started.elapsed().as_secs_f64()))
    }

    fn assemble_outcome(
        &self,
        instruction: &TestInstruction,
        report: LoopReport,
        elapsed_secs: f64,
    ) -> OutcomeRecord {
        let graph = scan_transcript(&report.transcript);
        let screenshots = collect_screenshots(&report.transcript);

        let (status, error_message) = match &report.termination {
            LoopTermination::Completed => {
                if has_critical_failure(&report.transcript) {
                    (RunStatus::Failed, None)
                } else {
                    (RunStatus::Success, None)
                }
            }
            LoopTermination::CeilingReached => (
                RunStatus::Failed,
                Some(format!(
                    "iteration ceiling of {} reached before completion",
                    agent_ceiling(instruction)
                )),
            ),
            LoopTermination::LlmFailure(message) => (RunStatus::Error, Some(message.clone())),
        };

        if status != RunStatus::Success {
            warn!(
                test_id = %instruction.test_id,
                status = status.as_str(),
                iterations = report.iterations,
                "run did not succeed"
            );
        }

        OutcomeRecord {
            test_id: instruction.test_id.clone(),
            status,
            execution_time: elapsed_secs,
            steps_executed: report.steps_executed,
            agent_output: report.transcript.render(),
            pages: graph.pages,
            edges: graph.edges,
            screenshots,
            error_message,
            executed_at: Utc::now(),
        }
    }
}

fn agent_ceiling(instruction: &TestInstruction) -> u32 {
    instruction.browser.max_iterations
}
