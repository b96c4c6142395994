//! Prompt templates and assembly.
//!
//! A registry of named (system, user-template) pairs with strict
//! `{placeholder}` substitution, gated through the rule-based validator.
//! The agent system prompt fixes the tool vocabulary and invocation syntax
//! the loop's parser understands.

pub mod validator;

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::{Error, Result};
use validator::{PromptValidator, ValidatorConfig};

/// The wire marker opening a tool invocation.
pub const TOOL_CALL_MARKER: &str = "USE_TOOL:";
/// The wire marker opening the invocation's argument object.
pub const ARGS_MARKER: &str = "ARGS:";

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([a-z_]+)\}").expect("placeholder pattern"));

/// Named prompt template: a fixed system prompt plus a user template with
/// `{placeholder}` slots.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub name: &'static str,
    pub system: &'static str,
    pub user_template: &'static str,
    pub description: &'static str,
}

const TEST_CASE_CONVERSION_SYSTEM: &str = "\
You are an expert QA automation engineer. Convert brief test case \
descriptions into detailed, numbered browser automation steps.

REQUIREMENTS:
1. Each step must be clear and actionable
2. Number each step: 1) 2) 3) ...
3. Use concrete actions: Navigate, Wait for, Click, Type
4. Add wait conditions before interactions
5. Keep credentials exactly as provided
6. Include verification steps after actions

OUTPUT FORMAT:
Return ONLY the numbered steps, one per line. No explanations.

EXAMPLE INPUT:
\"Login to qa.example.com with username ABC and password 12345\"

EXAMPLE OUTPUT:
1) Navigate to https://qa.example.com
2) Wait for Sign in to appear
3) Click Sign in
4) Wait for Username to appear
5) Type username as ABC
6) Type password as 12345
7) Click Sign In
8) Wait for Home screen to appear";

const TEST_CASE_CONVERSION_USER: &str = "\
Convert this test case into detailed browser automation steps:

{description}";

const TEST_CASE_WITH_CONTEXT_USER: &str = "\
Convert this test case into detailed browser automation steps:

Test Case ID: {test_id}
Description: {description}

Additional Context:
{context}";

const TEMPLATES: &[PromptTemplate] = &[
    PromptTemplate {
        name: "test_case_conversion",
        system: TEST_CASE_CONVERSION_SYSTEM,
        user_template: TEST_CASE_CONVERSION_USER,
        description: "Convert a short test description into numbered automation steps",
    },
    PromptTemplate {
        name: "test_case_with_context",
        system: TEST_CASE_CONVERSION_SYSTEM,
        user_template: TEST_CASE_WITH_CONTEXT_USER,
        description: "Conversion template carrying test id and structured context",
    },
];

/// Registry of prompt templates plus the validation gate.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    validator: PromptValidator,
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new(ValidatorConfig::default())
    }
}

impl PromptLibrary {
    pub fn new(config: ValidatorConfig) -> Self {
        Self {
            validator: PromptValidator::new(config),
        }
    }

    pub fn validator(&self) -> &PromptValidator {
        &self.validator
    }

    pub fn template(&self, name: &str) -> Result<&'static PromptTemplate> {
        TEMPLATES
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| Error::configuration(format!("unknown prompt template '{name}'")))
    }

    pub fn template_names(&self) -> Vec<&'static str> {
        TEMPLATES.iter().map(|t| t.name).collect()
    }

    /// Substitute variables strictly and validate the rendered user prompt.
    ///
    /// Returns the (system, user) pair. A missing variable is a
    /// configuration error; a critical validation verdict rejects the input.
    pub fn format(
        &self,
        template_name: &str,
        vars: &HashMap<&str, String>,
    ) -> Result<(String, String)> {
        let template = self.template(template_name)?;

        let mut user = template.user_template.to_string();
        for (key, value) in vars {
            user = user.replace(&format!("{{{key}}}"), value);
        }
        if let Some(unfilled) = PLACEHOLDER.captures(&user) {
            return Err(Error::config_key(
                format!(
                    "template '{template_name}' is missing variable '{}'",
                    &unfilled[1]
                ),
                "prompt_vars",
            ));
        }

        self.ensure_acceptable(&user)?;
        Ok((template.system.to_string(), user))
    }

    /// Validate a free-form prompt before it enters a run.
    pub fn ensure_acceptable(&self, prompt: &str) -> Result<()> {
        let report = self.validator.validate(prompt);
        if !report.is_valid() {
            let message = report
                .blocking_message()
                .unwrap_or("prompt rejected by validator")
                .to_string();
            return Err(Error::InvalidInput {
                message,
                field: Some("prompt".to_string()),
            });
        }
        Ok(())
    }
}

/// Build the agent framing prompt from the live tool catalogue.
///
/// Lists every tool by name and description, fixes the `USE_TOOL`/`ARGS`
/// invocation syntax, declares the completion signal, and carries the
/// metadata extraction rules.
pub fn agent_system_prompt(catalogue: &[(&str, &str)]) -> String {
    let mut tool_lines = String::new();
    for (name, description) in catalogue {
        tool_lines.push_str(&format!("- {name}: {description}\n"));
    }

    format!(
        "You are an expert QA automation agent driving a real web browser.

Available tools:
{tool_lines}
TOOL USAGE FORMAT:
To use a tool, respond with:
{TOOL_CALL_MARKER} tool_name
{ARGS_MARKER} {{\"arg1\": \"value1\", \"arg2\": \"value2\"}}

Examples:
{examples}

METADATA EXTRACTION:
After navigating to each page and before interacting with elements:
1. Call get_page_metadata with {{\"selector\": null}} for page info
2. Call get_page_metadata with a CSS selector for the elements you will use
3. Extract metadata for links, buttons, inputs and forms you interact with

EXECUTION RULES:
1. ALWAYS start with {TOOL_CALL_MARKER} navigate
2. After navigation, immediately extract page metadata
3. Use the {TOOL_CALL_MARKER} format for ALL actions
4. Take screenshots to document progress
5. ALWAYS end with {TOOL_CALL_MARKER} close_browser
6. When the task is complete, reply WITHOUT any {TOOL_CALL_MARKER} marker; \
that reply ends the run

Begin the automation task now using the tools.",
        examples = tool_call_examples().join("\n\n"),
    )
}

/// Canonical invocation examples shown to the model. The parser must accept
/// every one of these verbatim.
pub fn tool_call_examples() -> Vec<String> {
    vec![
        format!("{TOOL_CALL_MARKER} navigate\n{ARGS_MARKER} {{\"url\": \"https://example.com\"}}"),
        format!("{TOOL_CALL_MARKER} get_page_metadata\n{ARGS_MARKER} {{\"selector\": null}}"),
        format!(
            "{TOOL_CALL_MARKER} click\n{ARGS_MARKER} {{\"selector\": \"button#submit\", \"element_description\": \"Submit button\"}}"
        ),
        format!(
            "{TOOL_CALL_MARKER} type_text\n{ARGS_MARKER} {{\"selector\": \"input#email\", \"text\": \"user@example.com\"}}"
        ),
        format!("{TOOL_CALL_MARKER} screenshot\n{ARGS_MARKER} {{\"filename\": \"step1.png\"}}"),
        format!("{TOOL_CALL_MARKER} close_browser\n{ARGS_MARKER} {{}}"),
    ]
}
