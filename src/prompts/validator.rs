//! Rule-based prompt validation.
//!
//! Pure function over a prompt plus a configuration, producing findings at
//! four severity tiers. Critical findings block use; errors block only in
//! strict mode. A sanitized form is produced regardless of verdict.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Severity of one validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

/// One validation check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Finding {
    fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            suggestion: None,
        }
    }

    fn suggest(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Validation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    pub max_length: usize,
    pub min_length: usize,
    pub max_tokens: usize,
    pub allow_html: bool,
    pub allow_code: bool,
    pub strict_mode: bool,
    pub check_injection: bool,
    pub check_profanity: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_length: 10_000,
            min_length: 10,
            max_tokens: 4_000,
            allow_html: false,
            allow_code: true,
            strict_mode: false,
            check_injection: true,
            check_profanity: false,
        }
    }
}

/// Full validation report for one prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub findings: Vec<Finding>,
    pub sanitized_prompt: String,
    /// Estimated token count (chars / 4).
    pub token_count: usize,
    strict_mode: bool,
}

impl ValidationReport {
    pub fn count(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == severity)
            .count()
    }

    pub fn has_critical(&self) -> bool {
        self.count(Severity::Critical) > 0
    }

    /// No critical findings, and no errors when strict mode is on.
    pub fn is_valid(&self) -> bool {
        !self.has_critical() && (!self.strict_mode || self.count(Severity::Error) == 0)
    }

    /// Highest-severity message, used as the rejection reason.
    pub fn blocking_message(&self) -> Option<&str> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Critical)
            .map(|f| f.message.as_str())
            .next()
            .or_else(|| {
                if self.strict_mode {
                    self.findings
                        .iter()
                        .filter(|f| f.severity == Severity::Error)
                        .map(|f| f.message.as_str())
                        .next()
                } else {
                    None
                }
            })
    }
}

static INJECTION_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"<script[^>]*>.*?</script>", "script tag"),
        (r"javascript:", "javascript scheme"),
        (r"on\w+\s*=", "inline event handler"),
        (r"eval\s*\(", "eval call"),
        (r"exec\s*\(", "exec call"),
        (r"__import__", "dynamic import"),
        (r"subprocess", "subprocess call"),
        (r"os\.system", "os command"),
        (r"\$\{.*?\}", "template placeholder"),
        (r"\{\{.*?\}\}", "template placeholder"),
    ]
    .into_iter()
    .map(|(pattern, label)| {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()
            .expect("injection pattern must compile");
        (regex, label)
    })
    .collect()
});

static OVERRIDE_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"ignore\s+previous\s+instructions", "instruction override"),
        (r"disregard\s+all\s+previous", "instruction override"),
        (r"forget\s+everything", "instruction override"),
        (r"jailbreak", "jailbreak attempt"),
    ]
    .into_iter()
    .map(|(pattern, label)| {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .expect("override pattern must compile");
        (regex, label)
    })
    .collect()
});

static PROFANITY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"\b(fuck|shit|damn|bitch|asshole|bastard)\b")
        .case_insensitive(true)
        .build()
        .expect("profanity pattern must compile")
});

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("html pattern"));
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("ws pattern"));

/// Rule-based prompt validator.
#[derive(Debug, Clone, Default)]
pub struct PromptValidator {
    config: ValidatorConfig,
}

impl PromptValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn validate(&self, prompt: &str) -> ValidationReport {
        let mut findings = Vec::new();

        self.check_basic(prompt, &mut findings);
        self.check_length(prompt, &mut findings);
        self.check_tokens(prompt, &mut findings);
        if self.config.check_injection {
            self.check_injection(prompt, &mut findings);
        }
        if !self.config.allow_html {
            self.check_html(prompt, &mut findings);
        }
        if self.config.check_profanity {
            self.check_profanity(prompt, &mut findings);
        }
        self.check_structure(prompt, &mut findings);

        ValidationReport {
            findings,
            sanitized_prompt: self.sanitize(prompt),
            token_count: prompt.chars().count() / 4,
            strict_mode: self.config.strict_mode,
        }
    }

    fn check_basic(&self, prompt: &str, findings: &mut Vec<Finding>) {
        if prompt.trim().is_empty() {
            findings.push(
                Finding::new(Severity::Critical, "prompt is empty or whitespace only")
                    .suggest("provide a non-empty prompt"),
            );
            return;
        }
        if prompt.trim().chars().count() < self.config.min_length {
            findings.push(Finding::new(
                Severity::Warning,
                format!(
                    "prompt is shorter than the minimum of {} characters",
                    self.config.min_length
                ),
            ));
        }
    }

    fn check_length(&self, prompt: &str, findings: &mut Vec<Finding>) {
        let length = prompt.chars().count();
        if length > self.config.max_length {
            findings.push(
                Finding::new(
                    Severity::Error,
                    format!(
                        "prompt exceeds maximum length ({length} > {})",
                        self.config.max_length
                    ),
                )
                .suggest("shorten the prompt"),
            );
        } else if length * 10 > self.config.max_length * 9 {
            findings.push(Finding::new(
                Severity::Warning,
                format!(
                    "prompt is close to maximum length ({length}/{})",
                    self.config.max_length
                ),
            ));
        } else {
            findings.push(Finding::new(
                Severity::Info,
                format!("prompt length acceptable ({length} characters)"),
            ));
        }
    }

    fn check_tokens(&self, prompt: &str, findings: &mut Vec<Finding>) {
        let estimated = prompt.chars().count() / 4;
        if estimated > self.config.max_tokens {
            findings.push(Finding::new(
                Severity::Error,
                format!(
                    "estimated token count exceeds limit ({estimated} > {})",
                    self.config.max_tokens
                ),
            ));
        } else if estimated * 10 > self.config.max_tokens * 9 {
            findings.push(Finding::new(
                Severity::Warning,
                format!(
                    "estimated token count is high ({estimated}/{})",
                    self.config.max_tokens
                ),
            ));
        }
    }

    fn check_injection(&self, prompt: &str, findings: &mut Vec<Finding>) {
        for (regex, label) in INJECTION_PATTERNS.iter() {
            if regex.is_match(prompt) {
                findings.push(
                    Finding::new(
                        Severity::Critical,
                        format!("potential injection detected: {label}"),
                    )
                    .suggest("remove suspicious code patterns"),
                );
            }
        }
        for (regex, label) in OVERRIDE_PATTERNS.iter() {
            if regex.is_match(prompt) {
                findings.push(
                    Finding::new(Severity::Critical, format!("{label} detected"))
                        .suggest("rephrase to avoid manipulation attempts"),
                );
            }
        }
    }

    fn check_html(&self, prompt: &str, findings: &mut Vec<Finding>) {
        let tags: Vec<&str> = HTML_TAG.find_iter(prompt).map(|m| m.as_str()).collect();
        if !tags.is_empty() {
            findings.push(
                Finding::new(
                    Severity::Error,
                    format!("HTML tags present but not allowed ({} tags)", tags.len()),
                )
                .suggest("remove HTML markup"),
            );
        }
    }

    fn check_profanity(&self, prompt: &str, findings: &mut Vec<Finding>) {
        let count = PROFANITY_PATTERN.find_iter(prompt).count();
        if count > 0 {
            findings.push(Finding::new(
                Severity::Warning,
                format!("profanity detected: {count} occurrence(s)"),
            ));
        }
    }

    fn check_structure(&self, prompt: &str, findings: &mut Vec<Finding>) {
        let mut stack = Vec::new();
        let mut balanced = true;
        for ch in prompt.chars() {
            match ch {
                '(' | '[' | '{' => stack.push(ch),
                ')' | ']' | '}' => {
                    let expected = match ch {
                        ')' => '(',
                        ']' => '[',
                        _ => '{',
                    };
                    if stack.pop() != Some(expected) {
                        balanced = false;
                        break;
                    }
                }
                _ => {}
            }
        }
        if !balanced || !stack.is_empty() {
            findings.push(Finding::new(
                Severity::Warning,
                "unbalanced brackets detected",
            ));
        }

        let long_lines = prompt.lines().filter(|l| l.chars().count() > 200).count();
        if long_lines > 0 {
            findings.push(Finding::new(
                Severity::Info,
                format!("prompt contains {long_lines} long line(s)"),
            ));
        }
    }

    /// Strip HTML, drop suspicious sequences, collapse whitespace.
    pub fn sanitize(&self, prompt: &str) -> String {
        let mut sanitized = HTML_TAG.replace_all(prompt, " ").into_owned();
        for (regex, _) in INJECTION_PATTERNS.iter() {
            sanitized = regex.replace_all(&sanitized, " ").into_owned();
        }
        for (regex, _) in OVERRIDE_PATTERNS.iter() {
            sanitized = regex.replace_all(&sanitized, " ").into_owned();
        }
        WHITESPACE_RUN
            .replace_all(sanitized.trim(), " ")
            .into_owned()
    }
}
