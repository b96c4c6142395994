use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;

use qapilot::config::AppConfig;
use qapilot::coordinator::RunCoordinator;
use qapilot::llm::invoker_from_settings;
use qapilot::prompts::validator::{PromptValidator, Severity, ValidatorConfig};
use qapilot::server;
use qapilot::types::{BrowserEngine, OutcomeRecord, TestInstruction};

/// qapilot: LLM-driven QA automation against a real browser
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log level filter (e.g. info, debug, qapilot=debug)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Output format
    #[arg(short, long, default_value = "human")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, clap::ValueEnum)]
enum OutputFormat {
    Human,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a test instruction against a live browser
    Run(RunArgs),

    /// Convert a test description into numbered automation steps
    Generate(GenerateArgs),

    /// Validate a prompt against the safety rules
    Validate(ValidateArgs),

    /// Start the HTTP shell
    Serve(ServeArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Test identifier
    #[arg(long)]
    test_id: String,

    /// Natural-language test description
    #[arg(long)]
    description: Option<String>,

    /// Pre-generated executable prompt (skips assembly)
    #[arg(long)]
    generated_prompt: Option<String>,

    /// Browser engine: chromium, firefox, webkit, edge
    #[arg(long)]
    engine: Option<String>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Model-invocation ceiling
    #[arg(long, default_value_t = 10)]
    max_iterations: u32,
}

#[derive(Args)]
struct GenerateArgs {
    #[arg(long)]
    test_id: String,

    #[arg(long)]
    description: String,

    #[arg(long)]
    module: Option<String>,

    #[arg(long)]
    functionality: Option<String>,

    #[arg(long)]
    priority: Option<String>,
}

#[derive(Args)]
struct ValidateArgs {
    /// Prompt text to validate
    prompt: String,

    /// Treat error-tier findings as blocking
    #[arg(long)]
    strict: bool,
}

#[derive(Args)]
struct ServeArgs {
    /// Bind address (overrides QAPILOT_BIND_ADDR)
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Run(args) => run_command(args, &cli.output).await,
        Commands::Generate(args) => generate_command(args, &cli.output).await,
        Commands::Validate(args) => validate_command(args, &cli.output),
        Commands::Serve(args) => serve_command(args).await,
    }
}

async fn run_command(args: RunArgs, output: &OutputFormat) -> Result<()> {
    let config = AppConfig::from_env()?;
    config.validate_credentials()?;
    let invoker = invoker_from_settings(&config.llm)?;

    let description = args.description.clone().unwrap_or_default();
    if description.is_empty() && args.generated_prompt.is_none() {
        anyhow::bail!("either --description or --generated-prompt is required");
    }

    let mut instruction = TestInstruction::new(args.test_id, description);
    instruction.generated_prompt = args.generated_prompt;
    instruction.browser.engine = match args.engine {
        Some(raw) => BrowserEngine::parse(&raw)?,
        None => config.browser.engine,
    };
    instruction.browser.headless = !args.headed && config.browser.headless;
    instruction.browser.max_iterations = args.max_iterations;

    let coordinator = RunCoordinator::new(config, invoker);
    let outcome = coordinator
        .execute(&instruction)
        .await
        .context("run failed")?;

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
        OutputFormat::Human => print_outcome(&outcome),
    }
    Ok(())
}

fn print_outcome(outcome: &OutcomeRecord) {
    println!("test:       {}", outcome.test_id);
    println!("status:     {}", outcome.status.as_str());
    println!("duration:   {:.1}s", outcome.execution_time);
    println!("tool calls: {}", outcome.steps_executed);
    println!("pages:      {}", outcome.pages.len());
    for page in &outcome.pages {
        println!("  {} {} [{}]", page.id, page.label, page.url);
        for element in &page.key_elements {
            println!(
                "    {} {} <{}> {}",
                element.id,
                element.kind,
                element.tag,
                element.text.as_deref().unwrap_or("")
            );
        }
    }
    if !outcome.edges.is_empty() {
        println!("edges:");
        for edge in &outcome.edges {
            println!("  {} -> {} ({})", edge.source, edge.target, edge.label);
        }
    }
    if !outcome.screenshots.is_empty() {
        println!("screenshots: {}", outcome.screenshots.join(", "));
    }
    if let Some(error) = &outcome.error_message {
        println!("error:      {error}");
    }
}

async fn generate_command(args: GenerateArgs, output: &OutputFormat) -> Result<()> {
    let config = AppConfig::from_env()?;
    config.validate_credentials()?;
    let invoker = invoker_from_settings(&config.llm)?;

    let mut instruction = TestInstruction::new(args.test_id.clone(), args.description);
    instruction.module = args.module;
    instruction.functionality = args.functionality;
    instruction.priority = args.priority;

    let coordinator = RunCoordinator::new(config, invoker);
    let steps = coordinator.generate_prompt(&instruction).await?;

    match output {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "test_id": args.test_id, "generated_prompt": steps })
        ),
        OutputFormat::Human => println!("{steps}"),
    }
    Ok(())
}

fn validate_command(args: ValidateArgs, output: &OutputFormat) -> Result<()> {
    let validator = PromptValidator::new(ValidatorConfig {
        strict_mode: args.strict,
        ..ValidatorConfig::default()
    });
    let report = validator.validate(&args.prompt);

    match output {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({
                "is_valid": report.is_valid(),
                "token_count": report.token_count,
                "findings": report.findings,
                "sanitized_prompt": report.sanitized_prompt,
            })
        ),
        OutputFormat::Human => {
            println!(
                "verdict: {}",
                if report.is_valid() { "VALID" } else { "BLOCKED" }
            );
            println!("tokens:  ~{}", report.token_count);
            for finding in &report.findings {
                let tier = match finding.severity {
                    Severity::Info => "info",
                    Severity::Warning => "warn",
                    Severity::Error => "error",
                    Severity::Critical => "critical",
                };
                println!("  [{tier}] {}", finding.message);
            }
        }
    }
    if report.is_valid() {
        Ok(())
    } else {
        anyhow::bail!("prompt rejected by validator")
    }
}

async fn serve_command(args: ServeArgs) -> Result<()> {
    let mut config = AppConfig::from_env()?;
    config.validate_credentials()?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    let invoker = invoker_from_settings(&config.llm)?;
    server::serve(config, invoker).await?;
    Ok(())
}
