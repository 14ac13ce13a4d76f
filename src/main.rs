use clap::Parser;
use colored::*;
use eyre::{Context, Result, bail};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

mod cli;
mod config;

use cli::Cli;
use cli::commands::{CatalogCommands, Commands, SelectArgs};
use config::Config;
use toolrag::api::{ChatRequest, handle_chat, handle_chat_json};
use toolrag::executor::{McpExecutor, ToolExecutor};
use toolrag::llm::GeminiClient;
use toolrag::orchestrator::{LoopState, Orchestrator};
use toolrag::selector::{LexicalSelector, SelectionOptions};
use toolrag::tools::{CatalogReport, ToolCatalog};

type LiveOrchestrator = Orchestrator<GeminiClient, McpExecutor>;

fn setup_logging(level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("toolrag")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("toolrag.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    // RUST_LOG wins over the config level
    let mut builder = env_logger::Builder::new();
    builder.filter_level(log::LevelFilter::Info);
    if let Some(level) = level {
        builder.parse_filters(level);
    }
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn load_catalog(cli: &Cli, config: &Config) -> Result<Arc<ToolCatalog>> {
    let path = cli.catalog.as_ref().or(config.catalog.path.as_ref());
    let catalog = ToolCatalog::load(path.map(PathBuf::as_path)).context("Failed to load tool catalog")?;
    Ok(Arc::new(catalog))
}

fn build_orchestrator(config: &Config, catalog: Arc<ToolCatalog>, all_tools: bool) -> Result<LiveOrchestrator> {
    let llm = GeminiClient::new(config.llm.to_gemini()).context("Failed to create model client")?;
    let executor = McpExecutor::new(config.executor.to_mcp());

    let selection = if all_tools {
        None
    } else {
        config.selector.active_options()
    };

    Ok(Orchestrator::new(Arc::new(llm), Arc::new(executor), catalog)
        .with_config(config.orchestrator.clone())
        .with_selection(selection))
}

/// Token that trips on Ctrl-C
fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling request");
            trigger.cancel();
        }
    });
    token
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        eprintln!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Select(args) => handle_select_command(args, cli, config),
        Commands::Catalog { command } => match command {
            CatalogCommands::List => handle_catalog_list(cli, config),
            CatalogCommands::Validate { against_server } => {
                handle_catalog_validate(*against_server, cli, config).await
            }
        },
        Commands::Ask { message, all_tools } => handle_ask_command(message, *all_tools, cli, config).await,
        Commands::Chat { json } => handle_chat_command(*json, cli, config).await,
    }
}

fn handle_select_command(args: &SelectArgs, cli: &Cli, config: &Config) -> Result<()> {
    info!("Selecting tools for: {}", args.message);
    let catalog = load_catalog(cli, config)?;

    let mut options: SelectionOptions = config.selector.options();
    if let Some(top_k) = args.top_k {
        options.top_k = top_k;
    }
    if let Some(fallback_k) = args.fallback_k {
        options.fallback_k = fallback_k;
    }
    if !args.always_include.is_empty() {
        options.always_include = args.always_include.clone();
    }
    options.debug |= args.debug;

    let selection = LexicalSelector::new(catalog.clone(), options).select(&args.message);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&selection)?);
        return Ok(());
    }

    println!(
        "{} {} of {} tools ({})",
        "Selected:".green(),
        selection.len(),
        catalog.len(),
        selection.reason.to_string().cyan()
    );
    for (i, name) in selection.names.iter().enumerate() {
        println!("  {:>2}. {}", i + 1, name);
    }

    if let Some(scored) = &selection.scored {
        println!("\n{}", "Scores:".yellow());
        for tool in scored {
            let line = format!("  {:>4}  {}", tool.score, tool.name);
            if tool.score > 0 {
                println!("{}", line);
            } else {
                println!("{}", line.dimmed());
            }
        }
    }
    Ok(())
}

fn handle_catalog_list(cli: &Cli, config: &Config) -> Result<()> {
    let catalog = load_catalog(cli, config)?;

    println!("{} {} tools (fingerprint {})", "Catalog:".green(), catalog.len(), catalog.fingerprint());
    for tool in catalog.all() {
        println!("  {:<14} {}", tool.category.as_str().cyan(), tool.name.bold());
        println!("  {:<14} {}", "", tool.description.dimmed());
    }
    Ok(())
}

async fn handle_catalog_validate(against_server: bool, cli: &Cli, config: &Config) -> Result<()> {
    let catalog = load_catalog(cli, config)?;

    let server_tools = if against_server {
        let executor = McpExecutor::new(config.executor.to_mcp());
        let tools = executor.list_tools().await.context("Failed to list server tools");
        executor.shutdown().await;
        Some(tools?)
    } else {
        None
    };

    let report = CatalogReport::build(&catalog, server_tools.as_deref());

    println!("{} {} tools", "Catalog:".green(), report.catalog_tool_count);
    if let Some(count) = report.server_tool_count {
        println!("{} {} tools, {} matched", "Server:".green(), count, report.matched_tools);
    }
    for warning in &report.warnings {
        println!("  {} {}", "warning:".yellow(), warning);
    }
    for error in &report.errors {
        println!("  {} {}", "error:".red(), error);
    }

    if !report.is_valid() {
        bail!("Catalog validation failed with {} error(s)", report.errors.len());
    }
    println!("{}", "Catalog OK".green());
    Ok(())
}

async fn handle_ask_command(message: &str, all_tools: bool, cli: &Cli, config: &Config) -> Result<()> {
    let catalog = load_catalog(cli, config)?;
    let orchestrator = build_orchestrator(config, catalog, all_tools)?;
    let cancel = ctrl_c_token();

    let result = orchestrator.respond(message, &[], &cancel).await;
    orchestrator.executor().shutdown().await;
    let outcome = result.context("Failed to generate response")?;

    if cli.is_verbose() {
        if let Some(selection) = &outcome.selection {
            eprintln!("{} {} ({})", "Tools:".cyan(), selection.names.join(", "), selection.reason);
        }
        for round in &outcome.rounds {
            for call in &round.invocations {
                let status = match &call.error {
                    Some(e) => format!("failed: {}", e).red(),
                    None => "ok".green(),
                };
                eprintln!("  [round {}] {} {} ({}ms)", round.round, call.tool, status, call.elapsed_ms);
            }
        }
        eprintln!(
            "{} {} model calls, {} input / {} output tokens",
            "Usage:".cyan(),
            outcome.model_calls,
            outcome.usage.input_tokens,
            outcome.usage.output_tokens
        );
    }

    match outcome.state {
        LoopState::Cancelled => bail!("Request cancelled"),
        LoopState::AbortedLoopLimit => println!("{}", outcome.text.yellow()),
        _ => println!("{}", outcome.text),
    }

    for payload in outcome.payloads.values() {
        println!("\n{} {}", "Payload from".cyan(), payload.tool);
        println!("{}", serde_json::to_string_pretty(&payload.data)?);
    }
    Ok(())
}

async fn handle_chat_command(json: bool, cli: &Cli, config: &Config) -> Result<()> {
    let mut body = String::new();
    tokio::io::stdin()
        .read_to_string(&mut body)
        .await
        .context("Failed to read request from stdin")?;

    let catalog = load_catalog(cli, config)?;
    let orchestrator = build_orchestrator(config, catalog, false)?;
    let cancel = ctrl_c_token();

    let reply = if json {
        handle_chat_json(&orchestrator, &body, &cancel).await
    } else {
        handle_chat(&orchestrator, &ChatRequest::new(body.trim()), &cancel).await
    };
    orchestrator.executor().shutdown().await;

    if json {
        println!("{}", serde_json::to_string(&reply.to_json())?);
    } else {
        println!("{}", reply.to_text());
    }
    if !reply.is_success() {
        bail!("Chat request failed with status {}", reply.status);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(config.log_level.as_deref()).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
