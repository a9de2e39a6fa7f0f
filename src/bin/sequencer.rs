//! Command-line front end.
//!
//! Logging goes to stderr through `env_logger`; set `RUST_LOG=debug` to see
//! every request URL.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rest_sequencer::auth::mask_token;
use rest_sequencer::catalog::EndpointCatalog;
use rest_sequencer::config::{load_config, load_config_file, SequencerConfig};
use rest_sequencer::executor::{ExecutionConfig, SequenceExecutor};
use rest_sequencer::models::ExecutionResult;
use rest_sequencer::storage::{FileKeyValueStore, TokenStore, DEFAULT_STORAGE_FILE};
use rest_sequencer::{Session, SessionHandle};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "rest-sequencer", version, about = "Run chained REST API call sequences")]
struct Cli {
    /// JSON settings file with a "rest-sequencer" section
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// API root, overriding settings and the sequence file
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Bearer token for this invocation only
    #[arg(long, global = true)]
    token: Option<String>,

    /// Endpoint catalog (JSON list or OpenAPI JSON document)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a sequence file and run every step in order
    Run {
        file: PathBuf,

        /// Write the transformed final result as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Import a sequence file and list its steps without running them
    Inspect { file: PathBuf },

    /// Manage the stored bearer token
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Subcommand, Debug)]
enum TokenAction {
    Set { token: String },
    Clear,
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config_file(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => load_config(None)?,
    };

    match &cli.command {
        Command::Run { file, csv } => run(&cli, &config, file, csv.as_deref()).await,
        Command::Inspect { file } => inspect(&cli, &config, file),
        Command::Token { action } => token(&cli, &config, action),
    }
}

fn token_store(cli: &Cli, config: &SequencerConfig) -> Result<TokenStore> {
    if let Some(token) = &cli.token {
        let tokens = TokenStore::in_memory();
        tokens.set(token);
        return Ok(tokens);
    }
    let store = match &config.storage_file {
        Some(path) => FileKeyValueStore::new(path),
        None => FileKeyValueStore::in_config_dir(DEFAULT_STORAGE_FILE)?,
    };
    Ok(TokenStore::new(Box::new(store)))
}

fn load_session(cli: &Cli, config: &SequencerConfig, file: &Path) -> Result<Session> {
    let catalog = match &cli.catalog {
        Some(path) => EndpointCatalog::load(path)
            .with_context(|| format!("Failed to load catalog from {}", path.display()))?,
        None => EndpointCatalog::default(),
    };

    let mut session = Session::new(catalog)
        .with_base_url(config.base_url.clone())
        .with_token_store(token_store(cli, config)?);

    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let report = session
        .import_sequence(&text)
        .with_context(|| format!("Failed to import {}", file.display()))?;

    if let Some(base_url) = &cli.base_url {
        session.set_base_url(base_url.clone());
    }

    eprintln!(
        "Loaded {} step(s), skipped {}, {} without catalog match",
        report.loaded, report.skipped, report.placeholders
    );
    Ok(session)
}

async fn run(
    cli: &Cli,
    config: &SequencerConfig,
    file: &Path,
    csv: Option<&Path>,
) -> Result<()> {
    let session = SessionHandle::new(load_session(cli, config, file)?);
    if session.lock().token().is_none() {
        log::warn!("No bearer token set; requests are sent unauthenticated");
    }

    let executor = SequenceExecutor::with_reqwest(session.clone(), ExecutionConfig::from(config))?;
    let results = executor.run_all().await?;

    let session = session.lock();
    for (position, result) in results.iter().enumerate() {
        let label = session
            .step_at(position)
            .map(|s| format!("{} {}", s.endpoint.method, s.endpoint.path))
            .unwrap_or_default();
        println!("step{} {} -> {}", position, label, describe(result));
    }

    let halted = results.last().map_or(false, ExecutionResult::is_failure);

    if let Some(path) = csv {
        let table = session.transformed_table();
        let out = std::fs::File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        table.write_csv(out)?;
        eprintln!("Wrote {} row(s) to {}", table.rows.len(), path.display());
    }

    if halted {
        bail!("Sequence halted after {} step(s)", results.len());
    }
    Ok(())
}

fn describe(result: &ExecutionResult) -> String {
    if let Some(summary) = result.iteration_summary() {
        return format!(
            "{} iteration(s): {} succeeded, {} failed, {} item(s)",
            summary.total_iterations,
            summary.succeeded,
            summary.failed,
            summary.unified_items.len()
        );
    }
    match result {
        ExecutionResult::Success { http_status, .. } => {
            format!("{} ({} record(s))", http_status, result.records().len())
        }
        ExecutionResult::Failure { message, .. } => format!("FAILED: {}", message),
    }
}

fn inspect(cli: &Cli, config: &SequencerConfig, file: &Path) -> Result<()> {
    let session = load_session(cli, config, file)?;
    println!("Base URL: {}", session.base_url());
    for (position, step) in session.steps().iter().enumerate() {
        let marker = if step.is_imported_placeholder { " [not in catalog]" } else { "" };
        println!(
            "step{} {} {}{}",
            position, step.endpoint.method, step.endpoint.path, marker
        );
        for (param, expression) in &step.variable_mappings {
            println!("    {} <- {}", param, expression);
        }
        if step.iteration.is_active() {
            println!(
                "    for each {} in {}",
                step.iteration.loop_variable, step.iteration.source_expression
            );
        }
    }
    Ok(())
}

fn token(cli: &Cli, config: &SequencerConfig, action: &TokenAction) -> Result<()> {
    let session = Session::new(EndpointCatalog::default()).with_token_store(token_store(cli, config)?);
    match action {
        TokenAction::Set { token } => {
            if !session.set_token(token) {
                bail!("Failed to store token");
            }
            println!("Token stored");
        }
        TokenAction::Clear => {
            if !session.clear_token() {
                bail!("Failed to clear token");
            }
            println!("Token cleared");
        }
        TokenAction::Show => match session.token() {
            Some(token) => println!("{}", mask_token(&token)),
            None => println!("No token stored"),
        },
    }
    Ok(())
}
