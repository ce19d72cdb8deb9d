//! repocheck - lint checks for source repositories
//!
//! The `repocheck` command registers repositories, runs checks on demand or
//! from a push webhook payload, and shows recorded results.
//!
//! ## Commands
//!
//! - `repo`: Register, list and remove repositories
//! - `check`: Run a check, list recent checks, show one check
//! - `webhook`: Handle a webhook payload read from a file or stdin

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use repocheck_ci::{
    CheckEngine, CheckService, FailureNotifier, LogNotifier, ProcessRunner, WebhookNotifier,
    WebhookReply,
};
use repocheck_core::{present, telemetry, EngineConfig, GithubClient, GithubConfig, RepositoryRef};
use repocheck_state::{CheckId, CheckRecord, CheckStore, RepositoryStore, SurrealStore};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, Level};

/// Config file read when `--config` is not given.
const DEFAULT_CONFIG_FILE: &str = "repocheck.toml";

#[derive(Parser)]
#[command(name = "repocheck")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Lint checks for source repositories", long_about = None)]
struct Cli {
    /// Engine config file (TOML)
    #[arg(long, global = true, env = "REPOCHECK_CONFIG")]
    config: Option<PathBuf>,

    /// Database endpoint (mem://, surrealkv://path, ws://host:port)
    #[arg(long, global = true, env = "SURREALDB_URL")]
    db: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage registered repositories
    Repo {
        #[command(subcommand)]
        action: RepoAction,
    },

    /// Run and inspect checks
    Check {
        #[command(subcommand)]
        action: CheckAction,
    },

    /// Handle a webhook delivery and print the JSON outcome
    ///
    /// Exits 0 when a check was created or the event ignored, 2 when the
    /// repository is unknown and 1 otherwise.
    Webhook {
        /// Event type header value (empty counts as push)
        #[arg(long)]
        event: Option<String>,

        /// Payload file, or `-` for stdin
        #[arg(long, default_value = "-")]
        payload: String,
    },
}

#[derive(Subcommand)]
enum RepoAction {
    /// Register a repository from host metadata
    Add {
        /// External id or `owner/name`
        identifier: String,

        /// Install a push hook delivering to this URL
        #[arg(long)]
        hook_url: Option<String>,
    },
    /// List registered repositories
    List,
    /// Remove a repository and its checks
    Remove {
        /// External id or `owner/name`
        identifier: String,
    },
}

#[derive(Subcommand)]
enum CheckAction {
    /// Create and perform a check
    Run {
        /// External id or `owner/name`
        repository: String,

        /// Commit to check (default: the default branch HEAD)
        #[arg(long)]
        commit: Option<String>,
    },
    /// List the most recent checks of a repository
    List {
        /// External id or `owner/name`
        repository: String,

        /// Maximum number of checks to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Show one check with its offenses
    Show {
        /// Check id
        check_id: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    telemetry::init_tracing(cli.json_logs, level);

    let config = load_config(cli.config.as_deref())?;
    let store = Arc::new(match cli.db.as_deref() {
        Some(url) => SurrealStore::connect(url).await,
        None => SurrealStore::from_env().await,
    }
    .context("Failed to connect to repocheck database")?);

    let webhook = config
        .notify
        .webhook_url
        .as_deref()
        .map(WebhookNotifier::new)
        .transpose()?
        .map(Arc::new);
    let notifier: Arc<dyn FailureNotifier> = match &webhook {
        Some(webhook) => webhook.clone(),
        None => Arc::new(LogNotifier),
    };
    let github = config.github.clone();
    let engine = CheckEngine::new(
        store.clone(),
        store,
        Arc::new(ProcessRunner),
        notifier,
        config,
    );
    let service = CheckService::new(Arc::new(engine));

    let code = run(cli.command, &service, &github).await;
    if let Some(webhook) = webhook {
        webhook.flush().await;
    }
    code
}

async fn run(command: Commands, service: &CheckService, github: &GithubConfig) -> Result<ExitCode> {
    match command {
        Commands::Repo { action } => match action {
            RepoAction::Add {
                identifier,
                hook_url,
            } => {
                let host = GithubClient::new(github)?;
                cmd_repo_add(service, &host, &identifier, hook_url.as_deref()).await?;
            }
            RepoAction::List => cmd_repo_list(service).await?,
            RepoAction::Remove { identifier } => cmd_repo_remove(service, &identifier).await?,
        },
        Commands::Check { action } => match action {
            CheckAction::Run { repository, commit } => {
                let check = cmd_check_run(service, &repository, commit).await?;
                if !check.passed {
                    return Ok(ExitCode::FAILURE);
                }
            }
            CheckAction::List { repository, limit } => {
                cmd_check_list(service, &repository, limit).await?
            }
            CheckAction::Show { check_id, json } => cmd_check_show(service, &check_id, json).await?,
        },
        Commands::Webhook { event, payload } => {
            let payload = read_payload(&payload)?;
            let code = cmd_webhook(service, event.as_deref(), &payload).await?;
            return Ok(ExitCode::from(code));
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::load_or_default(DEFAULT_CONFIG_FILE)?,
    };
    debug!(workspace_root = %config.workspace_root.display(), "config loaded");
    Ok(config)
}

/// Read a webhook payload from a file, or stdin for `-`.
fn read_payload(source: &str) -> Result<serde_json::Value> {
    let raw = if source == "-" {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("Failed to read payload from stdin")?;
        raw
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("Failed to read payload file '{}'", source))?
    };
    serde_json::from_str(&raw).context("Payload is not valid JSON")
}

/// Register a repository
async fn cmd_repo_add(
    service: &CheckService,
    host: &GithubClient,
    identifier: &str,
    hook_url: Option<&str>,
) -> Result<()> {
    let repo = service
        .register_repository(host, &RepositoryRef::parse(identifier), hook_url)
        .await
        .with_context(|| format!("Failed to register '{}'", identifier))?;

    println!(
        "Registered {} (id {}, {})",
        repo.full_name, repo.external_id, repo.language
    );
    if let Some(url) = hook_url {
        println!("Push hook -> {}", url);
    }
    Ok(())
}

/// List registered repositories
async fn cmd_repo_list(service: &CheckService) -> Result<()> {
    let repos = service.engine().repositories().list_repositories().await?;

    if repos.is_empty() {
        println!("No repositories registered. Run 'repocheck repo add' first.");
        return Ok(());
    }

    for repo in repos {
        println!("{:>12}  {:<40} {}", repo.external_id, repo.full_name, repo.language);
    }
    Ok(())
}

/// Remove a repository
async fn cmd_repo_remove(service: &CheckService, identifier: &str) -> Result<()> {
    let repo = service
        .remove_repository(&RepositoryRef::parse(identifier))
        .await
        .with_context(|| format!("Failed to remove '{}'", identifier))?;

    println!("Removed {} and its checks", repo.full_name);
    Ok(())
}

/// Create and perform a check
async fn cmd_check_run(
    service: &CheckService,
    repository: &str,
    commit: Option<String>,
) -> Result<CheckRecord> {
    let check = service
        .request_check(&RepositoryRef::parse(repository), commit)
        .await
        .with_context(|| format!("Failed to check '{}'", repository))?;

    println!("Check {}", check.id);
    println!("State:  {}", check.state);
    println!("Commit: {}", check.commit_id.as_deref().unwrap_or("-"));
    println!("Status: {}", verdict(&check));
    if let Some(error) = &check.error {
        println!("Error:  {}", error);
    }
    Ok(check)
}

/// List recent checks, newest first
async fn cmd_check_list(service: &CheckService, repository: &str, limit: usize) -> Result<()> {
    let checks = service
        .recent_checks(&RepositoryRef::parse(repository), limit)
        .await?;

    if checks.is_empty() {
        println!("No checks found for '{}'", repository);
        return Ok(());
    }

    for check in checks {
        println!(
            "{}  {}  {:<8} {:<6} {}",
            check.id,
            check.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            check.state.as_str(),
            verdict(&check),
            short_sha(check.commit_id.as_deref()),
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct CheckView {
    check: CheckRecord,
    repository: String,
    presentation: repocheck_core::Presentation,
}

/// Show one check with its presented offenses
async fn cmd_check_show(service: &CheckService, check_id: &str, json: bool) -> Result<()> {
    let view = check_view(service, check_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    let check = &view.check;
    println!("Check {} ({})", check.id, view.repository);
    println!("State:    {}", check.state);
    println!("Commit:   {}", check.commit_id.as_deref().unwrap_or("-"));
    println!(
        "Exit:     {}",
        check
            .exit_status
            .map(|code| code.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    if let Some(error) = &check.error {
        println!("Error:    {}", error);
    }
    println!(
        "Result:   {} ({} offenses)",
        if view.presentation.passed { "passed" } else { "failed" },
        view.presentation.offenses_count
    );
    for entry in &view.presentation.entries {
        let rule = entry.rule.as_deref().unwrap_or("-");
        println!("  {}:{} [{}] {}", entry.path, entry.location, rule, entry.message);
    }
    Ok(())
}

async fn check_view(service: &CheckService, check_id: &str) -> Result<CheckView> {
    let engine = service.engine();
    let check = engine
        .checks()
        .get_check(&CheckId(check_id.to_string()))
        .await
        .with_context(|| format!("Failed to load check '{}'", check_id))?;
    let repo = engine
        .repositories()
        .find_by_external_id(check.repository_id)
        .await?
        .with_context(|| format!("Repository {} no longer registered", check.repository_id))?;

    let presentation = present(&check, &repo.language);
    Ok(CheckView {
        check,
        repository: repo.full_name,
        presentation,
    })
}

/// Handle a webhook payload; returns the process exit code.
async fn cmd_webhook(
    service: &CheckService,
    event: Option<&str>,
    payload: &serde_json::Value,
) -> Result<u8> {
    let result = service.handle_webhook(event, payload).await;
    let reply = WebhookReply::from_result(&result);
    println!("{}", serde_json::to_string(&reply.body)?);
    Ok(webhook_exit_code(&reply))
}

fn webhook_exit_code(reply: &WebhookReply) -> u8 {
    match reply.status.http_status() {
        200..=299 => 0,
        404 => 2,
        _ => 1,
    }
}

fn verdict(check: &CheckRecord) -> &'static str {
    if !check.state.is_terminal() {
        "-"
    } else if check.passed {
        "passed"
    } else {
        "failed"
    }
}

fn short_sha(commit: Option<&str>) -> String {
    match commit {
        Some(sha) => sha.chars().take(7).collect(),
        None => "-".to_string(),
    }
}
