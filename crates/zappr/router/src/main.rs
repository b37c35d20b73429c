//! zappr-eval - dry run of the approval check
//!
//! Evaluates one recorded webhook against a `.zappr.yaml` policy and a JSON
//! fixture describing the GitHub side, using in-memory collaborators, and
//! prints everything the check would have published.

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zappr_router::{
    ApprovalCheck, AuditEvent, EvalConfig, GitHubFixture, InMemoryPullRequestStore, Outcome, RecordingAuditSink,
    SimulatedGitHub, StoreCall, VcsCall,
};
use zappr_types::{RepositoryConfig, Verdict};

/// zappr-eval CLI
#[derive(Parser)]
#[command(name = "zappr-eval")]
#[command(about = "Evaluate a GitHub webhook against a Zappr approval policy", long_about = None)]
#[command(version)]
struct Cli {
    /// Repository policy (.zappr.yaml)
    #[arg(short, long)]
    policy: PathBuf,

    /// GitHub event name (pull_request, issue_comment)
    #[arg(short, long)]
    event: String,

    /// Webhook payload (JSON)
    #[arg(long)]
    payload: PathBuf,

    /// GitHub fixture (JSON)
    #[arg(short, long)]
    fixture: Option<PathBuf>,

    /// Last push of the pull request; comments before it are ignored
    #[arg(long)]
    last_push: Option<DateTime<Utc>>,

    /// Configuration file path
    #[arg(short, long, env = "ZAPPR_CONFIG")]
    config: Option<String>,

    /// Log level
    #[arg(long, env = "ZAPPR_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "ZAPPR_LOG_JSON")]
    json: bool,
}

/// What the check would have published
#[derive(Serialize)]
struct Report {
    outcome: Outcome,
    statuses: Vec<Verdict>,
    comment_edits: Vec<CommentEdit>,
    audit_events: Vec<AuditEvent>,
    github_calls: Vec<VcsCall>,
    store_calls: Vec<StoreCall>,
}

#[derive(Serialize)]
struct CommentEdit {
    comment_id: u64,
    body: String,
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = EvalConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    // Initialize tracing
    let level = cli.log_level.clone().unwrap_or_else(|| config.logging.level.clone());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into());

    if cli.json || config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let policy = RepositoryConfig::from_yaml(&read(&cli.policy)?)
        .context("Invalid policy")?
        .approvals
        .compile()
        .context("Invalid policy")?;
    let payload: serde_json::Value = serde_json::from_str(&read(&cli.payload)?).context("Invalid payload")?;
    let fixture: GitHubFixture = match &cli.fixture {
        Some(path) => serde_json::from_str(&read(path)?).context("Invalid fixture")?,
        None => GitHubFixture::default(),
    };

    let github = Arc::new(SimulatedGitHub::from_fixture(fixture));
    let store = Arc::new(
        InMemoryPullRequestStore::new().with_initial_push(cli.last_push.unwrap_or(DateTime::<Utc>::MIN_UTC)),
    );
    let audit = Arc::new(RecordingAuditSink::new());
    let check = ApprovalCheck::new(github.clone(), store.clone(), audit.clone());

    let outcome = check
        .handle(&policy, &cli.event, payload, &config.token, config.repository_id)
        .await?;

    let report = Report {
        outcome,
        statuses: github.statuses().await,
        comment_edits: github
            .comment_edits()
            .await
            .into_iter()
            .map(|(id, body)| CommentEdit { comment_id: id.0, body })
            .collect(),
        audit_events: audit.events().await,
        github_calls: github.calls().await,
        store_calls: store.calls().await,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
