use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use git_cx::config::{GitConfig, Overrides, Settings};
use git_cx::dispatch::deadline_after;
use git_cx::exec::{CommandRunner, ProcessRunner};
use git_cx::{CommitPipeline, Selection, StagedChanges, create_provider};

/// Draft Conventional Commits messages for the staged changes.
#[derive(Parser, Debug)]
#[command(name = "git-cx")]
#[command(version)]
struct Cli {
    /// TOML config file (defaults to ./.git-cx.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Backend: gemini, copilot, claude, codex, api, custom
    #[arg(long)]
    provider: Option<String>,

    /// Model passed to the backend
    #[arg(long)]
    model: Option<String>,

    /// Number of subject candidates
    #[arg(long)]
    candidates: Option<usize>,

    /// Per-call timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Shell template for the custom provider, containing {prompt}
    #[arg(long)]
    command: Option<String>,

    /// Base URL for the api provider, e.g. https://api.openai.com/v1
    #[arg(long)]
    api_base_url: Option<String>,

    /// Lock the commit type
    #[arg(long = "type")]
    commit_type: Option<String>,

    /// Lock the scope
    #[arg(long)]
    scope: Option<String>,

    /// Generate body and footer for this subject instead of subject candidates
    #[arg(long)]
    subject: Option<String>,

    #[command(subcommand)]
    command_kind: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the resolved configuration (git config `cx.*`, TOML file, environment)
    Config,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            provider: self.provider.clone(),
            model: self.model.clone(),
            candidates: self.candidates,
            timeout_secs: self.timeout,
            command: self.command.clone(),
            api_base_url: self.api_base_url.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner::new());

    let git_config = GitConfig::read(runner.as_ref()).await;
    let settings = Settings::load(&git_config, cli.config.as_deref(), &cli.overrides())
        .context("failed to load configuration")?;

    if let Some(Command::Config) = cli.command_kind {
        print!("{}", settings.summary());
        return Ok(());
    }

    let changes = staged_changes(runner.as_ref(), settings.timeout_secs).await?;
    if changes.diff.trim().is_empty() {
        bail!("no staged changes (run `git add` first)");
    }

    let provider = create_provider(&settings, Arc::clone(&runner))?;
    let pipeline = CommitPipeline::new(Arc::from(provider), settings.candidates);

    let selection = Selection {
        commit_type: cli.commit_type,
        scope: cli.scope,
        subject: cli.subject,
    };

    tracing::info!(provider = pipeline.provider_name(), "generating");

    if selection.subject.is_some() {
        let detail = pipeline.suggest_detail(&changes, &selection).await?;
        println!("Body:\n{}\nFooter:\n{}", detail.body, detail.footer);
    } else {
        let candidates = pipeline.suggest_subjects(&changes, &selection).await?;
        if candidates.is_empty() {
            bail!("{} returned no candidates", pipeline.provider_name());
        }
        for (i, candidate) in candidates.iter().enumerate() {
            println!("{}. {candidate}", i + 1);
        }
    }

    Ok(())
}

/// Staged diff and stat via the system `git`.
async fn staged_changes(runner: &dyn CommandRunner, timeout_secs: u64) -> Result<StagedChanges> {
    let diff = git(runner, &["diff", "--cached"], timeout_secs).await?;
    let summary = git(runner, &["diff", "--cached", "--stat"], timeout_secs).await?;
    Ok(StagedChanges { diff, summary })
}

async fn git(runner: &dyn CommandRunner, args: &[&str], timeout_secs: u64) -> Result<String> {
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    let output = runner
        .run("git", &args, deadline_after(timeout_secs))
        .await?;
    if !output.is_success() {
        bail!("git {} failed: {}", args.join(" "), output.diagnostic());
    }
    Ok(output.stdout)
}
