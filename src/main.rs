mod changeset;
mod cli;
mod command;
mod constants;
mod error;
mod generate;
mod git;
mod inspect;
mod orchestrator;
mod repl;
mod session;
mod store;
#[cfg(test)]
mod testing;
mod ui;

use crate::cli::Cli;
use crate::generate::{HttpGenerator, MessageGenerator, RetryPolicy};
use crate::git::GitBackend;
use crate::session::{Session, SessionOptions, TerminalOperator};
use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse_args();
    init_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// diagnostics go to stderr; `RUST_LOG` wins over `--verbose`
fn init_logging(verbose: bool) {
    let default = if verbose { "gita=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    // sanity checks
    if !std::io::stdin().is_terminal()
        || !std::io::stdout().is_terminal()
        || !std::io::stderr().is_terminal()
    {
        bail!("interactive terminal required");
    }
    let key_path = cli
        .key_path()
        .context("no key file given and no config directory to look in")?;
    let api_key = read_key(&key_path)?;
    let backend = GitBackend::discover(&cli.repo)?;
    tracing::debug!(root = %backend.root().display(), "repository found");

    let service = HttpGenerator::new(
        &cli.api_url,
        &api_key,
        &cli.model,
        Duration::from_secs(cli.timeout),
    );
    let generator = MessageGenerator::new(service, RetryPolicy::default().with_attempts(cli.retries))
        .show_prompt(cli.debug_prompt);
    let options = SessionOptions {
        jobs: cli.jobs,
        ready_policy: cli.ready_policy,
    };

    status!("staging and describing changes...");
    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")
            .context("invalid progress template")?
            .progress_chars("=> "),
    );
    progress.enable_steady_tick(Duration::from_millis(100));
    let mut session = Session::start(backend, generator, &options, &progress)?;

    if session.store().is_empty() {
        warning!("no changes found");
    } else {
        ui::render_table(session.store());
    }
    info!("type `help` for commands");

    repl::run(&mut session, &mut TerminalOperator)
}

/// the api key, trimmed; a missing or empty key file is fatal
fn read_key(path: &Path) -> Result<String> {
    let key = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read api key from {}", path.display()))?;
    let key = key.trim();
    if key.is_empty() {
        bail!("api key file {} is empty", path.display());
    }
    Ok(key.to_string())
}
