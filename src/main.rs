use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use history_tutor::analyzer::{Analyzer, GeminiAnalyzer, GeminiSettings, UnconfiguredAnalyzer};
use history_tutor::config::{API_KEY_ENV, Config};
use history_tutor::error::NavigationError;
use history_tutor::history::{GitHistory, HistorySource, RepoLocator, SizeEstimate};
use history_tutor::navigation::{
    Direction, NavigationCoordinator, NavigationOptions, Resolution, SessionStorage,
};
use history_tutor::presenter::{HELP, Presenter};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_COMMIT_HASH"),
    ", built ",
    env!("BUILD_TIMESTAMP"),
    ")"
);

/// Learn a codebase by walking its commits oldest-first with AI explanations
#[derive(Parser, Debug)]
#[command(name = "history-tutor", version = VERSION, about)]
#[command(group(ArgGroup::new("source").required(true).args(["repo", "local"])))]
struct Cli {
    /// Repository URL to clone (or refresh) into the workspace
    #[arg(long, value_name = "URL")]
    repo: Option<String>,

    /// Existing local repository
    #[arg(long, value_name = "PATH")]
    local: Option<PathBuf>,

    /// Branch or revision to walk (default: the repository's HEAD)
    #[arg(long)]
    branch: Option<String>,

    /// Neither read nor write the session cache
    #[arg(long)]
    no_cache: bool,

    /// Resume from the saved position even if it is the first commit
    #[arg(long)]
    resume: bool,

    /// Delete the saved session for this repository before starting
    #[arg(long)]
    reset: bool,

    /// Print cache statistics and exit
    #[arg(long)]
    stats: bool,

    /// Configuration file (default: platform config dir)
    #[arg(long, value_name = "FILE", env = "HISTORY_TUTOR_CONFIG")]
    config: Option<PathBuf>,
}

enum Command {
    Step(Direction),
    Diff,
    Stats,
    Retry,
    Ask(String),
    Help,
    Quit,
    Unknown(String),
}

fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let command = match word.to_lowercase().as_str() {
        "" => return None,
        "a" | "ask" => Command::Ask(rest.trim().to_string()),
        "n" | "next" => Command::Step(Direction::Next),
        "p" | "prev" | "previous" => Command::Step(Direction::Previous),
        "d" | "diff" => Command::Diff,
        "s" | "stats" => Command::Stats,
        "r" | "retry" => Command::Retry,
        "h" | "help" | "?" => Command::Help,
        "q" | "quit" | "exit" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    };
    Some(command)
}

struct Session {
    nav: NavigationCoordinator<GitHistory>,
    presenter: Presenter,
    origin: Option<String>,
}

impl Session {
    async fn show(&self, resolution: &Resolution) -> Result<()> {
        let details = self
            .nav
            .history()
            .commit_details(resolution.index)
            .context("Failed to read commit details")?;
        let stats = self.nav.stats().await;
        println!(
            "\n{}",
            self.presenter.resolution(
                resolution,
                &details,
                self.nav.total_commits(),
                self.origin.as_deref(),
                stats.as_ref()
            )
        );
        Ok(())
    }

    /// Show the outcome of a step; `Err` only for unrecoverable failures
    async fn report(&self, result: Result<Resolution, NavigationError>) -> Result<()> {
        match result {
            Ok(resolution) => self.show(&resolution).await,
            Err(err) => {
                if let NavigationError::Persistence {
                    resolution: Some(resolution),
                    ..
                } = &err
                {
                    self.show(resolution).await?;
                }
                eprintln!("{}", self.presenter.error(&err));
                if err.is_recoverable() {
                    Ok(())
                } else {
                    Err(err.into())
                }
            }
        }
    }

    /// Run a step that Ctrl-C cancels
    async fn step(&mut self, direction: Direction) -> Result<()> {
        let cancel = CancellationToken::new();
        let watcher = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };

        if direction == Direction::Next {
            println!("Analyzing... (Ctrl-C to cancel)");
        }
        let result = self.nav.step_cancellable(direction, &cancel).await;
        watcher.abort();
        self.report(result).await
    }

    async fn resolve_current(&mut self) -> Result<()> {
        let cancel = CancellationToken::new();
        let watcher = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };
        let result = self.nav.resolve_current(&cancel).await;
        watcher.abort();
        self.report(result).await
    }

    async fn run(&mut self) -> Result<()> {
        println!("\nType 'h' for help.");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            print!("> ");
            std::io::stdout().flush().ok();

            let line = tokio::select! {
                line = lines.next_line() => line.context("Failed to read input")?,
                _ = tokio::signal::ctrl_c() => None,
            };
            let Some(line) = line else {
                break;
            };
            let Some(command) = parse_command(&line) else {
                continue;
            };

            match command {
                Command::Step(direction) => self.step(direction).await?,
                Command::Diff => {
                    let details = self
                        .nav
                        .history()
                        .commit_details(self.nav.current_index())
                        .context("Failed to read commit details")?;
                    println!("{}", self.presenter.diff(&details.diff_content));
                }
                Command::Stats => {
                    let stats = self.nav.stats().await;
                    println!(
                        "{}",
                        self.presenter.stats(stats.as_ref(), self.nav.unsaved_count())
                    );
                }
                Command::Retry => match self.nav.retry_unsaved().await {
                    Ok(saved) => println!("Saved {} analyses", saved),
                    Err(err) => eprintln!("{}", self.presenter.error(&err)),
                },
                Command::Ask(question) if question.is_empty() => {
                    println!("Usage: ask <question about the current commit>")
                }
                Command::Ask(question) => {
                    println!("Thinking...");
                    match self.nav.ask(&question).await {
                        Ok(answer) => println!("{}", self.presenter.answer(&answer)),
                        Err(err) => eprintln!("{}", self.presenter.error(&err)),
                    }
                }
                Command::Help => println!("{}", HELP),
                Command::Quit => break,
                Command::Unknown(other) => {
                    println!("Unknown command '{}'. Type 'h' for help.", other)
                }
            }
        }

        // Let background analyses finish writing before exiting
        self.nav.flush().await;
        if self.nav.unsaved_count() > 0 {
            eprintln!(
                "{}",
                self.presenter.warning(&format!(
                    "{} analyses could not be saved",
                    self.nav.unsaved_count()
                ))
            );
        }
        println!("Progress saved. Goodbye!");
        Ok(())
    }
}

fn build_analyzer(config: &Config, presenter: &Presenter) -> Result<Arc<dyn Analyzer>> {
    match Config::api_key() {
        Some(api_key) => {
            let analyzer = GeminiAnalyzer::new(GeminiSettings {
                endpoint: config.analyzer.endpoint.clone(),
                model: config.analyzer.model.clone(),
                api_key,
                timeout_secs: config.analyzer.timeout_secs,
                max_diff_chars: config.analyzer.max_diff_chars,
            })
            .context("Failed to create analyzer")?;
            Ok(Arc::new(analyzer))
        }
        None => {
            eprintln!(
                "{}",
                presenter.warning(&format!(
                    "{} is not set; only cached analyses can be shown",
                    API_KEY_ENV
                ))
            );
            Ok(Arc::new(UnconfiguredAnalyzer::new(format!(
                "{} is not set",
                API_KEY_ENV
            ))))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if cli.no_cache {
        config.cache.enabled = false;
    }
    let log_path = history_tutor::logging::initialize(&config.logging);
    tracing::debug!("Configuration: {:?}", config);

    let presenter = Presenter::new();
    let locator = match (&cli.repo, &cli.local) {
        (Some(url), _) => RepoLocator::remote(url.clone())?,
        (None, Some(path)) => RepoLocator::local(path.clone())?,
        (None, None) => anyhow::bail!("either --repo or --local is required"),
    };
    let identity = locator.identity();
    let storage = SessionStorage::in_dirs(
        &config.cache.directory,
        &config.workspace.architecture_dir,
        &identity,
    );

    if cli.reset {
        storage
            .reset(&identity)
            .context("Failed to reset session")?;
        println!("Session for {} reset", identity.name);
    }

    println!("Preparing {}...", identity.name);
    let (history, size) = {
        let locator = locator.clone();
        let repos_dir = config.workspace.repos_dir.clone();
        let branch = cli.branch.clone();
        let options = config.history_options();
        let context_window = config.analyzer.context_window;
        tokio::task::spawn_blocking(move || -> Result<(GitHistory, Option<SizeEstimate>)> {
            let prepared = locator.prepare(&repos_dir, branch.as_deref())?;
            let history =
                GitHistory::open(&prepared.path, prepared.revision.as_deref(), options)?;
            let size = match history.estimate_size(context_window) {
                Ok(size) => Some(size),
                Err(e) => {
                    tracing::warn!("Could not estimate repository size: {}", e);
                    None
                }
            };
            Ok((history, size))
        })
        .await
        .context("Repository preparation task failed")??
    };
    if let Some(size) = size
        && size.exceeds(config.analyzer.size_warning_threshold)
    {
        tracing::warn!(
            "Repository exceeds size threshold: {:.1}% ({} files)",
            size.percentage(),
            size.file_count
        );
        eprintln!(
            "{}",
            presenter.size_warning(&size, config.analyzer.size_warning_threshold)
        );
    }

    let analyzer = build_analyzer(&config, &presenter)?;
    let options = NavigationOptions {
        cache_enabled: config.cache.enabled,
        force_resume: cli.resume,
        degrade_on_failure: config.cache.degrade_on_failure,
    };
    let mut nav = NavigationCoordinator::new(history, analyzer, identity, storage, options);

    let report = nav.start().await.context("Failed to start session")?;
    println!("{}", presenter.start(&report, nav.total_commits()));
    if let Some(path) = log_path {
        tracing::debug!("Debug log at {}", path.display());
    }

    let mut session = Session {
        nav,
        presenter,
        origin: locator.origin_url().map(|s| s.to_string()),
    };

    if cli.stats {
        let stats = session.nav.stats().await;
        println!("{}", session.presenter.stats(stats.as_ref(), 0));
        return Ok(());
    }

    session.resolve_current().await?;
    session.run().await
}
