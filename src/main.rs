use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use dialoguer::Select;

use flurry::config::{self, Config, Overrides};
use flurry::cycle::{CycleOutcome, run_cycle};
use flurry::dispatch::GenerationResult;
use flurry::dispatch::http::HttpDispatch;
use flurry::git;
use flurry::prompt::CommitStyle;
use flurry::response::CycleReport;

/// Generate commit messages by asking several AI providers at once.
#[derive(Parser, Debug)]
#[command(name = "flurry")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Language of the generated messages (e.g. en, pt)
    #[arg(short, long)]
    locale: Option<String>,

    /// Messages to request from each model
    #[arg(short, long)]
    generate: Option<usize>,

    /// Commit style: conventional, gitmoji or plain
    #[arg(short = 't', long = "type")]
    style: Option<CommitStyle>,

    /// Stage all tracked and untracked changes first
    #[arg(short, long)]
    all: bool,

    /// Extra files to leave out of the diff
    #[arg(short = 'x', long = "exclude", value_delimiter = ',')]
    excludes: Vec<String>,

    /// Commit with the first candidate without prompting
    #[arg(short = 'y', long)]
    confirm: bool,

    /// Print the chosen message instead of committing
    #[arg(short, long)]
    dry_run: bool,

    /// Print the cycle report as JSON and exit
    #[arg(long)]
    json: bool,

    /// Per-request timeout in milliseconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Inspect or edit the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the config file location
    Path,
    /// Print every resolved setting
    List,
    /// Print resolved settings
    Get { keys: Vec<String> },
    /// Set `key=value` pairs, e.g. `openai.key=sk-...` or `generate=3`
    Set {
        #[arg(required = true)]
        pairs: Vec<String>,
    },
    /// Remove a setting or a whole provider table
    Del { key: String },
}

const LIST_KEYS: &[&str] = &[
    "locale",
    "generate",
    "type",
    "max_length",
    "timeout",
    "max_tokens",
    "temperature",
    "top_p",
    "system_prompt",
    "system_prompt_path",
    "excludes",
];

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    dotenvy::dotenv().ok();

    let overrides = Overrides {
        locale: cli.locale.clone(),
        generate: cli.generate,
        style: cli.style,
        timeout_ms: cli.timeout,
        excludes: cli.excludes.clone(),
    };

    match &cli.command {
        Some(Command::Config { action }) => run_config(action, &overrides),
        None => run_commit(&cli, &overrides).await,
    }
}

fn run_config(action: &ConfigAction, overrides: &Overrides) -> Result<()> {
    let path = config::config_path(|name: &str| std::env::var(name).ok());
    match action {
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::List => {
            let config = Config::load(overrides)?;
            let mut keys: Vec<String> = LIST_KEYS.iter().map(|k| k.to_string()).collect();
            for provider in config.active_providers() {
                let section = provider.name.config_key();
                keys.extend(
                    ["key", "model", "url", "path"]
                        .iter()
                        .map(|prop| format!("{section}.{prop}")),
                );
            }
            print_keys(&config, &keys);
        }
        ConfigAction::Get { keys } => {
            let config = Config::load(overrides)?;
            print_keys(&config, keys);
        }
        ConfigAction::Set { pairs } => {
            let parsed = pairs
                .iter()
                .map(|pair| {
                    pair.split_once('=')
                        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
                        .with_context(|| format!("expected key=value, got {pair:?}"))
                })
                .collect::<Result<Vec<_>>>()?;
            config::set_values(&path, &parsed)?;
            // Re-resolve so bad values are reported now, not on the next run.
            Config::load(&Overrides::default()).context("config saved but no longer resolves")?;
        }
        ConfigAction::Del { key } => config::delete_value(&path, key)?,
    }
    Ok(())
}

fn print_keys(config: &Config, keys: &[String]) {
    for key in keys {
        if let Some(value) = config.lookup(key) {
            println!("{key}={value}");
        }
    }
}

async fn run_commit(cli: &Cli, overrides: &Overrides) -> Result<()> {
    let config = Config::load(overrides)?;
    let dir = PathBuf::from(git::repo_root(Path::new(".")).await?);

    if cli.all {
        git::stage_all(&dir).await?;
    }

    let Some(staged) = git::staged_diff(&dir, &config.excludes).await? else {
        eprintln!("No staged changes found. Stage changes with `git add` or pass --all.");
        return Ok(());
    };
    eprintln!(
        "Detected {} staged file{}",
        staged.files.len(),
        if staged.files.len() == 1 { "" } else { "s" }
    );

    let active = config.active_providers().count();
    eprintln!("Asking {active} provider{}...", if active == 1 { "" } else { "s" });

    let client = Arc::new(HttpDispatch::new().context("failed to build HTTP client")?);
    let start = Instant::now();
    let outcome = match run_cycle(&config, &staged.diff, client).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!("generation cycle aborted: {e}");
            if cli.json {
                let elapsed_ms = start.elapsed().as_millis() as u64;
                println!("{}", CycleReport::error(&e, elapsed_ms).to_json());
            } else {
                for failure in e.failures() {
                    eprintln!("✗ {failure}");
                }
            }
            bail!(e);
        }
    };

    if cli.json {
        println!("{}", CycleReport::success(&outcome).to_json());
        return Ok(());
    }

    print_instance_status(&outcome);

    let message = if cli.confirm {
        match outcome.aggregate.candidates.first() {
            Some(candidate) => candidate.message.clone(),
            None => bail!("no candidates to commit"),
        }
    } else {
        match pick_candidate(&outcome)? {
            Some(message) => message,
            None => {
                eprintln!("Commit cancelled");
                return Ok(());
            }
        }
    };

    if cli.dry_run {
        println!("{message}");
        return Ok(());
    }

    git::commit(&dir, &message).await?;
    eprintln!("✓ Committed");
    Ok(())
}

fn print_instance_status(outcome: &CycleOutcome) {
    for result in &outcome.results {
        match result {
            GenerationResult::Success { source, messages } => {
                eprintln!("✓ {source}: {} message(s)", messages.len());
            }
            GenerationResult::Failure(failure) => eprintln!("✗ {failure}"),
        }
    }
    eprintln!(
        "{} candidate(s) in {:.1}s",
        outcome.aggregate.candidates.len(),
        outcome.elapsed.as_secs_f64()
    );
}

fn pick_candidate(outcome: &CycleOutcome) -> Result<Option<String>> {
    let candidates = &outcome.aggregate.candidates;
    let labels: Vec<String> = candidates
        .iter()
        .map(|c| format!("[{}] {}", c.sources.join(", "), c.subject()))
        .collect();

    let choice = Select::new()
        .with_prompt("Pick a commit message")
        .items(labels.as_slice())
        .default(0)
        .interact_opt()
        .context("failed to read selection")?;

    Ok(choice
        .and_then(|i| candidates.get(i))
        .map(|c| c.message.clone()))
}
