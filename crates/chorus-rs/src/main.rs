//! `chorus` command-line entry point.

use anyhow::{Context, bail};
use chorus_rs::bootstrap::{self, ENABLE_BOTS_NOTICE, Roster};
use chorus_rs::console::ConsoleConnector;
use chorus_rs::supervisor::{LlmFactory, Supervisor};
use chorus_rs_config::{ChorusConfig, LayeredConfigOptions};
use chorus_rs_core::{AuditLog, BotRuntime, LlmPair, TimeSource, TokenObserver};
use chorus_rs_memory::{ConversationMemory, SnapshotStore};
use chorus_rs_protocol::BotIdentity;
use clap::{Parser, Subcommand};
use log::{debug, info};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Command-line options.
#[derive(Parser)]
#[command(name = "chorus", version, about)]
struct Cli {
    /// Extra chorus.json5 files layered over the user and cwd configs
    #[arg(long, global = true)]
    config: Vec<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Launch every enabled bot on the console platform (default)
    Run,
    /// Chat with one bot directly, printing tokens as they arrive
    Chat {
        #[arg(long)]
        bot: String,
        /// Author name; anonymous when omitted
        #[arg(long, default_value = "")]
        author: String,
        message: String,
    },
    /// One-off query on the fast model, outside the bot's memory
    Task {
        #[arg(long)]
        bot: String,
        query: String,
        param: String,
    },
    /// Print a bot's conversation memory
    History {
        #[arg(long)]
        bot: String,
    },
    /// Reset a bot's conversation memory
    Reset {
        #[arg(long)]
        bot: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    chorus_rs::init_logging();

    let cli = Cli::parse();
    let cwd = std::env::current_dir().context("failed to resolve current working directory")?;
    let mut options = LayeredConfigOptions::new(&cwd);
    for path in &cli.config {
        options = options.with_runtime_path(path);
    }
    let layered = ChorusConfig::load_layered_with_options(options)
        .context("failed to load layered config")?;
    debug!("layered config loaded (layers={})", layered.layers.len());
    let config = Arc::new(layered.config);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config, &cwd).await,
        Command::Chat {
            bot,
            author,
            message,
        } => {
            let runtime = start_bot(config, &cwd, &bot)?;
            let observer: TokenObserver = Box::new(|token: &str, _so_far: &str| {
                print!("{token}");
                let _ = std::io::stdout().flush();
            });
            runtime
                .chat_direct(&message, &author, Some(observer))
                .await
                .context("chat failed")?;
            println!();
            Ok(())
        }
        Command::Task { bot, query, param } => {
            let runtime = start_bot(config, &cwd, &bot)?;
            let answer = runtime.task(&query, &param).await.context("task failed")?;
            println!("{answer}");
            Ok(())
        }
        Command::History { bot } => {
            let store = snapshot_store(&config, &cwd, &bot)?;
            match store.load().context("failed to read memory")? {
                Some(memory) => {
                    for content in memory.contents() {
                        println!("{content}");
                    }
                }
                None => println!("No saved memory for {bot}."),
            }
            Ok(())
        }
        Command::Reset { bot } => {
            let store = snapshot_store(&config, &cwd, &bot)?;
            let time = TimeSource::from_config(&config.time).context("invalid time settings")?;
            let paths = config.storage.resolve(&cwd);
            AuditLog::new(&paths.log_dir, bot.clone(), time.clone())
                .record("Memory reset requested.");
            ConversationMemory::restore_or_init(Some(&store), true, &time.labeled())
                .context("reset failed")?;
            println!("Memory for {bot} was reset.");
            Ok(())
        }
    }
}

async fn run(config: Arc<ChorusConfig>, cwd: &Path) -> anyhow::Result<()> {
    let bots = match bootstrap::load_roster(&config, cwd).context("failed to read bot manifest")? {
        Roster::Launch(bots) => bots,
        Roster::NeedsOperator {
            manifest_path,
            created,
        } => {
            info!(
                "no bots enabled (manifest={}, created={created})",
                manifest_path.display()
            );
            println!("{ENABLE_BOTS_NOTICE}");
            return Ok(());
        }
    };
    // Fail fast on missing credentials before any worker starts.
    LlmPair::openai(&config.llm).context("failed to configure LLM backend")?;

    println!("Starting {}...", bootstrap::roster_label(&bots));
    let connector = Arc::new(ConsoleConnector::stdout());
    let stdin_closed = connector
        .attach_stdin()
        .context("failed to read from stdin")?;
    let llm_config = config.llm.clone();
    let llms: LlmFactory = Arc::new(move |_bot: &BotIdentity| LlmPair::openai(&llm_config));
    let supervisor = Supervisor::new(config, cwd, connector, llms);

    supervisor
        .run(bots, async {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("interrupted"),
                _ = stdin_closed => info!("console input closed"),
            }
        })
        .await;
    Ok(())
}

fn snapshot_store(config: &ChorusConfig, cwd: &Path, name: &str) -> anyhow::Result<SnapshotStore> {
    let identity = bootstrap::resolve_identity(config, cwd, name);
    if !identity.save_memory {
        bail!("{name} does not save its memory");
    }
    let memory_dir = config.storage.resolve(cwd).memory_dir;
    Ok(SnapshotStore::new(memory_dir, identity.name))
}

fn start_bot(config: Arc<ChorusConfig>, cwd: &Path, name: &str) -> anyhow::Result<BotRuntime> {
    let identity = bootstrap::resolve_identity(&config, cwd, name);
    let llms = LlmPair::openai(&config.llm).context("failed to configure LLM backend")?;
    BotRuntime::start(identity, config, cwd, llms).context("failed to start bot")
}
