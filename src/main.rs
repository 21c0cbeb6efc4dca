//! # Recall CLI (`recall`)
//!
//! The `recall` binary fronts the engine for both humans and front-end
//! processes. Every subcommand maps to one router command and prints one
//! result block; `recall serve` speaks the same protocol over stdin/stdout,
//! one command line in, one block (terminated by a blank line) out.
//!
//! ## Usage
//!
//! ```bash
//! recall --config ./recall.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `recall add <path>` | Index a file or directory |
//! | `recall add-text <name> <content>` | Index literal text under a name |
//! | `recall ask "<question>"` | Extractive answer with cited sources |
//! | `recall search "<query>"` | Ranked matches with scores |
//! | `recall summary "<topic>"` | Concatenated top snippets |
//! | `recall status` | Counts, cache hit rate, generation |
//! | `recall list` | Indexed documents in insertion order |
//! | `recall remove <id-or-path>` | Drop one document |
//! | `recall export <path>` | Write the index artifact |
//! | `recall import <path>` | Replace the index from an artifact |
//! | `recall clear` | Reset the index and cache |
//! | `recall serve` | Line protocol for front-ends |

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use recall_engine::config;
use recall_engine::engine::Engine;
use recall_engine::router::{self, Command};

/// Recall — a local, deterministic document indexing and retrieval engine
/// for AI terminal front-ends.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file; a missing file means built-in defaults, so no setup is required.
#[derive(Parser)]
#[command(
    name = "recall",
    about = "Recall — a local document indexing and retrieval engine for AI terminal front-ends",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Defaults apply when absent.
    #[arg(long, global = true, default_value = "./recall.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Index a file or directory.
    ///
    /// Unreadable files are skipped with a tally; binary files are recorded
    /// as unindexable. Re-adding unchanged content is a no-op.
    Add {
        /// File or directory to ingest.
        path: PathBuf,
    },

    /// Index literal text under a logical name.
    AddText {
        /// Logical source name (re-using a name replaces the document).
        name: String,
        /// The text to index.
        content: String,
    },

    /// Ask a question; prints an extractive answer plus cited source ids.
    Ask {
        /// Free-text question.
        query: String,
    },

    /// Search indexed content; prints ranked results with scores.
    Search {
        /// Free-text query.
        query: String,
    },

    /// Summarize a topic from the top-k matching snippets.
    Summary {
        /// Topic to summarize.
        topic: String,
    },

    /// Show document/chunk counts, cache hit rate, and the generation.
    Status,

    /// List indexed documents in insertion order.
    List,

    /// Remove one document by id or source path.
    Remove {
        /// Document id or source path.
        target: String,
    },

    /// Write the index artifact to a destination path.
    Export {
        /// Destination file.
        dest: PathBuf,
    },

    /// Replace the index with a previously exported artifact.
    Import {
        /// Artifact file to import.
        src: PathBuf,
    },

    /// Reset the index and cache to empty.
    Clear,

    /// Serve the line protocol on stdin/stdout for a front-end process.
    ///
    /// Reads one command line at a time and writes one response block,
    /// terminated by a blank line, until EOF.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = config::load_config(&cli.config)?;

    let (engine, corruption) = Engine::open(config);
    if let Some(err) = corruption {
        eprintln!("warning: {}", err);
    }

    match cli.command {
        Commands::Serve => serve(&engine).await?,
        other => {
            let command = to_router_command(other);
            let block = router::execute(&engine, command).await;
            println!("{}", block);
        }
    }

    Ok(())
}

fn to_router_command(command: Commands) -> Command {
    match command {
        Commands::Add { path } => Command::Add { path },
        Commands::AddText { name, content } => Command::AddText { name, content },
        Commands::Ask { query } => Command::Ask { query },
        Commands::Search { query } => Command::Search { query },
        Commands::Summary { topic } => Command::Summary { topic },
        Commands::Status => Command::Status,
        Commands::List => Command::List,
        Commands::Remove { target } => Command::Remove { target },
        Commands::Export { dest } => Command::Export { dest },
        Commands::Import { src } => Command::Import { src },
        Commands::Clear => Command::Clear,
        Commands::Serve => unreachable!("serve is handled before dispatch"),
    }
}

/// Read command lines from stdin, answer each with one block and a blank
/// terminator line. EOF ends the session.
async fn serve(engine: &Engine) -> anyhow::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut lines = stdin.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let block = router::dispatch(engine, &line).await;
        stdout.write_all(block.as_bytes()).await?;
        stdout.write_all(b"\n\n").await?;
        stdout.flush().await?;
    }

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .is_err()
    {
        warn!("tracing subscriber was already initialized");
    }
}
