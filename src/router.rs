//! Command-line protocol: one verb/argument line in, one text block out.
//!
//! This is the surface a front-end talks to. The router owns no state; it
//! parses a line into a [`Command`], executes it against the [`Engine`], and
//! formats the result as plain text. Unknown verbs come back with the valid
//! verb table rather than an error exit — the engine must stay usable after
//! any single bad command.

use std::path::PathBuf;

use crate::engine::Engine;
use crate::error::{EngineError, Result};

/// Verbs accepted by [`parse`], in help order.
pub const VERBS: &[&str] = &[
    "add", "add_text", "ask", "search", "summary", "status", "list", "remove", "export", "import",
    "clear", "help",
];

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add { path: PathBuf },
    AddText { name: String, content: String },
    Ask { query: String },
    Search { query: String },
    Summary { topic: String },
    Status,
    List,
    Remove { target: String },
    Export { dest: PathBuf },
    Import { src: PathBuf },
    Clear,
    Help,
}

/// Parse one command line into a [`Command`].
pub fn parse(line: &str) -> Result<Command> {
    let line = line.trim();
    let (verb, tail) = match line.split_once(char::is_whitespace) {
        Some((verb, tail)) => (verb, tail.trim()),
        None => (line, ""),
    };

    match verb {
        "add" => Ok(Command::Add {
            path: PathBuf::from(require(verb, tail, "a file or directory path")?),
        }),
        "add_text" => {
            let tail = require(verb, tail, "<name> :: <content>")?;
            let (name, content) =
                tail.split_once("::")
                    .ok_or_else(|| EngineError::InvalidArgument {
                        verb: "add_text".to_string(),
                        message: "expected <name> :: <content>".to_string(),
                    })?;
            let name = name.trim();
            if name.is_empty() {
                return Err(EngineError::InvalidArgument {
                    verb: "add_text".to_string(),
                    message: "name must not be empty".to_string(),
                });
            }
            Ok(Command::AddText {
                name: name.to_string(),
                content: content.trim().to_string(),
            })
        }
        "ask" => Ok(Command::Ask {
            query: tail.to_string(),
        }),
        "search" => Ok(Command::Search {
            query: tail.to_string(),
        }),
        "summary" => Ok(Command::Summary {
            topic: tail.to_string(),
        }),
        "status" => Ok(Command::Status),
        "list" => Ok(Command::List),
        "remove" => Ok(Command::Remove {
            target: require(verb, tail, "a document id or source path")?.to_string(),
        }),
        "export" => Ok(Command::Export {
            dest: PathBuf::from(require(verb, tail, "a destination path")?),
        }),
        "import" => Ok(Command::Import {
            src: PathBuf::from(require(verb, tail, "a source path")?),
        }),
        "clear" => Ok(Command::Clear),
        "help" => Ok(Command::Help),
        other => Err(EngineError::UnknownCommand {
            verb: other.to_string(),
        }),
    }
}

fn require<'t>(verb: &str, tail: &'t str, what: &str) -> Result<&'t str> {
    if tail.is_empty() {
        Err(EngineError::InvalidArgument {
            verb: verb.to_string(),
            message: format!("expected {}", what),
        })
    } else {
        Ok(tail)
    }
}

/// Execute a parsed command and format the result block.
pub async fn execute(engine: &Engine, command: Command) -> String {
    match command {
        Command::Add { path } => match engine.add_path(&path).await {
            Ok(report) => {
                let mut block = format!(
                    "Indexed {} documents ({} new, {} updated, {} unchanged, {} unindexable, {} failed)",
                    report.touched(),
                    report.indexed,
                    report.updated,
                    report.unchanged,
                    report.unindexable,
                    report.failed,
                );
                for (path, reason) in &report.failures {
                    block.push_str(&format!("\n  failed {}: {}", path.display(), reason));
                }
                block
            }
            Err(err) => format!("Error: {}", err),
        },
        Command::AddText { name, content } => match engine.add_text(&name, &content).await {
            Ok(added) => format!(
                "Added \"{}\" (id: {}, chunks: {})",
                name, added.id, added.chunk_count
            ),
            Err(err) => format!("Error: {}", err),
        },
        Command::Ask { query } => {
            let answer = engine.ask(&query);
            if answer.sources.is_empty() {
                answer.text
            } else {
                format!("{}\n\nSources: {}", answer.text, answer.sources.join(", "))
            }
        }
        Command::Search { query } => {
            let hits = engine.search(&query, None);
            if hits.is_empty() {
                return "No results.".to_string();
            }
            let mut block = String::new();
            for (i, hit) in hits.iter().enumerate() {
                block.push_str(&format!(
                    "{}. [{:.3}] {} (id: {}, chunk {})\n   {}\n",
                    i + 1,
                    hit.score,
                    hit.source_path,
                    hit.document_id,
                    hit.chunk_index,
                    hit.snippet,
                ));
            }
            block.trim_end().to_string()
        }
        Command::Summary { topic } => {
            let snippets = engine.summary(&topic);
            if snippets.is_empty() {
                return "No results.".to_string();
            }
            let mut block = format!("Summary for \"{}\":\n", topic);
            for snippet in &snippets {
                block.push_str(&format!(
                    "\n— {} [{:.3}]\n{}\n",
                    snippet.source_path, snippet.score, snippet.snippet
                ));
            }
            block.trim_end().to_string()
        }
        Command::Status => {
            let status = engine.status();
            let hit_rate = if status.cache_lookups > 0 {
                format!(
                    "{}/{} ({}%)",
                    status.cache_hits,
                    status.cache_lookups,
                    status.cache_hits * 100 / status.cache_lookups
                )
            } else {
                "0/0".to_string()
            };
            format!(
                "Documents:      {}\n\
                 Chunks:         {}\n\
                 Generation:     {}\n\
                 Cache entries:  {}\n\
                 Cache hit rate: {}\n\
                 Artifact:       {} ({} bytes)",
                status.documents,
                status.chunks,
                status.generation,
                status.cache_entries,
                hit_rate,
                status.artifact_path,
                status.artifact_bytes,
            )
        }
        Command::List => {
            let mut block = String::new();
            for summary in engine.list() {
                block.push_str(&format!(
                    "{}  {:<8} {:>3} chunks  {}\n",
                    summary.id,
                    summary.format.as_str(),
                    summary.chunk_count,
                    summary.source_path,
                ));
            }
            if block.is_empty() {
                "No documents indexed.".to_string()
            } else {
                block.trim_end().to_string()
            }
        }
        Command::Remove { target } => match engine.remove(&target) {
            Ok(Some(summary)) => format!("Removed \"{}\" (id: {})", summary.source_path, summary.id),
            Ok(None) => format!("No document matches \"{}\"", target),
            Err(err) => format!("Error: {}", err),
        },
        Command::Export { dest } => match engine.export(&dest) {
            Ok((docs, chunks)) => format!(
                "Exported {} documents, {} chunks to {}",
                docs,
                chunks,
                dest.display()
            ),
            Err(err) => format!("Error: {}", err),
        },
        Command::Import { src } => match engine.import(&src) {
            Ok((docs, chunks)) => format!(
                "Imported {} documents, {} chunks from {}",
                docs,
                chunks,
                src.display()
            ),
            Err(err) => format!("Error: {}", err),
        },
        Command::Clear => match engine.clear() {
            Ok((docs, chunks)) => format!("Cleared {} documents, {} chunks", docs, chunks),
            Err(err) => format!("Error: {}", err),
        },
        Command::Help => help_block(),
    }
}

/// Parse and execute one line, always producing a response block.
pub async fn dispatch(engine: &Engine, line: &str) -> String {
    match parse(line) {
        Ok(command) => execute(engine, command).await,
        Err(EngineError::UnknownCommand { verb }) => {
            format!("Unknown command \"{}\".\n\n{}", verb, help_block())
        }
        Err(err) => format!("Error: {}", err),
    }
}

fn help_block() -> String {
    format!(
        "Commands:\n\
         \x20 add <path>                  index a file or directory\n\
         \x20 add_text <name> :: <text>   index literal text under a name\n\
         \x20 ask <question>              extractive answer with cited sources\n\
         \x20 search <query>              ranked matches with scores\n\
         \x20 summary <topic>             concatenated top snippets\n\
         \x20 status                      counts, cache hit rate, generation\n\
         \x20 list                        indexed documents in order\n\
         \x20 remove <id-or-path>         drop one document\n\
         \x20 export <path>               write the index artifact\n\
         \x20 import <path>               replace the index from an artifact\n\
         \x20 clear                       reset the index and cache\n\
         \x20 help                        this table\n\
         \n\
         Verbs: {}",
        VERBS.join(", ")
    )
}
