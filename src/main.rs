//! # docchat CLI
//!
//! Ask questions about local documents from the terminal, or serve the
//! same pipeline over HTTP.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat ingest <files..>` | Extract and chunk files, print chunk counts |
//! | `docchat ask <files..> --question <q>` | Index files and answer one question |
//! | `docchat chat <files..>` | Index files, then chat on stdin |
//! | `docchat serve` | Start the HTTP server |
//! | `docchat completions <shell>` | Print shell completions |
//!
//! ## Examples
//!
//! ```bash
//! docchat ingest report.pdf notes.md
//! docchat ask report.pdf --question "What is the capital of France?"
//! docchat --config ./docchat.toml chat report.pdf --session alice --history
//! RUST_LOG=docchat=debug docchat serve
//! ```

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use docchat::app::ChatApp;
use docchat::config::{load_config, Config};
use docchat::ingest::{ingest_documents, UploadedDocument};
use docchat::progress::{default_reporter, ProgressReporter};
use docchat::server;
use docchat_core::models::Transcript;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// Conversational question answering over your own documents.
///
/// Without `--config`, built-in defaults are used: Groq `gemma2-9b-it` for
/// the language model (needs `GROQ_API_KEY`) and in-process
/// `all-minilm-l6-v2` embeddings, downloaded on first use.
#[derive(Parser)]
#[command(name = "docchat", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract and chunk documents without embedding them.
    Ingest {
        /// PDF, text, or Markdown files.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Index documents and answer a single question.
    Ask {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(long, short)]
        question: String,

        #[arg(long, default_value = "default_session")]
        session: String,
    },

    /// Index documents, then answer questions read from stdin.
    ///
    /// One question per line. An empty line is ignored; EOF ends the chat.
    Chat {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(long, default_value = "default_session")]
        session: String,

        /// Print the session transcript after every answer.
        #[arg(long)]
        history: bool,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Print shell completions.
    Completions {
        #[arg(value_enum, default_value_t = Shell::Bash)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docchat=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "docchat", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = match &cli.config {
        Some(path) => load_config(path)?,
        None => {
            let cfg = Config::default();
            cfg.validate()?;
            cfg
        }
    };

    match cli.command {
        Commands::Ingest { files } => {
            let docs = read_documents(&files)?;
            let progress = default_reporter();
            let report = ingest_documents(&docs, &cfg.chunking.params(), progress.as_ref());
            for doc in &report.documents {
                println!(
                    "{}  {}  pages={} chunks={}",
                    doc.name, doc.content_type, doc.pages, doc.chunks
                );
            }
            for failure in &report.errors {
                eprintln!("skipped {}: {}", failure.document, failure.reason);
            }
            println!("total chunks: {}", report.chunks.len());
        }
        Commands::Ask {
            files,
            question,
            session,
        } => {
            let app = prepare(&cfg, &files).await?;
            let outcome = app.converse(&session, &question).await?;
            println!("{}", outcome.answer);
        }
        Commands::Chat {
            files,
            session,
            history,
        } => {
            let app = prepare(&cfg, &files).await?;
            run_chat(&app, &session, history).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

fn read_documents(files: &[PathBuf]) -> Result<Vec<UploadedDocument>> {
    files
        .iter()
        .map(|path| UploadedDocument::from_path(path))
        .collect()
}

/// Build the app and index `files`. Fails when nothing could be indexed.
async fn prepare(cfg: &Config, files: &[PathBuf]) -> Result<ChatApp> {
    let docs = read_documents(files)?;
    let app = ChatApp::from_config(cfg)?;
    let progress: Box<dyn ProgressReporter> = default_reporter();
    let report = app.upload(&docs, progress.as_ref()).await?;

    for failure in &report.errors {
        eprintln!("skipped {}: {}", failure.document, failure.reason);
    }
    if report.index.chunks == 0 {
        bail!("no document could be indexed");
    }
    eprintln!(
        "indexed {} chunks from {} document(s)",
        report.index.chunks,
        report.documents.len()
    );
    Ok(app)
}

async fn run_chat(app: &ChatApp, session: &str, history: bool) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("> ");
        std::io::stderr().flush().ok();
        let Some(line) = lines.next_line().await.context("failed to read stdin")? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        match app.converse(session, &line).await {
            Ok(outcome) => {
                println!("{}", outcome.answer);
                if history {
                    print_transcript(&outcome.transcript);
                }
            }
            // A failed turn leaves the session untouched; keep chatting.
            Err(e) => eprintln!("error: {}", e),
        }
    }
    Ok(())
}

fn print_transcript(transcript: &Transcript) {
    println!("--- session history ---");
    for turn in transcript {
        println!("{}: {}", turn.role.as_str(), turn.content);
    }
    println!("-----------------------");
}
