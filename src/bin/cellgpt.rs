//! CLI binary for cellgpt.
//!
//! Runs the spreadsheet functions from a terminal. Results go to stdout,
//! logs to stderr.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use cellgpt::config::{self, CellGptConfig};
use cellgpt::credentials::{self, KeyStore};
use cellgpt::functions::{self, Functions, GptArgs};
use cellgpt::openai::{CallbackInvocation, ModelName, StreamOutcome};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// cellgpt: GPT spreadsheet functions from the terminal.
#[derive(Parser)]
#[command(name = "cellgpt", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// `GPT`: one completion with an optional system prompt.
    Gpt {
        /// System prompt.
        #[arg(short, long)]
        system: Option<String>,
        #[command(flatten)]
        opts: GenArgs,
    },

    /// `chat`: one completion with the default system prompt.
    Chat {
        /// User prompt.
        prompt: String,
    },

    /// `streamGPT`: stream a completion, printing tokens as they arrive.
    Stream {
        /// System prompt.
        #[arg(short, long)]
        system: Option<String>,
        /// Use the marketer persona.
        #[arg(long)]
        marketer: bool,
        #[command(flatten)]
        opts: GenArgs,
    },

    /// `marketerGPT`.
    Marketer {
        #[command(flatten)]
        opts: GenArgs,
    },

    /// `assistantGPT`.
    Assistant {
        #[command(flatten)]
        opts: GenArgs,
    },

    /// `analyzer`: ask for marketing measures on a CSV range.
    Analyze {
        /// CSV file holding the range.
        #[arg(long)]
        csv: PathBuf,
        #[command(flatten)]
        opts: GenArgs,
    },

    /// Store the API key in the OS credential store.
    SetKey {
        /// The key.
        key: String,
    },

    /// List supported model identifiers.
    Models,

    /// Write a config file with default values.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

/// Generation arguments shared by the GPT-style commands.
#[derive(Args)]
struct GenArgs {
    /// User prompt.
    prompt: Option<String>,

    /// CSV file of `user,assistant` rows used as conversation history.
    #[arg(long)]
    history: Option<PathBuf>,

    /// Model identifier.
    #[arg(short, long)]
    model: Option<String>,

    /// Generation length cap.
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Sampling temperature.
    #[arg(short, long)]
    temperature: Option<f64>,
}

impl GenArgs {
    fn into_gpt_args(self, system: Option<String>) -> anyhow::Result<GptArgs> {
        let history = match self.history {
            Some(path) => read_range(&path)?,
            None => Vec::new(),
        };
        Ok(GptArgs {
            system_prompt: system,
            prompt: self.prompt,
            history,
            model: self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries results only.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cellgpt=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Models => {
            for model in ModelName::ALL {
                println!("{model}");
            }
            Ok(())
        }
        Command::InitConfig { force } => init_config(cli.config, force),
        Command::SetKey { key } => {
            credentials::KeyringStore::new()
                .set(key.trim())
                .await
                .context("failed to store API key")?;
            eprintln!("API key stored");
            Ok(())
        }
        command => {
            let config = config::load_or_default(cli.config.as_deref())?;
            let functions = Functions::new(config, credentials::default_store())?;
            run(&functions, command).await
        }
    }
}

async fn run(functions: &Functions, command: Command) -> anyhow::Result<()> {
    let text = match command {
        Command::Gpt { system, opts } => functions.gpt(&opts.into_gpt_args(system)?).await?,
        Command::Chat { prompt } => functions.chat(&prompt).await?,
        Command::Marketer { opts } => functions.marketer_gpt(&opts.into_gpt_args(None)?).await?,
        Command::Assistant { opts } => functions.assistant_gpt(&opts.into_gpt_args(None)?).await?,
        Command::Analyze { csv, opts } => {
            let range = read_range(&csv)?;
            functions::log_range(&range);
            functions.analyzer(&range, &opts.into_gpt_args(None)?).await?
        }
        Command::Stream {
            system,
            marketer,
            opts,
        } => return run_stream(functions, opts.into_gpt_args(system)?, marketer).await,
        Command::Models | Command::SetKey { .. } | Command::InitConfig { .. } => {
            anyhow::bail!("command does not call the API")
        }
    };
    println!("{text}");
    Ok(())
}

/// Print each newly published suffix, so the terminal shows the text grow.
async fn run_stream(functions: &Functions, args: GptArgs, marketer: bool) -> anyhow::Result<()> {
    let mut printed = 0usize;
    let mut invocation = CallbackInvocation::new(move |value: &str| {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(value.get(printed..).unwrap_or_default().as_bytes());
        let _ = stdout.flush();
        printed = value.len();
    });

    let cancel = invocation.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, cancelling stream");
            cancel.cancel();
        }
    });

    let outcome = if marketer {
        functions.marketer_stream_gpt(&args, &mut invocation).await?
    } else {
        functions.stream_gpt(&args, &mut invocation).await?
    };
    println!();
    if let StreamOutcome::Cancelled(text) = outcome {
        tracing::info!(chars = text.chars().count(), "stream cancelled");
    }
    Ok(())
}

fn init_config(path: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let path = match path.or_else(config::default_config_path) {
        Some(p) => p,
        None => anyhow::bail!("no config directory on this platform; pass --config"),
    };
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    CellGptConfig::default().save(&path)?;
    println!("{}", path.display());
    Ok(())
}

/// Read a CSV file into spreadsheet-style rows.
fn read_range(path: &std::path::Path) -> anyhow::Result<Vec<Vec<String>>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_csv(&text).with_context(|| format!("malformed CSV in {}", path.display()))
}

/// Parse CSV text. Quoted fields may hold commas, newlines and `""` escapes;
/// unquoted cells are kept verbatim, whitespace included.
fn parse_csv(text: &str) -> anyhow::Result<Vec<Vec<String>>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    cell.push('"');
                }
                '"' => in_quotes = false,
                _ => cell.push(c),
            }
            continue;
        }
        match c {
            '"' if cell.is_empty() => in_quotes = true,
            ',' => row.push(std::mem::take(&mut cell)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                row.push(std::mem::take(&mut cell));
                rows.push(std::mem::take(&mut row));
            }
            _ => cell.push(c),
        }
    }
    if in_quotes {
        anyhow::bail!("unterminated quoted field");
    }
    if !cell.is_empty() || !row.is_empty() {
        row.push(cell);
        rows.push(row);
    }
    Ok(rows)
}
