mod agent;
mod compose;
mod config;
mod confirm;
mod engine;
mod env;
mod error;
mod guard;
mod health;
mod poll;
mod process;
mod tools;

#[cfg(test)]
mod testing;

use agent::{AnthropicProvider, Conversation, ModelProvider};
use anyhow::Result;
use clap::Parser;
use compose::{Compose, ComposeShape};
use confirm::StdinPrompter;
use process::{Executor, ProcessRunner};
use std::sync::Arc;
use tools::Toolbox;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Drive the project's dev database with natural-language instructions.
#[derive(Debug, Parser)]
#[command(name = "devdb-agent", version)]
struct Cli {
    /// Describe every command instead of running it
    #[arg(long)]
    dry_run: bool,

    /// Maximum number of model rounds
    #[arg(long, value_name = "N")]
    max_rounds: Option<usize>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// What to do, e.g. "reset the database"
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    instruction: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = config::find_project_root(&std::env::current_dir()?);
    if let Some(loaded) = env::load_env(&root)? {
        info!(file = %loaded, "environment loaded");
    }

    let mut cfg = config::Config::from_env();
    if cli.dry_run {
        cfg.dry_run = true;
    }
    if let Some(n) = cli.max_rounds {
        cfg.max_rounds = n;
    }

    let Some(api_key) = cfg.api_key.clone() else {
        eprintln!("Set ANTHROPIC_API_KEY in .env");
        std::process::exit(1);
    };

    let instruction = if cli.instruction.is_empty() {
        config::DEFAULT_INSTRUCTION.to_string()
    } else {
        cli.instruction.join(" ")
    };

    let exec: Arc<dyn Executor> = Arc::new(ProcessRunner::new(cfg.dry_run));
    let shape = ComposeShape::detect(exec.as_ref(), &cfg.docker_bin, cfg.compose_cmd.as_deref()).await;
    let compose = Compose::new(shape, &cfg);
    info!(project = %cfg.project, dry_run = cfg.dry_run, shape = ?compose.shape(), "ready");

    let provider: Box<dyn ModelProvider> = Box::new(AnthropicProvider::new(api_key, cfg.base_url.clone())?);
    let toolbox = Toolbox::new(cfg, exec, compose, Arc::new(StdinPrompter));

    let mut conversation = Conversation::new(provider.as_ref(), &toolbox);
    let outcome = conversation.run(&instruction).await;
    info!(
        rounds = conversation.rounds(),
        messages = conversation.messages().len(),
        "conversation finished"
    );
    match outcome {
        Ok(answer) if answer.is_empty() => println!("(the model finished without a text answer)"),
        Ok(answer) => println!("{answer}"),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
    Ok(())
}
