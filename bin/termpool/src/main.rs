//! termpool - run shell commands through a pooled terminal session
//!
//! Each command runs on a session acquired for the working directory and
//! its normalized output is printed line by line, or as JSON events.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info};

use termpool::{init_logging, pty_pool, Config, ConfigLoader, ProcessEvent};

#[derive(Parser)]
#[command(name = "termpool")]
#[command(about = "Run commands in pooled terminal sessions with clean output")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the standard search paths)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Working directory for the commands
    #[arg(short = 'd', long)]
    cwd: Option<PathBuf>,

    /// Print every event as a JSON line
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Commands to run, in order, on the same pool
    #[arg(required = true)]
    commands: Vec<String>,
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ConfigLoader::load()?,
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(&config.logging);

    info!("Starting termpool v{}", termpool::VERSION);

    let cwd = match &cli.cwd {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("reading current directory")?,
    };

    let pool = pty_pool(&config);
    let mut failed = false;

    for command in &cli.commands {
        let session = pool.acquire_session(&cwd).await;
        debug!("Running '{}' on session {}", command, session.id);

        let mut handle = pool.run_command(session.id, command).await?;
        while let Some(event) = handle.next_event().await {
            if cli.json {
                println!("{}", serde_json::to_string(&event)?);
                continue;
            }
            match event {
                ProcessEvent::Line(line) => println!("{}", line),
                ProcessEvent::Error(reason) => eprintln!("termpool: {}", reason),
                ProcessEvent::NoShellIntegration => {
                    eprintln!("termpool: session {} has no shell integration", session.id)
                }
                ProcessEvent::Completed | ProcessEvent::Continue => {}
            }
        }

        if let Err(e) = handle.wait().await {
            failed = true;
            if !cli.json {
                eprintln!("termpool: '{}' failed: {}", command, e);
            }
        }
    }

    pool.dispose_all().await;

    if failed {
        std::process::exit(1);
    }
    Ok(())
}
