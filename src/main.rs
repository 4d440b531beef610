use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use pik_tour::config::Config;
use pik_tour::logging;
use pik_tour::replay::{self, ReplayRunner, ReplayScript};
use pik_tour::tour::builtin::CatalogKind;
use pik_tour::tour::StepCatalog;

#[derive(Parser)]
#[command(name = "pik-tour")]
#[command(about = "Action-gated onboarding tours for the PIK Visual editor")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the steps of a built-in tour
    Steps {
        /// Tour to list (default: from config)
        #[arg(long, value_enum)]
        catalog: Option<CatalogKind>,

        /// Print the catalog as JSON
        #[arg(long)]
        json: bool,
    },

    /// Play a scripted editor session against the tour controller
    Replay {
        /// Replay script (TOML)
        script: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (needed for logging setup)
    let config = Config::load(cli.config.as_deref())?;

    let logging_handle = logging::init_logging(&config, cli.debug)?;
    if let Some(path) = &logging_handle.log_file_path {
        tracing::info!(path = %path.display(), "Logging to file");
    }

    match cli.command {
        Commands::Steps { catalog, json } => {
            cmd_steps(catalog.unwrap_or(config.tour.catalog), json)?;
        }
        Commands::Replay { script } => {
            cmd_replay(&config, &script).await?;
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn load_catalog(kind: CatalogKind) -> Result<StepCatalog> {
    kind.catalog()
        .with_context(|| format!("Built-in catalog '{kind}' is invalid"))
}

fn cmd_steps(kind: CatalogKind, json: bool) -> Result<()> {
    let catalog = load_catalog(kind)?;

    if json {
        let steps: Vec<_> = catalog.steps().collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&steps).context("Failed to serialize catalog")?
        );
        return Ok(());
    }

    println!("{kind} tour ({} steps)", catalog.len());
    for step in catalog.steps() {
        let mut flags = Vec::new();
        if step.gated {
            flags.push("gated");
        }
        if step.checkpoint {
            flags.push("checkpoint");
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(", "))
        };
        let target = match step.target.required_region() {
            Some(region) => region.to_string(),
            None => "body".to_string(),
        };
        println!(
            "{:>2}. {}{}  -> {} ({:?})",
            step.id + 1,
            step.content.title,
            flags,
            target,
            step.placement
        );
        if let Some(rule) = &step.rule {
            println!("      waits for: {rule}");
        }
    }
    Ok(())
}

async fn cmd_replay(config: &Config, path: &Path) -> Result<()> {
    let script = ReplayScript::load(path)?;
    let kind = script.catalog.unwrap_or(config.tour.catalog);
    let catalog = load_catalog(kind)?;

    println!("Replaying {} against the {kind} tour", path.display());
    let report = ReplayRunner::new(catalog)
        .with_timing(config.timing()?)
        .run(&script, |signal| println!("  {}", replay::describe(signal)))
        .await
        .with_context(|| format!("Replay of {} failed", path.display()))?;

    println!();
    println!("Final phase: {:?}", report.progress.phase);
    println!("Satisfied steps: {:?}", report.progress.satisfied);
    if report.seeded {
        println!("Example program was seeded at the checkpoint");
    }
    Ok(())
}
