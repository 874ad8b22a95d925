use anyhow::{Context, Result};
use at_types::TuningSpec;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Empirically tune code templates over a parameter search space.
#[derive(Debug, Parser)]
#[command(name = "at-tune", version)]
struct Cli {
    /// Tuning specification (JSON).
    #[arg(long)]
    spec: PathBuf,

    /// Code template with `${NAME}` placeholders; repeat for several fragments.
    #[arg(long = "template", required = true)]
    templates: Vec<PathBuf>,

    /// Shell command that measures a batch: reads the manifest on stdin,
    /// prints `{"<key>": cost, ...}` on stdout.
    #[arg(long)]
    command: String,

    /// Write the search outcome as JSON to this file.
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let spec = TuningSpec::load(&cli.spec)
        .with_context(|| format!("failed to load tuning spec {}", cli.spec.display()))?;

    let fragments = cli
        .templates
        .iter()
        .map(|path| {
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read template {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let outcome = at_driver::tune(&spec, fragments, &cli.command).context("tuning failed")?;
    let json = serde_json::to_string_pretty(&outcome)?;

    if let Some(path) = &cli.output {
        std::fs::write(path, &json)
            .with_context(|| format!("failed to write outcome to {}", path.display()))?;
        info!(path = %path.display(), "wrote search outcome");
    }

    match outcome.cost {
        Some(cost) => println!("best cost {cost}"),
        None => println!("search space is empty, nothing to tune"),
    }
    println!("{}", serde_json::to_string_pretty(&outcome.binding)?);
    Ok(())
}
