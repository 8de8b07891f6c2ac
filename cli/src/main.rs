use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pipeline::{
    AttributionPipeline, Config, Gate, MemoryKeyStore, PipelineError, Scanner, Standing,
};
use reader::{Palette, PaletteCache};
use serde::Serialize;
use structures::RenderMode;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Pixel attribution and placemaps from canvas logs", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// TOML config; every field is optional
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides `data_dir` from the config
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Overrides `max_concurrent_pipelines` from the config
    #[arg(long)]
    max_concurrent: Option<usize>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Filter a canvas log with a log key, analyze it and render a placemap
    Generate {
        #[arg(short, long)]
        user: u64,
        #[arg(short, long)]
        canvas: String,
        /// 512 lowercase letters and digits
        #[arg(short, long)]
        key: String,
    },
    /// Re-render an already filtered log in another mode
    Render {
        #[arg(short, long)]
        user: u64,
        #[arg(short, long)]
        canvas: String,
        /// normal, activity or age
        mode: RenderMode,
    },
    /// Tracked-goal totals for every tracked canvas a user has a log for
    ScanUser {
        #[arg(short, long)]
        user: u64,
    },
    /// Tracked-goal totals for every user with a log for a canvas
    ScanCanvas {
        #[arg(short, long)]
        canvas: String,
    },
    /// List the colors of a .gpl palette
    Palette { path: PathBuf },
    /// Look up a rank from a JSON file of net pixel totals
    Rank {
        /// JSON object mapping identity to net pixels
        #[arg(short, long)]
        scores: PathBuf,
        identity: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Arc::new(load_config(&cli)?);
    let palettes = Arc::new(PaletteCache::new());

    match cli.command {
        Commands::Generate { user, canvas, key } => {
            let keys = Arc::new(MemoryKeyStore::new());
            keys.insert(user, canvas.as_str(), key);
            let pipeline = AttributionPipeline::new(
                Arc::clone(&config),
                keys,
                palettes,
                Gate::new(config.max_concurrent_pipelines),
            );

            let result = user_facing(pipeline.run(user, &canvas).await)?;
            emit(cli.json, &result, || {
                format!("{}\nPlacemap: {}", result, result.placemap.path.display())
            })?;
        }
        Commands::Render { user, canvas, mode } => {
            let pipeline = AttributionPipeline::new(
                Arc::clone(&config),
                Arc::new(MemoryKeyStore::new()),
                palettes,
                Gate::new(config.max_concurrent_pipelines),
            );

            let render = user_facing(pipeline.render_alternate(user, &canvas, mode).await)?;
            emit(cli.json, &render, || render.to_string())?;
        }
        Commands::ScanUser { user } => {
            let scanner = Scanner::new(Arc::clone(&config), palettes);
            let entries = scanner.scan_user(user, print_progress).await?;

            emit(cli.json, &entries, || {
                entries
                    .iter()
                    .map(|(canvas, entry)| {
                        format!(
                            "c{}: {} placed, {} for TPE, {} griefed",
                            canvas, entry.net_placed, entry.tpe_net, entry.tpe_griefed
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
        }
        Commands::ScanCanvas { canvas } => {
            let scanner = Scanner::new(Arc::clone(&config), palettes);
            let entries = scanner.scan_canvas(&canvas, print_progress).await?;

            emit(cli.json, &entries, || {
                entries
                    .iter()
                    .map(|(user, entry)| {
                        format!(
                            "{}: {} placed, {} for TPE, {} griefed",
                            user, entry.net_placed, entry.tpe_net, entry.tpe_griefed
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
        }
        Commands::Palette { path } => {
            let palette = Palette::decode(&path)?;
            let colors: Vec<[u8; 3]> = palette.colors().iter().map(|color| color.0).collect();

            emit(cli.json, &colors, || {
                colors
                    .iter()
                    .enumerate()
                    .map(|(index, [r, g, b])| format!("{:>3}: {} {} {}", index, r, g, b))
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
        }
        Commands::Rank { scores, identity } => {
            let store = load_scores(&scores)?;
            let standing = Standing::lookup(&store, &identity, &config.ranks);

            emit(cli.json, &standing, || {
                format!("{}: {} ({})", identity, standing.total, standing.rank)
            })?;
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }
    if let Some(max) = cli.max_concurrent {
        config.max_concurrent_pipelines = max;
    }

    info!(data_dir = %config.data_dir.display(), "loaded config");
    Ok(config)
}

fn load_scores(path: &Path) -> Result<HashMap<String, i64>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("could not read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("could not parse {}", path.display()))
}

/// Expected failures surface as the message a user would be shown.
fn user_facing<T>(result: Result<T, PipelineError>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(err) if err.is_user_facing() => {
            warn!(%err, "request failed");
            bail!("{}", err.user_message())
        }
        Err(err) => Err(err.into()),
    }
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text());
    }
    Ok(())
}

fn print_progress(unit: &str, completed: usize, total: usize) {
    eprintln!("Progress: {}/{} (last: {})", completed, total, unit);
}
