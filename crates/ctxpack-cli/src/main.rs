#![deny(unsafe_code)]

//! ctxpack CLI: analyze a repository and pack budgeted context from it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ctxpack_config::AppConfig;
use ctxpack_core::{
    ChunkType, ContextEngine, ExpandDirection, ExpansionOptions, SelectionStrategy,
};

/// ctxpack: token-budgeted code context from a repository.
#[derive(Parser)]
#[command(name = "ctxpack", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "ctxpack.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Repository root, overriding `[analyzer].root`.
    #[arg(long)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze the repository and print a summary.
    Analyze {
        /// Print the full repo map as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Select a budgeted set of files.
    Select {
        /// Token budget (defaults to `[selection].max_tokens`).
        #[arg(long)]
        max_tokens: Option<u32>,

        /// Task description used for relevance scoring.
        #[arg(long)]
        task: Option<String>,

        /// importance_first, relevance_first, breadth_first, or depth_first.
        #[arg(long)]
        strategy: Option<SelectionStrategy>,

        /// Files to place first, in order.
        #[arg(long = "priority")]
        priority: Vec<String>,

        /// Include test files.
        #[arg(long)]
        include_tests: bool,

        /// Exclude type-definition files.
        #[arg(long)]
        no_types: bool,

        /// Drop files below this importance.
        #[arg(long)]
        min_importance: Option<f64>,

        /// Print the selection as JSON.
        #[arg(long, conflicts_with = "assemble")]
        json: bool,

        /// Print the selected files' contents.
        #[arg(long)]
        assemble: bool,
    },

    /// Search files by symbol, path, or content.
    Search {
        query: String,

        /// Tolerate typos in symbols and filenames.
        #[arg(long)]
        fuzzy: bool,

        /// Also require every term in file content.
        #[arg(long)]
        content: bool,

        /// Maximum number of results.
        #[arg(long)]
        limit: Option<usize>,

        /// Only match these chunk types (repeatable).
        #[arg(long = "type")]
        types: Vec<ChunkType>,

        #[arg(long)]
        json: bool,
    },

    /// Add one-hop graph neighbors of the given files.
    Expand {
        /// Already-selected files.
        #[arg(long = "file", required = true)]
        files: Vec<String>,

        /// dependencies, dependents, or both.
        #[arg(long, default_value = "both")]
        direction: ExpandDirection,

        /// Budget for added files.
        #[arg(long, default_value_t = 2000)]
        max_tokens: u32,

        /// Only add neighbors relevant to this text.
        #[arg(long)]
        query: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (mut config, found) = load_config(&cli.config).await?;
    if let Some(root) = &cli.root {
        config.analyzer.root = root.display().to_string();
    }

    let filter = match cli.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();
    if !found {
        info!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    run(config, &cli.config, cli.command).await
}

async fn run(config: AppConfig, config_path: &Path, command: Commands) -> Result<()> {
    let engine = || ContextEngine::new(config.clone()).context("invalid configuration");
    match command {
        Commands::Config { show } => cmd_config(&config, config_path, show)?,
        Commands::Analyze { json } => {
            let engine = engine()?;
            let map = engine.analyze().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(map.as_ref())?);
            } else {
                print!("{}", map.summary());
            }
        }
        Commands::Select {
            max_tokens,
            task,
            strategy,
            priority,
            include_tests,
            no_types,
            min_importance,
            json,
            assemble,
        } => {
            let engine = engine()?;
            let mut options = engine.selection_options().with_priority_files(priority);
            if let Some(max_tokens) = max_tokens {
                options.max_tokens = max_tokens;
            }
            if let Some(strategy) = strategy {
                options.strategy = strategy;
            }
            if let Some(min_importance) = min_importance {
                options.min_importance = min_importance;
            }
            options.task = task;
            options.include_tests |= include_tests;
            options.include_types &= !no_types;

            let result = engine.select(&options).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if assemble {
                print!("{}", engine.assemble_context(&result.chunks, options.max_tokens));
            } else {
                for chunk in &result.chunks {
                    println!(
                        "{:.2}  {:>6}  {:<13}  {}",
                        chunk.importance,
                        chunk.token_count,
                        chunk.chunk_type.to_string(),
                        chunk.file_path
                    );
                }
                println!(
                    "{} of {} files, {} tokens ({} remaining), {} excluded",
                    result.stats.files_selected,
                    result.stats.files_considered,
                    result.total_tokens,
                    result.remaining_tokens,
                    result.excluded.len()
                );
            }
        }
        Commands::Search {
            query,
            fuzzy,
            content,
            limit,
            types,
            json,
        } => {
            let engine = engine()?;
            let mut options = engine.search_options();
            options.fuzzy |= fuzzy;
            options.search_content |= content;
            if limit.is_some() {
                options.limit = limit;
            }
            if !types.is_empty() {
                options.chunk_types = Some(types);
            }

            let hits = engine.search_ranked(&query, &options).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else {
                for hit in &hits {
                    println!("{:>7.2}  {}", hit.score, hit.chunk.file_path);
                }
            }
        }
        Commands::Expand {
            files,
            direction,
            max_tokens,
            query,
            json,
        } => {
            let engine = engine()?;
            let options = ExpansionOptions {
                direction,
                max_tokens_to_add: max_tokens,
                query,
            };
            let result = engine.expand(&files, &options).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                for chunk in &result.added {
                    println!("{:>6}  {}", chunk.token_count, chunk.file_path);
                }
                println!(
                    "{} added, {} tokens, {} excluded",
                    result.added.len(),
                    result.tokens_added,
                    result.excluded.len()
                );
            }
        }
    }
    Ok(())
}

fn cmd_config(config: &AppConfig, config_path: &Path, show: bool) -> Result<()> {
    config.validate()?;
    if show {
        let toml_str =
            toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {e}"))?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
        println!("Chunk types: {}", ChunkType::ALL.map(|t| t.to_string()).join(", "));
    }
    Ok(())
}

/// Load the config file, or defaults when it does not exist.
async fn load_config(path: &Path) -> Result<(AppConfig, bool)> {
    if path.exists() {
        let config = AppConfig::load(path)
            .await
            .with_context(|| format!("failed to load {}", path.display()))?;
        Ok((config, true))
    } else {
        Ok((AppConfig::default(), false))
    }
}
