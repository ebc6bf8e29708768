// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Relabel: Local Image Browser, Tagger & Renamer
//!
//! CLI front end over the core subsystems: tag catalog, filename analyzer,
//! thumbnail cache, and rename engine.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

use relabel::analyzer::FilenameAnalyzer;
use relabel::catalog::TagCatalog;
use relabel::config::AppConfig;
use relabel::files;
use relabel::rename::{batch_requests, preview_batch, rename_batch, RenameResult};
use relabel::thumbnails::ThumbnailCache;
use relabel::{RelabelError, Result};

/// Relabel CLI - Local Image Browser, Tagger & Renamer
#[derive(Parser, Debug)]
#[command(name = "relabel")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version = "1.0.0")]
#[command(about = "Local image browser, tagger, and batch renamer", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Output format for results
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List images in a directory with their tags and thumbnails
    Browse {
        /// Directory to browse
        dir: PathBuf,

        /// Skip thumbnail generation
        #[arg(long)]
        no_thumbs: bool,
    },

    /// Suggest tags, prefix, and suffix from the filenames in a directory
    Analyze {
        /// Directory to analyze
        dir: PathBuf,
    },

    /// Tag catalog operations
    Tags {
        #[command(subcommand)]
        action: TagCommands,
    },

    /// Batch-rename the images in a directory
    Rename {
        /// Directory holding the source images
        dir: PathBuf,

        /// Destination directory (defaults to the source directory)
        #[arg(short, long)]
        dest: Option<PathBuf>,

        /// Filename prefix
        #[arg(short, long, default_value = "")]
        prefix: String,

        /// Tags to embed in the filename (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Filename suffix
        #[arg(short, long, default_value = "")]
        suffix: String,

        /// Starting counter value
        #[arg(long, default_value = "0")]
        start: u32,

        /// Preview the new names without renaming
        #[arg(long)]
        dry_run: bool,
    },

    /// Thumbnail cache operations
    Cache {
        #[command(subcommand)]
        action: CacheCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum TagCommands {
    /// List all tags
    List,

    /// Add one or more tags
    Add {
        /// Tags to add
        tags: Vec<String>,
    },

    /// Remove a tag (case-insensitive)
    Remove {
        /// Tag to remove
        tag: String,
    },

    /// Restore the default tag vocabulary
    Reset {
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum CacheCommands {
    /// Pre-generate thumbnails for every image in a directory
    Warm {
        /// Directory to warm
        dir: PathBuf,
    },

    /// Delete every cached thumbnail
    Clear,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,

        /// Force overwrite existing configuration
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if !cli.quiet {
        info!("Relabel v1.0.0 - Local Image Browser, Tagger & Renamer");
    }

    // Load configuration
    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Some(Commands::Browse { dir, no_thumbs }) => {
            run_browse(config, dir, no_thumbs, &cli.format)
        }
        Some(Commands::Analyze { dir }) => run_analyze(config, dir, &cli.format),
        Some(Commands::Tags { action }) => run_tags(config, action, &cli.format),
        Some(Commands::Rename {
            dir,
            dest,
            prefix,
            tags,
            suffix,
            start,
            dry_run,
        }) => run_rename(config, dir, dest, prefix, tags, suffix, start, dry_run, &cli.format),
        Some(Commands::Cache { action }) => run_cache(config, action),
        Some(Commands::Config { action }) => run_config(config, action, &cli.config),
        None => run_browse(config, PathBuf::from("."), false, &cli.format),
    }
}

/// List images with their matched tags and (optionally) thumbnails
fn run_browse(config: AppConfig, dir: PathBuf, no_thumbs: bool, format: &str) -> Result<()> {
    let images = files::scan_directory(&dir)?;
    let catalog = TagCatalog::open(&config.catalog_dir(), &config.default_tags)?;
    let analyzer = FilenameAnalyzer::new(&catalog.get_all());

    let cache = if no_thumbs {
        None
    } else {
        Some(ThumbnailCache::new(&config.cache_dir(), &config.thumbnails)?)
    };

    // Queue everything up front so the pool works while we print
    let handles: Vec<_> = cache
        .as_ref()
        .map(|c| images.iter().map(|img| c.queue(img)).collect())
        .unwrap_or_default();

    let mut rows = Vec::new();
    for (index, image) in images.iter().enumerate() {
        let name = image
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let tags = analyzer.matched_tags(&name);
        let thumbnail = match handles.get(index) {
            Some(handle) => Some(handle.wait()?),
            None => None,
        };
        rows.push(serde_json::json!({
            "name": name,
            "tags": tags,
            "thumbnail": thumbnail,
        }));
    }

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        println!("{} images in {:?}", images.len(), dir);
        for row in &rows {
            let tags: Vec<String> = row["tags"]
                .as_array()
                .map(|a| {
                    a.iter()
                        .filter_map(|t| t.as_str().map(String::from))
                        .collect()
                })
                .unwrap_or_default();
            println!("  {}  [{}]", row["name"].as_str().unwrap_or(""), tags.join(", "));
        }
    }

    if let Some(cache) = cache {
        cache.shutdown();
    }
    Ok(())
}

/// Analyze filenames for suggested tags, prefix, and suffix
fn run_analyze(config: AppConfig, dir: PathBuf, format: &str) -> Result<()> {
    let images = files::scan_directory(&dir)?;
    let filenames: Vec<String> = images
        .iter()
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(String::from))
        .collect();

    let catalog = TagCatalog::open(&config.catalog_dir(), &config.default_tags)?;
    let analyzer = FilenameAnalyzer::new(&catalog.get_all());
    let analysis = analyzer.analyze(&filenames);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        println!("Analyzed {} files", analysis.summary.total_files);
        println!("  Suggested prefix: {:?}", analysis.suggested_prefix);
        println!("  Suggested suffix: {:?}", analysis.suggested_suffix);
        println!("  Suggested tags:   {:?}", analysis.suggested_tags);
        let mut frequencies: Vec<_> = analysis.tag_frequency.iter().collect();
        frequencies.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
        for (tag, count) in frequencies {
            println!("    {} ({} files)", tag, count);
        }
    }
    Ok(())
}

/// Tag catalog operations
fn run_tags(config: AppConfig, action: TagCommands, format: &str) -> Result<()> {
    let catalog = TagCatalog::open(&config.catalog_dir(), &config.default_tags)?;

    match action {
        TagCommands::List => {
            let tags = catalog.get_all();
            if format == "json" {
                let meta = catalog.metadata()?;
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "tags": tags,
                        "metadata": meta,
                    }))?
                );
            } else {
                println!("{} tags:", tags.len());
                for tag in tags {
                    println!("  {}", tag);
                }
            }
        }
        TagCommands::Add { tags } => {
            for (tag, result) in catalog.add_many(&tags) {
                match result {
                    Ok(()) => println!("Added: {}", tag),
                    Err(e) => println!("Rejected {:?}: {}", tag, e),
                }
            }
        }
        TagCommands::Remove { tag } => {
            catalog.remove(&tag)?;
            println!("Removed: {}", tag);
        }
        TagCommands::Reset { force } => {
            if !force {
                return Err(RelabelError::Config(
                    "Resetting discards all custom tags. Re-run with --force".to_string(),
                ));
            }
            catalog.reset_to_defaults()?;
            println!("Tag catalog reset to defaults");
        }
    }
    Ok(())
}

/// Batch rename with optional dry-run preview
#[allow(clippy::too_many_arguments)]
fn run_rename(
    config: AppConfig,
    dir: PathBuf,
    dest: Option<PathBuf>,
    prefix: String,
    tags: Vec<String>,
    suffix: String,
    start: u32,
    dry_run: bool,
    format: &str,
) -> Result<()> {
    let images = files::scan_directory(&dir)?;
    let dest_dir = dest.unwrap_or_else(|| dir.clone());

    // Flag tags the catalog doesn't know; they are still usable
    let catalog = TagCatalog::open(&config.catalog_dir(), &config.default_tags)?;
    let known: Vec<String> = catalog.get_all().iter().map(|t| t.to_lowercase()).collect();
    for tag in &tags {
        if !known.contains(&tag.to_lowercase()) {
            warn!("Tag not in catalog: {}", tag);
        }
    }

    if dry_run {
        let previews = preview_batch(&images, &prefix, &tags, &suffix, start);
        if format == "json" {
            println!("{}", serde_json::to_string_pretty(&previews)?);
        } else {
            println!("Would rename {} files:", previews.len());
            for preview in &previews {
                println!("  {} -> {}", preview.old_name, preview.new_name);
            }
        }
        return Ok(());
    }

    let requests = batch_requests(&images, &dest_dir, &prefix, &tags, &suffix, start);
    let mut progress = |index: usize, total: usize, result: &RenameResult| -> Result<()> {
        info!("Processed {}/{}: {:?}", index, total, result.source);
        Ok(())
    };
    let summary = rename_batch(&requests, start, Some(&mut progress));

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Renamed {} of {} files ({} skipped, {} failed)",
            summary.successful, summary.total, summary.skipped, summary.failed
        );
        for failure in summary.failures() {
            println!("  Failed: {:?}", failure.source);
        }
    }
    Ok(())
}

/// Thumbnail cache operations
fn run_cache(config: AppConfig, action: CacheCommands) -> Result<()> {
    let cache = ThumbnailCache::new(&config.cache_dir(), &config.thumbnails)?;

    match action {
        CacheCommands::Warm { dir } => {
            let images = files::scan_directory(&dir)?;
            let handles: Vec<_> = images.iter().map(|img| cache.queue(img)).collect();
            for handle in &handles {
                handle.wait()?;
            }
            println!("Warmed {} thumbnails into {:?}", handles.len(), cache.cache_dir());
        }
        CacheCommands::Clear => {
            cache.clear();
            println!("Thumbnail cache cleared");
        }
    }

    cache.shutdown();
    Ok(())
}

/// Configuration management
fn run_config(config: AppConfig, action: ConfigCommands, config_path: &PathBuf) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            println!("\nLoaded from: {:?}", config_path);
        }
        ConfigCommands::Generate { output, force } => {
            if output.exists() && !force {
                return Err(RelabelError::Config(
                    "config.json already exists. Use --force to overwrite".to_string(),
                ));
            }
            AppConfig::default().save(&output)?;
            println!("Wrote default configuration to {:?}", output);
        }
    }
    Ok(())
}
