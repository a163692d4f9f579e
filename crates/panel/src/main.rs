//! CraftPanel file tool
//!
//! Inspect and export server files from a shell, through the same confined
//! file core the panel uses.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use panel::config::{default_config_path, Config};
use panel::files::{ByteStream, FileItem, FileManager};
use tokio::io::AsyncWriteExt;

/// CraftPanel file tool - browse and export Minecraft server files.
#[derive(Parser, Debug)]
#[command(name = "craftpanel-files")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// List a directory
    Ls {
        /// Server id (or the global id for all servers)
        server: String,

        /// Directory relative to the server root
        #[arg(default_value = "")]
        path: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show metadata for a file or directory
    Stat {
        /// Server id
        server: String,

        /// Path relative to the server root
        path: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Print a text file
    Cat {
        /// Server id
        server: String,

        /// File relative to the server root
        path: String,
    },

    /// Save a file, or a directory as a zip archive
    Export {
        /// Server id
        server: String,

        /// Path relative to the server root
        #[arg(default_value = "")]
        path: String,

        /// Output file (defaults to the suggested name in the current directory)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Write a default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::InitConfig { force } = cli.command {
        let path = cli.config.clone().unwrap_or_else(default_config_path);
        init_config(&path, force)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    // Load configuration
    let mut config = match &cli.config {
        Some(config_path) => Config::load(config_path)?,
        None => Config::load_default()?,
    };

    // Initialize tracing on stderr so stdout stays clean for `cat`
    let filter = if cli.verbose {
        "debug".to_string()
    } else {
        config.panel.log_level.to_lowercase()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(config_path) = &cli.config {
        tracing::debug!("Using config file: {:?}", config_path);
    }

    // Apply environment variable overrides
    config.apply_env_overrides();

    // Validate configuration
    config.validate()?;

    let files = FileManager::from_config(&config.files).with_context(|| {
        format!(
            "Failed to resolve servers directory: {}",
            config.files.servers_dir.display()
        )
    })?;

    match cli.command {
        Commands::Ls { server, path, json } => {
            let listing = files.list(&server, &path).await?;
            if json {
                let entries: Vec<_> = listing.items.iter().map(FileItem::to_protocol).collect();
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for item in &listing.items {
                    println!("{}", format_item(item));
                }
                if listing.skipped > 0 {
                    eprintln!("({} entries could not be read)", listing.skipped);
                }
            }
        }
        Commands::Stat { server, path, json } => {
            let item = files.stat(&server, &path).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&item.to_protocol())?);
            } else {
                println!("{}", format_item(&item));
            }
        }
        Commands::Cat { server, path } => {
            let text = files.read_text(&server, &path).await?;
            print!("{}", text.content);
        }
        Commands::Export {
            server,
            path,
            output,
        } => {
            let item = files.stat(&server, &path).await?;
            let (file_name, stream) = if item.is_directory {
                let archive = files.archive(&server, &path).await?;
                (archive.file_name, archive.stream)
            } else {
                let download = files.download(&server, &path, 0).await?;
                (download.file_name, download.stream)
            };

            let target = output.unwrap_or_else(|| PathBuf::from(&file_name));
            let written = save_stream(stream, &target).await?;
            println!("Wrote {} ({})", target.display(), format_size(written));
        }
        // Handled before the configuration is loaded
        Commands::InitConfig { .. } => {}
    }

    Ok(())
}

/// Write the default configuration to `path`, keeping an existing file unless `force`.
fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    Config::default().save(path)
}

/// Drain a byte stream into a new file, returning the bytes written.
async fn save_stream(mut stream: ByteStream, target: &Path) -> anyhow::Result<u64> {
    let mut file = tokio::fs::File::create(target)
        .await
        .with_context(|| format!("Failed to create {}", target.display()))?;

    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Export stream failed")?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    Ok(written)
}

/// One listing line: type marker, size, name.
fn format_item(item: &FileItem) -> String {
    if item.is_directory {
        format!("d {:>10}  {}/", "-", item.name)
    } else {
        format!("- {:>10}  {}", format_size(item.size), item.name)
    }
}

/// Format a byte count into a human-readable string.
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
