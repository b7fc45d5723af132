use anyhow::{Context, Result, bail};
use backsync::config::{self, BackupConfig, CompressionType, EncryptionType, RestoreConfig};
use backsync::diff::diff;
use backsync::executor;
use backsync::plan::make_plan;
use backsync::restore;
use backsync::tree::Tree;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::*;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "backsync", about = "Incremental directory backup, restore, and verification")]
struct Args {
    /// Verbosity (-v, -vv, -vvv, etc.)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    subcommand: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a backup root directory.
    Init {
        backup_root: Utf8PathBuf,
    },
    /// Diff the backup root against a source directory and write the result.
    Backup(BackupArgs),
    /// Restore a backup root into a destination directory.
    Restore(RestoreArgs),
    /// Print the changes between two directories without backing up.
    Diff {
        old: Utf8PathBuf,
        new: Utf8PathBuf,
    },
}

#[derive(Debug, Parser)]
struct BackupArgs {
    /// Directory to back up.
    #[arg(long)]
    source: Utf8PathBuf,

    /// Destination directory (created if absent).
    #[arg(long)]
    backup_root: Utf8PathBuf,

    /// Remove destination entries no longer present in the source.
    /// Defaults to the `delete_removed` setting in backsync.toml.
    #[arg(long)]
    mirror: bool,

    /// Compute the plan without touching the filesystem.
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Defaults to the compression backend configured in backsync.toml.
    #[arg(long, value_enum)]
    compression: Option<CliCompression>,

    /// Defaults to the encryption backend configured in backsync.toml.
    #[arg(long, value_enum)]
    encryption: Option<CliEncryption>,

    /// Password for the chosen encryption backend.
    #[arg(long)]
    key: Option<String>,
}

#[derive(Debug, Parser)]
struct RestoreArgs {
    #[arg(long)]
    backup_root: Utf8PathBuf,

    #[arg(long)]
    restore_root: Utf8PathBuf,

    /// Password for an encrypted backup.
    #[arg(long)]
    key: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliCompression {
    None,
    Huffman,
    Lz77,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliEncryption {
    None,
    Aes,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(args.verbose);

    let host_config = config::load().context("Couldn't load ~/.config/backsync.toml")?;

    match args.subcommand {
        Command::Init { backup_root } => {
            std::fs::create_dir_all(&backup_root)
                .with_context(|| format!("Couldn't create {backup_root}"))?;
            info!("Initialized backup root at {backup_root}");
            Ok(())
        }
        Command::Backup(a) => run_backup(a, &host_config),
        Command::Restore(a) => run_restore(a),
        Command::Diff { old, new } => run_diff(&old, &new),
    }
}

fn run_backup(args: BackupArgs, host_config: &config::Configuration) -> Result<()> {
    if !args.backup_root.exists() {
        std::fs::create_dir_all(&args.backup_root)
            .with_context(|| format!("Couldn't create {}", args.backup_root))?;
    }

    let compression_type = match args.compression {
        Some(CliCompression::None) => CompressionType::None,
        Some(CliCompression::Huffman) => CompressionType::Huffman,
        Some(CliCompression::Lz77) => CompressionType::Lz77,
        None => host_config.compression,
    };
    let encryption_type = match args.encryption {
        Some(CliEncryption::None) => EncryptionType::None,
        Some(CliEncryption::Aes) => EncryptionType::Aes,
        None => host_config.encryption,
    };

    let mut config = BackupConfig::new(args.source.clone(), args.backup_root.clone());
    config.delete_removed = args.mirror || host_config.delete_removed;
    config.dry_run = args.dry_run;
    config.enable_compression = compression_type != CompressionType::None;
    config.compression_type = compression_type;
    config.enable_encryption = encryption_type != EncryptionType::None;
    config.encryption_type = encryption_type;
    config.encryption_key = args.key;

    if config.enable_encryption && config.encryption_key.is_none() {
        bail!("--encryption aes requires --key");
    }

    let backup_tree = Tree::build(&config.backup_root)?;
    let source_tree = Tree::build(&config.source_root)?;
    let changes = diff(&backup_tree, &source_tree);
    info!("{} change(s) between source and backup root", changes.len());

    let actions = make_plan(&changes, &config);
    let ok = executor::execute(&actions, &config, &source_tree)?;
    if !ok {
        bail!("One or more actions failed; see warnings above");
    }
    Ok(())
}

fn run_restore(args: RestoreArgs) -> Result<()> {
    std::fs::create_dir_all(&args.restore_root)
        .with_context(|| format!("Couldn't create {}", args.restore_root))?;

    let config = RestoreConfig {
        backup_root: args.backup_root,
        restore_root: args.restore_root,
        encryption_key: args.key,
    };
    let ok = restore::restore(&config)?;
    if !ok {
        bail!("One or more files failed to restore; see warnings above");
    }
    Ok(())
}

fn run_diff(old: &Utf8PathBuf, new: &Utf8PathBuf) -> Result<()> {
    let old_tree = Tree::build(old)?;
    let new_tree = Tree::build(new)?;
    for change in diff(&old_tree, &new_tree) {
        println!("{:?} {}", change.kind, change.relative_path);
    }
    Ok(())
}

/// Set up tracing to spit messages to stderr; `-v` raises the level.
fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
