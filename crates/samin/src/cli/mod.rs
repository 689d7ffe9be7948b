//! CLI command definitions and handlers.

mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Result, eyre};
use samin_common::paths::validate_subvolume;
use samin_common::{SaminError, SnapshotId, SnapshotSelector};

use crate::backend::BackendRegistry;
use crate::mount::SystemMounts;
use crate::snapshot::{SaminConfig, SnapshotManager};

pub use output::{DISPLAY_FORMAT, format_date, render_json, render_table};

/// samin - btrfs snapshot manager
#[derive(Parser)]
#[command(name = "samin")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subvolume to operate on
    #[arg(short, long)]
    pub subvolume: String,

    /// Device holding the subvolume (default: the device it is mounted from)
    #[arg(short = 'b', long)]
    pub device: Option<PathBuf>,

    /// Where to mount the top-level volume
    #[arg(
        long,
        global = true,
        env = "SAMIN_MOUNTPOINT",
        default_value = "/run/samin"
    )]
    pub mountpoint: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Do not serialize with other samin processes
    #[arg(long, global = true)]
    pub no_lock: bool,

    /// Do not ask for confirmation
    #[arg(short, long, global = true)]
    pub yes: bool,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Listing formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human readable table
    Table,
    /// JSON array
    Json,
}

/// samin commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Create a config
    CreateConfig,

    /// Delete a config and all of its snapshots
    DeleteConfig,

    /// Take a snapshot
    TakeSnapshot {
        /// Snapshot description
        #[arg(long)]
        description: Option<String>,
    },

    /// Delete snapshots, e.g. `3` or `2,4-6`
    DeleteSnapshot {
        /// Snapshot numbers and ranges
        selector: SnapshotSelector,
    },

    /// Rollback to a snapshot
    Rollback {
        /// Snapshot number
        snapshot: SnapshotId,
    },

    /// List snapshots
    ListSnapshots {
        /// Show time in UTC instead of local time
        #[arg(short, long)]
        utc: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
}

impl Cli {
    /// Execute the CLI command.
    pub fn execute(self) -> Result<()> {
        validate_subvolume(&self.subvolume)?;

        let registry = BackendRegistry::with_defaults();
        let config = SaminConfig::default()
            .with_mountpoint(&self.mountpoint)
            .with_lock(!self.no_lock);

        let device = match &self.device {
            Some(device) => device.clone(),
            None => discover_device(&registry, &self.subvolume)?,
        };
        let subvolume = self.subvolume.as_str();

        match self.command {
            Commands::CreateConfig => {
                let manager = SnapshotManager::for_device(config, &registry, &device)?;
                manager.create_config(subvolume, &device)?;
                println!("Config for subvolume {subvolume} created");
                Ok(())
            }

            Commands::DeleteConfig => {
                let prompt = format!(
                    "Are you sure you want to delete the config of subvolume {subvolume} on {} and all of its snapshots?",
                    device.display()
                );
                if !confirm(self.yes, &prompt)? {
                    return Ok(());
                }

                let manager = SnapshotManager::for_device(config, &registry, &device)?;
                manager.delete_config(subvolume, &device)?;
                println!("Config for subvolume {subvolume} deleted");
                Ok(())
            }

            Commands::TakeSnapshot { description } => {
                let manager = SnapshotManager::for_device(config, &registry, &device)?;
                let id = manager.take_snapshot(subvolume, &device, description.as_deref())?;
                println!("Snapshot #{id} taken");
                Ok(())
            }

            Commands::DeleteSnapshot { selector } => {
                let prompt = format!(
                    "Are you sure you want to delete snapshot {selector} from {} subvolume {subvolume}?",
                    device.display()
                );
                if !confirm(self.yes, &prompt)? {
                    return Ok(());
                }

                let manager = SnapshotManager::for_device(config, &registry, &device)?;
                let report = manager.delete_snapshots(subvolume, &device, &selector)?;
                for id in &report.deleted {
                    println!("Snapshot #{id} deleted");
                }
                for skipped in &report.skipped {
                    eprintln!("{}", skipped.reason);
                }

                if report.is_complete() {
                    Ok(())
                } else {
                    Err(eyre!("{} snapshot(s) were not deleted", report.skipped.len()))
                }
            }

            Commands::Rollback { snapshot } => {
                let prompt = format!(
                    "Are you sure you want to rollback subvolume {subvolume} on {} to snapshot #{snapshot}?",
                    device.display()
                );
                if !confirm(self.yes, &prompt)? {
                    return Ok(());
                }

                let manager = SnapshotManager::for_device(config, &registry, &device)?;
                let saved = manager.rollback(subvolume, &device, snapshot)?;
                println!("Previous state saved as snapshot #{saved}");
                println!("Remount the subvolume or reboot to finish");
                Ok(())
            }

            Commands::ListSnapshots { utc, format } => {
                let manager = SnapshotManager::for_device(config, &registry, &device)?;
                let entries = manager.list_snapshots(subvolume, &device)?;

                match format {
                    OutputFormat::Json => println!("{}", render_json(&entries)?),
                    OutputFormat::Table if entries.is_empty() => println!("No snapshots found"),
                    OutputFormat::Table => println!("{}", render_table(&entries, utc)),
                }
                Ok(())
            }
        }
    }
}

/// Ask the operator before a destructive operation.
fn confirm(assume_yes: bool, prompt: &str) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }

    let confirmed = dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?;
    if !confirmed {
        println!("Aborted");
    }
    Ok(confirmed)
}

/// Find the device a subvolume is mounted from, trying every supported
/// filesystem type.
fn discover_device(registry: &BackendRegistry, subvolume: &str) -> Result<PathBuf> {
    let mounts = SystemMounts::new();
    for fstype in registry.supported() {
        match mounts.device_of_subvolume(subvolume, fstype) {
            Ok(device) => {
                tracing::debug!(subvolume, fstype, device = %device.display(), "Discovered device");
                return Ok(device);
            }
            Err(SaminError::DeviceNotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }
    }
    Err(SaminError::DeviceNotFound {
        subvolume: subvolume.to_string(),
    }
    .into())
}

impl Cli {
    /// Log filter directive for this invocation.
    #[must_use]
    pub const fn log_directive(&self) -> &'static str {
        if self.debug { "samin=debug" } else { "samin=info" }
    }
}
