//! btrfs backend driving the `btrfs` tool.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use samin_common::{SaminError, SaminResult};

use super::SubvolumeBackend;

/// [`SubvolumeBackend`] for btrfs.
#[derive(Debug, Clone)]
pub struct BtrfsBackend {
    program: PathBuf,
}

impl Default for BtrfsBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl BtrfsBackend {
    /// Use `btrfs` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_program("btrfs")
    }

    /// Use a specific `btrfs` binary.
    #[must_use]
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run<I, S>(&self, operation: &'static str, path: &Path, args: I) -> SaminResult<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.program);
        command.args(args);
        tracing::debug!(operation, command = ?command, "Running btrfs");

        let output = command
            .output()
            .map_err(|e| SaminError::backend(operation, path, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(SaminError::backend(
                operation,
                path,
                std::io::Error::other(if stderr.is_empty() {
                    format!("btrfs exited with {}", output.status)
                } else {
                    stderr
                }),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl SubvolumeBackend for BtrfsBackend {
    fn filesystem(&self) -> &'static str {
        "btrfs"
    }

    fn top_level_mount_data(&self) -> Option<&'static str> {
        Some("subvolid=0")
    }

    fn create_subvolume(&self, path: &Path) -> SaminResult<()> {
        self.run(
            "create_subvolume",
            path,
            [OsStr::new("subvolume"), OsStr::new("create"), path.as_os_str()],
        )?;
        tracing::info!(path = %path.display(), "Subvolume created");
        Ok(())
    }

    fn create_snapshot(&self, source: &Path, dest: &Path, read_only: bool) -> SaminResult<()> {
        let mut args = vec![OsStr::new("subvolume"), OsStr::new("snapshot")];
        if read_only {
            args.push(OsStr::new("-r"));
        }
        args.extend([source.as_os_str(), dest.as_os_str()]);

        self.run("create_snapshot", dest, args)?;
        tracing::info!(
            source = %source.display(),
            dest = %dest.display(),
            read_only,
            "Snapshot created"
        );
        Ok(())
    }

    fn delete_subvolume(&self, path: &Path) -> SaminResult<()> {
        self.run(
            "delete_subvolume",
            path,
            [OsStr::new("subvolume"), OsStr::new("delete"), path.as_os_str()],
        )?;
        tracing::info!(path = %path.display(), "Subvolume deleted");
        Ok(())
    }

    fn subvolume_id(&self, path: &Path) -> SaminResult<u64> {
        let stdout = self.run(
            "subvolume_id",
            path,
            [OsStr::new("inspect-internal"), OsStr::new("rootid"), path.as_os_str()],
        )?;
        parse_rootid(&stdout).ok_or_else(|| {
            SaminError::backend(
                "subvolume_id",
                path,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("unexpected rootid output: {}", stdout.trim()),
                ),
            )
        })
    }
}

fn parse_rootid(stdout: &str) -> Option<u64> {
    stdout.trim().parse().ok()
}
