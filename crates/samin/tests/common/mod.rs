//! Test doubles: an in-memory mount table and a directory-backed subvolume
//! backend.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use samin::backend::SubvolumeBackend;
use samin::mount::{FilesystemProbe, MountOptions, MountService};
use samin::snapshot::{SaminConfig, SnapshotManager};
use samin_common::{SaminError, SaminResult, SnapshotId};
use tempfile::TempDir;
use walkdir::WalkDir;

const ID_FILE: &str = ".subvolid";

#[derive(Debug, Default)]
pub struct MountState {
    pub mounted: HashSet<PathBuf>,
    pub busy_ids: BTreeSet<u64>,
    pub mounts: usize,
    pub unmounts: usize,
}

/// Mount table kept in memory. Mounting does not touch the filesystem, so
/// the mountpoint directory itself plays the top-level volume.
#[derive(Debug, Clone, Default)]
pub struct FakeMounts(pub Arc<Mutex<MountState>>);

impl FakeMounts {
    pub fn state(&self) -> std::sync::MutexGuard<'_, MountState> {
        self.0.lock().unwrap()
    }
}

impl MountService for FakeMounts {
    fn is_mounted(&self, path: &Path) -> SaminResult<bool> {
        Ok(self.state().mounted.contains(path))
    }

    fn mount(&self, _device: &Path, target: &Path, options: &MountOptions) -> SaminResult<()> {
        assert_eq!(options.data.as_deref(), Some("subvolid=0"));
        assert!(!options.readonly);
        let mut state = self.state();
        state.mounts += 1;
        state.mounted.insert(target.to_path_buf());
        Ok(())
    }

    fn unmount(&self, target: &Path) -> SaminResult<()> {
        let mut state = self.state();
        state.unmounts += 1;
        if !state.mounted.remove(target) {
            return Err(SaminError::UnmountFailure {
                target: target.to_path_buf(),
                source: std::io::Error::other("not mounted"),
            });
        }
        Ok(())
    }

    fn mounted_subvolume_ids(&self, _device: &Path) -> SaminResult<BTreeSet<u64>> {
        Ok(self.state().busy_ids.clone())
    }
}

#[derive(Debug)]
pub struct BackendState {
    pub next_id: u64,
    pub fail_snapshots: bool,
    pub read_only: HashSet<PathBuf>,
    pub deleted: Vec<PathBuf>,
}

impl Default for BackendState {
    fn default() -> Self {
        Self {
            next_id: 256,
            fail_snapshots: false,
            read_only: HashSet::new(),
            deleted: Vec::new(),
        }
    }
}

/// Subvolumes are plain directories carrying their id in a hidden file;
/// snapshots are recursive copies.
#[derive(Debug, Clone, Default)]
pub struct FakeBackend(pub Arc<Mutex<BackendState>>);

impl FakeBackend {
    pub fn state(&self) -> std::sync::MutexGuard<'_, BackendState> {
        self.0.lock().unwrap()
    }

    fn assign_id(&self, path: &Path) -> std::io::Result<()> {
        let id = {
            let mut state = self.state();
            state.next_id += 1;
            state.next_id
        };
        fs::write(path.join(ID_FILE), id.to_string())
    }

    pub fn subvolume_id_of(&self, path: &Path) -> u64 {
        self.subvolume_id(path).unwrap()
    }
}

fn copy_tree(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(std::io::Error::from)?;
        let relative = entry.path().strip_prefix(src).unwrap();
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

impl SubvolumeBackend for FakeBackend {
    fn filesystem(&self) -> &'static str {
        "btrfs"
    }

    fn top_level_mount_data(&self) -> Option<&'static str> {
        Some("subvolid=0")
    }

    fn create_subvolume(&self, path: &Path) -> SaminResult<()> {
        fs::create_dir_all(path).map_err(|e| SaminError::backend("create_subvolume", path, e))?;
        self.assign_id(path)
            .map_err(|e| SaminError::backend("create_subvolume", path, e))
    }

    fn create_snapshot(&self, source: &Path, dest: &Path, read_only: bool) -> SaminResult<()> {
        let fail = |e: std::io::Error| SaminError::backend("create_snapshot", dest, e);
        if self.state().fail_snapshots {
            return Err(fail(std::io::Error::other("injected failure")));
        }
        if dest.exists() {
            return Err(fail(std::io::Error::from(std::io::ErrorKind::AlreadyExists)));
        }
        copy_tree(source, dest).map_err(fail)?;
        self.assign_id(dest).map_err(fail)?;
        if read_only {
            self.state().read_only.insert(dest.to_path_buf());
        }
        Ok(())
    }

    fn delete_subvolume(&self, path: &Path) -> SaminResult<()> {
        fs::remove_dir_all(path).map_err(|e| SaminError::backend("delete_subvolume", path, e))?;
        self.state().deleted.push(path.to_path_buf());
        Ok(())
    }

    fn subvolume_id(&self, path: &Path) -> SaminResult<u64> {
        let raw = fs::read_to_string(path.join(ID_FILE))
            .map_err(|e| SaminError::backend("subvolume_id", path, e))?;
        raw.trim().parse().map_err(|_| {
            SaminError::backend("subvolume_id", path, std::io::Error::other("bad id"))
        })
    }
}

pub struct FixedProbe(pub &'static str);

impl FilesystemProbe for FixedProbe {
    fn filesystem_type(&self, _device: &Path) -> SaminResult<Option<String>> {
        Ok(Some(self.0.to_string()))
    }
}

pub const SUBVOLUME: &str = "@home";

/// A manager wired to the fakes over a temporary top-level volume that
/// already holds a live `@home` subvolume.
pub struct Harness {
    pub temp: TempDir,
    pub manager: SnapshotManager,
    pub backend: FakeBackend,
    pub mounts: FakeMounts,
    pub device: PathBuf,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_probe("btrfs")
    }

    pub fn with_probe(fstype: &'static str) -> Self {
        let temp = tempfile::tempdir().unwrap();
        let config = SaminConfig::default().with_mountpoint(temp.path().join("top"));
        let backend = FakeBackend::default();
        let mounts = FakeMounts::default();

        backend
            .create_subvolume(&config.paths.live_subvolume(SUBVOLUME))
            .unwrap();

        let manager = SnapshotManager::new(
            config,
            Box::new(backend.clone()),
            Box::new(mounts.clone()),
            Box::new(FixedProbe(fstype)),
        );

        let harness = Self {
            temp,
            manager,
            backend,
            mounts,
            device: PathBuf::from("/dev/fake0"),
        };
        harness.write_live("v1");
        harness
    }

    pub fn configured() -> Self {
        let harness = Self::new();
        harness
            .manager
            .create_config(SUBVOLUME, &harness.device)
            .unwrap();
        harness
    }

    pub fn live(&self) -> PathBuf {
        self.manager.config().paths.live_subvolume(SUBVOLUME)
    }

    pub fn write_live(&self, content: &str) {
        fs::write(self.live().join("data.txt"), content).unwrap();
    }

    /// Recreate a removed live subvolume.
    pub fn recreate_live(&self) {
        self.backend.create_subvolume(&self.live()).unwrap();
        self.write_live("v1");
    }

    pub fn read_live(&self) -> String {
        fs::read_to_string(self.live().join("data.txt")).unwrap()
    }

    pub fn snapshot_path(&self, id: u64) -> PathBuf {
        self.manager
            .config()
            .paths
            .snapshot_record(SUBVOLUME, SnapshotId::new(id).unwrap())
            .join("snapshot")
    }

    pub fn take(&self, description: &str) -> u64 {
        self.manager
            .take_snapshot(SUBVOLUME, &self.device, Some(description))
            .unwrap()
            .get()
    }

    pub fn listed_ids(&self) -> Vec<u64> {
        self.manager
            .list_snapshots(SUBVOLUME, &self.device)
            .unwrap()
            .iter()
            .map(|entry| entry.id.get())
            .collect()
    }

    /// Every mount was matched by an unmount and nothing is left mounted.
    pub fn assert_released(&self) {
        let state = self.mounts.state();
        assert!(state.mounted.is_empty(), "control area left mounted");
        assert_eq!(state.mounts, state.unmounts);
    }
}
