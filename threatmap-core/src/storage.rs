use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::models::HierarchyStore;

const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Error type for storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// File is locked by another process
    #[error("Workspace is locked by another user/process: {0:?}")]
    FileLocked(PathBuf),
}

/// Loads and saves a hierarchy workspace as YAML, with advisory file locking
/// so two analysts editing the same file don't clobber each other
pub struct Storage {
    file_path: PathBuf,
    lock_file_path: PathBuf,
}

impl Storage {
    /// Creates a new Storage instance
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        let file_path = file_path.as_ref().to_path_buf();
        let lock_file_path = file_path.with_extension("yaml.lock");
        Self {
            file_path,
            lock_file_path,
        }
    }

    /// Returns the path to the storage file
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Polls `try_lock` until it succeeds or the timeout elapses
    fn wait_for_lock(&self, lock_file: &File, exclusive: bool) -> Result<()> {
        let start = Instant::now();
        loop {
            // Called through the trait: std's inherent File locks shadow these names
            let attempt = if exclusive {
                FileExt::try_lock_exclusive(lock_file)
            } else {
                FileExt::try_lock_shared(lock_file)
            };
            match attempt {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if start.elapsed() > LOCK_TIMEOUT {
                        return Err(StorageError::FileLocked(self.file_path.clone()).into());
                    }
                    std::thread::sleep(Duration::from_millis(100));
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Failed to acquire lock on {:?}", self.lock_file_path)
                    })
                }
            }
        }
    }

    /// Acquire an exclusive lock for writing; the handle must be held for
    /// the duration of the write
    fn acquire_write_lock(&self) -> Result<File> {
        if let Some(parent) = self.lock_file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.lock_file_path)
            .with_context(|| format!("Failed to create lock file: {:?}", self.lock_file_path))?;

        self.wait_for_lock(&lock_file, true)?;

        let _ = writeln!(
            lock_file,
            "Locked by PID {} at {}",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        );
        Ok(lock_file)
    }

    /// Acquire a shared lock for reading, if a lock file exists
    fn acquire_read_lock(&self) -> Result<Option<File>> {
        if !self.lock_file_path.exists() {
            return Ok(None);
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .open(&self.lock_file_path)
            .with_context(|| format!("Failed to open lock file: {:?}", self.lock_file_path))?;

        self.wait_for_lock(&lock_file, false)?;
        Ok(Some(lock_file))
    }

    fn read_store(&self) -> Result<HierarchyStore> {
        let file = File::open(&self.file_path)
            .with_context(|| format!("Failed to open file: {:?}", self.file_path))?;
        let reader = BufReader::new(file);

        let mut store: HierarchyStore = serde_yaml::from_reader(reader)
            .with_context(|| format!("Failed to parse YAML from {:?}", self.file_path))?;

        // Hand-edited files may carry un-normalized names
        store.normalize_names();
        Ok(store)
    }

    fn write_store(&self, store: &HierarchyStore) -> Result<()> {
        let yaml = serde_yaml::to_string(store)?;
        fs::write(&self.file_path, yaml)
            .with_context(|| format!("Failed to write {:?}", self.file_path))?;
        Ok(())
    }

    /// Loads the hierarchy, creating an empty workspace if the file is missing
    pub fn load(&self) -> Result<HierarchyStore> {
        if !self.file_path.exists() {
            log::info!("creating empty workspace at {:?}", self.file_path);
            let store = HierarchyStore::new();
            self.save(&store)?;
            return Ok(store);
        }

        let _lock = self.acquire_read_lock()?;
        let store = self.read_store()?;
        log::info!(
            "loaded {} ultimate targets from {:?}",
            store.targets.len(),
            self.file_path
        );
        Ok(store)
    }

    /// Saves the hierarchy to the YAML file
    pub fn save(&self, store: &HierarchyStore) -> Result<()> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Lock is released when the handle is dropped
        let _lock = self.acquire_write_lock()?;
        self.write_store(store)?;
        log::info!("saved workspace to {:?}", self.file_path);
        Ok(())
    }

    /// Reloads from disk, applies `update_fn` and saves, all under one
    /// exclusive lock. The closure's error aborts the save.
    pub fn update_atomically<F, T>(&self, update_fn: F) -> Result<(HierarchyStore, T)>
    where
        F: FnOnce(&mut HierarchyStore) -> Result<T>,
    {
        if !self.file_path.exists() {
            self.save(&HierarchyStore::new())?;
        }

        let _lock = self.acquire_write_lock()?;
        let mut store = self.read_store()?;
        let value = update_fn(&mut store)?;
        self.write_store(&store)?;
        Ok((store, value))
    }
}
