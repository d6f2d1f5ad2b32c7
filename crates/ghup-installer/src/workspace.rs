use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use tracing::{debug, warn};

use crate::fs_utils::remove_dir_if_exists;

/// Process-wide record of the workspace that must be removed before exit.
///
/// Shared between the install executor and the interrupt handler. Whoever
/// takes the armed path first performs the removal; every later release is a
/// no-op, so the removal happens exactly once per armed workspace.
#[derive(Debug, Clone, Default)]
pub struct CleanupSlot {
    state: Arc<Mutex<SlotState>>,
    releases: Arc<AtomicUsize>,
}

#[derive(Debug, Default)]
struct SlotState {
    armed: Option<PathBuf>,
    closed: bool,
    leaked: Vec<PathBuf>,
}

impl CleanupSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_armed(&self) -> bool {
        self.lock().armed.is_some()
    }

    pub fn armed_path(&self) -> Option<PathBuf> {
        self.lock().armed.clone()
    }

    /// Number of workspaces released through this slot.
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Released workspaces whose directory could not be removed.
    pub fn leaked_workspaces(&self) -> Vec<PathBuf> {
        self.lock().leaked.clone()
    }

    /// Releases whatever is armed. Safe to call at any time, including when
    /// nothing was ever armed; returns whether a workspace was released.
    pub fn release_now(&self) -> bool {
        let taken = self.lock().armed.take();
        self.finish_release(taken)
    }

    /// Like `release_now`, but also refuses every later workspace. Used on
    /// the way out of the process.
    pub fn shutdown(&self) -> bool {
        let taken = {
            let mut state = self.lock();
            state.closed = true;
            state.armed.take()
        };
        self.finish_release(taken)
    }

    /// Creates `dir` and arms it under one lock, so a concurrent release
    /// sees either nothing or a directory that already exists.
    fn arm_new_dir(&self, parent: &Path, dir: &Path) -> Result<()> {
        let mut state = self.lock();
        if state.closed {
            return Err(anyhow!(
                "install workspace refused after shutdown: {}",
                dir.display()
            ));
        }
        if let Some(existing) = state.armed.as_ref() {
            return Err(anyhow!(
                "another install workspace is still active: {}",
                existing.display()
            ));
        }
        fs::create_dir_all(parent)
            .and_then(|_| fs::create_dir(dir))
            .with_context(|| format!("failed to create install workspace: {}", dir.display()))?;
        state.armed = Some(dir.to_path_buf());
        Ok(())
    }

    fn release_path(&self, path: &Path) -> bool {
        let taken = {
            let mut state = self.lock();
            match state.armed.as_deref() {
                Some(current) if current == path => state.armed.take(),
                _ => None,
            }
        };
        self.finish_release(taken)
    }

    fn finish_release(&self, taken: Option<PathBuf>) -> bool {
        let Some(path) = taken else {
            return false;
        };
        if !remove_workspace_dir(&path) {
            self.lock().leaked.push(path);
        }
        self.releases.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Scratch directory owning one install attempt's downloads. Removed when
/// released, when dropped, or by the interrupt handler through the slot.
#[derive(Debug)]
pub struct Workspace {
    dir: PathBuf,
    slot: CleanupSlot,
}

impl Workspace {
    pub fn acquire(parent: &Path, slot: &CleanupSlot) -> Result<Self> {
        let dir = parent.join(format!(
            "ghup-install-{}-{}",
            std::process::id(),
            unique_suffix()?
        ));

        slot.arm_new_dir(parent, &dir)?;
        debug!(path = %dir.display(), "acquired install workspace");
        Ok(Self {
            dir,
            slot: slot.clone(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn release(self) {
        drop(self);
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.slot.release_path(&self.dir);
    }
}

fn remove_workspace_dir(path: &Path) -> bool {
    match remove_dir_if_exists(path) {
        Ok(_) => {
            debug!(path = %path.display(), "released install workspace");
            true
        }
        Err(err) => {
            warn!(path = %path.display(), %err, "failed to remove install workspace");
            false
        }
    }
}

fn unique_suffix() -> Result<u128> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock is before unix epoch")?
        .as_nanos())
}
