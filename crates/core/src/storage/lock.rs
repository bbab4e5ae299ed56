use anyhow::Context;
use std::fs::{File, OpenOptions, TryLockError};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

// The lock is an OS advisory lock held on `<log>.lock`, so the kernel drops it
// when the holding process exits, however it exits. The file itself is left in
// place; its contents only name the last holder.
const LOCK_SUFFIX: &str = ".lock";

pub fn lock_path_for(history_path: &Path) -> PathBuf {
    let mut name = history_path.as_os_str().to_owned();
    name.push(LOCK_SUFFIX);
    PathBuf::from(name)
}

/// Held for the duration of a run; the lock is released on drop.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    run_id: uuid::Uuid,
    file: File,
}

impl RunLock {
    pub fn run_id(&self) -> uuid::Uuid {
        self.run_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release run lock");
        }
    }
}

/// Returns `None` when another live process already holds the lock. A lock
/// file left behind by a crashed run does not block.
pub fn try_acquire_run_lock(history_path: &Path) -> anyhow::Result<Option<RunLock>> {
    let path = lock_path_for(history_path);
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .with_context(|| format!("failed to open lock file {}", path.display()))?;

    match file.try_lock() {
        Ok(()) => {}
        Err(TryLockError::WouldBlock) => {
            let mut holder = String::new();
            let _ = file.read_to_string(&mut holder);
            tracing::debug!(path = %path.display(), holder = holder.trim(), "run lock busy");
            return Ok(None);
        }
        Err(TryLockError::Error(e)) => {
            return Err(e).with_context(|| format!("failed to lock {}", path.display()))
        }
    }

    let mut previous = String::new();
    let _ = file.read_to_string(&mut previous);
    if !previous.trim().is_empty() {
        tracing::info!(path = %path.display(), previous = previous.trim(), "taking over lock left by an earlier run");
    }

    let run_id = uuid::Uuid::new_v4();
    let stamp = (|| -> std::io::Result<()> {
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        writeln!(file, "{run_id} pid={}", std::process::id())?;
        file.flush()
    })();
    stamp.with_context(|| format!("failed to write lock file {}", path.display()))?;

    Ok(Some(RunLock { path, run_id, file }))
}
