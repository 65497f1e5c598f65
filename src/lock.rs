//! File locking and atomic writes for board documents
//!
//! The file backend reads and rewrites a single JSON document. Writers take
//! an advisory lock on `<board>.lock` (fs2/flock) and replace the document
//! with a temp-file-plus-rename so readers never observe a torn write.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::{Error, Result};

/// Default lock timeout in milliseconds
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5000;

const LOCK_RETRY_INTERVAL_MS: u64 = 25;

fn is_lock_contended(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        return true;
    }

    // Windows reports sharing/lock violations as raw OS errors 32/33.
    #[cfg(windows)]
    {
        matches!(err.raw_os_error(), Some(32) | Some(33))
    }
    #[cfg(not(windows))]
    {
        false
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?)
}

/// Path of the lock file guarding `path`
pub fn lock_path_for(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.lock", path.display()))
}

/// Exclusive advisory lock, released on drop
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Acquire the lock, retrying until `timeout_ms` elapses
    pub fn acquire(path: impl AsRef<Path>, timeout_ms: u64) -> Result<Self> {
        let path = path.as_ref();
        let file = open_lock_file(path)?;

        let start = Instant::now();
        let timeout = Duration::from_millis(timeout_ms);
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    return Ok(FileLock {
                        file,
                        path: path.to_path_buf(),
                    })
                }
                Err(e) if is_lock_contended(&e) => {
                    if start.elapsed() >= timeout {
                        return Err(Error::LockFailed(path.to_path_buf()));
                    }
                    std::thread::sleep(Duration::from_millis(LOCK_RETRY_INTERVAL_MS));
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }

    /// Try once. `Ok(None)` means another holder has it.
    pub fn try_acquire(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        let file = open_lock_file(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(FileLock {
                file,
                path: path.to_path_buf(),
            })),
            Err(e) if is_lock_contended(&e) => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Replace `path` with `data` via a sibling temp file and rename.
///
/// Does not lock; callers coordinating with other processes hold a
/// [`FileLock`] around it.
pub fn write_atomic(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let temp_path = path.with_extension(format!(
        "{}.tmp.{}",
        path.extension().and_then(|e| e.to_str()).unwrap_or(""),
        std::process::id()
    ));

    let mut temp_file = File::create(&temp_path)?;
    temp_file.write_all(data)?;
    temp_file.sync_all()?;
    drop(temp_file);

    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Read `path` as UTF-8 while holding its lock. Missing files read as `None`.
pub fn read_locked(path: impl AsRef<Path>, timeout_ms: u64) -> Result<Option<String>> {
    let path = path.as_ref();
    let _lock = FileLock::acquire(lock_path_for(path), timeout_ms)?;
    read_optional(path)
}

/// Read-modify-write `path` under its lock.
///
/// `update` receives the current contents (`None` if the file does not
/// exist) and returns the replacement. Nothing is written if it fails.
pub fn update_locked<F>(path: impl AsRef<Path>, timeout_ms: u64, update: F) -> Result<()>
where
    F: FnOnce(Option<String>) -> Result<String>,
{
    let path = path.as_ref();
    let _lock = FileLock::acquire(lock_path_for(path), timeout_ms)?;
    let current = read_optional(path)?;
    let next = update(current)?;
    write_atomic(path, next.as_bytes())
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read(path) {
        Ok(bytes) => String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| Error::OperationFailed(format!("Invalid UTF-8 in {}: {e}", path.display()))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn lock_is_exclusive_until_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("board.json.lock");

        let lock = FileLock::acquire(&lock_path, 1000).unwrap();
        assert_eq!(lock.path(), lock_path.as_path());
        assert!(FileLock::try_acquire(&lock_path).unwrap().is_none());

        drop(lock);
        assert!(FileLock::try_acquire(&lock_path).unwrap().is_some());
    }

    #[test]
    fn timeout_returns_lock_failed() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("board.json.lock");

        let _held = FileLock::acquire(&lock_path, 1000).unwrap();
        let result = FileLock::acquire(&lock_path, 50);
        assert!(matches!(result, Err(Error::LockFailed(_))));
    }

    #[test]
    fn read_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.json");
        assert!(read_locked(&path, 1000).unwrap().is_none());
    }

    #[test]
    fn failed_update_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.json");
        write_atomic(&path, b"{\"v\":1}").unwrap();

        let result = update_locked(&path, 1000, |_| {
            Err(Error::PersistFailed("rejected".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(read_locked(&path, 1000).unwrap().as_deref(), Some("{\"v\":1}"));
    }

    #[test]
    fn concurrent_updates_are_serialized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counter.txt");
        write_atomic(&path, b"0").unwrap();

        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let mut handles = Vec::with_capacity(threads);
        for _ in 0..threads {
            let barrier = Arc::clone(&barrier);
            let path = path.clone();
            handles.push(thread::spawn(move || {
                barrier.wait();
                update_locked(&path, 5000, |current| {
                    let value: u32 = current.unwrap_or_default().trim().parse().unwrap_or(0);
                    Ok((value + 1).to_string())
                })
                .unwrap();
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(read_locked(&path, 1000).unwrap().as_deref(), Some("8"));
    }
}
