//! Atomic filesystem primitives shared by every component.
//!
//! This generalizes the blob-write/CAS-ref pattern the coordination layer's
//! ancestor used for git-backed storage (write, then compare-and-swap a
//! ref) to plain files: here the single-writer primitive is an
//! exclusively-created lock file rather than a git ref, so there is no CAS
//! step — just write-to-sibling-`.tmp`-then-rename, and a lock acquired with
//! `O_CREAT|O_EXCL` that the caller holds for the duration of a critical
//! section.

use std::fs::{self, File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

/// Write `contents` to `path` atomically: write to a sibling `.tmp` file,
/// `fsync`, then rename over the destination. The rename is atomic on POSIX
/// filesystems, so readers never observe a partial write.
///
/// # Errors
/// Returns an I/O error if the parent directory cannot be created, the
/// temporary file cannot be written, or the rename fails.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    let tmp_path = sibling_tmp_path(path);
    {
        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(contents)?;
        tmp.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn sibling_tmp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map_or_else(|| "tmp".to_owned(), |n| n.to_string_lossy().into_owned());
    path.with_file_name(format!(".{file_name}.tmp"))
}

/// Create `path` exclusively (fails if it already exists) and write
/// `contents`. Used for append-only queue entries: check-ins, orders,
/// decisions, refactor drafts.
///
/// Unlike [`write_atomic`], this does not use a temp-file rename, because
/// the existence check itself must be atomic with the write — `O_EXCL`
/// guarantees no other process can have created the file between the check
/// and the write.
///
/// # Errors
/// Returns [`std::io::ErrorKind::AlreadyExists`] if `path` exists. Returns
/// other I/O errors if the parent directory cannot be created or the write
/// fails.
pub fn create_exclusive(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    Ok(())
}

/// Move `src` to `dest`, but if `dest` already exists, retry at
/// `<stem>-001.<ext>`, `<stem>-002.<ext>`, … up to 999, never overwriting an
/// existing file. Used by the Collector and Approval pipeline when archiving.
///
/// # Errors
/// Returns an I/O error if the rename fails for a reason other than
/// `AlreadyExists`, or if all 999 suffixes are already taken.
pub fn rename_with_collision_suffix(src: &Path, dest: &Path) -> std::io::Result<PathBuf> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    // `rename(2)` atomically replaces an existing destination rather than
    // failing, so the existence check must happen first — this is safe
    // under the single-writer invariant the Collector and Approval
    // pipeline both rely on.
    if !dest.exists() {
        fs::rename(src, dest)?;
        return Ok(dest.to_owned());
    }

    let stem = dest
        .file_stem()
        .map_or_else(String::new, |s| s.to_string_lossy().into_owned());
    let ext = dest.extension().map(|e| e.to_string_lossy().into_owned());
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));

    for n in 1..=999u32 {
        let candidate_name = ext.as_ref().map_or_else(
            || format!("{stem}-{n:03}"),
            |ext| format!("{stem}-{n:03}.{ext}"),
        );
        let candidate = dir.join(candidate_name);
        if candidate.exists() {
            continue;
        }
        match fs::rename(src, &candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
    Err(std::io::Error::other(format!(
        "exhausted collision suffixes for {}",
        dest.display()
    )))
}

/// An exclusively-held lock file, released on drop.
///
/// Acquired with `O_CREAT|O_EXCL` semantics (§4.C, §5): if the file already
/// exists, acquisition fails immediately — there is no wait, no retry, and
/// no automatic breaking of stale locks. The caller (the Watcher, for
/// transient contention) is responsible for any retry policy.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    /// Attempt to acquire the lock at `path`, writing `holder_info` as its
    /// contents (e.g. `"pid=1234"`) so a stuck lock can be diagnosed.
    ///
    /// # Errors
    /// Returns [`std::io::ErrorKind::AlreadyExists`] if the lock is already
    /// held. Returns other I/O errors if the parent directory cannot be
    /// created.
    pub fn acquire(path: &Path, holder_info: &str) -> std::io::Result<Self> {
        create_exclusive(path, holder_info.as_bytes())?;
        Ok(Self {
            path: path.to_owned(),
        })
    }

    /// Read the contents of a lock file that is already held, if readable.
    /// Used purely for diagnostics when reporting contention to the caller.
    #[must_use]
    pub fn peek_holder(path: &Path) -> Option<String> {
        fs::read_to_string(path).ok()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
