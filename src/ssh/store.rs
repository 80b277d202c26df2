// ABOUTME: File-level side effects for known_hosts collections: append, save with backup, snapshots
// ABOUTME: Every handle is opened and closed within a single call; nothing is held between operations

use crate::ssh::collection::Collection;
use crate::ssh::error::{HostsError, Result};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

pub const HEADER: &str = "# SSH Known Hosts File\n# Managed by khm\n\n";

const BACKUP_SUFFIX: &str = ".backup";

impl Collection {
    /// Saves to the file this collection was parsed from.
    pub fn save(&self) -> Result<()> {
        self.save_as(self.path())
    }

    /// Rewrites `path` with every distinct entry, sorted by address, after copying the current
    /// file to `<path>.backup`.
    ///
    /// A missing source file skips the backup. A failed write leaves a partial file behind;
    /// the backup is the recovery path.
    pub fn save_as(&self, path: &Path) -> Result<()> {
        if path.as_os_str().is_empty() {
            return Err(HostsError::InvalidPath("save path is empty".to_string()));
        }

        backup(path)?;

        let file = File::create(path).map_err(|e| HostsError::io("create", path, e))?;
        let mut writer = BufWriter::new(file);
        let write_err = |e| HostsError::io("write", path, e);

        writer.write_all(HEADER.as_bytes()).map_err(write_err)?;

        let entries = self.distinct_entries();
        for entry in &entries {
            writeln!(writer, "{entry}").map_err(write_err)?;
        }
        writer.flush().map_err(write_err)?;

        info!("Saved {} entries to {}", entries.len(), path.display());
        Ok(())
    }
}

/// Appends lines to `path`, creating it if needed. An empty slice only ensures the file exists.
pub fn append_lines(path: &Path, lines: &[String]) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| HostsError::io("open", path, e))?;

    let mut writer = BufWriter::new(file);
    let append_err = |e| HostsError::io("append to", path, e);
    for line in lines {
        writeln!(writer, "{line}").map_err(append_err)?;
    }
    writer.flush().map_err(append_err)?;

    debug!("Appended {} lines to {}", lines.len(), path.display());
    Ok(())
}

/// Copies `src` to `dst`, replacing `dst`. Fails with `FileNotFound` if `src` does not exist.
pub fn copy_file(src: &Path, dst: &Path) -> Result<u64> {
    match fs::copy(src, dst) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == io::ErrorKind::NotFound && !src.exists() => {
            Err(HostsError::FileNotFound(src.to_path_buf()))
        }
        Err(e) => Err(HostsError::io("copy", src, e)),
    }
}

/// Copies `path` to its rolling `<path>.backup` slot.
///
/// Returns `None` when there is nothing to back up yet; every other failure is an error.
pub fn backup(path: &Path) -> Result<Option<PathBuf>> {
    let backup_path = with_suffix(path, BACKUP_SUFFIX);

    match copy_file(path, &backup_path) {
        Ok(_) => {
            debug!("Backed up {} to {}", path.display(), backup_path.display());
            Ok(Some(backup_path))
        }
        Err(HostsError::FileNotFound(_)) => {
            debug!("No existing {} to back up", path.display());
            Ok(None)
        }
        Err(HostsError::Io { path: src, source, .. }) => Err(HostsError::Io {
            action: "back up",
            path: src,
            source,
        }),
        Err(e) => Err(e),
    }
}

/// Copies `path` to `<path>.backup.<unix-seconds>`.
pub fn timestamped_backup(path: &Path) -> Result<PathBuf> {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();
    let backup_path = with_suffix(path, &format!("{BACKUP_SUFFIX}.{seconds}"));

    copy_file(path, &backup_path)?;
    info!("Created backup {}", backup_path.display());
    Ok(backup_path)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
