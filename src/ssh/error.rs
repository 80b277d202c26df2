// ABOUTME: Error type shared by the known_hosts parser, collection and persistence layer
// ABOUTME: Groups every failure into one of four kinds so callers can react without string matching

use std::io;
use std::path::PathBuf;

/// Broad classification of a [`HostsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidPath,
    Io,
    Parse,
}

/// Errors produced by known_hosts operations.
#[derive(Debug, thiserror::Error)]
pub enum HostsError {
    /// No index slot exists for the address.
    #[error("host not found: {0}")]
    AddressNotFound(String),

    /// The address exists but the entry index is outside its slot.
    #[error("host not found: {address} has {len} entries, index {index} is out of range")]
    IndexOutOfRange {
        address: String,
        index: usize,
        len: usize,
    },

    /// A file that must already exist is missing.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The stash file holds nothing for the address.
    #[error("no stashed entries for {0}")]
    NothingStashed(String),

    /// A target path is empty or could not be derived.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Opening, writing, copying or flushing a file failed.
    #[error("failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file opened but could not be read through to the end.
    #[error("failed to read {} at line {line}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: io::Error,
    },
}

impl HostsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HostsError::AddressNotFound(_)
            | HostsError::IndexOutOfRange { .. }
            | HostsError::FileNotFound(_)
            | HostsError::NothingStashed(_) => ErrorKind::NotFound,
            HostsError::InvalidPath(_) => ErrorKind::InvalidPath,
            HostsError::Io { .. } => ErrorKind::Io,
            HostsError::Parse { .. } => ErrorKind::Parse,
        }
    }

    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        HostsError::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, HostsError>;
