// ABOUTME: known_hosts line parser producing structured host entries and indexed collections
// ABOUTME: Tolerates comments, blank lines, multi-address lists and hashed hosts; never fails on one bad line

use crate::config::default_known_hosts_path;
use crate::ssh::collection::Collection;
use crate::ssh::error::{HostsError, Result};
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use tracing::debug;

const HASHED_MARKER: char = '|';

/// One parsed known_hosts line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostEntry {
    pub addresses: Vec<String>,
    pub key_type: String,
    pub key: String,
    pub comment: String,
    pub is_hashed: bool,
    pub hash_value: Option<String>,
    pub line_number: usize, // 1-based position in the source file
}

impl HostEntry {
    /// Name to show for this entry: the hash for hashed hosts, otherwise the first address.
    pub fn display_address(&self) -> &str {
        match &self.hash_value {
            Some(hash) if self.is_hashed => hash.as_str(),
            _ => self.addresses.first().map(String::as_str).unwrap_or_default(),
        }
    }

    /// Fingerprint used to avoid writing the same key twice across known_hosts and stash files.
    ///
    /// Entries missing an address field, key type or key material have no identity and are
    /// never treated as duplicates.
    pub fn identity_key(&self) -> Option<String> {
        let mut address_field = self.addresses.join(",");
        if address_field.is_empty() && self.is_hashed {
            address_field = self.hash_value.clone().unwrap_or_default();
        }

        if address_field.is_empty() || self.key_type.is_empty() || self.key.is_empty() {
            return None;
        }

        Some(format!("{} {} {}", address_field, self.key_type, self.key))
    }
}

/// Formats the entry as a single known_hosts line (no trailing newline).
impl fmt::Display for HostEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.addresses.join(","), self.key_type, self.key)?;
        if !self.comment.is_empty() {
            write!(f, " {}", self.comment)?;
        }
        Ok(())
    }
}

/// Parses one raw line. Returns `None` for blank lines, comments and lines too short to be a record.
pub fn parse_line(raw: &str, line_number: usize) -> Option<HostEntry> {
    let line = raw.trim();

    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 3 {
        return None;
    }

    let addresses: Vec<String> = fields[0]
        .split(',')
        .map(str::trim)
        .filter(|address| !address.is_empty())
        .map(str::to_string)
        .collect();

    let first = addresses.first()?;
    let is_hashed = first.starts_with(HASHED_MARKER);
    let hash_value = is_hashed.then(|| first.clone());

    Some(HostEntry {
        key_type: fields[1].to_string(),
        key: fields[2].to_string(),
        comment: fields[3..].join(" "),
        is_hashed,
        hash_value,
        line_number,
        addresses,
    })
}

/// Parses a known_hosts file into a collection bound to that file.
///
/// An empty path falls back to the default known_hosts location. Individual malformed lines
/// are skipped; failing to open or read the file fails the whole call.
pub fn parse_known_hosts(path: &Path) -> Result<Collection> {
    let path = if path.as_os_str().is_empty() {
        default_known_hosts_path()
    } else {
        path.to_path_buf()
    };

    let file = File::open(&path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => HostsError::FileNotFound(path.clone()),
        _ => HostsError::io("open", &path, e),
    })?;

    let mut collection = Collection::new(&path);
    let mut skipped = 0;

    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line_number = i + 1;
        let line = line.map_err(|source| HostsError::Parse {
            path: path.clone(),
            line: line_number,
            source,
        })?;

        match parse_line(&line, line_number) {
            Some(entry) => {
                collection.add(entry);
            }
            None if is_record_candidate(&line) => skipped += 1,
            None => {}
        }
    }

    debug!(
        "Parsed {} entries under {} addresses from {} ({} malformed lines skipped)",
        collection.len(),
        collection.all_addresses().len(),
        path.display(),
        skipped
    );

    Ok(collection)
}

/// Parses in-memory content as if it had been read from `path`.
#[cfg(test)]
pub fn parse_known_hosts_content(content: &str, path: &Path) -> Collection {
    let mut collection = Collection::new(path);
    for (i, line) in content.lines().enumerate() {
        if let Some(entry) = parse_line(line, i + 1) {
            collection.add(entry);
        }
    }
    collection
}

fn is_record_candidate(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && !line.starts_with('#')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_line_multi_address() {
        let entry = parse_line(
            "example.com,192.168.1.1 ssh-rsa AAAAB3NzaC1yc2EA... comment here",
            7,
        )
        .unwrap();

        assert_eq!(entry.addresses, vec!["example.com", "192.168.1.1"]);
        assert_eq!(entry.key_type, "ssh-rsa");
        assert_eq!(entry.key, "AAAAB3NzaC1yc2EA...");
        assert_eq!(entry.comment, "comment here");
        assert_eq!(entry.line_number, 7);
        assert!(!entry.is_hashed);
        assert!(entry.hash_value.is_none());
    }

    #[test]
    fn test_parse_line_hashed() {
        let entry = parse_line("|1|abc123base64|def456base64= ssh-ed25519 AAAAC3...", 1).unwrap();

        assert!(entry.is_hashed);
        assert_eq!(entry.hash_value.as_deref(), Some("|1|abc123base64|def456base64="));
        assert_eq!(entry.addresses, vec!["|1|abc123base64|def456base64="]);
        assert_eq!(entry.display_address(), "|1|abc123base64|def456base64=");
        assert!(entry.comment.is_empty());
    }

    #[test]
    fn test_parse_line_skips_comments_blanks_and_short_lines() {
        assert!(parse_line("", 1).is_none());
        assert!(parse_line("    ", 1).is_none());
        assert!(parse_line("# a comment", 1).is_none());
        assert!(parse_line("   # indented comment", 1).is_none());
        assert!(parse_line("host.only ssh-rsa", 1).is_none());
        assert!(parse_line(",,, ssh-rsa AAAA", 1).is_none());
    }

    #[test]
    fn test_parse_line_drops_empty_address_tokens() {
        let entry = parse_line("a.example,,b.example, ssh-ed25519 AAAA", 1).unwrap();
        assert_eq!(entry.addresses, vec!["a.example", "b.example"]);
    }

    #[test]
    fn test_parse_line_collapses_comment_whitespace() {
        let entry = parse_line("host\tssh-rsa   AAAA   made  by\tops", 1).unwrap();
        assert_eq!(entry.comment, "made by ops");
        assert_eq!(entry.to_string(), "host ssh-rsa AAAA made by ops");
    }

    #[test]
    fn test_identity_key() {
        let entry = parse_line("a,b ssh-rsa KEY trailing comment", 1).unwrap();
        assert_eq!(entry.identity_key().as_deref(), Some("a,b ssh-rsa KEY"));

        let mut no_key = entry.clone();
        no_key.key.clear();
        assert!(no_key.identity_key().is_none());

        let mut hashed = parse_line("|1|x|y= ssh-rsa KEY", 1).unwrap();
        hashed.addresses.clear();
        assert_eq!(hashed.identity_key().as_deref(), Some("|1|x|y= ssh-rsa KEY"));
    }

    #[test]
    fn test_parse_known_hosts_tracks_physical_line_numbers() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("known_hosts");
        fs::write(
            &path,
            "# header\n\nexample.com ssh-rsa AAAA\nbroken line\nserver.local,10.0.0.1 ssh-ed25519 BBBB\n",
        )
        .unwrap();

        let collection = parse_known_hosts(&path).unwrap();

        assert_eq!(collection.path(), path.as_path());
        assert_eq!(collection.hosts_for_address("example.com")[0].line_number, 3);
        assert_eq!(collection.hosts_for_address("10.0.0.1")[0].line_number, 5);
        assert_eq!(
            collection.all_addresses(),
            vec!["10.0.0.1", "example.com", "server.local"]
        );
    }

    #[test]
    fn test_parse_known_hosts_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nope");

        let err = parse_known_hosts(&path).unwrap_err();
        assert!(matches!(err, HostsError::FileNotFound(_)));
    }

    #[test]
    fn test_parse_known_hosts_invalid_utf8_is_parse_failure() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("known_hosts");
        fs::write(&path, b"good ssh-rsa AAAA\n\xff\xfe bad ssh-rsa BBBB\n").unwrap();

        let err = parse_known_hosts(&path).unwrap_err();
        assert!(matches!(err, HostsError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_parse_known_hosts_content() {
        let content = "example.com ssh-rsa AAAA\nexample.com ssh-ed25519 BBBB\n";
        let collection = parse_known_hosts_content(content, Path::new("known_hosts"));

        let hosts = collection.hosts_for_address("example.com");
        assert_eq!(hosts.len(), 2);
        assert_eq!(hosts[0].key_type, "ssh-rsa");
        assert_eq!(hosts[1].key_type, "ssh-ed25519");
    }
}
