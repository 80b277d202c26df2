// ABOUTME: In-memory index over known_hosts entries keyed by every address each entry declares
// ABOUTME: Implements per-address removal, moving entries to other files, and stash/unstash with dedup

use crate::ssh::error::{HostsError, Result};
use crate::ssh::parser::{HostEntry, parse_known_hosts};
use crate::ssh::store::append_lines;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const STASH_FILE_NAME: &str = "stash_hosts";

/// Stable handle to an entry in a collection's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntryId(usize);

/// Index of parsed entries for one file.
///
/// Entries live once in an arena; each address slot stores handles, so an entry declaring
/// several addresses is shared by every slot rather than copied. Removing a handle from one
/// slot leaves the entry reachable through its other addresses.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    entries: Vec<HostEntry>,
    index: BTreeMap<String, Vec<EntryId>>,
    path: PathBuf,
}

/// Counts reported by stash and unstash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StashOutcome {
    pub stash_path: PathBuf,
    pub moved: usize,
    pub duplicates: usize,
}

impl Collection {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            entries: Vec::new(),
            index: BTreeMap::new(),
            path: path.into(),
        }
    }

    /// File this collection was parsed from and saves to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Indexes the entry under each of its addresses. Entries without addresses are ignored.
    pub fn add(&mut self, entry: HostEntry) -> Option<EntryId> {
        if entry.addresses.is_empty() {
            return None;
        }

        let id = EntryId(self.entries.len());
        for address in &entry.addresses {
            self.index.entry(address.clone()).or_default().push(id);
        }
        self.entries.push(entry);

        Some(id)
    }

    pub fn hosts_for_address(&self, address: &str) -> Vec<&HostEntry> {
        self.index
            .get(address)
            .map(|ids| ids.iter().map(|id| &self.entries[id.0]).collect())
            .unwrap_or_default()
    }

    /// Every indexed address, sorted.
    pub fn all_addresses(&self) -> Vec<&str> {
        self.index.keys().map(String::as_str).collect()
    }

    pub fn contains_address(&self, address: &str) -> bool {
        self.index.contains_key(address)
    }

    /// Distinct key types under an address, joined for display.
    pub fn key_types_for_address(&self, address: &str) -> String {
        let mut types: Vec<&str> = Vec::new();
        for host in self.hosts_for_address(address) {
            if !types.contains(&host.key_type.as_str()) {
                types.push(&host.key_type);
            }
        }
        types.join(", ")
    }

    /// Number of distinct entries still reachable through the index.
    pub fn len(&self) -> usize {
        self.index.values().flatten().collect::<HashSet<_>>().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Reachable entries, each once, ordered by sorted address then slot order.
    pub fn distinct_entries(&self) -> Vec<&HostEntry> {
        let mut seen = HashSet::new();
        self.index
            .values()
            .flatten()
            .filter(|id| seen.insert(**id))
            .map(|id| &self.entries[id.0])
            .collect()
    }

    /// Removes one entry handle from an address slot, dropping the slot when it empties.
    pub fn remove_at(&mut self, address: &str, index: usize) -> Result<()> {
        self.checked_id(address, index)?;

        if let Some(slot) = self.index.get_mut(address) {
            slot.remove(index);
            if slot.is_empty() {
                self.index.remove(address);
            }
        }

        debug!("Removed entry {} under {}", index, address);
        Ok(())
    }

    /// Drops an address slot. Entries also declaring other addresses stay indexed under those.
    pub fn remove_all(&mut self, address: &str) -> Result<usize> {
        let ids = self
            .index
            .remove(address)
            .ok_or_else(|| HostsError::AddressNotFound(address.to_string()))?;

        debug!("Removed {} entries under {}", ids.len(), address);
        Ok(ids.len())
    }

    /// Appends one entry to `target`, then removes it from the address slot.
    ///
    /// The index is untouched if the append fails.
    pub fn move_one_to_file(&mut self, address: &str, index: usize, target: &Path) -> Result<()> {
        let id = self.checked_id(address, index)?;
        append_lines(target, &[self.entries[id.0].to_string()])?;

        info!("Moved entry {} of {} to {}", index, address, target.display());
        self.remove_at(address, index)
    }

    /// Appends every distinct entry under an address to `target`, then drops the slot.
    ///
    /// Lines appended before a write failure stay in `target`; the index is only changed
    /// after all lines were written.
    pub fn move_all_to_file(&mut self, address: &str, target: &Path) -> Result<usize> {
        let ids = self.distinct_in_slot(address)?;
        let lines: Vec<String> = ids.iter().map(|id| self.entries[id.0].to_string()).collect();
        append_lines(target, &lines)?;

        self.index.remove(address);
        info!(
            "Moved {} entries for {} to {}",
            lines.len(),
            address,
            target.display()
        );
        Ok(lines.len())
    }

    /// Default stash location: `stash_hosts` beside the collection's file.
    pub fn stash_file_path(&self) -> Option<PathBuf> {
        if self.path.as_os_str().is_empty() {
            return None;
        }
        let dir = self.path.parent().unwrap_or_else(|| Path::new(""));
        Some(dir.join(STASH_FILE_NAME))
    }

    /// Moves an address's entries into the stash file, skipping keys already stashed, then
    /// drops the address and saves this collection to its own file.
    pub fn stash(&mut self, address: &str, stash_path: Option<&Path>) -> Result<StashOutcome> {
        let ids = self.distinct_in_slot(address)?;
        let stash_path = self.resolve_stash_path(stash_path)?;

        append_lines(&stash_path, &[])?;
        let stash = parse_known_hosts(&stash_path)?;
        let mut existing = stash.identity_keys();

        let mut lines = Vec::new();
        let mut duplicates = 0;
        for id in ids {
            let entry = &self.entries[id.0];
            if let Some(key) = entry.identity_key() {
                if !existing.insert(key) {
                    debug!("Skipping {} ({}): already stashed", address, entry.key_type);
                    duplicates += 1;
                    continue;
                }
            }
            lines.push(entry.to_string());
        }

        append_lines(&stash_path, &lines)?;
        self.index.remove(address);
        self.save()?;

        info!(
            "Stashed {} entries for {} to {} ({} already present)",
            lines.len(),
            address,
            stash_path.display(),
            duplicates
        );
        Ok(StashOutcome {
            stash_path,
            moved: lines.len(),
            duplicates,
        })
    }

    /// Restores an address from the default stash file.
    pub fn unstash(&mut self, address: &str) -> Result<StashOutcome> {
        self.unstash_from(address, None)
    }

    /// Restores an address's stashed entries into the known_hosts file.
    ///
    /// The primary file is re-read from disk, stashed entries not already present are merged in,
    /// both files are saved, and this collection is replaced by the merged result. The two saves
    /// are independent: if the second fails the first has already taken effect.
    pub fn unstash_from(&mut self, address: &str, stash_path: Option<&Path>) -> Result<StashOutcome> {
        let stash_path = self.resolve_stash_path(stash_path)?;
        if !stash_path.exists() {
            return Err(HostsError::FileNotFound(stash_path));
        }

        let mut primary = parse_known_hosts(&self.path)?;
        let mut stash = parse_known_hosts(&stash_path)?;

        let stashed = stash
            .distinct_in_slot(address)
            .map_err(|_| HostsError::NothingStashed(address.to_string()))?;

        let mut existing: HashSet<String> = primary
            .hosts_for_address(address)
            .iter()
            .filter_map(|host| host.identity_key())
            .collect();

        let mut moved = 0;
        let mut duplicates = 0;
        for id in stashed {
            let entry = stash.entries[id.0].clone();
            if let Some(key) = entry.identity_key() {
                if !existing.insert(key) {
                    debug!("Skipping {} ({}): already in known_hosts", address, entry.key_type);
                    duplicates += 1;
                    continue;
                }
            }
            primary.add(entry);
            moved += 1;
        }

        stash.index.remove(address);

        primary.save()?;
        stash.save()?;
        *self = primary;

        info!(
            "Unstashed {} entries for {} from {} ({} already present)",
            moved,
            address,
            stash_path.display(),
            duplicates
        );
        Ok(StashOutcome {
            stash_path,
            moved,
            duplicates,
        })
    }

    fn resolve_stash_path(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        match explicit {
            Some(path) if !path.as_os_str().is_empty() => Ok(path.to_path_buf()),
            _ => self
                .stash_file_path()
                .ok_or_else(|| HostsError::InvalidPath("stash path not available".to_string())),
        }
    }

    fn identity_keys(&self) -> HashSet<String> {
        self.distinct_entries()
            .into_iter()
            .filter_map(HostEntry::identity_key)
            .collect()
    }

    fn checked_id(&self, address: &str, index: usize) -> Result<EntryId> {
        let slot = self
            .index
            .get(address)
            .ok_or_else(|| HostsError::AddressNotFound(address.to_string()))?;

        slot.get(index)
            .copied()
            .ok_or_else(|| HostsError::IndexOutOfRange {
                address: address.to_string(),
                index,
                len: slot.len(),
            })
    }

    /// Handles under an address with repeats removed, in slot order.
    fn distinct_in_slot(&self, address: &str) -> Result<Vec<EntryId>> {
        let slot = self
            .index
            .get(address)
            .filter(|slot| !slot.is_empty())
            .ok_or_else(|| HostsError::AddressNotFound(address.to_string()))?;

        let mut seen = HashSet::new();
        Ok(slot.iter().copied().filter(|id| seen.insert(*id)).collect())
    }
}
