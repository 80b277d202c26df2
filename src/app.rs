// ABOUTME: Command dispatch for the known_hosts manager, turning user requests into collection operations
// ABOUTME: Each message loads the file, applies one operation, persists if needed, and returns output lines

use crate::config::Config;
use crate::fuzzy::SearchEngine;
use crate::ssh::store::timestamped_backup;
use crate::ssh::{Collection, HostEntry, HostsError, parse_known_hosts};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Config,
    pub known_hosts_path: PathBuf,
    pub stash_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    List,
    ListStash,
    Show { address: String },
    Find { query: String },
    Delete { address: String },
    // Positions are 1-based, as printed by List and Show
    Remove { address: String, position: usize },
    Move {
        address: String,
        target: PathBuf,
        position: Option<usize>,
    },
    Stash { address: String },
    Unstash { address: String },
    Backup,
    Export { path: PathBuf },
}

impl AppState {
    pub fn new(config: Config, known_hosts_path: PathBuf, stash_path: Option<PathBuf>) -> Self {
        Self {
            config,
            known_hosts_path,
            stash_path,
        }
    }

    pub fn update(&mut self, message: Message) -> Result<Vec<String>> {
        match message {
            Message::List => {
                let collection = self.load()?;
                Ok(self.render_list("SSH Known Hosts:", &collection))
            }

            Message::ListStash => {
                let stash_path = self.stash_file()?;
                let collection = parse_known_hosts(&stash_path)
                    .with_context(|| format!("Failed to read stash {}", stash_path.display()))?;
                Ok(self.render_list("Stashed Hosts:", &collection))
            }

            Message::Show { address } => {
                let collection = self.load()?;
                if !collection.contains_address(&address) {
                    return Err(HostsError::AddressNotFound(address).into());
                }
                Ok(render_details(&address, &collection.hosts_for_address(&address)))
            }

            Message::Find { query } => {
                let collection = self.load()?;
                let engine = SearchEngine::new(collection.all_addresses());
                let matches = engine.search(
                    &query,
                    self.config.search.case_sensitive,
                    self.config.search.max_results,
                );
                if matches.is_empty() {
                    return Ok(vec![format!("No hosts match '{query}'")]);
                }
                Ok(matches
                    .into_iter()
                    .map(|address| {
                        format!("{} ({})", address, collection.key_types_for_address(address))
                    })
                    .collect())
            }

            Message::Delete { address } => {
                let mut collection = self.load()?;
                let removed = collection
                    .remove_all(&address)
                    .with_context(|| format!("Failed to delete host {address}"))?;
                collection
                    .save()
                    .context("Failed to save known_hosts after delete")?;
                Ok(vec![format!("Deleted {removed} key(s) for {address}")])
            }

            Message::Remove { address, position } => {
                let index = to_index(position)?;
                let mut collection = self.load()?;
                collection
                    .remove_at(&address, index)
                    .with_context(|| format!("Failed to remove key {position} of {address}"))?;
                collection
                    .save()
                    .context("Failed to save known_hosts after remove")?;
                Ok(vec![format!("Removed key {position} of {address}")])
            }

            Message::Move {
                address,
                target,
                position,
            } => {
                let mut collection = self.load()?;
                let moved = match position {
                    Some(position) => {
                        collection
                            .move_one_to_file(&address, to_index(position)?, &target)
                            .with_context(|| format!("Failed to move key {position} of {address}"))?;
                        1
                    }
                    None => collection
                        .move_all_to_file(&address, &target)
                        .with_context(|| format!("Failed to move keys for {address}"))?,
                };
                collection
                    .save()
                    .context("Failed to save known_hosts after move")?;
                Ok(vec![format!(
                    "Moved {moved} key(s) for {address} to {}",
                    target.display()
                )])
            }

            Message::Stash { address } => {
                let mut collection = self.load()?;
                let outcome = collection
                    .stash(&address, self.stash_path.as_deref())
                    .with_context(|| format!("Failed to stash host {address}"))?;
                Ok(vec![format!(
                    "Stashed {} key(s) for {} to {} ({} already stashed)",
                    outcome.moved,
                    address,
                    outcome.stash_path.display(),
                    outcome.duplicates
                )])
            }

            Message::Unstash { address } => {
                let mut collection = Collection::new(&self.known_hosts_path);
                let outcome = match &self.stash_path {
                    Some(stash_path) => collection.unstash_from(&address, Some(stash_path.as_path())),
                    None => collection.unstash(&address),
                }
                .with_context(|| format!("Failed to unstash host {address}"))?;
                Ok(vec![format!(
                    "Restored {} key(s) for {} from {} ({} already present)",
                    outcome.moved,
                    address,
                    outcome.stash_path.display(),
                    outcome.duplicates
                )])
            }

            Message::Backup => {
                let backup_path = timestamped_backup(&self.known_hosts_path)
                    .context("Failed to create backup")?;
                Ok(vec![format!("Backup created: {}", backup_path.display())])
            }

            Message::Export { path } => {
                let collection = self.load()?;
                collection
                    .save_as(&path)
                    .with_context(|| format!("Failed to export to {}", path.display()))?;
                Ok(vec![format!(
                    "Exported {} entries to {}",
                    collection.len(),
                    path.display()
                )])
            }
        }
    }

    /// Parses the known_hosts file; a missing file is an empty collection bound to its path.
    fn load(&self) -> Result<Collection> {
        load_or_empty(&self.known_hosts_path)
            .with_context(|| format!("Failed to parse {}", self.known_hosts_path.display()))
    }

    /// Configured or explicit stash file, else `stash_hosts` beside known_hosts.
    fn stash_file(&self) -> Result<PathBuf, HostsError> {
        match &self.stash_path {
            Some(path) => Ok(path.clone()),
            None => Collection::new(&self.known_hosts_path)
                .stash_file_path()
                .ok_or_else(|| HostsError::InvalidPath("stash path not available".to_string())),
        }
    }

    fn render_list(&self, title: &str, collection: &Collection) -> Vec<String> {
        let mut lines = vec![title.to_string(), "=".repeat(title.len())];
        if collection.is_empty() {
            lines.push(format!("No entries in {}", collection.path().display()));
            return lines;
        }

        for address in collection.all_addresses() {
            for (i, host) in collection.hosts_for_address(address).iter().enumerate() {
                lines.push(format!("{}. {} ({})", i + 1, host.display_address(), host.key_type));
                if self.config.display.show_comments && !host.comment.is_empty() {
                    lines.push(format!("   Comment: {}", host.comment));
                }
            }
            lines.push(String::new());
        }

        lines
    }
}

fn load_or_empty(path: &Path) -> Result<Collection, HostsError> {
    match parse_known_hosts(path) {
        Err(HostsError::FileNotFound(_)) => {
            tracing::debug!("{} does not exist yet, starting empty", path.display());
            Ok(Collection::new(path))
        }
        result => result,
    }
}

fn render_details(address: &str, hosts: &[&HostEntry]) -> Vec<String> {
    let mut lines = vec![format!("{address}:")];
    for (i, host) in hosts.iter().enumerate() {
        lines.push(format!("{}. {} ({})", i + 1, host.display_address(), host.key_type));
        if !host.is_hashed {
            lines.push(format!("   Addresses: {}", host.addresses.join(", ")));
        }
        lines.push(format!("   Key: {}", host.key));
        if !host.comment.is_empty() {
            lines.push(format!("   Comment: {}", host.comment));
        }
        lines.push(format!("   Line: {}", host.line_number));
    }
    lines
}

fn to_index(position: usize) -> Result<usize> {
    position
        .checked_sub(1)
        .context("Key positions start at 1")
}
