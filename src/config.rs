// ABOUTME: Configuration structures and parsing for known_hosts locations, search and display settings
// ABOUTME: Resolves the primary and stash file paths from flags, environment and config file

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the known_hosts location.
pub const KNOWN_HOSTS_ENV: &str = "SSH_KNOWN_HOSTS";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Config {
    pub files: FilesConfig,
    pub search: SearchConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct FilesConfig {
    pub known_hosts_path: String,
    // Empty means stash_hosts next to the known_hosts file
    #[serde(default)]
    pub stash_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SearchConfig {
    pub max_results: usize,
    pub case_sensitive: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DisplayConfig {
    #[serde(default = "default_show_comments")]
    pub show_comments: bool,
}

fn default_show_comments() -> bool {
    true
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            show_comments: default_show_comments(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            files: FilesConfig {
                known_hosts_path: "~/.ssh/known_hosts".to_string(),
                stash_path: String::new(),
            },
            search: SearchConfig {
                max_results: 20,
                case_sensitive: false,
            },
            display: DisplayConfig::default(),
        }
    }
}

impl Config {
    pub fn default_config_content() -> &'static str {
        r#"# khm configuration

[files]
# Primary known_hosts file. SSH_KNOWN_HOSTS and --file take precedence.
known_hosts_path = "~/.ssh/known_hosts"
# Stash file. Leave empty to use stash_hosts next to the known_hosts file.
stash_path = ""

[search]
max_results = 20
case_sensitive = false

[display]
# Print entry comments in list output
show_comments = true
"#
    }

    pub fn load_from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse configuration")
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
        Self::load_from_str(&content)
    }

    /// Loads `path`, or the default location when `None`. A missing default file yields defaults;
    /// a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => {
                let path = Self::default_config_path()?;
                if path.exists() {
                    Self::load_from_file(&path)?
                } else {
                    tracing::debug!("No configuration at {}, using defaults", path.display());
                    Config::default()
                }
            }
        };

        config.expand_path()?;
        config.validate()?;
        Ok(config)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Failed to determine config directory")?;
        Ok(config_dir.join("khm").join("config.toml"))
    }

    pub fn expand_path(&mut self) -> Result<()> {
        self.files.known_hosts_path = expand_tilde(&self.files.known_hosts_path)?;
        self.files.stash_path = expand_tilde(&self.files.stash_path)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.files.known_hosts_path.trim().is_empty() {
            anyhow::bail!("known_hosts_path cannot be empty");
        }

        if self.search.max_results == 0 {
            anyhow::bail!("max_results must be greater than 0");
        }

        Ok(())
    }

    pub fn save_default_config(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, Self::default_config_content())
            .with_context(|| format!("Failed to write default config to: {}", path.display()))?;

        Ok(())
    }

    /// Primary file: explicit flag, then `SSH_KNOWN_HOSTS`, then the configured path.
    pub fn known_hosts_path(&self, explicit: Option<&Path>) -> PathBuf {
        resolve_known_hosts_path(
            explicit,
            env::var(KNOWN_HOSTS_ENV).ok().as_deref(),
            &self.files.known_hosts_path,
        )
    }

    /// Stash file: explicit flag, then the configured path. `None` means derive from known_hosts.
    pub fn stash_path(&self, explicit: Option<&Path>) -> Option<PathBuf> {
        explicit
            .filter(|path| !path.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .or_else(|| {
                let configured = self.files.stash_path.trim();
                (!configured.is_empty()).then(|| PathBuf::from(configured))
            })
    }
}

fn resolve_known_hosts_path(
    explicit: Option<&Path>,
    env_value: Option<&str>,
    configured: &str,
) -> PathBuf {
    if let Some(path) = explicit.filter(|path| !path.as_os_str().is_empty()) {
        return path.to_path_buf();
    }
    if let Some(value) = env_value.filter(|value| !value.is_empty()) {
        return PathBuf::from(value);
    }
    if !configured.is_empty() {
        return PathBuf::from(configured);
    }
    home_known_hosts()
}

/// Default known_hosts location: `SSH_KNOWN_HOSTS` if set, else `~/.ssh/known_hosts`.
pub fn default_known_hosts_path() -> PathBuf {
    match env::var(KNOWN_HOSTS_ENV) {
        Ok(value) if !value.is_empty() => PathBuf::from(value),
        _ => home_known_hosts(),
    }
}

fn home_known_hosts() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".ssh").join("known_hosts"))
        .unwrap_or_else(|| PathBuf::from("known_hosts"))
}

fn expand_tilde(path: &str) -> Result<String> {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = dirs::home_dir().context("Failed to determine home directory")?;
        Ok(home.join(rest).to_string_lossy().into_owned())
    } else {
        Ok(path.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_minimal_config() {
        let config_str = r#"
[files]
known_hosts_path = "~/.ssh/known_hosts"

[search]
max_results = 20
case_sensitive = false
"#;

        let config = Config::load_from_str(config_str).unwrap();

        assert_eq!(config.files.known_hosts_path, "~/.ssh/known_hosts");
        assert_eq!(config.files.stash_path, "");
        assert_eq!(config.search.max_results, 20);
        assert!(!config.search.case_sensitive);
        assert!(config.display.show_comments); // Default value
    }

    #[test]
    fn test_parse_full_config() {
        let config_str = r#"
[files]
known_hosts_path = "/etc/ssh/ssh_known_hosts"
stash_path = "/var/tmp/stash"

[search]
max_results = 5
case_sensitive = true

[display]
show_comments = false
"#;

        let config = Config::load_from_str(config_str).unwrap();

        assert_eq!(config.files.known_hosts_path, "/etc/ssh/ssh_known_hosts");
        assert_eq!(config.stash_path(None), Some(PathBuf::from("/var/tmp/stash")));
        assert_eq!(config.search.max_results, 5);
        assert!(config.search.case_sensitive);
        assert!(!config.display.show_comments);
    }

    #[test]
    fn test_parse_invalid_config_missing_section() {
        let config_str = r#"
[files]
known_hosts_path = "~/.ssh/known_hosts"
"#;

        let result = Config::load_from_str(config_str);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Failed to parse configuration"));
    }

    #[test]
    fn test_parse_invalid_config_wrong_type() {
        let config_str = r#"
[files]
known_hosts_path = "~/.ssh/known_hosts"

[search]
max_results = "many"
case_sensitive = false
"#;

        assert!(Config::load_from_str(config_str).is_err());
    }

    #[test]
    fn test_expand_tilde() {
        let home = dirs::home_dir().unwrap();
        let home_str = home.to_string_lossy();

        assert_eq!(expand_tilde("~/test").unwrap(), format!("{}/test", home_str));
        assert_eq!(expand_tilde("/absolute/path").unwrap(), "/absolute/path");
        assert_eq!(expand_tilde("").unwrap(), "");
    }

    #[test]
    fn test_resolve_known_hosts_precedence() {
        let explicit = Path::new("/explicit/known_hosts");

        assert_eq!(
            resolve_known_hosts_path(Some(explicit), Some("/env/known_hosts"), "/cfg/known_hosts"),
            PathBuf::from("/explicit/known_hosts")
        );
        assert_eq!(
            resolve_known_hosts_path(None, Some("/env/known_hosts"), "/cfg/known_hosts"),
            PathBuf::from("/env/known_hosts")
        );
        assert_eq!(
            resolve_known_hosts_path(Some(Path::new("")), Some(""), "/cfg/known_hosts"),
            PathBuf::from("/cfg/known_hosts")
        );
        assert!(
            resolve_known_hosts_path(None, None, "")
                .to_string_lossy()
                .ends_with("known_hosts")
        );
    }

    #[test]
    fn test_stash_path_precedence() {
        let mut config = Config::default();
        assert_eq!(config.stash_path(None), None);

        config.files.stash_path = "/cfg/stash".to_string();
        assert_eq!(config.stash_path(None), Some(PathBuf::from("/cfg/stash")));
        assert_eq!(
            config.stash_path(Some(Path::new("/flag/stash"))),
            Some(PathBuf::from("/flag/stash"))
        );
    }

    #[test]
    fn test_validate() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.search.max_results = 0;
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("max_results must be greater than 0"));

        let mut config = Config::default();
        config.files.known_hosts_path = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path().unwrap();
        assert!(path.to_string_lossy().contains("khm"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_default_config_content_can_be_parsed() {
        let content = Config::default_config_content();
        let config = Config::load_from_str(content).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load_default_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        Config::save_default_config(&path).unwrap();
        let config = Config::load(Some(&path)).unwrap();

        let home = dirs::home_dir().unwrap();
        assert_eq!(
            config.files.known_hosts_path,
            home.join(".ssh/known_hosts").to_string_lossy()
        );
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let result = Config::load(Some(&temp_dir.path().join("absent.toml")));
        assert!(result.unwrap_err().to_string().contains("Failed to read configuration file"));
    }
}
