use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::store::IdPolicy;

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "RecordDesk";
const APP_NAME: &str = "record-desk";
const CONFIG_FILE: &str = "config.toml";
const DEFAULT_DATA_FILE: &str = "data.json";

pub const CONFIG_ENV: &str = "RECDESK_CONFIG";
pub const DATA_ENV: &str = "RECDESK_DATA";

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        Ok(Self::with_paths(ConfigPaths::discover()?))
    }

    pub fn with_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    /// Reads the config file, writing the defaults there first if it is absent.
    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        let file = &self.paths.config_file;
        let mut cfg = if file.exists() {
            let raw = fs::read_to_string(file)
                .with_context(|| format!("reading config {}", file.display()))?;
            toml::from_str(&raw).with_context(|| format!("parsing config {}", file.display()))?
        } else {
            let cfg = AppConfig::default();
            let raw = toml::to_string_pretty(&cfg).context("serializing default config")?;
            fs::write(file, raw).with_context(|| format!("writing config {}", file.display()))?;
            tracing::info!(path = %file.display(), "wrote default config");
            cfg
        };
        cfg.store.resolve(&self.paths.data_dir);
        Ok(cfg)
    }
}

/// Where the config file, the default data directory and the TUI log live.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl ConfigPaths {
    /// Platform directories, overridden by `RECDESK_CONFIG` and `RECDESK_DATA`.
    pub fn discover() -> Result<Self> {
        let dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving platform directories")?;
        let config_file = match env::var_os(CONFIG_ENV) {
            Some(raw) => config_file_from_override(PathBuf::from(raw)),
            None => dirs.config_dir().join(CONFIG_FILE),
        };
        let data_dir = env::var_os(DATA_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| dirs.data_dir().to_path_buf());
        let log_dir = dirs
            .state_dir()
            .map(|state| state.join("logs"))
            .unwrap_or_else(|| data_dir.join("logs"));
        Ok(Self {
            config_file,
            data_dir,
            log_dir,
        })
    }

    /// Lays every directory out under `root`; used by tests and portable setups.
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            config_file: root.join("config").join(CONFIG_FILE),
            data_dir: root.join("data"),
            log_dir: root.join("state").join("logs"),
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        let config_dir = self.config_file.parent();
        let dirs = config_dir
            .into_iter()
            .chain([self.data_dir.as_path(), self.log_dir.as_path()]);
        for dir in dirs {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

/// An override naming a directory (existing, or without an extension) holds
/// `config.toml`; anything else is the config file itself.
fn config_file_from_override(path: PathBuf) -> PathBuf {
    if path.is_dir() || path.extension().is_none() {
        path.join(CONFIG_FILE)
    } else {
        path
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreOptions,
    pub search: SearchOptions,
    pub ui: UiOptions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// Empty means `<data dir>/data.json`; relative paths hang off the data dir.
    pub data_file: PathBuf,
    pub id_policy: IdPolicy,
}

impl StoreOptions {
    fn resolve(&mut self, data_dir: &Path) {
        if self.data_file.as_os_str().is_empty() {
            self.data_file = data_dir.join(DEFAULT_DATA_FILE);
        } else if self.data_file.is_relative() {
            self.data_file = data_dir.join(&self.data_file);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub highlight_matches: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            highlight_matches: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiOptions {
    pub tick_rate_ms: u64,
    pub confirm_delete: bool,
}

impl Default for UiOptions {
    fn default() -> Self {
        Self {
            tick_rate_ms: 250,
            confirm_delete: true,
        }
    }
}

impl UiOptions {
    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_rate_ms.max(10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn first_run_writes_defaults_and_resolves_data_file() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let loader = ConfigLoader::with_paths(ConfigPaths::rooted_at(temp.path()));

        let cfg = loader.load_or_init()?;
        assert!(loader.paths().config_file.exists());
        assert_eq!(cfg.store.data_file, temp.path().join("data").join("data.json"));
        assert_eq!(cfg.store.id_policy, IdPolicy::MaxPlusOne);
        assert!(cfg.ui.confirm_delete);

        let reloaded = loader.load_or_init()?;
        assert_eq!(reloaded.store.data_file, cfg.store.data_file);
        Ok(())
    }

    #[test]
    fn reads_overrides_and_fills_missing_keys() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let paths = ConfigPaths::rooted_at(temp.path());
        paths.ensure_directories()?;
        fs::write(
            &paths.config_file,
            "[store]\ndata_file = \"work/records.json\"\nid_policy = \"monotonic\"\n\n[ui]\ntick_rate_ms = 100\n",
        )?;

        let cfg = ConfigLoader::with_paths(paths.clone()).load_or_init()?;
        assert_eq!(cfg.store.data_file, paths.data_dir.join("work/records.json"));
        assert_eq!(cfg.store.id_policy, IdPolicy::Monotonic);
        assert_eq!(cfg.ui.tick_rate(), Duration::from_millis(100));
        assert!(cfg.ui.confirm_delete);
        assert!(cfg.search.highlight_matches);
        Ok(())
    }

    #[test]
    fn rejects_unknown_id_policy() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let paths = ConfigPaths::rooted_at(temp.path());
        paths.ensure_directories()?;
        fs::write(&paths.config_file, "[store]\nid_policy = \"random\"\n")?;
        assert!(ConfigLoader::with_paths(paths).load_or_init().is_err());
        Ok(())
    }

    #[test]
    fn config_override_accepts_file_or_directory() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        assert_eq!(
            config_file_from_override(temp.path().to_path_buf()),
            temp.path().join("config.toml")
        );
        let named = temp.path().join("desk.toml");
        assert_eq!(config_file_from_override(named.clone()), named);
        let fresh_dir = temp.path().join("profiles");
        assert_eq!(
            config_file_from_override(fresh_dir.clone()),
            fresh_dir.join("config.toml")
        );
        Ok(())
    }
}
