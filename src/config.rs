use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::clock::{parse_time_zone, BusinessCalendar, DEFAULT_TIME_ZONE};
use crate::error::ConfigError;
use crate::keys::StorageKeys;
use crate::storage::crypto::DEFAULT_PBKDF2_ITERATIONS;
use crate::storage::file::Codec;
use crate::storage::{sanitize_relative_path, FileStore};

pub const CONFIG_FILE: &str = "workerbook.config.json";
const PLAIN_SNAPSHOT: &str = "workerbook.json";
const ENCRYPTED_SNAPSHOT: &str = "workerbook.enc";
const APP_DIR: &str = "workerbook";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage_root: Option<PathBuf>,
    /// Relative to the storage root.
    pub snapshot_file: Option<String>,
    pub encrypted: bool,
    pub pbkdf2_iterations: u32,
    pub time_zone: String,
    pub keys: StorageKeys,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_root: None,
            snapshot_file: None,
            encrypted: false,
            pbkdf2_iterations: DEFAULT_PBKDF2_ITERATIONS,
            time_zone: DEFAULT_TIME_ZONE.name().to_string(),
            keys: StorageKeys::default(),
        }
    }
}

impl Config {
    /// Reads `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config =
            serde_json::from_str(raw.as_str()).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(config.normalized())
    }

    fn normalized(mut self) -> Self {
        if self.pbkdf2_iterations == 0 {
            self.pbkdf2_iterations = DEFAULT_PBKDF2_ITERATIONS;
        }
        if self.time_zone.trim().is_empty() {
            self.time_zone = DEFAULT_TIME_ZONE.name().to_string();
        }
        self
    }

    pub fn business_calendar(&self) -> Result<BusinessCalendar, ConfigError> {
        Ok(BusinessCalendar::new(parse_time_zone(self.time_zone.as_str())?))
    }

    pub fn storage_root(&self) -> PathBuf {
        self.storage_root.clone().unwrap_or_else(default_storage_root)
    }

    pub fn snapshot_path(&self) -> Result<PathBuf, ConfigError> {
        let name = match &self.snapshot_file {
            Some(name) => name.as_str(),
            None if self.encrypted => ENCRYPTED_SNAPSHOT,
            None => PLAIN_SNAPSHOT,
        };
        Ok(self.storage_root().join(sanitize_relative_path(name)?))
    }

    pub fn open_store(&self, password: Option<&str>) -> Result<FileStore, ConfigError> {
        let path = self.snapshot_path()?;
        let codec = if self.encrypted {
            let password = password
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::MissingPassword)?;
            Codec::Encrypted {
                password: password.to_string(),
                iterations: self.pbkdf2_iterations,
            }
        } else {
            Codec::Plain
        };
        Ok(FileStore::with_codec(path, codec))
    }
}

pub fn default_storage_root() -> PathBuf {
    if let Some(data) = env::var_os("XDG_DATA_HOME").filter(|value| !value.is_empty()) {
        return PathBuf::from(data).join(APP_DIR);
    }
    if let Some(appdata) = env::var_os("APPDATA").filter(|value| !value.is_empty()) {
        return PathBuf::from(appdata).join("Workerbook");
    }
    if let Some(home) = env::var_os("HOME").filter(|value| !value.is_empty()) {
        return PathBuf::from(home).join(".local").join("share").join(APP_DIR);
    }
    PathBuf::from(".").join(APP_DIR)
}
