use std::env;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "config.json";
const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

pub const HOME_ENV: &str = "TASKDECK_HOME";
pub const API_URL_ENV: &str = "TASKDECK_API_URL";

/// Resolves the data directory: `$TASKDECK_HOME`, else `~/.taskdeck`.
pub fn data_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os(HOME_ENV) {
        return Ok(PathBuf::from(dir));
    }
    let home_dir = dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))?;
    Ok(home_dir.join(".taskdeck"))
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    /// Loads `config.json` from `base_dir` (or the data directory), writing the
    /// defaults on first run. `TASKDECK_API_URL` overrides the stored URL.
    pub fn load(base_dir: Option<PathBuf>) -> Result<Self> {
        let dir = match base_dir {
            Some(dir) => dir,
            None => data_dir()?,
        };
        let mut config = Self::load_file(&dir.join(CONFIG_FILE_NAME))?;

        if let Ok(url) = env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                tracing::debug!(%url, "api url overridden from environment");
                config.api_base_url = url;
            }
        }
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let config = Self::default();
            let mut writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(&mut writer, &config)?;
            writer.flush()?;
            tracing::info!(path = %path.display(), "wrote default client config");
            return Ok(config);
        }

        let reader = BufReader::new(File::open(path)?);
        serde_json::from_reader(reader)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_load_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let config = ClientConfig::load_file(&path).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert!(path.exists());
    }

    #[test]
    fn test_reads_existing_file_with_missing_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, r#"{"api_base_url": "https://api.example.com/"}"#).unwrap();

        let config = ClientConfig::load_file(&path).unwrap();
        assert_eq!(config.api_base_url, "https://api.example.com/");
        assert_eq!(config.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn test_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "not json").unwrap();

        assert!(ClientConfig::load_file(&path).is_err());
    }
}
