use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Deserializer};

use crate::error::BoupyError;
use crate::storage::Backend;

pub const SYSTEM_CONFIG: &str = "/etc/boupy/config.json";
pub const USER_CONFIG: &str = ".boupy/config.json";
pub const USER_DATABASE: &str = ".boupy.db";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub password_file: Option<PathBuf>,
    pub delete_weeks: Option<u32>,
    #[serde(deserialize_with = "null_as_default")]
    pub aws: AwsConfig,
    pub temp_dir: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    pub aws_access_key: Option<String>,
    pub aws_secret_key: Option<String>,
    pub aws_bucket_name: Option<String>,
    pub aws_vault_name: Option<String>,
    pub aws_key_name: Option<String>,
    pub aws_region: Option<String>,
    pub aws_endpoint_url: Option<String>,
}

// `null` reads the same as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// System-wide config first, then the one in the user's home.
pub fn default_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from(SYSTEM_CONFIG)];
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(USER_CONFIG));
    }
    candidates
}

impl Config {
    pub fn load() -> Result<Config, BoupyError> {
        Config::load_from(&default_candidates())
    }

    /// Reads the first candidate that can be opened. A readable file that
    /// does not parse is an error, it does not fall through to the next one.
    pub fn load_from(candidates: &[PathBuf]) -> Result<Config, BoupyError> {
        for path in candidates {
            let content = {
                let mut content = String::new();
                match File::open(path).and_then(|mut f| f.read_to_string(&mut content)) {
                    Ok(_) => content,
                    Err(e) => {
                        debug!("Skipping config {:?}: {}", path, e);
                        continue;
                    }
                }
            };
            debug!("Loading config from {:?}", path);
            return Config::parse(path, &content);
        }
        Err(BoupyError::ConfigNotFound { candidates: candidates.to_vec() })
    }

    fn parse(path: &Path, content: &str) -> Result<Config, BoupyError> {
        let malformed = |reason: String| BoupyError::ConfigMalformed {
            path: path.to_path_buf(),
            reason,
        };
        let value: serde_json::Value = serde_json::from_str(content).map_err(|e| malformed(e.to_string()))?;
        if !value.is_object() {
            return Err(malformed("top level is not a JSON object".to_string()));
        }
        serde_json::from_value(value).map_err(|e| malformed(e.to_string()))
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn database_path(&self) -> Result<PathBuf, BoupyError> {
        match &self.database {
            Some(path) => Ok(path.clone()),
            None => dirs::home_dir()
                .map(|home| home.join(USER_DATABASE))
                .ok_or(BoupyError::MissingSetting("database")),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Bucket for object storage, vault for archival storage.
    pub fn container_for(&self, backend: Backend) -> Result<&str, BoupyError> {
        let (value, setting) = match backend {
            Backend::ObjectStorage => (&self.aws.aws_bucket_name, "aws.aws_bucket_name"),
            Backend::ArchivalStorage => (&self.aws.aws_vault_name, "aws.aws_vault_name"),
        };
        value
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or(BoupyError::MissingSetting(setting))
    }
}
