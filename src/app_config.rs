use log::{debug, LevelFilter};
use pingora::prelude::*;
use pingora::{Error, OrErr, Result};
use serde::{Deserialize, Serialize};
use std::fs;

/// Name of the machine store holding web server certificates.
pub const WEB_HOSTING_STORE: &str = "WebHosting";

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub server: ServerConfig,
    pub log: LogConfig,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the machine stores.
    pub root: String,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub sites_file: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct LogConfig {
    /// Overrides the log file derived from the executable path.
    pub file: Option<String>,
    pub level: String,
}

impl AppConfig {
    pub fn load_from_yaml<P>(path: P) -> Result<Self>
    where
        P: AsRef<std::path::Path> + std::fmt::Display,
    {
        let conf_str = fs::read_to_string(&path).or_err_with(ReadError, || {
            format!("Unable to read conf file from {path}")
        })?;
        debug!("Conf file read from {path}");
        Self::from_yaml(&conf_str)
    }

    pub fn from_yaml(conf_str: &str) -> Result<Self> {
        let conf: AppConfig = serde_yaml::from_str(conf_str).or_err_with(ReadError, || {
            format!("Unable to parse yaml conf {conf_str}")
        })?;
        conf.validate()
    }

    pub fn validate(self) -> Result<Self> {
        if self.store.name.trim().is_empty() {
            return Err(Error::new_str("store: name must not be empty"));
        }
        if self.store.root.trim().is_empty() {
            return Err(Error::new_str("store: root must not be empty"));
        }
        if self.server.sites_file.trim().is_empty() {
            return Err(Error::new_str("server: sites_file must not be empty"));
        }
        self.log.level_filter()?;
        Ok(self)
    }
}

impl LogConfig {
    pub fn level_filter(&self) -> Result<LevelFilter> {
        self.level
            .parse()
            .or_err_with(ReadError, || format!("log: unknown level {}", self.level))
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            root: "/var/lib/certbind/stores".to_string(),
            name: WEB_HOSTING_STORE.to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            sites_file: "/var/lib/certbind/sites.yaml".to_string(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            file: None,
            level: "debug".to_string(),
        }
    }
}
