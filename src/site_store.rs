use log::{debug, info};
use pingora::{OrErr, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{COMMIT_ERROR, SERVER_CONFIG_ERROR};
use crate::site_config::{ServerManager, Site};

/// On-disk layout of the sites file.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct SitesFile {
    pub sites: Vec<Site>,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum Format {
    Yaml,
    Json,
}

impl Format {
    fn of(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Yaml,
        }
    }
}

/// Server configuration kept in a YAML (or JSON) sites file. Changes stay in memory until
/// `commit_changes`, which replaces the file in one rename.
pub struct FileServerManager {
    path: PathBuf,
    format: Format,
    config: SitesFile,
}

impl FileServerManager {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let format = Format::of(&path);
        let conf_str = fs::read_to_string(&path).or_err_with(SERVER_CONFIG_ERROR, || {
            format!("Unable to read sites file {}", path.display())
        })?;
        let config = match format {
            Format::Yaml => serde_yaml::from_str(&conf_str).or_err_with(SERVER_CONFIG_ERROR, || {
                format!("Unable to parse sites file {}", path.display())
            })?,
            Format::Json => serde_json::from_str(&conf_str).or_err_with(SERVER_CONFIG_ERROR, || {
                format!("Unable to parse sites file {}", path.display())
            })?,
        };
        debug!("Sites file read from {}", path.display());
        Ok(FileServerManager {
            path,
            format,
            config,
        })
    }

    fn serialize(&self) -> Result<String> {
        match self.format {
            Format::Yaml => serde_yaml::to_string(&self.config)
                .or_err(COMMIT_ERROR, "Unable to serialize sites"),
            Format::Json => serde_json::to_string_pretty(&self.config)
                .or_err(COMMIT_ERROR, "Unable to serialize sites"),
        }
    }
}

impl ServerManager for FileServerManager {
    fn sites(&self) -> &[Site] {
        &self.config.sites
    }

    fn sites_mut(&mut self) -> &mut [Site] {
        &mut self.config.sites
    }

    fn commit_changes(&mut self) -> Result<()> {
        let contents = self.serialize()?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, contents).or_err_with(COMMIT_ERROR, || {
            format!("Unable to write {}", tmp.display())
        })?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e).or_err_with(COMMIT_ERROR, || {
                format!("Unable to replace {}", self.path.display())
            });
        }
        info!("Committed changes to {}", self.path.display());
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::identity::CertIdentity;

    const SITES: &str = r#"
sites:
  - name: Default Web Site
    bindings:
      - protocol: http
        binding_information: "*:80:"
  - name: Empty
"#;

    #[test]
    fn open_and_commit_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sites.yaml");
        fs::write(&path, SITES).unwrap();

        let mut manager = FileServerManager::open(&path).unwrap();
        assert_eq!(manager.sites().len(), 2);
        assert_eq!(manager.sites()[0].bindings.len(), 1);
        assert!(manager.sites()[1].bindings.is_empty());

        let hash = CertIdentity::new(vec![0xab; 20]);
        manager.sites_mut()[1]
            .bindings
            .add("*:443:example.com", &hash, "WebHosting")
            .unwrap();

        // Nothing is persisted before the commit.
        assert_eq!(fs::read_to_string(&path).unwrap(), SITES);
        manager.commit_changes().unwrap();
        assert!(!dir.path().join("sites.yaml.tmp").exists());

        let reopened = FileServerManager::open(&path).unwrap();
        let binding = reopened.sites()[1].bindings.iter().next().unwrap();
        assert_eq!(binding.binding_information, "*:443:example.com");
        assert_eq!(binding.certificate_hash, Some(hash));
    }

    #[test]
    fn open_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sites.json");
        fs::write(&path, r#"{"sites": [{"name": "api", "bindings": []}]}"#).unwrap();

        let mut manager = FileServerManager::open(&path).unwrap();
        assert_eq!(manager.sites()[0].name, "api");
        manager.commit_changes().unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["sites"][0]["name"], "api");
    }

    #[test]
    fn missing_or_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sites.yaml");
        let err = FileServerManager::open(&path).err().unwrap();
        assert_eq!(err.etype(), &SERVER_CONFIG_ERROR);

        fs::write(&path, "sites: [[[").unwrap();
        let err = FileServerManager::open(&path).err().unwrap();
        assert_eq!(err.etype(), &SERVER_CONFIG_ERROR);
    }

    #[test]
    fn commit_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sites.yaml");
        fs::write(&path, SITES).unwrap();
        let mut manager = FileServerManager::open(&path).unwrap();

        // The temp file cannot be written when its path is taken by a directory.
        fs::create_dir(dir.path().join("sites.yaml.tmp")).unwrap();
        let err = manager.commit_changes().err().unwrap();
        assert_eq!(err.etype(), &COMMIT_ERROR);
        assert_eq!(fs::read_to_string(&path).unwrap(), SITES);
    }
}
