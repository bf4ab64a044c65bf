use log::{debug, info};
use pingora::{Error, OrErr, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cert::cert_config::{Certificate, CertificateStore};
use crate::cert::identity::CertIdentity;
use crate::error::STORE_ACCESS_ERROR;
use crate::outcome::Outcome;

/// Search a store for a certificate with the given identity. The first match wins.
pub fn find_cert_by_identity<S>(store: &S, identity: &CertIdentity) -> Result<Option<Certificate>>
where
    S: CertificateStore + ?Sized,
{
    info!("Searching for thumbprint {identity}");
    for cert in store.certificates()? {
        info!(
            "Comparing with the cert for {} with thumbprint {}",
            cert.subject, cert.identity
        );
        if cert.identity == *identity {
            info!("Cert found");
            return Ok(Some(cert));
        }
    }
    info!("Cert not found");
    Ok(None)
}

/// Add a certificate to a store unless one with the same identity is already installed.
pub fn install_cert<S>(store: &mut S, cert: &Certificate) -> Result<Outcome>
where
    S: CertificateStore + ?Sized,
{
    if find_cert_by_identity(&*store, &cert.identity)?.is_some() {
        info!("The cert to be added already exists in the store");
        return Ok(Outcome::Unchanged);
    }
    info!("Adding the cert to the store {}", store.name());
    store.add(cert)?;
    Ok(Outcome::Changed)
}

const CERT_EXT: &str = "cer";
const KEY_EXT: &str = "key";

/// A machine store kept as a directory of DER files, one `<THUMBPRINT>.cer` per certificate
/// and an optional `<THUMBPRINT>.key` next to it.
pub struct DirectoryStore {
    name: String,
    dir: PathBuf,
}

impl DirectoryStore {
    /// Open the existing store `name` under `root`. The store is never created.
    pub fn open<P: AsRef<Path>>(root: P, name: &str) -> Result<Self> {
        let dir = root.as_ref().join(name);
        let meta = fs::metadata(&dir).or_err_with(STORE_ACCESS_ERROR, || {
            format!("Unable to open store {name} at {}", dir.display())
        })?;
        if !meta.is_dir() {
            return Err(Error::explain(
                STORE_ACCESS_ERROR,
                format!("Store {name} at {} is not a directory", dir.display()),
            ));
        }
        if meta.permissions().readonly() {
            return Err(Error::explain(
                STORE_ACCESS_ERROR,
                format!("Store {name} at {} is not writable", dir.display()),
            ));
        }
        debug!("Opened store {name} at {}", dir.display());
        Ok(DirectoryStore {
            name: name.to_string(),
            dir,
        })
    }

    fn cert_files(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.dir).or_err_with(STORE_ACCESS_ERROR, || {
            format!("Unable to list store {}", self.name)
        })?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry
                .or_err_with(STORE_ACCESS_ERROR, || {
                    format!("Unable to list store {}", self.name)
                })?
                .path();
            if path.extension().is_some_and(|ext| ext == CERT_EXT) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn load(&self, path: &Path) -> Result<Certificate> {
        let der = fs::read(path).or_err_with(STORE_ACCESS_ERROR, || {
            format!("Unable to read {}", path.display())
        })?;
        let key_path = path.with_extension(KEY_EXT);
        let key = if key_path.exists() {
            Some(fs::read(&key_path).or_err_with(STORE_ACCESS_ERROR, || {
                format!("Unable to read {}", key_path.display())
            })?)
        } else {
            None
        };
        Certificate::from_der(&der, key).or_err_with(STORE_ACCESS_ERROR, || {
            format!("Corrupt certificate {} in store {}", path.display(), self.name)
        })
    }
}

impl CertificateStore for DirectoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn certificates(&self) -> Result<Vec<Certificate>> {
        self.cert_files()?
            .iter()
            .map(|path| self.load(path))
            .collect()
    }

    fn add(&mut self, cert: &Certificate) -> Result<()> {
        let path = self.dir.join(format!("{}.{CERT_EXT}", cert.identity));
        let key_path = path.with_extension(KEY_EXT);
        if let Some(key) = &cert.key {
            write_replace(&key_path, key).or_err_with(STORE_ACCESS_ERROR, || {
                format!("Unable to write {}", key_path.display())
            })?;
        }
        // The certificate goes last: an entry without its .cer is never enumerated.
        if let Err(e) = write_replace(&path, &cert.der) {
            if cert.key.is_some() {
                let _ = fs::remove_file(&key_path);
            }
            return Err(e).or_err_with(STORE_ACCESS_ERROR, || {
                format!("Unable to write {}", path.display())
            });
        }
        debug!("Wrote {} to {}", cert.subject, path.display());
        Ok(())
    }
}

/// Write `contents` to a sibling `.tmp` file and rename it over `path`.
fn write_replace(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })
}
