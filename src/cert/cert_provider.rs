use log::{debug, info};
use pingora::tls::pkcs12::Pkcs12;
use pingora::{Error, OrErr, Result};
use std::fs;
use std::path::Path;

use crate::cert::cert_config::Certificate;
use crate::error::PFX_DECODE_ERROR;

/// How the private key of a decoded bundle is handled.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct KeyStorageFlags {
    /// Keep the private key with the certificate so it is installed in the store.
    pub persist_key_set: bool,
    /// The key belongs to the machine rather than the invoking user.
    pub machine_key_set: bool,
    pub exportable: bool,
}

impl KeyStorageFlags {
    /// Flags for a server certificate whose key must be usable by the web server.
    pub const SERVER: KeyStorageFlags = KeyStorageFlags {
        persist_key_set: true,
        machine_key_set: true,
        exportable: true,
    };

    /// Flags for intermediate certificates.
    pub const CHAIN: KeyStorageFlags = KeyStorageFlags {
        persist_key_set: false,
        machine_key_set: false,
        exportable: true,
    };

    /// Keys are persisted as exportable PKCS#8 in a machine-wide store, so a persisted key
    /// must belong to the machine key set and be exportable.
    fn check(&self) -> Result<()> {
        if self.persist_key_set && !self.machine_key_set {
            return Err(Error::explain(
                PFX_DECODE_ERROR,
                "Unsupported key storage flags: keys are only persisted to the machine key set",
            ));
        }
        if self.persist_key_set && !self.exportable {
            return Err(Error::explain(
                PFX_DECODE_ERROR,
                "Unsupported key storage flags: a persisted key must be exportable",
            ));
        }
        Ok(())
    }
}

/// Decodes PFX/PKCS#12 bundles into certificates.
pub struct PfxFile;

impl PfxFile {
    /// Read and decode the bundle at `path`. The bundle's own certificate comes first,
    /// followed by its CA certificates.
    pub fn decode<P: AsRef<Path>>(
        path: P,
        password: Option<&str>,
        flags: KeyStorageFlags,
    ) -> Result<Vec<Certificate>> {
        let path = path.as_ref();
        let der = fs::read(path).or_err_with(PFX_DECODE_ERROR, || {
            format!("Unable to read PFX {}", path.display())
        })?;
        debug!("PFX read from {}", path.display());
        let certs = Self::decode_der(&der, password, flags).map_err(|e| {
            e.more_context(format!("while decoding {}", path.display()))
        })?;
        info!("Decoded {} certificate(s) from {}", certs.len(), path.display());
        Ok(certs)
    }

    pub fn decode_der(
        der: &[u8],
        password: Option<&str>,
        flags: KeyStorageFlags,
    ) -> Result<Vec<Certificate>> {
        flags.check()?;
        let parsed = Pkcs12::from_der(der)
            .or_err(PFX_DECODE_ERROR, "Unable to parse PKCS#12 bundle")?
            .parse2(password.unwrap_or(""))
            .or_err(PFX_DECODE_ERROR, "Unable to decrypt PKCS#12 bundle")?;

        if flags.persist_key_set && parsed.pkey.is_none() {
            return Err(Error::explain(
                PFX_DECODE_ERROR,
                "The key set is to be persisted but the bundle carries no private key",
            ));
        }
        let key = if flags.persist_key_set {
            parsed.pkey.as_deref()
        } else {
            None
        };

        let mut certs = Vec::new();
        if let Some(cert) = &parsed.cert {
            certs.push(
                Certificate::from_x509(cert, key)
                    .or_err(PFX_DECODE_ERROR, "Unable to read bundle certificate")?,
            );
        }
        for ca in parsed.ca.iter().flatten() {
            certs.push(
                Certificate::from_x509(ca, None)
                    .or_err(PFX_DECODE_ERROR, "Unable to read bundle CA certificate")?,
            );
        }

        if certs.is_empty() {
            return Err(Error::explain(
                PFX_DECODE_ERROR,
                "The bundle contains no certificates",
            ));
        }
        for cert in &certs {
            debug!("Bundle holds {} with thumbprint {}", cert.subject, cert.identity);
        }
        Ok(certs)
    }
}
