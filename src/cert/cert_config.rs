use pingora::tls::error::ErrorStack;
use pingora::tls::pkey::{PKeyRef, Private};
use pingora::tls::x509::{X509NameRef, X509Ref, X509};
use pingora::Result;

use crate::cert::identity::CertIdentity;

/// A store of installed certificates. The store is only ever added to.
pub trait CertificateStore {
    fn name(&self) -> &str;
    /// All installed certificates, in the store's native order.
    fn certificates(&self) -> Result<Vec<Certificate>>;
    fn add(&mut self, cert: &Certificate) -> Result<()>;
}

/// A loaded certificate. The DER encoding and the key material are passed through to the
/// store untouched.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Certificate {
    pub identity: CertIdentity,
    /// Diagnostics only.
    pub subject: String,
    pub der: Vec<u8>,
    /// PKCS#8 DER private key, when the bundle carried one and it is kept.
    pub key: Option<Vec<u8>>,
}

impl Certificate {
    pub fn from_x509(cert: &X509Ref, key: Option<&PKeyRef<Private>>) -> Result<Self, ErrorStack> {
        let der = cert.to_der()?;
        let key = match key {
            Some(key) => Some(key.private_key_to_pkcs8()?),
            None => None,
        };
        Ok(Certificate {
            identity: CertIdentity::thumbprint(&der)?,
            subject: format_name(cert.subject_name()),
            der,
            key,
        })
    }

    pub fn from_der(der: &[u8], key: Option<Vec<u8>>) -> Result<Self, ErrorStack> {
        let cert = X509::from_der(der)?;
        Ok(Certificate {
            identity: CertIdentity::thumbprint(der)?,
            subject: format_name(cert.subject_name()),
            der: der.to_vec(),
            key,
        })
    }
}

/// Renders a distinguished name as `CN=foo, O=bar`.
fn format_name(name: &X509NameRef) -> String {
    name.entries()
        .map(|entry| {
            let field = entry.object().nid().short_name().unwrap_or("?");
            let value = entry
                .data()
                .as_utf8()
                .map(|v| v.to_string())
                .unwrap_or_default();
            format!("{field}={value}")
        })
        .collect::<Vec<_>>()
        .join(", ")
}


#[cfg(test)]
mod tests {
    use super::test_utils::*;
    use super::*;

    #[test]
    fn from_x509() {
        let key = new_key();
        let x509 = new_x509("example.com", &key);
        let cert = Certificate::from_x509(&x509, Some(&*key)).unwrap();

        assert_eq!(cert.subject, "CN=example.com");
        assert_eq!(cert.identity.as_bytes().len(), 20);
        assert!(cert.key.is_some());

        let reloaded = Certificate::from_der(&cert.der, cert.key.clone()).unwrap();
        assert_eq!(reloaded, cert);
    }

    #[test]
    fn distinct_certs_have_distinct_identities() {
        assert_ne!(new_cert("a.example").identity, new_cert("a.example").identity);
    }
}
