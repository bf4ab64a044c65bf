use pingora::tls::hash::{hash, MessageDigest};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Compares two byte sequences element by element.
/// Sequences of different lengths are never equal.
pub fn bytes_equal(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).all(|(x, y)| x == y)
}

/// Fingerprint identifying a certificate (its SHA-1 thumbprint).
/// This is the only key used to decide whether a certificate is already installed
/// or already bound.
#[derive(Clone, Eq)]
pub struct CertIdentity(Vec<u8>);

impl CertIdentity {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        CertIdentity(bytes.into())
    }

    /// SHA-1 thumbprint of a DER encoded certificate.
    pub fn thumbprint(der: &[u8]) -> Result<Self, pingora::tls::error::ErrorStack> {
        let digest = hash(MessageDigest::sha1(), der)?;
        Ok(CertIdentity::new(digest.to_vec()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl PartialEq for CertIdentity {
    fn eq(&self, other: &Self) -> bool {
        bytes_equal(&self.0, &other.0)
    }
}

impl fmt::Display for CertIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.as_bytes()))
    }
}

impl fmt::Debug for CertIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CertIdentity({self})")
    }
}

impl FromStr for CertIdentity {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        hex::decode(s.trim()).map(CertIdentity::new)
    }
}

impl Serialize for CertIdentity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CertIdentity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
