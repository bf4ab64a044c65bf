use pingora::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::cert::identity::CertIdentity;
use crate::error::BINDING_FORMAT_ERROR;

pub const HTTPS: &str = "https";

/// The web server configuration: the sites and a way to persist changes made to them.
pub trait ServerManager {
    fn sites(&self) -> &[Site];
    fn sites_mut(&mut self) -> &mut [Site];
    /// Persist every pending change at once.
    fn commit_changes(&mut self) -> Result<()>;
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq, Clone)]
pub struct Site {
    pub name: String,
    #[serde(default)]
    pub bindings: BindingCollection,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct Binding {
    pub protocol: String,
    /// `<ip>:<port>:<host>`
    pub binding_information: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_hash: Option<CertIdentity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_store_name: Option<String>,
}

/// The bindings of a site, in configuration order.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq, Clone)]
#[serde(transparent)]
pub struct BindingCollection {
    items: Vec<Binding>,
}

impl BindingCollection {
    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add an https binding bound to a certificate. The binding information is validated first.
    pub fn add(
        &mut self,
        binding_information: &str,
        certificate_hash: &CertIdentity,
        certificate_store_name: &str,
    ) -> Result<()> {
        validate_binding_information(binding_information)?;
        self.items.push(Binding {
            protocol: HTTPS.to_string(),
            binding_information: binding_information.to_string(),
            certificate_hash: Some(certificate_hash.clone()),
            certificate_store_name: Some(certificate_store_name.to_string()),
        });
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Option<Binding> {
        if index < self.items.len() {
            Some(self.items.remove(index))
        } else {
            None
        }
    }
}

impl From<Vec<Binding>> for BindingCollection {
    fn from(items: Vec<Binding>) -> Self {
        BindingCollection { items }
    }
}

/// Checks `<ip>:<port>:<host>` where ip is `*`, empty, IPv4 or bracketed IPv6.
pub fn validate_binding_information(info: &str) -> Result<()> {
    let invalid = |reason: &str| {
        Error::explain(
            BINDING_FORMAT_ERROR,
            format!("Invalid binding information '{info}': {reason}"),
        )
    };

    // The host never contains ':', the address may (IPv6).
    let mut parts = info.rsplitn(3, ':');
    let (Some(host), Some(port), Some(ip)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid("expected <ip>:<port>:<host>"));
    };

    let ip_ok = match ip {
        "" | "*" => true,
        _ if ip.starts_with('[') && ip.ends_with(']') => {
            ip[1..ip.len() - 1].parse::<Ipv6Addr>().is_ok()
        }
        _ => ip.parse::<Ipv4Addr>().is_ok(),
    };
    if !ip_ok {
        return Err(invalid("bad address"));
    }

    match port.parse::<u16>() {
        Ok(port) if port > 0 => {}
        _ => return Err(invalid("bad port")),
    }

    if host.chars().any(|c| c.is_whitespace() || c == '/') {
        return Err(invalid("bad host name"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_binding_information() {
        for info in [
            "*:443:example.com",
            "*:443:",
            ":443:",
            "10.0.0.1:8443:www.example.com",
            "[::1]:443:example.com",
            "[2001:db8::1]:443:",
        ] {
            assert!(validate_binding_information(info).is_ok(), "{info}");
        }
    }

    #[test]
    fn invalid_binding_information() {
        for info in [
            "",
            "example.com",
            "*:443",
            "*:0:example.com",
            "*:70000:example.com",
            "*:https:example.com",
            "300.0.0.1:443:example.com",
            "::1:443:example.com",
            "*:443:bad host",
        ] {
            let err = validate_binding_information(info).err();
            assert_eq!(
                err.map(|e| e.etype().clone()),
                Some(BINDING_FORMAT_ERROR),
                "{info}"
            );
        }
    }

    #[test]
    fn add_and_remove() {
        let mut bindings = BindingCollection::default();
        let hash = CertIdentity::new(vec![1; 20]);

        bindings.add("*:443:example.com", &hash, "WebHosting").unwrap();
        assert!(bindings.add("*:443", &hash, "WebHosting").is_err());
        assert_eq!(bindings.len(), 1);

        let binding = bindings.iter().next().unwrap();
        assert_eq!(binding.protocol, "https");
        assert_eq!(binding.certificate_hash, Some(hash));
        assert_eq!(binding.certificate_store_name.as_deref(), Some("WebHosting"));

        assert!(bindings.remove(1).is_none());
        assert!(bindings.remove(0).is_some());
        assert!(bindings.is_empty());
    }

    #[test]
    fn deserialize() {
        let yaml = r#"
name: Default Web Site
bindings:
  - protocol: http
    binding_information: "*:80:"
  - protocol: https
    binding_information: "*:443:example.com"
    certificate_hash: 0A0B0C
    certificate_store_name: WebHosting
"#;
        let site = serde_yaml::from_str::<Site>(yaml).unwrap();

        assert_eq!(
            Site {
                name: "Default Web Site".to_string(),
                bindings: vec![
                    Binding {
                        protocol: "http".to_string(),
                        binding_information: "*:80:".to_string(),
                        certificate_hash: None,
                        certificate_store_name: None,
                    },
                    Binding {
                        protocol: "https".to_string(),
                        binding_information: "*:443:example.com".to_string(),
                        certificate_hash: Some(CertIdentity::new(vec![0x0a, 0x0b, 0x0c])),
                        certificate_store_name: Some("WebHosting".to_string()),
                    },
                ]
                .into(),
            },
            site
        );
    }
}
