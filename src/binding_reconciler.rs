use log::{debug, info, warn};
use pingora::{Error, Result};

use crate::cert::identity::CertIdentity;
use crate::error::SITE_NOT_FOUND_ERROR;
use crate::outcome::Outcome;
use crate::site_config::{ServerManager, HTTPS};
use crate::utils::eq_ignore_case;

/// Find a site by name, ignoring case. The first match wins.
pub fn find_site<M>(manager: &M, site_name: &str) -> Result<usize>
where
    M: ServerManager + ?Sized,
{
    let sites = manager.sites();
    let Some(index) = sites.iter().position(|s| eq_ignore_case(&s.name, site_name)) else {
        return Err(Error::explain(
            SITE_NOT_FOUND_ERROR,
            format!("Site {site_name} not found"),
        ));
    };
    let matches = sites
        .iter()
        .filter(|s| eq_ignore_case(&s.name, site_name))
        .count();
    if matches > 1 {
        warn!("{matches} sites are named {site_name}, using the first one");
    }
    let site = &sites[index];
    info!("Found site {}", site.name);
    if site.bindings.is_empty() {
        debug!("Site {} has no bindings", site.name);
    } else {
        debug!("Site {} has {} binding(s)", site.name, site.bindings.len());
    }
    Ok(index)
}

/// Brings the https bindings of one site in line with the desired certificate.
///
/// Changes are staged on the server manager and persisted once by [`commit`](Self::commit),
/// so several binding specs share a single commit. Replacing a binding is a removal followed
/// by an addition inside that change set, which is only as atomic as the commit itself.
pub struct BindingReconciler<'a, M: ServerManager + ?Sized> {
    manager: &'a mut M,
    site: usize,
    store_name: &'a str,
    outcome: Outcome,
}

impl<'a, M: ServerManager + ?Sized> BindingReconciler<'a, M> {
    pub fn new(manager: &'a mut M, site_name: &str, store_name: &'a str) -> Result<Self> {
        let site = find_site(&*manager, site_name)?;
        Ok(BindingReconciler {
            manager,
            site,
            store_name,
            outcome: Outcome::Unchanged,
        })
    }

    /// Ensure exactly one https binding for `binding_info` exists and is bound to `cert_hash`.
    pub fn reconcile(&mut self, binding_info: &str, cert_hash: &CertIdentity) -> Result<Outcome> {
        let site = &mut self.manager.sites_mut()[self.site];

        // (index, already bound to the desired certificate)
        let mut existing = None;
        for (index, binding) in site.bindings.iter().enumerate() {
            info!(
                "Comparing binding {},{} with https,{}",
                binding.protocol, binding.binding_information, binding_info
            );
            if eq_ignore_case(&binding.protocol, HTTPS)
                && eq_ignore_case(&binding.binding_information, binding_info)
            {
                info!("Found existing binding {}", binding.binding_information);
                existing = Some((index, binding.certificate_hash.as_ref() == Some(cert_hash)));
                break;
            }
        }

        let outcome = match existing {
            Some((_, true)) => {
                info!("Existing binding needs not to be updated");
                Outcome::Unchanged
            }
            Some((index, false)) => {
                info!("Existing binding is subject for update - re-creating");
                site.bindings.remove(index);
                site.bindings.add(binding_info, cert_hash, self.store_name)?;
                Outcome::Changed
            }
            None => {
                info!("Existing binding not found - adding a new one {binding_info}");
                site.bindings.add(binding_info, cert_hash, self.store_name)?;
                Outcome::Changed
            }
        };
        self.outcome |= outcome;
        Ok(outcome)
    }

    /// Persist staged changes, if any. Returns whether anything changed for this site.
    pub fn commit(self) -> Result<Outcome> {
        if self.outcome.is_changed() {
            self.manager.commit_changes()?;
        }
        Ok(self.outcome)
    }
}
