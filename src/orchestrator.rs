use log::info;
use pingora::{Error, Result};
use std::path::PathBuf;

use crate::app_config::AppConfig;
use crate::binding_reconciler::BindingReconciler;
use crate::cert::cert_config::{Certificate, CertificateStore};
use crate::cert::cert_provider::{KeyStorageFlags, PfxFile};
use crate::cert::cert_store::{install_cert, DirectoryStore};
use crate::error::PFX_DECODE_ERROR;
use crate::outcome::Outcome;
use crate::site_config::ServerManager;
use crate::site_store::FileServerManager;

/// What a single invocation is asked to converge to.
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct Request {
    pub pfx: PathBuf,
    pub pfx_password: Option<String>,
    pub chain: Option<PathBuf>,
    pub chain_password: Option<String>,
    pub site: String,
    pub bindings: Vec<String>,
}

/// Open the configured store, bundles and sites file, then converge.
pub fn execute(conf: &AppConfig, request: &Request) -> Result<Outcome> {
    info!("--- Opening stores ---");
    info!("Open the system store");
    let mut store = DirectoryStore::open(&conf.store.root, &conf.store.name)?;

    info!("Open the cert's PFX");
    let certs = PfxFile::decode(
        &request.pfx,
        request.pfx_password.as_deref(),
        KeyStorageFlags::SERVER,
    )?;
    let chain = match &request.chain {
        Some(path) => {
            info!("Open the chain's PFX");
            PfxFile::decode(path, request.chain_password.as_deref(), KeyStorageFlags::CHAIN)?
        }
        None => Vec::new(),
    };

    info!("Open the server configuration");
    let mut server = FileServerManager::open(&conf.server.sites_file)?;

    run(
        &mut store,
        &mut server,
        &certs,
        &chain,
        &request.site,
        &request.bindings,
        &conf.store.name,
    )
}

/// Install the first certificate of `certs` and every chain certificate into `store`, then
/// bind the first certificate to each of `bindings` on `site_name`.
///
/// The site is looked up before anything is installed. Binding changes are committed once,
/// after every binding has been reconciled.
pub fn run<S, M>(
    store: &mut S,
    server: &mut M,
    certs: &[Certificate],
    chain: &[Certificate],
    site_name: &str,
    bindings: &[String],
    store_name: &str,
) -> Result<Outcome>
where
    S: CertificateStore + ?Sized,
    M: ServerManager + ?Sized,
{
    let Some(cert) = certs.first() else {
        return Err(Error::explain(PFX_DECODE_ERROR, "No certificate to install"));
    };
    let mut reconciler = BindingReconciler::new(server, site_name, store_name)?;
    let mut outcome = Outcome::Unchanged;

    info!("--- Adding a cert to a store ---");
    outcome |= install_cert(store, cert)?;

    if !chain.is_empty() {
        info!("--- Adding a chain to a store ---");
        for chain_cert in chain {
            outcome |= install_cert(store, chain_cert)?;
        }
    }

    info!("--- Binding a cert to a site ---");
    for binding_info in bindings {
        reconciler.reconcile(binding_info, &cert.identity)?;
    }
    outcome |= reconciler.commit()?;

    info!("Result: {outcome}");
    Ok(outcome)
}
