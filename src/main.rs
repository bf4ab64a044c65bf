use clap::Parser;
use log::{error, info};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

mod app_config;
mod binding_reconciler;
mod cert {
    pub mod cert_config;
    pub mod cert_provider;
    pub mod cert_store;
    pub mod identity;
}
mod error;
mod logging;
mod orchestrator;
mod outcome;
mod site_config;
mod site_store;
mod utils;

use app_config::AppConfig;
use orchestrator::Request;

#[derive(Parser, Debug)]
#[command(name = "certbind")]
#[command(about = "Installs a cert from PFX into store and binds it to a site")]
struct Opt {
    /// Path to the cert's PFX
    #[arg(short = 'p', value_name = "path")]
    pfx: PathBuf,

    /// Path to the chain's PFX
    #[arg(short = 'c', value_name = "path")]
    chain: Option<PathBuf>,

    /// Site name, matched ignoring case
    #[arg(short = 's', value_name = "name")]
    site: String,

    /// Site binding's info. Can be specified several times
    #[arg(short = 'b', value_name = "IP:PORT:HOST", required = true)]
    bindings: Vec<String>,

    /// YAML configuration file
    #[arg(short = 'f', value_name = "path")]
    conf: Option<String>,

    /// Suffix distinguishing the log file of this invocation
    #[arg(short = 'l', value_name = "suffix")]
    log_suffix: Option<String>,

    /// Passphrase of the cert's PFX
    #[arg(long, env = "CERTBIND_PFX_PASSWORD", hide_env_values = true)]
    pfx_password: Option<String>,

    /// Passphrase of the chain's PFX
    #[arg(long, env = "CERTBIND_CHAIN_PASSWORD", hide_env_values = true)]
    chain_password: Option<String>,
}

impl Opt {
    fn request(&self) -> Request {
        Request {
            pfx: self.pfx.clone(),
            pfx_password: self.pfx_password.clone(),
            chain: self.chain.clone(),
            chain_password: self.chain_password.clone(),
            site: self.site.clone(),
            bindings: self.bindings.clone(),
        }
    }
}

fn log_path(conf: &AppConfig, suffix: Option<&str>) -> PathBuf {
    if let Some(file) = &conf.log.file {
        return PathBuf::from(file);
    }
    logging::default_log_path(&exe_path(), suffix)
}

/// The running executable. argv[0] is only a fallback since it may be a bare name found
/// through `PATH`.
fn exe_path() -> PathBuf {
    std::env::current_exe().unwrap_or_else(|_| {
        std::env::args_os()
            .next()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(env!("CARGO_PKG_NAME")))
    })
}

fn main() -> ExitCode {
    let opt = Opt::parse();

    let conf = match &opt.conf {
        Some(path) => AppConfig::load_from_yaml(path),
        None => Ok(AppConfig::default()),
    };
    let conf = match conf {
        Ok(conf) => conf,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let setup = conf
        .log
        .level_filter()
        .and_then(|level| logging::init(&log_path(&conf, opt.log_suffix.as_deref()), level));
    if let Err(e) = setup {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    info!("Site {}, bindings {:?}", opt.site, opt.bindings);
    match orchestrator::execute(&conf, &opt.request()) {
        Ok(outcome) => {
            let mut stdout = std::io::stdout();
            if write!(stdout, "{}", outcome.token())
                .and_then(|_| stdout.flush())
                .is_err()
            {
                error!("Unable to write the result to stdout");
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command() {
        Opt::command().debug_assert();
    }

    #[test]
    fn parse_args() {
        let opt = Opt::try_parse_from([
            "certbind",
            "-p",
            "cert.pfx",
            "-s",
            "MySite",
            "-b",
            "*:443:example.com",
            "-b",
            "*:443:www.example.com",
            "-c",
            "chain.pfx",
        ])
        .unwrap();

        let request = opt.request();
        assert_eq!(request.pfx, PathBuf::from("cert.pfx"));
        assert_eq!(request.chain, Some(PathBuf::from("chain.pfx")));
        assert_eq!(request.site, "MySite");
        assert_eq!(request.bindings, vec!["*:443:example.com", "*:443:www.example.com"]);
    }

    #[test]
    fn required_args() {
        assert!(Opt::try_parse_from(["certbind", "-p", "cert.pfx", "-s", "MySite"]).is_err());
        assert!(Opt::try_parse_from(["certbind", "-s", "MySite", "-b", "*:443:"]).is_err());
        assert!(Opt::try_parse_from(["certbind", "-p", "cert.pfx", "-b", "*:443:"]).is_err());
    }

    #[test]
    fn log_file_next_to_exe() {
        let conf = AppConfig::default();
        let exe = std::env::current_exe().unwrap();

        let path = log_path(&conf, None);
        assert!(path.is_absolute());
        assert_eq!(path.parent(), exe.parent());
        assert_eq!(path.extension().unwrap(), "log");
        assert_eq!(path, logging::default_log_path(&exe, None));

        let suffixed = log_path(&conf, Some("site1"));
        assert_eq!(suffixed.parent(), exe.parent());
        assert!(suffixed
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with("_site1.log"));
    }

    #[test]
    fn log_file_from_conf() {
        let mut conf = AppConfig::default();
        conf.log.file = Some("/var/log/certbind.log".to_string());
        assert_eq!(
            log_path(&conf, Some("ignored")),
            PathBuf::from("/var/log/certbind.log")
        );
    }
}
