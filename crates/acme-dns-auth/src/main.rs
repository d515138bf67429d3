// # acme-dns-auth - Certbot manual-auth hook
//
// This binary is a THIN integration layer:
// 1. Reading configuration (conf.json + environment variables)
// 2. Reading the invocation inputs provided by certbot
// 3. Initializing logging and the runtime
// 4. Running the AuthHook and printing operator output
//
// All registration, storage and update logic lives in acmedns-core and
// acmedns-client.
//
// ## Configuration
//
// `conf.json` next to the executable (or the file named by `ACME_DNS_CONFIG`),
// overridden by environment variables:
//
// - `ACME_DNS__ACMEDNS_URL`: acme-dns base URL (required)
// - `ACME_DNS__STORAGE_PATH`: credential storage file
// - `ACME_DNS__ALLOW_FROM`: networks allowed to update new accounts
// - `ACME_DNS__FORCE_REGISTER`: register even if an account is stored
// - `ACME_DNS__USE_MTLS`, `ACME_DNS__MTLS_CERT_PATH`, `ACME_DNS__MTLS_KEY_PATH`
// - `ACME_DNS__SERVER_CERT_PATH`, `ACME_DNS__SKIP_VERIFY_SERVER_CERT`
// - `ACME_DNS__LOG_LEVEL`: trace, debug, info, warn (default), error
//
// ## Invocation
//
// ```bash
// certbot certonly --manual --preferred-challenges dns \
//     --manual-auth-hook /etc/letsencrypt/acme-dns-auth \
//     -d example.org -d '*.example.org'
// ```
//
// certbot provides `CERTBOT_DOMAIN` and `CERTBOT_VALIDATION`.

use acmedns_client::AcmeDnsClient;
use acmedns_core::{
    AuthHook, ClientConfig, FileCredentialStore, HookEvent, ValidationContext,
};
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{Level, debug, info};
use tracing_subscriber::FmtSubscriber;

/// Variable naming an explicit configuration file
const CONFIG_PATH_VAR: &str = "ACME_DNS_CONFIG";

/// Configuration file looked up next to the executable
const CONFIG_FILE_NAME: &str = "conf.json";

/// Exit codes for different termination scenarios
#[derive(Debug, Clone, Copy)]
enum HookExitCode {
    /// Token published
    Success = 0,
    /// Configuration, invocation or local storage error
    ConfigError = 1,
    /// Remote service or transport error
    RuntimeError = 2,
}

impl From<HookExitCode> for ExitCode {
    fn from(code: HookExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Inputs provided by certbot for one validation
struct Invocation {
    domain: String,
    token: String,
}

impl Invocation {
    /// Read `CERTBOT_DOMAIN` and `CERTBOT_VALIDATION`
    fn from_env() -> acmedns_core::Result<Self> {
        let require = |name: &str| {
            env::var(name)
                .ok()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| acmedns_core::Error::config(format!("{} is not set", name)))
        };

        Ok(Self {
            domain: require("CERTBOT_DOMAIN")?,
            token: require("CERTBOT_VALIDATION")?,
        })
    }
}

fn main() -> ExitCode {
    let log_level = match env::var("ACME_DNS__LOG_LEVEL")
        .unwrap_or_else(|_| "warn".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => {
            eprintln!(
                "ERROR: ACME_DNS__LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                other
            );
            return HookExitCode::ConfigError.into();
        }
    };

    // stdout is reserved for operator instructions
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("ERROR: Failed to set tracing subscriber: {}", e);
        return HookExitCode::ConfigError.into();
    }

    match run() {
        Ok(()) => HookExitCode::Success.into(),
        Err(e) => {
            eprintln!("ERROR: {:#}", e);
            exit_code_for(&e).into()
        }
    }
}

/// Resolve configuration and inputs, then run the hook to completion
fn run() -> Result<()> {
    let config = load_config()?;
    let invocation = Invocation::from_env()?;
    let ctx = ValidationContext::new(&invocation.domain, &invocation.token)?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    rt.block_on(run_hook(config, ctx))
}

async fn run_hook(config: ClientConfig, ctx: ValidationContext) -> Result<()> {
    let store = FileCredentialStore::load(&config.storage_path).await?;
    let client = AcmeDnsClient::new(&config)?;

    let (hook, mut events) = AuthHook::new(
        Box::new(client),
        Box::new(store),
        config.hook_options(),
    );

    let result = hook.run(&ctx).await;

    // Print the CNAME notice even when the update that followed failed
    while let Ok(event) = events.try_recv() {
        match event {
            HookEvent::AccountRegistered { cname, .. } => {
                println!(
                    "Please add the following CNAME record to your main DNS zone:\n{}",
                    cname
                );
            }
            HookEvent::TxtUpdated { domain, subdomain } => {
                debug!("TXT updated for {} (subdomain {})", domain, subdomain);
            }
        }
    }

    let report = result?;
    info!("Challenge token published for {}", report.domain);
    Ok(())
}

/// Defaults, then the configuration file, then environment overrides
fn load_config() -> Result<ClientConfig> {
    let mut config = match config_file() {
        Some(ConfigFile::Explicit(path)) => ClientConfig::load_required_file(&path)?,
        Some(ConfigFile::Implicit(path)) => ClientConfig::load_file(&path)?.unwrap_or_default(),
        None => ClientConfig::default(),
    };

    config.apply_env()?;
    config.validate()?;

    debug!(
        "Configuration loaded: url={} storage={} allow_from={:?} force_register={}",
        config.acmedns_url,
        config.storage_path.display(),
        config.allow_from,
        config.force_register
    );
    Ok(config)
}

/// Where the configuration file comes from
#[derive(Debug, PartialEq, Eq)]
enum ConfigFile {
    /// Named by `ACME_DNS_CONFIG`; must exist
    Explicit(PathBuf),
    /// `conf.json` next to the executable; may be absent
    Implicit(PathBuf),
}

fn config_file() -> Option<ConfigFile> {
    resolve_config_file(env::var(CONFIG_PATH_VAR).ok(), env::current_exe().ok())
}

fn resolve_config_file(explicit: Option<String>, exe: Option<PathBuf>) -> Option<ConfigFile> {
    if let Some(path) = explicit
        && !path.is_empty()
    {
        return Some(ConfigFile::Explicit(PathBuf::from(path)));
    }

    exe.and_then(|exe| exe.parent().map(|dir| ConfigFile::Implicit(dir.join(CONFIG_FILE_NAME))))
}

fn exit_code_for(err: &anyhow::Error) -> HookExitCode {
    match err.downcast_ref::<acmedns_core::Error>() {
        Some(e) if !e.is_configuration() => HookExitCode::RuntimeError,
        Some(_) => HookExitCode::ConfigError,
        None => HookExitCode::RuntimeError,
    }
}
