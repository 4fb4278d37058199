use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;

use canary_core::{DEFAULT_TOKEN_EXPIRATION, Settings};

pub const DEFAULT_CONFIG_FILE: &str = "canary.conf";

/// Command-line flags. Each one can also come from a `CANARY_*` variable.
#[derive(Debug, Parser)]
#[command(name = "canary", version, about = "Canary tripwire server")]
pub struct Args {
    /// Config file with KEY=VALUE lines, skipped when missing
    #[arg(long, env = "CANARY_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Verbose logging
    #[arg(long, env = "CANARY_DEBUG")]
    pub debug: bool,

    /// Database location (./canary.db, :memory:)
    #[arg(long, env = "CANARY_DATABASE")]
    pub database: Option<String>,

    /// Listen address (127.0.0.1:8080)
    #[arg(long, env = "CANARY_LISTENER")]
    pub listener: Option<String>,

    /// Base path of the API (/api)
    #[arg(long = "base", env = "CANARY_BASE_PATH")]
    pub base_path: Option<String>,

    /// Close registration and create an admin account instead
    #[arg(long = "no-registration", env = "CANARY_NO_REGISTRATION")]
    pub no_registration: bool,

    /// Also append logs to this file
    #[arg(long, env = "CANARY_LOG")]
    pub log: Option<PathBuf>,

    /// Token lifetime in seconds
    #[arg(long, env = "CANARY_TOKEN_EXPIRATION_SECS")]
    pub token_expiration_secs: Option<u64>,

    /// PEM certificate chain; serves HTTPS together with --key
    #[arg(long, env = "CANARY_CERT")]
    pub cert: Option<PathBuf>,

    /// PEM private key for --cert
    #[arg(long, env = "CANARY_KEY")]
    pub key: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub debug: bool,
    pub database: String,
    pub listener: String,
    pub base_path: String,
    pub no_registration: bool,
    pub log: Option<PathBuf>,
    pub token_expiration: Duration,
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            debug: false,
            database: canary_db::IN_MEMORY.to_string(),
            listener: "127.0.0.1:8080".to_string(),
            base_path: "/api".to_string(),
            no_registration: false,
            log: None,
            token_expiration: DEFAULT_TOKEN_EXPIRATION,
            cert: None,
            key: None,
        }
    }
}

impl ServerConfig {
    /// Defaults, then the config file, then flags. Returns the config and any
    /// file keys that were not recognised.
    pub fn load(args: &Args) -> Result<(Self, Vec<String>)> {
        let mut config = Self::default();
        let mut ignored = Vec::new();
        if args.config.is_file() {
            ignored = config.apply_file(&args.config)?;
        }
        config.apply_args(args)?;
        config.tls_files()?;
        Ok((config, ignored))
    }

    pub fn apply_file(&mut self, path: &Path) -> Result<Vec<String>> {
        let entries = dotenvy::from_path_iter(path)
            .with_context(|| format!("Cannot read config file {}", path.display()))?;

        let mut ignored = Vec::new();
        for entry in entries {
            let (key, value) =
                entry.with_context(|| format!("Malformed line in {}", path.display()))?;
            if !self.apply_entry(&key, &value)? {
                ignored.push(key);
            }
        }
        Ok(ignored)
    }

    /// Returns false for keys this server does not know.
    fn apply_entry(&mut self, key: &str, value: &str) -> Result<bool> {
        match key.to_ascii_uppercase().as_str() {
            "DEBUG" => self.debug = parse_bool(key, value)?,
            "DATABASE" => self.database = value.to_string(),
            "LISTENER" => self.listener = value.to_string(),
            "BASE_PATH" => self.base_path = value.to_string(),
            "NO_REGISTRATION" => self.no_registration = parse_bool(key, value)?,
            "LOG" => self.log = optional_path(value),
            "CERT" | "PUBLIC_KEY" => self.cert = optional_path(value),
            "KEY" | "PRIVATE_KEY" => self.key = optional_path(value),
            "TOKEN_EXPIRATION_SECS" => {
                let secs = value
                    .parse()
                    .with_context(|| format!("{} must be a number of seconds, got '{}'", key, value))?;
                self.token_expiration = expiration(secs)?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Flags only ever switch booleans on.
    pub fn apply_args(&mut self, args: &Args) -> Result<()> {
        if args.debug {
            self.debug = true;
        }
        if args.no_registration {
            self.no_registration = true;
        }
        if let Some(database) = &args.database {
            self.database = database.clone();
        }
        if let Some(listener) = &args.listener {
            self.listener = listener.clone();
        }
        if let Some(base_path) = &args.base_path {
            self.base_path = base_path.clone();
        }
        if let Some(log) = &args.log {
            self.log = Some(log.clone());
        }
        if let Some(secs) = args.token_expiration_secs {
            self.token_expiration = expiration(secs)?;
        }
        if let Some(cert) = &args.cert {
            self.cert = Some(cert.clone());
        }
        if let Some(key) = &args.key {
            self.key = Some(key.clone());
        }
        Ok(())
    }

    /// Certificate and key when HTTPS is configured. Only one of them is an error.
    pub fn tls_files(&self) -> Result<Option<(&Path, &Path)>> {
        match (&self.cert, &self.key) {
            (Some(cert), Some(key)) => Ok(Some((cert.as_path(), key.as_path()))),
            (None, None) => Ok(None),
            (Some(_), None) => bail!("A TLS certificate was given without its private key"),
            (None, Some(_)) => bail!("A TLS private key was given without its certificate"),
        }
    }

    pub fn core_settings(&self) -> Settings {
        Settings {
            token_expiration: self.token_expiration,
            registration_enabled: !self.no_registration,
            ..Settings::default()
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => bail!("{} must be true or false, got '{}'", key, value),
    }
}

fn optional_path(value: &str) -> Option<PathBuf> {
    (!value.is_empty()).then(|| PathBuf::from(value))
}

fn expiration(secs: u64) -> Result<Duration> {
    if secs == 0 {
        bail!("Token expiration must be at least one second");
    }
    Ok(Duration::from_secs(secs))
}
