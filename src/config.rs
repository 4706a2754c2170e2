//! Service settings for Turnstile.
//!
//! Settings are layered: built-in defaults, then an optional settings file,
//! then `TURNSTILE_*` environment variables. Command line flags are applied on
//! top by the binary.

use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use crate::error::{Result, TurnstileError};

const DEFAULT_LISTEN_ADDR: &str = ":4000";
const DEFAULT_RULES_PATH: &str = "./configs/config.json";
const DEFAULT_LOG_FILTER: &str = "info";

/// Main configuration for the Turnstile service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on; `:port` binds every interface
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Path to the route rules file
    #[serde(default = "default_rules_path")]
    pub rules_path: PathBuf,

    /// `tracing` filter directive, e.g. `info` or `turnstile=debug`
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            rules_path: default_rules_path(),
            log_filter: default_log_filter(),
        }
    }
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

fn default_rules_path() -> PathBuf {
    PathBuf::from(DEFAULT_RULES_PATH)
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl ServerConfig {
    /// Assemble settings from defaults, an optional file and the environment.
    pub fn load(settings_file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("listen_addr", DEFAULT_LISTEN_ADDR)?
            .set_default("rules_path", DEFAULT_RULES_PATH)?
            .set_default("log_filter", DEFAULT_LOG_FILTER)?;

        if let Some(path) = settings_file {
            builder = builder.add_source(File::from(path));
        }

        let settings = builder
            .add_source(Environment::with_prefix("TURNSTILE"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Resolve the listen address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        parse_listen_addr(&self.listen_addr)
    }
}

/// Parse `host:port`, or a bare `:port` meaning every IPv4 interface.
pub fn parse_listen_addr(addr: &str) -> Result<SocketAddr> {
    if let Some(port) = addr.strip_prefix(':') {
        let port: u16 = port
            .parse()
            .map_err(|_| TurnstileError::Config(format!("invalid port in listen address {addr:?}")))?;
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port));
    }

    addr.parse()
        .map_err(|_| TurnstileError::Config(format!("invalid listen address {addr:?}")))
}
