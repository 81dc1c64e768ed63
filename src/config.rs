// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Perceptia

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `GATEWAY_LISTEN_ADDR` | Server bind address | `0.0.0.0:443` |
//! | `GATEWAY_TLSCERTPATH` | PEM certificate chain | Required |
//! | `GATEWAY_TLSKEYPATH` | PEM private key | Required |
//! | `GATEWAY_SESSION_KEY` | HMAC key for session tokens | Required |
//! | `GATEWAY_REDIS_ADDRESS` | Session cache `host:port` | `localhost:6379` |
//! | `GATEWAY_SESSION_DURATION_SECS` | Sliding session lifetime | `86400` |
//! | `GATEWAY_STORE_TIMEOUT_MS` | Per-call session store timeout | `2000` |
//! | `GATEWAY_ENVIRONMENT` | `development` or `production` | `development` |
//! | `GATEWAY_API_SCHEME` | Public scheme for `Location` headers | `https` |
//! | `GATEWAY_API_HOST` | Public host for `Location` headers | `localhost` |
//! | `GATEWAY_API_PORT` | Public port for `Location` headers | `443` |
//! | `AQREST_HOSTNAME` | Backend proxied under `/api/aqrest/` | Required |
//! | `AQREST_PORT` | Backend port | `80` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const LISTEN_ADDR_ENV: &str = "GATEWAY_LISTEN_ADDR";
pub const TLS_CERT_PATH_ENV: &str = "GATEWAY_TLSCERTPATH";
pub const TLS_KEY_PATH_ENV: &str = "GATEWAY_TLSKEYPATH";
pub const SESSION_KEY_ENV: &str = "GATEWAY_SESSION_KEY";
pub const REDIS_ADDRESS_ENV: &str = "GATEWAY_REDIS_ADDRESS";
pub const SESSION_DURATION_ENV: &str = "GATEWAY_SESSION_DURATION_SECS";
pub const STORE_TIMEOUT_ENV: &str = "GATEWAY_STORE_TIMEOUT_MS";
pub const ENVIRONMENT_ENV: &str = "GATEWAY_ENVIRONMENT";
pub const API_SCHEME_ENV: &str = "GATEWAY_API_SCHEME";
pub const API_HOST_ENV: &str = "GATEWAY_API_HOST";
pub const API_PORT_ENV: &str = "GATEWAY_API_PORT";
pub const AQREST_HOSTNAME_ENV: &str = "AQREST_HOSTNAME";
pub const AQREST_PORT_ENV: &str = "AQREST_PORT";

/// Environment variable for log output format.
///
/// Values: `json` for structured logs, anything else for human-readable.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_RUST_LOG: &str = "info,tower_http=debug";

/// Sessions expire after a day without use.
pub const DEFAULT_SESSION_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 2000;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {0} must be set")]
    Missing(&'static str),

    #[error("environment variable {name} has an invalid value: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

/// Public address of the gateway, used to build absolute `Location` headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicApi {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl PublicApi {
    /// Absolute URL for `path`, omitting the default port of the scheme.
    pub fn url(&self, path: &str) -> String {
        let default_port = matches!(
            (self.scheme.as_str(), self.port),
            ("https", 443) | ("http", 80)
        );
        if default_port {
            format!("{}://{}{}", self.scheme, self.host, path)
        } else {
            format!("{}://{}:{}{}", self.scheme, self.host, self.port, path)
        }
    }
}

impl Default for PublicApi {
    fn default() -> Self {
        Self {
            scheme: "https".into(),
            host: "localhost".into(),
            port: 443,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub listen_addr: SocketAddr,
    pub tls_cert_path: PathBuf,
    pub tls_key_path: PathBuf,
    pub session_key: String,
    pub redis_address: String,
    pub session_duration: Duration,
    pub store_timeout: Duration,
    pub environment: Environment,
    pub public_api: PublicApi,
    pub aqrest_hostname: String,
    pub aqrest_port: u16,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &'static str| lookup(name).filter(|v| !v.is_empty());
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let session_duration_secs: u64 = parse_or(
            get(SESSION_DURATION_ENV),
            SESSION_DURATION_ENV,
            DEFAULT_SESSION_DURATION.as_secs(),
        )?;
        let store_timeout_ms: u64 =
            parse_or(get(STORE_TIMEOUT_ENV), STORE_TIMEOUT_ENV, DEFAULT_STORE_TIMEOUT_MS)?;
        if session_duration_secs == 0 {
            return Err(ConfigError::Invalid {
                name: SESSION_DURATION_ENV,
                reason: "must be greater than zero".into(),
            });
        }

        Ok(Self {
            listen_addr: parse_or(
                get(LISTEN_ADDR_ENV),
                LISTEN_ADDR_ENV,
                SocketAddr::from(([0, 0, 0, 0], 443)),
            )?,
            tls_cert_path: PathBuf::from(require(TLS_CERT_PATH_ENV)?),
            tls_key_path: PathBuf::from(require(TLS_KEY_PATH_ENV)?),
            session_key: require(SESSION_KEY_ENV)?,
            redis_address: get(REDIS_ADDRESS_ENV).unwrap_or_else(|| "localhost:6379".into()),
            session_duration: Duration::from_secs(session_duration_secs),
            store_timeout: Duration::from_millis(store_timeout_ms),
            environment: parse_or(get(ENVIRONMENT_ENV), ENVIRONMENT_ENV, Environment::Development)?,
            public_api: PublicApi {
                scheme: get(API_SCHEME_ENV).unwrap_or_else(|| "https".into()),
                host: get(API_HOST_ENV).unwrap_or_else(|| "localhost".into()),
                port: parse_or(get(API_PORT_ENV), API_PORT_ENV, 443)?,
            },
            aqrest_hostname: require(AQREST_HOSTNAME_ENV)?,
            aqrest_port: parse_or(get(AQREST_PORT_ENV), AQREST_PORT_ENV, 80)?,
        })
    }

    /// Base URL requests under `/api/aqrest/` are forwarded to.
    pub fn aqrest_base_url(&self) -> String {
        format!("http://{}:{}", self.aqrest_hostname, self.aqrest_port)
    }
}

fn parse_or<T>(raw: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
    }
}
