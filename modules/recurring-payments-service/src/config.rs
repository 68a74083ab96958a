//! Service configuration, read once at startup and immutable afterwards.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, SecondsFormat, Utc};
use ed25519_dalek::SigningKey;
use ed25519_dalek::pkcs8::DecodePrivateKey;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub mod env_vars {
    pub const WALLET_ADDRESS_URL: &str = "OPEN_PAYMENTS_WALLET_ADDRESS_URL";
    pub const KEY_ID: &str = "OPEN_PAYMENTS_KEY_ID";
    pub const PRIVATE_KEY_PATH: &str = "OPEN_PAYMENTS_PRIVATE_KEY_PATH";
    pub const HTTP_TIMEOUT_SECS: &str = "OPEN_PAYMENTS_HTTP_TIMEOUT_SECS";
    pub const HOST: &str = "RECURRING_PAYMENTS_HOST";
    pub const PORT: &str = "RECURRING_PAYMENTS_PORT";
    pub const ADDITIONAL_PAYMENTS: &str = "RECURRING_ADDITIONAL_PAYMENTS";
    pub const INTERVAL_REPETITIONS: &str = "RECURRING_INTERVAL_REPETITIONS";
    pub const INTERVAL_START: &str = "RECURRING_INTERVAL_START";
    pub const INTERVAL_PERIOD_SECS: &str = "RECURRING_INTERVAL_PERIOD_SECS";
}

pub const DEFAULT_PRIVATE_KEY_PATH: &str = "private.key";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_ADDITIONAL_PAYMENTS: u32 = 4;
pub const DEFAULT_INTERVAL_REPETITIONS: u32 = 20;
/// 2024-10-01T11:06:00Z
pub const DEFAULT_INTERVAL_START_UNIX: i64 = 1_727_780_760;
pub const DEFAULT_INTERVAL_PERIOD_SECS: u64 = 60;

/// Repeating interval placed in outgoing-payment grant limits
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentInterval {
    pub repetitions: u32,
    pub start: DateTime<Utc>,
    pub period_secs: u64,
}

impl Default for PaymentInterval {
    fn default() -> Self {
        Self {
            repetitions: DEFAULT_INTERVAL_REPETITIONS,
            start: DateTime::from_timestamp(DEFAULT_INTERVAL_START_UNIX, 0).unwrap_or_default(),
            period_secs: DEFAULT_INTERVAL_PERIOD_SECS,
        }
    }
}

impl PaymentInterval {
    /// ISO-8601 repeating interval, e.g. `R20/2024-10-01T11:06:00Z/PT1M`
    pub fn to_iso8601(&self) -> String {
        format!(
            "R{}/{}/{}",
            self.repetitions,
            self.start.to_rfc3339_opts(SecondsFormat::Secs, true),
            iso8601_duration(self.period_secs)
        )
    }
}

fn iso8601_duration(secs: u64) -> String {
    if secs == 0 {
        return "PT0S".to_string();
    }
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    let mut out = String::from("PT");
    if hours > 0 {
        out.push_str(&format!("{}H", hours));
    }
    if minutes > 0 {
        out.push_str(&format!("{}M", minutes));
    }
    if seconds > 0 {
        out.push_str(&format!("{}S", seconds));
    }
    out
}

/// How many transfers to run after consent, and how the grant bounds them
#[derive(Debug, Clone, PartialEq)]
pub struct RecurringSchedule {
    /// Rotate-and-transfer cycles after the first payment
    pub additional_payments: u32,
    pub interval: PaymentInterval,
}

impl Default for RecurringSchedule {
    fn default() -> Self {
        Self {
            additional_payments: DEFAULT_ADDITIONAL_PAYMENTS,
            interval: PaymentInterval::default(),
        }
    }
}

/// Who this service is when talking to authorization servers
#[derive(Debug, Clone, PartialEq)]
pub struct ClientIdentity {
    pub wallet_address_url: String,
    pub key_id: String,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub identity: ClientIdentity,
    pub private_key_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub http_timeout_secs: u64,
    pub schedule: RecurringSchedule,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from any variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| -> Result<String, String> {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| format!("{} not set", name))
        };

        let wallet_address_url = crate::client::normalize_wallet_address_url(&required(
            env_vars::WALLET_ADDRESS_URL,
        )?);
        let key_id = required(env_vars::KEY_ID)?;

        let interval_start = match lookup(env_vars::INTERVAL_START) {
            Some(raw) => DateTime::parse_from_rfc3339(raw.trim())
                .map(|d| d.with_timezone(&Utc))
                .map_err(|e| format!("{} is not an RFC 3339 instant: {}", env_vars::INTERVAL_START, e))?,
            None => PaymentInterval::default().start,
        };

        let period_secs: u64 = parse_or(
            &lookup,
            env_vars::INTERVAL_PERIOD_SECS,
            DEFAULT_INTERVAL_PERIOD_SECS,
        )?;
        if period_secs == 0 {
            return Err(format!("{} must be greater than zero", env_vars::INTERVAL_PERIOD_SECS));
        }

        Ok(Self {
            identity: ClientIdentity {
                wallet_address_url,
                key_id,
            },
            private_key_path: lookup(env_vars::PRIVATE_KEY_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PRIVATE_KEY_PATH)),
            host: lookup(env_vars::HOST).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(&lookup, env_vars::PORT, DEFAULT_PORT)?,
            http_timeout_secs: parse_or(
                &lookup,
                env_vars::HTTP_TIMEOUT_SECS,
                DEFAULT_HTTP_TIMEOUT_SECS,
            )?,
            schedule: RecurringSchedule {
                additional_payments: parse_or(
                    &lookup,
                    env_vars::ADDITIONAL_PAYMENTS,
                    DEFAULT_ADDITIONAL_PAYMENTS,
                )?,
                interval: PaymentInterval {
                    repetitions: parse_or(
                        &lookup,
                        env_vars::INTERVAL_REPETITIONS,
                        DEFAULT_INTERVAL_REPETITIONS,
                    )?,
                    start: interval_start,
                    period_secs,
                },
            },
        })
    }
}

fn parse_or<T, F>(lookup: &F, name: &str, default: T) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| format!("{} has invalid value '{}': {}", name, raw, e)),
        None => Ok(default),
    }
}

/// Load the Ed25519 signing key from a PEM file
pub fn load_signing_key(path: &Path) -> Result<SigningKey, String> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read private key {}: {}", path.display(), e))?;
    parse_signing_key(&contents)
}

/// Accepts a PKCS#8 PEM document, or the same document base64-encoded
/// (the form wallet providers hand out for copy/paste).
pub fn parse_signing_key(contents: &str) -> Result<SigningKey, String> {
    let trimmed = contents.trim();
    if trimmed.contains("-----BEGIN") {
        return SigningKey::from_pkcs8_pem(trimmed)
            .map_err(|e| format!("Invalid Ed25519 private key: {}", e));
    }

    let decoded = BASE64
        .decode(trimmed)
        .map_err(|e| format!("Private key is neither PEM nor base64: {}", e))?;
    let pem = String::from_utf8(decoded)
        .map_err(|_| "Base64 private key does not contain a PEM document".to_string())?;
    SigningKey::from_pkcs8_pem(pem.trim())
        .map_err(|e| format!("Invalid Ed25519 private key: {}", e))
}
