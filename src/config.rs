//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - PostgreSQL connection string
//! - `SHOP_ADDRESS` - Street address deliveries are measured from
//! - `MAP_API_KEY` - Map service access key
//!
//! ## Optional
//! - `HOST` (default: 0.0.0.0), `PORT` (default: 8083)
//! - `NATS_URL` - Event broker; events are only logged when unset
//! - `MAP_BASE_URL`, `MAP_TIMEOUT_SECS` (default: 5)
//! - `DELIVERY_RADIUS_METERS` (default: 5000), `DELIVERY_FEE` (default: 6)
//! - `PAYMENT_TIMEOUT_MINUTES` (default: 15), `DELIVERY_TIMEOUT_MINUTES` (default: 60)
//! - `SWEEP_INTERVAL_SECS` (default: 60)

use rust_decimal::Decimal;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::domain::value_objects::Money;
use crate::tasks::SweepConfig;

pub const DEFAULT_MAP_BASE_URL: &str = "https://api.map.baidu.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Clone)]
pub struct MapConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for MapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub nats_url: Option<String>,
    pub shop_address: String,
    pub map: MapConfig,
    pub delivery_radius_m: u64,
    pub delivery_fee: Money,
    pub sweep: SweepConfig,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(lookup);
        let fee: Decimal = env.parsed("DELIVERY_FEE", "6")?;
        let delivery_fee =
            Money::new(fee).map_err(|e| ConfigError::InvalidEnvVar("DELIVERY_FEE".into(), e.to_string()))?;
        Ok(Self {
            database_url: env.required("DATABASE_URL")?,
            host: env.parsed("HOST", "0.0.0.0")?,
            port: env.parsed("PORT", "8083")?,
            nats_url: env.optional("NATS_URL"),
            shop_address: env.required("SHOP_ADDRESS")?,
            map: MapConfig {
                base_url: env.optional("MAP_BASE_URL").unwrap_or_else(|| DEFAULT_MAP_BASE_URL.to_string()),
                api_key: env.required("MAP_API_KEY")?,
                timeout: Duration::from_secs(env.parsed("MAP_TIMEOUT_SECS", "5")?),
            },
            delivery_radius_m: env.parsed("DELIVERY_RADIUS_METERS", "5000")?,
            delivery_fee,
            sweep: SweepConfig {
                interval: Duration::from_secs(env.parsed("SWEEP_INTERVAL_SECS", "60")?),
                payment_timeout: chrono::Duration::minutes(env.parsed("PAYMENT_TIMEOUT_MINUTES", "15")?),
                delivery_timeout: chrono::Duration::minutes(env.parsed("DELIVERY_TIMEOUT_MINUTES", "60")?),
            },
        })
    }

    pub fn socket_addr(&self) -> SocketAddr { SocketAddr::new(self.host, self.port) }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn optional(&self, key: &str) -> Option<String> { (self.0)(key).filter(|v| !v.trim().is_empty()) }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    fn parsed<T>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.optional(key).unwrap_or_else(|| default.to_string());
        raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }
}
