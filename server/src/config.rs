//! Server configuration.

use std::str::FromStr;
use std::time::Duration;

use pairledger_ledger::{LedgerConfig, PostgresConfig};

/// Which store engine backs the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// PostgreSQL through a connection pool.
    Postgres,
    /// Process-local store; contents are lost on exit.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("Unknown store backend: {other}")),
        }
    }
}

/// Database pool configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database URL.
    pub url: String,
    /// Maximum pooled connections.
    pub max_connections: u32,
    /// Connection acquire timeout.
    pub acquire_timeout: Duration,
    /// Row lock wait limit inside a transaction.
    pub lock_timeout: Duration,
    /// Startup connection attempts.
    pub connect_attempts: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let defaults = PostgresConfig::default();
        Self {
            url: defaults.database_url,
            max_connections: defaults.max_connections,
            acquire_timeout: defaults.acquire_timeout,
            lock_timeout: defaults.lock_timeout,
            connect_attempts: defaults.connect_attempts,
        }
    }
}

/// Main server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address.
    pub listen_addr: String,
    /// Listen port.
    pub listen_port: u16,
    /// Store backend.
    pub backend: StoreBackend,
    /// Database configuration, used by the postgres backend.
    pub database: DatabaseConfig,
    /// Upper bound on a single transfer.
    pub transfer_timeout: Option<Duration>,
    /// Log level used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 8080,
            backend: StoreBackend::Postgres,
            database: DatabaseConfig::default(),
            transfer_timeout: Some(Duration::from_secs(30)),
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from `lookup`, falling back to defaults for unset
    /// keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("PAIRLEDGER_LISTEN_ADDR") {
            config.listen_addr = addr;
        }

        if let Some(port) = lookup("PAIRLEDGER_LISTEN_PORT") {
            config.listen_port = parse_var("PAIRLEDGER_LISTEN_PORT", &port)?;
        }

        if let Some(backend) = lookup("PAIRLEDGER_STORE") {
            config.backend = backend.parse()?;
        }

        if let Some(url) = lookup("DATABASE_URL") {
            config.database.url = url;
        }

        if let Some(max) = lookup("PAIRLEDGER_MAX_CONNECTIONS") {
            config.database.max_connections = parse_var("PAIRLEDGER_MAX_CONNECTIONS", &max)?;
        }

        if let Some(ms) = lookup("PAIRLEDGER_ACQUIRE_TIMEOUT_MS") {
            config.database.acquire_timeout =
                Duration::from_millis(parse_var("PAIRLEDGER_ACQUIRE_TIMEOUT_MS", &ms)?);
        }

        if let Some(ms) = lookup("PAIRLEDGER_LOCK_TIMEOUT_MS") {
            config.database.lock_timeout =
                Duration::from_millis(parse_var("PAIRLEDGER_LOCK_TIMEOUT_MS", &ms)?);
        }

        if let Some(attempts) = lookup("PAIRLEDGER_CONNECT_ATTEMPTS") {
            config.database.connect_attempts =
                parse_var("PAIRLEDGER_CONNECT_ATTEMPTS", &attempts)?;
        }

        // 0 disables the bound.
        if let Some(ms) = lookup("PAIRLEDGER_TRANSFER_TIMEOUT_MS") {
            let ms: u64 = parse_var("PAIRLEDGER_TRANSFER_TIMEOUT_MS", &ms)?;
            config.transfer_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }

        if let Some(level) = lookup("LOG_LEVEL") {
            config.log_level = level;
        }

        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_port == 0 {
            return Err("Listen port cannot be 0".to_string());
        }

        if self.backend == StoreBackend::Postgres {
            if self.database.url.is_empty() {
                return Err("Database URL cannot be empty".to_string());
            }
            if self.database.max_connections == 0 {
                return Err("Connection pool needs at least one connection".to_string());
            }
        }

        if self.transfer_timeout == Some(Duration::ZERO) {
            return Err("Transfer timeout cannot be 0".to_string());
        }

        Ok(())
    }

    /// Address to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.listen_addr, self.listen_port)
    }

    /// PostgreSQL store settings.
    pub fn postgres_config(&self) -> PostgresConfig {
        PostgresConfig {
            database_url: self.database.url.clone(),
            max_connections: self.database.max_connections,
            acquire_timeout: self.database.acquire_timeout,
            lock_timeout: self.database.lock_timeout,
            connect_attempts: self.database.connect_attempts,
            ..PostgresConfig::default()
        }
    }

    /// Ledger settings. The HTTP surface always runs the strict amount
    /// policy.
    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            transfer_timeout: self.transfer_timeout,
            ..LedgerConfig::default()
        }
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("Invalid value for {key}: {value}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_invalid_config() {
        let mut config = ServerConfig::default();
        config.listen_port = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.database.url.clear();
        assert!(config.validate().is_err());

        // The memory backend ignores the database URL.
        config.backend = StoreBackend::Memory;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PAIRLEDGER_LISTEN_PORT", "9000"),
            ("PAIRLEDGER_STORE", "Memory"),
            ("PAIRLEDGER_LOCK_TIMEOUT_MS", "1500"),
            ("PAIRLEDGER_TRANSFER_TIMEOUT_MS", "0"),
            ("DATABASE_URL", "postgres://db/ledger"),
        ]))
        .unwrap();

        assert_eq!(config.listen_port, 9000);
        assert_eq!(config.backend, StoreBackend::Memory);
        assert_eq!(config.database.lock_timeout, Duration::from_millis(1500));
        assert_eq!(config.transfer_timeout, None);
        assert_eq!(config.postgres_config().database_url, "postgres://db/ledger");
        assert_eq!(config.ledger_config().transfer_timeout, None);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        assert!(ServerConfig::from_lookup(lookup(&[("PAIRLEDGER_LISTEN_PORT", "http")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("PAIRLEDGER_STORE", "redis")])).is_err());
    }
}
