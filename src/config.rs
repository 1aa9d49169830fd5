use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::Context;

use crate::listing::DEFAULT_PAGE_SIZE;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: Option<String>,
    pub bind_addr: SocketAddr,
    pub page_size: usize,
    pub max_upload_bytes: usize,
    pub max_connections: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());
        let bind_addr = parse_or(&lookup, "BIND_ADDR", DEFAULT_BIND_ADDR.parse()?)?;
        let page_size = parse_or::<usize, _>(&lookup, "PAGE_SIZE", DEFAULT_PAGE_SIZE)?.max(1);
        let max_upload_bytes = parse_or(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;
        let max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;

        Ok(Config {
            database_url,
            bind_addr,
            page_size,
            max_upload_bytes,
            max_connections,
        })
    }

    pub fn require_database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to a production Postgres instance")
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.database_url, None);
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR.parse().unwrap());
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert!(config.require_database_url().is_err());
    }

    #[test]
    fn values_are_read_and_page_size_is_at_least_one() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/faculty"),
            ("BIND_ADDR", "0.0.0.0:9000"),
            ("PAGE_SIZE", "0"),
            ("DB_MAX_CONNECTIONS", "12"),
        ]))
        .unwrap();
        assert_eq!(config.require_database_url().unwrap(), "postgres://localhost/faculty");
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.page_size, 1);
        assert_eq!(config.max_connections, 12);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = Config::from_lookup(lookup(&[("PAGE_SIZE", "lots")])).unwrap_err();
        assert!(err.to_string().contains("PAGE_SIZE"));
    }
}
