use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};

const DEFAULT_DB_PATH: &str = "photomap.db";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let db_path = lookup("PHOTOMAP_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.into());
        let host = lookup("PHOTOMAP_HOST").unwrap_or_else(|| DEFAULT_HOST.into());
        let port = match lookup("PHOTOMAP_PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("PHOTOMAP_PORT is not a port number: {}", raw))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            db_path: db_path.into(),
            host,
            port,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.db_path, PathBuf::from("photomap.db"));
        assert_eq!(config.addr().unwrap().to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn overrides_and_bad_port() {
        let config = Config::from_lookup(|key| match key {
            "PHOTOMAP_HOST" => Some("127.0.0.1".into()),
            "PHOTOMAP_PORT" => Some("8080".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.addr().unwrap().to_string(), "127.0.0.1:8080");

        assert!(Config::from_lookup(|key| (key == "PHOTOMAP_PORT").then(|| "http".into())).is_err());
    }
}
