use std::{env, fmt::Display, net::SocketAddr, path::PathBuf, str::FromStr};

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Environment variable {0} is required")]
    Missing(&'static str),

    #[error("Invalid {key} value: {info}")]
    Invalid { key: &'static str, info: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    pub database_url: String,
    pub max_connections: u32,
    pub jwt_secret: String,
    pub media_root: PathBuf,
    pub redis_url: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            bind: try_load(&lookup, "FOODGRAM_BIND", "0.0.0.0:8000")?,
            database_url: require(&lookup, "DATABASE_URL")?,
            max_connections: try_load(&lookup, "FOODGRAM_MAX_CONNECTIONS", "10")?,
            jwt_secret: require(&lookup, "FOODGRAM_JWT_SECRET")?,
            media_root: try_load(&lookup, "FOODGRAM_MEDIA_ROOT", "media")?,
            redis_url: lookup("REDIS_URL").or_else(|| {
                log::warn!("REDIS_URL not set, caching disabled");
                None
            }),
        })
    }
}

fn require(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<String, ConfigError> {
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn try_load<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: &str,
) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    lookup(key)
        .unwrap_or_else(|| {
            log::info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            key,
            info: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn applies_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/foodgram"),
            ("FOODGRAM_JWT_SECRET", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.bind, "0.0.0.0:8000".parse().unwrap());
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.media_root, PathBuf::from("media"));
        assert!(config.redis_url.is_none());
    }

    #[test]
    fn requires_database_and_secret() {
        let result = Config::from_lookup(lookup(&[("FOODGRAM_JWT_SECRET", "secret")]));
        assert_eq!(result.unwrap_err(), ConfigError::Missing("DATABASE_URL"));

        let result = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://db")]));
        assert_eq!(result.unwrap_err(), ConfigError::Missing("FOODGRAM_JWT_SECRET"));
    }

    #[test]
    fn rejects_malformed_values() {
        let result = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db"),
            ("FOODGRAM_JWT_SECRET", "secret"),
            ("FOODGRAM_BIND", "not an address"),
        ]));
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                key: "FOODGRAM_BIND",
                ..
            })
        ));
    }
}
