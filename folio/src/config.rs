use std::time::Duration;

use serde::Deserialize;
use url::Url;

use folio_errors::FolioError;
use folio_wire::{Credentials, PoolConfig};

/// Engine configuration, deserializable from whatever config format the
/// host embeds it in (TOML, JSON, env vars via a host-side layer); this
/// crate just needs `serde::Deserialize`, not a specific format.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// `redis://[user[:pass]@]host:port[/db]`
    pub endpoint: Url,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub receive_timeout_ms: u64,
    /// Prefix applied to generated ids; does not affect ids supplied by
    /// the host directly.
    #[serde(default)]
    pub id_prefix: String,
    /// Key holding the set of all record ids (`SMEMBERS`-able).
    #[serde(default = "default_id_index_key")]
    pub id_index_key: String,
}

fn default_pool_size() -> usize {
    8
}
fn default_timeout_ms() -> u64 {
    5_000
}
fn default_id_index_key() -> String {
    "idx:all".to_owned()
}

impl Config {
    pub fn builder(endpoint: Url) -> ConfigBuilder {
        ConfigBuilder(Config {
            endpoint,
            pool_size: default_pool_size(),
            connect_timeout_ms: default_timeout_ms(),
            receive_timeout_ms: default_timeout_ms(),
            id_prefix: String::new(),
            id_index_key: default_id_index_key(),
        })
    }

    pub(crate) fn pool_config(&self) -> Result<PoolConfig, FolioError> {
        let db = self
            .endpoint
            .path()
            .trim_start_matches('/')
            .parse::<u32>()
            .ok();
        let credentials = if self.endpoint.username().is_empty() && self.endpoint.password().is_none()
        {
            None
        } else {
            Some(Credentials {
                username: Some(self.endpoint.username().to_owned()).filter(|u| !u.is_empty()),
                password: self.endpoint.password().map(|p| p.to_owned()),
            })
        };
        let host = self
            .endpoint
            .host_str()
            .ok_or_else(|| FolioError::commit("endpoint has no host"))?;
        let port = self.endpoint.port().unwrap_or(6379);
        Ok(PoolConfig {
            endpoint: format!("{host}:{port}"),
            db,
            credentials,
            size: self.pool_size,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            receive_timeout: Duration::from_millis(self.receive_timeout_ms),
        })
    }
}

/// A builder mirroring the engine's own `Config`, for callers constructing
/// one in code rather than deserializing it.
pub struct ConfigBuilder(Config);

impl ConfigBuilder {
    pub fn pool_size(mut self, n: usize) -> Self {
        self.0.pool_size = n;
        self
    }

    pub fn connect_timeout(mut self, d: Duration) -> Self {
        self.0.connect_timeout_ms = d.as_millis() as u64;
        self
    }

    pub fn receive_timeout(mut self, d: Duration) -> Self {
        self.0.receive_timeout_ms = d.as_millis() as u64;
        self
    }

    pub fn id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.0.id_prefix = prefix.into();
        self
    }

    pub fn id_index_key(mut self, key: impl Into<String>) -> Self {
        self.0.id_index_key = key.into();
        self
    }

    pub fn build(self) -> Config {
        self.0
    }
}
