//! KeyDB/Redis-backed record store over a fred connection pool.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use fred::clients::Pool;
use fred::interfaces::{ClientLike, KeysInterface, SetsInterface};
use fred::types::config::{Config as FredConfig, ReconnectPolicy, ServerConfig};
use fred::types::Expiration;
use tracing::info;

use crate::error::{AppError, AppResult};

use super::RecordStore;

pub struct KeyDbStore {
    pool: Pool,
}

impl KeyDbStore {
    /// Build and initialise a pool against `endpoint` (`host:port`, with an
    /// optional `redis://` prefix).
    pub async fn connect(endpoint: &str) -> Result<Self> {
        let trimmed = endpoint
            .trim_start_matches("rediss://")
            .trim_start_matches("redis://");
        let (host, port) = parse_host_port(trimmed)?;
        let server = ServerConfig::new_centralized(host, port);
        let config = FredConfig { server, ..FredConfig::default() };

        let mut builder = fred::types::Builder::from_config(config);
        builder.set_policy(ReconnectPolicy::new_exponential(0, 100, 30_000, 2));
        let pool = builder.build_pool(3)?;
        pool.init().await.context("failed to connect to the record store")?;

        info!(endpoint, "record store pool initialised");
        Ok(Self { pool })
    }
}

fn parse_host_port(endpoint: &str) -> Result<(String, u16)> {
    match endpoint.rsplit_once(':') {
        Some((host, port)) => {
            let port: u16 = port
                .parse()
                .with_context(|| format!("invalid store port in '{endpoint}'"))?;
            Ok((host.to_string(), port))
        }
        None => Ok((endpoint.to_string(), 6379)),
    }
}

fn store_err(err: fred::error::Error) -> AppError {
    AppError::store("store_failure", err.to_string())
}

#[async_trait]
impl RecordStore for KeyDbStore {
    async fn get(&self, key: &str) -> AppResult<String> {
        let val: Option<String> = self.pool.get(key).await.map_err(store_err)?;
        val.ok_or_else(|| AppError::not_found("not_found", format!("key '{key}' not present")))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()> {
        let expiration = ttl.map(|d| Expiration::EX(d.as_secs() as i64));
        let _: () = self
            .pool
            .set(key, value, expiration, None, false)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn add_member(&self, set_key: &str, member: &str) -> AppResult<()> {
        let _: i64 = self.pool.sadd(set_key, member).await.map_err(store_err)?;
        Ok(())
    }

    async fn members(&self, set_key: &str) -> AppResult<Vec<String>> {
        let keys: Vec<String> = self.pool.smembers(set_key).await.map_err(store_err)?;
        Ok(keys)
    }
}
