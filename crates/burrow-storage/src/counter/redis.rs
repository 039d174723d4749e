use super::CounterBackend;
use async_trait::async_trait;
use burrow_core::{Result, StoreError};
use parking_lot::RwLock;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::collections::HashMap;
use tracing::{debug, trace, warn};

/// A Redis-based implementation of [`CounterBackend`].
///
/// All commands go through one multiplexed connection, which is cloned per
/// call. Closing drops the connection; later calls fail with `Closed`.
pub struct RedisCounterBackend {
    conn: RwLock<Option<MultiplexedConnection>>,
}

fn map_redis_error(operation: &str, err: redis::RedisError) -> StoreError {
    let message = format!("{operation}: {err}");
    if err.is_timeout() || message.to_ascii_lowercase().contains("timed out") {
        StoreError::Timeout(message)
    } else if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() {
        StoreError::Unavailable(message)
    } else {
        StoreError::Operation(message)
    }
}

impl RedisCounterBackend {
    /// Wraps an established connection.
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self {
            conn: RwLock::new(Some(conn)),
        }
    }

    /// Connects to the server at `uri`, e.g. `redis://127.0.0.1:6379/0`.
    pub async fn connect(uri: &str) -> Result<Self> {
        let client = redis::Client::open(uri)
            .map_err(|e| map_redis_error("invalid Redis connection URI", e))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| map_redis_error("failed to connect to Redis", e))?;
        debug!("Connected to Redis");
        Ok(Self::new(conn))
    }

    fn connection(&self) -> Result<MultiplexedConnection> {
        self.conn.read().clone().ok_or(StoreError::Closed)
    }
}

#[async_trait]
impl CounterBackend for RedisCounterBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        trace!(key, "GET");
        let mut conn = self.connection()?;
        conn.get::<_, Option<String>>(key).await.map_err(|e| {
            warn!(key, error = %e, "Redis error on get");
            map_redis_error("failed to fetch value from Redis", e)
        })
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        trace!(key, "SET");
        let mut conn = self.connection()?;
        conn.set::<_, _, ()>(key, value).await.map_err(|e| {
            warn!(key, error = %e, "Redis error on set");
            map_redis_error("failed to write value to Redis", e)
        })
    }

    async fn incr(&self, key: &str, delta: i64) -> Result<i64> {
        trace!(key, delta, "INCRBY");
        let mut conn = self.connection()?;
        conn.incr::<_, _, i64>(key, delta).await.map_err(|e| {
            warn!(key, error = %e, "Redis error on incr");
            map_redis_error("failed to increment counter in Redis", e)
        })
    }

    async fn hset(&self, key: &str, fields: &[(&str, String)]) -> Result<()> {
        trace!(key, fields = fields.len(), "HSET");
        let mut conn = self.connection()?;
        redis::cmd("HSET")
            .arg(key)
            .arg(fields)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| {
                warn!(key, error = %e, "Redis error on hset");
                map_redis_error("failed to write hash to Redis", e)
            })
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        trace!(key, "HGETALL");
        let mut conn = self.connection()?;
        conn.hgetall::<_, HashMap<String, String>>(key)
            .await
            .map_err(|e| {
                warn!(key, error = %e, "Redis error on hgetall");
                map_redis_error("failed to fetch hash from Redis", e)
            })
    }

    async fn close(&self) -> Result<()> {
        match self.conn.write().take() {
            Some(_) => {
                debug!("Closed Redis connection");
                Ok(())
            }
            None => Err(StoreError::Closed),
        }
    }
}
