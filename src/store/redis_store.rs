//! Redis implementation of the keyed store.
//!
//! Regular commands share one `ConnectionManager` (multiplexed, reconnects on
//! failure) that is cloned per call. Blocking pops run on separate
//! connections: a parked BRPOP on the shared connection would hold up every
//! other command queued behind it. Those connections are kept in an idle pool
//! and reused, so each concurrent poller holds one connection for its
//! lifetime instead of opening one per poll.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::AsyncCommands;
use tracing::{debug, warn};

use super::{Store, StoreError, StoreOp, WriteBatch};

/// Keyed store backed by a Redis server.
#[derive(Clone)]
pub struct RedisStore {
    /// Client used to open dedicated connections for blocking commands.
    client: redis::Client,
    /// Shared connection for all non-blocking commands.
    redis: ConnectionManager,
    /// Blocking connections not currently in a BRPOP.
    blocking: Arc<IdleConnections<MultiplexedConnection>>,
}

impl RedisStore {
    /// Connects to Redis.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ConnectionFailed` if the connection fails.
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        let redis = ConnectionManager::new(client.clone())
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        debug!(redis_url = %redact_url(redis_url), "Connected to Redis");

        Ok(Self {
            client,
            redis,
            blocking: Arc::new(IdleConnections::new()),
        })
    }

    fn conn(&self) -> ConnectionManager {
        self.redis.clone()
    }

    /// Takes an idle blocking connection, opening a new one if none is parked.
    async fn checkout_blocking(&self) -> Result<MultiplexedConnection, StoreError> {
        if let Some(conn) = self.blocking.checkout() {
            return Ok(conn);
        }
        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;
        debug!("Opened blocking Redis connection");
        Ok(conn)
    }
}

/// Connections parked between uses.
///
/// A connection is handed to one caller at a time. Callers return it only
/// after a clean round trip, so a broken connection is dropped, not reused.
struct IdleConnections<C> {
    idle: Mutex<Vec<C>>,
}

impl<C> IdleConnections<C> {
    fn new() -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
        }
    }

    fn checkout(&self) -> Option<C> {
        match self.idle.lock() {
            Ok(mut idle) => idle.pop(),
            Err(_) => None,
        }
    }

    fn checkin(&self, conn: C) {
        match self.idle.lock() {
            Ok(mut idle) => idle.push(conn),
            Err(_) => warn!("Idle connection pool poisoned, dropping connection"),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn push_front(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: () = conn.lpush(key, value).await?;
        Ok(())
    }

    async fn pop_back(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn();
        let value: Option<String> = redis::cmd("RPOP").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn blocking_pop_back(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<String>, StoreError> {
        let mut conn = self.checkout_blocking().await?;

        // BRPOP takes whole seconds, 0 would block forever
        let timeout_secs = timeout_secs(timeout);

        let popped: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(key)
            .arg(timeout_secs)
            .query_async(&mut conn)
            .await?;

        self.blocking.checkin(conn);
        Ok(popped.map(|(_, value)| value))
    }

    async fn pop_back_push_front(
        &self,
        src: &str,
        dst: &str,
    ) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn();
        let value: Option<String> = redis::cmd("RPOPLPUSH")
            .arg(src)
            .arg(dst)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn();
        let values: Vec<String> = conn.lrange(key, 0, -1).await?;
        Ok(values)
    }

    async fn list_remove(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        let mut conn = self.conn();
        let removed: usize = conn.lrem(key, 0, value).await?;
        Ok(removed)
    }

    async fn list_len(&self, key: &str) -> Result<usize, StoreError> {
        let mut conn = self.conn();
        let len: usize = conn.llen(key).await?;
        Ok(len)
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: () = conn.sadd(key, member).await?;
        Ok(())
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: () = conn.srem(key, member).await?;
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn();
        let members: Vec<String> = conn.smembers(key).await?;
        Ok(members)
    }

    async fn set_cardinality(&self, key: &str) -> Result<usize, StoreError> {
        let mut conn = self.conn();
        let len: usize = conn.scard(key).await?;
        Ok(len)
    }

    async fn set_pop(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn();
        let member: Option<String> = redis::cmd("SPOP").arg(key).query_async(&mut conn).await?;
        Ok(member)
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.conn();
        let value: Option<Vec<u8>> = conn.hget(key, field).await?;
        Ok(value)
    }

    async fn hash_set(&self, key: &str, field: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: () = conn.hset(key, field, value).await?;
        Ok(())
    }

    async fn hash_delete(&self, key: &str, field: &str) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: () = conn.hdel(key, field).await?;
        Ok(())
    }

    async fn keys_matching_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn();
        let pattern = format!("{}*", escape_glob(prefix));
        let keys: Vec<String> = conn.keys(pattern).await?;
        Ok(keys)
    }

    async fn apply(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in batch.into_ops() {
            match op {
                StoreOp::HashSet { key, field, value } => {
                    pipe.hset(key, field, value).ignore();
                }
                StoreOp::HashDelete { key, field } => {
                    pipe.hdel(key, field).ignore();
                }
                StoreOp::PushFront { key, value } => {
                    pipe.lpush(key, value).ignore();
                }
                StoreOp::SetAdd { key, member } => {
                    pipe.sadd(key, member).ignore();
                }
                StoreOp::SetRemove { key, member } => {
                    pipe.srem(key, member).ignore();
                }
            }
        }

        let mut conn = self.conn();
        pipe.query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }
}

fn timeout_secs(timeout: Duration) -> u64 {
    let secs = timeout.as_secs();
    if timeout.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs.max(1)
    }
}

/// Escapes the glob metacharacters understood by KEYS.
fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Hides the password part of a Redis URL for logging.
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}
