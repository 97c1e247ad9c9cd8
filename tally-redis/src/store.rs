use crate::error::RedisError;
use log::{debug, trace};
use r2d2::{CustomizeConnection, Pool, PooledConnection};
use redis::{Commands, Connection, Script};
use std::{fmt, time::Duration};
use tally_core::{CounterKey, CounterRecord, CounterStore, Created, Raised};

// Returns -1 when the hash is absent, 1 when raised and 0 otherwise.
// Lua numbers are doubles, so counts are compared as canonical decimal strings.
const RAISE_SCRIPT: &str = r"
local function less(a, b)
  local a_neg = a:sub(1, 1) == '-'
  local b_neg = b:sub(1, 1) == '-'
  if a_neg ~= b_neg then
    return a_neg
  end
  if a_neg then
    a, b = b:sub(2), a:sub(2)
  end
  if #a ~= #b then
    return #a < #b
  end
  return a < b
end

local count = redis.call('HGET', KEYS[1], 'count')
if not count then
  return -1
end
if less(count, ARGV[1]) then
  redis.call('HSET', KEYS[1], 'count', ARGV[2])
  return 1
end
return 0
";

// Refuses to materialize a counter that HINCRBY would otherwise create at zero.
const INCREMENT_SCRIPT: &str = r"
if redis.call('HEXISTS', KEYS[1], 'count') == 0 then
  return false
end
return redis.call('HINCRBY', KEYS[1], 'count', ARGV[1])
";

/// Key layout and connection settings for a [RedisCounterStore].
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct Config {
    key_prefix: String,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    checkout_timeout: Duration,
}

impl Config {
    /// Counters are stored under `<key_prefix>:counter:`.
    pub fn new<S: Into<String>>(key_prefix: S) -> Self {
        Config {
            key_prefix: key_prefix.into(),
            read_timeout: Some(Duration::from_secs(5)),
            write_timeout: Some(Duration::from_secs(5)),
            checkout_timeout: Duration::from_secs(30),
        }
    }

    /// Sets the socket read and write timeouts of pooled connections.
    pub fn with_socket_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self.write_timeout = timeout;
        self
    }

    /// Sets how long to wait for a pooled connection.
    pub fn with_checkout_timeout(mut self, timeout: Duration) -> Self {
        self.checkout_timeout = timeout;
        self
    }

    /// The key prefix.
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// The Redis key of the hash holding `key`'s counter.
    pub fn counter_key(&self, key: &CounterKey) -> Result<String, RedisError> {
        let encoded = serde_json::to_string(&(key.model(), key.field(), key.group()))?;

        let mut redis_key = String::with_capacity(self.key_prefix.len() + encoded.len() + 9);
        redis_key.push_str(&self.key_prefix);
        redis_key.push_str(":counter:");
        redis_key.push_str(&encoded);
        Ok(redis_key)
    }

    fn counter_pattern(&self) -> String {
        format!("{}:counter:*", self.key_prefix)
    }
}

/// Applies socket timeouts to every connection as it is checked out of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketTimeouts {
    /// Read timeout.
    pub read: Option<Duration>,

    /// Write timeout.
    pub write: Option<Duration>,
}

impl CustomizeConnection<Connection, redis::RedisError> for SocketTimeouts {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), redis::RedisError> {
        conn.set_read_timeout(self.read)?;
        conn.set_write_timeout(self.write)
    }
}

/// A counter store keeping one hash per counter, with fields `model`, `field`,
/// `group` and `count`.
pub struct RedisCounterStore {
    pool: Pool<redis::Client>,
    config: Config,
    raise: Script,
    increment: Script,
}

impl fmt::Debug for RedisCounterStore {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RedisCounterStore")
            .field("config", &self.config)
            .field("pool", &self.pool.state())
            .finish()
    }
}

impl RedisCounterStore {
    /// Opens a pool against a `redis://` URL, applying the configured timeouts.
    pub fn connect(url: &str, config: Config) -> Result<Self, RedisError> {
        let client = redis::Client::open(url)?;
        let pool = Pool::builder()
            .connection_timeout(config.checkout_timeout)
            .connection_customizer(Box::new(SocketTimeouts {
                read: config.read_timeout,
                write: config.write_timeout,
            }))
            .build(client)?;

        Ok(RedisCounterStore::with_pool(pool, config))
    }

    /// Wraps an existing pool. Its own customizer governs socket timeouts.
    pub fn with_pool(pool: Pool<redis::Client>, config: Config) -> Self {
        RedisCounterStore {
            pool,
            config,
            raise: Script::new(RAISE_SCRIPT),
            increment: Script::new(INCREMENT_SCRIPT),
        }
    }

    /// The store's configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Every counter under the key prefix, ordered by key.
    pub fn records(&self) -> Result<Vec<CounterRecord>, RedisError> {
        let mut conn = self.conn()?;
        let keys: Vec<String> = conn.scan_match::<_, String>(self.config.counter_pattern())?.collect();

        let mut records = Vec::with_capacity(keys.len());
        for redis_key in keys {
            let (model, field, group, count): (Option<String>, Option<String>, Option<String>, Option<i64>) =
                redis::cmd("HMGET")
                    .arg(&redis_key)
                    .arg("model")
                    .arg("field")
                    .arg("group")
                    .arg("count")
                    .query(&mut *conn)?;

            if let (Some(model), Some(field), Some(count)) = (model, field, count) {
                records.push(CounterRecord {
                    key: CounterKey::new(model, field, group.unwrap_or_default()),
                    count,
                });
            }
        }

        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }

    fn conn(&self) -> Result<PooledConnection<redis::Client>, RedisError> {
        Ok(self.pool.get()?)
    }
}

impl CounterStore for RedisCounterStore {
    type Error = RedisError;

    fn initialize(&self) -> Result<(), Self::Error> {
        let mut conn = self.conn()?;
        let _: String = redis::cmd("PING").query(&mut *conn)?;
        debug!("counter store ready under {}:counter:", self.config.key_prefix);
        Ok(())
    }

    fn find(&self, key: &CounterKey) -> Result<Option<CounterRecord>, Self::Error> {
        let redis_key = self.config.counter_key(key)?;
        let mut conn = self.conn()?;
        let count: Option<i64> = conn.hget(&redis_key, "count")?;

        trace!("counter {}: loaded; count: {:?}", key, count);
        Ok(count.map(|count| CounterRecord {
            key: key.to_owned(),
            count,
        }))
    }

    fn create_if_absent(&self, key: &CounterKey, initial_count: i64) -> Result<Created, Self::Error> {
        let redis_key = self.config.counter_key(key)?;
        let mut conn = self.conn()?;

        let (inserted,): (bool,) = redis::pipe()
            .atomic()
            .hset_nx(&redis_key, "count", initial_count)
            .hset_multiple(&redis_key, &[("model", key.model()), ("field", key.field()), ("group", key.group())])
            .ignore()
            .query(&mut *conn)?;

        trace!("counter {}: create inserted: {}", key, inserted);
        Ok(if inserted { Created::Inserted } else { Created::Conflict })
    }

    fn compare_and_raise(&self, key: &CounterKey, lower_bound: i64, new_count: i64) -> Result<Raised, Self::Error> {
        let redis_key = self.config.counter_key(key)?;
        let mut conn = self.conn()?;

        let outcome: i64 = self
            .raise
            .key(&redis_key)
            .arg(lower_bound)
            .arg(new_count)
            .invoke(&mut *conn)?;

        match outcome {
            1 => {
                trace!("counter {}: raised; count: {}", key, new_count);
                Ok(Raised::Updated)
            }
            0 => Ok(Raised::NotApplied),
            _ => Err(RedisError::Missing(key.to_owned())),
        }
    }

    fn increment_and_get(&self, key: &CounterKey, delta: i64) -> Result<i64, Self::Error> {
        let redis_key = self.config.counter_key(key)?;
        let mut conn = self.conn()?;

        let count: Option<i64> = self.increment.key(&redis_key).arg(delta).invoke(&mut *conn)?;

        match count {
            Some(count) => {
                trace!("counter {}: incremented; count: {}", key, count);
                Ok(count)
            }
            None => Err(RedisError::Missing(key.to_owned())),
        }
    }

    fn set_count(&self, key: &CounterKey, value: i64) -> Result<i64, Self::Error> {
        let redis_key = self.config.counter_key(key)?;
        let mut conn = self.conn()?;

        let () = redis::pipe()
            .atomic()
            .hset(&redis_key, "count", value)
            .ignore()
            .hset_multiple(&redis_key, &[("model", key.model()), ("field", key.field()), ("group", key.group())])
            .ignore()
            .query(&mut *conn)?;

        trace!("counter {}: set; count: {}", key, value);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_keys_embed_the_whole_identity() {
        let config = Config::new("app");
        assert_eq!(
            config.counter_key(&CounterKey::new("Invoice", "number", "acme")).unwrap(),
            r#"app:counter:["Invoice","number","acme"]"#,
        );
        assert_eq!(
            config.counter_key(&CounterKey::ungrouped("User", "_id")).unwrap(),
            r#"app:counter:["User","_id",""]"#,
        );
    }

    #[test]
    fn separators_inside_names_cannot_collide() {
        let config = Config::new("app");
        let a = config.counter_key(&CounterKey::new("a:b", "c", "")).unwrap();
        let b = config.counter_key(&CounterKey::new("a", "b:c", "")).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn socket_timeout_applies_to_both_directions() {
        let config = Config::new("app").with_socket_timeout(None);
        assert_eq!(config.read_timeout, None);
        assert_eq!(config.write_timeout, None);
        assert_eq!(config.counter_pattern(), "app:counter:*");
    }
}
