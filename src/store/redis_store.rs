//! Redis backend built on the `redis` crate's blocking client.

use super::{Command, Connection, Script, Store};
use crate::error::{KeeperError, Result};
use std::collections::HashSet;
use std::time::Duration;

impl From<redis::RedisError> for KeeperError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error()
            || err.is_timeout()
            || err.is_connection_dropped()
            || err.is_connection_refusal()
        {
            KeeperError::StoreUnavailable(err.to_string())
        } else {
            KeeperError::StoreCommand(err.to_string())
        }
    }
}

/// A Redis server reachable at a single connection string.
#[derive(Debug, Clone)]
pub struct RedisStore {
    client: redis::Client,
    add_with_tags: redis::Script,
    cleanup_tags: redis::Script,
}

impl RedisStore {
    /// Create a store for `url` (e.g. `redis://127.0.0.1:6379/`).
    ///
    /// No connection is made until [`Store::connect`] is called.
    pub fn open(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| {
            KeeperError::Config(format!("invalid store url '{}': {}", url, e))
        })?;
        Ok(Self {
            client,
            add_with_tags: redis::Script::new(Script::AddWithTags.lua_source()),
            cleanup_tags: redis::Script::new(Script::CleanupTags.lua_source()),
        })
    }
}

impl Store for RedisStore {
    type Conn = RedisConnection;

    fn connect(&self) -> Result<RedisConnection> {
        let conn = self.client.get_connection()?;
        Ok(RedisConnection {
            conn,
            add_with_tags: self.add_with_tags.clone(),
            cleanup_tags: self.cleanup_tags.clone(),
        })
    }
}

/// A blocking connection to a [`RedisStore`].
pub struct RedisConnection {
    conn: redis::Connection,
    add_with_tags: redis::Script,
    cleanup_tags: redis::Script,
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}

impl Connection for RedisConnection {
    fn get(&mut self, key: &str) -> Result<Option<String>> {
        Ok(redis::cmd("GET").arg(key).query(&mut self.conn)?)
    }

    fn set(&mut self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        match ttl {
            Some(ttl) if ttl.is_zero() => {
                redis::cmd("DEL").arg(key).query::<i64>(&mut self.conn)?;
            }
            Some(ttl) => {
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("PX")
                    .arg(ttl_millis(ttl))
                    .query::<()>(&mut self.conn)?;
            }
            None => {
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .query::<()>(&mut self.conn)?;
            }
        }
        Ok(())
    }

    fn set_if_absent(&mut self, key: &str, value: &str) -> Result<bool> {
        Ok(redis::cmd("SETNX")
            .arg(key)
            .arg(value)
            .query(&mut self.conn)?)
    }

    fn get_and_set(&mut self, key: &str, value: &str) -> Result<Option<String>> {
        Ok(redis::cmd("GETSET")
            .arg(key)
            .arg(value)
            .query(&mut self.conn)?)
    }

    fn remove(&mut self, key: &str) -> Result<bool> {
        let removed: i64 = redis::cmd("DEL").arg(key).query(&mut self.conn)?;
        Ok(removed > 0)
    }

    fn watch(&mut self, key: &str) -> Result<()> {
        redis::cmd("WATCH").arg(key).query::<()>(&mut self.conn)?;
        Ok(())
    }

    fn unwatch(&mut self) -> Result<()> {
        redis::cmd("UNWATCH").query::<()>(&mut self.conn)?;
        Ok(())
    }

    fn transaction(&mut self, commands: &[Command]) -> Result<bool> {
        let mut pipe = redis::pipe();
        pipe.atomic();
        for command in commands {
            match command {
                Command::Set { key, value, ttl } => match ttl {
                    Some(ttl) if ttl.is_zero() => {
                        pipe.cmd("DEL").arg(key.as_str());
                    }
                    Some(ttl) => {
                        pipe.cmd("SET")
                            .arg(key.as_str())
                            .arg(value.as_str())
                            .arg("PX")
                            .arg(ttl_millis(*ttl));
                    }
                    None => {
                        pipe.cmd("SET").arg(key.as_str()).arg(value.as_str());
                    }
                },
                Command::Remove { key } => {
                    pipe.cmd("DEL").arg(key.as_str());
                }
            }
        }
        // EXEC replies nil when a watched key changed.
        let replies: Option<Vec<redis::Value>> = pipe.query(&mut self.conn)?;
        Ok(replies.is_some())
    }

    fn exec_script(&mut self, script: Script, keys: &[String], args: &[String]) -> Result<i64> {
        let source = match script {
            Script::AddWithTags => &self.add_with_tags,
            Script::CleanupTags => &self.cleanup_tags,
        };
        let mut invocation = source.prepare_invoke();
        for key in keys {
            invocation.key(key.as_str());
        }
        for arg in args {
            invocation.arg(arg.as_str());
        }
        Ok(invocation.invoke(&mut self.conn)?)
    }

    fn all_members_of_set(&mut self, set_key: &str) -> Result<HashSet<String>> {
        Ok(redis::cmd("SMEMBERS").arg(set_key).query(&mut self.conn)?)
    }

    fn union_of_sets(&mut self, set_keys: &[String]) -> Result<HashSet<String>> {
        if set_keys.is_empty() {
            return Ok(HashSet::new());
        }
        Ok(redis::cmd("SUNION").arg(set_keys).query(&mut self.conn)?)
    }

    fn intersection_of_sets(&mut self, set_keys: &[String]) -> Result<HashSet<String>> {
        if set_keys.is_empty() {
            return Ok(HashSet::new());
        }
        Ok(redis::cmd("SINTER").arg(set_keys).query(&mut self.conn)?)
    }
}
