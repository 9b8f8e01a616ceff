//! Server-side scripts issued by the tag index.
//!
//! The store runs each script atomically. `MemoryStore` executes the same
//! semantics natively; `RedisStore` sends the Lua source (by SHA once cached).

/// Writes a value and tags it.
///
/// KEYS[1] value key, KEYS[2] tag registry, KEYS[3..] tag set keys.
/// ARGV[1] serialized value, ARGV[2] optional TTL in milliseconds.
/// Returns the number of tag sets the key was newly added to.
const ADD_WITH_TAGS: &str = r#"
local key = KEYS[1]
local registry = KEYS[2]
if ARGV[2] then
  redis.call('SET', key, ARGV[1], 'PX', ARGV[2])
else
  redis.call('SET', key, ARGV[1])
end
local added = 0
for i = 3, #KEYS do
  added = added + redis.call('SADD', KEYS[i], key)
  redis.call('SADD', registry, KEYS[i])
end
return added
"#;

/// Prunes tag members whose key no longer exists.
///
/// KEYS[1] tag registry. Empty tag sets are dropped from the registry.
/// Returns the number of members removed.
const CLEANUP_TAGS: &str = r#"
local registry = KEYS[1]
local removed = 0
for _, tag in ipairs(redis.call('SMEMBERS', registry)) do
  for _, member in ipairs(redis.call('SMEMBERS', tag)) do
    if redis.call('EXISTS', member) == 0 then
      removed = removed + redis.call('SREM', tag, member)
    end
  end
  if redis.call('SCARD', tag) == 0 then
    redis.call('SREM', registry, tag)
  end
end
return removed
"#;

/// The closed set of scripts this crate executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Script {
    AddWithTags,
    CleanupTags,
}

impl Script {
    pub fn name(&self) -> &'static str {
        match self {
            Script::AddWithTags => "add_with_tags",
            Script::CleanupTags => "cleanup_tags",
        }
    }

    pub fn lua_source(&self) -> &'static str {
        match self {
            Script::AddWithTags => ADD_WITH_TAGS,
            Script::CleanupTags => CLEANUP_TAGS,
        }
    }
}

impl std::fmt::Display for Script {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
