//! Tagged writes and tag lookups.

use super::cleanup::CleanupPolicy;
use crate::config::Config;
use crate::error::{KeeperError, Result};
use crate::store::{Connection, Script};
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

/// Namespace for tag membership sets.
pub const DEFAULT_TAG_PREFIX: &str = "tag:";

/// Set listing every tag set key that has been written.
pub const DEFAULT_TAG_REGISTRY_KEY: &str = "tagindex:registry";

/// Maintains tag membership sets alongside stored values.
#[derive(Debug, Clone)]
pub struct TagIndex {
    tag_prefix: String,
    registry_key: String,
    cleanup: CleanupPolicy,
}

impl Default for TagIndex {
    fn default() -> Self {
        Self {
            tag_prefix: DEFAULT_TAG_PREFIX.to_string(),
            registry_key: DEFAULT_TAG_REGISTRY_KEY.to_string(),
            cleanup: CleanupPolicy::default(),
        }
    }
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            tag_prefix: config.tag_prefix.clone(),
            registry_key: config.tag_registry_key.clone(),
            cleanup: CleanupPolicy::new(config.tag_cleanup_probability),
        }
    }

    pub fn with_cleanup_policy(mut self, cleanup: CleanupPolicy) -> Self {
        self.cleanup = cleanup;
        self
    }

    pub fn cleanup_policy(&self) -> CleanupPolicy {
        self.cleanup
    }

    pub fn registry_key(&self) -> &str {
        &self.registry_key
    }

    /// The set key holding the members of `tag`.
    pub fn tag_key(&self, tag: &str) -> String {
        format!("{}{}", self.tag_prefix, tag)
    }

    fn tag_keys<S: AsRef<str>>(&self, tags: &[S]) -> Vec<String> {
        tags.iter().map(|t| self.tag_key(t.as_ref())).collect()
    }

    /// Write `value` under `key` and add `key` to each tag's set, atomically.
    ///
    /// Returns how many tags the key was newly associated with; tags it
    /// already carried count zero. With no tags this is a plain timed set.
    pub fn set_with_tags<C, T, S>(
        &self,
        conn: &mut C,
        key: &str,
        value: &T,
        tags: &[S],
        ttl: Option<Duration>,
    ) -> Result<usize>
    where
        C: Connection + ?Sized,
        T: Serialize + ?Sized,
        S: AsRef<str>,
    {
        if key.is_empty() {
            return Err(KeeperError::InvalidOperation(
                "cannot store a tagged value under an empty key".to_string(),
            ));
        }
        let payload = serde_json::to_string(value)?;

        if tags.is_empty() {
            conn.set(key, &payload, ttl)?;
            return Ok(0);
        }
        if ttl.is_some_and(|t| t.is_zero()) {
            return Err(KeeperError::InvalidOperation(format!(
                "tagged value '{}' needs a positive TTL",
                key
            )));
        }

        self.maybe_cleanup(conn);

        let mut keys = Vec::with_capacity(tags.len() + 2);
        keys.push(key.to_string());
        keys.push(self.registry_key.clone());
        keys.extend(self.tag_keys(tags));

        let mut args = vec![payload];
        if let Some(ttl) = ttl {
            args.push(ttl.as_millis().max(1).to_string());
        }

        let added = conn.exec_script(Script::AddWithTags, &keys, &args)?;
        debug!(key, tags = tags.len(), added, "stored tagged value");
        Ok(usize::try_from(added).unwrap_or(0))
    }

    /// Every key tagged with at least one of `tags`.
    ///
    /// Keys may already have expired; see the module docs.
    pub fn get_keys_by_any_tag<C, S>(&self, conn: &mut C, tags: &[S]) -> Result<HashSet<String>>
    where
        C: Connection + ?Sized,
        S: AsRef<str>,
    {
        if tags.is_empty() {
            return Ok(HashSet::new());
        }
        self.maybe_cleanup(conn);
        match tags {
            [tag] => conn.all_members_of_set(&self.tag_key(tag.as_ref())),
            _ => conn.union_of_sets(&self.tag_keys(tags)),
        }
    }

    /// Every key tagged with all of `tags`.
    pub fn get_keys_by_all_tags<C, S>(&self, conn: &mut C, tags: &[S]) -> Result<HashSet<String>>
    where
        C: Connection + ?Sized,
        S: AsRef<str>,
    {
        if tags.is_empty() {
            return Ok(HashSet::new());
        }
        self.maybe_cleanup(conn);
        match tags {
            [tag] => conn.all_members_of_set(&self.tag_key(tag.as_ref())),
            _ => conn.intersection_of_sets(&self.tag_keys(tags)),
        }
    }

    /// Remove members whose key no longer exists and forget empty tag sets.
    ///
    /// Returns the number of members removed.
    pub fn cleanup_tags<C: Connection + ?Sized>(&self, conn: &mut C) -> Result<usize> {
        let removed = conn.exec_script(Script::CleanupTags, &[self.registry_key.clone()], &[])?;
        debug!(removed, registry = %self.registry_key, "tag cleanup finished");
        Ok(usize::try_from(removed).unwrap_or(0))
    }

    fn maybe_cleanup<C: Connection + ?Sized>(&self, conn: &mut C) {
        if !self.cleanup.should_run() {
            return;
        }
        if let Err(e) = self.cleanup_tags(conn) {
            warn!(error = %e, "tag cleanup failed");
        }
    }
}
