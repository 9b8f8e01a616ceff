//! Tag index over stored values.
//!
//! A value written with tags is also recorded as a member of one set per tag,
//! so callers can fetch every key carrying any (union) or all (intersection)
//! of a group of tags.
//!
//! # Layout
//!
//! - Values live under their own key, serialized as JSON.
//! - The members of tag `T` live in the set `{tag_prefix}T` (default `tag:T`).
//! - Every tag set ever written is listed in the registry set
//!   (default `tagindex:registry`), which is what cleanup walks.
//!
//! # Staleness
//!
//! Tag sets are not expired alongside the values they point at. Keys returned
//! by a lookup may already be gone; re-read them if that matters. Stale
//! members are pruned by [`TagIndex::cleanup_tags`], which also runs on a
//! random fraction of calls according to the index's [`CleanupPolicy`].

mod cleanup;
mod index;


pub use cleanup::{CleanupPolicy, DEFAULT_CLEANUP_PROBABILITY};
pub use index::{DEFAULT_TAG_PREFIX, DEFAULT_TAG_REGISTRY_KEY, TagIndex};
