//! Command implementations for leasekeeper.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations. Handlers are generic over the store so they can be
//! exercised against `MemoryStore`; the binary always talks to Redis.

mod lock;
mod run;
mod tags;


use crate::cli::{Cli, Command, LockAction, TagsAction};
use leasekeeper::clock::{Clock, SystemClock};
use leasekeeper::config::Config;
use leasekeeper::error::Result;
use leasekeeper::lease::Locker;
use leasekeeper::store::{RedisStore, Store};
use leasekeeper::tags::TagIndex;
use std::sync::Arc;

/// What every command handler needs.
pub struct Session<S: Store> {
    pub config: Config,
    pub store: S,
    pub clock: Arc<dyn Clock>,
}

impl<S: Store> Session<S> {
    pub fn connect(&self) -> Result<S::Conn> {
        self.store.connect()
    }

    pub fn locker(&self) -> Locker {
        Locker::from_config(&self.config, self.clock.clone())
    }

    pub fn tag_index(&self) -> TagIndex {
        TagIndex::from_config(&self.config)
    }
}

/// Dispatch a command to its implementation.
///
/// Resolves the config, opens the store named by it, and routes the command
/// to its handler.
pub fn dispatch(cli: Cli) -> Result<()> {
    let config = Config::resolve(cli.config.as_deref())?;
    let store = RedisStore::open(&config.store_url)?;
    let session = Session {
        config,
        store,
        clock: Arc::new(SystemClock),
    };
    execute(&session, cli.command)
}

/// Run one command against an established session.
pub fn execute<S: Store + Clone + 'static>(session: &Session<S>, command: Command) -> Result<()> {
    match command {
        Command::Lock(lock_cmd) => match lock_cmd.action {
            LockAction::Inspect(args) => lock::cmd_lock_inspect(session, args),
            LockAction::Clear(args) => lock::cmd_lock_clear(session, args),
            LockAction::Hold(args) => lock::cmd_lock_hold(session, args),
        },
        Command::Tags(tags_cmd) => match tags_cmd.action {
            TagsAction::Set(args) => tags::cmd_tags_set(session, args),
            TagsAction::Any(args) => tags::cmd_tags_any(session, args),
            TagsAction::All(args) => tags::cmd_tags_all(session, args),
            TagsAction::Cleanup => tags::cmd_tags_cleanup(session),
        },
        Command::Run(args) => run::cmd_run(session, args),
    }
}
