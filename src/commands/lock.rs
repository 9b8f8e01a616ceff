//! `lock` subcommands.

use super::Session;
use crate::cli::{LockClearArgs, LockHoldArgs, LockKeyArgs};
use leasekeeper::error::{KeeperError, Result};
use leasekeeper::lease::{LockState, LockStatus};
use leasekeeper::store::Store;
use std::time::Duration;

fn print_status(status: &LockStatus) {
    println!("Lock {}:", status.key);
    println!("  Key:        {}", status.lock_key);
    match status.token {
        Some(token) => println!("  Token:      {}", token),
        None => println!("  Value:      {:?}", status.raw),
    }
    match status.state {
        LockState::Live { expires_at } => {
            println!("  Status:     LIVE");
            println!("  Expires:    {}", expires_at.format("%Y-%m-%d %H:%M:%S%.3f UTC"));
        }
        LockState::Expired { expired_at } => {
            println!("  Status:     EXPIRED (next acquirer takes it over)");
            println!("  Expired:    {}", expired_at.format("%Y-%m-%d %H:%M:%S%.3f UTC"));
        }
        LockState::Corrupted => println!("  Status:     CORRUPTED (not a fencing token)"),
    }
}

pub(super) fn cmd_lock_inspect<S: Store>(session: &Session<S>, args: LockKeyArgs) -> Result<()> {
    let mut conn = session.connect()?;
    match session.locker().inspect(&mut conn, &args.key)? {
        Some(status) => print_status(&status),
        None => println!("No lock on '{}'.", args.key),
    }
    Ok(())
}

pub(super) fn cmd_lock_clear<S: Store>(session: &Session<S>, args: LockClearArgs) -> Result<()> {
    // Require --force flag
    if !args.force {
        return Err(KeeperError::InvalidOperation(format!(
            "refusing to clear lock without --force flag.\n\n\
             Clearing a live lock lets a second holder in while the first is still working.\n\
             Only clear locks if you are certain the holder has crashed.\n\n\
             To clear the lock, run:\n  leasekeeper lock clear {} --force",
            args.key
        )));
    }

    let mut conn = session.connect()?;
    match session.locker().clear(&mut conn, &args.key)? {
        Some(status) => {
            if status.is_live() {
                println!("Warning: the cleared lease was still live.");
            }
            println!("Cleared lock {} (value {}).", status.lock_key, status.raw);
        }
        None => println!("No lock on '{}'.", args.key),
    }
    Ok(())
}

pub(super) fn cmd_lock_hold<S: Store>(session: &Session<S>, args: LockHoldArgs) -> Result<()> {
    let lease = args
        .lease_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| session.config.default_lease());
    let timeout = args
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| session.config.acquisition_timeout());

    let mut conn = session.connect()?;
    let guard = session
        .locker()
        .lock_or_fail(&mut conn, &args.key, lease, timeout)?;
    println!("Acquired {}.", guard.lease());
    if let Some(expires_at) = guard.lease().expires_at() {
        println!("  Expires:    {}", expires_at.format("%Y-%m-%d %H:%M:%S%.3f UTC"));
    }

    std::thread::sleep(Duration::from_secs(args.hold_secs));
    guard.release();
    println!("Released.");
    Ok(())
}
