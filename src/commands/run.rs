//! `run`: execute an external command through the coordinator.

use super::Session;
use crate::cli::RunArgs;
use leasekeeper::coordinator::{Coordinator, GatePolicy, OperationKey, Outcome};
use leasekeeper::error::{KeeperError, Result};
use leasekeeper::store::Store;
use std::process::Command;
use std::time::Duration;

/// Run `command` to completion; a non-zero exit is a failure.
pub(super) fn run_external(command: &[String]) -> std::result::Result<bool, String> {
    let (program, rest) = command
        .split_first()
        .ok_or_else(|| "no command given".to_string())?;
    let status = Command::new(program)
        .args(rest)
        .status()
        .map_err(|e| format!("failed to start '{}': {}", program, e))?;
    if status.success() {
        Ok(true)
    } else {
        Err(format!("'{}' exited with {}", program, status))
    }
}

pub(super) fn cmd_run<S: Store + Clone + 'static>(session: &Session<S>, args: RunArgs) -> Result<()> {
    let lease = args
        .lease_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| session.config.default_lease());
    if lease.is_zero() {
        return Err(KeeperError::InvalidOperation(
            "--lease-secs must be greater than 0".to_string(),
        ));
    }

    let key = OperationKey::with_args(&args.name, &args.args);
    let coordinator =
        Coordinator::from_config(session.store.clone(), &session.config, session.clock.clone());
    let op = || run_external(&args.command);
    let outcome = match args.frequency_secs {
        Some(secs) => coordinator.execute(&key, GatePolicy::new(lease, Duration::from_secs(secs)), op),
        None => coordinator.execute_exclusive(&key, lease, op),
    };

    match outcome {
        Outcome::Completed { result: true } => Ok(()),
        Outcome::Completed { result: false } => {
            Err(KeeperError::OperationFailed(format!("{} reported failure", key)))
        }
        Outcome::Failed { error } => Err(KeeperError::OperationFailed(error)),
        Outcome::Refused(reason) => Err(KeeperError::Refused(format!("{}: {}", key, reason))),
    }
}
