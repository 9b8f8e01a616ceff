//! Deterministic keys for guarded operations.

use std::fmt;

/// Prefix for exclusive-mode keys.
pub const MUTEX_PREFIX: &str = "Mutex-";

/// Prefix for rate-gated keys.
pub const FREQUENCY_PREFIX: &str = "Frequency-";

/// Identifies one guarded operation: a stable name plus its arguments.
///
/// Renders as `name(arg1,arg2,null)`. Arguments are captured as strings when
/// added, so two keys built from equal names and equal argument renderings
/// refer to the same lease.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationKey {
    name: String,
    args: Vec<String>,
}

impl OperationKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Build a key from a name and a list of present arguments.
    pub fn with_args<I, A>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: fmt::Display,
    {
        args.into_iter()
            .fold(Self::new(name), |key, arg| key.arg(arg))
    }

    pub fn arg(mut self, arg: impl fmt::Display) -> Self {
        self.args.push(arg.to_string());
        self
    }

    /// Add an argument that may be absent; absent renders as `null`.
    pub fn opt_arg<A: fmt::Display>(mut self, arg: Option<A>) -> Self {
        self.args
            .push(arg.map_or_else(|| "null".to_string(), |a| a.to_string()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The storage key for this operation under a use-case prefix.
    pub fn prefixed(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self)
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.args.join(","))
    }
}
