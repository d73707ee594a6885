//! Error taxonomy for the process registry.
//!
//! Registry operations never hand these errors to the caller. They are raised
//! by the internal helpers and translated at the operation boundary into a log
//! line plus an absent result. Configuration loading is the one place where an
//! error is returned as-is.
//!
//! # Error Hierarchy
//!
//! ```text
//! RegistryError
//! ├── EmptyCommand
//! ├── Spawn { name, command, source }
//! ├── MissingPid { name }
//! ├── Signal { pid, signal, reason }
//! ├── Wait { name, source }
//! ├── Output { name, reason }
//! └── Config(String)
//! ```

use std::io;
use thiserror::Error;

/// Top-level error type for registry internals and configuration loading.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The argv handed to `create` did not contain a program.
    #[error("Command is empty, nothing to execute")]
    EmptyCommand,

    /// The executable could not be found or launched.
    #[error("Starting process \"{name}\" with command \"{command}\": {source}")]
    Spawn {
        /// Name the caller wanted to register the process under
        name: String,
        /// Rendered command line
        command: String,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// The child was spawned but reported no process identifier.
    #[error("Process \"{name}\" was spawned without a process id")]
    MissingPid {
        /// Name of the affected process
        name: String,
    },

    /// Delivering a signal to a tracked child failed.
    #[error("Failed to send {signal} to PID {pid}: {reason}")]
    Signal {
        /// Target process id
        pid: u32,
        /// Signal name, e.g. `SIGTERM`
        signal: &'static str,
        /// OS-level reason
        reason: String,
    },

    /// Polling or waiting on a child failed.
    #[error("Failed to wait on process \"{name}\": {source}")]
    Wait {
        /// Name of the affected process
        name: String,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// The captured output of a child could not be collected.
    #[error("Failed to collect output of process \"{name}\": {reason}")]
    Output {
        /// Name of the affected process
        name: String,
        /// What went wrong
        reason: String,
    },

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RegistryError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns `true` if the error means the executable was missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Spawn { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}
