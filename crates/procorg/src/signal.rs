//! Signal delivery to tracked children.
//!
//! On Unix the registry asks children to stop with SIGTERM (`destroy`) or
//! SIGINT (`kill_all`) through `nix`. Other platforms have no equivalent, so
//! both requests fall back to a forcible kill.

use crate::error::RegistryError;
use crate::result::Result;
use tokio::process::Child;

/// The kind of stop request sent to a child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// Polite termination request (SIGTERM)
    Terminate,
    /// Keyboard-style interrupt (SIGINT)
    Interrupt,
}

impl StopSignal {
    /// Conventional signal name, used in log lines.
    pub fn name(self) -> &'static str {
        match self {
            Self::Terminate => "SIGTERM",
            Self::Interrupt => "SIGINT",
        }
    }

    #[cfg(unix)]
    fn as_nix(self) -> nix::sys::signal::Signal {
        use nix::sys::signal::Signal;

        match self {
            Self::Terminate => Signal::SIGTERM,
            Self::Interrupt => Signal::SIGINT,
        }
    }
}

/// Send `signal` to the process `pid`.
///
/// The caller must only pass the pid of a child that has not been reaped yet,
/// otherwise the pid may already belong to an unrelated process.
#[cfg(unix)]
pub(crate) fn send(pid: u32, signal: StopSignal) -> Result<()> {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let raw = i32::try_from(pid).map_err(|e| RegistryError::Signal {
        pid,
        signal: signal.name(),
        reason: e.to_string(),
    })?;

    kill(Pid::from_raw(raw), signal.as_nix()).map_err(|e| RegistryError::Signal {
        pid,
        signal: signal.name(),
        reason: e.to_string(),
    })
}

/// Without signals, every stop request is a forcible kill of `child`.
#[cfg(not(unix))]
pub(crate) fn send(child: &mut Child, pid: u32, signal: StopSignal) -> Result<()> {
    force_kill(child, pid).map_err(|e| match e {
        RegistryError::Signal { pid, reason, .. } => RegistryError::Signal {
            pid,
            signal: signal.name(),
            reason,
        },
        other => other,
    })
}

/// Forcibly kill the child (SIGKILL on Unix, TerminateProcess on Windows).
pub(crate) fn force_kill(child: &mut Child, pid: u32) -> Result<()> {
    child.start_kill().map_err(|e| RegistryError::Signal {
        pid,
        signal: "SIGKILL",
        reason: e.to_string(),
    })
}
