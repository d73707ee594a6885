//! Argv value type handed to the registry.

use crate::error::RegistryError;
use crate::result::Result;
use std::ffi::{OsStr, OsString};
use std::fmt;

/// An executable plus its argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommand {
    program: OsString,
    args: Vec<OsString>,
}

impl ProcessCommand {
    /// Create a command for `program` with no arguments.
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
        }
    }

    /// Build a command from a full argv, the first element being the program.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::EmptyCommand`] if `argv` yields nothing.
    ///
    /// ```rust
    /// use procorg::ProcessCommand;
    ///
    /// let cmd = ProcessCommand::from_argv(["ls", "-l"]).unwrap();
    /// assert_eq!(cmd.program(), "ls");
    /// assert_eq!(cmd.to_string(), "ls -l");
    /// ```
    pub fn from_argv<I, S>(argv: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut argv = argv.into_iter();
        let program = argv.next().ok_or(RegistryError::EmptyCommand)?;
        Ok(Self::new(program).args(argv))
    }

    /// Append a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|arg| arg.as_ref().to_os_string()));
        self
    }

    /// The executable path or name.
    pub fn program(&self) -> &OsStr {
        &self.program
    }

    /// Arguments passed after the program.
    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    pub(crate) fn to_tokio(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

impl fmt::Display for ProcessCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            let arg = arg.to_string_lossy();
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {:?}", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}
