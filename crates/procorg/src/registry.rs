//! The process registry: named children, their state, and their output.
//!
//! Every tracked child moves through `Created -> Running -> Exited -> Removed`.
//! Only [`ProcessRegistry::destroy`] removes a record; an exited child stays
//! visible through [`ProcessRegistry::get_children`] and friends until then.

use crate::command::ProcessCommand;
use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::logger::{RegistryLogger, TracingLogger};
use crate::result::Result;
use crate::signal::{self, StopSignal};
use std::ffi::OsStr;
use std::fmt;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout};
use tokio::task::JoinHandle;
use tracing::debug;

/// How a child is started.
///
/// The default spawns in the background with stdout inherited from the
/// controlling process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpawnOptions {
    /// Wait for the child to exit before `create` returns.
    pub blocking: bool,
    /// Pipe stdout into a buffer retrievable after exit.
    pub capture_output: bool,
}

impl SpawnOptions {
    /// Background child, stdout inherited.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether `create` waits for the child to exit.
    pub fn blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }

    /// Set whether stdout is captured.
    pub fn capture_output(mut self, capture_output: bool) -> Self {
        self.capture_output = capture_output;
        self
    }
}

/// How long a drain waits for the reader to reach EOF once the child has
/// exited. A grandchild that inherited stdout can hold the pipe open forever.
const OUTPUT_SETTLE: Duration = Duration::from_millis(100);

#[derive(Debug)]
enum CapturedOutput {
    NotCaptured,
    Collecting(OutputReader),
    Drained,
}

/// Reader task appending the stdout pipe into a shared buffer.
#[derive(Debug)]
struct OutputReader {
    buffer: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<std::io::Result<()>>,
}

impl OutputReader {
    fn start(mut stdout: ChildStdout) -> Self {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buffer);
        let task = tokio::spawn(async move {
            let mut chunk = [0u8; 8192];
            loop {
                let read = stdout.read(&mut chunk).await?;
                if read == 0 {
                    return Ok(());
                }
                match sink.lock() {
                    Ok(mut bytes) => bytes.extend_from_slice(&chunk[..read]),
                    Err(poisoned) => poisoned.into_inner().extend_from_slice(&chunk[..read]),
                }
            }
        });
        Self { buffer, task }
    }

    /// Everything read so far, waiting at most `settle` for EOF.
    ///
    /// The reader is stopped afterwards; bytes written later are discarded.
    async fn finish(mut self, name: &str, settle: Duration) -> Result<Vec<u8>> {
        match tokio::time::timeout(settle, &mut self.task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(err))) => {
                return Err(RegistryError::Output {
                    name: name.to_string(),
                    reason: err.to_string(),
                });
            }
            Ok(Err(err)) => {
                return Err(RegistryError::Output {
                    name: name.to_string(),
                    reason: err.to_string(),
                });
            }
            Err(_) => {
                debug!(name = %name, "stdout still held open after exit, taking what was read");
            }
        }

        let bytes = match self.buffer.lock() {
            Ok(mut bytes) => std::mem::take(&mut *bytes),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        Ok(bytes)
    }
}

impl Drop for OutputReader {
    fn drop(&mut self) {
        self.task.abort();
    }
}

enum Drain {
    NotCaptured,
    Exhausted,
    Text(String),
}

/// A child process tracked under a caller-assigned name.
#[derive(Debug)]
pub struct TrackedProcess {
    name: String,
    pid: u32,
    command: ProcessCommand,
    blocking: bool,
    capture_output: bool,
    started_at: SystemTime,
    child: Child,
    exit_status: Option<ExitStatus>,
    output: CapturedOutput,
}

impl TrackedProcess {
    fn spawn(
        name: String,
        command: ProcessCommand,
        options: SpawnOptions,
        config: &RegistryConfig,
    ) -> Result<Self> {
        let mut cmd = command.to_tokio();
        cmd.stdout(if options.capture_output {
            Stdio::piped()
        } else {
            Stdio::inherit()
        })
        .kill_on_drop(config.kill_on_drop);

        let started_at = SystemTime::now();
        let mut child = cmd.spawn().map_err(|source| RegistryError::Spawn {
            name: name.clone(),
            command: command.to_string(),
            source,
        })?;

        let Some(pid) = child.id() else {
            return Err(discard_unidentified(child, name));
        };

        let output = match child.stdout.take() {
            Some(stdout) => CapturedOutput::Collecting(OutputReader::start(stdout)),
            None => CapturedOutput::NotCaptured,
        };

        Ok(Self {
            name,
            pid,
            command,
            blocking: options.blocking,
            capture_output: options.capture_output,
            started_at,
            child,
            exit_status: None,
            output,
        })
    }

    /// Name the process is tracked under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// OS process identifier, kept after the child exits.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Command the process was started with.
    pub fn command(&self) -> &ProcessCommand {
        &self.command
    }

    /// Whether `create` waited for this child to exit.
    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    /// Whether stdout was captured rather than inherited.
    pub fn captures_output(&self) -> bool {
        self.capture_output
    }

    /// Wall-clock time the child was spawned.
    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    /// Time elapsed since the child was spawned.
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed().unwrap_or_default()
    }

    /// Last exit status observed by the registry, if any.
    ///
    /// This is not a poll: `None` only means no exit has been seen yet.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    fn poll(&mut self) -> Result<Option<ExitStatus>> {
        if self.exit_status.is_some() {
            return Ok(self.exit_status);
        }

        let status = self.child.try_wait().map_err(|source| RegistryError::Wait {
            name: self.name.clone(),
            source,
        })?;
        self.exit_status = status;
        Ok(status)
    }

    async fn wait(&mut self) -> Result<ExitStatus> {
        if let Some(status) = self.exit_status {
            return Ok(status);
        }

        let status = self.child.wait().await.map_err(|source| RegistryError::Wait {
            name: self.name.clone(),
            source,
        })?;
        self.exit_status = Some(status);
        Ok(status)
    }

    #[cfg(unix)]
    fn send_signal(&mut self, signal: StopSignal) -> Result<()> {
        signal::send(self.pid, signal)
    }

    #[cfg(not(unix))]
    fn send_signal(&mut self, signal: StopSignal) -> Result<()> {
        signal::send(&mut self.child, self.pid, signal)
    }

    /// SIGTERM, then wait; with a grace period, escalate to a forcible kill.
    async fn terminate(
        &mut self,
        grace: Option<Duration>,
        logger: &dyn RegistryLogger,
    ) -> Result<ExitStatus> {
        if let Err(err) = self.send_signal(StopSignal::Terminate) {
            debug!(name = %self.name, pid = self.pid, error = %err, "falling back to forcible kill");
            signal::force_kill(&mut self.child, self.pid)?;
        }

        let Some(grace) = grace else {
            return self.wait().await;
        };

        match tokio::time::timeout(grace, self.wait()).await {
            Ok(status) => status,
            Err(_) => {
                logger.warn(&format!(
                    "Process named {} ignored {} for {:?}, killing it",
                    self.name,
                    StopSignal::Terminate.name(),
                    grace
                ));
                signal::force_kill(&mut self.child, self.pid)?;
                self.wait().await
            }
        }
    }

    async fn drain_output(&mut self) -> Result<Drain> {
        match std::mem::replace(&mut self.output, CapturedOutput::Drained) {
            CapturedOutput::NotCaptured => {
                self.output = CapturedOutput::NotCaptured;
                Ok(Drain::NotCaptured)
            }
            CapturedOutput::Drained => Ok(Drain::Exhausted),
            CapturedOutput::Collecting(reader) => {
                let bytes = reader.finish(&self.name, OUTPUT_SETTLE).await?;
                Ok(Drain::Text(String::from_utf8_lossy(&bytes).into_owned()))
            }
        }
    }
}

/// Kill a child whose pid could not be read; it is never tracked.
fn discard_unidentified(mut child: Child, name: String) -> RegistryError {
    if let Err(err) = child.start_kill() {
        debug!(name = %name, error = %err, "failed to kill child without a pid");
    }
    RegistryError::MissingPid { name }
}

/// Registry of named child processes, kept in insertion order.
///
/// The registry has a single owner: every operation that touches a child
/// takes `&mut self`. Failures are never returned; they are reported through
/// the injected [`RegistryLogger`] and surface as `None`/`false`.
///
/// # Examples
///
/// ```rust,no_run
/// use procorg::{ProcessRegistry, SpawnOptions};
///
/// #[tokio::main]
/// async fn main() {
///     let mut children = ProcessRegistry::new();
///
///     children
///         .create(["ls"], "list", SpawnOptions::new().capture_output(true))
///         .await;
///     children.create(["sleep", "30"], "sleeper", SpawnOptions::new()).await;
///
///     println!("Tracked: {:?}", children.get_children());
///
///     tokio::time::sleep(std::time::Duration::from_secs(1)).await;
///     if let Some(listing) = children.get_output("list").await {
///         println!("{}", listing);
///     }
///
///     children.destroy("list").await;
///     children.destroy("sleeper").await;
/// }
/// ```
pub struct ProcessRegistry {
    children: Vec<TrackedProcess>,
    logger: Arc<dyn RegistryLogger>,
    config: RegistryConfig,
}

impl ProcessRegistry {
    /// Empty registry logging through `tracing` with default settings.
    pub fn new() -> Self {
        Self {
            children: Vec::new(),
            logger: Arc::new(TracingLogger),
            config: RegistryConfig::default(),
        }
    }

    /// Replace the warning/error sink.
    pub fn with_logger(self, logger: impl RegistryLogger + 'static) -> Self {
        self.with_shared_logger(Arc::new(logger))
    }

    /// Replace the warning/error sink with an already shared one.
    pub fn with_shared_logger(mut self, logger: Arc<dyn RegistryLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Replace the settings. Applies to children spawned afterwards.
    pub fn with_config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    /// Current settings.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Spawn `argv` and track it under `name`.
    ///
    /// The record is appended before any blocking wait, then returned. If the
    /// executable cannot be launched the failure is logged at error severity,
    /// nothing is appended, and `None` is returned.
    pub async fn create<I, S>(
        &mut self,
        argv: I,
        name: impl Into<String>,
        options: SpawnOptions,
    ) -> Option<&TrackedProcess>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let name = name.into();
        match ProcessCommand::from_argv(argv) {
            Ok(command) => self.create_command(command, name, options).await,
            Err(err) => {
                self.logger
                    .error(&format!("Starting process \"{}\": {}", name, err));
                None
            }
        }
    }

    /// Same as [`create`](Self::create) for an already built command.
    pub async fn create_command(
        &mut self,
        command: ProcessCommand,
        name: impl Into<String>,
        options: SpawnOptions,
    ) -> Option<&TrackedProcess> {
        let name = name.into();

        if self.position(&name).is_some() {
            self.logger.warn(&format!(
                "A process named {} is already tracked, lookups will resolve to the older one",
                name
            ));
        }

        let tracked = match TrackedProcess::spawn(name, command, options, &self.config) {
            Ok(tracked) => tracked,
            Err(err) => {
                self.logger.error(&err.to_string());
                return None;
            }
        };

        debug!(
            name = %tracked.name,
            pid = tracked.pid,
            command = %tracked.command,
            blocking = options.blocking,
            capture_output = options.capture_output,
            "spawned process"
        );

        self.children.push(tracked);
        let index = self.children.len() - 1;

        if options.blocking {
            if let Err(err) = self.children[index].wait().await {
                self.logger.error(&err.to_string());
            }
        }

        self.children.get(index)
    }

    /// Stop the named process and forget it.
    ///
    /// A running child receives SIGTERM and is waited for; an exited one is
    /// removed directly. Returns whatever captured output was left. With no
    /// termination grace configured, a child ignoring SIGTERM blocks this call.
    pub async fn destroy(&mut self, name: &str) -> Option<String> {
        let Some(index) = self.position(name) else {
            self.logger.warn(&format!(
                "Cannot kill process named {}, does not exist",
                name
            ));
            return None;
        };

        let grace = self.config.termination_grace();
        let logger = self.logger.as_ref();
        let tracked = &mut self.children[index];

        let running = match tracked.poll() {
            Ok(status) => status.is_none(),
            Err(err) => {
                logger.warn(&err.to_string());
                true
            }
        };

        if running {
            match tracked.terminate(grace, logger).await {
                Ok(status) => debug!(name = %name, pid = tracked.pid, %status, "terminated process"),
                Err(err) => {
                    logger.error(&err.to_string());
                    self.children.remove(index);
                    return None;
                }
            }
        }

        let output = match tracked.drain_output().await {
            Ok(Drain::Text(text)) => Some(text),
            Ok(Drain::Exhausted | Drain::NotCaptured) => None,
            Err(err) => {
                logger.warn(&err.to_string());
                None
            }
        };

        let removed = self.children.remove(index);
        debug!(name = %name, pid = removed.pid, "removed process from registry");
        output
    }

    /// Whether the named process has not exited yet. Never waits.
    ///
    /// Unknown names are logged and reported as not running.
    pub fn is_running(&mut self, name: &str) -> bool {
        let Some(index) = self.position(name) else {
            self.logger.warn(&format!(
                "Cannot get status, process named {} does not exist",
                name
            ));
            return false;
        };

        match self.children[index].poll() {
            Ok(status) => status.is_none(),
            Err(err) => {
                self.logger.warn(&err.to_string());
                false
            }
        }
    }

    /// Captured stdout of an exited process.
    ///
    /// Never waits for the child: while it runs this logs a warning and
    /// returns `None`. The first call after exit returns the full output; later
    /// calls return an empty string. Processes started without capture always
    /// yield `None`.
    pub async fn get_output(&mut self, name: &str) -> Option<String> {
        let Some(index) = self.position(name) else {
            self.logger.warn(&format!(
                "Cannot get output, process named {} does not exist",
                name
            ));
            return None;
        };

        let tracked = &mut self.children[index];
        match tracked.poll() {
            Ok(Some(_)) => {}
            Ok(None) => {
                self.logger.warn(&format!(
                    "Cannot get output, process named {} is still running",
                    name
                ));
                return None;
            }
            Err(err) => {
                self.logger.warn(&err.to_string());
                return None;
            }
        }

        match tracked.drain_output().await {
            Ok(Drain::Text(text)) => Some(text),
            Ok(Drain::Exhausted) => Some(String::new()),
            Ok(Drain::NotCaptured) => None,
            Err(err) => {
                self.logger.warn(&err.to_string());
                None
            }
        }
    }

    /// Names of every tracked process, exited ones included, in insertion order.
    pub fn get_children(&self) -> Vec<String> {
        self.children
            .iter()
            .map(|tracked| tracked.name.clone())
            .collect()
    }

    /// Send SIGINT to every tracked process without waiting or removing.
    ///
    /// Records stay in the registry until [`destroy`](Self::destroy) is called
    /// for each name. Children whose exit was already observed are skipped,
    /// since their pid may have been reused.
    pub fn kill_all(&mut self) {
        for tracked in &mut self.children {
            if tracked.exit_status.is_some() {
                debug!(name = %tracked.name, pid = tracked.pid, "skipping exited process");
                continue;
            }

            if let Err(err) = tracked.send_signal(StopSignal::Interrupt) {
                self.logger.warn(&err.to_string());
            }
        }
    }

    /// OS process identifier of the named process.
    pub fn get_pid(&self, name: &str) -> Option<u32> {
        match self.get(name) {
            Some(tracked) => Some(tracked.pid),
            None => {
                self.logger.warn(&format!(
                    "Cannot get pid, process named {} does not exist",
                    name
                ));
                None
            }
        }
    }

    /// First tracked process with the given name.
    pub fn get(&self, name: &str) -> Option<&TrackedProcess> {
        self.children.iter().find(|tracked| tracked.name == name)
    }

    /// Number of tracked processes.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.children.iter().position(|tracked| tracked.name == name)
    }
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProcessRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessRegistry")
            .field("children", &self.get_children())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
