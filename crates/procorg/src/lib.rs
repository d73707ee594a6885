//! # procorg
//!
//! A small registry for externally spawned processes. Children are started by
//! name, queried for liveness, pid and captured stdout, and terminated one by
//! one or all at once.
//!
//! ## Features
//!
//! - **Named tracking**: insertion-ordered records looked up by name
//! - **Output capture**: stdout buffered in memory, retrievable once after exit
//! - **Termination**: SIGTERM per process with optional escalation, SIGINT to all
//! - **Injected logging**: warnings and errors go to a [`RegistryLogger`],
//!   `tracing` by default
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use procorg::{ProcessRegistry, SpawnOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut children = ProcessRegistry::new();
//!
//!     children
//!         .create(["echo", "hello"], "e1", SpawnOptions::new().capture_output(true))
//!         .await;
//!
//!     while children.is_running("e1") {
//!         tokio::time::sleep(std::time::Duration::from_millis(10)).await;
//!     }
//!
//!     assert_eq!(children.get_output("e1").await.as_deref(), Some("hello\n"));
//!     children.destroy("e1").await;
//!     assert!(children.get_children().is_empty());
//! }
//! ```
//!
//! ## Limitations
//!
//! The registry is meant for one controlling task. Without a termination
//! grace in [`RegistryConfig`], `destroy` waits as long as the child takes to
//! honour SIGTERM. `kill_all` only signals; records stay until destroyed.
//! Captured output is whatever the child wrote before it exited. Anything a
//! grandchild writes to the inherited pipe afterwards is dropped.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod command;
pub mod config;
pub mod error;
pub mod logger;
pub mod registry;
pub mod result;
pub mod signal;

pub use command::ProcessCommand;
pub use config::RegistryConfig;
pub use error::RegistryError;
pub use logger::{LogLevel, LogRecord, MemoryLogger, RegistryLogger, TracingLogger};
pub use registry::{ProcessRegistry, SpawnOptions, TrackedProcess};
pub use result::Result;
pub use signal::StopSignal;
