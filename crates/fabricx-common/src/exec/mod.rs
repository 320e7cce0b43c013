//! Process Execution Layer
//!
//! Everything FabricX does to the outside world goes through an external
//! process: the container runtime, the compose plugin, the Fabric toolchain
//! container. This module expresses process execution as an injectable
//! capability so the orchestration logic above it can be tested
//! deterministically against a scripted fake.
//!
//! # Components
//!
//! - [`Executor`] - the capability trait: run-and-capture plus run-and-stream
//! - [`SystemExecutor`] - the real implementation over `tokio::process`
//! - [`ScriptedExecutor`] - deterministic test double with canned outputs
//!
//! # Exit codes are data
//!
//! `run` resolves with a [`CommandOutput`] for any exit status; a non-zero
//! exit is not an error at this layer. Callers that require success use
//! [`run_checked`], which maps a failed exit to
//! [`FabricxError::CommandFailed`] carrying the operation name and the
//! captured combined output. Only a failure to spawn at all (the runtime
//! binary missing) surfaces as [`FabricxError::ToolUnavailable`].

mod scripted;
mod system;

pub use scripted::ScriptedExecutor;
pub use system::SystemExecutor;

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::mpsc;

use crate::error::{FabricxError, Result};

/// Capacity of the line conduit behind [`CommandStream`]. A slow consumer
/// applies backpressure to the reader task rather than buffering unboundedly.
pub const STREAM_CHANNEL_CAPACITY: usize = 256;

/// A command to execute: program, arguments, environment overrides and an
/// optional working directory.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub current_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// The command as a single shell-like line, used for logging and for
    /// rule matching in the scripted executor.
    pub fn rendered(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Captured result of a completed command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutput {
    /// Combined stdout and stderr, in that order.
    pub combined: String,
    /// Process exit code; -1 when terminated by signal.
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// A zero-exit output with the given combined text.
    pub fn ok(combined: impl Into<String>) -> Self {
        Self {
            combined: combined.into(),
            exit_code: 0,
        }
    }

    /// A failing output with the given combined text and exit code.
    pub fn failed(combined: impl Into<String>, exit_code: i32) -> Self {
        Self {
            combined: combined.into(),
            exit_code,
        }
    }
}

/// A line-oriented handle on a running command's output.
///
/// Lines arrive over a bounded channel fed by a reader task. Dropping the
/// stream kills the underlying process, which makes consumer-side
/// cancellation (`tokio::select!` against a token) sufficient to tear the
/// whole flow down.
pub struct CommandStream {
    receiver: mpsc::Receiver<String>,
    // Held so the child dies with the stream; None for scripted streams.
    _child: Option<tokio::process::Child>,
}

impl CommandStream {
    pub(crate) fn new(receiver: mpsc::Receiver<String>, child: Option<tokio::process::Child>) -> Self {
        Self {
            receiver,
            _child: child,
        }
    }

    /// Receives the next output line, or `None` once the command's output
    /// is exhausted.
    pub async fn recv(&mut self) -> Option<String> {
        self.receiver.recv().await
    }
}

/// Injectable process execution capability.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Runs the command to completion, capturing combined stdout+stderr.
    /// Non-zero exits resolve with `Ok`; only spawn failures error.
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;

    /// Spawns the command and follows its output line-by-line.
    async fn stream(&self, spec: &CommandSpec) -> Result<CommandStream>;
}

/// Runs a command and requires a zero exit.
///
/// # Arguments
/// * `executor` - The execution capability to run through
/// * `spec` - The command to run
/// * `operation` - Name carried by the error when the command fails
///
/// # Returns
/// The captured output on success, or [`FabricxError::CommandFailed`]
/// tagged with `operation` and the combined output otherwise.
pub async fn run_checked(
    executor: &dyn Executor,
    spec: &CommandSpec,
    operation: &str,
) -> Result<CommandOutput> {
    let output = executor.run(spec).await?;
    if output.success() {
        Ok(output)
    } else {
        Err(FabricxError::command_failed(operation, output.combined))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_spec_builder() {
        let spec = CommandSpec::new("docker")
            .arg("compose")
            .args(["-f", "compose.yaml", "up", "-d"])
            .env("COMPOSE_PROJECT_NAME", "fabricx")
            .current_dir("/tmp");

        assert_eq!(spec.program, "docker");
        assert_eq!(spec.args, vec!["compose", "-f", "compose.yaml", "up", "-d"]);
        assert_eq!(spec.env.len(), 1);
        assert_eq!(spec.current_dir, Some("/tmp".into()));
    }

    #[test]
    fn test_rendered_command_line() {
        let spec = CommandSpec::new("docker").args(["ps", "-q"]);
        assert_eq!(spec.rendered(), "docker ps -q");

        let bare = CommandSpec::new("docker");
        assert_eq!(bare.rendered(), "docker");
    }

    #[test]
    fn test_command_output_success() {
        assert!(CommandOutput::ok("done").success());
        assert!(!CommandOutput::failed("boom", 2).success());
    }

    #[tokio::test]
    async fn test_run_checked_maps_nonzero_exit() {
        let executor = ScriptedExecutor::new().on("docker ps", CommandOutput::failed("daemon down", 1));
        let spec = CommandSpec::new("docker").args(["ps", "-q"]);

        let err = run_checked(&executor, &spec, "container status").await.unwrap_err();
        match err {
            FabricxError::CommandFailed { operation, output } => {
                assert_eq!(operation, "container status");
                assert_eq!(output, "daemon down");
            }
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_checked_passes_through_success() {
        let executor = ScriptedExecutor::new().on("docker ps", CommandOutput::ok("abc\n"));
        let spec = CommandSpec::new("docker").args(["ps", "-q"]);

        let out = run_checked(&executor, &spec, "container status").await.unwrap();
        assert_eq!(out.combined, "abc\n");
    }
}
