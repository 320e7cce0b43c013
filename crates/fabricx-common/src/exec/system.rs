use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::debug;

use super::{CommandOutput, CommandSpec, CommandStream, Executor, STREAM_CHANNEL_CAPACITY};
use crate::error::{FabricxError, Result};

/// Real process executor over `tokio::process`.
///
/// Commands inherit the parent environment with the [`CommandSpec`]
/// overrides applied on top. Both output pipes are captured; `run` concatenates them
/// (stdout first) into the combined diagnostic text the error taxonomy
/// requires.
#[derive(Debug, Default, Clone)]
pub struct SystemExecutor;

impl SystemExecutor {
    pub fn new() -> Self {
        Self
    }

    fn build_command(spec: &CommandSpec) -> Command {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }
        if let Some(dir) = &spec.current_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }

    fn map_spawn_error(spec: &CommandSpec, err: std::io::Error) -> FabricxError {
        if err.kind() == std::io::ErrorKind::NotFound {
            FabricxError::ToolUnavailable(format!("{} not found on PATH", spec.program))
        } else {
            FabricxError::Io(err)
        }
    }
}

#[async_trait]
impl Executor for SystemExecutor {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        debug!(command = %spec.rendered(), "Running command");

        let output = Self::build_command(spec)
            .output()
            .await
            .map_err(|e| Self::map_spawn_error(spec, e))?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CommandOutput {
            combined,
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    async fn stream(&self, spec: &CommandSpec) -> Result<CommandStream> {
        debug!(command = %spec.rendered(), "Streaming command");

        let mut cmd = Self::build_command(spec);
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| Self::map_spawn_error(spec, e))?;

        let stdout = child.stdout.take().ok_or_else(|| {
            FabricxError::Transport(format!("no stdout pipe for {}", spec.program))
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            FabricxError::Transport(format!("no stderr pipe for {}", spec.program))
        })?;

        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);

        let out_tx = tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                // Send fails once the stream is dropped; stop reading.
                if out_tx.send(line).await.is_err() {
                    break;
                }
            }
        });
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(line).await.is_err() {
                    break;
                }
            }
        });

        Ok(CommandStream::new(rx, Some(child)))
    }
}
