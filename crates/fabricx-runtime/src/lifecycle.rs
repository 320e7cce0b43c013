//! Container group lifecycle.
//!
//! One [`RuntimeState`] per started network: the manifest path, the compose
//! project identifier and a running flag. Absence of a state means "not
//! started", which is distinct from "does not exist" (a registry-level
//! concept). The state map is the only shared mutable structure here and
//! its lock is never held across an external call.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use fabricx_common::api::LogEntry;
use fabricx_common::error::{FabricxError, Result};
use fabricx_common::exec::{run_checked, CommandOutput, CommandSpec, Executor};
use fabricx_network::Network;

/// Capacity of the log-forwarding conduit handed to stream consumers.
const LOG_CHANNEL_CAPACITY: usize = 256;

/// Per-network runtime record. Created on start, deleted on successful stop.
#[derive(Debug, Clone)]
pub struct RuntimeState {
    pub manifest_path: PathBuf,
    pub project: String,
    pub running: bool,
}

/// Aggregate container-group status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupStatus {
    /// No runtime state exists for the network. Valid, not an error.
    NotStarted,
    /// The group was started; `containers` live containers are reported by
    /// the runtime (zero is possible and distinct from `NotStarted`).
    Started { containers: usize },
}

/// Starts and stops container groups, reports status, streams logs and
/// executes ad hoc commands inside running containers.
pub struct LifecycleManager {
    executor: Arc<dyn Executor>,
    states: RwLock<HashMap<String, RuntimeState>>,
}

impl LifecycleManager {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self {
            executor,
            states: RwLock::new(HashMap::new()),
        }
    }

    pub fn executor(&self) -> &dyn Executor {
        self.executor.as_ref()
    }

    /// Snapshot of a network's runtime state, if it was started.
    pub async fn runtime_state(&self, network_id: &str) -> Option<RuntimeState> {
        self.states.read().await.get(network_id).cloned()
    }

    /// Starts the container group from the synthesized manifest.
    ///
    /// # Arguments
    /// * `network` - The planned network whose manifest was already written
    /// * `cancel` - Caller-supplied cancellation token, checked before and
    ///   during the runtime invocation
    ///
    /// # Behavior
    /// Runs the container runtime against the manifest under a generated
    /// project identifier and records the [`RuntimeState`] on success.
    /// Starting the same network twice is undefined; the registry enforces
    /// a single bootstrap per network id above this layer.
    pub async fn start(&self, network: &Network, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(FabricxError::Cancelled);
        }

        let manifest = network.compose_path();
        let project = network.project();
        let spec = CommandSpec::new("docker")
            .args(["compose", "-f"])
            .arg(manifest.display().to_string())
            .args(["-p", &project, "up", "-d"]);

        let output = tokio::select! {
            _ = cancel.cancelled() => return Err(FabricxError::Cancelled),
            result = self.executor.run(&spec) => result?,
        };
        if !output.success() {
            return Err(FabricxError::command_failed("compose up", output.combined));
        }

        info!(network = %network.id, project = %project, "Started container group");

        self.states.write().await.insert(
            network.id.clone(),
            RuntimeState {
                manifest_path: manifest,
                project,
                running: true,
            },
        );
        Ok(())
    }

    /// Tears the container group down. With `cleanup`, volumes and the
    /// network's filesystem subtree are removed as well. The runtime state
    /// is deleted only when teardown succeeds.
    pub async fn stop(
        &self,
        network: &Network,
        cleanup: bool,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(FabricxError::Cancelled);
        }

        let state = self.runtime_state(&network.id).await;
        if let Some(state) = state {
            let mut spec = CommandSpec::new("docker")
                .args(["compose", "-f"])
                .arg(state.manifest_path.display().to_string())
                .args(["-p", &state.project, "down"]);
            if cleanup {
                spec = spec.arg("--volumes");
            }

            let output = tokio::select! {
                _ = cancel.cancelled() => return Err(FabricxError::Cancelled),
                result = self.executor.run(&spec) => result?,
            };
            if !output.success() {
                return Err(FabricxError::command_failed("compose down", output.combined));
            }

            self.states.write().await.remove(&network.id);
            info!(network = %network.id, cleanup, "Stopped container group");
        } else {
            debug!(network = %network.id, "Stop requested for a group that was never started");
        }

        if cleanup && network.base_dir.exists() {
            std::fs::remove_dir_all(&network.base_dir)?;
            info!(network = %network.id, "Removed network subtree");
        }
        Ok(())
    }

    /// Counts live container identifiers for the network's project.
    pub async fn status(&self, network_id: &str) -> Result<GroupStatus> {
        let state = match self.runtime_state(network_id).await {
            Some(state) => state,
            None => return Ok(GroupStatus::NotStarted),
        };

        let spec = CommandSpec::new("docker")
            .args(["compose", "-f"])
            .arg(state.manifest_path.display().to_string())
            .args(["-p", &state.project, "ps", "-q"]);
        let output = run_checked(self.executor.as_ref(), &spec, "compose ps").await?;

        let containers = output
            .combined
            .lines()
            .filter(|line| !line.trim().is_empty())
            .count();
        Ok(GroupStatus::Started { containers })
    }

    /// Polls `status` on a fixed interval until `expected` containers are
    /// live, the deadline passes (`Timeout`) or the token fires
    /// (`Cancelled`). The only sanctioned busy-wait: container health has
    /// no push-based signal without extra tooling.
    pub async fn wait_until_ready(
        &self,
        network_id: &str,
        expected: usize,
        deadline: Duration,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let started = Instant::now();
        loop {
            if cancel.is_cancelled() {
                return Err(FabricxError::Cancelled);
            }
            if let GroupStatus::Started { containers } = self.status(network_id).await? {
                if containers >= expected {
                    debug!(network = %network_id, containers, "Network ready");
                    return Ok(());
                }
            }
            if started.elapsed() >= deadline {
                return Err(FabricxError::Timeout(
                    deadline.as_millis() as u64,
                    "network readiness".to_string(),
                ));
            }
            tokio::select! {
                _ = cancel.cancelled() => return Err(FabricxError::Cancelled),
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    /// Follows the container group's logs.
    ///
    /// # Arguments
    /// * `network_id` - A started network's id
    /// * `container` - Optional service name to scope the follower to
    /// * `cancel` - Stops forwarding when fired
    ///
    /// # Returns
    /// A bounded receiver of parsed [`LogEntry`] values. Entries flow until
    /// the log reader ends, errors, or `cancel` fires; dropping the
    /// receiver tears the reader (and the follower process) down.
    pub async fn stream_logs(
        &self,
        network_id: &str,
        container: Option<String>,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<LogEntry>> {
        let state = self.runtime_state(network_id).await.ok_or_else(|| {
            FabricxError::InvalidRequest(format!("network {network_id} is not started"))
        })?;

        let mut spec = CommandSpec::new("docker")
            .args(["compose", "-f"])
            .arg(state.manifest_path.display().to_string())
            .args(["-p", &state.project, "logs", "--follow", "--no-color"]);
        if let Some(service) = &container {
            spec = spec.arg(service.clone());
        }

        let mut stream = self.executor.stream(&spec).await?;
        let (tx, rx) = mpsc::channel(LOG_CHANNEL_CAPACITY);
        let network_id = network_id.to_string();

        tokio::spawn(async move {
            loop {
                let line = tokio::select! {
                    _ = cancel.cancelled() => break,
                    line = stream.recv() => match line {
                        Some(line) => line,
                        None => break,
                    },
                };
                let (container, message) = parse_log_line(&line);
                let entry = LogEntry {
                    timestamp_ms: epoch_millis(),
                    container,
                    message,
                };
                if tx.send(entry).await.is_err() {
                    break;
                }
            }
            debug!(network = %network_id, "Log stream closed");
        });

        Ok(rx)
    }

    /// Runs a command inside a running container; a non-zero exit is an
    /// error carrying the captured combined output and `operation`.
    pub async fn exec_in_container(
        &self,
        container: &str,
        env: &[(String, String)],
        command: &[String],
        operation: &str,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput> {
        if cancel.is_cancelled() {
            return Err(FabricxError::Cancelled);
        }

        let mut spec = CommandSpec::new("docker").arg("exec");
        for (key, value) in env {
            spec = spec.arg("-e").arg(format!("{key}={value}"));
        }
        spec = spec.arg(container).args(command.iter().cloned());

        let output = tokio::select! {
            _ = cancel.cancelled() => return Err(FabricxError::Cancelled),
            result = self.executor.run(&spec) => result?,
        };
        if !output.success() {
            return Err(FabricxError::command_failed(operation, output.combined));
        }
        Ok(output)
    }

    /// Copies a host path into a running container.
    pub async fn copy_to_container(
        &self,
        source: &str,
        container: &str,
        dest: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(FabricxError::Cancelled);
        }
        let spec = CommandSpec::new("docker")
            .arg("cp")
            .arg(source)
            .arg(format!("{container}:{dest}"));
        run_checked(self.executor.as_ref(), &spec, "container copy").await?;
        Ok(())
    }

    /// Copies a container path out to the host.
    pub async fn copy_from_container(
        &self,
        container: &str,
        source: &str,
        dest: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(FabricxError::Cancelled);
        }
        let spec = CommandSpec::new("docker")
            .arg("cp")
            .arg(format!("{container}:{source}"))
            .arg(dest);
        run_checked(self.executor.as_ref(), &spec, "container copy").await?;
        Ok(())
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Splits a compose log line (`service  | message`) into its container and
/// message parts. Lines without the separator keep the sentinel container
/// name "unknown".
pub fn parse_log_line(line: &str) -> (String, String) {
    match line.split_once('|') {
        Some((container, message)) => {
            let container = container.trim();
            if container.is_empty() {
                ("unknown".to_string(), message.trim_start().to_string())
            } else {
                (container.to_string(), message.trim_start().to_string())
            }
        }
        None => ("unknown".to_string(), line.to_string()),
    }
}
