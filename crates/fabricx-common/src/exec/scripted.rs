use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::mpsc;

use super::{CommandOutput, CommandSpec, CommandStream, Executor, STREAM_CHANNEL_CAPACITY};
use crate::error::Result;

/// Deterministic [`Executor`] double for tests.
///
/// Rules pair a substring of the rendered command line with a canned
/// [`CommandOutput`]; the first matching rule wins, and an unmatched command
/// resolves to an empty success so happy-path scripts only need rules for
/// the commands they care about. Every invocation is recorded for
/// assertions.
///
/// # Example
///
/// ```
/// use fabricx_common::exec::{CommandOutput, CommandSpec, Executor, ScriptedExecutor};
///
/// # #[tokio::main]
/// # async fn main() {
/// let executor = ScriptedExecutor::new()
///     .on("compose up", CommandOutput::ok("Started"))
///     .on("ps -q", CommandOutput::ok("c1\nc2\n"));
///
/// let out = executor.run(&CommandSpec::new("docker").args(["ps", "-q"])).await.unwrap();
/// assert_eq!(out.combined, "c1\nc2\n");
/// assert_eq!(executor.invocations().len(), 1);
/// # }
/// ```
pub struct ScriptedExecutor {
    rules: Vec<(String, CommandOutput)>,
    stream_rules: Vec<(String, Vec<String>)>,
    invocations: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            stream_rules: Vec::new(),
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Adds a rule: any command whose rendered line contains `pattern`
    /// resolves with `output`. Earlier rules take precedence.
    pub fn on(mut self, pattern: impl Into<String>, output: CommandOutput) -> Self {
        self.rules.push((pattern.into(), output));
        self
    }

    /// Adds a streaming rule: any streamed command whose rendered line
    /// contains `pattern` yields `lines` and then ends.
    pub fn on_stream<I, S>(mut self, pattern: impl Into<String>, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stream_rules
            .push((pattern.into(), lines.into_iter().map(Into::into).collect()));
        self
    }

    /// Every rendered command line seen so far, in order.
    pub fn invocations(&self) -> Vec<String> {
        self.invocations.lock().unwrap().clone()
    }

    /// How many recorded invocations contain `pattern`.
    pub fn count_matching(&self, pattern: &str) -> usize {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .filter(|line| line.contains(pattern))
            .count()
    }

    fn record(&self, spec: &CommandSpec) -> String {
        let rendered = spec.rendered();
        self.invocations.lock().unwrap().push(rendered.clone());
        rendered
    }
}

impl Default for ScriptedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let rendered = self.record(spec);
        let output = self
            .rules
            .iter()
            .find(|(pattern, _)| rendered.contains(pattern.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| CommandOutput::ok(""));
        Ok(output)
    }

    async fn stream(&self, spec: &CommandSpec) -> Result<CommandStream> {
        let rendered = self.record(spec);
        let lines = self
            .stream_rules
            .iter()
            .find(|(pattern, _)| rendered.contains(pattern.as_str()))
            .map(|(_, lines)| lines.clone())
            .unwrap_or_default();

        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY.max(lines.len() + 1));
        for line in lines {
            // Capacity covers every canned line, so this cannot block.
            let _ = tx.try_send(line);
        }
        drop(tx);

        Ok(CommandStream::new(rx, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_matching_rule_wins() {
        let executor = ScriptedExecutor::new()
            .on("queryinstalled", CommandOutput::ok("Package ID: a"))
            .on("query", CommandOutput::ok("other"));

        let spec = CommandSpec::new("docker").args(["exec", "cli", "peer", "lifecycle", "chaincode", "queryinstalled"]);
        let out = executor.run(&spec).await.unwrap();
        assert_eq!(out.combined, "Package ID: a");
    }

    #[tokio::test]
    async fn test_unmatched_command_succeeds_empty() {
        let executor = ScriptedExecutor::new();
        let out = executor.run(&CommandSpec::new("docker").arg("info")).await.unwrap();
        assert!(out.success());
        assert!(out.combined.is_empty());
    }

    #[tokio::test]
    async fn test_invocations_are_recorded_in_order() {
        let executor = ScriptedExecutor::new();
        executor.run(&CommandSpec::new("docker").arg("one")).await.unwrap();
        executor.run(&CommandSpec::new("docker").arg("two")).await.unwrap();

        assert_eq!(executor.invocations(), vec!["docker one", "docker two"]);
        assert_eq!(executor.count_matching("docker"), 2);
        assert_eq!(executor.count_matching("two"), 1);
    }

    #[tokio::test]
    async fn test_scripted_stream_yields_canned_lines() {
        let executor = ScriptedExecutor::new().on_stream("logs", ["peer0 | starting", "peer0 | ready"]);

        let mut stream = executor
            .stream(&CommandSpec::new("docker").args(["compose", "logs", "--follow"]))
            .await
            .unwrap();

        assert_eq!(stream.recv().await.as_deref(), Some("peer0 | starting"));
        assert_eq!(stream.recv().await.as_deref(), Some("peer0 | ready"));
        assert_eq!(stream.recv().await, None);
    }
}
