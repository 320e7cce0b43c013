//! Transaction gateway.
//!
//! Invokes and queries deployed chaincode through the shared cli container
//! and extracts transaction identifiers from the tool's textual output. The
//! text-matching logic lives in standalone parsers with documented
//! contracts so it can be tested against captured tool-output fixtures,
//! decoupled from the process-invocation plumbing.

use base64::Engine;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use fabricx_common::error::Result;
use fabricx_network::{Network, Organization};

use crate::lifecycle::LifecycleManager;

/// Returned when no transaction identifier can be recognized in the tool
/// output; the transaction may still have committed.
pub const UNKNOWN_TX_ID: &str = "unknown";

/// Submits transactions and queries against deployed chaincode.
pub struct TransactionGateway {
    lifecycle: Arc<LifecycleManager>,
}

impl TransactionGateway {
    pub fn new(lifecycle: Arc<LifecycleManager>) -> Self {
        Self { lifecycle }
    }

    /// Invokes a chaincode function as a transaction, waiting for the
    /// ordering event. Returns the extracted transaction identifier (the
    /// sentinel [`UNKNOWN_TX_ID`] if none is found) and the response
    /// payload bytes.
    pub async fn invoke(
        &self,
        network: &Network,
        chaincode: &str,
        function: &str,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<(String, Vec<u8>)> {
        self.submit(network, chaincode, function, args, None, cancel).await
    }

    /// Like [`invoke`](Self::invoke), but also serializes a key→bytes map
    /// as transient data passed alongside the proposal.
    pub async fn invoke_with_transient(
        &self,
        network: &Network,
        chaincode: &str,
        function: &str,
        args: &[String],
        transient: &HashMap<String, Vec<u8>>,
        cancel: &CancellationToken,
    ) -> Result<(String, Vec<u8>)> {
        self.submit(network, chaincode, function, args, Some(transient), cancel)
            .await
    }

    async fn submit(
        &self,
        network: &Network,
        chaincode: &str,
        function: &str,
        args: &[String],
        transient: Option<&HashMap<String, Vec<u8>>>,
        cancel: &CancellationToken,
    ) -> Result<(String, Vec<u8>)> {
        let org = &network.organizations[0];
        let mut command = vec![
            "peer".to_string(),
            "chaincode".to_string(),
            "invoke".to_string(),
            "-o".to_string(),
            network.orderer().network_address(),
            "-C".to_string(),
            network.channel.name.clone(),
            "-n".to_string(),
            chaincode.to_string(),
            "-c".to_string(),
            chaincode_args(function, args),
            "--waitForEvent".to_string(),
        ];
        for (org, peer) in network.peers() {
            command.push("--peerAddresses".to_string());
            command.push(peer.network_address(org));
        }
        if let Some(transient) = transient {
            command.push("--transient".to_string());
            command.push(transient_payload(transient));
        }

        let output = self
            .lifecycle
            .exec_in_container(
                &network.cli_container(),
                &admin_env(org),
                &command,
                "chaincode invoke",
                cancel,
            )
            .await?;

        let tx_id = extract_transaction_id(&output.combined);
        let payload = extract_payload(&output.combined);
        info!(network = %network.id, chaincode = %chaincode, tx = %tx_id, "Transaction submitted");
        Ok((tx_id, payload))
    }

    /// Issues a read-only query against a single peer, returning the raw
    /// response bytes unmodified.
    pub async fn query(
        &self,
        network: &Network,
        chaincode: &str,
        function: &str,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        let org = &network.organizations[0];
        let command = vec![
            "peer".to_string(),
            "chaincode".to_string(),
            "query".to_string(),
            "-C".to_string(),
            network.channel.name.clone(),
            "-n".to_string(),
            chaincode.to_string(),
            "-c".to_string(),
            chaincode_args(function, args),
        ];

        let output = self
            .lifecycle
            .exec_in_container(
                &network.cli_container(),
                &admin_env(org),
                &command,
                "chaincode query",
                cancel,
            )
            .await?;

        Ok(output.combined.trim_end().as_bytes().to_vec())
    }
}

fn admin_env(org: &Organization) -> Vec<(String, String)> {
    let peer = &org.peers[0];
    vec![
        ("CORE_PEER_LOCALMSPID".to_string(), org.msp_id.clone()),
        ("CORE_PEER_MSPCONFIGPATH".to_string(), org.admin_msp_path()),
        ("CORE_PEER_ADDRESS".to_string(), peer.network_address(org)),
    ]
}

/// Builds the JSON argument payload from a function name and arguments:
/// `{"function":"F","Args":["a","b"]}`. Serialized through serde so
/// embedded quotes survive.
pub fn chaincode_args(function: &str, args: &[String]) -> String {
    serde_json::json!({
        "function": function,
        "Args": args,
    })
    .to_string()
}

/// Serializes a transient key→bytes map the way the tool expects: a JSON
/// object of base64-encoded values.
pub fn transient_payload(transient: &HashMap<String, Vec<u8>>) -> String {
    let encoded: HashMap<&String, String> = transient
        .iter()
        .map(|(key, value)| (key, base64::engine::general_purpose::STANDARD.encode(value)))
        .collect();
    serde_json::to_string(&encoded).unwrap_or_else(|_| "{}".to_string())
}

/// Extracts a transaction identifier from command output.
///
/// Supports both marker variants the toolchain emits, preferring the
/// bracketed form: text inside `txid [...]`, or the token following
/// `txid: `. Returns the sentinel [`UNKNOWN_TX_ID`] when neither marker is
/// present; the transaction may still have committed, so absence is not a
/// failure.
pub fn extract_transaction_id(output: &str) -> String {
    if let Some(start) = output.find("txid [") {
        let rest = &output[start + "txid [".len()..];
        if let Some(end) = rest.find(']') {
            let id = &rest[..end];
            if !id.is_empty() {
                return id.to_string();
            }
        }
    }
    if let Some(start) = output.find("txid: ") {
        let rest = &output[start + "txid: ".len()..];
        let id: String = rest
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect();
        if !id.is_empty() {
            return id;
        }
    }
    UNKNOWN_TX_ID.to_string()
}

/// Extracts the response payload from invoke output: the escaped string
/// following `payload:"`, unescaped. Empty when no payload is reported.
pub fn extract_payload(output: &str) -> Vec<u8> {
    let start = match output.find("payload:\"") {
        Some(idx) => idx + "payload:\"".len(),
        None => return Vec::new(),
    };

    let mut payload = Vec::new();
    let mut chars = output[start..].chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => break,
            '\\' => match chars.next() {
                Some('n') => payload.push(b'\n'),
                Some('t') => payload.push(b'\t'),
                Some(escaped) => {
                    let mut buf = [0u8; 4];
                    payload.extend_from_slice(escaped.encode_utf8(&mut buf).as_bytes());
                }
                None => break,
            },
            _ => {
                let mut buf = [0u8; 4];
                payload.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabricx_common::exec::{CommandOutput, ScriptedExecutor};
    use fabricx_network::planner::{plan_network, PlanRequest};

    // Captured from a peer CLI invoke against a two-org network.
    const INVOKE_OUTPUT_BRACKETED: &str = "2024-05-02 12:01:17.001 UTC [chaincodeCmd] \
        ClientWait -> INFO 001 txid [b5b2d9f8a3c44e6d9e0a] committed with status (VALID) at peer0.org1.example.com:7051\n\
        Chaincode invoke successful. result: status:200 payload:\"{\\\"ID\\\":\\\"asset1\\\"}\" \n";

    const INVOKE_OUTPUT_COLON: &str =
        "Chaincode invoke successful. result: status:200 txid: 9f8e7d6c5b4a\n";

    fn sample_network(dir: &std::path::Path) -> Network {
        plan_network(
            PlanRequest {
                name: "t".into(),
                org_count: 2,
                channel_name: "ch".into(),
            },
            dir.to_path_buf(),
            "ab12cd34".into(),
        )
    }

    fn gateway(executor: ScriptedExecutor) -> (Arc<ScriptedExecutor>, TransactionGateway) {
        let executor = Arc::new(executor);
        let lifecycle = Arc::new(LifecycleManager::new(executor.clone()));
        (executor, TransactionGateway::new(lifecycle))
    }

    // ========================================================================
    // Parser fixtures
    // ========================================================================

    #[test]
    fn test_extract_txid_bracketed_variant() {
        assert_eq!(
            extract_transaction_id(INVOKE_OUTPUT_BRACKETED),
            "b5b2d9f8a3c44e6d9e0a"
        );
        assert_eq!(extract_transaction_id("txid [abc123def456]"), "abc123def456");
    }

    #[test]
    fn test_extract_txid_colon_variant() {
        assert_eq!(extract_transaction_id(INVOKE_OUTPUT_COLON), "9f8e7d6c5b4a");
    }

    #[test]
    fn test_extract_txid_prefers_bracketed_form() {
        let both = "txid: aaaa other txid [bbbb]";
        assert_eq!(extract_transaction_id(both), "bbbb");
    }

    #[test]
    fn test_extract_txid_sentinel_on_no_marker() {
        assert_eq!(extract_transaction_id("status:200 no identifier here"), UNKNOWN_TX_ID);
        assert_eq!(extract_transaction_id(""), UNKNOWN_TX_ID);
        assert_eq!(extract_transaction_id("txid []"), UNKNOWN_TX_ID);
    }

    #[test]
    fn test_extract_txid_is_idempotent_on_match() {
        let first = extract_transaction_id(INVOKE_OUTPUT_BRACKETED);
        let second = extract_transaction_id(INVOKE_OUTPUT_BRACKETED);
        assert_eq!(first, second);
    }

    #[test]
    fn test_extract_payload_unescapes_quotes() {
        let payload = extract_payload(INVOKE_OUTPUT_BRACKETED);
        assert_eq!(payload, br#"{"ID":"asset1"}"#);
    }

    #[test]
    fn test_extract_payload_empty_when_absent() {
        assert!(extract_payload("status:200 committed").is_empty());
    }

    #[test]
    fn test_chaincode_args_escapes_embedded_quotes() {
        let json = chaincode_args("CreateAsset", &["asset\"1".to_string(), "blue".to_string()]);
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["function"], "CreateAsset");
        assert_eq!(parsed["Args"][0], "asset\"1");
    }

    #[test]
    fn test_transient_payload_base64_encodes_values() {
        let mut transient = HashMap::new();
        transient.insert("asset_properties".to_string(), b"secret".to_vec());
        let json = transient_payload(&transient);
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["asset_properties"], "c2VjcmV0");
    }

    // ========================================================================
    // Command construction
    // ========================================================================

    #[tokio::test]
    async fn test_invoke_addresses_orderer_and_every_peer() {
        let dir = tempfile::tempdir().unwrap();
        let network = sample_network(dir.path());
        let executor =
            ScriptedExecutor::new().on("chaincode invoke", CommandOutput::ok(INVOKE_OUTPUT_BRACKETED));
        let (executor, gateway) = gateway(executor);
        let cancel = CancellationToken::new();

        let (tx_id, payload) = gateway
            .invoke(&network, "basic", "CreateAsset", &["asset1".to_string()], &cancel)
            .await
            .unwrap();

        assert_eq!(tx_id, "b5b2d9f8a3c44e6d9e0a");
        assert_eq!(payload, br#"{"ID":"asset1"}"#);

        let call = executor.invocations().pop().unwrap();
        assert!(call.contains("-o orderer.example.com:7050"));
        assert!(call.contains("--peerAddresses peer0.org1.example.com:7051"));
        assert!(call.contains("--peerAddresses peer0.org2.example.com:8051"));
        assert!(call.contains("--waitForEvent"));
        assert!(call.contains("CORE_PEER_LOCALMSPID=Org1MSP"));
    }

    #[tokio::test]
    async fn test_invoke_without_marker_returns_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let network = sample_network(dir.path());
        let executor =
            ScriptedExecutor::new().on("chaincode invoke", CommandOutput::ok("status:200 ok"));
        let (_executor, gateway) = gateway(executor);
        let cancel = CancellationToken::new();

        let (tx_id, _) = gateway
            .invoke(&network, "basic", "CreateAsset", &[], &cancel)
            .await
            .unwrap();
        assert_eq!(tx_id, UNKNOWN_TX_ID);
    }

    #[tokio::test]
    async fn test_query_targets_single_peer_and_returns_raw_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let network = sample_network(dir.path());
        let executor = ScriptedExecutor::new()
            .on("chaincode query", CommandOutput::ok("{\"ID\":\"asset1\",\"Color\":\"blue\"}\n"));
        let (executor, gateway) = gateway(executor);
        let cancel = CancellationToken::new();

        let payload = gateway
            .query(&network, "basic", "ReadAsset", &["asset1".to_string()], &cancel)
            .await
            .unwrap();

        assert_eq!(payload, br#"{"ID":"asset1","Color":"blue"}"#);
        let call = executor.invocations().pop().unwrap();
        assert!(!call.contains("--peerAddresses"));
        assert!(!call.contains("--waitForEvent"));
    }

    #[tokio::test]
    async fn test_invoke_with_transient_attaches_map() {
        let dir = tempfile::tempdir().unwrap();
        let network = sample_network(dir.path());
        let executor =
            ScriptedExecutor::new().on("chaincode invoke", CommandOutput::ok(INVOKE_OUTPUT_COLON));
        let (executor, gateway) = gateway(executor);
        let cancel = CancellationToken::new();

        let mut transient = HashMap::new();
        transient.insert("props".to_string(), b"v".to_vec());
        let (tx_id, _) = gateway
            .invoke_with_transient(&network, "basic", "CreatePrivate", &[], &transient, &cancel)
            .await
            .unwrap();

        assert_eq!(tx_id, "9f8e7d6c5b4a");
        let call = executor.invocations().pop().unwrap();
        assert!(call.contains("--transient"));
        assert!(call.contains("dg=="));
    }

    #[tokio::test]
    async fn test_invoke_failure_carries_output() {
        let dir = tempfile::tempdir().unwrap();
        let network = sample_network(dir.path());
        let executor = ScriptedExecutor::new()
            .on("chaincode invoke", CommandOutput::failed("endorsement mismatch", 1));
        let (_executor, gateway) = gateway(executor);
        let cancel = CancellationToken::new();

        let err = gateway
            .invoke(&network, "basic", "CreateAsset", &[], &cancel)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("endorsement mismatch"));
    }
}
