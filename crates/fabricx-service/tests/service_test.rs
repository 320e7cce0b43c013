//! End-to-end service tests over a scripted executor.
//!
//! Every external invocation the runtime would make (compose, toolchain
//! container, in-container commands) resolves against canned outputs, so
//! the full bootstrap → deploy → invoke → query → stop flow runs
//! deterministically without a container runtime.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use fabricx_common::api::{
    DeployChaincodeRequest, InitNetworkRequest, InvokeRequest, QueryRequest, StatusRequest,
    StopNetworkRequest, StreamLogsRequest,
};
use fabricx_common::error::FabricxError;
use fabricx_common::exec::{CommandOutput, ScriptedExecutor};
use fabricx_service::{FabricxService, NetworkRegistry, ServiceConfig};

const QUERYINSTALLED_OUTPUT: &str =
    "Package ID: basic_1.0:3a1bdeadbeef, Label: basic_1.0\n";

const INVOKE_OUTPUT: &str = "2024-05-02 12:01:17.001 UTC [chaincodeCmd] ClientWait -> INFO 001 \
    txid [b5b2d9f8a3c44e6d9e0a] committed with status (VALID)\n\
    Chaincode invoke successful. result: status:200 payload:\"{\\\"ID\\\":\\\"asset1\\\",\\\"Color\\\":\\\"blue\\\"}\" \n";

const QUERY_OUTPUT: &str =
    "{\"ID\":\"asset1\",\"Color\":\"blue\",\"Size\":5,\"Owner\":\"Tom\",\"AppraisedValue\":35}\n";

/// Executor scripted for a fully healthy two-org network.
fn healthy_executor() -> ScriptedExecutor {
    ScriptedExecutor::new()
        .on("ps -q", CommandOutput::ok("c1\nc2\nc3\nc4\nc5\nc6\nc7\nc8\n"))
        .on("queryinstalled", CommandOutput::ok(QUERYINSTALLED_OUTPUT))
        .on("--isInit", CommandOutput::ok(""))
        .on("chaincode invoke", CommandOutput::ok(INVOKE_OUTPUT))
        .on("chaincode query", CommandOutput::ok(QUERY_OUTPUT))
}

fn service_over(executor: ScriptedExecutor, base_dir: &std::path::Path) -> FabricxService {
    let config = ServiceConfig {
        base_dir: base_dir.to_path_buf(),
        readiness_deadline: Duration::from_millis(500),
        readiness_interval: Duration::from_millis(10),
        join_wait: Duration::from_millis(1),
        ..Default::default()
    };
    FabricxService::with_config(Arc::new(executor), Arc::new(NetworkRegistry::new()), config)
}

#[tokio::test]
async fn test_end_to_end_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_over(healthy_executor(), dir.path());
    let cancel = CancellationToken::new();

    // Bootstrap a two-org network.
    let init = service
        .init_network(
            InitNetworkRequest {
                name: "t".into(),
                org_count: 2,
                channel_name: "ch".into(),
                custom_config: None,
            },
            &cancel,
        )
        .await
        .unwrap();
    assert!(init.success, "init failed: {}", init.message);
    assert!(!init.network_id.is_empty());
    assert_eq!(init.endpoints, vec!["localhost:7051", "localhost:8051"]);

    let network_id = init.network_id.clone();

    // Deploy with default version/language.
    let deploy = service
        .deploy_chaincode(
            DeployChaincodeRequest {
                network_id: network_id.clone(),
                name: "basic".into(),
                path: "/chaincode/basic".into(),
                version: "1.0".into(),
                language: "golang".into(),
                endorsement_orgs: Vec::new(),
            },
            &cancel,
        )
        .await
        .unwrap();
    assert!(deploy.success, "deploy failed: {}", deploy.message);
    assert!(!deploy.chaincode_id.is_empty());

    // Invoke; transaction id is alphanumeric, payload is JSON.
    let invoke = service
        .invoke_transaction(
            InvokeRequest {
                network_id: network_id.clone(),
                chaincode: "basic".into(),
                function: "CreateAsset".into(),
                args: vec![
                    "asset1".into(),
                    "blue".into(),
                    "5".into(),
                    "Tom".into(),
                    "35".into(),
                ],
                transient: None,
            },
            &cancel,
        )
        .await
        .unwrap();
    assert!(invoke.success);
    assert!(!invoke.transaction_id.is_empty());
    assert!(invoke
        .transaction_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric()));
    let payload: serde_json::Value = serde_json::from_slice(&invoke.payload).unwrap();
    assert_eq!(payload["ID"], "asset1");

    // Query reads the asset back.
    let query = service
        .query_ledger(
            QueryRequest {
                network_id: network_id.clone(),
                chaincode: "basic".into(),
                function: "ReadAsset".into(),
                args: vec!["asset1".into()],
            },
            &cancel,
        )
        .await
        .unwrap();
    assert!(query.success);
    let asset: serde_json::Value = serde_json::from_slice(&query.payload).unwrap();
    assert_eq!(asset["Owner"], "Tom");

    // Status reports a running network with both peers.
    let status = service
        .get_network_status(
            StatusRequest {
                network_id: network_id.clone(),
            },
            &cancel,
        )
        .await
        .unwrap();
    assert!(status.running);
    assert_eq!(status.peers.len(), 2);
    assert_eq!(status.peers[0].endpoint, "localhost:7051");
    assert_eq!(status.orderers.len(), 1);

    // Stop with cleanup; the network disappears.
    let stop = service
        .stop_network(
            StopNetworkRequest {
                network_id: network_id.clone(),
                cleanup: true,
            },
            &cancel,
        )
        .await
        .unwrap();
    assert!(stop.success);
    assert!(!dir.path().join(&network_id).exists());

    let gone = service
        .get_network_status(StatusRequest { network_id }, &cancel)
        .await
        .unwrap();
    assert!(!gone.running);
    assert!(gone.status.contains("not found"));
}

#[tokio::test]
async fn test_init_cancelled_before_start_leaves_no_subtree() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_over(healthy_executor(), dir.path());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = service
        .init_network(InitNetworkRequest::default(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, FabricxError::Cancelled));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_init_cancelled_mid_bootstrap_leaves_no_subtree() {
    let dir = tempfile::tempdir().unwrap();
    // Readiness is never satisfied (ps reports no containers), so the
    // bootstrap sits in the readiness poll when the cancel fires.
    let executor = ScriptedExecutor::new().on("ps -q", CommandOutput::ok(""));
    let service = service_over(executor, dir.path());

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let err = service
        .init_network(InitNetworkRequest::default(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, FabricxError::Cancelled));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_crypto_failure_is_soft_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let executor = ScriptedExecutor::new()
        .on("cryptogen", CommandOutput::failed("error: bad template", 1));
    let service = service_over(executor, dir.path());
    let cancel = CancellationToken::new();

    let response = service
        .init_network(InitNetworkRequest::default(), &cancel)
        .await
        .unwrap();
    assert!(!response.success);
    assert!(response.message.contains("Crypto material generation failed"));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_readiness_timeout_is_soft_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let executor = ScriptedExecutor::new().on("ps -q", CommandOutput::ok("c1\n"));
    let service = service_over(executor, dir.path());
    let cancel = CancellationToken::new();

    let response = service
        .init_network(InitNetworkRequest::default(), &cancel)
        .await
        .unwrap();
    assert!(!response.success);
    assert!(response.message.contains("Timed out"));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_stop_unknown_network_is_soft_failure() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_over(ScriptedExecutor::new(), dir.path());
    let cancel = CancellationToken::new();

    let response = service
        .stop_network(
            StopNetworkRequest {
                network_id: "zzz99999".into(),
                cleanup: false,
            },
            &cancel,
        )
        .await
        .unwrap();
    assert!(!response.success);
    assert!(response.message.contains("zzz99999"));
}

#[tokio::test]
async fn test_deploy_failure_leaves_network_registered() {
    let dir = tempfile::tempdir().unwrap();
    let executor = ScriptedExecutor::new()
        .on("chaincode install", CommandOutput::failed("no space", 1))
        .on("ps -q", CommandOutput::ok("c1\nc2\nc3\nc4\nc5\nc6\nc7\nc8\n"));
    let service = service_over(executor, dir.path());
    let cancel = CancellationToken::new();

    let init = service
        .init_network(InitNetworkRequest::default(), &cancel)
        .await
        .unwrap();
    assert!(init.success);

    let deploy = service
        .deploy_chaincode(
            DeployChaincodeRequest {
                network_id: init.network_id.clone(),
                name: "basic".into(),
                path: "/chaincode/basic".into(),
                version: "1.0".into(),
                language: "golang".into(),
                endorsement_orgs: Vec::new(),
            },
            &cancel,
        )
        .await
        .unwrap();
    assert!(!deploy.success);

    // The network itself is untouched by a deployment failure.
    let status = service
        .get_network_status(
            StatusRequest {
                network_id: init.network_id,
            },
            &cancel,
        )
        .await
        .unwrap();
    assert!(status.running);
}

#[tokio::test]
async fn test_invoke_against_unknown_network_is_soft_failure() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_over(ScriptedExecutor::new(), dir.path());
    let cancel = CancellationToken::new();

    let response = service
        .invoke_transaction(
            InvokeRequest {
                network_id: "zzz99999".into(),
                chaincode: "basic".into(),
                function: "CreateAsset".into(),
                args: Vec::new(),
                transient: None,
            },
            &cancel,
        )
        .await
        .unwrap();
    assert!(!response.success);
    assert!(response.message.contains("not found"));
}

#[tokio::test]
async fn test_stream_logs_unknown_network_errors() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_over(ScriptedExecutor::new(), dir.path());

    let err = service
        .stream_logs(
            StreamLogsRequest {
                network_id: "zzz99999".into(),
                container: None,
            },
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FabricxError::NetworkNotFound(_)));
}

#[tokio::test]
async fn test_shutdown_stops_and_clears_everything() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_over(healthy_executor(), dir.path());
    let cancel = CancellationToken::new();

    let a = service
        .init_network(InitNetworkRequest::default(), &cancel)
        .await
        .unwrap();
    let b = service
        .init_network(InitNetworkRequest::default(), &cancel)
        .await
        .unwrap();
    assert!(a.success && b.success);
    assert_eq!(service.registry().len().await, 2);

    service.shutdown().await;
    assert!(service.registry().is_empty().await);
}

#[tokio::test]
async fn test_network_ids_are_unique_across_bootstraps() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_over(healthy_executor(), dir.path());
    let cancel = CancellationToken::new();

    let mut seen = std::collections::HashSet::new();
    for _ in 0..5 {
        let response = service
            .init_network(InitNetworkRequest::default(), &cancel)
            .await
            .unwrap();
        assert!(response.success);
        assert!(seen.insert(response.network_id));
    }
}
