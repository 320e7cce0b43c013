use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use fabricx_common::api::{
    DeployChaincodeRequest, DeployChaincodeResponse, InitNetworkRequest, InitNetworkResponse,
    InvokeRequest, InvokeResponse, LogEntry, NetworkStatusResponse, OrdererStatusInfo,
    PeerStatusInfo, QueryRequest, QueryResponse, StatusRequest, StopNetworkRequest,
    StopNetworkResponse, StreamLogsRequest,
};
use fabricx_common::error::{FabricxError, Result};
use fabricx_common::exec::Executor;
use fabricx_network::model::generate_network_id;
use fabricx_network::planner::PlanRequest;
use fabricx_network::{compose, configtx, cryptogen, plan_network, Network, DEFAULT_TOOLS_IMAGE};
use fabricx_runtime::{
    ChannelOrchestrator, DeploymentPipeline, GroupStatus, LifecycleManager, TransactionGateway,
};

use crate::registry::NetworkRegistry;

/// Tunables for the service façade.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Root under which each network's subtree is created, keyed by id.
    pub base_dir: PathBuf,
    /// Toolchain image for cryptogen/configtxgen one-shot runs.
    pub tools_image: String,
    /// Overall deadline for the post-start readiness poll.
    pub readiness_deadline: Duration,
    /// Fixed interval between readiness polls.
    pub readiness_interval: Duration,
    /// Wait after each channel join for gossip state to propagate.
    pub join_wait: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_dir: std::env::temp_dir().join("fabricx"),
            tools_image: DEFAULT_TOOLS_IMAGE.to_string(),
            readiness_deadline: Duration::from_secs(60),
            readiness_interval: Duration::from_secs(2),
            join_wait: Duration::from_secs(2),
        }
    }
}

/// The service façade: one method per lifecycle operation, each cancellable
/// and concurrency-safe. Holds the registry it was constructed with and
/// delegates to the runtime components.
pub struct FabricxService {
    registry: Arc<NetworkRegistry>,
    lifecycle: Arc<LifecycleManager>,
    channel: ChannelOrchestrator,
    pipeline: DeploymentPipeline,
    gateway: TransactionGateway,
    executor: Arc<dyn Executor>,
    config: ServiceConfig,
}

impl FabricxService {
    pub fn new(executor: Arc<dyn Executor>, registry: Arc<NetworkRegistry>) -> Self {
        Self::with_config(executor, registry, ServiceConfig::default())
    }

    pub fn with_config(
        executor: Arc<dyn Executor>,
        registry: Arc<NetworkRegistry>,
        config: ServiceConfig,
    ) -> Self {
        let lifecycle = Arc::new(LifecycleManager::new(executor.clone()));
        let channel = ChannelOrchestrator::new(
            lifecycle.clone(),
            config.tools_image.clone(),
            config.join_wait,
        );
        let pipeline = DeploymentPipeline::new(lifecycle.clone());
        let gateway = TransactionGateway::new(lifecycle.clone());

        Self {
            registry,
            lifecycle,
            channel,
            pipeline,
            gateway,
            executor,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<NetworkRegistry> {
        &self.registry
    }

    /// Bootstraps a network end to end.
    ///
    /// # Arguments
    /// * `request` - Requested shape; empty/zero fields take defaults
    /// * `cancel` - Caller-supplied token; if already signaled the call
    ///   returns immediately with no side effects
    ///
    /// # Behavior
    /// Plan, generate crypto and channel material, synthesize the
    /// manifest, start the container group, wait for readiness, get the
    /// channel ready, then register. Any failure leaves no partial
    /// artifacts: the filesystem subtree, any started containers and any
    /// registry entry are removed.
    ///
    /// # Returns
    /// - `Ok` with `success: true` and the network id plus peer endpoints
    /// - `Ok` with `success: false` for business-level failures
    /// - `Err` only for the call's own cancellation or timeout
    pub async fn init_network(
        &self,
        request: InitNetworkRequest,
        cancel: &CancellationToken,
    ) -> Result<InitNetworkResponse> {
        if cancel.is_cancelled() {
            return Err(FabricxError::Cancelled);
        }
        if request.custom_config.is_some() {
            info!("Custom configuration supplied; carried through unchanged");
        }

        let id = generate_network_id();
        let network = plan_network(
            PlanRequest {
                name: request.name,
                org_count: request.org_count,
                channel_name: request.channel_name,
            },
            self.config.base_dir.join(&id),
            id.clone(),
        );
        info!(network = %id, name = %network.name, orgs = network.organizations.len(), "Bootstrapping network");

        match self.bootstrap(&network, cancel).await {
            Ok(()) => {
                let endpoints = network.peer_endpoints();
                let name = network.name.clone();
                self.registry.insert(network).await;
                Ok(InitNetworkResponse::ok(
                    id,
                    endpoints,
                    format!("network {name} is ready"),
                ))
            }
            Err(e) => {
                error!(network = %id, error = %e, "Bootstrap failed, cleaning up");
                self.cleanup_failed_bootstrap(&network).await;
                if e.is_cancellation() {
                    Err(e)
                } else {
                    Ok(InitNetworkResponse::failure(e.to_string()))
                }
            }
        }
    }

    async fn bootstrap(&self, network: &Network, cancel: &CancellationToken) -> Result<()> {
        std::fs::create_dir_all(&network.base_dir)?;

        cryptogen::generate(
            self.executor.as_ref(),
            network,
            &self.config.tools_image,
            cancel,
        )
        .await?;
        configtx::generate_channel_artifacts(
            self.executor.as_ref(),
            network,
            &self.config.tools_image,
            cancel,
        )
        .await?;
        compose::write_manifest(network)?;

        self.lifecycle.start(network, cancel).await?;
        self.lifecycle
            .wait_until_ready(
                &network.id,
                expected_containers(network),
                self.config.readiness_deadline,
                self.config.readiness_interval,
                cancel,
            )
            .await?;

        self.channel.ready(network, cancel).await
    }

    /// Best-effort removal of everything a failed bootstrap may have
    /// created. Errors here are logged, never propagated; the original
    /// failure is the one the caller sees.
    async fn cleanup_failed_bootstrap(&self, network: &Network) {
        let fresh = CancellationToken::new();
        if let Err(e) = self.lifecycle.stop(network, true, &fresh).await {
            warn!(network = %network.id, error = %e, "Teardown during cleanup failed");
            if network.base_dir.exists() {
                if let Err(e) = std::fs::remove_dir_all(&network.base_dir) {
                    warn!(network = %network.id, error = %e, "Could not remove network subtree");
                }
            }
        }
        self.registry.remove(&network.id).await;
    }

    /// Runs the chaincode deployment pipeline against a registered network.
    /// Deployment failures leave the network itself untouched.
    pub async fn deploy_chaincode(
        &self,
        request: DeployChaincodeRequest,
        cancel: &CancellationToken,
    ) -> Result<DeployChaincodeResponse> {
        if cancel.is_cancelled() {
            return Err(FabricxError::Cancelled);
        }
        let network = match self.registry.get(&request.network_id).await {
            Some(network) => network,
            None => {
                return Ok(DeployChaincodeResponse::failure(format!(
                    "network {} not found",
                    request.network_id
                )))
            }
        };

        match self.pipeline.deploy(&network, &request, cancel).await {
            Ok(chaincode_id) => Ok(DeployChaincodeResponse::ok(
                chaincode_id,
                format!("chaincode {} deployed", request.name),
            )),
            Err(e) if e.is_cancellation() => Err(e),
            Err(e) => Ok(DeployChaincodeResponse::failure(e.to_string())),
        }
    }

    /// Submits a transaction through the gateway.
    pub async fn invoke_transaction(
        &self,
        request: InvokeRequest,
        cancel: &CancellationToken,
    ) -> Result<InvokeResponse> {
        if cancel.is_cancelled() {
            return Err(FabricxError::Cancelled);
        }
        let network = match self.registry.get(&request.network_id).await {
            Some(network) => network,
            None => {
                return Ok(InvokeResponse::failure(format!(
                    "network {} not found",
                    request.network_id
                )))
            }
        };

        let result = match &request.transient {
            Some(transient) => {
                self.gateway
                    .invoke_with_transient(
                        &network,
                        &request.chaincode,
                        &request.function,
                        &request.args,
                        transient,
                        cancel,
                    )
                    .await
            }
            None => {
                self.gateway
                    .invoke(
                        &network,
                        &request.chaincode,
                        &request.function,
                        &request.args,
                        cancel,
                    )
                    .await
            }
        };

        match result {
            Ok((tx_id, payload)) => Ok(InvokeResponse::ok(tx_id, payload)),
            Err(e) if e.is_cancellation() => Err(e),
            Err(e) => Ok(InvokeResponse::failure(e.to_string())),
        }
    }

    /// Runs a read-only query through the gateway.
    pub async fn query_ledger(
        &self,
        request: QueryRequest,
        cancel: &CancellationToken,
    ) -> Result<QueryResponse> {
        if cancel.is_cancelled() {
            return Err(FabricxError::Cancelled);
        }
        let network = match self.registry.get(&request.network_id).await {
            Some(network) => network,
            None => {
                return Ok(QueryResponse::failure(format!(
                    "network {} not found",
                    request.network_id
                )))
            }
        };

        match self
            .gateway
            .query(
                &network,
                &request.chaincode,
                &request.function,
                &request.args,
                cancel,
            )
            .await
        {
            Ok(payload) => Ok(QueryResponse::ok(payload)),
            Err(e) if e.is_cancellation() => Err(e),
            Err(e) => Ok(QueryResponse::failure(e.to_string())),
        }
    }

    /// Reports aggregate and per-service status for a network.
    pub async fn get_network_status(
        &self,
        request: StatusRequest,
        cancel: &CancellationToken,
    ) -> Result<NetworkStatusResponse> {
        if cancel.is_cancelled() {
            return Err(FabricxError::Cancelled);
        }
        let network = match self.registry.get(&request.network_id).await {
            Some(network) => network,
            None => return Ok(NetworkStatusResponse::not_found(&request.network_id)),
        };

        let (running, status) = match self.lifecycle.status(&network.id).await {
            Ok(GroupStatus::NotStarted) => (false, "not started".to_string()),
            Ok(GroupStatus::Started { containers }) => {
                (containers > 0, format!("{containers} containers running"))
            }
            Err(e) if e.is_cancellation() => return Err(e),
            Err(e) => (false, e.to_string()),
        };

        let service_status = if running { "running" } else { "stopped" };
        let peers = network
            .peers()
            .map(|(org, peer)| PeerStatusInfo {
                name: peer.fqdn(org),
                org: org.name.clone(),
                status: service_status.to_string(),
                endpoint: peer.host_endpoint(),
            })
            .collect();
        let orderers = network
            .orderers
            .iter()
            .map(|orderer| OrdererStatusInfo {
                name: orderer.fqdn(),
                status: service_status.to_string(),
                endpoint: orderer.host_endpoint(),
            })
            .collect();

        Ok(NetworkStatusResponse {
            running,
            status,
            peers,
            orderers,
        })
    }

    /// Opens a log stream for a network. The returned receiver yields
    /// entries until the follower ends or `cancel` fires; dropping it tears
    /// the follower down.
    pub async fn stream_logs(
        &self,
        request: StreamLogsRequest,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<LogEntry>> {
        if cancel.is_cancelled() {
            return Err(FabricxError::Cancelled);
        }
        let network = self
            .registry
            .get(&request.network_id)
            .await
            .ok_or_else(|| FabricxError::NetworkNotFound(request.network_id.clone()))?;

        self.lifecycle
            .stream_logs(&network.id, request.container, cancel)
            .await
    }

    /// Stops a network; with `cleanup` the volumes and filesystem subtree
    /// are removed and the network is dropped from the registry.
    pub async fn stop_network(
        &self,
        request: StopNetworkRequest,
        cancel: &CancellationToken,
    ) -> Result<StopNetworkResponse> {
        if cancel.is_cancelled() {
            return Err(FabricxError::Cancelled);
        }
        let network = match self.registry.get(&request.network_id).await {
            Some(network) => network,
            None => {
                return Ok(StopNetworkResponse::failure(format!(
                    "network {} not found",
                    request.network_id
                )))
            }
        };

        match self.lifecycle.stop(&network, request.cleanup, cancel).await {
            Ok(()) => {
                if request.cleanup {
                    self.registry.remove(&network.id).await;
                }
                Ok(StopNetworkResponse::ok(format!(
                    "network {} stopped",
                    network.id
                )))
            }
            Err(e) if e.is_cancellation() => Err(e),
            Err(e) => Ok(StopNetworkResponse::failure(e.to_string())),
        }
    }

    /// Best-effort stops every registered network, continuing past
    /// individual failures, then clears the registry.
    pub async fn shutdown(&self) {
        let networks = self.registry.all().await;
        info!(count = networks.len(), "Shutting down all networks");

        for network in networks {
            let fresh = CancellationToken::new();
            if let Err(e) = self.lifecycle.stop(&network, false, &fresh).await {
                warn!(network = %network.id, error = %e, "Shutdown stop failed, continuing");
            }
        }
        self.registry.clear().await;
    }
}

/// Containers the manifest declares: one orderer, one CA per organization,
/// one peer plus an optional state database per peer, and the shared cli.
fn expected_containers(network: &Network) -> usize {
    let mut count = network.orderers.len() + network.organizations.len() + 1;
    for (_, peer) in network.peers() {
        count += if peer.state_db { 2 } else { 1 };
    }
    count
}
