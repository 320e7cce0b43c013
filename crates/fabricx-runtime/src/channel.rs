//! Channel readiness.
//!
//! Sequential by design: each step depends on the previous one's on-chain
//! effect. Channel creation and peer joins are mandatory and fail fast; a
//! network where any peer failed to join is not allowed to operate
//! partially. Anchor-peer updates only affect cross-organization gossip
//! discovery, so their failures are logged and skipped.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use fabricx_common::error::{FabricxError, Result};
use fabricx_network::compose::CLI_ARTIFACTS_PATH;
use fabricx_network::configtx::anchor_tx_name;
use fabricx_network::{configtx, Network, Organization, Peer};

use crate::lifecycle::LifecycleManager;

/// Drives a started network to channel readiness: create the channel, join
/// every peer, then best-effort anchor-peer updates.
pub struct ChannelOrchestrator {
    lifecycle: Arc<LifecycleManager>,
    tools_image: String,
    /// Fixed wait after each join, letting gossip state propagate before
    /// the next dependent step.
    join_wait: Duration,
}

impl ChannelOrchestrator {
    pub fn new(lifecycle: Arc<LifecycleManager>, tools_image: String, join_wait: Duration) -> Self {
        Self {
            lifecycle,
            tools_image,
            join_wait,
        }
    }

    /// Runs the full readiness sequence.
    pub async fn ready(&self, network: &Network, cancel: &CancellationToken) -> Result<()> {
        self.create_channel(network, cancel).await?;
        self.join_peers(network, cancel).await?;
        self.update_anchor_peers(network, cancel).await?;
        info!(network = %network.id, channel = %network.channel.name, "Channel ready");
        Ok(())
    }

    /// Environment for acting as an organization's admin against one of its
    /// peers, inside the shared cli container.
    fn admin_env(org: &Organization, peer: &Peer) -> Vec<(String, String)> {
        vec![
            ("CORE_PEER_LOCALMSPID".to_string(), org.msp_id.clone()),
            ("CORE_PEER_MSPCONFIGPATH".to_string(), org.admin_msp_path()),
            ("CORE_PEER_ADDRESS".to_string(), peer.network_address(org)),
        ]
    }

    fn channel_block_path(network: &Network) -> String {
        format!("{CLI_ARTIFACTS_PATH}/{}.block", network.channel.name)
    }

    /// Issues the channel-create command from the first organization's
    /// identity; the output block lands on the shared artifacts volume.
    async fn create_channel(&self, network: &Network, cancel: &CancellationToken) -> Result<()> {
        let org = &network.organizations[0];
        let peer = &org.peers[0];
        let channel = &network.channel.name;

        let command = vec![
            "peer".to_string(),
            "channel".to_string(),
            "create".to_string(),
            "-o".to_string(),
            network.orderer().network_address(),
            "-c".to_string(),
            channel.clone(),
            "-f".to_string(),
            format!("{CLI_ARTIFACTS_PATH}/{channel}.tx"),
            "--outputBlock".to_string(),
            Self::channel_block_path(network),
        ];

        self.lifecycle
            .exec_in_container(
                &network.cli_container(),
                &Self::admin_env(org, peer),
                &command,
                "channel create",
                cancel,
            )
            .await?;

        info!(network = %network.id, channel = %channel, "Created channel");
        Ok(())
    }

    /// Joins every peer, in order, from its own identity. A single failure
    /// aborts the whole readiness sequence.
    async fn join_peers(&self, network: &Network, cancel: &CancellationToken) -> Result<()> {
        let block = Self::channel_block_path(network);
        let command = vec![
            "peer".to_string(),
            "channel".to_string(),
            "join".to_string(),
            "-b".to_string(),
            block,
        ];

        for (org, peer) in network.peers() {
            self.lifecycle
                .exec_in_container(
                    &network.cli_container(),
                    &Self::admin_env(org, peer),
                    &command,
                    "channel join",
                    cancel,
                )
                .await?;

            info!(network = %network.id, peer = %peer.fqdn(org), "Peer joined channel");

            tokio::select! {
                _ = cancel.cancelled() => return Err(FabricxError::Cancelled),
                _ = tokio::time::sleep(self.join_wait) => {}
            }
        }
        Ok(())
    }

    /// Generates and applies each organization's anchor-peer update.
    /// Non-critical: failures are logged and skipped. Cancellation is the
    /// exception and still aborts the sequence.
    async fn update_anchor_peers(&self, network: &Network, cancel: &CancellationToken) -> Result<()> {
        for org in &network.organizations {
            if let Err(e) = self.update_anchor_peer(network, org, cancel).await {
                if e.is_cancellation() {
                    return Err(e);
                }
                warn!(
                    network = %network.id,
                    org = %org.name,
                    error = %e,
                    "Anchor peer update failed, skipping"
                );
            }
        }
        Ok(())
    }

    async fn update_anchor_peer(
        &self,
        network: &Network,
        org: &Organization,
        cancel: &CancellationToken,
    ) -> Result<()> {
        configtx::generate_anchor_update(
            self.lifecycle.executor(),
            network,
            org,
            &self.tools_image,
            cancel,
        )
        .await?;

        let command = vec![
            "peer".to_string(),
            "channel".to_string(),
            "update".to_string(),
            "-o".to_string(),
            network.orderer().network_address(),
            "-c".to_string(),
            network.channel.name.clone(),
            "-f".to_string(),
            format!("{CLI_ARTIFACTS_PATH}/{}", anchor_tx_name(org)),
        ];

        self.lifecycle
            .exec_in_container(
                &network.cli_container(),
                &Self::admin_env(org, &org.peers[0]),
                &command,
                "anchor peer update",
                cancel,
            )
            .await?;

        info!(network = %network.id, org = %org.name, "Updated anchor peer");
        Ok(())
    }
}
