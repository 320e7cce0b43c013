//! Chaincode deployment pipeline.
//!
//! Strictly ordered: package → install (every peer) → approve (every
//! organization) → commit → init. Commit never runs unless every prior
//! phase succeeded for every required participant. There is no rollback: a
//! failed install after earlier successes leaves the chaincode on the peers
//! it already reached, and the pipeline aborts without retracting it.

use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use fabricx_common::api::DeployChaincodeRequest;
use fabricx_common::error::{FabricxError, Result};
use fabricx_network::{Network, Organization};

use crate::lifecycle::LifecycleManager;

/// In-container staging locations inside the shared cli service.
const CHAINCODE_SRC_ROOT: &str = "/opt/chaincode";
const PACKAGE_ROOT: &str = "/tmp";

/// Runs the deployment pipeline against a started, channel-ready network.
pub struct DeploymentPipeline {
    lifecycle: Arc<LifecycleManager>,
}

impl DeploymentPipeline {
    pub fn new(lifecycle: Arc<LifecycleManager>) -> Self {
        Self { lifecycle }
    }

    /// Deploys chaincode end to end and returns a generated deployment
    /// identifier. The identifier is cosmetic bookkeeping for the caller;
    /// addressing is always by name and channel.
    pub async fn deploy(
        &self,
        network: &Network,
        request: &DeployChaincodeRequest,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let label = package_label(&request.name, &request.version);
        let policy = endorsement_policy(network, &request.endorsement_orgs);

        self.package(network, request, &label, cancel).await?;
        self.install(network, request, cancel).await?;
        self.approve(network, request, &label, &policy, cancel).await?;
        self.commit(network, request, &policy, cancel).await?;
        self.init(network, request, cancel).await;

        let deployment_id = deployment_id(&request.name);
        info!(
            network = %network.id,
            chaincode = %request.name,
            deployment = %deployment_id,
            "Chaincode deployed"
        );
        Ok(deployment_id)
    }

    fn archive_path(request: &DeployChaincodeRequest) -> String {
        format!("{PACKAGE_ROOT}/{}.tar.gz", request.name)
    }

    /// Copies the source into the shared cli container and packages it.
    async fn package(
        &self,
        network: &Network,
        request: &DeployChaincodeRequest,
        label: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let cli = network.cli_container();
        let staged_src = format!("{CHAINCODE_SRC_ROOT}/{}", request.name);

        self.lifecycle
            .copy_to_container(&request.path, &cli, &staged_src, cancel)
            .await?;

        let command = vec![
            "peer".to_string(),
            "lifecycle".to_string(),
            "chaincode".to_string(),
            "package".to_string(),
            Self::archive_path(request),
            "--path".to_string(),
            staged_src,
            "--lang".to_string(),
            request.language.clone(),
            "--label".to_string(),
            label.to_string(),
        ];
        self.lifecycle
            .exec_in_container(&cli, &[], &command, "chaincode package", cancel)
            .await?;

        info!(network = %network.id, label = %label, "Packaged chaincode");
        Ok(())
    }

    /// Installs the archive on every organization's every peer. A loop, not
    /// concurrent: simplicity over throughput at this scale. Any failure
    /// aborts the whole deployment.
    async fn install(
        &self,
        network: &Network,
        request: &DeployChaincodeRequest,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let cli = network.cli_container();
        let command = vec![
            "peer".to_string(),
            "lifecycle".to_string(),
            "chaincode".to_string(),
            "install".to_string(),
            Self::archive_path(request),
        ];

        for (org, peer) in network.peers() {
            self.lifecycle
                .exec_in_container(
                    &cli,
                    &peer_admin_env(org, peer),
                    &command,
                    "chaincode install",
                    cancel,
                )
                .await?;
            info!(network = %network.id, peer = %peer.fqdn(org), "Installed chaincode");
        }
        Ok(())
    }

    /// Approves the definition for every organization, resolving the opaque
    /// package identifier from the install listing first.
    async fn approve(
        &self,
        network: &Network,
        request: &DeployChaincodeRequest,
        label: &str,
        policy: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let cli = network.cli_container();

        for org in &network.organizations {
            let env = peer_admin_env(org, &org.peers[0]);

            let listing = self
                .lifecycle
                .exec_in_container(
                    &cli,
                    &env,
                    &[
                        "peer".to_string(),
                        "lifecycle".to_string(),
                        "chaincode".to_string(),
                        "queryinstalled".to_string(),
                    ],
                    "chaincode queryinstalled",
                    cancel,
                )
                .await?;

            let package_id = parse_package_id(&listing.combined, label)
                .ok_or_else(|| FabricxError::PackageIdNotFound(label.to_string()))?;

            let command = vec![
                "peer".to_string(),
                "lifecycle".to_string(),
                "chaincode".to_string(),
                "approveformyorg".to_string(),
                "-o".to_string(),
                network.orderer().network_address(),
                "--channelID".to_string(),
                network.channel.name.clone(),
                "--name".to_string(),
                request.name.clone(),
                "--version".to_string(),
                request.version.clone(),
                "--package-id".to_string(),
                package_id,
                "--sequence".to_string(),
                "1".to_string(),
                "--signature-policy".to_string(),
                policy.to_string(),
            ];
            self.lifecycle
                .exec_in_container(&cli, &env, &command, "chaincode approve", cancel)
                .await?;

            info!(network = %network.id, org = %org.name, "Approved chaincode definition");
        }
        Ok(())
    }

    /// Commits the definition from the first organization's identity,
    /// addressed to every peer's endorsement endpoint.
    async fn commit(
        &self,
        network: &Network,
        request: &DeployChaincodeRequest,
        policy: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let org = &network.organizations[0];
        let mut command = vec![
            "peer".to_string(),
            "lifecycle".to_string(),
            "chaincode".to_string(),
            "commit".to_string(),
            "-o".to_string(),
            network.orderer().network_address(),
            "--channelID".to_string(),
            network.channel.name.clone(),
            "--name".to_string(),
            request.name.clone(),
            "--version".to_string(),
            request.version.clone(),
            "--sequence".to_string(),
            "1".to_string(),
            "--signature-policy".to_string(),
            policy.to_string(),
        ];
        for (org, peer) in network.peers() {
            command.push("--peerAddresses".to_string());
            command.push(peer.network_address(org));
        }

        self.lifecycle
            .exec_in_container(
                &network.cli_container(),
                &peer_admin_env(org, &org.peers[0]),
                &command,
                "chaincode commit",
                cancel,
            )
            .await?;

        info!(network = %network.id, chaincode = %request.name, "Committed chaincode definition");
        Ok(())
    }

    /// Attempts a constructor invocation. Many chaincodes have no
    /// constructor, so failure is logged only, never propagated.
    async fn init(
        &self,
        network: &Network,
        request: &DeployChaincodeRequest,
        cancel: &CancellationToken,
    ) {
        let org = &network.organizations[0];
        let ctor = serde_json::json!({"function": "init", "Args": []}).to_string();
        let mut command = vec![
            "peer".to_string(),
            "chaincode".to_string(),
            "invoke".to_string(),
            "-o".to_string(),
            network.orderer().network_address(),
            "-C".to_string(),
            network.channel.name.clone(),
            "-n".to_string(),
            request.name.clone(),
            "--isInit".to_string(),
            "-c".to_string(),
            ctor,
            "--waitForEvent".to_string(),
        ];
        for (org, peer) in network.peers() {
            command.push("--peerAddresses".to_string());
            command.push(peer.network_address(org));
        }

        if let Err(e) = self
            .lifecycle
            .exec_in_container(
                &network.cli_container(),
                &peer_admin_env(org, &org.peers[0]),
                &command,
                "chaincode init",
                cancel,
            )
            .await
        {
            warn!(network = %network.id, chaincode = %request.name, error = %e, "Init skipped");
        }
    }
}

fn peer_admin_env(
    org: &Organization,
    peer: &fabricx_network::Peer,
) -> Vec<(String, String)> {
    vec![
        ("CORE_PEER_LOCALMSPID".to_string(), org.msp_id.clone()),
        ("CORE_PEER_MSPCONFIGPATH".to_string(), org.admin_msp_path()),
        ("CORE_PEER_ADDRESS".to_string(), peer.network_address(org)),
    ]
}

/// Archive label: `<name>_<version>`.
pub fn package_label(name: &str, version: &str) -> String {
    format!("{name}_{version}")
}

/// Generated deployment identifier: the chaincode name plus a short random
/// suffix.
pub fn deployment_id(name: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .map(char::from)
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .take(6)
        .collect();
    format!("{name}-{suffix}")
}

/// Resolves the opaque package identifier from a `queryinstalled` listing
/// by matching the expected label textually.
///
/// Expected line shape:
/// `Package ID: basic_1.0:3a1b..., Label: basic_1.0`
pub fn parse_package_id(output: &str, label: &str) -> Option<String> {
    for line in output.lines() {
        let rest = match line.trim().strip_prefix("Package ID: ") {
            Some(rest) => rest,
            None => continue,
        };
        let (package_id, line_label) = match rest.split_once(',') {
            Some((id, rest)) => (id.trim(), rest.trim()),
            None => continue,
        };
        if line_label.strip_prefix("Label: ").map(str::trim) == Some(label) {
            return Some(package_id.to_string());
        }
    }
    None
}

/// Synthesizes an OR-of-members endorsement policy.
///
/// With requested organizations, the policy covers exactly the named subset
/// (falling back to every organization when none of the names match);
/// otherwise it covers every organization in the network.
pub fn endorsement_policy(network: &Network, requested: &[String]) -> String {
    let matched: Vec<&Organization> = if requested.is_empty() {
        network.organizations.iter().collect()
    } else {
        let subset: Vec<&Organization> = network
            .organizations
            .iter()
            .filter(|org| requested.iter().any(|name| name == &org.name))
            .collect();
        if subset.is_empty() {
            network.organizations.iter().collect()
        } else {
            subset
        }
    };

    let members: Vec<String> = matched
        .iter()
        .map(|org| format!("'{}.member'", org.msp_id))
        .collect();
    format!("OR({})", members.join(","))
}
