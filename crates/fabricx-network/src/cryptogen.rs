//! Crypto-material specification and generation.
//!
//! Emits the `crypto-config.yaml` descriptor for the planned topology, then
//! delegates key generation to one cancellable run of the Fabric toolchain
//! container. Tool failures surface as
//! [`FabricxError::CryptoGeneration`] carrying the captured output, the
//! primary diagnosable failure class during bootstrap.

use serde::Serialize;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;

use fabricx_common::error::{FabricxError, Result};
use fabricx_common::exec::{CommandSpec, Executor};

use crate::model::Network;

/// Mount point of the network's base directory inside toolchain runs.
pub(crate) const TOOL_MOUNT: &str = "/fabricx";

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CryptoConfig {
    orderer_orgs: Vec<OrdererOrgSpec>,
    peer_orgs: Vec<PeerOrgSpec>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct OrdererOrgSpec {
    name: String,
    domain: String,
    specs: Vec<HostSpec>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct HostSpec {
    hostname: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PeerOrgSpec {
    name: String,
    domain: String,
    #[serde(rename = "EnableNodeOUs")]
    enable_node_ous: bool,
    template: CountSpec,
    users: CountSpec,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct CountSpec {
    count: u32,
}

/// Builds the crypto-material specification document for a network.
pub fn crypto_config_document(network: &Network) -> CryptoConfig {
    CryptoConfig {
        orderer_orgs: network
            .orderers
            .iter()
            .map(|orderer| OrdererOrgSpec {
                name: "Orderer".to_string(),
                domain: orderer.domain.clone(),
                specs: vec![HostSpec {
                    hostname: orderer.name.clone(),
                }],
            })
            .collect(),
        peer_orgs: network
            .organizations
            .iter()
            .map(|org| PeerOrgSpec {
                name: org.name.clone(),
                domain: org.domain.clone(),
                enable_node_ous: true,
                template: CountSpec {
                    count: org.peers.len() as u32,
                },
                users: CountSpec { count: 1 },
            })
            .collect(),
    }
}

/// Writes `crypto-config.yaml` under the network's base directory.
pub fn write_crypto_config(network: &Network) -> Result<PathBuf> {
    let document = crypto_config_document(network);
    let path = network.base_dir.join("crypto-config.yaml");
    std::fs::create_dir_all(&network.base_dir)?;
    std::fs::write(&path, serde_yaml::to_string(&document)?)?;
    Ok(path)
}

/// One-shot toolchain container invocation against the network's subtree.
pub(crate) fn tool_run_spec<I, S>(network: &Network, tools_image: &str, args: I) -> CommandSpec
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    CommandSpec::new("docker")
        .args(["run", "--rm", "-v"])
        .arg(format!("{}:{}", network.base_dir.display(), TOOL_MOUNT))
        .arg(tools_image)
        .args(args)
}

/// Materializes cryptographic key material from the written specification.
///
/// Cancellable; on cancellation the caller aborts the bootstrap and removes
/// the partial filesystem subtree.
pub async fn generate(
    executor: &dyn Executor,
    network: &Network,
    tools_image: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(FabricxError::Cancelled);
    }

    write_crypto_config(network)?;

    let spec = tool_run_spec(
        network,
        tools_image,
        [
            "cryptogen".to_string(),
            "generate".to_string(),
            format!("--config={TOOL_MOUNT}/crypto-config.yaml"),
            format!("--output={TOOL_MOUNT}/crypto-config"),
        ],
    );

    let output = tokio::select! {
        _ = cancel.cancelled() => return Err(FabricxError::Cancelled),
        result = executor.run(&spec) => result?,
    };

    if !output.success() {
        return Err(FabricxError::CryptoGeneration(output.combined));
    }

    info!(network = %network.id, "Generated crypto material");
    Ok(())
}
