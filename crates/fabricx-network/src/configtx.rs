//! Channel and genesis configuration.
//!
//! Renders `configtx.yaml` for the planned topology and drives the
//! toolchain container to produce the genesis block, the channel-creation
//! transaction and per-organization anchor-peer updates. The document is
//! templated text rather than a serde tree because the format leans on YAML
//! anchors, which `serde_yaml` cannot emit.

use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;

use fabricx_common::error::{FabricxError, Result};
use fabricx_common::exec::Executor;

use crate::cryptogen::{tool_run_spec, TOOL_MOUNT};
use crate::model::{Network, Organization};

/// Profile used to render the ordering-system genesis block.
pub const GENESIS_PROFILE: &str = "FabricxGenesis";
/// Channel id of the ordering system channel.
pub const SYSTEM_CHANNEL: &str = "fabricx-sys-channel";
/// Consortium name shared by every application channel.
pub const CONSORTIUM: &str = "FabricxConsortium";

/// Renders the complete `configtx.yaml` document for a network.
pub fn configtx_document(network: &Network) -> String {
    let orderer = network.orderer();
    let mut doc = String::from("Organizations:\n");

    doc.push_str(&format!(
        r#"    - &OrdererOrg
        Name: OrdererOrg
        ID: OrdererMSP
        MSPDir: {TOOL_MOUNT}/crypto-config/ordererOrganizations/{domain}/msp
        Policies:
            Readers:
                Type: Signature
                Rule: "OR('OrdererMSP.member')"
            Writers:
                Type: Signature
                Rule: "OR('OrdererMSP.member')"
            Admins:
                Type: Signature
                Rule: "OR('OrdererMSP.admin')"
"#,
        domain = orderer.domain,
    ));

    for org in &network.organizations {
        doc.push_str(&org_section(org));
    }

    doc.push_str(
        r#"
Capabilities:
    Channel: &ChannelCapabilities
        V2_0: true
    Orderer: &OrdererCapabilities
        V2_0: true
    Application: &ApplicationCapabilities
        V2_0: true

Application: &ApplicationDefaults
    Organizations:
    Policies:
        Readers:
            Type: ImplicitMeta
            Rule: "ANY Readers"
        Writers:
            Type: ImplicitMeta
            Rule: "ANY Writers"
        Admins:
            Type: ImplicitMeta
            Rule: "MAJORITY Admins"
        LifecycleEndorsement:
            Type: ImplicitMeta
            Rule: "MAJORITY Endorsement"
        Endorsement:
            Type: ImplicitMeta
            Rule: "MAJORITY Endorsement"
    Capabilities:
        <<: *ApplicationCapabilities
"#,
    );

    doc.push_str(&format!(
        r#"
Orderer: &OrdererDefaults
    OrdererType: solo
    Addresses:
        - {orderer_address}
    BatchTimeout: 2s
    BatchSize:
        MaxMessageCount: 10
        AbsoluteMaxBytes: 99 MB
        PreferredMaxBytes: 512 KB
    Policies:
        Readers:
            Type: ImplicitMeta
            Rule: "ANY Readers"
        Writers:
            Type: ImplicitMeta
            Rule: "ANY Writers"
        Admins:
            Type: ImplicitMeta
            Rule: "MAJORITY Admins"
        BlockValidation:
            Type: ImplicitMeta
            Rule: "ANY Writers"

Channel: &ChannelDefaults
    Policies:
        Readers:
            Type: ImplicitMeta
            Rule: "ANY Readers"
        Writers:
            Type: ImplicitMeta
            Rule: "ANY Writers"
        Admins:
            Type: ImplicitMeta
            Rule: "MAJORITY Admins"
    Capabilities:
        <<: *ChannelCapabilities
"#,
        orderer_address = orderer.network_address(),
    ));

    let consortium_orgs: String = network
        .organizations
        .iter()
        .map(|org| format!("                    - *{}\n", org.name))
        .collect();
    let channel_orgs: String = network
        .organizations
        .iter()
        .map(|org| format!("                - *{}\n", org.name))
        .collect();

    doc.push_str(&format!(
        r#"
Profiles:
    {GENESIS_PROFILE}:
        <<: *ChannelDefaults
        Orderer:
            <<: *OrdererDefaults
            Organizations:
                - *OrdererOrg
            Capabilities:
                <<: *OrdererCapabilities
        Consortiums:
            {CONSORTIUM}:
                Organizations:
{consortium_orgs}    {channel_profile}:
        Consortium: {CONSORTIUM}
        <<: *ChannelDefaults
        Application:
            <<: *ApplicationDefaults
            Organizations:
{channel_orgs}            Capabilities:
                <<: *ApplicationCapabilities
"#,
        channel_profile = network.channel.profile,
    ));

    doc
}

fn org_section(org: &Organization) -> String {
    let anchor_peers: String = org
        .peers
        .iter()
        .map(|peer| {
            format!(
                "            - Host: {}\n              Port: {}\n",
                peer.fqdn(org),
                peer.port
            )
        })
        .collect();

    format!(
        r#"    - &{name}
        Name: {msp}
        ID: {msp}
        MSPDir: {TOOL_MOUNT}/crypto-config/peerOrganizations/{domain}/msp
        Policies:
            Readers:
                Type: Signature
                Rule: "OR('{msp}.admin', '{msp}.peer', '{msp}.client')"
            Writers:
                Type: Signature
                Rule: "OR('{msp}.admin', '{msp}.client')"
            Admins:
                Type: Signature
                Rule: "OR('{msp}.admin')"
            Endorsement:
                Type: Signature
                Rule: "OR('{msp}.peer')"
        AnchorPeers:
{anchor_peers}"#,
        name = org.name,
        msp = org.msp_id,
        domain = org.domain,
    )
}

/// Writes `configtx.yaml` under the network's base directory and ensures
/// the artifacts directory exists for the tool's outputs.
pub fn write_configtx(network: &Network) -> Result<PathBuf> {
    let path = network.base_dir.join("configtx.yaml");
    std::fs::create_dir_all(network.artifacts_dir())?;
    std::fs::write(&path, configtx_document(network))?;
    Ok(path)
}

async fn run_configtxgen(
    executor: &dyn Executor,
    network: &Network,
    tools_image: &str,
    cancel: &CancellationToken,
    args: Vec<String>,
) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(FabricxError::Cancelled);
    }

    let mut full_args = vec![
        "configtxgen".to_string(),
        "-configPath".to_string(),
        TOOL_MOUNT.to_string(),
    ];
    full_args.extend(args);
    let spec = tool_run_spec(network, tools_image, full_args);

    let output = tokio::select! {
        _ = cancel.cancelled() => return Err(FabricxError::Cancelled),
        result = executor.run(&spec) => result?,
    };

    if !output.success() {
        return Err(FabricxError::CryptoGeneration(output.combined));
    }
    Ok(())
}

/// Renders the genesis block and the channel-creation transaction into the
/// network's artifacts directory. Cancellable; failures carry the tool's
/// captured output.
pub async fn generate_channel_artifacts(
    executor: &dyn Executor,
    network: &Network,
    tools_image: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    write_configtx(network)?;

    run_configtxgen(
        executor,
        network,
        tools_image,
        cancel,
        vec![
            "-profile".to_string(),
            GENESIS_PROFILE.to_string(),
            "-channelID".to_string(),
            SYSTEM_CHANNEL.to_string(),
            "-outputBlock".to_string(),
            format!("{TOOL_MOUNT}/artifacts/genesis.block"),
        ],
    )
    .await?;

    run_configtxgen(
        executor,
        network,
        tools_image,
        cancel,
        vec![
            "-profile".to_string(),
            network.channel.profile.clone(),
            "-outputCreateChannelTx".to_string(),
            format!("{TOOL_MOUNT}/artifacts/{}.tx", network.channel.name),
            "-channelID".to_string(),
            network.channel.name.clone(),
        ],
    )
    .await?;

    info!(network = %network.id, channel = %network.channel.name, "Rendered channel artifacts");
    Ok(())
}

/// File name of an organization's anchor-peer update transaction.
pub fn anchor_tx_name(org: &Organization) -> String {
    format!("{}anchors.tx", org.msp_id)
}

/// Renders one organization's anchor-peer update transaction, for the
/// channel orchestrator to apply.
pub async fn generate_anchor_update(
    executor: &dyn Executor,
    network: &Network,
    org: &Organization,
    tools_image: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    run_configtxgen(
        executor,
        network,
        tools_image,
        cancel,
        vec![
            "-profile".to_string(),
            network.channel.profile.clone(),
            "-outputAnchorPeersUpdate".to_string(),
            format!("{TOOL_MOUNT}/artifacts/{}", anchor_tx_name(org)),
            "-channelID".to_string(),
            network.channel.name.clone(),
            "-asOrg".to_string(),
            org.msp_id.clone(),
        ],
    )
    .await
}
