//! Compose manifest synthesis.
//!
//! Pure function from a [`Network`] to the container-group manifest: one
//! orderer service, one certificate authority per organization, one CouchDB
//! per state-database peer, one peer service per peer, and a shared
//! administrative `cli` service with every organization's admin identity
//! mounted so later phases can issue lifecycle commands without per-call
//! identity negotiation.
//!
//! Services are kept in a `BTreeMap` so the rendered YAML is deterministic.
//! No external calls; the only failure mode is a filesystem write error.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

use fabricx_common::error::Result;

use crate::model::{Network, Organization, Peer};
use crate::{CA_IMAGE, COUCHDB_IMAGE, ORDERER_IMAGE, PEER_IMAGE};

/// Compose network every service joins; prefixed with the project name by
/// the runtime, so concurrent networks stay isolated.
const COMPOSE_NETWORK: &str = "fabricx";

/// In-container mount points used by the shared cli service.
pub const CLI_CRYPTO_PATH: &str = "/etc/hyperledger/crypto";
pub const CLI_ARTIFACTS_PATH: &str = "/etc/hyperledger/artifacts";

#[derive(Debug, Serialize)]
pub struct ComposeFile {
    version: String,
    services: BTreeMap<String, ComposeService>,
    networks: BTreeMap<String, ComposeNetwork>,
}

#[derive(Debug, Default, Serialize)]
pub struct ComposeService {
    image: String,
    container_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hostname: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    environment: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    working_dir: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ports: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    volumes: Vec<String>,
    networks: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    depends_on: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    tty: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stdin_open: bool,
}

#[derive(Debug, Serialize)]
struct ComposeNetwork {
    driver: String,
}

/// Builds the manifest for a network. Pure; does not touch the filesystem.
pub fn synthesize(network: &Network) -> ComposeFile {
    let mut services = BTreeMap::new();

    services.insert("orderer".to_string(), orderer_service(network));

    for org in &network.organizations {
        services.insert(format!("ca-{}", org.slug()), ca_service(network, org));
        for peer in &org.peers {
            if peer.state_db {
                services.insert(
                    couchdb_service_name(org, peer),
                    couchdb_service(network, org, peer),
                );
            }
            services.insert(peer.service_name(org), peer_service(network, org, peer));
        }
    }

    services.insert("cli".to_string(), cli_service(network));

    let mut networks = BTreeMap::new();
    networks.insert(
        COMPOSE_NETWORK.to_string(),
        ComposeNetwork {
            driver: "bridge".to_string(),
        },
    );

    ComposeFile {
        version: "3.7".to_string(),
        services,
        networks,
    }
}

/// Renders the manifest and writes it to the network's artifacts directory.
pub fn write_manifest(network: &Network) -> Result<PathBuf> {
    let manifest = synthesize(network);
    let path = network.compose_path();
    std::fs::create_dir_all(network.artifacts_dir())?;
    std::fs::write(&path, serde_yaml::to_string(&manifest)?)?;
    info!(network = %network.id, path = %path.display(), "Wrote compose manifest");
    Ok(path)
}

fn couchdb_service_name(org: &Organization, peer: &Peer) -> String {
    format!("couchdb-{}", peer.service_name(org))
}

fn orderer_service(network: &Network) -> ComposeService {
    let orderer = network.orderer();
    let crypto = network.crypto_dir();
    let artifacts = network.artifacts_dir();

    ComposeService {
        image: ORDERER_IMAGE.to_string(),
        container_name: network.container_name("orderer"),
        hostname: Some(orderer.fqdn()),
        environment: vec![
            "FABRIC_LOGGING_SPEC=INFO".to_string(),
            "ORDERER_GENERAL_LISTENADDRESS=0.0.0.0".to_string(),
            format!("ORDERER_GENERAL_LISTENPORT={}", orderer.port),
            "ORDERER_GENERAL_BOOTSTRAPMETHOD=file".to_string(),
            "ORDERER_GENERAL_BOOTSTRAPFILE=/var/hyperledger/orderer/genesis.block".to_string(),
            "ORDERER_GENERAL_LOCALMSPID=OrdererMSP".to_string(),
            "ORDERER_GENERAL_LOCALMSPDIR=/var/hyperledger/orderer/msp".to_string(),
            "ORDERER_GENERAL_TLS_ENABLED=false".to_string(),
        ],
        ports: vec![format!("{}:{}", orderer.port, orderer.port)],
        volumes: vec![
            format!(
                "{}/genesis.block:/var/hyperledger/orderer/genesis.block",
                artifacts.display()
            ),
            format!(
                "{}/ordererOrganizations/{}/orderers/{}/msp:/var/hyperledger/orderer/msp",
                crypto.display(),
                orderer.domain,
                orderer.fqdn()
            ),
        ],
        networks: vec![COMPOSE_NETWORK.to_string()],
        ..Default::default()
    }
}

fn ca_service(network: &Network, org: &Organization) -> ComposeService {
    let ca_name = format!("ca-{}", org.slug());

    ComposeService {
        image: CA_IMAGE.to_string(),
        container_name: network.container_name(&ca_name),
        hostname: Some(format!("ca.{}", org.domain)),
        environment: vec![
            "FABRIC_CA_HOME=/etc/hyperledger/fabric-ca-server".to_string(),
            format!("FABRIC_CA_SERVER_CA_NAME={ca_name}"),
            format!("FABRIC_CA_SERVER_PORT={}", org.ca_port),
            "FABRIC_CA_SERVER_TLS_ENABLED=false".to_string(),
        ],
        command: Some("sh -c 'fabric-ca-server start -b admin:adminpw -d'".to_string()),
        ports: vec![format!("{}:{}", org.ca_port, org.ca_port)],
        volumes: vec![format!(
            "{}/peerOrganizations/{}/ca:/etc/hyperledger/fabric-ca-server-config",
            network.crypto_dir().display(),
            org.domain
        )],
        networks: vec![COMPOSE_NETWORK.to_string()],
        ..Default::default()
    }
}

fn couchdb_service(network: &Network, org: &Organization, peer: &Peer) -> ComposeService {
    let name = couchdb_service_name(org, peer);

    ComposeService {
        image: COUCHDB_IMAGE.to_string(),
        container_name: network.container_name(&name),
        hostname: Some(name),
        environment: vec![
            "COUCHDB_USER=admin".to_string(),
            "COUCHDB_PASSWORD=adminpw".to_string(),
        ],
        ports: vec![format!("{}:5984", peer.state_db_port)],
        networks: vec![COMPOSE_NETWORK.to_string()],
        ..Default::default()
    }
}

fn peer_service(network: &Network, org: &Organization, peer: &Peer) -> ComposeService {
    let fqdn = peer.fqdn(org);
    let chaincode_port = peer.port + 1;

    let mut environment = vec![
        "FABRIC_LOGGING_SPEC=INFO".to_string(),
        "CORE_VM_ENDPOINT=unix:///host/var/run/docker.sock".to_string(),
        format!("CORE_PEER_ID={fqdn}"),
        format!("CORE_PEER_ADDRESS={fqdn}:{}", peer.port),
        format!("CORE_PEER_LISTENADDRESS=0.0.0.0:{}", peer.port),
        format!("CORE_PEER_CHAINCODEADDRESS={fqdn}:{chaincode_port}"),
        format!("CORE_PEER_CHAINCODELISTENADDRESS=0.0.0.0:{chaincode_port}"),
        format!("CORE_PEER_GOSSIP_BOOTSTRAP={fqdn}:{}", peer.port),
        format!("CORE_PEER_GOSSIP_EXTERNALENDPOINT={fqdn}:{}", peer.port),
        format!("CORE_PEER_LOCALMSPID={}", org.msp_id),
        "CORE_PEER_MSPCONFIGPATH=/etc/hyperledger/fabric/msp".to_string(),
        "CORE_PEER_TLS_ENABLED=false".to_string(),
    ];

    let mut depends_on = Vec::new();
    if peer.state_db {
        let couch = couchdb_service_name(org, peer);
        environment.extend([
            "CORE_LEDGER_STATE_STATEDATABASE=CouchDB".to_string(),
            format!("CORE_LEDGER_STATE_COUCHDBCONFIG_COUCHDBADDRESS={couch}:5984"),
            "CORE_LEDGER_STATE_COUCHDBCONFIG_USERNAME=admin".to_string(),
            "CORE_LEDGER_STATE_COUCHDBCONFIG_PASSWORD=adminpw".to_string(),
        ]);
        depends_on.push(couch);
    }

    ComposeService {
        image: PEER_IMAGE.to_string(),
        container_name: network.container_name(&peer.service_name(org)),
        hostname: Some(fqdn),
        environment,
        ports: vec![format!("{}:{}", peer.port, peer.port)],
        volumes: vec![
            "/var/run/:/host/var/run/".to_string(),
            format!(
                "{}/peerOrganizations/{}/peers/{}/msp:/etc/hyperledger/fabric/msp",
                network.crypto_dir().display(),
                org.domain,
                peer.fqdn(org)
            ),
        ],
        networks: vec![COMPOSE_NETWORK.to_string()],
        depends_on,
        ..Default::default()
    }
}

fn cli_service(network: &Network) -> ComposeService {
    let depends_on = network
        .peers()
        .map(|(org, peer)| peer.service_name(org))
        .collect();

    ComposeService {
        image: crate::DEFAULT_TOOLS_IMAGE.to_string(),
        container_name: network.cli_container(),
        environment: vec![
            "GOPATH=/opt/gopath".to_string(),
            "CORE_VM_ENDPOINT=unix:///host/var/run/docker.sock".to_string(),
            "FABRIC_LOGGING_SPEC=INFO".to_string(),
            "CORE_PEER_ID=cli".to_string(),
            "CORE_PEER_TLS_ENABLED=false".to_string(),
        ],
        command: Some("/bin/bash".to_string()),
        working_dir: Some("/opt/gopath/src/github.com/hyperledger/fabric/peer".to_string()),
        volumes: vec![
            "/var/run/:/host/var/run/".to_string(),
            format!("{}:{}", network.crypto_dir().display(), CLI_CRYPTO_PATH),
            format!("{}:{}", network.artifacts_dir().display(), CLI_ARTIFACTS_PATH),
        ],
        networks: vec![COMPOSE_NETWORK.to_string()],
        depends_on,
        tty: true,
        stdin_open: true,
        ..Default::default()
    }
}
