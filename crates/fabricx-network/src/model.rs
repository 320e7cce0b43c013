use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A bootstrapped ledger network.
///
/// Owned exclusively by the registry after creation. All generated material
/// lives under `base_dir`; destroying the network removes that subtree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    /// Short random identifier, unique for the process lifetime.
    pub id: String,
    pub name: String,
    /// Root of the network's filesystem subtree.
    pub base_dir: PathBuf,
    pub organizations: Vec<Organization>,
    pub orderers: Vec<Orderer>,
    pub channel: Channel,
}

/// An administrative participant owning peers and a membership identity.
/// Immutable after topology planning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub name: String,
    /// Membership-service-provider identifier, derived from the name.
    pub msp_id: String,
    pub domain: String,
    pub ca_port: u16,
    pub peers: Vec<Peer>,
}

/// A ledger-holding, transaction-endorsing service for one organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Peer {
    pub name: String,
    pub port: u16,
    /// Whether a CouchDB state database is attached.
    pub state_db: bool,
    pub state_db_port: u16,
}

/// The transaction-sequencing service. Exactly one in this design.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Orderer {
    pub name: String,
    pub port: u16,
    pub domain: String,
}

/// A logical ledger scope, fixed at bootstrap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    /// Configuration profile used when rendering channel artifacts.
    pub profile: String,
}

impl Network {
    /// Directory holding generated cryptographic material.
    pub fn crypto_dir(&self) -> PathBuf {
        self.base_dir.join("crypto-config")
    }

    /// Directory holding channel artifacts and the compose manifest.
    pub fn artifacts_dir(&self) -> PathBuf {
        self.base_dir.join("artifacts")
    }

    pub fn compose_path(&self) -> PathBuf {
        self.artifacts_dir().join("compose.yaml")
    }

    /// Compose project identifier, scoping container-group operations to
    /// this network.
    pub fn project(&self) -> String {
        format!("fabricx-{}", self.id)
    }

    /// Name of this network's shared administrative container.
    pub fn cli_container(&self) -> String {
        self.container_name("cli")
    }

    /// Container name for a service, prefixed so concurrent networks on one
    /// host never collide.
    pub fn container_name(&self, service: &str) -> String {
        format!("{}-{}", self.id, service)
    }

    /// Host-visible peer endpoints, in organization order.
    pub fn peer_endpoints(&self) -> Vec<String> {
        self.peers().map(|(_, peer)| peer.host_endpoint()).collect()
    }

    /// Every (organization, peer) pair, in organization order.
    pub fn peers(&self) -> impl Iterator<Item = (&Organization, &Peer)> {
        self.organizations
            .iter()
            .flat_map(|org| org.peers.iter().map(move |peer| (org, peer)))
    }

    /// The orderer all channel and transaction traffic is addressed to.
    pub fn orderer(&self) -> &Orderer {
        &self.orderers[0]
    }
}

impl Organization {
    /// Filesystem-safe lowercase form of the name, used in service names.
    pub fn slug(&self) -> String {
        self.name.to_lowercase()
    }

    /// In-container path of this organization's admin MSP, as mounted into
    /// the shared cli service.
    pub fn admin_msp_path(&self) -> String {
        format!(
            "/etc/hyperledger/crypto/peerOrganizations/{}/users/Admin@{}/msp",
            self.domain, self.domain
        )
    }
}

impl Peer {
    /// Address reachable from the host.
    pub fn host_endpoint(&self) -> String {
        format!("localhost:{}", self.port)
    }

    /// Fully-qualified in-network hostname.
    pub fn fqdn(&self, org: &Organization) -> String {
        format!("{}.{}", self.name, org.domain)
    }

    /// Address reachable from inside the container network.
    pub fn network_address(&self, org: &Organization) -> String {
        format!("{}:{}", self.fqdn(org), self.port)
    }

    /// Compose service name within the network's manifest.
    pub fn service_name(&self, org: &Organization) -> String {
        format!("{}-{}", self.name, org.slug())
    }
}

impl Orderer {
    pub fn fqdn(&self) -> String {
        format!("{}.{}", self.name, self.domain)
    }

    pub fn network_address(&self) -> String {
        format!("{}:{}", self.fqdn(), self.port)
    }

    pub fn host_endpoint(&self) -> String {
        format!("localhost:{}", self.port)
    }
}

/// Generates a short random network identifier (8 lowercase alphanumerics).
pub fn generate_network_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .map(char::from)
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .take(8)
        .collect()
}
