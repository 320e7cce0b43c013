use std::path::PathBuf;

use crate::model::{Channel, Network, Orderer, Organization, Peer};

/// Requested network shape. Zero/empty fields take defaults.
#[derive(Debug, Clone, Default)]
pub struct PlanRequest {
    pub name: String,
    pub org_count: u32,
    pub channel_name: String,
}

pub const DEFAULT_ORG_COUNT: u32 = 2;
pub const DEFAULT_NETWORK_NAME: &str = "fabricx";
pub const DEFAULT_CHANNEL_NAME: &str = "mychannel";
pub const CHANNEL_PROFILE: &str = "FabricxChannel";

pub const ORDERER_PORT: u16 = 7050;
pub const PEER_BASE_PORT: u16 = 7051;
pub const CA_BASE_PORT: u16 = 7054;
pub const COUCHDB_BASE_PORT: u16 = 5984;

/// Per-organization port stride. Keeps every organization's peer, CA and
/// state-database ports in a disjoint band.
pub const ORG_PORT_STRIDE: u16 = 1000;

/// Upper bound on organizations so the port bands stay inside u16 range.
pub const MAX_ORG_COUNT: u32 = 50;

/// Computes the full topology for a requested size: one peer per
/// organization (state-database backed), a single orderer, and
/// non-overlapping port assignments.
///
/// Deterministic given the request; the only randomness in a network is the
/// identifier, which the caller allocates. Pure computation, no failure
/// modes: out-of-range counts are clamped into `1..=MAX_ORG_COUNT`.
pub fn plan_network(request: PlanRequest, base_dir: PathBuf, id: String) -> Network {
    let org_count = if request.org_count == 0 {
        DEFAULT_ORG_COUNT
    } else {
        request.org_count.min(MAX_ORG_COUNT)
    };
    let name = if request.name.is_empty() {
        DEFAULT_NETWORK_NAME.to_string()
    } else {
        request.name
    };
    let channel_name = if request.channel_name.is_empty() {
        DEFAULT_CHANNEL_NAME.to_string()
    } else {
        request.channel_name
    };

    let organizations = (0..org_count).map(plan_organization).collect();

    Network {
        id,
        name,
        base_dir,
        organizations,
        orderers: vec![Orderer {
            name: "orderer".to_string(),
            port: ORDERER_PORT,
            domain: "example.com".to_string(),
        }],
        channel: Channel {
            name: channel_name,
            profile: CHANNEL_PROFILE.to_string(),
        },
    }
}

fn plan_organization(index: u32) -> Organization {
    let ordinal = index + 1;
    let stride = ORG_PORT_STRIDE * index as u16;

    Organization {
        name: format!("Org{ordinal}"),
        msp_id: format!("Org{ordinal}MSP"),
        domain: format!("org{ordinal}.example.com"),
        ca_port: CA_BASE_PORT + stride,
        peers: vec![Peer {
            name: "peer0".to_string(),
            port: PEER_BASE_PORT + stride,
            state_db: true,
            state_db_port: COUCHDB_BASE_PORT + stride,
        }],
    }
}
