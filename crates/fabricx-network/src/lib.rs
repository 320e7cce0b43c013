//! FabricX Network Synthesis
//!
//! This crate turns a requested network size into everything a container
//! runtime needs to host it: the topology (organizations, peers, orderer,
//! port assignments), the cryptographic-material and channel configuration
//! documents, and the multi-service compose manifest.
//!
//! # Pipeline
//!
//! ```text
//! PlanRequest -> plan_network -> Network
//!                                  |-> cryptogen  (crypto-config.yaml + toolchain run)
//!                                  |-> configtx   (configtx.yaml + genesis/channel tx)
//!                                  `-> compose    (compose manifest, pure)
//! ```
//!
//! The planner and compose synthesizer are pure; the two generators shell
//! out once each to the Fabric toolchain container through the injected
//! [`Executor`](fabricx_common::Executor) and are cancellable.

pub mod compose;
pub mod configtx;
pub mod cryptogen;
pub mod model;
pub mod planner;

pub use model::{Channel, Network, Orderer, Organization, Peer};
pub use planner::{plan_network, PlanRequest};

/// Fabric toolchain image used for one-shot cryptogen/configtxgen runs.
/// Overridable through the service configuration.
pub const DEFAULT_TOOLS_IMAGE: &str = "hyperledger/fabric-tools:2.5";

/// Images for the long-running services in the compose manifest.
pub const ORDERER_IMAGE: &str = "hyperledger/fabric-orderer:2.5";
pub const PEER_IMAGE: &str = "hyperledger/fabric-peer:2.5";
pub const CA_IMAGE: &str = "hyperledger/fabric-ca:1.5";
pub const COUCHDB_IMAGE: &str = "couchdb:3.3";
