//! FabricX Runtime
//!
//! Drives a bootstrapped network through its life: starting and stopping
//! the container group, getting the channel ready, deploying chaincode and
//! submitting transactions. Every external effect goes through the
//! [`Executor`](fabricx_common::Executor) seam, so the whole crate is
//! testable against a scripted fake.
//!
//! # Components
//!
//! - [`lifecycle`] - container-group start/stop/status/logs/exec
//! - [`channel`] - create channel, join peers, update anchor peers
//! - [`deploy`] - the package → install → approve → commit → init pipeline
//! - [`gateway`] - invoke/query against deployed chaincode

pub mod channel;
pub mod deploy;
pub mod gateway;
pub mod lifecycle;

pub use channel::ChannelOrchestrator;
pub use deploy::DeploymentPipeline;
pub use gateway::TransactionGateway;
pub use lifecycle::{GroupStatus, LifecycleManager, RuntimeState};
