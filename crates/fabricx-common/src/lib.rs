//! FabricX Common Types and Execution
//!
//! This crate provides the shared building blocks for the FabricX runtime:
//! the service protocol types, the error taxonomy, and the process execution
//! abstraction used to drive the container runtime.
//!
//! # Overview
//!
//! FabricX is a local orchestration engine for multi-organization ledger
//! networks built from containerized processes. Every component talks to the
//! outside world through two seams defined here:
//!
//! - **API Layer**: Request/response types for the service façade, with the
//!   soft-failure contract (a `success` flag plus message) and the JSON-RPC
//!   2.0 envelope used by the HTTP transport.
//! - **Execution Layer**: An injectable [`Executor`] capability ("run a
//!   command and capture combined output" / "run a command and stream
//!   output") so deterministic tests can substitute a scripted fake without
//!   invoking a real container runtime.
//!
//! # Components
//!
//! - [`api`] - Service request/response types and the JSON-RPC envelope
//! - [`error`] - [`FabricxError`] and the crate-wide [`Result`] alias
//! - [`exec`] - The [`Executor`] trait, the system implementation, and the
//!   scripted test double

pub mod api;
pub mod error;
pub mod exec;

pub use error::{FabricxError, Result};
pub use exec::{CommandOutput, CommandSpec, CommandStream, Executor, ScriptedExecutor, SystemExecutor};
