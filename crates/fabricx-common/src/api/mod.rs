//! Service API Types
//!
//! Request and response types for the FabricX service façade, plus the
//! JSON-RPC 2.0 envelope used by the HTTP transport.
//!
//! # Soft-failure contract
//!
//! Business-level failures (network not found, tool failure, timeout) are
//! returned as a structured response carrying a `success` flag and message;
//! they never abort the transport. Only the call's own cancellation
//! propagates as a transport-level condition.

pub mod jsonrpc;
pub mod requests;
pub mod responses;

pub use jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use requests::{
    DeployChaincodeRequest, InitNetworkRequest, InvokeRequest, QueryRequest, StatusRequest,
    StopNetworkRequest, StreamLogsRequest,
};
pub use responses::{
    DeployChaincodeResponse, InitNetworkResponse, InvokeResponse, LogEntry, NetworkStatusResponse,
    OrdererStatusInfo, PeerStatusInfo, QueryResponse, StopNetworkResponse,
};
