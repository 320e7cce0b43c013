//! FabricX Service
//!
//! The concurrency-safe façade over the runtime: a registry of active
//! networks plus one operation per lifecycle action, exposed over
//! HTTP/JSON-RPC with a server-streaming log endpoint.
//!
//! # Concurrency model
//!
//! One task per inbound call. The registry map is the only shared mutable
//! structure and its lock is held only for the map access itself, never
//! across a long-running external call. Every operation takes a
//! cancellation token and returns immediately, without side effects, when
//! the token is already signaled.
//!
//! # Soft failures
//!
//! Business-level failures (network not found, tool failure, timeout) come
//! back as structured responses with `success: false`; only the call's own
//! cancellation aborts the transport.

pub mod http_router;
pub mod http_server;
pub mod registry;
pub mod service;

pub use http_router::ServiceRouter;
pub use http_server::HttpServer;
pub use registry::NetworkRegistry;
pub use service::{FabricxService, ServiceConfig};
