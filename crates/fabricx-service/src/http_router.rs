//! JSON-RPC method dispatch.
//!
//! Routes each method to its service operation. Soft failures ride inside
//! the JSON-RPC `result` member (the response types carry their own
//! `success` flag); the `error` member is used only for transport-level
//! conditions: unknown methods, malformed params, cancellation and
//! internal failures.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use fabricx_common::api::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use fabricx_common::error::FabricxError;

use crate::service::FabricxService;

/// Router over the service façade. Each inbound request runs with a child
/// of the router's root cancellation token, so cancelling the root drains
/// every in-flight call.
pub struct ServiceRouter {
    service: Arc<FabricxService>,
    root: CancellationToken,
}

enum RouteError {
    UnknownMethod(String),
    Params(String),
    Service(FabricxError),
}

impl ServiceRouter {
    pub fn new(service: Arc<FabricxService>) -> Self {
        Self::with_cancellation(service, CancellationToken::new())
    }

    pub fn with_cancellation(service: Arc<FabricxService>, root: CancellationToken) -> Self {
        Self { service, root }
    }

    pub fn service(&self) -> &Arc<FabricxService> {
        &self.service
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.root
    }

    /// Handles one JSON-RPC request end to end.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();
        let cancel = self.root.child_token();

        match self.dispatch(&request.method, request.params, &cancel).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(RouteError::UnknownMethod(method)) => {
                JsonRpcResponse::error(id, JsonRpcError::method_not_found(&method))
            }
            Err(RouteError::Params(message)) => {
                JsonRpcResponse::error(id, JsonRpcError::invalid_params(&message))
            }
            Err(RouteError::Service(e)) if e.is_cancellation() => {
                JsonRpcResponse::error(id, JsonRpcError::cancelled())
            }
            Err(RouteError::Service(e)) => {
                JsonRpcResponse::error(id, JsonRpcError::internal_error(&e.to_string()))
            }
        }
    }

    async fn dispatch(
        &self,
        method: &str,
        params: Value,
        cancel: &CancellationToken,
    ) -> Result<Value, RouteError> {
        match method {
            "init_network" => {
                let request = parse(params)?;
                let response = self
                    .service
                    .init_network(request, cancel)
                    .await
                    .map_err(RouteError::Service)?;
                encode(response)
            }
            "deploy_chaincode" => {
                let request = parse(params)?;
                let response = self
                    .service
                    .deploy_chaincode(request, cancel)
                    .await
                    .map_err(RouteError::Service)?;
                encode(response)
            }
            "invoke_transaction" => {
                let request = parse(params)?;
                let response = self
                    .service
                    .invoke_transaction(request, cancel)
                    .await
                    .map_err(RouteError::Service)?;
                encode(response)
            }
            "query_ledger" => {
                let request = parse(params)?;
                let response = self
                    .service
                    .query_ledger(request, cancel)
                    .await
                    .map_err(RouteError::Service)?;
                encode(response)
            }
            "get_network_status" => {
                let request = parse(params)?;
                let response = self
                    .service
                    .get_network_status(request, cancel)
                    .await
                    .map_err(RouteError::Service)?;
                encode(response)
            }
            "stop_network" => {
                let request = parse(params)?;
                let response = self
                    .service
                    .stop_network(request, cancel)
                    .await
                    .map_err(RouteError::Service)?;
                encode(response)
            }
            "shutdown" => {
                self.service.shutdown().await;
                Ok(serde_json::json!({
                    "success": true,
                    "message": "all networks stopped",
                }))
            }
            other => Err(RouteError::UnknownMethod(other.to_string())),
        }
    }
}

fn parse<T: DeserializeOwned>(params: Value) -> Result<T, RouteError> {
    serde_json::from_value(params).map_err(|e| RouteError::Params(e.to_string()))
}

fn encode<T: serde::Serialize>(response: T) -> Result<Value, RouteError> {
    serde_json::to_value(response).map_err(|e| RouteError::Service(FabricxError::Json(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NetworkRegistry;
    use crate::service::ServiceConfig;
    use fabricx_common::exec::ScriptedExecutor;
    use serde_json::json;
    use std::time::Duration;

    fn router() -> ServiceRouter {
        let registry = Arc::new(NetworkRegistry::new());
        let config = ServiceConfig {
            base_dir: std::env::temp_dir().join("fabricx-router-tests"),
            readiness_deadline: Duration::from_millis(200),
            readiness_interval: Duration::from_millis(10),
            join_wait: Duration::from_millis(1),
            ..Default::default()
        };
        let service = Arc::new(FabricxService::with_config(
            Arc::new(ScriptedExecutor::new()),
            registry,
            config,
        ));
        ServiceRouter::new(service)
    }

    fn request(method: &str, params: Value) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params,
            id: json!(1),
        }
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let router = router();
        let response = router.handle_request(request("destroy_everything", json!({}))).await;

        let error = response.error.unwrap();
        assert_eq!(error.code, fabricx_common::api::jsonrpc::METHOD_NOT_FOUND);
        assert!(error.message.contains("destroy_everything"));
    }

    #[tokio::test]
    async fn test_invalid_params() {
        let router = router();
        let response = router
            .handle_request(request("deploy_chaincode", json!({"name": 42})))
            .await;

        let error = response.error.unwrap();
        assert_eq!(error.code, fabricx_common::api::jsonrpc::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_stop_unknown_network_is_soft_failure() {
        let router = router();
        let response = router
            .handle_request(request(
                "stop_network",
                json!({"network_id": "zzz99999", "cleanup": true}),
            ))
            .await;

        // Not a transport error: the envelope succeeds, the result does not.
        assert!(response.error.is_none());
        let result = response.result.unwrap();
        assert_eq!(result["success"], json!(false));
        assert!(result["message"].as_str().unwrap().contains("zzz99999"));
    }

    #[tokio::test]
    async fn test_cancelled_root_token_is_transport_level() {
        let registry = Arc::new(NetworkRegistry::new());
        let service = Arc::new(FabricxService::new(
            Arc::new(ScriptedExecutor::new()),
            registry,
        ));
        let root = CancellationToken::new();
        root.cancel();
        let router = ServiceRouter::with_cancellation(service, root);

        let response = router
            .handle_request(request("get_network_status", json!({"network_id": "x"})))
            .await;

        let error = response.error.unwrap();
        assert_eq!(error.code, fabricx_common::api::jsonrpc::CANCELLED);
    }

    #[tokio::test]
    async fn test_shutdown_method() {
        let router = router();
        let response = router.handle_request(request("shutdown", json!(null))).await;

        assert!(response.error.is_none());
        assert_eq!(response.result.unwrap()["success"], json!(true));
    }
}
