use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_version() -> String {
    "1.0".to_string()
}

fn default_language() -> String {
    "golang".to_string()
}

/// Bootstrap a new network.
///
/// Empty `name`/`channel_name` and a zero `org_count` take the planner's
/// defaults. `custom_config` is accepted as an opaque value and carried
/// through unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitNetworkRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub org_count: u32,
    #[serde(default)]
    pub channel_name: String,
    #[serde(default)]
    pub custom_config: Option<serde_json::Value>,
}

/// Deploy chaincode onto an existing network.
///
/// `version` defaults to "1.0" and `language` to "golang". An empty
/// `endorsement_orgs` list means every organization endorses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployChaincodeRequest {
    pub network_id: String,
    pub name: String,
    pub path: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub endorsement_orgs: Vec<String>,
}

/// Invoke a chaincode function as a transaction.
///
/// `transient` is an optional key→bytes map serialized alongside the
/// proposal without landing on the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeRequest {
    pub network_id: String,
    pub chaincode: String,
    pub function: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub transient: Option<HashMap<String, Vec<u8>>>,
}

/// Query chaincode state read-only against a single peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub network_id: String,
    pub chaincode: String,
    pub function: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Look up the live status of a network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRequest {
    pub network_id: String,
}

/// Follow container logs for a network, optionally scoped to one container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamLogsRequest {
    pub network_id: String,
    #[serde(default)]
    pub container: Option<String>,
}

/// Stop a network; `cleanup` also removes volumes and the network's
/// filesystem subtree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopNetworkRequest {
    pub network_id: String,
    #[serde(default)]
    pub cleanup: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deploy_request_defaults() {
        let req: DeployChaincodeRequest = serde_json::from_value(json!({
            "network_id": "ab12cd34",
            "name": "basic",
            "path": "/chaincode/basic",
        }))
        .unwrap();

        assert_eq!(req.version, "1.0");
        assert_eq!(req.language, "golang");
        assert!(req.endorsement_orgs.is_empty());
    }

    #[test]
    fn test_init_request_accepts_opaque_custom_config() {
        let req: InitNetworkRequest = serde_json::from_value(json!({
            "name": "t",
            "org_count": 2,
            "channel_name": "ch",
            "custom_config": {"batch_timeout": "2s"},
        }))
        .unwrap();

        assert_eq!(req.org_count, 2);
        assert_eq!(req.custom_config, Some(json!({"batch_timeout": "2s"})));
    }

    #[test]
    fn test_stop_request_cleanup_defaults_to_false() {
        let req: StopNetworkRequest =
            serde_json::from_value(json!({"network_id": "ab12cd34"})).unwrap();
        assert!(!req.cleanup);
    }
}
