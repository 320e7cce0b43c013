use serde::{Deserialize, Serialize};

/// Result of a bootstrap attempt.
///
/// On success `network_id` addresses the network in every later call and
/// `endpoints` lists each peer's host-visible address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitNetworkResponse {
    pub success: bool,
    pub message: String,
    pub network_id: String,
    pub endpoints: Vec<String>,
}

impl InitNetworkResponse {
    pub fn ok(network_id: impl Into<String>, endpoints: Vec<String>, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            network_id: network_id.into(),
            endpoints,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            network_id: String::new(),
            endpoints: Vec::new(),
        }
    }
}

/// Result of a chaincode deployment; `chaincode_id` is cosmetic bookkeeping
/// for the caller, addressing is always by name and channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeployChaincodeResponse {
    pub success: bool,
    pub message: String,
    pub chaincode_id: String,
}

impl DeployChaincodeResponse {
    pub fn ok(chaincode_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            chaincode_id: chaincode_id.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            chaincode_id: String::new(),
        }
    }
}

/// Result of a transaction invocation. `transaction_id` is the sentinel
/// "unknown" when the tool output carried no recognizable identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvokeResponse {
    pub success: bool,
    pub message: String,
    pub transaction_id: String,
    pub payload: Vec<u8>,
}

impl InvokeResponse {
    pub fn ok(transaction_id: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            success: true,
            message: "transaction committed".to_string(),
            transaction_id: transaction_id.into(),
            payload,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            transaction_id: String::new(),
            payload: Vec::new(),
        }
    }
}

/// Result of a read-only query; `payload` is the peer's response bytes
/// unmodified.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResponse {
    pub success: bool,
    pub message: String,
    pub payload: Vec<u8>,
}

impl QueryResponse {
    pub fn ok(payload: Vec<u8>) -> Self {
        Self {
            success: true,
            message: "query completed".to_string(),
            payload,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            payload: Vec::new(),
        }
    }
}

/// Live status of one peer container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeerStatusInfo {
    pub name: String,
    pub org: String,
    pub status: String,
    pub endpoint: String,
}

/// Live status of one orderer container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrdererStatusInfo {
    pub name: String,
    pub status: String,
    pub endpoint: String,
}

/// Aggregate network status. `running` is false both for a stopped network
/// and for one that was never started; `status` says which.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkStatusResponse {
    pub running: bool,
    pub status: String,
    pub peers: Vec<PeerStatusInfo>,
    pub orderers: Vec<OrdererStatusInfo>,
}

impl NetworkStatusResponse {
    pub fn not_found(network_id: &str) -> Self {
        Self {
            running: false,
            status: format!("network {network_id} not found"),
            peers: Vec::new(),
            orderers: Vec::new(),
        }
    }
}

/// One line of container output forwarded over the log stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    /// Milliseconds since the Unix epoch at forwarding time.
    pub timestamp_ms: u64,
    pub container: String,
    pub message: String,
}

/// Result of a stop request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StopNetworkResponse {
    pub success: bool,
    pub message: String,
}

impl StopNetworkResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
