//! JSON-RPC transport for Ethereum endpoints.

use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

/// Default timeout for a single RPC request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client(timeout: Duration) -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to create HTTP client")
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    /// `null` and a missing field both land here as `Value::Null`.
    #[serde(default)]
    result: Value,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// Call `method` on the endpoint at `url` and deserialize its result.
///
/// An error object in the response fails the call with the node's message
/// (revert reason, unknown account...).
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> Result<T, anyhow::Error> {
    let request = RpcRequest {
        jsonrpc: "2.0",
        id: 1,
        method,
        params,
    };

    let response: RpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .with_context(|| format!("Failed to send {} request", method))?
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response", method))?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error on {} ({}): {}", method, error.code, error.message);
    }

    serde_json::from_value(response.result)
        .with_context(|| format!("Failed to deserialize {} result", method))
}

/// Deserialize a u64 from a hex quantity (with 0x prefix).
pub fn deserialize_u64_from_hex<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    u64::from_str_radix(s.trim_start_matches("0x"), 16).map_err(serde::de::Error::custom)
}

/// Deserialize an optional u64 hex quantity; `null` and a missing field are `None`.
pub fn deserialize_opt_u64_from_hex<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Deserialize::deserialize(deserializer)?;
    s.map(|s| u64::from_str_radix(s.trim_start_matches("0x"), 16))
        .transpose()
        .map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Quantities {
        #[serde(deserialize_with = "deserialize_u64_from_hex")]
        number: u64,
        #[serde(default, deserialize_with = "deserialize_opt_u64_from_hex")]
        status: Option<u64>,
    }

    #[test]
    fn test_deserialize_hex_quantities() {
        let q: Quantities =
            serde_json::from_str(r#"{"number": "0x1b4", "status": "0x1"}"#).unwrap();
        assert_eq!(q.number, 436);
        assert_eq!(q.status, Some(1));
    }

    #[test]
    fn test_deserialize_missing_optional_quantity() {
        let q: Quantities = serde_json::from_str(r#"{"number": "0x0"}"#).unwrap();
        assert_eq!(q.number, 0);
        assert_eq!(q.status, None);

        let q: Quantities = serde_json::from_str(r#"{"number": "0x0", "status": null}"#).unwrap();
        assert_eq!(q.status, None);
    }

    #[test]
    fn test_response_envelope() {
        let response: RpcResponse =
            serde_json::from_str(r#"{"jsonrpc": "2.0", "id": 1, "result": null}"#).unwrap();
        assert!(response.error.is_none());
        assert_eq!(response.result, Value::Null);

        let response: RpcResponse = serde_json::from_value(serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32000, "message": "nonce too low", "data": "0x" }
        }))
        .unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.code, -32000);
        assert_eq!(error.message, "nonce too low");
    }

    #[test]
    fn test_request_envelope() {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "eth_chainId",
            params: vec![],
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"jsonrpc": "2.0", "id": 1, "method": "eth_chainId", "params": []})
        );
    }

    #[test]
    fn test_deserialize_invalid_quantity() {
        let result: Result<Quantities, _> = serde_json::from_str(r#"{"number": "0xzz"}"#);
        assert!(result.is_err());
    }
}
