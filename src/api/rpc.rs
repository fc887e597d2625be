//! JSON-RPC 2.0 envelope used by the checkout endpoints.
//!
//! Two failure layers exist: a top-level `error` object means the call
//! itself blew up on the server; a `result` shaped like
//! `{"error": true, "message": ...}` is an application answer.

use crate::{Result, SelectorError};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct RpcRequest<'a, P: Serialize> {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: &'a P,
    pub id: u64,
}

impl<'a, P: Serialize> RpcRequest<'a, P> {
    pub fn call(params: &'a P, id: u64) -> Self {
        Self {
            jsonrpc: "2.0",
            method: "call",
            params,
            id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcFault>,
}

#[derive(Debug, Deserialize)]
pub struct RpcFault {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<RpcFaultData>,
}

#[derive(Debug, Deserialize)]
pub struct RpcFaultData {
    #[serde(default)]
    pub message: Option<String>,
}

/// `{"error": true, "message": "...", "code": "..."}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErrorPayload {
    pub error: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Payload<T> {
    Failure(ErrorPayload),
    Success(T),
}

impl RpcResponse {
    /// Unwraps the envelope. Transport faults become [`SelectorError::Rpc`];
    /// application error payloads become [`SelectorError::Search`].
    pub fn into_payload<T: DeserializeOwned>(self) -> Result<T> {
        if let Some(fault) = self.error {
            let message = fault
                .data
                .and_then(|d| d.message)
                .filter(|m| !m.is_empty())
                .unwrap_or(fault.message);
            return Err(SelectorError::Rpc {
                code: fault.code,
                message,
            });
        }

        let value = self.result.unwrap_or(Value::Null);
        match serde_json::from_value::<Payload<T>>(value.clone()) {
            Ok(Payload::Failure(payload)) if payload.error => {
                Err(SelectorError::Search(payload.message))
            }
            Ok(Payload::Failure(_)) => Ok(serde_json::from_value(value)?),
            Ok(Payload::Success(payload)) => Ok(payload),
            // Surface the real decoding error for the expected type.
            Err(_) => Ok(serde_json::from_value(value)?),
        }
    }
}
