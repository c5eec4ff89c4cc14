// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON-RPC 2.0 envelopes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorCode, XoError};

#[derive(Debug, Serialize)]
pub(crate) struct Request<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: &'a Value,
}

impl<'a> Request<'a> {
    pub fn new(id: u64, method: &'a str, params: &'a Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// Error member of a response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RpcErrorBody {
    pub code: ErrorCode,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl From<RpcErrorBody> for XoError {
    fn from(e: RpcErrorBody) -> Self {
        XoError::Rpc {
            code: e.code,
            message: e.message,
            data: e.data,
        }
    }
}

/// Any inbound frame: a response (has an `id`) or a server notification.
#[derive(Debug, Deserialize)]
pub(crate) struct Inbound {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcErrorBody>,
}

/// A server-initiated message without a matching call.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub method: String,
    pub params: Value,
}

pub(crate) enum Frame {
    Response {
        id: u64,
        outcome: Result<Value, RpcErrorBody>,
    },
    Notification(Notification),
    Ignored,
}

impl Inbound {
    pub fn classify(self) -> Frame {
        let id = self.id.as_ref().and_then(|v| match v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        });
        match (id, self.method) {
            (Some(id), None) => Frame::Response {
                id,
                outcome: match self.error {
                    Some(e) => Err(e),
                    None => Ok(self.result.unwrap_or(Value::Null)),
                },
            },
            (_, Some(method)) => Frame::Notification(Notification {
                method,
                params: self.params.unwrap_or(Value::Null),
            }),
            (None, None) => Frame::Ignored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_envelope() {
        let params = json!({"token": "t"});
        let req = Request::new(7, "session.signIn", &params);
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"jsonrpc": "2.0", "id": 7, "method": "session.signIn", "params": {"token": "t"}})
        );
    }

    #[test]
    fn test_classify_result() {
        let inbound: Inbound =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 3, "result": true})).unwrap();
        match inbound.classify() {
            Frame::Response { id, outcome } => {
                assert_eq!(id, 3);
                assert_eq!(outcome.unwrap(), json!(true));
            }
            _ => panic!("expected response"),
        }
    }

    #[test]
    fn test_classify_null_result_is_response() {
        let inbound: Inbound =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":4,"result":null}"#).unwrap();
        match inbound.classify() {
            Frame::Response { id, outcome } => {
                assert_eq!(id, 4);
                assert_eq!(outcome.unwrap(), Value::Null);
            }
            _ => panic!("expected response"),
        }
    }

    #[test]
    fn test_classify_error_keeps_code_shape() {
        let inbound: Inbound = serde_json::from_value(json!({
            "jsonrpc": "2.0", "id": 9,
            "error": {"code": "NO_SUCH_OBJECT", "message": "no such object", "data": {"id": "x"}}
        }))
        .unwrap();
        match inbound.classify() {
            Frame::Response { outcome: Err(e), .. } => {
                assert_eq!(e.code, ErrorCode::Text("NO_SUCH_OBJECT".into()));
                assert_eq!(e.data, Some(json!({"id": "x"})));
            }
            _ => panic!("expected error response"),
        }
    }

    #[test]
    fn test_classify_notification() {
        let inbound: Inbound = serde_json::from_value(json!({
            "jsonrpc": "2.0", "method": "all", "params": {"type": "enter", "items": {}}
        }))
        .unwrap();
        match inbound.classify() {
            Frame::Notification(n) => assert_eq!(n.method, "all"),
            _ => panic!("expected notification"),
        }
    }
}
