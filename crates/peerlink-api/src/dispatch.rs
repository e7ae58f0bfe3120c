//! JSON-RPC dispatch tables and wire types.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::handler::{CallFuture, MethodDesc};
use peerlink_types::prelude::*;

/// Namespace prefixed to every method name on the wire (`Peerlink.NetPeers`)
pub const NAMESPACE: &str = "Peerlink";

/// Path of the versioned RPC endpoint
pub const RPC_PATH_V0: &str = "/rpc/v0";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
pub const UNAUTHORIZED: i64 = -32001;
pub const NOT_SUPPORTED: i64 = -32002;

/// A method table that can be served over JSON-RPC
pub trait RpcDispatch: Send + Sync {
	fn methods(&self) -> Vec<MethodDesc>;

	fn required_permission(&self, method: &str) -> Option<Permission> {
		self.methods().into_iter().find(|m| m.name == method).map(|m| m.perm)
	}

	/// Decode positional `params`, call the handler and encode its result
	fn call(&self, method: &str, ctx: CallCtx, params: Vec<Value>) -> CallFuture<Value>;
}

/// Decode the next positional argument. Missing arguments decode from `null`.
pub fn take_param<T: DeserializeOwned>(
	params: &mut std::vec::IntoIter<Value>,
	method: &str,
	name: &str,
) -> PlResult<T> {
	let value = params.next().unwrap_or(Value::Null);
	serde_json::from_value(value)
		.map_err(|e| Error::InvalidParams(format!("{}: argument {}: {}", method, name, e)))
}

pub fn qualified(method: &str) -> String {
	format!("{}.{}", NAMESPACE, method)
}

/// `Peerlink.NetPeers` -> `NetPeers`
pub fn strip_namespace(method: &str) -> Option<&str> {
	method.strip_prefix(NAMESPACE)?.strip_prefix('.')
}

fn jsonrpc_version() -> String {
	"2.0".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
	#[serde(default = "jsonrpc_version")]
	pub jsonrpc: String,
	#[serde(default)]
	pub id: Value,
	pub method: String,
	#[serde(default)]
	pub params: Vec<Value>,
}

impl Request {
	pub fn new(id: u64, method: &str, params: Vec<Value>) -> Self {
		Self { jsonrpc: jsonrpc_version(), id: Value::from(id), method: qualified(method), params }
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
	pub code: i64,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
}

impl From<&Error> for ErrorObject {
	fn from(err: &Error) -> Self {
		let code = match err {
			Error::Unauthorized => UNAUTHORIZED,
			Error::NotSupported => NOT_SUPPORTED,
			Error::MethodNotFound(_) => METHOD_NOT_FOUND,
			Error::InvalidParams(_) => INVALID_PARAMS,
			Error::Parse(_) => PARSE_ERROR,
			Error::Rpc { code, .. } => *code,
			_ => INTERNAL_ERROR,
		};
		Self { code, message: err.to_string(), data: Some(Value::from(err.kind())) }
	}
}

impl ErrorObject {
	/// Map a wire error back to the error the server returned
	pub fn into_error(self) -> Error {
		match self.code {
			UNAUTHORIZED => Error::Unauthorized,
			NOT_SUPPORTED => Error::NotSupported,
			METHOD_NOT_FOUND => Error::MethodNotFound(self.message),
			_ => Error::Rpc { code: self.code, message: self.message },
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
	#[serde(default = "jsonrpc_version")]
	pub jsonrpc: String,
	#[serde(default)]
	pub id: Value,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<ErrorObject>,
}

impl Response {
	pub fn result(id: Value, result: Value) -> Self {
		Self { jsonrpc: jsonrpc_version(), id, result: Some(result), error: None }
	}

	pub fn error(id: Value, err: &Error) -> Self {
		Self { jsonrpc: jsonrpc_version(), id, result: None, error: Some(err.into()) }
	}

	pub fn into_result(self) -> PlResult<Value> {
		match self.error {
			Some(err) => Err(err.into_error()),
			None => Ok(self.result.unwrap_or(Value::Null)),
		}
	}
}


// vim: ts=4
