//! Error type shared by every Peerlink crate.

use axum::{Json, http::StatusCode, response::IntoResponse};
use std::fmt;

pub type PlResult<T> = std::result::Result<T, Error>;

/// A stop hook or background task that failed during teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopFailure {
	pub component: Box<str>,
	pub message: String,
}

impl fmt::Display for StopFailure {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}: {}", self.component, self.message)
	}
}

#[derive(Debug)]
pub enum Error {
	// Node construction
	OptionOrder(&'static str),
	UnresolvedDependency { key: String, required_by: String },
	UndeclaredDependency { key: String, requested_by: String },
	DependencyCycle(Vec<String>),
	TypeMismatch(String),
	ConfigError(String),

	// Capabilities
	NotSupported,
	MethodNotFound(String),
	InvalidParams(String),
	Unauthorized,

	// Lifecycle
	Start { component: String, source: Box<Error> },
	Shutdown(Vec<StopFailure>),
	Cancelled,

	// Repository
	RepoNotInitialized,
	RepoExists,
	RepoLocked,
	NotFound,

	Network(String),
	Rpc { code: i64, message: String },
	Internal(String),
	Parse(String),

	// externals
	Io(std::io::Error),
}

impl Error {
	/// Stable string tag, used on the wire and in logs.
	pub fn kind(&self) -> &'static str {
		match self {
			Error::OptionOrder(_) => "option-order",
			Error::UnresolvedDependency { .. } => "unresolved-dependency",
			Error::UndeclaredDependency { .. } => "undeclared-dependency",
			Error::DependencyCycle(_) => "dependency-cycle",
			Error::TypeMismatch(_) => "type-mismatch",
			Error::ConfigError(_) => "config",
			Error::NotSupported => "not-supported",
			Error::MethodNotFound(_) => "method-not-found",
			Error::InvalidParams(_) => "invalid-params",
			Error::Unauthorized => "unauthorized",
			Error::Start { .. } => "start",
			Error::Shutdown(_) => "shutdown",
			Error::Cancelled => "cancelled",
			Error::RepoNotInitialized => "repo-not-initialized",
			Error::RepoExists => "repo-exists",
			Error::RepoLocked => "repo-locked",
			Error::NotFound => "not-found",
			Error::Network(_) => "network",
			Error::Rpc { .. } => "rpc",
			Error::Internal(_) => "internal",
			Error::Parse(_) => "parse",
			Error::Io(_) => "io",
		}
	}
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Error::OptionOrder(msg) => write!(f, "option order: {}", msg),
			Error::UnresolvedDependency { key, required_by } => {
				write!(f, "unresolved dependency {} (required by {})", key, required_by)
			}
			Error::UndeclaredDependency { key, requested_by } => {
				write!(f, "{} requested undeclared dependency {}", requested_by, key)
			}
			Error::DependencyCycle(path) => write!(f, "dependency cycle: {}", path.join(" -> ")),
			Error::TypeMismatch(key) => write!(f, "value registered for {} has an unexpected type", key),
			Error::ConfigError(msg) => write!(f, "config error: {}", msg),
			Error::NotSupported => write!(f, "method not supported"),
			Error::MethodNotFound(name) => write!(f, "method not found: {}", name),
			Error::InvalidParams(msg) => write!(f, "invalid params: {}", msg),
			Error::Unauthorized => write!(f, "missing permission to invoke method"),
			Error::Start { component, source } => {
				write!(f, "starting {} failed: {}", component, source)
			}
			Error::Shutdown(failures) => {
				write!(f, "shutdown finished with {} failure(s)", failures.len())?;
				for failure in failures {
					write!(f, "; {}", failure)?;
				}
				Ok(())
			}
			Error::Cancelled => write!(f, "call cancelled"),
			Error::RepoNotInitialized => write!(f, "repo is not initialized"),
			Error::RepoExists => write!(f, "repo already exists"),
			Error::RepoLocked => write!(f, "repo is locked by another process"),
			Error::NotFound => write!(f, "not found"),
			Error::Network(msg) => write!(f, "network error: {}", msg),
			Error::Rpc { code, message } => write!(f, "rpc error {}: {}", code, message),
			Error::Internal(msg) => write!(f, "internal error: {}", msg),
			Error::Parse(msg) => write!(f, "parse error: {}", msg),
			Error::Io(err) => write!(f, "io error: {}", err),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Error::Start { source, .. } => Some(source.as_ref()),
			Error::Io(err) => Some(err),
			_ => None,
		}
	}
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Self::Io(err)
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Self::Parse(err.to_string())
	}
}

impl From<toml::de::Error> for Error {
	fn from(err: toml::de::Error) -> Self {
		Self::ConfigError(err.to_string())
	}
}

impl From<toml::ser::Error> for Error {
	fn from(err: toml::ser::Error) -> Self {
		Self::Internal(format!("config serialization: {}", err))
	}
}

impl From<tokio::task::JoinError> for Error {
	fn from(err: tokio::task::JoinError) -> Self {
		Self::Internal(format!("task failed: {}", err))
	}
}

impl IntoResponse for Error {
	fn into_response(self) -> axum::response::Response {
		let status = match self {
			Error::Unauthorized => StatusCode::UNAUTHORIZED,
			Error::NotFound | Error::MethodNotFound(_) => StatusCode::NOT_FOUND,
			Error::InvalidParams(_) | Error::Parse(_) => StatusCode::BAD_REQUEST,
			_ => StatusCode::INTERNAL_SERVER_ERROR,
		};
		let body = serde_json::json!({ "error": { "kind": self.kind(), "message": self.to_string() } });
		(status, Json(body)).into_response()
	}
}


// vim: ts=4
