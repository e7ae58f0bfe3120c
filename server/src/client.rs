//! JSON-RPC client for a running node

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method, Request, header};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::cli::Cli;
use crate::prelude::*;
use peerlink_api::dispatch::{self, RPC_PATH_V0};
use peerlink_repo_adapter_fs::FsRepo;
use peerlink_types::repo_adapter::Repo;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Address of a node API and the token to present to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiInfo {
	pub addr: SocketAddr,
	pub token: Option<String>,
}

impl ApiInfo {
	/// Parse `token:host:port`, or a bare `host:port` for tokenless access
	pub fn parse(s: &str) -> PlResult<Self> {
		if let Ok(addr) = s.parse() {
			return Ok(Self { addr, token: None });
		}
		let (token, addr) =
			s.split_once(':').ok_or_else(|| Error::Parse(format!("invalid api info: {}", s)))?;
		let addr = addr.parse().map_err(|_| Error::Parse(format!("invalid api address: {}", addr)))?;
		Ok(Self { addr, token: (!token.is_empty()).then(|| token.to_string()) })
	}

	/// The endpoint and token a running node recorded in its repo
	pub fn from_repo(repo: &FsRepo) -> PlResult<Self> {
		let endpoint = match repo.api_endpoint() {
			Ok(endpoint) => endpoint,
			Err(Error::NotFound) => {
				return Err(Error::Network(format!(
					"no api endpoint in {}, is the node running?",
					repo.path().display()
				)));
			}
			Err(err) => return Err(err),
		};
		let addr = endpoint
			.trim()
			.parse()
			.map_err(|_| Error::Parse(format!("invalid api endpoint in repo: {}", endpoint)))?;
		let token = match repo.api_token() {
			Ok(token) => Some(token.trim().to_string()),
			Err(Error::NotFound) => None,
			Err(err) => return Err(err),
		};
		Ok(Self { addr, token })
	}

	/// Flag or environment first, then the repo
	pub fn resolve(cli: &Cli) -> PlResult<Self> {
		match &cli.api_info {
			Some(info) => Self::parse(info),
			None => Self::from_repo(&FsRepo::new(cli.repo_path()?)),
		}
	}
}

pub struct RpcClient {
	client: Client<HttpConnector, Full<Bytes>>,
	url: String,
	token: Option<String>,
	next_id: AtomicU64,
}

impl RpcClient {
	pub fn new(info: ApiInfo) -> Self {
		Self {
			client: Client::builder(TokioExecutor::new()).build_http(),
			url: format!("http://{}{}", info.addr, RPC_PATH_V0),
			token: info.token,
			next_id: AtomicU64::new(1),
		}
	}

	pub fn connect(cli: &Cli) -> PlResult<Self> {
		Ok(Self::new(ApiInfo::resolve(cli)?))
	}

	/// Call `method` and decode its result
	pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> PlResult<T> {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let body = serde_json::to_vec(&dispatch::Request::new(id, method, params))?;

		let mut req = Request::builder()
			.method(Method::POST)
			.uri(&self.url)
			.header(header::CONTENT_TYPE, "application/json");
		if let Some(token) = &self.token {
			req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
		}
		let req = req
			.body(Full::new(Bytes::from(body)))
			.map_err(|err| Error::Internal(format!("cannot build request: {}", err)))?;

		let res = tokio::time::timeout(REQUEST_TIMEOUT, self.client.request(req))
			.await
			.map_err(|_| Error::Network(format!("{} timed out", method)))?
			.map_err(|err| Error::Network(format!("cannot reach {}: {}", self.url, err)))?;
		let status = res.status();
		let bytes = res
			.into_body()
			.collect()
			.await
			.map_err(|err| Error::Network(format!("cannot read response: {}", err)))?
			.to_bytes();
		debug!(method, %status, len = bytes.len(), "rpc response");

		let res: dispatch::Response = serde_json::from_slice(&bytes)
			.map_err(|err| Error::Network(format!("unexpected response ({}): {}", status, err)))?;
		Ok(serde_json::from_value(res.into_result()?)?)
	}
}


// vim: ts=4
