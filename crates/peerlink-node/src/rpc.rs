//! JSON-RPC exposure of a capability table.
//!
//! Calls arrive as JSON-RPC 2.0 over HTTP POST. The caller is identified by
//! the permissions of its API token (bearer header or `token` query
//! parameter); a call without a token may read. The permission check runs
//! before dispatch, so a refused call never reaches the capability value.
//! Insufficient permission yields the same authorization error whether or not
//! the method is supported, and unknown methods are refused to everyone but
//! admins.
//!
//! Each call runs under a context whose cancellation token is a child of its
//! connection's token, itself a child of the server's. A call is cancelled
//! when its client disconnects, and calls outliving the stop grace period are
//! cancelled by [`RpcServer::stop`].

use async_trait::async_trait;
use axum::{Extension, Router};
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use serde::Deserialize;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use peerlink_api::dispatch::{self, RPC_PATH_V0, strip_namespace};
use peerlink_api::instrument::CallStats;
use peerlink_api::{Common, CommonProxy, FullNodeProxy, RpcDispatch};
use peerlink_types::permission::DEFAULT_PERMISSIONS;
use peerlink_types::prelude::*;

/// Default limit on the size of a request body
pub const DEFAULT_MAX_REQUEST_SIZE: usize = 100 << 20;

/// How long in-flight calls may run once the server is asked to stop
pub const STOP_GRACE: Duration = Duration::from_secs(5);

/// How long cancelled calls get to return before their connections are dropped
const CANCEL_GRACE: Duration = Duration::from_secs(1);

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Identity of an RPC caller
#[derive(Debug, Clone)]
pub struct Caller {
	pub perms: Arc<[Permission]>,
}

/// Decides whether `caller` may invoke a method requiring `required`
pub type PermissionCheck = Arc<dyn Fn(&Caller, Permission) -> bool + Send + Sync>;

/// Permission levels are ordered: admin covers write, write covers read
pub fn default_check() -> PermissionCheck {
	Arc::new(|caller: &Caller, required: Permission| required.check(&caller.perms))
}

/// Turns an API token into the permissions it grants
#[async_trait]
pub trait TokenVerifier: Send + Sync {
	async fn verify(&self, token: &str) -> PlResult<Vec<Permission>>;
}

#[async_trait]
impl TokenVerifier for CommonProxy {
	async fn verify(&self, token: &str) -> PlResult<Vec<Permission>> {
		self.auth_verify(CallCtx::new(), token.to_string()).await
	}
}

#[derive(Clone)]
struct RpcState {
	dispatch: Arc<dyn RpcDispatch>,
	verifier: Arc<dyn TokenVerifier>,
	check: PermissionCheck,
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
	token: Option<String>,
}

/// Cancellation scope of the calls arriving on one connection
#[derive(Debug, Clone)]
struct ConnScope(CancellationToken);

fn bearer_token(headers: &HeaderMap) -> Option<String> {
	let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
	value.strip_prefix("Bearer ").map(|token| token.trim().to_string())
}

async fn handle_rpc(
	State(state): State<RpcState>,
	Query(query): Query<TokenQuery>,
	scope: Option<Extension<ConnScope>>,
	headers: HeaderMap,
	body: Bytes,
) -> Response {
	let perms: Arc<[Permission]> = match bearer_token(&headers).or(query.token) {
		None => Arc::from(&DEFAULT_PERMISSIONS[..]),
		Some(token) => match state.verifier.verify(&token).await {
			Ok(perms) => perms.into(),
			Err(err) => {
				warn!(%err, "rpc call with invalid token");
				let res = dispatch::Response::error(Value::Null, &Error::Unauthorized);
				return (StatusCode::UNAUTHORIZED, axum::Json(res)).into_response();
			}
		},
	};

	let res = match serde_json::from_slice::<dispatch::Request>(&body) {
		Ok(req) => {
			let cancel = match scope {
				Some(Extension(ConnScope(conn))) => conn.child_token(),
				None => CancellationToken::new(),
			};
			call(&state, &Caller { perms }, req, cancel).await
		}
		Err(err) => dispatch::Response::error(Value::Null, &Error::Parse(err.to_string())),
	};
	axum::Json(res).into_response()
}

async fn call(
	state: &RpcState,
	caller: &Caller,
	req: dispatch::Request,
	cancel: CancellationToken,
) -> dispatch::Response {
	let dispatch::Request { id, method: wire_method, params, .. } = req;
	let method = strip_namespace(&wire_method).unwrap_or(&wire_method);

	let required = state.dispatch.required_permission(method).unwrap_or(Permission::Admin);
	if !(state.check)(caller, required) {
		debug!(method, %required, "rpc call refused");
		return dispatch::Response::error(id, &Error::Unauthorized);
	}

	// dropping the call future cancels its context too
	let _guard = cancel.clone().drop_guard();
	let ctx = CallCtx::with_cancel(cancel).with_permissions(Arc::clone(&caller.perms));

	match state.dispatch.call(method, ctx, params).await {
		Ok(result) => dispatch::Response::result(id, result),
		Err(err) => dispatch::Response::error(id, &err),
	}
}

/// Mount `dispatch` at `path`, gated by `check`
pub fn serve(
	router: Router,
	path: &str,
	dispatch: Arc<dyn RpcDispatch>,
	verifier: Arc<dyn TokenVerifier>,
	check: PermissionCheck,
) -> Router {
	let state = RpcState { dispatch, verifier, check };
	router.route(path, post(handle_rpc).with_state(state))
}

#[derive(Clone, Default)]
pub struct RpcOptions {
	/// Request body limit, [`DEFAULT_MAX_REQUEST_SIZE`] if unset
	pub max_request_size: Option<usize>,
	/// Collect per-method call statistics
	pub stats: Option<Arc<CallStats>>,
}

/// Router serving the full-node API at `/rpc/v0`
pub fn full_node_handler(api: &FullNodeProxy, permissioned: bool, opts: RpcOptions) -> Router {
	let verifier: Arc<dyn TokenVerifier> = Arc::new(api.common.clone());

	let mut api = api.clone();
	if let Some(stats) = opts.stats {
		api = api.wrap(stats);
	}
	if permissioned {
		api = peerlink_api::guard::permissioned(&api);
	}

	serve(Router::new(), RPC_PATH_V0, Arc::new(api), verifier, default_check())
		.layer(DefaultBodyLimit::max(opts.max_request_size.unwrap_or(DEFAULT_MAX_REQUEST_SIZE)))
		.layer(TraceLayer::new_for_http())
}

/// A running RPC server
#[derive(Debug)]
pub struct RpcServer {
	local_addr: SocketAddr,
	shutdown: CancellationToken,
	task: JoinHandle<()>,
}

impl RpcServer {
	pub fn local_addr(&self) -> SocketAddr {
		self.local_addr
	}

	/// Stop accepting calls and wait up to [`STOP_GRACE`] for in-flight ones.
	/// Calls still running after that have their contexts cancelled.
	pub async fn stop(self) -> PlResult<()> {
		self.shutdown.cancel();
		self.task.await?;
		info!("rpc server stopped");
		Ok(())
	}
}

/// Bind `addr` and serve `router` until [`RpcServer::stop`]
pub async fn serve_rpc(router: Router, addr: SocketAddr) -> PlResult<RpcServer> {
	let listener = TcpListener::bind(addr).await?;
	let local_addr = listener.local_addr()?;
	let shutdown = CancellationToken::new();

	let task = tokio::spawn(accept_loop(listener, router, shutdown.clone()));
	info!(addr = %local_addr, "rpc server listening");
	Ok(RpcServer { local_addr, shutdown, task })
}

async fn accept_loop(listener: TcpListener, router: Router, shutdown: CancellationToken) {
	let calls = CancellationToken::new();
	let mut conns = JoinSet::new();
	loop {
		tokio::select! {
			() = shutdown.cancelled() => break,
			Some(_) = conns.join_next(), if !conns.is_empty() => {}
			accepted = listener.accept() => match accepted {
				Ok((stream, peer)) => {
					let conn = serve_conn(stream, router.clone(), shutdown.clone(), calls.child_token());
					conns.spawn(conn.instrument(debug_span!("rpc conn", %peer)));
				}
				Err(err) => {
					warn!(%err, "rpc accept failed");
					tokio::time::sleep(ACCEPT_BACKOFF).await;
				}
			},
		}
	}
	drop(listener);

	if tokio::time::timeout(STOP_GRACE, drain(&mut conns)).await.is_err() {
		warn!(running = conns.len(), "rpc calls still running after grace period, cancelling them");
		calls.cancel();
		if tokio::time::timeout(CANCEL_GRACE, drain(&mut conns)).await.is_err() {
			warn!(running = conns.len(), "dropping rpc connections");
			conns.shutdown().await;
		}
	}
}

async fn drain(conns: &mut JoinSet<()>) {
	while conns.join_next().await.is_some() {}
}

/// Serve one connection. Its calls are cancelled once the connection ends,
/// whether the client hung up or the server dropped it.
async fn serve_conn(stream: TcpStream, router: Router, shutdown: CancellationToken, scope: CancellationToken) {
	let _guard = scope.clone().drop_guard();
	let service = hyper::service::service_fn(move |mut req: axum::http::Request<Incoming>| {
		req.extensions_mut().insert(ConnScope(scope.clone()));
		router.clone().oneshot(req)
	});

	// without half-close a client hanging up mid-call ends the connection
	let conn = http1::Builder::new()
		.timer(TokioTimer::new())
		.half_close(false)
		.serve_connection(TokioIo::new(stream), service);
	tokio::pin!(conn);
	let res = tokio::select! {
		res = conn.as_mut() => res,
		() = shutdown.cancelled() => {
			conn.as_mut().graceful_shutdown();
			conn.as_mut().await
		}
	};
	if let Err(err) = res {
		debug!(%err, "rpc connection closed");
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::body::Body;
	use axum::http::Request;
	use peerlink_api::handler;
	use serde_json::json;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use tokio::io::{AsyncReadExt, AsyncWriteExt};
	use tokio::sync::Notify;

	struct FakeVerifier;

	#[async_trait]
	impl TokenVerifier for FakeVerifier {
		async fn verify(&self, token: &str) -> PlResult<Vec<Permission>> {
			match token {
				"admin" => Ok(vec![Permission::Read, Permission::Write, Permission::Admin]),
				"reader" => Ok(vec![Permission::Read]),
				_ => Err(Error::Unauthorized),
			}
		}
	}

	fn counting_api(calls: &Arc<AtomicUsize>) -> FullNodeProxy {
		let (a, b) = (Arc::clone(calls), Arc::clone(calls));
		let common = CommonProxy {
			session: Some(handler(move |_ctx, ()| {
				a.fetch_add(1, Ordering::SeqCst);
				async { Ok(uuid::Uuid::nil()) }
			})),
			shutdown: Some(handler(move |_ctx, ()| {
				b.fetch_add(1, Ordering::SeqCst);
				async { Ok(()) }
			})),
			..Default::default()
		};
		FullNodeProxy::new(common, Default::default())
	}

	/// `Closing` that only returns once its context is cancelled. The
	/// cancellation is reported from a task of its own, as work the call
	/// handed off would see it.
	fn waiting_api(started: &Arc<Notify>, cancelled: &Arc<Notify>) -> FullNodeProxy {
		let (started, cancelled) = (Arc::clone(started), Arc::clone(cancelled));
		let common = CommonProxy {
			closing: Some(handler(move |ctx: CallCtx, ()| {
				let token = ctx.cancel_token().clone();
				let cancelled = Arc::clone(&cancelled);
				tokio::spawn(async move {
					token.cancelled().await;
					cancelled.notify_one();
				});
				started.notify_one();
				async move {
					ctx.cancelled().await;
					Err(Error::Cancelled)
				}
			})),
			..Default::default()
		};
		FullNodeProxy::new(common, Default::default())
	}

	/// Send a `Closing` call over a plain socket, leaving the socket open
	async fn send_closing(addr: SocketAddr) -> TcpStream {
		let body = request("Closing");
		let req = format!(
			"POST {} HTTP/1.1\r\nHost: {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
			RPC_PATH_V0,
			addr,
			body.len(),
			body
		);
		let mut stream = TcpStream::connect(addr).await.expect("connect");
		stream.write_all(req.as_bytes()).await.expect("write");
		stream
	}

	fn router(api: FullNodeProxy, check: PermissionCheck) -> Router {
		serve(Router::new(), RPC_PATH_V0, Arc::new(api), Arc::new(FakeVerifier), check)
	}

	async fn post_rpc(router: Router, token: Option<&str>, body: String) -> (StatusCode, Value) {
		let mut req = Request::builder().method("POST").uri(RPC_PATH_V0);
		if let Some(token) = token {
			req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
		}
		let res = router.oneshot(req.body(Body::from(body)).expect("request")).await.expect("response");
		let status = res.status();
		let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.expect("body");
		(status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
	}

	fn request(method: &str) -> String {
		json!({ "jsonrpc": "2.0", "id": 7, "method": format!("Peerlink.{}", method), "params": [] })
			.to_string()
	}

	#[tokio::test]
	async fn test_read_without_token() {
		let calls = Arc::new(AtomicUsize::new(0));
		let (status, body) = post_rpc(router(counting_api(&calls), default_check()), None, request("Session")).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["id"], json!(7));
		assert_eq!(body["result"], json!(uuid::Uuid::nil().to_string()));
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn test_insufficient_permission_never_reaches_method() {
		let calls = Arc::new(AtomicUsize::new(0));
		for token in [None, Some("reader")] {
			let (_, body) = post_rpc(router(counting_api(&calls), default_check()), token, request("Shutdown")).await;
			assert_eq!(body["error"]["code"], json!(dispatch::UNAUTHORIZED));
		}
		assert_eq!(calls.load(Ordering::SeqCst), 0);

		let (_, body) = post_rpc(router(counting_api(&calls), default_check()), Some("admin"), request("Shutdown")).await;
		assert!(body.get("error").is_none());
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn test_unsupported_and_unknown_methods_hide_behind_auth() {
		let calls = Arc::new(AtomicUsize::new(0));

		// NetDisconnect needs write and has no handler here
		let (_, body) = post_rpc(router(counting_api(&calls), default_check()), Some("reader"), request("NetDisconnect")).await;
		assert_eq!(body["error"]["code"], json!(dispatch::UNAUTHORIZED));
		let (_, body) = post_rpc(router(counting_api(&calls), default_check()), Some("admin"), request("NetDisconnect")).await;
		assert_eq!(body["error"]["code"], json!(dispatch::NOT_SUPPORTED));

		let (_, body) = post_rpc(router(counting_api(&calls), default_check()), Some("reader"), request("NoSuchThing")).await;
		assert_eq!(body["error"]["code"], json!(dispatch::UNAUTHORIZED));
		let (_, body) = post_rpc(router(counting_api(&calls), default_check()), Some("admin"), request("NoSuchThing")).await;
		assert_eq!(body["error"]["code"], json!(dispatch::METHOD_NOT_FOUND));
	}

	#[tokio::test]
	async fn test_invalid_token_is_rejected() {
		let calls = Arc::new(AtomicUsize::new(0));
		let (status, body) = post_rpc(router(counting_api(&calls), default_check()), Some("forged"), request("Session")).await;
		assert_eq!(status, StatusCode::UNAUTHORIZED);
		assert_eq!(body["error"]["code"], json!(dispatch::UNAUTHORIZED));
		assert_eq!(calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn test_custom_check_is_consulted() {
		let calls = Arc::new(AtomicUsize::new(0));
		let deny_all: PermissionCheck = Arc::new(|_caller: &Caller, _required: Permission| false);
		let (_, body) = post_rpc(router(counting_api(&calls), deny_all), Some("admin"), request("Session")).await;
		assert_eq!(body["error"]["code"], json!(dispatch::UNAUTHORIZED));
		assert_eq!(calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn test_malformed_body_is_a_parse_error() {
		let calls = Arc::new(AtomicUsize::new(0));
		let (status, body) = post_rpc(router(counting_api(&calls), default_check()), None, "{not json".into()).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["error"]["code"], json!(dispatch::PARSE_ERROR));
	}

	#[tokio::test]
	async fn test_full_node_handler_counts_calls() {
		let calls = Arc::new(AtomicUsize::new(0));
		let stats = Arc::new(CallStats::new());
		let opts = RpcOptions { max_request_size: Some(1024), stats: Some(Arc::clone(&stats)) };
		let router = full_node_handler(&counting_api(&calls), true, opts);

		let (_, body) = post_rpc(router.clone(), None, request("Session")).await;
		assert!(body.get("error").is_none());
		assert_eq!(stats.get("Session").map(|s| s.calls), Some(1));

		let (status, _) = post_rpc(router, None, "x".repeat(4096)).await;
		assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
	}

	#[tokio::test]
	async fn test_serve_rpc_binds_and_stops() {
		let calls = Arc::new(AtomicUsize::new(0));
		let router = router(counting_api(&calls), default_check());
		let server = serve_rpc(router, "127.0.0.1:0".parse().expect("addr")).await.expect("serve");
		assert_ne!(server.local_addr().port(), 0);
		server.stop().await.expect("stop");
	}

	#[tokio::test]
	async fn test_client_disconnect_cancels_the_call() {
		let (started, cancelled) = (Arc::new(Notify::new()), Arc::new(Notify::new()));
		let router = router(waiting_api(&started, &cancelled), default_check());
		let server = serve_rpc(router, "127.0.0.1:0".parse().expect("addr")).await.expect("serve");

		let stream = send_closing(server.local_addr()).await;
		tokio::time::timeout(Duration::from_secs(5), started.notified()).await.expect("call started");
		drop(stream);
		tokio::time::timeout(Duration::from_secs(5), cancelled.notified()).await.expect("call cancelled");

		// nothing left in flight, so stopping is quick
		tokio::time::timeout(Duration::from_secs(2), server.stop()).await.expect("stop in time").expect("stop");
	}

	#[tokio::test]
	async fn test_stop_cancels_calls_outliving_the_grace_period() {
		let (started, cancelled) = (Arc::new(Notify::new()), Arc::new(Notify::new()));
		let router = router(waiting_api(&started, &cancelled), default_check());
		let server = serve_rpc(router, "127.0.0.1:0".parse().expect("addr")).await.expect("serve");

		let mut stream = send_closing(server.local_addr()).await;
		tokio::time::timeout(Duration::from_secs(5), started.notified()).await.expect("call started");

		tokio::time::timeout(STOP_GRACE + Duration::from_secs(3), server.stop())
			.await
			.expect("stop in time")
			.expect("stop");
		tokio::time::timeout(Duration::from_secs(1), cancelled.notified()).await.expect("call cancelled");

		// the cancelled call still answered before the connection closed
		let mut res = String::new();
		tokio::time::timeout(Duration::from_secs(2), stream.read_to_string(&mut res))
			.await
			.expect("read in time")
			.expect("read");
		assert!(res.starts_with("HTTP/1.1 200"), "unexpected response: {}", res);
		assert!(res.contains("\"error\""));
	}
}

// vim: ts=4
