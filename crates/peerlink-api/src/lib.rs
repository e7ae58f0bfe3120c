//! Capability interfaces of the Peerlink node.
//!
//! Every interface is described once (method name, wire name, permission,
//! argument and result types) and turned into a trait, a handler-table proxy,
//! a stub and a JSON-RPC dispatch table. Proxies can be wrapped so that each
//! call passes through an interceptor, which is how permission checks and
//! instrumentation are layered on without per-method code.

mod interface;

pub mod around;
pub mod common;
pub mod dispatch;
pub mod full;
pub mod guard;
pub mod handler;
pub mod instrument;
pub mod net;

pub use around::{AnyValue, Around, Next, around_fn};
pub use common::{Common, CommonProxy, CommonStub};
pub use dispatch::RpcDispatch;
pub use full::{FullNode, FullNodeProxy};
pub use handler::{CallFuture, Handler, MethodDesc, handler};
pub use net::{Net, NetProxy, NetStub};

pub use peerlink_types::context::CallCtx;
pub use peerlink_types::error::{Error, PlResult};
pub use peerlink_types::permission::Permission;

// vim: ts=4
