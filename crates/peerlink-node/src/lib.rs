//! Node assembly for Peerlink.
//!
//! Options accumulate module constructors and ordered invoke slots into
//! [`Settings`]; the [`graph`] resolves them into a dependency order, builds
//! every module, runs the invokes and starts the lifecycle hooks. The result is
//! a [`ShutdownHandle`]. The assembled API is exposed through [`rpc`].

pub mod builder;
pub mod graph;
pub mod key;
pub mod lifecycle;
pub mod modules;
pub mod monitor;
pub mod option;
pub mod provider;
pub mod rpc;
pub mod settings;
pub mod shutdown;

pub use builder::{
	ApiSlot, base, config_common, config_full_node, connection_manager, defaults, full_api, lite,
	net_adapter, new, repo, start_listening,
};
pub use key::{InvokeKey, ModuleKey, Target};
pub use lifecycle::{Hook, Lifecycle};
pub use option::{
	NodeOption, apply_if, error, is_type, options, override_invoke, override_module, unset, when,
};
pub use provider::{Invoke, Provider, Scope};
pub use settings::Settings;
pub use shutdown::{Closing, ShutdownHandle, ShutdownTrigger};

// vim: ts=4
