//! Accumulator mutated by node options.

use std::collections::HashMap;

use crate::key::{InvokeKey, ModuleKey};
use crate::provider::{Invoke, Provider};
use peerlink_types::types::NodeType;

pub struct Settings {
	pub(crate) modules: HashMap<ModuleKey, Provider>,
	pub(crate) invokes: [Option<Invoke>; InvokeKey::COUNT],

	pub(crate) node_type: NodeType,

	/// Base stage applied
	pub(crate) base: bool,
	/// Config stage applied
	pub(crate) config: bool,
	/// Start the node without the bootstrap peer manager
	pub(crate) lite: bool,

	pub(crate) enable_network: bool,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			modules: HashMap::new(),
			invokes: std::array::from_fn(|_| None),
			node_type: NodeType::Unset,
			base: false,
			config: false,
			lite: false,
			enable_network: false,
		}
	}
}

impl Settings {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn is_registered(&self, key: &ModuleKey) -> bool {
		self.modules.contains_key(key)
	}

	pub fn is_invoke_set(&self, slot: InvokeKey) -> bool {
		self.invokes[slot.index()].is_some()
	}

	pub fn node_type(&self) -> NodeType {
		self.node_type
	}

	pub fn is_base(&self) -> bool {
		self.base
	}

	pub fn is_config(&self) -> bool {
		self.config
	}

	pub fn is_lite(&self) -> bool {
		self.lite
	}

	pub fn network_enabled(&self) -> bool {
		self.enable_network
	}

	/// Dependencies of the current registration for `key`
	pub fn deps_of(&self, key: &ModuleKey) -> Option<&[ModuleKey]> {
		self.modules.get(key).map(Provider::deps)
	}
}

// vim: ts=4
