//! Registry keys: module keys name constructed values, invoke keys name the
//! ordered initialization slots.

use std::fmt;

/// Identity of a module in the dependency graph
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModuleKey {
	// Defaults
	ShutdownTrigger,
	Closing,
	NetworkName,

	// Repo
	LockedRepo,
	KeyStore,
	PrivKey,
	PubKey,
	PeerId,
	ApiSecret,
	MetadataDs,

	// Config
	ApiEndpoint,
	AddrsFilter,
	BootstrapPeers,

	// Networking
	NetAdapter,
	ConnGater,
	PeerMgr,

	// APIs
	CommonApi,
	NetApi,
	FullNodeApi,

	/// Modules without a well-known key
	Custom(&'static str),
}

impl fmt::Display for ModuleKey {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			ModuleKey::Custom(name) => f.write_str(name),
			other => write!(f, "{:?}", other),
		}
	}
}

/// Initialization slots, run in declaration order after every module is
/// constructed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InvokeKey {
	StartListening,
	ConnectionManager,
	ConnGater,
	RunPeerMgr,
	ExtractApi,
	SetApiEndpoint,
}

impl InvokeKey {
	pub const COUNT: usize = 6;

	pub const ALL: [InvokeKey; Self::COUNT] = [
		InvokeKey::StartListening,
		InvokeKey::ConnectionManager,
		InvokeKey::ConnGater,
		InvokeKey::RunPeerMgr,
		InvokeKey::ExtractApi,
		InvokeKey::SetApiEndpoint,
	];

	pub fn index(self) -> usize {
		self as usize
	}
}

impl fmt::Display for InvokeKey {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "invoke:{:?}", self)
	}
}

/// Anything an option can register or unset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
	Module(ModuleKey),
	Invoke(InvokeKey),
}

impl From<ModuleKey> for Target {
	fn from(key: ModuleKey) -> Self {
		Target::Module(key)
	}
}

impl From<InvokeKey> for Target {
	fn from(key: InvokeKey) -> Self {
		Target::Invoke(key)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_invoke_order_matches_index() {
		for (i, key) in InvokeKey::ALL.iter().enumerate() {
			assert_eq!(key.index(), i);
		}
	}

	#[test]
	fn test_display() {
		assert_eq!(ModuleKey::Custom("a").to_string(), "a");
		assert_eq!(ModuleKey::LockedRepo.to_string(), "LockedRepo");
		assert_eq!(InvokeKey::ExtractApi.to_string(), "invoke:ExtractApi");
	}
}

// vim: ts=4
