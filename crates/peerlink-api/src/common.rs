//! Methods every node type exposes.

use peerlink_types::permission::Permission;
use peerlink_types::types::VersionInfo;
use uuid::Uuid;

use crate::interface::capability_interface;

capability_interface! {
	/// Authentication, session and lifecycle methods shared by every node type
	pub interface Common {
		proxy: CommonProxy,
		stub: CommonStub,
		methods {
			/// Issue an API token granting `perms`
			[Admin] fn auth_new = "AuthNew" (perms: Vec<Permission>) -> String;
			/// Permissions carried by an API token
			[Read] fn auth_verify = "AuthVerify" (token: String) -> Vec<Permission>;
			/// Resolves once the node starts shutting down
			[Read] fn closing = "Closing" () -> ();
			/// Random id, fixed for the lifetime of the process
			[Read] fn session = "Session" () -> Uuid;
			/// Ask the node process to shut down
			[Admin] fn shutdown = "Shutdown" () -> ();
			[Read] fn version = "Version" () -> VersionInfo;
		}
	}
}

// vim: ts=4
