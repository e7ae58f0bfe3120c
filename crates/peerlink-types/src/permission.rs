//! Permission levels granted to API callers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Totally ordered permission level: `Admin` implies `Write` implies `Read`.
/// There is no unchecked level. A method without one is admin-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Permission {
	#[serde(rename = "read")]
	Read,
	#[serde(rename = "write")]
	Write,
	#[serde(rename = "admin")]
	Admin,
}

/// Every permission, in ascending order.
pub const ALL_PERMISSIONS: [Permission; 3] = [Permission::Read, Permission::Write, Permission::Admin];

/// Permissions granted to callers that present no token.
pub const DEFAULT_PERMISSIONS: [Permission; 1] = [Permission::Read];

impl Permission {
	pub fn as_str(self) -> &'static str {
		match self {
			Permission::Read => "read",
			Permission::Write => "write",
			Permission::Admin => "admin",
		}
	}

	/// Check if any of the granted permissions satisfies this one
	pub fn check(self, granted: &[Permission]) -> bool {
		granted.iter().any(|g| *g >= self)
	}
}

impl fmt::Display for Permission {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Permission {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"read" => Ok(Permission::Read),
			"write" => Ok(Permission::Write),
			"admin" => Ok(Permission::Admin),
			other => Err(Error::Parse(format!("unknown permission: {}", other))),
		}
	}
}

/// Every permission up to and including `level`.
pub fn up_to(level: Permission) -> Vec<Permission> {
	ALL_PERMISSIONS.iter().copied().filter(|p| *p <= level).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_levels_are_ordered() {
		assert!(Permission::Read < Permission::Write);
		assert!(Permission::Write < Permission::Admin);
	}

	#[test]
	fn test_check_accepts_higher_levels() {
		assert!(Permission::Read.check(&[Permission::Admin]));
		assert!(Permission::Write.check(&[Permission::Read, Permission::Write]));
		assert!(!Permission::Admin.check(&[Permission::Read, Permission::Write]));
		assert!(!Permission::Read.check(&[]));
	}

	#[test]
	fn test_parse_and_serialize() {
		assert_eq!("write".parse::<Permission>().ok(), Some(Permission::Write));
		assert!("root".parse::<Permission>().is_err());
		assert_eq!(serde_json::to_string(&Permission::Admin).ok().as_deref(), Some("\"admin\""));
	}

	#[test]
	fn test_up_to() {
		assert_eq!(up_to(Permission::Write), vec![Permission::Read, Permission::Write]);
	}
}

// vim: ts=4
