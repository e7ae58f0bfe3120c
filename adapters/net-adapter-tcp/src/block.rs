//! Address matching for the block list

use std::net::IpAddr;

use peerlink_types::types::NetBlockList;

/// Whether `subnet` (CIDR notation) contains `ip`. Malformed subnets match
/// nothing.
pub fn in_subnet(ip: IpAddr, subnet: &str) -> bool {
	let Some((net, bits)) = subnet.split_once('/') else {
		return false;
	};
	let (Ok(net), Ok(bits)) = (net.parse::<IpAddr>(), bits.parse::<u32>()) else {
		return false;
	};
	match (ip, net) {
		(IpAddr::V4(ip), IpAddr::V4(net)) if bits <= 32 => {
			let mask = u32::MAX.checked_shl(32 - bits).unwrap_or(0);
			u32::from(ip) & mask == u32::from(net) & mask
		}
		(IpAddr::V6(ip), IpAddr::V6(net)) if bits <= 128 => {
			let mask = u128::MAX.checked_shl(128 - bits).unwrap_or(0);
			u128::from(ip) & mask == u128::from(net) & mask
		}
		_ => false,
	}
}

pub fn ip_blocked(list: &NetBlockList, ip: IpAddr) -> bool {
	list.ip_addrs.iter().any(|addr| addr.parse::<IpAddr>().is_ok_and(|addr| addr == ip))
		|| list.ip_subnets.iter().any(|subnet| in_subnet(ip, subnet))
}

/// Whether an address can be reached from outside the local network
pub fn is_public(ip: IpAddr) -> bool {
	match ip {
		IpAddr::V4(ip) => {
			!(ip.is_private() || ip.is_loopback() || ip.is_link_local() || ip.is_unspecified())
		}
		IpAddr::V6(ip) => {
			let first = ip.segments()[0];
			!(ip.is_loopback() || ip.is_unspecified() || first & 0xfe00 == 0xfc00 || first & 0xffc0 == 0xfe80)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn ip(s: &str) -> IpAddr {
		s.parse().expect("ip")
	}

	#[test]
	fn test_subnets() {
		assert!(in_subnet(ip("10.1.2.3"), "10.0.0.0/8"));
		assert!(!in_subnet(ip("11.1.2.3"), "10.0.0.0/8"));
		assert!(in_subnet(ip("192.168.1.7"), "0.0.0.0/0"));
		assert!(in_subnet(ip("192.168.1.7"), "192.168.1.7/32"));
		assert!(in_subnet(ip("fd00::1"), "fd00::/8"));
		assert!(!in_subnet(ip("fd00::1"), "10.0.0.0/8"));
		assert!(!in_subnet(ip("10.1.2.3"), "10.0.0.0/33"));
		assert!(!in_subnet(ip("10.1.2.3"), "10.0.0.0"));
	}

	#[test]
	fn test_block_list_matching() {
		let list = NetBlockList {
			peers: Vec::new(),
			ip_addrs: vec!["192.0.2.1".into()],
			ip_subnets: vec!["198.51.100.0/24".into()],
		};
		assert!(ip_blocked(&list, ip("192.0.2.1")));
		assert!(ip_blocked(&list, ip("198.51.100.200")));
		assert!(!ip_blocked(&list, ip("192.0.2.2")));
	}

	#[test]
	fn test_public_addresses() {
		assert!(is_public(ip("203.0.113.7")));
		assert!(!is_public(ip("127.0.0.1")));
		assert!(!is_public(ip("10.0.0.1")));
		assert!(!is_public(ip("fe80::1")));
		assert!(is_public(ip("2001:db8::1")));
	}
}

// vim: ts=4
