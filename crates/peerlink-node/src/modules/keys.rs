//! Host key and the identity derived from it.
//!
//! The host key is a P-256 secret kept in the repo key store. It is generated
//! on first start. The peer id is `pl` followed by the unpadded url-safe
//! base64 of the SHA-256 of the compressed public key.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};
use sha2::{Digest, Sha256};
use std::fmt;

use peerlink_types::prelude::*;
use peerlink_types::repo_adapter::{HOST_KEY, HOST_KEY_TYPE, KeyInfo, KeyStore};

/// Prefix of every peer id
pub const PEER_ID_PREFIX: &str = "pl";

#[derive(Clone)]
pub struct PrivKey(pub SecretKey);

impl fmt::Debug for PrivKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("PrivKey(..)")
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubKey(pub PublicKey);

impl PubKey {
	/// SEC1 compressed encoding
	pub fn to_bytes(&self) -> Vec<u8> {
		self.0.to_encoded_point(true).as_bytes().to_vec()
	}
}

fn generate_secret() -> SecretKey {
	loop {
		let bytes: [u8; 32] = rand::random();
		// out of range scalars are astronomically rare, just draw again
		if let Ok(key) = SecretKey::from_slice(&bytes) {
			return key;
		}
	}
}

/// Load the host key, generating and storing it if the key store has none
pub fn host_key(ks: &dyn KeyStore) -> PlResult<PrivKey> {
	match ks.get(HOST_KEY) {
		Ok(info) => {
			if &*info.key_type != HOST_KEY_TYPE {
				return Err(Error::ConfigError(format!(
					"host key has type {}, expected {}",
					info.key_type, HOST_KEY_TYPE
				)));
			}
			let key = SecretKey::from_slice(&info.private_key)
				.map_err(|_| Error::Parse("host key is not a valid P-256 secret".into()))?;
			Ok(PrivKey(key))
		}
		Err(Error::NotFound) => {
			info!("generating new host key");
			let key = generate_secret();
			ks.put(
				HOST_KEY,
				KeyInfo { key_type: HOST_KEY_TYPE.into(), private_key: key.to_bytes().to_vec() },
			)?;
			Ok(PrivKey(key))
		}
		Err(err) => Err(err),
	}
}

pub fn pub_key(key: &PrivKey) -> PubKey {
	PubKey(key.0.public_key())
}

pub fn peer_id(key: &PubKey) -> PeerId {
	let digest = Sha256::digest(key.to_bytes());
	PeerId::new(format!("{}{}", PEER_ID_PREFIX, URL_SAFE_NO_PAD.encode(digest)))
}


// vim: ts=4
