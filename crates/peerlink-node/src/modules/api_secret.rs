//! API token signing.
//!
//! Tokens are HS256 JWTs whose only claim is the list of permissions they
//! grant. They do not expire; revoking means rotating the secret.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;

use peerlink_types::permission::ALL_PERMISSIONS;
use peerlink_types::prelude::*;
use peerlink_types::repo_adapter::{JWT_SECRET_KEY, JWT_SECRET_TYPE, KeyInfo, KeyStore, LockedRepo};

#[derive(Debug, Serialize, Deserialize)]
struct JwtPayload {
	#[serde(rename = "Allow")]
	allow: Vec<Permission>,
}

#[derive(Clone)]
pub struct ApiAlg {
	encoding: EncodingKey,
	decoding: DecodingKey,
}

impl fmt::Debug for ApiAlg {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("ApiAlg(HS256)")
	}
}

impl ApiAlg {
	pub fn from_secret(secret: &[u8]) -> Self {
		Self { encoding: EncodingKey::from_secret(secret), decoding: DecodingKey::from_secret(secret) }
	}

	pub fn sign(&self, perms: &[Permission]) -> PlResult<String> {
		let payload = JwtPayload { allow: perms.to_vec() };
		jsonwebtoken::encode(&Header::new(Algorithm::HS256), &payload, &self.encoding)
			.map_err(|e| Error::Internal(format!("signing api token: {}", e)))
	}

	/// Permissions granted by `token`. Any verification failure is reported
	/// as `Error::Unauthorized`.
	pub fn verify(&self, token: &str) -> PlResult<Vec<Permission>> {
		let mut validation = Validation::new(Algorithm::HS256);
		validation.required_spec_claims.clear();
		validation.validate_exp = false;
		validation.validate_aud = false;

		let data = jsonwebtoken::decode::<JwtPayload>(token, &self.decoding, &validation).map_err(|e| {
			debug!(err = %e, "api token rejected");
			Error::Unauthorized
		})?;
		Ok(data.claims.allow)
	}
}

/// Load the signing secret, or create one. A fresh secret also gets a token
/// with every permission written to the repo for local tooling.
pub fn api_secret(ks: &dyn KeyStore, repo: &dyn LockedRepo) -> PlResult<ApiAlg> {
	match ks.get(JWT_SECRET_KEY) {
		Ok(info) => Ok(ApiAlg::from_secret(&info.private_key)),
		Err(Error::NotFound) => {
			warn!("generating new api secret");
			let secret: [u8; 32] = rand::random();
			ks.put(
				JWT_SECRET_KEY,
				KeyInfo { key_type: JWT_SECRET_TYPE.into(), private_key: secret.to_vec() },
			)?;
			let alg = ApiAlg::from_secret(&secret);
			repo.set_api_token(&alg.sign(&ALL_PERMISSIONS)?)?;
			Ok(alg)
		}
		Err(err) => Err(err),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_token_carries_permissions() {
		let alg = ApiAlg::from_secret(b"0123456789abcdef0123456789abcdef");
		let token = alg.sign(&[Permission::Read, Permission::Write]).expect("sign");
		assert_eq!(alg.verify(&token).expect("verify"), vec![Permission::Read, Permission::Write]);
	}

	#[test]
	fn test_foreign_token_is_unauthorized() {
		let ours = ApiAlg::from_secret(b"ours-ours-ours-ours-ours-ours-ou");
		let theirs = ApiAlg::from_secret(b"theirs-theirs-theirs-theirs-thei");
		let token = theirs.sign(&[Permission::Admin]).expect("sign");
		assert!(matches!(ours.verify(&token), Err(Error::Unauthorized)));
		assert!(matches!(ours.verify("not a token"), Err(Error::Unauthorized)));
	}
}

// vim: ts=4
