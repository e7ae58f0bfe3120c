use peerlink_types::error::Error;
use std::fmt;
use std::io;

/// Helper to convert redb errors
pub fn from_redb_error<E: fmt::Display>(err: E) -> Error {
	Error::Internal(format!("datastore: {}", err))
}

/// Map a missing file to `Error::NotFound`
pub fn not_found(err: io::Error) -> Error {
	if err.kind() == io::ErrorKind::NotFound { Error::NotFound } else { Error::Io(err) }
}

// vim: ts=4
