pub use peerlink_types::prelude::*;

// vim: ts=4
