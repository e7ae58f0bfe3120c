//! Shared types, adapter traits, and core utilities for the Peerlink node.
//!
//! This crate contains the foundational types that are shared between the
//! node crate, the API crate and all adapter implementations.

pub mod config;
pub mod context;
pub mod error;
pub mod net_adapter;
pub mod permission;
pub mod prelude;
pub mod repo_adapter;
pub mod types;

// vim: ts=4
