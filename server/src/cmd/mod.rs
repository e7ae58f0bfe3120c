//! Subcommands

pub mod auth;
pub mod init;
pub mod net;
pub mod run;
pub mod stop;

// vim: ts=4
