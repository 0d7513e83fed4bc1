//! Remote command execution over SSH.
//!
//! Every call opens its own session and tears it down; nothing is pooled.

pub mod executor;

pub use executor::{
    RemoteError, RemoteExecutor, SshCommandExecutor, SshConfig, SshTarget, check_destination_part,
};
