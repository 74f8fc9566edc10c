//! Inter-Process Communication between the CLI and the daemon
//!
//! Unix Domain Socket, one JSON message per line. The daemon side is
//! [`serve`]; the CLI side is [`DaemonClient`].

use std::path::PathBuf;

pub mod client;
pub mod listener;
pub mod messages;
pub mod server;

pub use client::{DaemonClient, Subscription};
pub use listener::{cleanup_socket, create_listener_at, read_message, send_response};
pub use messages::{DaemonMessage, DaemonResponse};
pub use server::{handle_connection, serve};

/// Get the socket path for daemon IPC
pub fn get_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("trackerwatch")
        .join("daemon.sock")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_path_ends_with_daemon_sock() {
        let path = get_socket_path();
        assert!(path.ends_with("trackerwatch/daemon.sock"));
    }
}
