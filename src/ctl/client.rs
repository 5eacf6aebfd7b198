//! Control client
//!
//! One-shot client for the control protocol: connect to the daemon
//! socket, write a command line, read the reply line, map non-`success`
//! replies to errors.

use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use super::protocol::Command;
use crate::error::CtlError;

/// Client side of the control socket.
pub struct CtlClient {
    socket_path: PathBuf,
}

impl CtlClient {
    /// Creates a client for the daemon at `socket_path`.
    #[must_use]
    pub fn new(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    /// Whether a daemon socket is present. Presence is how the binary
    /// chooses between remote and local execution.
    #[must_use]
    pub fn daemon_present(&self) -> bool {
        self.socket_path.exists()
    }

    /// Sends one command and returns the daemon's `success` reply line,
    /// trimmed.
    ///
    /// # Errors
    ///
    /// [`CtlError::DaemonNotRunning`] if the socket does not connect,
    /// [`CtlError::Remote`] carrying the daemon's error description for
    /// a non-`success` reply.
    pub async fn send(&self, command: &Command) -> Result<String, CtlError> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|_| CtlError::DaemonNotRunning)?;
        let (read, mut write) = stream.into_split();

        write.write_all(command.render().as_bytes()).await?;
        write.flush().await?;

        let mut reply = String::new();
        BufReader::new(read).read_line(&mut reply).await?;
        let reply = reply.trim_end_matches('\n').to_string();

        if reply.starts_with("success") {
            Ok(reply)
        } else {
            // Keep only the reason, not the wrapping "cannot ..." text
            let reason = reply
                .rsplit(':')
                .next()
                .unwrap_or(&reply)
                .trim()
                .to_string();
            Err(CtlError::Remote(reason))
        }
    }
}
