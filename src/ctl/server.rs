//! Control daemon
//!
//! Unix-domain socket server for the control protocol. One task per
//! accepted connection reads command lines and applies them to the
//! registry; `stop` cancels the daemon token, which also ends the accept
//! loop. A stale socket file is removed before bind, and the socket is
//! unlinked again on shutdown.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::protocol::Command;
use super::registry::Registry;
use crate::error::CtlError;

/// The control-plane daemon.
pub struct CtlServer {
    socket_path: PathBuf,
    registry: Arc<Registry>,
    cancel: CancellationToken,
}

impl CtlServer {
    /// Creates a server that will listen on `socket_path` and apply
    /// commands to `registry`. Cancelling `cancel` — from a signal
    /// handler or a `stop` command — shuts the server down.
    pub fn new(socket_path: PathBuf, registry: Arc<Registry>, cancel: CancellationToken) -> Self {
        Self {
            socket_path,
            registry,
            cancel,
        }
    }

    /// Runs the accept loop until the daemon token fires.
    ///
    /// # Errors
    ///
    /// [`CtlError::Io`] if the socket cannot be prepared or bound.
    pub async fn run(&self) -> Result<(), CtlError> {
        // A previous daemon may have left its socket behind
        if self.socket_path.exists() {
            fs::remove_file(&self.socket_path)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        info!(socket = %self.socket_path.display(), "control server listening");

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                res = listener.accept() => match res {
                    Ok((stream, _addr)) => {
                        let registry = Arc::clone(&self.registry);
                        let cancel = self.cancel.clone();
                        tokio::spawn(async move {
                            if let Err(err) = serve_session(stream, &registry, &cancel).await {
                                debug!(%err, "control session ended with error");
                            }
                        });
                    }
                    Err(err) => {
                        error!(%err, "control accept failed");
                    }
                }
            }
        }

        let _ = fs::remove_file(&self.socket_path);
        info!("control server stopped");
        Ok(())
    }
}

/// Serves one control connection: one command per line, one reply line
/// per command. An invalid command or a `close` ends the session; `stop`
/// additionally brings the daemon down.
async fn serve_session(
    stream: UnixStream,
    registry: &Registry,
    daemon_cancel: &CancellationToken,
) -> Result<(), CtlError> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(err) => {
                write.write_all(format!("{err}\n").as_bytes()).await?;
                break;
            }
        };

        match &command {
            Command::Close => break,
            Command::Start => {
                // The daemon answering proves one is already running
                let reply = command.failure_reply(&CtlError::DaemonRunning);
                write.write_all(reply.as_bytes()).await?;
            }
            Command::Stop => {
                write.write_all(command.success_reply().as_bytes()).await?;
                write.flush().await?;
                daemon_cancel.cancel();
                break;
            }
            topology => {
                let reply = match registry.apply(topology) {
                    Ok(()) => command.success_reply(),
                    Err(err) => command.failure_reply(&err),
                };
                write.write_all(reply.as_bytes()).await?;
            }
        }
    }

    Ok(())
}
