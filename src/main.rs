//! vbridge: userspace software Ethernet bridge
//!
//! One binary, two roles. With a daemon socket present it acts as a
//! client and forwards the command line to the daemon; without one it
//! executes locally — `start` runs the daemon itself, topology commands
//! build bridges that live until the process is interrupted.
//!
//! # Usage
//!
//! ```bash
//! # Run the daemon
//! sudo vbridge start
//!
//! # Administer it from another shell
//! sudo vbridge up br0
//! sudo vbridge link br0 eth0
//! sudo vbridge link br0 eth1
//! sudo vbridge stop
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing_subscriber::EnvFilter;

use vbridge::config::Config;
use vbridge::ctl::{Command, CtlClient};
use vbridge::error::CtlError;

/// Command-line arguments
struct Args {
    /// Configuration file path, if given
    config_path: Option<PathBuf>,
    /// The control command, word by word
    command: Vec<String>,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut config_path = None;
        let mut command = Vec::new();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-c" | "--config" => {
                    if let Some(path) = args.next() {
                        config_path = Some(PathBuf::from(path));
                    }
                }
                "-h" | "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "-v" | "--version" => {
                    println!("vbridge v{}", vbridge::VERSION);
                    std::process::exit(0);
                }
                word => command.push(word.to_string()),
            }
        }

        Self {
            config_path,
            command,
        }
    }
}

fn print_help() {
    println!(
        r"vbridge v{}

Userspace software Ethernet bridge.

USAGE:
    vbridge [OPTIONS] <COMMAND>

COMMANDS:
    start                     run the daemon
    stop                      stop the running daemon
    up <bridge>               create a bridge
    down <bridge>             close and forget a bridge
    link <bridge> <iface>     link a device into a bridge
    unlink <bridge> <iface>   unlink a device from a bridge

OPTIONS:
    -c, --config <PATH>    Configuration file (JSON)
    -h, --help             Print help information
    -v, --version          Print version information

ENVIRONMENT:
    RUST_LOG               Log filter (trace, debug, info, warn, error)

REQUIREMENTS:
    - Linux with raw packet socket support
    - CAP_NET_RAW capability (or root)
",
        vbridge::VERSION
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if args.command.is_empty() {
        print_help();
        return Ok(());
    }

    let config = match &args.config_path {
        Some(path) => Config::load(path).context("loading configuration")?,
        None => Config::default(),
    };

    let line = args.command.join(" ");
    let command = Command::parse(&line).map_err(|err| anyhow::anyhow!("{err}"))?;

    // A present daemon socket means remote execution, except for
    // `start`, which only makes sense locally.
    let client = CtlClient::new(config.socket_path.clone());
    if client.daemon_present() && command != Command::Start {
        match client.send(&command).await {
            Ok(reply) => {
                println!("{reply}");
                return Ok(());
            }
            // A stale socket left by a dead daemon: execute locally
            Err(CtlError::DaemonNotRunning) => {}
            Err(err) => bail!("{err}"),
        }
    }

    run_local(config, command).await
}

#[cfg(target_os = "linux")]
async fn run_local(config: Config, command: Command) -> Result<()> {
    use std::sync::Arc;

    use tokio_util::sync::CancellationToken;
    use tracing::info;

    use vbridge::ctl::{CtlServer, PacketProvider, Registry};

    let registry = Arc::new(Registry::new(config.bridge.clone(), PacketProvider));
    let cancel = CancellationToken::new();

    match &command {
        Command::Start => {
            let server = CtlServer::new(
                config.socket_path.clone(),
                Arc::clone(&registry),
                cancel.clone(),
            );
            spawn_signal_watcher(cancel.clone());
            server
                .run()
                .await
                .map_err(|err| anyhow::anyhow!("cannot start daemon: {err}"))?;
        }
        Command::Stop => {
            bail!("{}", CtlError::NotSupported("local"));
        }
        Command::Close => {}
        topology => {
            match registry.apply(topology) {
                Ok(()) => print!("{}", command.success_reply()),
                Err(err) => {
                    print!("{}", command.failure_reply(&err));
                    registry.close_all();
                    std::process::exit(1);
                }
            }
            // Local bridges live only as long as this process does
            info!("running until interrupted");
            shutdown_signal().await;
        }
    }

    registry.close_all();
    Ok(())
}

#[cfg(not(target_os = "linux"))]
async fn run_local(_config: Config, _command: Command) -> Result<()> {
    bail!("local execution requires Linux raw packet sockets");
}

#[cfg(target_os = "linux")]
fn spawn_signal_watcher(cancel: tokio_util::sync::CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("shutdown signal received");
        cancel.cancel();
    });
}

/// Pends until SIGINT or SIGTERM.
#[cfg(target_os = "linux")]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let ctrl_c = tokio::signal::ctrl_c();
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(_) => {
            let _ = ctrl_c.await;
        }
    }
}
