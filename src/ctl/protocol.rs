//! Control protocol
//!
//! Newline-terminated, whitespace-delimited commands over a byte stream.
//! Each command produces a single reply line beginning `success`, or an
//! error description otherwise.
//!
//! ```text
//! up <bridge>               create a bridge
//! down <bridge>             close and forget a bridge
//! link <bridge> <iface>     link a device into a bridge
//! unlink <bridge> <iface>   unlink a device from a bridge
//! start                     run the daemon
//! stop                      stop the daemon
//! close                     end this control session
//! ```

use crate::error::CtlError;

/// A parsed control command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create a bridge under the given name.
    Up {
        /// Bridge name.
        bridge: String,
    },
    /// Close the named bridge and forget it.
    Down {
        /// Bridge name.
        bridge: String,
    },
    /// Link a device into the named bridge.
    Link {
        /// Bridge name.
        bridge: String,
        /// Device name.
        iface: String,
    },
    /// Unlink a device from the named bridge.
    Unlink {
        /// Bridge name.
        bridge: String,
        /// Device name.
        iface: String,
    },
    /// Run the daemon.
    Start,
    /// Stop the daemon.
    Stop,
    /// End the control session.
    Close,
}

impl Command {
    /// Parses one command line.
    ///
    /// # Errors
    ///
    /// [`CtlError::InvalidCommand`] for an unknown verb,
    /// [`CtlError::InvalidArguments`] for a recognized verb with the
    /// wrong argument count.
    pub fn parse(line: &str) -> Result<Self, CtlError> {
        let mut words = line.split_whitespace();
        let verb = words
            .next()
            .ok_or_else(|| CtlError::InvalidCommand(String::new()))?;

        let command = match verb {
            "up" => {
                let [bridge] = take_args::<1>("up", &mut words)?;
                Self::Up { bridge }
            }
            "down" => {
                let [bridge] = take_args::<1>("down", &mut words)?;
                Self::Down { bridge }
            }
            "link" => {
                let [bridge, iface] = take_args::<2>("link", &mut words)?;
                Self::Link { bridge, iface }
            }
            "unlink" => {
                let [bridge, iface] = take_args::<2>("unlink", &mut words)?;
                Self::Unlink { bridge, iface }
            }
            "start" => Self::Start,
            "stop" => Self::Stop,
            "close" => Self::Close,
            other => return Err(CtlError::InvalidCommand(other.to_string())),
        };

        Ok(command)
    }

    /// Renders the command as one protocol line, newline included.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Up { bridge } => format!("up {bridge}\n"),
            Self::Down { bridge } => format!("down {bridge}\n"),
            Self::Link { bridge, iface } => format!("link {bridge} {iface}\n"),
            Self::Unlink { bridge, iface } => format!("unlink {bridge} {iface}\n"),
            Self::Start => "start\n".to_string(),
            Self::Stop => "stop\n".to_string(),
            Self::Close => "close\n".to_string(),
        }
    }

    /// The success reply line for this command, newline included.
    #[must_use]
    pub fn success_reply(&self) -> String {
        match self {
            Self::Up { bridge } => format!("success: {bridge} set up\n"),
            Self::Down { bridge } => format!("success: {bridge} put down\n"),
            Self::Link { bridge, iface } => format!("success: {iface} linked to {bridge}\n"),
            Self::Unlink { bridge, iface } => {
                format!("success: {iface} unlinked from {bridge}\n")
            }
            Self::Start | Self::Stop | Self::Close => "success\n".to_string(),
        }
    }

    /// The failure reply line for this command, newline included.
    #[must_use]
    pub fn failure_reply(&self, err: &CtlError) -> String {
        match self {
            Self::Up { bridge } => format!("cannot setup bridge {bridge}: {err}\n"),
            Self::Down { bridge } => format!("cannot destroy bridge {bridge}: {err}\n"),
            Self::Link { bridge, iface } => format!("cannot link {iface} to {bridge}: {err}\n"),
            Self::Unlink { bridge, iface } => {
                format!("cannot unlink {iface} from {bridge}: {err}\n")
            }
            Self::Start => format!("cannot start daemon: {err}\n"),
            Self::Stop => format!("cannot stop daemon: {err}\n"),
            Self::Close => format!("cannot close session: {err}\n"),
        }
    }
}

/// Collects exactly `N` arguments for `verb`.
fn take_args<const N: usize>(
    verb: &'static str,
    words: &mut std::str::SplitWhitespace<'_>,
) -> Result<[String; N], CtlError> {
    let mut args = Vec::with_capacity(N);
    for _ in 0..N {
        match words.next() {
            Some(word) => args.push(word.to_string()),
            None => {
                return Err(CtlError::InvalidArguments {
                    command: verb,
                    expected: N,
                })
            }
        }
    }
    args.try_into().map_err(|_| CtlError::InvalidArguments {
        command: verb,
        expected: N,
    })
}
