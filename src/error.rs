use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::remote::ExitStatus;

/// Errors from running a filesystem operation on the remote host.
#[derive(Debug, Error)]
pub enum Error {
    /// The remote command ran and exited unsuccessfully. `stderr` usually says
    /// why, `status` says how it ended.
    #[error("{}", join_stderr(.stderr, .status))]
    Remote { stderr: String, status: ExitStatus },

    /// The channel itself failed: could not start, dropped, or a stream broke.
    #[error("{}", join_stderr(.stderr, .source))]
    Transport {
        stderr: String,
        #[source]
        source: anyhow::Error,
    },

    /// A path or user name that the remote shell would not see as one word.
    #[error("refusing to send {value:?} to the remote shell: contains {found:?}")]
    UnsafeArgument { value: String, found: char },

    #[error("local file {}: {source}", .path.display())]
    Local {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn exit_status(&self) -> Option<ExitStatus> {
        match self {
            Error::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn transport(stderr: &[u8], source: anyhow::Error) -> Error {
        Error::Transport {
            stderr: String::from_utf8_lossy(stderr).into_owned(),
            source,
        }
    }
}

// "<stderr>: <what>", or just "<what>" when the command printed nothing.
fn join_stderr(stderr: &str, what: &dyn fmt::Display) -> String {
    let stderr = stderr.trim_end();
    if stderr.is_empty() {
        format!("{what:#}")
    } else {
        format!("{stderr}: {what:#}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_message_keeps_stderr_and_status() {
        let err = Error::Remote {
            stderr: "cat: foo: No such file or directory\n".to_string(),
            status: ExitStatus::Exited(1),
        };
        assert_eq!(
            err.to_string(),
            "cat: foo: No such file or directory: process exited with status 1"
        );
        assert_eq!(err.exit_status(), Some(ExitStatus::Exited(1)));
    }

    #[test]
    fn remote_message_without_stderr() {
        let err = Error::Remote {
            stderr: String::new(),
            status: ExitStatus::Signaled(9),
        };
        assert_eq!(err.to_string(), "process killed by signal 9");
    }

    #[test]
    fn transport_message_includes_cause() {
        let err = Error::transport(
            b"ssh: connect to host nope port 22: Connection refused\r\n",
            anyhow::anyhow!("ssh exited with status 255"),
        );
        assert_eq!(
            err.to_string(),
            "ssh: connect to host nope port 22: Connection refused: ssh exited with status 255"
        );
        assert!(err.exit_status().is_none());
    }
}
