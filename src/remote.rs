use std::fmt;
use std::io::{Read, Write};

// A channel runs exactly one command and is then gone. Taking `self` by value
// means the compiler enforces that, not the caller.
pub trait Channel {
    fn run(self, cmd: &str, streams: Streams<'_>) -> anyhow::Result<ExitStatus>;
}

// Where the remote command's standard streams go.
// stdin is None for commands that read nothing; the remote side then sees EOF.
pub struct Streams<'a> {
    pub stdin: Option<&'a mut (dyn Read + Send)>,
    pub stdout: &'a mut (dyn Write + Send),
    pub stderr: &'a mut (dyn Write + Send),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Exited(i32),
    Signaled(i32),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Exited(0))
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            ExitStatus::Exited(code) => Some(*code),
            ExitStatus::Signaled(_) => None,
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Exited(code) => write!(f, "process exited with status {code}"),
            ExitStatus::Signaled(sig) => write!(f, "process killed by signal {sig}"),
        }
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return ExitStatus::Exited(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(sig) = status.signal() {
                return ExitStatus::Signaled(sig);
            }
        }
        // no code and no signal: treat like the shell does for an unknown failure
        ExitStatus::Exited(-1)
    }
}
