use std::process::Command;

use anyhow::anyhow;

use crate::client::Connect;
use crate::process::run_child;
use crate::remote::{Channel, ExitStatus, Streams};

pub const DEFAULT_SSH: &str = "ssh";

// ssh exits with this when it, not the remote command, failed
const SSH_ERROR_STATUS: i32 = 255;

//
// Public API
// Start with: SshConnector::new
//

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    #[default]
    NOLOG, // -q, not even warnings
    WARNING,   // ssh's default
    PROTOCOL,  // -v
    PACKET,    // -vv
    FUNCTIONS, // -vvv
}

impl LogLevel {
    fn flag(&self) -> Option<&'static str> {
        match self {
            LogLevel::NOLOG => Some("-q"),
            LogLevel::WARNING => None,
            LogLevel::PROTOCOL => Some("-v"),
            LogLevel::PACKET => Some("-vv"),
            LogLevel::FUNCTIONS => Some("-vvv"),
        }
    }
}

/// Opens channels to one host through the system `ssh` client. Authentication
/// must already work non-interactively (agent or keys); ssh is run in batch
/// mode so it never prompts.
#[derive(Debug, Clone)]
pub struct SshConnector {
    destination: String,
    program: String,
    port: Option<u16>,
    log_level: LogLevel,
}

impl SshConnector {
    // destination is [user@]host
    pub fn new(destination: &str) -> SshConnector {
        SshConnector {
            destination: destination.to_string(),
            program: DEFAULT_SSH.to_string(),
            port: None,
            log_level: LogLevel::default(),
        }
    }

    pub fn program(mut self, program: &str) -> Self {
        self.program = program.to_string();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn log_level(mut self, log_level: LogLevel) -> Self {
        self.log_level = log_level;
        self
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(flag) = self.log_level.flag() {
            cmd.arg(flag);
        }
        if let Some(port) = self.port {
            cmd.arg("-p").arg(port.to_string());
        }
        cmd.args(["-o", "BatchMode=yes", "-T"]);
        cmd.arg(&self.destination);
        cmd
    }
}

impl Connect for SshConnector {
    type Channel = SshChannel;

    fn open(&self) -> anyhow::Result<SshChannel> {
        Ok(SshChannel {
            command: self.command(),
        })
    }
}

/// One remote command over one ssh process.
pub struct SshChannel {
    command: Command,
}

impl SshChannel {
    pub fn args(&self) -> Vec<String> {
        self.command
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

impl Channel for SshChannel {
    fn run(mut self, cmd: &str, streams: Streams<'_>) -> anyhow::Result<ExitStatus> {
        // ssh joins everything after the destination into one remote command
        // line, so hand it over as a single argument
        self.command.arg("--").arg(cmd);
        match run_child(self.command, streams)? {
            ExitStatus::Exited(SSH_ERROR_STATUS) => {
                Err(anyhow!("ssh exited with status {SSH_ERROR_STATUS}"))
            }
            status => Ok(status),
        }
    }
}
