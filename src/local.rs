use std::path::PathBuf;
use std::process::Command;

use crate::client::Connect;
use crate::process::run_child;
use crate::remote::{Channel, ExitStatus, Streams};

/// Runs commands with `sh -c` on this host. Useful when the "remote" host is
/// the local one, and for exercising the real command lines in tests.
#[derive(Debug, Clone, Default)]
pub struct LocalShell {
    dir: Option<PathBuf>,
}

impl LocalShell {
    pub fn new() -> LocalShell {
        LocalShell::default()
    }

    // relative paths resolve against dir
    pub fn in_dir(dir: impl Into<PathBuf>) -> LocalShell {
        LocalShell {
            dir: Some(dir.into()),
        }
    }
}

impl Channel for LocalShell {
    fn run(self, cmd: &str, streams: Streams<'_>) -> anyhow::Result<ExitStatus> {
        let mut command = Command::new("sh");
        command.arg("-c").arg(cmd);
        if let Some(dir) = &self.dir {
            command.current_dir(dir);
        }
        run_child(command, streams)
    }
}

impl Connect for LocalShell {
    type Channel = LocalShell;

    fn open(&self) -> anyhow::Result<LocalShell> {
        Ok(self.clone())
    }
}
