use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;

use crate::client::Connect;
use crate::remote::{Channel, ExitStatus, Streams};

/// Prints what would run instead of running it. Every command "succeeds".
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRun;

impl Channel for DryRun {
    fn run(self, cmd: &str, streams: Streams<'_>) -> anyhow::Result<ExitStatus> {
        println!("would run cmd '{cmd}'");
        if let Some(src) = streams.stdin {
            let n = io::copy(src, &mut io::sink())?;
            println!("would send {n} bytes to its stdin");
        }
        Ok(ExitStatus::Exited(0))
    }
}

impl Connect for DryRun {
    type Channel = DryRun;

    fn open(&self) -> anyhow::Result<DryRun> {
        Ok(DryRun)
    }
}

/// A channel that plays back a canned response, and remembers the command
/// and stdin it was given.
#[derive(Debug, Clone, Default)]
pub struct ScriptedChannel {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    status: Option<ExitStatus>,
    broken: Option<String>,
    log: Arc<Mutex<Vec<Recorded>>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub cmd: String,
    pub stdin: Vec<u8>,
}

impl ScriptedChannel {
    pub fn new() -> ScriptedChannel {
        ScriptedChannel::default()
    }

    pub fn stdout(mut self, out: &[u8]) -> Self {
        self.stdout = out.to_vec();
        self
    }

    pub fn stderr(mut self, err: &[u8]) -> Self {
        self.stderr = err.to_vec();
        self
    }

    pub fn exit(mut self, code: i32) -> Self {
        self.status = Some(ExitStatus::Exited(code));
        self
    }

    pub fn signal(mut self, sig: i32) -> Self {
        self.status = Some(ExitStatus::Signaled(sig));
        self
    }

    // stream the canned output, then fail like a dropped connection
    pub fn broken(mut self, msg: &str) -> Self {
        self.broken = Some(msg.to_string());
        self
    }

    /// Commands run so far by this channel and its clones.
    pub fn recorded(&self) -> Vec<Recorded> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }
}

impl Channel for ScriptedChannel {
    fn run(self, cmd: &str, streams: Streams<'_>) -> anyhow::Result<ExitStatus> {
        let mut stdin = Vec::new();
        if let Some(src) = streams.stdin {
            src.read_to_end(&mut stdin)?;
        }
        if let Ok(mut log) = self.log.lock() {
            log.push(Recorded {
                cmd: cmd.to_string(),
                stdin,
            });
        }
        streams.stdout.write_all(&self.stdout)?;
        streams.stderr.write_all(&self.stderr)?;
        if let Some(msg) = self.broken {
            return Err(anyhow!(msg));
        }
        Ok(self.status.unwrap_or(ExitStatus::Exited(0)))
    }
}

impl Connect for ScriptedChannel {
    type Channel = ScriptedChannel;

    fn open(&self) -> anyhow::Result<ScriptedChannel> {
        Ok(self.clone())
    }
}
