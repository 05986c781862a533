use std::io::{self, Read, Write};

use tracing::{debug, warn};

use crate::command::CommandLine;
use crate::error::Error;
use crate::remote::{Channel, ExitStatus, Streams};

// Exit status of `test -e` for a path that isn't there.
const ABSENT_STATUS: i32 = 1;

/// How a single operation ended.
#[derive(Debug)]
pub enum OperationResult {
    Success,
    NotFound,
    Failure(Error),
}

impl OperationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, OperationResult::Success)
    }

    /// For operations where absence isn't a separate answer.
    pub fn into_result(self) -> Result<(), Error> {
        match self {
            OperationResult::Success | OperationResult::NotFound => Ok(()),
            OperationResult::Failure(err) => Err(err),
        }
    }

    /// For existence probes: present, absent, or failed.
    pub fn into_exists(self) -> Result<bool, Error> {
        match self {
            OperationResult::Success => Ok(true),
            OperationResult::NotFound => Ok(false),
            OperationResult::Failure(err) => Err(err),
        }
    }
}

/// The operation's data streams. `stdout` None means discard the output.
#[derive(Default)]
pub struct Bindings<'a> {
    pub stdin: Option<&'a mut (dyn Read + Send)>,
    pub stdout: Option<&'a mut (dyn Write + Send)>,
}

impl<'a> Bindings<'a> {
    pub fn none() -> Self {
        Bindings::default()
    }

    pub fn input(src: &'a mut (dyn Read + Send)) -> Self {
        Bindings {
            stdin: Some(src),
            stdout: None,
        }
    }

    pub fn output(dst: &'a mut (dyn Write + Send)) -> Self {
        Bindings {
            stdin: None,
            stdout: Some(dst),
        }
    }
}

/// Run `cmd` on `channel` and classify the outcome.
///
/// The channel is consumed. Stdout and stderr have both been read to the end
/// by the time this returns. Stderr is kept in memory so a failure can say why
/// the command failed, not only its exit status.
pub fn execute<C: Channel>(channel: C, cmd: &CommandLine, io: Bindings<'_>) -> OperationResult {
    let mut errbuf: Vec<u8> = Vec::new();
    let mut discard = io::sink();
    let stdout: &mut (dyn Write + Send) = match io.stdout {
        Some(dst) => dst,
        None => &mut discard,
    };

    debug!(cmd = %cmd.text, "running");
    let ran = channel.run(
        &cmd.text,
        Streams {
            stdin: io.stdin.map(|src| src as &mut (dyn Read + Send)),
            stdout,
            stderr: &mut errbuf,
        },
    );

    let result = match ran {
        Ok(status) => classify(cmd, status, errbuf),
        Err(source) => {
            warn!(cmd = %cmd.text, "channel failed: {source:#}");
            OperationResult::Failure(Error::transport(&errbuf, source))
        }
    };
    debug!(cmd = %cmd.text, ?result, "done");
    result
}

fn classify(cmd: &CommandLine, status: ExitStatus, stderr: Vec<u8>) -> OperationResult {
    if status.success() {
        return OperationResult::Success;
    }
    if cmd.probe && status.code() == Some(ABSENT_STATUS) {
        return OperationResult::NotFound;
    }
    OperationResult::Failure(Error::Remote {
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        status,
    })
}
