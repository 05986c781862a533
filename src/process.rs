// Runs a local child process (ssh, sh) wired to a channel's streams.

use std::io::{self, ErrorKind, Write};
use std::process::{ChildStdout, Command, Stdio};
use std::thread;

use anyhow::{anyhow, Context};

use crate::remote::{ExitStatus, Streams};

// Spawn `command`, feed stdin and drain stderr on helper threads while this
// thread drains stdout, then wait for it to exit.
pub(crate) fn run_child(mut command: Command, streams: Streams<'_>) -> anyhow::Result<ExitStatus> {
    let Streams {
        stdin,
        stdout,
        stderr,
    } = streams;

    command
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let program = command.get_program().to_string_lossy().into_owned();
    let mut child = command
        .spawn()
        .with_context(|| format!("spawn {program}"))?;

    let child_stdin = child.stdin.take();
    let child_stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("{program}: stdout not captured"))?;
    let mut child_stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("{program}: stderr not captured"))?;

    let drained = thread::scope(|s| -> anyhow::Result<()> {
        let feeder = match (stdin, child_stdin) {
            (Some(src), Some(mut pipe)) => Some(s.spawn(move || {
                // pipe is dropped on return, which sends EOF
                match io::copy(src, &mut pipe) {
                    // the command may exit without reading all its input; its
                    // exit status says whether that was a failure
                    Err(err) if err.kind() == ErrorKind::BrokenPipe => Ok(()),
                    other => other.map(|_| ()),
                }
            })),
            _ => None,
        };
        let errs = s.spawn(move || io::copy(&mut child_stderr, stderr));

        let out = copy_out(child_stdout, stdout);
        if out.is_err() {
            // Nobody reads the child's stdout any more. Stop it so it can't
            // block on a full pipe and keep stderr open forever.
            let _ = child.kill();
        }
        let errs = errs
            .join()
            .map_err(|_| anyhow!("stderr reader panicked"))?
            .context("read stderr");
        if let Some(feeder) = feeder {
            feeder
                .join()
                .map_err(|_| anyhow!("stdin writer panicked"))?
                .context("write stdin")?;
        }
        out?;
        errs?;
        Ok(())
    });

    // reap the child even when a stream failed
    let status = child.wait().with_context(|| format!("wait for {program}"))?;
    drained?;
    Ok(status.into())
}

// The pipe is closed on return, so a child still writing gets EPIPE.
fn copy_out(mut src: ChildStdout, dst: &mut (dyn Write + Send)) -> anyhow::Result<u64> {
    io::copy(&mut src, dst).context("read stdout")
}
