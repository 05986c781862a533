use std::fs;
use std::io::{Read, Write};
use std::path::Path;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use crate::command::{self, Op};
use crate::error::Error;
use crate::executor::{execute, Bindings, OperationResult};
use crate::remote::Channel;

/// Filesystem operations over one channel.
///
/// A session runs exactly one operation: every method takes `self`. Open a new
/// one (see [`crate::client::Client::session`]) for the next operation.
pub struct Session<C> {
    channel: C,
    user: Option<String>,
}

impl<C: Channel> Session<C> {
    pub fn new(channel: C) -> Session<C> {
        Session {
            channel,
            user: None,
        }
    }

    /// Run the operation as `user` on the remote host, via sudo.
    pub fn as_user(mut self, user: &str) -> Self {
        self.user = Some(user.to_string());
        self
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Build and run `op`, with its data streams bound as given.
    pub fn run(self, op: &Op, io: Bindings<'_>) -> OperationResult {
        match command::build(op, self.user.as_deref()) {
            Ok(cmd) => execute(self.channel, &cmd, io),
            Err(err) => OperationResult::Failure(err),
        }
    }

    /// Stream the remote file into `dst`.
    pub fn read_file(self, dst: &mut (dyn Write + Send), path: &str) -> Result<(), Error> {
        let op = Op::ReadFile {
            path: path.to_string(),
        };
        self.run(&op, Bindings::output(dst)).into_result()
    }

    /// Replace the remote file with the contents of `src`, then set its mode.
    /// The file is removed first, so it ends up owned by whoever runs the
    /// command.
    pub fn write_file(
        self,
        path: &str,
        src: &mut (dyn Read + Send),
        perm: u32,
    ) -> Result<(), Error> {
        let op = Op::WriteFile {
            path: path.to_string(),
            perm,
        };
        self.run(&op, Bindings::input(src)).into_result()
    }

    /// Create a directory with the given permission bits (before umask). The
    /// parent must exist.
    pub fn mkdir(self, path: &str, perm: u32) -> Result<(), Error> {
        let op = Op::MakeDirectory {
            path: path.to_string(),
            perm,
        };
        self.run(&op, Bindings::none()).into_result()
    }

    /// Remove a file or empty directory.
    pub fn remove(self, path: &str) -> Result<(), Error> {
        let op = Op::Remove {
            path: path.to_string(),
        };
        self.run(&op, Bindings::none()).into_result()
    }

    /// Remove `path` and everything under it. Removes what it can and reports
    /// the first error. A path that doesn't exist is not an error.
    pub fn remove_all(self, path: &str) -> Result<(), Error> {
        let op = Op::RemoveRecursive {
            path: path.to_string(),
        };
        self.run(&op, Bindings::none()).into_result()
    }

    pub fn exists(self, path: &str) -> Result<bool, Error> {
        let op = Op::Exists {
            path: path.to_string(),
        };
        self.run(&op, Bindings::none()).into_exists()
    }

    /// Move `src` to `dst` with `mv` semantics.
    pub fn rename(self, src: &str, dst: &str) -> Result<(), Error> {
        let op = Op::Move {
            src: src.to_string(),
            dst: dst.to_string(),
        };
        self.run(&op, Bindings::none()).into_result()
    }

    /// Copy `src` to `dst` with `cp` semantics.
    pub fn copy(self, src: &str, dst: &str) -> Result<(), Error> {
        let op = Op::Copy {
            src: src.to_string(),
            dst: dst.to_string(),
        };
        self.run(&op, Bindings::none()).into_result()
    }

    /// Run an arbitrary command line and return what it printed. The command
    /// is sent as is, only the impersonation prefix is added.
    pub fn output(self, cmd: &str) -> Result<String, Error> {
        if let Some(user) = self.user.as_deref() {
            command::check_word(user)?;
        }
        let line = command::CommandLine {
            text: command::as_user(cmd, self.user.as_deref()),
            probe: false,
        };
        let mut out = Vec::new();
        execute(self.channel, &line, Bindings::output(&mut out)).into_result()?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Upload a local file, keeping its permission bits.
    pub fn upload(self, src: &Path, dst: &str) -> Result<(), Error> {
        let local = |source: std::io::Error| Error::Local {
            path: src.to_path_buf(),
            source,
        };
        let mut file = fs::File::open(src).map_err(local)?;
        let perm = local_mode(&file).map_err(local)?;
        self.write_file(dst, &mut file, perm)
    }

    /// Download a remote file to a new local file. The local file is left
    /// behind, possibly partial, if the read fails.
    pub fn download(self, src: &str, dst: &Path) -> Result<(), Error> {
        let local = |source: std::io::Error| Error::Local {
            path: dst.to_path_buf(),
            source,
        };
        let mut file = fs::File::create(dst).map_err(local)?;
        self.read_file(&mut file, src)?;
        file.flush().map_err(local)
    }
}

#[cfg(unix)]
fn local_mode(file: &fs::File) -> std::io::Result<u32> {
    Ok(file.metadata()?.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn local_mode(_file: &fs::File) -> std::io::Result<u32> {
    Ok(0o644)
}
