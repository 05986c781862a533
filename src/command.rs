//! Renders filesystem operations as POSIX `sh` command lines.
//!
//! Nothing is quoted. Every path and user name is checked instead, and a value
//! the shell would split, expand, redirect or comment out, or that starts with
//! `-`, is refused with [`Error::UnsafeArgument`]. Glob characters are passed
//! through.

use crate::error::Error;

/// A filesystem operation. The data streams for `ReadFile` and `WriteFile` are
/// bound by the executor, not carried here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    ReadFile { path: String },
    WriteFile { path: String, perm: u32 },
    MakeDirectory { path: String, perm: u32 },
    Remove { path: String },
    RemoveRecursive { path: String },
    Exists { path: String },
    Move { src: String, dst: String },
    Copy { src: String, dst: String },
}

impl Op {
    /// Whether exit status 1 means "absent" rather than failure.
    pub fn is_probe(&self) -> bool {
        matches!(self, Op::Exists { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Op::ReadFile { .. } => "read_file",
            Op::WriteFile { .. } => "write_file",
            Op::MakeDirectory { .. } => "mkdir",
            Op::Remove { .. } => "remove",
            Op::RemoveRecursive { .. } => "remove_all",
            Op::Exists { .. } => "exists",
            Op::Move { .. } => "rename",
            Op::Copy { .. } => "copy",
        }
    }
}

/// A rendered command line, ready for a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub text: String,
    pub probe: bool,
}

/// Render `op` as a single command line, run as `user` when given.
pub fn build(op: &Op, user: Option<&str>) -> Result<CommandLine, Error> {
    if let Some(user) = user {
        check_word(user)?;
    }
    let segments: Vec<Vec<String>> = match op {
        Op::ReadFile { path } => {
            let path = check_word(path)?;
            vec![words(&["cat", path])]
        }
        Op::WriteFile { path, perm } => {
            let path = check_word(path)?;
            // Remove first so the file is created fresh, owned by whoever runs tee.
            vec![
                words(&["rm", "-f", path]),
                words(&["tee", path, ">", "/dev/null"]),
                chmod(*perm, path),
            ]
        }
        Op::MakeDirectory { path, perm } => {
            let path = check_word(path)?;
            vec![words(&["mkdir", path]), chmod(*perm, path)]
        }
        Op::Remove { path } => vec![words(&["rm", check_word(path)?])],
        Op::RemoveRecursive { path } => {
            vec![words(&["rm", "--recursive", "--force", check_word(path)?])]
        }
        Op::Exists { path } => vec![words(&["test", "-e", check_word(path)?])],
        Op::Move { src, dst } => vec![words(&["mv", check_word(src)?, check_word(dst)?])],
        Op::Copy { src, dst } => vec![words(&["cp", check_word(src)?, check_word(dst)?])],
    };
    Ok(CommandLine {
        text: join(&segments, user),
        probe: op.is_probe(),
    })
}

/// Join `&&` segments, giving each its own `sudo` so every step runs as `user`.
pub fn join(segments: &[Vec<String>], user: Option<&str>) -> String {
    segments
        .iter()
        .map(|seg| as_user(&seg.join(" "), user))
        .collect::<Vec<_>>()
        .join(" && ")
}

pub fn as_user(cmd: &str, user: Option<&str>) -> String {
    match user {
        Some(user) => format!("sudo --user={user} {cmd}"),
        None => cmd.to_string(),
    }
}

/// Reject anything the shell would not pass through as one literal-ish word,
/// or that a utility would read as an option.
pub fn check_word(value: &str) -> Result<&str, Error> {
    let found = match value.chars().next() {
        None => Some(' '),
        Some('-') => Some('-'),
        Some(_) => value.chars().find(|c| is_shell_special(*c)),
    };
    match found {
        Some(found) => Err(Error::UnsafeArgument {
            value: value.to_string(),
            found,
        }),
        None => Ok(value),
    }
}

// `#` opens a comment at the start of a word; it is refused anywhere.
const SHELL_SPECIAL: &[char] = &[
    ';', '&', '|', '<', '>', '$', '`', '\'', '"', '\\', '(', ')', '{', '}', '#',
];

fn is_shell_special(c: char) -> bool {
    c.is_whitespace() || c.is_control() || SHELL_SPECIAL.contains(&c)
}

fn words(w: &[&str]) -> Vec<String> {
    w.iter().map(|s| s.to_string()).collect()
}

// chmod takes octal; 0o644 must render as "644", not as its decimal value.
fn chmod(perm: u32, path: &str) -> Vec<String> {
    vec!["chmod".to_string(), format!("{perm:o}"), path.to_string()]
}
