use std::env;
use std::io;
use std::path::Path;
use std::process;

use anyhow::{anyhow, Context};
use clap::{arg, ArgMatches};
use tracing::{debug, Level};

use rfs::executor::OperationResult;
use rfs::manager::{self, Job, DEFAULT_WORKERS};
use rfs::mock::DryRun;
use rfs::ssh::{LogLevel, DEFAULT_SSH};
use rfs::{Client, Connect, LocalShell, Op, SshConnector};

const DESC: &str = r#"Example: rfs --host deploy@web1 --as www-data put /srv/site/index.html < index.html
Every operation is one shell command on the remote host, run through ssh."#;

const DEFAULT_FILE_MODE: &str = "644";
const DEFAULT_DIR_MODE: &str = "755";

fn main() -> Result<(), anyhow::Error> {
    let args = clap::Command::new("rfs")
        .about(DESC)
        .arg(arg!(--host <DESTINATION> "Remote host as [user@]host").required(false))
        .arg(arg!(--"as" <USER> "Run every command as this user, via sudo").required(false))
        .arg(arg!(-p --port <PORT> "ssh port").required(false))
        .arg(
            arg!(--ssh <PROGRAM> "ssh client to run")
                .required(false)
                .default_value(DEFAULT_SSH),
        )
        .arg(
            arg!(-w --workers <N> "Concurrent channels for rm-all [default: 4]").required(false),
        )
        .arg(arg!(--local "Run on this host with sh instead of ssh").required(false))
        .arg(arg!(--"dry-run" "Show what we would do without doing it").required(false))
        .arg(arg!(-v --verbose "Debug level output").required(false))
        .subcommand_required(true)
        .subcommand(
            clap::Command::new("cat")
                .about("Print a remote file")
                .arg(arg!(<path> "Remote file")),
        )
        .subcommand(
            clap::Command::new("put")
                .about("Write stdin to a remote file")
                .arg(arg!(<path> "Remote file"))
                .arg(mode_arg(DEFAULT_FILE_MODE)),
        )
        .subcommand(
            clap::Command::new("upload")
                .about("Copy a local file to the remote host, keeping its mode")
                .arg(arg!(<src> "Local file"))
                .arg(arg!(<dst> "Remote file")),
        )
        .subcommand(
            clap::Command::new("download")
                .about("Copy a remote file to a local file")
                .arg(arg!(<src> "Remote file"))
                .arg(arg!(<dst> "Local file")),
        )
        .subcommand(
            clap::Command::new("mkdir")
                .about("Create a remote directory")
                .arg(arg!(<path> "Remote directory"))
                .arg(mode_arg(DEFAULT_DIR_MODE)),
        )
        .subcommand(
            clap::Command::new("rm")
                .about("Remove a remote file or empty directory")
                .arg(arg!(<path> "Remote path")),
        )
        .subcommand(
            clap::Command::new("rm-all")
                .about("Remove remote paths and everything under them")
                .arg(arg!(<paths> ... "Remote paths")),
        )
        .subcommand(
            clap::Command::new("exists")
                .about("Exit 0 if the remote path exists, 1 if it doesn't")
                .arg(arg!(<path> "Remote path")),
        )
        .subcommand(
            clap::Command::new("mv")
                .about("Move a remote path")
                .arg(arg!(<src> "Remote source"))
                .arg(arg!(<dst> "Remote destination")),
        )
        .subcommand(
            clap::Command::new("cp")
                .about("Copy a remote path")
                .arg(arg!(<src> "Remote source"))
                .arg(arg!(<dst> "Remote destination")),
        )
        .get_matches();

    let verbose = args.is_present("verbose");
    let is_dry_run = args.is_present("dry-run");
    let is_local = args.is_present("local");
    let num_workers: usize = args
        .value_of("workers")
        .map(str::parse::<usize>)
        .transpose()
        .context("--workers")?
        .unwrap_or(DEFAULT_WORKERS);
    let user = args.value_of("as");

    tracing_subscriber::fmt()
        .with_max_level(if verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(io::stderr)
        .init();

    let code = if is_dry_run {
        run(DryRun, user, num_workers, &args)?
    } else if is_local {
        run(LocalShell::new(), user, num_workers, &args)?
    } else {
        let host = args
            .value_of("host")
            .ok_or_else(|| anyhow!("--host is required unless --local or --dry-run"))?;
        let mut ssh = SshConnector::new(&destination(host))
            .program(args.value_of("ssh").unwrap_or(DEFAULT_SSH))
            .log_level(if verbose {
                LogLevel::WARNING
            } else {
                LogLevel::NOLOG
            });
        if let Some(port) = args.value_of("port") {
            ssh = ssh.port(port.parse::<u16>().context("--port")?);
        }
        debug!(destination = ssh.destination(), "using ssh");
        run(ssh, user, num_workers, &args)?
    };
    process::exit(code);
}

fn mode_arg(default: &'static str) -> clap::Arg<'static> {
    arg!(-m --mode <MODE> "Permission bits, octal")
        .required(false)
        .default_value(default)
}

// A destination without user@ gets $USER, like scp would use.
fn destination(host: &str) -> String {
    if host.contains('@') {
        return host.to_string();
    }
    match env::var("USER") {
        Ok(user) if !user.is_empty() => format!("{user}@{host}"),
        _ => host.to_string(),
    }
}

fn parse_mode(args: &ArgMatches) -> anyhow::Result<u32> {
    let mode = args.value_of("mode").unwrap_or(DEFAULT_FILE_MODE);
    u32::from_str_radix(mode, 8).with_context(|| format!("mode '{mode}' is not octal"))
}

// clap marks these required, so they are always present
fn required<'a>(args: &'a ArgMatches, name: &str) -> anyhow::Result<&'a str> {
    args.value_of(name)
        .ok_or_else(|| anyhow!("missing argument <{name}>"))
}

// Returns the process exit code.
fn run<T>(
    connector: T,
    user: Option<&str>,
    num_workers: usize,
    args: &ArgMatches,
) -> anyhow::Result<i32>
where
    T: Connect + Send + Sync + 'static,
{
    let (name, sub) = args
        .subcommand()
        .ok_or_else(|| anyhow!("no command given"))?;

    if name == "rm-all" {
        let paths: Vec<&str> = sub
            .values_of("paths")
            .map(|v| v.collect())
            .unwrap_or_default();
        let jobs = paths.iter().map(|p| {
            Job::new(Op::RemoveRecursive {
                path: p.to_string(),
            })
        });
        let mut code = 0;
        for done in manager::run_all(connector, user, num_workers, jobs)? {
            if let OperationResult::Failure(err) = done.result {
                eprintln!("rm-all {}: {err}", path_of(&done.op));
                code = 1;
            }
        }
        return Ok(code);
    }

    let client = Client::new(connector);
    let session = || -> anyhow::Result<_> {
        let session = client.session()?;
        Ok(match user {
            Some(user) => session.as_user(user),
            None => session,
        })
    };

    let done = match name {
        "cat" => session()?.read_file(&mut io::stdout(), required(sub, "path")?),
        "put" => {
            let mode = parse_mode(sub)?;
            session()?.write_file(required(sub, "path")?, &mut io::stdin(), mode)
        }
        "upload" => {
            let src = Path::new(required(sub, "src")?);
            session()?.upload(src, required(sub, "dst")?)
        }
        "download" => {
            let dst = Path::new(required(sub, "dst")?);
            session()?.download(required(sub, "src")?, dst)
        }
        "mkdir" => session()?.mkdir(required(sub, "path")?, parse_mode(sub)?),
        "rm" => session()?.remove(required(sub, "path")?),
        "mv" => session()?.rename(required(sub, "src")?, required(sub, "dst")?),
        "cp" => session()?.copy(required(sub, "src")?, required(sub, "dst")?),
        "exists" => {
            return match session()?.exists(required(sub, "path")?) {
                Ok(true) => Ok(0),
                Ok(false) => Ok(1),
                Err(err) => {
                    eprintln!("exists: {err}");
                    Ok(2)
                }
            };
        }
        other => return Err(anyhow!("unknown command {other}")),
    };
    match done {
        Ok(()) => Ok(0),
        Err(err) => {
            eprintln!("{name}: {err}");
            Ok(1)
        }
    }
}

fn path_of(op: &Op) -> &str {
    match op {
        Op::ReadFile { path }
        | Op::WriteFile { path, .. }
        | Op::MakeDirectory { path, .. }
        | Op::Remove { path }
        | Op::RemoveRecursive { path }
        | Op::Exists { path } => path,
        Op::Move { src, .. } | Op::Copy { src, .. } => src,
    }
}
