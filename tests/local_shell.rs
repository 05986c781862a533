//! The real command lines, run by a local `sh` in a scratch directory.

use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use rfs::command::{CommandLine, Op};
use rfs::executor::{execute, Bindings, OperationResult};
use rfs::manager::{run_all, Job};
use rfs::{Client, Error, LocalShell};
use rstest::rstest;
use tempfile::TempDir;

fn client(dir: &TempDir) -> Client<LocalShell> {
    Client::new(LocalShell::in_dir(dir.path()))
}

fn abs(dir: &TempDir, name: &str) -> String {
    dir.path().join(name).to_string_lossy().into_owned()
}

#[test]
fn test_write_then_read_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let c = client(&dir);
    let path = abs(&dir, "notes.txt");
    let content = b"line one\nline two\n\x00\xffbinary tail".to_vec();

    c.session()?.write_file(&path, &mut &content[..], 0o640)?;
    let mut back = Vec::new();
    c.session()?.read_file(&mut back, &path)?;
    assert_eq!(back, content);

    let mode = fs::metadata(&path)?.permissions().mode() & 0o777;
    assert_eq!(mode, 0o640);
    Ok(())
}

#[test]
fn test_write_replaces_existing_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let c = client(&dir);
    let path = abs(&dir, "f");
    fs::write(&path, "a much longer original body")?;

    c.session()?.write_file(&path, &mut &b"short"[..], 0o600)?;
    assert_eq!(fs::read(&path)?, b"short");
    Ok(())
}

#[test]
fn test_read_missing_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = abs(&dir, "missing");
    let mut dst = Vec::new();
    let err = client(&dir).session()?.read_file(&mut dst, &path).unwrap_err();
    let msg = err.to_string();
    assert!(msg.starts_with("cat: "), "{msg}");
    assert!(msg.ends_with(": process exited with status 1"), "{msg}");
    assert!(dst.is_empty());
    Ok(())
}

#[test]
fn test_mkdir_exists_remove() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let c = client(&dir);
    let sub = abs(&dir, "sub");

    assert!(!c.session()?.exists(&sub)?);
    c.session()?.mkdir(&sub, 0o750)?;
    assert!(c.session()?.exists(&sub)?);
    assert_eq!(fs::metadata(&sub)?.permissions().mode() & 0o777, 0o750);

    // mkdir on an existing directory fails
    assert!(c.session()?.mkdir(&sub, 0o750).is_err());

    // rm refuses directories
    assert!(matches!(c.session()?.remove(&sub), Err(Error::Remote { .. })));

    let file = abs(&dir, "sub/file");
    fs::write(&file, "x")?;
    c.session()?.remove(&file)?;
    assert!(!c.session()?.exists(&file)?);
    Ok(())
}

#[test]
fn test_remove_all_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let c = client(&dir);
    let tree = abs(&dir, "tree");
    fs::create_dir_all(dir.path().join("tree/a/b"))?;
    fs::write(dir.path().join("tree/a/b/leaf"), "x")?;

    c.session()?.remove_all(&tree)?;
    assert!(!c.session()?.exists(&tree)?);
    // again, now that it is gone
    c.session()?.remove_all(&tree)?;
    assert!(!c.session()?.exists(&tree)?);

    let never = abs(&dir, "never-existed");
    c.session()?.remove_all(&never)?;
    assert!(!c.session()?.exists(&never)?);
    Ok(())
}

#[test]
fn test_rename_and_copy() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let c = client(&dir);
    let a = abs(&dir, "a");
    let b = abs(&dir, "b");
    let d = abs(&dir, "d");
    fs::write(&a, "payload")?;

    c.session()?.copy(&a, &b)?;
    assert_eq!(fs::read_to_string(&a)?, "payload");
    assert_eq!(fs::read_to_string(&b)?, "payload");

    c.session()?.rename(&b, &d)?;
    assert!(!c.session()?.exists(&b)?);
    assert_eq!(fs::read_to_string(&d)?, "payload");
    Ok(())
}

#[test]
fn test_upload_download_keep_content_and_mode() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let c = client(&dir);
    let local = dir.path().join("local.sh");
    fs::write(&local, "#!/bin/sh\necho hi\n")?;
    fs::set_permissions(&local, fs::Permissions::from_mode(0o750))?;

    let remote = abs(&dir, "remote.sh");
    c.session()?.upload(&local, &remote)?;
    assert_eq!(fs::metadata(&remote)?.permissions().mode() & 0o777, 0o750);

    let fetched = dir.path().join("fetched.sh");
    c.session()?.download(&remote, &fetched)?;
    assert_eq!(fs::read(&fetched)?, fs::read(&local)?);
    Ok(())
}

#[test]
fn test_upload_missing_local_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let err = client(&dir)
        .session()?
        .upload(&dir.path().join("nope"), &abs(&dir, "x"))
        .unwrap_err();
    assert!(matches!(err, Error::Local { .. }));
    Ok(())
}

#[rstest]
#[case::present("exit 0", "success")]
#[case::absent("exit 1", "not found")]
#[case::permission_denied("exit 2", "failure")]
#[case::killed("kill -9 $$", "failure")]
fn test_probe_classification(#[case] script: &str, #[case] want: &str) {
    let cmd = CommandLine {
        text: script.to_string(),
        probe: true,
    };
    let got = match execute(LocalShell::new(), &cmd, Bindings::none()) {
        OperationResult::Success => "success",
        OperationResult::NotFound => "not found",
        OperationResult::Failure(_) => "failure",
    };
    assert_eq!(got, want);
}

#[test]
fn test_stderr_is_captured_with_large_stdout() {
    // enough output on both streams to fill the pipes if they were read in turn
    let cmd = CommandLine {
        text: "head -c 1000000 /dev/zero; head -c 200000 /dev/zero | tr '\\0' e >&2; exit 3"
            .to_string(),
        probe: false,
    };
    let mut out = Vec::new();
    match execute(LocalShell::new(), &cmd, Bindings::output(&mut out)) {
        OperationResult::Failure(Error::Remote { stderr, status }) => {
            assert_eq!(stderr.len(), 200_000);
            assert_eq!(status.code(), Some(3));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(out.len(), 1_000_000);
}

struct BrokenSink;

impl Write for BrokenSink {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "reader went away"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_failing_stdout_sink_is_transport_failure() {
    let cmd = CommandLine {
        text: "head -c 10000000 /dev/zero".to_string(),
        probe: false,
    };
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let res = execute(LocalShell::new(), &cmd, Bindings::output(&mut BrokenSink));
        let _ = tx.send(res);
    });
    match rx.recv_timeout(Duration::from_secs(30)) {
        Ok(OperationResult::Failure(Error::Transport { source, .. })) => {
            assert!(format!("{source:#}").contains("read stdout"), "{source:#}");
        }
        Ok(other) => panic!("unexpected {other:?}"),
        Err(_) => panic!("execute hung after its stdout sink failed"),
    }
}

#[test]
fn test_comment_path_is_refused_not_misread() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let c = client(&dir);
    assert!(matches!(
        c.session()?.exists("#never-created"),
        Err(Error::UnsafeArgument { .. })
    ));
    fs::create_dir(dir.path().join("keep"))?;
    assert!(c.session()?.remove_all("#x").is_err());
    assert!(dir.path().join("keep").exists());
    Ok(())
}

#[test]
fn test_manager_runs_jobs_in_order() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let mut jobs = Vec::new();
    for i in 0..8 {
        let p = abs(&dir, &format!("d{i}"));
        fs::create_dir(&p)?;
        jobs.push(Job::new(Op::RemoveRecursive { path: p }));
    }
    jobs.push(Job::new(Op::Exists {
        path: abs(&dir, "never-created"),
    }));
    jobs.push(Job {
        op: Op::WriteFile {
            path: abs(&dir, "w"),
            perm: 0o644,
        },
        input: b"from the pool".to_vec(),
    });

    let results = run_all(LocalShell::new(), None, 3, jobs.clone())?;
    assert_eq!(results.len(), jobs.len());
    for (job, res) in jobs.iter().zip(&results) {
        assert_eq!(&job.op, &res.op);
    }
    for res in &results[..8] {
        assert!(res.result.is_success(), "{:?}", res.result);
    }
    assert!(matches!(results[8].result, OperationResult::NotFound));
    assert!(results[9].result.is_success());
    assert_eq!(fs::read(dir.path().join("w"))?, b"from the pool");
    Ok(())
}
