use std::io::{Read, Write};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, warn};

use crate::client::Connect;
use crate::command::Op;
use crate::error::Error;
use crate::executor::{Bindings, OperationResult};
use crate::session::Session;

pub const DEFAULT_WORKERS: usize = 4;

/// One operation for the pool. `input` is sent as stdin, which only
/// `WriteFile` reads.
#[derive(Debug, Clone)]
pub struct Job {
    pub op: Op,
    pub input: Vec<u8>,
}

impl Job {
    pub fn new(op: Op) -> Job {
        Job {
            op,
            input: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct JobResult {
    pub op: Op,
    pub result: OperationResult,
    // what the command printed, e.g. the file for ReadFile
    pub output: Vec<u8>,
}

/// Runs operations concurrently. Each worker opens a fresh channel for every
/// operation; nothing is shared between them except the connector.
pub struct Manager {
    job_sender: Option<Sender<(usize, Job)>>,
    result_receiver: Receiver<(usize, JobResult)>,
    workers: Vec<thread::JoinHandle<()>>,
    // ops in submission order, to report jobs a dead worker never finished
    submitted: Vec<Op>,
}

impl Manager {
    pub fn new<T>(connector: T, user: Option<&str>, num_workers: usize) -> anyhow::Result<Manager>
    where
        T: Connect + Send + Sync + 'static,
    {
        let (job_sender, job_receiver) = unbounded::<(usize, Job)>();
        let (result_sender, result_receiver) = unbounded::<(usize, JobResult)>();
        let connector = Arc::new(connector);
        let user = user.map(str::to_string);

        let num_workers = num_workers.max(1);
        let mut workers = Vec::with_capacity(num_workers);
        for tid in 1..=num_workers {
            let connector = connector.clone();
            let user = user.clone();
            let job_receiver = job_receiver.clone();
            let result_sender = result_sender.clone();
            let thread_handle = thread::Builder::new()
                .name(format!("rfs_worker_{tid}"))
                .spawn(move || {
                    for (idx, job) in job_receiver {
                        let done = run_job(connector.as_ref(), user.as_deref(), job);
                        if result_sender.send((idx, done)).is_err() {
                            // manager is gone, nobody wants the rest
                            break;
                        }
                    }
                })?;
            workers.push(thread_handle);
        }

        Ok(Manager {
            job_sender: Some(job_sender),
            result_receiver,
            workers,
            submitted: Vec::new(),
        })
    }

    pub fn submit(&mut self, job: Job) -> anyhow::Result<()> {
        let sender = self
            .job_sender
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("manager already finished"))?;
        let op = job.op.clone();
        sender.send((self.submitted.len(), job))?;
        self.submitted.push(op);
        Ok(())
    }

    /// Wait for every submitted job. Results come back in submission order,
    /// one per job: a job lost with a panicked worker is reported as a
    /// transport failure.
    pub fn finish(mut self) -> Vec<JobResult> {
        drop(self.job_sender.take());
        for thread_handle in self.workers.drain(..) {
            if thread_handle.join().is_err() {
                warn!("worker panicked");
            }
        }
        let mut slots: Vec<Option<JobResult>> = self.submitted.iter().map(|_| None).collect();
        let mut finished = 0;
        for (idx, done) in self.result_receiver.try_iter() {
            if let Some(slot) = slots.get_mut(idx) {
                *slot = Some(done);
                finished += 1;
            }
        }
        if finished != self.submitted.len() {
            warn!(
                submitted = self.submitted.len(),
                finished,
                "some jobs did not finish"
            );
        }
        slots
            .into_iter()
            .zip(self.submitted)
            .map(|(slot, op)| slot.unwrap_or_else(|| lost(op)))
            .collect()
    }
}

/// Run `jobs` on `num_workers` threads and wait for all of them.
pub fn run_all<T>(
    connector: T,
    user: Option<&str>,
    num_workers: usize,
    jobs: impl IntoIterator<Item = Job>,
) -> anyhow::Result<Vec<JobResult>>
where
    T: Connect + Send + Sync + 'static,
{
    let mut manager = Manager::new(connector, user, num_workers)?;
    for job in jobs {
        manager.submit(job)?;
    }
    Ok(manager.finish())
}

fn lost(op: Op) -> JobResult {
    JobResult {
        op,
        result: OperationResult::Failure(Error::transport(
            &[],
            anyhow::anyhow!("worker stopped before finishing this job"),
        )),
        output: Vec::new(),
    }
}

fn run_job<T: Connect>(connector: &T, user: Option<&str>, job: Job) -> JobResult {
    let Job { op, input } = job;
    let mut output = Vec::new();
    debug!(op = op.name(), "worker picked up job");
    let result = match connector.open() {
        Ok(channel) => {
            let mut session = Session::new(channel);
            if let Some(user) = user {
                session = session.as_user(user);
            }
            let mut reader: &[u8] = &input;
            let stdin: Option<&mut (dyn Read + Send)> = match op {
                Op::WriteFile { .. } => Some(&mut reader),
                _ => None,
            };
            let io = Bindings {
                stdin,
                stdout: Some(&mut output as &mut (dyn Write + Send)),
            };
            session.run(&op, io)
        }
        Err(source) => OperationResult::Failure(Error::transport(&[], source)),
    };
    JobResult { op, result, output }
}
