use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::{debug, error, info, warn};
use tokio::runtime::{Builder, Runtime};

use crate::error::WorkerError;
use crate::pipeline::BatchUploader;
use crate::source::{MessageFile, MessageSource};
use crate::worker::job::{AccountJob, AccountOutcome, WorkerEvent};

/// Fixed-size pool of OS threads, each running one account job at a time.
pub struct WorkerPool {
    job_sender: Sender<AccountJob>,
    event_receiver: Receiver<WorkerEvent>,
    workers: Vec<JoinHandle<()>>,
    abort: Arc<AtomicBool>,
}

/// Shared state every worker needs to process a job.
struct WorkerContext {
    source: Arc<MessageSource>,
    uploader: Arc<BatchUploader>,
    abort: Arc<AtomicBool>,
    events: Sender<WorkerEvent>,
}

impl WorkerPool {
    /// Starts `worker_count` workers.
    ///
    /// # Errors
    /// Returns `WorkerError::SpawnFailed` if `worker_count` is 0 or a thread
    /// cannot be spawned.
    pub fn new(
        source: Arc<MessageSource>,
        uploader: Arc<BatchUploader>,
        worker_count: usize,
    ) -> Result<Self, WorkerError> {
        if worker_count == 0 {
            return Err(WorkerError::SpawnFailed(
                "worker_count must be > 0".to_string(),
            ));
        }

        let (job_sender, job_receiver) = bounded::<AccountJob>(worker_count * 2);
        // Unbounded so a worker never blocks while the coordinator is busy
        // writing the ledger.
        let (event_sender, event_receiver) = unbounded::<WorkerEvent>();
        let abort = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let ctx = WorkerContext {
                source: Arc::clone(&source),
                uploader: Arc::clone(&uploader),
                abort: Arc::clone(&abort),
                events: event_sender.clone(),
            };

            let handle = thread::Builder::new()
                .name(format!("mailmigrate-worker-{}", worker_id))
                .spawn(move || run_worker(worker_id, job_rx, ctx))
                .map_err(|e| {
                    abort.store(true, Ordering::Relaxed);
                    WorkerError::SpawnFailed(e.to_string())
                })?;

            workers.push(handle);
        }

        info!("Started {} workers", worker_count);

        Ok(Self {
            job_sender,
            event_receiver,
            workers,
            abort,
        })
    }

    pub fn submit(&self, job: AccountJob) -> Result<(), WorkerError> {
        if self.is_aborted() {
            return Err(WorkerError::ChannelClosed);
        }

        self.job_sender
            .send(job)
            .map_err(|_| WorkerError::ChannelClosed)
    }

    /// Blocks until the next worker event. Returns `None` once every worker
    /// has stopped and all events were drained.
    pub fn recv_event(&self) -> Option<WorkerEvent> {
        self.event_receiver.recv().ok()
    }

    /// Workers finish their current batch, then stop taking work.
    pub fn abort(&self) {
        warn!("Aborting worker pool");
        self.abort.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }

    pub fn wait(self) {
        // Drop sender to signal workers to exit
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {}", i, panic_message(e.as_ref()));
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }
}

fn run_worker(worker_id: usize, job_receiver: Receiver<AccountJob>, ctx: WorkerContext) {
    debug!("Worker {} started", worker_id);

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| WorkerError::Runtime(e.to_string()));
    if let Err(e) = &runtime {
        error!("Worker {} has no async runtime: {}", worker_id, e);
    }

    loop {
        if ctx.abort.load(Ordering::Relaxed) {
            debug!("Worker {} received abort signal", worker_id);
            break;
        }

        match job_receiver.recv_timeout(std::time::Duration::from_millis(100)) {
            Ok(job) => {
                debug!("Worker {} processing account {}", worker_id, job.account_id());

                let outcome = match &runtime {
                    Ok(runtime) => {
                        let result =
                            panic::catch_unwind(AssertUnwindSafe(|| process_job(&job, runtime, &ctx)));
                        match result {
                            Ok(outcome) => outcome,
                            Err(payload) => {
                                let reason = panic_message(payload.as_ref());
                                error!("Account {} panicked: {}", job.account_id(), reason);
                                AccountOutcome::unexpected(job.account_id(), reason)
                            }
                        }
                    }
                    Err(e) => AccountOutcome::unexpected(job.account_id(), e.to_string()),
                };

                if let Err(e) = ctx.events.send(WorkerEvent::AccountFinished(outcome)) {
                    error!("Worker {} failed to send result: {}", worker_id, e);
                    break;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                debug!("Worker {} job channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}

fn process_job(job: &AccountJob, runtime: &Runtime, ctx: &WorkerContext) -> AccountOutcome {
    let account = job.account_id();

    let messages: Vec<MessageFile> = match ctx.source.pending(account, &job.imported) {
        Ok(pending) => pending.collect(),
        Err(e) => {
            error!("Cannot enumerate messages for {}: {}", account, e);
            return AccountOutcome::unexpected(account, e.to_string());
        }
    };

    let _ = ctx.events.send(WorkerEvent::AccountStarted {
        account: account.to_string(),
        pending: messages.len(),
    });

    runtime.block_on(ctx.uploader.upload(
        &job.account,
        messages,
        &ctx.abort,
        |report| {
            if ctx.events.send(WorkerEvent::BatchCompleted(report)).is_err() {
                ctx.abort.store(true, Ordering::Relaxed);
            }
        },
    ))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::config::Account;
    use crate::email::{
        EmailError, InternalDate, MailboxConnector, MailboxSession, MetadataReader,
    };
    use crate::pipeline::UploadConfig;

    struct AcceptAll;

    struct AcceptSession;

    #[async_trait]
    impl MailboxConnector for AcceptAll {
        async fn connect(
            &self,
            account: &Account,
            _folder: &str,
        ) -> Result<Box<dyn MailboxSession>, EmailError> {
            if account.identifier() == "panic@x.com" {
                panic!("connector exploded");
            }
            Ok(Box::new(AcceptSession))
        }
    }

    #[async_trait]
    impl MailboxSession for AcceptSession {
        async fn append(
            &mut self,
            _folder: &str,
            _flags: Option<&str>,
            _internal_date: &InternalDate,
            _content: &[u8],
        ) -> Result<(), EmailError> {
            Ok(())
        }

        async fn logout(&mut self) -> Result<(), EmailError> {
            Ok(())
        }
    }

    struct FixedDate;

    impl MetadataReader for FixedDate {
        fn internal_date(&self, _raw: &[u8]) -> Result<InternalDate, EmailError> {
            let date = chrono::DateTime::parse_from_rfc2822("Mon, 15 Jan 2024 10:30:00 +0200")
                .map_err(|e| EmailError::DateExtraction(e.to_string()))?;
            Ok(InternalDate::new(date))
        }
    }

    fn create_pool(temp_dir: &TempDir, workers: usize) -> WorkerPool {
        let source = Arc::new(MessageSource::new(temp_dir.path(), "*.eml").unwrap());
        let uploader = Arc::new(BatchUploader::new(
            Arc::new(UploadConfig::default()),
            Arc::new(AcceptAll),
            Arc::new(FixedDate),
        ));
        WorkerPool::new(source, uploader, workers).unwrap()
    }

    fn job(account: &str) -> AccountJob {
        AccountJob::new(Arc::new(Account::new(account, "secret")), Arc::new(HashSet::new()))
    }

    fn collect_outcomes(pool: &WorkerPool, expected: usize) -> Vec<AccountOutcome> {
        let mut outcomes = Vec::new();
        while outcomes.len() < expected {
            match pool.recv_event() {
                Some(WorkerEvent::AccountFinished(outcome)) => outcomes.push(outcome),
                Some(_) => {}
                None => break,
            }
        }
        outcomes
    }

    #[test]
    fn test_zero_workers_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let source = Arc::new(MessageSource::new(temp_dir.path(), "*.eml").unwrap());
        let uploader = Arc::new(BatchUploader::new(
            Arc::new(UploadConfig::default()),
            Arc::new(AcceptAll),
            Arc::new(FixedDate),
        ));

        let result = WorkerPool::new(source, uploader, 0);
        assert!(matches!(result, Err(WorkerError::SpawnFailed(_))));
    }

    #[test]
    fn test_processes_account_jobs() {
        let temp_dir = TempDir::new().unwrap();
        for account in ["a@x.com", "b@x.com"] {
            let dir = temp_dir.path().join(account);
            std::fs::create_dir(&dir).unwrap();
            std::fs::write(dir.join("1.eml"), b"Subject: hi\r\n\r\nbody").unwrap();
        }

        let pool = create_pool(&temp_dir, 2);
        pool.submit(job("a@x.com")).unwrap();
        pool.submit(job("b@x.com")).unwrap();

        let mut outcomes = collect_outcomes(&pool, 2);
        pool.wait();

        outcomes.sort_by(|a, b| a.account.cmp(&b.account));
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].imported, vec!["a@x.com/1.eml"]);
        assert_eq!(outcomes[1].imported, vec!["b@x.com/1.eml"]);
        assert!(outcomes.iter().all(AccountOutcome::is_complete));
    }

    #[test]
    fn test_panic_is_contained_to_its_account() {
        let temp_dir = TempDir::new().unwrap();
        for account in ["panic@x.com", "ok@x.com"] {
            let dir = temp_dir.path().join(account);
            std::fs::create_dir(&dir).unwrap();
            std::fs::write(dir.join("1.eml"), b"Subject: hi\r\n\r\nbody").unwrap();
        }

        let pool = create_pool(&temp_dir, 1);
        pool.submit(job("panic@x.com")).unwrap();
        pool.submit(job("ok@x.com")).unwrap();

        let outcomes = collect_outcomes(&pool, 2);
        pool.wait();

        let panicked = outcomes.iter().find(|o| o.account == "panic@x.com").unwrap();
        assert!(panicked.unexpected.as_deref().unwrap().contains("connector exploded"));
        let ok = outcomes.iter().find(|o| o.account == "ok@x.com").unwrap();
        assert!(ok.is_complete());
    }

    #[test]
    fn test_missing_directory_is_reported_as_unexpected() {
        let temp_dir = TempDir::new().unwrap();
        let pool = create_pool(&temp_dir, 1);
        pool.submit(job("gone@x.com")).unwrap();

        let outcomes = collect_outcomes(&pool, 1);
        pool.wait();

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].unexpected.is_some());
    }

    #[test]
    fn test_abort_rejects_new_jobs() {
        let temp_dir = TempDir::new().unwrap();
        let pool = create_pool(&temp_dir, 1);

        pool.abort();
        assert!(pool.is_aborted());
        assert!(matches!(pool.submit(job("a@x.com")), Err(WorkerError::ChannelClosed)));

        pool.wait();
    }
}
