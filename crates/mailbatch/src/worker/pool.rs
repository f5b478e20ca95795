use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use async_trait::async_trait;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{debug, error, info};

use crate::error::WorkerError;
use crate::mailbox::MailboxRef;
use crate::partition::BatchWindow;
use crate::progress::{ProgressReporter, WindowPhase, WindowProgressEvent};
use crate::sink::{EnqueueReceipt, QueueSink, SinkError, SinkProvider};
use crate::worker::job::{WindowJob, WindowResult};
use crate::worker::processor::WindowProcessor;

pub struct WindowWorkerPool {
    job_sender: Sender<WindowJob>,
    result_receiver: Receiver<WindowResult>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    progress: Arc<dyn ProgressReporter>,
}

impl WindowWorkerPool {
    /// Starts `worker_count` threads draining a queue of `queue_capacity` windows.
    pub fn new(
        processor: Arc<dyn WindowProcessor>,
        worker_count: usize,
        queue_capacity: usize,
        progress: Arc<dyn ProgressReporter>,
    ) -> Result<Self, WorkerError> {
        if worker_count == 0 {
            return Err(WorkerError::SpawnFailed(
                "worker_count must be greater than zero".to_string(),
            ));
        }

        let (job_sender, job_receiver) = bounded::<WindowJob>(queue_capacity.max(1));
        // Workers block once this many results are unread.
        let (result_sender, result_receiver) =
            bounded::<WindowResult>(queue_capacity.max(1) + worker_count);
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let result_tx = result_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_processor = Arc::clone(&processor);
            let worker_progress = Arc::clone(&progress);

            let handle = thread::Builder::new()
                .name(format!("mailbatch-worker-{}", worker_id))
                .spawn(move || {
                    run_worker(
                        worker_id,
                        job_rx,
                        result_tx,
                        shutdown_flag,
                        worker_processor,
                        worker_progress,
                    );
                })
                .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

            workers.push(handle);
        }

        info!("Started {} workers", worker_count);

        Ok(Self {
            job_sender,
            result_receiver,
            workers,
            shutdown,
            progress,
        })
    }

    /// Queues a job, blocking while the queue is full.
    pub fn submit(&self, job: WindowJob) -> Result<(), WorkerError> {
        if self.is_shutdown() {
            return Err(WorkerError::ChannelClosed);
        }

        self.progress
            .report(WindowProgressEvent::new(&job, WindowPhase::Queued));
        self.job_sender
            .send(job)
            .map_err(|_| WorkerError::ChannelClosed)
    }

    /// Queues a job without blocking.
    pub fn try_submit(&self, job: WindowJob) -> Result<(), WorkerError> {
        if self.is_shutdown() {
            return Err(WorkerError::ChannelClosed);
        }

        let event = WindowProgressEvent::new(&job, WindowPhase::Queued);
        self.job_sender.try_send(job).map_err(|e| match e {
            TrySendError::Full(_) => WorkerError::QueueFull,
            TrySendError::Disconnected(_) => WorkerError::ChannelClosed,
        })?;
        self.progress.report(event);
        Ok(())
    }

    pub fn recv_result(&self) -> Option<WindowResult> {
        self.result_receiver.recv().ok()
    }

    pub fn queued(&self) -> usize {
        self.job_sender.len()
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn wait(self) {
        // Drop sender to signal workers to exit
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

fn run_worker(
    worker_id: usize,
    job_receiver: Receiver<WindowJob>,
    result_sender: Sender<WindowResult>,
    shutdown: Arc<AtomicBool>,
    processor: Arc<dyn WindowProcessor>,
    progress: Arc<dyn ProgressReporter>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match job_receiver.recv_timeout(std::time::Duration::from_millis(100)) {
            Ok(job) => {
                debug!(
                    "Worker {} processing page {} of {}",
                    worker_id,
                    job.page_index(),
                    job.mailbox
                );
                progress.report(WindowProgressEvent::new(&job, WindowPhase::Processing));

                let result = match processor.process(&job) {
                    Ok(stored) => WindowResult::success(&job, stored),
                    Err(e) => {
                        error!("Page {} of {} failed: {}", job.page_index(), job.mailbox, e);
                        WindowResult::failure(&job, e.to_string())
                    }
                };
                progress.report(WindowProgressEvent::finished(&job, &result));

                if let Err(e) = result_sender.send(result) {
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

/// Sink that feeds one mailbox's windows into a shared worker pool.
pub struct PoolSink {
    pool: Arc<WindowWorkerPool>,
    mailbox: MailboxRef,
}

impl PoolSink {
    pub fn new(pool: Arc<WindowWorkerPool>, mailbox: MailboxRef) -> Self {
        Self { pool, mailbox }
    }
}

#[async_trait]
impl QueueSink for PoolSink {
    async fn enqueue(&self, window: BatchWindow) -> Result<EnqueueReceipt, SinkError> {
        let page_index = window.page_index;
        let job = WindowJob::new(self.mailbox.clone(), window);
        let receipt = EnqueueReceipt::new(job.id.clone(), page_index);

        self.pool.try_submit(job).map_err(|e| match e {
            WorkerError::QueueFull => SinkError::QueueFull { page_index },
            WorkerError::ChannelClosed => SinkError::Closed,
            other => SinkError::Rejected(other.to_string()),
        })?;

        Ok(receipt)
    }
}

impl SinkProvider for Arc<WindowWorkerPool> {
    fn sink_for(&self, mailbox: &MailboxRef) -> Box<dyn QueueSink> {
        Box::new(PoolSink::new(Arc::clone(self), mailbox.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessError;
    use crate::imap::ImapError;
    use crate::partition::MessageId;
    use crate::progress::{NoopProgress, WindowProgressBroadcaster};
    use std::sync::{Condvar, Mutex};
    use std::time::Duration;

    struct EchoProcessor;

    impl WindowProcessor for EchoProcessor {
        fn process(&self, job: &WindowJob) -> Result<Vec<MessageId>, ProcessError> {
            if job.window.member_ids.contains(&13) {
                return Err(ProcessError::Imap(ImapError::FolderNotFound("unlucky".to_string())));
            }
            Ok(job.window.member_ids.clone())
        }
    }

    /// Blocks every job until released, so the queue can be filled.
    #[derive(Default)]
    struct GateProcessor {
        open: Mutex<bool>,
        cond: Condvar,
    }

    impl GateProcessor {
        fn release(&self) {
            *self.open.lock().unwrap() = true;
            self.cond.notify_all();
        }
    }

    impl WindowProcessor for GateProcessor {
        fn process(&self, job: &WindowJob) -> Result<Vec<MessageId>, ProcessError> {
            let mut open = self.open.lock().unwrap();
            while !*open {
                open = self.cond.wait(open).unwrap();
            }
            Ok(job.window.member_ids.clone())
        }
    }

    fn window(page_index: usize, ids: Vec<MessageId>) -> BatchWindow {
        BatchWindow {
            page_index,
            skip_count: 0,
            start_offset: 0,
            end_offset: ids.len(),
            member_ids: ids,
        }
    }

    fn mailbox() -> MailboxRef {
        MailboxRef::new("inbox", "INBOX", 1)
    }

    #[test]
    fn test_worker_pool_creation() {
        let pool = WindowWorkerPool::new(Arc::new(EchoProcessor), 2, 4, Arc::new(NoopProgress)).unwrap();

        assert!(!pool.is_shutdown());

        pool.shutdown();
        assert!(pool.is_shutdown());

        pool.wait();
    }

    #[test]
    fn test_zero_workers_rejected() {
        let result = WindowWorkerPool::new(Arc::new(EchoProcessor), 0, 4, Arc::new(NoopProgress));
        assert!(matches!(result, Err(WorkerError::SpawnFailed(_))));
    }

    #[test]
    fn test_submit_and_collect_results() {
        let pool = WindowWorkerPool::new(Arc::new(EchoProcessor), 2, 4, Arc::new(NoopProgress)).unwrap();

        pool.submit(WindowJob::new(mailbox(), window(1, vec![1, 2]))).unwrap();
        pool.submit(WindowJob::new(mailbox(), window(2, vec![13]))).unwrap();

        let mut results = vec![pool.recv_result().unwrap(), pool.recv_result().unwrap()];
        results.sort_by_key(|r| r.page_index);

        assert!(results[0].success);
        assert_eq!(results[0].stored, vec![1, 2]);
        assert!(!results[1].success);
        assert!(results[1].error.as_deref().unwrap().contains("unlucky"));

        pool.shutdown();
        pool.wait();
    }

    #[test]
    fn test_submit_after_shutdown() {
        let pool = WindowWorkerPool::new(Arc::new(EchoProcessor), 1, 4, Arc::new(NoopProgress)).unwrap();
        pool.shutdown();

        let result = pool.submit(WindowJob::new(mailbox(), window(1, vec![1])));
        assert!(matches!(result, Err(WorkerError::ChannelClosed)));
        pool.wait();
    }

    #[test]
    fn test_progress_events_follow_lifecycle() {
        let broadcaster = WindowProgressBroadcaster::new(16);
        let mut events = broadcaster.subscribe();
        let pool = WindowWorkerPool::new(Arc::new(EchoProcessor), 1, 4, Arc::new(broadcaster)).unwrap();

        pool.submit(WindowJob::new(mailbox(), window(3, vec![7]))).unwrap();
        pool.recv_result().unwrap();

        let phases: Vec<WindowPhase> = (0..3).map(|_| events.try_recv().unwrap().phase).collect();
        assert_eq!(
            phases,
            vec![WindowPhase::Queued, WindowPhase::Processing, WindowPhase::Completed]
        );

        pool.shutdown();
        pool.wait();
    }

    #[tokio::test]
    async fn test_pool_sink_reports_full_queue() {
        let gate = Arc::new(GateProcessor::default());
        let pool = Arc::new(
            WindowWorkerPool::new(gate.clone(), 1, 1, Arc::new(NoopProgress)).unwrap(),
        );
        let sink = pool.sink_for(&mailbox());

        // First job is picked up by the worker and parks on the gate.
        sink.enqueue(window(1, vec![1])).await.unwrap();
        let mut waited = 0;
        while pool.queued() > 0 && waited < 50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            waited += 1;
        }

        sink.enqueue(window(2, vec![2])).await.unwrap();
        let err = sink.enqueue(window(3, vec![3])).await.unwrap_err();
        assert_eq!(err, SinkError::QueueFull { page_index: 3 });

        gate.release();
        assert!(pool.recv_result().unwrap().success);
        assert!(pool.recv_result().unwrap().success);

        pool.shutdown();
    }

    #[tokio::test]
    async fn test_pool_sink_closed_after_shutdown() {
        let pool = Arc::new(
            WindowWorkerPool::new(Arc::new(EchoProcessor), 1, 2, Arc::new(NoopProgress)).unwrap(),
        );
        pool.shutdown();

        let err = pool.sink_for(&mailbox()).enqueue(window(1, vec![1])).await.unwrap_err();
        assert_eq!(err, SinkError::Closed);
    }
}
