use crate::config::QueueConfig;
use crate::error::{PaymentError, Result};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A concurrency-limited job runner.
///
/// Jobs start in submission order and at most `concurrency` of them run at
/// once. Each job runs in its own task, so a panicking job only takes itself
/// down. Call [`WorkQueue::shutdown`] to stop intake and wait for every
/// queued and running job to finish.
pub struct WorkQueue {
    handle: QueueHandle,
    shutdown: oneshot::Sender<()>,
    dispatcher: JoinHandle<()>,
}

/// Cheap, cloneable submission side of a [`WorkQueue`].
#[derive(Clone)]
pub struct QueueHandle {
    sender: mpsc::UnboundedSender<Job>,
}

impl QueueHandle {
    /// Schedules `job` and returns immediately.
    ///
    /// The closure is only invoked once a slot is free. Fails with
    /// `PaymentError::QueueClosed` after shutdown has begun.
    pub fn submit<F, Fut>(&self, job: F) -> Result<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let job: Job = Box::pin(async move { job().await });
        self.sender
            .send(job)
            .map_err(|_| PaymentError::QueueClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl WorkQueue {
    /// Spawns the dispatcher. Must be called from within a tokio runtime.
    pub fn start(config: &QueueConfig) -> Self {
        let concurrency = config.concurrency.max(1);
        let (sender, jobs) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = oneshot::channel();
        let dispatcher = tokio::spawn(dispatch(jobs, shutdown_rx, concurrency));

        info!(concurrency, "Work queue started");
        Self {
            handle: QueueHandle { sender },
            shutdown,
            dispatcher,
        }
    }

    pub fn handle(&self) -> QueueHandle {
        self.handle.clone()
    }

    /// Stops accepting jobs, drains the backlog and waits for in-flight jobs.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(());
        self.dispatcher
            .await
            .map_err(|e| PaymentError::InternalError(Box::new(e)))?;
        info!("Work queue drained");
        Ok(())
    }
}

async fn dispatch(
    mut jobs: mpsc::UnboundedReceiver<Job>,
    mut shutdown: oneshot::Receiver<()>,
    concurrency: usize,
) {
    let slots = Arc::new(Semaphore::new(concurrency));
    let mut running = JoinSet::new();
    let mut closing = false;

    loop {
        tokio::select! {
            biased;

            // A dropped `WorkQueue` counts as a shutdown request too
            _ = &mut shutdown, if !closing => {
                debug!("Work queue closing, draining remaining jobs");
                jobs.close();
                closing = true;
            }
            Some(result) = running.join_next(), if !running.is_empty() => {
                report(result);
            }
            job = jobs.recv() => {
                let Some(job) = job else { break };
                let Ok(permit) = Arc::clone(&slots).acquire_owned().await else {
                    break;
                };
                running.spawn(async move {
                    job.await;
                    drop(permit);
                });
            }
        }
    }

    while let Some(result) = running.join_next().await {
        report(result);
    }
}

fn report(result: std::result::Result<(), JoinError>) {
    match result {
        Ok(()) => {}
        Err(e) if e.is_panic() => error!("Queued job panicked: {}", e),
        Err(e) => warn!("Queued job was cancelled: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn queue(concurrency: usize) -> WorkQueue {
        WorkQueue::start(&QueueConfig { concurrency })
    }

    #[tokio::test]
    async fn test_running_jobs_never_exceed_concurrency() {
        let queue = queue(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let running = running.clone();
            let peak = peak.clone();
            let finished = finished.clone();
            queue
                .handle()
                .submit(move || async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    finished.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }

        queue.shutdown().await.unwrap();
        assert_eq!(finished.load(Ordering::SeqCst), 10);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_jobs_start_in_submission_order() {
        let queue = queue(1);
        let started = Arc::new(Mutex::new(Vec::new()));

        for i in 0..10 {
            let started = started.clone();
            queue
                .handle()
                .submit(move || async move {
                    started.lock().unwrap().push(i);
                    tokio::task::yield_now().await;
                })
                .unwrap();
        }

        queue.shutdown().await.unwrap();
        assert_eq!(*started.lock().unwrap(), (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_panicking_job_does_not_stop_the_queue() {
        let queue = queue(2);
        let finished = Arc::new(AtomicUsize::new(0));

        queue
            .handle()
            .submit(|| async { panic!("settlement exploded") })
            .unwrap();
        for _ in 0..5 {
            let finished = finished.clone();
            queue
                .handle()
                .submit(move || async move {
                    finished.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }

        queue.shutdown().await.unwrap();
        assert_eq!(finished.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_submit_does_not_wait_for_jobs() {
        let queue = queue(1);
        let gate = Arc::new(Semaphore::new(0));
        let finished = Arc::new(AtomicUsize::new(0));

        // None of these can finish until the gate opens, yet every submit returns.
        for _ in 0..3 {
            let gate = gate.clone();
            let finished = finished.clone();
            queue
                .handle()
                .submit(move || async move {
                    let _permit = gate.acquire().await.unwrap();
                    finished.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        gate.add_permits(3);
        queue.shutdown().await.unwrap();
        assert_eq!(finished.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_rejected() {
        let queue = queue(2);
        let handle = queue.handle();
        queue.shutdown().await.unwrap();

        assert!(handle.is_closed());
        assert!(matches!(
            handle.submit(|| async {}),
            Err(PaymentError::QueueClosed)
        ));
    }
}
