// src/queue.rs
use crate::types::{Candidate, SubprobeError};
use log::debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Notify};

#[derive(Debug, PartialEq, Eq)]
pub enum QueueItem {
    Candidate(Candidate),
    /// Tells the worker that pops it to exit.
    Shutdown,
}

#[derive(Debug, Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

/// Bounded candidate queue shared by the sources and every worker.
///
/// Besides the channel it counts candidates that were pushed but not yet
/// completed, so the engine knows when nothing is left that could still
/// produce more work.
#[derive(Debug, Clone)]
pub struct WorkQueue {
    tx: mpsc::Sender<QueueItem>,
    rx: Arc<Mutex<mpsc::Receiver<QueueItem>>>,
    in_flight: Arc<InFlight>,
}

impl WorkQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            in_flight: Arc::new(InFlight::default()),
        }
    }

    /// Push a candidate, waiting while the queue is full.
    pub async fn push(&self, candidate: Candidate) -> Result<(), SubprobeError> {
        self.in_flight.count.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(QueueItem::Candidate(candidate)).await.is_err() {
            self.complete();
            return Err(SubprobeError::ConfigError("work queue closed".to_string()));
        }
        Ok(())
    }

    /// Hand a candidate back to the queue without waiting. Used by workers,
    /// which must not block on a queue only they drain.
    pub fn requeue(&self, candidate: Candidate) {
        self.in_flight.count.fetch_add(1, Ordering::SeqCst);
        match self.tx.try_send(QueueItem::Candidate(candidate)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(item)) => {
                let queue = self.clone();
                tokio::spawn(async move {
                    if queue.tx.send(item).await.is_err() {
                        queue.complete();
                    }
                });
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Work queue closed, dropping requeued candidate");
                self.complete();
            }
        }
    }

    pub async fn pop(&self) -> Option<QueueItem> {
        let mut rx = self.rx.lock().await;
        rx.recv().await
    }

    /// Guard that completes one popped candidate when dropped, including
    /// when the worker unwinds.
    pub fn completion(&self) -> Completion<'_> {
        Completion { queue: self }
    }

    /// Mark one popped candidate as fully processed.
    pub fn complete(&self) {
        if self.in_flight.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.in_flight.idle.notify_waiters();
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.count.load(Ordering::SeqCst)
    }

    /// Wait until every pushed candidate has been completed.
    pub async fn wait_idle(&self) {
        loop {
            let idle = self.in_flight.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            idle.await;
        }
    }

    /// Push one shutdown sentinel per worker.
    pub async fn shutdown(&self, workers: usize) {
        for _ in 0..workers {
            if self.tx.send(QueueItem::Shutdown).await.is_err() {
                break;
            }
        }
    }
}

pub struct Completion<'a> {
    queue: &'a WorkQueue,
}

impl Drop for Completion<'_> {
    fn drop(&mut self) {
        self.queue.complete();
    }
}
