//! Executor - background workers that run operations off the caller's thread.
//!
//! Queued operations go to a single serial worker, so they run one at a time
//! in submission order. Concurrent operations go to a pool of
//! `worker_threads` workers sharing one job queue.
//!
//! Every submission returns an [`OperationHandle`]. Cancelling a handle stops
//! delivery of its result and skips the work if it has not started yet; a
//! write that already committed stays committed. A panicking operation
//! fails its own handle with `RequestError::Panicked`; the worker carries on.
//!
//! ## Example
//!
//! ```ignore
//! use storeflow::{Executor, OperationMode};
//!
//! let executor = Executor::new(2);
//! let handle = executor.submit(OperationMode::Concurrent, || Ok(40 + 2));
//! assert_eq!(handle.wait().unwrap(), 42);
//! ```

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Outcome, RequestError};
use crate::request::OperationMode;

/// Where a blocking call is being made from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionContext {
    /// A thread serving an interactive surface. Blocking work is refused here.
    Interactive,
    #[default]
    Background,
}

impl ExecutionContext {
    pub fn is_interactive(&self) -> bool {
        matches!(self, ExecutionContext::Interactive)
    }

    /// Fail fast when `operation` would block an interactive context.
    pub fn ensure_background(&self, operation: impl fmt::Display) -> Outcome<()> {
        if self.is_interactive() {
            return Err(RequestError::InteractiveContext(operation.to_string()));
        }
        Ok(())
    }
}

type Job = Box<dyn FnOnce() + Send + 'static>;

struct WorkerPool {
    name: &'static str,
    sender: Mutex<Option<Sender<Job>>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    fn spawn(name: &'static str, size: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..size.max(1))
            .map(|index| {
                let receiver = Arc::clone(&receiver);
                thread::Builder::new()
                    .name(format!("storeflow-{}-{}", name, index))
                    .spawn(move || loop {
                        let job = match receiver.lock() {
                            Ok(receiver) => receiver.recv(),
                            Err(_) => break,
                        };
                        match job {
                            Ok(job) => job(),
                            Err(_) => break,
                        }
                    })
            })
            .filter_map(|spawned| match spawned {
                Ok(handle) => Some(handle),
                Err(err) => {
                    warn!(pool = name, error = %err, "failed to spawn worker");
                    None
                }
            })
            .collect();

        Self {
            name,
            sender: Mutex::new(Some(sender)),
            workers,
        }
    }

    fn send(&self, job: Job) -> bool {
        match self.sender.lock() {
            Ok(sender) => sender.as_ref().is_some_and(|s| s.send(job).is_ok()),
            Err(_) => false,
        }
    }

    fn shutdown(&mut self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
        let current = thread::current().id();
        for worker in self.workers.drain(..) {
            if worker.thread().id() == current {
                continue;
            }
            if worker.join().is_err() {
                warn!(pool = self.name, "worker panicked");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Pools {
    serial: WorkerPool,
    concurrent: WorkerPool,
}

/// Runs submitted operations on background workers. Clone-friendly via Arc.
#[derive(Clone)]
pub struct Executor {
    pools: Arc<Pools>,
    worker_threads: usize,
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("worker_threads", &self.worker_threads)
            .finish()
    }
}

impl Executor {
    /// One serial worker plus `worker_threads` concurrent workers (at least one).
    pub fn new(worker_threads: usize) -> Self {
        let worker_threads = worker_threads.max(1);
        Self {
            pools: Arc::new(Pools {
                serial: WorkerPool::spawn("queued", 1),
                concurrent: WorkerPool::spawn("concurrent", worker_threads),
            }),
            worker_threads,
        }
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    /// Run `operation` on the worker matching `mode`.
    pub fn submit<T, F>(&self, mode: OperationMode, operation: F) -> OperationHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Outcome<T> + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);

        let job: Job = Box::new(move || {
            if flag.load(Ordering::SeqCst) {
                debug!("skipping cancelled operation");
                let _ = sender.send(Err(RequestError::Cancelled));
                return;
            }
            let outcome = panic::catch_unwind(AssertUnwindSafe(operation)).unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                warn!(panic = %message, "operation panicked");
                Err(RequestError::Panicked(message))
            });
            let _ = sender.send(outcome);
        });

        let pool = match mode {
            OperationMode::Queued => &self.pools.serial,
            OperationMode::Concurrent => &self.pools.concurrent,
        };
        if !pool.send(job) {
            warn!(pool = pool.name, "executor is shut down, operation dropped");
        }

        OperationHandle {
            receiver,
            cancelled,
        }
    }

    /// A handle that already holds `value`.
    pub fn ready<T>(value: Outcome<T>) -> OperationHandle<T> {
        let (sender, receiver) = mpsc::channel();
        let _ = sender.send(value);
        OperationHandle {
            receiver,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// The pending result of a submitted operation.
pub struct OperationHandle<T> {
    receiver: Receiver<Outcome<T>>,
    cancelled: Arc<AtomicBool>,
}

impl<T> fmt::Debug for OperationHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl<T> OperationHandle<T> {
    /// Block until the result arrives. A cancelled handle yields `Cancelled`.
    pub fn wait(self) -> Outcome<T> {
        if self.is_cancelled() {
            return Err(RequestError::Cancelled);
        }
        let delivered = self.receiver.recv().unwrap_or(Err(RequestError::Cancelled));
        if self.is_cancelled() {
            return Err(RequestError::Cancelled);
        }
        delivered
    }

    /// Like [`OperationHandle::wait`], giving up after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Outcome<T>> {
        if self.is_cancelled() {
            return Some(Err(RequestError::Cancelled));
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(_) if self.is_cancelled() => Some(Err(RequestError::Cancelled)),
            Ok(delivered) => Some(delivered),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(RequestError::Cancelled)),
        }
    }

    /// The result if it has arrived, without blocking.
    pub fn try_take(&self) -> Option<Outcome<T>> {
        if self.is_cancelled() {
            return Some(Err(RequestError::Cancelled));
        }
        match self.receiver.try_recv() {
            Ok(delivered) => Some(delivered),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(RequestError::Cancelled)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
