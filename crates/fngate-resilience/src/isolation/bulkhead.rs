//! Concurrency bulkheads.
//!
//! Both strategies bound in-flight calls with a tokio [`Semaphore`] and never
//! queue: a call that cannot get a permit immediately is rejected. They
//! differ in where the call runs.
//!
//! - [`IsolationStrategy::Semaphore`]: spawned on the caller's runtime.
//! - [`IsolationStrategy::ThreadPool`]: handed to a fixed set of named OS
//!   threads owned by the group, which drive the future to completion with
//!   the caller's runtime handle.
//!
//! The permit travels with the call and is released only when the call
//! really finishes, even if the caller stopped waiting long before.

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Sender, unbounded};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, oneshot};
use tracing::{debug, error};

use super::policy::{IsolationPolicy, IsolationStrategy};

/// Failure to hand a call over to its bulkhead.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("no tokio runtime available to drive the call")]
    NoRuntime,
    #[error("worker pool '{0}' has shut down")]
    PoolClosed(String),
}

/// Proof that a concurrency slot is reserved for one call.
#[derive(Debug)]
pub struct BulkheadPermit(OwnedSemaphorePermit);

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed set of named worker threads fed from an unbounded channel.
///
/// Admission is bounded by the bulkhead's semaphore, so the channel never
/// holds more jobs than there are idle workers.
#[derive(Debug)]
struct WorkerPool {
    name: String,
    sender: Sender<Job>,
}

impl WorkerPool {
    fn start(name: &str, size: u32) -> io::Result<Self> {
        let (sender, receiver) = unbounded::<Job>();
        for index in 0..size {
            let receiver = receiver.clone();
            thread::Builder::new()
                .name(format!("fngate-{name}-{index}"))
                .spawn(move || {
                    // Ends once every sender is dropped.
                    for job in receiver.iter() {
                        job();
                    }
                })?;
        }
        debug!(pool = %name, size, "started isolation worker pool");
        Ok(Self {
            name: name.to_string(),
            sender,
        })
    }

    fn submit(&self, job: Job) -> Result<(), SpawnError> {
        self.sender
            .send(job)
            .map_err(|_| SpawnError::PoolClosed(self.name.clone()))
    }
}

#[derive(Debug)]
enum Runner {
    Runtime,
    Workers(WorkerPool),
}

/// Concurrency limiter and task runner for one isolation group.
#[derive(Debug)]
pub struct Bulkhead {
    strategy: IsolationStrategy,
    capacity: u32,
    permits: Arc<Semaphore>,
    runner: Runner,
}

impl Bulkhead {
    /// Build the bulkhead described by `policy`.
    ///
    /// The thread-pool strategy starts its worker threads here.
    pub fn for_policy(group: &str, policy: &IsolationPolicy) -> io::Result<Self> {
        let runner = match policy.strategy {
            IsolationStrategy::Semaphore => Runner::Runtime,
            IsolationStrategy::ThreadPool => {
                Runner::Workers(WorkerPool::start(&pool_name(group), policy.max_concurrent)?)
            }
        };
        Ok(Self {
            strategy: policy.strategy,
            capacity: policy.max_concurrent,
            permits: Arc::new(Semaphore::new(policy.max_concurrent as usize)),
            runner,
        })
    }

    /// Reserve a slot without waiting.
    pub fn try_acquire(&self) -> Option<BulkheadPermit> {
        Arc::clone(&self.permits)
            .try_acquire_owned()
            .ok()
            .map(BulkheadPermit)
    }

    /// Start `call`, returning a receiver for its output.
    ///
    /// The receiver errors if the call panics.
    pub fn spawn<F>(
        &self,
        permit: BulkheadPermit,
        call: F,
    ) -> Result<oneshot::Receiver<F::Output>, SpawnError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let handle = Handle::try_current().map_err(|_| SpawnError::NoRuntime)?;
        let (tx, rx) = oneshot::channel();

        match &self.runner {
            Runner::Runtime => {
                handle.spawn(async move {
                    let output = call.await;
                    drop(permit);
                    let _ = tx.send(output);
                });
            }
            Runner::Workers(pool) => {
                let pool_name = pool.name.clone();
                pool.submit(Box::new(move || {
                    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                        handle.block_on(call)
                    }));
                    drop(permit);
                    match outcome {
                        Ok(output) => {
                            let _ = tx.send(output);
                        }
                        Err(_) => error!(pool = %pool_name, "isolated call panicked"),
                    }
                }))?;
            }
        }
        Ok(rx)
    }

    pub fn strategy(&self) -> IsolationStrategy {
        self.strategy
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}

fn pool_name(group: &str) -> String {
    // Thread names are for humans; keep the tail of long identifiers.
    let short = group.rsplit(':').next().unwrap_or(group);
    short
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}
