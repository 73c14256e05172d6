//! Fixed-size pool of worker threads

use crate::{
    query::ForwardProgressGuarantee,
    run_loop::{RunLoopScheduler, SynchronizedRunLoop},
};
use std::{
    fmt::{self, Debug, Formatter},
    io,
    num::NonZeroUsize,
    sync::Arc,
    thread::{self, JoinHandle},
};


const DEFAULT_NAME_PREFIX: &str = "sluice-worker";


/// Execution context of worker threads driving one shared [`SynchronizedRunLoop`]
///
/// Dropping the pool finishes the loop, lets the workers drain work already scheduled, and joins
/// them.
pub struct ThreadPool {
    run_loop: Arc<SynchronizedRunLoop>,
    workers: Vec<JoinHandle<()>>,
}

/// Builder for a [`ThreadPool`]
#[derive(Debug, Clone)]
pub struct ThreadPoolBuilder {
    workers: Option<usize>,
    name_prefix: String,
}

impl ThreadPool {
    /// Spawn a pool with `workers` threads
    pub fn new(workers: usize) -> io::Result<Self> {
        ThreadPool::builder().workers(workers).build()
    }

    /// Begin configuring a pool
    pub fn builder() -> ThreadPoolBuilder {
        ThreadPoolBuilder { workers: None, name_prefix: DEFAULT_NAME_PREFIX.to_owned() }
    }

    /// Get a scheduler which schedules onto the pool
    pub fn scheduler(&self) -> RunLoopScheduler {
        self.run_loop.scheduler_with(ForwardProgressGuarantee::Parallel)
    }

    /// Number of worker threads
    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    fn shut_down(&mut self) {
        self.run_loop.finish();
        for worker in self.workers.drain(..) {
            let name = worker.thread().name().map(str::to_owned);
            if worker.join().is_err() {
                warn!(?name, "thread pool worker panicked");
            }
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shut_down();
    }
}

impl Debug for ThreadPool {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("ThreadPool").field("workers", &self.workers.len()).finish()
    }
}

impl ThreadPoolBuilder {
    /// Number of worker threads, defaults to the available parallelism
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Prefix of worker thread names, which are suffixed with the worker index
    pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    /// Spawn the pool
    ///
    /// Errors if zero workers were requested or a thread could not be spawned.
    pub fn build(self) -> io::Result<ThreadPool> {
        let workers = match self.workers {
            Some(workers) => workers,
            None => thread::available_parallelism().map(NonZeroUsize::get).unwrap_or(1),
        };
        if workers == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "thread pool needs a worker"));
        }
        let mut pool = ThreadPool {
            run_loop: Arc::new(SynchronizedRunLoop::new()),
            workers: Vec::with_capacity(workers),
        };
        for index in 0..workers {
            let run_loop = Arc::clone(&pool.run_loop);
            let name = format!("{}-{}", self.name_prefix, index);
            // on error, dropping the pool shuts down the workers spawned so far
            let worker = thread::Builder::new()
                .name(name.clone())
                .spawn(move || {
                    debug!(%name, "thread pool worker starting");
                    run_loop.run();
                    debug!(%name, "thread pool worker exiting");
                })?;
            pool.workers.push(worker);
        }
        Ok(pool)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adaptors::{pipe, SenderExt},
        operation::OperationState,
        scheduler::{schedule, Scheduler},
        sender::connect,
        sync_wait::sync_wait,
        test_util::Recorder,
    };
    use std::{
        collections::HashSet,
        sync::Mutex,
        time::Duration,
    };

    #[test]
    fn runs_on_worker_thread() {
        let pool = ThreadPool::new(1).unwrap();
        let caller = thread::current().id();
        let worker = sync_wait(schedule(&pool.scheduler()) | pipe::then(|()| thread::current().id()))
            .unwrap()
            .unwrap();
        assert_ne!(worker, caller);
    }

    #[test]
    fn workers_are_named() {
        let pool = ThreadPool::builder().workers(2).name_prefix("test-pool").build().unwrap();
        assert_eq!(pool.workers(), 2);
        let name = sync_wait(
            pool.scheduler().schedule().then(|()| thread::current().name().map(str::to_owned))
        ).unwrap().unwrap().unwrap();
        assert!(name.starts_with("test-pool-"), "{}", name);
    }

    #[test]
    fn zero_workers_rejected() {
        let error = ThreadPool::new(0).unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn reports_parallel_progress() {
        let pool = ThreadPool::new(1).unwrap();
        assert_eq!(pool.scheduler().forward_progress_guarantee(), ForwardProgressGuarantee::Parallel);
        assert_eq!(pool.scheduler(), pool.scheduler());
    }

    #[test]
    fn drop_drains_pending_work() {
        let pool = ThreadPool::new(2).unwrap();
        let seen = Arc::new(Mutex::new(HashSet::new()));
        for i in 0..64 {
            let seen = Arc::clone(&seen);
            let sender = pool.scheduler().schedule().then(move |()| {
                thread::sleep(Duration::from_micros(50));
                seen.lock().unwrap().insert(i);
            });
            let (recorder, _recording) = Recorder::new();
            connect(sender, recorder).start();
        }
        drop(pool);
        assert_eq!(seen.lock().unwrap().len(), 64);
    }
}
