//! # Execution Workers
//!
//! Every component is bound to exactly one worker: a named FIFO queue drained
//! by a dedicated thread.
//!
//! | Caller | Behaviour |
//! |--------|-----------|
//! | another thread | job is enqueued, caller gets a [`Completion`] |
//! | the worker's own thread | job runs inline (no self-deadlock) |
//! | any thread, worker stopped | completion resolves as [`JobError::WorkerStopped`] |
//! | [`Worker::defer`] from anywhere | always enqueued behind pending work |
//!
//! A panicking job resolves its completion as failed; the worker keeps going.

pub mod completion;
pub mod registry;

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle, ThreadId};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error};

pub use completion::{Completer, Completion};
pub use registry::{WorkerRegistry, DEFAULT_WORKER};

use crate::error::{JobError, WorkerError};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A named execution queue on a dedicated thread.
pub struct Worker {
    name: String,
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
}

impl Worker {
    /// Spawn a worker thread named `conduit-<name>`.
    pub fn spawn(name: impl Into<String>) -> Result<Self, WorkerError> {
        let name = name.into();
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        let thread_name = format!("conduit-{}", name);
        let log_name = name.clone();

        let handle = thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                while let Some(job) = receiver.blocking_recv() {
                    job();
                }
                debug!(worker = %log_name, "Worker drained and exiting");
            })
            .map_err(|source| WorkerError::Spawn {
                name: name.clone(),
                source,
            })?;

        debug!(worker = %name, "Worker spawned");

        Ok(Self {
            name,
            thread_id: handle.thread().id(),
            sender: Mutex::new(Some(sender)),
            thread: Mutex::new(Some(handle)),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when called from this worker's own thread.
    #[must_use]
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// True until [`Worker::stop`] is called.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Run `job` on this worker and return a handle to its result.
    pub fn post<F, T>(&self, job: F) -> Completion<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.is_current() {
            return Completion::ready(run_guarded(&self.name, job));
        }

        let (completer, completion) = Completion::pending();
        let name = self.name.clone();
        let task: Job = Box::new(move || match run_guarded(&name, job) {
            Ok(value) => completer.complete(value),
            Err(e) => completer.fail(e),
        });

        if self.enqueue(task) {
            completion
        } else {
            Completion::ready(Err(JobError::WorkerStopped(self.name.clone())))
        }
    }

    /// Run `job` on this worker without tracking its result.
    ///
    /// Returns false when the worker is stopped and the job was dropped.
    pub fn execute<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_current() {
            let _ = run_guarded(&self.name, job);
            return true;
        }
        let name = self.name.clone();
        self.enqueue(Box::new(move || {
            let _ = run_guarded(&name, job);
        }))
    }

    /// Queue `job` behind everything already posted, even when called from
    /// this worker's own thread.
    ///
    /// Returns false when the worker is stopped and the job was dropped.
    pub fn defer<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let name = self.name.clone();
        self.enqueue(Box::new(move || {
            let _ = run_guarded(&name, job);
        }))
    }

    fn enqueue(&self, task: Job) -> bool {
        match self.sender.lock().as_ref() {
            Some(sender) => sender.send(task).is_ok(),
            None => false,
        }
    }

    /// Stop accepting work, let queued jobs finish and join the thread.
    ///
    /// Called from the worker's own thread, the thread is detached instead.
    pub fn stop(&self) {
        let sender = self.sender.lock().take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        let handle = self.thread.lock().take();
        if let Some(handle) = handle {
            if self.is_current() {
                return;
            }
            if handle.join().is_err() {
                error!(worker = %self.name, "Worker thread terminated abnormally");
            }
        }
        debug!(worker = %self.name, "Worker stopped");
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}

fn run_guarded<F, T>(worker: &str, job: F) -> Result<T, JobError>
where
    F: FnOnce() -> T,
{
    panic::catch_unwind(AssertUnwindSafe(job)).map_err(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        error!(worker = %worker, panic = %message, "Job panicked");
        JobError::Panicked(message)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_post_returns_result() {
        let worker = Worker::spawn("post").unwrap();
        let completion = worker.post(|| 2 + 3);
        assert_eq!(completion.wait(), Ok(5));
    }

    #[test]
    fn test_jobs_run_in_fifo_order() {
        let worker = Worker::spawn("fifo").unwrap();
        let seen = Arc::new(PlMutex::new(Vec::new()));
        let mut last = None;
        for i in 0..50 {
            let seen = seen.clone();
            last = Some(worker.post(move || seen.lock().push(i)));
        }
        last.unwrap().wait().unwrap();
        assert_eq!(*seen.lock(), (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_panic_does_not_kill_worker() {
        let worker = Worker::spawn("panics").unwrap();
        let failed = worker.post(|| -> u32 { panic!("boom") });
        assert!(matches!(failed.wait(), Err(JobError::Panicked(m)) if m.contains("boom")));
        assert_eq!(worker.post(|| 1).wait(), Ok(1));
    }

    #[test]
    fn test_post_from_own_thread_runs_inline() {
        let worker = Arc::new(Worker::spawn("inline").unwrap());
        let inner = worker.clone();
        let outer = worker.post(move || {
            let nested = inner.post(|| 10);
            assert!(nested.is_ready());
            nested.wait()
        });
        assert_eq!(
            outer.wait_timeout(Duration::from_secs(2)),
            Some(Ok(Ok(10)))
        );
    }

    #[test]
    fn test_post_to_stopped_worker_fails() {
        let worker = Worker::spawn("stopped").unwrap();
        worker.stop();
        assert!(!worker.is_running());
        assert_eq!(
            worker.post(|| 1).wait(),
            Err(JobError::WorkerStopped("stopped".to_string()))
        );
        assert!(!worker.execute(|| {}));
    }

    #[test]
    fn test_defer_from_own_thread_queues() {
        let worker = Arc::new(Worker::spawn("defer").unwrap());
        let order = Arc::new(PlMutex::new(Vec::new()));
        let (inner, log) = (worker.clone(), order.clone());
        let done = worker.post(move || {
            let deferred = log.clone();
            assert!(inner.defer(move || deferred.lock().push("deferred")));
            log.lock().push("body");
        });
        done.wait().unwrap();
        worker.post(|| ()).wait().unwrap();
        assert_eq!(*order.lock(), vec!["body", "deferred"]);
    }

    #[test]
    fn test_stop_drains_queued_jobs() {
        let worker = Worker::spawn("drain").unwrap();
        let count = Arc::new(PlMutex::new(0));
        for _ in 0..10 {
            let count = count.clone();
            worker.execute(move || *count.lock() += 1);
        }
        worker.stop();
        assert_eq!(*count.lock(), 10);
    }
}
