//! Future-like result handles for work posted to a worker.
//!
//! ```text
//!   Completer ──complete(v)──→ Shared { value, wakers } ──→ Completion (N clones)
//!                                                           wait() / wait_timeout()
//!                                                           .await
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::JobError;

struct State<T> {
    value: Option<Result<T, JobError>>,
    wakers: Vec<Waker>,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    ready: Condvar,
}

impl<T> Shared<T> {
    fn resolve(&self, value: Result<T, JobError>) {
        let wakers = {
            let mut state = self.state.lock();
            if state.value.is_some() {
                return;
            }
            state.value = Some(value);
            std::mem::take(&mut state.wakers)
        };
        self.ready.notify_all();
        for waker in wakers {
            waker.wake();
        }
    }
}

/// Shared, cloneable handle to the eventual result of a job.
///
/// Waiting never cancels the job; dropping every handle simply discards the
/// result.
pub struct Completion<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("ready", &self.shared.state.lock().value.is_some())
            .finish()
    }
}

/// Producing side of a [`Completion`].
///
/// Dropping it without completing resolves the completion with
/// [`JobError::Abandoned`].
pub struct Completer<T> {
    shared: Option<Arc<Shared<T>>>,
}

impl<T> Completer<T> {
    /// Resolve the completion with a value.
    pub fn complete(mut self, value: T) {
        if let Some(shared) = self.shared.take() {
            shared.resolve(Ok(value));
        }
    }

    /// Resolve the completion with a failure.
    pub fn fail(mut self, error: JobError) {
        if let Some(shared) = self.shared.take() {
            shared.resolve(Err(error));
        }
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.resolve(Err(JobError::Abandoned));
        }
    }
}

impl<T> Completion<T> {
    /// Create an unresolved completion and its producing side.
    #[must_use]
    pub fn pending() -> (Completer<T>, Self) {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                value: None,
                wakers: Vec::new(),
            }),
            ready: Condvar::new(),
        });
        (
            Completer {
                shared: Some(shared.clone()),
            },
            Self { shared },
        )
    }

    /// A completion that is already resolved.
    #[must_use]
    pub fn ready(value: Result<T, JobError>) -> Self {
        let (completer, completion) = Self::pending();
        match value {
            Ok(v) => completer.complete(v),
            Err(e) => completer.fail(e),
        }
        completion
    }

    /// True once a result is available.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.shared.state.lock().value.is_some()
    }
}

impl<T: Clone> Completion<T> {
    /// Block until the result is available.
    pub fn wait(&self) -> Result<T, JobError> {
        let mut state = self.shared.state.lock();
        loop {
            if let Some(value) = state.value.as_ref() {
                return value.clone();
            }
            self.shared.ready.wait(&mut state);
        }
    }

    /// Block until the result is available or the timeout elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<T, JobError>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        loop {
            if let Some(value) = state.value.as_ref() {
                return Some(value.clone());
            }
            if self.shared.ready.wait_until(&mut state, deadline).timed_out() {
                return state.value.clone();
            }
        }
    }

    /// The result if it is already available.
    #[must_use]
    pub fn try_get(&self) -> Option<Result<T, JobError>> {
        self.shared.state.lock().value.clone()
    }
}

impl<T: Clone> Future for Completion<T> {
    type Output = Result<T, JobError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.shared.state.lock();
        if let Some(value) = state.value.as_ref() {
            return Poll::Ready(value.clone());
        }
        if !state.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            state.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_ready_completion() {
        let completion = Completion::ready(Ok(7));
        assert!(completion.is_ready());
        assert_eq!(completion.wait(), Ok(7));
    }

    #[test]
    fn test_wait_across_threads() {
        let (completer, completion) = Completion::pending();
        let waiter = completion.clone();
        let handle = thread::spawn(move || waiter.wait());
        thread::sleep(Duration::from_millis(20));
        completer.complete("done");
        assert_eq!(handle.join().unwrap(), Ok("done"));
    }

    #[test]
    fn test_wait_timeout_expires() {
        let (_completer, completion) = Completion::<u32>::pending();
        assert_eq!(completion.wait_timeout(Duration::from_millis(10)), None);
        assert!(!completion.is_ready());
    }

    #[test]
    fn test_dropped_completer_abandons() {
        let (completer, completion) = Completion::<u32>::pending();
        drop(completer);
        assert_eq!(completion.wait(), Err(JobError::Abandoned));
    }

    #[tokio::test]
    async fn test_completion_is_a_future() {
        let (completer, completion) = Completion::pending();
        let task = tokio::spawn(completion);
        tokio::time::sleep(Duration::from_millis(10)).await;
        completer.complete(42u64);
        assert_eq!(task.await.unwrap(), Ok(42));
    }
}
