//! Process lifecycle supervision
//!
//! Every long-lived collaborator (capture device, transport, resolver)
//! registers a [`Closer`] with the [`Supervisor`] while it starts up. On
//! shutdown the supervisor tears them down once, in registration order, and
//! fires a [`ShutdownSignal`] that every current and future waiter observes.
//!
//! State machine: `Running -> Closed`, terminal. The transition is claimed
//! with a single atomic compare-and-swap, so concurrent `close()` calls run
//! the teardown sequence exactly once.

use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// A resource that must be released on shutdown
#[cfg_attr(test, mockall::automock)]
pub trait Closer: Send {
    /// Name used in logs and reports
    fn name(&self) -> &str;

    /// Release the resource
    fn close(&mut self) -> anyhow::Result<()>;
}

/// [`Closer`] backed by a closure, see [`closer_fn`]
pub struct FnCloser<F> {
    name: String,
    f: Option<F>,
}

/// Wrap a one-shot closure as a [`Closer`]
pub fn closer_fn<F>(name: impl Into<String>, f: F) -> FnCloser<F>
where
    F: FnOnce() -> anyhow::Result<()> + Send,
{
    FnCloser {
        name: name.into(),
        f: Some(f),
    }
}

impl<F> Closer for FnCloser<F>
where
    F: FnOnce() -> anyhow::Result<()> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn close(&mut self) -> anyhow::Result<()> {
        match self.f.take() {
            Some(f) => f(),
            None => Ok(()),
        }
    }
}

/// One-shot broadcast event fired when the supervisor closes
///
/// Cloning yields another handle to the same event. Waiting before or after
/// the event fires is equally safe; the event is never consumed.
#[derive(Clone, Default)]
pub struct ShutdownSignal {
    inner: Arc<SignalInner>,
}

#[derive(Default)]
struct SignalInner {
    fired: AtomicBool,
    lock: Mutex<bool>,
    cond: Condvar,
    notify: Notify,
}

impl fmt::Debug for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownSignal")
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl ShutdownSignal {
    fn fire(&self) {
        {
            let mut fired = self.inner.lock.lock();
            *fired = true;
            self.inner.fired.store(true, Ordering::Release);
            self.inner.cond.notify_all();
        }
        self.inner.notify.notify_waiters();
    }

    /// Check whether shutdown has completed
    pub fn is_closed(&self) -> bool {
        self.inner.fired.load(Ordering::Acquire)
    }

    /// Block the current thread until shutdown completes
    pub fn wait(&self) {
        let mut fired = self.inner.lock.lock();
        while !*fired {
            self.inner.cond.wait(&mut fired);
        }
    }

    /// Block for at most `timeout`; returns whether shutdown completed
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut fired = self.inner.lock.lock();
        self.inner
            .cond
            .wait_while_for(&mut fired, |fired| !*fired, timeout);
        *fired
    }

    /// Resolve once shutdown completes
    pub async fn closed(&self) {
        loop {
            // Register interest before checking the flag so a concurrent
            // fire() cannot slip between the two.
            let notified = self.inner.notify.notified();
            if self.is_closed() {
                return;
            }
            notified.await;
        }
    }
}

/// A teardown that reported an error
#[derive(Debug)]
pub struct CloseFailure {
    /// Resource name
    pub resource: String,
    /// What went wrong
    pub error: anyhow::Error,
}

/// Outcome of [`Supervisor::close`]
#[derive(Debug, Default)]
pub struct CloseReport {
    /// Whether this call performed the teardown
    pub performed: bool,
    /// Resources released without error
    pub closed: usize,
    /// Resources whose teardown failed
    pub failures: Vec<CloseFailure>,
}

impl CloseReport {
    /// Total resources visited by this call
    pub fn total(&self) -> usize {
        self.closed + self.failures.len()
    }
}

/// Owns the teardown list and the shutdown signal
///
/// Cheap to clone; all clones share state. Pass it explicitly to every
/// collaborator that registers resources or observes shutdown.
#[derive(Clone, Default)]
pub struct Supervisor {
    inner: Arc<SupervisorInner>,
}

#[derive(Default)]
struct SupervisorInner {
    closing: AtomicBool,
    closers: Mutex<Vec<Box<dyn Closer>>>,
    signal: ShutdownSignal,
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("registered", &self.inner.closers.lock().len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Supervisor {
    /// Create a running supervisor with no resources
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource for teardown
    ///
    /// Once shutdown has started the resource is released immediately and
    /// [`Error::SupervisorClosed`] is returned.
    pub fn register<C>(&self, closer: C) -> Result<()>
    where
        C: Closer + 'static,
    {
        self.register_boxed(Box::new(closer))
    }

    /// Register an already boxed resource
    pub fn register_boxed(&self, mut closer: Box<dyn Closer>) -> Result<()> {
        let mut closers = self.inner.closers.lock();
        if self.inner.closing.load(Ordering::Acquire) {
            drop(closers);
            warn!(resource = closer.name(), "Registered after shutdown, closing now");
            if let Err(e) = closer.close() {
                warn!(resource = closer.name(), error = %e, "Failed to close resource");
            }
            return Err(Error::SupervisorClosed);
        }
        debug!(resource = closer.name(), "Registered resource");
        closers.push(closer);
        Ok(())
    }

    /// Tear down every registered resource and fire the shutdown signal
    ///
    /// Idempotent. Only the first call does any work; later or concurrent
    /// calls return a report with `performed == false` straight away.
    /// Individual teardown failures are logged and collected, never
    /// propagated.
    pub fn close(&self) -> CloseReport {
        if self
            .inner
            .closing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return CloseReport::default();
        }

        let closers = std::mem::take(&mut *self.inner.closers.lock());
        info!(resources = closers.len(), "Shutting down");

        let mut report = CloseReport {
            performed: true,
            ..CloseReport::default()
        };
        for mut closer in closers {
            match closer.close() {
                Ok(()) => {
                    debug!(resource = closer.name(), "Closed resource");
                    report.closed += 1;
                }
                Err(error) => {
                    warn!(resource = closer.name(), error = %error, "Failed to close resource");
                    report.failures.push(CloseFailure {
                        resource: closer.name().to_string(),
                        error,
                    });
                }
            }
        }

        self.inner.signal.fire();
        info!(
            closed = report.closed,
            failed = report.failures.len(),
            "Shutdown complete"
        );
        report
    }

    /// Handle that observers can wait on
    pub fn done(&self) -> ShutdownSignal {
        self.inner.signal.clone()
    }

    /// Whether shutdown has completed
    pub fn is_closed(&self) -> bool {
        self.inner.signal.is_closed()
    }

    /// Number of resources waiting for teardown
    pub fn registered(&self) -> usize {
        self.inner.closers.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::Sequence;

    fn mock(name: &'static str, fail: bool) -> MockCloser {
        let mut closer = MockCloser::new();
        closer.expect_name().return_const(name.to_string());
        closer.expect_close().times(1).returning(move || {
            if fail {
                Err(anyhow::anyhow!("{name} refused to close"))
            } else {
                Ok(())
            }
        });
        closer
    }

    #[test]
    fn test_close_runs_each_closer_once() {
        let supervisor = Supervisor::new();
        supervisor.register(mock("tun", false)).unwrap();
        supervisor.register(mock("resolver", false)).unwrap();
        assert_eq!(supervisor.registered(), 2);

        let report = supervisor.close();
        assert!(report.performed);
        assert_eq!(report.closed, 2);
        assert!(supervisor.is_closed());

        let again = supervisor.close();
        assert!(!again.performed);
        assert_eq!(again.total(), 0);
    }

    #[test]
    fn test_close_in_registration_order() {
        let mut seq = Sequence::new();
        let supervisor = Supervisor::new();
        for name in ["device", "transport", "resolver"] {
            let mut closer = MockCloser::new();
            closer.expect_name().return_const(name.to_string());
            closer
                .expect_close()
                .times(1)
                .in_sequence(&mut seq)
                .returning(|| Ok(()));
            supervisor.register(closer).unwrap();
        }

        assert_eq!(supervisor.close().closed, 3);
    }

    #[test]
    fn test_failure_does_not_abort_teardown() {
        let supervisor = Supervisor::new();
        supervisor.register(mock("first", false)).unwrap();
        supervisor.register(mock("broken", true)).unwrap();
        supervisor.register(mock("last", false)).unwrap();

        let report = supervisor.close();
        assert_eq!(report.closed, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].resource, "broken");
        assert!(supervisor.done().is_closed());
    }

    #[test]
    fn test_register_after_close() {
        let supervisor = Supervisor::new();
        supervisor.close();

        let result = supervisor.register(mock("late", false));
        assert!(matches!(result, Err(Error::SupervisorClosed)));
        assert_eq!(supervisor.registered(), 0);
    }

    #[test]
    fn test_closer_fn_runs_once() {
        let mut closer = closer_fn("once", || Ok(()));
        assert_eq!(closer.name(), "once");
        assert!(closer.close().is_ok());
        assert!(closer.close().is_ok());
    }

    #[test]
    fn test_wait_after_close_returns() {
        let supervisor = Supervisor::new();
        supervisor.close();
        supervisor.done().wait();
        assert!(supervisor.done().wait_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn test_wait_timeout_unbounded_after_close() {
        let supervisor = Supervisor::new();
        supervisor.close();
        assert!(supervisor.done().wait_timeout(Duration::MAX));
    }

    #[test]
    fn test_wait_timeout_while_running() {
        let supervisor = Supervisor::new();
        assert!(!supervisor.done().wait_timeout(Duration::from_millis(10)));
        assert!(!supervisor.is_closed());
    }
}
