//! Single-slot gate emulating a connection pool that hands out exactly one
//! connection at a time.
//!
//! Waiters are served in arrival order. A waiter whose [`CallerContext`] is
//! cancelled or whose deadline passes leaves the queue without ever holding
//! the gate, so an abandoned wait cannot leave the gate stuck.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// How often a blocked waiter re-checks its cancellation token
const CANCEL_POLL: Duration = Duration::from_millis(10);

/// Shared flag used to abandon a pending wait
#[derive(Clone, Default, Debug)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Who is asking for the gate, and for how long they are willing to wait
///
/// The request id is only recorded for diagnostics, it never influences who
/// gets the gate next.
#[derive(Clone, Debug)]
pub struct CallerContext {
    request: Uuid,
    deadline: Option<Instant>,
    cancel: CancelToken,
}

impl CallerContext {
    pub fn new(request: Uuid) -> Self {
        Self {
            request,
            deadline: None,
            cancel: CancelToken::new(),
        }
    }

    /// Give up waiting once `timeout` has passed from now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn request(&self) -> Uuid {
        self.request
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Reasons for abandoning a wait on the [`Gate`]
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GateError {
    #[error("gave up waiting for the gate after {0:?}")]
    Timeout(Duration),
    #[error("wait for the gate was cancelled")]
    Cancelled,
}

#[derive(Default)]
struct GateState {
    held: bool,
    holder: Option<Uuid>,
    /// Tickets of the waiting callers, oldest first
    queue: VecDeque<u64>,
    next_ticket: u64,
}

/// Mutual exclusion for a simulated backend resource
pub struct Gate {
    enabled: bool,
    state: Mutex<GateState>,
    released: Condvar,
}

impl Default for Gate {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Gate {
    /// Create a [`Gate`]. A disabled gate lets every caller through at once.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            state: Mutex::new(GateState::default()),
            released: Condvar::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Block until the gate is free and take it.
    ///
    /// The gate is released when the returned guard is dropped or
    /// [released](GateGuard::release) explicitly.
    pub fn acquire(&self, ctx: &CallerContext) -> Result<GateGuard<'_>, GateError> {
        if !self.enabled {
            return Ok(GateGuard {
                gate: self,
                bypass: true,
            });
        }

        let started = Instant::now();
        let mut state = self.state.lock();
        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.queue.push_back(ticket);

        loop {
            if !state.held && state.queue.front() == Some(&ticket) {
                state.queue.pop_front();
                state.held = true;
                state.holder = Some(ctx.request());
                debug!(request = %ctx.request(), waited = ?started.elapsed(), "gate acquired");
                return Ok(GateGuard {
                    gate: self,
                    bypass: false,
                });
            }

            if ctx.is_cancelled() {
                self.abandon(&mut state, ticket);
                debug!(request = %ctx.request(), "gate wait cancelled");
                return Err(GateError::Cancelled);
            }

            let mut wait = CANCEL_POLL;
            if let Some(deadline) = ctx.deadline() {
                let now = Instant::now();
                if now >= deadline {
                    self.abandon(&mut state, ticket);
                    let waited = started.elapsed();
                    debug!(request = %ctx.request(), ?waited, "gate wait timed out");
                    return Err(GateError::Timeout(waited));
                }
                wait = wait.min(deadline - now);
            }
            self.released.wait_for(&mut state, wait);
        }
    }

    /// Whether some caller currently holds the gate
    pub fn is_held(&self) -> bool {
        self.state.lock().held
    }

    /// Request id of the current holder
    pub fn holder(&self) -> Option<Uuid> {
        self.state.lock().holder
    }

    /// Number of callers blocked in [`Gate::acquire`]
    pub fn waiting(&self) -> usize {
        self.state.lock().queue.len()
    }

    fn abandon(&self, state: &mut GateState, ticket: u64) {
        state.queue.retain(|t| *t != ticket);
        // We may have been at the head of the queue.
        self.released.notify_all();
    }

    fn release(&self) {
        let mut state = self.state.lock();
        state.held = false;
        let holder = state.holder.take();
        drop(state);
        self.released.notify_all();
        if let Some(holder) = holder {
            debug!(request = %holder, "gate released");
        }
    }
}

/// Proof of holding the [`Gate`]
pub struct GateGuard<'a> {
    gate: &'a Gate,
    bypass: bool,
}

impl GateGuard<'_> {
    /// Release the gate before the guard goes out of scope
    pub fn release(self) {}
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        if !self.bypass {
            self.gate.release();
        }
    }
}
