//! Execution timelines for cross-graph synchronization.
//!
//! An [`ExecutionTimeline`] is a monotonically increasing counter paired with
//! a wakeup primitive. Graphs that signal a timeline raise its reached value
//! when their submission completes; graphs (or CPU callers) that depend on
//! that work wait for the value. Waits are always bounded by a caller-supplied
//! timeout and return a timeout status rather than blocking forever.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// Outcome of a bounded timeline wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    /// The waited-for value was reached.
    Signaled,
    /// The timeout elapsed before the value was reached.
    Timeout,
}

#[derive(Debug)]
struct TimelineState {
    /// Highest value any signal request has asked for.
    target: u64,
    /// Highest value actually reached by completed work.
    reached: u64,
}

/// A monotonic counter with an associated synchronization primitive.
///
/// Created through [`Device::create_execution_timeline`](crate::device::Device::create_execution_timeline)
/// and shared via `Arc`. Values only ever move forward.
#[derive(Debug)]
pub struct ExecutionTimeline {
    id: u64,
    state: Mutex<TimelineState>,
    condvar: Condvar,
}

impl ExecutionTimeline {
    pub(crate) fn new(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id,
            state: Mutex::new(TimelineState {
                target: 0,
                reached: 0,
            }),
            condvar: Condvar::new(),
        })
    }

    /// Unique identifier for debugging.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Request a new signal on this timeline.
    ///
    /// Increments the target value and returns it. The value is considered
    /// reached once the graph carrying the signal finishes executing.
    pub fn signal_request(&self) -> u64 {
        let mut state = self.state.lock();
        state.target += 1;
        state.target
    }

    /// Highest value reached by completed work.
    pub fn reached(&self) -> u64 {
        self.state.lock().reached
    }

    /// Highest value requested by signals.
    pub fn target(&self) -> u64 {
        self.state.lock().target
    }

    /// Mark a value as reached, waking any waiters.
    ///
    /// Values only move forward; advancing to a lower value is a no-op.
    pub(crate) fn advance_to(&self, value: u64) {
        let mut state = self.state.lock();
        if value > state.reached {
            state.reached = value;
            log::trace!("timeline {} reached {}", self.id, value);
            self.condvar.notify_all();
        }
    }

    /// Block until `value` is reached or the timeout elapses.
    pub fn wait_for_signal(&self, value: u64, timeout: Duration) -> WaitResult {
        let mut state = self.state.lock();
        if state.reached >= value {
            return WaitResult::Signaled;
        }
        let deadline = std::time::Instant::now() + timeout;
        while state.reached < value {
            if self.condvar.wait_until(&mut state, deadline).timed_out() {
                return if state.reached >= value {
                    WaitResult::Signaled
                } else {
                    WaitResult::Timeout
                };
            }
        }
        WaitResult::Signaled
    }

    /// Block until the latest requested target is reached or the timeout
    /// elapses.
    pub fn wait_for_latest(&self, timeout: Duration) -> WaitResult {
        let target = self.target();
        self.wait_for_signal(target, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_move_forward() {
        let timeline = ExecutionTimeline::new(1);
        assert_eq!(timeline.reached(), 0);

        timeline.advance_to(3);
        assert_eq!(timeline.reached(), 3);

        // Backwards advances are ignored.
        timeline.advance_to(1);
        assert_eq!(timeline.reached(), 3);
    }

    #[test]
    fn test_signal_request_increments_target() {
        let timeline = ExecutionTimeline::new(2);
        assert_eq!(timeline.signal_request(), 1);
        assert_eq!(timeline.signal_request(), 2);
        assert_eq!(timeline.target(), 2);
        assert_eq!(timeline.reached(), 0);
    }

    #[test]
    fn test_wait_already_reached() {
        let timeline = ExecutionTimeline::new(3);
        timeline.advance_to(5);
        assert_eq!(
            timeline.wait_for_signal(5, Duration::from_millis(1)),
            WaitResult::Signaled
        );
    }

    #[test]
    fn test_wait_timeout() {
        let timeline = ExecutionTimeline::new(4);
        let start = std::time::Instant::now();
        let result = timeline.wait_for_signal(1, Duration::from_millis(20));
        assert_eq!(result, WaitResult::Timeout);
        // Bounded: must not hang far past the timeout.
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_wait_cross_thread() {
        let timeline = ExecutionTimeline::new(5);
        let value = timeline.signal_request();

        let signaler = Arc::clone(&timeline);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            signaler.advance_to(value);
        });

        assert_eq!(
            timeline.wait_for_signal(value, Duration::from_secs(5)),
            WaitResult::Signaled
        );
    }
}
