//! Timer queue and `sleep`.
//!
//! Provides `sleep()` thunks that resume their continuation once the runtime's
//! clock has passed a deadline. The queue is owned by one [`Runtime`] and only
//! advances when the host calls [`Runtime::tick`]; nothing is polled in between.
//!
//! Durations are plain [`Duration`]s. Scripts that deal in numbers use
//! [`sleep_ms`], whose argument is in milliseconds.

use crate::continuation::Continuation;
use crate::error::TaskError;
use crate::runtime::Runtime;
use crate::thunk::Thunk;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Pending `(wake time, continuation)` pairs.
///
/// Entries fire in non-decreasing wake time, ties broken by registration
/// order: the map key is `(deadline, sequence number)`.
pub(crate) struct TimerQueue {
    entries: BTreeMap<(Instant, u64), Continuation>,
    next_seq: u64,
}

impl TimerQueue {
    pub(crate) fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_seq: 0,
        }
    }

    /// Registers `cb` to be resumed once the clock reaches `deadline`.
    pub(crate) fn schedule(&mut self, deadline: Instant, cb: Continuation) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert((deadline, seq), cb);
    }

    /// Removes and returns every entry due at `now`, in firing order.
    ///
    /// The caller fires the returned snapshot; entries scheduled while it does
    /// so are left for the next call even if they are already due.
    pub(crate) fn take_due(&mut self, now: Instant) -> Vec<Continuation> {
        // Sequence numbers never reach u64::MAX, so this splits right after
        // the last entry due at `now`.
        let pending = self.entries.split_off(&(now, u64::MAX));
        let due = std::mem::replace(&mut self.entries, pending);

        due.into_values().collect()
    }

    /// Earliest wake time across pending entries.
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.entries.keys().next().map(|(deadline, _)| *deadline)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Returns a thunk that resumes its continuation with `nil` after `duration`.
///
/// The deadline is computed when the thunk is invoked, from the runtime's
/// clock, so the same thunk awaited twice sleeps twice. A zero duration still
/// waits for the next [`Runtime::tick`]; it never resumes synchronously.
///
/// # Example
/// ```ignore
/// use pong::{script_fn, sleep};
/// use std::time::Duration;
///
/// let body = script_fn(|cx, _| async move {
///     cx.await_op(sleep(Duration::from_millis(100))).await?;
///     Ok(Value::Nil)
/// });
/// ```
pub fn sleep(duration: Duration) -> Thunk {
    Thunk::labeled("sleep", move |rt: &Runtime, cb| {
        rt.schedule_timer(duration, cb)
    })
}

/// Script-facing [`sleep`] taking a number of milliseconds.
///
/// Fractions of a millisecond are kept. A negative, NaN or infinite
/// argument, or one too large for the clock, makes the await fail with a
/// [`TaskError::Script`].
pub fn sleep_ms(ms: f64) -> Thunk {
    Thunk::labeled("sleep", move |rt: &Runtime, cb| {
        let duration = Duration::try_from_secs_f64(ms / 1000.0)
            .map_err(|_| TaskError::script(format!("sleep: invalid duration {ms}ms")))?;

        rt.schedule_timer(duration, cb)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Outcome;

    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder(log: &Rc<RefCell<Vec<&'static str>>>, name: &'static str) -> Continuation {
        let log = log.clone();
        Continuation::terminal(move |_: Outcome| log.borrow_mut().push(name))
    }

    #[test]
    fn fires_in_deadline_then_registration_order() {
        let base = Instant::now();
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut queue = TimerQueue::new();

        queue.schedule(base + Duration::from_millis(20), recorder(&log, "late"));
        queue.schedule(base + Duration::from_millis(10), recorder(&log, "first"));
        queue.schedule(base + Duration::from_millis(10), recorder(&log, "second"));

        for cb in queue.take_due(base + Duration::from_millis(30)) {
            cb.resume(Ok(crate::Value::Nil)).unwrap();
        }

        assert_eq!(*log.borrow(), vec!["first", "second", "late"]);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn keeps_entries_that_are_not_due() {
        let base = Instant::now();
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut queue = TimerQueue::new();

        queue.schedule(base, recorder(&log, "now"));
        queue.schedule(base + Duration::from_millis(5), recorder(&log, "later"));

        let due = queue.take_due(base);
        assert_eq!(due.len(), 1);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.next_deadline(), Some(base + Duration::from_millis(5)));
    }

    #[test]
    fn empty_queue_has_no_deadline() {
        let mut queue = TimerQueue::new();
        assert_eq!(queue.next_deadline(), None);
        assert!(queue.take_due(Instant::now()).is_empty());
    }
}
