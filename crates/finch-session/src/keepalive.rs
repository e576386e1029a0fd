//! Background keep-alive loop.
//!
//! The Finch firmware drops back to idle mode after a few seconds without
//! traffic. While a session is connected, this loop pings the robot over
//! the same lock the caller uses — but only opportunistically: a busy lock
//! or recent caller activity both mean the device timeout was already
//! reset, so the tick does nothing.

use std::sync::atomic::Ordering;

use hid_finch_protocol::{CommandReport, Opcode};
use tracing::{debug, trace};

use crate::session::{Shared, SessionConfig, transact_locked};

/// What a single keep-alive tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    /// Another operation holds the lock right now; its traffic keeps the
    /// device awake.
    LockBusy,
    /// Traffic was recorded since the last tick; flag cleared, no ping.
    RecentActivity,
    /// The session was idle; one ping transaction went out.
    Pinged,
    /// The ping itself failed. Absorbed: this thread has no caller to
    /// report to.
    PingFailed,
}

/// One tick of the keep-alive loop. Split out of [`run`] so tests can
/// drive it without real sleeping.
pub(crate) fn tick(shared: &Shared) -> TickOutcome {
    let Some(mut inner) = shared.inner.try_lock() else {
        return TickOutcome::LockBusy;
    };
    if inner.activity {
        inner.activity = false;
        return TickOutcome::RecentActivity;
    }
    match transact_locked(&mut inner, CommandReport::query(Opcode::PingCounter)) {
        Ok(_) => TickOutcome::Pinged,
        Err(e) => {
            debug!(error = %e, "keep-alive ping failed");
            TickOutcome::PingFailed
        }
    }
}

/// Loop until the stop flag is raised. Sleeps in slices so shutdown
/// latency is bounded by one slice, not a whole tick.
pub(crate) fn run(shared: &Shared, config: SessionConfig) {
    debug!("keep-alive thread started");
    'ticks: loop {
        for _ in 0..config.keepalive_slices_per_tick {
            if shared.stop.load(Ordering::SeqCst) {
                break 'ticks;
            }
            std::thread::sleep(config.keepalive_slice);
        }
        if shared.stop.load(Ordering::SeqCst) {
            break;
        }
        let outcome = tick(shared);
        trace!(?outcome, "keep-alive tick");
    }
    debug!("keep-alive thread stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Session;
    use crate::transport::mock::MockTransport;
    use std::time::Duration;

    /// Connected session whose background thread ticks far too slowly to
    /// interfere; tests call [`tick`] directly instead.
    fn connected() -> (Session, MockTransport) {
        let mock = MockTransport::new();
        let mut session = Session::with_config(SessionConfig {
            keepalive_slice: Duration::from_millis(50),
            keepalive_slices_per_tick: 10_000,
        });
        session
            .connect_with(Box::new(mock.clone()))
            .expect("connect over mock");
        (session, mock)
    }

    #[test]
    fn test_idle_tick_sends_exactly_one_ping() {
        let (session, mock) = connected();
        // Drain the activity from the connect ack first.
        assert_eq!(tick(session.shared()), TickOutcome::RecentActivity);

        mock.queue_response(&[7], 0);
        assert_eq!(tick(session.shared()), TickOutcome::Pinged);
        assert_eq!(mock.writes_of(b'z'), 1);
    }

    #[test]
    fn test_activity_tick_skips_ping() {
        let (session, mock) = connected();
        assert_eq!(tick(session.shared()), TickOutcome::RecentActivity);

        // Caller traffic inside the tick window.
        mock.queue_response(&[127], 0);
        session.temperature().expect("caller read");

        assert_eq!(tick(session.shared()), TickOutcome::RecentActivity);
        assert_eq!(mock.writes_of(b'z'), 0, "recent traffic suppresses the ping");
    }

    #[test]
    fn test_ping_marks_activity_for_next_tick() {
        let (session, mock) = connected();
        assert_eq!(tick(session.shared()), TickOutcome::RecentActivity);

        mock.queue_response(&[7], 0);
        assert_eq!(tick(session.shared()), TickOutcome::Pinged);
        // The ping itself counts as traffic, so pings go out at most every
        // other idle tick.
        assert_eq!(tick(session.shared()), TickOutcome::RecentActivity);

        mock.queue_response(&[8], 0);
        assert_eq!(tick(session.shared()), TickOutcome::Pinged);
        assert_eq!(mock.writes_of(b'z'), 2);
    }

    #[test]
    fn test_busy_lock_skips_tick() {
        let (session, mock) = connected();
        let guard = session.shared().inner.lock();
        assert_eq!(tick(session.shared()), TickOutcome::LockBusy);
        drop(guard);
        assert_eq!(mock.writes_of(b'z'), 0);
    }

    #[test]
    fn test_failed_ping_is_absorbed() {
        let (session, mock) = connected();
        assert_eq!(tick(session.shared()), TickOutcome::RecentActivity);

        mock.set_fail_reads(true);
        assert_eq!(tick(session.shared()), TickOutcome::PingFailed);
        // The session stays usable afterwards.
        mock.set_fail_reads(false);
        mock.queue_response(&[127], 0);
        assert!(session.temperature().is_ok());
    }

    #[test]
    fn test_fast_loop_stops_within_one_slice() {
        let mock = MockTransport::new();
        let mut session = Session::with_config(SessionConfig {
            keepalive_slice: Duration::from_millis(1),
            keepalive_slices_per_tick: 2,
        });
        session
            .connect_with(Box::new(mock.clone()))
            .expect("connect over mock");
        // Let a few real ticks elapse, then tear down; disconnect joins
        // the thread, which must notice the stop flag promptly.
        std::thread::sleep(Duration::from_millis(20));
        session.disconnect().expect("disconnect joins keep-alive");
        // At least one idle window elapsed, so the thread pinged on its
        // own; empty-queue ping failures are absorbed, never fatal.
        assert!(mock.writes_of(b'z') >= 1);
    }
}
