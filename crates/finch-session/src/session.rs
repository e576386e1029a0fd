//! The device session: exclusive handle ownership, serialized transactions,
//! latched events and the keep-alive lifecycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use hid_finch_protocol::{
    AccelerationSample, CommandReport, LightSample, ObstacleSample, Opcode, REPORT_SIZE,
    ResponseReport, convert,
};
use parking_lot::Mutex;
use tracing::debug;

use crate::keepalive;
use crate::transport::{HidTransport, Transport};
use crate::{SessionError, SessionResult};

/// Keep-alive timing knobs.
///
/// The keep-alive thread sleeps in `slice`-sized increments, re-checking
/// its stop flag each slice, and considers one tick elapsed after
/// `slices_per_tick` slices. Defaults give the stock 1 s tick with ~100 ms
/// shutdown latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub keepalive_slice: Duration,
    pub keepalive_slices_per_tick: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            keepalive_slice: Duration::from_millis(100),
            keepalive_slices_per_tick: 10,
        }
    }
}

impl SessionConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidArgument`] for a zero slice or tick.
    pub fn validate(&self) -> SessionResult<()> {
        if self.keepalive_slice.is_zero() {
            return Err(SessionError::InvalidArgument(
                "keepalive_slice must be non-zero".into(),
            ));
        }
        if self.keepalive_slices_per_tick == 0 {
            return Err(SessionError::InvalidArgument(
                "keepalive_slices_per_tick must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// All mutable protocol state, guarded by one mutex.
pub(crate) struct Inner {
    pub(crate) transport: Option<Box<dyn Transport>>,
    /// Per-transaction tag, wrapping mod 256.
    tag: u8,
    tapped: bool,
    shaken: bool,
    /// Set by every transaction; cleared by the keep-alive tick.
    pub(crate) activity: bool,
}

pub(crate) struct Shared {
    pub(crate) inner: Mutex<Inner>,
    pub(crate) stop: AtomicBool,
}

/// Exclusive session with one Finch robot.
///
/// At most one live connection per process is supported; the robot itself
/// only services a single host program. All operations take `&self` — the
/// internal mutex serializes the caller against the keep-alive thread.
pub struct Session {
    shared: Arc<Shared>,
    config: SessionConfig,
    keepalive: Option<JoinHandle<()>>,
}

impl Session {
    /// An unconnected session with default configuration.
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    /// An unconnected session with explicit keep-alive timing.
    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    transport: None,
                    tag: 0,
                    tapped: false,
                    shaken: false,
                    activity: false,
                }),
                stop: AtomicBool::new(false),
            }),
            config,
            keepalive: None,
        }
    }

    /// Connect to the robot and return a ready session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::DeviceNotFound`] when no Finch is present or
    /// it is claimed by another process. Not retried automatically.
    pub fn open() -> SessionResult<Self> {
        let mut session = Self::new();
        session.connect()?;
        Ok(session)
    }

    /// Connect this session to the physical robot.
    ///
    /// On success the beak LED is switched off as the connection
    /// acknowledgment and the keep-alive thread is started.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AlreadyConnected`] when a handle is already
    /// held (checked before any device open, so a duplicate connect never
    /// touches the OS handle), or [`SessionError::DeviceNotFound`] when the
    /// open fails.
    pub fn connect(&mut self) -> SessionResult<()> {
        if self.is_connected() {
            return Err(SessionError::AlreadyConnected);
        }
        let transport = HidTransport::open()?;
        self.connect_with(Box::new(transport))
    }

    /// Connect over an explicit transport (the seam tests use).
    ///
    /// # Errors
    ///
    /// Same contract as [`Session::connect`]; additionally, if the
    /// acknowledgment write fails the transport is released again so the
    /// session is left cleanly unconnected.
    pub fn connect_with(&mut self, transport: Box<dyn Transport>) -> SessionResult<()> {
        self.config.validate()?;
        {
            let mut inner = self.shared.inner.lock();
            if inner.transport.is_some() {
                return Err(SessionError::AlreadyConnected);
            }
            inner.transport = Some(transport);

            // LED off through the ordinary write path doubles as the
            // connection acknowledgment.
            let ack = CommandReport::set_led(0, 0, 0)?;
            if let Err(e) = write_locked(&mut inner, &ack) {
                inner.transport = None;
                return Err(e);
            }
        }

        self.shared.stop.store(false, Ordering::SeqCst);
        let shared = Arc::clone(&self.shared);
        let config = self.config;
        self.keepalive = Some(std::thread::spawn(move || {
            keepalive::run(&shared, config);
        }));
        debug!("session connected, keep-alive thread running");
        Ok(())
    }

    /// Whether a device handle is currently held.
    pub fn is_connected(&self) -> bool {
        self.shared.inner.lock().transport.is_some()
    }

    /// Stop the keep-alive thread, reset the robot to idle best-effort,
    /// and release the handle. Idempotent; always safe from teardown paths.
    ///
    /// # Errors
    ///
    /// Never fails today; the reset write is best-effort and its failure is
    /// only logged. The `Result` keeps the teardown contract explicit.
    pub fn disconnect(&mut self) -> SessionResult<()> {
        // Signal, then join, before touching the handle: the keep-alive
        // thread must be gone before the transport is.
        self.shared.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.keepalive.take() {
            if handle.join().is_err() {
                debug!("keep-alive thread panicked before join");
            }
        }

        let mut inner = self.shared.inner.lock();
        if inner.transport.is_none() {
            return Ok(());
        }
        if let Err(e) = write_locked(&mut inner, &CommandReport::reset()) {
            debug!(error = %e, "best-effort idle reset failed during disconnect");
        }
        inner.transport = None;
        inner.activity = false;
        debug!("session disconnected");
        Ok(())
    }

    /// Fire-and-forget command: frame, lock, write, done.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotConnected`] without a handle, [`SessionError::Io`]
    /// when the write fails.
    pub fn write_command(&self, report: CommandReport) -> SessionResult<()> {
        let mut inner = self.shared.inner.lock();
        write_locked(&mut inner, &report)
    }

    /// Tagged transaction: write the command, then read until the response
    /// frame echoes the expected tag.
    ///
    /// Stale or corrupted frames (wrong tag) are discarded and the read is
    /// repeated; in practice the transport delivers responses in write
    /// order and this loop runs once. The ping counter opcode is
    /// tag-exempt.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotConnected`] without a handle, [`SessionError::Io`]
    /// when the write or any read fails.
    pub fn read_command(&self, report: CommandReport) -> SessionResult<ResponseReport> {
        let mut inner = self.shared.inner.lock();
        transact_locked(&mut inner, report)
    }

    /// Set the beak LED color; each channel 0..=255.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidArgument`] on an out-of-range channel, before
    /// any I/O.
    pub fn set_led(&self, red: i16, green: i16, blue: i16) -> SessionResult<()> {
        let report = CommandReport::set_led(red, green, blue)?;
        self.write_command(report)
    }

    /// Set wheel speeds; each -255..=255, negative is reverse.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidArgument`] on an out-of-range speed, before
    /// any I/O.
    pub fn set_motors(&self, left: i16, right: i16) -> SessionResult<()> {
        let report = CommandReport::set_motors(left, right)?;
        self.write_command(report)
    }

    /// Run the wheels for `duration`, then stop them.
    ///
    /// Blocks the calling thread for the full duration, matching the
    /// physical actuation time.
    ///
    /// # Errors
    ///
    /// Propagates the setter errors; validation happens before the wheels
    /// ever move.
    pub fn set_motors_for(&self, left: i16, right: i16, duration: Duration) -> SessionResult<()> {
        self.set_motors(left, right)?;
        std::thread::sleep(duration);
        self.set_motors(0, 0)
    }

    /// Start the buzzer at `freq_hz`.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotConnected`] or [`SessionError::Io`].
    pub fn buzzer_on(&self, freq_hz: u16) -> SessionResult<()> {
        self.write_command(CommandReport::buzzer_on(freq_hz))
    }

    /// Stop the buzzer.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotConnected`] or [`SessionError::Io`].
    pub fn buzzer_off(&self) -> SessionResult<()> {
        self.write_command(CommandReport::buzzer_off())
    }

    /// Sound the buzzer for `duration`, then stop it. Blocks for the full
    /// duration.
    ///
    /// # Errors
    ///
    /// Propagates the on/off command errors.
    pub fn buzzer_on_for(&self, freq_hz: u16, duration: Duration) -> SessionResult<()> {
        self.buzzer_on(freq_hz)?;
        std::thread::sleep(duration);
        self.buzzer_off()
    }

    /// Temperature at the thermometer in °C.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotConnected`] or [`SessionError::Io`].
    pub fn temperature(&self) -> SessionResult<f64> {
        let response = self.read_command(CommandReport::query(Opcode::Temperature))?;
        Ok(response.temperature_c())
    }

    /// One fresh accelerometer sample in G.
    ///
    /// Every acceleration read also latches the tap/shake event bits for
    /// [`Session::was_tapped`] / [`Session::was_shaken`].
    ///
    /// # Errors
    ///
    /// [`SessionError::NotConnected`] or [`SessionError::Io`].
    pub fn accelerations(&self) -> SessionResult<AccelerationSample> {
        let response = self.read_command(CommandReport::query(Opcode::Accelerometer))?;
        Ok(response.acceleration())
    }

    /// Left/right light sensor intensities.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotConnected`] or [`SessionError::Io`].
    pub fn light_sensors(&self) -> SessionResult<LightSample> {
        let response = self.read_command(CommandReport::query(Opcode::LightSensors))?;
        Ok(response.light_sensors())
    }

    /// Left light sensor intensity.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotConnected`] or [`SessionError::Io`].
    pub fn left_light(&self) -> SessionResult<u8> {
        Ok(self.light_sensors()?.left)
    }

    /// Right light sensor intensity.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotConnected`] or [`SessionError::Io`].
    pub fn right_light(&self) -> SessionResult<u8> {
        Ok(self.light_sensors()?.right)
    }

    /// Left/right obstacle sensor states.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotConnected`] or [`SessionError::Io`].
    pub fn obstacle_sensors(&self) -> SessionResult<ObstacleSample> {
        let response = self.read_command(CommandReport::query(Opcode::ObstacleSensors))?;
        Ok(response.obstacle_sensors())
    }

    /// Whether the left obstacle sensor sees something.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotConnected`] or [`SessionError::Io`].
    pub fn is_obstacle_left(&self) -> SessionResult<bool> {
        Ok(self.obstacle_sensors()?.left)
    }

    /// Whether the right obstacle sensor sees something.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotConnected`] or [`SessionError::Io`].
    pub fn is_obstacle_right(&self) -> SessionResult<bool> {
        Ok(self.obstacle_sensors()?.right)
    }

    /// Whether the robot was tapped since the last call (or since connect
    /// if never asked). Clears the tap latch.
    ///
    /// Issues its own acceleration read, which also re-latches the shake
    /// bit if that read observes a shake — so interleaved `was_tapped` /
    /// `was_shaken` calls each see events the other's read picked up. This
    /// mirrors the robot's historical behavior and is kept deliberately.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotConnected`] or [`SessionError::Io`]; the latch is
    /// left untouched on failure.
    pub fn was_tapped(&self) -> SessionResult<bool> {
        let mut inner = self.shared.inner.lock();
        transact_locked(&mut inner, CommandReport::query(Opcode::Accelerometer))?;
        let tapped = inner.tapped;
        inner.tapped = false;
        Ok(tapped)
    }

    /// Whether the robot was shaken since the last call (or since connect
    /// if never asked). Clears the shake latch. Same sampling caveats as
    /// [`Session::was_tapped`].
    ///
    /// # Errors
    ///
    /// [`SessionError::NotConnected`] or [`SessionError::Io`]; the latch is
    /// left untouched on failure.
    pub fn was_shaken(&self) -> SessionResult<bool> {
        let mut inner = self.shared.inner.lock();
        transact_locked(&mut inner, CommandReport::query(Opcode::Accelerometer))?;
        let shaken = inner.shaken;
        inner.shaken = false;
        Ok(shaken)
    }

    /// Flat on a surface, wheels down.
    ///
    /// Each orientation predicate takes its own fresh accelerometer sample;
    /// two calls close in time normally agree but may differ under sensor
    /// noise at exact threshold boundaries.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotConnected`] or [`SessionError::Io`].
    pub fn is_level(&self) -> SessionResult<bool> {
        Ok(convert::is_level(self.accelerations()?))
    }

    /// Flat but inverted.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotConnected`] or [`SessionError::Io`].
    pub fn is_upside_down(&self) -> SessionResult<bool> {
        Ok(convert::is_upside_down(self.accelerations()?))
    }

    /// Sitting on its tail, beak at the ceiling.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotConnected`] or [`SessionError::Io`].
    pub fn is_beak_up(&self) -> SessionResult<bool> {
        Ok(convert::is_beak_up(self.accelerations()?))
    }

    /// Beak pointed at the floor.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotConnected`] or [`SessionError::Io`].
    pub fn is_beak_down(&self) -> SessionResult<bool> {
        Ok(convert::is_beak_down(self.accelerations()?))
    }

    /// Resting on the left wing.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotConnected`] or [`SessionError::Io`].
    pub fn is_left_wing_down(&self) -> SessionResult<bool> {
        Ok(convert::is_left_wing_down(self.accelerations()?))
    }

    /// Resting on the right wing.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotConnected`] or [`SessionError::Io`].
    pub fn is_right_wing_down(&self) -> SessionResult<bool> {
        Ok(convert::is_right_wing_down(self.accelerations()?))
    }

    /// The firmware's ping count, the same transaction the keep-alive
    /// thread uses. Exposed as a diagnostic.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotConnected`] or [`SessionError::Io`].
    pub fn ping_counter(&self) -> SessionResult<u8> {
        let response = self.read_command(CommandReport::query(Opcode::PingCounter))?;
        Ok(response.ping_count())
    }

    #[cfg(test)]
    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Handle and thread are one resource; both go on every exit path.
        let _ = self.disconnect();
    }
}

/// Write one command while already holding the state lock.
///
/// Composite operations pass the locked state down instead of re-acquiring
/// the mutex, so nested acquisition never happens.
pub(crate) fn write_locked(inner: &mut Inner, report: &CommandReport) -> SessionResult<()> {
    let Some(transport) = inner.transport.as_mut() else {
        return Err(SessionError::NotConnected);
    };
    inner.activity = true;
    transport.write_report(report.as_bytes())?;
    Ok(())
}

/// Run one tagged write/read transaction while already holding the lock.
///
/// Within the held lock the write and its correlated read are atomic with
/// respect to the keep-alive thread; no other transaction's bytes can
/// interleave.
pub(crate) fn transact_locked(
    inner: &mut Inner,
    report: CommandReport,
) -> SessionResult<ResponseReport> {
    debug_assert!(report.opcode().expects_response());
    let Some(transport) = inner.transport.as_mut() else {
        return Err(SessionError::NotConnected);
    };
    inner.activity = true;

    let exempt = report.opcode().is_tag_exempt();
    let report = if exempt {
        report
    } else {
        let tag = inner.tag;
        inner.tag = inner.tag.wrapping_add(1);
        report.with_tag(tag)
    };
    let expected = report.tag();

    transport.write_report(report.as_bytes())?;
    let response = loop {
        let mut buf = [0u8; REPORT_SIZE];
        transport.read_report(&mut buf)?;
        let response = ResponseReport::new(buf);
        if exempt || response.tag() == expected {
            break response;
        }
        debug!(
            expected,
            got = response.tag(),
            "discarding stale response frame"
        );
    };

    if report.opcode() == Opcode::Accelerometer {
        inner.tapped |= response.tapped();
        inner.shaken |= response.shaken();
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use hid_finch_protocol::TAP_BIT;

    /// Session over a mock with the keep-alive tick slowed way down, so
    /// tests observe only their own traffic.
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

    fn accel_frame(x: u8, y: u8, z: u8, events: u8, tag: u8) -> [u8; REPORT_SIZE] {
        [0, x, y, z, events, 0, 0, tag, 0]
    }

    #[test]
    fn test_connect_sends_led_off_ack() {
        let (_session, mock) = connected();
        let history = mock.write_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0], [0, b'O', 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_double_connect_is_already_connected() {
        let (mut session, _mock) = connected();
        let second = MockTransport::new();
        assert!(matches!(
            session.connect_with(Box::new(second)),
            Err(SessionError::AlreadyConnected)
        ));
    }

    #[test]
    fn test_duplicate_connect_refused_before_any_open_attempt() {
        let (mut session, _mock) = connected();
        // Hosts without a robot would surface DeviceNotFound if the open
        // were attempted; the held handle must win first.
        assert!(matches!(
            session.connect(),
            Err(SessionError::AlreadyConnected)
        ));
    }

    #[test]
    fn test_failed_ack_releases_transport() {
        let mock = MockTransport::new();
        mock.set_fail_writes(true);
        let mut session = Session::new();
        assert!(session.connect_with(Box::new(mock.clone())).is_err());
        assert!(!session.is_connected());
        // A later connect attempt is not AlreadyConnected.
        mock.set_fail_writes(false);
        assert!(session.connect_with(Box::new(mock)).is_ok());
    }

    #[test]
    fn test_operations_without_handle_are_not_connected() {
        let session = Session::new();
        assert!(matches!(
            session.temperature(),
            Err(SessionError::NotConnected)
        ));
        assert!(matches!(
            session.set_led(0, 0, 0),
            Err(SessionError::NotConnected)
        ));
        assert!(matches!(
            session.ping_counter(),
            Err(SessionError::NotConnected)
        ));
    }

    #[test]
    fn test_validation_rejects_before_any_io() {
        let (session, mock) = connected();
        let baseline = mock.write_count();

        assert!(matches!(
            session.set_led(300, 0, 0),
            Err(SessionError::InvalidArgument(_))
        ));
        assert!(matches!(
            session.set_led(0, -1, 0),
            Err(SessionError::InvalidArgument(_))
        ));
        assert!(matches!(
            session.set_motors(256, 0),
            Err(SessionError::InvalidArgument(_))
        ));
        assert!(matches!(
            session.set_motors(0, -300),
            Err(SessionError::InvalidArgument(_))
        ));
        assert_eq!(mock.write_count(), baseline, "bad input must not reach the wire");
    }

    #[test]
    fn test_tags_strictly_increase_mod_256() {
        let (session, mock) = connected();
        mock.queue_response(&[127], 0);
        mock.queue_response(&[127], 1);

        session.temperature().expect("first read");
        session.temperature().expect("second read");

        let history = mock.write_history();
        // history[0] is the connect ack.
        assert_eq!(history[1][8], 0);
        assert_eq!(history[2][8], 1);
    }

    #[test]
    fn test_stale_frame_discarded_and_reread() {
        let (session, mock) = connected();
        // Wrong tag first; the matching frame carries a different payload
        // so the test can tell which one came back.
        mock.queue_response(&[99], 41);
        mock.queue_response(&[127], 0);

        let celsius = session.temperature().expect("read after stale frame");
        assert!((celsius - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_ping_is_tag_exempt() {
        let (session, mock) = connected();
        // Arbitrary tag byte: must be accepted anyway.
        mock.queue_response(&[42], 0xEE);

        assert_eq!(session.ping_counter().expect("ping"), 42);
        let history = mock.write_history();
        assert_eq!(history[1][1], b'z');
        assert_eq!(history[1][8], 0, "ping commands carry no tag");

        // The next tagged transaction still uses tag 0: ping consumed none.
        mock.queue_response(&[127], 0);
        session.temperature().expect("read");
        assert_eq!(mock.write_history()[2][8], 0);
    }

    #[test]
    fn test_read_failure_surfaces_io_error() {
        let (session, mock) = connected();
        mock.set_fail_reads(true);
        assert!(matches!(session.temperature(), Err(SessionError::Io(_))));
        assert!(matches!(session.is_level(), Err(SessionError::Io(_))));
    }

    #[test]
    fn test_tap_latch_set_then_cleared() {
        let (session, mock) = connected();
        // Read 1 observes a tap; reads 2 and 3 observe nothing.
        mock.queue_read(accel_frame(0, 0, 21, TAP_BIT, 0));
        mock.queue_read(accel_frame(0, 0, 21, 0, 1));
        mock.queue_read(accel_frame(0, 0, 21, 0, 2));

        session.accelerations().expect("latching read");
        assert!(session.was_tapped().expect("first query"));
        assert!(!session.was_tapped().expect("second query"));
    }

    #[test]
    fn test_shake_latch_independent_of_tap() {
        let (session, mock) = connected();
        mock.queue_read(accel_frame(0, 0, 21, TAP_BIT, 0));
        mock.queue_read(accel_frame(0, 0, 21, 0, 1));
        mock.queue_read(accel_frame(0, 0, 21, 0, 2));

        session.accelerations().expect("latching read");
        assert!(!session.was_shaken().expect("shake query"));
        assert!(session.was_tapped().expect("tap query"));
    }

    #[test]
    fn test_latch_untouched_when_read_fails() {
        let (session, mock) = connected();
        mock.queue_read(accel_frame(0, 0, 21, TAP_BIT, 0));
        session.accelerations().expect("latching read");

        mock.set_fail_reads(true);
        assert!(session.was_tapped().is_err());
        mock.set_fail_reads(false);

        // The failed query still consumed tag 1; the recovery read uses 2.
        mock.queue_read(accel_frame(0, 0, 21, 0, 2));
        assert!(session.was_tapped().expect("query after recovery"));
    }

    #[test]
    fn test_orientation_predicates_resample_each_call() {
        let (session, mock) = connected();
        // 21 counts ≈ 0.98 G on the z axis: level. Then 43 counts on z:
        // (43 - 64) · 1.5/32 ≈ -0.98 G: upside down.
        mock.queue_read(accel_frame(0, 0, 21, 0, 0));
        mock.queue_read(accel_frame(0, 0, 43, 0, 1));

        assert!(session.is_level().expect("first sample"));
        assert!(session.is_upside_down().expect("second sample"));
        assert_eq!(mock.writes_of(b'A'), 2, "each predicate reads afresh");
    }

    #[test]
    fn test_orientation_mutual_exclusion_through_session() {
        let (session, mock) = connected();
        for tag in 0u8..6 {
            mock.queue_read(accel_frame(0, 0, 21, 0, tag));
        }
        let hits = [
            session.is_level().expect("level"),
            session.is_upside_down().expect("upside down"),
            session.is_beak_up().expect("beak up"),
            session.is_beak_down().expect("beak down"),
            session.is_left_wing_down().expect("left wing"),
            session.is_right_wing_down().expect("right wing"),
        ]
        .iter()
        .filter(|&&hit| hit)
        .count();
        assert_eq!(hits, 1);
    }

    #[test]
    fn test_motor_and_buzzer_frames_reach_wire() {
        let (session, mock) = connected();
        session.set_motors(-100, 200).expect("set motors");
        session.buzzer_on(440).expect("buzzer on");
        session.buzzer_off().expect("buzzer off");

        let history = mock.write_history();
        assert_eq!(history[1], [0, b'M', 1, 100, 0, 200, 0, 0, 0]);
        assert_eq!(history[2], [0, b'B', 0xFF, 0xFF, 0x01, 0xB8, 0, 0, 0]);
        assert_eq!(history[3], [0, b'B', 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_timed_motor_run_sends_stop() {
        let (session, mock) = connected();
        session
            .set_motors_for(50, 50, Duration::from_millis(5))
            .expect("timed run");
        let history = mock.write_history();
        assert_eq!(history[1], [0, b'M', 0, 50, 0, 50, 0, 0, 0]);
        assert_eq!(history[2], [0, b'M', 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_disconnect_sends_reset_and_is_idempotent() {
        let (mut session, mock) = connected();
        session.disconnect().expect("first disconnect");
        assert!(!session.is_connected());
        assert_eq!(mock.writes_of(b'R'), 1);

        session.disconnect().expect("second disconnect");
        assert_eq!(mock.writes_of(b'R'), 1, "no second reset, no second join");
    }

    #[test]
    fn test_disconnect_swallows_reset_failure() {
        let (mut session, mock) = connected();
        mock.set_fail_writes(true);
        session.disconnect().expect("teardown must complete");
        assert!(!session.is_connected());
    }

    #[test]
    fn test_disconnect_on_unconnected_session_is_noop() {
        let mut session = Session::new();
        session.disconnect().expect("no-op disconnect");
        session.disconnect().expect("still a no-op");
    }

    #[test]
    fn test_reconnect_after_disconnect() {
        let (mut session, _mock) = connected();
        session.disconnect().expect("disconnect");
        let fresh = MockTransport::new();
        session
            .connect_with(Box::new(fresh.clone()))
            .expect("reconnect");
        assert!(session.is_connected());
        assert_eq!(fresh.writes_of(b'O'), 1, "ack sent on reconnect too");
    }

    #[test]
    fn test_config_validation() {
        assert!(SessionConfig::default().validate().is_ok());
        let bad = SessionConfig {
            keepalive_slice: Duration::ZERO,
            keepalive_slices_per_tick: 10,
        };
        assert!(bad.validate().is_err());
        let bad = SessionConfig {
            keepalive_slice: Duration::from_millis(100),
            keepalive_slices_per_tick: 0,
        };
        assert!(bad.validate().is_err());
    }
}
