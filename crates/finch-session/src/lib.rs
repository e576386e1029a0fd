//! Device-session manager for the BirdBrain Finch robot.
//!
//! A [`Session`] owns the exclusive HID connection to one Finch, serializes
//! the 9-byte command/response protocol across it, and runs a background
//! keep-alive thread so the robot does not fall back to idle mode while a
//! program is running but quiet.
//!
//! Exactly two threads ever touch the device: the caller's and the
//! keep-alive thread. A single mutex over all protocol state (handle,
//! transaction counter, event latches, activity flag) serializes them; the
//! keep-alive side only ever tries the lock, so it can never delay a caller.
//!
//! ```no_run
//! use finch_session::Session;
//!
//! # fn main() -> Result<(), finch_session::SessionError> {
//! let session = Session::open()?;
//! session.set_led(0, 255, 0)?;
//! let sample = session.accelerations()?;
//! println!("z axis: {:.2} G", sample.z);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]
#![deny(static_mut_refs)]

pub mod error;
mod keepalive;
pub mod session;
pub mod transport;

pub use error::{SessionError, SessionResult};
pub use session::{Session, SessionConfig};
pub use transport::{HidTransport, Transport};

pub use hid_finch_protocol as protocol;
