//! Raw-byte to engineering-unit conversions and orientation classifiers.

use serde::{Deserialize, Serialize};

/// One accelerometer snapshot in G, axes as the Finch defines them:
/// X beak-to-tail, Y wheel-to-wheel, Z bottom-to-top.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccelerationSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Left/right light sensor intensities (0 dark .. 255 bright).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightSample {
    pub left: u8,
    pub right: u8,
}

/// Left/right obstacle sensor states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObstacleSample {
    pub left: bool,
    pub right: bool,
}

/// Resolution of the 6-bit signed accelerometer: 1.5 G over 32 counts.
const G_PER_COUNT: f64 = 1.5 / 32.0;

/// Decode one raw accelerometer byte to G.
///
/// The sensor reports a 6-bit signed value: raw values above 31 are the
/// negative half of the range and are shifted down by 64 before scaling.
pub fn raw_to_g(raw: u8) -> f64 {
    if raw > 31 {
        (f64::from(raw) - 64.0) * G_PER_COUNT
    } else {
        f64::from(raw) * G_PER_COUNT
    }
}

/// Encode a G value back to the raw byte that produces it.
///
/// Inverse of [`raw_to_g`] for exactly representable values; inputs are
/// clamped to the sensor's ±1.5 G range.
pub fn g_to_raw(g: f64) -> u8 {
    let counts = (g.clamp(-1.5, 1.5) / G_PER_COUNT).round();
    if counts < 0.0 {
        (counts + 64.0) as u8
    } else {
        counts as u8
    }
}

/// Decode the raw thermometer byte to degrees Celsius.
///
/// Affine mapping with 25 °C at a raw reading of 127 and 2.4 counts per
/// degree.
pub fn raw_to_celsius(raw: u8) -> f64 {
    (f64::from(raw) - 127.0) / 2.4 + 25.0
}

// Orientation threshold bands, in G. Each classifier checks one dominant
// axis against a major band and the other two against a minor band; the
// bands never overlap, so at most one classifier is true for any sample.
const LEVEL_MINOR: f64 = 0.5;
const LEVEL_Z_MIN: f64 = 0.65;
const MINOR: f64 = 0.3;
const BEAK_MAJOR: f64 = 0.8;
const WING_MAJOR: f64 = 0.7;
const FULL_SCALE: f64 = 1.5;

/// Flat on a surface, wheels down.
pub fn is_level(a: AccelerationSample) -> bool {
    a.x.abs() < LEVEL_MINOR && a.y.abs() < LEVEL_MINOR && a.z > LEVEL_Z_MIN && a.z < FULL_SCALE
}

/// Flat but inverted.
pub fn is_upside_down(a: AccelerationSample) -> bool {
    a.x.abs() < LEVEL_MINOR && a.y.abs() < LEVEL_MINOR && a.z > -FULL_SCALE && a.z < -LEVEL_Z_MIN
}

/// Sitting on its tail, beak at the ceiling.
pub fn is_beak_up(a: AccelerationSample) -> bool {
    a.x > -FULL_SCALE && a.x < -BEAK_MAJOR && a.y.abs() < MINOR && a.z.abs() < MINOR
}

/// Beak pointed at the floor.
pub fn is_beak_down(a: AccelerationSample) -> bool {
    a.x > BEAK_MAJOR && a.x < FULL_SCALE && a.y.abs() < MINOR && a.z.abs() < MINOR
}

/// Resting on the left wing.
pub fn is_left_wing_down(a: AccelerationSample) -> bool {
    a.x.abs() < LEVEL_MINOR && a.y > WING_MAJOR && a.y < FULL_SCALE && a.z.abs() < LEVEL_MINOR
}

/// Resting on the right wing.
pub fn is_right_wing_down(a: AccelerationSample) -> bool {
    a.x.abs() < LEVEL_MINOR && a.y > -FULL_SCALE && a.y < -WING_MAJOR && a.z.abs() < LEVEL_MINOR
}
