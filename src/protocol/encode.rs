//! Pure encoding: remaining ammo → fire command.
//!
//! No I/O, no side effects. Inputs outside the natural range are clamped,
//! never rejected, since ammo pools routinely exceed the five LEDs.

use super::{AmmoBucket, Command, MAX_AMMO_BUCKET};

/// Fire command for an absolute remaining-ammo count. Saturates at `Z5`.
pub fn encode_from_count(count: i32) -> Command {
    Command::Ammo(AmmoBucket::saturating(count))
}

/// Fire command for a remaining-ammo fraction in `[0, 1]`.
///
/// Rounds up, so any ammo left lights at least one LED. Exactly zero (and
/// NaN) maps to `Z0`.
pub fn encode_from_percent(percent: f32) -> Command {
    let percent = if percent.is_nan() {
        0.0
    } else {
        percent.clamp(0.0, 1.0)
    };
    if percent == 0.0 {
        return encode_from_count(0);
    }
    encode_from_count((percent * MAX_AMMO_BUCKET as f32).ceil() as i32)
}
