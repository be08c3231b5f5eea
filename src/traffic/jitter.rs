//! Randomized delays.

use std::time::Duration;

use rand::Rng;

/// Spread `base` by up to `±fraction` of itself using a uniform draw.
pub fn jitter<R: Rng + ?Sized>(base: Duration, fraction: f64, rng: &mut R) -> Duration {
    jitter_with(base, fraction, rng.gen_range(-1.0..=1.0))
}

/// `base * (1 + fraction * u)` for a given draw `u` in `[-1, 1]`.
///
/// The result never goes below zero, even when `fraction > 1`.
pub fn jitter_with(base: Duration, fraction: f64, u: f64) -> Duration {
    let u = if u.is_finite() { u.clamp(-1.0, 1.0) } else { 0.0 };
    let fraction = if fraction.is_finite() { fraction.max(0.0) } else { 0.0 };

    let secs = base.as_secs_f64() * (1.0 + fraction * u);
    if secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}
