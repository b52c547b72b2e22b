//! Numeric helpers centralizing clamping and safe numeric casts.

use num_traits::cast::cast;

/// Clamp into `[min, max]`, mapping NaN to `min`.
#[must_use]
pub fn clamp_range(value: f32, min: f32, max: f32) -> f32 {
    if value.is_nan() {
        return min;
    }
    value.clamp(min, max.max(min))
}

/// Clamp into `[0, 1]`, mapping NaN to zero.
#[must_use]
pub fn clamp_unit(value: f32) -> f32 {
    clamp_range(value, 0.0, 1.0)
}

/// Linear interpolation between `a` and `b` by `t` (unclamped).
#[must_use]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Milliseconds to seconds, allowing precision loss in a single location.
#[must_use]
pub fn ms_to_secs(ms: u64) -> f32 {
    cast::<u64, f32>(ms).unwrap_or(0.0) / 1_000.0
}

/// Milliseconds to hours.
#[must_use]
pub fn ms_to_hours(ms: u64) -> f32 {
    ms_to_secs(ms) / 3_600.0
}

/// Convert a non-negative duration in milliseconds expressed as `f32` back to `u64`.
#[must_use]
pub fn f32_to_ms(value: f32) -> u64 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    cast::<f32, u64>(value.round()).unwrap_or(u64::MAX)
}

/// Fraction of `elapsed` over `total`, clamped to `[0, 1]`; zero totals count as complete.
#[must_use]
pub fn progress(elapsed: u64, total: u64) -> f32 {
    if total == 0 {
        return 1.0;
    }
    clamp_unit(ms_to_secs(elapsed) / ms_to_secs(total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_handles_nan_and_inverted_bounds() {
        assert!(clamp_unit(f32::NAN).abs() < f32::EPSILON);
        assert!((clamp_range(5.0, 0.3, 1.0) - 1.0).abs() < f32::EPSILON);
        assert!((clamp_range(0.5, 0.8, 0.2) - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn time_conversions_cover_ranges() {
        assert!((ms_to_secs(1_500) - 1.5).abs() < f32::EPSILON);
        assert!((ms_to_hours(3_600_000) - 1.0).abs() < 1e-6);
        assert_eq!(f32_to_ms(f32::NAN), 0);
        assert_eq!(f32_to_ms(-3.0), 0);
        assert_eq!(f32_to_ms(249.6), 250);
    }

    #[test]
    fn progress_guards_zero_total() {
        assert!((progress(10, 0) - 1.0).abs() < f32::EPSILON);
        assert!((progress(500, 1_000) - 0.5).abs() < 1e-6);
        assert!((progress(5_000, 1_000) - 1.0).abs() < f32::EPSILON);
    }
}
