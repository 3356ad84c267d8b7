//! Saturation transfer curve
//!
//! The curve is a fixed-resolution lookup table, independent of the sample
//! rate. Note the curve at amount 0 is `x / 3`, a fixed attenuation rather
//! than an identity transfer.

use std::f64::consts::PI;
use std::sync::Arc;

/// Number of taps in every synthesized curve
pub const CURVE_LENGTH: usize = 44100;

/// Build the wave shaper curve for a distortion amount
///
/// `amount` is clamped to [0, 1]. With `k = amount * 100`, tap `i` maps to
/// `x = 2i/N - 1` and holds `(3 + k) * x * 20 * (PI / 180) / (PI + k * |x|)`.
pub fn synthesize_curve(amount: f32) -> Arc<[f32]> {
    let k = amount.clamp(0.0, 1.0) as f64 * 100.0;
    (0..CURVE_LENGTH)
        .map(|i| {
            let x = (i as f64 * 2.0) / CURVE_LENGTH as f64 - 1.0;
            ((3.0 + k) * x * 20.0 * (PI / 180.0) / (PI + k * x.abs())) as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_length_is_fixed() {
        assert_eq!(synthesize_curve(0.0).len(), CURVE_LENGTH);
        assert_eq!(synthesize_curve(1.0).len(), CURVE_LENGTH);
    }

    #[test]
    fn test_zero_amount_is_one_third_scaling() {
        let curve = synthesize_curve(0.0);
        // First tap is x = -1
        assert_relative_eq!(curve[0], -1.0 / 3.0, epsilon = 1e-6);
        // Last tap is x = 1 - 2/N
        let x_last = 1.0 - 2.0 / CURVE_LENGTH as f64;
        assert_relative_eq!(curve[CURVE_LENGTH - 1] as f64, x_last / 3.0, epsilon = 1e-6);
        // Middle tap is x = 0
        assert_eq!(curve[CURVE_LENGTH / 2], 0.0);
    }

    #[test]
    fn test_full_amount_endpoints() {
        let curve = synthesize_curve(1.0);
        // k = 100, x = -1: 103 * -1 * 20 * pi/180 / (pi + 100)
        let expected = (103.0 * -1.0 * 20.0 * (PI / 180.0) / (PI + 100.0)) as f32;
        assert_relative_eq!(curve[0], expected, epsilon = 1e-6);
    }

    #[test]
    fn test_amount_is_clamped() {
        assert_eq!(synthesize_curve(5.0), synthesize_curve(1.0));
        assert_eq!(synthesize_curve(-1.0), synthesize_curve(0.0));
    }

    #[test]
    fn test_curve_is_monotonic() {
        let curve = synthesize_curve(0.6);
        assert!(curve.windows(2).all(|w| w[1] >= w[0]));
    }
}
