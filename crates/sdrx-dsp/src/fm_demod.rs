//! FM demodulator (§4.5): `y[n] = atan2(Im(x[n] conj(x[n-1])), Re(x[n] conj(x[n-1])))`,
//! using a minimax polynomial atan2 approximation (the original's
//! `fast_atan2f`, §1.2) accurate to within 0.005 rad.

use sdrx_core::fixed::Sample;

use crate::fir::ComplexSample;

const QTR_PI: f64 = std::f64::consts::FRAC_PI_4;
const HALF_PI: f64 = std::f64::consts::FRAC_PI_2;

fn fast_atan(x: f64) -> f64 {
    let ax = x.abs();
    QTR_PI * x - x * (ax - 1.0) * (0.2447 + 0.0663 * ax)
}

/// Polynomial atan2 approximation, max error below 0.005 rad across the
/// full domain (the angle wraps to (-pi, pi]).
pub fn fast_atan2(y: f64, x: f64) -> f64 {
    if x == 0.0 && y == 0.0 {
        return 0.0;
    }
    if x.abs() > y.abs() {
        let z = y / x;
        if x > 0.0 {
            fast_atan(z)
        } else if y >= 0.0 {
            fast_atan(z) + std::f64::consts::PI
        } else {
            fast_atan(z) - std::f64::consts::PI
        }
    } else {
        let z = x / y;
        if y > 0.0 {
            HALF_PI - fast_atan(z)
        } else {
            -HALF_PI - fast_atan(z)
        }
    }
}

pub struct FmDemod {
    last: ComplexSample,
}

impl FmDemod {
    pub fn new() -> Self {
        Self { last: ComplexSample::new(0, 0) }
    }

    /// Demodulates one complex sample, carrying state across calls so
    /// buffer boundaries don't introduce a discontinuity.
    pub fn process(&mut self, x: ComplexSample) -> Sample {
        let re = x.re as i64 * self.last.re as i64 + x.im as i64 * self.last.im as i64;
        let im = x.im as i64 * self.last.re as i64 - x.re as i64 * self.last.im as i64;
        self.last = x;

        let angle = fast_atan2(im as f64, re as f64);
        let scaled = (angle / std::f64::consts::PI) * (i16::MAX as f64);
        scaled.round().clamp(i16::MIN as f64, i16::MAX as f64) as Sample
    }
}

impl Default for FmDemod {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_atan2_matches_std_within_bound() {
        let mut max_err = 0.0f64;
        let mut theta = -std::f64::consts::PI;
        while theta <= std::f64::consts::PI {
            let (y, x) = (theta.sin(), theta.cos());
            let approx = fast_atan2(y, x);
            let err = (approx - theta).abs();
            let err = err.min((2.0 * std::f64::consts::PI - err).abs());
            max_err = max_err.max(err);
            theta += 0.001;
        }
        assert!(max_err <= 0.005, "max atan2 error {max_err} exceeds bound");
    }

    #[test]
    fn unmodulated_carrier_demodulates_to_near_zero() {
        let mut demod = FmDemod::new();
        demod.process(ComplexSample::new(10_000, 0));
        let y = demod.process(ComplexSample::new(10_000, 0));
        assert!(y.abs() < 10);
    }

    #[test]
    fn quarter_turn_per_sample_demodulates_near_positive_quarter_scale() {
        let mut demod = FmDemod::new();
        demod.process(ComplexSample::new(10_000, 0));
        let y = demod.process(ComplexSample::new(0, 10_000));
        let expected = (i16::MAX as f64) * 0.5; // pi/2 out of pi full scale
        assert!((y as f64 - expected).abs() < 500.0);
    }
}
