//! Fixed-point phase derotator: a numerically controlled oscillator that
//! shifts a bandpass signal to baseband ahead of filtering (§4.2, §4.3).

use sdrx_core::fixed::{round_to_sample, Acc, Q15};

fn q15_mul(a: Q15, b: Q15) -> Q15 {
    let acc: Acc = a.0 as Acc * b.0 as Acc;
    Q15(round_to_sample(acc))
}

/// A unit phasor advanced by a fixed per-sample rotation, used to multiply
/// each input sample by `e^{-j 2 pi f_shift n / f_in}` incrementally rather
/// than recomputing sin/cos per sample.
pub struct Derotator {
    re: Q15,
    im: Q15,
    rot_re: Q15,
    rot_im: Q15,
    samples_since_renorm: u32,
}

const RENORM_INTERVAL: u32 = 1024;

impl Derotator {
    pub fn new(f_shift_hz: f64, sample_rate_hz: f64) -> Self {
        let angle = -2.0 * std::f64::consts::PI * f_shift_hz / sample_rate_hz;
        Self {
            re: Q15::from_f64(1.0),
            im: Q15::from_f64(0.0),
            rot_re: Q15::from_f64(angle.cos()),
            rot_im: Q15::from_f64(angle.sin()),
            samples_since_renorm: 0,
        }
    }

    /// Returns the current phasor, then advances to the next sample.
    pub fn step(&mut self) -> (Q15, Q15) {
        let cur = (self.re, self.im);

        let new_re = Q15(q15_mul(self.re, self.rot_re).0.wrapping_sub(q15_mul(self.im, self.rot_im).0));
        let new_im = Q15(q15_mul(self.re, self.rot_im).0.wrapping_add(q15_mul(self.im, self.rot_re).0));
        self.re = new_re;
        self.im = new_im;

        self.samples_since_renorm += 1;
        if self.samples_since_renorm >= RENORM_INTERVAL {
            self.renormalize();
            self.samples_since_renorm = 0;
        }

        cur
    }

    /// Renormalizes the phasor to unit magnitude, countering the drift that
    /// accumulates from repeated fixed-point rounding.
    fn renormalize(&mut self) {
        let re = self.re.to_f64();
        let im = self.im.to_f64();
        let mag = (re * re + im * im).sqrt();
        if mag > 1e-9 {
            self.re = Q15::from_f64(re / mag);
            self.im = Q15::from_f64(im / mag);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_shift_is_identity_phasor() {
        let mut d = Derotator::new(0.0, 48_000.0);
        for _ in 0..100 {
            let (re, im) = d.step();
            assert!((re.to_f64() - 1.0).abs() < 0.01);
            assert!(im.to_f64().abs() < 0.01);
        }
    }

    #[test]
    fn phasor_stays_near_unit_magnitude_over_many_samples() {
        let mut d = Derotator::new(1000.0, 48_000.0);
        for _ in 0..10_000 {
            let (re, im) = d.step();
            let mag = (re.to_f64().powi(2) + im.to_f64().powi(2)).sqrt();
            assert!((mag - 1.0).abs() < 0.05, "magnitude drifted to {mag}");
        }
    }
}
