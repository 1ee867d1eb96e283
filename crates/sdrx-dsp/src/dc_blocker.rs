//! Single-pole DC blocker on real samples (§4.4): a differentiator ahead of
//! a leaky integrator, `y[n] = (x[n] - x[n-1]) + pole * y[n-1]`, all Q.15
//! fixed point.
//!
//! The donor keeps a running Q.30 accumulator across calls rather than
//! recomputing each output from scratch: `acc` is only ever adjusted by
//! subtracting the previous input and the feedback term and adding the new
//! input, never reseeded from the truncated `y[n-1]` it also derives. That
//! lets the sub-LSB remainder below `FRAC_BITS` survive from one sample to
//! the next instead of being discarded on every call.

use sdrx_core::error::{ErrorKind, Facility, SdrError, SdrResult};
use sdrx_core::fixed::{mac, truncate_to_sample, Acc, Q15, Sample, FRAC_BITS};

pub struct DcBlocker {
    /// `1 - pole`, in Q.15 — the donor stores the complement of the pole
    /// here, not the pole itself, since the update subtracts this term.
    coeff: Q15,
    prev_x: Sample,
    prev_y: Sample,
    acc: Acc,
}

impl DcBlocker {
    pub fn new(pole: f64) -> SdrResult<Self> {
        if pole == 0.0 {
            return Err(SdrError::new(Facility::Dsp, ErrorKind::InvalidArgument).with_detail("pole must be nonzero"));
        }
        Ok(Self { coeff: Q15::from_f64(1.0 - pole), prev_x: 0, prev_y: 0, acc: 0 })
    }

    pub fn process(&mut self, x: Sample) -> Sample {
        let old_x_scaled: Acc = (self.prev_x as Acc) << FRAC_BITS;
        let new_x_scaled: Acc = (x as Acc) << FRAC_BITS;
        self.acc = self.acc - old_x_scaled + new_x_scaled - mac(self.coeff, self.prev_y);
        let y = truncate_to_sample(self.acc);
        self.prev_x = x;
        self.prev_y = y;
        y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_pole() {
        assert!(DcBlocker::new(0.0).is_err());
    }

    #[test]
    fn constant_input_decays_toward_zero() {
        let mut blocker = DcBlocker::new(0.9).unwrap();
        let mut last = 0;
        for _ in 0..200 {
            last = blocker.process(10_000);
        }
        assert!(last.abs() < 500, "DC component did not decay: {last}");
    }

    #[test]
    fn zero_input_stays_at_zero() {
        let mut blocker = DcBlocker::new(0.9).unwrap();
        for _ in 0..10 {
            assert_eq!(blocker.process(0), 0);
        }
    }
}
