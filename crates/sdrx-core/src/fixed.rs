//! Q.15/Q.30 fixed-point primitives.
//!
//! Filter coefficients and pole values are stored as a 16-bit fixed-point
//! fraction with `FRAC_BITS` fractional bits. Samples themselves are plain
//! 16-bit integers (the usual 16-bit PCM convention) rather than a second
//! fractional format — a coefficient times a sample therefore yields an
//! accumulator scaled by `FRAC_BITS` relative to integer PCM, which is
//! rounded back down on output.
//!
//! `FRAC_BITS` is 14, not 15, matching the donor implementation exactly
//! (its `Q_15_SHIFT` constant is 14 despite the "Q15" name — this is the
//! common DSP convention of keeping one bit of headroom above full scale
//! so coefficients slightly greater than 1.0 do not saturate). The
//! round-half-up-to-+inf tie-break specified for the FIR and the resampler
//! is implemented by `round_to_sample`; the DC blocker instead truncates
//! via `truncate_to_sample`, matching its donor's plain `acc >> shift`.

pub const FRAC_BITS: u32 = 14;
const ROUND_BIAS: i64 = 1 << (FRAC_BITS - 1);

/// A coefficient or pole value in 1.FRAC_BITS fixed point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Q15(pub i16);

impl Q15 {
    pub const ZERO: Q15 = Q15(0);

    /// Converts a real value in the (representable) range into Q.15 fixed point,
    /// rounding half away from zero. Values outside i16 range saturate.
    pub fn from_f64(value: f64) -> Self {
        let scaled = (value * (1i64 << FRAC_BITS) as f64).round();
        Q15(scaled.clamp(i16::MIN as f64, i16::MAX as f64) as i16)
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / (1i64 << FRAC_BITS) as f64
    }
}

/// A raw 16-bit PCM sample (real), the working type threaded through the
/// DSP pipeline end to end.
pub type Sample = i16;

/// Wide accumulator for multiply-accumulate sums across many taps.
/// Generous width avoids overflow even for long filters with full-scale
/// coefficients and samples.
pub type Acc = i64;

/// Round an accumulator scaled by `FRAC_BITS` back down to a plain sample,
/// using round-half-up (ties go toward +infinity), saturating to i16.
///
/// This is exactly `(acc + (1<<13)) >> 14`.
pub fn round_to_sample(acc: Acc) -> Sample {
    let rounded = (acc + ROUND_BIAS) >> FRAC_BITS;
    rounded.clamp(i16::MIN as i64, i16::MAX as i64) as Sample
}

/// Multiply a Q.15 coefficient by a raw sample, producing a FRAC_BITS-scaled
/// product suitable for accumulation.
#[inline]
pub fn mac(coeff: Q15, sample: Sample) -> Acc {
    coeff.0 as Acc * sample as Acc
}

/// Truncate an accumulator scaled by `FRAC_BITS` down to a plain sample via
/// a plain arithmetic right shift, with no rounding bias, saturating to i16.
pub fn truncate_to_sample(acc: Acc) -> Sample {
    let truncated = acc >> FRAC_BITS;
    truncated.clamp(i16::MIN as i64, i16::MAX as i64) as Sample
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn q15_roundtrip_unity() {
        let q = Q15::from_f64(1.0);
        assert_eq!(q.0, 1 << FRAC_BITS);
        assert!((q.to_f64() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn round_half_up_ties_toward_positive_infinity() {
        // acc = exactly half an LSB below a whole sample: 1*2^14 - 2^13 => rounds up.
        let acc: Acc = (1i64 << FRAC_BITS) - (1i64 << (FRAC_BITS - 1));
        assert_eq!(round_to_sample(acc), 1);
        // Exactly on a tie below zero should also round toward +inf, i.e. to 0.
        let acc_neg: Acc = -(1i64 << (FRAC_BITS - 1));
        assert_eq!(round_to_sample(acc_neg), 0);
    }

    #[test]
    fn truncate_drops_the_fraction_without_rounding() {
        // Same near-tie value that round_to_sample rounds up to 1 truncates to 0.
        let acc: Acc = (1i64 << FRAC_BITS) - (1i64 << (FRAC_BITS - 1));
        assert_eq!(truncate_to_sample(acc), 0);
        assert_eq!(truncate_to_sample(1i64 << FRAC_BITS), 1);
    }

    #[test]
    fn mac_scales_by_frac_bits() {
        let coeff = Q15::from_f64(0.5);
        let acc = mac(coeff, 1000);
        assert_eq!(round_to_sample(acc), 500);
    }
}
