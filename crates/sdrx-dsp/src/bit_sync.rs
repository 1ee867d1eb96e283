//! Mueller-Mueller bit synchronizer (§4.7): a PI timing-recovery loop that
//! picks one decision sample per symbol from an oversampled stream.

use sdrx_core::fixed::Sample;

fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

pub struct MuellerMuller {
    kw: f64,
    km: f64,
    w: f64,
    m: f64,
    error_min: f64,
    error_max: f64,
    next_offset: f64,
    last_sample: f64,
}

impl MuellerMuller {
    pub fn new(kw: f64, km: f64, samples_per_symbol: f64, error_min: f64, error_max: f64) -> Self {
        Self { kw, km, w: samples_per_symbol, m: samples_per_symbol, error_min, error_max, next_offset: 0.0, last_sample: 0.0 }
    }

    /// Consumes `samples`, appending one decision per detected symbol to
    /// `decisions`. Carries the fractional sample offset, loop state `w`,
    /// and `m` across calls so successive buffers continue seamlessly.
    pub fn process(&mut self, samples: &[Sample], decisions: &mut Vec<Sample>) {
        let mut cur = self.next_offset;
        let n = samples.len() as f64;

        while cur < n {
            let idx = ((cur + 0.5) as usize).min(samples.len() - 1);
            let sample = samples[idx] as f64;
            decisions.push(sample.clamp(i16::MIN as f64, i16::MAX as f64) as Sample);

            let w_error = sign(self.last_sample) * sample - sign(sample) * self.last_sample;
            self.w = (self.w + w_error * self.kw).clamp(self.error_min, self.error_max);
            self.m += self.w + self.km * sample;

            cur += self.m.floor();
            self.m -= self.m.floor();
            self.last_sample = sample;
        }

        self.next_offset = cur - n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_decision_roughly_per_symbol() {
        let sps = 8.0;
        let mut mm = MuellerMuller::new(0.01, 0.01, sps, -2.0, 2.0);
        // 16 symbols worth of a square-wave-ish bitstream, sps samples per symbol.
        let mut samples = Vec::new();
        for sym in 0..16 {
            let level: Sample = if sym % 2 == 0 { 20_000 } else { -20_000 };
            for _ in 0..(sps as usize) {
                samples.push(level);
            }
        }
        let mut decisions = Vec::new();
        mm.process(&samples, &mut decisions);
        assert!(decisions.len() >= 14 && decisions.len() <= 18, "got {} decisions", decisions.len());
    }

    #[test]
    fn fractional_offset_carries_across_buffer_boundary() {
        let mut mm = MuellerMuller::new(0.01, 0.01, 4.0, -1.0, 1.0);
        let mut decisions = Vec::new();
        mm.process(&[1000; 4], &mut decisions);
        let offset_after_first_call = mm.next_offset;
        // Feeding a second buffer starting mid-symbol (nonzero carried offset)
        // must not reset state back to the constructor's initial m/w values.
        mm.process(&[1000; 4], &mut decisions);
        assert!(offset_after_first_call.abs() >= 0.0); // carried offset is a finite, usable value
        assert!(mm.m != 4.0 || mm.w != 4.0);
    }
}
