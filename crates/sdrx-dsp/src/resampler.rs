//! Polyphase rational resampler, real and complex variants (§4.3).
//!
//! A single prototype low-pass filter is partitioned into `L` polyphase
//! branches of `M` coefficients each; the resampler walks an input FIFO,
//! at each output choosing the branch for the current phase, advancing the
//! input position by `floor((phase + D) / L)` samples and the phase by
//! `D mod L`.

use std::collections::VecDeque;

use sdrx_core::error::{ErrorKind, Facility, SdrError, SdrResult};
use sdrx_core::fixed::{mac, round_to_sample, Acc, Q15, Sample};

use crate::derotator::Derotator;
use crate::fir::{complex_q15_mul, ComplexSample};

fn partition_phases(prototype_taps: &[f64], l: u32) -> Vec<Vec<Q15>> {
    let l = l as usize;
    let m = prototype_taps.len().div_ceil(l);
    let mut phases = vec![Vec::with_capacity(m); l];
    for (i, &t) in prototype_taps.iter().enumerate() {
        phases[i % l].push(Q15::from_f64(t));
    }
    for phase in &mut phases {
        phase.resize(m, Q15::ZERO);
    }
    phases
}

/// Polyphase resampler over real samples, converting f_in -> (L/D) f_in.
///
/// `total_in`/`total_out` track cumulative samples pushed and emitted across
/// the resampler's whole lifetime, not just the current FIFO contents. The
/// phase/advance walk alone doesn't bound how many outputs a given input
/// count backs — when L > D it can step phase-to-phase without consuming any
/// new input, which is correct mid-stream but would over-emit at the tail of
/// a finite run. The cumulative counters cap total emitted outputs at
/// `floor(total_in * L / D)`, which both keeps the instantaneous walk rule
/// and the aggregate output rate the contract specifies.
pub struct PolyphaseResamplerReal {
    phases: Vec<Vec<Q15>>,
    l: u32,
    d: u32,
    input: VecDeque<Sample>,
    phase: u32,
    total_in: u64,
    total_out: u64,
}

impl PolyphaseResamplerReal {
    pub fn new(prototype_taps: &[f64], l: u32, d: u32) -> SdrResult<Self> {
        if l == 0 || d == 0 {
            return Err(SdrError::new(Facility::Dsp, ErrorKind::InvalidArgument).with_detail("interpolation and decimation factors must be nonzero"));
        }
        if prototype_taps.is_empty() {
            return Err(SdrError::new(Facility::Dsp, ErrorKind::InvalidArgument).with_detail("prototype filter must have at least one tap"));
        }
        Ok(Self { phases: partition_phases(prototype_taps, l), l, d, input: VecDeque::new(), phase: 0, total_in: 0, total_out: 0 })
    }

    fn taps_per_phase(&self) -> usize {
        self.phases.first().map(|p| p.len()).unwrap_or(0)
    }

    /// Appends samples to the input FIFO. Never fails in this bounded-memory
    /// implementation (the original's `full` signal corresponds to a bound
    /// that callers are expected to enforce by not pushing faster than
    /// `process` drains).
    pub fn push(&mut self, samples: &[Sample]) {
        self.input.extend(samples.iter().copied());
        self.total_in += samples.len() as u64;
    }

    pub fn can_process(&self) -> bool {
        self.input.len() >= self.taps_per_phase()
    }

    /// Writes up to `out.len()` resampled outputs, stopping early when the
    /// input FIFO is exhausted or the `floor(total_in * L / D)` output
    /// budget is exhausted. Returns the number written.
    pub fn process(&mut self, out: &mut [Sample]) -> usize {
        let m = self.taps_per_phase();
        let budget = self.total_in * self.l as u64 / self.d as u64;
        let mut n_out = 0;
        while n_out < out.len() && self.input.len() >= m && self.total_out < budget {
            let taps = &self.phases[self.phase as usize];
            let mut acc: Acc = 0;
            for (k, &tap) in taps.iter().enumerate() {
                acc += mac(tap, self.input[k]);
            }
            out[n_out] = round_to_sample(acc);
            n_out += 1;
            self.total_out += 1;

            let advance = (self.phase + self.d) / self.l;
            self.phase = (self.phase + self.d) % self.l;
            for _ in 0..advance {
                self.input.pop_front();
            }
        }
        n_out
    }

    pub fn full(&self) -> bool {
        false
    }
}

/// Polyphase resampler over complex samples; additionally derotates each
/// input sample to baseband before filtering (§4.3 "Complex variant").
pub struct PolyphaseResamplerComplex {
    re: PolyphaseResamplerReal,
    im: PolyphaseResamplerReal,
    derotator: Option<Derotator>,
}

impl PolyphaseResamplerComplex {
    pub fn new(prototype_taps: &[f64], l: u32, d: u32, derotator: Option<Derotator>) -> SdrResult<Self> {
        Ok(Self { re: PolyphaseResamplerReal::new(prototype_taps, l, d)?, im: PolyphaseResamplerReal::new(prototype_taps, l, d)?, derotator })
    }

    pub fn push(&mut self, samples: &[ComplexSample]) {
        for &s in samples {
            let s = match &mut self.derotator {
                Some(d) => {
                    let (re, im) = d.step();
                    complex_q15_mul(s, re, im)
                }
                None => s,
            };
            self.re.push(&[s.re]);
            self.im.push(&[s.im]);
        }
    }

    pub fn can_process(&self) -> bool {
        self.re.can_process() && self.im.can_process()
    }

    /// Writes up to `out.len()` resampled complex outputs. The I and Q
    /// resamplers share identical phase progression because they are
    /// always driven with matching-length pushes and calls here.
    pub fn process(&mut self, out: &mut [ComplexSample]) -> usize {
        let mut re_buf = vec![0 as Sample; out.len()];
        let mut im_buf = vec![0 as Sample; out.len()];
        let n_re = self.re.process(&mut re_buf);
        let n_im = self.im.process(&mut im_buf);
        let n = n_re.min(n_im);
        for i in 0..n {
            out[i] = ComplexSample::new(re_buf[i], im_buf[i]);
        }
        n
    }

    pub fn full(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_ratio() {
        assert!(PolyphaseResamplerReal::new(&[1.0, 0.5], 0, 1).is_err());
        assert!(PolyphaseResamplerReal::new(&[1.0, 0.5], 1, 0).is_err());
    }

    #[test]
    fn identity_ratio_passes_samples_through_after_group_delay() {
        let mut rs = PolyphaseResamplerReal::new(&[0.0, 1.0, 0.0], 1, 1).unwrap();
        rs.push(&[10, 20, 30, 40, 50]);
        let mut out = [0 as Sample; 5];
        let n = rs.process(&mut out);
        assert!(n > 0);
    }

    #[test]
    fn output_rate_matches_l_over_d_ratio() {
        // L=3, D=1: expect roughly 3x as many outputs as inputs once primed.
        let taps: Vec<f64> = vec![1.0; 9];
        let mut rs = PolyphaseResamplerReal::new(&taps, 3, 1).unwrap();
        let input = vec![1 as Sample; 100];
        rs.push(&input);
        let mut out = vec![0 as Sample; 1000];
        let n = rs.process(&mut out);
        // inputs consumed == floor(n*D/L) roughly; just assert it produced a nontrivial multiple.
        assert!(n > 100);
    }

    #[test]
    fn emits_floor_n_times_l_over_d_outputs() {
        // L=3, D=2, a single-tap (M=1) unit impulse: exactly floor(N*3/2) outputs
        // for any N, even when N isn't a multiple of D.
        let mut rs = PolyphaseResamplerReal::new(&[1.0], 3, 2).unwrap();
        let mut out = vec![0 as Sample; 64];

        rs.push(&[7]);
        let n = rs.process(&mut out);
        assert_eq!(n, 1, "N=1 must emit floor(1*3/2) = 1 output, not {n}");

        rs.push(&[9]);
        let n = rs.process(&mut out);
        assert_eq!(n, 2, "cumulative N=2 must emit floor(2*3/2) - 1 = 2 further outputs, not {n}");
    }
}
