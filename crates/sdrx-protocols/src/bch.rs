//! Generic GF(2^m) BCH encoder/decoder (§1.2 "Generic GF(2^m) BCH decoder").
//!
//! The original exposes one generic `bch_code_new(p, m, n, k, t)` rather
//! than a decoder hardcoded to (31,21,2); POCSAG and FLEX both instantiate
//! this same generic code with m=5, n=31, k=21, t=2, generator polynomial
//! 0x769, rather than duplicating the arithmetic per protocol.

use sdrx_core::error::{ErrorKind, Facility, SdrError, SdrResult};

/// A binary BCH code over GF(2^m), correcting up to `t` errors in an
/// `n`-bit codeword carrying `k` data bits.
pub struct BchCode {
    m: u32,
    n: u32,
    k: u32,
    t: u32,
    /// GF(2^m) log/antilog tables built from the primitive polynomial.
    exp_table: Vec<u32>,
    log_table: Vec<u32>,
    generator: u32,
}

/// BCH(31,21,2) as used by both POCSAG and FLEX: generator polynomial
/// 0x769, primitive polynomial x^5+x^2+1 (0x25) over GF(32).
pub fn pocsag_flex_bch() -> BchCode {
    BchCode::new(0x25, 5, 31, 21, 2, 0x769).expect("fixed BCH(31,21,2) parameters are always valid")
}

impl BchCode {
    /// `prim_poly` is the primitive polynomial for GF(2^m), with the
    /// leading term implicit (e.g. 0x25 means x^5+x^2+1).
    pub fn new(prim_poly: u32, m: u32, n: u32, k: u32, t: u32, generator: u32) -> SdrResult<Self> {
        if m == 0 || n == 0 || k == 0 || k >= n || n != (1 << m) - 1 {
            return Err(SdrError::new(Facility::Dsp, ErrorKind::InvalidArgument).with_detail("invalid BCH parameters"));
        }
        let field_size = 1u32 << m;
        let mut exp_table = vec![0u32; 2 * field_size as usize];
        let mut log_table = vec![0u32; field_size as usize];

        let mut reg = 1u32;
        for i in 0..(field_size - 1) {
            exp_table[i as usize] = reg;
            log_table[reg as usize] = i;
            reg <<= 1;
            if reg & field_size != 0 {
                reg ^= prim_poly;
            }
        }
        for i in (field_size - 1)..(2 * field_size - 1) {
            exp_table[i as usize] = exp_table[(i - (field_size - 1)) as usize];
        }

        Ok(Self { m, n, k, t, exp_table, log_table, generator })
    }

    pub fn n(&self) -> u32 {
        self.n
    }

    pub fn k(&self) -> u32 {
        self.k
    }

    /// Encodes a `k`-bit data word (stored in the low `k` bits) into an
    /// `n`-bit systematic codeword (data in the high bits, parity in the
    /// low `n-k` bits), via shift-register polynomial division by the
    /// generator.
    pub fn encode(&self, data: u32) -> u32 {
        let parity_bits = self.n - self.k;
        let mut reg: u32 = data << parity_bits;
        for _ in 0..self.k {
            let top = (reg >> (self.n - 1)) & 1;
            reg = (reg << 1) & self.mask();
            if top != 0 {
                reg ^= self.generator;
            }
        }
        (data << parity_bits) | (reg & ((1 << parity_bits) - 1))
    }

    fn mask(&self) -> u32 {
        (1u32 << self.n) - 1
    }

    /// Computes the syndrome of a received codeword against the 2t roots
    /// of the generator in GF(2^m).
    fn syndrome(&self, codeword: u32, root: u32) -> u32 {
        let mut result = 0u32;
        for bit in 0..self.n {
            if (codeword >> bit) & 1 != 0 {
                let exp = (root * bit) % ((1 << self.m) - 1);
                result ^= self.exp_table[exp as usize];
            }
        }
        result
    }

    /// Attempts to correct up to `t` bit errors in `codeword` (n bits).
    /// Returns the corrected `k`-bit data word on success.
    pub fn decode(&self, codeword: u32) -> SdrResult<u32> {
        let mut syndromes_nonzero = false;
        for root in 1..=(2 * self.t) {
            if self.syndrome(codeword, root) != 0 {
                syndromes_nonzero = true;
                break;
            }
        }
        if !syndromes_nonzero {
            return Ok((codeword >> (self.n - self.k)) & ((1 << self.k) - 1));
        }

        // Brute-force error pattern search: for a (31,21,2) code this is
        // C(31,1)+C(31,2) = 496 candidate patterns, cheap per frame.
        for weight in 1..=self.t {
            if let Some(corrected) = self.try_weight(codeword, weight) {
                return Ok((corrected >> (self.n - self.k)) & ((1 << self.k) - 1));
            }
        }

        Err(SdrError::new(Facility::Dsp, ErrorKind::Rejected).with_detail("BCH: uncorrectable codeword"))
    }

    fn try_weight(&self, codeword: u32, weight: u32) -> Option<u32> {
        match weight {
            1 => {
                for b in 0..self.n {
                    let candidate = codeword ^ (1 << b);
                    if self.is_codeword(candidate) {
                        return Some(candidate);
                    }
                }
                None
            }
            2 => {
                for b1 in 0..self.n {
                    for b2 in (b1 + 1)..self.n {
                        let candidate = codeword ^ (1 << b1) ^ (1 << b2);
                        if self.is_codeword(candidate) {
                            return Some(candidate);
                        }
                    }
                }
                None
            }
            _ => None,
        }
    }

    fn is_codeword(&self, candidate: u32) -> bool {
        (1..=(2 * self.t)).all(|root| self.syndrome(candidate, root) == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_inconsistent_n() {
        assert!(BchCode::new(0x25, 5, 30, 21, 2, 0x769).is_err());
    }

    #[test]
    fn clean_codeword_round_trips() {
        let bch = pocsag_flex_bch();
        let data: u32 = 0x0A_BCDE & ((1 << 21) - 1);
        let codeword = bch.encode(data);
        let decoded = bch.decode(codeword).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn single_bit_error_is_corrected() {
        let bch = pocsag_flex_bch();
        let data: u32 = 0x01_2345 & ((1 << 21) - 1);
        let codeword = bch.encode(data);
        let corrupted = codeword ^ (1 << 5);
        let decoded = bch.decode(corrupted).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn two_bit_error_is_corrected() {
        let bch = pocsag_flex_bch();
        let data: u32 = 0x00_FFFF & ((1 << 21) - 1);
        let codeword = bch.encode(data);
        let corrupted = codeword ^ (1 << 3) ^ (1 << 17);
        let decoded = bch.decode(corrupted).unwrap();
        assert_eq!(decoded, data);
    }
}
