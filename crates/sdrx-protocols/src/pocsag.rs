//! POCSAG pager decoder (§4.9): batch/codeword framing, BCH(31,21,2)
//! correction via the shared [`crate::bch`] module, and alpha/numeric
//! message reassembly.

use sdrx_core::BitBuffer;

use crate::bch::{pocsag_flex_bch, BchCode};
use crate::message::{PocsagAlphaMessage, PocsagMessage, PocsagNumericMessage};

const SYNC_WORD: u32 = 0x7CD2_15D8;
const SYNC_WORD_INVERTED: u32 = 0x83DA_E52A;
const FRAMES_PER_BATCH: u8 = 8;
const CODEWORDS_PER_FRAME: u8 = 2;
const CODEWORDS_PER_BATCH: u8 = FRAMES_PER_BATCH * CODEWORDS_PER_FRAME;

/// Numeric-message 4-bit symbol table. POCSAG numeric pages use BCD digits
/// plus a handful of punctuation codes; 0xF is a fill/unused code.
const BCD_TABLE: [char; 16] = ['0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'U', ' ', '-', ')', '(', '\u{0}'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Searching,
    InBatch { codeword_index: u8 },
}

struct Pending {
    capcode: u32,
    function: u8,
    content: BitBuffer,
}

/// Decodes a hard-decision bit stream (one bit per call to [`push_bit`])
/// into POCSAG messages.
pub struct PocsagDecoder<F: FnMut(PocsagMessage)> {
    sync_shift: u32,
    state: State,
    codeword_acc: u32,
    bits_in_codeword: u8,
    bch: BchCode,
    skip_bch_decode: bool,
    baud_rate: u16,
    pending: Option<Pending>,
    on_message: F,
}

impl<F: FnMut(PocsagMessage)> PocsagDecoder<F> {
    pub fn new(baud_rate: u16, skip_bch_decode: bool, on_message: F) -> Self {
        Self {
            sync_shift: 0,
            state: State::Searching,
            codeword_acc: 0,
            bits_in_codeword: 0,
            bch: pocsag_flex_bch(),
            skip_bch_decode,
            baud_rate,
            pending: None,
            on_message,
        }
    }

    pub fn push_bit(&mut self, bit: u8) {
        match self.state {
            State::Searching => {
                self.sync_shift = (self.sync_shift << 1) | (bit as u32);
                if self.sync_shift == SYNC_WORD || self.sync_shift == SYNC_WORD_INVERTED {
                    self.state = State::InBatch { codeword_index: 0 };
                    self.codeword_acc = 0;
                    self.bits_in_codeword = 0;
                }
            }
            State::InBatch { codeword_index } => {
                self.codeword_acc = (self.codeword_acc << 1) | (bit as u32);
                self.bits_in_codeword += 1;
                if self.bits_in_codeword == 32 {
                    let frame_index = codeword_index / 2;
                    self.process_codeword(self.codeword_acc, frame_index as u32);
                    self.codeword_acc = 0;
                    self.bits_in_codeword = 0;
                    let next_index = codeword_index + 1;
                    if next_index >= CODEWORDS_PER_BATCH {
                        self.flush_pending();
                        self.state = State::Searching;
                        self.sync_shift = 0;
                    } else {
                        self.state = State::InBatch { codeword_index: next_index };
                    }
                }
            }
        }
    }

    pub fn push_bits(&mut self, bits: &[u8]) {
        for &b in bits {
            self.push_bit(b);
        }
    }

    fn process_codeword(&mut self, codeword: u32, frame_index: u32) {
        let bch_codeword = codeword >> 1;
        let data21 = if self.skip_bch_decode {
            bch_codeword >> 10
        } else {
            match self.bch.decode(bch_codeword) {
                Ok(d) => d,
                Err(e) => {
                    tracing::debug!(error = %e, codeword, "POCSAG codeword failed BCH correction, dropping");
                    return;
                }
            }
        };

        let flag = (data21 >> 20) & 1;
        let info20 = data21 & 0xF_FFFF;

        if flag == 0 {
            self.flush_pending();
            let capcode = ((info20 >> 2) << 3) | frame_index;
            let function = (info20 & 0x3) as u8;
            self.pending = Some(Pending { capcode, function, content: BitBuffer::new_autoexpand(64) });
        } else if let Some(pending) = self.pending.as_mut() {
            for i in (0..20).rev() {
                pending.content.write_bit(((info20 >> i) & 1) as u8);
            }
        }
    }

    fn flush_pending(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let len = pending.content.get_len();
        let mut content = pending.content;
        content.seek(0);
        let mut bits = Vec::with_capacity(len);
        for _ in 0..len {
            bits.push(content.read_bit().unwrap_or(0));
        }

        let msg = if pending.function == 3 {
            PocsagMessage::Alpha(PocsagAlphaMessage {
                capcode: pending.capcode,
                function: pending.function,
                baud_rate: self.baud_rate,
                text: decode_alpha(&bits),
            })
        } else {
            PocsagMessage::Numeric(PocsagNumericMessage {
                capcode: pending.capcode,
                function: pending.function,
                baud_rate: self.baud_rate,
                digits: decode_bcd(&bits),
            })
        };
        (self.on_message)(msg);
    }
}

/// Each 7-bit ASCII character is transmitted bit-reversed (LSB first).
fn decode_alpha(bits: &[u8]) -> String {
    let mut s = String::new();
    for chunk in bits.chunks(7) {
        if chunk.len() < 7 {
            break;
        }
        let mut v: u8 = 0;
        for (i, &b) in chunk.iter().enumerate() {
            v |= b << i;
        }
        if v != 0 {
            s.push(v as char);
        }
    }
    s
}

fn decode_bcd(bits: &[u8]) -> String {
    let mut s = String::new();
    for chunk in bits.chunks(4) {
        if chunk.len() < 4 {
            break;
        }
        let mut v: u8 = 0;
        for &b in chunk {
            v = (v << 1) | b;
        }
        let c = BCD_TABLE[v as usize];
        if c != '\u{0}' {
            s.push(c);
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits_msb_first(value: u32, width: u32) -> Vec<u8> {
        (0..width).rev().map(|i| ((value >> i) & 1) as u8).collect()
    }

    fn alpha_codeword(text_bits: &[u8]) -> u32 {
        let data20 = {
            let mut v = 0u32;
            for &b in &text_bits[..20] {
                v = (v << 1) | b as u32;
            }
            v
        };
        let data21 = (1 << 20) | data20; // flag=1 => message codeword
        let bch = pocsag_flex_bch();
        let bch_codeword = bch.encode(data21);
        let parity = (bch_codeword.count_ones() % 2) as u32;
        (bch_codeword << 1) | parity
    }

    fn address_codeword(capcode_high18: u32, function: u8) -> u32 {
        let info20 = (capcode_high18 << 2) | function as u32;
        let data21 = info20; // flag = 0
        let bch = pocsag_flex_bch();
        let bch_codeword = bch.encode(data21);
        let parity = (bch_codeword.count_ones() % 2) as u32;
        (bch_codeword << 1) | parity
    }

    #[test]
    fn decodes_an_alpha_page() {
        let text = "HI";
        let mut char_bits = Vec::new();
        for ch in text.bytes() {
            // bit-reversed per character, LSB first in transmission order
            for i in 0..7 {
                char_bits.push((ch >> i) & 1);
            }
        }
        while char_bits.len() % 20 != 0 {
            char_bits.push(0);
        }

        // frame_index = 0, so capcode's low 3 bits are 0.
        let capcode: u32 = (1234567 >> 3) << 3;
        let capcode_high18 = capcode >> 3;
        let addr_cw = address_codeword(capcode_high18, 3);

        let mut codewords = vec![addr_cw];
        for chunk in char_bits.chunks(20) {
            codewords.push(alpha_codeword(chunk));
        }
        while codewords.len() < CODEWORDS_PER_BATCH as usize {
            codewords.push(address_codeword(0, 0));
        }

        let mut bits = bits_msb_first(SYNC_WORD, 32);
        for cw in codewords {
            bits.extend(bits_msb_first(cw, 32));
        }

        let received = std::cell::RefCell::new(Vec::new());
        let mut decoder = PocsagDecoder::new(1200, false, |msg| received.borrow_mut().push(msg));
        decoder.push_bits(&bits);

        let msgs = received.into_inner();
        assert!(msgs.iter().any(|m| matches!(m, PocsagMessage::Alpha(a) if a.capcode == capcode && a.text.starts_with("HI"))));
    }
}
