//! AIS receiver (§4.8): preamble detection, HDLC framing, CRC validation,
//! and message decode, operating directly on demodulated PCM samples.
//!
//! Grounded in the donor's `ais_demod`/`ais_decode` pair (`ais_demod_priv.h`,
//! `ais_decode.h`), folded into one state machine here since the Rust sum
//! type makes the C split between "raw frame callback" and "decoded struct
//! callback" unnecessary.

use sdrx_core::fixed::Sample;

use crate::crc16::crc16_ais;
use crate::message::{AisBaseStationReport, AisMessage, AisPositionReport, AisStaticVoyageData};
use sdrx_core::BitBuffer;

/// Input sample rate this demodulator expects (Hz).
pub const INPUT_SAMPLE_RATE: u32 = 48_000;
/// AIS bit rate.
pub const BIT_RATE: u32 = 9_600;
/// Blind decimation rate: one candidate bit-timing phase per sample within
/// this window (nominally `INPUT_SAMPLE_RATE / BIT_RATE`).
pub const DECIMATION: usize = (INPUT_SAMPLE_RATE / BIT_RATE) as usize;

const PREAMBLE_FLAG_BITS: u32 = 32;
const START_FLAG: u32 = 0x7e;
/// 24-bit alternating preamble followed by the 8-bit start flag, in both
/// possible starting phases.
const PREAMBLE_PATTERNS: [u32; 2] = [0xAAAAAA00 | START_FLAG, 0x55555500 | START_FLAG];
const MAX_PACKET_BITS: usize = 256;
const FCS_BITS: usize = 16;
const END_FLAG: u32 = 0x7e;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PhaseState {
    SyncSearch,
    /// Transient state entered immediately after the start flag matches,
    /// before the first address-field bit is accumulated.
    AFieldWait,
    Receiving,
}

struct Phase {
    state: PhaseState,
    /// Rolling window of the last 32 raw (non-destuffed) NRZI bits, used
    /// both for preamble matching and end-flag detection.
    raw_window: u32,
    last_sample_positive: bool,
    ones_run: u32,
    destuffed: BitBuffer,
}

impl Phase {
    fn new() -> Self {
        Self {
            state: PhaseState::SyncSearch,
            raw_window: 0,
            last_sample_positive: true,
            ones_run: 0,
            destuffed: BitBuffer::new_autoexpand(MAX_PACKET_BITS),
        }
    }

    fn reset_to_sync_search(&mut self) {
        self.state = PhaseState::SyncSearch;
        self.raw_window = 0;
        self.ones_run = 0;
        self.destuffed = BitBuffer::new_autoexpand(MAX_PACKET_BITS);
    }
}

/// AIS demodulator/decoder: consumes real-valued PCM samples, emits decoded
/// messages through a caller-registered callback.
pub struct AisReceiver<F: FnMut(AisMessage)> {
    phases: Vec<Phase>,
    next_phase: usize,
    on_message: F,
    /// When true, frames with an invalid FCS are still delivered (as
    /// `AisMessage::Unparsed { fcs_valid: false, .. }`) instead of dropped.
    deliver_invalid_fcs: bool,
}

impl<F: FnMut(AisMessage)> AisReceiver<F> {
    pub fn new(on_message: F) -> Self {
        Self {
            phases: (0..DECIMATION).map(|_| Phase::new()).collect(),
            next_phase: 0,
            on_message,
            deliver_invalid_fcs: false,
        }
    }

    pub fn with_raw_frame_delivery(mut self, deliver_invalid_fcs: bool) -> Self {
        self.deliver_invalid_fcs = deliver_invalid_fcs;
        self
    }

    pub fn on_pcm(&mut self, samples: &[Sample]) {
        for &s in samples {
            let phase_idx = self.next_phase;
            self.next_phase = (self.next_phase + 1) % DECIMATION;
            self.process_one_sample(phase_idx, s);
        }
    }

    fn process_one_sample(&mut self, phase_idx: usize, sample: Sample) {
        let positive = sample >= 0;
        let bit = {
            let phase = &self.phases[phase_idx];
            // NRZI: a transition encodes 0, no transition encodes 1.
            u32::from(positive == phase.last_sample_positive)
        };
        self.phases[phase_idx].last_sample_positive = positive;
        self.phases[phase_idx].raw_window = (self.phases[phase_idx].raw_window << 1) | bit;

        match self.phases[phase_idx].state {
            PhaseState::SyncSearch => self.try_match_preamble(phase_idx),
            PhaseState::AFieldWait => {
                self.phases[phase_idx].state = PhaseState::Receiving;
                self.accumulate_bit(phase_idx, bit);
            }
            PhaseState::Receiving => self.accumulate_bit(phase_idx, bit),
        }
    }

    fn try_match_preamble(&mut self, phase_idx: usize) {
        let window = self.phases[phase_idx].raw_window & ((1u32 << PREAMBLE_FLAG_BITS) - 1);
        if PREAMBLE_PATTERNS.contains(&window) {
            let phase = &mut self.phases[phase_idx];
            phase.state = PhaseState::AFieldWait;
            phase.ones_run = 0;
            phase.destuffed = BitBuffer::new_autoexpand(MAX_PACKET_BITS);
        }
    }

    fn accumulate_bit(&mut self, phase_idx: usize, bit: u32) {
        let raw_tail = self.phases[phase_idx].raw_window & 0xff;
        let destuffed_len = self.phases[phase_idx].destuffed.get_pos();

        if raw_tail == END_FLAG && destuffed_len >= FCS_BITS {
            self.finish_packet(phase_idx);
            return;
        }

        if destuffed_len >= MAX_PACKET_BITS {
            self.phases[phase_idx].reset_to_sync_search();
            return;
        }

        let phase = &mut self.phases[phase_idx];
        if phase.ones_run >= 5 {
            phase.ones_run = 0;
            // Stuff bit: discard regardless of its value, per HDLC bit
            // destuffing (the stuffed bit is always a 0, but a corrupted
            // channel may flip it — dropping it unconditionally matches
            // the sender's insertion rule).
            return;
        }

        if bit == 1 {
            phase.ones_run += 1;
        } else {
            phase.ones_run = 0;
        }
        phase.destuffed.write_bit(bit as u8);
    }

    fn finish_packet(&mut self, phase_idx: usize) {
        let total_bits = self.phases[phase_idx].destuffed.get_pos();
        let payload_bits = total_bits - FCS_BITS;

        let mut bb = std::mem::replace(&mut self.phases[phase_idx].destuffed, BitBuffer::new(0));
        bb.seek(0);

        let mut payload_bit_bytes = Vec::with_capacity(payload_bits);
        for _ in 0..payload_bits {
            payload_bit_bytes.push(bb.read_bit().unwrap_or(0));
        }
        let fcs_received = bb.read_bits(FCS_BITS).unwrap_or(0) as u16;
        let fcs_computed = crc16_ais(&payload_bit_bytes, payload_bit_bytes.len());
        let fcs_valid = fcs_received == fcs_computed;

        if fcs_valid {
            let mut field_buf = BitBuffer::new(payload_bits);
            for (i, &b) in payload_bit_bytes.iter().enumerate() {
                if b != 0 {
                    field_buf.seek(i);
                    field_buf.write_bit(1);
                }
            }
            field_buf.seek(0);
            match decode_payload(&mut field_buf) {
                Ok(msg) => (self.on_message)(msg),
                Err(e) => {
                    tracing::warn!(error = %e, "AIS payload field extraction failed on a frame with a valid FCS");
                    if self.deliver_invalid_fcs {
                        (self.on_message)(AisMessage::Unparsed { message_type: 0, fcs_valid: true });
                    }
                }
            }
        } else {
            tracing::debug!(payload_bits, "AIS frame FCS check failed, dropping");
            if self.deliver_invalid_fcs {
                (self.on_message)(AisMessage::Unparsed { message_type: 0, fcs_valid: false });
            }
        }

        self.phases[phase_idx].reset_to_sync_search();
    }
}

fn decode_payload(bb: &mut BitBuffer) -> Result<AisMessage, sdrx_core::SdrError> {
    let message_type = bb.read_field(6, "message_type")? as u8;
    match message_type {
        1 | 2 | 3 => Ok(AisMessage::PositionReport(decode_position_report(bb)?)),
        4 => Ok(AisMessage::BaseStationReport(decode_base_station_report(bb)?)),
        5 => Ok(AisMessage::StaticVoyageData(decode_static_voyage_data(bb)?)),
        other => Ok(AisMessage::Unparsed { message_type: other, fcs_valid: true }),
    }
}

fn sign_extend(value: u64, bits: u32) -> i64 {
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

fn decode_position_report(bb: &mut BitBuffer) -> Result<AisPositionReport, sdrx_core::SdrError> {
    let _repeat = bb.read_field(2, "repeat_indicator")?;
    let mmsi = bb.read_field(30, "mmsi")? as u32;
    let nav_status = bb.read_field(4, "nav_status")? as u8;
    let rate_of_turn = sign_extend(bb.read_field(8, "rate_of_turn")?, 8) as i8;
    let sog_raw = bb.read_field(10, "sog")?;
    let position_accuracy = bb.read_field(1, "position_accuracy")? != 0;
    let lon_raw = sign_extend(bb.read_field(28, "longitude")?, 28);
    let lat_raw = sign_extend(bb.read_field(27, "latitude")?, 27);
    let cog_raw = bb.read_field(12, "course_over_ground")?;
    let heading = bb.read_field(9, "true_heading")? as u16;
    let timestamp_sec = bb.read_field(6, "timestamp")? as u8;

    Ok(AisPositionReport {
        mmsi,
        nav_status,
        rate_of_turn,
        speed_over_ground: sog_raw as f32 / 10.0,
        position_accuracy,
        longitude: lon_raw as f64 / 600_000.0,
        latitude: lat_raw as f64 / 600_000.0,
        course_over_ground: cog_raw as f32 / 10.0,
        true_heading: heading,
        timestamp_sec,
    })
}

fn decode_base_station_report(bb: &mut BitBuffer) -> Result<AisBaseStationReport, sdrx_core::SdrError> {
    let _repeat = bb.read_field(2, "repeat_indicator")?;
    let mmsi = bb.read_field(30, "mmsi")? as u32;
    let year = bb.read_field(14, "year")? as u16;
    let month = bb.read_field(4, "month")? as u8;
    let day = bb.read_field(5, "day")? as u8;
    let hour = bb.read_field(5, "hour")? as u8;
    let minute = bb.read_field(6, "minute")? as u8;
    let second = bb.read_field(6, "second")? as u8;
    let _fix_accuracy = bb.read_field(1, "position_accuracy")?;
    let lon_raw = sign_extend(bb.read_field(28, "longitude")?, 28);
    let lat_raw = sign_extend(bb.read_field(27, "latitude")?, 27);
    let epfd_type = bb.read_field(4, "epfd_type")? as u8;

    Ok(AisBaseStationReport {
        mmsi,
        year,
        month,
        day,
        hour,
        minute,
        second,
        longitude: lon_raw as f64 / 600_000.0,
        latitude: lat_raw as f64 / 600_000.0,
        epfd_type,
    })
}

fn decode_sixbit_ascii(bb: &mut BitBuffer, chars: usize, field: &'static str) -> Result<String, sdrx_core::SdrError> {
    let mut s = String::with_capacity(chars);
    for _ in 0..chars {
        let sextet = bb.read_field(6, field)? as u8;
        let ch = if sextet < 32 { sextet + 64 } else { sextet };
        s.push(ch as char);
    }
    Ok(s.trim_end().to_string())
}

fn decode_static_voyage_data(bb: &mut BitBuffer) -> Result<AisStaticVoyageData, sdrx_core::SdrError> {
    let _repeat = bb.read_field(2, "repeat_indicator")?;
    let mmsi = bb.read_field(30, "mmsi")? as u32;
    let ais_version = bb.read_field(2, "ais_version")? as u8;
    let imo_number = bb.read_field(30, "imo_number")? as u32;
    let callsign = decode_sixbit_ascii(bb, 7, "callsign")?;
    let ship_name = decode_sixbit_ascii(bb, 20, "ship_name")?;
    let ship_type = bb.read_field(8, "ship_type")? as u8;
    let dim_to_bow = bb.read_field(9, "dim_to_bow")? as u16;
    let dim_to_stern = bb.read_field(9, "dim_to_stern")? as u16;
    let dim_to_port = bb.read_field(6, "dim_to_port")? as u16;
    let dim_to_starboard = bb.read_field(6, "dim_to_starboard")? as u16;
    let epfd_type = bb.read_field(4, "epfd_type")? as u8;
    let eta_month = bb.read_field(4, "eta_month")? as u8;
    let eta_day = bb.read_field(5, "eta_day")? as u8;
    let eta_hour = bb.read_field(5, "eta_hour")? as u8;
    let eta_minute = bb.read_field(6, "eta_minute")? as u8;
    let draught_raw = bb.read_field(8, "draught")?;
    let destination = decode_sixbit_ascii(bb, 20, "destination")?;

    Ok(AisStaticVoyageData {
        mmsi,
        ais_version,
        imo_number,
        callsign,
        ship_name,
        ship_type,
        dim_to_bow,
        dim_to_stern,
        dim_to_port,
        dim_to_starboard,
        epfd_type,
        eta_month,
        eta_day,
        eta_hour,
        eta_minute,
        draught: draught_raw as f32 / 10.0,
        destination,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nrzi_encode(bits: &[u8]) -> Vec<bool> {
        let mut level = true;
        let mut out = Vec::with_capacity(bits.len());
        for &b in bits {
            if b == 0 {
                level = !level;
            }
            out.push(level);
        }
        out
    }

    fn bit_stuff(bits: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(bits.len());
        let mut ones = 0;
        for &b in bits {
            out.push(b);
            if b == 1 {
                ones += 1;
                if ones == 5 {
                    out.push(0);
                    ones = 0;
                }
            } else {
                ones = 0;
            }
        }
        out
    }

    fn encode_frame(payload_bits: &[u8]) -> Vec<Sample> {
        let fcs = crc16_ais(payload_bits, payload_bits.len());
        let mut framed: Vec<u8> = Vec::new();
        // alternating preamble + start flag, sent unstuffed
        for i in 0..24 {
            framed.push((i % 2) as u8);
        }
        for i in (0..8).rev() {
            framed.push(((START_FLAG >> i) & 1) as u8);
        }
        let mut body = payload_bits.to_vec();
        for i in (0..16).rev() {
            body.push(((fcs >> i) & 1) as u8);
        }
        framed.extend(bit_stuff(&body));
        for i in (0..8).rev() {
            framed.push(((END_FLAG >> i) & 1) as u8);
        }

        let line = nrzi_encode(&framed);
        let mut samples = Vec::with_capacity(line.len() * DECIMATION);
        for level in line {
            let v: Sample = if level { 20_000 } else { -20_000 };
            for _ in 0..DECIMATION {
                samples.push(v);
            }
        }
        samples
    }

    fn position_report_bits(mmsi: u32) -> Vec<u8> {
        let mut bb = BitBuffer::new_autoexpand(168);
        bb.write_bits(1, 6); // message type 1
        bb.write_bits(0, 2); // repeat indicator
        bb.write_bits(mmsi as u64, 30);
        bb.write_bits(0, 4); // nav status
        bb.write_bits(0, 8); // rate of turn
        bb.write_bits(100, 10); // sog = 10.0 knots
        bb.write_bits(1, 1); // position accuracy
        bb.write_bits((12_345_000i64 as u32 as u64) & ((1 << 28) - 1), 28);
        bb.write_bits((6_789_000i64 as u32 as u64) & ((1 << 27) - 1), 27);
        bb.write_bits(0, 12); // course over ground
        bb.write_bits(0, 9); // heading
        bb.write_bits(30, 6); // timestamp
        bb.write_zeroes(168 - bb.get_pos());
        bb.seek(0);
        let mut bits = Vec::with_capacity(168);
        for _ in 0..168 {
            bits.push(bb.read_bit().unwrap());
        }
        bits
    }

    #[test]
    fn decodes_a_clean_position_report() {
        let payload = position_report_bits(123456789);
        let samples = encode_frame(&payload);

        let received = std::cell::RefCell::new(Vec::new());
        let mut rx = AisReceiver::new(|msg| received.borrow_mut().push(msg));
        rx.on_pcm(&samples);

        let msgs = received.into_inner();
        assert_eq!(msgs.len(), 1);
        match &msgs[0] {
            AisMessage::PositionReport(r) => assert_eq!(r.mmsi, 123456789),
            other => panic!("expected position report, got {other:?}"),
        }
    }

    #[test]
    fn corrupted_fcs_is_dropped_by_default() {
        let mut payload = position_report_bits(1);
        payload[10] ^= 1;
        let samples = encode_frame(&payload);

        let received = std::cell::RefCell::new(Vec::new());
        let mut rx = AisReceiver::new(|msg| received.borrow_mut().push(msg));
        rx.on_pcm(&samples);

        assert!(received.into_inner().is_empty());
    }
}
