//! Per-channel DSP pipeline and protocol dispatch (§4, §6 "Per-channel
//! output"). One [`ChannelWorker`] owns one channel's entire chain from
//! tuned complex baseband down to decoded messages or raw PCM output.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use num_complex::Complex;
use tracing::{debug, info, warn};

use sdrx_config::{ChannelConfig, ProtocolConfig};
use sdrx_core::fixed::{Q15, Sample};
use sdrx_core::{ComplexSample, SampleBuf, SdrError, SdrResult};
use sdrx_dsp::{CostasFsk, DcBlocker, DirectFirComplex, Derotator, FmDemod, MuellerMuller, PolyphaseResamplerComplex};
use sdrx_protocols::message::DectFrame;
use sdrx_protocols::{AisReceiver, DectExtractor, FlexDecoder, PocsagDecoder};

/// Loop-filter and lock-hysteresis constants for the FSK Costas loop,
/// shared by every Costas-demodulated channel regardless of protocol.
const COSTAS_ALPHA: f64 = 0.05;
const COSTAS_BETA: f64 = 0.0025;
const COSTAS_E_MAX: i16 = 12_000;
const COSTAS_LOCK_AFTER: u32 = 64;
const COSTAS_UNLOCK_AFTER: u32 = 256;

/// Symbol timing recovery loop gains, shared across protocols that bit-sync
/// off a Costas hard decision.
const MM_KW: f64 = 0.002;
const MM_KM: f64 = 0.002;
const MM_ERROR_MIN: f64 = -2.0;
const MM_ERROR_MAX: f64 = 2.0;

fn samples_per_symbol(baud_rate: u32, demod_rate: u32) -> f64 {
    demod_rate as f64 / baud_rate as f64
}

enum Demod {
    Fm(FmDemod),
    Costas { loop_: CostasFsk, bit_sync: MuellerMuller, last_decisions: Vec<Sample> },
}

enum Sink {
    Ais(AisReceiver<Box<dyn FnMut(sdrx_protocols::message::AisMessage) + Send>>),
    Pocsag(PocsagDecoder<Box<dyn FnMut(sdrx_protocols::message::PocsagMessage) + Send>>),
    Flex(FlexDecoder<Box<dyn FnMut(sdrx_protocols::message::FlexMessage) + Send>>),
    Dect(DectExtractor<Box<dyn FnMut(DectFrame) + Send>>),
    Raw(BufWriter<File>),
}

/// One channel's complete DSP chain plus its protocol sink.
pub struct ChannelWorker {
    name: String,
    fir: DirectFirComplex,
    resampler: Option<PolyphaseResamplerComplex>,
    channel_gain: Q15,
    demod: Demod,
    dc_blocker: Option<DcBlocker>,
    debug_signal_tap: Option<BufWriter<File>>,
    sink: Sink,
}

/// Converts a decibel gain into a Q.15 linear multiplier.
fn gain_db_to_q15(gain_db: f64) -> Q15 {
    Q15::from_f64(10f64.powf(gain_db / 20.0))
}

impl ChannelWorker {
    pub fn new(cfg: &ChannelConfig, sample_rate: u32, center_freq: u32) -> SdrResult<Self> {
        let name = cfg.out_fifo.display().to_string();
        let freq_offset_hz = cfg.freq_hz as f64 - center_freq as f64;
        let derotator = Derotator::new(freq_offset_hz, sample_rate as f64);
        let taps: Vec<Q15> = cfg.lpf_taps.iter().map(|&t| Q15::from_f64(t)).collect();
        let fir = DirectFirComplex::new(taps, cfg.decimation_factor, Some(derotator))?;

        let mut demod_rate = sample_rate / cfg.decimation_factor;
        let resampler = if cfg.resample_decimate != 1 || cfg.resample_interpolate != 1 {
            demod_rate = demod_rate * cfg.resample_interpolate / cfg.resample_decimate;
            Some(PolyphaseResamplerComplex::new(&cfg.resample_filter_taps, cfg.resample_interpolate, cfg.resample_decimate, None)?)
        } else {
            None
        };

        let dc_blocker = if cfg.enable_dc_blocker { Some(DcBlocker::new(cfg.dc_blocker_pole)?) } else { None };

        let demod = match &cfg.protocol {
            ProtocolConfig::Ais => Demod::Fm(FmDemod::new()),
            ProtocolConfig::Pocsag { baud_rate, .. } => {
                let sps = samples_per_symbol(*baud_rate, demod_rate);
                Demod::Costas {
                    loop_: CostasFsk::new(COSTAS_ALPHA, COSTAS_BETA, COSTAS_E_MAX, COSTAS_LOCK_AFTER, COSTAS_UNLOCK_AFTER),
                    bit_sync: MuellerMuller::new(MM_KW, MM_KM, sps, MM_ERROR_MIN, MM_ERROR_MAX),
                    last_decisions: Vec::new(),
                }
            }
            ProtocolConfig::Flex => {
                let sps = samples_per_symbol(1600, demod_rate);
                Demod::Costas {
                    loop_: CostasFsk::new(COSTAS_ALPHA, COSTAS_BETA, COSTAS_E_MAX, COSTAS_LOCK_AFTER, COSTAS_UNLOCK_AFTER),
                    bit_sync: MuellerMuller::new(MM_KW, MM_KM, sps, MM_ERROR_MIN, MM_ERROR_MAX),
                    last_decisions: Vec::new(),
                }
            }
            ProtocolConfig::Dect => {
                let sps = samples_per_symbol(1_152_000, demod_rate);
                Demod::Costas {
                    loop_: CostasFsk::new(COSTAS_ALPHA, COSTAS_BETA, COSTAS_E_MAX, COSTAS_LOCK_AFTER, COSTAS_UNLOCK_AFTER),
                    bit_sync: MuellerMuller::new(MM_KW, MM_KM, sps, MM_ERROR_MIN, MM_ERROR_MAX),
                    last_decisions: Vec::new(),
                }
            }
            ProtocolConfig::Raw => Demod::Fm(FmDemod::new()),
        };

        let sink = build_sink(cfg, &name)?;
        let channel_gain = gain_db_to_q15(cfg.gain_db);
        let debug_signal_tap = match &cfg.debug_signal_file {
            Some(path) => Some(BufWriter::new(open_output(path)?)),
            None => None,
        };

        Ok(Self { name, fir, resampler, channel_gain, demod, dc_blocker, debug_signal_tap, sink })
    }

    /// Processes one sample buffer's worth of interleaved complex I/Q and
    /// advances every decoder state it holds. Buffer-level decode errors
    /// are logged and the buffer dropped (§7); they never propagate.
    pub fn process(&mut self, buf: &SampleBuf) {
        let complex_samples = decode_complex_i16(buf.data());
        let mut fir_out = Vec::with_capacity(complex_samples.len());
        for s in complex_samples {
            if let Some(out) = self.fir.push(s) {
                fir_out.push(out);
            }
        }

        let resampled = match &mut self.resampler {
            Some(rs) => {
                rs.push(&fir_out);
                let mut out = vec![ComplexSample::new(0, 0); fir_out.len() * 4 + 16];
                let n = rs.process(&mut out);
                out.truncate(n);
                out
            }
            None => fir_out,
        };

        if resampled.is_empty() {
            return;
        }

        if let Some(tap) = &mut self.debug_signal_tap {
            write_complex_debug(tap, &resampled, &self.name);
        }

        let resampled: Vec<ComplexSample> = resampled.iter().map(|&s| scale_complex(s, self.channel_gain)).collect();

        match &mut self.demod {
            Demod::Fm(demod) => {
                let pcm: Vec<Sample> = resampled.iter().map(|&s| demod.process(s)).collect();
                self.dispatch_pcm(&pcm);
            }
            Demod::Costas { loop_, bit_sync, last_decisions } => {
                let mut levels = Vec::with_capacity(resampled.len());
                for &s in &resampled {
                    let (decision, _error) = loop_.process(s);
                    levels.push(if decision { i16::MAX } else { i16::MIN });
                }
                last_decisions.clear();
                bit_sync.process(&levels, last_decisions);
                let hard_bits: Vec<u8> = last_decisions.iter().map(|&s| if s >= 0 { 1 } else { 0 }).collect();
                self.dispatch_bits(&hard_bits);
            }
        }
    }

    fn dispatch_pcm(&mut self, pcm: &[Sample]) {
        let filtered: Vec<Sample> = match &mut self.dc_blocker {
            Some(b) => pcm.iter().map(|&x| b.process(x)).collect(),
            None => pcm.to_vec(),
        };
        match &mut self.sink {
            Sink::Ais(recv) => recv.on_pcm(&filtered),
            Sink::Raw(writer) => write_pcm(writer, &filtered, &self.name),
            _ => warn!(channel = %self.name, "FM demod path feeding a non-PCM sink"),
        }
    }

    fn dispatch_bits(&mut self, bits: &[u8]) {
        match &mut self.sink {
            Sink::Pocsag(dec) => dec.push_bits(bits),
            Sink::Flex(dec) => dec.push_bits(bits),
            Sink::Dect(dec) => dec.push_bits(bits),
            _ => debug!(channel = %self.name, n = bits.len(), "bit-sliced decisions with no bit-level sink"),
        }
    }
}

fn scale_complex(x: ComplexSample, gain: Q15) -> ComplexSample {
    use sdrx_core::fixed::{mac, round_to_sample};
    ComplexSample::new(round_to_sample(mac(gain, x.re)), round_to_sample(mac(gain, x.im)))
}

fn write_complex_debug(writer: &mut BufWriter<File>, samples: &[ComplexSample], name: &str) {
    for s in samples {
        let mut bytes = [0u8; 4];
        bytes[0..2].copy_from_slice(&s.re.to_le_bytes());
        bytes[2..4].copy_from_slice(&s.im.to_le_bytes());
        if let Err(e) = writer.write_all(&bytes) {
            warn!(channel = %name, error = %e, "debug signal tap write failed");
            return;
        }
    }
}

fn write_pcm(writer: &mut BufWriter<File>, samples: &[Sample], name: &str) {
    for &s in samples {
        if let Err(e) = writer.write_all(&s.to_le_bytes()) {
            warn!(channel = %name, error = %e, "raw PCM write failed");
            return;
        }
    }
}

fn decode_complex_i16(data: &[u8]) -> Vec<ComplexSample> {
    data.chunks_exact(4)
        .map(|c| Complex::new(i16::from_le_bytes([c[0], c[1]]), i16::from_le_bytes([c[2], c[3]])))
        .collect()
}

fn build_sink(cfg: &ChannelConfig, name: &str) -> SdrResult<Sink> {
    match &cfg.protocol {
        ProtocolConfig::Ais => {
            let channel = name.to_string();
            let recv = AisReceiver::new(Box::new(move |msg| info!(channel = %channel, ?msg, "AIS message")) as Box<dyn FnMut(_) + Send>);
            Ok(Sink::Ais(recv))
        }
        ProtocolConfig::Pocsag { baud_rate, skip_bch_decode } => {
            let channel = name.to_string();
            let dec = PocsagDecoder::new(
                *baud_rate as u16,
                *skip_bch_decode,
                Box::new(move |msg| info!(channel = %channel, ?msg, "POCSAG message")) as Box<dyn FnMut(_) + Send>,
            );
            Ok(Sink::Pocsag(dec))
        }
        ProtocolConfig::Flex => {
            let channel = name.to_string();
            let dec = FlexDecoder::new(1600, Box::new(move |msg| info!(channel = %channel, ?msg, "FLEX message")) as Box<dyn FnMut(_) + Send>);
            Ok(Sink::Flex(dec))
        }
        ProtocolConfig::Dect => {
            let channel = name.to_string();
            let dec = DectExtractor::new(Box::new(move |frame| info!(channel = %channel, ?frame, "DECT frame")) as Box<dyn FnMut(_) + Send>);
            Ok(Sink::Dect(dec))
        }
        ProtocolConfig::Raw => {
            let file = open_output(&cfg.out_fifo)?;
            Ok(Sink::Raw(BufWriter::new(file)))
        }
    }
}

fn open_output(path: &Path) -> SdrResult<File> {
    File::create(path).map_err(|e| {
        SdrError::new(sdrx_core::Facility::DeviceIo, sdrx_core::ErrorKind::NotFound)
            .with_detail(format!("opening channel output {}: {e}", path.display()))
    })
}
