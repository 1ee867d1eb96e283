//! Single-page FLEX transmitter: drives `sdrx_protocols::flex_tx::FlexEncoder`
//! to completion, biphase-modulates the emitted bits to Q.15 PCM, and writes
//! the result to a file or FIFO (§4.12, §6 "Per-channel output").

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use sdrx_core::fixed::Sample;
use sdrx_protocols::flex_tx::{phase_for_frame, FlexEncoder, TxInput, TxPage, TxStep};

const DEFAULT_BAUD_RATE: u32 = 1600;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "sdrx FLEX page transmitter",
    long_about = "Encodes a single FLEX page and writes biphase-modulated PCM to a file or FIFO"
)]
struct Args {
    /// Destination capcode.
    capcode: u64,

    /// Page text (alphanumeric) or digits (with --numeric).
    text: String,

    /// Output PCM file or FIFO path.
    #[arg(long)]
    out: PathBuf,

    /// Encode `text` as a numeric page instead of alphanumeric.
    #[arg(long)]
    numeric: bool,

    /// FLEX cycle number (0-14).
    #[arg(long, default_value_t = 0)]
    cycle_no: u8,

    /// FLEX frame number (0-127); also determines the A/B/C/D phase.
    #[arg(long, default_value_t = 0)]
    frame_no: u8,

    /// Output PCM sample rate in Hz.
    #[arg(long, default_value_t = 8_000)]
    sample_rate: u32,

    /// Optional verbose log file.
    #[arg(long)]
    debug_log: Option<String>,
}

fn modulate(bits: &[u8], sample_rate: u32, baud_rate: u32) -> Vec<Sample> {
    let samples_per_symbol = (sample_rate as f64 / baud_rate as f64).round().max(1.0) as usize;
    let mut pcm = Vec::with_capacity(bits.len() * samples_per_symbol);
    for &bit in bits {
        let level: Sample = if bit != 0 { i16::MAX } else { i16::MIN };
        pcm.extend(std::iter::repeat(level).take(samples_per_symbol));
    }
    pcm
}

fn main() {
    let args = Args::parse();
    let _log_guard = sdrx_core::debug::setup_logging_default(args.debug_log.clone());

    eprintln!("sdrx-flexmitter {}", sdrx_core::STACK_VERSION);

    let phase = phase_for_frame(args.frame_no);
    info!(capcode = args.capcode, cycle_no = args.cycle_no, frame_no = args.frame_no, ?phase, "encoding page");

    let page = TxPage {
        capcode: args.capcode,
        cycle_no: args.cycle_no,
        frame_no: args.frame_no,
        numeric: args.numeric,
        text: args.text,
    };

    let mut encoder = FlexEncoder::new(page);
    let mut bits = Vec::new();
    loop {
        match encoder.step(TxInput::Tick) {
            TxStep::Emit(chunk) => bits.extend(chunk),
            TxStep::Yield => continue,
            TxStep::Done => break,
            TxStep::Error(e) => {
                eprintln!("encoder error: {e}");
                error!(error = %e, "FLEX encoder failed");
                std::process::exit(1);
            }
        }
    }

    let pcm = modulate(&bits, args.sample_rate, DEFAULT_BAUD_RATE);

    let file = match File::create(&args.out) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("failed to open {}: {e}", args.out.display());
            error!(error = %e, path = %args.out.display(), "failed to open output");
            std::process::exit(1);
        }
    };
    let mut writer = BufWriter::new(file);
    for sample in &pcm {
        if let Err(e) = writer.write_all(&sample.to_le_bytes()) {
            error!(error = %e, "write failed");
            std::process::exit(1);
        }
    }
    if let Err(e) = writer.flush() {
        error!(error = %e, "flush failed");
        std::process::exit(1);
    }

    info!(nr_bits = bits.len(), nr_samples = pcm.len(), "page transmitted");
}
