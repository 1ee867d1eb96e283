mod producer;
mod signals;
mod worker;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use clap::Parser;
use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{error, info};

use sdrx_config::ReceiverConfig;
use sdrx_core::samplebuf::SampleType;
use sdrx_core::{FrameAllocator, SampleBuf};

use signals::SignalMux;
use worker::ChannelWorker;

/// Frames held in flight at once, shared across every channel (§3, §4.1).
const FRAME_POOL_SIZE: usize = 64;
const SAMPLES_PER_FRAME: usize = 16_384;
/// Backlog tolerated on a channel worker's input queue before the producer
/// blocks on `send`; a worker falling this far behind is already dropping
/// real-time guarantees, so a bound here just turns unbounded memory growth
/// into backpressure instead.
const CHANNEL_QUEUE_DEPTH: usize = 64;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "sdrx multi-protocol SDR receiver",
    long_about = "Demodulates and decodes AIS, POCSAG, FLEX, and DECT traffic from a tuned IQ stream, per a layered TOML configuration"
)]
struct Args {
    /// One or more TOML configuration files, applied in order (later files
    /// patch earlier ones).
    #[arg(required = true)]
    config: Vec<String>,
}

fn load_config(paths: &[String]) -> ReceiverConfig {
    match sdrx_config::load_layered(paths) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            std::process::exit(1);
        }
    }
}

fn main() {
    eprintln!("sdrx-receiver {}", sdrx_core::STACK_VERSION);

    let args = Args::parse();
    let cfg = load_config(&args.config);
    if let Err(e) = cfg.validate() {
        eprintln!("invalid configuration: {e}");
        std::process::exit(1);
    }

    let _log_guard = sdrx_core::debug::setup_logging_default(cfg.debug_log.as_ref().map(|p| p.display().to_string()));

    let frame_bytes = SampleType::ComplexI16.sample_bytes() * SAMPLES_PER_FRAME;
    let allocator = match FrameAllocator::new(frame_bytes, FRAME_POOL_SIZE) {
        Ok(a) => a,
        Err(e) => {
            error!(error = %e, "failed to construct frame allocator");
            std::process::exit(1);
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    let signals = Arc::new(SignalMux::new());
    signals::install();

    {
        let allocator_stats = allocator.clone();
        signals.register(move || {
            let (used, free) = allocator_stats.counts();
            info!(used, free, "SIGUSR2: frame allocator status");
        });
    }

    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })
        .expect("failed to set SIGINT handler");
    }

    let mut worker_handles = Vec::new();
    let mut senders: Vec<Sender<Arc<SampleBuf>>> = Vec::new();

    for ch_cfg in &cfg.channels {
        let (tx, rx): (Sender<Arc<SampleBuf>>, Receiver<Arc<SampleBuf>>) = bounded(CHANNEL_QUEUE_DEPTH);
        senders.push(tx);

        let mut worker = match ChannelWorker::new(ch_cfg, cfg.sample_rate, cfg.center_freq) {
            Ok(w) => w,
            Err(e) => {
                error!(error = %e, channel = %ch_cfg.out_fifo.display(), "failed to construct channel worker");
                std::process::exit(1);
            }
        };
        let running = running.clone();
        let channel_name = ch_cfg.out_fifo.display().to_string();
        worker_handles.push(thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                match rx.recv_timeout(std::time::Duration::from_millis(200)) {
                    Ok(buf) => worker.process(&buf),
                    Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
                    Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
                }
            }
            info!(channel = %channel_name, "channel worker stopped");
        }));
    }

    info!(nr_channels = cfg.channels.len(), "starting producer");
    producer::run(&cfg, allocator, senders, running.clone(), &signals);

    for handle in worker_handles {
        let _ = handle.join();
    }
}
