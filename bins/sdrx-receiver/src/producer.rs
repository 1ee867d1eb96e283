//! Sample producer: reads raw interleaved complex I/Q from the configured
//! device and publishes buffers to every channel worker (§4.1, §5, §7).
//!
//! Only `DeviceKind::File` is implemented. The donor hardware backends
//! (RTL-SDR, Airspy, UHD) have no Rust crate in this workspace's dependency
//! set; rather than fabricate one, those kinds fail the same way the donor
//! failed on stack/backend combinations it didn't implement.

use std::fs::File;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Sender;
use tracing::{error, info, warn};

use sdrx_config::{DeviceConfig, DeviceKind, ReceiverConfig};
use sdrx_core::samplebuf::SampleType;
use sdrx_core::{FrameAllocator, SampleBuf, SdrError, SdrResult};

use crate::signals::SignalMux;

const SAMPLES_PER_FRAME: usize = 16_384;

trait SampleDevice {
    /// Reads exactly one frame's worth of interleaved I/Q bytes into `buf`.
    /// Returns `Ok(())` on a full read, `Err` on any short read or I/O
    /// failure — the producer treats both as one failed read attempt.
    fn read_frame(&mut self, buf: &mut [u8]) -> SdrResult<()>;
}

struct FileDevice {
    file: File,
}

impl SampleDevice for FileDevice {
    fn read_frame(&mut self, buf: &mut [u8]) -> SdrResult<()> {
        self.file.read_exact(buf).map_err(|e| {
            SdrError::new(sdrx_core::Facility::DeviceIo, sdrx_core::ErrorKind::EndOfFile).with_detail(e.to_string())
        })
    }
}

fn open_device(cfg: &DeviceConfig) -> SdrResult<Box<dyn SampleDevice + Send>> {
    match cfg.kind {
        DeviceKind::File => {
            let path = cfg.input_file.as_ref().ok_or_else(|| {
                SdrError::new(sdrx_core::Facility::Config, sdrx_core::ErrorKind::InvalidArgument)
                    .with_detail("device.kind = file requires device.inputFile")
            })?;
            let file = File::open(path).map_err(|e| {
                SdrError::new(sdrx_core::Facility::DeviceIo, sdrx_core::ErrorKind::NotFound)
                    .with_detail(format!("opening {}: {e}", path.display()))
            })?;
            Ok(Box::new(FileDevice { file }))
        }
        DeviceKind::Rtl | DeviceKind::Airspy | DeviceKind::Uhd => {
            Err(SdrError::new(sdrx_core::Facility::DeviceIo, sdrx_core::ErrorKind::NotFound)
                .with_detail(format!("unsupported device backend: {:?}", cfg.kind)))
        }
    }
}

/// Runs the producer loop until `running` is cleared or the device's
/// consecutive-read-failure threshold is exceeded. `senders` holds one
/// channel per configured channel worker, in configuration order.
pub fn run(cfg: &ReceiverConfig, allocator: FrameAllocator, senders: Vec<Sender<Arc<SampleBuf>>>, running: Arc<AtomicBool>, signals: &SignalMux) {
    let mut device = match open_device(&cfg.device) {
        Ok(d) => d,
        Err(e) => {
            error!(error = %e, "producer failed to open device, shutting down");
            running.store(false, Ordering::SeqCst);
            return;
        }
    };

    let frame_bytes = SampleType::ComplexI16.sample_bytes() * SAMPLES_PER_FRAME;
    let mut consecutive_failures: u32 = 0;
    let mut samples_since_start: u64 = 0;

    info!(sample_rate = cfg.sample_rate, nr_channels = senders.len(), "producer starting");

    let mut raw = vec![0u8; frame_bytes];

    while running.load(Ordering::SeqCst) {
        signals.poll();

        match device.read_frame(&mut raw) {
            Ok(()) => {
                consecutive_failures = 0;
                let start_time_ns = samples_since_start * 1_000_000_000 / cfg.sample_rate as u64;
                samples_since_start += SAMPLES_PER_FRAME as u64;

                let Some(mut buf) = allocator.allocate() else {
                    warn!("frame allocator exhausted, dropping this buffer");
                    std::thread::sleep(Duration::from_millis(5));
                    continue;
                };
                let fill_result = SampleBuf::fill(&mut buf, SampleType::ComplexI16, SAMPLES_PER_FRAME as u32, start_time_ns, |dst| {
                    dst.copy_from_slice(&raw);
                });
                match fill_result {
                    Ok(()) => publish_to_workers(buf, &senders),
                    Err(e) => error!(error = %e, "failed to fill allocated buffer"),
                }
            }
            Err(e) => {
                consecutive_failures += 1;
                warn!(error = %e, consecutive_failures, "device read failed");
                if consecutive_failures >= cfg.read_failure_threshold {
                    error!(consecutive_failures, "read failure threshold exceeded, shutting down");
                    running.store(false, Ordering::SeqCst);
                }
            }
        }
    }

    info!("producer stopped");
}

fn publish_to_workers(buf: Arc<SampleBuf>, senders: &[Sender<Arc<SampleBuf>>]) {
    match FrameAllocator::publish(buf, senders.len() as u32) {
        Ok(handles) => {
            for (handle, sender) in handles.into_iter().zip(senders) {
                if sender.send(handle).is_err() {
                    warn!("channel worker disconnected, dropping buffer");
                }
            }
        }
        Err(e) => error!(error = %e, "failed to publish buffer to channel workers"),
    }
}
