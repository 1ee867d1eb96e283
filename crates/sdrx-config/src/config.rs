//! Runtime configuration types (post-validation, post-patch). These are what
//! the receiver and flexmitter binaries actually consume; the TOML DTOs in
//! [`crate::toml_config`] exist only to get here safely.

use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Rtl,
    Airspy,
    Uhd,
    File,
}

#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub kind: DeviceKind,
    /// RTL-SDR / Airspy device index, or UHD device args string encoded as an index placeholder.
    pub device_index: u32,
    pub gain_db: Option<f64>,
    pub ppm_error: Option<f64>,
    /// Only meaningful for `DeviceKind::File`.
    pub input_file: Option<PathBuf>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self { kind: DeviceKind::Rtl, device_index: 0, gain_db: None, ppm_error: None, input_file: None }
    }
}

/// CPU core pinning: either a single core, or an explicit list (one entry
/// per worker thread, round-robin if fewer entries than threads).
#[derive(Debug, Clone, Default)]
pub struct CoreIds(pub Vec<u32>);

impl CoreIds {
    pub fn single(core: u32) -> Self {
        Self(vec![core])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolConfig {
    Raw,
    Ais,
    Pocsag { baud_rate: u32, skip_bch_decode: bool },
    Flex,
    Dect,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        ProtocolConfig::Raw
    }
}

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub freq_hz: u32,
    pub out_fifo: PathBuf,
    pub decimation_factor: u32,
    pub lpf_taps: Vec<f64>,
    pub resample_decimate: u32,
    pub resample_interpolate: u32,
    pub resample_filter_taps: Vec<f64>,
    pub dc_blocker_pole: f64,
    pub enable_dc_blocker: bool,
    pub gain_db: f64,
    pub debug_signal_file: Option<PathBuf>,
    pub protocol: ProtocolConfig,
}

/// Consecutive driver read failures tolerated before the producer gives up
/// and signals shutdown (§7, §1.2 of the originating design notes).
pub const DEFAULT_READ_FAILURE_THRESHOLD: u32 = 8;

#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    pub sample_rate: u32,
    pub center_freq: u32,
    pub channels: Vec<ChannelConfig>,
    pub device: DeviceConfig,
    pub core_ids: CoreIds,
    pub debug_log: Option<PathBuf>,
    pub read_failure_threshold: u32,
}

impl ReceiverConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sampleRate must be nonzero".into());
        }
        if self.channels.is_empty() {
            return Err("at least one channel must be configured".into());
        }
        for (i, ch) in self.channels.iter().enumerate() {
            if ch.decimation_factor == 0 {
                return Err(format!("channels[{i}].decimationFactor must be nonzero"));
            }
            if ch.resample_decimate == 0 || ch.resample_interpolate == 0 {
                return Err(format!("channels[{i}] resample ratio must have nonzero numerator and denominator"));
            }
            if !(-1.0..=1.0).contains(&ch.dc_blocker_pole) {
                return Err(format!("channels[{i}].dcBlockerPole must lie in [-1.0, 1.0]"));
            }
            if matches!(ch.protocol, ProtocolConfig::Pocsag { baud_rate: 0, .. }) {
                return Err(format!("channels[{i}] POCSAG baudRate must be nonzero"));
            }
        }
        if self.device.kind == DeviceKind::File && self.device.input_file.is_none() {
            return Err("device.kind = \"file\" requires device.inputFile".into());
        }
        Ok(())
    }
}
