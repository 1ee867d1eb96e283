//! TOML configuration loading: DTO structs deserialize the on-disk document,
//! reject unrecognized keys via a `#[serde(flatten)] extra` catch-all, then
//! get converted and merged into the runtime [`ReceiverConfig`].
//!
//! Multiple configuration files may be given; each is parsed into a patch
//! and applied over the running configuration in argument order, so later
//! files override fields set by earlier ones rather than replacing the
//! whole document.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use toml::Value;

use crate::config::{ChannelConfig, CoreIds, DeviceConfig, DeviceKind, ProtocolConfig, ReceiverConfig, DEFAULT_READ_FAILURE_THRESHOLD};

pub fn from_toml_str(toml_str: &str) -> Result<ReceiverConfig, String> {
    let root: TomlConfigRoot = toml::from_str(toml_str).map_err(|e| e.to_string())?;
    let cfg = into_config(root)?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn from_reader<R: Read>(reader: R) -> Result<ReceiverConfig, String> {
    let mut contents = String::new();
    BufReader::new(reader).read_to_string(&mut contents).map_err(|e| e.to_string())?;
    from_toml_str(&contents)
}

pub fn from_file<P: AsRef<Path>>(path: P) -> Result<ReceiverConfig, String> {
    let f = File::open(path).map_err(|e| e.to_string())?;
    from_reader(BufReader::new(f))
}

/// Load one or more configuration files, applying each in order as a patch
/// over the previous result. The first file must fully determine the
/// config (all required fields present); later files override individual
/// fields and may add or replace individual channels by index.
pub fn load_layered<P: AsRef<Path>>(paths: &[P]) -> Result<ReceiverConfig, String> {
    if paths.is_empty() {
        return Err("at least one configuration file must be given".into());
    }
    let mut contents = String::new();
    File::open(&paths[0]).map_err(|e| e.to_string())?.read_to_string(&mut contents).map_err(|e| e.to_string())?;
    let mut root: TomlConfigRoot = toml::from_str(&contents).map_err(|e| e.to_string())?;

    for path in &paths[1..] {
        let mut patch_str = String::new();
        File::open(path).map_err(|e| e.to_string())?.read_to_string(&mut patch_str).map_err(|e| e.to_string())?;
        let patch: TomlConfigRoot = toml::from_str(&patch_str).map_err(|e| e.to_string())?;
        apply_root_patch(&mut root, patch);
    }

    let cfg = into_config(root)?;
    cfg.validate()?;
    Ok(cfg)
}

fn apply_root_patch(dst: &mut TomlConfigRoot, src: TomlConfigRoot) {
    if let Some(v) = src.sample_rate {
        dst.sample_rate = Some(v);
    }
    if let Some(v) = src.center_freq {
        dst.center_freq = Some(v);
    }
    if let Some(v) = src.debug_log {
        dst.debug_log = Some(v);
    }
    if let Some(v) = src.core_ids {
        dst.core_ids = Some(v);
    }
    if let Some(device) = src.device {
        dst.device = Some(device);
    }
    if let Some(channels) = src.channels {
        dst.channels = Some(channels);
    }
    dst.extra.extend(src.extra);
}

fn into_config(root: TomlConfigRoot) -> Result<ReceiverConfig, String> {
    if !root.extra.is_empty() {
        return Err(format!("unrecognized top-level fields: {:?}", sorted_keys(&root.extra)));
    }

    let sample_rate = root.sample_rate.ok_or("missing required field: sampleRate")?;
    let center_freq = root.center_freq.ok_or("missing required field: centerFreq")?;
    let channels_dto = root.channels.ok_or("missing required field: channels")?;

    let mut channels = Vec::with_capacity(channels_dto.len());
    for (i, ch) in channels_dto.into_iter().enumerate() {
        channels.push(convert_channel(ch).map_err(|e| format!("channels[{i}]: {e}"))?);
    }

    let device = match root.device {
        Some(d) => convert_device(d)?,
        None => DeviceConfig::default(),
    };

    let core_ids = match root.core_ids {
        Some(CoreIdsDto::Single(n)) => CoreIds::single(n),
        Some(CoreIdsDto::List(v)) => CoreIds(v),
        None => CoreIds::default(),
    };

    Ok(ReceiverConfig {
        sample_rate,
        center_freq,
        channels,
        device,
        core_ids,
        debug_log: root.debug_log.map(PathBuf::from),
        read_failure_threshold: DEFAULT_READ_FAILURE_THRESHOLD,
    })
}

fn convert_channel(ch: ChannelDto) -> Result<ChannelConfig, String> {
    if !ch.extra.is_empty() {
        return Err(format!("unrecognized fields: {:?}", sorted_keys(&ch.extra)));
    }

    let protocol = match ch.protocol {
        None => ProtocolConfig::Raw,
        Some(ProtocolDto::Raw) => ProtocolConfig::Raw,
        Some(ProtocolDto::Ais) => ProtocolConfig::Ais,
        Some(ProtocolDto::Flex) => ProtocolConfig::Flex,
        Some(ProtocolDto::Dect) => ProtocolConfig::Dect,
        Some(ProtocolDto::Pocsag { baud_rate, skip_bch_decode, extra }) => {
            if !extra.is_empty() {
                return Err(format!("unrecognized POCSAG fields: {:?}", sorted_keys(&extra)));
            }
            ProtocolConfig::Pocsag { baud_rate: baud_rate.unwrap_or(1200), skip_bch_decode: skip_bch_decode.unwrap_or(false) }
        }
    };

    Ok(ChannelConfig {
        freq_hz: ch.freq_hz,
        out_fifo: PathBuf::from(ch.out_fifo),
        decimation_factor: ch.decimation_factor,
        lpf_taps: ch.lpf_taps,
        resample_decimate: ch.resample_decimate,
        resample_interpolate: ch.resample_interpolate,
        resample_filter_taps: ch.resample_filter_taps,
        dc_blocker_pole: ch.dc_blocker_pole,
        enable_dc_blocker: ch.enable_dc_blocker.unwrap_or(true),
        gain_db: ch.gain_db.unwrap_or(0.0),
        debug_signal_file: ch.debug_signal_file.map(PathBuf::from),
        protocol,
    })
}

fn convert_device(d: DeviceDto) -> Result<DeviceConfig, String> {
    if !d.extra.is_empty() {
        return Err(format!("unrecognized device fields: {:?}", sorted_keys(&d.extra)));
    }
    let kind = match d.kind.as_str() {
        "rtl" => DeviceKind::Rtl,
        "airspy" => DeviceKind::Airspy,
        "uhd" => DeviceKind::Uhd,
        "file" => DeviceKind::File,
        other => return Err(format!("unrecognized device.kind: {other:?}")),
    };
    if kind == DeviceKind::File && d.input_file.is_none() {
        return Err("device.kind = \"file\" requires device.inputFile".into());
    }
    Ok(DeviceConfig {
        kind,
        device_index: d.device_index.unwrap_or(0),
        gain_db: d.gain_db,
        ppm_error: d.ppm_error,
        input_file: d.input_file.map(PathBuf::from),
    })
}

fn sorted_keys(map: &HashMap<String, Value>) -> Vec<&str> {
    let mut v: Vec<&str> = map.keys().map(|s| s.as_str()).collect();
    v.sort_unstable();
    v
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TomlConfigRoot {
    sample_rate: Option<u32>,
    center_freq: Option<u32>,
    #[serde(default)]
    channels: Option<Vec<ChannelDto>>,
    #[serde(default)]
    device: Option<DeviceDto>,
    #[serde(default)]
    core_ids: Option<CoreIdsDto>,
    #[serde(default)]
    debug_log: Option<String>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CoreIdsDto {
    Single(u32),
    List(Vec<u32>),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelDto {
    freq_hz: u32,
    out_fifo: String,
    decimation_factor: u32,
    #[serde(default)]
    lpf_taps: Vec<f64>,
    resample_decimate: u32,
    resample_interpolate: u32,
    #[serde(default)]
    resample_filter_taps: Vec<f64>,
    dc_blocker_pole: f64,
    #[serde(default)]
    enable_dc_blocker: Option<bool>,
    #[serde(default)]
    gain_db: Option<f64>,
    #[serde(default)]
    debug_signal_file: Option<String>,
    #[serde(default)]
    protocol: Option<ProtocolDto>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum ProtocolDto {
    Raw,
    Ais,
    Flex,
    Dect,
    Pocsag {
        #[serde(default, rename = "baudRate")]
        baud_rate: Option<u32>,
        #[serde(default, rename = "skipBchDecode")]
        skip_bch_decode: Option<bool>,
        #[serde(flatten)]
        extra: HashMap<String, Value>,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceDto {
    kind: String,
    #[serde(default)]
    device_index: Option<u32>,
    #[serde(default)]
    gain_db: Option<f64>,
    #[serde(default)]
    ppm_error: Option<f64>,
    #[serde(default)]
    input_file: Option<String>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        sampleRate = 2048000
        centerFreq = 162000000

        [device]
        kind = "rtl"

        [[channels]]
        freqHz = 161975000
        outFifo = "/tmp/ais.fifo"
        decimationFactor = 10
        resampleDecimate = 1
        resampleInterpolate = 1
        dcBlockerPole = 0.9

        [channels.protocol]
        kind = "ais"
    "#;

    #[test]
    fn minimal_document_parses() {
        let cfg = from_toml_str(MINIMAL).unwrap();
        assert_eq!(cfg.sample_rate, 2_048_000);
        assert_eq!(cfg.channels.len(), 1);
        assert_eq!(cfg.channels[0].protocol, ProtocolConfig::Ais);
    }

    #[test]
    fn unrecognized_top_level_key_is_rejected() {
        let doc = format!("{MINIMAL}\nbogusKey = 1\n");
        let err = from_toml_str(&doc).unwrap_err();
        assert!(err.contains("bogusKey"));
    }

    #[test]
    fn unrecognized_channel_key_is_rejected() {
        let doc = MINIMAL.replace("dcBlockerPole = 0.9", "dcBlockerPole = 0.9\nbogusChannelKey = 1");
        let err = from_toml_str(&doc).unwrap_err();
        assert!(err.contains("bogusChannelKey"));
    }

    #[test]
    fn pocsag_defaults_are_applied() {
        let doc = MINIMAL.replace(
            "[channels.protocol]\nkind = \"ais\"",
            "[channels.protocol]\nkind = \"pocsag\"",
        );
        let cfg = from_toml_str(&doc).unwrap();
        assert_eq!(cfg.channels[0].protocol, ProtocolConfig::Pocsag { baud_rate: 1200, skip_bch_decode: false });
    }

    #[test]
    fn file_device_without_input_file_is_rejected() {
        let doc = MINIMAL.replace("kind = \"rtl\"", "kind = \"file\"");
        let err = from_toml_str(&doc).unwrap_err();
        assert!(err.contains("inputFile"));
    }
}
