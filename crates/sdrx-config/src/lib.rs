//! Configuration loading for the SDR receive chain: TOML documents are
//! deserialized into DTOs (unknown keys rejected), then converted into the
//! runtime [`ReceiverConfig`] tree consumed by the rest of the workspace.

pub mod config;
pub mod toml_config;

pub use config::{ChannelConfig, CoreIds, DeviceConfig, DeviceKind, ProtocolConfig, ReceiverConfig, DEFAULT_READ_FAILURE_THRESHOLD};
pub use toml_config::{from_file, from_reader, from_toml_str, load_layered};
