//! DSP building blocks for the SDR receive chain: channelizing filters,
//! resamplers, demodulators, and timing recovery.

pub mod bit_sync;
pub mod costas;
pub mod dc_blocker;
pub mod derotator;
pub mod fir;
pub mod fm_demod;
pub mod resampler;

pub use bit_sync::MuellerMuller;
pub use costas::{CostasFsk, LockState};
pub use dc_blocker::DcBlocker;
pub use derotator::Derotator;
pub use fir::{ComplexSample, DirectFirComplex};
pub use fm_demod::{fast_atan2, FmDemod};
pub use resampler::{PolyphaseResamplerComplex, PolyphaseResamplerReal};
