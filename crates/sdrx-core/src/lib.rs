//! Core utilities shared across the SDR receive chain: the uniform error
//! type, fixed-point primitives, the reference-counted sample buffer pool,
//! the bit-level field reader, and logging setup.

/// Git version string, set at compile time.
pub const GIT_VERSION: &str = git_version::git_version!(fallback = "unknown");
/// Crate version followed by git version string, e.g. "0.1.0-aabbccdd".
pub const STACK_VERSION: &str = const_format::formatcp!("{}-{}", env!("CARGO_PKG_VERSION"), GIT_VERSION);

pub mod bitbuffer;
pub mod debug;
pub mod error;
pub mod fixed;
pub mod samplebuf;
pub mod ticket_lock;

pub use bitbuffer::BitBuffer;
pub use error::{ErrorKind, Facility, SdrError, SdrResult, Severity};
pub use fixed::{round_to_sample, Acc, Q15, Sample, FRAC_BITS};
pub use samplebuf::{FrameAllocator, SampleBuf, SampleType};
pub use ticket_lock::TicketLock;

/// A complex sample, interleaved I/Q, as threaded through the DSP pipeline.
pub type ComplexSample = num_complex::Complex<Sample>;

/// Monotonic sample-clock timestamp, nanoseconds since the receiver started.
pub type TimestampNs = u64;
