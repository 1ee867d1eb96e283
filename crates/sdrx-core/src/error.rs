//! Uniform result/error kind shared by every subsystem.
//!
//! Mirrors the donor codebase's bit-packed `aresult_t` (facility + code +
//! error/warning bits) as a proper Rust enum: a `Result<T, SdrError>` costs
//! nothing extra here, so there is no reason to pack bits into an `i32`.

use std::fmt;

/// Which subsystem raised the error, for diagnostics and log filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facility {
    SampleBuffer,
    FrameAlloc,
    Dsp,
    Ais,
    Pocsag,
    Flex,
    Dect,
    Config,
    DeviceIo,
}

impl fmt::Display for Facility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Facility::SampleBuffer => "sample_buffer",
            Facility::FrameAlloc => "frame_alloc",
            Facility::Dsp => "dsp",
            Facility::Ais => "ais",
            Facility::Pocsag => "pocsag",
            Facility::Flex => "flex",
            Facility::Dect => "dect",
            Facility::Config => "config",
            Facility::DeviceIo => "device_io",
        };
        write!(f, "{s}")
    }
}

/// The error kind. Directly corresponds to the donor's `A_E_*` code family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    OutOfMemory,
    InvalidArgument,
    NotFound,
    Busy,
    InvalidState,
    Empty,
    NoEntity,
    Overflow,
    Full,
    EndOfFile,
    Rejected,
    Timeout,
    Done,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::OutOfMemory => "out of memory",
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::NotFound => "not found",
            ErrorKind::Busy => "busy",
            ErrorKind::InvalidState => "invalid state",
            ErrorKind::Empty => "empty",
            ErrorKind::NoEntity => "no entity",
            ErrorKind::Overflow => "overflow",
            ErrorKind::Full => "full",
            ErrorKind::EndOfFile => "end of file",
            ErrorKind::Rejected => "rejected",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Done => "done",
        };
        write!(f, "{s}")
    }
}

/// Whether a result represents a hard error or merely a warning.
/// (A warning is reported the same way as an error but does not imply
/// the caller must abandon whatever it was doing.)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A single uniform result kind, carrying a facility, a kind, a severity,
/// and an optional human-readable detail string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdrError {
    pub facility: Facility,
    pub kind: ErrorKind,
    pub severity: Severity,
    pub detail: Option<String>,
}

impl SdrError {
    pub fn new(facility: Facility, kind: ErrorKind) -> Self {
        Self { facility, kind, severity: Severity::Error, detail: None }
    }

    pub fn warning(facility: Facility, kind: ErrorKind) -> Self {
        Self { facility, kind, severity: Severity::Warning, detail: None }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn is_warning(&self) -> bool {
        matches!(self.severity, Severity::Warning)
    }
}

impl fmt::Display for SdrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sev = if self.is_warning() { "warning" } else { "error" };
        match &self.detail {
            Some(d) => write!(f, "[{}] {} ({}): {}", self.facility, sev, self.kind, d),
            None => write!(f, "[{}] {} ({})", self.facility, sev, self.kind),
        }
    }
}

impl std::error::Error for SdrError {}

pub type SdrResult<T> = Result<T, SdrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_stable_and_greppable() {
        let e = SdrError::new(Facility::Dsp, ErrorKind::InvalidArgument).with_detail("taps=0");
        let s = e.to_string();
        assert!(s.contains("dsp"));
        assert!(s.contains("invalid argument"));
        assert!(s.contains("taps=0"));
    }

    #[test]
    fn warning_severity_is_distinguishable() {
        let w = SdrError::warning(Facility::Ais, ErrorKind::Rejected);
        assert!(w.is_warning());
        assert!(!w.to_string().contains("] error"));
    }
}
