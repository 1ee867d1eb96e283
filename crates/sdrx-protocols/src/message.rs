//! Strongly-typed decoded-message sum type (§6, §9 "Type-erased callbacks to
//! sum types"), replacing the donor's opaque-state-pointer callbacks.

/// AIS position report (message types 1, 2, 3).
#[derive(Debug, Clone, PartialEq)]
pub struct AisPositionReport {
    pub mmsi: u32,
    pub nav_status: u8,
    pub rate_of_turn: i8,
    pub speed_over_ground: f32,
    pub position_accuracy: bool,
    pub longitude: f64,
    pub latitude: f64,
    pub course_over_ground: f32,
    pub true_heading: u16,
    pub timestamp_sec: u8,
}

/// AIS base station report (message type 4).
#[derive(Debug, Clone, PartialEq)]
pub struct AisBaseStationReport {
    pub mmsi: u32,
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub longitude: f64,
    pub latitude: f64,
    pub epfd_type: u8,
}

/// AIS static and voyage-related data (message type 5).
#[derive(Debug, Clone, PartialEq)]
pub struct AisStaticVoyageData {
    pub mmsi: u32,
    pub ais_version: u8,
    pub imo_number: u32,
    pub callsign: String,
    pub ship_name: String,
    pub ship_type: u8,
    pub dim_to_bow: u16,
    pub dim_to_stern: u16,
    pub dim_to_port: u16,
    pub dim_to_starboard: u16,
    pub epfd_type: u8,
    pub eta_month: u8,
    pub eta_day: u8,
    pub eta_hour: u8,
    pub eta_minute: u8,
    pub draught: f32,
    pub destination: String,
}

/// An AIS message, with the raw HDLC payload bytes always attached.
#[derive(Debug, Clone, PartialEq)]
pub enum AisMessage {
    PositionReport(AisPositionReport),
    BaseStationReport(AisBaseStationReport),
    StaticVoyageData(AisStaticVoyageData),
    /// A message type this decoder doesn't interpret, or a frame with a
    /// failed FCS delivered because the caller asked for raw frames.
    Unparsed { message_type: u8, fcs_valid: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PocsagAlphaMessage {
    pub capcode: u32,
    pub function: u8,
    pub baud_rate: u16,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PocsagNumericMessage {
    pub capcode: u32,
    pub function: u8,
    pub baud_rate: u16,
    pub digits: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PocsagMessage {
    Alpha(PocsagAlphaMessage),
    Numeric(PocsagNumericMessage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlexPhase {
    A,
    B,
    C,
    D,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlexAlphanumericMessage {
    pub capcode: u64,
    pub baud_rate: u16,
    pub phase: FlexPhase,
    pub cycle_no: u8,
    pub frame_no: u8,
    pub fragmented: bool,
    pub mail_drop: bool,
    pub sequence_number: u8,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlexNumericMessage {
    pub capcode: u64,
    pub baud_rate: u16,
    pub phase: FlexPhase,
    pub cycle_no: u8,
    pub frame_no: u8,
    pub digits: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlexMessage {
    Alphanumeric(FlexAlphanumericMessage),
    Numeric(FlexNumericMessage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DectSyncKind {
    FixedPart,
    PortablePart,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DectFrame {
    pub sync: DectSyncKind,
    pub header: u8,
    pub tail: u64,
    pub crc_valid: bool,
    pub b_field: Vec<u8>,
}

/// The union of every message a channel worker's protocol decoder can emit.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedMessage {
    Ais(AisMessage),
    Pocsag(PocsagMessage),
    Flex(FlexMessage),
    Dect(DectFrame),
}
