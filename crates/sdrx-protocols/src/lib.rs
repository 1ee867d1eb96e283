//! Protocol decoders for the receive chain: AIS, POCSAG, FLEX, and DECT,
//! plus the BCH and CRC primitives shared across them.

pub mod ais;
pub mod bch;
pub mod crc16;
pub mod dect;
pub mod flex;
pub mod flex_tx;
pub mod message;
pub mod pocsag;

pub use ais::AisReceiver;
pub use bch::{pocsag_flex_bch, BchCode};
pub use dect::DectExtractor;
pub use flex::FlexDecoder;
pub use flex_tx::{FlexEncoder, TxInput, TxPage, TxStep};
pub use message::DecodedMessage;
pub use pocsag::PocsagDecoder;
