//! Transport framing ("reliable messages"): connection handshake, data frames, selective
//! acknowledgment and hard disconnect. Two families share the first byte: data frames have
//! the DATA bit set, command frames the COMMAND_FRAME bit plus a second opcode byte.
//!
//! Whether frames carry a signature is connection state negotiated at handshake time, not
//! derivable from the bytes, so the signing flag is threaded into decode and encode.

use bytes::{Bytes, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use tracing::debug;

pub mod command_frames;
pub mod data_frame;
pub mod sack;
pub mod sequence_id;
pub mod session_id;

pub use command_frames::{ConnectMessage, ConnectedMessage, HardDisconnectMessage};
pub use data_frame::{DataFrameBody, DataFrameMessage, PacketControl};
pub use sack::{SackFlags, SackMessage};
pub use sequence_id::SequenceId;
pub use session_id::SessionId;

bitflags::bitflags! {
    /// First byte of every frame. COMMAND_FRAME shares its bit with USER_2: the bit means
    ///  "user flag 2" on data frames and "command frame" when DATA is clear.
    #[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
    pub struct PacketCommand: u8 {
        const DATA = 0x01;
        const RELIABLE = 0x02;
        const SEQUENTIAL = 0x04;
        const POLL = 0x08;
        const NEW_MESSAGE = 0x10;
        const END_MESSAGE = 0x20;
        const USER_1 = 0x40;
        const USER_2 = 0x80;
        const COMMAND_FRAME = 0x80;
    }
}

/// Second byte of a command frame. CONNECTED_SIGNED exists on the wire but is not part of
///  the decoded set; such frames come back as unrecognized.
#[derive(Copy, Clone, Eq, PartialEq, Debug, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ExtendedOpcode {
    Connect = 0x01,
    Connected = 0x02,
    ConnectedSigned = 0x03,
    HardDisconnect = 0x04,
    Sack = 0x06,
}

/// One value per reliable frame type; [ReliableMessage::decode] and
///  [ReliableMessage::encode] are the entry points the session layer uses.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ReliableMessage {
    Connect(ConnectMessage),
    Connected(ConnectedMessage),
    HardDisconnect(HardDisconnectMessage),
    Sack(SackMessage),
    DataFrame(DataFrameMessage),
}

impl ReliableMessage {
    /// Decodes a whole datagram. Unknown frames yield `None`; so do command bytes the
    ///  protocol declares malformed (anything but COMMAND_FRAME or COMMAND_FRAME | POLL on
    ///  a command frame).
    pub fn decode(data: &[u8], signing_enabled: bool) -> Option<ReliableMessage> {
        if data.len() < 4 {
            debug!("datagram of {} bytes is too short for a frame header", data.len());
            return None;
        }

        let command = PacketCommand::from_bits_retain(data[0]);
        if command.contains(PacketCommand::DATA) {
            return match DataFrameMessage::deser(data, signing_enabled) {
                Ok(message) => Some(ReliableMessage::DataFrame(message)),
                Err(e) => {
                    debug!("dropping undecodable data frame: {:#}", e);
                    None
                }
            };
        }

        if !command.contains(PacketCommand::COMMAND_FRAME) {
            debug!("unrecognized command byte {:#04x}", command.bits());
            return None;
        }
        if data.len() < 12 {
            debug!("command frame of {} bytes is too short", data.len());
            return None;
        }
        if command != PacketCommand::COMMAND_FRAME
            && command != (PacketCommand::COMMAND_FRAME | PacketCommand::POLL)
        {
            debug!("malformed command byte {:#04x} on a command frame", command.bits());
            return None;
        }

        let Ok(opcode) = ExtendedOpcode::try_from_primitive(data[1])
        else {
            debug!("unrecognized opcode {:#04x}", data[1]);
            return None;
        };
        let result = match opcode {
            ExtendedOpcode::Connect => ConnectMessage::deser(data).map(ReliableMessage::Connect),
            ExtendedOpcode::Connected => {
                ConnectedMessage::deser(data).map(ReliableMessage::Connected)
            }
            ExtendedOpcode::HardDisconnect => HardDisconnectMessage::deser(data, signing_enabled)
                .map(ReliableMessage::HardDisconnect),
            ExtendedOpcode::Sack => {
                SackMessage::deser(data, signing_enabled).map(ReliableMessage::Sack)
            }
            ExtendedOpcode::ConnectedSigned => {
                debug!("signed handshake frames are not part of the decoded set");
                return None;
            }
        };

        match result {
            Ok(message) => Some(message),
            Err(e) => {
                debug!("dropping undecodable {:?} frame: {:#}", opcode, e);
                None
            }
        }
    }

    pub fn ser(&self, buf: &mut BytesMut, signing_enabled: bool) {
        match self {
            ReliableMessage::Connect(m) => m.ser(buf),
            ReliableMessage::Connected(m) => m.ser(buf),
            ReliableMessage::HardDisconnect(m) => m.ser(buf, signing_enabled),
            ReliableMessage::Sack(m) => m.ser(buf, signing_enabled),
            ReliableMessage::DataFrame(m) => m.ser(buf, signing_enabled),
        }
    }

    pub fn encode(&self, signing_enabled: bool) -> Bytes {
        let mut buf = BytesMut::new();
        self.ser(&mut buf, signing_enabled);
        buf.freeze()
    }
}

/// splits a 64-bit mask into its optional wire halves; a half is carried iff non-zero
pub fn mask_halves(mask: u64) -> (Option<u32>, Option<u32>) {
    let low = mask as u32;
    let high = (mask >> 32) as u32;
    ((low != 0).then_some(low), (high != 0).then_some(high))
}

pub fn combine_mask(low: Option<u32>, high: Option<u32>) -> u64 {
    low.unwrap_or(0) as u64 | (high.unwrap_or(0) as u64) << 32
}
