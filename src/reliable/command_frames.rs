use anyhow::bail;
use bytes::{Buf, BufMut, BytesMut};

use crate::reliable::session_id::SessionId;
use crate::reliable::{ExtendedOpcode, PacketCommand};

fn expect_opcode(data: &[u8], expected: ExtendedOpcode) -> anyhow::Result<(PacketCommand, &[u8])> {
    let mut buf = data;
    let command = PacketCommand::from_bits_retain(buf.try_get_u8()?);
    let opcode = buf.try_get_u8()?;
    if opcode != u8::from(expected) {
        bail!("opcode {:#04x} is not a {:?} frame", opcode, expected);
    }
    Ok((command, buf))
}

/// Requests a connection. Answered by [ConnectedMessage] (or its signed sibling, which this
///  codec does not decode).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct ConnectMessage {
    pub command: PacketCommand,
    /// incremented on each retry; echoed back by the responder
    pub message_id: u8,
    /// unused in connect frames, zero on send
    pub response_id: u8,
    /// major version in the high 16 bits, minor in the low 16
    pub protocol_version: u32,
    pub session_id: SessionId,
    pub timestamp: u32,
}

impl Default for ConnectMessage {
    fn default() -> Self {
        ConnectMessage {
            command: PacketCommand::COMMAND_FRAME,
            message_id: 0,
            response_id: 0,
            protocol_version: 0,
            session_id: SessionId::EMPTY,
            timestamp: 0,
        }
    }
}

impl ConnectMessage {
    pub fn major_version(&self) -> u16 {
        (self.protocol_version >> 16) as u16
    }

    pub fn minor_version(&self) -> u16 {
        self.protocol_version as u16
    }

    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_u8(self.command.bits());
        buf.put_u8(ExtendedOpcode::Connect.into());
        buf.put_u8(self.message_id);
        buf.put_u8(self.response_id);
        buf.put_u32_le(self.protocol_version);
        buf.put_u32_le(self.session_id.to_raw());
        buf.put_u32_le(self.timestamp);
    }

    pub fn deser(data: &[u8]) -> anyhow::Result<ConnectMessage> {
        let (command, mut buf) = expect_opcode(data, ExtendedOpcode::Connect)?;
        Ok(ConnectMessage {
            command,
            message_id: buf.try_get_u8()?,
            response_id: buf.try_get_u8()?,
            protocol_version: buf.try_get_u32_le()?,
            session_id: SessionId::from_raw(buf.try_get_u32_le()?),
            timestamp: buf.try_get_u32_le()?,
        })
    }
}

/// Accepts a connection request or completes the handshake; echoes the requestor's
///  message id and session id.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct ConnectedMessage {
    pub command: PacketCommand,
    pub message_id: u8,
    pub response_id: u8,
    pub protocol_version: u32,
    pub session_id: SessionId,
    pub timestamp: u32,
}

impl Default for ConnectedMessage {
    fn default() -> Self {
        ConnectedMessage {
            command: PacketCommand::COMMAND_FRAME,
            message_id: 0,
            response_id: 0,
            protocol_version: 0,
            session_id: SessionId::EMPTY,
            timestamp: 0,
        }
    }
}

impl ConnectedMessage {
    pub fn major_version(&self) -> u16 {
        (self.protocol_version >> 16) as u16
    }

    pub fn minor_version(&self) -> u16 {
        self.protocol_version as u16
    }

    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_u8(self.command.bits());
        buf.put_u8(ExtendedOpcode::Connected.into());
        buf.put_u8(self.message_id);
        buf.put_u8(self.response_id);
        buf.put_u32_le(self.protocol_version);
        buf.put_u32_le(self.session_id.to_raw());
        buf.put_u32_le(self.timestamp);
    }

    pub fn deser(data: &[u8]) -> anyhow::Result<ConnectedMessage> {
        let (command, mut buf) = expect_opcode(data, ExtendedOpcode::Connected)?;
        Ok(ConnectedMessage {
            command,
            message_id: buf.try_get_u8()?,
            response_id: buf.try_get_u8()?,
            protocol_version: buf.try_get_u32_le()?,
            session_id: SessionId::from_raw(buf.try_get_u32_le()?),
            timestamp: buf.try_get_u32_le()?,
        })
    }
}

/// Immediate disconnect (or its acknowledgment), skipping delivery of anything still in
///  flight. Carries a signature when the connection was established with signing.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct HardDisconnectMessage {
    pub command: PacketCommand,
    pub message_id: u8,
    pub response_id: u8,
    pub protocol_version: u32,
    pub session_id: SessionId,
    pub timestamp: u32,
    /// opaque; only present on the wire when signing is enabled for the connection
    pub signature: u64,
}

impl Default for HardDisconnectMessage {
    fn default() -> Self {
        HardDisconnectMessage {
            command: PacketCommand::COMMAND_FRAME,
            message_id: 0,
            response_id: 0,
            protocol_version: 0,
            session_id: SessionId::EMPTY,
            timestamp: 0,
            signature: 0,
        }
    }
}

impl HardDisconnectMessage {
    pub fn major_version(&self) -> u16 {
        (self.protocol_version >> 16) as u16
    }

    pub fn minor_version(&self) -> u16 {
        self.protocol_version as u16
    }

    pub fn ser(&self, buf: &mut BytesMut, signing_enabled: bool) {
        buf.put_u8(self.command.bits());
        buf.put_u8(ExtendedOpcode::HardDisconnect.into());
        buf.put_u8(self.message_id);
        buf.put_u8(self.response_id);
        buf.put_u32_le(self.protocol_version);
        buf.put_u32_le(self.session_id.to_raw());
        buf.put_u32_le(self.timestamp);
        if signing_enabled {
            buf.put_u64_le(self.signature);
        }
    }

    pub fn deser(data: &[u8], signing_enabled: bool) -> anyhow::Result<HardDisconnectMessage> {
        let (command, mut buf) = expect_opcode(data, ExtendedOpcode::HardDisconnect)?;
        Ok(HardDisconnectMessage {
            command,
            message_id: buf.try_get_u8()?,
            response_id: buf.try_get_u8()?,
            protocol_version: buf.try_get_u32_le()?,
            session_id: SessionId::from_raw(buf.try_get_u32_le()?),
            timestamp: buf.try_get_u32_le()?,
            signature: if signing_enabled { buf.try_get_u64_le()? } else { 0 },
        })
    }
}
