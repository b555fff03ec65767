//! Session and name-table control messages ("core messages"): connect handshake,
//! player add/remove, host migration and integrity checks. Every message starts with a
//! 4-byte type tag; variable-length fields live in a back-packed tail addressed by
//! (offset, size) couples relative to the end of the tag.

use anyhow::bail;
use bytes::{Buf, Bytes, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use tracing::debug;

pub mod address;
pub mod alternate_address;
pub mod connect;
pub mod dnet_version;
pub mod dpnid;
pub mod host_migration;
pub mod integrity;
pub(crate) mod layout;
pub mod name_table;
pub mod name_table_ops;
pub mod strings;

pub use connect::{
    AckConnectInfoMessage, ConnectFailedMessage, PlayerConnectInfoMessage, SendConnectInfoMessage,
    SendPlayerDpnidMessage,
};
pub use host_migration::{HostMigrateCompleteMessage, HostMigrateMessage, TerminateSessionMessage};
pub use integrity::{IntegrityCheckMessage, IntegrityCheckResponseMessage, RequestIntegrityCheckMessage};
pub use name_table_ops::{
    AckNameTableOperationsMessage, AddPlayerMessage, ConnectAttemptFailedMessage,
    DestroyPlayerMessage, InstructConnectMessage, InstructedConnectFailedMessage,
    NameTableVersionMessage, RequestNameTableOperationsMessage, ResyncVersionMessage,
};

/// The 4-byte type tags. The set is closed; unknown tags are a normal decode outcome
///  ("unrecognized"), not an error.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum PacketType {
    PlayerConnectInfo = 0x0000_00C1,
    SendConnectInfo = 0x0000_00C2,
    AckConnectInfo = 0x0000_00C3,
    SendPlayerDpnid = 0x0000_00C4,
    ConnectFailed = 0x0000_00C5,
    InstructConnect = 0x0000_00C6,
    InstructedConnectFailed = 0x0000_00C7,
    ConnectAttemptFailed = 0x0000_00C8,
    NameTableVersion = 0x0000_00C9,
    ResyncVersion = 0x0000_00CA,
    RequestNameTableOperations = 0x0000_00CB,
    AckNameTableOperations = 0x0000_00CC,
    HostMigrate = 0x0000_00CD,
    HostMigrateComplete = 0x0000_00CE,
    AddPlayer = 0x0000_00D0,
    DestroyPlayer = 0x0000_00D1,
    TerminateSession = 0x0000_00DF,
    RequestIntegrityCheck = 0x0000_00E2,
    IntegrityCheck = 0x0000_00E3,
    IntegrityCheckResponse = 0x0000_00E4,
}

/// Consumes and validates the leading tag, returning the message body after it.
///
/// Every per-type `deser` re-validates its own tag this way, so calling one directly with
///  foreign bytes fails instead of misparsing.
pub(crate) fn expect_tag(data: &[u8], expected: PacketType) -> anyhow::Result<&[u8]> {
    let mut buf = data;
    let tag = buf.try_get_u32_le()?;
    if tag != u32::from(expected) {
        bail!("tag {:#010x} is not a {:?} message", tag, expected);
    }
    Ok(buf)
}

/// One value per core message type. This is the only entry point external callers need:
///  [CoreMessage::decode] for raw datagram payloads, [CoreMessage::encode] for outgoing
///  messages.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum CoreMessage {
    PlayerConnectInfo(PlayerConnectInfoMessage),
    SendConnectInfo(SendConnectInfoMessage),
    AckConnectInfo(AckConnectInfoMessage),
    SendPlayerDpnid(SendPlayerDpnidMessage),
    ConnectFailed(ConnectFailedMessage),
    InstructConnect(InstructConnectMessage),
    InstructedConnectFailed(InstructedConnectFailedMessage),
    ConnectAttemptFailed(ConnectAttemptFailedMessage),
    NameTableVersion(NameTableVersionMessage),
    ResyncVersion(ResyncVersionMessage),
    RequestNameTableOperations(RequestNameTableOperationsMessage),
    AckNameTableOperations(AckNameTableOperationsMessage),
    HostMigrate(HostMigrateMessage),
    HostMigrateComplete(HostMigrateCompleteMessage),
    AddPlayer(AddPlayerMessage),
    DestroyPlayer(DestroyPlayerMessage),
    TerminateSession(TerminateSessionMessage),
    RequestIntegrityCheck(RequestIntegrityCheckMessage),
    IntegrityCheck(IntegrityCheckMessage),
    IntegrityCheckResponse(IntegrityCheckResponseMessage),
}

impl CoreMessage {
    pub fn packet_type(&self) -> PacketType {
        match self {
            CoreMessage::PlayerConnectInfo(_) => PacketType::PlayerConnectInfo,
            CoreMessage::SendConnectInfo(_) => PacketType::SendConnectInfo,
            CoreMessage::AckConnectInfo(_) => PacketType::AckConnectInfo,
            CoreMessage::SendPlayerDpnid(_) => PacketType::SendPlayerDpnid,
            CoreMessage::ConnectFailed(_) => PacketType::ConnectFailed,
            CoreMessage::InstructConnect(_) => PacketType::InstructConnect,
            CoreMessage::InstructedConnectFailed(_) => PacketType::InstructedConnectFailed,
            CoreMessage::ConnectAttemptFailed(_) => PacketType::ConnectAttemptFailed,
            CoreMessage::NameTableVersion(_) => PacketType::NameTableVersion,
            CoreMessage::ResyncVersion(_) => PacketType::ResyncVersion,
            CoreMessage::RequestNameTableOperations(_) => PacketType::RequestNameTableOperations,
            CoreMessage::AckNameTableOperations(_) => PacketType::AckNameTableOperations,
            CoreMessage::HostMigrate(_) => PacketType::HostMigrate,
            CoreMessage::HostMigrateComplete(_) => PacketType::HostMigrateComplete,
            CoreMessage::AddPlayer(_) => PacketType::AddPlayer,
            CoreMessage::DestroyPlayer(_) => PacketType::DestroyPlayer,
            CoreMessage::TerminateSession(_) => PacketType::TerminateSession,
            CoreMessage::RequestIntegrityCheck(_) => PacketType::RequestIntegrityCheck,
            CoreMessage::IntegrityCheck(_) => PacketType::IntegrityCheck,
            CoreMessage::IntegrityCheckResponse(_) => PacketType::IntegrityCheckResponse,
        }
    }

    /// Decodes a whole datagram payload. Unknown tags and undecodable bodies both yield
    ///  `None` - the transport layer treats that as "drop this datagram".
    pub fn decode(data: &[u8]) -> Option<CoreMessage> {
        let mut peek = data;
        let Ok(raw_tag) = peek.try_get_u32_le()
        else {
            debug!("datagram of {} bytes is too short for a tag", data.len());
            return None;
        };
        let Ok(packet_type) = PacketType::try_from_primitive(raw_tag)
        else {
            debug!("unrecognized message tag {:#010x}", raw_tag);
            return None;
        };

        let result = match packet_type {
            PacketType::PlayerConnectInfo => {
                PlayerConnectInfoMessage::deser(data).map(CoreMessage::PlayerConnectInfo)
            }
            PacketType::SendConnectInfo => {
                SendConnectInfoMessage::deser(data).map(CoreMessage::SendConnectInfo)
            }
            PacketType::AckConnectInfo => {
                AckConnectInfoMessage::deser(data).map(CoreMessage::AckConnectInfo)
            }
            PacketType::SendPlayerDpnid => {
                SendPlayerDpnidMessage::deser(data).map(CoreMessage::SendPlayerDpnid)
            }
            PacketType::ConnectFailed => {
                ConnectFailedMessage::deser(data).map(CoreMessage::ConnectFailed)
            }
            PacketType::InstructConnect => {
                InstructConnectMessage::deser(data).map(CoreMessage::InstructConnect)
            }
            PacketType::InstructedConnectFailed => InstructedConnectFailedMessage::deser(data)
                .map(CoreMessage::InstructedConnectFailed),
            PacketType::ConnectAttemptFailed => {
                ConnectAttemptFailedMessage::deser(data).map(CoreMessage::ConnectAttemptFailed)
            }
            PacketType::NameTableVersion => {
                NameTableVersionMessage::deser(data).map(CoreMessage::NameTableVersion)
            }
            PacketType::ResyncVersion => {
                ResyncVersionMessage::deser(data).map(CoreMessage::ResyncVersion)
            }
            PacketType::RequestNameTableOperations => RequestNameTableOperationsMessage::deser(data)
                .map(CoreMessage::RequestNameTableOperations),
            PacketType::AckNameTableOperations => {
                AckNameTableOperationsMessage::deser(data).map(CoreMessage::AckNameTableOperations)
            }
            PacketType::HostMigrate => HostMigrateMessage::deser(data).map(CoreMessage::HostMigrate),
            PacketType::HostMigrateComplete => {
                HostMigrateCompleteMessage::deser(data).map(CoreMessage::HostMigrateComplete)
            }
            PacketType::AddPlayer => AddPlayerMessage::deser(data).map(CoreMessage::AddPlayer),
            PacketType::DestroyPlayer => {
                DestroyPlayerMessage::deser(data).map(CoreMessage::DestroyPlayer)
            }
            PacketType::TerminateSession => {
                TerminateSessionMessage::deser(data).map(CoreMessage::TerminateSession)
            }
            PacketType::RequestIntegrityCheck => {
                RequestIntegrityCheckMessage::deser(data).map(CoreMessage::RequestIntegrityCheck)
            }
            PacketType::IntegrityCheck => {
                IntegrityCheckMessage::deser(data).map(CoreMessage::IntegrityCheck)
            }
            PacketType::IntegrityCheckResponse => {
                IntegrityCheckResponseMessage::deser(data).map(CoreMessage::IntegrityCheckResponse)
            }
        };

        match result {
            Ok(message) => Some(message),
            Err(e) => {
                debug!("dropping undecodable {:?} message: {:#}", packet_type, e);
                None
            }
        }
    }

    pub fn ser(&self, buf: &mut BytesMut) {
        match self {
            CoreMessage::PlayerConnectInfo(m) => m.ser(buf),
            CoreMessage::SendConnectInfo(m) => m.ser(buf),
            CoreMessage::AckConnectInfo(m) => m.ser(buf),
            CoreMessage::SendPlayerDpnid(m) => m.ser(buf),
            CoreMessage::ConnectFailed(m) => m.ser(buf),
            CoreMessage::InstructConnect(m) => m.ser(buf),
            CoreMessage::InstructedConnectFailed(m) => m.ser(buf),
            CoreMessage::ConnectAttemptFailed(m) => m.ser(buf),
            CoreMessage::NameTableVersion(m) => m.ser(buf),
            CoreMessage::ResyncVersion(m) => m.ser(buf),
            CoreMessage::RequestNameTableOperations(m) => m.ser(buf),
            CoreMessage::AckNameTableOperations(m) => m.ser(buf),
            CoreMessage::HostMigrate(m) => m.ser(buf),
            CoreMessage::HostMigrateComplete(m) => m.ser(buf),
            CoreMessage::AddPlayer(m) => m.ser(buf),
            CoreMessage::DestroyPlayer(m) => m.ser(buf),
            CoreMessage::TerminateSession(m) => m.ser(buf),
            CoreMessage::RequestIntegrityCheck(m) => m.ser(buf),
            CoreMessage::IntegrityCheck(m) => m.ser(buf),
            CoreMessage::IntegrityCheckResponse(m) => m.ser(buf),
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.ser(&mut buf);
        buf.freeze()
    }
}

#[cfg(test)]
mod test {
    use rstest::rstest;

    use crate::core::dpnid::Dpnid;

    use super::*;

    #[rstest]
    #[case::empty(&[])]
    #[case::short(&[0xC3, 0x00, 0x00])]
    #[case::unknown_tag(&[0xFF, 0x00, 0x00, 0x00])]
    #[case::known_tag_truncated_body(&[0xD1, 0x00, 0x00, 0x00, 0x01, 0x02])]
    #[case::high_tag_bits(&[0xC3, 0x00, 0x00, 0x01])]
    fn test_decode_drops_unusable_datagrams(#[case] data: &[u8]) {
        assert_eq!(CoreMessage::decode(data), None);
    }

    #[rstest]
    fn test_decode_dispatches_by_tag() {
        let message = CoreMessage::decode(&[0xC3, 0x00, 0x00, 0x00]).unwrap();
        assert_eq!(message, CoreMessage::AckConnectInfo(AckConnectInfoMessage));
        assert_eq!(message.packet_type(), PacketType::AckConnectInfo);
        assert_eq!(message.encode().as_ref(), &[0xC3, 0x00, 0x00, 0x00]);
    }

    #[rstest]
    fn test_every_variant_roundtrips_through_decode() {
        let messages = vec![
            CoreMessage::AckConnectInfo(Default::default()),
            CoreMessage::SendPlayerDpnid(SendPlayerDpnidMessage { dpnid: Dpnid::from_raw(7) }),
            CoreMessage::ConnectFailed(Default::default()),
            CoreMessage::InstructConnect(Default::default()),
            CoreMessage::InstructedConnectFailed(Default::default()),
            CoreMessage::ConnectAttemptFailed(Default::default()),
            CoreMessage::NameTableVersion(Default::default()),
            CoreMessage::ResyncVersion(Default::default()),
            CoreMessage::RequestNameTableOperations(Default::default()),
            CoreMessage::AckNameTableOperations(Default::default()),
            CoreMessage::HostMigrate(Default::default()),
            CoreMessage::HostMigrateComplete(Default::default()),
            CoreMessage::AddPlayer(Default::default()),
            CoreMessage::DestroyPlayer(Default::default()),
            CoreMessage::TerminateSession(Default::default()),
            CoreMessage::RequestIntegrityCheck(Default::default()),
            CoreMessage::IntegrityCheck(Default::default()),
            CoreMessage::IntegrityCheckResponse(Default::default()),
            CoreMessage::PlayerConnectInfo(Default::default()),
            CoreMessage::SendConnectInfo(Default::default()),
        ];
        for message in messages {
            let encoded = message.encode();
            assert_eq!(CoreMessage::decode(&encoded), Some(message.clone()), "{:?}", message);
            // a conforming encoder's output re-encodes byte-identically
            assert_eq!(CoreMessage::decode(&encoded).unwrap().encode(), encoded);
        }
    }
}
