use anyhow::bail;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::core::dnet_version::DnetVersion;
use crate::core::dpnid::Dpnid;
use crate::core::layout::{FieldRef, TailReader, TailWriter};
use crate::core::name_table::NameTableEntryFlags;
use crate::core::strings::{AsciiString, WideString};
use crate::core::{expect_tag, CoreMessage, PacketType};

/// Why a player is being removed from the name table.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum DestroyPlayerReason {
    #[default]
    Normal = 1,
    ConnectionLost = 2,
    SessionTerminated = 3,
    HostDestroyedPlayer = 4,
}

/// Instructs every peer to add the given peer to the game session.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct AddPlayerMessage {
    pub dpnid: Dpnid,
    pub dpnid_owner: Dpnid,
    pub flags: NameTableEntryFlags,
    pub version: u32,
    pub version_not_used: u32,
    pub dnet_client_version: DnetVersion,
    pub url: AsciiString,
    pub data: Bytes,
    pub name: WideString,
}

impl AddPlayerMessage {
    const FIXED_LEN: usize = 48;

    pub fn ser(&self, buf: &mut BytesMut) {
        let var_len = self.name.wire_len() + self.data.len() + self.url.wire_len();
        let mut tail = TailWriter::new(Self::FIXED_LEN, var_len);
        let name_ref = tail.push(self.name.as_bytes());
        let data_ref = tail.push(&self.data);
        let url_ref = tail.push(self.url.as_bytes());

        buf.put_u32_le(PacketType::AddPlayer.into());
        self.dpnid.ser(buf);
        self.dpnid_owner.ser(buf);
        buf.put_u32_le(self.flags.bits());
        buf.put_u32_le(self.version);
        buf.put_u32_le(self.version_not_used);
        buf.put_u32_le(self.dnet_client_version.to_raw());
        name_ref.ser(buf);
        data_ref.ser(buf);
        url_ref.ser(buf);
        tail.finish(buf);
    }

    pub fn deser(data: &[u8]) -> anyhow::Result<AddPlayerMessage> {
        let body = expect_tag(data, PacketType::AddPlayer)?;
        let mut fixed = body;

        let dpnid = Dpnid::deser(&mut fixed)?;
        let dpnid_owner = Dpnid::deser(&mut fixed)?;
        let flags = NameTableEntryFlags::from_bits_retain(fixed.try_get_u32_le()?);
        let version = fixed.try_get_u32_le()?;
        let version_not_used = fixed.try_get_u32_le()?;
        let dnet_client_version = DnetVersion::from_raw(fixed.try_get_u32_le()?);
        let name_ref = FieldRef::deser(&mut fixed)?;
        let data_ref = FieldRef::deser(&mut fixed)?;
        let url_ref = FieldRef::deser(&mut fixed)?;

        let tail = TailReader::new(body);
        Ok(AddPlayerMessage {
            dpnid,
            dpnid_owner,
            flags,
            version,
            version_not_used,
            dnet_client_version,
            url: AsciiString::from_raw(tail.slice(url_ref)?.to_vec()),
            data: tail.bytes(data_ref)?,
            name: WideString::from_raw(tail.slice(name_ref)?.to_vec()),
        })
    }
}

/// Instructs peers to drop the given peer from the name table.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct DestroyPlayerMessage {
    pub dpnid_leaving: Dpnid,
    pub version: u32,
    pub version_not_used: u32,
    pub reason: DestroyPlayerReason,
}

impl DestroyPlayerMessage {
    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_u32_le(PacketType::DestroyPlayer.into());
        self.dpnid_leaving.ser(buf);
        buf.put_u32_le(self.version);
        buf.put_u32_le(self.version_not_used);
        buf.put_u32_le(self.reason.into());
    }

    pub fn deser(data: &[u8]) -> anyhow::Result<DestroyPlayerMessage> {
        let mut fixed = expect_tag(data, PacketType::DestroyPlayer)?;
        Ok(DestroyPlayerMessage {
            dpnid_leaving: Dpnid::deser(&mut fixed)?,
            version: fixed.try_get_u32_le()?,
            version_not_used: fixed.try_get_u32_le()?,
            reason: DestroyPlayerReason::try_from_primitive(fixed.try_get_u32_le()?)?,
        })
    }
}

/// Host instruction to connect to a designated peer.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct InstructConnectMessage {
    pub dpnid: Dpnid,
    pub version: u32,
    pub version_not_used: u32,
}

impl InstructConnectMessage {
    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_u32_le(PacketType::InstructConnect.into());
        self.dpnid.ser(buf);
        buf.put_u32_le(self.version);
        buf.put_u32_le(self.version_not_used);
    }

    pub fn deser(data: &[u8]) -> anyhow::Result<InstructConnectMessage> {
        let mut fixed = expect_tag(data, PacketType::InstructConnect)?;
        Ok(InstructConnectMessage {
            dpnid: Dpnid::deser(&mut fixed)?,
            version: fixed.try_get_u32_le()?,
            version_not_used: fixed.try_get_u32_le()?,
        })
    }
}

/// A peer reporting back that it could not carry out an instructed connect.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct InstructedConnectFailedMessage {
    pub dpnid: Dpnid,
}

impl InstructedConnectFailedMessage {
    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_u32_le(PacketType::InstructedConnectFailed.into());
        self.dpnid.ser(buf);
    }

    pub fn deser(data: &[u8]) -> anyhow::Result<InstructedConnectFailedMessage> {
        let mut fixed = expect_tag(data, PacketType::InstructedConnectFailed)?;
        Ok(InstructedConnectFailedMessage {
            dpnid: Dpnid::deser(&mut fixed)?,
        })
    }
}

/// The host relaying that an existing peer could not connect to a new peer.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct ConnectAttemptFailedMessage {
    pub dpnid: Dpnid,
}

impl ConnectAttemptFailedMessage {
    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_u32_le(PacketType::ConnectAttemptFailed.into());
        self.dpnid.ser(buf);
    }

    pub fn deser(data: &[u8]) -> anyhow::Result<ConnectAttemptFailedMessage> {
        let mut fixed = expect_tag(data, PacketType::ConnectAttemptFailed)?;
        Ok(ConnectAttemptFailedMessage {
            dpnid: Dpnid::deser(&mut fixed)?,
        })
    }
}

/// Announces the current name table version number.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct NameTableVersionMessage {
    pub version: u32,
    pub version_not_used: u32,
}

impl NameTableVersionMessage {
    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_u32_le(PacketType::NameTableVersion.into());
        buf.put_u32_le(self.version);
        buf.put_u32_le(self.version_not_used);
    }

    pub fn deser(data: &[u8]) -> anyhow::Result<NameTableVersionMessage> {
        let mut fixed = expect_tag(data, PacketType::NameTableVersion)?;
        Ok(NameTableVersionMessage {
            version: fixed.try_get_u32_le()?,
            version_not_used: fixed.try_get_u32_le()?,
        })
    }
}

/// Requests that the name table version be resynchronized.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct ResyncVersionMessage {
    pub version: u32,
    pub version_not_used: u32,
}

impl ResyncVersionMessage {
    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_u32_le(PacketType::ResyncVersion.into());
        buf.put_u32_le(self.version);
        buf.put_u32_le(self.version_not_used);
    }

    pub fn deser(data: &[u8]) -> anyhow::Result<ResyncVersionMessage> {
        let mut fixed = expect_tag(data, PacketType::ResyncVersion)?;
        Ok(ResyncVersionMessage {
            version: fixed.try_get_u32_le()?,
            version_not_used: fixed.try_get_u32_le()?,
        })
    }
}

/// A freshly migrated host asking a peer for name table operations newer than its own.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct RequestNameTableOperationsMessage {
    pub version: u32,
    pub version_not_used: u32,
}

impl RequestNameTableOperationsMessage {
    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_u32_le(PacketType::RequestNameTableOperations.into());
        buf.put_u32_le(self.version);
        buf.put_u32_le(self.version_not_used);
    }

    pub fn deser(data: &[u8]) -> anyhow::Result<RequestNameTableOperationsMessage> {
        let mut fixed = expect_tag(data, PacketType::RequestNameTableOperations)?;
        Ok(RequestNameTableOperationsMessage {
            version: fixed.try_get_u32_le()?,
            version_not_used: fixed.try_get_u32_le()?,
        })
    }
}

/// One slot of [AckNameTableOperationsMessage]: a whole core message, re-encoded with its
///  leading tag stripped into an opaque operation body.
///
/// A slot with tag 0 and an empty body is legitimate ("null" entry) and round-trips as
///  present-but-empty; whether peers attach meaning to slot positions is unknown at this
///  layer, so the count and order are preserved verbatim.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct OperationEntry {
    pub message_id: u32,
    pub operation: Bytes,
}

impl OperationEntry {
    pub fn from_message(message: Option<&CoreMessage>) -> OperationEntry {
        match message {
            Some(message) => OperationEntry {
                message_id: message.packet_type().into(),
                operation: message.encode().slice(4..),
            },
            None => OperationEntry::default(),
        }
    }

    /// Re-enters the top-level decoder with the tag glued back on. Unknown or undecodable
    ///  operations yield `None`, same as any other foreign datagram.
    pub fn to_message(&self) -> Option<CoreMessage> {
        let mut data = BytesMut::with_capacity(4 + self.operation.len());
        data.put_u32_le(self.message_id);
        data.put_slice(&self.operation);
        CoreMessage::decode(&data)
    }
}

/// Reply to [RequestNameTableOperationsMessage]: the queried peer's newer name table
///  operations, each wrapped as an [OperationEntry].
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct AckNameTableOperationsMessage {
    pub entries: Vec<OperationEntry>,
}

impl AckNameTableOperationsMessage {
    const HEADER_LEN: usize = 4;
    const ENTRY_RECORD_LEN: usize = 12;

    pub fn from_messages<'a>(
        messages: impl IntoIterator<Item = Option<&'a CoreMessage>>,
    ) -> AckNameTableOperationsMessage {
        AckNameTableOperationsMessage {
            entries: messages.into_iter().map(OperationEntry::from_message).collect(),
        }
    }

    pub fn messages(&self) -> Vec<Option<CoreMessage>> {
        self.entries.iter().map(OperationEntry::to_message).collect()
    }

    pub fn ser(&self, buf: &mut BytesMut) {
        let fixed_len = Self::HEADER_LEN + Self::ENTRY_RECORD_LEN * self.entries.len();
        let var_len = self.entries.iter().map(|e| e.operation.len()).sum();

        let mut tail = TailWriter::new(fixed_len, var_len);
        let operation_refs = self
            .entries
            .iter()
            .map(|e| tail.push(&e.operation))
            .collect::<Vec<_>>();

        buf.put_u32_le(PacketType::AckNameTableOperations.into());
        buf.put_u32_le(self.entries.len() as u32);
        for (entry, operation_ref) in self.entries.iter().zip(&operation_refs) {
            buf.put_u32_le(entry.message_id);
            operation_ref.ser(buf);
        }
        tail.finish(buf);
    }

    pub fn deser(data: &[u8]) -> anyhow::Result<AckNameTableOperationsMessage> {
        let body = expect_tag(data, PacketType::AckNameTableOperations)?;
        let mut fixed = body;

        let num_entries = fixed.try_get_u32_le()? as usize;
        let records_len = num_entries
            .checked_mul(Self::ENTRY_RECORD_LEN)
            .and_then(|r| r.checked_add(Self::HEADER_LEN));
        if !records_len.is_some_and(|len| len <= body.len()) {
            bail!("{} entry records do not fit in {} bytes", num_entries, body.len());
        }

        let tail = TailReader::new(body);
        let mut entries = Vec::with_capacity(num_entries);
        for i in 0..num_entries {
            let start = Self::HEADER_LEN + Self::ENTRY_RECORD_LEN * i;
            let mut record = &body[start..start + Self::ENTRY_RECORD_LEN];
            let message_id = record.try_get_u32_le()?;
            let operation_ref = FieldRef::deser(&mut record)?;
            entries.push(OperationEntry {
                message_id,
                operation: tail.bytes(operation_ref)?,
            });
        }
        Ok(AckNameTableOperationsMessage { entries })
    }
}

#[cfg(test)]
mod test {
    use rstest::rstest;

    use crate::core::address::Address;

    use super::*;

    #[rstest]
    fn test_instruct_connect_fixture() {
        let data = [
            0xC6, 0x00, 0x00, 0x00, 0x11, 0x77, 0xEB, 0x0F, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00,
        ];
        let message = InstructConnectMessage::deser(&data).unwrap();
        assert_eq!(message.dpnid, Dpnid::from_raw(0x0FEB7711));
        assert_eq!(message.version, 4);

        let mut buf = BytesMut::new();
        message.ser(&mut buf);
        assert_eq!(buf.as_ref(), &data);
    }

    #[rstest]
    fn test_destroy_player_fixture() {
        let data = [
            0xD1, 0x00, 0x00, 0x00, 0xEE, 0x99, 0x8E, 0x11, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x02, 0x00, 0x00, 0x00,
        ];
        let message = DestroyPlayerMessage::deser(&data).unwrap();
        assert_eq!(message.dpnid_leaving, Dpnid::from_raw(0x118E99EE));
        assert_eq!(message.version, 5);
        assert_eq!(message.reason, DestroyPlayerReason::ConnectionLost);

        let mut buf = BytesMut::new();
        message.ser(&mut buf);
        assert_eq!(buf.as_ref(), &data);
    }

    #[rstest]
    fn test_destroy_player_rejects_unknown_reason() {
        let data = [
            0xD1, 0x00, 0x00, 0x00, 0xEE, 0x99, 0x8E, 0x11, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x09, 0x00, 0x00, 0x00,
        ];
        assert!(DestroyPlayerMessage::deser(&data).is_err());
    }

    #[rstest]
    #[case::name_table_version(0xC9)]
    #[case::resync_version(0xCA)]
    #[case::request_operations(0xCB)]
    fn test_version_message_fixtures(#[case] tag: u8) {
        let data = [tag, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        let mut buf = BytesMut::new();
        match tag {
            0xC9 => {
                let message = NameTableVersionMessage::deser(&data).unwrap();
                assert_eq!(message.version, 4);
                message.ser(&mut buf);
            }
            0xCA => {
                let message = ResyncVersionMessage::deser(&data).unwrap();
                assert_eq!(message.version, 4);
                message.ser(&mut buf);
            }
            _ => {
                let message = RequestNameTableOperationsMessage::deser(&data).unwrap();
                assert_eq!(message.version, 4);
                message.ser(&mut buf);
            }
        }
        assert_eq!(buf.as_ref(), &data);
    }

    #[rstest]
    fn test_add_player_layout() {
        let original = AddPlayerMessage {
            dpnid: Dpnid::from_raw(0x00500005),
            dpnid_owner: Dpnid::EMPTY,
            flags: NameTableEntryFlags::PEER
                | NameTableEntryFlags::CONNECTING
                | NameTableEntryFlags::INDICATED,
            version: 5,
            version_not_used: 0,
            dnet_client_version: DnetVersion::DIRECTX_90,
            url: AsciiString::from_text("host"),
            data: Bytes::new(),
            name: WideString::from_text("P"),
        };
        let mut buf = BytesMut::new();
        original.ser(&mut buf);

        // url ("host\0") sits at the bottom of the tail, name above it
        assert_eq!(buf.len(), 4 + 48 + 5 + 4);
        assert_eq!(&buf[4 + 24..4 + 48], &[
            53, 0, 0, 0, 4, 0, 0, 0, // name
            0, 0, 0, 0, 0, 0, 0, 0, // data absent
            48, 0, 0, 0, 5, 0, 0, 0, // url
        ]);
        assert_eq!(&buf[52..57], b"host\0");

        assert_eq!(AddPlayerMessage::deser(&buf).unwrap(), original);
    }

    /// captured exchange: three real operations followed by two empty slots
    #[rstest]
    fn test_ack_name_table_operations_fixture() {
        let url = Address::for_host("192.168.11.101", 2303).url();
        let name = "14.01:45:32.3590000 (Peer)";

        #[rustfmt::skip]
        let data: Vec<u8> = [
            &[
                0xCC, 0x00, 0x00, 0x00,
                0x05, 0x00, 0x00, 0x00,
                0xC6, 0x00, 0x00, 0x00, 0x16, 0x01, 0x00, 0x00, 0x0C, 0x00, 0x00, 0x00,
                0xD0, 0x00, 0x00, 0x00, 0x4C, 0x00, 0x00, 0x00, 0xCA, 0x00, 0x00, 0x00,
                0xC6, 0x00, 0x00, 0x00, 0x40, 0x00, 0x00, 0x00, 0x0C, 0x00, 0x00, 0x00,
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
                // instruct connect operation (entry 2)
                0x05, 0x00, 0x50, 0x00, 0x06, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
                // add player operation (entry 1)
                0x05, 0x00, 0x50, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x11, 0x01, 0x00,
                0x05, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x07, 0x00, 0x00, 0x00,
                0x94, 0x00, 0x00, 0x00, 0x36, 0x00, 0x00, 0x00,
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
                0x30, 0x00, 0x00, 0x00, 0x64, 0x00, 0x00, 0x00,
            ][..],
            url.as_bytes(), &[0x00],
            &name.encode_utf16().flat_map(u16::to_le_bytes).collect::<Vec<_>>()[..], &[0x00, 0x00],
            // instruct connect operation (entry 0)
            &[0x03, 0x00, 0x30, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00][..],
        ]
        .concat();

        let message = AckNameTableOperationsMessage::deser(&data).unwrap();
        assert_eq!(message.entries.len(), 5);

        let expected_messages = vec![
            Some(CoreMessage::InstructConnect(InstructConnectMessage {
                dpnid: Dpnid::from_raw(3145731),
                version: 4,
                version_not_used: 0,
            })),
            Some(CoreMessage::AddPlayer(AddPlayerMessage {
                dpnid: Dpnid::from_raw(5242885),
                dpnid_owner: Dpnid::EMPTY,
                flags: NameTableEntryFlags::PEER
                    | NameTableEntryFlags::CONNECTING
                    | NameTableEntryFlags::INDICATED,
                version: 5,
                version_not_used: 0,
                dnet_client_version: DnetVersion::DIRECTX_90,
                url: AsciiString::from_text(&url),
                data: Bytes::new(),
                name: WideString::from_text(name),
            })),
            Some(CoreMessage::InstructConnect(InstructConnectMessage {
                dpnid: Dpnid::from_raw(5242885),
                version: 6,
                version_not_used: 0,
            })),
            None,
            None,
        ];
        assert_eq!(message.messages(), expected_messages);

        let rebuilt = AckNameTableOperationsMessage::from_messages(
            expected_messages.iter().map(Option::as_ref),
        );
        assert_eq!(rebuilt, message);

        let mut buf = BytesMut::new();
        rebuilt.ser(&mut buf);
        assert_eq!(buf.as_ref(), &data[..]);
    }

    #[rstest]
    fn test_null_entries_roundtrip_as_present_but_empty() {
        let message = AckNameTableOperationsMessage::from_messages([
            None,
            Some(&CoreMessage::HostMigrateComplete(Default::default())),
            None,
        ]);
        let mut buf = BytesMut::new();
        message.ser(&mut buf);

        let decoded = AckNameTableOperationsMessage::deser(&buf).unwrap();
        assert_eq!(decoded.entries.len(), 3);
        assert_eq!(decoded.entries[0], OperationEntry::default());
        assert_eq!(decoded.entries[1].message_id, u32::from(PacketType::HostMigrateComplete));
        assert_eq!(decoded.entries[2], OperationEntry::default());
        assert_eq!(decoded, message);
    }

    #[rstest]
    fn test_operation_entry_with_unknown_tag_yields_no_message() {
        let entry = OperationEntry {
            message_id: 0x0000_00FF,
            operation: Bytes::from_static(&[1, 2, 3]),
        };
        assert_eq!(entry.to_message(), None);
    }

    #[rstest]
    fn test_deser_rejects_foreign_tag() {
        let data = [0xC3, 0x00, 0x00, 0x00];
        assert!(AddPlayerMessage::deser(&data).is_err());
        assert!(AckNameTableOperationsMessage::deser(&data).is_err());
        assert!(InstructConnectMessage::deser(&data).is_err());
    }

    #[rstest]
    fn test_deser_rejects_overlong_entry_count() {
        let data = [0xCC, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF];
        assert!(AckNameTableOperationsMessage::deser(&data).is_err());
    }
}
