use anyhow::bail;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use uuid::Uuid;

use crate::core::alternate_address::AlternateAddress;
use crate::core::dnet_version::DnetVersion;
use crate::core::dpnid::Dpnid;
use crate::core::layout::{FieldRef, TailReader, TailWriter};
use crate::core::name_table::{NameTableEntryInfo, NameTableMembershipInfo};
use crate::core::strings::{AsciiString, WideString};
use crate::core::{expect_tag, PacketType};
use crate::util::{put_guid, try_get_guid};

bitflags::bitflags! {
    /// Role a connecting endpoint announces for itself.
    #[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
    pub struct ObjectType: u32 {
        const CLIENT = 0x0000_0002;
        const PEER = 0x0000_0004;
    }
}

bitflags::bitflags! {
    /// Properties of the session as advertised by the host.
    #[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
    pub struct SessionFlags: u32 {
        const CLIENT_SERVER = 0x0000_0001;
        const MIGRATE_HOST = 0x0000_0004;
        const NO_DPN_SERVER = 0x0000_0040;
        const REQUIRE_PASSWORD = 0x0000_0080;
        const NO_ENUMERATIONS = 0x0000_0100;
        const FAST_SIGNED = 0x0000_0200;
        const FULL_SIGNED = 0x0000_0400;
    }
}

/// Outcome code carried by [ConnectFailedMessage].
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum ResultCode {
    #[default]
    Success = 0x0000_0000,
    Generic = 0x8000_4005,
    InvalidParam = 0x8007_0057,
    Unsupported = 0x8000_4001,
    NoInterface = 0x8000_4002,
    OutOfMemory = 0x8007_000E,
    InvalidPointer = 0x8000_4003,
    Aborted = 0x8015_8030,
    Addressing = 0x8015_8040,
    AlreadyClosing = 0x8015_8050,
    AlreadyConnected = 0x8015_8060,
    AlreadyDisconnecting = 0x8015_8070,
    AlreadyInitialized = 0x8015_8080,
    AlreadyRegistered = 0x8015_8090,
    BufferTooSmall = 0x8015_8100,
    CannotCancel = 0x8015_8110,
    CannotCreateGroup = 0x8015_8120,
    CannotCreatePlayer = 0x8015_8130,
    CannotLaunchApplication = 0x8015_8140,
    Connecting = 0x8015_8150,
    ConnectionLost = 0x8015_8160,
    Conversion = 0x8015_8170,
    DataTooLarge = 0x8015_8175,
    DoesNotExist = 0x8015_8180,
    DpnServerNotAvailable = 0x8015_8185,
    DuplicateCommand = 0x8015_8190,
    EndPointNotReceiving = 0x8015_8200,
    EnumQueryTooLarge = 0x8015_8210,
    EnumResponseTooLarge = 0x8015_8220,
    Exception = 0x8015_8230,
    GroupNotEmpty = 0x8015_8240,
    Hosting = 0x8015_8250,
    HostRejectedConnection = 0x8015_8260,
    HostTerminatedSession = 0x8015_8270,
    IncompleteAddress = 0x8015_8280,
    InvalidAddressFormat = 0x8015_8290,
    InvalidApplication = 0x8015_8300,
    InvalidCommand = 0x8015_8310,
    InvalidDeviceAddress = 0x8015_8320,
    InvalidEndPoint = 0x8015_8330,
    InvalidFlags = 0x8015_8340,
    InvalidGroup = 0x8015_8350,
    InvalidHandle = 0x8015_8360,
    InvalidHostAddress = 0x8015_8370,
    InvalidInstance = 0x8015_8380,
    InvalidInterface = 0x8015_8390,
    InvalidObject = 0x8015_8400,
    InvalidPassword = 0x8015_8410,
    InvalidPlayer = 0x8015_8420,
    InvalidPriority = 0x8015_8430,
    InvalidString = 0x8015_8440,
    InvalidUrl = 0x8015_8450,
    InvalidVersion = 0x8015_8460,
    NoCaps = 0x8015_8470,
    NoConnection = 0x8015_8480,
    NoHostPlayer = 0x8015_8490,
    NoMoreAddressComponents = 0x8015_8500,
    NoResponse = 0x8015_8510,
    NotAllowed = 0x8015_8520,
    NotHost = 0x8015_8530,
    NotReady = 0x8015_8540,
    NotRegistered = 0x8015_8550,
    PlayerAlreadyInGroup = 0x8015_8560,
    PlayerLost = 0x8015_8570,
    PlayerNotInGroup = 0x8015_8580,
    PlayerNotReachable = 0x8015_8590,
    SendTooLarge = 0x8015_8600,
    SessionFull = 0x8015_8610,
    TableFull = 0x8015_8620,
    TimedOut = 0x8015_8630,
    Uninitialized = 0x8015_8640,
    UserCancel = 0x8015_8650,
}

/// First message a connecting client/peer sends to the host to initiate the connect
///  sequence.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct PlayerConnectInfoMessage {
    pub flags: ObjectType,
    pub dnet_version: DnetVersion,
    pub guid_instance: Uuid,
    pub guid_application: Uuid,
    pub alternate_addresses: Vec<AlternateAddress>,
    pub url: AsciiString,
    pub connect_data: Bytes,
    pub password: WideString,
    pub data: Bytes,
    pub name: WideString,
}

impl PlayerConnectInfoMessage {
    const FIXED_LEN: usize = 88;

    fn alternate_address_data_len(&self) -> usize {
        self.alternate_addresses.iter().map(|a| a.wire_len()).sum()
    }

    pub fn ser(&self, buf: &mut BytesMut) {
        let var_len = self.name.wire_len()
            + self.data.len()
            + self.password.wire_len()
            + self.connect_data.len()
            + self.url.wire_len()
            + self.alternate_address_data_len();

        let mut tail = TailWriter::new(Self::FIXED_LEN, var_len);
        let name_ref = tail.push(self.name.as_bytes());
        let data_ref = tail.push(&self.data);
        let password_ref = tail.push(self.password.as_bytes());
        let connect_data_ref = tail.push(&self.connect_data);
        let url_ref = tail.push(self.url.as_bytes());
        let mut alternate_address_data = BytesMut::new();
        for address in &self.alternate_addresses {
            address.ser(&mut alternate_address_data);
        }
        let alternate_addresses_ref = tail.push(&alternate_address_data);

        buf.put_u32_le(PacketType::PlayerConnectInfo.into());
        buf.put_u32_le(self.flags.bits());
        buf.put_u32_le(self.dnet_version.to_raw());
        name_ref.ser(buf);
        data_ref.ser(buf);
        password_ref.ser(buf);
        connect_data_ref.ser(buf);
        url_ref.ser(buf);
        put_guid(buf, self.guid_instance);
        put_guid(buf, self.guid_application);
        alternate_addresses_ref.ser(buf);
        tail.finish(buf);
    }

    pub fn deser(data: &[u8]) -> anyhow::Result<PlayerConnectInfoMessage> {
        let body = expect_tag(data, PacketType::PlayerConnectInfo)?;
        let mut fixed = body;

        let flags = ObjectType::from_bits_retain(fixed.try_get_u32_le()?);
        let dnet_version = DnetVersion::from_raw(fixed.try_get_u32_le()?);
        let name_ref = FieldRef::deser(&mut fixed)?;
        let data_ref = FieldRef::deser(&mut fixed)?;
        let password_ref = FieldRef::deser(&mut fixed)?;
        let connect_data_ref = FieldRef::deser(&mut fixed)?;
        let url_ref = FieldRef::deser(&mut fixed)?;
        let guid_instance = try_get_guid(&mut fixed)?;
        let guid_application = try_get_guid(&mut fixed)?;
        let alternate_addresses_ref = FieldRef::deser(&mut fixed)?;

        let tail = TailReader::new(body);
        let mut alternate_addresses = Vec::new();
        let mut alternate_address_data = tail.slice(alternate_addresses_ref)?;
        while alternate_address_data.has_remaining() {
            alternate_addresses.push(AlternateAddress::deser(&mut alternate_address_data)?);
        }

        Ok(PlayerConnectInfoMessage {
            flags,
            dnet_version,
            guid_instance,
            guid_application,
            alternate_addresses,
            url: AsciiString::from_raw(tail.slice(url_ref)?.to_vec()),
            connect_data: tail.bytes(connect_data_ref)?,
            password: WideString::from_raw(tail.slice(password_ref)?.to_vec()),
            data: tail.bytes(data_ref)?,
            name: WideString::from_raw(tail.slice(name_ref)?.to_vec()),
        })
    }
}

/// The host's response that completes a join: session properties plus the full name table
///  snapshot.
///
/// The two record arrays (name table entries, memberships) are part of the fixed region -
///  their refs point into the message's shared tail, relative to the end of the outer tag,
///  just like the top-level fields.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct SendConnectInfoMessage {
    pub flags: SessionFlags,
    pub max_players: u32,
    pub current_players: u32,
    pub guid_instance: Uuid,
    pub guid_application: Uuid,
    pub dpnid: Dpnid,
    pub version: u32,
    pub version_not_used: u32,
    pub name_table_entries: Vec<NameTableEntryInfo>,
    pub name_table_memberships: Vec<NameTableMembershipInfo>,
    pub application_reserved_data: Bytes,
    pub reserved_data: Bytes,
    pub password: WideString,
    pub session_name: WideString,
    pub reply: Bytes,
}

impl SendConnectInfoMessage {
    const HEADER_LEN: usize = 108;
    /// declared length of the application description block, fixed by the protocol
    const APPLICATION_DESCRIPTION_LEN: u32 = 80;

    fn fixed_len(&self) -> usize {
        Self::HEADER_LEN
            + NameTableEntryInfo::RECORD_LEN * self.name_table_entries.len()
            + NameTableMembershipInfo::RECORD_LEN * self.name_table_memberships.len()
    }

    pub fn ser(&self, buf: &mut BytesMut) {
        let var_len = self
            .name_table_entries
            .iter()
            .map(|e| e.url.wire_len() + e.data.len() + e.name.wire_len())
            .sum::<usize>()
            + self.application_reserved_data.len()
            + self.reserved_data.len()
            + self.password.wire_len()
            + self.session_name.wire_len()
            + self.reply.len();

        let mut tail = TailWriter::new(self.fixed_len(), var_len);
        let reply_ref = tail.push(&self.reply);
        let session_name_ref = tail.push(self.session_name.as_bytes());
        let password_ref = tail.push(self.password.as_bytes());
        let reserved_data_ref = tail.push(&self.reserved_data);
        let application_reserved_data_ref = tail.push(&self.application_reserved_data);
        let entry_refs = self
            .name_table_entries
            .iter()
            .map(|e| {
                let name = tail.push(e.name.as_bytes());
                let data = tail.push(&e.data);
                let url = tail.push(e.url.as_bytes());
                (name, data, url)
            })
            .collect::<Vec<_>>();

        buf.put_u32_le(PacketType::SendConnectInfo.into());
        reply_ref.ser(buf);
        buf.put_u32_le(Self::APPLICATION_DESCRIPTION_LEN);
        buf.put_u32_le(self.flags.bits());
        buf.put_u32_le(self.max_players);
        buf.put_u32_le(self.current_players);
        session_name_ref.ser(buf);
        password_ref.ser(buf);
        reserved_data_ref.ser(buf);
        application_reserved_data_ref.ser(buf);
        put_guid(buf, self.guid_instance);
        put_guid(buf, self.guid_application);
        self.dpnid.ser(buf);
        buf.put_u32_le(self.version);
        buf.put_u32_le(self.version_not_used);
        buf.put_u32_le(self.name_table_entries.len() as u32);
        buf.put_u32_le(self.name_table_memberships.len() as u32);

        for (entry, (name_ref, data_ref, url_ref)) in self.name_table_entries.iter().zip(&entry_refs) {
            entry.ser_scalars(buf);
            name_ref.ser(buf);
            data_ref.ser(buf);
            url_ref.ser(buf);
        }
        for membership in &self.name_table_memberships {
            membership.ser(buf);
        }
        tail.finish(buf);
    }

    pub fn deser(data: &[u8]) -> anyhow::Result<SendConnectInfoMessage> {
        let body = expect_tag(data, PacketType::SendConnectInfo)?;
        let mut fixed = body;

        let reply_ref = FieldRef::deser(&mut fixed)?;
        let size = fixed.try_get_u32_le()?;
        if size != Self::APPLICATION_DESCRIPTION_LEN {
            bail!("application description size {} (expected {})", size, Self::APPLICATION_DESCRIPTION_LEN);
        }
        let flags = SessionFlags::from_bits_retain(fixed.try_get_u32_le()?);
        let max_players = fixed.try_get_u32_le()?;
        let current_players = fixed.try_get_u32_le()?;
        let session_name_ref = FieldRef::deser(&mut fixed)?;
        let password_ref = FieldRef::deser(&mut fixed)?;
        let reserved_data_ref = FieldRef::deser(&mut fixed)?;
        let application_reserved_data_ref = FieldRef::deser(&mut fixed)?;
        let guid_instance = try_get_guid(&mut fixed)?;
        let guid_application = try_get_guid(&mut fixed)?;
        let dpnid = Dpnid::deser(&mut fixed)?;
        let version = fixed.try_get_u32_le()?;
        let version_not_used = fixed.try_get_u32_le()?;
        let entry_count = fixed.try_get_u32_le()? as usize;
        let membership_count = fixed.try_get_u32_le()? as usize;

        let records_len = entry_count
            .checked_mul(NameTableEntryInfo::RECORD_LEN)
            .and_then(|e| membership_count.checked_mul(NameTableMembershipInfo::RECORD_LEN).map(|m| (e, m)))
            .and_then(|(e, m)| Self::HEADER_LEN.checked_add(e)?.checked_add(m));
        if !records_len.is_some_and(|len| len <= body.len()) {
            bail!(
                "name table records ({} entries, {} memberships) do not fit in {} bytes",
                entry_count,
                membership_count,
                body.len()
            );
        }

        let tail = TailReader::new(body);
        let mut name_table_entries = Vec::with_capacity(entry_count);
        for i in 0..entry_count {
            let start = Self::HEADER_LEN + NameTableEntryInfo::RECORD_LEN * i;
            let mut record = &body[start..start + NameTableEntryInfo::RECORD_LEN];
            let mut entry = NameTableEntryInfo::deser_scalars(&mut record)?;
            let name_ref = FieldRef::deser(&mut record)?;
            let data_ref = FieldRef::deser(&mut record)?;
            let url_ref = FieldRef::deser(&mut record)?;
            entry.url = AsciiString::from_raw(tail.slice(url_ref)?.to_vec());
            entry.data = tail.bytes(data_ref)?;
            entry.name = WideString::from_raw(tail.slice(name_ref)?.to_vec());
            name_table_entries.push(entry);
        }

        let memberships_start = Self::HEADER_LEN + NameTableEntryInfo::RECORD_LEN * entry_count;
        let mut name_table_memberships = Vec::with_capacity(membership_count);
        for i in 0..membership_count {
            let start = memberships_start + NameTableMembershipInfo::RECORD_LEN * i;
            let mut record = &body[start..start + NameTableMembershipInfo::RECORD_LEN];
            name_table_memberships.push(NameTableMembershipInfo::deser(&mut record)?);
        }

        Ok(SendConnectInfoMessage {
            flags,
            max_players,
            current_players,
            guid_instance,
            guid_application,
            dpnid,
            version,
            version_not_used,
            name_table_entries,
            name_table_memberships,
            application_reserved_data: tail.bytes(application_reserved_data_ref)?,
            reserved_data: tail.bytes(reserved_data_ref)?,
            password: WideString::from_raw(tail.slice(password_ref)?.to_vec()),
            session_name: WideString::from_raw(tail.slice(session_name_ref)?.to_vec()),
            reply: tail.bytes(reply_ref)?,
        })
    }
}

/// Acknowledges the receipt of the session information; carries no fields at all.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct AckConnectInfoMessage;

impl AckConnectInfoMessage {
    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_u32_le(PacketType::AckConnectInfo.into());
    }

    pub fn deser(data: &[u8]) -> anyhow::Result<AckConnectInfoMessage> {
        expect_tag(data, PacketType::AckConnectInfo)?;
        Ok(AckConnectInfoMessage)
    }
}

/// Rejection of a connect attempt, with an optional application-supplied reply blob.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct ConnectFailedMessage {
    pub result_code: ResultCode,
    pub reply: Bytes,
}

impl ConnectFailedMessage {
    const FIXED_LEN: usize = 12;

    pub fn ser(&self, buf: &mut BytesMut) {
        let mut tail = TailWriter::new(Self::FIXED_LEN, self.reply.len());
        let reply_ref = tail.push(&self.reply);

        buf.put_u32_le(PacketType::ConnectFailed.into());
        buf.put_u32_le(self.result_code.into());
        reply_ref.ser(buf);
        tail.finish(buf);
    }

    pub fn deser(data: &[u8]) -> anyhow::Result<ConnectFailedMessage> {
        let body = expect_tag(data, PacketType::ConnectFailed)?;
        let mut fixed = body;

        let result_code = ResultCode::try_from_primitive(fixed.try_get_u32_le()?)?;
        let reply_ref = FieldRef::deser(&mut fixed)?;

        Ok(ConnectFailedMessage {
            result_code,
            reply: TailReader::new(body).bytes(reply_ref)?,
        })
    }
}

/// Tells a freshly instructed peer which id the sender goes by.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct SendPlayerDpnidMessage {
    pub dpnid: Dpnid,
}

impl SendPlayerDpnidMessage {
    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_u32_le(PacketType::SendPlayerDpnid.into());
        self.dpnid.ser(buf);
    }

    pub fn deser(data: &[u8]) -> anyhow::Result<SendPlayerDpnidMessage> {
        let mut fixed = expect_tag(data, PacketType::SendPlayerDpnid)?;
        Ok(SendPlayerDpnidMessage {
            dpnid: Dpnid::deser(&mut fixed)?,
        })
    }
}

#[cfg(test)]
mod test {
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    use rstest::rstest;

    use crate::core::address::Address;

    use super::*;

    fn connect_failed_fixture(result_byte: u8) -> Vec<u8> {
        vec![
            0xC5, 0x00, 0x00, 0x00, result_byte, 0x83, 0x15, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00,
        ]
    }

    #[rstest]
    #[case::invalid_interface(0x90, ResultCode::InvalidInterface)]
    #[case::invalid_application(0x00, ResultCode::InvalidApplication)]
    fn test_connect_failed_fixture(#[case] result_byte: u8, #[case] expected_code: ResultCode) {
        let data = connect_failed_fixture(result_byte);
        let message = ConnectFailedMessage::deser(&data).unwrap();
        assert_eq!(message.result_code, expected_code);
        assert!(message.reply.is_empty());

        let mut buf = BytesMut::new();
        message.ser(&mut buf);
        assert_eq!(buf.as_ref(), &data[..]);
    }

    #[rstest]
    fn test_connect_failed_with_reply() {
        let original = ConnectFailedMessage {
            result_code: ResultCode::HostRejectedConnection,
            reply: Bytes::from_static(b"denied"),
        };
        let mut buf = BytesMut::new();
        original.ser(&mut buf);

        // reply packed directly after the 12-byte fixed part
        assert_eq!(&buf[4 + 4..4 + 12], &[12, 0, 0, 0, 6, 0, 0, 0]);
        assert_eq!(&buf[16..], b"denied");
        assert_eq!(ConnectFailedMessage::deser(&buf).unwrap(), original);
    }

    #[rstest]
    fn test_ack_connect_info_fixture() {
        let data = [0xC3, 0x00, 0x00, 0x00];
        let message = AckConnectInfoMessage::deser(&data).unwrap();

        let mut buf = BytesMut::new();
        message.ser(&mut buf);
        assert_eq!(buf.as_ref(), &data);
    }

    #[rstest]
    fn test_send_player_dpnid_roundtrip() {
        let original = SendPlayerDpnidMessage { dpnid: Dpnid::from_raw(0x118E99EE) };
        let mut buf = BytesMut::new();
        original.ser(&mut buf);
        assert_eq!(buf.as_ref(), &[0xC4, 0, 0, 0, 0xEE, 0x99, 0x8E, 0x11]);
        assert_eq!(SendPlayerDpnidMessage::deser(&buf).unwrap(), original);
    }

    #[rstest]
    fn test_player_connect_info_fixture_name_and_alternate_address() {
        #[rustfmt::skip]
        let data: &[u8] = &[
            0xC1, 0x00, 0x00, 0x00,
            0x04, 0x00, 0x00, 0x00, // flags: peer
            0x08, 0x00, 0x00, 0x00, // dnet version 8 (outside the documented set)
            0x60, 0x00, 0x00, 0x00, 0x14, 0x00, 0x00, 0x00, // name
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // data
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // password
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // connect data
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // url
            0x23, 0x81, 0xBE, 0x94, 0xAB, 0xA1, 0xFB, 0x48, 0xA2, 0xE7, 0x23, 0x85, 0x9E, 0x65, 0x89, 0x36,
            0xDA, 0x80, 0xEF, 0x61, 0x1B, 0x69, 0x47, 0x42, 0x9A, 0xDD, 0x1C, 0x7B, 0xED, 0x2B, 0xC1, 0x3E,
            0x58, 0x00, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00, // alternate addresses
            0x07, 0x02, 0x08, 0xFE, 0x41, 0x34, 0xEF, 0x3D,
            0x54, 0x00, 0x65, 0x00, 0x73, 0x00, 0x74, 0x00, 0x20, 0x00, 0x55, 0x00, 0x73, 0x00,
            0x65, 0x00, 0x72, 0x00, 0x00, 0x00,
        ];

        let message = PlayerConnectInfoMessage::deser(data).unwrap();
        assert_eq!(message.flags, ObjectType::PEER);
        assert_eq!(message.dnet_version, DnetVersion::from_raw(8));
        assert_eq!(message.guid_instance, Uuid::from_u128(0x94be8123_a1ab_48fb_a2e7_23859e658936));
        assert_eq!(message.guid_application, Uuid::from_u128(0x61ef80da_691b_4247_9add_1c7bed2bc13e));
        assert_eq!(
            message.alternate_addresses,
            vec![AlternateAddress::new(IpAddr::V4(Ipv4Addr::new(65, 52, 239, 61)), 2302)]
        );
        assert_eq!(message.name, WideString::from_text("Test User"));
        assert!(message.url.as_bytes().is_empty());
        assert!(message.connect_data.is_empty());

        let mut buf = BytesMut::new();
        message.ser(&mut buf);
        assert_eq!(buf.as_ref(), data);
    }

    #[rstest]
    fn test_player_connect_info_fixture_all_fields() {
        let url = Address::for_host("1.2.3.4", 2302).url();
        #[rustfmt::skip]
        let data: Vec<u8> = [
            &[
                0xC1, 0x00, 0x00, 0x00,
                0x04, 0x00, 0x00, 0x00, // flags: peer
                0x07, 0x00, 0x00, 0x00, // dnet version: directx 9.0
                0x07, 0x01, 0x00, 0x00, 0x16, 0x00, 0x00, 0x00, // name
                0xEF, 0x00, 0x00, 0x00, 0x18, 0x00, 0x00, 0x00, // data
                0xDD, 0x00, 0x00, 0x00, 0x12, 0x00, 0x00, 0x00, // password
                0xD1, 0x00, 0x00, 0x00, 0x0C, 0x00, 0x00, 0x00, // connect data
                0x74, 0x00, 0x00, 0x00, 0x5D, 0x00, 0x00, 0x00, // url
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
                0xC4, 0xE2, 0x4D, 0xEB, 0xB2, 0x79, 0x4A, 0x48, 0xA1, 0xA8, 0x7A, 0xA7, 0x5F, 0x55, 0x45, 0xD4,
                0x58, 0x00, 0x00, 0x00, 0x1C, 0x00, 0x00, 0x00, // alternate addresses
                0x13, 0x17, 0x08, 0xFE, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
                0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
                0x07, 0x02, 0x08, 0xFE, 0x7F, 0x00, 0x00, 0x01,
            ][..],
            url.as_bytes(), &[0x00],
            b"Hello World!",
            &[
                0x50, 0x00, 0x61, 0x00, 0x73, 0x00, 0x73, 0x00, 0x77, 0x00, 0x6F, 0x00, 0x72, 0x00,
                0x64, 0x00, 0x00, 0x00,
            ][..],
            &[
                0x48, 0x00, 0x65, 0x00, 0x6C, 0x00, 0x6C, 0x00, 0x6F, 0x00, 0x20, 0x00, 0x57, 0x00,
                0x6F, 0x00, 0x72, 0x00, 0x6C, 0x00, 0x64, 0x00, 0x21, 0x00,
            ][..],
            &[
                0x54, 0x00, 0x65, 0x00, 0x73, 0x00, 0x74, 0x00, 0x50, 0x00, 0x6C, 0x00, 0x61, 0x00,
                0x79, 0x00, 0x65, 0x00, 0x72, 0x00, 0x00, 0x00,
            ][..],
        ]
        .concat();

        let message = PlayerConnectInfoMessage::deser(&data).unwrap();
        assert_eq!(message.flags, ObjectType::PEER);
        assert_eq!(message.dnet_version, DnetVersion::DIRECTX_90);
        assert_eq!(message.guid_instance, Uuid::nil());
        assert_eq!(message.guid_application, Uuid::from_u128(0xeb4de2c4_79b2_484a_a1a8_7aa75f5545d4));
        assert_eq!(
            message.alternate_addresses,
            vec![
                AlternateAddress::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 2302),
                AlternateAddress::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 2302),
            ]
        );
        assert_eq!(message.url, AsciiString::from_text(&url));
        assert_eq!(message.connect_data, Bytes::from_static(b"Hello World!"));
        assert_eq!(message.password, WideString::from_text("Password"));
        let wide_hello = "Hello World!"
            .encode_utf16()
            .flat_map(u16::to_le_bytes)
            .collect::<Vec<_>>();
        assert_eq!(message.data, wide_hello);
        assert_eq!(message.name, WideString::from_text("TestPlayer"));

        let mut buf = BytesMut::new();
        message.ser(&mut buf);
        assert_eq!(buf.as_ref(), &data[..]);
    }

    #[rstest]
    fn test_send_connect_info_layout() {
        let original = SendConnectInfoMessage {
            flags: SessionFlags::MIGRATE_HOST,
            max_players: 8,
            current_players: 2,
            dpnid: Dpnid::from_raw(0x11223344),
            version: 9,
            name_table_entries: vec![NameTableEntryInfo {
                dpnid: Dpnid::from_raw(1),
                dpnid_owner: Dpnid::from_raw(2),
                flags: crate::core::name_table::NameTableEntryFlags::PEER,
                version: 3,
                dnet_version: DnetVersion::DIRECTX_90,
                url: AsciiString::from_text("ab"),
                name: WideString::from_text("N"),
                ..Default::default()
            }],
            name_table_memberships: vec![NameTableMembershipInfo {
                dpnid_player: Dpnid::from_raw(1),
                dpnid_group: Dpnid::from_raw(2),
                version: 3,
                version_not_used: 0,
            }],
            session_name: WideString::from_text("S"),
            reply: Bytes::from_static(&[0xAA]),
            ..Default::default()
        };

        let mut buf = BytesMut::new();
        original.ser(&mut buf);

        // 4 tag + 108 header + 48 entry + 16 membership + 12 tail bytes
        assert_eq!(buf.len(), 188);
        // reply ref points at the last byte, session name right below it
        assert_eq!(&buf[4..12], &[183, 0, 0, 0, 1, 0, 0, 0]);
        assert_eq!(&buf[12..16], &[80, 0, 0, 0]);
        assert_eq!(&buf[28..36], &[179, 0, 0, 0, 4, 0, 0, 0]);
        // entry record: 24 scalar bytes, then name/data/url refs
        assert_eq!(&buf[112 + 24..112 + 48], &[
            175, 0, 0, 0, 4, 0, 0, 0, // name
            0, 0, 0, 0, 0, 0, 0, 0, // data absent
            172, 0, 0, 0, 3, 0, 0, 0, // url
        ]);
        // tail region, bottom to top: url, name, session name, reply
        assert_eq!(&buf[176..], &[
            b'a', b'b', 0,
            0x4E, 0x00, 0x00, 0x00,
            0x53, 0x00, 0x00, 0x00,
            0xAA,
        ]);

        assert_eq!(SendConnectInfoMessage::deser(&buf).unwrap(), original);
    }

    #[rstest]
    fn test_send_connect_info_rejects_wrong_description_size() {
        let original = SendConnectInfoMessage::default();
        let mut buf = BytesMut::new();
        original.ser(&mut buf);
        assert!(SendConnectInfoMessage::deser(&buf).is_ok());

        buf[12] = 81;
        assert!(SendConnectInfoMessage::deser(&buf).is_err());
    }

    #[rstest]
    fn test_deser_rejects_foreign_tag() {
        let data = [0xC3, 0x00, 0x00, 0x00];
        assert!(ConnectFailedMessage::deser(&data).is_err());
        assert!(PlayerConnectInfoMessage::deser(&data).is_err());
        assert!(SendConnectInfoMessage::deser(&data).is_err());
        assert!(SendPlayerDpnidMessage::deser(&data).is_err());
    }
}
