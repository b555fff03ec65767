use bytes::{Buf, BufMut, Bytes};

use crate::core::dnet_version::DnetVersion;
use crate::core::dpnid::Dpnid;
use crate::core::strings::{AsciiString, WideString};

bitflags::bitflags! {
    /// Status bits of a name table slot. Unknown bits are retained so foreign flag words
    ///  survive a decode/encode cycle.
    #[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
    pub struct NameTableEntryFlags: u32 {
        const LOCAL = 0x0000_0001;
        const HOST = 0x0000_0002;
        const ALL_PLAYERS_GROUP = 0x0000_0004;
        const GROUP = 0x0000_0010;
        const GROUP_AUTO_DESTRUCT = 0x0000_0040;
        const PEER = 0x0000_0100;
        const CLIENT = 0x0000_0200;
        const SERVER = 0x0000_0400;
        const CONNECTING = 0x0000_1000;
        const AVAILABLE = 0x0000_2000;
        const DISCONNECTING = 0x0000_4000;
        const INDICATED = 0x0001_0000;
        const CREATED = 0x0002_0000;
        const NEED_TO_DESTROY = 0x0004_0000;
        const IN_USE = 0x0008_0000;
    }
}

/// One player or group in the name table snapshot the host sends to a joining peer.
///
/// The scalar part is a fixed 24-byte record; name/data/url live in the *enclosing*
///  message's shared tail region, addressed by refs that sit right after the scalars.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct NameTableEntryInfo {
    pub dpnid: Dpnid,
    pub dpnid_owner: Dpnid,
    pub flags: NameTableEntryFlags,
    pub version: u32,
    pub version_not_used: u32,
    pub dnet_version: DnetVersion,
    pub url: AsciiString,
    pub data: Bytes,
    pub name: WideString,
}

impl NameTableEntryInfo {
    /// 24 scalar bytes plus the three field refs
    pub(crate) const RECORD_LEN: usize = 48;

    pub(crate) fn ser_scalars(&self, buf: &mut impl BufMut) {
        self.dpnid.ser(buf);
        self.dpnid_owner.ser(buf);
        buf.put_u32_le(self.flags.bits());
        buf.put_u32_le(self.version);
        buf.put_u32_le(self.version_not_used);
        buf.put_u32_le(self.dnet_version.to_raw());
    }

    /// reads the scalar part; the variable fields stay empty until the caller resolves them
    pub(crate) fn deser_scalars(buf: &mut impl Buf) -> anyhow::Result<NameTableEntryInfo> {
        Ok(NameTableEntryInfo {
            dpnid: Dpnid::deser(buf)?,
            dpnid_owner: Dpnid::deser(buf)?,
            flags: NameTableEntryFlags::from_bits_retain(buf.try_get_u32_le()?),
            version: buf.try_get_u32_le()?,
            version_not_used: buf.try_get_u32_le()?,
            dnet_version: DnetVersion::from_raw(buf.try_get_u32_le()?),
            url: AsciiString::default(),
            data: Bytes::new(),
            name: WideString::default(),
        })
    }
}

/// Player-to-group association, a plain 16-byte record.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct NameTableMembershipInfo {
    pub dpnid_player: Dpnid,
    pub dpnid_group: Dpnid,
    pub version: u32,
    pub version_not_used: u32,
}

impl NameTableMembershipInfo {
    pub(crate) const RECORD_LEN: usize = 16;

    pub(crate) fn ser(&self, buf: &mut impl BufMut) {
        self.dpnid_player.ser(buf);
        self.dpnid_group.ser(buf);
        buf.put_u32_le(self.version);
        buf.put_u32_le(self.version_not_used);
    }

    pub(crate) fn deser(buf: &mut impl Buf) -> anyhow::Result<NameTableMembershipInfo> {
        Ok(NameTableMembershipInfo {
            dpnid_player: Dpnid::deser(buf)?,
            dpnid_group: Dpnid::deser(buf)?,
            version: buf.try_get_u32_le()?,
            version_not_used: buf.try_get_u32_le()?,
        })
    }
}
