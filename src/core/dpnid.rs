use std::fmt::{Debug, Formatter};

use bytes::{Buf, BufMut};
use uuid::Uuid;

/// Opaque 32-bit peer/group identifier. Nothing beyond equality may be read into the raw
///  value; the derived constructor is how the host mints new ids, but receivers treat every
///  id as a plain number.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct Dpnid(u32);

impl Dpnid {
    pub const EMPTY: Dpnid = Dpnid(0);

    pub fn from_raw(value: u32) -> Dpnid {
        Dpnid(value)
    }

    pub fn to_raw(&self) -> u32 {
        self.0
    }

    /// Derives an id from a name table slot: the low 20 bits hold the slot index, the rest
    ///  the name table version, and the whole thing is masked with the first word of the
    ///  session instance GUID.
    pub fn derived(index: u32, version: u32, guid_instance: Uuid) -> Dpnid {
        let guid_bytes = guid_instance.to_bytes_le();
        let guid_word = u32::from_le_bytes([guid_bytes[0], guid_bytes[1], guid_bytes[2], guid_bytes[3]]);
        Dpnid((index & 0xFFFFF).wrapping_add(version.wrapping_shl(20)) ^ guid_word)
    }

    pub fn ser(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.0);
    }

    pub fn deser(buf: &mut impl Buf) -> anyhow::Result<Dpnid> {
        Ok(Dpnid(buf.try_get_u32_le()?))
    }
}

impl Debug for Dpnid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "dpnid:{:08x}", self.0)
    }
}
