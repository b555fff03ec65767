use std::fmt::{Debug, Formatter};

/// Version stamp of the remote peer's networking library. The documented values are below,
///  but peers in the wild report others (e.g. 8), so this stays an open value rather than a
///  closed enum.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct DnetVersion(u32);

impl DnetVersion {
    pub const DIRECTX_80: DnetVersion = DnetVersion(0x0000_0001);
    pub const DIRECTX_81: DnetVersion = DnetVersion(0x0000_0002);
    pub const POCKET_PC: DnetVersion = DnetVersion(0x0000_0003);
    pub const WINDOWS_SERVER_2003: DnetVersion = DnetVersion(0x0000_0005);
    pub const DIRECTX_82: DnetVersion = DnetVersion(0x0000_0006);
    pub const DIRECTX_90: DnetVersion = DnetVersion(0x0000_0007);

    pub fn from_raw(value: u32) -> DnetVersion {
        DnetVersion(value)
    }

    pub fn to_raw(&self) -> u32 {
        self.0
    }
}

impl Debug for DnetVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "dnet:{}", self.0)
    }
}
