use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use anyhow::bail;
use bytes::{Buf, BufMut};

/// One entry of the alternate-address list a connecting peer offers: a raw endpoint the
///  host can try when the primary address is unreachable. Several of these are concatenated
///  into a single variable field; each record carries its own length so the list is decoded
///  by consuming the blob until it is exhausted.
///
/// Wire layout: `size(1) | family(1) | port(2, network order) | address bytes`. The size
///  field counts family + port + address, not itself.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct AlternateAddress {
    pub address: IpAddr,
    pub port: u16,
}

// winsock address family codes
const FAMILY_INET: u8 = 2;
const FAMILY_INET6: u8 = 23;

impl AlternateAddress {
    pub fn new(address: IpAddr, port: u16) -> AlternateAddress {
        AlternateAddress { address, port }
    }

    pub fn wire_len(&self) -> usize {
        1 + self.size_field() as usize
    }

    fn size_field(&self) -> u8 {
        match self.address {
            IpAddr::V4(_) => 3 + 4,
            IpAddr::V6(_) => 3 + 16,
        }
    }

    pub fn ser(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.size_field());
        match self.address {
            IpAddr::V4(a) => {
                buf.put_u8(FAMILY_INET);
                buf.put_u16(self.port);
                buf.put_slice(&a.octets());
            }
            IpAddr::V6(a) => {
                buf.put_u8(FAMILY_INET6);
                buf.put_u16(self.port);
                buf.put_slice(&a.octets());
            }
        }
    }

    pub fn deser(buf: &mut impl Buf) -> anyhow::Result<AlternateAddress> {
        let size = buf.try_get_u8()?;
        let family = buf.try_get_u8()?;
        let port = buf.try_get_u16()?;

        let address = match family {
            FAMILY_INET => {
                if buf.remaining() < 4 {
                    bail!("truncated alternate address");
                }
                let mut octets = [0u8; 4];
                buf.copy_to_slice(&mut octets);
                IpAddr::V4(Ipv4Addr::from(octets))
            }
            FAMILY_INET6 => {
                if buf.remaining() < 16 {
                    bail!("truncated alternate address");
                }
                let mut octets = [0u8; 16];
                buf.copy_to_slice(&mut octets);
                IpAddr::V6(Ipv6Addr::from(octets))
            }
            n => bail!("invalid address family: {}", n),
        };

        let result = AlternateAddress { address, port };
        if size != result.size_field() {
            bail!("alternate address size field {} does not match family {}", size, family);
        }
        Ok(result)
    }
}
