use bytes::{Buf, BufMut, BytesMut};

use crate::core::dpnid::Dpnid;
use crate::core::{expect_tag, PacketType};

/// A peer asking the host to verify that a target peer is still part of the session.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct RequestIntegrityCheckMessage {
    pub request_context: u32,
    pub dpnid_target: Dpnid,
}

impl RequestIntegrityCheckMessage {
    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_u32_le(PacketType::RequestIntegrityCheck.into());
        buf.put_u32_le(self.request_context);
        self.dpnid_target.ser(buf);
    }

    pub fn deser(data: &[u8]) -> anyhow::Result<RequestIntegrityCheckMessage> {
        let mut fixed = expect_tag(data, PacketType::RequestIntegrityCheck)?;
        Ok(RequestIntegrityCheckMessage {
            request_context: fixed.try_get_u32_le()?,
            dpnid_target: Dpnid::deser(&mut fixed)?,
        })
    }
}

/// The host probing a peer on behalf of the requesting peer.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct IntegrityCheckMessage {
    pub dpnid_requesting: Dpnid,
}

impl IntegrityCheckMessage {
    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_u32_le(PacketType::IntegrityCheck.into());
        self.dpnid_requesting.ser(buf);
    }

    pub fn deser(data: &[u8]) -> anyhow::Result<IntegrityCheckMessage> {
        let mut fixed = expect_tag(data, PacketType::IntegrityCheck)?;
        Ok(IntegrityCheckMessage {
            dpnid_requesting: Dpnid::deser(&mut fixed)?,
        })
    }
}

/// The probed peer confirming to the host that it is alive.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct IntegrityCheckResponseMessage {
    pub dpnid_requesting: Dpnid,
}

impl IntegrityCheckResponseMessage {
    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_u32_le(PacketType::IntegrityCheckResponse.into());
        self.dpnid_requesting.ser(buf);
    }

    pub fn deser(data: &[u8]) -> anyhow::Result<IntegrityCheckResponseMessage> {
        let mut fixed = expect_tag(data, PacketType::IntegrityCheckResponse)?;
        Ok(IntegrityCheckResponseMessage {
            dpnid_requesting: Dpnid::deser(&mut fixed)?,
        })
    }
}
