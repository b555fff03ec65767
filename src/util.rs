use anyhow::bail;
use bytes::{Buf, BufMut};
use uuid::Uuid;

/// GUIDs are stored in the mixed-endian layout the original platform used: the first three
///  groups little-endian, the rest as-is. `Uuid` calls this the "le" byte format.
pub(crate) fn put_guid(buf: &mut impl BufMut, guid: Uuid) {
    buf.put_slice(&guid.to_bytes_le());
}

pub(crate) fn try_get_guid(buf: &mut impl Buf) -> anyhow::Result<Uuid> {
    if buf.remaining() < 16 {
        bail!("truncated guid: {} bytes remaining", buf.remaining());
    }
    let mut raw = [0u8; 16];
    buf.copy_to_slice(&mut raw);
    Ok(Uuid::from_bytes_le(raw))
}
