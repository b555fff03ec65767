use bytes::{BufMut, Bytes, BytesMut};

use crate::core::dpnid::Dpnid;
use crate::core::layout::{FieldRef, TailReader, TailWriter};
use crate::core::{expect_tag, PacketType};

/// Notifies peers that hosting is migrating from the old to the new host.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct HostMigrateMessage {
    pub dpnid_old_host: Dpnid,
    pub dpnid_new_host: Dpnid,
}

impl HostMigrateMessage {
    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_u32_le(PacketType::HostMigrate.into());
        self.dpnid_old_host.ser(buf);
        self.dpnid_new_host.ser(buf);
    }

    pub fn deser(data: &[u8]) -> anyhow::Result<HostMigrateMessage> {
        let mut fixed = expect_tag(data, PacketType::HostMigrate)?;
        Ok(HostMigrateMessage {
            dpnid_old_host: Dpnid::deser(&mut fixed)?,
            dpnid_new_host: Dpnid::deser(&mut fixed)?,
        })
    }
}

/// Announces that host migration finished successfully. No fields.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct HostMigrateCompleteMessage;

impl HostMigrateCompleteMessage {
    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_u32_le(PacketType::HostMigrateComplete.into());
    }

    pub fn deser(data: &[u8]) -> anyhow::Result<HostMigrateCompleteMessage> {
        expect_tag(data, PacketType::HostMigrateComplete)?;
        Ok(HostMigrateCompleteMessage)
    }
}

/// Instructs the receiver to disconnect itself from the session, with an optional
///  application-supplied blob explaining why.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct TerminateSessionMessage {
    pub terminate_data: Bytes,
}

impl TerminateSessionMessage {
    const FIXED_LEN: usize = 8;

    pub fn ser(&self, buf: &mut BytesMut) {
        let mut tail = TailWriter::new(Self::FIXED_LEN, self.terminate_data.len());
        let terminate_data_ref = tail.push(&self.terminate_data);

        buf.put_u32_le(PacketType::TerminateSession.into());
        terminate_data_ref.ser(buf);
        tail.finish(buf);
    }

    pub fn deser(data: &[u8]) -> anyhow::Result<TerminateSessionMessage> {
        let body = expect_tag(data, PacketType::TerminateSession)?;
        let mut fixed = body;

        let terminate_data_ref = FieldRef::deser(&mut fixed)?;
        Ok(TerminateSessionMessage {
            terminate_data: TailReader::new(body).bytes(terminate_data_ref)?,
        })
    }
}

#[cfg(test)]
mod test {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_host_migrate_roundtrip() {
        let original = HostMigrateMessage {
            dpnid_old_host: Dpnid::from_raw(0x0FEB7711),
            dpnid_new_host: Dpnid::from_raw(0x118E99EE),
        };
        let mut buf = BytesMut::new();
        original.ser(&mut buf);
        assert_eq!(buf.as_ref(), &[
            0xCD, 0x00, 0x00, 0x00, 0x11, 0x77, 0xEB, 0x0F, 0xEE, 0x99, 0x8E, 0x11,
        ]);
        assert_eq!(HostMigrateMessage::deser(&buf).unwrap(), original);
    }

    #[rstest]
    fn test_host_migrate_complete_roundtrip() {
        let mut buf = BytesMut::new();
        HostMigrateCompleteMessage.ser(&mut buf);
        assert_eq!(buf.as_ref(), &[0xCE, 0x00, 0x00, 0x00]);
        assert!(HostMigrateCompleteMessage::deser(&buf).is_ok());
    }

    #[rstest]
    #[case::empty(Bytes::new(), vec![0xDF, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0])]
    #[case::with_data(
        Bytes::from_static(b"bye"),
        vec![0xDF, 0, 0, 0, 8, 0, 0, 0, 3, 0, 0, 0, b'b', b'y', b'e'],
    )]
    fn test_terminate_session_roundtrip(#[case] terminate_data: Bytes, #[case] expected: Vec<u8>) {
        let original = TerminateSessionMessage { terminate_data };
        let mut buf = BytesMut::new();
        original.ser(&mut buf);
        assert_eq!(buf.as_ref(), &expected[..]);
        assert_eq!(TerminateSessionMessage::deser(&buf).unwrap(), original);
    }

    #[rstest]
    fn test_terminate_session_rejects_out_of_range_data() {
        let data = [0xDF, 0, 0, 0, 8, 0, 0, 0, 200, 0, 0, 0];
        assert!(TerminateSessionMessage::deser(&data).is_err());
    }
}
