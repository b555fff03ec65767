use anyhow::bail;
use bytes::{Buf, BufMut, BytesMut};

use crate::reliable::sequence_id::SequenceId;
use crate::reliable::{combine_mask, mask_halves, ExtendedOpcode, PacketCommand};

bitflags::bitflags! {
    /// SACK-local status byte. The mask-presence bits are distinct from the data frame's
    ///  control bits and are derived from which mask halves are carried.
    #[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
    pub struct SackFlags: u8 {
        /// the retry field is valid
        const RESPONSE = 0x01;
        const SACK_LOW = 0x02;
        const SACK_HIGH = 0x04;
        const SEND_LOW = 0x08;
        const SEND_HIGH = 0x10;
    }
}

/// Dedicated selective acknowledgment, sent when an immediate ACK was requested or no user
///  data is flowing to piggyback on.
///
/// Each mask half is `Some` exactly when its flag bit is set on the wire, so a
///  present-but-zero half survives a decode/encode cycle. The two padding bytes are written
///  as zero and ignored on read.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct SackMessage {
    pub command: PacketCommand,
    /// whether the retry field is meaningful
    pub response: bool,
    /// non-zero if the last received data frame was a retry
    pub retry: u8,
    /// sequence number of the next data frame to send; SACK frames have none of their own
    pub next_send: SequenceId,
    pub next_receive: SequenceId,
    pub timestamp: u32,
    pub sack_mask_low: Option<u32>,
    pub sack_mask_high: Option<u32>,
    pub send_mask_low: Option<u32>,
    pub send_mask_high: Option<u32>,
    /// opaque; only present on the wire when signing is enabled for the connection
    pub signature: u64,
}

impl Default for SackMessage {
    fn default() -> Self {
        SackMessage {
            command: PacketCommand::COMMAND_FRAME,
            response: false,
            retry: 0,
            next_send: SequenceId::ZERO,
            next_receive: SequenceId::ZERO,
            timestamp: 0,
            sack_mask_low: None,
            sack_mask_high: None,
            send_mask_low: None,
            send_mask_high: None,
            signature: 0,
        }
    }
}

impl SackMessage {
    /// the 64-bit SACK mask; absent halves read as zero
    pub fn sack_mask(&self) -> u64 {
        combine_mask(self.sack_mask_low, self.sack_mask_high)
    }

    /// the 64-bit cancel-send mask; absent halves read as zero
    pub fn send_mask(&self) -> u64 {
        combine_mask(self.send_mask_low, self.send_mask_high)
    }

    /// carries each non-zero half, like the original senders do
    pub fn with_sack_mask(mut self, mask: u64) -> SackMessage {
        (self.sack_mask_low, self.sack_mask_high) = mask_halves(mask);
        self
    }

    pub fn with_send_mask(mut self, mask: u64) -> SackMessage {
        (self.send_mask_low, self.send_mask_high) = mask_halves(mask);
        self
    }

    fn flags(&self) -> SackFlags {
        let mut flags = SackFlags::empty();
        flags.set(SackFlags::RESPONSE, self.response);
        flags.set(SackFlags::SACK_LOW, self.sack_mask_low.is_some());
        flags.set(SackFlags::SACK_HIGH, self.sack_mask_high.is_some());
        flags.set(SackFlags::SEND_LOW, self.send_mask_low.is_some());
        flags.set(SackFlags::SEND_HIGH, self.send_mask_high.is_some());
        flags
    }

    pub fn ser(&self, buf: &mut BytesMut, signing_enabled: bool) {
        buf.put_u8(self.command.bits());
        buf.put_u8(ExtendedOpcode::Sack.into());
        buf.put_u8(self.flags().bits());
        buf.put_u8(self.retry);
        buf.put_u8(self.next_send.to_raw());
        buf.put_u8(self.next_receive.to_raw());
        buf.put_u16_le(0); // padding
        buf.put_u32_le(self.timestamp);
        for mask in [self.sack_mask_low, self.sack_mask_high, self.send_mask_low, self.send_mask_high]
            .into_iter()
            .flatten()
        {
            buf.put_u32_le(mask);
        }
        if signing_enabled {
            buf.put_u64_le(self.signature);
        }
    }

    pub fn deser(data: &[u8], signing_enabled: bool) -> anyhow::Result<SackMessage> {
        let mut buf = data;
        let command = PacketCommand::from_bits_retain(buf.try_get_u8()?);
        let opcode = buf.try_get_u8()?;
        if opcode != u8::from(ExtendedOpcode::Sack) {
            bail!("opcode {:#04x} is not a sack frame", opcode);
        }
        let flags = SackFlags::from_bits_retain(buf.try_get_u8()?);
        let retry = buf.try_get_u8()?;
        let next_send = SequenceId::from_raw(buf.try_get_u8()?);
        let next_receive = SequenceId::from_raw(buf.try_get_u8()?);
        let _padding = buf.try_get_u16_le()?;
        let timestamp = buf.try_get_u32_le()?;

        let mut gated = |flag: SackFlags| -> anyhow::Result<Option<u32>> {
            if flags.contains(flag) {
                Ok(Some(buf.try_get_u32_le()?))
            }
            else {
                Ok(None)
            }
        };
        let sack_mask_low = gated(SackFlags::SACK_LOW)?;
        let sack_mask_high = gated(SackFlags::SACK_HIGH)?;
        let send_mask_low = gated(SackFlags::SEND_LOW)?;
        let send_mask_high = gated(SackFlags::SEND_HIGH)?;

        Ok(SackMessage {
            command,
            response: flags.contains(SackFlags::RESPONSE),
            retry,
            next_send,
            next_receive,
            timestamp,
            sack_mask_low,
            sack_mask_high,
            send_mask_low,
            send_mask_high,
            signature: if signing_enabled { buf.try_get_u64_le()? } else { 0 },
        })
    }
}
