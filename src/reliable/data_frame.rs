use anyhow::bail;
use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::reliable::sequence_id::SequenceId;
use crate::reliable::session_id::SessionId;
use crate::reliable::{combine_mask, mask_halves, PacketCommand};

bitflags::bitflags! {
    /// Control byte of a data frame. Apart from the three plain flags, every bit gates an
    ///  optional field, so the serializer derives the byte from what the frame carries.
    #[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
    pub struct PacketControl: u8 {
        /// this frame is a retry for its sequence number
        const RETRY = 0x01;
        /// keep-alive / correlation frame: a session id follows instead of a payload
        const KEEP_ALIVE_OR_CORRELATE = 0x02;
        /// the payload is a coalesced bundle of messages
        const COALESCE = 0x04;
        /// last frame in the stream, indicates disconnect
        const END_STREAM = 0x08;
        const SACK_LOW = 0x10;
        const SACK_HIGH = 0x20;
        const SEND_LOW = 0x40;
        const SEND_HIGH = 0x80;
    }
}

/// What a data frame carries after its header: either the correlation session id (keep-alive
///  frames, no payload) or the raw application payload. The two are mutually exclusive on
///  the wire, so they are one field here.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum DataFrameBody {
    KeepAlive(SessionId),
    Payload(Bytes),
}

/// Sequenced frame carrying application payload (or a keep-alive), with piggybacked
///  acknowledgment state.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct DataFrameMessage {
    /// must have the DATA bit set; never the COMMAND_FRAME bit
    pub command: PacketCommand,
    pub retry: bool,
    pub coalesce: bool,
    pub end_stream: bool,
    pub sequence_id: SequenceId,
    /// the sequence number expected next from the partner
    pub next_receive: SequenceId,
    pub sack_mask_low: Option<u32>,
    pub sack_mask_high: Option<u32>,
    pub send_mask_low: Option<u32>,
    pub send_mask_high: Option<u32>,
    /// opaque; only present on the wire when signing is enabled for the connection
    pub signature: u64,
    pub body: DataFrameBody,
}

impl Default for DataFrameMessage {
    fn default() -> Self {
        DataFrameMessage {
            command: PacketCommand::DATA,
            retry: false,
            coalesce: false,
            end_stream: false,
            sequence_id: SequenceId::ZERO,
            next_receive: SequenceId::ZERO,
            sack_mask_low: None,
            sack_mask_high: None,
            send_mask_low: None,
            send_mask_high: None,
            signature: 0,
            body: DataFrameBody::Payload(Bytes::new()),
        }
    }
}

impl DataFrameMessage {
    pub fn sack_mask(&self) -> u64 {
        combine_mask(self.sack_mask_low, self.sack_mask_high)
    }

    pub fn send_mask(&self) -> u64 {
        combine_mask(self.send_mask_low, self.send_mask_high)
    }

    pub fn with_sack_mask(mut self, mask: u64) -> DataFrameMessage {
        (self.sack_mask_low, self.sack_mask_high) = mask_halves(mask);
        self
    }

    pub fn with_send_mask(mut self, mask: u64) -> DataFrameMessage {
        (self.send_mask_low, self.send_mask_high) = mask_halves(mask);
        self
    }

    pub fn payload(&self) -> &[u8] {
        match &self.body {
            DataFrameBody::KeepAlive(_) => &[],
            DataFrameBody::Payload(payload) => payload,
        }
    }

    fn control(&self) -> PacketControl {
        let mut control = PacketControl::empty();
        control.set(PacketControl::RETRY, self.retry);
        control.set(
            PacketControl::KEEP_ALIVE_OR_CORRELATE,
            matches!(self.body, DataFrameBody::KeepAlive(_)),
        );
        control.set(PacketControl::COALESCE, self.coalesce);
        control.set(PacketControl::END_STREAM, self.end_stream);
        control.set(PacketControl::SACK_LOW, self.sack_mask_low.is_some());
        control.set(PacketControl::SACK_HIGH, self.sack_mask_high.is_some());
        control.set(PacketControl::SEND_LOW, self.send_mask_low.is_some());
        control.set(PacketControl::SEND_HIGH, self.send_mask_high.is_some());
        control
    }

    pub fn ser(&self, buf: &mut BytesMut, signing_enabled: bool) {
        buf.put_u8(self.command.bits());
        buf.put_u8(self.control().bits());
        buf.put_u8(self.sequence_id.to_raw());
        buf.put_u8(self.next_receive.to_raw());
        for mask in [self.sack_mask_low, self.sack_mask_high, self.send_mask_low, self.send_mask_high]
            .into_iter()
            .flatten()
        {
            buf.put_u32_le(mask);
        }
        if signing_enabled {
            buf.put_u64_le(self.signature);
        }
        match &self.body {
            DataFrameBody::KeepAlive(session_id) => buf.put_u32_le(session_id.to_raw()),
            DataFrameBody::Payload(payload) => buf.put_slice(payload),
        }
    }

    pub fn deser(data: &[u8], signing_enabled: bool) -> anyhow::Result<DataFrameMessage> {
        let mut buf = data;
        let command = PacketCommand::from_bits_retain(buf.try_get_u8()?);
        if !command.contains(PacketCommand::DATA) {
            bail!("command {:#04x} is not a data frame", command.bits());
        }
        let control = PacketControl::from_bits_retain(buf.try_get_u8()?);
        let sequence_id = SequenceId::from_raw(buf.try_get_u8()?);
        let next_receive = SequenceId::from_raw(buf.try_get_u8()?);

        let mut gated = |flag: PacketControl| -> anyhow::Result<Option<u32>> {
            if control.contains(flag) {
                Ok(Some(buf.try_get_u32_le()?))
            }
            else {
                Ok(None)
            }
        };
        let sack_mask_low = gated(PacketControl::SACK_LOW)?;
        let sack_mask_high = gated(PacketControl::SACK_HIGH)?;
        let send_mask_low = gated(PacketControl::SEND_LOW)?;
        let send_mask_high = gated(PacketControl::SEND_HIGH)?;

        let signature = if signing_enabled { buf.try_get_u64_le()? } else { 0 };

        let body = if control.contains(PacketControl::KEEP_ALIVE_OR_CORRELATE) {
            DataFrameBody::KeepAlive(SessionId::from_raw(buf.try_get_u32_le()?))
        }
        else {
            DataFrameBody::Payload(Bytes::copy_from_slice(buf))
        };

        Ok(DataFrameMessage {
            command,
            retry: control.contains(PacketControl::RETRY),
            coalesce: control.contains(PacketControl::COALESCE),
            end_stream: control.contains(PacketControl::END_STREAM),
            sequence_id,
            next_receive,
            sack_mask_low,
            sack_mask_high,
            send_mask_low,
            send_mask_high,
            signature,
            body,
        })
    }
}
