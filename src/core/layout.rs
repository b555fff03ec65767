use anyhow::Context;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// An (offset, size) couple in a message's fixed part addressing one variable-length field.
///
/// Offsets are measured from the first byte after the 4-byte packet-type tag, so the fixed
///  part itself occupies offsets `[0, fixed_len)` and a present field always has
///  `offset >= fixed_len`. An absent field is encoded as `(0, 0)`.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub(crate) struct FieldRef {
    pub offset: u32,
    pub size: u32,
}

impl FieldRef {
    pub fn is_present(&self) -> bool {
        self.offset != 0
    }

    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.offset);
        buf.put_u32_le(self.size);
    }

    pub fn deser(buf: &mut impl Buf) -> anyhow::Result<FieldRef> {
        let offset = buf.try_get_u32_le()?;
        let size = buf.try_get_u32_le()?;
        Ok(FieldRef { offset, size })
    }
}

/// Back-to-front packer for a message's variable tail.
///
/// Fields are pushed in the message type's fixed pack order; each non-empty push claims the
///  next slot below the running cursor, which starts at `fixed_len + var_len` and must end up
///  exactly at `fixed_len` once everything is pushed. The packed region has no gaps, so
///  appending the chunks in reverse push order reproduces it.
pub(crate) struct TailWriter {
    fixed_len: usize,
    cursor: usize,
    chunks: Vec<Vec<u8>>,
}

impl TailWriter {
    pub fn new(fixed_len: usize, var_len: usize) -> TailWriter {
        TailWriter {
            fixed_len,
            cursor: fixed_len + var_len,
            chunks: Vec::new(),
        }
    }

    pub fn push(&mut self, bytes: &[u8]) -> FieldRef {
        if bytes.is_empty() {
            return FieldRef::default();
        }
        self.cursor -= bytes.len();
        self.chunks.push(bytes.to_vec());
        FieldRef {
            offset: self.cursor as u32,
            size: bytes.len() as u32,
        }
    }

    /// Appends the packed tail. The caller writes the fixed part first; the `FieldRef`s
    ///  handed out by [Self::push] are valid either way because offsets are computed up front.
    pub fn finish(self, buf: &mut BytesMut) {
        debug_assert_eq!(
            self.cursor, self.fixed_len,
            "declared variable length does not match pushed fields"
        );
        for chunk in self.chunks.iter().rev() {
            buf.put_slice(chunk);
        }
    }
}

/// Bounds-checked random access into a message body (everything after the tag) for resolving
///  [FieldRef]s during decode.
pub(crate) struct TailReader<'a> {
    body: &'a [u8],
}

impl<'a> TailReader<'a> {
    pub fn new(body: &'a [u8]) -> TailReader<'a> {
        TailReader { body }
    }

    pub fn slice(&self, field: FieldRef) -> anyhow::Result<&'a [u8]> {
        if !field.is_present() {
            return Ok(&[]);
        }
        let start = field.offset as usize;
        let end = start
            .checked_add(field.size as usize)
            .with_context(|| format!("field ref ({}, {}) overflows", field.offset, field.size))?;
        self.body.get(start..end).with_context(|| {
            format!(
                "field ref ({}, {}) outside message body of {} bytes",
                field.offset,
                field.size,
                self.body.len()
            )
        })
    }

    pub fn bytes(&self, field: FieldRef) -> anyhow::Result<Bytes> {
        Ok(Bytes::copy_from_slice(self.slice(field)?))
    }
}
