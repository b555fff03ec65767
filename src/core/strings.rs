use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};

/// Null-terminated single-byte string as it appears on the wire.
///
/// The raw bytes are kept verbatim so that re-encoding a decoded message is byte-identical.
///  Building one from text appends exactly one terminator, and only for non-empty text - the
///  empty string has a zero-length encoding. Equality and hashing go through the decoded
///  text so that the different spellings of "empty" compare equal.
#[derive(Clone, Default)]
pub struct AsciiString {
    raw: Vec<u8>,
}

impl AsciiString {
    pub fn from_text(text: &str) -> AsciiString {
        if text.is_empty() {
            return AsciiString::default();
        }
        let mut raw = text.as_bytes().to_vec();
        raw.push(0);
        AsciiString { raw }
    }

    pub fn from_raw(raw: Vec<u8>) -> AsciiString {
        AsciiString { raw }
    }

    /// length of the encoded form, including the terminator if there is one
    pub fn wire_len(&self) -> usize {
        self.raw.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn text(&self) -> String {
        let trimmed = self.raw.strip_suffix(&[0]).unwrap_or(&self.raw);
        String::from_utf8_lossy(trimmed).into_owned()
    }
}

impl From<&str> for AsciiString {
    fn from(text: &str) -> Self {
        AsciiString::from_text(text)
    }
}

impl PartialEq for AsciiString {
    fn eq(&self, other: &Self) -> bool {
        self.text() == other.text()
    }
}
impl Eq for AsciiString {}

impl Hash for AsciiString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text().hash(state);
    }
}

impl Debug for AsciiString {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.text())
    }
}

/// Null-terminated UTF-16LE string, two bytes per code unit. Same raw-preserving and
///  text-equality rules as [AsciiString].
#[derive(Clone, Default)]
pub struct WideString {
    raw: Vec<u8>,
}

impl WideString {
    pub fn from_text(text: &str) -> WideString {
        if text.is_empty() {
            return WideString::default();
        }
        let mut raw = Vec::with_capacity(2 * text.len() + 2);
        for unit in text.encode_utf16() {
            raw.extend_from_slice(&unit.to_le_bytes());
        }
        raw.extend_from_slice(&[0, 0]);
        WideString { raw }
    }

    pub fn from_raw(raw: Vec<u8>) -> WideString {
        WideString { raw }
    }

    pub fn wire_len(&self) -> usize {
        self.raw.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn text(&self) -> String {
        let units = self
            .raw
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect::<Vec<_>>();
        let trimmed = units.strip_suffix(&[0]).unwrap_or(&units);
        String::from_utf16_lossy(trimmed)
    }
}

impl From<&str> for WideString {
    fn from(text: &str) -> Self {
        WideString::from_text(text)
    }
}

impl PartialEq for WideString {
    fn eq(&self, other: &Self) -> bool {
        self.text() == other.text()
    }
}
impl Eq for WideString {}

impl Hash for WideString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text().hash(state);
    }
}

impl Debug for WideString {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.text())
    }
}
