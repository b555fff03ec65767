use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};

/// 8-bit frame sequence counter with circular ordering.
///
/// Comparison is the signed difference of the raw bytes (TCP/IP Illustrated, Vol. 2,
///  p. 810): values less than half the range apart compare normally, values further apart
///  wrap. At a distance of exactly 128 the scheme is genuinely ambiguous - both directions
///  report `Less` - and peers depend on that tie-break, so it stays as-is. That also means
///  this cannot be an `Ord` impl.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct SequenceId(u8);

impl SequenceId {
    pub const ZERO: SequenceId = SequenceId(0);

    pub fn from_raw(value: u8) -> SequenceId {
        SequenceId(value)
    }

    pub fn to_raw(&self) -> u8 {
        self.0
    }

    pub fn next(&self) -> SequenceId {
        SequenceId(self.0.wrapping_add(1))
    }

    pub fn circular_cmp(&self, other: &SequenceId) -> Ordering {
        (self.0.wrapping_sub(other.0) as i8).cmp(&0)
    }
}

impl Debug for SequenceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "seq:{}", self.0)
    }
}
