use std::fmt::{Debug, Formatter};

use rand::RngCore;

/// Opaque 32-bit connection nonce negotiated during the handshake. Zero is reserved as
///  "empty/absent" - a keep-alive frame uses presence of a non-empty session id to
///  correlate, so the random generator must never hand out zero.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct SessionId(u32);

impl SessionId {
    pub const EMPTY: SessionId = SessionId(0);

    pub fn from_raw(value: u32) -> SessionId {
        SessionId(value)
    }

    pub fn to_raw(&self) -> u32 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    /// redraws on an unlucky zero instead of ever returning the reserved value
    pub fn random() -> SessionId {
        loop {
            let value = rand::thread_rng().next_u32();
            if value != 0 {
                return SessionId(value);
            }
        }
    }
}

impl Debug for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "sess:{:08x}", self.0)
    }
}
