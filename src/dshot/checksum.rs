//! # DShot Checksum
//!
//! 4-bit checksum over the 12-bit DShot payload (11-bit throttle + telemetry flag).
//!
//! **Standard**: XOR of the three payload nibbles
//! **Inverted**: complement of the standard checksum (bidirectional DShot)

use serde::Deserialize;

/// Mask for the 12-bit payload
pub const DSHOT_PAYLOAD_MASK: u16 = 0x0FFF;

/// Mask for the 4-bit checksum
pub const DSHOT_CHECKSUM_MASK: u16 = 0x000F;

/// Checksum variant carried in the low nibble of a frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumKind {
    /// Unidirectional DShot
    #[default]
    Standard,
    /// Bidirectional DShot, where the ESC answers on the same line
    Inverted,
}

impl ChecksumKind {
    /// Compute the checksum of a 12-bit payload for this variant
    ///
    /// Bits above the 12-bit payload are ignored.
    pub const fn compute(self, payload: u16) -> u8 {
        match self {
            Self::Standard => dshot_checksum(payload),
            Self::Inverted => dshot_checksum_inverted(payload),
        }
    }
}

/// Standard DShot checksum
///
/// # Examples
///
/// ```
/// use dshot_esc::dshot::checksum::dshot_checksum;
///
/// // Throttle 1046, no telemetry: payload 0x82C
/// assert_eq!(dshot_checksum(0x82C), 0x6);
/// ```
pub const fn dshot_checksum(payload: u16) -> u8 {
    let payload = payload & DSHOT_PAYLOAD_MASK;
    ((payload ^ (payload >> 4) ^ (payload >> 8)) & DSHOT_CHECKSUM_MASK) as u8
}

/// Inverted DShot checksum used by bidirectional ESC firmware
pub const fn dshot_checksum_inverted(payload: u16) -> u8 {
    !dshot_checksum(payload) & DSHOT_CHECKSUM_MASK as u8
}

/// Nibble-by-nibble checksum (slow, for verification)
#[allow(dead_code)]
fn dshot_checksum_slow(payload: u16) -> u8 {
    let mut csum = 0u16;
    let mut data = payload & DSHOT_PAYLOAD_MASK;

    for _ in 0..3 {
        csum ^= data & DSHOT_CHECKSUM_MASK;
        data >>= 4;
    }

    csum as u8
}
