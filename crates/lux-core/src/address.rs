//! Flat channel addressing
//!
//! Output channels live in a single flat address space spanning all
//! universes. An address decomposes into (universe, channel) with 512
//! channels per universe.

use serde::{Deserialize, Serialize};

use crate::error::{AddressError, AddressResult};

/// Channels per universe
pub const UNIVERSE_CHANNELS: usize = 512;

/// Flat channel address across all universes
///
/// `universe = addr / 512`, `channel = addr % 512`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Address(pub u32);

impl Address {
    /// Build an address from a universe index and a channel within it
    #[inline]
    pub fn from_parts(universe: usize, channel: usize) -> Self {
        debug_assert!(channel < UNIVERSE_CHANNELS);
        Self((universe * UNIVERSE_CHANNELS + channel) as u32)
    }

    /// Universe index this address falls in
    #[inline]
    pub fn universe(self) -> usize {
        self.0 as usize / UNIVERSE_CHANNELS
    }

    /// Channel within the universe
    #[inline]
    pub fn channel(self) -> usize {
        self.0 as usize % UNIVERSE_CHANNELS
    }

    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Validate against the configured universe count
    #[inline]
    pub fn checked(self, universe_count: usize) -> AddressResult<Self> {
        if self.universe() < universe_count {
            Ok(self)
        } else {
            Err(AddressError::OutOfRange {
                address: self.0,
                universes: universe_count,
            })
        }
    }

    /// Validate a contiguous range starting at this address
    ///
    /// The range must fit within the configured universe count and must
    /// not cross a universe boundary.
    pub fn checked_range(self, len: usize, universe_count: usize) -> AddressResult<Self> {
        self.checked(universe_count)?;
        if len == 0 || self.channel() + len <= UNIVERSE_CHANNELS {
            Ok(self)
        } else {
            Err(AddressError::SpansBoundary {
                address: self.0,
                len,
            })
        }
    }
}

impl From<u32> for Address {
    #[inline]
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_decomposition() {
        let addr = Address(517);
        assert_eq!(addr.universe(), 1);
        assert_eq!(addr.channel(), 5);
        assert_eq!(Address::from_parts(1, 5), addr);
    }

    #[test]
    fn test_address_bounds() {
        assert!(Address(1023).checked(2).is_ok());
        assert!(Address(1024).checked(2).is_err());
        assert!(Address(0).checked(0).is_err());
    }

    #[test]
    fn test_range_boundary() {
        // 512 channels starting at channel 0 stay inside the universe
        assert!(Address(0).checked_range(512, 1).is_ok());
        // one more crosses into the next universe
        assert!(Address(1).checked_range(512, 2).is_err());
        assert!(Address(510).checked_range(2, 1).is_ok());
        assert!(Address(511).checked_range(2, 2).is_err());
    }
}
