// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::ValidationError;

/// Identifier of one complete kernel set (all planes, all polarizations, one
/// rotation-angle bucket). Assigned sequentially on append and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheEntryId(u32);

impl CacheEntryId {
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn from_index(index: usize) -> Result<Self, ValidationError> {
        u32::try_from(index)
            .map(Self)
            .map_err(|_| ValidationError(format!("cache entry index {index} exceeds u32 range")))
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for CacheEntryId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for CacheEntryId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::CacheEntryId;

    #[test]
    fn index_roundtrip_and_ordering() {
        let id = CacheEntryId::from_index(7).expect("id");
        assert_eq!(id.get(), 7);
        assert_eq!(id.index(), 7);
        assert!(CacheEntryId::new(2) < CacheEntryId::new(3));
        assert_eq!(id.to_string(), "7");
    }

    #[test]
    fn serializes_as_plain_integer() {
        let text = serde_json::to_string(&CacheEntryId::new(12)).expect("json");
        assert_eq!(text, "12");
    }
}
