// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use cfcache_model::{CacheEntryId, KernelPlaneSet};

/// Resident kernel sets, one optional slot per [`CacheEntryId`].
///
/// Slots fill monotonically and are never evicted; callers share payloads
/// through `Arc` handles.
#[derive(Debug, Default)]
pub struct MemoryTier {
    slots: Vec<Option<Arc<KernelPlaneSet>>>,
}

impl MemoryTier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, id: CacheEntryId) -> Option<Arc<KernelPlaneSet>> {
        self.slots.get(id.index()).and_then(Clone::clone)
    }

    /// Installs `set` under `id`, growing the slot table with empty slots as
    /// needed. An existing payload for `id` is replaced.
    pub fn put(&mut self, id: CacheEntryId, set: Arc<KernelPlaneSet>) {
        let i = id.index();
        if self.slots.len() <= i {
            self.slots.resize(i + 1, None);
        }
        self.slots[i] = Some(set);
    }

    #[must_use]
    pub fn is_loaded(&self, id: CacheEntryId) -> bool {
        matches!(self.slots.get(id.index()), Some(Some(_)))
    }

    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn loaded_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Bytes of kernel samples held across all loaded slots.
    #[must_use]
    pub fn payload_bytes(&self) -> usize {
        self.slots
            .iter()
            .flatten()
            .map(|set| set.payload_bytes())
            .sum()
    }
}
