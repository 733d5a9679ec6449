use std::collections::{HashMap, HashSet};

use super::error::{GfxError, GfxResult};
use super::handle::{Handle, HandleAllocator, ResourceKind};

/// Live objects of a context, keyed by handle.
///
/// Released handles are remembered so that a second release or a use after
/// release is reported as such rather than as an unknown handle.
#[derive(Debug)]
pub(crate) struct Registry<T> {
    allocator: HandleAllocator,
    live: HashMap<Handle, T>,
    released: HashSet<Handle>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            allocator: HandleAllocator::default(),
            live: HashMap::new(),
            released: HashSet::new(),
        }
    }
}

impl<T> Registry<T> {
    pub(crate) fn insert(&mut self, kind: ResourceKind, value: T) -> Handle {
        let handle = self.allocator.allocate(kind);
        self.live.insert(handle, value);
        handle
    }

    fn check(&self, handle: Handle, kind: ResourceKind) -> GfxResult<()> {
        if !handle.is_valid() || handle.kind() != kind {
            return Err(GfxError::InvalidHandle(handle));
        }
        if self.released.contains(&handle) {
            return Err(GfxError::Released(handle));
        }
        if !self.live.contains_key(&handle) {
            return Err(GfxError::InvalidHandle(handle));
        }
        Ok(())
    }

    pub(crate) fn get(&self, handle: Handle, kind: ResourceKind) -> GfxResult<&T> {
        self.check(handle, kind)?;
        self.live
            .get(&handle)
            .ok_or(GfxError::InvalidHandle(handle))
    }

    pub(crate) fn get_mut(&mut self, handle: Handle, kind: ResourceKind) -> GfxResult<&mut T> {
        self.check(handle, kind)?;
        self.live
            .get_mut(&handle)
            .ok_or(GfxError::InvalidHandle(handle))
    }

    pub(crate) fn remove(&mut self, handle: Handle) -> GfxResult<T> {
        self.check(handle, handle.kind())?;
        self.released.insert(handle);
        self.live
            .remove(&handle)
            .ok_or(GfxError::InvalidHandle(handle))
    }

    pub(crate) fn len(&self) -> usize {
        self.live.len()
    }

    pub(crate) fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.live.keys().copied()
    }
}
