//! Object identity allocation

use std::sync::atomic::{AtomicU32, Ordering};

/// Identifier of a drawable object, stable for the object's lifetime
pub type ObjectId = u32;

/// Monotonic id source handed to whoever creates drawable objects
///
/// Owned by the top-level system and passed down instead of living in
/// process-wide state, so independent engines never share a counter.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: AtomicU32,
}

impl IdAllocator {
    /// Create an allocator whose first id is `0`
    pub const fn new() -> Self {
        Self::starting_at(0)
    }

    /// Create an allocator whose first id is `first`
    pub const fn starting_at(first: ObjectId) -> Self {
        Self {
            next: AtomicU32::new(first),
        }
    }

    /// Hand out the next unused id
    pub fn allocate(&self) -> ObjectId {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_sequential() {
        let ids = IdAllocator::new();
        assert_eq!(ids.allocate(), 0);
        assert_eq!(ids.allocate(), 1);
        assert_eq!(ids.allocate(), 2);
    }

    #[test]
    fn test_independent_allocators_do_not_share_state() {
        let a = IdAllocator::starting_at(10);
        let b = IdAllocator::new();
        assert_eq!(a.allocate(), 10);
        assert_eq!(b.allocate(), 0);
        assert_eq!(a.allocate(), 11);
    }
}
