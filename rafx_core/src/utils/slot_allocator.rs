/// Allocates and recycles bounded `u32` indices.
///
/// Backs the bindless texture table: every shader-readable texture gets a
/// small stable integer that shaders receive through push constants.
/// Freed indices are recycled LIFO on subsequent allocations, and the
/// allocator never hands out more than `capacity` live indices.
///
/// # Example
///
/// ```ignore
/// let mut alloc = SlotAllocator::with_capacity(2);
/// let a = alloc.alloc();  // Some(0)
/// let b = alloc.alloc();  // Some(1)
/// assert!(alloc.alloc().is_none());
/// alloc.free(0);
/// let c = alloc.alloc();  // Some(0) (recycled)
/// ```
pub struct SlotAllocator {
    free_list: Vec<u32>,
    live: Vec<bool>,
    next_id: u32,
    len: u32,
    capacity: u32,
}

impl SlotAllocator {
    /// Create an allocator bounded only by `u32::MAX`
    pub fn new() -> Self {
        Self::with_capacity(u32::MAX)
    }

    /// Create an allocator handing out at most `capacity` live indices
    pub fn with_capacity(capacity: u32) -> Self {
        Self {
            free_list: Vec::new(),
            live: Vec::new(),
            next_id: 0,
            len: 0,
            capacity,
        }
    }

    /// Allocate the next available slot index, `None` when the table is full
    pub fn alloc(&mut self) -> Option<u32> {
        let id = match self.free_list.pop() {
            Some(id) => id,
            None => {
                if self.next_id >= self.capacity {
                    return None;
                }
                let id = self.next_id;
                self.next_id += 1;
                self.live.push(false);
                id
            }
        };
        self.live[id as usize] = true;
        self.len += 1;
        Some(id)
    }

    /// Return a slot index to the pool for reuse.
    ///
    /// Returns false (and changes nothing) for an index that is not live.
    pub fn free(&mut self, id: u32) -> bool {
        match self.live.get_mut(id as usize) {
            Some(live) if *live => {
                *live = false;
                self.len -= 1;
                self.free_list.push(id);
                true
            }
            _ => false,
        }
    }

    /// Whether `id` is currently allocated
    pub fn is_live(&self, id: u32) -> bool {
        self.live.get(id as usize).copied().unwrap_or(false)
    }

    /// Highest index ever allocated + 1.
    ///
    /// This is the minimum size the backing descriptor table must have.
    pub fn high_water_mark(&self) -> u32 {
        self.next_id
    }

    /// Maximum number of live indices
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of currently allocated slots
    pub fn len(&self) -> u32 {
        self.len
    }

    /// Whether no slots are currently allocated
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for SlotAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "slot_allocator_tests.rs"]
mod tests;
