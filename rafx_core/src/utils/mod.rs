/// Small helpers shared by the registry and the devices

pub mod slot_allocator;

pub use slot_allocator::SlotAllocator;
