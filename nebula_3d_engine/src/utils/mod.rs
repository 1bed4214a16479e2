/// Utility module - allocators and small helpers

pub mod slot_allocator;

pub use slot_allocator::SlotAllocator;
