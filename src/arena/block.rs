use std::{
    alloc::{self, Layout},
    ptr::NonNull,
};

use tracing::trace;

/// Alignment of every pooled block.
pub const BLOCK_ALIGN: usize = 16;

/// A span of raw heap memory with exactly one owner: the pool's free list,
/// an arena's used list, an arena's current slot, or an arena's big-chunk
/// list. Dropping it returns the memory to the system allocator.
#[derive(Debug)]
pub struct Block {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl Block {
    pub(crate) fn alloc(size: usize, align: usize) -> Self {
        let layout = Layout::from_size_align(size, align).expect("invalid block layout");
        assert!(layout.size() > 0, "blocks cannot be empty");
        // SAFETY: the layout has a non-zero size.
        let ptr = unsafe { alloc::alloc(layout) };
        let ptr = match NonNull::new(ptr) {
            Some(ptr) => ptr,
            // Arenas back every in-flight row, there is no way to continue
            // with a partially satisfied request.
            None => alloc::handle_alloc_error(layout),
        };
        trace!(size, align, "allocated raw block");
        Block { ptr, layout }
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.layout.size()
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        // SAFETY: ptr was returned by `alloc::alloc` with this exact layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

#[test]
fn test_block_alignment() {
    for align in [1, 8, BLOCK_ALIGN, 4096] {
        let block = Block::alloc(100, align);
        assert_eq!(0, block.as_ptr() as usize % align);
        assert_eq!(100, block.len());
    }
}
