// Arenas back every row and value produced while a partition is processed.
//
// An arena is a bump allocator over a chain of fixed-size blocks obtained
// from a `BlockPool`. Allocation only ever moves forward: pointers handed out
// stay valid until the arena is cleared, which happens when the last
// `ArenaRef` to it is dropped. At that point every block except the current
// one goes back to the pool, big chunks are freed, and the arena's state is
// parked in the pool for reuse.
//
// Values in one arena may point into memory owned by another (an exploded
// element borrowing its parent row's strings, say). Such an arena records a
// strong reference to the arena it points into with `add_reference_to`, so
// the referenced arena cannot be recycled until every arena depending on it
// is gone. Arenas therefore form a DAG of keep-alive edges.
use std::{
    alloc::Layout,
    cell::RefCell,
    mem::{self, ManuallyDrop},
    ptr::{self, NonNull},
    rc::Rc,
};

use tracing::trace;

use crate::row::round_up_offset;

mod block;
mod pool;


pub use block::{Block, BLOCK_ALIGN};
pub use pool::BlockPool;

/// Shared handle to an arena. The arena is recycled when the last handle
/// is dropped.
pub type ArenaRef = Rc<Arena>;

#[derive(Debug)]
pub(crate) struct ArenaState {
    current: Block,
    offset: usize,
    used_blocks: Vec<Block>,
    big_chunks: Vec<Block>,
    parents: Vec<ArenaRef>,
}

impl ArenaState {
    pub(crate) fn new(current: Block) -> Self {
        ArenaState {
            current,
            offset: 0,
            used_blocks: Vec::new(),
            big_chunks: Vec::new(),
            parents: Vec::new(),
        }
    }

    // Alignment is applied to the absolute address, so any power of two up
    // to the block alignment is honored without wasting the block prefix.
    fn bump(&mut self, size: usize, align: usize) -> Option<NonNull<u8>> {
        let base = self.current.as_ptr() as usize;
        let start = round_up_offset(base + self.offset, align) - base;
        let end = start.checked_add(size)?;
        if end > self.current.len() {
            return None;
        }
        self.offset = end;
        // SAFETY: start <= end <= len, so the result is inside the block.
        Some(unsafe { NonNull::new_unchecked(self.current.as_ptr().add(start)) })
    }

    fn big_chunk(&mut self, size: usize, align: usize) -> NonNull<u8> {
        trace!(size, "allocating big chunk");
        let chunk = Block::alloc(size.max(1), align);
        // SAFETY: Block memory is never null.
        let ptr = unsafe { NonNull::new_unchecked(chunk.as_ptr()) };
        self.big_chunks.push(chunk);
        ptr
    }

    fn next_block(&mut self, fresh: Block) {
        let used = mem::replace(&mut self.current, fresh);
        self.used_blocks.push(used);
        self.offset = 0;
    }

    // Returns the parent references instead of dropping them, since dropping
    // a parent can re-enter the pool.
    #[must_use]
    pub(crate) fn reset(&mut self, pool: &BlockPool) -> Vec<ArenaRef> {
        self.offset = 0;
        for block in self.used_blocks.drain(..) {
            pool.return_block(block);
        }
        self.big_chunks.clear();
        mem::take(&mut self.parents)
    }
}

/// A bump-allocating memory region. See the module documentation.
///
/// An arena is single-threaded. All methods take `&self` so that an arena
/// can be allocated into while it is shared between a row and the stages
/// processing it.
#[derive(Debug)]
pub struct Arena {
    pool: BlockPool,
    state: ManuallyDrop<RefCell<ArenaState>>,
}

impl Arena {
    pub(crate) fn new(pool: BlockPool, state: ArenaState) -> ArenaRef {
        Rc::new(Arena {
            pool,
            state: ManuallyDrop::new(RefCell::new(state)),
        })
    }

    pub fn pool(&self) -> &BlockPool {
        &self.pool
    }

    /// Allocates `size` bytes aligned to `align`. The memory is
    /// uninitialized and stays put until the arena is cleared.
    pub fn allocate(&self, size: usize, align: usize) -> NonNull<u8> {
        assert!(align.is_power_of_two(), "alignment must be a power of two");
        let mut state = self.state.borrow_mut();
        if let Some(ptr) = state.bump(size, align) {
            return ptr;
        }

        if size > self.pool.config().big_chunk_threshold {
            return state.big_chunk(size, align);
        }

        state.next_block(self.pool.get_block());
        match state.bump(size, align) {
            Some(ptr) => ptr,
            // Only reachable with alignments larger than a block's.
            None => state.big_chunk(size, align),
        }
    }

    pub fn allocate_layout(&self, layout: Layout) -> NonNull<u8> {
        self.allocate(layout.size(), layout.align())
    }

    /// Copies `bytes` into the arena.
    pub fn alloc_copy(&self, bytes: &[u8]) -> NonNull<u8> {
        let ptr = self.allocate(bytes.len(), 1);
        // SAFETY: the destination was just allocated with room for `bytes`
        // and cannot overlap it.
        unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr(), bytes.len()) };
        ptr
    }

    /// Moves `value` into the arena. It is never dropped, hence `Copy`.
    pub fn alloc_value<T: Copy>(&self, value: T) -> NonNull<T> {
        let ptr = self.allocate_layout(Layout::new::<T>()).cast::<T>();
        // SAFETY: freshly allocated, sized and aligned for T.
        unsafe { ptr.as_ptr().write(value) };
        ptr
    }

    /// Resets the arena: used blocks go back to the pool, big chunks are
    /// freed and parent references are released. The current block is kept.
    ///
    /// Any pointer previously returned by this arena dangles afterwards.
    pub fn clear(&self) {
        let parents = self.state.borrow_mut().reset(&self.pool);
        self.pool.release(parents);
    }

    /// Keeps `other` alive at least as long as this arena's contents.
    pub fn add_reference_to(&self, other: ArenaRef) {
        self.state.borrow_mut().parents.push(other);
    }

    pub fn get_child_arena(&self) -> ArenaRef {
        self.pool.get_arena()
    }

    pub fn num_used_blocks(&self) -> usize {
        self.state.borrow().used_blocks.len()
    }

    pub fn num_big_chunks(&self) -> usize {
        self.state.borrow().big_chunks.len()
    }

    pub fn num_parents(&self) -> usize {
        self.state.borrow().parents.len()
    }

    /// Bytes in use in the current block.
    pub fn offset(&self) -> usize {
        self.state.borrow().offset
    }

    #[cfg(test)]
    pub(crate) fn current_block_ptr(&self) -> *mut u8 {
        self.state.borrow().current.as_ptr()
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        // SAFETY: the state is not touched again after being taken.
        let state = unsafe { ManuallyDrop::take(&mut self.state) }.into_inner();
        self.pool.retire(state);
    }
}
