use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use tracing::debug;

use crate::config::PoolConfig;

use super::{block::Block, Arena, ArenaRef, ArenaState, BLOCK_ALIGN};

#[derive(Debug)]
struct PoolInner {
    config: PoolConfig,
    free_blocks: RefCell<Vec<Block>>,
    free_arenas: RefCell<Vec<ArenaState>>,

    // Parent references waiting to be dropped. Releasing a parent can
    // release its own parents, so chains are unwound here in a loop rather
    // than through nested drops.
    pending: RefCell<Vec<ArenaRef>>,
    releasing: Cell<bool>,
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        debug!(
            free_blocks = self.free_blocks.get_mut().len(),
            free_arenas = self.free_arenas.get_mut().len(),
            "tearing down block pool"
        );
    }
}

/// Cache of free blocks and retired arenas.
///
/// A `BlockPool` is a cheap handle; clones share the same caches. It is not
/// `Send`: a host processing partitions in parallel gives each worker thread
/// its own pool.
///
/// Arenas are only ever handed out as `ArenaRef`s. When the last reference
/// to an arena goes away the arena is cleared and its state (including its
/// current block) is parked here until the next `get_arena`.
#[derive(Debug, Clone)]
pub struct BlockPool {
    inner: Rc<PoolInner>,
}

impl Default for BlockPool {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockPool {
    pub fn new() -> Self {
        Self::from_validated(PoolConfig::default())
    }

    pub fn with_config(config: PoolConfig) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self::from_validated(config))
    }

    fn from_validated(config: PoolConfig) -> Self {
        debug!(
            block_size = config.block_size,
            big_chunk_threshold = config.big_chunk_threshold,
            "creating block pool"
        );
        BlockPool {
            inner: Rc::new(PoolInner {
                config,
                free_blocks: RefCell::new(Vec::new()),
                free_arenas: RefCell::new(Vec::new()),
                pending: RefCell::new(Vec::new()),
                releasing: Cell::new(false),
            }),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub fn get_block(&self) -> Block {
        let pooled = self.inner.free_blocks.borrow_mut().pop();
        match pooled {
            Some(block) => block,
            None => Block::alloc(self.inner.config.block_size, BLOCK_ALIGN),
        }
    }

    pub(crate) fn return_block(&self, block: Block) {
        self.inner.free_blocks.borrow_mut().push(block);
    }

    pub fn get_arena(&self) -> ArenaRef {
        let retired = self.inner.free_arenas.borrow_mut().pop();
        let state = match retired {
            Some(state) => state,
            None => {
                debug!("pool miss, creating arena");
                ArenaState::new(self.get_block())
            }
        };
        Arena::new(self.clone(), state)
    }

    // Called when the last handle to an arena is dropped.
    pub(crate) fn retire(&self, mut state: ArenaState) {
        let parents = state.reset(self);
        self.inner.free_arenas.borrow_mut().push(state);
        self.release(parents);
    }

    // Drops `parents` once no borrow of the pool is held. Only the outermost
    // call drains the queue; nested calls from arenas retired along the way
    // just enqueue.
    pub(crate) fn release(&self, parents: Vec<ArenaRef>) {
        self.inner.pending.borrow_mut().extend(parents);
        if self.inner.releasing.replace(true) {
            return;
        }
        loop {
            let next = self.inner.pending.borrow_mut().pop();
            match next {
                Some(parent) => drop(parent),
                None => break,
            }
        }
        self.inner.releasing.set(false);
    }

    pub fn num_free_blocks(&self) -> usize {
        self.inner.free_blocks.borrow().len()
    }

    pub fn num_free_arenas(&self) -> usize {
        self.inner.free_arenas.borrow().len()
    }

    pub fn ptr_eq(&self, other: &BlockPool) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}
