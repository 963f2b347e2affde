// Streaming row pipelines.
//
// A pipeline is a chain of stages composed at compile time, each owning the
// next one:
//
//   TableRead -> TableFilterRows -> TableExplodeRows -> ... -> endpoint
//
// `TableRead` drives the chain, decoding one row at a time into a fresh arena
// and pushing `(arena, row)` downstream. Every stage receives ownership of
// the arena handle along with a pointer to the row inside it, and either
// forwards it (possibly several times, with new arenas) or drops it. The
// endpoint owns the `PartitionContext`; every stage reaches it through
// `ctx()`.
//
// A pipeline runs to completion on one thread. Rows are produced and
// consumed in partition order.
use std::ptr;

use crate::{
    arena::{Arena, ArenaRef, BlockPool},
    row::RowPtr,
};

mod explode;
mod filter;
mod map;
mod read;
mod write;

#[cfg(test)]
pub(crate) mod test_util;

pub use explode::{FnExploder, TableExplodeRows};
pub use filter::TableFilterRows;
pub use map::TableMapRows;
pub use read::TableRead;
pub use write::TableWrite;

/// Per-partition state shared by every stage: the pool rows are allocated
/// from, and a read-only globals row.
#[derive(Debug)]
pub struct PartitionContext {
    pool: BlockPool,
    globals: RowPtr,
    // Keeps the memory behind `globals` alive.
    _globals_arena: Option<ArenaRef>,
}

impl PartitionContext {
    pub fn new(pool: BlockPool) -> Self {
        PartitionContext {
            pool,
            globals: ptr::null(),
            _globals_arena: None,
        }
    }

    /// `globals` must point into `arena`.
    pub fn with_globals(pool: BlockPool, arena: ArenaRef, globals: RowPtr) -> Self {
        PartitionContext {
            pool,
            globals,
            _globals_arena: Some(arena),
        }
    }

    pub fn pool(&self) -> &BlockPool {
        &self.pool
    }

    pub fn globals(&self) -> RowPtr {
        self.globals
    }
}

pub trait RowConsumer {
    /// The stage at the end of the chain.
    type Endpoint;

    fn end(&mut self) -> &mut Self::Endpoint;
    fn ctx(&self) -> &PartitionContext;

    /// Takes ownership of `arena`; `row` points into it (or into an arena it
    /// references).
    fn consume(&mut self, arena: ArenaRef, row: RowPtr) -> anyhow::Result<()>;
}

/// Decodes rows from a partition stream. Produced by whatever wrote the
/// stream; its format must match the buffer stack it reads from.
pub trait RowDecoder {
    /// The "more rows" flag preceding every row.
    fn decode_byte(&mut self) -> anyhow::Result<bool>;
    fn decode_row(&mut self, arena: &Arena) -> anyhow::Result<RowPtr>;
}

pub trait RowEncoder {
    fn encode_byte(&mut self, more: bool) -> anyhow::Result<()>;
    fn encode_row(&mut self, row: RowPtr) -> anyhow::Result<()>;
    fn flush(&mut self) -> anyhow::Result<()>;
    fn close(&mut self) -> anyhow::Result<()>;
}

pub trait RowFilter {
    fn keep(&mut self, arena: &Arena, globals: RowPtr, row: RowPtr) -> bool;
}

impl<F> RowFilter for F
where
    F: FnMut(&Arena, RowPtr, RowPtr) -> bool,
{
    fn keep(&mut self, arena: &Arena, globals: RowPtr, row: RowPtr) -> bool {
        self(arena, globals, row)
    }
}

/// Builds a new row from an old one, allocating in the same arena.
pub trait RowMapper {
    fn map(&mut self, arena: &Arena, globals: RowPtr, row: RowPtr) -> RowPtr;
}

impl<F> RowMapper for F
where
    F: FnMut(&Arena, RowPtr, RowPtr) -> RowPtr,
{
    fn map(&mut self, arena: &Arena, globals: RowPtr, row: RowPtr) -> RowPtr {
        self(arena, globals, row)
    }
}

pub trait Exploder {
    /// How many rows `row` expands into.
    fn len(&mut self, arena: &Arena, row: RowPtr) -> usize;
    /// Materializes the `i`th element of `row` into `child`. The result may
    /// point into the parent row's memory; the child arena keeps the parent
    /// alive.
    fn element(&mut self, child: &Arena, row: RowPtr, i: usize) -> RowPtr;
}

/// An endpoint handing every row to a closure.
pub struct TableForEach<F> {
    ctx: PartitionContext,
    f: F,
}

impl<F> TableForEach<F>
where
    F: FnMut(ArenaRef, RowPtr) -> anyhow::Result<()>,
{
    pub fn new(ctx: PartitionContext, f: F) -> Self {
        TableForEach { ctx, f }
    }
}

impl<F> RowConsumer for TableForEach<F>
where
    F: FnMut(ArenaRef, RowPtr) -> anyhow::Result<()>,
{
    type Endpoint = Self;

    fn end(&mut self) -> &mut Self {
        self
    }

    fn ctx(&self) -> &PartitionContext {
        &self.ctx
    }

    fn consume(&mut self, arena: ArenaRef, row: RowPtr) -> anyhow::Result<()> {
        (self.f)(arena, row)
    }
}
