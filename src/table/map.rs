use crate::{arena::ArenaRef, row::RowPtr};

use super::{PartitionContext, RowConsumer, RowMapper};

/// Replaces every row with the mapper's output. The new row lives in the same
/// arena as the old one.
pub struct TableMapRows<C, M> {
    next: C,
    mapper: M,
}

impl<C, M> TableMapRows<C, M>
where
    C: RowConsumer,
    M: RowMapper,
{
    pub fn new(mapper: M, next: C) -> Self {
        TableMapRows { next, mapper }
    }
}

impl<C, M> RowConsumer for TableMapRows<C, M>
where
    C: RowConsumer,
    M: RowMapper,
{
    type Endpoint = C::Endpoint;

    fn end(&mut self) -> &mut C::Endpoint {
        self.next.end()
    }

    fn ctx(&self) -> &PartitionContext {
        self.next.ctx()
    }

    fn consume(&mut self, arena: ArenaRef, row: RowPtr) -> anyhow::Result<()> {
        let globals = self.next.ctx().globals();
        let mapped = self.mapper.map(&arena, globals, row);
        self.next.consume(arena, mapped)
    }
}
