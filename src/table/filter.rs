use crate::{arena::ArenaRef, row::RowPtr};

use super::{PartitionContext, RowConsumer, RowFilter};

/// Forwards the rows `filter` keeps, untouched and in the same arena. Rows it
/// rejects are dropped along with their arena handle.
pub struct TableFilterRows<C, F> {
    next: C,
    filter: F,
}

impl<C, F> TableFilterRows<C, F>
where
    C: RowConsumer,
    F: RowFilter,
{
    pub fn new(filter: F, next: C) -> Self {
        TableFilterRows { next, filter }
    }
}

impl<C, F> RowConsumer for TableFilterRows<C, F>
where
    C: RowConsumer,
    F: RowFilter,
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
        if self.filter.keep(&arena, globals, row) {
            self.next.consume(arena, row)
        } else {
            Ok(())
        }
    }
}
