use tracing::trace;

use crate::{
    arena::{Arena, ArenaRef},
    row::RowPtr,
};

use super::{Exploder, PartitionContext, RowConsumer};

/// Expands each row into zero or more rows. Every output row gets its own
/// child arena holding a reference to the input row's arena, so elements
/// may point back into the parent row for as long as they live.
pub struct TableExplodeRows<C, X> {
    next: C,
    exploder: X,
}

impl<C, X> TableExplodeRows<C, X>
where
    C: RowConsumer,
    X: Exploder,
{
    pub fn new(exploder: X, next: C) -> Self {
        TableExplodeRows { next, exploder }
    }
}

impl<C, X> RowConsumer for TableExplodeRows<C, X>
where
    C: RowConsumer,
    X: Exploder,
{
    type Endpoint = C::Endpoint;

    fn end(&mut self) -> &mut C::Endpoint {
        self.next.end()
    }

    fn ctx(&self) -> &PartitionContext {
        self.next.ctx()
    }

    fn consume(&mut self, arena: ArenaRef, row: RowPtr) -> anyhow::Result<()> {
        let len = self.exploder.len(&arena, row);
        trace!(len, "exploding row");
        for i in 0..len {
            let child = arena.get_child_arena();
            child.add_reference_to(arena.clone());
            let element = self.exploder.element(&child, row, i);
            self.next.consume(child, element)?;
        }
        Ok(())
    }
}

/// An `Exploder` built from a pair of closures.
pub struct FnExploder<L, E> {
    len: L,
    element: E,
}

impl<L, E> FnExploder<L, E>
where
    L: FnMut(&Arena, RowPtr) -> usize,
    E: FnMut(&Arena, RowPtr, usize) -> RowPtr,
{
    pub fn new(len: L, element: E) -> Self {
        FnExploder { len, element }
    }
}

impl<L, E> Exploder for FnExploder<L, E>
where
    L: FnMut(&Arena, RowPtr) -> usize,
    E: FnMut(&Arena, RowPtr, usize) -> RowPtr,
{
    fn len(&mut self, arena: &Arena, row: RowPtr) -> usize {
        (self.len)(arena, row)
    }

    fn element(&mut self, child: &Arena, row: RowPtr, i: usize) -> RowPtr {
        (self.element)(child, row, i)
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::TableExplodeRows;
    use crate::{
        arena::BlockPool,
        table::{
            test_util::{array_exploder, array_row, collector},
            RowConsumer,
        },
    };

    #[test]
    fn test_explode_children_keep_parent_alive() -> anyhow::Result<()> {
        let pool = BlockPool::new();
        let (endpoint, seen) = collector(&pool);
        let mut explode = TableExplodeRows::new(array_exploder(), endpoint);

        let parent = pool.get_arena();
        let row = array_row(&parent, &[10, 20, 30]);
        let weak = Rc::downgrade(&parent);
        explode.consume(parent, row)?;

        {
            let seen = seen.borrow();
            assert_eq!(
                vec![10, 20, 30],
                seen.iter().map(|(_, v)| *v).collect::<Vec<_>>()
            );
            for (i, (child, _)) in seen.iter().enumerate() {
                assert_eq!(1, child.num_parents());
                assert!(child.pool().ptr_eq(&pool));
                for (other, _) in &seen[i + 1..] {
                    assert!(!Rc::ptr_eq(child, other));
                }
            }
        }

        // Only the children hold the parent now.
        assert!(weak.upgrade().is_some());
        assert_eq!(0, pool.num_free_arenas());

        seen.borrow_mut().clear();
        assert!(weak.upgrade().is_none());
        assert_eq!(4, pool.num_free_arenas());
        Ok(())
    }

    #[test]
    fn test_explode_empty_row() -> anyhow::Result<()> {
        let pool = BlockPool::new();
        let (endpoint, seen) = collector(&pool);
        let mut explode = TableExplodeRows::new(array_exploder(), endpoint);

        let parent = pool.get_arena();
        let row = array_row(&parent, &[]);
        explode.consume(parent, row)?;

        assert!(seen.borrow().is_empty());
        assert_eq!(1, pool.num_free_arenas());
        Ok(())
    }
}
