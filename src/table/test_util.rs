// Row formats used by the pipeline tests. A "long row" is a single i64; an
// "array row" is an i32 length followed by the address of an i64 array.
use std::{cell::RefCell, rc::Rc};

use anyhow::bail;

use crate::{
    arena::{Arena, ArenaRef, BlockPool},
    buffer::{InputBuffer, OutputBuffer},
    row::{load_address, load_length, load_long, store_address, store_length, RowPtr},
};

use super::{FnExploder, PartitionContext, RowDecoder, RowEncoder, TableForEach};

pub(crate) type Seen = Rc<RefCell<Vec<(ArenaRef, i64)>>>;

pub(crate) fn long_row(arena: &Arena, v: i64) -> RowPtr {
    arena.alloc_value(v).as_ptr() as RowPtr
}

pub(crate) fn array_row(arena: &Arena, values: &[i64]) -> RowPtr {
    let elements = arena.allocate(values.len() * 8, 8).as_ptr();
    let row = arena.allocate(16, 8).as_ptr();
    unsafe {
        std::ptr::copy_nonoverlapping(values.as_ptr(), elements.cast::<i64>(), values.len());
        store_length(row, values.len());
        store_address(row.add(8), elements);
    }
    row
}

pub(crate) fn array_exploder() -> FnExploder<
    impl FnMut(&Arena, RowPtr) -> usize,
    impl FnMut(&Arena, RowPtr, usize) -> RowPtr,
> {
    FnExploder::new(
        |_: &Arena, row: RowPtr| unsafe { load_length(row) },
        |_: &Arena, row: RowPtr, i: usize| unsafe { load_address(row.add(8)).add(i * 8) },
    )
}

/// An endpoint recording every row as `(arena, value)`, reading each row as a
/// long.
pub(crate) fn collector(
    pool: &BlockPool,
) -> (
    TableForEach<impl FnMut(ArenaRef, RowPtr) -> anyhow::Result<()>>,
    Seen,
) {
    let seen: Seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let endpoint = TableForEach::new(
        PartitionContext::new(pool.clone()),
        move |arena: ArenaRef, row: RowPtr| {
            sink.borrow_mut().push((arena, unsafe { load_long(row) }));
            Ok(())
        },
    );
    (endpoint, seen)
}

pub(crate) struct LongEncoder<B> {
    pub(crate) out: B,
}

impl<B: OutputBuffer> RowEncoder for LongEncoder<B> {
    fn encode_byte(&mut self, more: bool) -> anyhow::Result<()> {
        self.out.write_bool(more)
    }

    fn encode_row(&mut self, row: RowPtr) -> anyhow::Result<()> {
        self.out.write_i64(unsafe { load_long(row) })
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        self.out.flush()
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.out.close()
    }
}

pub(crate) struct LongDecoder<B> {
    pub(crate) input: B,
}

impl<B: InputBuffer> RowDecoder for LongDecoder<B> {
    fn decode_byte(&mut self) -> anyhow::Result<bool> {
        self.input.read_bool()
    }

    fn decode_row(&mut self, arena: &Arena) -> anyhow::Result<RowPtr> {
        Ok(long_row(arena, self.input.read_i64()?))
    }
}

pub(crate) struct ArrayEncoder<B> {
    pub(crate) out: B,
}

impl<B: OutputBuffer> RowEncoder for ArrayEncoder<B> {
    fn encode_byte(&mut self, more: bool) -> anyhow::Result<()> {
        self.out.write_bool(more)
    }

    fn encode_row(&mut self, row: RowPtr) -> anyhow::Result<()> {
        let len = unsafe { load_length(row) };
        let elements = unsafe { load_address(row.add(8)) };
        self.out.write_i32(len as i32)?;
        for i in 0..len {
            self.out.write_i64(unsafe { load_long(elements.add(i * 8)) })?;
        }
        Ok(())
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        self.out.flush()
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.out.close()
    }
}

pub(crate) struct ArrayDecoder<B> {
    pub(crate) input: B,
}

impl<B: InputBuffer> RowDecoder for ArrayDecoder<B> {
    fn decode_byte(&mut self) -> anyhow::Result<bool> {
        self.input.read_bool()
    }

    fn decode_row(&mut self, arena: &Arena) -> anyhow::Result<RowPtr> {
        let len = self.input.read_i32()?;
        if len < 0 {
            bail!("negative array length {}", len);
        }
        let values = (0..len)
            .map(|_| self.input.read_i64())
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(array_row(arena, &values))
    }
}
