use tracing::debug;

use super::{PartitionContext, RowConsumer, RowDecoder};

/// The head of a pipeline: decodes rows from a partition stream, each into a
/// fresh arena from the partition's pool, and pushes them downstream.
///
/// The stream is a sequence of `true` flag + row pairs terminated by a
/// `false` flag.
pub struct TableRead<C, D> {
    next: C,
    decoder: D,
    rows: usize,
}

impl<C, D> TableRead<C, D>
where
    C: RowConsumer,
    D: RowDecoder,
{
    pub fn new(decoder: D, next: C) -> Self {
        TableRead {
            next,
            decoder,
            rows: 0,
        }
    }

    pub fn end(&mut self) -> &mut C::Endpoint {
        self.next.end()
    }

    pub fn ctx(&self) -> &PartitionContext {
        self.next.ctx()
    }

    /// Rows decoded so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Reads the next flag, returning whether a row follows.
    pub fn advance(&mut self) -> anyhow::Result<bool> {
        self.decoder.decode_byte()
    }

    /// Decodes the next row and pushes it through the pipeline. Only valid
    /// after `advance` returned true.
    pub fn consume(&mut self) -> anyhow::Result<()> {
        let arena = self.next.ctx().pool().get_arena();
        let row = self.decoder.decode_row(&arena)?;
        self.rows += 1;
        self.next.consume(arena, row)
    }

    /// Drives the whole partition through the pipeline, returning the number
    /// of rows read.
    pub fn run(&mut self) -> anyhow::Result<usize> {
        while self.advance()? {
            self.consume()?;
        }
        debug!(rows = self.rows, "finished reading partition");
        Ok(self.rows)
    }

    pub fn into_decoder(self) -> D {
        self.decoder
    }
}
