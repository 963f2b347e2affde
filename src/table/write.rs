use tracing::debug;

use crate::{arena::ArenaRef, row::RowPtr};

use super::{PartitionContext, RowConsumer, RowEncoder};

/// An endpoint encoding every row it receives, in the format `TableRead`
/// expects back.
pub struct TableWrite<E> {
    ctx: PartitionContext,
    encoder: E,
    rows: usize,
}

impl<E: RowEncoder> TableWrite<E> {
    pub fn new(ctx: PartitionContext, encoder: E) -> Self {
        TableWrite {
            ctx,
            encoder,
            rows: 0,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Writes the end-of-partition flag and closes the encoder, returning
    /// the number of rows written.
    pub fn finish(&mut self) -> anyhow::Result<usize> {
        self.encoder.encode_byte(false)?;
        self.encoder.close()?;
        debug!(rows = self.rows, "finished writing partition");
        Ok(self.rows)
    }

    pub fn into_encoder(self) -> E {
        self.encoder
    }
}

impl<E: RowEncoder> RowConsumer for TableWrite<E> {
    type Endpoint = Self;

    fn end(&mut self) -> &mut Self {
        self
    }

    fn ctx(&self) -> &PartitionContext {
        &self.ctx
    }

    fn consume(&mut self, _arena: ArenaRef, row: RowPtr) -> anyhow::Result<()> {
        self.encoder.encode_byte(true)?;
        self.encoder.encode_row(row)?;
        self.rows += 1;
        Ok(())
    }
}
