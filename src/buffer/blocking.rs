use std::cmp;

use crate::error::CodecError;

use super::{InputBlockBuffer, InputBuffer, OutputBlockBuffer, OutputBuffer};

/// Stages primitive writes in a `BLOCK_SIZE` buffer and hands each full
/// buffer downstream as one block.
///
/// Fixed-width values are never split across blocks: if a value does not
/// fit in the space left, the buffer is flushed first. Only `write_bytes`
/// spans blocks.
#[derive(Debug)]
pub struct BlockingOutputBuffer<const BLOCK_SIZE: usize, B> {
    block_buf: B,
    block: Box<[u8]>,
    off: usize,
}

impl<const BLOCK_SIZE: usize, B> BlockingOutputBuffer<BLOCK_SIZE, B>
where
    B: OutputBlockBuffer,
{
    pub fn new(block_buf: B) -> Self {
        assert!(BLOCK_SIZE >= 8, "block size must fit the widest primitive");
        BlockingOutputBuffer {
            block_buf,
            block: vec![0; BLOCK_SIZE].into_boxed_slice(),
            off: 0,
        }
    }

    pub fn get_ref(&self) -> &B {
        &self.block_buf
    }

    pub fn into_inner(self) -> B {
        self.block_buf
    }

    fn write_fixed<const N: usize>(&mut self, bytes: [u8; N]) -> anyhow::Result<()> {
        if self.off + N > BLOCK_SIZE {
            self.flush()?;
        }
        self.block[self.off..self.off + N].copy_from_slice(&bytes);
        self.off += N;
        Ok(())
    }
}

impl<const BLOCK_SIZE: usize, B> OutputBuffer for BlockingOutputBuffer<BLOCK_SIZE, B>
where
    B: OutputBlockBuffer,
{
    fn write_byte(&mut self, b: u8) -> anyhow::Result<()> {
        self.write_fixed([b])
    }

    fn write_i32(&mut self, i: i32) -> anyhow::Result<()> {
        self.write_fixed(i.to_ne_bytes())
    }

    fn write_i64(&mut self, l: i64) -> anyhow::Result<()> {
        self.write_fixed(l.to_ne_bytes())
    }

    fn write_f32(&mut self, f: f32) -> anyhow::Result<()> {
        self.write_fixed(f.to_ne_bytes())
    }

    fn write_f64(&mut self, d: f64) -> anyhow::Result<()> {
        self.write_fixed(d.to_ne_bytes())
    }

    fn write_bytes(&mut self, buf: &[u8]) -> anyhow::Result<()> {
        let mut rest = buf;
        while rest.len() > BLOCK_SIZE - self.off {
            let n = BLOCK_SIZE - self.off;
            self.block[self.off..].copy_from_slice(&rest[..n]);
            self.off = BLOCK_SIZE;
            self.flush()?;
            rest = &rest[n..];
        }
        self.block[self.off..self.off + rest.len()].copy_from_slice(rest);
        self.off += rest.len();
        Ok(())
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        if self.off > 0 {
            self.block_buf.write_block(&self.block[..self.off])?;
            self.off = 0;
        }
        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.flush()?;
        self.block_buf.close()
    }
}

/// Serves primitive reads out of blocks pulled from downstream one at a time.
#[derive(Debug)]
pub struct BlockingInputBuffer<const BLOCK_SIZE: usize, B> {
    block_buf: B,
    block: Vec<u8>,
    off: usize,
}

impl<const BLOCK_SIZE: usize, B> BlockingInputBuffer<BLOCK_SIZE, B>
where
    B: InputBlockBuffer,
{
    pub fn new(block_buf: B) -> Self {
        BlockingInputBuffer {
            block_buf,
            block: Vec::with_capacity(BLOCK_SIZE),
            off: 0,
        }
    }

    pub fn into_inner(self) -> B {
        self.block_buf
    }

    fn remaining(&self) -> usize {
        self.block.len() - self.off
    }

    // Pulls blocks until there is at least one unread byte. `wanted` is only
    // used for reporting a truncated stream.
    fn ensure_data(&mut self, wanted: usize) -> anyhow::Result<()> {
        while self.remaining() == 0 {
            self.off = 0;
            if !self.block_buf.read_block(&mut self.block)? {
                self.block.clear();
                return Err(CodecError::Truncated {
                    wanted,
                    available: 0,
                }
                .into());
            }
            if self.block.len() > BLOCK_SIZE {
                let len = self.block.len();
                self.block.clear();
                return Err(CodecError::BadFrame(format!(
                    "block of {} bytes exceeds block size {}",
                    len, BLOCK_SIZE
                ))
                .into());
            }
        }
        Ok(())
    }

    fn read_fixed<const N: usize>(&mut self) -> anyhow::Result<[u8; N]> {
        self.ensure_data(N)?;
        if self.remaining() < N {
            return Err(CodecError::BadFrame(format!(
                "{} byte value split across blocks ({} bytes left)",
                N,
                self.remaining()
            ))
            .into());
        }
        let mut out = [0_u8; N];
        out.copy_from_slice(&self.block[self.off..self.off + N]);
        self.off += N;
        Ok(out)
    }
}

impl<const BLOCK_SIZE: usize, B> InputBuffer for BlockingInputBuffer<BLOCK_SIZE, B>
where
    B: InputBlockBuffer,
{
    fn read_byte(&mut self) -> anyhow::Result<u8> {
        Ok(self.read_fixed::<1>()?[0])
    }

    fn read_i32(&mut self) -> anyhow::Result<i32> {
        Ok(i32::from_ne_bytes(self.read_fixed()?))
    }

    fn read_i64(&mut self) -> anyhow::Result<i64> {
        Ok(i64::from_ne_bytes(self.read_fixed()?))
    }

    fn read_f32(&mut self) -> anyhow::Result<f32> {
        Ok(f32::from_ne_bytes(self.read_fixed()?))
    }

    fn read_f64(&mut self) -> anyhow::Result<f64> {
        Ok(f64::from_ne_bytes(self.read_fixed()?))
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> anyhow::Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            self.ensure_data(buf.len() - filled)?;
            let n = cmp::min(buf.len() - filled, self.remaining());
            buf[filled..filled + n].copy_from_slice(&self.block[self.off..self.off + n]);
            self.off += n;
            filled += n;
        }
        Ok(())
    }

    fn skip_bytes(&mut self, n: usize) -> anyhow::Result<()> {
        let mut left = n;
        while left > 0 {
            self.ensure_data(left)?;
            let k = cmp::min(left, self.remaining());
            self.off += k;
            left -= k;
        }
        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.block_buf.close()
    }
}
