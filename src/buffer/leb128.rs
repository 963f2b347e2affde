use crate::error::CodecError;

use super::{InputBuffer, OutputBuffer};

/// Number of bytes the unsigned LEB128 encoding of `v` takes.
pub fn leb128_len(v: u64) -> usize {
    let bits = 64 - v.leading_zeros() as usize;
    std::cmp::max(1, (bits + 6) / 7)
}

/// Re-encodes `i32`/`i64` writes as unsigned LEB128 of their two's-complement
/// bit pattern; everything else passes straight through. Small non-negative
/// values (lengths, counts) shrink to a byte or two, negative values grow
/// to 5 or 10 bytes.
#[derive(Debug)]
pub struct Leb128OutputBuffer<B> {
    buf: B,
}

impl<B> Leb128OutputBuffer<B>
where
    B: OutputBuffer,
{
    pub fn new(buf: B) -> Self {
        Leb128OutputBuffer { buf }
    }

    pub fn into_inner(self) -> B {
        self.buf
    }

    fn write_unsigned(&mut self, mut v: u64) -> anyhow::Result<()> {
        loop {
            let mut b = (v & 0x7f) as u8;
            v >>= 7;
            if v != 0 {
                b |= 0x80;
            }
            self.buf.write_byte(b)?;
            if v == 0 {
                return Ok(());
            }
        }
    }
}

impl<B> OutputBuffer for Leb128OutputBuffer<B>
where
    B: OutputBuffer,
{
    fn write_byte(&mut self, b: u8) -> anyhow::Result<()> {
        self.buf.write_byte(b)
    }

    fn write_bool(&mut self, b: bool) -> anyhow::Result<()> {
        self.buf.write_bool(b)
    }

    fn write_i32(&mut self, i: i32) -> anyhow::Result<()> {
        self.write_unsigned(i as u32 as u64)
    }

    fn write_i64(&mut self, l: i64) -> anyhow::Result<()> {
        self.write_unsigned(l as u64)
    }

    fn write_f32(&mut self, f: f32) -> anyhow::Result<()> {
        self.buf.write_f32(f)
    }

    fn write_f64(&mut self, d: f64) -> anyhow::Result<()> {
        self.buf.write_f64(d)
    }

    fn write_bytes(&mut self, buf: &[u8]) -> anyhow::Result<()> {
        self.buf.write_bytes(buf)
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        self.buf.flush()
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.buf.close()
    }
}

#[derive(Debug)]
pub struct Leb128InputBuffer<B> {
    buf: B,
}

impl<B> Leb128InputBuffer<B>
where
    B: InputBuffer,
{
    pub fn new(buf: B) -> Self {
        Leb128InputBuffer { buf }
    }

    pub fn into_inner(self) -> B {
        self.buf
    }

    // Bits past `bits` in the last group are dropped, which is what makes a
    // five-byte encoding of a negative i32 come back sign-extended.
    fn read_unsigned(&mut self, bits: u32) -> anyhow::Result<u64> {
        let mut result = 0_u64;
        let mut shift = 0;
        loop {
            let b = self.buf.read_byte()?;
            if shift >= bits {
                return Err(CodecError::VarintOverflow { bits }.into());
            }
            result |= ((b & 0x7f) as u64) << shift;
            if b & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
    }
}

impl<B> InputBuffer for Leb128InputBuffer<B>
where
    B: InputBuffer,
{
    fn read_byte(&mut self) -> anyhow::Result<u8> {
        self.buf.read_byte()
    }

    fn read_bool(&mut self) -> anyhow::Result<bool> {
        self.buf.read_bool()
    }

    fn read_i32(&mut self) -> anyhow::Result<i32> {
        Ok(self.read_unsigned(32)? as u32 as i32)
    }

    fn read_i64(&mut self) -> anyhow::Result<i64> {
        Ok(self.read_unsigned(64)? as i64)
    }

    fn read_f32(&mut self) -> anyhow::Result<f32> {
        self.buf.read_f32()
    }

    fn read_f64(&mut self) -> anyhow::Result<f64> {
        self.buf.read_f64()
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> anyhow::Result<()> {
        self.buf.read_bytes(buf)
    }

    fn skip_bytes(&mut self, n: usize) -> anyhow::Result<()> {
        self.buf.skip_bytes(n)
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.buf.close()
    }
}
