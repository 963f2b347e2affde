// This package provides the layered buffers that move partition data to and
// from a byte stream.
//
// There are two capability sets. A _block_ buffer moves opaque blocks of
// bytes (`OutputBlockBuffer`/`InputBlockBuffer`); a _primitive_ buffer moves
// typed values (`OutputBuffer`/`InputBuffer`). Stages wrap exactly one
// downstream stage and are composed statically through generics, so a
// primitive write is never a virtual call:
//
//   Leb128OutputBuffer            primitive -> primitive, ints as varints
//     BlockingOutputBuffer        primitive -> block, fixed-size staging buffer
//       Lz4OutputBlockBuffer      block -> block, length-prefixed LZ4 frames
//         StreamOutputBlockBuffer block -> host byte stream
//
// The input side mirrors this. The varint and compression layers are
// optional; a stream written with one stack must be read with the same one.
use std::collections::VecDeque;

use crate::stream::{InputStream, OutputStream, StreamInputBlockBuffer, StreamOutputBlockBuffer};

mod blocking;
mod leb128;
mod lz4;

pub use blocking::{BlockingInputBuffer, BlockingOutputBuffer};
pub use leb128::{leb128_len, Leb128InputBuffer, Leb128OutputBuffer};
pub use lz4::{Lz4InputBlockBuffer, Lz4OutputBlockBuffer};

pub const DEFAULT_BLOCK_SIZE: usize = 32 * 1024;

pub trait OutputBlockBuffer {
    fn write_block(&mut self, block: &[u8]) -> anyhow::Result<()>;
    fn close(&mut self) -> anyhow::Result<()>;
}

pub trait InputBlockBuffer {
    /// Replaces the contents of `buf` with the next block. Returns false at
    /// the end of the stream.
    fn read_block(&mut self, buf: &mut Vec<u8>) -> anyhow::Result<bool>;
    fn close(&mut self) -> anyhow::Result<()>;
}

pub trait OutputBuffer {
    fn write_byte(&mut self, b: u8) -> anyhow::Result<()>;
    fn write_bool(&mut self, b: bool) -> anyhow::Result<()> {
        self.write_byte(b as u8)
    }
    fn write_i32(&mut self, i: i32) -> anyhow::Result<()>;
    fn write_i64(&mut self, l: i64) -> anyhow::Result<()>;
    fn write_f32(&mut self, f: f32) -> anyhow::Result<()>;
    fn write_f64(&mut self, d: f64) -> anyhow::Result<()>;
    fn write_bytes(&mut self, buf: &[u8]) -> anyhow::Result<()>;
    fn flush(&mut self) -> anyhow::Result<()>;
    fn close(&mut self) -> anyhow::Result<()>;
}

pub trait InputBuffer {
    fn read_byte(&mut self) -> anyhow::Result<u8>;
    fn read_bool(&mut self) -> anyhow::Result<bool> {
        Ok(self.read_byte()? != 0)
    }
    fn read_i32(&mut self) -> anyhow::Result<i32>;
    fn read_i64(&mut self) -> anyhow::Result<i64>;
    fn read_f32(&mut self) -> anyhow::Result<f32>;
    fn read_f64(&mut self) -> anyhow::Result<f64>;
    /// Fills `buf` completely.
    fn read_bytes(&mut self, buf: &mut [u8]) -> anyhow::Result<()>;
    fn skip_bytes(&mut self, n: usize) -> anyhow::Result<()>;
    fn close(&mut self) -> anyhow::Result<()>;
}

impl<T> OutputBlockBuffer for &mut T
where
    T: OutputBlockBuffer + ?Sized,
{
    fn write_block(&mut self, block: &[u8]) -> anyhow::Result<()> {
        (**self).write_block(block)
    }

    fn close(&mut self) -> anyhow::Result<()> {
        (**self).close()
    }
}

impl<T> InputBlockBuffer for &mut T
where
    T: InputBlockBuffer + ?Sized,
{
    fn read_block(&mut self, buf: &mut Vec<u8>) -> anyhow::Result<bool> {
        (**self).read_block(buf)
    }

    fn close(&mut self) -> anyhow::Result<()> {
        (**self).close()
    }
}

// In-memory block sinks, mostly useful for tests and for handing finished
// blocks to something other than a stream.
impl OutputBlockBuffer for Vec<Vec<u8>> {
    fn write_block(&mut self, block: &[u8]) -> anyhow::Result<()> {
        self.push(block.to_vec());
        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

impl InputBlockBuffer for VecDeque<Vec<u8>> {
    fn read_block(&mut self, buf: &mut Vec<u8>) -> anyhow::Result<bool> {
        match self.pop_front() {
            Some(block) => {
                *buf = block;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn close(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

pub type OutputStack<S> = Leb128OutputBuffer<
    BlockingOutputBuffer<
        DEFAULT_BLOCK_SIZE,
        Lz4OutputBlockBuffer<DEFAULT_BLOCK_SIZE, StreamOutputBlockBuffer<S>>,
    >,
>;

pub type InputStack<S> = Leb128InputBuffer<
    BlockingInputBuffer<
        DEFAULT_BLOCK_SIZE,
        Lz4InputBlockBuffer<DEFAULT_BLOCK_SIZE, StreamInputBlockBuffer<S>>,
    >,
>;

pub type PlainOutputStack<S> =
    BlockingOutputBuffer<DEFAULT_BLOCK_SIZE, StreamOutputBlockBuffer<S>>;

pub type PlainInputStack<S> = BlockingInputBuffer<DEFAULT_BLOCK_SIZE, StreamInputBlockBuffer<S>>;

/// Varint-encoded, LZ4-compressed output over `stream`.
pub fn output_stack<S: OutputStream>(stream: S) -> OutputStack<S> {
    Leb128OutputBuffer::new(BlockingOutputBuffer::new(Lz4OutputBlockBuffer::new(
        StreamOutputBlockBuffer::new(stream),
    )))
}

pub fn input_stack<S: InputStream>(stream: S) -> InputStack<S> {
    Leb128InputBuffer::new(BlockingInputBuffer::new(Lz4InputBlockBuffer::new(
        StreamInputBlockBuffer::new(stream),
    )))
}

pub fn plain_output_stack<S: OutputStream>(stream: S) -> PlainOutputStack<S> {
    BlockingOutputBuffer::new(StreamOutputBlockBuffer::new(stream))
}

pub fn plain_input_stack<S: InputStream>(stream: S) -> PlainInputStack<S> {
    BlockingInputBuffer::new(StreamInputBlockBuffer::new(stream))
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::{
        input_stack, output_stack, plain_input_stack, plain_output_stack, InputBuffer,
        OutputBuffer,
    };
    use crate::{error::CodecError, stream::MockStream};

    #[derive(Debug, Clone, PartialEq)]
    enum Value {
        Byte(u8),
        Bool(bool),
        Int(i32),
        Long(i64),
        Float(f32),
        Double(f64),
        Bytes(Vec<u8>),
    }

    fn random_values(rng: &mut StdRng, n: usize) -> Vec<Value> {
        (0..n)
            .map(|_| match rng.gen_range(0..7) {
                0 => Value::Byte(rng.gen()),
                1 => Value::Bool(rng.gen()),
                // Skew towards small magnitudes, like lengths and counts.
                2 => Value::Int(rng.gen::<i32>() >> rng.gen_range(0..32_u32)),
                3 => Value::Long(rng.gen::<i64>() >> rng.gen_range(0..64_u32)),
                4 => Value::Float(rng.gen()),
                5 => Value::Double(rng.gen()),
                _ => {
                    let len = rng.gen_range(0..20_000);
                    Value::Bytes((0..len).map(|i| (i % 251) as u8).collect())
                }
            })
            .collect()
    }

    fn write_values<B: OutputBuffer>(out: &mut B, values: &[Value]) -> anyhow::Result<()> {
        for v in values {
            match v {
                Value::Byte(b) => out.write_byte(*b)?,
                Value::Bool(b) => out.write_bool(*b)?,
                Value::Int(i) => out.write_i32(*i)?,
                Value::Long(l) => out.write_i64(*l)?,
                Value::Float(f) => out.write_f32(*f)?,
                Value::Double(d) => out.write_f64(*d)?,
                Value::Bytes(b) => {
                    out.write_i32(b.len() as i32)?;
                    out.write_bytes(b)?;
                }
            }
        }
        out.close()
    }

    fn read_values<B: InputBuffer>(input: &mut B, like: &[Value]) -> anyhow::Result<Vec<Value>> {
        let mut result = Vec::new();
        for v in like {
            result.push(match v {
                Value::Byte(_) => Value::Byte(input.read_byte()?),
                Value::Bool(_) => Value::Bool(input.read_bool()?),
                Value::Int(_) => Value::Int(input.read_i32()?),
                Value::Long(_) => Value::Long(input.read_i64()?),
                Value::Float(_) => Value::Float(input.read_f32()?),
                Value::Double(_) => Value::Double(input.read_f64()?),
                Value::Bytes(_) => {
                    let len = input.read_i32()? as usize;
                    let mut buf = vec![0; len];
                    input.read_bytes(&mut buf)?;
                    Value::Bytes(buf)
                }
            });
        }
        Ok(result)
    }

    #[test]
    fn test_compressed_stack_round_trip() -> anyhow::Result<()> {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..5 {
            let values = random_values(&mut rng, 500);
            let stream = MockStream::new();
            write_values(&mut output_stack(stream.clone()), &values)?;

            let mut input = input_stack(stream.reader());
            assert_eq!(values, read_values(&mut input, &values)?);
            let err = input.read_byte().unwrap_err();
            assert!(matches!(
                err.downcast_ref::<CodecError>(),
                Some(CodecError::Truncated { .. })
            ));
        }
        Ok(())
    }

    #[test]
    fn test_plain_stack_round_trip() -> anyhow::Result<()> {
        let mut rng = StdRng::seed_from_u64(11);
        let values = random_values(&mut rng, 500);
        let stream = MockStream::new();
        write_values(&mut plain_output_stack(stream.clone()), &values)?;

        let mut input = plain_input_stack(stream.reader());
        assert_eq!(values, read_values(&mut input, &values)?);
        Ok(())
    }

    #[test]
    fn test_compression_shrinks_repetitive_data() -> anyhow::Result<()> {
        let plain = MockStream::new();
        let compressed = MockStream::new();
        let values = vec![Value::Bytes(vec![b'x'; 200_000])];
        write_values(&mut plain_output_stack(plain.clone()), &values)?;
        write_values(&mut output_stack(compressed.clone()), &values)?;
        assert!(compressed.contents().len() * 10 < plain.contents().len());
        Ok(())
    }

    #[test]
    fn test_file_backed_round_trip() -> anyhow::Result<()> {
        use crate::stream::{IoInputStream, IoOutputStream};
        use std::io::{Seek, SeekFrom};

        let mut rng = StdRng::seed_from_u64(3);
        let values = random_values(&mut rng, 200);

        let mut file = tempfile::tempfile()?;
        write_values(&mut output_stack(IoOutputStream::new(&mut file)), &values)?;
        file.seek(SeekFrom::Start(0))?;

        let mut input = input_stack(IoInputStream::new(&mut file));
        assert_eq!(values, read_values(&mut input, &values)?);
        Ok(())
    }
}
