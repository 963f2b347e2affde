// Each block is written downstream as a single frame:
//
//   [uncompressed length: u32 LE][LZ4 block-format payload]
//
// The payload carries no checksum and no LZ4 frame header. An empty block is
// just the four-byte header.
use lz4_flex::block::{compress_into, decompress_into, get_maximum_output_size};
use tracing::trace;

use crate::error::CodecError;

use super::{InputBlockBuffer, OutputBlockBuffer};

const HEADER_LEN: usize = 4;

#[derive(Debug)]
pub struct Lz4OutputBlockBuffer<const BLOCK_SIZE: usize, B> {
    block_buf: B,
    frame: Vec<u8>,
}

impl<const BLOCK_SIZE: usize, B> Lz4OutputBlockBuffer<BLOCK_SIZE, B>
where
    B: OutputBlockBuffer,
{
    pub fn new(block_buf: B) -> Self {
        Lz4OutputBlockBuffer {
            block_buf,
            frame: vec![0; HEADER_LEN + get_maximum_output_size(BLOCK_SIZE)],
        }
    }

    pub fn into_inner(self) -> B {
        self.block_buf
    }
}

impl<const BLOCK_SIZE: usize, B> OutputBlockBuffer for Lz4OutputBlockBuffer<BLOCK_SIZE, B>
where
    B: OutputBlockBuffer,
{
    fn write_block(&mut self, block: &[u8]) -> anyhow::Result<()> {
        if block.len() > BLOCK_SIZE {
            return Err(CodecError::BadFrame(format!(
                "block of {} bytes exceeds block size {}",
                block.len(),
                BLOCK_SIZE
            ))
            .into());
        }
        self.frame[..HEADER_LEN].copy_from_slice(&(block.len() as u32).to_le_bytes());
        let compressed = if block.is_empty() {
            0
        } else {
            compress_into(block, &mut self.frame[HEADER_LEN..])
                .map_err(|e| CodecError::BadFrame(format!("LZ4 compress failed: {}", e)))?
        };
        trace!(raw = block.len(), compressed, "compressed block");
        self.block_buf
            .write_block(&self.frame[..HEADER_LEN + compressed])
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.block_buf.close()
    }
}

#[derive(Debug)]
pub struct Lz4InputBlockBuffer<const BLOCK_SIZE: usize, B> {
    block_buf: B,
    frame: Vec<u8>,
}

impl<const BLOCK_SIZE: usize, B> Lz4InputBlockBuffer<BLOCK_SIZE, B>
where
    B: InputBlockBuffer,
{
    pub fn new(block_buf: B) -> Self {
        Lz4InputBlockBuffer {
            block_buf,
            frame: Vec::with_capacity(HEADER_LEN + get_maximum_output_size(BLOCK_SIZE)),
        }
    }

    pub fn into_inner(self) -> B {
        self.block_buf
    }
}

impl<const BLOCK_SIZE: usize, B> InputBlockBuffer for Lz4InputBlockBuffer<BLOCK_SIZE, B>
where
    B: InputBlockBuffer,
{
    fn read_block(&mut self, buf: &mut Vec<u8>) -> anyhow::Result<bool> {
        if !self.block_buf.read_block(&mut self.frame)? {
            return Ok(false);
        }
        if self.frame.len() < HEADER_LEN {
            return Err(CodecError::BadFrame(format!(
                "frame of {} bytes is shorter than its header",
                self.frame.len()
            ))
            .into());
        }
        let declared = u32::from_le_bytes(self.frame[..HEADER_LEN].try_into()?) as usize;
        if declared > BLOCK_SIZE {
            return Err(CodecError::BadFrame(format!(
                "declared length {} exceeds block size {}",
                declared, BLOCK_SIZE
            ))
            .into());
        }

        buf.clear();
        buf.resize(declared, 0);
        let payload = &self.frame[HEADER_LEN..];
        if declared == 0 {
            if !payload.is_empty() {
                return Err(CodecError::LengthMismatch {
                    declared,
                    actual: payload.len(),
                }
                .into());
            }
            return Ok(true);
        }

        let actual = decompress_into(payload, buf)
            .map_err(|e| CodecError::Decompress(e.to_string()))?;
        if actual != declared {
            return Err(CodecError::LengthMismatch { declared, actual }.into());
        }
        Ok(true)
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.block_buf.close()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::{Lz4InputBlockBuffer, Lz4OutputBlockBuffer};
    use crate::{
        buffer::{InputBlockBuffer, OutputBlockBuffer},
        error::CodecError,
    };

    const BLOCK_SIZE: usize = 4096;

    fn compress(blocks: &[Vec<u8>]) -> Vec<Vec<u8>> {
        let mut out: Lz4OutputBlockBuffer<BLOCK_SIZE, Vec<Vec<u8>>> =
            Lz4OutputBlockBuffer::new(Vec::new());
        for b in blocks {
            out.write_block(b).unwrap();
        }
        out.close().unwrap();
        out.into_inner()
    }

    fn reader(frames: Vec<Vec<u8>>) -> Lz4InputBlockBuffer<BLOCK_SIZE, VecDeque<Vec<u8>>> {
        Lz4InputBlockBuffer::new(frames.into_iter().collect())
    }

    #[test]
    fn test_round_trip() -> anyhow::Result<()> {
        let mut rng = StdRng::seed_from_u64(1);
        let mut blocks = vec![Vec::new(), vec![7], vec![0; BLOCK_SIZE]];
        for _ in 0..20 {
            let len = rng.gen_range(0..=BLOCK_SIZE);
            // Small alphabet so there is something to compress.
            blocks.push((0..len).map(|_| rng.gen_range(b'a'..b'e')).collect());
        }

        let frames = compress(&blocks);
        for (frame, block) in frames.iter().zip(blocks.iter()) {
            let header = u32::from_le_bytes(frame[..4].try_into()?) as usize;
            assert_eq!(block.len(), header);
        }

        let mut input = reader(frames);
        let mut buf = Vec::new();
        for block in &blocks {
            assert!(input.read_block(&mut buf)?);
            assert_eq!(block, &buf);
        }
        assert!(!input.read_block(&mut buf)?);
        Ok(())
    }

    #[test]
    fn test_oversized_block_rejected() {
        let mut out: Lz4OutputBlockBuffer<BLOCK_SIZE, Vec<Vec<u8>>> =
            Lz4OutputBlockBuffer::new(Vec::new());
        assert!(out.write_block(&vec![0; BLOCK_SIZE + 1]).is_err());
    }

    fn read_err(frame: Vec<u8>) -> CodecError {
        let mut buf = Vec::new();
        let err = reader(vec![frame]).read_block(&mut buf).unwrap_err();
        err.downcast_ref::<CodecError>().unwrap().clone()
    }

    #[test]
    fn test_malformed_frames() {
        assert!(matches!(read_err(vec![1, 0]), CodecError::BadFrame(_)));

        let mut too_big = ((BLOCK_SIZE + 1) as u32).to_le_bytes().to_vec();
        too_big.push(0);
        assert!(matches!(read_err(too_big), CodecError::BadFrame(_)));

        // Valid payload, wrong declared length.
        let mut frames = compress(&[vec![b'x'; 100]]);
        let mut frame = frames.remove(0);
        frame[..4].copy_from_slice(&200_u32.to_le_bytes());
        assert_eq!(
            CodecError::LengthMismatch {
                declared: 200,
                actual: 100
            },
            read_err(frame)
        );

        // Declares less than the payload expands to.
        let mut frames = compress(&[vec![b'x'; 100]]);
        let mut frame = frames.remove(0);
        frame[..4].copy_from_slice(&50_u32.to_le_bytes());
        assert!(matches!(read_err(frame), CodecError::Decompress(_)));

        // Garbage payload.
        let mut garbage = 100_u32.to_le_bytes().to_vec();
        garbage.extend([0xff; 8]);
        assert!(matches!(read_err(garbage), CodecError::Decompress(_)));
    }
}
