// The lowest layer of the buffer stack: moving finished blocks to and from a
// byte stream supplied by the host.
//
// Each block is framed on the stream as a four-byte little-endian length
// followed by the block's bytes, so the reader can recover block boundaries.
use std::io::{self, Read, Write};

use tracing::trace;

use crate::{
    buffer::{InputBlockBuffer, OutputBlockBuffer},
    error::CodecError,
};

mod mock;


pub use mock::{Event, MockStream};

/// Frames longer than this are assumed to be corruption rather than data.
pub const MAX_FRAME_LEN: usize = 1 << 26;

/// Host-supplied byte sink.
pub trait OutputStream {
    fn write(&mut self, buf: &[u8]) -> anyhow::Result<()>;
    fn flush(&mut self) -> anyhow::Result<()>;
    fn close(&mut self) -> anyhow::Result<()>;
}

/// Host-supplied byte source.
pub trait InputStream {
    /// Reads up to `buf.len()` bytes, returning 0 only at end of stream.
    fn read(&mut self, buf: &mut [u8]) -> anyhow::Result<usize>;
    fn close(&mut self) -> anyhow::Result<()>;
}

impl<T> OutputStream for Box<T>
where
    T: OutputStream + ?Sized,
{
    fn write(&mut self, buf: &[u8]) -> anyhow::Result<()> {
        (**self).write(buf)
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        (**self).flush()
    }

    fn close(&mut self) -> anyhow::Result<()> {
        (**self).close()
    }
}

impl<T> InputStream for Box<T>
where
    T: InputStream + ?Sized,
{
    fn read(&mut self, buf: &mut [u8]) -> anyhow::Result<usize> {
        (**self).read(buf)
    }

    fn close(&mut self) -> anyhow::Result<()> {
        (**self).close()
    }
}

/// Adapts any `io::Write` into an `OutputStream`.
#[derive(Debug)]
pub struct IoOutputStream<W> {
    w: W,
}

impl<W: Write> IoOutputStream<W> {
    pub fn new(w: W) -> Self {
        IoOutputStream { w }
    }

    pub fn into_inner(self) -> W {
        self.w
    }
}

impl<W: Write> OutputStream for IoOutputStream<W> {
    fn write(&mut self, buf: &[u8]) -> anyhow::Result<()> {
        self.w.write_all(buf)?;
        Ok(())
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        self.w.flush()?;
        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.flush()
    }
}

/// Adapts any `io::Read` into an `InputStream`.
#[derive(Debug)]
pub struct IoInputStream<R> {
    r: R,
}

impl<R: Read> IoInputStream<R> {
    pub fn new(r: R) -> Self {
        IoInputStream { r }
    }
}

impl<R: Read> InputStream for IoInputStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> anyhow::Result<usize> {
        loop {
            match self.r.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn close(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug)]
pub struct StreamOutputBlockBuffer<S> {
    stream: S,
}

impl<S: OutputStream> StreamOutputBlockBuffer<S> {
    pub fn new(stream: S) -> Self {
        StreamOutputBlockBuffer { stream }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S: OutputStream> OutputBlockBuffer for StreamOutputBlockBuffer<S> {
    fn write_block(&mut self, block: &[u8]) -> anyhow::Result<()> {
        trace!(len = block.len(), "writing stream frame");
        self.stream.write(&(block.len() as u32).to_le_bytes())?;
        self.stream.write(block)
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.stream.flush()?;
        self.stream.close()
    }
}

#[derive(Debug)]
pub struct StreamInputBlockBuffer<S> {
    stream: S,
}

impl<S: InputStream> StreamInputBlockBuffer<S> {
    pub fn new(stream: S) -> Self {
        StreamInputBlockBuffer { stream }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    // Reads until `buf` is full or the stream ends, returning the bytes read.
    fn read_full(&mut self, buf: &mut [u8]) -> anyhow::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.stream.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }
}

impl<S: InputStream> InputBlockBuffer for StreamInputBlockBuffer<S> {
    fn read_block(&mut self, buf: &mut Vec<u8>) -> anyhow::Result<bool> {
        let mut header = [0_u8; 4];
        match self.read_full(&mut header)? {
            0 => return Ok(false),
            4 => {}
            n => {
                return Err(CodecError::Truncated {
                    wanted: 4,
                    available: n,
                }
                .into())
            }
        }

        let len = u32::from_le_bytes(header) as usize;
        if len > MAX_FRAME_LEN {
            return Err(CodecError::BadFrame(format!("frame length {} is implausible", len)).into());
        }
        buf.clear();
        buf.resize(len, 0);
        let got = self.read_full(buf)?;
        if got < len {
            return Err(CodecError::Truncated {
                wanted: len,
                available: got,
            }
            .into());
        }
        trace!(len, "read stream frame");
        Ok(true)
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.stream.close()
    }
}
