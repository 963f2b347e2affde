use std::{cell::RefCell, rc::Rc};

use anyhow::bail;

use crate::error::CodecError;

use super::{InputStream, OutputStream};

#[derive(Debug, Clone)]
pub enum Event {
    Write(Vec<u8>),
    Flush,
    Close,
    Read(usize),
}

impl Event {
    pub fn write_abbrev<W: std::fmt::Write>(&self, w: &mut W) -> std::fmt::Result {
        match self {
            Event::Write(contents) => {
                write!(w, "Write({}, ", contents.len())?;
                for ch in contents {
                    write!(w, "{}", std::ascii::escape_default(*ch))?;
                }
                write!(w, ")")?;
            }
            Event::Flush => {
                write!(w, "Flush")?;
            }
            Event::Close => {
                write!(w, "Close")?;
            }
            Event::Read(n) => {
                write!(w, "Read({})", n)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MockData {
    bytes: Vec<u8>,
    events: Vec<Event>,
    closed: bool,

    // After this many operations, "crash" the stream, meaning every further
    // operation fails.
    time_to_crash: Option<usize>,
}

impl MockData {
    fn perform_op(&mut self) -> anyhow::Result<()> {
        match self.time_to_crash {
            Some(0) => bail!("stream is down"),
            Some(x) => self.time_to_crash = Some(x - 1),
            None => {}
        }
        Ok(())
    }
}

/// In-memory stream standing in for the host. Clones share the same bytes
/// and event log; each clone has its own read position.
#[derive(Debug, Clone, Default)]
pub struct MockStream {
    idx: usize,
    data: Rc<RefCell<MockData>>,
}

impl MockStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let stream = Self::new();
        stream.data.borrow_mut().bytes = bytes;
        stream
    }

    /// A handle reading from the start of the shared bytes.
    pub fn reader(&self) -> Self {
        MockStream {
            idx: 0,
            data: self.data.clone(),
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        self.data.borrow().bytes.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.data.borrow().closed
    }

    pub fn schedule_crash(&self, ops: usize) {
        self.data.borrow_mut().time_to_crash = Some(ops);
    }

    pub fn take_events(&self) -> Vec<Event> {
        std::mem::take(&mut self.data.borrow_mut().events)
    }
}

impl OutputStream for MockStream {
    fn write(&mut self, buf: &[u8]) -> anyhow::Result<()> {
        let mut data = self.data.borrow_mut();
        if data.closed {
            return Err(CodecError::Closed.into());
        }
        data.perform_op()?;
        data.bytes.extend_from_slice(buf);
        data.events.push(Event::Write(buf.to_vec()));
        Ok(())
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        let mut data = self.data.borrow_mut();
        data.perform_op()?;
        data.events.push(Event::Flush);
        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        let mut data = self.data.borrow_mut();
        data.perform_op()?;
        data.closed = true;
        data.events.push(Event::Close);
        Ok(())
    }
}

impl InputStream for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> anyhow::Result<usize> {
        let mut data = self.data.borrow_mut();
        data.perform_op()?;
        let n = std::cmp::min(data.bytes.len() - self.idx, buf.len());
        buf[..n].copy_from_slice(&data.bytes[self.idx..self.idx + n]);
        self.idx += n;
        data.events.push(Event::Read(n));
        Ok(n)
    }

    fn close(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[test]
fn test_mock_stream() -> anyhow::Result<()> {
    let mut s = MockStream::new();
    s.write(&[1, 2, 3, 4])?;
    s.flush()?;

    let mut r = s.reader();
    let mut buf = [0; 3];
    assert_eq!(3, r.read(&mut buf)?);
    assert_eq!([1, 2, 3], buf);
    assert_eq!(1, r.read(&mut buf)?);
    assert_eq!(0, r.read(&mut buf)?);

    OutputStream::close(&mut s)?;
    assert!(s.is_closed());
    assert!(s.write(&[5]).is_err());

    let mut out = String::new();
    for event in s.take_events() {
        event.write_abbrev(&mut out).unwrap();
        out.push('\n');
    }
    assert_eq!(
        "Write(4, \\x01\\x02\\x03\\x04)\nFlush\nRead(3)\nRead(1)\nRead(0)\nClose\n",
        out
    );

    Ok(())
}
