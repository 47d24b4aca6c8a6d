//! A scripted display connection backed by a socketpair.

use std::io::{self, Read, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::net::UnixStream;

use crate::multiplexer::DisplayConnection;

/// Display double whose readiness is driven by the test.
///
/// The multiplexer polls the read end of a socketpair; [`Self::wake`]
/// writes a byte to the other end, making the fd readable exactly the way
/// a burst of protocol events would. Flushes and round-trips are counted
/// rather than performed.
pub struct ScriptedDisplay {
    reader: UnixStream,
    writer: UnixStream,
    /// Completed flush calls.
    pub flushes: usize,
    /// Completed round-trips.
    pub roundtrips: usize,
    fail_next_roundtrip: bool,
}

impl ScriptedDisplay {
    pub fn new() -> io::Result<Self> {
        let (reader, writer) = UnixStream::pair()?;
        reader.set_nonblocking(true)?;
        Ok(Self {
            reader,
            writer,
            flushes: 0,
            roundtrips: 0,
            fail_next_roundtrip: false,
        })
    }

    /// Make the connection readable, as arriving events would.
    pub fn wake(&mut self) -> io::Result<()> {
        self.writer.write_all(&[1])
    }

    /// The next round-trip fails like a severed connection.
    pub fn break_connection(&mut self) {
        self.fail_next_roundtrip = true;
    }
}

impl AsFd for ScriptedDisplay {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.reader.as_fd()
    }
}

impl DisplayConnection for ScriptedDisplay {
    fn flush(&mut self) -> io::Result<()> {
        self.flushes += 1;
        Ok(())
    }

    fn roundtrip(&mut self) -> io::Result<()> {
        if self.fail_next_roundtrip {
            self.fail_next_roundtrip = false;
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "display connection severed",
            ));
        }
        self.roundtrips += 1;

        // Drain so the level-triggered source goes quiet again.
        let mut buf = [0u8; 64];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}
