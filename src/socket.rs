//! The socket abstraction is an external collaborator (spec.md §1, §6): this
//! module only pins down its contract. Non-blocking reads/writes and event
//! dispatch are somebody else's problem — the teacher's `Io` trait
//! (`buffered_io.rs`) played the same role for a `futures`/`tokio-core`
//! stream, generalized here to the explicit callback shape spec.md §4.1
//! requires.

use std::io::{self, Read, Write};
use std::net::TcpStream;

/// Outcome of an asynchronous connect attempt, delivered to
/// [`crate::session::Session::on_connected`].
#[derive(Debug)]
pub enum ConnectStatus {
    Ok,
    Fail(io::Error),
}

/// Outcome of a non-blocking flush attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushStatus {
    /// The outbound queue is empty.
    Done,
    /// More progress is pending; re-drive once the socket is writable.
    Again,
}

/// Contract a transport must satisfy for the handshake core to drive it.
/// `Session::advance` never touches the network directly — it only queues
/// bytes with `write_queued` and asks the socket to make progress.
pub trait Socket {
    /// Appends bytes to the outbound queue. Does not necessarily write them
    /// to the wire; see [`Socket::try_flush`].
    fn write_queued(&mut self, bytes: &[u8]);

    /// Drives the write side without blocking. Returns `Done` once the
    /// queue is empty.
    fn try_flush(&mut self) -> io::Result<FlushStatus>;

    /// Drives the write side until the queue is empty, blocking if needed.
    /// Used at handshake steps that must not proceed until bytes are on the
    /// wire (§4.5: "every outbound packet of the handshake is flushed
    /// before the corresponding inbound packet is awaited").
    fn blocking_flush(&mut self) -> io::Result<()> {
        loop {
            if self.try_flush()? == FlushStatus::Done {
                return Ok(());
            }
        }
    }

    fn is_open(&self) -> bool;

    fn close(&mut self);
}

/// A minimal reference [`Socket`] over a blocking `std::net::TcpStream`,
/// used by the demo binaries and by tests that exercise the handshake
/// end-to-end. Production users of this crate are expected to supply their
/// own non-blocking implementation wired to their reactor, exactly as
/// spec.md §4.1 describes.
pub struct BlockingTcpSocket {
    stream: TcpStream,
    out_queue: Vec<u8>,
    open: bool,
}

impl BlockingTcpSocket {
    pub fn connect(addr: &str) -> io::Result<BlockingTcpSocket> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true).ok();
        Ok(BlockingTcpSocket { stream, out_queue: Vec::new(), open: true })
    }

    pub fn from_stream(stream: TcpStream) -> BlockingTcpSocket {
        BlockingTcpSocket { stream, out_queue: Vec::new(), open: true }
    }

    /// Blocks until at least one byte is available, then returns it. The
    /// orchestrator's pump (spec.md §4.7) repeatedly calls this and feeds
    /// the result to `Session::on_data`.
    pub fn read_some(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Socket for BlockingTcpSocket {
    fn write_queued(&mut self, bytes: &[u8]) {
        self.out_queue.extend_from_slice(bytes);
    }

    fn try_flush(&mut self) -> io::Result<FlushStatus> {
        if self.out_queue.is_empty() {
            return Ok(FlushStatus::Done);
        }
        self.stream.write_all(&self.out_queue)?;
        self.out_queue.clear();
        Ok(FlushStatus::Done)
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        self.open = false;
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }
}
