// Blocking byte links to the devices.
//
// `DeviceLink` is the seam between the controller and the sockets: whole-buffer
// sends and exact-length receives, both through `&self` so one link can be
// shared by the sender thread (writes) and a receiver thread (reads) behind an
// `Arc`. `StreamLink` is the TCP implementation used by the binary and the
// tests; `&TcpStream` implements both `Read` and `Write`, so no lock is needed
// for one reader and one writer on the same stream.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};

use thiserror::Error;

/// A connected, bidirectional byte stream to one device.
pub trait DeviceLink: Send + Sync {
    /// Write all of `bytes`.
    fn send(&self, bytes: &[u8]) -> io::Result<()>;

    /// Block until `buf` is completely filled. A closed or failed connection
    /// is an error, including a close part-way through the buffer.
    fn receive_exact(&self, buf: &mut [u8]) -> io::Result<()>;

    /// Human-readable remote address, for logs.
    fn peer(&self) -> String;
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// TCP link to a device listening on `addr`.
pub struct StreamLink {
    stream: TcpStream,
    peer: SocketAddr,
}

impl StreamLink {
    pub fn connect(addr: SocketAddr) -> Result<Self, TransportError> {
        let stream =
            TcpStream::connect(addr).map_err(|source| TransportError::Connect { addr, source })?;
        Ok(Self { stream, peer: addr })
    }

    /// Wrap an already-connected stream.
    pub fn from_stream(stream: TcpStream) -> io::Result<Self> {
        let peer = stream.peer_addr()?;
        Ok(Self { stream, peer })
    }
}

impl DeviceLink for StreamLink {
    fn send(&self, bytes: &[u8]) -> io::Result<()> {
        (&self.stream).write_all(bytes)
    }

    fn receive_exact(&self, buf: &mut [u8]) -> io::Result<()> {
        (&self.stream).read_exact(buf)
    }

    fn peer(&self) -> String {
        self.peer.to_string()
    }
}
