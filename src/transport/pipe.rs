use super::{Socket, SocketKind};
use crate::address::{Endpoint, Family};
use crate::Error;

/// Two connected non-blocking UDP sockets on 127.0.0.1.
///
/// Used to wake a thread blocked in [`poll`][super::poll]: any thread sends
/// a byte on `writer`, the poller sees `reader` become readable.
#[derive(Debug)]
pub struct LoopbackPair {
    pub reader: Socket,
    pub writer: Socket,
}

impl LoopbackPair {
    /// Send a single wakeup byte.
    pub fn wake(&self) -> Result<(), Error> {
        self.writer.send(&[1], None).map(|_| ())
    }

    /// Read and discard everything queued on the reader.
    pub fn drain(&self) -> Result<usize, Error> {
        let mut buf = [0; 64];
        let mut total = 0;
        loop {
            match self.reader.recv(&mut buf) {
                Ok(n) => total += n,
                Err(Error::WouldBlock) => return Ok(total),
                Err(e) => return Err(e),
            }
        }
    }
}

/// Create a [`LoopbackPair`].
///
/// If any step fails nothing is leaked: sockets opened so far are closed
/// when they go out of scope.
pub fn make_loopback_pair() -> Result<LoopbackPair, Error> {
    let loopback = Endpoint::v4([127, 0, 0, 1], 0);

    let reader = Socket::open(Family::Ipv4, SocketKind::Datagram)?;
    reader.bind(&loopback)?;
    let target = reader.local_endpoint()?;

    let writer = Socket::open(Family::Ipv4, SocketKind::Datagram)?;
    writer.connect(&target)?;

    reader.set_nonblocking()?;
    writer.set_nonblocking()?;

    debug!("Loopback pair on {}", target);

    Ok(LoopbackPair { reader, writer })
}
