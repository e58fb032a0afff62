use std::io;

use crate::address::Endpoint;
use crate::transport::Socket;
use crate::Error;

/// The transport underneath a [`Session`][super::Session].
///
/// The engine pulls and pushes ciphertext exclusively through this. Both
/// methods follow the transport conventions: [`Error::WouldBlock`] means
/// nothing could be moved right now, any other error is final. For datagram
/// transports one call moves exactly one datagram.
pub trait BridgeIo {
    fn send(&mut self, buf: &[u8]) -> Result<usize, Error>;
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Error>;
}

/// [`BridgeIo`] over a transport [`Socket`].
#[derive(Debug)]
pub struct SocketIo {
    socket: Socket,
    dest: Option<Endpoint>,
}

impl SocketIo {
    /// Send to and receive from the socket's connected peer.
    pub fn new(socket: Socket) -> Self {
        SocketIo { socket, dest: None }
    }

    /// Send every datagram to `dest`, for unconnected datagram sockets.
    pub fn with_destination(socket: Socket, dest: Endpoint) -> Self {
        SocketIo {
            socket,
            dest: Some(dest),
        }
    }

    pub fn socket(&self) -> &Socket {
        &self.socket
    }

    pub fn into_inner(self) -> Socket {
        self.socket
    }
}

impl BridgeIo for SocketIo {
    fn send(&mut self, buf: &[u8]) -> Result<usize, Error> {
        self.socket.send(buf, self.dest.as_ref())
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        self.socket.recv(buf)
    }
}

/// [`BridgeIo`] from a pair of closures.
///
/// Whatever context the closures need is captured by them.
pub struct CallbackIo<S, R> {
    send: S,
    recv: R,
}

impl<S, R> CallbackIo<S, R>
where
    S: FnMut(&[u8]) -> Result<usize, Error>,
    R: FnMut(&mut [u8]) -> Result<usize, Error>,
{
    pub fn new(send: S, recv: R) -> Self {
        CallbackIo { send, recv }
    }
}

impl<S, R> BridgeIo for CallbackIo<S, R>
where
    S: FnMut(&[u8]) -> Result<usize, Error>,
    R: FnMut(&mut [u8]) -> Result<usize, Error>,
{
    fn send(&mut self, buf: &[u8]) -> Result<usize, Error> {
        (self.send)(buf)
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        (self.recv)(buf)
    }
}

/// Adapts a [`BridgeIo`] to the blocking-style `Read`/`Write` the engine
/// drives.
///
/// "Retry later" becomes `io::ErrorKind::WouldBlock`, which the engine
/// reports as want-read/want-write. Any other failure is kept so the session
/// can surface the transport error instead of the engine's generic one.
pub(crate) struct Conduit {
    io: Box<dyn BridgeIo + Send>,
    last_error: Option<Error>,
}

impl Conduit {
    pub fn new(io: Box<dyn BridgeIo + Send>) -> Self {
        Conduit {
            io,
            last_error: None,
        }
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    pub fn take_error(&mut self) -> Option<Error> {
        self.last_error.take()
    }

    fn convert(&mut self, e: Error) -> io::Error {
        if e.is_retry() {
            return io::ErrorKind::WouldBlock.into();
        }
        let err = io::Error::new(io::ErrorKind::Other, e.to_string());
        self.last_error = Some(e);
        err
    }
}

impl io::Read for Conduit {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.io.recv(buf) {
            Ok(n) => Ok(n),
            Err(e) => Err(self.convert(e)),
        }
    }
}

impl io::Write for Conduit {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.io.send(buf) {
            Ok(n) => Ok(n),
            Err(e) => Err(self.convert(e)),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
