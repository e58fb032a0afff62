//! Non-blocking socket handle.
//!
//! A [`Socket`] owns one native descriptor plus its [`SocketKind`]. Every I/O
//! primitive reports through `Result<_, Error>`, where [`Error::WouldBlock`]
//! is the "retry later" signal (see [`Outcome`][crate::Outcome]). Signal
//! interruption is retried internally and never reaches the caller as
//! "retry later".

use std::io::{self, Read};
use std::os::fd::AsRawFd;

use nix::sys::socket::{recvfrom, SockaddrStorage};

use socket2::{Protocol, Type};

use crate::address::{Endpoint, Family};
use crate::Error;

mod pipe;
mod poll;
mod resolve;

pub use pipe::{make_loopback_pair, LoopbackPair};
pub use poll::{poll, Interest, PollEntry};
pub use resolve::resolve;

/// Max attempts for a call that keeps getting interrupted by signals.
const MAX_INTERRUPTED_ATTEMPTS: usize = 30;

/// Yield the thread every this many interrupted attempts.
const YIELD_EVERY: usize = 5;

/// Stream (TCP) or datagram (UDP).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketKind {
    Stream,
    Datagram,
}

/// Which kernel buffer to size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    Send,
    Receive,
}

/// An owned native socket.
///
/// Closing is idempotent. Any operation other than [`Socket::close`] on a
/// closed socket fails with [`Error::Closed`]. `send`/`recv` take `&self`, so
/// a socket can be shared behind an `Arc` where several threads write to it
/// (the loopback wakeup pipe). Nothing else about a socket is synchronized.
pub struct Socket {
    inner: Option<socket2::Socket>,
    family: Family,
    kind: SocketKind,
}

impl Socket {
    /// Open a new socket. The socket starts in blocking mode.
    pub fn open(family: Family, kind: SocketKind) -> Result<Socket, Error> {
        let (ty, proto) = match kind {
            SocketKind::Stream => (Type::STREAM, Protocol::TCP),
            SocketKind::Datagram => (Type::DGRAM, Protocol::UDP),
        };

        let inner = socket2::Socket::new(family.domain(), ty, Some(proto))?;
        trace!("Opened {:?} {:?} socket", family, kind);

        Ok(Socket {
            inner: Some(inner),
            family,
            kind,
        })
    }

    #[inline(always)]
    pub fn family(&self) -> Family {
        self.family
    }

    #[inline(always)]
    pub fn kind(&self) -> SocketKind {
        self.kind
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    pub(crate) fn native(&self) -> Result<&socket2::Socket, Error> {
        self.inner.as_ref().ok_or(Error::Closed)
    }

    pub fn bind(&self, local: &Endpoint) -> Result<(), Error> {
        self.check_family(local)?;
        self.native()?.bind(&local.to_native())?;
        Ok(())
    }

    pub fn listen(&self, backlog: i32) -> Result<(), Error> {
        if self.kind != SocketKind::Stream {
            return Err(Error::InvalidArgument("listen on a datagram socket"));
        }
        self.native()?.listen(backlog)?;
        Ok(())
    }

    /// Accept a pending connection.
    ///
    /// In non-blocking mode an empty backlog is [`Error::WouldBlock`]. The
    /// accepted socket inherits the listener's blocking mode.
    pub fn accept(&self) -> Result<(Socket, Endpoint), Error> {
        if self.kind != SocketKind::Stream {
            return Err(Error::InvalidArgument("accept on a datagram socket"));
        }
        let native = self.native()?;

        let (conn, addr) = retry_interrupted(|| native.accept())?;
        let peer = Endpoint::from_native(&addr)?;

        if native.nonblocking()? {
            conn.set_nonblocking(true)?;
        }

        debug!("Accepted connection from {}", peer);

        Ok((
            Socket {
                inner: Some(conn),
                family: self.family,
                kind: self.kind,
            },
            peer,
        ))
    }

    /// Connect to `remote`.
    ///
    /// A connect still in progress on a non-blocking socket is
    /// [`Error::WouldBlock`]. Any other failure, including refusal, is final.
    pub fn connect(&self, remote: &Endpoint) -> Result<(), Error> {
        self.check_family(remote)?;
        let native = self.native()?;
        let addr = remote.to_native();

        match retry_interrupted(|| native.connect(&addr)) {
            Ok(()) => Ok(()),
            Err(Error::Platform(e)) | Err(Error::ResourceExhausted(e)) => {
                match e.raw_os_error() {
                    // A connect interrupted by a signal keeps going in the
                    // background, and the repeated call reports it as such.
                    Some(libc::EINPROGRESS) | Some(libc::EALREADY) => Err(Error::WouldBlock),
                    Some(libc::EISCONN) => Ok(()),
                    _ => Err(e.into()),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Send `buf`, to `dest` if given, otherwise to the connected peer.
    ///
    /// Returns the number of bytes sent. An empty `buf` is a no-op that
    /// returns `Ok(0)`.
    pub fn send(&self, buf: &[u8], dest: Option<&Endpoint>) -> Result<usize, Error> {
        let native = self.native()?;
        if buf.is_empty() {
            return Ok(0);
        }

        match dest {
            Some(dest) => {
                self.check_family(dest)?;
                let addr = dest.to_native();
                retry_interrupted(|| native.send_to(buf, &addr))
            }
            None => retry_interrupted(|| native.send(buf)),
        }
    }

    /// Receive into `buf` from the connected peer.
    ///
    /// On a stream socket an orderly shutdown by the peer is [`Error::Eof`],
    /// never `Ok(0)`. An empty `buf` is a no-op that returns `Ok(0)`.
    pub fn recv(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let mut native = self.native()?;
        if buf.is_empty() {
            return Ok(0);
        }

        let n = retry_interrupted(|| native.read(&mut *buf))?;
        self.check_eof(n)
    }

    /// Receive into `buf` and report the sender.
    ///
    /// The sender is `None` when the kernel reports none, as on a connected
    /// stream. An empty `buf` is a no-op that returns `Ok((0, None))`.
    pub fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, Option<Endpoint>), Error> {
        let fd = self.native()?.as_raw_fd();
        if buf.is_empty() {
            return Ok((0, None));
        }

        let (n, addr) = retry_interrupted(|| {
            recvfrom::<SockaddrStorage>(fd, &mut *buf).map_err(io::Error::from)
        })?;
        let n = self.check_eof(n)?;

        let from = match addr {
            Some(a) => Some(Endpoint::from_storage(&a)?),
            None => None,
        };

        Ok((n, from))
    }

    /// Alias for [`Socket::send`] to the connected peer.
    pub fn write(&self, buf: &[u8]) -> Result<usize, Error> {
        self.send(buf, None)
    }

    /// Alias for [`Socket::recv`].
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, Error> {
        self.recv(buf)
    }

    pub fn set_nonblocking(&self) -> Result<(), Error> {
        self.native()?.set_nonblocking(true)?;
        Ok(())
    }

    pub fn is_nonblocking(&self) -> Result<bool, Error> {
        Ok(self.native()?.nonblocking()?)
    }

    pub fn set_buffer_size(&self, which: BufferKind, bytes: usize) -> Result<(), Error> {
        let native = self.native()?;
        match which {
            BufferKind::Send => native.set_send_buffer_size(bytes)?,
            BufferKind::Receive => native.set_recv_buffer_size(bytes)?,
        }
        Ok(())
    }

    /// Current kernel buffer size. Linux reports double the requested value.
    pub fn buffer_size(&self, which: BufferKind) -> Result<usize, Error> {
        let native = self.native()?;
        let size = match which {
            BufferKind::Send => native.send_buffer_size()?,
            BufferKind::Receive => native.recv_buffer_size()?,
        };
        Ok(size)
    }

    pub fn local_endpoint(&self) -> Result<Endpoint, Error> {
        Endpoint::from_native(&self.native()?.local_addr()?)
    }

    pub fn peer_endpoint(&self) -> Result<Endpoint, Error> {
        Endpoint::from_native(&self.native()?.peer_addr()?)
    }

    /// Close the socket. Closing an already closed socket does nothing.
    pub fn close(&mut self) -> Result<(), Error> {
        if let Some(inner) = self.inner.take() {
            trace!("Closing {:?} {:?} socket", self.family, self.kind);
            drop(inner);
        }
        Ok(())
    }

    fn check_family(&self, e: &Endpoint) -> Result<(), Error> {
        if e.family() != self.family {
            return Err(Error::InvalidArgument("endpoint family differs from socket"));
        }
        Ok(())
    }

    fn check_eof(&self, n: usize) -> Result<usize, Error> {
        if n == 0 && self.kind == SocketKind::Stream {
            return Err(Error::Eof);
        }
        Ok(n)
    }
}

impl std::fmt::Debug for Socket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Socket")
            .field("family", &self.family)
            .field("kind", &self.kind)
            .field("open", &self.inner.is_some())
            .finish()
    }
}

/// Run `f` again while it fails with `EINTR`, yielding now and then.
///
/// Running out of attempts is a platform failure.
fn retry_interrupted<T>(mut f: impl FnMut() -> io::Result<T>) -> Result<T, Error> {
    let mut attempts = 0;
    loop {
        attempts += 1;
        match f() {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                if attempts >= MAX_INTERRUPTED_ATTEMPTS {
                    warn!("Giving up after {} interrupted attempts", attempts);
                    return Err(Error::Platform(e));
                }
                if attempts % YIELD_EVERY == 0 {
                    std::thread::yield_now();
                }
            }
            r => return r.map_err(Error::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorKind, Outcome};

    fn loopback() -> Endpoint {
        Endpoint::v4([127, 0, 0, 1], 0)
    }

    #[test]
    fn interrupted_is_retried() {
        let mut calls = 0;
        let r = retry_interrupted(|| {
            calls += 1;
            if calls < 7 {
                Err(io::Error::from(io::ErrorKind::Interrupted))
            } else {
                Ok(42)
            }
        });
        assert_eq!(r.unwrap(), 42);
        assert_eq!(calls, 7);
    }

    #[test]
    fn interrupted_is_bounded() {
        let mut calls = 0;
        let r: Result<(), Error> = retry_interrupted(|| {
            calls += 1;
            Err(io::Error::from(io::ErrorKind::Interrupted))
        });
        assert_eq!(calls, MAX_INTERRUPTED_ATTEMPTS);
        let err = r.unwrap_err();
        assert!(!err.is_retry());
        assert_eq!(err.kind(), ErrorKind::PlatformFailure);
    }

    #[test]
    fn close_is_idempotent() {
        let mut s = Socket::open(Family::Ipv4, SocketKind::Datagram).unwrap();
        assert!(s.is_open());
        s.close().unwrap();
        s.close().unwrap();
        assert!(!s.is_open());
        assert!(matches!(s.send(b"x", None), Err(Error::Closed)));
    }

    #[test]
    fn nonblocking_recv_without_data_retries() {
        let s = Socket::open(Family::Ipv4, SocketKind::Datagram).unwrap();
        s.bind(&loopback()).unwrap();
        s.set_nonblocking().unwrap();
        assert!(s.is_nonblocking().unwrap());

        let mut buf = [0; 64];
        let r = s.recv(&mut buf);
        assert_eq!(Outcome::of(&r), Outcome::RetryLater);

        let r = s.recv_from(&mut buf);
        assert_eq!(Outcome::of(&r), Outcome::RetryLater);
    }

    #[test]
    fn zero_length_io_is_success() {
        let s = Socket::open(Family::Ipv4, SocketKind::Datagram).unwrap();
        s.bind(&loopback()).unwrap();
        s.set_nonblocking().unwrap();
        assert_eq!(s.send(&[], None).unwrap(), 0);
        assert_eq!(s.recv(&mut []).unwrap(), 0);

        let r = s.recv_from(&mut []);
        assert_eq!(Outcome::of(&r), Outcome::Success);
        assert_eq!(r.unwrap(), (0, None));
    }

    #[test]
    fn datagram_send_to_and_recv_from() {
        let a = Socket::open(Family::Ipv4, SocketKind::Datagram).unwrap();
        a.bind(&loopback()).unwrap();
        let b = Socket::open(Family::Ipv4, SocketKind::Datagram).unwrap();
        b.bind(&loopback()).unwrap();

        let to = b.local_endpoint().unwrap();
        assert_eq!(a.send(b"hello", Some(&to)).unwrap(), 5);

        let mut buf = [0; 16];
        let (n, from) = b.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
        assert_eq!(from, Some(a.local_endpoint().unwrap()));
    }

    #[test]
    fn listen_requires_stream() {
        let s = Socket::open(Family::Ipv4, SocketKind::Datagram).unwrap();
        let err = s.listen(4).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn family_mismatch_is_rejected() {
        let s = Socket::open(Family::Ipv4, SocketKind::Datagram).unwrap();
        let v6 = Endpoint::parse("[::1]:0").unwrap();
        assert!(matches!(s.bind(&v6), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn buffer_sizes() {
        let s = Socket::open(Family::Ipv4, SocketKind::Datagram).unwrap();
        s.set_buffer_size(BufferKind::Receive, 64 * 1024).unwrap();
        s.set_buffer_size(BufferKind::Send, 64 * 1024).unwrap();
        assert!(s.buffer_size(BufferKind::Receive).unwrap() >= 64 * 1024);
        assert!(s.buffer_size(BufferKind::Send).unwrap() >= 64 * 1024);
    }
}
