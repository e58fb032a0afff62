//! Shared helpers for integration tests.
//!
//! Import via `mod common;`.

#![allow(unused)]

use std::time::Duration;

use netbridge::transport::{Socket, SocketKind};
use netbridge::{Endpoint, Error, Family, Session};

/// Upper bound on retry iterations when driving two sessions.
pub const MAX_ITERATIONS: usize = 2000;

pub fn loopback_v4() -> Endpoint {
    Endpoint::v4([127, 0, 0, 1], 0)
}

/// Two non-blocking UDP sockets on 127.0.0.1, connected to each other.
pub fn udp_pair() -> (Socket, Socket) {
    let a = Socket::open(Family::Ipv4, SocketKind::Datagram).expect("open a");
    a.bind(&loopback_v4()).expect("bind a");
    let b = Socket::open(Family::Ipv4, SocketKind::Datagram).expect("open b");
    b.bind(&loopback_v4()).expect("bind b");

    a.connect(&b.local_endpoint().unwrap()).expect("connect a");
    b.connect(&a.local_endpoint().unwrap()).expect("connect b");

    a.set_nonblocking().unwrap();
    b.set_nonblocking().unwrap();
    (a, b)
}

/// A connected, non-blocking TCP pair on 127.0.0.1: (client, server).
pub fn tcp_pair() -> (Socket, Socket) {
    let listener = Socket::open(Family::Ipv4, SocketKind::Stream).expect("open listener");
    listener.bind(&loopback_v4()).expect("bind listener");
    listener.listen(4).expect("listen");
    let addr = listener.local_endpoint().unwrap();

    let client = Socket::open(Family::Ipv4, SocketKind::Stream).expect("open client");
    client.connect(&addr).expect("connect");
    let (server, peer) = listener.accept().expect("accept");
    assert_eq!(peer, client.local_endpoint().unwrap());

    client.set_nonblocking().unwrap();
    server.set_nonblocking().unwrap();
    (client, server)
}

fn step(r: Result<(), Error>) -> Result<bool, Error> {
    match r {
        Ok(()) => Ok(true),
        Err(Error::WouldBlock) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Drive both handshakes until both are established.
///
/// Returns the first non-retry error from either side.
pub fn drive_handshake(client: &mut Session, server: &mut Session) -> Result<usize, Error> {
    for i in 0..MAX_ITERATIONS {
        let c = step(client.handshake())?;
        let s = step(server.handshake())?;
        if c && s {
            return Ok(i);
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    panic!("handshake did not finish in {} iterations", MAX_ITERATIONS);
}

/// Read once data shows up, pumping `other` so it can flush.
pub fn read_some(session: &mut Session, other: &mut Session, buf: &mut [u8]) -> Result<usize, Error> {
    for _ in 0..MAX_ITERATIONS {
        match session.read(buf) {
            Err(Error::WouldBlock) => {}
            r => return r,
        }
        // The peer may still owe us a handshake flight.
        let _ = other.handshake();
        std::thread::sleep(Duration::from_millis(1));
    }
    panic!("no data after {} iterations", MAX_ITERATIONS);
}
