//! Non-blocking transport behavior over real loopback sockets.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::*;
use netbridge::interfaces;
use netbridge::transport::{self, BufferKind, Interest, PollEntry, Socket, SocketKind};
use netbridge::{Endpoint, Error, ErrorKind, Family, Outcome};

#[test]
fn loopback_pair_becomes_readable() {
    let _ = env_logger::try_init();

    let pair = transport::make_loopback_pair().expect("loopback pair");

    {
        let mut entries = [PollEntry::new(&pair.reader, Interest::READABLE)];
        let n = transport::poll(&mut entries, Some(Duration::from_millis(10))).unwrap();
        assert_eq!(n, 0, "nothing sent yet");
    }

    pair.writer.send(b"ping", None).unwrap();

    let mut entries = [PollEntry::new(&pair.reader, Interest::READABLE)];
    let n = transport::poll(&mut entries, Some(Duration::from_secs(5))).unwrap();
    assert_eq!(n, 1);
    assert!(entries[0].ready().contains(Interest::READABLE));

    let mut buf = [0; 16];
    let n = pair.reader.recv(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"ping");
}

#[test]
fn wake_from_another_thread() {
    let _ = env_logger::try_init();

    let pair = Arc::new(transport::make_loopback_pair().unwrap());

    let waker = {
        let pair = pair.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            pair.wake().unwrap();
        })
    };

    let mut entries = [PollEntry::new(&pair.reader, Interest::READABLE)];
    let n = transport::poll(&mut entries, Some(Duration::from_secs(5))).unwrap();
    assert_eq!(n, 1);

    waker.join().unwrap();
    assert_eq!(pair.drain().unwrap(), 1);
    assert_eq!(pair.drain().unwrap(), 0);
}

#[test]
fn nonblocking_recv_is_retry_later() {
    let _ = env_logger::try_init();

    let (client, server) = tcp_pair();
    let r = server.recv(&mut [0; 8]);
    assert_eq!(Outcome::of(&r), Outcome::RetryLater);

    client.send(b"abc", None).unwrap();

    let mut entries = [PollEntry::new(&server, Interest::READABLE)];
    transport::poll(&mut entries, Some(Duration::from_secs(5))).unwrap();

    let mut buf = [0; 8];
    let n = server.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"abc");
}

#[test]
fn nonblocking_send_fills_up() {
    let _ = env_logger::try_init();

    let (client, _server) = tcp_pair();
    client.set_buffer_size(BufferKind::Send, 4096).unwrap();

    let chunk = vec![0x5a; 64 * 1024];
    let mut sent = 0;
    let mut filled = false;

    for _ in 0..1024 {
        let r = client.send(&chunk, None);
        match Outcome::of(&r) {
            Outcome::Success => sent += r.unwrap(),
            Outcome::RetryLater => {
                filled = true;
                break;
            }
            Outcome::Failed => panic!("send failed after {} bytes: {:?}", sent, r),
        }
    }

    assert!(filled, "send never backed off after {} bytes", sent);
}

#[test]
fn nonblocking_accept_with_empty_backlog() {
    let _ = env_logger::try_init();

    let listener = Socket::open(Family::Ipv4, SocketKind::Stream).unwrap();
    listener.bind(&loopback_v4()).unwrap();
    listener.listen(1).unwrap();
    listener.set_nonblocking().unwrap();

    let r = listener.accept();
    assert!(matches!(r, Err(Error::WouldBlock)));

    let client = Socket::open(Family::Ipv4, SocketKind::Stream).unwrap();
    client.connect(&listener.local_endpoint().unwrap()).unwrap();

    let mut entries = [PollEntry::new(&listener, Interest::READABLE)];
    transport::poll(&mut entries, Some(Duration::from_secs(5))).unwrap();

    let (conn, _) = listener.accept().unwrap();
    // Inherits the listener's mode.
    assert!(conn.is_nonblocking().unwrap());
}

#[test]
fn closed_socket_refuses_everything() {
    let _ = env_logger::try_init();

    let (mut a, _b) = udp_pair();
    a.close().unwrap();
    a.close().unwrap();
    assert!(!a.is_open());

    assert!(matches!(a.send(b"x", None), Err(Error::Closed)));
    assert!(matches!(a.recv(&mut [0; 4]), Err(Error::Closed)));
    assert!(matches!(a.local_endpoint(), Err(Error::Closed)));
    assert!(matches!(a.set_nonblocking(), Err(Error::Closed)));
}

#[test]
fn refused_connect_is_a_failure() {
    let _ = env_logger::try_init();

    // Grab a free port, then release it.
    let port = {
        let s = Socket::open(Family::Ipv4, SocketKind::Stream).unwrap();
        s.bind(&loopback_v4()).unwrap();
        s.local_endpoint().unwrap().port()
    };

    let s = Socket::open(Family::Ipv4, SocketKind::Stream).unwrap();
    let r = s.connect(&Endpoint::v4([127, 0, 0, 1], port));
    assert_eq!(Outcome::of(&r), Outcome::Failed);
    assert_eq!(r.unwrap_err().kind(), ErrorKind::PlatformFailure);
}

#[test]
fn nonblocking_connect_completes_on_writable() {
    let _ = env_logger::try_init();

    let listener = Socket::open(Family::Ipv4, SocketKind::Stream).unwrap();
    listener.bind(&loopback_v4()).unwrap();
    listener.listen(1).unwrap();
    let addr = listener.local_endpoint().unwrap();

    let client = Socket::open(Family::Ipv4, SocketKind::Stream).unwrap();
    client.set_nonblocking().unwrap();

    match client.connect(&addr) {
        Ok(()) | Err(Error::WouldBlock) => {}
        Err(e) => panic!("connect: {:?}", e),
    }

    let mut entries = [PollEntry::new(&client, Interest::WRITABLE)];
    let n = transport::poll(&mut entries, Some(Duration::from_secs(5))).unwrap();
    assert_eq!(n, 1);
    assert!(entries[0].ready().contains(Interest::WRITABLE));
    assert_eq!(client.peer_endpoint().unwrap(), addr);
}

#[test]
fn stream_eof_is_reported() {
    let _ = env_logger::try_init();

    let (mut client, server) = tcp_pair();
    client.close().unwrap();

    let mut entries = [PollEntry::new(&server, Interest::READABLE)];
    transport::poll(&mut entries, Some(Duration::from_secs(5))).unwrap();

    let err = server.recv(&mut [0; 8]).unwrap_err();
    assert!(matches!(err, Error::Eof), "{:?}", err);
    assert_eq!(err.kind(), ErrorKind::PeerClosed);
}

#[test]
fn datagram_over_ipv6_loopback() {
    let _ = env_logger::try_init();

    let lo = Endpoint::v6(std::net::Ipv6Addr::LOCALHOST.octets(), 0);

    let a = Socket::open(Family::Ipv6, SocketKind::Datagram).unwrap();
    if a.bind(&lo).is_err() {
        // No IPv6 on this host.
        return;
    }
    let b = Socket::open(Family::Ipv6, SocketKind::Datagram).unwrap();
    b.bind(&lo).unwrap();
    b.set_nonblocking().unwrap();

    let dest = b.local_endpoint().unwrap();
    assert_eq!(dest.family(), Family::Ipv6);
    assert_eq!(a.send(b"six", Some(&dest)).unwrap(), 3);

    let mut entries = [PollEntry::new(&b, Interest::READABLE)];
    transport::poll(&mut entries, Some(Duration::from_secs(5))).unwrap();

    let mut buf = [0; 8];
    let (n, from) = b.recv_from(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"six");
    assert_eq!(from, Some(a.local_endpoint().unwrap()));
}

#[test]
fn resolve_localhost() {
    let _ = env_logger::try_init();

    let found = transport::resolve("localhost", Some(443)).expect("resolve localhost");
    assert!(!found.is_empty());
    assert!(found.iter().all(|e| e.port() == 443));
    assert!(found.iter().any(|e| e.ip().is_loopback()));
}

#[test]
fn local_addresses_skip_loopback() {
    let _ = env_logger::try_init();

    let found = interfaces::local_addresses(None::<fn(&str) -> bool>, 16).unwrap();
    assert!(found.len() <= 16);
    for e in &found {
        assert!(!e.ip().is_loopback(), "{}", e);
        assert_eq!(e.port(), 0);
    }
}
