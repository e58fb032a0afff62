//! netbridge: non-blocking transport with a TLS/DTLS session bridge.
//!
//! Three layers, leaf first:
//!
//! * [`Endpoint`] and [`transport`]: sockets that never block the caller's
//!   event loop. Every I/O call is `Result<_, Error>`, where
//!   [`Error::WouldBlock`] is the "retry later" signal rather than a failure.
//!   [`Outcome::of`] gives the three-way classification.
//! * [`certificate`]: ephemeral self-signed certificates. Peers are identified
//!   by certificate fingerprint, not by PKI.
//! * [`Session`]: a TLS or DTLS engine driven through a [`BridgeIo`]. The
//!   engine wanting more input or output surfaces as `Error::WouldBlock`, so
//!   TLS I/O is retried exactly like raw transport I/O.
//!
//! The caller owns the event loop. Nothing here spawns threads, sleeps or
//! enforces timeouts; [`transport::poll`] is provided to wait for readiness.
//!
//! # Example
//!
//! ```no_run
//! use netbridge::transport::{Socket, SocketKind};
//! use netbridge::{Config, Endpoint, Family, Role, Session, SocketIo};
//!
//! let socket = Socket::open(Family::Ipv4, SocketKind::Datagram)?;
//! socket.bind(&Endpoint::parse("0.0.0.0:0")?)?;
//! socket.connect(&Endpoint::parse("192.0.2.1:5000")?)?;
//! socket.set_nonblocking()?;
//!
//! let mut session = Session::new(Config::default());
//! match session.start(Role::Client, None, SocketIo::new(socket)) {
//!     Ok(()) => {}
//!     Err(e) if e.is_retry() => {
//!         // Wait for readiness, then call session.handshake() again.
//!     }
//!     Err(e) => return Err(e),
//! }
//! # Ok::<(), netbridge::Error>(())
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all)]

#[macro_use]
extern crate log;

mod address;
pub use address::{Endpoint, Family, IPV4_ADDRESS_LENGTH, IPV6_ADDRESS_LENGTH};

mod error;
pub use error::{Error, ErrorKind, Outcome};

pub mod status;
pub mod time;

pub mod interfaces;
pub mod transport;

pub mod certificate;
pub use certificate::{CertificateError, DtlsCertificate, KeyType};

pub mod crypto;

mod signature;
pub use self::signature::{verify_signature, SignatureError};

mod config;
pub use config::{Config, ConfigBuilder, PeerVerification, Protocol};

mod bridge;
pub use bridge::{BridgeIo, CallbackIo, KeyingMaterial, Role, Session, SessionState};
pub use bridge::{SocketIo, SrtpProfile, DTLS_SRTP_EXPORTER_LABEL};
