//! TLS/DTLS session over a caller supplied transport.
//!
//! A [`Session`] wraps the engine and feeds it ciphertext through a
//! [`BridgeIo`]. The engine's "want read" and "want write" conditions come
//! out of [`Session::read`], [`Session::write`] and [`Session::handshake`] as
//! [`Error::WouldBlock`], so TLS I/O is retried exactly like raw transport
//! I/O: wait for readiness, call again.
//!
//! ```text
//! Created --start--> Handshaking --handshake done--> Established
//!                         |                              |
//!                         +------------close-------------+--> Closed
//! ```

use openssl::ssl::{ErrorCode, ShutdownResult, SslStream};

use crate::certificate::{self, DtlsCertificate};
use crate::config::Config;
use crate::Error;

mod conduit;
mod context;
mod srtp;

pub use conduit::{BridgeIo, CallbackIo, SocketIo};
pub use srtp::{KeyingMaterial, SrtpProfile, DTLS_SRTP_EXPORTER_LABEL};

use conduit::Conduit;

/// Which side of the handshake we are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Client,
    Server,
}

/// Lifecycle of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Created,
    Handshaking,
    Established,
    Closed,
}

/// One TLS or DTLS session.
///
/// Not synchronized. Drive it from one thread at a time.
pub struct Session {
    config: Config,
    state: SessionState,
    certificate: Option<DtlsCertificate>,
    stream: Option<SslStream<Conduit>>,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Session {
            config,
            state: SessionState::Created,
            certificate: None,
            stream: None,
        }
    }

    #[inline(always)]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[inline(always)]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Start the handshake as `role` over `io`.
    ///
    /// `hostname` is only used by clients, for SNI over TLS and for hostname
    /// verification with [`PeerVerification::Chain`].
    ///
    /// Once the engine is set up the session is `Handshaking` and the first
    /// flight is attempted right away. The result is that of
    /// [`Session::handshake`], so `Err(Error::WouldBlock)` is the normal
    /// outcome of a successful start.
    ///
    /// [`PeerVerification::Chain`]: crate::PeerVerification::Chain
    pub fn start<T>(&mut self, role: Role, hostname: Option<&str>, io: T) -> Result<(), Error>
    where
        T: BridgeIo + Send + 'static,
    {
        if self.state != SessionState::Created {
            return Err(Error::InvalidState(self.state));
        }
        if hostname.map(|h| h.contains('\0')).unwrap_or(false) {
            return Err(Error::InvalidArgument("hostname contains NUL"));
        }

        let cert = match self.config.certificate() {
            Some(c) => c.clone(),
            None => {
                debug!("No certificate configured, generating an ephemeral one");
                certificate::generate_self_signed_certificate()?
            }
        };

        let ctx = context::create_context(&self.config, &cert)?;
        let ssl = context::create_ssl(&ctx, &self.config, role, hostname)?;
        let stream = SslStream::new(ssl, Conduit::new(Box::new(io)))?;

        debug!(
            "Start {:?} {:?} session, local fingerprint {}",
            self.config.protocol(),
            role,
            cert.fingerprint_str()
        );

        self.certificate = Some(cert);
        self.stream = Some(stream);
        self.set_state(SessionState::Handshaking);

        self.handshake()
    }

    /// Drive the handshake.
    ///
    /// `Ok(())` once `Established`. `Err(Error::WouldBlock)` while the
    /// engine waits for the peer.
    pub fn handshake(&mut self) -> Result<(), Error> {
        match self.state {
            SessionState::Established => return Ok(()),
            SessionState::Handshaking => {}
            s => return Err(Error::InvalidState(s)),
        }

        let stream = self.stream.as_mut().ok_or(Error::InvalidState(self.state))?;
        stream.get_mut().clear_error();

        match stream.do_handshake() {
            Ok(()) => {
                self.set_state(SessionState::Established);
                Ok(())
            }
            Err(e) => Err(map_ssl_error(stream, e, Error::Handshake)),
        }
    }

    /// Read decrypted application data.
    ///
    /// While `Handshaking` the handshake is driven first. A close notify from
    /// the peer is [`Error::PeerClosed`].
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        self.ready_for_data()?;
        if buf.is_empty() {
            return Ok(0);
        }

        let stream = self.stream.as_mut().ok_or(Error::InvalidState(self.state))?;
        stream.get_mut().clear_error();

        stream
            .ssl_read(buf)
            .map_err(|e| map_ssl_error(stream, e, Error::Record))
    }

    /// Encrypt and send application data.
    ///
    /// While `Handshaking` the handshake is driven first.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        self.ready_for_data()?;
        if buf.is_empty() {
            return Ok(0);
        }

        let stream = self.stream.as_mut().ok_or(Error::InvalidState(self.state))?;
        stream.get_mut().clear_error();

        stream
            .ssl_write(buf)
            .map_err(|e| map_ssl_error(stream, e, Error::Record))
    }

    #[inline(always)]
    pub fn is_handshake_complete(&self) -> bool {
        self.state == SessionState::Established
    }

    /// Decrypted bytes the engine holds that a [`Session::read`] returns
    /// without touching the transport.
    pub fn bytes_buffered(&self) -> usize {
        self.stream.as_ref().map(|s| s.ssl().pending()).unwrap_or(0)
    }

    /// SHA-256 fingerprint of our own certificate, once started.
    pub fn local_fingerprint(&self) -> Option<Vec<u8>> {
        self.certificate.as_ref().map(|c| c.fingerprint())
    }

    /// SHA-256 fingerprint of the certificate the peer presented.
    pub fn peer_fingerprint(&self) -> Option<Vec<u8>> {
        let cert = self.stream.as_ref()?.ssl().peer_certificate()?;
        let der = cert.to_der().ok()?;
        Some(certificate::calculate_fingerprint(&der))
    }

    /// Export DTLS-SRTP keying material for the negotiated profile.
    pub fn keying_material(&self) -> Result<(KeyingMaterial, SrtpProfile), Error> {
        if self.state != SessionState::Established {
            return Err(Error::InvalidState(self.state));
        }
        let stream = self.stream.as_ref().ok_or(Error::InvalidState(self.state))?;
        let ssl = stream.ssl();

        let profile = ssl
            .selected_srtp_profile()
            .and_then(|p| SrtpProfile::from_openssl_id(p.id()))
            .ok_or(Error::NoSrtpProfile)?;

        let mut buf = vec![0; profile.keying_material_len()];
        ssl.export_keying_material(&mut buf, DTLS_SRTP_EXPORTER_LABEL, None)?;

        trace!("Exported keying material for {}", profile);

        Ok((KeyingMaterial::new(buf), profile))
    }

    /// Close the session.
    ///
    /// Sends close notify, retrying a bounded number of times while the
    /// transport cannot take it, then releases the engine whether or not the
    /// notify went out. Closing a closed session does nothing.
    pub fn close(&mut self) {
        let Some(mut stream) = self.stream.take() else {
            if self.state != SessionState::Closed {
                self.set_state(SessionState::Closed);
            }
            return;
        };

        if self.state == SessionState::Established {
            let retries = self.config.close_notify_retries();
            for attempt in 1..=retries {
                match stream.shutdown() {
                    Ok(ShutdownResult::Sent) | Ok(ShutdownResult::Received) => {
                        trace!("Close notify sent");
                        break;
                    }
                    Err(e) if e.code() == ErrorCode::WANT_WRITE && attempt < retries => continue,
                    Err(e) => {
                        debug!("Close notify not sent: {}", e);
                        break;
                    }
                }
            }
        }

        drop(stream);
        self.certificate = None;
        self.set_state(SessionState::Closed);
    }

    fn ready_for_data(&mut self) -> Result<(), Error> {
        match self.state {
            SessionState::Established => Ok(()),
            SessionState::Handshaking => self.handshake(),
            s => Err(Error::InvalidState(s)),
        }
    }

    fn set_state(&mut self, state: SessionState) {
        debug!("Session {:?} -> {:?}", self.state, state);
        self.state = state;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("protocol", &self.config.protocol())
            .finish()
    }
}

fn map_ssl_error(
    stream: &mut SslStream<Conduit>,
    e: openssl::ssl::Error,
    wrap: fn(openssl::ssl::Error) -> Error,
) -> Error {
    match e.code() {
        ErrorCode::WANT_READ | ErrorCode::WANT_WRITE => Error::WouldBlock,
        ErrorCode::ZERO_RETURN => {
            debug!("Peer sent close notify");
            Error::PeerClosed
        }
        _ => match stream.get_mut().take_error() {
            Some(transport) => transport,
            None => wrap(e),
        },
    }
}
