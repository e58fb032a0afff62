use std::io;

use thiserror::Error;

use crate::certificate::CertificateError;
use crate::signature::SignatureError;

/// Errors produced by the transport, the address model and the session bridge.
///
/// [`Error::WouldBlock`] is not a failure. It is the non-blocking "retry later"
/// signal, carried in the error position so it propagates with `?`. Use
/// [`Outcome::of`] or [`Error::is_retry`] to tell it apart from real failures.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Operation would block, retry when ready")]
    WouldBlock,

    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("Unsupported address family {0}")]
    UnsupportedFamily(i32),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Handle is closed")]
    Closed,

    #[error("Operation not valid in state {0:?}")]
    InvalidState(crate::SessionState),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(io::Error),

    #[error("Platform failure: {0}")]
    Platform(io::Error),

    #[error("Failed to resolve {host}: {source}")]
    Resolve { host: String, source: io::Error },

    #[error("Host not found: {0}")]
    HostNotFound(String),

    #[error("TLS engine setup failed: {0}")]
    Engine(#[from] openssl::error::ErrorStack),

    #[error("Handshake failed: {0}")]
    Handshake(openssl::ssl::Error),

    #[error("Record layer failed: {0}")]
    Record(openssl::ssl::Error),

    #[error("Peer sent close notify")]
    PeerClosed,

    #[error("Connection closed by peer")]
    Eof,

    #[error("No SRTP profile negotiated")]
    NoSrtpProfile,

    #[error("{0}")]
    Certificate(#[from] CertificateError),

    #[error("{0}")]
    Signature(#[from] SignatureError),
}

/// The failure taxonomy every [`Error`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller bug. Never retried.
    InvalidArgument,
    /// Allocation or OS resource limits.
    ResourceExhausted,
    /// Not an error. Retry after a readiness signal.
    RetryLater,
    /// The handshake or record layer rejected input or peer behavior.
    ProtocolFailure,
    /// A native call failed for a reason not otherwise classified.
    PlatformFailure,
    /// The peer closed the session (close notify or stream EOF).
    PeerClosed,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::WouldBlock => ErrorKind::RetryLater,
            Error::InvalidArgument(_)
            | Error::UnsupportedFamily(_)
            | Error::InvalidAddress(_)
            | Error::Closed
            | Error::InvalidState(_) => ErrorKind::InvalidArgument,
            Error::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
            Error::Platform(_) | Error::Resolve { .. } | Error::HostNotFound(_) => {
                ErrorKind::PlatformFailure
            }
            Error::Engine(_) | Error::Handshake(_) | Error::Record(_) | Error::NoSrtpProfile => {
                ErrorKind::ProtocolFailure
            }
            Error::PeerClosed | Error::Eof => ErrorKind::PeerClosed,
            Error::Certificate(e) => e.kind(),
            Error::Signature(e) => e.kind(),
        }
    }

    /// Whether this is the "retry later" signal rather than a failure.
    pub fn is_retry(&self) -> bool {
        matches!(self, Error::WouldBlock)
    }

    /// Whether the handle or session involved must be torn down.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ProtocolFailure | ErrorKind::PlatformFailure | ErrorKind::PeerClosed
        )
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::WouldBlock {
            return Error::WouldBlock;
        }

        let exhausted = e.kind() == io::ErrorKind::OutOfMemory
            || matches!(
                e.raw_os_error(),
                Some(libc::ENOMEM | libc::ENOBUFS | libc::EMFILE | libc::ENFILE)
            );

        if exhausted {
            Error::ResourceExhausted(e)
        } else {
            Error::Platform(e)
        }
    }
}

/// Three-way result of every I/O primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Operation fully completed.
    Success,
    /// Operation would block. Re-arm on readiness and retry.
    RetryLater,
    /// Unrecoverable for this call.
    Failed,
}

impl Outcome {
    /// Classify a result.
    pub fn of<T>(result: &Result<T, Error>) -> Outcome {
        match result {
            Ok(_) => Outcome::Success,
            Err(e) if e.is_retry() => Outcome::RetryLater,
            Err(_) => Outcome::Failed,
        }
    }
}
