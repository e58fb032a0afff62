//! Flat namespaced status codes.
//!
//! Every [`Error`] maps to exactly one `u32` code. Zero is success. Codes are
//! grouped in ranges: a base range for generic conditions, a utility range
//! holding the event-loop retry/failure pair, a networking range and a DTLS
//! range. Callers that receive a code they do not recognize must treat it as
//! a generic failure.

use crate::certificate::CertificateError;
use crate::error::{Error, Outcome};
use crate::signature::SignatureError;

pub const SUCCESS: u32 = 0x0000_0000;

pub const BASE: u32 = 0x0000_0000;
pub const NULL_ARG: u32 = BASE + 0x01;
pub const INVALID_ARG: u32 = BASE + 0x02;
pub const NOT_ENOUGH_MEMORY: u32 = BASE + 0x04;
pub const INVALID_HANDLE: u32 = BASE + 0x08;
pub const INTERNAL_ERROR: u32 = BASE + 0x0c;
pub const INVALID_OPERATION: u32 = BASE + 0x0d;
pub const LICENSE_ILLEGAL: u32 = BASE + 0x30;
pub const FAILURE: u32 = BASE + 0x101;
pub const SOCKET_BIND_FAILED: u32 = BASE + 0x102;
pub const SOCKET_GETSOCKETNAME_FAILED: u32 = BASE + 0x103;
pub const SOCKET_CONNECT_FAILED: u32 = BASE + 0x104;
pub const SOCKET_LISTEN_FAILED: u32 = BASE + 0x105;

pub const UTILS_BASE: u32 = 0x4000_0000;
pub const EVLOOP_BASE: u32 = UTILS_BASE + 0x0110_0000;
pub const EVLOOP_PERFORM_NEED_RETRY: u32 = EVLOOP_BASE + 0x02;
pub const EVLOOP_PERFORM_FAILED: u32 = EVLOOP_BASE + 0x03;

pub const NETWORKING_BASE: u32 = 0x5800_0000;
pub const GET_LOCAL_IP_ADDRESSES_FAILED: u32 = NETWORKING_BASE + 0x16;
pub const RESOLVE_HOSTNAME_FAILED: u32 = NETWORKING_BASE + 0x1b;
pub const HOSTNAME_NOT_FOUND: u32 = NETWORKING_BASE + 0x1c;
pub const CREATE_SSL_FAILED: u32 = NETWORKING_BASE + 0x1e;
pub const SSL_CONNECTION_FAILED: u32 = NETWORKING_BASE + 0x1f;
pub const SECURE_SOCKET_READ_FAILED: u32 = NETWORKING_BASE + 0x20;
pub const SOCKET_CONNECTION_CLOSED_ALREADY: u32 = NETWORKING_BASE + 0x22;
pub const SOCKET_SET_SEND_BUFFER_SIZE_FAILED: u32 = NETWORKING_BASE + 0x23;
pub const GET_SOCKET_FLAG_FAILED: u32 = NETWORKING_BASE + 0x24;
pub const SET_SOCKET_FLAG_FAILED: u32 = NETWORKING_BASE + 0x25;

pub const DTLS_BASE: u32 = 0x5900_0000;
pub const CERTIFICATE_GENERATION_FAILED: u32 = DTLS_BASE + 0x01;
pub const SSL_CTX_CREATION_FAILED: u32 = DTLS_BASE + 0x02;
pub const SSL_REMOTE_CERTIFICATE_VERIFICATION_FAILED: u32 = DTLS_BASE + 0x03;
pub const SSL_UNKNOWN_SRTP_PROFILE: u32 = DTLS_BASE + 0x05;
pub const SSL_INVALID_CERTIFICATE_BITS: u32 = DTLS_BASE + 0x06;
pub const SSL_SET_HOSTNAME_FAILED: u32 = DTLS_BASE + 0x07;

/// Whether the code means success.
#[inline(always)]
pub fn succeeded(code: u32) -> bool {
    code == SUCCESS
}

/// Map a status code back to an [`Outcome`].
///
/// Anything that is neither success nor the retry code is a failure,
/// including codes this crate does not know.
pub fn outcome(code: u32) -> Outcome {
    match code {
        SUCCESS => Outcome::Success,
        EVLOOP_PERFORM_NEED_RETRY => Outcome::RetryLater,
        _ => Outcome::Failed,
    }
}

impl Error {
    /// The status code for this error.
    pub fn status(&self) -> u32 {
        match self {
            Error::WouldBlock => EVLOOP_PERFORM_NEED_RETRY,
            Error::InvalidArgument(_) | Error::InvalidAddress(_) => INVALID_ARG,
            Error::UnsupportedFamily(_) => INVALID_ARG,
            Error::Closed => SOCKET_CONNECTION_CLOSED_ALREADY,
            Error::InvalidState(_) => INVALID_OPERATION,
            Error::ResourceExhausted(_) => NOT_ENOUGH_MEMORY,
            Error::Platform(_) => EVLOOP_PERFORM_FAILED,
            Error::Resolve { .. } => RESOLVE_HOSTNAME_FAILED,
            Error::HostNotFound(_) => HOSTNAME_NOT_FOUND,
            Error::Engine(_) => SSL_CTX_CREATION_FAILED,
            Error::Handshake(_) => SSL_CONNECTION_FAILED,
            Error::Record(_) => SECURE_SOCKET_READ_FAILED,
            Error::PeerClosed | Error::Eof => SOCKET_CONNECTION_CLOSED_ALREADY,
            Error::NoSrtpProfile => SSL_UNKNOWN_SRTP_PROFILE,
            Error::Certificate(e) => match e {
                CertificateError::InvalidKeyBits { .. } => SSL_INVALID_CERTIFICATE_BITS,
                _ => CERTIFICATE_GENERATION_FAILED,
            },
            Error::Signature(e) => match e {
                SignatureError::VerificationFailed => LICENSE_ILLEGAL,
                SignatureError::MalformedKey | SignatureError::MalformedSignature => INVALID_ARG,
                SignatureError::UnsupportedAlgorithm(_) => INTERNAL_ERROR,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_are_disjoint() {
        assert!(EVLOOP_PERFORM_FAILED < NETWORKING_BASE);
        assert!(SET_SOCKET_FLAG_FAILED < DTLS_BASE);
        assert!(SOCKET_LISTEN_FAILED < UTILS_BASE);
    }

    #[test]
    fn unknown_codes_fail() {
        assert_eq!(outcome(SUCCESS), Outcome::Success);
        assert_eq!(outcome(EVLOOP_PERFORM_NEED_RETRY), Outcome::RetryLater);
        assert_eq!(outcome(0x7fff_0001), Outcome::Failed);
        assert!(!succeeded(0x7fff_0001));
    }

    #[test]
    fn error_round_trips_through_status() {
        assert_eq!(outcome(Error::WouldBlock.status()), Outcome::RetryLater);
        assert_eq!(outcome(Error::Closed.status()), Outcome::Failed);
        assert_eq!(outcome(Error::PeerClosed.status()), Outcome::Failed);
        assert_eq!(
            Error::from(CertificateError::InvalidKeyBits { bits: 7, rsa: true }).status(),
            SSL_INVALID_CERTIFICATE_BITS
        );
    }
}
