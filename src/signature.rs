//! Detached signature verification for license and credential checks.

use der::Decode;
use p256::ecdsa::{Signature as P256Signature, VerifyingKey as P256VerifyingKey};
use p384::ecdsa::{Signature as P384Signature, VerifyingKey as P384VerifyingKey};
use rsa::pkcs1v15::{Signature as RsaSignature, VerifyingKey as RsaVerifyingKey};
use rsa::RsaPublicKey;
use sha2::{Digest, Sha256};
use signature::hazmat::PrehashVerifier;
use signature::Verifier;
use spki::{ObjectIdentifier, SubjectPublicKeyInfoRef};
use thiserror::Error;

use crate::error::ErrorKind;

const OID_RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const OID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const OID_P256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const OID_P384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");

const PEM_LABEL: &str = "PUBLIC KEY";

/// Why a signature was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("Malformed public key")]
    MalformedKey,

    #[error("Unsupported public key algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Malformed signature")]
    MalformedSignature,

    #[error("Signature verification failed")]
    VerificationFailed,
}

impl SignatureError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SignatureError::VerificationFailed => ErrorKind::ProtocolFailure,
            _ => ErrorKind::InvalidArgument,
        }
    }
}

/// Verify `signature` over the SHA-256 digest of `message`.
///
/// `public_key` is a SubjectPublicKeyInfo, DER or PEM ("PUBLIC KEY").
/// RSA keys take PKCS#1 v1.5 signatures. P-256 and P-384 keys take ECDSA
/// signatures, DER encoded or fixed-size `r || s`.
pub fn verify_signature(
    public_key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<(), SignatureError> {
    let pem;
    let key_der = if public_key.starts_with(b"-----BEGIN") {
        let (label, der) =
            der::pem::decode_vec(public_key).map_err(|_| SignatureError::MalformedKey)?;
        if label != PEM_LABEL {
            return Err(SignatureError::MalformedKey);
        }
        pem = der;
        &pem[..]
    } else {
        public_key
    };

    let spki = SubjectPublicKeyInfoRef::from_der(key_der).map_err(|_| SignatureError::MalformedKey)?;
    let hash = Sha256::digest(message);

    match spki.algorithm.oid {
        OID_RSA_ENCRYPTION => {
            let key = RsaPublicKey::try_from(spki).map_err(|_| SignatureError::MalformedKey)?;
            let sig =
                RsaSignature::try_from(signature).map_err(|_| SignatureError::MalformedSignature)?;
            RsaVerifyingKey::<Sha256>::new(key)
                .verify(message, &sig)
                .map_err(|_| SignatureError::VerificationFailed)
        }

        OID_EC_PUBLIC_KEY => {
            let curve = spki
                .algorithm
                .parameters_oid()
                .map_err(|_| SignatureError::MalformedKey)?;
            let point = spki
                .subject_public_key
                .as_bytes()
                .ok_or(SignatureError::MalformedKey)?;

            match curve {
                OID_P256 => {
                    let key = P256VerifyingKey::from_sec1_bytes(point)
                        .map_err(|_| SignatureError::MalformedKey)?;
                    let sig = P256Signature::from_der(signature)
                        .or_else(|_| P256Signature::from_slice(signature))
                        .map_err(|_| SignatureError::MalformedSignature)?;
                    key.verify_prehash(&hash, &sig)
                        .map_err(|_| SignatureError::VerificationFailed)
                }
                OID_P384 => {
                    let key = P384VerifyingKey::from_sec1_bytes(point)
                        .map_err(|_| SignatureError::MalformedKey)?;
                    let sig = P384Signature::from_der(signature)
                        .or_else(|_| P384Signature::from_slice(signature))
                        .map_err(|_| SignatureError::MalformedSignature)?;
                    key.verify_prehash(&hash, &sig)
                        .map_err(|_| SignatureError::VerificationFailed)
                }
                other => Err(SignatureError::UnsupportedAlgorithm(format!("EC curve {}", other))),
            }
        }

        other => Err(SignatureError::UnsupportedAlgorithm(other.to_string())),
    }
}
