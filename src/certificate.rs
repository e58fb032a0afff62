//! Ephemeral self-signed certificates for DTLS identity.
//!
//! A [`DtlsCertificate`] holds a certificate and its private key together.
//! Peers are identified by the SHA-256 fingerprint of the certificate DER,
//! exchanged out of band, so the subject is a fixed synthetic name.

use std::fmt;
use std::str::FromStr;

use der::asn1::UtcTime;
use der::{Decode, Encode};
use p256::ecdsa::{DerSignature as P256Signature, SigningKey as P256SigningKey};
use p384::ecdsa::{DerSignature as P384Signature, SigningKey as P384SigningKey};
use pkcs8::{DecodePrivateKey, EncodePrivateKey};
use rand::rngs::OsRng;
use rand::Rng;
use rsa::pkcs1v15::{Signature as RsaSignature, SigningKey as RsaSigningKey};
use rsa::RsaPrivateKey;
use signature::Keypair;
use sha2::{Digest, Sha256};
use spki::{EncodePublicKey, ObjectIdentifier, SubjectPublicKeyInfoOwned};
use thiserror::Error;
use x509_cert::builder::{Builder, CertificateBuilder, Profile};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::{Time, Validity};
use x509_cert::Certificate;
use zeroize::Zeroizing;

use crate::error::ErrorKind;
use crate::time::{self, HUNDREDS_OF_NANOS_IN_A_DAY};

/// Organization and common name of every generated certificate.
pub const CERTIFICATE_NAME: &str = "LITE-WebRTC-Client";

/// Certificate lifetime in days.
pub const VALIDITY_DAYS: u64 = 365;

pub const MIN_SERIAL_LEN: usize = 8;
pub const MAX_SERIAL_LEN: usize = 20;

const RSA_MIN_BITS: usize = 1024;
const RSA_MAX_BITS: usize = 4096;

const OID_COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");

/// Certificate error types
#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("Unsupported key size: {bits} bits (rsa: {rsa})")]
    InvalidKeyBits { bits: usize, rsa: bool },

    #[error("Serial number length {0} outside [8, 20]")]
    InvalidSerialLength(usize),

    #[error("RSA key generation failed: {0}")]
    KeyGeneration(#[from] rsa::Error),

    #[error("Private key encoding failed: {0}")]
    PrivateKey(#[from] pkcs8::Error),

    #[error("Public key encoding failed: {0}")]
    PublicKey(#[from] spki::Error),

    #[error("DER encoding failed: {0}")]
    Encoding(#[from] der::Error),

    #[error("Certificate signing failed: {0}")]
    Build(#[from] x509_cert::builder::Error),

    #[error("Invalid certificate format")]
    InvalidFormat,
}

impl CertificateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CertificateError::InvalidKeyBits { .. }
            | CertificateError::InvalidSerialLength(_)
            | CertificateError::InvalidFormat => ErrorKind::InvalidArgument,
            _ => ErrorKind::PlatformFailure,
        }
    }
}

/// Key algorithm of a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    Rsa,
    EcdsaP256,
    EcdsaP384,
}

/// Certificate and private key pair.
///
/// The two are created and dropped together. The private key is PKCS#8 DER
/// and is wiped from memory on drop.
#[derive(Clone)]
pub struct DtlsCertificate {
    certificate: Vec<u8>,
    private_key: Zeroizing<Vec<u8>>,
    parsed: Certificate,
    key_type: KeyType,
}

/// Generate a self-signed certificate with a random serial length.
///
/// `use_rsa` selects RSA with `key_bits` in `1024..=4096`. Otherwise
/// `key_bits` picks the curve: 256 for P-256, 384 for P-384.
pub fn generate(key_bits: usize, use_rsa: bool) -> Result<DtlsCertificate, CertificateError> {
    let serial_len = OsRng.gen_range(MIN_SERIAL_LEN..=MAX_SERIAL_LEN);
    generate_with_serial_len(key_bits, use_rsa, serial_len)
}

/// Generate a self-signed certificate with a serial number of exactly
/// `serial_len` bytes.
pub fn generate_with_serial_len(
    key_bits: usize,
    use_rsa: bool,
    serial_len: usize,
) -> Result<DtlsCertificate, CertificateError> {
    if !(MIN_SERIAL_LEN..=MAX_SERIAL_LEN).contains(&serial_len) {
        return Err(CertificateError::InvalidSerialLength(serial_len));
    }

    let key_type = match (use_rsa, key_bits) {
        (true, RSA_MIN_BITS..=RSA_MAX_BITS) => KeyType::Rsa,
        (false, 256) => KeyType::EcdsaP256,
        (false, 384) => KeyType::EcdsaP384,
        _ => {
            return Err(CertificateError::InvalidKeyBits {
                bits: key_bits,
                rsa: use_rsa,
            })
        }
    };

    debug!(
        "Generating {:?} certificate, {} bits, {} byte serial",
        key_type, key_bits, serial_len
    );

    let serial = random_serial(serial_len)?;
    let validity = validity_from(time::now())?;
    let subject = Name::from_str(&format!("CN={0},O={0}", CERTIFICATE_NAME))?;
    // Self-signed: the issuer is the subject.
    let profile = Profile::Manual { issuer: None };

    let (cert_der, private_key) = match key_type {
        KeyType::Rsa => {
            let key = RsaPrivateKey::new(&mut OsRng, key_bits)?;
            let private_key = key.to_pkcs8_der()?;
            let signer = RsaSigningKey::<Sha256>::new(key);
            let spki = public_key_info(&Keypair::verifying_key(&signer))?;
            let builder = CertificateBuilder::new(profile, serial, validity, subject, spki, &signer)?;
            let cert = builder.build::<RsaSignature>()?;
            (cert.to_der()?, private_key)
        }
        KeyType::EcdsaP256 => {
            let signer = P256SigningKey::random(&mut OsRng);
            let private_key = signer.to_pkcs8_der()?;
            let spki = public_key_info(signer.verifying_key())?;
            let builder = CertificateBuilder::new(profile, serial, validity, subject, spki, &signer)?;
            let cert = builder.build::<P256Signature>()?;
            (cert.to_der()?, private_key)
        }
        KeyType::EcdsaP384 => {
            let signer = P384SigningKey::random(&mut OsRng);
            let private_key = signer.to_pkcs8_der()?;
            let spki = public_key_info(signer.verifying_key())?;
            let builder = CertificateBuilder::new(profile, serial, validity, subject, spki, &signer)?;
            let cert = builder.build::<P384Signature>()?;
            (cert.to_der()?, private_key)
        }
    };

    // Parse what we encoded. Only a certificate that survives the round
    // trip is handed out.
    let parsed = Certificate::from_der(&cert_der)?;

    Ok(DtlsCertificate {
        certificate: cert_der,
        private_key: Zeroizing::new(private_key.as_bytes().to_vec()),
        parsed,
        key_type,
    })
}

/// Generate a self-signed ECDSA P-256 certificate for DTLS
pub fn generate_self_signed_certificate() -> Result<DtlsCertificate, CertificateError> {
    generate(256, false)
}

/// Calculate a certificate fingerprint using SHA-256
pub fn calculate_fingerprint(cert_der: &[u8]) -> Vec<u8> {
    Sha256::digest(cert_der).to_vec()
}

/// Format a fingerprint as a colon-separated hex string
/// Example: "AF:12:F6:..."
pub fn format_fingerprint(fingerprint: &[u8]) -> String {
    fingerprint
        .iter()
        .map(|byte| format!("{:02X}", byte))
        .collect::<Vec<String>>()
        .join(":")
}

// Big-endian positive integer of exactly `len` bytes. The top bit of the
// first byte is cleared and the byte is never zero, so DER needs neither a
// sign pad nor leading zero stripping.
fn random_serial(len: usize) -> Result<SerialNumber, CertificateError> {
    let mut bytes = vec![0u8; len];
    OsRng.fill(&mut bytes[..]);
    bytes[0] = (bytes[0] & 0x7f).max(1);
    Ok(SerialNumber::new(&bytes)?)
}

fn validity_from(now_ticks: u64) -> Result<Validity, CertificateError> {
    let not_before = time::truncate_to_seconds(now_ticks);
    let not_after = not_before + VALIDITY_DAYS * HUNDREDS_OF_NANOS_IN_A_DAY;

    let to_time = |ticks: u64| -> Result<Time, der::Error> {
        let d = time::to_duration(ticks).unwrap_or_default();
        Ok(Time::UtcTime(UtcTime::from_unix_duration(d)?))
    };

    Ok(Validity {
        not_before: to_time(not_before)?,
        not_after: to_time(not_after)?,
    })
}

fn public_key_info<K: EncodePublicKey>(key: &K) -> Result<SubjectPublicKeyInfoOwned, CertificateError> {
    let doc = key.to_public_key_der()?;
    Ok(SubjectPublicKeyInfoOwned::from_der(doc.as_bytes())?)
}

impl DtlsCertificate {
    /// Load an existing certificate and PKCS#8 private key, both DER.
    pub fn from_der(certificate: &[u8], private_key: &[u8]) -> Result<Self, CertificateError> {
        let parsed =
            Certificate::from_der(certificate).map_err(|_| CertificateError::InvalidFormat)?;

        let key_type = if P256SigningKey::from_pkcs8_der(private_key).is_ok() {
            KeyType::EcdsaP256
        } else if P384SigningKey::from_pkcs8_der(private_key).is_ok() {
            KeyType::EcdsaP384
        } else if RsaPrivateKey::from_pkcs8_der(private_key).is_ok() {
            KeyType::Rsa
        } else {
            return Err(CertificateError::InvalidFormat);
        };

        Ok(DtlsCertificate {
            certificate: certificate.to_vec(),
            private_key: Zeroizing::new(private_key.to_vec()),
            parsed,
            key_type,
        })
    }

    /// Certificate in DER format.
    #[inline(always)]
    pub fn certificate_der(&self) -> &[u8] {
        &self.certificate
    }

    /// Private key in PKCS#8 DER format.
    #[inline(always)]
    pub fn private_key_der(&self) -> &[u8] {
        &self.private_key
    }

    #[inline(always)]
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    /// The parsed certificate.
    pub fn parsed(&self) -> &Certificate {
        &self.parsed
    }

    /// Serial number bytes, big-endian.
    pub fn serial_number(&self) -> &[u8] {
        self.parsed.tbs_certificate.serial_number.as_bytes()
    }

    /// Subject common name, if any.
    pub fn common_name(&self) -> Option<String> {
        self.parsed
            .tbs_certificate
            .subject
            .0
            .iter()
            .flat_map(|rdn| rdn.0.iter())
            .find(|atv| atv.oid == OID_COMMON_NAME)
            .map(|atv| String::from_utf8_lossy(atv.value.value()).into_owned())
    }

    /// `(not_before, not_after)` in 100 ns ticks since the Unix epoch.
    pub fn validity_ticks(&self) -> (u64, u64) {
        let v = &self.parsed.tbs_certificate.validity;
        (
            time::from_duration(v.not_before.to_unix_duration()),
            time::from_duration(v.not_after.to_unix_duration()),
        )
    }

    /// Returns the certificate fingerprint as raw bytes.
    ///
    /// The fingerprint is computed by hashing the DER-encoded certificate
    /// with SHA-256 and is therefore 32 bytes long.
    pub fn fingerprint(&self) -> Vec<u8> {
        calculate_fingerprint(&self.certificate)
    }

    /// Returns the certificate fingerprint as a human-readable string.
    ///
    /// The string is the SHA-256 fingerprint formatted as uppercase
    /// hex byte pairs separated by colons, for example "AF:12:F6:...".
    pub fn fingerprint_str(&self) -> String {
        format_fingerprint(&self.fingerprint())
    }
}

impl fmt::Debug for DtlsCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DtlsCertificate")
            .field("key_type", &self.key_type)
            .field("certificate", &self.certificate.len())
            .field("fingerprint", &self.fingerprint_str())
            .finish()
    }
}
