//! DTLS-SRTP profiles and exported keying material (RFC 5764).

use std::ops::Deref;

use openssl::srtp::SrtpProfileId;
use zeroize::Zeroizing;

/// Label for exporting SRTP keying material from the session.
pub const DTLS_SRTP_EXPORTER_LABEL: &str = "EXTRACTOR-dtls_srtp";

/// Keying material used as master key for SRTP.
pub struct KeyingMaterial(Zeroizing<Vec<u8>>);

impl KeyingMaterial {
    pub(crate) fn new(m: Vec<u8>) -> Self {
        KeyingMaterial(Zeroizing::new(m))
    }
}

impl Deref for KeyingMaterial {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Debug for KeyingMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyingMaterial({} bytes)", self.0.len())
    }
}

/// Supported SRTP protection profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SrtpProfile {
    /// SRTP_AES128_CM_HMAC_SHA1_80 (RFC 5764)
    Aes128CmSha1_80,
    /// AEAD_AES_128_GCM (RFC 7714)
    AeadAes128Gcm,
}

impl SrtpProfile {
    /// All supported profiles ordered by preference.
    pub const ALL: &'static [SrtpProfile] =
        &[SrtpProfile::AeadAes128Gcm, SrtpProfile::Aes128CmSha1_80];

    /// The length of keying material to extract from the session in bytes.
    #[rustfmt::skip]
    pub fn keying_material_len(&self) -> usize {
        match self {
            // MASTER_KEY_LEN * 2 + MASTER_SALT * 2
            SrtpProfile::Aes128CmSha1_80 => 16 * 2 + 14 * 2,
            SrtpProfile::AeadAes128Gcm   => 16 * 2 + 12 * 2,
        }
    }

    /// What this profile is called by the engine.
    pub(crate) fn openssl_name(&self) -> &'static str {
        match self {
            SrtpProfile::Aes128CmSha1_80 => "SRTP_AES128_CM_SHA1_80",
            SrtpProfile::AeadAes128Gcm => "SRTP_AEAD_AES_128_GCM",
        }
    }

    pub(crate) fn from_openssl_id(id: SrtpProfileId) -> Option<SrtpProfile> {
        if id == SrtpProfileId::SRTP_AES128_CM_SHA1_80 {
            Some(SrtpProfile::Aes128CmSha1_80)
        } else if id == SrtpProfileId::SRTP_AEAD_AES_128_GCM {
            Some(SrtpProfile::AeadAes128Gcm)
        } else {
            None
        }
    }

    /// Profiles joined in the engine's `use_srtp` syntax.
    pub(crate) fn openssl_list(profiles: &[SrtpProfile]) -> String {
        profiles
            .iter()
            .map(|p| p.openssl_name())
            .collect::<Vec<_>>()
            .join(":")
    }
}

impl std::fmt::Display for SrtpProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.openssl_name())
    }
}
