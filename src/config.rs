use crate::bridge::SrtpProfile;
use crate::certificate::DtlsCertificate;
use crate::Error;

/// Smallest MTU we accept. Handshake flights must still fit.
const MIN_MTU: usize = 256;

const DEFAULT_CIPHER_LIST: &str = "ECDHE+AESGCM:DHE+AESGCM:ECDHE+AES256:DHE+AES256";

/// Record protocol spoken by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// TLS over a stream transport.
    Tls,
    /// DTLS over a datagram transport.
    Dtls,
}

/// How the peer certificate is checked during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerVerification {
    /// Do not request or verify a peer certificate chain.
    None,
    /// Request the peer certificate and accept whatever is presented.
    ///
    /// Trust comes from comparing [`Session::peer_fingerprint`] against a
    /// fingerprint received out of band.
    ///
    /// [`Session::peer_fingerprint`]: crate::Session::peer_fingerprint
    AcceptAny,
    /// Verify the chain against the system trust store, and the hostname for
    /// clients.
    Chain,
}

/// Session configuration
#[derive(Clone)]
pub struct Config {
    protocol: Protocol,
    verification: PeerVerification,
    certificate: Option<DtlsCertificate>,
    srtp_profiles: Vec<SrtpProfile>,
    mtu: usize,
    close_notify_retries: usize,
    cipher_list: String,
}

impl Config {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            protocol: Protocol::Dtls,
            verification: PeerVerification::None,
            certificate: None,
            srtp_profiles: vec![SrtpProfile::AeadAes128Gcm, SrtpProfile::Aes128CmSha1_80],
            mtu: 1150,
            close_notify_retries: 8,
            cipher_list: DEFAULT_CIPHER_LIST.to_string(),
        }
    }

    #[inline(always)]
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    #[inline(always)]
    pub fn verification(&self) -> PeerVerification {
        self.verification
    }

    /// Local certificate, if one was configured.
    ///
    /// A session without one generates an ephemeral certificate on start.
    #[inline(always)]
    pub fn certificate(&self) -> Option<&DtlsCertificate> {
        self.certificate.as_ref()
    }

    /// DTLS-SRTP profiles offered, in preference order. Empty disables
    /// the `use_srtp` extension.
    #[inline(always)]
    pub fn srtp_profiles(&self) -> &[SrtpProfile] {
        &self.srtp_profiles
    }

    /// Max transmission unit.
    ///
    /// The largest datagram the engine will produce. Only used for DTLS.
    #[inline(always)]
    pub fn mtu(&self) -> usize {
        self.mtu
    }

    /// Max attempts at flushing close notify when a session is closed.
    #[inline(always)]
    pub fn close_notify_retries(&self) -> usize {
        self.close_notify_retries
    }

    /// Cipher list in engine syntax.
    #[inline(always)]
    pub fn cipher_list(&self) -> &str {
        &self.cipher_list
    }
}

/// Builder for session configuration.
pub struct ConfigBuilder {
    protocol: Protocol,
    verification: PeerVerification,
    certificate: Option<DtlsCertificate>,
    srtp_profiles: Vec<SrtpProfile>,
    mtu: usize,
    close_notify_retries: usize,
    cipher_list: String,
}

impl ConfigBuilder {
    /// Set the record protocol.
    ///
    /// Defaults to [`Protocol::Dtls`].
    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Set how the peer certificate is verified.
    ///
    /// Defaults to [`PeerVerification::None`].
    pub fn verification(mut self, verification: PeerVerification) -> Self {
        self.verification = verification;
        self
    }

    /// Set the local certificate.
    pub fn certificate(mut self, certificate: DtlsCertificate) -> Self {
        self.certificate = Some(certificate);
        self
    }

    /// Set the DTLS-SRTP profiles to offer.
    ///
    /// Defaults to AEAD_AES_128_GCM then AES128_CM_SHA1_80.
    pub fn srtp_profiles(mut self, profiles: &[SrtpProfile]) -> Self {
        self.srtp_profiles = profiles.to_vec();
        self
    }

    /// Set the max transmission unit (MTU).
    ///
    /// Defaults to 1150.
    pub fn mtu(mut self, mtu: usize) -> Self {
        self.mtu = mtu;
        self
    }

    /// Set the max attempts at flushing close notify.
    ///
    /// Defaults to 8.
    pub fn close_notify_retries(mut self, retries: usize) -> Self {
        self.close_notify_retries = retries;
        self
    }

    /// Set the cipher list.
    pub fn cipher_list(mut self, list: &str) -> Self {
        self.cipher_list = list.to_string();
        self
    }

    /// Build the configuration.
    ///
    /// Returns `Error::InvalidArgument` for an MTU below 256, a zero close
    /// notify retry bound, duplicate SRTP profiles or an empty cipher list.
    pub fn build(self) -> Result<Config, Error> {
        if self.mtu < MIN_MTU {
            return Err(Error::InvalidArgument("mtu below 256"));
        }
        if self.close_notify_retries == 0 {
            return Err(Error::InvalidArgument("close_notify_retries must be non-zero"));
        }
        for (i, p) in self.srtp_profiles.iter().enumerate() {
            if self.srtp_profiles[..i].contains(p) {
                return Err(Error::InvalidArgument("duplicate SRTP profile"));
            }
        }
        if self.cipher_list.is_empty() {
            return Err(Error::InvalidArgument("empty cipher list"));
        }

        Ok(self.into_config())
    }

    fn into_config(self) -> Config {
        Config {
            protocol: self.protocol,
            verification: self.verification,
            certificate: self.certificate,
            srtp_profiles: self.srtp_profiles,
            mtu: self.mtu,
            close_notify_retries: self.close_notify_retries,
            cipher_list: self.cipher_list,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        // The builder defaults are valid by construction.
        Config::builder().into_config()
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("protocol", &self.protocol)
            .field("verification", &self.verification)
            .field("certificate", &self.certificate.as_ref().map(|c| c.key_type()))
            .field("srtp_profiles", &self.srtp_profiles)
            .field("mtu", &self.mtu)
            .field("close_notify_retries", &self.close_notify_retries)
            .finish()
    }
}
