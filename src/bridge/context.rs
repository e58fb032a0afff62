use openssl::dh::Dh;
use openssl::pkey::PKey;
use openssl::ssl::{Ssl, SslContext, SslContextBuilder, SslMethod, SslOptions, SslVerifyMode};
use openssl::x509::X509;

use super::{Role, SrtpProfile};
use crate::certificate::DtlsCertificate;
use crate::config::{Config, PeerVerification, Protocol};
use crate::Error;

/// Engine context for one session.
pub(crate) fn create_context(config: &Config, cert: &DtlsCertificate) -> Result<SslContext, Error> {
    let method = match config.protocol() {
        Protocol::Dtls => SslMethod::dtls(),
        Protocol::Tls => SslMethod::tls(),
    };
    let mut ctx = SslContextBuilder::new(method)?;

    ctx.set_cipher_list(config.cipher_list())?;

    if config.protocol() == Protocol::Dtls && !config.srtp_profiles().is_empty() {
        ctx.set_tlsext_use_srtp(&SrtpProfile::openssl_list(config.srtp_profiles()))?;
    }

    match config.verification() {
        PeerVerification::None => {
            ctx.set_verify(SslVerifyMode::NONE);
        }
        PeerVerification::AcceptAny => {
            let mut mode = SslVerifyMode::empty();
            mode.insert(SslVerifyMode::PEER);
            mode.insert(SslVerifyMode::FAIL_IF_NO_PEER_CERT);
            // Identity is the fingerprint, checked by the caller.
            ctx.set_verify_callback(mode, |_ok, _ctx| true);
        }
        PeerVerification::Chain => {
            ctx.set_default_verify_paths()?;
            ctx.set_verify(SslVerifyMode::PEER | SslVerifyMode::FAIL_IF_NO_PEER_CERT);
        }
    }

    let x509 = X509::from_der(cert.certificate_der())?;
    let pkey = PKey::private_key_from_pkcs8(cert.private_key_der())?;
    ctx.set_private_key(&pkey)?;
    ctx.set_certificate(&x509)?;
    ctx.check_private_key()?;

    let mut options = SslOptions::empty();
    options.insert(SslOptions::SINGLE_ECDH_USE);
    if config.protocol() == Protocol::Dtls {
        options.insert(SslOptions::NO_DTLSV1);
        // Keep the MTU we set, the conduit has no datagram MTU to query.
        options.insert(SslOptions::NO_QUERY_MTU);
    }
    ctx.set_options(options);

    // DHE suites in the cipher list need parameters.
    let dh = Dh::get_2048_256()?;
    ctx.set_tmp_dh(&dh)?;

    Ok(ctx.build())
}

/// Engine state for one side of a connection.
pub(crate) fn create_ssl(
    ctx: &SslContext,
    config: &Config,
    role: Role,
    hostname: Option<&str>,
) -> Result<Ssl, Error> {
    let mut ssl = Ssl::new(ctx)?;

    if config.protocol() == Protocol::Dtls {
        ssl.set_mtu(config.mtu() as u32)?;
    }

    match role {
        Role::Client => {
            if let Some(host) = hostname {
                if config.protocol() == Protocol::Tls {
                    ssl.set_hostname(host)?;
                }
                if config.verification() == PeerVerification::Chain {
                    ssl.param_mut().set_host(host)?;
                }
            }
            ssl.set_connect_state();
        }
        Role::Server => ssl.set_accept_state(),
    }

    Ok(ssl)
}
