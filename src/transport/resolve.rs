use std::net::ToSocketAddrs;

use crate::address::Endpoint;
use crate::Error;

/// Resolve `host` to every endpoint it maps to.
///
/// This blocks on the system resolver. Literal addresses resolve without a
/// lookup. The port defaults to zero. Duplicates are removed, order kept.
pub fn resolve(host: &str, port: Option<u16>) -> Result<Vec<Endpoint>, Error> {
    if host.is_empty() {
        return Err(Error::InvalidArgument("empty host name"));
    }
    if host.contains('\0') {
        return Err(Error::InvalidArgument("host name contains NUL"));
    }

    let port = port.unwrap_or(0);
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| Error::Resolve {
            host: host.to_string(),
            source,
        })?;

    let mut out: Vec<Endpoint> = Vec::new();
    for a in addrs {
        let e = Endpoint::from(a);
        if !out.contains(&e) {
            out.push(e);
        }
    }

    if out.is_empty() {
        return Err(Error::HostNotFound(host.to_string()));
    }

    trace!("Resolved {} to {:?}", host, out);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Family;

    #[test]
    fn literal_ipv4() {
        let r = resolve("127.0.0.1", Some(80)).unwrap();
        assert_eq!(r, vec![Endpoint::v4([127, 0, 0, 1], 80)]);
    }

    #[test]
    fn literal_ipv6() {
        let r = resolve("::1", None).unwrap();
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].family(), Family::Ipv6);
        assert_eq!(r[0].port(), 0);
    }

    #[test]
    fn localhost_resolves() {
        let r = resolve("localhost", Some(1)).unwrap();
        assert!(!r.is_empty());
        assert!(r.iter().all(|e| e.port() == 1));
    }

    #[test]
    fn bad_input() {
        assert!(matches!(resolve("", None), Err(Error::InvalidArgument(_))));
        assert!(matches!(resolve("a\0b", None), Err(Error::InvalidArgument(_))));
        assert!(resolve("no-such-host.invalid", None).is_err());
    }
}
