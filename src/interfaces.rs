//! Local interface addresses, for gathering host candidates.

use nix::ifaddrs::getifaddrs;
use nix::net::if_::InterfaceFlags;

use crate::address::Endpoint;
use crate::Error;

/// Addresses of every running, non-loopback interface.
///
/// `filter` gets the interface name and drops the interface by returning
/// `false`. At most `max` endpoints are returned, all with port 0. Endpoints
/// on point-to-point interfaces (VPN tunnels) are flagged as such.
pub fn local_addresses<F>(mut filter: Option<F>, max: usize) -> Result<Vec<Endpoint>, Error>
where
    F: FnMut(&str) -> bool,
{
    if max == 0 {
        return Err(Error::InvalidArgument("max must be non-zero"));
    }

    let addrs = getifaddrs().map_err(|e| Error::from(std::io::Error::from(e)))?;

    let mut out = Vec::new();

    for ifa in addrs {
        if out.len() >= max {
            break;
        }

        if ifa.flags.contains(InterfaceFlags::IFF_LOOPBACK)
            || !ifa.flags.contains(InterfaceFlags::IFF_RUNNING)
        {
            continue;
        }

        let Some(storage) = ifa.address else {
            continue;
        };

        let Ok(endpoint) = Endpoint::from_storage(&storage) else {
            // AF_PACKET and friends.
            continue;
        };

        if let Some(f) = filter.as_mut() {
            if !f(&ifa.interface_name) {
                trace!("Interface {} filtered out", ifa.interface_name);
                continue;
            }
        }

        let p2p = ifa.flags.contains(InterfaceFlags::IFF_POINTOPOINT);
        let endpoint = endpoint.with_port(0).with_point_to_point(p2p);

        debug!("Local address {} on {}", endpoint, ifa.interface_name);
        out.push(endpoint);
    }

    Ok(out)
}
