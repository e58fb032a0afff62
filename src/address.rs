//! Platform independent endpoint representation.
//!
//! An [`Endpoint`] is a plain value: family, port, 16 raw address bytes and a
//! point-to-point flag. It converts to and from the native socket address
//! (`socket2::SockAddr`) and to and from text.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::str::FromStr;

use nix::sys::socket::{SockaddrLike, SockaddrStorage};
use socket2::SockAddr;

use crate::Error;

pub const IPV4_ADDRESS_LENGTH: usize = 4;
pub const IPV6_ADDRESS_LENGTH: usize = 16;

/// Address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Ipv4,
    Ipv6,
}

impl Family {
    /// Number of significant bytes in [`Endpoint::address`].
    pub fn address_len(&self) -> usize {
        match self {
            Family::Ipv4 => IPV4_ADDRESS_LENGTH,
            Family::Ipv6 => IPV6_ADDRESS_LENGTH,
        }
    }

    pub(crate) fn domain(&self) -> socket2::Domain {
        match self {
            Family::Ipv4 => socket2::Domain::IPV4,
            Family::Ipv6 => socket2::Domain::IPV6,
        }
    }
}

/// An IPv4 or IPv6 endpoint.
///
/// For IPv4 only the first 4 address bytes are used and the rest are always
/// zero. Equality and hashing look at family, port and address. The
/// point-to-point flag describes the interface an address was found on, not
/// the address, so it does not take part.
#[derive(Clone, Copy)]
pub struct Endpoint {
    family: Family,
    port: u16,
    address: [u8; 16],
    is_point_to_point: bool,
}

impl Endpoint {
    pub fn v4(octets: [u8; 4], port: u16) -> Self {
        let mut address = [0; 16];
        address[..IPV4_ADDRESS_LENGTH].copy_from_slice(&octets);
        Endpoint {
            family: Family::Ipv4,
            port,
            address,
            is_point_to_point: false,
        }
    }

    pub fn v6(octets: [u8; 16], port: u16) -> Self {
        Endpoint {
            family: Family::Ipv6,
            port,
            address: octets,
            is_point_to_point: false,
        }
    }

    /// Endpoint from family and raw bytes.
    ///
    /// `bytes` must hold exactly [`Family::address_len`] bytes.
    pub fn from_bytes(family: Family, bytes: &[u8], port: u16) -> Result<Self, Error> {
        if bytes.len() != family.address_len() {
            return Err(Error::InvalidArgument("address length does not match family"));
        }
        let mut address = [0; 16];
        address[..bytes.len()].copy_from_slice(bytes);
        Ok(Endpoint {
            family,
            port,
            address,
            is_point_to_point: false,
        })
    }

    /// Marks the endpoint as belonging to a point-to-point (VPN) interface.
    pub fn with_point_to_point(mut self, p2p: bool) -> Self {
        self.is_point_to_point = p2p;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[inline(always)]
    pub fn family(&self) -> Family {
        self.family
    }

    #[inline(always)]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The raw 16 byte address field.
    #[inline(always)]
    pub fn raw_address(&self) -> &[u8; 16] {
        &self.address
    }

    /// The significant address bytes (4 or 16).
    pub fn address(&self) -> &[u8] {
        &self.address[..self.family.address_len()]
    }

    #[inline(always)]
    pub fn is_point_to_point(&self) -> bool {
        self.is_point_to_point
    }

    pub fn ip(&self) -> IpAddr {
        match self.family {
            Family::Ipv4 => {
                let mut o = [0; 4];
                o.copy_from_slice(&self.address[..4]);
                IpAddr::V4(Ipv4Addr::from(o))
            }
            Family::Ipv6 => IpAddr::V6(Ipv6Addr::from(self.address)),
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip(), self.port)
    }

    /// Parse `a.b.c.d:port`, `[v6]:port` or a bare address (port 0).
    pub fn parse(text: &str) -> Result<Self, Error> {
        text.parse()
    }

    /// Native socket address for this endpoint.
    pub fn to_native(&self) -> SockAddr {
        SockAddr::from(self.socket_addr())
    }

    /// Endpoint from a native socket address.
    ///
    /// Only `AF_INET` and `AF_INET6` are accepted. An IPv6 address is only
    /// taken when the native storage holds a complete `sockaddr_in6`.
    pub fn from_native(addr: &SockAddr) -> Result<Self, Error> {
        match i32::from(addr.family()) {
            libc::AF_INET => addr
                .as_socket_ipv4()
                .map(Endpoint::from)
                .ok_or_else(|| Error::InvalidAddress("truncated sockaddr_in".into())),
            libc::AF_INET6 => addr
                .as_socket_ipv6()
                .map(Endpoint::from)
                .ok_or_else(|| Error::InvalidAddress("truncated sockaddr_in6".into())),
            family => Err(Error::UnsupportedFamily(family)),
        }
    }

    /// Endpoint from the address storage nix hands back.
    pub(crate) fn from_storage(addr: &SockaddrStorage) -> Result<Self, Error> {
        if let Some(v4) = addr.as_sockaddr_in() {
            return Ok(Endpoint::from(SocketAddrV4::from(*v4)));
        }
        if let Some(v6) = addr.as_sockaddr_in6() {
            return Ok(Endpoint::from(SocketAddrV6::from(*v6)));
        }
        let family = addr.family().map(|f| f as i32).unwrap_or(libc::AF_UNSPEC);
        Err(Error::UnsupportedFamily(family))
    }
}

impl PartialEq for Endpoint {
    fn eq(&self, other: &Self) -> bool {
        self.family == other.family && self.port == other.port && self.address == other.address
    }
}

impl Eq for Endpoint {}

impl Hash for Endpoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.family.hash(state);
        self.port.hash(state);
        self.address.hash(state);
    }
}

impl From<SocketAddrV4> for Endpoint {
    fn from(v: SocketAddrV4) -> Self {
        Endpoint::v4(v.ip().octets(), v.port())
    }
}

impl From<SocketAddrV6> for Endpoint {
    fn from(v: SocketAddrV6) -> Self {
        Endpoint::v6(v.ip().octets(), v.port())
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(v: SocketAddr) -> Self {
        match v {
            SocketAddr::V4(v) => v.into(),
            SocketAddr::V6(v) => v.into(),
        }
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(addr) = s.parse::<SocketAddr>() {
            return Ok(addr.into());
        }
        // Bare addresses, including "[::1]" without a port.
        let bare = s.strip_prefix('[').and_then(|v| v.strip_suffix(']')).unwrap_or(s);
        match bare.parse::<IpAddr>() {
            Ok(ip) => Ok(SocketAddr::new(ip, 0).into()),
            Err(_) => Err(Error::InvalidAddress(s.to_string())),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.socket_addr())
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("addr", &self.socket_addr())
            .field("p2p", &self.is_point_to_point)
            .finish()
    }
}
