//! Peer multiaddress handling.
//!
//! The client is given a full peer address such as
//! `/ip4/10.0.0.2/tcp/4001/p2p/12D3KooW...`. The trailing `/p2p/<peer-id>`
//! component names the peer; everything before it is what gets dialed.

use std::fmt;
use std::net::IpAddr;

use libp2p::multiaddr::{self, Protocol};
use libp2p::{Multiaddr, PeerId};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum AddrError {
    /// The string is not a multiaddress at all.
    #[error("invalid multiaddress {input:?}: {source}")]
    InvalidMultiaddr {
        input: String,
        #[source]
        source: multiaddr::Error,
    },

    /// The multiaddress parsed but does not end in `/p2p/<peer-id>`.
    #[error("multiaddress {0} does not end in /p2p/<peer-id>")]
    MissingPeerId(Multiaddr),
}

// ---------------------------------------------------------------------------
// PeerAddr
// ---------------------------------------------------------------------------

/// A dialable address paired with the identity expected behind it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerAddr {
    pub peer_id: PeerId,
    /// Transport address with the `/p2p` suffix removed.
    pub addr: Multiaddr,
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", with_peer_id(&self.addr, self.peer_id))
    }
}

/// Parse a peer multiaddress that must end in `/p2p/<peer-id>`.
pub fn parse_peer_addr(input: &str) -> Result<PeerAddr, AddrError> {
    let mut addr: Multiaddr = input
        .trim()
        .parse()
        .map_err(|source| AddrError::InvalidMultiaddr {
            input: input.to_string(),
            source,
        })?;

    match addr.pop() {
        Some(Protocol::P2p(peer_id)) => Ok(PeerAddr { peer_id, addr }),
        Some(other) => {
            addr.push(other);
            Err(AddrError::MissingPeerId(addr))
        }
        None => Err(AddrError::MissingPeerId(addr)),
    }
}

/// Append `/p2p/<peer>` to `addr` unless it already carries a peer ID.
pub fn with_peer_id(addr: &Multiaddr, peer: PeerId) -> Multiaddr {
    match addr.iter().last() {
        Some(Protocol::P2p(_)) => addr.clone(),
        _ => addr.clone().with(Protocol::P2p(peer)),
    }
}

/// Build the listen addresses for the enabled transports. TCP and QUIC share
/// the same port number.
pub fn listen_addrs(ip: IpAddr, port: u16, tcp: bool, quic: bool) -> Vec<Multiaddr> {
    let base = Multiaddr::empty().with(match ip {
        IpAddr::V4(v4) => Protocol::Ip4(v4),
        IpAddr::V6(v6) => Protocol::Ip6(v6),
    });

    let mut addrs = Vec::with_capacity(2);
    if tcp {
        addrs.push(base.clone().with(Protocol::Tcp(port)));
    }
    if quic {
        addrs.push(base.with(Protocol::Udp(port)).with(Protocol::QuicV1));
    }
    addrs
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
