//! Datagram link to the companion supervisory process.
//!
//! The supervisor exchanges small status and command datagrams with the
//! acquisition client over a local socket. This is a thin, fully blocking
//! wrapper: configuration parsing never suspends, and neither does the
//! link.

use std::io;
use std::net::{SocketAddr, UdpSocket};

use bytes::Bytes;
use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Receive buffer requested for the link socket.
const DEFAULT_RCVBUF: usize = 1 << 16;

/// Largest datagram exchanged with the supervisor.
pub const MAX_DATAGRAM: usize = 1500;

/// Errors raised by the supervisory link.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("datagram exceeds {MAX_DATAGRAM} bytes")]
    Oversize,
}

/// Blocking datagram channel to the supervisory process.
#[derive(Debug)]
pub struct SupervisorLink {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl SupervisorLink {
    /// Bind a local socket and connect it to the supervisor's address.
    pub fn open(local: SocketAddr, peer: SocketAddr) -> Result<Self, LinkError> {
        let domain = match local {
            SocketAddr::V4(_) => Domain::IPV4,
            SocketAddr::V6(_) => Domain::IPV6,
        };
        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        if let Err(err) = socket.set_recv_buffer_size(DEFAULT_RCVBUF) {
            warn!(?err, "failed to set link receive buffer");
        }
        socket.bind(&local.into())?;
        let socket: UdpSocket = socket.into();
        socket.connect(peer)?;
        info!(local = %socket.local_addr()?, %peer, "supervisor link open");
        Ok(SupervisorLink { socket, peer })
    }

    /// Send one datagram to the supervisor.
    pub fn send(&self, payload: &[u8]) -> Result<(), LinkError> {
        if payload.len() > MAX_DATAGRAM {
            return Err(LinkError::Oversize);
        }
        self.socket.send(payload)?;
        debug!(bytes = payload.len(), "sent supervisor datagram");
        Ok(())
    }

    /// Block until the next datagram from the supervisor arrives.
    pub fn recv(&self) -> Result<Bytes, LinkError> {
        let mut buf = [0u8; MAX_DATAGRAM];
        let len = self.socket.recv(&mut buf)?;
        debug!(bytes = len, "received supervisor datagram");
        Ok(Bytes::copy_from_slice(&buf[..len]))
    }

    pub fn local_addr(&self) -> Result<SocketAddr, LinkError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn any_local() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
    }

    #[test]
    fn round_trip_with_a_peer_socket() {
        let supervisor = UdpSocket::bind(any_local()).unwrap();
        let link = SupervisorLink::open(any_local(), supervisor.local_addr().unwrap()).unwrap();

        link.send(b"status?").unwrap();
        let mut buf = [0u8; MAX_DATAGRAM];
        let (len, from) = supervisor.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"status?");
        assert_eq!(from, link.local_addr().unwrap());

        supervisor.send_to(b"ok", from).unwrap();
        let reply = link.recv().unwrap();
        assert_eq!(reply.as_ref(), b"ok");
    }

    #[test]
    fn oversize_payload_is_rejected_before_send() {
        let supervisor = UdpSocket::bind(any_local()).unwrap();
        let link = SupervisorLink::open(any_local(), supervisor.local_addr().unwrap()).unwrap();
        let payload = vec![0u8; MAX_DATAGRAM + 1];
        assert!(matches!(link.send(&payload), Err(LinkError::Oversize)));
    }
}
