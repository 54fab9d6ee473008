use crate::error::{Result, TransportError};
use crate::packet_id::PacketId;
use bytes::{Buf, BufMut};
use bytes_varint::try_get_fixed::TryGetFixedSupport;
use std::fmt::{Debug, Display, Formatter};

/// Opaque 8-byte tag identifying the connection a packet belongs to. Both
///  endpoints agree on it out of band; it is never interpreted beyond
///  equality.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const SERIALIZED_LEN: usize = 8;

    pub fn from_raw(value: u64) -> ConnectionId {
        ConnectionId(value)
    }

    pub fn to_raw(&self) -> u64 {
        self.0
    }
}

impl Display for ConnectionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}
impl Debug for ConnectionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

/// The fixed-width header at the start of every datagram - all numbers in
///  network byte order:
/// ```ascii
/// 0: packet number (u64)
/// 8: connection id (u64)
/// ```
#[derive(Clone, Eq, PartialEq)]
pub struct PacketHeader {
    pub packet_number: PacketId,
    pub connection_id: ConnectionId,
}

impl Debug for PacketHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PCKT{{#{}@{}}}", self.packet_number, self.connection_id)
    }
}

impl PacketHeader {
    pub const SERIALIZED_LEN: usize = 8 + ConnectionId::SERIALIZED_LEN;

    pub fn new(packet_number: PacketId, connection_id: ConnectionId) -> PacketHeader {
        PacketHeader {
            packet_number,
            connection_id,
        }
    }

    pub fn ser(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.packet_number.to_raw());
        buf.put_u64(self.connection_id.to_raw());
    }

    pub fn deser(buf: &mut impl Buf) -> Result<PacketHeader> {
        let packet_number = buf.try_get_u64().map_err(|_| TransportError::TruncatedHeader)?;
        let connection_id = buf.try_get_u64().map_err(|_| TransportError::TruncatedHeader)?;

        Ok(PacketHeader {
            packet_number: PacketId::from_raw(packet_number),
            connection_id: ConnectionId::from_raw(connection_id),
        })
    }
}
