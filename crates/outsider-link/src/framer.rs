//! Packet framing over a byte stream
//!
//! A hidraw node hands back one report per read, but pipes and sockets used
//! for simulation may split or join packets arbitrarily. [`PacketFramer`]
//! accumulates bytes and cuts them into 64-byte packets.

use outsider_protocol::{Packet, PACKET_LEN};
use tracing::warn;

/// Packets kept before the oldest are discarded
const MAX_BUFFERED_PACKETS: usize = 16;

/// Streaming packet accumulator
#[derive(Debug, Default)]
pub struct PacketFramer {
    buffer: Vec<u8>,
}

impl PacketFramer {
    /// Create an empty framer
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(PACKET_LEN * 2),
        }
    }

    /// Append bytes read from the stream
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);

        // Prevent unbounded growth if nobody is reading; drop whole packets
        // so the remainder stays aligned
        let limit = PACKET_LEN * MAX_BUFFERED_PACKETS;
        if self.buffer.len() > limit {
            let excess = self.buffer.len() - limit;
            let drop = excess.div_ceil(PACKET_LEN) * PACKET_LEN;
            warn!("Packet buffer full, discarding {} bytes", drop);
            self.buffer.drain(..drop);
        }
    }

    /// Take the next complete packet, if one is buffered
    pub fn next_packet(&mut self) -> Option<Packet> {
        if self.buffer.len() < PACKET_LEN {
            return None;
        }
        let mut packet = Packet::zeroed();
        packet
            .as_bytes_mut()
            .copy_from_slice(&self.buffer[..PACKET_LEN]);
        self.buffer.drain(..PACKET_LEN);
        Some(packet)
    }

    /// Bytes of an incomplete packet waiting for more data
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Discard everything buffered
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
