use crate::frame::StreamFrame;
use crate::packet_header::PacketHeader;
use anyhow::bail;
use std::time::Duration;

/// Default UDP port of the receiving endpoint.
pub const PORT_RECEIVER: u16 = 3492;
/// Default UDP port of the sending endpoint.
pub const PORT_SENDER: u16 = 33336;

pub struct TransportConfig {
    /// Upper bound on the number of concurrently open streams per connection.
    pub max_streams: usize,

    /// Advisory lower bound on a transmitted datagram. The scheduler stops
    ///  packing frames into a packet once the remaining budget falls below
    ///  what a useful frame needs, and stream senders hold back buffered
    ///  data smaller than this until more arrives or the stream is finished.
    ///  A packet carrying a single small FIN frame is still transmitted;
    ///  there is no padding.
    pub min_packet_size: usize,

    /// Hard upper bound on a full datagram, including the packet header and
    ///  all frames. Choosing this larger than the path MTU causes IP-level
    ///  fragmentation or drops, choosing it too small wastes bandwidth on
    ///  per-packet header overhead.
    pub max_packet_size: usize,

    /// How long the receive loop waits for a datagram before treating the
    ///  connection as ended. There is no explicit close handshake, so this
    ///  doubles as the end-of-connection heuristic.
    pub receive_timeout: Duration,

    /// How long the send loop sleeps when no stream had anything to send.
    pub send_idle_delay: Duration,
}

impl TransportConfig {
    /// Defaults for a loopback transfer between the two well-known ports.
    pub fn default_loopback() -> TransportConfig {
        TransportConfig {
            max_streams: 5,
            min_packet_size: 1000,
            max_packet_size: 2000,
            receive_timeout: Duration::from_secs(100),
            send_idle_delay: Duration::from_millis(1),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_streams == 0 {
            bail!("at least one stream is required");
        }
        if self.max_packet_size <= PacketHeader::SERIALIZED_LEN + StreamFrame::HEADER_SIZE {
            bail!("max packet size of {} cannot fit a packet header and a frame", self.max_packet_size);
        }
        if self.min_packet_size > self.max_packet_size {
            bail!("min packet size of {} exceeds max packet size of {}", self.min_packet_size, self.max_packet_size);
        }

        Ok(())
    }

    /// Per-frame payload floor derived from the advisory minimum packet
    ///  size: the scheduler stops offering budgets below this, and senders
    ///  do not emit non-final frames smaller than this.
    pub fn min_frame_payload(&self) -> usize {
        self.min_packet_size.saturating_sub(StreamFrame::HEADER_SIZE)
    }

    /// The frame budget of an empty packet.
    pub fn frame_budget(&self) -> usize {
        self.max_packet_size - PacketHeader::SERIALIZED_LEN
    }
}
