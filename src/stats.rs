use crate::stream_id::StreamId;
use rustc_hash::FxHashMap;
use std::time::{Duration, Instant};

/// Byte and packet totals for a single stream. A packet counts once for
///  every stream it carried frames for.
#[derive(Clone, Copy, Default, Eq, PartialEq, Debug)]
pub struct StreamStats {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub packets_sent: u64,
    pub packets_received: u64,
}

/// Connection-wide counters, updated by the scheduler and the dispatcher.
pub struct StatsCollector {
    started_at: Instant,
    per_stream: FxHashMap<StreamId, StreamStats>,
    packets_sent: u64,
    packets_received: u64,
    dropped_datagrams: u64,
    stream_errors: u64,
}

impl StatsCollector {
    pub fn new() -> StatsCollector {
        StatsCollector {
            started_at: Instant::now(),
            per_stream: FxHashMap::default(),
            packets_sent: 0,
            packets_received: 0,
            dropped_datagrams: 0,
            stream_errors: 0,
        }
    }

    pub fn on_packet_sent(&mut self) {
        self.packets_sent += 1;
    }

    pub fn on_packet_received(&mut self) {
        self.packets_received += 1;
    }

    /// one call per stream per packet, with the stream's payload bytes in that packet
    pub fn on_stream_data_sent(&mut self, stream_id: StreamId, payload_bytes: u64) {
        let stats = self.per_stream.entry(stream_id).or_default();
        stats.bytes_sent += payload_bytes;
        stats.packets_sent += 1;
    }

    /// one call per stream per packet, with the stream's payload bytes in that packet
    pub fn on_stream_data_received(&mut self, stream_id: StreamId, payload_bytes: u64) {
        let stats = self.per_stream.entry(stream_id).or_default();
        stats.bytes_received += payload_bytes;
        stats.packets_received += 1;
    }

    pub fn on_datagram_dropped(&mut self) {
        self.dropped_datagrams += 1;
    }

    pub fn on_stream_error(&mut self) {
        self.stream_errors += 1;
    }

    pub fn snapshot(&self) -> ConnectionStats {
        let mut per_stream = self.per_stream.iter()
            .map(|(&id, &stats)| (id, stats))
            .collect::<Vec<_>>();
        per_stream.sort_by_key(|(id, _)| *id);

        ConnectionStats {
            elapsed: self.started_at.elapsed(),
            per_stream,
            packets_sent: self.packets_sent,
            packets_received: self.packets_received,
            dropped_datagrams: self.dropped_datagrams,
            stream_errors: self.stream_errors,
        }
    }
}

/// A point-in-time view of the connection's statistics. Formatting is up to
///  the caller.
#[derive(Clone, Debug)]
pub struct ConnectionStats {
    pub elapsed: Duration,
    pub per_stream: Vec<(StreamId, StreamStats)>,
    pub packets_sent: u64,
    pub packets_received: u64,
    pub dropped_datagrams: u64,
    pub stream_errors: u64,
}

impl ConnectionStats {
    pub fn total_bytes_sent(&self) -> u64 {
        self.per_stream.iter().map(|(_, s)| s.bytes_sent).sum()
    }

    pub fn total_bytes_received(&self) -> u64 {
        self.per_stream.iter().map(|(_, s)| s.bytes_received).sum()
    }

    pub fn send_byte_rate(&self) -> f64 {
        Self::rate(self.total_bytes_sent(), self.elapsed)
    }

    pub fn receive_byte_rate(&self) -> f64 {
        Self::rate(self.total_bytes_received(), self.elapsed)
    }

    pub fn send_packet_rate(&self) -> f64 {
        Self::rate(self.packets_sent, self.elapsed)
    }

    pub fn receive_packet_rate(&self) -> f64 {
        Self::rate(self.packets_received, self.elapsed)
    }

    fn rate(count: u64, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs > 0.0 {
            count as f64 / secs
        }
        else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let mut collector = StatsCollector::new();

        collector.on_packet_sent();
        collector.on_packet_sent();
        collector.on_stream_data_sent(StreamId::from_raw(2), 100);
        collector.on_stream_data_sent(StreamId::from_raw(2), 50);
        collector.on_stream_data_sent(StreamId::from_raw(6), 10);

        collector.on_packet_received();
        collector.on_stream_data_received(StreamId::from_raw(2), 30);
        collector.on_datagram_dropped();
        collector.on_stream_error();

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.packets_sent, 2);
        assert_eq!(snapshot.packets_received, 1);
        assert_eq!(snapshot.dropped_datagrams, 1);
        assert_eq!(snapshot.stream_errors, 1);
        assert_eq!(snapshot.total_bytes_sent(), 160);
        assert_eq!(snapshot.total_bytes_received(), 30);

        assert_eq!(snapshot.per_stream, vec![
            (StreamId::from_raw(2), StreamStats { bytes_sent: 150, bytes_received: 30, packets_sent: 2, packets_received: 1 }),
            (StreamId::from_raw(6), StreamStats { bytes_sent: 10, bytes_received: 0, packets_sent: 1, packets_received: 0 }),
        ]);
    }

    #[test]
    fn test_rates_are_zero_without_elapsed_time() {
        let stats = ConnectionStats {
            elapsed: Duration::ZERO,
            per_stream: vec![(StreamId::from_raw(0), StreamStats { bytes_sent: 100, ..Default::default() })],
            packets_sent: 5,
            packets_received: 0,
            dropped_datagrams: 0,
            stream_errors: 0,
        };
        assert_eq!(stats.send_byte_rate(), 0.0);
        assert_eq!(stats.send_packet_rate(), 0.0);
    }

    #[test]
    fn test_rates() {
        let stats = ConnectionStats {
            elapsed: Duration::from_secs(2),
            per_stream: vec![(StreamId::from_raw(0), StreamStats { bytes_sent: 100, bytes_received: 50, ..Default::default() })],
            packets_sent: 4,
            packets_received: 3,
            dropped_datagrams: 0,
            stream_errors: 0,
        };
        assert_eq!(stats.send_byte_rate(), 50.0);
        assert_eq!(stats.receive_byte_rate(), 25.0);
        assert_eq!(stats.send_packet_rate(), 2.0);
        assert_eq!(stats.receive_packet_rate(), 1.5);
    }
}
