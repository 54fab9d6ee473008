use crate::config::TransportConfig;
use crate::error::{Result, TransportError};
use crate::frame::StreamFrame;
use crate::packet::Packet;
use crate::packet_header::{ConnectionId, PacketHeader};
use crate::packet_id::PacketId;
use crate::send_pipeline::SendPipeline;
use crate::stats::{ConnectionStats, StatsCollector};
use crate::stream::Stream;
use crate::stream_id::{Direction, Initiator, StreamId};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::time;
use tracing::{debug, error, info, span, trace, warn, Level};
use uuid::Uuid;

/// QuicConnection is the place where all other parts of the transport come
///  together: it owns the UDP socket and the table of multiplexed streams,
///  packs frames from ready streams into size-bounded packets on the send
///  side, and parses received datagrams and routes their frames to the
///  corresponding streams on the receive side.
///
/// The send and receive loops may run on separate tasks; the stream table
///  sits behind a single mutex, and all per-stream operations are short and
///  non-blocking.
pub struct QuicConnection {
    config: Arc<TransportConfig>,
    connection_id: ConnectionId,
    peer_addr: SocketAddr,
    receive_socket: Arc<UdpSocket>,
    send_pipeline: Arc<SendPipeline>,
    inner: Arc<Mutex<ConnectionInner>>,
    closed: AtomicBool,
}

impl QuicConnection {
    pub async fn connect(
        connection_id: ConnectionId,
        local_addr: SocketAddr,
        peer_addr: SocketAddr,
        role: Initiator,
        config: TransportConfig,
    ) -> anyhow::Result<QuicConnection> {
        config.validate()?;

        let socket = Arc::new(UdpSocket::bind(local_addr).await?);
        info!("bound socket to {:?}, peer is {:?}", socket.local_addr()?, peer_addr);

        Ok(QuicConnection {
            config: Arc::new(config),
            connection_id,
            peer_addr,
            receive_socket: socket.clone(),
            send_pipeline: Arc::new(SendPipeline::new(Arc::new(socket))),
            inner: Arc::new(Mutex::new(ConnectionInner::new(role))),
            closed: AtomicBool::new(false),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.send_pipeline.local_addr()
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Open a stream with the next locally generated id. Fails with
    ///  `TooManyStreams` at the configured cap, which closes the connection.
    pub async fn open_stream(&self, direction: Direction) -> Result<StreamId> {
        let result = self.inner.lock().await
            .open_stream(direction, &self.config);

        if let Err(TransportError::TooManyStreams(_)) = &result {
            warn!("stream limit reached - closing the connection");
            self.closed.store(true, Ordering::Relaxed);
        }
        result
    }

    pub async fn write(&self, stream_id: StreamId, data: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.with_stream(stream_id, |stream| stream.write(data))
    }

    /// Declare the stream's current buffered end as final; FIN will ride on
    ///  the last emitted frame.
    pub async fn finish_stream(&self, stream_id: StreamId) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.with_stream(stream_id, |stream| stream.finish())
    }

    /// The in-order bytes received past the last read position.
    pub async fn read_available(&self, stream_id: StreamId) -> Result<Bytes> {
        let mut inner = self.inner.lock().await;
        inner.with_stream(stream_id, |stream| stream.read_available())
    }

    pub async fn is_stream_complete(&self, stream_id: StreamId) -> Result<bool> {
        let inner = self.inner.lock().await;
        match inner.streams.get(&stream_id) {
            Some(stream) => Ok(stream.is_receive_complete()),
            None => Err(TransportError::UnknownStream(stream_id)),
        }
    }

    pub async fn stream_ids(&self) -> Vec<StreamId> {
        self.inner.lock().await
            .streams.keys().cloned().collect()
    }

    pub async fn stats(&self) -> ConnectionStats {
        self.inner.lock().await
            .stats.snapshot()
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }

    /// Drive the send side to completion: pack frames from ready streams
    ///  into packets and transmit them, yielding briefly when nothing is
    ///  ready, until every stream is terminal or the connection is closed.
    pub async fn run_send_loop(&self) {
        info!("starting send loop towards {:?}", self.peer_addr);

        loop {
            if self.closed.load(Ordering::Relaxed) {
                debug!("connection closed, leaving send loop");
                break;
            }

            let (packet, all_terminal) = {
                let mut inner = self.inner.lock().await;
                (inner.build_packet(&self.config, self.connection_id), inner.all_streams_terminal())
            };

            match packet {
                Some(packet) => {
                    match packet.encode(self.config.max_packet_size) {
                        Ok(buf) => {
                            self.send_pipeline.do_send_packet(self.peer_addr, &buf).await;
                        }
                        Err(e) => {
                            // cannot happen with the scheduler's size accounting
                            error!("dropping unencodable packet: {}", e);
                        }
                    }
                }
                None => {
                    if all_terminal {
                        debug!("all streams terminal, send loop done");
                        break;
                    }
                    time::sleep(self.config.send_idle_delay).await;
                }
            }
        }
    }

    /// Drive the receive side: read datagrams, parse them and dispatch
    ///  their frames, until the socket timeout signals end of connection.
    ///  A datagram that does not parse is counted and dropped without
    ///  affecting other streams.
    pub async fn run_recv_loop(&self) -> Result<()> {
        info!("starting receive loop");

        let mut buf = vec![0u8; self.config.max_packet_size];
        loop {
            if self.closed.load(Ordering::Relaxed) {
                debug!("connection closed, leaving receive loop");
                break;
            }

            let (num_read, from) = match time::timeout(self.config.receive_timeout, self.receive_socket.recv_from(&mut buf)).await {
                Err(_elapsed) => {
                    debug!("no datagram for {:?} - treating as end of connection", self.config.receive_timeout);
                    break;
                }
                Ok(Err(e)) => {
                    error!("socket error: {}", e);
                    self.closed.store(true, Ordering::Relaxed);
                    return Err(TransportError::Socket(e));
                }
                Ok(Ok(x)) => x,
            };

            let mut inner = self.inner.lock().await;

            let correlation_id = Uuid::new_v4();
            let span = span!(Level::TRACE, "datagram_received", ?correlation_id);
            let _entered = span.enter();
            trace!("received {} bytes from {:?}", num_read, from);

            inner.dispatch_datagram(&buf[..num_read], self.connection_id, &self.config);
        }

        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

struct ConnectionInner {
    role: Initiator,
    streams: BTreeMap<StreamId, Stream>,
    /// number of streams opened locally, drives id generation
    streams_opened: u64,
    next_packet_number: PacketId,
    highest_received_packet_number: Option<PacketId>,
    /// the stream id at which the next scheduler pass starts offering
    rotation_cursor: StreamId,
    stats: StatsCollector,
}

impl ConnectionInner {
    fn new(role: Initiator) -> ConnectionInner {
        ConnectionInner {
            role,
            streams: BTreeMap::default(),
            streams_opened: 0,
            next_packet_number: PacketId::ZERO,
            highest_received_packet_number: None,
            rotation_cursor: StreamId::from_raw(0),
            stats: StatsCollector::new(),
        }
    }

    fn open_stream(&mut self, direction: Direction, config: &TransportConfig) -> Result<StreamId> {
        if self.streams.len() >= config.max_streams {
            return Err(TransportError::TooManyStreams(config.max_streams));
        }

        let id = StreamId::new(self.streams_opened, self.role, direction);
        self.streams_opened += 1;

        debug!("opening stream {} ({:?})", id, direction);
        self.streams.insert(id, Stream::outbound(id, config.min_frame_payload()));
        Ok(id)
    }

    fn with_stream<T>(&mut self, stream_id: StreamId, op: impl FnOnce(&mut Stream) -> Result<T>) -> Result<T> {
        let stream = self.streams.get_mut(&stream_id)
            .ok_or(TransportError::UnknownStream(stream_id))?;

        match op(stream) {
            Ok(result) => Ok(result),
            Err(e) => {
                if matches!(e, TransportError::WriteAfterFin(_)) {
                    warn!("stream {} violated an invariant: {} - excluding it from the connection", stream_id, e);
                    stream.mark_failed();
                    self.stats.on_stream_error();
                }
                Err(e)
            }
        }
    }

    /// One scheduler pass: pack frames from ready streams into a packet
    ///  under the size bound, offering each stream once, in id order
    ///  starting from the rotation cursor. Returns `None` if no stream had
    ///  anything to send.
    fn build_packet(&mut self, config: &TransportConfig, connection_id: ConnectionId) -> Option<Packet> {
        let ids = self.streams.keys().cloned().collect::<Vec<_>>();
        if ids.is_empty() {
            return None;
        }

        let start = ids.iter().position(|&id| id >= self.rotation_cursor)
            .unwrap_or(0);
        self.rotation_cursor = ids[(start + 1) % ids.len()];

        let mut packet = Packet::new(PacketHeader::new(self.next_packet_number, connection_id));
        let mut remaining = config.frame_budget();
        let payload_floor = config.min_frame_payload();

        for i in 0..ids.len() {
            if remaining < StreamFrame::HEADER_SIZE + payload_floor {
                break;
            }

            let id = ids[(start + i) % ids.len()];
            let stream = self.streams.get_mut(&id).expect("stream table changed during scheduling");
            if !stream.has_data_to_send() {
                continue;
            }

            match stream.next_frame(remaining - StreamFrame::HEADER_SIZE) {
                Ok(Some(frame)) => {
                    remaining -= frame.encoded_len();
                    self.stats.on_stream_data_sent(id, frame.payload.len() as u64);
                    packet.add_frame(frame);
                }
                Ok(None) => {}
                Err(TransportError::FrameTooSmall(_)) => {
                    // no budget left for this stream's data, try again in the next packet
                    continue;
                }
                Err(e) => {
                    warn!("stream {} failed while generating a frame: {} - excluding it from the connection", id, e);
                    stream.mark_failed();
                    self.stats.on_stream_error();
                }
            }
        }

        if packet.frames.is_empty() {
            return None;
        }

        trace!("packed packet #{} with {} frames", self.next_packet_number, packet.frames.len());
        self.next_packet_number = self.next_packet_number.next();
        self.stats.on_packet_sent();
        Some(packet)
    }

    fn all_streams_terminal(&self) -> bool {
        self.streams.values().all(|s| s.is_terminal())
    }

    /// Parse one datagram and route its frames. Parse failures and frames
    ///  that cannot be delivered are counted and dropped; they never poison
    ///  other streams.
    fn dispatch_datagram(&mut self, data: &[u8], connection_id: ConnectionId, config: &TransportConfig) {
        let packet = match Packet::decode(data) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("dropping undecodable datagram: {}", e);
                self.stats.on_datagram_dropped();
                return;
            }
        };

        if packet.header.connection_id != connection_id {
            warn!("dropping datagram for foreign connection {}", packet.header.connection_id);
            self.stats.on_datagram_dropped();
            return;
        }

        trace!("dispatching packet #{} with {} frames", packet.header.packet_number, packet.frames.len());
        self.observe_packet_number(packet.header.packet_number);
        self.stats.on_packet_received();

        let mut per_stream_bytes: BTreeMap<StreamId, u64> = BTreeMap::default();
        for frame in &packet.frames {
            let id = frame.stream_id;

            if !self.streams.contains_key(&id) {
                if self.streams.len() >= config.max_streams {
                    warn!("dropping frame for stream {} - stream limit of {} reached", id, config.max_streams);
                    self.stats.on_stream_error();
                    continue;
                }
                debug!("first frame for stream {} - creating receive half", id);
                self.streams.insert(id, Stream::inbound(id, config.min_frame_payload()));
            }

            let stream = self.streams.get_mut(&id).expect("stream was just looked up or inserted");
            match stream.deliver(frame) {
                Ok(()) => {
                    *per_stream_bytes.entry(id).or_default() += frame.payload.len() as u64;
                }
                Err(e) => {
                    warn!("stream {} failed on delivery: {} - excluding it from the connection", id, e);
                    stream.mark_failed();
                    self.stats.on_stream_error();
                }
            }
        }

        for (id, bytes) in per_stream_bytes {
            self.stats.on_stream_data_received(id, bytes);
        }
    }

    fn observe_packet_number(&mut self, packet_number: PacketId) {
        match self.highest_received_packet_number {
            Some(highest) if highest >= packet_number => {
                debug!("packet #{} arrived after #{}", packet_number, highest);
            }
            _ => self.highest_received_packet_number = Some(packet_number),
        }
    }
}
