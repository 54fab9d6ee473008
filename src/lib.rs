//! A QUIC-style datagram transport that multiplexes many application byte
//!  streams over a single UDP flow between two endpoints. It borrows QUIC's
//!  framing and stream model but is not wire-compatible: there is no TLS,
//!  no version negotiation, no ACKs or loss recovery, no congestion control
//!  and no flow control windows.
//!
//! ## Design goals
//!
//! * The abstraction is sending / receiving *streams*: ordered,
//!   offset-indexed byte sequences identified by a stream id. Many streams
//!   share one UDP socket pair.
//! * STREAM frames carry offsetted byte ranges and are packed into packets
//!   under a configurable size bound; one packet is one UDP datagram
//! * receivers accept frames at arbitrary offsets, buffer out-of-order
//!   ranges and deliver an in-order prefix to the application
//! * the final frame of a stream carries a FIN flag that closes the offset
//!   space; an empty frame with FIN is a valid explicit terminator
//! * fairness across streams comes from a round-robin scheduler; within a
//!   stream, delivery order is strictly by offset, across streams there is
//!   no ordering guarantee
//! * a datagram that does not parse is dropped, counted and logged without
//!   poisoning other streams; a stream that violates an invariant is
//!   excluded from the connection without tearing it down
//! * the end of a connection is detected by a receive socket timeout -
//!   there is no close handshake
//!
//! ## Wire format
//!
//! One datagram is one packet - all numbers in network byte order (BE):
//!
//! ```ascii
//! 0:  packet number (u64): monotonically increasing per connection and
//!      direction. Observed on receive for statistics only.
//! 8:  connection id (u64): opaque tag agreed out of band; datagrams with
//!      a foreign tag are dropped
//! 16: frames, concatenated end-to-end until the datagram is exhausted -
//!      there is no frame count field and no padding
//! ```
//!
//! Each STREAM frame:
//!
//! ```ascii
//! 0:  stream id (u64): bit 0 is the initiating endpoint, bit 1 the
//!      directionality (0 bidirectional, 1 unidirectional)
//! 8:  offset (u64): byte position of this payload within the stream
//! 16: payload length (u32): encoded explicitly, never derived from the
//!      datagram size
//! 20: flags (u8): bit 0 FIN, all other bits reserved as zero
//! 21: payload
//! ```
//!
//! A frame with a payload of `n` bytes therefore consumes `21 + n` bytes of
//!  a packet's budget, and the packet header consumes 16.

pub mod config;
pub mod connection;
pub mod error;
pub mod frame;
pub mod packet;
pub mod packet_header;
pub mod packet_id;
pub mod receive_stream;
pub mod safe_converter;
pub mod send_pipeline;
pub mod send_stream;
pub mod stats;
pub mod stream;
pub mod stream_id;
