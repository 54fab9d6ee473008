use crate::stream_id::StreamId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TransportError>;

/// All the ways a transport operation can fail. Parse errors are recoverable
///  at the dispatcher (the datagram is dropped), stream-scope errors kill the
///  offending stream, and `Socket` / `TooManyStreams` end the connection.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("truncated packet header")]
    TruncatedHeader,

    #[error("truncated stream frame")]
    TruncatedFrame,

    #[error("reserved frame flag bits set: {0:#04x}")]
    ReservedBitsSet(u8),

    #[error("encoded packet size {size} exceeds the maximum of {max}")]
    PacketTooLarge { size: usize, max: usize },

    #[error("frame payload budget of {0} bytes cannot hold any data")]
    FrameTooSmall(usize),

    #[error("write on stream {0} after it was finished")]
    WriteAfterFin(StreamId),

    #[error("frame on stream {stream_id} ends at offset {end}, past the final size {fin_offset}")]
    FinContradicted {
        stream_id: StreamId,
        end: u64,
        fin_offset: u64,
    },

    #[error("conflicting FIN on stream {stream_id}: final size {previous} was already recorded, new FIN ends at {conflicting}")]
    FinConflict {
        stream_id: StreamId,
        previous: u64,
        conflicting: u64,
    },

    #[error("unknown stream {0}")]
    UnknownStream(StreamId),

    #[error("stream limit of {0} reached")]
    TooManyStreams(usize),

    #[error("socket error: {0}")]
    Socket(#[from] std::io::Error),
}
