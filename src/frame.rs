use crate::error::{Result, TransportError};
use crate::safe_converter::{PrecheckedCast, SafeCast};
use crate::stream_id::StreamId;
use bitflags::bitflags;
use bytes::{Buf, BufMut, Bytes};
use bytes_varint::try_get_fixed::TryGetFixedSupport;
use std::fmt::Debug;

bitflags! {
    #[derive(PartialEq, Eq, Copy, Clone)]
    struct FrameFlags: u8 {
        const FIN = 0x01;
    }
}

/// A STREAM frame: one contiguous byte range of one stream. Frames are
///  concatenated inside a packet without separators, so the payload length
///  is always encoded explicitly - a parser works strictly left to right.
///
/// Wire layout (network byte order):
/// ```ascii
///  0: stream id (u64)
///  8: offset (u64)
/// 16: payload length (u32)
/// 20: flags (u8) - bit 0 FIN, all other bits reserved as zero
/// 21: payload
/// ```
#[derive(Clone, Eq, PartialEq)]
pub struct StreamFrame {
    pub stream_id: StreamId,
    pub offset: u64,
    pub fin: bool,
    pub payload: Bytes,
}

impl Debug for StreamFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FRAME({}@{}+{}{})",
               self.stream_id,
               self.offset,
               self.payload.len(),
               if self.fin { ":FIN" } else { "" },
        )
    }
}

impl StreamFrame {
    pub const HEADER_SIZE: usize = 8 + 8 + 4 + 1;

    pub fn encoded_len(&self) -> usize {
        Self::HEADER_SIZE + self.payload.len()
    }

    /// The offset just past this frame's payload. For a FIN frame this is
    ///  the final size of the stream.
    pub fn end_offset(&self) -> u64 {
        self.offset + self.payload.len() as u64
    }

    pub fn ser(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.stream_id.to_raw());
        buf.put_u64(self.offset);
        buf.put_u32(self.payload.len().prechecked_cast());
        let flags = if self.fin { FrameFlags::FIN } else { FrameFlags::empty() };
        buf.put_u8(flags.bits());
        buf.put_slice(&self.payload);
    }

    pub fn deser(buf: &mut impl Buf) -> Result<StreamFrame> {
        let stream_id = buf.try_get_u64().map_err(|_| TransportError::TruncatedFrame)?;
        let offset = buf.try_get_u64().map_err(|_| TransportError::TruncatedFrame)?;
        let length: usize = buf.try_get_u32().map_err(|_| TransportError::TruncatedFrame)?
            .safe_cast();
        let raw_flags = buf.try_get_u8().map_err(|_| TransportError::TruncatedFrame)?;

        let flags = FrameFlags::from_bits(raw_flags)
            .ok_or(TransportError::ReservedBitsSet(raw_flags))?;

        if buf.remaining() < length {
            return Err(TransportError::TruncatedFrame);
        }
        let payload = buf.copy_to_bytes(length);

        Ok(StreamFrame {
            stream_id: StreamId::from_raw(stream_id),
            offset,
            fin: flags.contains(FrameFlags::FIN),
            payload,
        })
    }
}
