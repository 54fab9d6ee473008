use crate::error::{Result, TransportError};
use crate::frame::StreamFrame;
use crate::stream_id::StreamId;
use bytes::{BufMut, Bytes, BytesMut};
use std::cmp::min;
use std::collections::BTreeMap;
use tracing::trace;

/// The receiving half of a stream: accepts frames at arbitrary offsets and
///  assembles the in-order prefix for the application.
///
/// Buffered segments are keyed by offset and kept disjoint. Where an
///  incoming frame overlaps already delivered bytes or a buffered segment,
///  the overlapping part of the *newer* data is discarded (first writer
///  wins), which makes duplicate delivery idempotent.
pub struct StreamReceiver {
    stream_id: StreamId,
    /// out-of-order segments, all starting at or past `delivered_upto`
    segments: BTreeMap<u64, Vec<u8>>,
    /// in-order bytes not yet handed to the application
    assembled: BytesMut,
    delivered_upto: u64,
    fin_offset: Option<u64>,
}

impl StreamReceiver {
    pub fn new(stream_id: StreamId) -> StreamReceiver {
        StreamReceiver {
            stream_id,
            segments: BTreeMap::default(),
            assembled: BytesMut::new(),
            delivered_upto: 0,
            fin_offset: None,
        }
    }

    /// Insert a frame's payload at its offset and advance the in-order
    ///  boundary as far as the buffered segments allow.
    pub fn receive_frame(&mut self, frame: &StreamFrame) -> Result<()> {
        let end = frame.end_offset();

        if frame.fin {
            match self.fin_offset {
                Some(previous) if previous != end => {
                    return Err(TransportError::FinConflict {
                        stream_id: self.stream_id,
                        previous,
                        conflicting: end,
                    });
                }
                _ => {
                    trace!("stream {}: final size is {}", self.stream_id, end);
                    self.fin_offset = Some(end);
                }
            }
        }

        if let Some(fin_offset) = self.fin_offset {
            if end > fin_offset {
                return Err(TransportError::FinContradicted {
                    stream_id: self.stream_id,
                    end,
                    fin_offset,
                });
            }
        }

        self.insert_segment(frame.offset, &frame.payload);
        self.advance();
        Ok(())
    }

    fn insert_segment(&mut self, mut offset: u64, mut data: &[u8]) {
        // discard whatever was already delivered
        if offset < self.delivered_upto {
            let skip = min(self.delivered_upto - offset, data.len() as u64) as usize;
            data = &data[skip..];
            offset += skip as u64;
        }

        // a buffered segment starting at or before `offset` may extend past it
        if let Some((&seg_offset, seg)) = self.segments.range(..=offset).next_back() {
            let seg_end = seg_offset + seg.len() as u64;
            if seg_end > offset {
                let skip = min(seg_end - offset, data.len() as u64) as usize;
                data = &data[skip..];
                offset += skip as u64;
            }
        }

        // insert the stretches not covered by segments further right
        while !data.is_empty() {
            let covering = self.segments.range(offset..).next()
                .map(|(&o, s)| (o, o + s.len() as u64));

            match covering {
                Some((next_offset, next_end)) if next_offset < offset + data.len() as u64 => {
                    let head_len = (next_offset - offset) as usize;
                    if head_len > 0 {
                        self.segments.insert(offset, data[..head_len].to_vec());
                    }
                    let skip = min(next_end - offset, data.len() as u64) as usize;
                    data = &data[skip..];
                    offset += skip as u64;
                }
                _ => {
                    self.segments.insert(offset, data.to_vec());
                    break;
                }
            }
        }
    }

    /// consume segments that start exactly at the in-order boundary
    fn advance(&mut self) {
        while let Some(entry) = self.segments.first_entry() {
            if *entry.key() != self.delivered_upto {
                break;
            }
            let data = entry.remove();
            self.delivered_upto += data.len() as u64;
            self.assembled.put_slice(&data);
        }
    }

    /// Hand out the in-order bytes past the last read position.
    pub fn read_available(&mut self) -> Bytes {
        self.assembled.split().freeze()
    }

    /// True once the FIN offset is known and everything up to it has been
    ///  moved past the in-order boundary.
    pub fn is_complete(&self) -> bool {
        self.fin_offset == Some(self.delivered_upto)
    }

    pub fn delivered_upto(&self) -> u64 {
        self.delivered_upto
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(offset: u64, fin: bool, payload: &[u8]) -> StreamFrame {
        StreamFrame {
            stream_id: StreamId::from_raw(0),
            offset,
            fin,
            payload: Bytes::copy_from_slice(payload),
        }
    }

    fn receiver() -> StreamReceiver {
        StreamReceiver::new(StreamId::from_raw(0))
    }

    #[test]
    fn test_single_frame() {
        let mut receiver = receiver();
        receiver.receive_frame(&frame(0, true, b"HELLO WORLD")).unwrap();

        assert_eq!(receiver.read_available().as_ref(), b"HELLO WORLD");
        assert!(receiver.is_complete());
        assert!(receiver.read_available().is_empty());
    }

    #[test]
    fn test_in_order_delivery() {
        let mut receiver = receiver();
        receiver.receive_frame(&frame(0, false, b"abc")).unwrap();
        assert_eq!(receiver.read_available().as_ref(), b"abc");

        receiver.receive_frame(&frame(3, false, b"def")).unwrap();
        assert_eq!(receiver.read_available().as_ref(), b"def");

        receiver.receive_frame(&frame(6, true, b"")).unwrap();
        assert!(receiver.is_complete());
    }

    #[test]
    fn test_out_of_order_reassembly() {
        let mut receiver = receiver();
        receiver.receive_frame(&frame(6, true, b"ghi")).unwrap();
        receiver.receive_frame(&frame(3, false, b"def")).unwrap();
        assert!(receiver.read_available().is_empty());
        assert!(!receiver.is_complete());

        receiver.receive_frame(&frame(0, false, b"abc")).unwrap();
        assert_eq!(receiver.read_available().as_ref(), b"abcdefghi");
        assert!(receiver.is_complete());
    }

    #[test]
    fn test_reversed_sender_run() {
        let data = vec![0x41u8; 5000];
        let mut frames = Vec::new();
        let mut offset = 0u64;
        for chunk in data.chunks(1463) {
            let fin = offset as usize + chunk.len() == data.len();
            frames.push(frame(offset, fin, chunk));
            offset += chunk.len() as u64;
        }
        frames.reverse();

        let mut receiver = receiver();
        for f in &frames {
            receiver.receive_frame(f).unwrap();
        }

        assert_eq!(receiver.read_available().as_ref(), data.as_slice());
        assert!(receiver.is_complete());
    }

    #[test]
    fn test_duplicate_frames_are_idempotent() {
        let mut receiver = receiver();
        receiver.receive_frame(&frame(0, false, b"abc")).unwrap();
        receiver.receive_frame(&frame(0, false, b"abc")).unwrap();
        receiver.receive_frame(&frame(3, true, b"def")).unwrap();
        receiver.receive_frame(&frame(3, true, b"def")).unwrap();

        assert_eq!(receiver.read_available().as_ref(), b"abcdef");
        assert!(receiver.is_complete());
    }

    #[test]
    fn test_overlap_with_delivered_is_trimmed() {
        let mut receiver = receiver();
        receiver.receive_frame(&frame(0, false, b"abcd")).unwrap();
        // overlaps [2, 4) which is already delivered - only "EF" is new
        receiver.receive_frame(&frame(2, false, b"xxEF")).unwrap();

        assert_eq!(receiver.read_available().as_ref(), b"abcdEF");
    }

    #[test]
    fn test_overlap_with_buffered_keeps_first_writer() {
        let mut receiver = receiver();
        receiver.receive_frame(&frame(4, false, b"EFGH")).unwrap();
        // [4, 8) is buffered already - the conflicting "xxxx" part loses
        receiver.receive_frame(&frame(2, false, b"cdxxxxij")).unwrap();
        receiver.receive_frame(&frame(0, false, b"ab")).unwrap();
        receiver.receive_frame(&frame(10, true, b"")).unwrap();

        assert_eq!(receiver.read_available().as_ref(), b"abcdEFGHij");
        assert!(receiver.is_complete());
    }

    #[test]
    fn test_incoming_frame_bridging_two_segments() {
        let mut receiver = receiver();
        receiver.receive_frame(&frame(2, false, b"cd")).unwrap();
        receiver.receive_frame(&frame(6, false, b"gh")).unwrap();
        // covers [0, 9), bridging the gap around both buffered segments
        receiver.receive_frame(&frame(0, false, b"abXXefXXi")).unwrap();

        assert_eq!(receiver.read_available().as_ref(), b"abcdefghi");
    }

    #[test]
    fn test_empty_fin_completes() {
        let mut receiver = receiver();
        receiver.receive_frame(&frame(0, false, b"abc")).unwrap();
        assert!(!receiver.is_complete());

        receiver.receive_frame(&frame(3, true, b"")).unwrap();
        assert!(receiver.is_complete());
        assert_eq!(receiver.read_available().as_ref(), b"abc");
    }

    #[test]
    fn test_frame_past_fin_is_rejected() {
        let mut receiver = receiver();
        receiver.receive_frame(&frame(0, true, b"abc")).unwrap();

        assert!(matches!(
            receiver.receive_frame(&frame(3, false, b"d")),
            Err(TransportError::FinContradicted { end: 4, fin_offset: 3, .. })
        ));
    }

    #[test]
    fn test_conflicting_fin_is_rejected() {
        let mut receiver = receiver();
        receiver.receive_frame(&frame(0, true, b"abc")).unwrap();

        assert!(matches!(
            receiver.receive_frame(&frame(0, true, b"ab")),
            Err(TransportError::FinConflict { previous: 3, conflicting: 2, .. })
        ));
    }

    #[test]
    fn test_redundant_fin_is_ignored() {
        let mut receiver = receiver();
        receiver.receive_frame(&frame(0, false, b"ab")).unwrap();
        receiver.receive_frame(&frame(2, true, b"c")).unwrap();
        assert_eq!(receiver.read_available().as_ref(), b"abc");

        // same final size, range already delivered
        receiver.receive_frame(&frame(2, true, b"c")).unwrap();
        assert!(receiver.is_complete());
        assert!(receiver.read_available().is_empty());
    }

    #[test]
    fn test_zero_length_stream() {
        let mut receiver = receiver();
        receiver.receive_frame(&frame(0, true, b"")).unwrap();

        assert!(receiver.is_complete());
        assert!(receiver.read_available().is_empty());
    }
}
