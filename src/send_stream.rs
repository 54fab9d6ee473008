use crate::error::{Result, TransportError};
use crate::frame::StreamFrame;
use crate::stream_id::StreamId;
use bytes::{BufMut, Bytes, BytesMut};
use std::cmp::min;
use tracing::trace;

/// The sending half of a stream: buffers application bytes and chips frames
///  off the front under whatever payload budget the scheduler offers.
///
/// Emitted frames have strictly increasing offsets and contiguous,
///  non-overlapping payload ranges. FIN rides the final short chunk; a
///  chunk that fills its budget completely never carries FIN, so a stream
///  whose length is an exact multiple of the budget terminates with an
///  explicit empty FIN frame.
pub struct StreamSender {
    stream_id: StreamId,
    /// bytes accepted from the application but not yet emitted as frames
    buffer: BytesMut,
    next_offset: u64,
    min_payload: usize,
    finished: bool,
    fin_sent: bool,
}

impl StreamSender {
    pub fn new(stream_id: StreamId, min_payload: usize) -> StreamSender {
        StreamSender {
            stream_id,
            buffer: BytesMut::new(),
            next_offset: 0,
            min_payload,
            finished: false,
            fin_sent: false,
        }
    }

    /// Append bytes to the send buffer. Rejected once [`finish`](Self::finish)
    ///  has been called - the final stream size is fixed at that point.
    pub fn add_data(&mut self, data: &[u8]) -> Result<()> {
        if self.finished {
            return Err(TransportError::WriteAfterFin(self.stream_id));
        }
        self.buffer.put_slice(data);
        Ok(())
    }

    /// Declare the current end of the buffer as the final stream size. FIN
    ///  will ride on the last emitted frame.
    pub fn finish(&mut self) {
        self.finished = true;
    }

    pub fn has_data_to_send(&self) -> bool {
        if self.fin_sent {
            return false;
        }
        !self.buffer.is_empty() || self.finished
    }

    /// Produce the next frame with at most `max_payload` bytes of payload,
    ///  or `None` if nothing is ready. Buffered data below the configured
    ///  minimum is held back until more arrives, unless the stream is
    ///  finished and the remainder is legitimately the final chunk.
    pub fn generate_frame(&mut self, max_payload: usize) -> Result<Option<StreamFrame>> {
        if self.fin_sent {
            return Ok(None);
        }

        if self.buffer.is_empty() {
            if !self.finished {
                return Ok(None);
            }
            // explicit empty terminator
            self.fin_sent = true;
            trace!("stream {}: emitting empty FIN frame at offset {}", self.stream_id, self.next_offset);
            return Ok(Some(StreamFrame {
                stream_id: self.stream_id,
                offset: self.next_offset,
                fin: true,
                payload: Bytes::new(),
            }));
        }

        if max_payload == 0 {
            return Err(TransportError::FrameTooSmall(max_payload));
        }
        if self.buffer.len() < self.min_payload && !self.finished {
            // wait for more data to coalesce into a reasonably sized frame
            return Ok(None);
        }

        let chunk_len = min(self.buffer.len(), max_payload);
        let payload = self.buffer.split_to(chunk_len).freeze();
        let fin = self.finished && self.buffer.is_empty() && chunk_len < max_payload;

        let frame = StreamFrame {
            stream_id: self.stream_id,
            offset: self.next_offset,
            fin,
            payload,
        };
        self.next_offset += chunk_len as u64;
        if fin {
            self.fin_sent = true;
        }

        trace!("stream {}: emitting {:?}", self.stream_id, frame);
        Ok(Some(frame))
    }

    /// True once FIN has been emitted and nothing is left to send.
    pub fn is_terminal(&self) -> bool {
        self.fin_sent && self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender(min_payload: usize) -> StreamSender {
        StreamSender::new(StreamId::from_raw(0), min_payload)
    }

    fn drain(sender: &mut StreamSender, max_payload: usize) -> Vec<StreamFrame> {
        let mut frames = Vec::new();
        while let Some(frame) = sender.generate_frame(max_payload).unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn test_single_short_frame_carries_fin() {
        let mut sender = sender(11);
        sender.add_data(b"HELLO WORLD").unwrap();
        sender.finish();

        let frames = drain(&mut sender, 27);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].offset, 0);
        assert_eq!(frames[0].payload.as_ref(), b"HELLO WORLD");
        assert!(frames[0].fin);
        assert!(sender.is_terminal());
    }

    #[test]
    fn test_exact_multiple_ends_with_empty_fin() {
        let mut sender = sender(0);
        sender.add_data(&[7u8; 100]).unwrap();
        sender.finish();

        let frames = drain(&mut sender, 100);
        assert_eq!(frames.len(), 2);

        assert_eq!(frames[0].offset, 0);
        assert_eq!(frames[0].payload.len(), 100);
        assert!(!frames[0].fin);

        assert_eq!(frames[1].offset, 100);
        assert!(frames[1].payload.is_empty());
        assert!(frames[1].fin);
    }

    #[test]
    fn test_chunking_is_contiguous_and_complete() {
        let data = (0..=255u8).cycle().take(5000).collect::<Vec<_>>();

        let mut sender = sender(0);
        sender.add_data(&data).unwrap();
        sender.finish();

        let frames = drain(&mut sender, 1463);

        let mut expected_offset = 0u64;
        let mut reassembled = Vec::new();
        for frame in &frames {
            assert_eq!(frame.offset, expected_offset);
            expected_offset += frame.payload.len() as u64;
            reassembled.extend_from_slice(&frame.payload);
        }
        assert_eq!(reassembled, data);

        assert_eq!(frames.iter().filter(|f| f.fin).count(), 1);
        let last = frames.last().unwrap();
        assert!(last.fin);
        assert_eq!(last.end_offset(), 5000);
    }

    #[test]
    fn test_write_after_finish_is_rejected() {
        let mut sender = sender(0);
        sender.add_data(b"abc").unwrap();
        sender.finish();

        assert!(matches!(sender.add_data(b"def"), Err(TransportError::WriteAfterFin(_))));
    }

    #[test]
    fn test_zero_budget_with_pending_data() {
        let mut sender = sender(0);
        sender.add_data(b"abc").unwrap();

        assert!(matches!(sender.generate_frame(0), Err(TransportError::FrameTooSmall(0))));
    }

    #[test]
    fn test_zero_budget_allows_empty_fin() {
        let mut sender = sender(0);
        sender.finish();

        let frame = sender.generate_frame(0).unwrap().unwrap();
        assert!(frame.fin);
        assert!(frame.payload.is_empty());
        assert_eq!(frame.offset, 0);
    }

    #[test]
    fn test_small_data_is_held_back_until_finish() {
        let mut sender = sender(100);
        sender.add_data(b"tiny").unwrap();

        assert!(sender.generate_frame(1000).unwrap().is_none());
        assert!(sender.has_data_to_send());

        sender.finish();
        let frame = sender.generate_frame(1000).unwrap().unwrap();
        assert_eq!(frame.payload.as_ref(), b"tiny");
        assert!(frame.fin);
    }

    #[test]
    fn test_idle_sender_yields_nothing() {
        let mut sender = sender(0);
        assert!(sender.generate_frame(1000).unwrap().is_none());
        assert!(!sender.has_data_to_send());
        assert!(!sender.is_terminal());
    }

    #[test]
    fn test_no_frames_after_fin() {
        let mut sender = sender(0);
        sender.add_data(b"abc").unwrap();
        sender.finish();

        assert_eq!(drain(&mut sender, 1000).len(), 1);
        assert!(sender.generate_frame(1000).unwrap().is_none());
        assert!(!sender.has_data_to_send());
    }

    #[test]
    fn test_incremental_writes_before_finish() {
        let mut sender = sender(0);
        sender.add_data(b"abc").unwrap();

        let first = sender.generate_frame(1000).unwrap().unwrap();
        assert_eq!(first.payload.as_ref(), b"abc");
        assert!(!first.fin);

        sender.add_data(b"def").unwrap();
        sender.finish();

        let second = sender.generate_frame(1000).unwrap().unwrap();
        assert_eq!(second.offset, 3);
        assert_eq!(second.payload.as_ref(), b"def");
        assert!(second.fin);
    }
}
