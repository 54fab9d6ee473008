use crate::error::{Result, TransportError};
use crate::frame::StreamFrame;
use crate::receive_stream::StreamReceiver;
use crate::send_stream::StreamSender;
use crate::stream_id::{Direction, StreamId};
use bytes::Bytes;

/// One multiplexed stream: a router pairing at most one sending and one
///  receiving half under a shared id. A bidirectional stream has both
///  halves; a unidirectional stream only has the half its owning endpoint
///  needs, and operations on the missing half fail with `UnknownStream`.
///
/// A stream on which an invariant was violated is marked failed: it is
///  excluded from scheduling and delivery, but does not affect the rest of
///  the connection.
pub struct Stream {
    id: StreamId,
    sender: Option<StreamSender>,
    receiver: Option<StreamReceiver>,
    failed: bool,
}

impl Stream {
    /// A stream opened by this endpoint: it always gets a sending half,
    ///  plus a receiving half if bidirectional.
    pub fn outbound(id: StreamId, min_payload: usize) -> Stream {
        let receiver = match id.direction() {
            Direction::Bidirectional => Some(StreamReceiver::new(id)),
            Direction::Unidirectional => None,
        };
        Stream {
            id,
            sender: Some(StreamSender::new(id, min_payload)),
            receiver,
            failed: false,
        }
    }

    /// A stream first seen on the wire: it always gets a receiving half,
    ///  plus a sending half if bidirectional.
    pub fn inbound(id: StreamId, min_payload: usize) -> Stream {
        let sender = match id.direction() {
            Direction::Bidirectional => Some(StreamSender::new(id, min_payload)),
            Direction::Unidirectional => None,
        };
        Stream {
            id,
            sender,
            receiver: Some(StreamReceiver::new(id)),
            failed: false,
        }
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn direction(&self) -> Direction {
        self.id.direction()
    }

    pub fn has_data_to_send(&self) -> bool {
        !self.failed && self.sender.as_ref().is_some_and(|s| s.has_data_to_send())
    }

    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        let sender = self.sender.as_mut()
            .ok_or(TransportError::UnknownStream(self.id))?;
        sender.add_data(data)
    }

    pub fn finish(&mut self) -> Result<()> {
        let sender = self.sender.as_mut()
            .ok_or(TransportError::UnknownStream(self.id))?;
        sender.finish();
        Ok(())
    }

    pub fn next_frame(&mut self, max_payload: usize) -> Result<Option<StreamFrame>> {
        if self.failed {
            return Ok(None);
        }
        match self.sender.as_mut() {
            Some(sender) => sender.generate_frame(max_payload),
            None => Ok(None),
        }
    }

    pub fn deliver(&mut self, frame: &StreamFrame) -> Result<()> {
        if self.failed {
            return Ok(()); // dropped silently
        }
        let receiver = self.receiver.as_mut()
            .ok_or(TransportError::UnknownStream(self.id))?;
        receiver.receive_frame(frame)
    }

    pub fn read_available(&mut self) -> Result<Bytes> {
        let receiver = self.receiver.as_mut()
            .ok_or(TransportError::UnknownStream(self.id))?;
        Ok(receiver.read_available())
    }

    pub fn is_receive_complete(&self) -> bool {
        self.receiver.as_ref().is_some_and(|r| r.is_complete())
    }

    /// The stream's lifecycle is over when every half it owns is terminal,
    ///  or when it failed.
    pub fn is_terminal(&self) -> bool {
        if self.failed {
            return true;
        }
        let sender_done = self.sender.as_ref().map_or(true, |s| s.is_terminal());
        let receiver_done = self.receiver.as_ref().map_or(true, |r| r.is_complete());
        sender_done && receiver_done
    }

    pub fn mark_failed(&mut self) {
        self.failed = true;
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }
}
