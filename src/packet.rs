use crate::error::{Result, TransportError};
use crate::frame::StreamFrame;
use crate::packet_header::PacketHeader;
use bytes::{Buf, BytesMut};
use std::fmt::Debug;

/// One datagram's worth of data: a header followed by zero or more frames
///  concatenated end to end. There is no frame count field and no padding -
///  a parser consumes frames until the datagram is exhausted.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Packet {
    pub header: PacketHeader,
    pub frames: Vec<StreamFrame>,
}

impl Packet {
    pub fn new(header: PacketHeader) -> Packet {
        Packet {
            header,
            frames: Vec::new(),
        }
    }

    pub fn add_frame(&mut self, frame: StreamFrame) {
        self.frames.push(frame);
    }

    pub fn encoded_len(&self) -> usize {
        PacketHeader::SERIALIZED_LEN + self.frames.iter()
            .map(|f| f.encoded_len())
            .sum::<usize>()
    }

    pub fn encode(&self, max_packet_size: usize) -> Result<BytesMut> {
        let size = self.encoded_len();
        if size > max_packet_size {
            return Err(TransportError::PacketTooLarge { size, max: max_packet_size });
        }

        let mut buf = BytesMut::with_capacity(size);
        self.header.ser(&mut buf);
        for frame in &self.frames {
            frame.ser(&mut buf);
        }
        Ok(buf)
    }

    pub fn decode(mut buf: &[u8]) -> Result<Packet> {
        let header = PacketHeader::deser(&mut buf)?;

        let mut frames = Vec::new();
        while buf.has_remaining() {
            frames.push(StreamFrame::deser(&mut buf)?);
        }

        Ok(Packet {
            header,
            frames,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet_header::ConnectionId;
    use crate::packet_id::PacketId;
    use crate::stream_id::StreamId;
    use bytes::Bytes;
    use rstest::rstest;

    fn frame(stream_id: u64, offset: u64, fin: bool, payload: &[u8]) -> StreamFrame {
        StreamFrame {
            stream_id: StreamId::from_raw(stream_id),
            offset,
            fin,
            payload: Bytes::copy_from_slice(payload),
        }
    }

    fn packet(packet_number: u64, connection_id: u64, frames: Vec<StreamFrame>) -> Packet {
        Packet {
            header: PacketHeader::new(PacketId::from_raw(packet_number), ConnectionId::from_raw(connection_id)),
            frames,
        }
    }

    #[test]
    fn test_encode() {
        let packet = packet(2, 1, vec![frame(0, 0, true, b"ab")]);

        let expected = vec![
            0,0,0,0,0,0,0,2, 0,0,0,0,0,0,0,1,           // header
            0,0,0,0,0,0,0,0, 0,0,0,0,0,0,0,0, 0,0,0,2, 1, 97,98, // frame
        ];
        assert_eq!(packet.encode(64).unwrap().as_ref(), expected.as_slice());
    }

    #[rstest]
    #[case::header_only(packet(0, 0, vec![]))]
    #[case::single_frame(packet(1, 0, vec![frame(0, 0, true, b"HELLO WORLD")]))]
    #[case::several_frames(packet(7, 1, vec![
        frame(0, 0, false, b"abc"),
        frame(4, 100, false, b"defg"),
        frame(0, 3, true, b""),
    ]))]
    fn test_encode_roundtrip(#[case] packet: Packet) {
        let encoded = packet.encode(2000).unwrap();
        assert_eq!(encoded.len(), packet.encoded_len());

        let decoded = Packet::decode(&encoded).unwrap();
        assert_eq!(decoded, packet);
    }

    #[rstest]
    #[case::fits_exactly(21 + 16, true)]
    #[case::one_byte_short(21 + 16 - 1, false)]
    #[case::plenty(2000, true)]
    fn test_encode_size_bound(#[case] max_packet_size: usize, #[case] expected_ok: bool) {
        let packet = packet(1, 1, vec![frame(0, 0, false, b"")]);

        match packet.encode(max_packet_size) {
            Ok(buf) => {
                assert!(expected_ok);
                assert!(buf.len() <= max_packet_size);
            }
            Err(TransportError::PacketTooLarge { size, max }) => {
                assert!(!expected_ok);
                assert_eq!(size, 37);
                assert_eq!(max, max_packet_size);
            }
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    #[test]
    fn test_decode_trailing_garbage() {
        let packet = packet(1, 1, vec![frame(0, 0, false, b"abc")]);
        let mut encoded = packet.encode(2000).unwrap().to_vec();
        encoded.extend_from_slice(&[1, 2, 3]); // not a complete frame

        assert!(matches!(Packet::decode(&encoded), Err(TransportError::TruncatedFrame)));
    }

    #[test]
    fn test_decode_short_header() {
        assert!(matches!(Packet::decode(&[0; 10]), Err(TransportError::TruncatedHeader)));
    }
}
