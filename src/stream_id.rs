use std::fmt::{Display, Formatter};

/// Identifier of a multiplexed stream. The two low bits are observable
///  metadata: bit 0 is the initiating endpoint, bit 1 the directionality.
///  Ids for locally opened streams are generated from a per-connection
///  counter shifted above these two bits.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct StreamId(u64);

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Direction {
    Bidirectional,
    Unidirectional,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Initiator {
    Client,
    Server,
}

impl Display for StreamId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl StreamId {
    const INITIATOR_BIT: u64 = 0x01;
    const DIRECTION_BIT: u64 = 0x02;

    pub fn from_raw(value: u64) -> StreamId {
        StreamId(value)
    }

    pub fn to_raw(&self) -> u64 {
        self.0
    }

    /// Assemble the id for the `index`-th stream opened by `initiator`.
    pub fn new(index: u64, initiator: Initiator, direction: Direction) -> StreamId {
        let initiator_bit = match initiator {
            Initiator::Client => 0,
            Initiator::Server => Self::INITIATOR_BIT,
        };
        let direction_bit = match direction {
            Direction::Bidirectional => 0,
            Direction::Unidirectional => Self::DIRECTION_BIT,
        };
        StreamId((index << 2) | direction_bit | initiator_bit)
    }

    pub fn initiator(&self) -> Initiator {
        if self.0 & Self::INITIATOR_BIT == 0 {
            Initiator::Client
        }
        else {
            Initiator::Server
        }
    }

    pub fn direction(&self) -> Direction {
        if self.0 & Self::DIRECTION_BIT == 0 {
            Direction::Bidirectional
        }
        else {
            Direction::Unidirectional
        }
    }
}
