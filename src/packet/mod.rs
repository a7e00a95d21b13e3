//! Packet sequencing for the EO network protocol.
//!
//! The server periodically updates the client's "starting counter ID" with
//! one of a few packet types; the client combines it with a rolling 0-9
//! counter to produce the sequence value sent with each packet.

use rand::Rng;

use crate::data::CHAR_MAX;

/// A value sent by the server to update the client's sequence start, also
/// known as the "starting counter ID".
///
/// Each variant corresponds to the server packet that carries it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequenceStart {
    /// The initial sequence start, before the server has provided one.
    Zero,
    /// A sequence start sent with the `ACCOUNT_REPLY` server packet.
    AccountReply {
        /// The sequence start value
        value: i32,
    },
    /// A sequence start sent with the `INIT_INIT` server packet.
    Init {
        /// The sequence start value
        value: i32,
        /// The `seq1` byte value sent with the packet
        seq1: i32,
        /// The `seq2` byte value sent with the packet
        seq2: i32,
    },
    /// A sequence start sent with the `CONNECTION_PLAYER` server packet.
    Ping {
        /// The sequence start value
        value: i32,
        /// The `seq1` short value sent with the packet
        seq1: i32,
        /// The `seq2` char value sent with the packet
        seq2: i32,
    },
}

impl SequenceStart {
    /// Returns a sequence start with a value of 0.
    pub fn zero() -> Self {
        SequenceStart::Zero
    }

    /// Creates a sequence start from the value sent with the `ACCOUNT_REPLY`
    /// server packet.
    pub fn from_account_reply_value(value: i32) -> Self {
        SequenceStart::AccountReply { value }
    }

    /// Generates an `ACCOUNT_REPLY` sequence start with a random value in
    /// the range 0-240.
    pub fn generate_account_reply() -> Self {
        Self::generate_account_reply_with(&mut rand::thread_rng())
    }

    /// Creates a sequence start from the values sent with the `INIT_INIT`
    /// server packet.
    pub fn from_init_values(seq1: i32, seq2: i32) -> Self {
        SequenceStart::Init {
            value: seq1 * 7 + seq2 - 13,
            seq1,
            seq2,
        }
    }

    /// Generates an `INIT_INIT` sequence start with a random value in the
    /// range 0-1757.
    pub fn generate_init() -> Self {
        Self::generate_init_with(&mut rand::thread_rng())
    }

    /// Creates a sequence start from the values sent with the
    /// `CONNECTION_PLAYER` server packet.
    pub fn from_ping_values(seq1: i32, seq2: i32) -> Self {
        SequenceStart::Ping {
            value: seq1 - seq2,
            seq1,
            seq2,
        }
    }

    /// Generates a `CONNECTION_PLAYER` sequence start with a random value in
    /// the range 0-1757.
    pub fn generate_ping() -> Self {
        Self::generate_ping_with(&mut rand::thread_rng())
    }

    /// Returns the sequence start value.
    pub fn value(&self) -> i32 {
        match *self {
            SequenceStart::Zero => 0,
            SequenceStart::AccountReply { value } => value,
            SequenceStart::Init { value, .. } => value,
            SequenceStart::Ping { value, .. } => value,
        }
    }

    /// Returns the `seq1` value sent with the server packet, if the packet
    /// type carries one.
    pub fn seq1(&self) -> Option<i32> {
        match *self {
            SequenceStart::Init { seq1, .. } | SequenceStart::Ping { seq1, .. } => Some(seq1),
            _ => None,
        }
    }

    /// Returns the `seq2` value sent with the server packet, if the packet
    /// type carries one.
    pub fn seq2(&self) -> Option<i32> {
        match *self {
            SequenceStart::Init { seq2, .. } | SequenceStart::Ping { seq2, .. } => Some(seq2),
            _ => None,
        }
    }

    fn generate_account_reply_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        SequenceStart::AccountReply {
            value: rng.gen_range(0..240),
        }
    }

    fn generate_init_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let value = rng.gen_range(0..1757);
        let seq1_max = (value + 13) / 7;
        let seq1_min = ((value - (CHAR_MAX as i32 - 1) + 13 + 6) / 7).max(0);

        let seq1 = rng.gen_range(0..seq1_max - seq1_min) + seq1_min;
        let seq2 = value - seq1 * 7 + 13;

        SequenceStart::Init { value, seq1, seq2 }
    }

    fn generate_ping_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let value = rng.gen_range(0..1757);
        let seq1 = value + rng.gen_range(0..CHAR_MAX as i32 - 1);
        let seq2 = seq1 - value;

        SequenceStart::Ping { value, seq1, seq2 }
    }
}

/// A generator of packet sequences.
#[derive(Clone, Debug)]
pub struct PacketSequencer {
    start: SequenceStart,
    counter: i32,
}

impl PacketSequencer {
    /// Constructs a new `PacketSequencer` with the provided sequence start.
    pub fn new(start: SequenceStart) -> Self {
        PacketSequencer { start, counter: 0 }
    }

    /// Returns the next sequence value, updating the sequence counter in the
    /// process.
    ///
    /// This is not a monotonic operation: the counter increases from 0 to 9
    /// before looping back around to 0.
    pub fn next_sequence(&mut self) -> i32 {
        let result = self.start.value() + self.counter;
        self.counter = (self.counter + 1) % 10;
        result
    }

    /// Sets the sequence start. This does not reset the sequence counter.
    pub fn set_sequence_start(&mut self, start: SequenceStart) {
        self.start = start;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn next_sequence() {
        let mut sequencer = PacketSequencer::new(SequenceStart::from_account_reply_value(123));

        for i in 0..10 {
            assert_eq!(sequencer.next_sequence(), 123 + i);
        }

        assert_eq!(sequencer.next_sequence(), 123);
    }

    #[test]
    fn set_sequence_start_keeps_counter() {
        let mut sequencer = PacketSequencer::new(SequenceStart::from_account_reply_value(100));

        assert_eq!(sequencer.next_sequence(), 100);

        sequencer.set_sequence_start(SequenceStart::from_account_reply_value(200));

        assert_eq!(sequencer.next_sequence(), 201);
    }

    #[test]
    fn zero() {
        assert_eq!(SequenceStart::zero().value(), 0);
        assert_eq!(SequenceStart::zero().seq1(), None);
        assert_eq!(SequenceStart::zero().seq2(), None);
    }

    #[test]
    fn account_reply_from_value() {
        assert_eq!(SequenceStart::from_account_reply_value(22).value(), 22);
    }

    #[test]
    fn account_reply_generate() {
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..100 {
            let start = SequenceStart::generate_account_reply_with(&mut rng);
            assert!((0..240).contains(&start.value()));
        }
    }

    #[test]
    fn init_from_init_values() {
        let start = SequenceStart::from_init_values(110, 122);
        assert_eq!(start.value(), 879);
        assert_eq!(start.seq1(), Some(110));
        assert_eq!(start.seq2(), Some(122));
    }

    #[test]
    fn init_generate() {
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..100 {
            let start = SequenceStart::generate_init_with(&mut rng);
            let (seq1, seq2) = (start.seq1().unwrap(), start.seq2().unwrap());
            assert!((0..1757).contains(&start.value()));
            assert_eq!(start.value(), seq1 * 7 + seq2 - 13);
            assert!((0..253).contains(&seq1));
            assert!((0..253).contains(&seq2));
        }
    }

    #[test]
    fn ping_from_ping_values() {
        let start = SequenceStart::from_ping_values(1005, 126);
        assert_eq!(start.value(), 879);
        assert_eq!(start.seq1(), Some(1005));
        assert_eq!(start.seq2(), Some(126));
    }

    #[test]
    fn ping_generate() {
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..100 {
            let start = SequenceStart::generate_ping_with(&mut rng);
            let (seq1, seq2) = (start.seq1().unwrap(), start.seq2().unwrap());
            assert!((0..1757).contains(&start.value()));
            assert_eq!(start.value(), seq1 - seq2);
            assert!((0..253).contains(&seq2));
        }
    }
}
