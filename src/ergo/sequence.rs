//! Message id counter embedded in every command frame.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Lowest id handed out after a re-seed.
pub const MESSAGE_ID_MIN: u16 = 1000;
/// Ids never reach this value.
pub const MESSAGE_ID_MAX: u16 = 64000;

struct SequenceState {
    last: u16,
    rng: fastrand::Rng,
}

/// Monotonic message id generator.
///
/// The first call, and any call where the counter has reached
/// [`MESSAGE_ID_MAX`], re-seeds to a random value in
/// `[MESSAGE_ID_MIN, MESSAGE_ID_MAX)`. Otherwise each id is one more than the
/// previous one.
pub struct MessageSequence {
    state: Mutex<SequenceState>,
}

impl MessageSequence {
    pub fn new() -> Self {
        Self::from_rng(fastrand::Rng::new())
    }

    /// Deterministic seeding, for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(fastrand::Rng::with_seed(seed))
    }

    /// Start counting from `next`; the first call returns `next` unless it is
    /// out of range, in which case it re-seeds.
    pub fn starting_at(next: u16) -> Self {
        Self {
            state: Mutex::new(SequenceState {
                last: next,
                rng: fastrand::Rng::new(),
            }),
        }
    }

    fn from_rng(rng: fastrand::Rng) -> Self {
        Self {
            state: Mutex::new(SequenceState { last: 0, rng }),
        }
    }

    /// Process-wide instance shared by dispatchers that are not given one.
    pub fn global() -> Arc<MessageSequence> {
        static GLOBAL: OnceLock<Arc<MessageSequence>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(MessageSequence::new())).clone()
    }

    /// Hand out the next id.
    pub fn next_id(&self) -> u16 {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.last < MESSAGE_ID_MIN || state.last >= MESSAGE_ID_MAX {
            state.last = state.rng.u16(MESSAGE_ID_MIN..MESSAGE_ID_MAX);
        }
        let id = state.last;
        state.last += 1;
        id
    }
}

impl Default for MessageSequence {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_id_in_range() {
        for seed in 0..200 {
            let id = MessageSequence::with_seed(seed).next_id();
            assert!((MESSAGE_ID_MIN..MESSAGE_ID_MAX).contains(&id), "seed {seed} gave {id}");
        }
    }

    #[test]
    fn test_ids_increment_by_one() {
        let seq = MessageSequence::starting_at(5000);
        assert_eq!(seq.next_id(), 5000);
        assert_eq!(seq.next_id(), 5001);
        assert_eq!(seq.next_id(), 5002);
    }

    #[test]
    fn test_reseed_at_upper_bound() {
        let seq = MessageSequence::starting_at(MESSAGE_ID_MAX - 2);
        assert_eq!(seq.next_id(), MESSAGE_ID_MAX - 2);
        assert_eq!(seq.next_id(), MESSAGE_ID_MAX - 1);

        let reseeded = seq.next_id();
        assert!((MESSAGE_ID_MIN..MESSAGE_ID_MAX).contains(&reseeded));
        if reseeded < MESSAGE_ID_MAX - 1 {
            assert_eq!(seq.next_id(), reseeded + 1);
        }
    }

    #[test]
    fn test_never_zero_over_many_calls() {
        let seq = MessageSequence::with_seed(42);
        for _ in 0..200_000 {
            let id = seq.next_id();
            assert_ne!(id, 0);
            assert!(id < MESSAGE_ID_MAX);
        }
    }

    #[test]
    fn test_global_is_shared() {
        let a = MessageSequence::global();
        let b = MessageSequence::global();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
