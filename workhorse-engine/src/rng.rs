//! Shared uniform random source for every roll the engine makes.
use hmac::{Hmac, Mac};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::Sha256;

const STREAM_TAG: &[u8] = b"workhorse.reliability";

/// Counting wrapper around the engine's single RNG stream.
///
/// Every probability roll, duration draw and quality-trait sample goes through
/// one instance, so a fixed user seed reproduces a whole simulation run.
#[derive(Debug, Clone)]
pub struct SimRng {
    rng: ChaCha20Rng,
    draws: u64,
}

impl SimRng {
    /// Construct the stream from a user-visible seed.
    #[must_use]
    pub fn from_user_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(derive_stream_seed(seed, STREAM_TAG)),
            draws: 0,
        }
    }

    /// Number of draw calls performed against this stream.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.draws
    }

    /// Position inside the ChaCha keystream, in 32-bit words.
    #[must_use]
    pub fn word_pos(&self) -> u128 {
        self.rng.get_word_pos()
    }

    /// Rebuild a stream captured with [`Self::word_pos`] and [`Self::draws`].
    #[must_use]
    pub fn resume(seed: u64, word_pos: u128, draws: u64) -> Self {
        let mut resumed = Self::from_user_seed(seed);
        resumed.rng.set_word_pos(word_pos);
        resumed.draws = draws;
        resumed
    }

    /// Uniform sample in `[0, 1)`.
    pub fn unit(&mut self) -> f32 {
        self.r#gen::<f32>()
    }

    /// Bernoulli trial; chances outside `[0, 1]` saturate instead of panicking.
    pub fn roll(&mut self, chance: f32) -> bool {
        if chance.is_nan() || chance <= 0.0 {
            return false;
        }
        if chance >= 1.0 {
            // Still consume a draw so forced runs stay aligned with natural ones.
            let _ = self.unit();
            return true;
        }
        self.unit() < chance
    }

    /// Uniform duration in `[min, max]` milliseconds (bounds may arrive inverted).
    pub fn duration_ms(&mut self, min: u64, max: u64) -> u64 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        if lo == hi {
            return lo;
        }
        self.gen_range(lo..=hi)
    }

    /// Random steering direction, -1.0 or +1.0.
    pub fn direction(&mut self) -> f32 {
        if self.r#gen::<bool>() { 1.0 } else { -1.0 }
    }

    /// Pick an element uniformly, `None` when the slice is empty.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let idx = self.gen_range(0..items.len());
        items.get(idx)
    }
}

impl RngCore for SimRng {
    fn next_u32(&mut self) -> u32 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.draws = self.draws.saturating_add(1);
        self.rng.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.draws = self.draws.saturating_add(1);
        self.rng.try_fill_bytes(dest)
    }
}

fn derive_stream_seed(user_seed: u64, domain_tag: &[u8]) -> u64 {
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(&user_seed.to_le_bytes()) else {
        return user_seed;
    };
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let mut seed_bytes = [0_u8; 8];
    seed_bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = SimRng::from_user_seed(42);
        let mut b = SimRng::from_user_seed(42);
        for _ in 0..32 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
        assert_eq!(a.draws(), 32);
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = SimRng::from_user_seed(1);
        let mut b = SimRng::from_user_seed(2);
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn resume_continues_the_same_stream() {
        let mut original = SimRng::from_user_seed(99);
        for _ in 0..17 {
            let _ = original.unit();
        }
        let _ = original.next_u64();
        let mut resumed = SimRng::resume(99, original.word_pos(), original.draws());
        assert_eq!(resumed.draws(), original.draws());
        for _ in 0..8 {
            assert_eq!(resumed.next_u64(), original.next_u64());
        }
    }

    #[test]
    fn roll_saturates_out_of_range_chances() {
        let mut rng = SimRng::from_user_seed(7);
        assert!(!rng.roll(0.0));
        assert!(!rng.roll(-2.0));
        assert!(!rng.roll(f32::NAN));
        assert!(rng.roll(1.0));
        assert!(rng.roll(3.5));
    }

    #[test]
    fn duration_accepts_inverted_bounds() {
        let mut rng = SimRng::from_user_seed(9);
        for _ in 0..50 {
            let d = rng.duration_ms(300, 100);
            assert!((100..=300).contains(&d));
        }
        assert_eq!(rng.duration_ms(45_000, 45_000), 45_000);
    }

    #[test]
    fn pick_handles_empty_slice() {
        let mut rng = SimRng::from_user_seed(3);
        let empty: [u8; 0] = [];
        assert!(rng.pick(&empty).is_none());
        assert_eq!(rng.pick(&[5]), Some(&5));
    }
}
