//! Randomness abstracted the same way as the clock, so G's `random` builtin
//! and displacement/tie-break logic can be driven deterministically in
//! tests.

#[cfg(feature = "testing")]
use mockall::automock;

#[cfg_attr(feature = "testing", automock)]
pub trait RandomPort: Send + Sync {
    /// Uniform integer in `[0, upper)`. `upper <= 0` yields `0`.
    fn next_bounded(&self, upper: i64) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRandom;

impl RandomPort for SystemRandom {
    fn next_bounded(&self, upper: i64) -> i64 {
        if upper <= 0 {
            return 0;
        }
        rand::Rng::gen_range(&mut rand::thread_rng(), 0..upper)
    }
}
