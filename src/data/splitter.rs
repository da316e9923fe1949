// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Shuffles samples with a seeded RNG and splits them into a
// training set and a validation set. The same seed always gives
// the same split, so a resumed run validates on the same outfits.
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Shuffle `samples` with `seed` and split into (train, validation).
///
/// `train_fraction` is clamped to [0, 1].
pub fn split_train_val<T>(mut samples: Vec<T>, train_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total    = samples.len();
    let fraction = train_fraction.clamp(0.0, 1.0);
    let split_at = (((total as f64) * fraction).round() as usize).min(total);

    let val = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} validation (seed {})",
        samples.len(),
        val.len(),
        seed,
    );

    (samples, val)
}
