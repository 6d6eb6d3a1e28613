//! Seeded sampling without replacement, shared by subject selection and the
//! evaluation sampler.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

/// Builds a deterministic RNG from a free-form seed string.
pub fn seeded_rng(seed: &str) -> StdRng {
    let digest = md5::compute(seed.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest.0[..8]);
    StdRng::seed_from_u64(u64::from_le_bytes(bytes))
}

/// Draws `size` items uniformly without replacement.
///
/// `None`, or a size at least as large as the input, returns every item in
/// its original order.
pub fn sample_without_replacement<T: Clone, R: Rng + ?Sized>(
    items: &[T],
    size: Option<usize>,
    rng: &mut R,
) -> Vec<T> {
    match size {
        Some(n) if n < items.len() => index::sample(rng, items.len(), n)
            .into_iter()
            .map(|i| items[i].clone())
            .collect(),
        _ => items.to_vec(),
    }
}
