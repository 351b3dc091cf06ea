//! # ids — trade / order identifiers
//!
//! Ids look like `BTCUSDT-3fa91c`: the symbol plus 24 random bits in six
//! lowercase hex digits.  A candidate already used by a position, an order or
//! a history record is drawn again.

use rand::Rng;

/// Width of the random hex suffix.
pub const SUFFIX_HEX_DIGITS: usize = 6;

/// Draw ids from `rng` until `is_taken` rejects none.
pub fn generate_id<R, F>(symbol: &str, rng: &mut R, is_taken: F) -> String
where
    R: Rng + ?Sized,
    F: Fn(&str) -> bool,
{
    loop {
        let suffix: u32 = rng.gen_range(0..(1u32 << (4 * SUFFIX_HEX_DIGITS)));
        let candidate = format!("{symbol}-{suffix:0width$x}", width = SUFFIX_HEX_DIGITS);
        if !is_taken(&candidate) {
            return candidate;
        }
    }
}

/// [`generate_id`] with the thread-local rng.
pub fn next_id<F>(symbol: &str, is_taken: F) -> String
where
    F: Fn(&str) -> bool,
{
    generate_id(symbol, &mut rand::thread_rng(), is_taken)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashSet;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn test_id_shape() {
        let id = next_id("BTCUSDT", |_| false);
        let (symbol, suffix) = id.split_once('-').unwrap();
        assert_eq!(symbol, "BTCUSDT");
        assert_eq!(suffix.len(), SUFFIX_HEX_DIGITS);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_retries_on_collision() {
        // Same seed → same first draw; mark that draw as taken.
        let first = generate_id("ETHUSDT", &mut StdRng::seed_from_u64(7), |_| false);

        let attempts = RefCell::new(0);
        let id = generate_id("ETHUSDT", &mut StdRng::seed_from_u64(7), |c| {
            *attempts.borrow_mut() += 1;
            c == first
        });

        assert_ne!(id, first);
        assert_eq!(*attempts.borrow(), 2);
    }

    #[test]
    fn test_many_draws_stay_unique() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen = HashSet::new();
        for _ in 0..2_000 {
            let id = generate_id("SOLUSDT", &mut rng, |c| seen.contains(c));
            assert!(seen.insert(id));
        }
    }
}
