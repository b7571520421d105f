// src/sieve/mod.rs
// Sieve of Eratosthenes and the segmented variant used per batch

mod segment;

pub use segment::segment_sieve;

/// All primes `p` with `2 <= p <= n`, ascending.
///
/// Classic sieve of Eratosthenes: O(n log log n) time, O(n) space. Used by the
/// engine only up to `sqrt(high)` of the current batch, so `n` stays small
/// even deep into the `u64` range.
pub fn sieve(n: u64) -> Vec<u64> {
    if n < 2 {
        return Vec::new();
    }

    let len = n as usize + 1;
    let mut is_prime = vec![true; len];
    is_prime[0] = false;
    is_prime[1] = false;

    let limit = n.isqrt() as usize;
    for i in 2..=limit {
        if !is_prime[i] {
            continue;
        }
        for multiple in (i * i..len).step_by(i) {
            is_prime[multiple] = false;
        }
    }

    is_prime
        .iter()
        .enumerate()
        .filter_map(|(value, &prime)| prime.then_some(value as u64))
        .collect()
}

/// Number of decimal digits in `n` (`0` has one digit)
pub fn digit_count(n: u64) -> u32 {
    n.checked_ilog10().map_or(1, |log| log + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_prime_trial(n: u64) -> bool {
        if n < 2 {
            return false;
        }
        (2..).take_while(|d| d * d <= n).all(|d| n % d != 0)
    }

    #[test]
    fn test_sieve_boundaries() {
        assert!(sieve(0).is_empty());
        assert!(sieve(1).is_empty());
        assert_eq!(sieve(2), vec![2]);
        assert_eq!(sieve(3), vec![2, 3]);
    }

    #[test]
    fn test_sieve_small() {
        assert_eq!(sieve(30), vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
        // n itself is included when prime
        assert_eq!(sieve(29).last(), Some(&29));
        assert_eq!(sieve(28).last(), Some(&23));
    }

    #[test]
    fn test_sieve_matches_trial_division() {
        for n in 0..500u64 {
            let expected: Vec<u64> = (0..=n).filter(|&v| is_prime_trial(v)).collect();
            assert_eq!(sieve(n), expected, "mismatch for n = {}", n);
        }
    }

    #[test]
    fn test_sieve_known_count() {
        // pi(10^6)
        assert_eq!(sieve(1_000_000).len(), 78_498);
    }

    #[test]
    fn test_sieve_strictly_increasing() {
        let primes = sieve(10_000);
        assert!(primes.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_digit_count() {
        assert_eq!(digit_count(0), 1);
        assert_eq!(digit_count(7), 1);
        assert_eq!(digit_count(10), 2);
        assert_eq!(digit_count(99), 2);
        assert_eq!(digit_count(1_000_003), 7);
        assert_eq!(digit_count(u64::MAX), 20);
    }
}
