// src/sieve/segment.rs
// Segmented sieve over a half-open range

/// All primes in `[low, high)`, ascending.
///
/// `base_primes` must be ascending and contain every prime `<= sqrt(high)`.
/// That is not checked here; a short base set silently lets composites through.
pub fn segment_sieve(low: u64, high: u64, base_primes: &[u64]) -> Vec<u64> {
    if low >= high {
        return Vec::new();
    }

    let len = (high - low) as usize;
    let mut is_prime = vec![true; len];

    for &p in base_primes {
        let Some(square) = p.checked_mul(p) else {
            break;
        };
        if square >= high {
            break;
        }

        // First multiple of p at or above low; none fits in u64 means none in range
        let Some(aligned) = low.div_ceil(p).checked_mul(p) else {
            continue;
        };
        let start = square.max(aligned);
        if start >= high {
            continue;
        }

        for offset in ((start - low) as usize..len).step_by(p as usize) {
            is_prime[offset] = false;
        }
    }

    // 0 and 1 are never reached by a prime's multiples
    for value in low..high.min(2) {
        is_prime[(value - low) as usize] = false;
    }

    is_prime
        .iter()
        .enumerate()
        .filter_map(|(offset, &prime)| prime.then_some(low + offset as u64))
        .collect()
}
