// src/verify.rs
// Store verification: re-sieve the covered range and diff it against the file

use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::error::{PrimeError, Result};
use crate::sieve::{segment_sieve, sieve};
use crate::store::read_values;

/// First place the store departs from the true sequence of primes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mismatch {
    /// `expected` is prime but the store skipped it and holds `found` instead
    Missing { expected: u64, found: u64 },
    /// `value` is composite, repeated or out of order
    Unexpected { line: u64, value: u64 },
    /// A line that is not a decimal integer
    Malformed { line: u64, content: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    /// Records that matched before the first mismatch
    pub checked: u64,
    /// Largest verified value, if any
    pub last_verified: Option<u64>,
    pub mismatch: Option<Mismatch>,
}

impl VerifyReport {
    pub fn is_contiguous(&self) -> bool {
        self.mismatch.is_none()
    }
}

/// Check that the store at `path` is exactly the primes from 2 up to its last
/// value, with no gaps, repeats or composites. Reference primes are produced
/// in segments of `chunk` numbers.
pub fn verify_store(path: impl AsRef<Path>, chunk: u64) -> Result<VerifyReport> {
    let mut expected = PrimeSequence::new(chunk.max(1));
    let mut report = VerifyReport {
        checked: 0,
        last_verified: None,
        mismatch: None,
    };

    for (index, record) in read_values(path.as_ref())?.enumerate() {
        let line = index as u64 + 1;
        let value = match record {
            Ok(value) => value,
            Err(PrimeError::MalformedRecord { line, content }) => {
                report.mismatch = Some(Mismatch::Malformed { line, content });
                break;
            }
            Err(e) => return Err(e),
        };

        let Some(next) = expected.peek() else {
            report.mismatch = Some(Mismatch::Unexpected { line, value });
            break;
        };
        if value == next {
            expected.advance();
            report.checked += 1;
            report.last_verified = Some(value);
        } else if value > next {
            report.mismatch = Some(Mismatch::Missing {
                expected: next,
                found: value,
            });
            break;
        } else {
            report.mismatch = Some(Mismatch::Unexpected { line, value });
            break;
        }
    }

    info!(
        "Verified {} records in {} (mismatch: {:?})",
        report.checked,
        path.as_ref().display(),
        report.mismatch
    );
    Ok(report)
}

/// Ascending primes from 2, produced one segment at a time
struct PrimeSequence {
    chunk: u64,
    low: u64,
    segment: Vec<u64>,
    position: usize,
}

impl PrimeSequence {
    fn new(chunk: u64) -> Self {
        Self {
            chunk,
            low: 2,
            segment: Vec::new(),
            position: 0,
        }
    }

    fn peek(&mut self) -> Option<u64> {
        while self.position >= self.segment.len() {
            let high = self.low.checked_add(self.chunk)?;
            self.segment = segment_sieve(self.low, high, &sieve(high.isqrt() + 1));
            self.position = 0;
            self.low = high;
        }
        Some(self.segment[self.position])
    }

    fn advance(&mut self) {
        self.position += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_store(dir: &TempDir, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join("primes.txt");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_prime_sequence_spans_segments() {
        let mut seq = PrimeSequence::new(10);
        let mut primes = Vec::new();
        while let Some(p) = seq.peek() {
            if p > 100 {
                break;
            }
            primes.push(p);
            seq.advance();
        }
        assert_eq!(primes, sieve(100));
    }

    #[test]
    fn test_contiguous_store() {
        let dir = TempDir::new().unwrap();
        let path = write_store(&dir, "2\n3\n5\n7\n11\n13\n");
        let report = verify_store(&path, 4).unwrap();
        assert!(report.is_contiguous());
        assert_eq!(report.checked, 6);
        assert_eq!(report.last_verified, Some(13));
    }

    #[test]
    fn test_empty_store_is_contiguous() {
        let dir = TempDir::new().unwrap();
        let report = verify_store(dir.path().join("missing.txt"), 100).unwrap();
        assert!(report.is_contiguous());
        assert_eq!(report.checked, 0);
    }

    #[test]
    fn test_gap_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = write_store(&dir, "2\n3\n7\n");
        assert_eq!(
            verify_store(&path, 100).unwrap().mismatch,
            Some(Mismatch::Missing {
                expected: 5,
                found: 7
            })
        );
    }

    #[test]
    fn test_duplicate_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = write_store(&dir, "2\n3\n3\n5\n");
        assert_eq!(
            verify_store(&path, 100).unwrap().mismatch,
            Some(Mismatch::Unexpected { line: 3, value: 3 })
        );
    }

    #[test]
    fn test_composite_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = write_store(&dir, "2\n3\n5\n7\n9\n11\n");
        // 9 sits below the next prime 11
        assert_eq!(
            verify_store(&path, 100).unwrap().mismatch,
            Some(Mismatch::Unexpected { line: 5, value: 9 })
        );
    }

    #[test]
    fn test_malformed_line_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = write_store(&dir, "2\nthree\n5\n");
        let report = verify_store(&path, 100).unwrap();
        assert_eq!(report.checked, 1);
        assert!(matches!(
            report.mismatch,
            Some(Mismatch::Malformed { line: 2, .. })
        ));
    }
}
