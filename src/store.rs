// src/store.rs
// Append-only prime log: one decimal value per line, resumable from the tail

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{PrimeError, Result};

/// Resume point reported when the store holds no usable record (computation starts at 2)
pub const EMPTY_RESUME_POINT: u64 = 1;

/// Bytes read per step of the reverse tail scan
const SCAN_CHUNK: u64 = 4096;

/// A u64 line never needs more than this; past it the scan gives up on the record
const MAX_TAIL_SCAN: usize = 64 * 1024;

/// Durable, append-only log of discovered primes
pub struct PrimeStore {
    path: PathBuf,
    writer: BufWriter<File>,
    cursor: u64,
}

impl PrimeStore {
    /// Open (or create) the store at `path`, repairing an unterminated last line.
    ///
    /// A trailing line without a newline is kept when it parses and is larger
    /// than the line before it; otherwise it is treated as a torn write and cut.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        let tail = read_tail(&mut file)?;
        let resolved = tail.resolve();

        if let Some(partial) = &tail.partial {
            if resolved.partial_accepted {
                warn!(
                    "Terminating unterminated last record in {} ({:?})",
                    path.display(),
                    String::from_utf8_lossy(&partial.bytes)
                );
                file.write_all(b"\n")?;
            } else {
                warn!(
                    "Discarding torn trailing record in {} ({:?})",
                    path.display(),
                    String::from_utf8_lossy(&partial.bytes)
                );
                file.set_len(partial.offset)?;
            }
            file.sync_data()?;
        }

        info!(
            "Opened prime store {} (resume point {})",
            path.display(),
            resolved.value
        );

        Ok(Self {
            path,
            writer: BufWriter::with_capacity(1 << 16, file),
            cursor: resolved.value,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last durably recorded value, or [`EMPTY_RESUME_POINT`] for an empty store
    pub fn resume_point(&self) -> u64 {
        self.cursor
    }

    /// Append `primes` in the given order, one per line, and sync to disk.
    ///
    /// No reordering or deduplication happens here; callers pass only new,
    /// increasing values.
    pub fn append(&mut self, primes: &[u64]) -> Result<()> {
        let Some(&last) = primes.last() else {
            return Ok(());
        };

        for prime in primes {
            writeln!(self.writer, "{}", prime)?;
        }
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;

        self.cursor = last;
        debug!("Appended {} primes (cursor {})", primes.len(), last);
        Ok(())
    }
}

/// Read the resume point of the store at `path` without opening it for writing.
///
/// A missing or empty file gives [`EMPTY_RESUME_POINT`]. Unparsable tail data
/// is logged and also falls back to it; only real I/O failures are errors.
pub fn read_resume_point(path: impl AsRef<Path>) -> Result<u64> {
    let mut file = match File::open(path.as_ref()) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(EMPTY_RESUME_POINT),
        Err(e) => return Err(e.into()),
    };
    Ok(read_tail(&mut file)?.resolve().value)
}

/// First value to test after `resume_point`.
///
/// A store ending at `u64::MAX` has nothing left to search.
pub fn next_value(resume_point: u64) -> Result<u64> {
    resume_point
        .checked_add(1)
        .ok_or(PrimeError::RangeExhausted {
            current: resume_point,
        })
}

/// Iterate the stored values in file order
pub fn read_values(path: impl AsRef<Path>) -> Result<StoredValues> {
    let lines = match File::open(path.as_ref()) {
        Ok(file) => Some(BufReader::new(file).lines()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };
    Ok(StoredValues { lines, line: 0 })
}

/// Streaming reader over a prime store, yielding one value per line
pub struct StoredValues {
    lines: Option<io::Lines<BufReader<File>>>,
    line: u64,
}

impl Iterator for StoredValues {
    type Item = Result<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = match self.lines.as_mut()?.next()? {
            Ok(raw) => raw,
            Err(e) => return Some(Err(e.into())),
        };
        self.line += 1;
        Some(raw.trim().parse::<u64>().map_err(|_| PrimeError::MalformedRecord {
            line: self.line,
            content: raw,
        }))
    }
}

/// Trailing line with no newline after it
struct PartialRecord {
    offset: u64,
    bytes: Vec<u8>,
}

/// The last complete line and the unterminated remainder, if any
struct Tail {
    complete: Option<Vec<u8>>,
    partial: Option<PartialRecord>,
}

struct Resolved {
    value: u64,
    partial_accepted: bool,
}

impl Tail {
    fn resolve(&self) -> Resolved {
        let complete = self.complete.as_deref().map(parse_record);
        let partial = self.partial.as_ref().map(|p| parse_record(&p.bytes));

        let partial_accepted = match (&partial, &complete) {
            (Some(Ok(p)), Some(Ok(c))) => p > c,
            (Some(Ok(_)), _) => true,
            _ => false,
        };

        if partial_accepted {
            if let Some(Ok(value)) = partial {
                return Resolved {
                    value,
                    partial_accepted,
                };
            }
        }

        let value = match complete {
            Some(Ok(value)) => value,
            Some(Err(e)) => {
                warn!("{}; resuming from {}", e, EMPTY_RESUME_POINT + 1);
                EMPTY_RESUME_POINT
            }
            None => EMPTY_RESUME_POINT,
        };
        Resolved {
            value,
            partial_accepted,
        }
    }
}

fn parse_record(bytes: &[u8]) -> Result<u64> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    text.parse::<u64>()
        .map_err(|e| PrimeError::MalformedResumeData(format!("{:?}: {}", text, e)))
}

/// Scan backwards from the end of `file` until the last complete record is known
fn read_tail(file: &mut File) -> io::Result<Tail> {
    let mut pos = file.metadata()?.len();
    let mut buf: Vec<u8> = Vec::new();

    loop {
        let at_start = pos == 0 || buf.len() >= MAX_TAIL_SCAN;
        if let Some(tail) = split_tail(&buf, pos, at_start) {
            return Ok(tail);
        }

        let step = SCAN_CHUNK.min(pos);
        pos -= step;
        let mut chunk = vec![0u8; step as usize];
        file.seek(SeekFrom::Start(pos))?;
        file.read_exact(&mut chunk)?;
        chunk.extend_from_slice(&buf);
        buf = chunk;
    }
}

/// Split `buf` (the file's bytes from offset `pos` to EOF) into its last
/// complete line and unterminated remainder. `None` means more bytes are needed.
fn split_tail(buf: &[u8], pos: u64, at_start: bool) -> Option<Tail> {
    let (terminated, partial) = match buf.last().copied() {
        None if at_start => {
            return Some(Tail {
                complete: None,
                partial: None,
            });
        }
        None => return None,
        Some(b'\n') => (&buf[..buf.len() - 1], None),
        Some(_) => match buf.iter().rposition(|&b| b == b'\n') {
            Some(nl) => (
                &buf[..nl],
                Some(PartialRecord {
                    offset: pos + nl as u64 + 1,
                    bytes: buf[nl + 1..].to_vec(),
                }),
            ),
            None if at_start => {
                return Some(Tail {
                    complete: None,
                    partial: Some(PartialRecord {
                        offset: pos,
                        bytes: buf.to_vec(),
                    }),
                });
            }
            None => return None,
        },
    };

    let complete = match terminated.iter().rposition(|&b| b == b'\n') {
        Some(nl) => terminated[nl + 1..].to_vec(),
        None if at_start => terminated.to_vec(),
        None => return None,
    };

    Some(Tail {
        complete: Some(complete),
        partial,
    })
}
