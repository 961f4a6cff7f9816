//! File-backed feature id allocation, safe across processes on one host.
//!
//! The counter file holds a single non-negative integer followed by a
//! newline. Every allocation runs under an exclusive advisory lock on a
//! sidecar `<counter>.lock` file:
//!
//! lock → read → increment → durable write (temp file + rename) → unlock
//!
//! The lock is an RAII guard, so any error after acquisition still releases
//! it. Guarantees hold for processes sharing one kernel; networked
//! filesystems with different locking semantics are not covered.

use crate::error::{Result, SpecflowError};
use crate::paths;
use fs2::FileExt;
use std::collections::hash_map::RandomState;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::hash::{BuildHasher, Hasher};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_ID_WIDTH: usize = 3;
/// Digits in `u64::MAX`; wider padding could only add leading zeros.
pub const MAX_ID_WIDTH: usize = 20;

const BACKOFF_BASE: Duration = Duration::from_millis(2);
const BACKOFF_CAP: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// FeatureId
// ---------------------------------------------------------------------------

/// An allocated id, rendered zero-padded to a fixed width (`007`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureId {
    value: u64,
    width: usize,
}

impl FeatureId {
    /// `width` is clamped to [`MAX_ID_WIDTH`].
    pub fn new(value: u64, width: usize) -> Self {
        Self {
            value,
            width: width.min(MAX_ID_WIDTH),
        }
    }

    pub fn value(self) -> u64 {
        self.value
    }

    pub fn width(self) -> usize {
        self.width
    }

    /// Numeric prefix of a feature directory name: `"012-login"` → `12`.
    pub fn parse_prefix(dir_name: &str) -> Option<u64> {
        let (digits, rest) = dir_name.split_once('-')?;
        if digits.is_empty() || rest.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$}", self.value, width = self.width)
    }
}

// ---------------------------------------------------------------------------
// Allocation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allocation {
    Fresh(FeatureId),
    /// The counter was unreadable and restarted from zero before allocating.
    Repaired(FeatureId),
}

impl Allocation {
    pub fn id(self) -> FeatureId {
        match self {
            Allocation::Fresh(id) | Allocation::Repaired(id) => id,
        }
    }

    pub fn was_repaired(self) -> bool {
        matches!(self, Allocation::Repaired(_))
    }
}

// ---------------------------------------------------------------------------
// IdAllocator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct IdAllocator {
    counter: PathBuf,
    lock_timeout: Duration,
    width: usize,
}

impl IdAllocator {
    pub fn new(counter: impl Into<PathBuf>) -> Self {
        Self {
            counter: counter.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            width: DEFAULT_ID_WIDTH,
        }
    }

    /// The project's allocator, configured from `.specflow/config.yaml` values.
    pub fn for_project(root: &Path, ids: &crate::config::IdConfig) -> Self {
        Self::new(paths::counter_path(root))
            .with_lock_timeout(Duration::from_millis(ids.lock_timeout_ms))
            .with_width(ids.width)
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width.min(MAX_ID_WIDTH);
        self
    }

    pub fn counter_path(&self) -> &Path {
        &self.counter
    }

    /// Allocate the next id. Blocks at most the lock timeout.
    pub fn next(&self) -> Result<Allocation> {
        let _lock = CounterLock::acquire(&paths::lock_path_for(&self.counter), self.lock_timeout)?;

        let (current, repaired) = self.read_counter()?;
        let next = current.checked_add(1).ok_or_else(|| SpecflowError::CounterOverflow {
            path: self.counter.clone(),
            value: current,
        })?;
        crate::io::durable_write(&self.counter, format!("{next}\n").as_bytes())?;

        let id = FeatureId::new(next, self.width);
        tracing::debug!(counter = %self.counter.display(), id = %id, "allocated feature id");
        Ok(if repaired {
            Allocation::Repaired(id)
        } else {
            Allocation::Fresh(id)
        })
    }

    /// Last allocated value, without allocating. An unreadable counter reads as 0.
    pub fn current(&self) -> Result<u64> {
        let _lock = CounterLock::acquire(&paths::lock_path_for(&self.counter), self.lock_timeout)?;
        Ok(self.read_counter()?.0)
    }

    /// Raise the counter to at least `floor`. Never lowers it. Returns the
    /// value in effect afterwards.
    pub fn seed(&self, floor: u64) -> Result<u64> {
        let _lock = CounterLock::acquire(&paths::lock_path_for(&self.counter), self.lock_timeout)?;
        let (current, repaired) = self.read_counter()?;
        if floor > current || (repaired && floor == current) {
            crate::io::durable_write(&self.counter, format!("{floor}\n").as_bytes())?;
            tracing::info!(counter = %self.counter.display(), from = current, to = floor, "seeded feature counter");
            return Ok(floor);
        }
        Ok(current)
    }

    /// Read the persisted value. Returns `(value, repaired)`; a missing file is
    /// a fresh counter, unparseable content is corruption and restarts at 0.
    fn read_counter(&self) -> Result<(u64, bool)> {
        let raw = match std::fs::read_to_string(&self.counter) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((0, false)),
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                self.warn_corrupt("not valid UTF-8");
                return Ok((0, true));
            }
            Err(e) => return Err(e.into()),
        };
        match raw.trim().parse::<u64>() {
            Ok(v) if !raw.trim().starts_with('+') => Ok((v, false)),
            _ => {
                self.warn_corrupt(&format!("unparseable content {:?}", truncate(&raw, 32)));
                Ok((0, true))
            }
        }
    }

    fn warn_corrupt(&self, detail: &str) {
        tracing::warn!(
            counter = %self.counter.display(),
            detail,
            "feature counter unreadable; resetting to 0"
        );
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

// ---------------------------------------------------------------------------
// CounterLock
// ---------------------------------------------------------------------------

/// Exclusive advisory lock on the sidecar file, released on drop.
struct CounterLock {
    file: File,
    path: PathBuf,
}

impl CounterLock {
    fn acquire(path: &Path, timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let start = Instant::now();
        let mut attempt = 0u32;
        loop {
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => {
                    return Ok(Self {
                        file,
                        path: path.to_path_buf(),
                    })
                }
                Err(e) if is_contended(&e) => {}
                Err(e) => return Err(e.into()),
            }

            let waited = start.elapsed();
            if waited >= timeout {
                tracing::warn!(lock = %path.display(), ?waited, "feature counter lock timed out");
                return Err(SpecflowError::LockTimeout {
                    path: path.to_path_buf(),
                    waited,
                });
            }
            std::thread::sleep(backoff(attempt).min(timeout - waited));
            attempt = attempt.saturating_add(1);
        }
    }
}

impl Drop for CounterLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(lock = %self.path.display(), error = %e, "failed to release counter lock");
        }
    }
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// Exponential backoff with jitter so contending processes spread out.
fn backoff(attempt: u32) -> Duration {
    let base = BACKOFF_BASE
        .saturating_mul(1u32 << attempt.min(6))
        .min(BACKOFF_CAP);
    let half_ms = (base.as_millis() as u64 / 2).max(1);
    let jitter = RandomState::new().build_hasher().finish() % (half_ms + 1);
    base + Duration::from_millis(jitter)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn allocator(dir: &TempDir) -> IdAllocator {
        IdAllocator::new(dir.path().join(".specflow/feature-counter"))
            .with_lock_timeout(Duration::from_secs(30))
    }

    fn concurrent_next(alloc: &IdAllocator, callers: usize) -> Vec<u64> {
        let alloc = Arc::new(alloc.clone());
        let handles: Vec<_> = (0..callers)
            .map(|_| {
                let alloc = Arc::clone(&alloc);
                std::thread::spawn(move || alloc.next().unwrap().id().value())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    }

    #[test]
    fn first_allocation_is_one_and_persisted() {
        let dir = TempDir::new().unwrap();
        let alloc = allocator(&dir);
        let a = alloc.next().unwrap();
        assert_eq!(a, Allocation::Fresh(FeatureId::new(1, 3)));
        assert_eq!(a.id().to_string(), "001");
        assert_eq!(std::fs::read_to_string(alloc.counter_path()).unwrap(), "1\n");
        assert_eq!(alloc.current().unwrap(), 1);
    }

    #[test]
    fn padded_counter_three_concurrent_callers() {
        let dir = TempDir::new().unwrap();
        let alloc = allocator(&dir);
        std::fs::create_dir_all(alloc.counter_path().parent().unwrap()).unwrap();
        std::fs::write(alloc.counter_path(), "0007").unwrap();

        let got: BTreeSet<u64> = concurrent_next(&alloc, 3).into_iter().collect();
        assert_eq!(got, BTreeSet::from([8, 9, 10]));
        assert_eq!(std::fs::read_to_string(alloc.counter_path()).unwrap(), "10\n");
    }

    #[test]
    fn fifty_concurrent_callers_get_consecutive_unique_values() {
        let dir = TempDir::new().unwrap();
        let alloc = allocator(&dir);
        alloc.seed(41).unwrap();

        let got = concurrent_next(&alloc, 50);
        let unique: BTreeSet<u64> = got.iter().copied().collect();
        assert_eq!(unique.len(), 50, "duplicates in {got:?}");
        assert_eq!(unique, (42..=91).collect::<BTreeSet<u64>>());
        assert_eq!(alloc.current().unwrap(), 91);
    }

    #[test]
    fn garbage_counter_is_repaired_from_zero() {
        let dir = TempDir::new().unwrap();
        let alloc = allocator(&dir);
        std::fs::create_dir_all(alloc.counter_path().parent().unwrap()).unwrap();
        std::fs::write(alloc.counter_path(), "not a number\n").unwrap();

        assert_eq!(alloc.next().unwrap(), Allocation::Repaired(FeatureId::new(1, 3)));
        assert_eq!(alloc.next().unwrap(), Allocation::Fresh(FeatureId::new(2, 3)));
    }

    #[test]
    fn empty_negative_and_binary_counters_are_corruption() {
        let dir = TempDir::new().unwrap();
        let alloc = allocator(&dir);
        std::fs::create_dir_all(alloc.counter_path().parent().unwrap()).unwrap();
        let cases: [&[u8]; 4] = [b"", b"-4\n", b"+4\n", b"\xff\xfe"];
        for content in cases {
            std::fs::write(alloc.counter_path(), content).unwrap();
            assert!(alloc.next().unwrap().was_repaired(), "{content:?}");
        }
    }

    #[test]
    fn contended_lock_times_out_then_recovers() {
        let dir = TempDir::new().unwrap();
        let alloc = allocator(&dir).with_lock_timeout(Duration::from_millis(50));
        let lock_path = paths::lock_path_for(alloc.counter_path());
        std::fs::create_dir_all(lock_path.parent().unwrap()).unwrap();

        let holder = File::create(&lock_path).unwrap();
        FileExt::lock_exclusive(&holder).unwrap();

        let started = Instant::now();
        let err = alloc.next().unwrap_err();
        assert!(matches!(err, SpecflowError::LockTimeout { .. }), "{err}");
        assert!(err.is_retryable());
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!alloc.counter_path().exists(), "nothing persisted on timeout");

        FileExt::unlock(&holder).unwrap();
        assert_eq!(alloc.next().unwrap().id().value(), 1);
    }

    #[test]
    fn lock_is_released_when_allocation_fails() {
        let dir = TempDir::new().unwrap();
        let alloc = allocator(&dir).with_lock_timeout(Duration::from_millis(200));
        // A directory where the counter should be makes the read fail.
        std::fs::create_dir_all(alloc.counter_path()).unwrap();
        assert!(alloc.next().is_err());

        std::fs::remove_dir(alloc.counter_path()).unwrap();
        assert_eq!(alloc.next().unwrap().id().value(), 1);
    }

    #[test]
    fn overflow_is_an_error_and_leaves_counter_untouched() {
        let dir = TempDir::new().unwrap();
        let alloc = allocator(&dir);
        alloc.seed(u64::MAX).unwrap();
        let err = alloc.next().unwrap_err();
        assert!(matches!(err, SpecflowError::CounterOverflow { .. }));
        assert_eq!(alloc.current().unwrap(), u64::MAX);
    }

    #[test]
    fn seed_never_lowers() {
        let dir = TempDir::new().unwrap();
        let alloc = allocator(&dir);
        assert_eq!(alloc.seed(12).unwrap(), 12);
        assert_eq!(alloc.seed(5).unwrap(), 12);
        assert_eq!(alloc.next().unwrap().id().value(), 13);
    }

    #[test]
    fn feature_id_formatting_and_parsing() {
        assert_eq!(FeatureId::new(7, 3).to_string(), "007");
        assert_eq!(FeatureId::new(1234, 3).to_string(), "1234");
        assert_eq!(FeatureId::new(5, 0).to_string(), "5");
        assert_eq!(FeatureId::parse_prefix("012-login"), Some(12));
        assert_eq!(FeatureId::parse_prefix("0001-a-b"), Some(1));
        assert_eq!(FeatureId::parse_prefix("login"), None);
        assert_eq!(FeatureId::parse_prefix("12"), None);
        assert_eq!(FeatureId::parse_prefix("12-"), None);
        assert_eq!(FeatureId::parse_prefix("x1-login"), None);
    }

    #[test]
    fn oversized_width_is_clamped() {
        let id = FeatureId::new(7, 1_000_000_000);
        assert_eq!(id.width(), MAX_ID_WIDTH);
        assert_eq!(id.to_string(), format!("{:020}", 7));

        let dir = TempDir::new().unwrap();
        let alloc = allocator(&dir).with_width(usize::MAX);
        assert_eq!(alloc.next().unwrap().id().to_string().len(), MAX_ID_WIDTH);
    }
}
