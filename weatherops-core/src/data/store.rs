//! The observation store: single source of truth for training and serving.
//!
//! Layout: one flat CSV file, one row per timestamp, ascending, rewritten in
//! full on every merge.
//!
//! Guarantees:
//! - Merge is idempotent and last-write-wins per timestamp (incoming rows win)
//! - Writes are atomic (write to .tmp, rename into place)
//! - At most one writer at a time, enforced by a lock file held for the whole
//!   load → merge → write sequence
//! - Rows that violate the observation invariants never reach the file
//! - Readers never take the lock and may observe a stale snapshot

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use super::frame::{observations_to_frame, read_csv, write_csv_atomic};
use super::ingest::{observations_from_frame, validate_non_negative};
use super::provider::DataError;
use crate::domain::Observation;

/// Merge `incoming` into `existing`.
///
/// Every distinct timestamp of either input appears exactly once, sorted
/// ascending. When a timestamp occurs in both, the incoming row wins; within
/// `incoming` itself, the later row wins.
pub fn merge(existing: &[Observation], incoming: &[Observation]) -> Vec<Observation> {
    let mut by_timestamp: BTreeMap<NaiveDate, Observation> = BTreeMap::new();
    for obs in existing.iter().chain(incoming) {
        by_timestamp.insert(obs.timestamp, obs.clone());
    }
    by_timestamp.into_values().collect()
}

/// What a merge did to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Rows in the upload.
    pub received: usize,
    /// Timestamps that were not in the store before.
    pub added: usize,
    /// Timestamps that existed and were overwritten.
    pub replaced: usize,
    /// Rows in the store after the merge.
    pub total: usize,
}

/// Persistent, lock-guarded observation store.
#[derive(Debug, Clone)]
pub struct ObservationStore {
    path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
    stale_lock_after: Duration,
}

impl ObservationStore {
    pub fn new(path: impl Into<PathBuf>, lock_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_path: lock_path.into(),
            lock_timeout: Duration::from_secs(10),
            stale_lock_after: Duration::from_secs(10 * 60),
        }
    }

    /// Override how long a writer waits for the lock, and when a lock is
    /// considered abandoned.
    pub fn with_lock_timing(mut self, timeout: Duration, stale_after: Duration) -> Self {
        self.lock_timeout = timeout;
        self.stale_lock_after = stale_after;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load every stored observation, ascending. A missing store is empty.
    pub fn load(&self) -> Result<Vec<Observation>, DataError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let df = read_csv(&self.path)?;
        let mut observations = observations_from_frame(df)?;
        observations.sort_by_key(|o| o.timestamp);
        Ok(observations)
    }

    /// Merge `incoming` into the store and persist the result.
    ///
    /// Holds the writer lock from load to rename. On any error the previous
    /// file is left untouched.
    pub fn upsert(&self, incoming: &[Observation]) -> Result<MergeOutcome, DataError> {
        validate_non_negative(incoming)?;
        let _guard = StoreLock::acquire(&self.lock_path, self.lock_timeout, self.stale_lock_after)?;

        let existing = self.load()?;
        let before: BTreeSet<NaiveDate> =
            existing.iter().map(|o| o.timestamp).collect();
        let merged = merge(&existing, incoming);

        let incoming_dates: BTreeSet<NaiveDate> =
            incoming.iter().map(|o| o.timestamp).collect();
        let replaced = incoming_dates.iter().filter(|d| before.contains(d)).count();
        let added = incoming_dates.len() - replaced;

        let df = observations_to_frame(&merged)?;
        write_csv_atomic(&df, &self.path)?;

        tracing::debug!(
            store = %self.path.display(),
            added,
            replaced,
            total = merged.len(),
            "observation store updated"
        );

        Ok(MergeOutcome {
            received: incoming.len(),
            added,
            replaced,
            total: merged.len(),
        })
    }
}

/// Exclusive writer lock backed by a `create_new` lock file.
///
/// The file holds a token unique to this guard, and only the guard whose
/// token is in the file removes it on drop. A lock older than `stale_after`
/// is broken by one writer at a time.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
    token: String,
}

static LOCK_SEQ: AtomicU64 = AtomicU64::new(0);

fn lock_token() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!(
        "{}-{nanos}-{}",
        std::process::id(),
        LOCK_SEQ.fetch_add(1, Ordering::Relaxed)
    )
}

impl StoreLock {
    pub fn acquire(path: &Path, timeout: Duration, stale_after: Duration) -> Result<Self, DataError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| DataError::Store(format!("create {}: {e}", parent.display())))?;
            }
        }

        let token = lock_token();
        let started = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    let guard = Self {
                        path: path.to_path_buf(),
                        token,
                    };
                    file.write_all(guard.token.as_bytes())
                        .and_then(|()| file.sync_all())
                        .map_err(|e| DataError::Store(format!("lock {}: {e}", path.display())))?;
                    return Ok(guard);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if let Some(seen) = stale_contents(path, stale_after) {
                        if break_stale_lock(path, &seen, &token, stale_after) {
                            tracing::warn!(lock = %path.display(), "broke stale store lock");
                            continue;
                        }
                    }
                    if started.elapsed() >= timeout {
                        return Err(DataError::StoreLocked {
                            path: path.display().to_string(),
                            waited_ms: started.elapsed().as_millis() as u64,
                        });
                    }
                    thread::sleep(Duration::from_millis(25));
                }
                Err(e) => {
                    return Err(DataError::Store(format!("lock {}: {e}", path.display())));
                }
            }
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let owned = fs::read_to_string(&self.path).is_ok_and(|held| held == self.token);
        if owned {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Contents of the lock file when it is older than `stale_after`.
fn stale_contents(path: &Path, stale_after: Duration) -> Option<String> {
    if !lock_is_stale(path, stale_after) {
        return None;
    }
    fs::read_to_string(path).ok()
}

/// Move a stale lock out of the way.
///
/// Breakers are serialized by a `<lock>.break` file, and the lock is only
/// moved while it still holds the stale contents that were observed. Returns
/// false when another writer is breaking it or it changed in the meantime.
fn break_stale_lock(path: &Path, seen: &str, token: &str, stale_after: Duration) -> bool {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "store.lock".into());
    let breaker = path.with_file_name(format!("{file_name}.break"));
    if OpenOptions::new().write(true).create_new(true).open(&breaker).is_err() {
        // A breaker that died mid-break leaves its marker behind.
        if lock_is_stale(&breaker, stale_after) {
            let _ = fs::remove_file(&breaker);
        }
        return false;
    }

    let still_stale = fs::read_to_string(path).is_ok_and(|held| held == seen)
        && lock_is_stale(path, stale_after);
    let broken = still_stale && {
        let aside = path.with_file_name(format!("{file_name}.stale-{token}"));
        match fs::rename(path, &aside) {
            Ok(()) => {
                let unchanged = fs::read_to_string(&aside).is_ok_and(|held| held == seen);
                // A live lock moved by mistake goes back; hard_link never clobbers.
                if !unchanged && fs::hard_link(&aside, path).is_err() {
                    tracing::warn!(lock = %path.display(), "could not restore a live store lock");
                }
                let _ = fs::remove_file(&aside);
                unchanged
            }
            Err(_) => false,
        }
    };

    let _ = fs::remove_file(&breaker);
    broken
}

fn lock_is_stale(path: &Path, stale_after: Duration) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age >= stale_after)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};

    fn obs(day: u32, temp: f64) -> Observation {
        let mut o = Observation::empty(NaiveDate::from_ymd_opt(2024, 3, day).unwrap());
        o.avg_temp = Some(temp);
        o.min_temp = Some(temp - 5.0);
        o.max_temp = Some(temp + 5.0);
        o.precipitation = Some(0.0);
        o.wind_speed = Some(10.0);
        o
    }

    fn store_in(dir: &Path) -> ObservationStore {
        ObservationStore::new(dir.join("raw.csv"), dir.join("raw.lock"))
    }

    #[test]
    fn merge_sorts_and_deduplicates() {
        let existing = vec![obs(3, 20.0), obs(1, 18.0)];
        let incoming = vec![obs(2, 19.0), obs(3, 25.0)];

        let merged = merge(&existing, &incoming);

        let days: Vec<u32> = merged.iter().map(|o| chrono::Datelike::day(&o.timestamp)).collect();
        assert_eq!(days, vec![1, 2, 3]);
        // Incoming row wins on conflict
        assert_eq!(merged[2].avg_temp, Some(25.0));
    }

    #[test]
    fn merge_is_idempotent() {
        let store = vec![obs(1, 18.0), obs(2, 19.0)];
        let delta = vec![obs(2, 30.0), obs(3, 21.0)];

        let once = merge(&store, &delta);
        let twice = merge(&store, &once);
        assert_eq!(once, twice);

        let again = merge(&once, &delta);
        assert_eq!(once, again);
    }

    #[test]
    fn later_row_in_same_upload_wins() {
        let merged = merge(&[], &[obs(1, 10.0), obs(1, 11.0)]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].avg_temp, Some(11.0));
    }

    #[test]
    fn missing_store_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(store_in(dir.path()).load().unwrap().is_empty());
    }

    #[test]
    fn upsert_persists_and_reports_counts() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let first = store.upsert(&[obs(1, 18.0), obs(2, 19.0)]).unwrap();
        assert_eq!(first.added, 2);
        assert_eq!(first.replaced, 0);
        assert_eq!(first.total, 2);

        let second = store.upsert(&[obs(2, 22.0), obs(3, 20.0)]).unwrap();
        assert_eq!(second.added, 1);
        assert_eq!(second.replaced, 1);
        assert_eq!(second.total, 3);

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[1].avg_temp, Some(22.0));
        assert!(!dir.path().join("raw.lock").exists());
    }

    #[test]
    fn repeated_upload_does_not_duplicate_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let delta = vec![obs(1, 18.0), obs(2, 19.0)];

        store.upsert(&delta).unwrap();
        let outcome = store.upsert(&delta).unwrap();

        assert_eq!(outcome.added, 0);
        assert_eq!(store.load().unwrap().len(), 2);
    }

    #[test]
    fn held_lock_times_out_other_writers() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("raw.lock");
        let _held =
            StoreLock::acquire(&lock_path, Duration::from_secs(1), Duration::from_secs(600)).unwrap();

        let store = store_in(dir.path())
            .with_lock_timing(Duration::from_millis(100), Duration::from_secs(600));
        let err = store.upsert(&[obs(1, 18.0)]).unwrap_err();
        assert!(matches!(err, DataError::StoreLocked { .. }));
        assert!(!store.exists());
    }

    #[test]
    fn stale_lock_is_broken() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("raw.lock"), "999999").unwrap();

        let store =
            store_in(dir.path()).with_lock_timing(Duration::from_millis(100), Duration::ZERO);
        store.upsert(&[obs(1, 18.0)]).unwrap();
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[test]
    fn concurrent_writers_never_lose_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store_in(dir.path()));
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4u32)
            .map(|i| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    store.upsert(&[obs(i + 1, 10.0 + i as f64)]).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(store.load().unwrap().len(), 4);
    }

    #[test]
    fn writers_racing_a_stale_lock_never_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("raw.lock");
        fs::write(&lock_path, "dead-writer").unwrap();
        let an_hour_ago = SystemTime::now() - Duration::from_secs(3600);
        fs::File::options()
            .write(true)
            .open(&lock_path)
            .unwrap()
            .set_modified(an_hour_ago)
            .unwrap();

        let store = Arc::new(
            store_in(dir.path()).with_lock_timing(Duration::from_secs(20), Duration::from_secs(60)),
        );
        let writers = 6u32;
        let barrier = Arc::new(Barrier::new(writers as usize));
        let handles: Vec<_> = (0..writers)
            .map(|i| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    store.upsert(&[obs(i + 1, 10.0 + i as f64)]).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(store.load().unwrap().len(), writers as usize);
        assert!(!lock_path.exists());
        let leftovers: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with("raw.lock."))
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[test]
    fn guard_leaves_a_lock_it_does_not_own() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("raw.lock");
        let guard =
            StoreLock::acquire(&lock_path, Duration::from_secs(1), Duration::from_secs(600)).unwrap();
        assert_eq!(fs::read_to_string(&lock_path).unwrap(), guard.token());

        fs::write(&lock_path, "another-writer").unwrap();
        drop(guard);
        assert_eq!(fs::read_to_string(&lock_path).unwrap(), "another-writer");
    }

    #[test]
    fn fresh_lock_is_not_broken() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("raw.lock");
        let held =
            StoreLock::acquire(&lock_path, Duration::from_secs(1), Duration::from_secs(600)).unwrap();

        let err = StoreLock::acquire(&lock_path, Duration::from_millis(80), Duration::from_secs(600))
            .unwrap_err();
        assert!(matches!(err, DataError::StoreLocked { .. }));
        assert_eq!(fs::read_to_string(&lock_path).unwrap(), held.token());
    }

    #[test]
    fn negative_values_never_reach_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.upsert(&[obs(1, 18.0)]).unwrap();

        let mut bad = obs(2, 19.0);
        bad.precipitation = Some(-1.0);
        let err = store.upsert(&[bad]).unwrap_err();

        assert!(matches!(err, DataError::Validation(_)));
        assert_eq!(store.load().unwrap().len(), 1);
        assert!(!dir.path().join("raw.lock").exists());
    }
}
