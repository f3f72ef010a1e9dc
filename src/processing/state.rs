//! # In-Flight File Processing Registry
//!
//! Tracks, per [`FileReference`], how many concurrent processing attempts are
//! in flight, and surfaces aggregate liveness metrics.
//!
//! ## Concurrency
//!
//! All mutations are per-key entry operations on a [`DashMap`]; unrelated
//! files never serialize on a shared lock. Aggregate reads
//! ([`ProcessingState::file_count_under_processing`],
//! [`ProcessingState::running_file_processing_max_elapsed`]) are eventually
//! consistent snapshots, which is acceptable for the metrics they feed.
//!
//! Re-entrant `start` calls for the same file are tolerated but logged as a
//! warning: they are a symptom of a misconfigured intake filter, not a
//! supported mode of operation.

use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, error, warn};

use crate::models::FileReference;

/// Processing status of one tracked file.
#[derive(Debug, Clone, Copy)]
struct FileStatus {
    started_at: Instant,
    processing_count: u32,
}

/// Concurrency-safe registry of files currently under processing.
#[derive(Debug, Default)]
pub struct ProcessingState {
    files: DashMap<FileReference, FileStatus>,
}

impl ProcessingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `file` as under processing.
    ///
    /// First `start` for a file creates a status with count 1; re-entrant
    /// calls increment the count atomically.
    pub fn start(&self, file: &FileReference) {
        match self.files.entry(file.clone()) {
            Entry::Occupied(mut occupied) => {
                let status = occupied.get_mut();
                if status.processing_count == 0 {
                    // A zero count is removed by finish(); seeing one here
                    // means the bookkeeping is broken.
                    error!(file = %file, "tracked file has non-positive processing count");
                }
                status.processing_count += 1;
                warn!(
                    file = %file,
                    processing_count = status.processing_count,
                    "file processing started again while already under processing"
                );
            }
            Entry::Vacant(vacant) => {
                vacant.insert(FileStatus {
                    started_at: Instant::now(),
                    processing_count: 1,
                });
                debug!(file = %file, "file processing started");
            }
        }
    }

    /// Release one processing attempt for `file`, removing the entry when
    /// the count reaches zero. A no-op with a warning when `file` is not
    /// tracked.
    pub fn finish(&self, file: &FileReference) {
        match self.files.entry(file.clone()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().processing_count <= 1 {
                    occupied.remove();
                    debug!(file = %file, "file processing finished");
                } else {
                    let status = occupied.get_mut();
                    status.processing_count -= 1;
                    debug!(
                        file = %file,
                        processing_count = status.processing_count,
                        "one of concurrent file processing attempts finished"
                    );
                }
            }
            Entry::Vacant(_) => {
                warn!(file = %file, "finish called for a file not under processing");
            }
        }
    }

    /// Number of files currently tracked. O(1) snapshot, not synchronized
    /// with concurrent `start`/`finish`.
    pub fn file_count_under_processing(&self) -> usize {
        self.files.len()
    }

    /// Elapsed time since the earliest `start` among all tracked files, or
    /// zero when the registry is empty.
    pub fn running_file_processing_max_elapsed(&self) -> Duration {
        let now = Instant::now();
        self.files
            .iter()
            .map(|entry| now.saturating_duration_since(entry.value().started_at))
            .max()
            .unwrap_or(Duration::ZERO)
    }

    /// Whether `file` is currently tracked.
    pub fn is_file_under_processing(&self, file: &FileReference) -> bool {
        self.files.contains_key(file)
    }

    /// Current processing count for `file`, when tracked.
    pub fn processing_count(&self, file: &FileReference) -> Option<u32> {
        self.files.get(file).map(|status| status.processing_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn file(name: &str) -> FileReference {
        FileReference::new("taf", name)
    }

    #[test]
    fn start_and_finish_track_single_file() {
        let state = ProcessingState::new();
        let f1 = file("bulletin1.txt");

        // Scenario A: re-entrant start, then two finishes.
        state.start(&f1);
        state.start(&f1);
        assert_eq!(state.file_count_under_processing(), 1);
        assert_eq!(state.processing_count(&f1), Some(2));

        state.finish(&f1);
        assert_eq!(state.processing_count(&f1), Some(1));
        assert!(state.is_file_under_processing(&f1));

        state.finish(&f1);
        assert_eq!(state.processing_count(&f1), None);
        assert!(!state.is_file_under_processing(&f1));
        assert_eq!(state.file_count_under_processing(), 0);
    }

    #[test]
    fn finish_on_untracked_file_is_noop() {
        let state = ProcessingState::new();
        let f1 = file("bulletin1.txt");
        let f2 = file("bulletin2.txt");

        state.start(&f1);
        state.finish(&f2);

        assert_eq!(state.file_count_under_processing(), 1);
        assert!(state.is_file_under_processing(&f1));
    }

    #[test]
    fn max_elapsed_follows_earliest_tracked_start() {
        let state = ProcessingState::new();
        let f1 = file("first.txt");
        let f2 = file("second.txt");

        state.start(&f1);
        std::thread::sleep(Duration::from_millis(30));
        state.start(&f2);
        std::thread::sleep(Duration::from_millis(10));

        // Finishing the later-started file must not shrink the max elapsed.
        state.finish(&f2);
        let elapsed = state.running_file_processing_max_elapsed();
        assert!(elapsed >= Duration::from_millis(40), "elapsed: {elapsed:?}");
    }

    #[test]
    fn max_elapsed_is_zero_when_registry_is_empty() {
        let state = ProcessingState::new();
        assert_eq!(
            state.running_file_processing_max_elapsed(),
            Duration::ZERO
        );
    }

    #[test]
    fn distinct_files_are_tracked_independently() {
        let state = ProcessingState::new();
        let f1 = file("a.txt");
        let f2 = file("b.txt");

        state.start(&f1);
        state.start(&f2);
        assert_eq!(state.file_count_under_processing(), 2);

        state.finish(&f1);
        assert!(!state.is_file_under_processing(&f1));
        assert!(state.is_file_under_processing(&f2));
    }

    proptest! {
        /// N starts followed by N finishes always leave the registry empty,
        /// and the entry count reflects the start/finish balance throughout.
        #[test]
        fn balanced_start_finish_empties_registry(starts in 1u32..20) {
            let state = ProcessingState::new();
            let f = file("prop.txt");

            for i in 0..starts {
                state.start(&f);
                prop_assert_eq!(state.processing_count(&f), Some(i + 1));
                prop_assert_eq!(state.file_count_under_processing(), 1);
            }
            for i in (0..starts).rev() {
                state.finish(&f);
                if i == 0 {
                    prop_assert_eq!(state.processing_count(&f), None);
                } else {
                    prop_assert_eq!(state.processing_count(&f), Some(i));
                }
            }
            prop_assert!(!state.is_file_under_processing(&f));
            prop_assert_eq!(state.file_count_under_processing(), 0);
        }
    }
}
