//! Bookkeeping for conversions running in the background
//!
//! A group is typically one download; each job converts one file inside it.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Identifies one conversion
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobKey {
    pub group: String,
    pub path: PathBuf,
}

impl JobKey {
    pub fn new(group: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            group: group.into(),
            path: path.into(),
        }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.path.display())
    }
}

/// Status of a conversion job
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    /// Waiting for a worker
    Queued,
    /// Pages are being rendered
    Active,
    Completed,
    Failed(String),
}

impl JobState {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub state: JobState,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Thread-safe registry of conversion jobs
#[derive(Debug, Default)]
pub struct ConversionTracker {
    jobs: Mutex<HashMap<JobKey, JobRecord>>,
}

impl ConversionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_jobs<T>(&self, f: impl FnOnce(&mut HashMap<JobKey, JobRecord>) -> T) -> T {
        // A poisoned map is still consistent: every update is a single insert or assignment.
        let mut jobs = match self.jobs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut jobs)
    }

    /// Register a job. Returns false if the key is already tracked and unfinished.
    pub fn enqueue(&self, key: JobKey) -> bool {
        self.with_jobs(|jobs| {
            if jobs.get(&key).is_some_and(|r| !r.state.is_finished()) {
                debug!(job = %key, "conversion already tracked");
                return false;
            }
            jobs.insert(
                key,
                JobRecord {
                    state: JobState::Queued,
                    queued_at: Utc::now(),
                    started_at: None,
                    finished_at: None,
                },
            );
            true
        })
    }

    fn transition(&self, key: &JobKey, from_queued: bool, state: JobState) -> bool {
        self.with_jobs(|jobs| match jobs.get_mut(key) {
            Some(record) if !record.state.is_finished() => {
                if from_queued && record.state != JobState::Queued {
                    return false;
                }
                let now = Utc::now();
                if state == JobState::Active {
                    record.started_at = Some(now);
                } else {
                    record.finished_at = Some(now);
                }
                record.state = state;
                true
            }
            _ => {
                warn!(job = %key, ?state, "ignored transition for unknown or finished job");
                false
            }
        })
    }

    /// Mark a queued job as running
    pub fn start(&self, key: &JobKey) -> bool {
        self.transition(key, true, JobState::Active)
    }

    pub fn complete(&self, key: &JobKey) -> bool {
        self.transition(key, false, JobState::Completed)
    }

    pub fn fail(&self, key: &JobKey, reason: impl Into<String>) -> bool {
        self.transition(key, false, JobState::Failed(reason.into()))
    }

    pub fn state(&self, key: &JobKey) -> Option<JobState> {
        self.with_jobs(|jobs| jobs.get(key).map(|r| r.state.clone()))
    }

    pub fn record(&self, key: &JobKey) -> Option<JobRecord> {
        self.with_jobs(|jobs| jobs.get(key).cloned())
    }

    /// Whether a job for `path` in `group` is queued or running
    pub fn is_pending(&self, group: &str, path: &Path) -> bool {
        let key = JobKey::new(group, path);
        self.state(&key).is_some_and(|s| !s.is_finished())
    }

    /// Paths tracked for a group, sorted
    pub fn jobs_in_group(&self, group: &str) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.with_jobs(|jobs| {
            jobs.keys()
                .filter(|k| k.group == group)
                .map(|k| k.path.clone())
                .collect()
        });
        paths.sort();
        paths
    }

    /// Forget every job of a group. Returns how many were removed.
    pub fn clear_group(&self, group: &str) -> usize {
        self.with_jobs(|jobs| {
            let before = jobs.len();
            jobs.retain(|k, _| k.group != group);
            before - jobs.len()
        })
    }

    pub fn len(&self) -> usize {
        self.with_jobs(|jobs| jobs.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_lifecycle() {
        let tracker = ConversionTracker::new();
        let key = JobKey::new("abc123", "book/vol1.djvu");

        assert!(tracker.enqueue(key.clone()));
        assert_eq!(tracker.state(&key), Some(JobState::Queued));
        assert!(tracker.is_pending("abc123", Path::new("book/vol1.djvu")));

        assert!(tracker.start(&key));
        assert!(!tracker.start(&key));
        assert!(tracker.complete(&key));

        let record = tracker.record(&key).unwrap();
        assert_eq!(record.state, JobState::Completed);
        assert!(record.started_at.is_some());
        assert!(record.finished_at.unwrap() >= record.queued_at);
        assert!(!tracker.is_pending("abc123", Path::new("book/vol1.djvu")));
    }

    #[test]
    fn test_duplicate_enqueue_is_refused() {
        let tracker = ConversionTracker::new();
        let key = JobKey::new("abc", "a.djvu");
        assert!(tracker.enqueue(key.clone()));
        assert!(!tracker.enqueue(key.clone()));

        tracker.fail(&key, "decoder error");
        assert_eq!(
            tracker.state(&key),
            Some(JobState::Failed("decoder error".to_string()))
        );
        // finished jobs may be retried
        assert!(tracker.enqueue(key));
    }

    #[test]
    fn test_finished_jobs_do_not_transition() {
        let tracker = ConversionTracker::new();
        let key = JobKey::new("abc", "a.djvu");
        tracker.enqueue(key.clone());
        tracker.complete(&key);
        assert!(!tracker.fail(&key, "late"));
        assert!(!tracker.complete(&JobKey::new("abc", "missing.djvu")));
    }

    #[test]
    fn test_clear_group() {
        let tracker = ConversionTracker::new();
        tracker.enqueue(JobKey::new("one", "a.djvu"));
        tracker.enqueue(JobKey::new("one", "b.djvu"));
        tracker.enqueue(JobKey::new("two", "a.djvu"));

        assert_eq!(
            tracker.jobs_in_group("one"),
            vec![PathBuf::from("a.djvu"), PathBuf::from("b.djvu")]
        );
        assert_eq!(tracker.clear_group("one"), 2);
        assert_eq!(tracker.len(), 1);
        assert!(tracker.jobs_in_group("one").is_empty());
    }

    #[test]
    fn test_concurrent_enqueue_admits_one() {
        let tracker = Arc::new(ConversionTracker::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                thread::spawn(move || tracker.enqueue(JobKey::new("g", "same.djvu")))
            })
            .collect();
        let admitted = handles
            .into_iter()
            .filter_map(|h| h.join().ok())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 1);
    }
}
