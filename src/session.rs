//! Per-session state: raw form inputs plus the retained analysis.
//!
//! One [`Session`] is passed explicitly through every pipeline step.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Deserialize;
use uuid::Uuid;

use crate::analysis::Analysis;

/// Default number of slides offered by the form
pub const DEFAULT_SLIDE_COUNT: usize = 5;

/// Raw inputs as submitted by the user
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FormInputs {
    pub lang: String,
    pub topic: String,
    pub slide_count: usize,
    pub analysis_content: String,
    pub custom_titles: String,
}

impl Default for FormInputs {
    fn default() -> Self {
        Self {
            lang: String::new(),
            topic: String::new(),
            slide_count: DEFAULT_SLIDE_COUNT,
            analysis_content: String::new(),
            custom_titles: String::new(),
        }
    }
}

/// State scoped to one user session
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub inputs: FormInputs,
    /// Result of the last analysis, kept until overwritten
    pub analysis: Option<Analysis>,
}

impl Session {
    pub fn new(inputs: FormInputs) -> Self {
        Self {
            inputs,
            analysis: None,
        }
    }
}

/// How long an untouched session is kept
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);
/// Most sessions kept at once
pub const DEFAULT_MAX_SESSIONS: usize = 1024;

#[derive(Debug)]
struct Entry {
    session: Session,
    touched: Instant,
    /// Recency order for eviction
    seq: u64,
}

#[derive(Debug, Default)]
struct Sessions {
    entries: HashMap<Uuid, Entry>,
    next_seq: u64,
}

impl Sessions {
    fn bump(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

/// In-memory sessions keyed by id.
///
/// Sessions expire after `ttl` without use; when `capacity` is reached the
/// least recently used one is evicted.
#[derive(Debug)]
pub struct SessionStore {
    inner: Mutex<Sessions>,
    ttl: Duration,
    capacity: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_limits(DEFAULT_SESSION_TTL, DEFAULT_MAX_SESSIONS)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(ttl: Duration, capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Sessions::default()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    /// Snapshot of a live session, refreshing its expiry
    pub fn get(&self, id: &Uuid) -> Option<Session> {
        let mut inner = self.inner.lock();
        let expired = inner.entries.get(id)?.touched.elapsed() >= self.ttl;
        if expired {
            inner.entries.remove(id);
            return None;
        }
        let seq = inner.bump();
        let entry = inner.entries.get_mut(id)?;
        entry.touched = Instant::now();
        entry.seq = seq;
        Some(entry.session.clone())
    }

    /// Store the session state, replacing what was there
    pub fn put(&self, id: Uuid, session: Session) {
        self.update(id, |current| *current = session);
    }

    /// Apply `change` to the stored session under the lock, starting from an
    /// empty session when `id` is unknown or expired.
    pub fn update(&self, id: Uuid, change: impl FnOnce(&mut Session)) {
        let mut inner = self.inner.lock();
        let ttl = self.ttl;
        inner.entries.retain(|_, entry| entry.touched.elapsed() < ttl);
        if !inner.entries.contains_key(&id) {
            while inner.entries.len() >= self.capacity {
                let oldest = inner
                    .entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.seq)
                    .map(|(key, _)| *key);
                match oldest {
                    Some(key) => {
                        tracing::debug!(session = %key, "evicting session");
                        inner.entries.remove(&key);
                    }
                    None => break,
                }
            }
        }

        let seq = inner.bump();
        let entry = inner.entries.entry(id).or_insert_with(|| Entry {
            session: Session::default(),
            touched: Instant::now(),
            seq,
        });
        change(&mut entry.session);
        entry.touched = Instant::now();
        entry.seq = seq;
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sessions_are_isolated() {
        let store = SessionStore::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        store.put(first, Session::default());
        store.put(second, Session::default());

        store.update(first, |session| {
            session.analysis = Some(Analysis {
                themes: vec!["Cost".into()],
                ..Default::default()
            });
        });

        assert!(store.get(&first).unwrap().analysis.is_some());
        assert!(store.get(&second).unwrap().analysis.is_none());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn update_keeps_fields_it_does_not_touch() {
        let store = SessionStore::new();
        let id = Uuid::new_v4();
        store.update(id, |session| session.analysis = Some(Analysis::default()));
        store.update(id, |session| session.inputs.topic = "Rust".into());

        let session = store.get(&id).unwrap();
        assert_eq!(session.inputs.topic, "Rust");
        assert!(session.analysis.is_some());
    }

    #[test]
    fn expired_sessions_are_dropped() {
        let store = SessionStore::with_limits(Duration::ZERO, 10);
        let id = Uuid::new_v4();
        store.put(id, Session::default());
        assert!(store.get(&id).is_none());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let store = SessionStore::with_limits(DEFAULT_SESSION_TTL, 2);
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        store.put(a, Session::default());
        store.put(b, Session::default());
        assert!(store.get(&a).is_some());

        store.put(c, Session::default());
        assert_eq!(store.len(), 2);
        assert!(store.get(&a).is_some());
        assert!(store.get(&b).is_none());
        assert!(store.get(&c).is_some());
    }

    #[test]
    fn form_inputs_default_to_five_slides() {
        let inputs: FormInputs = serde_json::from_str(r#"{"topic": "Rust"}"#).unwrap();
        assert_eq!(inputs.slide_count, DEFAULT_SLIDE_COUNT);
        assert_eq!(inputs.topic, "Rust");
        assert!(inputs.custom_titles.is_empty());
    }
}
