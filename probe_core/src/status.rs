//! Shared up/down status of every scheduled probe

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::probes::ProbeKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Up,
    Down,
}

impl ProbeStatus {
    pub fn from_errors(errors: &[String]) -> Self {
        if errors.is_empty() {
            ProbeStatus::Up
        } else {
            ProbeStatus::Down
        }
    }

    /// Gauge value exported for scraping.
    pub fn value(&self) -> u8 {
        match self {
            ProbeStatus::Up => 1,
            ProbeStatus::Down => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StatusKey {
    pub kind: ProbeKind,
    pub id: String,
}

impl StatusKey {
    pub fn new(kind: ProbeKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: ProbeStatus,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub probe: ProbeKind,
    pub id: String,
    pub status: ProbeStatus,
    pub value: u8,
    pub updated_at: DateTime<Utc>,
}

/// Keyed store of the latest status of each probe.
///
/// Cloning shares the same map. Each `set` is a single assignment under the write lock,
/// so racing writers on one key resolve to whichever finished last.
#[derive(Clone, Default)]
pub struct StatusSink {
    entries: Arc<RwLock<BTreeMap<StatusKey, StatusEntry>>>,
}

impl StatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, kind: ProbeKind, id: &str, status: ProbeStatus) {
        let entry = StatusEntry {
            status,
            updated_at: Utc::now(),
        };
        self.entries.write().insert(StatusKey::new(kind, id), entry);
    }

    pub fn get(&self, kind: ProbeKind, id: &str) -> Option<ProbeStatus> {
        self.entries
            .read()
            .get(&StatusKey::new(kind, id))
            .map(|entry| entry.status)
    }

    /// Point-in-time copy of every entry, ordered by kind then id.
    pub fn snapshot(&self) -> Vec<StatusSnapshot> {
        self.entries
            .read()
            .iter()
            .map(|(key, entry)| StatusSnapshot {
                probe: key.kind,
                id: key.id.clone(),
                status: entry.status,
                value: entry.status.value(),
                updated_at: entry.updated_at,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_errors() {
        assert_eq!(ProbeStatus::from_errors(&[]), ProbeStatus::Up);
        assert_eq!(
            ProbeStatus::from_errors(&["request failed".to_string()]),
            ProbeStatus::Down
        );
        assert_eq!(ProbeStatus::Up.value(), 1);
        assert_eq!(ProbeStatus::Down.value(), 0);
    }

    #[test]
    fn test_set_overwrites_and_keys_are_distinct() {
        let sink = StatusSink::new();
        assert!(sink.is_empty());

        sink.set(ProbeKind::Http, "http://a/", ProbeStatus::Up);
        sink.set(ProbeKind::Ping, "http://a/", ProbeStatus::Down);
        assert_eq!(sink.len(), 2);

        sink.set(ProbeKind::Http, "http://a/", ProbeStatus::Down);
        sink.set(ProbeKind::Http, "http://a/", ProbeStatus::Down);
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.get(ProbeKind::Http, "http://a/"), Some(ProbeStatus::Down));
        assert_eq!(sink.get(ProbeKind::RawTcp, "http://a/"), None);
    }

    #[test]
    fn test_snapshot_is_ordered_copy() {
        let sink = StatusSink::new();
        sink.set(ProbeKind::RawTcp, "db:5432", ProbeStatus::Up);
        sink.set(ProbeKind::Http, "http://b/", ProbeStatus::Down);
        sink.set(ProbeKind::Http, "http://a/", ProbeStatus::Up);

        let snapshot = sink.snapshot();
        let keys: Vec<(ProbeKind, &str, u8)> = snapshot
            .iter()
            .map(|s| (s.probe, s.id.as_str(), s.value))
            .collect();
        assert_eq!(
            keys,
            vec![
                (ProbeKind::Http, "http://a/", 1),
                (ProbeKind::Http, "http://b/", 0),
                (ProbeKind::RawTcp, "db:5432", 1),
            ]
        );

        sink.set(ProbeKind::Http, "http://a/", ProbeStatus::Down);
        assert_eq!(snapshot[0].status, ProbeStatus::Up);
    }

    #[test]
    fn test_concurrent_writers_and_readers() {
        let sink = StatusSink::new();

        let writers: Vec<_> = (0..8)
            .map(|worker| {
                let sink = sink.clone();
                std::thread::spawn(move || {
                    for round in 0..500 {
                        let status = if round % 2 == 0 {
                            ProbeStatus::Up
                        } else {
                            ProbeStatus::Down
                        };
                        sink.set(ProbeKind::RawTcp, &format!("host-{}:80", worker), status);
                        sink.set(ProbeKind::Ping, "shared", status);
                    }
                })
            })
            .collect();

        let reader = {
            let sink = sink.clone();
            std::thread::spawn(move || {
                for _ in 0..500 {
                    assert!(sink.snapshot().len() <= 9);
                }
            })
        };

        for writer in writers {
            writer.join().unwrap();
        }
        reader.join().unwrap();

        assert_eq!(sink.len(), 9);
        for worker in 0..8 {
            assert_eq!(
                sink.get(ProbeKind::RawTcp, &format!("host-{}:80", worker)),
                Some(ProbeStatus::Down)
            );
        }
    }
}
