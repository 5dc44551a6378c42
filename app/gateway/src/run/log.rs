//! Persisted run state: snapshots, the append-only delta log, and prompts.
//!
//! Everything lives in the TTL key-value store under three key families:
//! `run:<rid>` for snapshots, `delta:<rid>:<seq>` for deltas with the
//! sequence number zero-padded so lexicographic key order matches numeric
//! order, and `prompt:<rid>` for the sanitized request messages. Entries
//! vanish when their TTL elapses; readers tolerate the resulting gaps.

use compact_str::CompactString;
use llm::ChatMessage;
use protocol::Phase;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use store::{DEFAULT_TTL, KvStore};

/// One immutable broadcast unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delta {
    /// Sequence number, dense from 0 within a run.
    pub seq: i64,
    /// Text payload.
    pub text: String,
    /// Opaque image payloads, in order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<Value>>,
}

/// The recoverable projection of a run: everything but its transient
/// buffers, timers, sockets, and cancellation handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Run identifier.
    pub rid: CompactString,
    /// Last assigned sequence number.
    pub seq: i64,
    /// Phase at persistence time.
    pub phase: Phase,
    /// Failure reason for terminal failures.
    pub error: Option<String>,
    /// Wall-clock milliseconds when the run entered `running`.
    #[serde(rename = "startedAt")]
    pub started_at: u64,
}

/// Persistence facade over the key-value store.
#[derive(Clone)]
pub struct DeltaLog {
    store: Arc<KvStore>,
}

impl DeltaLog {
    /// Create a log over the given store.
    pub fn new(store: Arc<KvStore>) -> Self {
        Self { store }
    }

    fn snapshot_key(rid: &str) -> String {
        format!("run:{rid}")
    }

    fn delta_key(rid: &str, seq: i64) -> String {
        format!("delta:{rid}:{seq:010}")
    }

    fn prompt_key(rid: &str) -> String {
        format!("prompt:{rid}")
    }

    /// Append one delta. Deltas are immutable once written; a key is never
    /// reused because `seq` only moves forward.
    pub fn append(&self, rid: &str, delta: &Delta) {
        match serde_json::to_string(delta) {
            Ok(json) => self.store.set(Self::delta_key(rid, delta.seq), json, DEFAULT_TTL),
            Err(e) => tracing::warn!("failed to encode delta {}:{}: {e}", rid, delta.seq),
        }
    }

    /// Read every surviving delta of a run in ascending `seq` order.
    pub fn read_all(&self, rid: &str) -> Vec<Delta> {
        let mut deltas: Vec<Delta> = self
            .store
            .list(&format!("delta:{rid}:"))
            .into_iter()
            .filter_map(|key| self.store.get(&key))
            .filter_map(|json| serde_json::from_str(&json).ok())
            .collect();
        deltas.sort_by_key(|d| d.seq);
        deltas
    }

    /// Persist the run snapshot.
    pub fn write_snapshot(&self, snapshot: &Snapshot) {
        match serde_json::to_string(snapshot) {
            Ok(json) => self.store.set(Self::snapshot_key(&snapshot.rid), json, DEFAULT_TTL),
            Err(e) => tracing::warn!("failed to encode snapshot {}: {e}", snapshot.rid),
        }
    }

    /// Read the snapshot for a run, if it survived.
    pub fn read_snapshot(&self, rid: &str) -> Option<Snapshot> {
        let json = self.store.get(&Self::snapshot_key(rid))?;
        serde_json::from_str(&json).ok()
    }

    /// Record the sanitized prompt. Write-only, informational.
    pub fn write_prompt(&self, rid: &str, messages: &[ChatMessage]) {
        match serde_json::to_string(messages) {
            Ok(json) => self.store.set(Self::prompt_key(rid), json, DEFAULT_TTL),
            Err(e) => tracing::warn!("failed to encode prompt {rid}: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log() -> DeltaLog {
        DeltaLog::new(Arc::new(KvStore::new()))
    }

    fn delta(seq: i64, text: &str) -> Delta {
        Delta {
            seq,
            text: text.to_owned(),
            images: None,
        }
    }

    #[test]
    fn append_and_read_back_in_seq_order() {
        let log = log();
        log.append("r1", &delta(2, "c"));
        log.append("r1", &delta(0, "a"));
        log.append("r1", &delta(1, "b"));
        log.append("r2", &delta(0, "x"));

        let deltas = log.read_all("r1");
        assert_eq!(deltas.len(), 3);
        let text: String = deltas.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(text, "abc");
    }

    #[test]
    fn zero_padding_keeps_large_seqs_ordered() {
        let log = log();
        log.append("r1", &delta(10, "later"));
        log.append("r1", &delta(9, "earlier"));
        let deltas = log.read_all("r1");
        assert_eq!(deltas[0].seq, 9);
        assert_eq!(deltas[1].seq, 10);
    }

    #[test]
    fn snapshot_round_trips() {
        let log = log();
        log.write_snapshot(&Snapshot {
            rid: "r1".into(),
            seq: 4,
            phase: Phase::Done,
            error: None,
            started_at: 1_700_000_000_000,
        });
        let snapshot = log.read_snapshot("r1").unwrap();
        assert_eq!(snapshot.seq, 4);
        assert_eq!(snapshot.phase, Phase::Done);
        assert!(log.read_snapshot("r2").is_none());
    }

    #[test]
    fn missing_run_reads_empty() {
        assert!(log().read_all("nope").is_empty());
    }

    #[test]
    fn images_survive_persistence() {
        let log = log();
        log.append(
            "r1",
            &Delta {
                seq: 0,
                text: String::new(),
                images: Some(vec![serde_json::json!({ "url": "data:image/png;base64,AA" })]),
            },
        );
        let deltas = log.read_all("r1");
        assert_eq!(deltas[0].images.as_ref().unwrap().len(), 1);
    }
}
