//! Audit log for model invocations.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub model: String,
    pub backend: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub output_hash: String,
    pub latency_ms: u64,
    pub called_at: chrono::DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        model: String,
        backend: String,
        prompt_tokens: u32,
        completion_tokens: u32,
        output: &str,
        latency_ms: u64,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(output.as_bytes());
        let output_hash = format!("{:x}", hasher.finalize());

        Self {
            id: Uuid::new_v4(),
            model,
            backend,
            prompt_tokens,
            completion_tokens,
            output_hash,
            latency_ms,
            called_at: Utc::now(),
        }
    }
}

/// Bounded in-memory ring of recent audit entries, newest last.
pub struct AuditLog {
    entries: Mutex<VecDeque<AuditEntry>>,
    capacity: usize,
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn record(&self, entry: AuditEntry) {
        tracing::info!(
            model = %entry.model,
            backend = %entry.backend,
            prompt_tokens = entry.prompt_tokens,
            completion_tokens = entry.completion_tokens,
            latency_ms = entry.latency_ms,
            "model call audited"
        );
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn snapshot(&self) -> Vec<AuditEntry> {
        let entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.iter().cloned().collect()
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_hash_is_stable() {
        let a = AuditEntry::new("m".into(), "ark".into(), 1, 2, "same output", 5);
        let b = AuditEntry::new("m".into(), "ark".into(), 1, 2, "same output", 9);
        assert_eq!(a.output_hash, b.output_hash);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn log_evicts_oldest_beyond_capacity() {
        let log = AuditLog::new(2);
        for i in 0..3u32 {
            log.record(AuditEntry::new(format!("m{i}"), "ark".into(), i, 0, "x", 1));
        }
        let entries = log.snapshot();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].model, "m1");
        assert_eq!(entries[1].model, "m2");
    }
}
