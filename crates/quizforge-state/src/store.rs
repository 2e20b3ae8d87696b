//! Durable artifact store keyed by `{conversation_id}{suffix}`.
//!
//! Two backends: [`MemoryStore`] for tests and the simulator, and
//! [`JsonDirStore`] which writes one pretty-printed JSON file per key.

use dashmap::DashMap;
use quizforge_model::{BankKey, BankSuffix, GradingReport, QuestionBank};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::PathBuf;

/// A persisted artifact: `_generated`/`_corrected` keys hold banks,
/// `_graded` keys hold reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoredArtifact {
    Bank(QuestionBank),
    Report(GradingReport),
}

impl StoredArtifact {
    #[must_use]
    pub fn as_bank(&self) -> Option<&QuestionBank> {
        match self {
            StoredArtifact::Bank(bank) => Some(bank),
            StoredArtifact::Report(_) => None,
        }
    }

    #[must_use]
    pub fn as_report(&self) -> Option<&GradingReport> {
        match self {
            StoredArtifact::Report(report) => Some(report),
            StoredArtifact::Bank(_) => None,
        }
    }
}

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] io::Error),

    #[error("store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Durable key-value storage of banks and reports.
pub trait ArtifactStore: Send + Sync {
    fn get(&self, key: &BankKey) -> Result<Option<StoredArtifact>, StoreError>;

    fn put(&self, key: &BankKey, artifact: StoredArtifact) -> Result<(), StoreError>;

    fn delete(&self, key: &BankKey) -> Result<(), StoreError>;

    /// Delete every suffix entry for a conversation. Called by the
    /// orchestrator before a new run so regeneration never reuses stale
    /// output.
    fn invalidate_conversation(&self, conversation_id: &str) -> Result<(), StoreError> {
        for suffix in BankSuffix::ALL {
            self.delete(&BankKey::new(conversation_id, suffix))?;
        }
        Ok(())
    }

    /// Convenience: fetch a bank, ignoring report entries.
    fn get_bank(&self, key: &BankKey) -> Result<Option<QuestionBank>, StoreError> {
        Ok(self.get(key)?.and_then(|a| a.as_bank().cloned()))
    }

    /// Convenience: fetch a report, ignoring bank entries.
    fn get_report(&self, key: &BankKey) -> Result<Option<GradingReport>, StoreError> {
        Ok(self.get(key)?.and_then(|a| a.as_report().cloned()))
    }
}

/// In-memory store backed by a concurrent map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, StoredArtifact>,
}

impl MemoryStore {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ArtifactStore for MemoryStore {
    fn get(&self, key: &BankKey) -> Result<Option<StoredArtifact>, StoreError> {
        Ok(self.entries.get(&key.to_string()).map(|e| e.value().clone()))
    }

    fn put(&self, key: &BankKey, artifact: StoredArtifact) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), artifact);
        Ok(())
    }

    fn delete(&self, key: &BankKey) -> Result<(), StoreError> {
        self.entries.remove(&key.to_string());
        Ok(())
    }
}

/// Directory-of-JSON-files store: one `{key}.json` per artifact.
#[derive(Debug)]
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &BankKey) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl ArtifactStore for JsonDirStore {
    fn get(&self, key: &BankKey) -> Result<Option<StoredArtifact>, StoreError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &BankKey, artifact: StoredArtifact) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(&artifact)?;
        fs::write(self.path_for(key), text)?;
        Ok(())
    }

    fn delete(&self, key: &BankKey) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizforge_model::{Difficulty, Question, QuestionId, QuestionType};

    fn sample_bank() -> QuestionBank {
        QuestionBank::new(
            vec![Question::new(
                QuestionId::generated(1),
                "What is a B-tree?",
                QuestionType::ShortAnswer,
                "A balanced tree",
                Difficulty::Medium,
            )],
            "fp",
        )
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new();
        let key = BankKey::generated("conv");

        assert!(store.get(&key).unwrap().is_none());
        store
            .put(&key, StoredArtifact::Bank(sample_bank()))
            .unwrap();

        let bank = store.get_bank(&key).unwrap().unwrap();
        assert_eq!(bank.len(), 1);

        store.delete(&key).unwrap();
        assert!(store.get(&key).unwrap().is_none());
    }

    #[test]
    fn invalidate_conversation_clears_all_suffixes() {
        let store = MemoryStore::new();
        for suffix in BankSuffix::ALL {
            // A report would live under _graded in practice; a bank is
            // enough to exercise deletion.
            store
                .put(
                    &BankKey::new("conv", suffix),
                    StoredArtifact::Bank(sample_bank()),
                )
                .unwrap();
        }
        store
            .put(
                &BankKey::generated("other"),
                StoredArtifact::Bank(sample_bank()),
            )
            .unwrap();

        store.invalidate_conversation("conv").unwrap();

        for suffix in BankSuffix::ALL {
            assert!(store.get(&BankKey::new("conv", suffix)).unwrap().is_none());
        }
        assert!(store.get(&BankKey::generated("other")).unwrap().is_some());
    }

    #[test]
    fn json_dir_store_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonDirStore::open(tmp.path()).unwrap();
        let key = BankKey::corrected("conv-9");

        store
            .put(&key, StoredArtifact::Bank(sample_bank()))
            .unwrap();
        assert!(tmp.path().join("conv-9_corrected.json").exists());

        let bank = store.get_bank(&key).unwrap().unwrap();
        assert_eq!(bank.questions[0].id, QuestionId::generated(1));

        // Deleting a missing key is not an error.
        store.delete(&BankKey::graded("conv-9")).unwrap();
    }

    #[test]
    fn bank_key_does_not_return_report_as_bank() {
        let store = MemoryStore::new();
        let key = BankKey::graded("conv");
        let mut report = quizforge_model::GradingReport {
            conversation_id: "conv".into(),
            graded_at: chrono::Utc::now(),
            per_question: vec![],
            average_score: 0.0,
            mastery: Default::default(),
            warnings: vec![],
        };
        report.finalize();
        store.put(&key, StoredArtifact::Report(report)).unwrap();

        assert!(store.get_bank(&key).unwrap().is_none());
        assert!(store.get_report(&key).unwrap().is_some());
    }
}
