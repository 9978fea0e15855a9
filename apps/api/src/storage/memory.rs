use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::analysis::AnalysisResult;
use crate::storage::{AnalysisStore, StoredSession};

/// Process-local store. Used when no Redis URL is configured, and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    session: RwLock<StoredSession>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: StoredSession) -> Self {
        Self {
            session: RwLock::new(session),
        }
    }
}

#[async_trait]
impl AnalysisStore for MemoryStore {
    async fn load(&self) -> Result<StoredSession> {
        Ok(self.session.read().await.clone())
    }

    async fn save_input(&self, input: &str) -> Result<()> {
        self.session.write().await.last_input = Some(input.to_string());
        Ok(())
    }

    async fn save_result(&self, result: &AnalysisResult) -> Result<()> {
        self.session.write().await.last_result = Some(result.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.session.write().await = StoredSession::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_load_clear() {
        let store = MemoryStore::new();
        assert_eq!(store.load().await.unwrap(), StoredSession::default());

        store.save_input("Senior Rust Engineer").await.unwrap();
        let session = store.load().await.unwrap();
        assert_eq!(session.last_input.as_deref(), Some("Senior Rust Engineer"));
        assert!(session.last_result.is_none());

        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), StoredSession::default());
    }
}
