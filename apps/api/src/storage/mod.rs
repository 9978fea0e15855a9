//! Session persistence port — last input and last completed result.
//!
//! The orchestrator loads from it at startup, writes on every change, and
//! clears it on reset. Exactly two keys exist in any backend.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::analysis::AnalysisResult;

pub mod memory;
pub mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

pub const LAST_INPUT_KEY: &str = "recruitmaxxing:last_input";
pub const LAST_RESULT_KEY: &str = "recruitmaxxing:last_result";

/// Everything a store remembers between sessions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredSession {
    pub last_input: Option<String>,
    pub last_result: Option<AnalysisResult>,
}

#[async_trait]
pub trait AnalysisStore: Send + Sync {
    async fn load(&self) -> Result<StoredSession>;
    async fn save_input(&self, input: &str) -> Result<()>;
    async fn save_result(&self, result: &AnalysisResult) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}
