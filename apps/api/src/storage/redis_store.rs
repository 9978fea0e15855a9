use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::warn;

use crate::models::analysis::AnalysisResult;
use crate::storage::{AnalysisStore, StoredSession, LAST_INPUT_KEY, LAST_RESULT_KEY};

/// Redis-backed store. The last result is kept as a JSON string.
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
}

impl RedisStore {
    pub fn open(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Invalid REDIS_URL")?;
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .context("Failed to connect to Redis")
    }
}

#[async_trait]
impl AnalysisStore for RedisStore {
    async fn load(&self) -> Result<StoredSession> {
        let mut conn = self.connection().await?;
        let (last_input, raw_result): (Option<String>, Option<String>) = redis::pipe()
            .get(LAST_INPUT_KEY)
            .get(LAST_RESULT_KEY)
            .query_async(&mut conn)
            .await
            .context("Failed to read session from Redis")?;

        Ok(StoredSession {
            last_input,
            last_result: raw_result.and_then(|raw| decode_result(&raw)),
        })
    }

    async fn save_input(&self, input: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        conn.set::<_, _, ()>(LAST_INPUT_KEY, input)
            .await
            .context("Failed to save last input")
    }

    async fn save_result(&self, result: &AnalysisResult) -> Result<()> {
        let encoded = serde_json::to_string(result).context("Failed to serialize AnalysisResult")?;
        let mut conn = self.connection().await?;
        conn.set::<_, _, ()>(LAST_RESULT_KEY, encoded)
            .await
            .context("Failed to save last result")
    }

    async fn clear(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(&[LAST_INPUT_KEY, LAST_RESULT_KEY][..])
            .await
            .context("Failed to clear session")
    }
}

/// A stored result that no longer decodes is treated as absent.
fn decode_result(raw: &str) -> Option<AnalysisResult> {
    match serde_json::from_str(raw) {
        Ok(result) => Some(result),
        Err(e) => {
            warn!("Ignoring unreadable stored analysis result: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_result_ignores_garbage() {
        assert!(decode_result("{\"skills\": \"not a list\"}").is_none());
        assert!(decode_result("not json").is_none());
    }

    #[test]
    fn test_open_rejects_invalid_url() {
        assert!(RedisStore::open("not-a-redis-url").is_err());
    }
}
