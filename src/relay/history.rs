use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::relay::types::RelayResult;

/// A finished relay run.
#[derive(Debug, Clone, Serialize)]
pub struct RelayRecord {
    pub message_id: Uuid,
    pub preview: String,
    pub result: RelayResult,
    pub finished_at: DateTime<Utc>,
}

/// Bounded, most-recent-last log of relay outcomes.
#[derive(Clone)]
pub struct RelayHistory {
    records: Arc<RwLock<VecDeque<RelayRecord>>>,
    capacity: usize,
}

impl RelayHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub async fn record(&self, message_id: Uuid, text: &str, result: RelayResult) {
        let record = RelayRecord {
            message_id,
            preview: text.chars().take(30).collect(),
            result,
            finished_at: Utc::now(),
        };
        let mut records = self.records.write().await;
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Oldest first, newest last.
    pub async fn recent(&self) -> Vec<RelayRecord> {
        self.records.read().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}
