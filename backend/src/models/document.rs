use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A generated document, recorded for the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentUsage {
    pub id: String,
    pub user_id: String,
    pub topic: String,
    pub num_pages: u32,
    pub filename: String,
    pub download_url: String,
    pub created_at: DateTime<Utc>,
}

impl DocumentUsage {
    pub fn new(user_id: &str, topic: &str, num_pages: u32, filename: &str, download_url: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            topic: topic.to_string(),
            num_pages,
            filename: filename.to_string(),
            download_url: download_url.to_string(),
            created_at: Utc::now(),
        }
    }
}
