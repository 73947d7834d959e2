//! DTOs for click analytics.

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub ad_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsResponse {
    pub ad_id: String,
    pub click_count: i64,
}
