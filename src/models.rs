use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One per-minute click bucket, as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsPoint {
    pub ts: DateTime<Utc>,
    pub v: i64,
}

/// Time-bounded stats lookup for one banner; the range is [from, to).
#[derive(Debug, Clone)]
pub struct StatsQuery {
    pub banner_id: i64,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBannerRequest {
    pub name: String,
}

/// Raw time bounds from the request body; parsed by the transport layer.
#[derive(Debug, Deserialize)]
pub struct StatsRangeRequest {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub stats: Vec<StatsPoint>,
}
