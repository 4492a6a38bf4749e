use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status given to bids that have no bid type (or a type without an open status).
pub const DEFAULT_STATUS: &str = "Открыта";

/// A work order, with its type and creator names resolved.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub amount: f64,
    pub status: String,
    pub bid_type_id: Option<i64>,
    pub bid_type_name: Option<String>,
    pub planned_reaction_time_minutes: Option<i32>,
    pub planned_duration_minutes: Option<i32>,
    pub current_responsible_user_id: Option<i64>,
    pub created_by: Option<i64>,
    pub creator_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create-bid request body. Missing SLA fields are inherited from the bid type.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidForm {
    pub title: String,
    pub description: Option<String>,
    pub amount: Option<f64>,
    pub status: Option<String>,
    pub bid_type_id: Option<i64>,
    pub planned_reaction_time_minutes: Option<i32>,
    pub planned_duration_minutes: Option<i32>,
}

/// Partial update of a bid; `None` keeps the stored value. Status is changed separately.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub amount: Option<f64>,
    pub planned_reaction_time_minutes: Option<i32>,
    pub planned_duration_minutes: Option<i32>,
    pub current_responsible_user_id: Option<i64>,
}

/// Status-change request body.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusChange {
    pub status: String,
}

/// List filters for bids.
#[derive(Debug, Clone, Default)]
pub struct BidFilter {
    pub status: Option<String>,
    pub bid_type_id: Option<i64>,
}

/// How strictly status changes follow the bid type's transition graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowPolicy {
    pub enforce_transitions: bool,
}

impl Default for WorkflowPolicy {
    fn default() -> Self {
        WorkflowPolicy { enforce_transitions: true }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub bid_id: i64,
    pub user_id: Option<i64>,
    pub user_name: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentForm {
    pub content: String,
}

/// One line of a bid's merged timeline.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub date: DateTime<Utc>,
    pub user: Option<String>,
    pub action: String,
}
