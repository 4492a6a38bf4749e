use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Position of the initial ("open") status of every bid type.
pub const OPEN_POSITION: i32 = 1;
/// Position of the terminal ("closed") status of every bid type.
pub const CLOSED_POSITION: i32 = 999;

/// Reference to the role accountable for a status.
///
/// Stored documents carry either the numeric role id or the role name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoleRef {
    Id(i64),
    Name(String),
}

/// One state of a bid type's workflow, keyed by `position`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub name: String,
    pub position: i32,
    #[serde(default)]
    pub allowed_actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responsible_role_id: Option<RoleRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responsible_user_id: Option<i64>,
}

impl Status {
    pub fn allows(&self, action: &str) -> bool {
        self.allowed_actions.iter().any(|a| a == action)
    }
}

/// A directed edge between two status positions of the same bid type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    pub from_position: i32,
    pub to_position: i32,
}

/// The statuses and transitions of one bid type, persisted as a single document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    pub statuses: Vec<Status>,
    pub transitions: Vec<Transition>,
}

/// A bid type as returned by the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BidType {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub statuses: Vec<Status>,
    pub transitions: Vec<Transition>,
    pub planned_reaction_time_minutes: Option<i32>,
    pub planned_duration_minutes: Option<i32>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BidType {
    pub fn workflow(&self) -> Workflow {
        Workflow {
            statuses: self.statuses.clone(),
            transitions: self.transitions.clone(),
        }
    }
}

/// Create/replace payload for a bid type. Statuses and transitions are taken as-is.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidTypeForm {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub statuses: Option<Vec<Status>>,
    #[serde(default)]
    pub transitions: Option<Vec<Transition>>,
    pub planned_reaction_time_minutes: Option<i32>,
    pub planned_duration_minutes: Option<i32>,
}

/// Payload for adding a status.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStatus {
    pub name: String,
    pub position: i32,
    pub allowed_actions: Option<Vec<String>>,
    pub color: Option<String>,
    pub responsible_role_id: Option<RoleRef>,
    pub responsible_user_id: Option<i64>,
}

/// Payload for updating a status in place. Missing `allowed_actions` keeps the current set.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub name: String,
    pub allowed_actions: Option<Vec<String>>,
}
